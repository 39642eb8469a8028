//! Tasks grid
//!
//! Holds the caller's task list and keeps it current through two redundant
//! paths that both end in a full refetch:
//!
//! ```text
//! TasksGrid::run
//!   ├─> change feed: refresh on every event
//!   │     (stream ended or failed → resubscribe on the next poll tick;
//!   │      a subscribe still in flight never delays polling or shutdown)
//!   └─> poll ticker: refresh every `poll_interval`
//! ```
//!
//! Concurrent refreshes simply replace the list; the last one to finish wins.
//! A failed fetch keeps the previous list.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//! use worklog_client::api::ApiClient;
//! use worklog_client::grid::TasksGrid;
//!
//! # async fn example(client: ApiClient) {
//! let grid = Arc::new(TasksGrid::new(Arc::new(client), Duration::from_secs(3)));
//! let mut updates = grid.subscribe();
//!
//! let shutdown = CancellationToken::new();
//! tokio::spawn({
//!     let grid = grid.clone();
//!     let shutdown = shutdown.clone();
//!     async move { grid.run(shutdown).await }
//! });
//!
//! while updates.changed().await.is_ok() {
//!     println!("{} tasks", updates.borrow().len());
//! }
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::{FutureExt as _, StreamExt as _};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use worklog_shared::models::task::Task;

use crate::api::{ClientResult, FeedEvent, FeedStream, TaskSource};

/// Live task list
pub struct TasksGrid {
    source: Arc<dyn TaskSource>,
    state: watch::Sender<Vec<Task>>,
    poll_interval: Duration,
}

impl TasksGrid {
    pub fn new(source: Arc<dyn TaskSource>, poll_interval: Duration) -> Self {
        let (state, _) = watch::channel(Vec::new());

        Self {
            source,
            state,
            poll_interval,
        }
    }

    /// Receiver notified whenever the list is replaced
    pub fn subscribe(&self) -> watch::Receiver<Vec<Task>> {
        self.state.subscribe()
    }

    /// Snapshot of the current list
    pub fn tasks(&self) -> Vec<Task> {
        self.state.borrow().clone()
    }

    /// Seeds the list with the server-rendered initial fetch
    pub fn set_initial(&self, tasks: Vec<Task>) {
        self.state.send_replace(tasks);
    }

    /// Refetches the full list; returns whether it was replaced
    pub async fn refresh(&self) -> bool {
        match self.source.fetch_tasks().await {
            Ok(tasks) => {
                tracing::debug!(count = tasks.len(), "Task list refreshed");
                self.state.send_replace(tasks);
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "Task refresh failed; keeping the current list");
                false
            }
        }
    }

    /// Keeps the list current until `shutdown` fires
    pub async fn run(&self, shutdown: CancellationToken) {
        tracing::info!(poll_interval_ms = self.poll_interval.as_millis() as u64, "Grid sync starting");

        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        ticker.tick().await;

        let mut feed: Option<FeedStream> = None;
        let mut subscribing = Some(self.subscribe_feed());

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("Grid sync stopped");
                    break;
                }
                _ = ticker.tick() => {
                    if feed.is_none() && subscribing.is_none() {
                        subscribing = Some(self.subscribe_feed());
                    }
                    self.refresh().await;
                }
                result = next_subscription(&mut subscribing) => {
                    subscribing = None;
                    match result {
                        Ok(stream) => {
                            tracing::debug!("Change feed subscribed");
                            feed = Some(stream);
                        }
                        Err(e) => tracing::warn!(error = %e, "Change feed unavailable"),
                    }
                }
                item = next_event(&mut feed) => match item {
                    Some(Ok(event)) => {
                        if let FeedEvent::Change(change) = &event {
                            tracing::debug!(task_id = %change.task_id, kind = ?change.kind, "Task changed");
                        }
                        self.refresh().await;
                    }
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "Change feed failed; polling until resubscribed");
                        feed = None;
                    }
                    None => {
                        tracing::debug!("Change feed closed; polling until resubscribed");
                        feed = None;
                    }
                },
            }
        }
    }

    /// Subscribe request polled alongside the ticker, never awaited inline
    fn subscribe_feed(&self) -> Subscription {
        let source = self.source.clone();
        async move { source.changes().await }.boxed()
    }
}

type Subscription = BoxFuture<'static, ClientResult<FeedStream>>;

/// Outcome of the in-flight subscribe; never resolves while none is pending
async fn next_subscription(subscribing: &mut Option<Subscription>) -> ClientResult<FeedStream> {
    match subscribing {
        Some(request) => request.await,
        None => std::future::pending().await,
    }
}

/// Next feed event; never resolves while unsubscribed
async fn next_event(feed: &mut Option<FeedStream>) -> Option<ClientResult<FeedEvent>> {
    match feed {
        Some(stream) => stream.next().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ClientError;
    use async_trait::async_trait;
    use chrono::Utc;
    use futures::channel::mpsc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Mutex;
    use uuid::Uuid;
    use worklog_shared::events::{ChangeEvent, ChangeKind};

    const POLL: Duration = Duration::from_millis(3000);

    fn task(title: &str) -> Task {
        Task {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            title: title.to_string(),
            description: Some("Worked on the release notes".to_string()),
            image_url: None,
            excel_url: None,
            created_at: Utc::now(),
        }
    }

    /// Server-side list plus a scripted change feed
    #[derive(Default)]
    struct FakeSource {
        tasks: Mutex<Vec<Task>>,
        fail_fetch: Mutex<bool>,
        hang_subscribe: bool,
        feeds: Mutex<Vec<FeedStream>>,
        fetches: AtomicUsize,
        subscriptions: AtomicUsize,
    }

    #[async_trait]
    impl TaskSource for FakeSource {
        async fn fetch_tasks(&self) -> ClientResult<Vec<Task>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if *self.fail_fetch.lock().await {
                return Err(ClientError::Transport("connection refused".to_string()));
            }
            Ok(self.tasks.lock().await.clone())
        }

        async fn changes(&self) -> ClientResult<FeedStream> {
            self.subscriptions.fetch_add(1, Ordering::SeqCst);
            if self.hang_subscribe {
                // A proxy holding the SSE response back
                std::future::pending::<()>().await;
            }
            match self.feeds.lock().await.pop() {
                Some(feed) => Ok(feed),
                // A feed that never fires
                None => Ok(futures::stream::pending().boxed()),
            }
        }
    }

    fn spawn_run(grid: &Arc<TasksGrid>) -> (CancellationToken, tokio::task::JoinHandle<()>) {
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn({
            let grid = grid.clone();
            let shutdown = shutdown.clone();
            async move { grid.run(shutdown).await }
        });
        (shutdown, handle)
    }

    #[tokio::test]
    async fn test_refresh_replaces_list() {
        let source = Arc::new(FakeSource::default());
        source.tasks.lock().await.push(task("Deploy"));

        let grid = TasksGrid::new(source.clone(), POLL);
        grid.set_initial(vec![task("Old")]);
        let mut updates = grid.subscribe();

        assert!(grid.refresh().await);
        assert!(updates.has_changed().unwrap());
        assert_eq!(updates.borrow_and_update()[0].title, "Deploy");
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_list() {
        let source = Arc::new(FakeSource::default());
        *source.fail_fetch.lock().await = true;

        let grid = TasksGrid::new(source.clone(), POLL);
        grid.set_initial(vec![task("Standup")]);

        assert!(!grid.refresh().await);
        assert_eq!(grid.tasks()[0].title, "Standup");
    }

    #[tokio::test(start_paused = true)]
    async fn test_polling_picks_up_new_task_without_feed() {
        let source = Arc::new(FakeSource::default());
        let grid = Arc::new(TasksGrid::new(source.clone(), POLL));
        let (shutdown, handle) = spawn_run(&grid);

        tokio::time::sleep(Duration::from_millis(10)).await;
        source.tasks.lock().await.push(task("Created elsewhere"));
        assert!(grid.tasks().is_empty());

        tokio::time::sleep(POLL).await;
        assert_eq!(grid.tasks().len(), 1);
        assert_eq!(grid.tasks()[0].title, "Created elsewhere");

        shutdown.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_feed_event_triggers_refresh() {
        let source = Arc::new(FakeSource::default());
        let (tx, rx) = mpsc::unbounded::<ClientResult<FeedEvent>>();
        source.feeds.lock().await.push(rx.boxed());

        let grid = Arc::new(TasksGrid::new(source.clone(), POLL));
        let (shutdown, handle) = spawn_run(&grid);
        tokio::time::sleep(Duration::from_millis(10)).await;

        let created = task("Pushed");
        source.tasks.lock().await.push(created.clone());
        tx.unbounded_send(Ok(FeedEvent::Change(ChangeEvent::new(
            ChangeKind::Insert,
            created.id,
            created.user_id,
        ))))
        .unwrap();

        // Well before the next poll tick
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(grid.tasks(), vec![created]);

        shutdown.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_resubscribes_after_feed_closes() {
        let source = Arc::new(FakeSource::default());
        let (tx, rx) = mpsc::unbounded::<ClientResult<FeedEvent>>();
        source.feeds.lock().await.push(rx.boxed());

        let grid = Arc::new(TasksGrid::new(source.clone(), POLL));
        let (shutdown, handle) = spawn_run(&grid);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(source.subscriptions.load(Ordering::SeqCst), 1);

        drop(tx);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(source.subscriptions.load(Ordering::SeqCst), 1);

        tokio::time::sleep(POLL).await;
        assert_eq!(source.subscriptions.load(Ordering::SeqCst), 2);

        shutdown.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_subscribe_does_not_block_polling() {
        let source = Arc::new(FakeSource {
            hang_subscribe: true,
            ..Default::default()
        });
        let grid = Arc::new(TasksGrid::new(source.clone(), POLL));
        let (shutdown, handle) = spawn_run(&grid);

        tokio::time::sleep(Duration::from_millis(10)).await;
        source.tasks.lock().await.push(task("Created elsewhere"));

        tokio::time::sleep(POLL).await;
        assert_eq!(grid.tasks().len(), 1);

        // The stuck request is not piled up on every tick
        tokio::time::sleep(POLL * 2).await;
        assert_eq!(source.subscriptions.load(Ordering::SeqCst), 1);
        assert_eq!(source.fetches.load(Ordering::SeqCst), 3);

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("run did not stop on cancel")
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_polling() {
        let source = Arc::new(FakeSource::default());
        let grid = Arc::new(TasksGrid::new(source.clone(), POLL));
        let (shutdown, handle) = spawn_run(&grid);

        tokio::time::sleep(POLL * 2 + Duration::from_millis(10)).await;
        shutdown.cancel();
        handle.await.unwrap();

        let fetches = source.fetches.load(Ordering::SeqCst);
        assert_eq!(fetches, 2);

        tokio::time::sleep(POLL * 3).await;
        assert_eq!(source.fetches.load(Ordering::SeqCst), fetches);
    }
}
