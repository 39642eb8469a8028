//! PostgreSQL change listener
//!
//! The `tasks_notify_change` trigger calls `pg_notify('task_changes', ...)`
//! for every row change. This task keeps one `LISTEN` connection open and
//! republishes each payload into a [`ChangeHub`].
//!
//! # Example
//!
//! ```no_run
//! use worklog_shared::events::{spawn_pg_listener, ChangeHub};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example(pool: sqlx::PgPool) {
//! let hub = ChangeHub::default();
//! let shutdown = CancellationToken::new();
//! let handle = spawn_pg_listener(pool, hub.clone(), shutdown.clone());
//!
//! shutdown.cancel();
//! let _ = handle.await;
//! # }
//! ```

use std::time::Duration;

use sqlx::postgres::PgListener;
use sqlx::PgPool;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{ChangeEvent, ChangeHub};

/// Notification channel the table trigger publishes on
pub const CHANNEL: &str = "task_changes";

const RETRY_DELAY: Duration = Duration::from_secs(2);

/// Starts the listener task; it runs until `shutdown` is cancelled
pub fn spawn_pg_listener(
    pool: PgPool,
    hub: ChangeHub,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let mut listener = match connect(&pool).await {
                Ok(listener) => listener,
                Err(e) => {
                    error!(error = %e, "Failed to start change listener");
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(RETRY_DELAY) => continue,
                    }
                }
            };

            info!(channel = CHANNEL, "Listening for task changes");

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        info!("Change listener stopped");
                        return;
                    }
                    notification = listener.recv() => match notification {
                        Ok(notification) => forward(&hub, notification.payload()),
                        Err(e) => {
                            // recv reconnects on the next call; back off first
                            warn!(error = %e, "Change listener connection lost");
                            tokio::select! {
                                _ = shutdown.cancelled() => return,
                                _ = tokio::time::sleep(RETRY_DELAY) => {}
                            }
                        }
                    }
                }
            }
        }
    })
}

async fn connect(pool: &PgPool) -> Result<PgListener, sqlx::Error> {
    let mut listener = PgListener::connect_with(pool).await?;
    listener.listen(CHANNEL).await?;
    Ok(listener)
}

fn forward(hub: &ChangeHub, payload: &str) {
    match ChangeEvent::from_payload(payload) {
        Ok(event) => {
            debug!(kind = ?event.kind, task_id = %event.task_id, "Task change received");
            hub.publish(event);
        }
        Err(e) => warn!(error = %e, payload, "Skipping malformed change payload"),
    }
}
