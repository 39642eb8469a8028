//! # Worklog
//!
//! Terminal view of the signed-in user's worklog. Signs in with
//! `WORKLOG_EMAIL` / `WORKLOG_PASSWORD`, prints the task list and reprints
//! it whenever the change feed or the poll ticker brings a new one.
//!
//! ## Usage
//!
//! ```bash
//! WORKLOG_API_URL=http://127.0.0.1:8080 cargo run -p worklog-client
//! ```

use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use worklog_client::api::{ApiClient, AuthApi, TaskSource};
use worklog_client::config::ClientConfig;
use worklog_client::grid::TasksGrid;
use worklog_shared::messages;
use worklog_shared::models::task::Task;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "worklog_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = ClientConfig::from_env()?;
    let (email, password) = config.credentials()?;

    let client = Arc::new(ApiClient::new(&config.api_url)?);
    if let Err(e) = client.sign_in(&email, &password).await {
        anyhow::bail!(messages::sign_in_failure(&e.user_message()));
    }
    tracing::info!(api_url = %config.api_url, "Signed in");

    let grid = Arc::new(TasksGrid::new(client.clone(), config.poll_interval));
    let initial = client
        .fetch_tasks()
        .await
        .context("Failed to load tasks")?;
    grid.set_initial(initial);

    let mut updates = grid.subscribe();
    print_tasks(&updates.borrow_and_update());

    let shutdown = CancellationToken::new();
    let sync = tokio::spawn({
        let grid = grid.clone();
        let shutdown = shutdown.clone();
        async move { grid.run(shutdown).await }
    });

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                print_tasks(&updates.borrow_and_update());
            }
        }
    }

    shutdown.cancel();
    if let Err(e) = sync.await {
        tracing::error!(error = %e, "Grid sync task failed");
    }

    if let Err(e) = client.sign_out().await {
        tracing::warn!(error = %e, "Sign-out failed");
    }

    Ok(())
}

fn print_tasks(tasks: &[Task]) {
    println!();
    if tasks.is_empty() {
        println!("No logs yet. Add your first work entry.");
        return;
    }

    println!("{:<17} {:<30} {}", "CREATED", "TITLE", "TASK");
    for task in tasks {
        let attachments = match (&task.image_url, &task.excel_url) {
            (Some(_), Some(_)) => " [image, excel]",
            (Some(_), None) => " [image]",
            (None, Some(_)) => " [excel]",
            (None, None) => "",
        };
        println!(
            "{:<17} {:<30} {}{}",
            task.created_at.format("%Y-%m-%d %H:%M"),
            truncate(&task.title, 30),
            task.description.as_deref().unwrap_or_default(),
            attachments,
        );
    }
}

fn truncate(value: &str, width: usize) -> String {
    if value.chars().count() <= width {
        value.to_string()
    } else {
        let head: String = value.chars().take(width - 1).collect();
        format!("{}…", head)
    }
}
