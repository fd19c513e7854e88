use std::sync::Arc;

use cadence_task::Scheduler;
use color_eyre::{eyre::eyre, Result};
use tracing::info;

use crate::{config::Config, notify::TerminalDispatcher, storage};

/// Run the scheduler in the foreground until Ctrl-C.
pub async fn run(config: &Config) -> Result<()> {
    let store = storage::open_task_store(config).await?;
    let dispatcher = Arc::new(TerminalDispatcher::new(config.alarms.desktop_notifications));
    let handle = Scheduler::new(store, dispatcher, config.alarms.scheduler_settings()).spawn();

    println!("Cadence is running. Press Ctrl-C to stop.");
    tokio::signal::ctrl_c().await?;
    info!("shutdown requested");
    handle.stop().await.map_err(|e| eyre!(e.to_string()))
}
