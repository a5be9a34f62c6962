//! Queue commands: process-queue, enqueue, stop-queue.

use colored::Colorize;
use sluice_queue::{
    Dispatcher, DispatcherConfig, ExitReason, KillSentinel, MessageStore, QueueError,
};
use std::sync::Arc;
use std::time::Duration;

use crate::error::{CliError, CliResult};
use crate::runtime::Runtime;

/// Flags accepted by `process-queue`.
#[derive(Debug, Clone, Default)]
pub struct ProcessOptions {
    pub queue: Option<String>,
    pub max_executions: Option<u64>,
    pub sleep_ms: Option<u64>,
}

/// Run the dispatcher until the execution cap or the kill-sentinel.
pub async fn process(rt: &Runtime, options: ProcessOptions) -> CliResult<()> {
    let settings = &rt.config.queue;
    let mut config = DispatcherConfig::new(&rt.config.runtime_dir)
        .with_lock_file(settings.lock_file.as_str())
        .with_kill_file(settings.kill_file.as_str())
        .with_max_executions(options.max_executions.unwrap_or(settings.max_executions))
        .with_sleep_interval(
            options
                .sleep_ms
                .map(Duration::from_millis)
                .unwrap_or_else(|| rt.config.sleep_interval()),
        );
    if let Some(queue) = options.queue.or_else(|| settings.name.clone()) {
        config = config.with_queue(queue);
    }

    let store = rt.message_store().await?;
    let registry = rt.workers()?;
    let queue_label = config.queue_name.clone().unwrap_or_else(|| "*".to_string());

    println!(
        "  {} processing queue {} ({} workers, lock {})",
        "▶".bright_cyan(),
        queue_label.cyan().bold(),
        registry.len(),
        config.lock_path().display()
    );

    let mut dispatcher = Dispatcher::new(store, Arc::new(registry), rt.logger.child("queue"), config);
    let reason = dispatcher.run().await?;
    let stats = dispatcher.stats();

    let why = match reason {
        ExitReason::ExecutionCap => "execution cap reached",
        ExitReason::KillSentinel => "kill sentinel",
    };
    println!(
        "  {} stopped ({}): {} processed, {} ok, {} ko, {} unresolved, {} failed",
        "■".green(),
        why,
        stats.processed,
        stats.ended_ok.to_string().green(),
        stats.ended_ko.to_string().yellow(),
        stats.unresolved,
        stats.failed
    );
    Ok(())
}

/// Persist one message.
pub async fn enqueue(rt: &Runtime, queue: &str, worker: &str, payload: &str) -> CliResult<()> {
    let payload = serde_json::from_str(payload)
        .map_err(|e| CliError::InvalidArgument(format!("payload is not valid JSON: {}", e)))?;

    let store = rt.message_store().await?;
    let message = store.enqueue(queue, worker, payload).await?;
    let pending = store.count_pending(Some(queue)).await?;

    println!(
        "  {} enqueued message {} on {} for {} ({} pending)",
        "✓".green(),
        message.id.to_string().bold(),
        queue.cyan(),
        worker,
        pending
    );
    Ok(())
}

/// Ask a running dispatcher to stop at its next tick.
pub fn stop(rt: &Runtime) -> CliResult<()> {
    let sentinel = KillSentinel::new(rt.config.kill_path());
    sentinel.signal().map_err(QueueError::from)?;
    println!(
        "  {} kill sentinel written to {}",
        "✓".green(),
        sentinel.path().display()
    );
    Ok(())
}
