//! Cron commands: run-cron, cron-add, cron-list, heartbeat.

use chrono::TimeDelta;
use colored::Colorize;
use mockable::DefaultClock;
use sluice_cron::{CronExpression, CronLogStore, CronScheduler, CronTask, CronTaskStore};
use std::sync::Arc;

use crate::error::{CliError, CliResult};
use crate::runtime::Runtime;

async fn scheduler(rt: &Runtime) -> CliResult<(CronScheduler, Arc<sluice_cron::SqliteCronStore>)> {
    let (messages, cron) = rt.stores().await?;
    let callables = rt.callables(messages);
    let scheduler = CronScheduler::new(
        cron.clone(),
        cron.clone(),
        Arc::new(callables),
        Arc::new(DefaultClock),
        rt.logger.child("cron"),
    );
    Ok((scheduler, cron))
}

/// Exactly one scheduler tick.
pub async fn run(rt: &Runtime) -> CliResult<()> {
    let (scheduler, _) = scheduler(rt).await?;
    let report = scheduler.tick().await?;

    if report.executed.is_empty() {
        println!(
            "  {} {} task(s) evaluated, nothing due",
            "·".dimmed(),
            report.evaluated
        );
    } else {
        println!(
            "  {} ran {}",
            "✓".green(),
            report.executed.join(", ").bold()
        );
    }
    for failure in &report.failures {
        println!(
            "  {} {} ({}): {}",
            "✗".red(),
            failure.title.bold(),
            failure.kind,
            failure.error
        );
    }
    Ok(())
}

pub async fn add(
    rt: &Runtime,
    title: &str,
    schedule: &str,
    callable: &str,
    inactive: bool,
) -> CliResult<()> {
    CronExpression::parse(schedule)?;

    let (messages, cron) = rt.stores().await?;
    if !rt.callables(messages).contains(callable) {
        println!(
            "  {} no callable named {} is registered; the task will fail until one is",
            "⚠".yellow(),
            callable.yellow()
        );
    }

    let mut task = CronTask::new(title, schedule, callable);
    if inactive {
        task = task.inactive();
    }
    let task = cron.add(task).await?;

    println!(
        "  {} added task {} ({}) {} -> {}",
        "✓".green(),
        task.id,
        task.title.bold(),
        schedule.cyan(),
        task.callable_ref
    );
    Ok(())
}

pub async fn list(rt: &Runtime) -> CliResult<()> {
    let (_, cron) = rt.stores().await?;
    let tasks = cron.list().await?;

    if tasks.is_empty() {
        println!("  {} no cron tasks defined", "·".dimmed());
    }
    for task in &tasks {
        let state = if task.active {
            "active".green()
        } else {
            "inactive".dimmed()
        };
        println!(
            "  {:>4}  {:<24} {:<16} {:<28} {}",
            task.id,
            task.title,
            task.schedule_expression.as_deref().unwrap_or("-"),
            task.callable_ref,
            state
        );
    }

    if let Some(log) = cron.latest().await? {
        println!();
        println!(
            "  {} last run {} ({:.3}s): {}",
            "Log:".bright_white().bold(),
            log.run_time.to_rfc3339(),
            log.duration,
            log.tasks_executed
        );
    }
    Ok(())
}

/// Fails when the latest run log is older than `max_age_secs` or absent.
pub async fn heartbeat(rt: &Runtime, max_age_secs: u64) -> CliResult<()> {
    let max_age = i64::try_from(max_age_secs)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .ok_or_else(|| CliError::InvalidArgument(format!("max age {}s is too large", max_age_secs)))?;

    let (scheduler, _) = scheduler(rt).await?;
    let status = scheduler.heartbeat_status(max_age).await?;
    if !status.is_alive() {
        return Err(CliError::Unhealthy(status.to_string()));
    }

    println!("  {} heartbeat {}", "✓".green(), status);
    Ok(())
}
