//! Long-running scheduler process.

use console::style;
use tokio::sync::oneshot;
use tracing::info;

use crate::context::AppContext;

/// Register the default jobs and take periodic snapshots until Ctrl-C.
pub async fn cmd_daemon(ctx: &AppContext) -> anyhow::Result<()> {
    let registered = ctx.register_default_jobs().await;
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let snapshots = ctx.monitor.clone().spawn_snapshot_loop(shutdown_rx);

    println!(
        "{} Scheduler running with {} jobs (Ctrl-C to stop)",
        style("→").cyan(),
        registered
    );
    for job in ctx.scheduler.job_statuses().await {
        info!(job = %job.name, schedule = %job.schedule, enabled = job.enabled, "Job registered");
    }

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");

    ctx.scheduler.stop_all_jobs().await;
    let _ = shutdown_tx.send(());
    let _ = snapshots.await;

    println!("{} Scheduler stopped", style("✓").green());
    Ok(())
}
