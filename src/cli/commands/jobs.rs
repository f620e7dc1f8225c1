//! Job listing and manual runs.

use console::style;

use crate::context::AppContext;

use crate::cli::helpers::format_time;

/// List the default jobs.
pub async fn cmd_jobs(ctx: &AppContext) -> anyhow::Result<()> {
    ctx.register_default_jobs().await;
    let jobs = ctx.scheduler.job_statuses().await;

    println!("\n{}", style("Scheduled Jobs").bold());
    println!("{}", "-".repeat(76));
    println!(
        "{:<32} {:<14} {:<8} Next Run",
        "Name", "Schedule", "Enabled"
    );
    println!("{}", "-".repeat(76));

    for job in jobs {
        let enabled = if job.enabled {
            style("yes").green()
        } else {
            style("no").dim()
        };
        println!(
            "{:<32} {:<14} {:<8} {}",
            job.name,
            job.schedule,
            enabled,
            format_time(job.next_run)
        );
    }

    ctx.scheduler.stop_all_jobs().await;
    Ok(())
}

/// Run one job immediately.
pub async fn cmd_run_job(ctx: &AppContext, name: &str) -> anyhow::Result<()> {
    ctx.register_default_jobs().await;
    ctx.scheduler.stop_all_jobs().await;

    if ctx.scheduler.job_status(name).await.is_none() {
        println!("{} Job '{}' not found", style("✗").red(), name);
        return Ok(());
    }

    println!("{} Running job {}", style("→").cyan(), style(name).bold());
    if ctx.scheduler.run_job(name).await {
        println!("{} Job {} completed", style("✓").green(), name);
    } else {
        println!("{} Job {} failed (see log)", style("✗").red(), name);
    }
    Ok(())
}
