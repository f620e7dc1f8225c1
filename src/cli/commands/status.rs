//! Catalog statistics and health.

use console::style;

use crate::context::AppContext;
use crate::services::monitoring::TimeRange;

use crate::cli::helpers::{format_bytes, format_time, styled_health};

/// Print catalog statistics.
pub async fn cmd_stats(ctx: &AppContext, json: bool) -> anyhow::Result<()> {
    let stats = ctx.ingestion.stats().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("\n{}", style("Catalog Statistics").bold());
    println!("{}", "-".repeat(40));
    println!("{:<20} {}", "Institutions:", stats.total_institutions);
    println!("{:<20} {}", "Courses:", stats.total_courses);
    println!("{:<20} {}", "Last run:", format_time(stats.last_run_at));
    Ok(())
}

/// Take a snapshot and print the health report.
pub async fn cmd_health(ctx: &AppContext, json: bool) -> anyhow::Result<()> {
    let snapshot = ctx.monitor.record_snapshot().await;
    let report = ctx.monitor.health().await;

    if json {
        let value = serde_json::json!({
            "health": report,
            "snapshot": snapshot,
            "stats": ctx.monitor.stats(TimeRange::Day).await,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("\n{}", style("System Health").bold());
    println!("{}", "-".repeat(40));
    println!("{:<20} {}", "Status:", styled_health(report.status));
    if let Some(host) = snapshot.host {
        println!("{:<20} {}", "Host:", host);
    }
    match snapshot.memory {
        Some(memory) => println!(
            "{:<20} {} of {} ({:.1}%)",
            "Memory:",
            format_bytes(memory.used_bytes),
            format_bytes(memory.total_bytes),
            memory.percent()
        ),
        None => println!("{:<20} {}", "Memory:", style("unavailable").dim()),
    }
    println!("{:<20} {:.2}%", "Hourly error rate:", report.hourly_error_rate);
    println!("{:<20} {}", "Active operations:", report.active_operations);

    for issue in &report.issues {
        println!("  {} {}", style("!").yellow(), issue);
    }
    Ok(())
}
