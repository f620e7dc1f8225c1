//! Foreground ingestion.

use console::style;

use crate::context::AppContext;

use crate::cli::helpers::{format_time, truncate};

/// Run one full pass and print per-target counts.
pub async fn cmd_ingest(ctx: &AppContext) -> anyhow::Result<()> {
    let targets = ctx.ingestion.targets().len();
    println!(
        "{} Ingesting {} targets",
        style("→").cyan(),
        style(targets).bold()
    );

    let report = ctx.ingestion.run_full_ingestion().await;

    println!("\n{}", style("Ingestion Results").bold());
    println!("{}", "-".repeat(72));
    println!(
        "{:<28} {:>9} {:>6} {:>6} {:>8} {:>7}",
        "Target", "Extracted", "Saved", "Dupes", "Invalid", "Failed"
    );
    println!("{}", "-".repeat(72));

    for t in &report.targets {
        println!(
            "{:<28} {:>9} {:>6} {:>6} {:>8} {:>7}",
            truncate(&t.target, 27),
            t.extracted,
            t.saved,
            t.duplicates,
            t.invalid,
            t.failed
        );
        if let Some(ref error) = t.error {
            println!("  {} {}", style("✗").red(), error);
        }
    }

    let stats = ctx.ingestion.stats().await?;
    println!(
        "\n{} Saved {} courses ({} targets failed)",
        style("✓").green(),
        report.total_saved(),
        report.failed_targets()
    );
    println!(
        "  Catalog: {} institutions, {} courses (last run {})",
        stats.total_institutions,
        stats.total_courses,
        format_time(stats.last_run_at)
    );
    Ok(())
}
