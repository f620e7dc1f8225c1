//! Target listing.

use console::style;

use crate::config::Config;
use crate::scrapers::CompiledSelectors;

use crate::cli::helpers::truncate;

/// List targets and check that their selectors parse.
pub fn cmd_targets(config: &Config) -> anyhow::Result<()> {
    let targets = config.effective_targets();

    println!("\n{}", style("Ingestion Targets").bold());
    println!("{}", "-".repeat(80));
    println!(
        "{:<28} {:<32} {:<11} Selectors",
        "Name", "URL", "Render"
    );
    println!("{}", "-".repeat(80));

    for target in &targets {
        let check = match CompiledSelectors::compile(&target.selectors) {
            Ok(_) => style(format!("{} ok", target.selectors.entries().len())).green(),
            Err(e) => style(e.to_string()).red(),
        };
        println!(
            "{:<28} {:<32} {:<11} {}",
            truncate(&target.name, 27),
            truncate(&target.base_url, 31),
            target.render_mode.as_str(),
            check
        );
    }

    if targets.iter().any(|t| t.requires_js()) && !cfg!(feature = "browser") {
        println!(
            "\n{} Some targets need JavaScript rendering but the browser feature is disabled",
            style("!").yellow()
        );
    }
    Ok(())
}
