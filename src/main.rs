//! harvest - scheduled course catalog ingestion.
//!
//! Fetches course listings from university websites on a cron schedule,
//! validates them and keeps a local catalog.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (before anything else)
    let _ = dotenvy::dotenv();

    let default_filter = if courseharvest::cli::is_verbose() {
        "courseharvest=debug"
    } else {
        "courseharvest=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    courseharvest::cli::run().await
}
