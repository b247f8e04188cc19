use anyhow::Result;
use clap::Parser;
use diataxis_scan::cli::{run, Cli};
use diataxis_scan::telemetry::init_tracing;
use tracing::Level;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment (OPENAI_API_KEY etc.) from .env if present.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.log_json, Level::INFO);
    tracing::info!("CLI arguments parsed, invoking run");

    let result = run(cli).await;
    match &result {
        Ok(_) => tracing::info!("CLI completed successfully"),
        Err(e) => tracing::error!(error = %e, "CLI exited with error"),
    }
    result
}
