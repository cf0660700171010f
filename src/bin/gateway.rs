use anyhow::Result;
use gardisto::cli;

// Main function
#[tokio::main]
async fn main() -> Result<()> {
    let action = cli::start::gateway()?;

    let result = action.execute().await;

    cli::telemetry::shutdown_tracer();

    result
}
