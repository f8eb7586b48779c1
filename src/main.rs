//! neo4j-manager - operational tooling for a containerized Neo4j with APOC

use clap::Parser;
use tracing_subscriber::EnvFilter;

use neo4j_manager::cli::App;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let app = App::parse();

    // Initialize logging; RUST_LOG overrides the default level
    let level = if app.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = app.run().await {
        tracing::error!("{:#}", e);
        std::process::exit(1);
    }
    Ok(())
}
