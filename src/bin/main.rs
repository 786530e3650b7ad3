use anyhow::Result;
use clap::Parser;
use relay_rs::{beacon, config, datastore::MemoryDatastore, Config, Service};
use std::sync::Arc;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[clap(author, version, about = "relay connecting block builders to proposers", long_about = None)]
struct Cli {
    #[clap(env = "RELAY_CONFIG_FILE")]
    config_file: Option<String>,
}

fn setup_logging() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging();

    let config: Config = match cli.config_file.as_ref() {
        Some(path) => config::from_toml_file(path)?,
        None => Config::default(),
    };

    let beacon = Arc::new(beacon::Client::new(config.beacon_node_url.parse()?));
    let datastore = Arc::new(MemoryDatastore::default());
    let handle = Service::new(config, beacon, datastore).spawn().await?;

    tokio::select! {
        result = handle.join() => Ok(result?),
        _ = signal::ctrl_c() => {
            tracing::info!("shutting down...");
            Ok(())
        }
    }
}
