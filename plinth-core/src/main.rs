use std::path::PathBuf;

use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use plinth_core::host::{Host, HostOptions};
use plinth_core::paths;

#[derive(Parser)]
#[command(name = "plinth-core")]
#[command(about = "plinth core process - dual-store backend behind the UI bridge")]
struct Args {
    /// Data directory for both stores (overrides packaged/dev resolution)
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Run in development mode (data lives next to the working tree)
    #[arg(long)]
    dev: bool,

    /// Boundary-channel queue capacity
    #[arg(long, default_value_t = 64)]
    queue_capacity: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("plinth_core=info".parse()?))
        .init();

    let args = Args::parse();
    let data_dir = paths::resolve_data_dir(args.dev, args.data_dir);
    info!(data_dir = %data_dir.display(), dev = args.dev, "starting plinth core");

    let mut options = HostOptions::new(data_dir);
    options.queue_capacity = args.queue_capacity;
    let host = Host::start(options).await?;

    // The bridge client would be handed to the embedding UI shell here;
    // headless runs just hold it open until a signal arrives.
    let ctrl_c = signal::ctrl_c();
    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = sigterm.recv() => info!("Received SIGTERM"),
    }

    host.shutdown().await;
    Ok(())
}
