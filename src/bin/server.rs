use clap::Parser;
use metric_keeper::{
    config::{Config, StorageArgs, read_config_file},
    storage::select_backend,
    util::termination_signal,
};
use tracing::{info, level_filters::LevelFilter, trace, warn};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Parser)]
struct Args {
    /// Config file (JSON); flags and environment variables override its values
    #[arg(short = 'c', long, env = "CONFIG")]
    config: Option<String>,

    #[command(flatten)]
    storage: StorageArgs,
}

fn init() {
    let filter = filter::Targets::new().with_targets(vec![
        ("metric_keeper", LevelFilter::DEBUG),
        ("keeper_server", LevelFilter::TRACE),
    ]);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init();
    let args = Args::parse();
    trace!("started with args: {args:?}");

    let mut config = match &args.config {
        Some(path) => read_config_file(path)?,
        None => Config::default(),
    };
    args.storage.apply(&mut config.storage);

    let selected = select_backend(&config.storage).await;

    match selected.store.get_stats().await {
        Ok(stats) => info!("{} storage ready: {stats}", selected.kind),
        Err(e) => warn!("{} storage ready, stats unavailable: {e}", selected.kind),
    }

    termination_signal().await;
    info!("shutting down");

    selected.shutdown().await;

    Ok(())
}
