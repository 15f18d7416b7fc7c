use std::error::Error;

use envconfig::Envconfig;
use tabgrid_storage::{Config, start_server};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    init_log();
    let conf = Config::init_from_env()?;
    let token = CancellationToken::new();
    start_server(&conf, token.clone()).await?;

    if let Err(err) = signal::ctrl_c().await {
        eprintln!("Unable to listen for shutdown signal: {}", err);
    }
    info!("shutting down storage server");
    token.cancel();
    Ok(())
}

fn init_log() {
    use tracing::level_filters::LevelFilter;
    use tracing_subscriber::{
        EnvFilter, layer::SubscriberExt, util::SubscriberInitExt,
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("TABGRID_LOG")
                .from_env_lossy(),
        )
        .init();
}
