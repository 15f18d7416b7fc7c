use clap::Parser;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{
    EnvFilter, layer::SubscriberExt, util::SubscriberInitExt,
};

use tabgrid_cli::TabgridCli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_log();
    let cli = TabgridCli::parse();
    tabgrid_cli::run(cli).await
}

fn init_log() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::WARN.into())
                .with_env_var("TABGRID_LOG")
                .from_env_lossy(),
        )
        .init();
}
