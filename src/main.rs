mod cli;
mod crawl;

use anyhow::{Context, Result};
use clap::Parser;

use crawler_core::AppConfig;

use crate::cli::Cli;
use crate::crawl::run_crawl;

// mimalloc keeps memory flat across a long crawl; glibc's allocator is slow
// to release pages back under sustained small-allocation churn.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn main() -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start tokio runtime")?;

    runtime.block_on(async_main())
}

async fn async_main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config = AppConfig::load(&cli.config_file)
        .with_context(|| format!("failed to load config file {}", cli.config_file))?;

    run_crawl(config, cli.restart).await?;

    Ok(())
}
