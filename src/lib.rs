pub mod cli;
pub mod db;
pub mod error;
pub mod finalize;
pub mod navigation;
pub mod sensing;
pub mod settings;
pub mod tools;
pub mod utils;

use clap::Parser;

use cli::Cli;

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Reads RUST_LOG; MISURA_DEBUG or --verbose raise the floor to debug.
    let level = if cli.verbose || settings::debug_enabled() {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();

    log::info!("misura starting up...");
    cli::dispatch(cli).await
}
