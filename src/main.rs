use anyhow::{Context, Result};
use clap::Parser;

use clickrelay::cli::{Cli, Commands, generate_config};
use clickrelay::config::StaticConfig;
use clickrelay::runtime::modes::run_server;
use clickrelay::system::init_logging;

#[actix_web::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    if let Some(Commands::GenConfig { output_path, force }) = &cli.command {
        if let Err(e) = generate_config(output_path.as_deref(), *force) {
            eprintln!("{}", e.format_colored());
            std::process::exit(1);
        }
        return Ok(());
    }

    let config = match StaticConfig::try_load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e.format_colored());
            std::process::exit(1);
        }
    };

    // guard 必须活到进程结束，否则日志不会刷盘
    let _log_guard = init_logging(&config.logging).context("Failed to initialize logging")?;

    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|e| anyhow::anyhow!("Failed to install rustls crypto provider: {:?}", e))?;

    run_server(&config).await
}
