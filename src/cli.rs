//! Command-line interface definitions using clap

use std::path::Path;

use clap::{Parser, Subcommand};

use crate::config::{DEFAULT_CONFIG_PATH, StaticConfig};
use crate::errors::{ClickRelayError, Result};

/// clickrelay - click id issuing and messenger attribution service
#[derive(Parser, Debug)]
#[command(name = "clickrelay")]
#[command(version)]
#[command(about = "Click id issuing and messenger attribution service", long_about = None)]
pub struct Cli {
    /// Path to the TOML config file (missing file = env vars and defaults only)
    #[arg(long, short = 'c', global = true, default_value = DEFAULT_CONFIG_PATH)]
    pub config: String,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Start the HTTP server (default)
    Serve,

    /// Generate example configuration file
    GenConfig {
        /// Output path (default: stdout)
        output_path: Option<String>,

        /// Force overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// 输出示例配置到 stdout 或文件
pub fn generate_config(output_path: Option<&str>, force: bool) -> Result<()> {
    let content = StaticConfig::generate_sample_config();
    let Some(path) = output_path else {
        println!("{}", content);
        return Ok(());
    };

    if Path::new(path).exists() && !force {
        return Err(ClickRelayError::file_operation(format!(
            "'{}' already exists, use --force to overwrite",
            path
        )));
    }
    std::fs::write(path, content)?;
    println!("Sample configuration written to {}", path);
    Ok(())
}
