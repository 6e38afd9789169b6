//! Command-line interface definition.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::{ConfigFile, StoveConfig, default_config_path};
use crate::error::{ClientError, ClientResult};

/// stovelink - watch a wood stove over the local network
#[derive(Debug, Parser)]
#[command(name = "stovelink")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Device host name or IP
    #[arg(long, env = "STOVELINK_HOST")]
    pub host: Option<String>,

    /// Device port
    #[arg(long, env = "STOVELINK_PORT")]
    pub port: Option<u16>,

    /// Path to configuration file
    #[arg(long, short, env = "STOVELINK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output JSON instead of text
    #[arg(long)]
    pub json: bool,

    /// Enable debug output
    #[arg(long, short = 'v')]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Stream decoded updates until interrupted
    Watch,

    /// Connect, wait for the first full state poll, print it, exit
    Snapshot,

    /// Print the device identity fields and exit
    Info,
}

impl Cli {
    /// Resolves the effective configuration: defaults, then the config
    /// file, then command-line flags.
    pub fn resolve_config(&self) -> ClientResult<StoveConfig> {
        let file = match &self.config {
            Some(path) => Some(ConfigFile::load(path)?),
            None => match default_config_path() {
                Some(path) if path.exists() => Some(ConfigFile::load(&path)?),
                _ => None,
            },
        };

        let host = self
            .host
            .clone()
            .or_else(|| file.as_ref().and_then(|f| f.host.clone()))
            .ok_or_else(|| {
                ClientError::config("no device host given (use --host or a config file)")
            })?;

        let mut config = StoveConfig::new(host);
        if let Some(file) = &file {
            config = file.apply(config);
        }
        if let Some(port) = self.port {
            config = config.with_port(port);
        }
        Ok(config)
    }
}
