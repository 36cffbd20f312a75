//! Command-line and environment configuration.

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "inkshare-server",
    about = "Real-time relay for shared InkShare canvases",
    version
)]
pub struct Config {
    #[arg(
        long,
        env = "INKSHARE_BIND",
        default_value = "0.0.0.0:5000",
        help = "Address to listen on"
    )]
    pub bind: SocketAddr,

    #[arg(
        long,
        env = "SECRET_KEY",
        hide_env_values = true,
        help = "Shared secret used to verify participant tokens"
    )]
    pub secret: String,

    #[arg(
        long = "data-dir",
        value_name = "PATH",
        env = "INKSHARE_DATA_DIR",
        help = "Directory holding session files (defaults to the platform data dir)"
    )]
    pub data_dir: Option<PathBuf>,

    #[arg(
        long = "flush-interval-secs",
        env = "INKSHARE_FLUSH_INTERVAL_SECS",
        default_value_t = 0,
        help = "Re-persist sessions whose last write failed every N seconds (0 disables)"
    )]
    pub flush_interval_secs: u64,
}

impl Config {
    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval_secs)
    }
}
