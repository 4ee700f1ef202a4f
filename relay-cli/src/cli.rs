use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub const DEFAULT_CONFIG_PATH: &str = "hlsrelay.toml";

#[derive(Parser, Debug)]
#[command(
    name = "hlsrelay",
    version,
    about = "Relay an adaptive HLS stream with an overlay to UDP, multicast or RTMP",
    long_about = None
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Enable debug logging
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Also write daily rotated log files into this directory
    #[arg(long, global = true, env = "HLSRELAY_LOG_DIR")]
    pub log_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run the relay (default)
    Run {
        /// Configuration file; defaults are used when it does not exist
        #[arg(short, long, default_value = DEFAULT_CONFIG_PATH, env = "HLSRELAY_CONFIG")]
        config: PathBuf,

        /// Override the input URL
        #[arg(short, long)]
        url: Option<String>,

        /// Override the ingest strategy (manual, semi-auto, full-auto)
        #[arg(short, long)]
        strategy: Option<String>,

        /// Build the graph in memory and print it instead of relaying
        #[arg(long)]
        dry_run: bool,
    },

    /// Fetch a master playlist and list its variants
    Variants {
        /// Master playlist URL
        url: String,

        /// Also look up these exact resolutions (e.g. 1280x720)
        #[arg(short, long = "resolution", value_name = "WxH")]
        resolutions: Vec<String>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,

        /// Request timeout in seconds
        #[arg(long, default_value_t = 30)]
        timeout: u64,
    },

    /// Write a configuration file with every default filled in
    InitConfig {
        #[arg(default_value = DEFAULT_CONFIG_PATH)]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

impl Default for Commands {
    fn default() -> Self {
        Self::Run {
            config: PathBuf::from(DEFAULT_CONFIG_PATH),
            url: None,
            strategy: None,
            dry_run: false,
        }
    }
}
