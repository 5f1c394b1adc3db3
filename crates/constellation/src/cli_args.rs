//! All the CLI arguments for Constellation

/// Command line arguments.
#[derive(clap::Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
#[non_exhaustive]
pub struct CliArgs {
    /// Use a custom config directory.
    #[arg(long)]
    pub config_dir: Option<std::path::PathBuf>,

    /// Override the target frame rate from the config file.
    #[arg(short, long)]
    pub frame_rate: Option<u32>,

    /// Exit by itself after rendering this many frames.
    #[arg(long)]
    pub max_frames: Option<u64>,

    /// Override the log level from the config file.
    #[arg(long)]
    pub log_level: Option<crate::config::LogLevel>,

    /// Override the log file path from the config file.
    #[arg(long)]
    pub log_path: Option<std::path::PathBuf>,
}
