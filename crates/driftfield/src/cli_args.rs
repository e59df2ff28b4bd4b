//! All the CLI arguments for driftfield

/// An ambient field of drifting, connected particles for your terminal
#[derive(clap::Parser, Debug, Clone)]
#[command(version, about, long_about = "driftfield argument description")]
#[non_exhaustive]
pub struct CliArgs {
    /// Path to a TOML config file.
    #[arg(short, long)]
    pub config: Option<std::path::PathBuf>,

    /// Override the log level from the config file.
    #[arg(long)]
    pub log_level: Option<crate::config::LogLevel>,

    /// Override the log file location from the config file.
    #[arg(long)]
    pub log_path: Option<std::path::PathBuf>,

    /// Override the target frame rate.
    #[arg(long)]
    pub frame_rate: Option<u32>,

    /// Don't animate anything. The same as setting `DRIFTFIELD_REDUCED_MOTION`.
    #[arg(long)]
    pub reduced_motion: bool,
}
