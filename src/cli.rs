use clap::Parser;
use std::path::PathBuf;

/// Default port of the singleton service.
pub const DEFAULT_PORT: u16 = 8398;

#[derive(Parser, Debug)]
#[command(name = "graveyard")]
#[command(author, about = "Personal douban archive backup service")]
#[command(version, disable_version_flag = true)]
pub struct Cli {
    /// Print version information
    #[arg(short = 'v', long = "version", action = clap::ArgAction::Version)]
    version: Option<bool>,

    /// Port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Path to the archive database
    #[arg(short = 's', long, default_value = "var/data/graveyard.db")]
    pub database: PathBuf,

    /// Directory for cached attachment files
    #[arg(short, long, default_value = "var/cache")]
    pub cache_dir: PathBuf,

    /// Directory for log files (stderr only when omitted)
    #[arg(short, long)]
    pub log_dir: Option<PathBuf>,

    /// Print debug information
    #[arg(short, long)]
    pub debug: bool,
}
