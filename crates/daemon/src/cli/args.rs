pub use clap::Parser;

use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "shush")]
#[command(about = "Encrypted peer-to-peer file and link sharing")]
pub struct Args {
    /// Path to the shush config directory (defaults to ~/.shush)
    #[arg(long, global = true)]
    pub config_path: Option<PathBuf>,

    #[command(subcommand)]
    pub command: crate::Command,
}
