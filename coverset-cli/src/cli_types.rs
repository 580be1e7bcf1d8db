//! CLI type definitions: command enums and argument structs.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "coverset")]
#[command(about = "Collect album cover art from the Spotify catalog into a resumable dataset", long_about = None)]
pub(crate) struct Cli {
    /// Only show warnings and errors (suppress normal output)
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Enable verbose/debug logging (timestamps + debug-level messages)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Crawl genres, artists and albums, downloading covers as it goes.
    ///
    /// Resumes from the checkpoint in the output directory when one exists.
    Crawl {
        /// Text file with one genre per line ('#' starts a comment)
        #[arg(short, long)]
        genres: PathBuf,

        /// Output directory (defaults to the configured one, then ./coverset-data)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Stop cleanly after this many work units
        #[arg(short, long)]
        limit: Option<u64>,

        /// Discard the checkpoint and dataset table and start over (covers are kept)
        #[arg(long)]
        restart: bool,

        /// Don't write crawl-log.txt
        #[arg(long)]
        no_log: bool,
    },

    /// Show the progress recorded in an output directory's checkpoint
    Status {
        /// Output directory (defaults to the configured one, then ./coverset-data)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// List every skipped entity instead of the first few
        #[arg(long)]
        all: bool,
    },

    /// Manage settings and credentials
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Show the settings file and where each credential comes from
    Show,

    /// Request an access token to check the configured credentials
    Test,

    /// Print the settings file path
    Path,

    /// Set (or clear) the default output directory
    SetOutput {
        /// New default output directory; omit to clear it
        dir: Option<PathBuf>,
    },
}
