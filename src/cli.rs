use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "vidpress")]
#[command(author, version, about = "Batch video compression with ffmpeg")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compress one or more video files
    Compress {
        /// Compression level: normal, high, very_high or maximum
        #[arg(short, long)]
        level: Option<String>,

        /// ffmpeg threads per file (default: number of CPUs)
        #[arg(short, long)]
        threads: Option<usize>,

        /// Files compressed at the same time
        #[arg(short = 'j', long)]
        concurrency: Option<usize>,

        /// Write output here instead of next to each input
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Video files to compress
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Start the web upload server
    Serve {
        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// List the compression profiles
    Profiles,

    /// Check that ffmpeg is available
    CheckTools,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
