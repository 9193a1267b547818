use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "heicforge")]
#[command(author, version, about = "Batch HEIC/HEIF to JPG converter")]
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
    /// Convert files (or every image directly inside a directory)
    Convert {
        /// Files or directories to convert
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Number of conversions to run at once
        #[arg(short = 'j', long)]
        concurrency: Option<usize>,

        /// Directory to write converted files to
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Delegate conversion to a heicforge server at this URL
        #[arg(long)]
        remote: Option<String>,
    },

    /// Watch directories and convert new HEIC/HEIF files as they appear
    Watch {
        /// Directory to watch (repeatable, replaces configured paths)
        #[arg(short, long = "path")]
        paths: Vec<PathBuf>,
    },

    /// Start the HTTP server
    Serve {
        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Write the default configuration to a file
    InitConfig {
        /// Destination (defaults to ./heicforge.toml)
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Display version information
    Version,
}
