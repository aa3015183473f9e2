use boundwalk::domain::entities::Format;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::Level;

#[derive(Parser)]
#[command(name = "boundwalk")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Find and extract GIF, PNG and ISO9660 structures in raw images", long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Enable debug output
    #[arg(short, long, global = true)]
    pub debug: bool,

    /// Read through positional file reads instead of a memory map
    #[arg(long, global = true)]
    pub no_mmap: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn log_level(&self) -> Level {
        if self.debug {
            Level::TRACE
        } else if self.verbose {
            Level::DEBUG
        } else {
            Level::INFO
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Carve every recognized structure out of an image
    Scan {
        image: PathBuf,

        /// JSON file with scan options
        #[arg(short, long)]
        config: Option<PathBuf>,

        #[arg(short = 't', long, value_delimiter = ',')]
        types: Option<Vec<String>>,

        /// Block size in MiB for the signature search
        #[arg(short, long)]
        block_size: Option<usize>,

        /// Check candidates on a single thread
        #[arg(long)]
        sequential: bool,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,

        /// Write every finding into this directory
        #[arg(short, long)]
        extract: Option<PathBuf>,
    },

    /// Walk the structure at one offset and print its model
    Inspect {
        image: PathBuf,

        #[arg(short, long, default_value = "0", value_parser = parse_offset)]
        offset: u64,

        /// Force a format instead of identifying it by signature
        #[arg(short = 't', long = "type")]
        format: Option<String>,
    },

    /// List the directory tree of an ISO9660 image
    Tree {
        image: PathBuf,

        /// Offset of the image start inside the file
        #[arg(short, long, default_value = "0", value_parser = parse_offset)]
        offset: u64,

        /// List only this directory instead of the whole tree
        #[arg(short, long)]
        path: Option<String>,
    },

    /// List the registered signatures
    Signatures,
}

pub fn parse_formats(types: Option<Vec<String>>) -> Vec<Format> {
    match types {
        None => vec![],
        Some(type_strs) => type_strs
            .iter()
            .filter_map(|s| match Format::from_name(s) {
                Some(format) => Some(format),
                None => {
                    eprintln!("Warning: Unknown format '{}'", s);
                    None
                }
            })
            .collect(),
    }
}

/// Accepts decimal or `0x`-prefixed hexadecimal offsets
pub fn parse_offset(value: &str) -> Result<u64, String> {
    let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => value.parse(),
    };
    parsed.map_err(|e| format!("invalid offset '{value}': {e}"))
}
