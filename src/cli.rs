//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

/// Mirror a course portal folder into a ZIP archive.
///
/// Coursezip lists the folder tree of a course (material or dropbox),
/// downloads every file with your browser session and packages the result
/// as `<root name>.zip`.
#[derive(Parser, Debug)]
#[command(name = "coursezip")]
#[command(author, version, about)]
pub struct Args {
    /// Portal code of the root directory to mirror
    pub root_code: String,

    /// Display name of the root directory; names the archive
    pub root_name: String,

    /// Directory the archive is written to (default: current directory)
    #[arg(short = 'o', long)]
    pub output_dir: Option<PathBuf>,

    /// Netscape cookie export with the portal session (`-` reads stdin)
    #[arg(long)]
    pub cookies: Option<String>,

    /// Maximum concurrent portal requests (1-100, default 10)
    #[arg(short = 'c', long, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub concurrency: Option<u8>,

    /// Config file (default: $XDG_CONFIG_HOME/coursezip/config.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// Do not draw the progress bar
    #[arg(long)]
    pub no_progress: bool,
}

impl Args {
    /// Default tracing level when `RUST_LOG` is unset.
    #[must_use]
    pub fn default_log_level(&self) -> &'static str {
        if self.quiet {
            "error"
        } else {
            match self.verbose {
                0 => "info",
                1 => "debug",
                _ => "trace",
            }
        }
    }
}
