//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

use libgen_core::SearchColumn;

/// Search Library Genesis and download books from the first working mirror.
///
/// Without a query you are prompted for one. Results are listed for
/// selection, then the book is saved as `<title>_<author>.<ext>`.
#[derive(Parser, Debug)]
#[command(name = "libgen")]
#[command(author, version, about)]
pub struct Args {
    /// Search query (prompted for when omitted)
    pub query: Option<String>,

    /// Catalog column to search in
    #[arg(short = 'i', long = "in", id = "inside", value_enum, default_value_t = SearchColumn::Title)]
    pub column: SearchColumn,

    /// Directory to save into (overrides `savePath` as the prompt default)
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Path to config.json (default: $XDG_CONFIG_HOME/libgen/config.json)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}
