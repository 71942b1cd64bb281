use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::decision::{KeepPolicy, NamePolicy};
use crate::selection::Selection;

#[derive(Parser, Debug)]
#[command(name = "similar-images", version)]
#[command(about = "Finds and removes visually similar images")]
pub struct Cli {
    /// Directory holding the perceptual hash cache [default: per-user cache dir]
    #[arg(long, global = true, value_name = "DIR")]
    pub app_cache_dir: Option<PathBuf>,

    /// Configuration file [default: <config dir>/similar-images/config.toml]
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Write a directory of symlinks showing each set of similar images
    Preview(PreviewArgs),
    /// Show what dedup actions would be taken
    Show(ShowArgs),
    /// Perform the actions listed by "show"
    Dedup(DedupArgs),
}

#[derive(Args, Debug)]
pub struct ScanArgs {
    /// Directories to search, earlier ones take precedence
    #[arg(required = true, value_name = "DIR")]
    pub dirs: Vec<PathBuf>,

    /// Don't draw progress bars
    #[arg(short = 'n', long)]
    pub no_progress_bar: bool,

    /// Number of hashing threads (default: number of CPU cores)
    #[arg(short, long)]
    pub threads: Option<usize>,
}

#[derive(Args, Debug)]
pub struct PreviewArgs {
    /// Directory to create
    #[arg(short, long, value_name = "DIR")]
    pub preview_dir: PathBuf,

    /// Remove and recreate an existing preview directory. Be careful
    #[arg(short, long)]
    pub force: bool,

    #[command(flatten)]
    pub scan: ScanArgs,
}

#[derive(Args, Debug)]
pub struct DedupArgs {
    /// Which image to keep. "best" is largest by both bytes and pixels; sets
    /// where those disagree are reported and left alone
    #[arg(long, value_enum)]
    pub keep_by: Option<KeepPolicy>,

    /// Where the kept image ends up. "first" moves it over the first image of
    /// the set, handy when the first directory has the better names
    #[arg(long, value_enum)]
    pub name_by: Option<NamePolicy>,

    /// "obvious" for all obvious sets, or comma-separated set numbers such as
    /// "5,7,11". Default: all sets
    #[arg(long, value_name = "SETS")]
    pub dups: Option<Selection>,

    #[command(flatten)]
    pub scan: ScanArgs,
}

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Print a JSON report instead of shell commands
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub dedup: DedupArgs,
}
