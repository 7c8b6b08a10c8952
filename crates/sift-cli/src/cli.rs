use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "sift")]
#[command(about = "Classify survey spreadsheets with a chat model", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Config file to use instead of the default location
    #[arg(long, global = true, env = "SIFT_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a classification task over one column of a spreadsheet
    Classify(ClassifyArgs),

    /// List the columns of a spreadsheet
    Columns {
        /// Spreadsheet (.xlsx or .csv)
        file: PathBuf,
    },

    /// List the available classification tasks
    Tasks,

    /// Join the new columns of EXTRA onto BASE by index
    Combine {
        base: PathBuf,
        extra: PathBuf,
    },

    /// Stack several spreadsheets into one
    Concat {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Split a spreadsheet into one file per value of a column
    Divide {
        file: PathBuf,

        /// Column whose values pick the output file
        #[arg(long, default_value = "date")]
        by: String,
    },

    /// Inspect or empty the response cache
    #[command(subcommand)]
    Cache(CacheCommands),

    /// Write the default config file
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Args)]
pub struct ClassifyArgs {
    /// Spreadsheet (.xlsx or .csv)
    pub file: PathBuf,

    /// Column holding the free-text answers
    #[arg(long, short = 'c')]
    pub column: String,

    /// Task id, e.g. create_category (see `sift tasks`)
    #[arg(long, short = 't')]
    pub task: String,

    /// Column the labels are written to (default depends on the task)
    #[arg(long, short = 'o')]
    pub output: Option<String>,
}

#[derive(Subcommand)]
pub enum CacheCommands {
    /// Print the cache directory
    Path,

    /// Delete every cached response
    Clear,
}
