use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::types::DEFAULT_INPUT;

/// Print the date column of a SAS7BDAT dataset as DDMONYYYY
#[derive(Parser, Debug)]
#[command(name = "sas-dates")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Commands {
    /// Print column 0 of every row as an upper-case date
    Dates {
        /// Input dataset path
        #[arg(short, long, default_value = DEFAULT_INPUT)]
        input: PathBuf,
    },

    /// Describe the file header and columns as JSON
    Schema {
        /// Input dataset path
        #[arg(short, long, default_value = DEFAULT_INPUT)]
        input: PathBuf,

        /// Output JSON file path (stdout if not specified)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

impl Cli {
    /// The command to run; no subcommand prints the default dataset's dates
    pub fn command(self) -> Commands {
        self.command.unwrap_or(Commands::Dates {
            input: PathBuf::from(DEFAULT_INPUT),
        })
    }
}
