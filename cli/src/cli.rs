use chrono::NaiveDate;
use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[clap(name = "goldwatch", version)]
pub struct Cli {
    /// Emit JSON logs
    #[clap(long)]
    pub json_logs: bool,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List the candidate contract months for a date
    Candidates {
        /// Trading date (YYYY-MM-DD); defaults to today
        #[clap(long)]
        date: Option<NaiveDate>,

        /// Also fetch a live snapshot for every candidate
        #[clap(long)]
        with_data: bool,
    },

    /// Show the stored active contract
    Show {
        /// Refresh first when the stored contract is stale or missing
        #[clap(long)]
        ensure_fresh: bool,
    },

    /// Run one selection cycle now and persist the result
    Refresh,

    /// Rule-based reading of the active contract's live quote
    Analyze,
}
