use clap::{Parser as ClapParser, Subcommand};
use std::path::PathBuf;

use qexpand::engine::OverlapMethod;
use qexpand::frontier::SelectionStrategy;

#[derive(ClapParser, Debug)]
#[command(author, version, about = "Iterative related-query expansion", long_about = None)]
pub struct Args {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Expand a seed query into a set of related queries
    Expand {
        /// Seed query to start from
        #[arg(short, long)]
        seed: String,

        /// Number of expansion iterations
        #[arg(short, long)]
        iterations: Option<usize>,

        /// Maximum requests per hour sent to the source
        #[arg(short, long, value_parser = clap::value_parser!(u32).range(1..))]
        rate: Option<u32>,

        /// Scoring method
        #[arg(short, long, value_parser = parse_method)]
        method: Option<OverlapMethod>,

        /// Share of an accepted query's related queries to follow (0..=1)
        #[arg(short, long, value_parser = parse_unit)]
        factor: Option<f64>,

        /// Acceptance threshold for lexical methods (0..=1)
        #[arg(short, long, value_parser = parse_unit)]
        threshold: Option<f64>,

        /// How the followed share is picked
        #[arg(long, value_parser = parse_selection)]
        selection: Option<SelectionStrategy>,

        /// Seed for the shuffle, for reproducible runs
        #[arg(long = "shuffle-seed")]
        shuffle_seed: Option<u64>,

        /// Recorded responses to replay (JSON)
        #[arg(long)]
        source: PathBuf,

        /// Directory for checkpoints and result tables
        #[arg(short, long = "data-dir")]
        data_dir: Option<PathBuf>,

        /// Ignore and remove an existing checkpoint for this seed
        #[arg(long)]
        fresh: bool,
    },

    /// Content similarity between the snippets of two queries
    Kernel {
        /// Recorded responses to read snippets from (JSON)
        #[arg(long)]
        source: PathBuf,

        query_a: String,

        query_b: String,
    },

    /// Clarity score of a query over its recorded snippets
    Clarity {
        /// Recorded responses to read snippets from (JSON)
        #[arg(long)]
        source: PathBuf,

        query: String,
    },

    /// Recall and precision of generated queries against reference sets
    Recall {
        /// Directory with generated queries (one file per seed)
        #[arg(short, long)]
        generated: PathBuf,

        /// Directory with reference queries (one file per seed)
        #[arg(short, long)]
        reference: PathBuf,
    },

    /// Print the resolved configuration as JSON
    Config,
}

fn parse_method(s: &str) -> Result<OverlapMethod, String> {
    s.parse()
}

fn parse_selection(s: &str) -> Result<SelectionStrategy, String> {
    s.parse()
}

fn parse_unit(s: &str) -> Result<f64, String> {
    let value: f64 = s.parse().map_err(|e| format!("{s:?} is not a number: {e}"))?;
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(format!("{value} is outside 0..=1"))
    }
}
