//! Reciprocal best hits from two `parse_blast` tables.
//!
//! Usage:
//!   recip_best a_onto_b_best.tab b_onto_a_best.tab recip.tab

use anyhow::Result;
use clap::Parser;
use log::info;
use std::path::PathBuf;
use std::time::Instant;

use synteny_hits::cli::init_logger;
use synteny_hits::reciprocal::{self, DEFAULT_ID_DELIMITER};

#[derive(Parser)]
#[command(name = "recip_best")]
#[command(version)]
#[command(about = "Parses out the reciprocal best hits from two best-hit tables")]
struct Args {
    /// Best hits of genome A aligned onto genome B
    #[arg(value_name = "A_TO_B")]
    a_to_b: PathBuf,

    /// Best hits of genome B aligned onto genome A
    #[arg(value_name = "B_TO_A")]
    b_to_a: PathBuf,

    /// Tab-delimited reciprocal best-hits file
    #[arg(value_name = "OUT_TAB")]
    output: PathBuf,

    /// Separator inside sequence ids
    #[arg(short = 'd', long, value_name = "CHAR", default_value_t = DEFAULT_ID_DELIMITER)]
    delimiter: char,

    #[arg(short = 'v', long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logger(args.verbose);
    let start_time = Instant::now();

    reciprocal::run(&args.a_to_b, &args.b_to_a, &args.output, args.delimiter)?;

    info!("Finished; took {:.2} seconds.", start_time.elapsed().as_secs_f64());
    Ok(())
}
