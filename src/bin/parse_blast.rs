//! Best-hit table from BLAST tabular output.
//!
//! Usage:
//!   parse_blast blast.tab best.tab [-e 1e-9] [-s 42]

use anyhow::Result;
use clap::Parser;
use log::info;
use std::path::PathBuf;
use std::time::Instant;

use synteny_hits::best_hit::{self, ResolverConfig};
use synteny_hits::blast::DEFAULT_EVALUE_THRESHOLD;
use synteny_hits::cli::init_logger;

fn parse_evalue(s: &str) -> Result<f64, String> {
    let val: f64 = s.parse().map_err(|_| format!("Invalid number: {}", s))?;
    if val.is_nan() || val < 0.0 {
        Err(format!("E-value threshold must be non-negative, got {}", val))
    } else {
        Ok(val)
    }
}

#[derive(Parser)]
#[command(name = "parse_blast")]
#[command(version)]
#[command(about = "Parses out the best hit per query from BLAST tabular output")]
#[command(long_about = r#"
parse_blast - best hit per query from BLAST -outfmt 6/7 output

Rows with an e-value above the threshold are dropped. For each remaining
query:
  one target      the lowest-start record wins; exact ties are broken at random
  many targets    the target with the strictly smallest sum of alignment
                  starts wins; tied sums give no best hit

OUTPUT:
  query  target  <columns 3.. of the winning BLAST row>
"#)]
struct Args {
    /// Tab-delimited BLAST output (plain or .gz)
    #[arg(value_name = "BLAST_TAB")]
    input: PathBuf,

    /// Tab-delimited best-hits file
    #[arg(value_name = "OUT_TAB")]
    output: PathBuf,

    #[arg(short = 'e', long, value_name = "FLOAT",
          default_value_t = DEFAULT_EVALUE_THRESHOLD, value_parser = parse_evalue)]
    evalue: f64,

    /// Seed for exact-tie choices; runs are reproducible when set
    #[arg(short = 's', long, value_name = "INT")]
    seed: Option<u64>,

    #[arg(short = 'v', long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logger(args.verbose);
    let start_time = Instant::now();

    let config = ResolverConfig {
        evalue_threshold: args.evalue,
        seed: args.seed,
    };
    best_hit::run(&args.input, &args.output, &config)?;

    info!("Finished; took {:.2} seconds.", start_time.elapsed().as_secs_f64());
    Ok(())
}
