//! BED intervals for queries with a single BLAST hit.
//!
//! Usage:
//!   blast_to_bed blast.outfmt7 markers.bed

use anyhow::Result;
use clap::Parser;
use log::info;
use std::path::PathBuf;
use std::time::Instant;

use synteny_hits::bed;
use synteny_hits::cli::init_logger;

#[derive(Parser)]
#[command(name = "blast_to_bed")]
#[command(version)]
#[command(about = "Converts queries with a single BLAST hit into BED intervals")]
#[command(long_about = r#"
blast_to_bed - BED intervals for single-hit queries

Reads BLAST -outfmt 7 (or 6) output and writes one row per query that has
exactly one hit. Queries with zero or several hits are skipped.

OUTPUT:
  target  min(sstart,send)  max(sstart,send)  query
"#)]
struct Args {
    /// BLAST tabular output (plain or .gz)
    #[arg(value_name = "BLAST_TAB")]
    input: PathBuf,

    /// BED output file
    #[arg(value_name = "OUT_BED")]
    output: PathBuf,

    #[arg(short = 'v', long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logger(args.verbose);
    let start_time = Instant::now();

    bed::run(&args.input, &args.output)?;

    info!("Finished; took {:.2} seconds.", start_time.elapsed().as_secs_f64());
    Ok(())
}
