//! Single-hit BED extraction.
//!
//! Walks BLAST tabular output query by query and writes a BED interval for
//! every query with exactly one hit. Queries with no hits or several hits are
//! skipped; no e-value filtering is applied here.

use anyhow::{Context, Result};
use log::info;
use std::io::{BufRead, Write};
use std::path::Path;

use crate::blast::{self, AlignmentRecord, BlastReader};

/// `target<TAB>min<TAB>max<TAB>query`. Coordinates are written as BLAST
/// reported them.
pub fn bed_row(record: &AlignmentRecord) -> String {
    let (lo, hi) = record.span();
    format!("{}\t{}\t{}\t{}", record.target, lo, hi, record.query)
}

/// Writes one BED row per single-hit query, returning the number written.
///
/// Rows for the same query must be contiguous, as BLAST writes them.
pub fn write_single_hits<R: BufRead, W: Write>(
    reader: BlastReader<R>,
    out: &mut W,
) -> Result<usize> {
    let mut written = 0;
    let mut group: Vec<AlignmentRecord> = Vec::new();

    let mut emit = |group: &mut Vec<AlignmentRecord>, out: &mut W| -> Result<()> {
        if let [only] = group.as_slice() {
            writeln!(out, "{}", bed_row(only))?;
            written += 1;
        }
        group.clear();
        Ok(())
    };

    for record in reader {
        let record = record?;
        if group.first().is_some_and(|r| r.query != record.query) {
            emit(&mut group, &mut *out)?;
        }
        group.push(record);
    }
    emit(&mut group, &mut *out)?;

    out.flush()?;
    Ok(written)
}

/// File-level entry point used by the `blast_to_bed` binary.
pub fn run(input: &Path, output: &Path) -> Result<usize> {
    let reader = BlastReader::open(input)?;
    let mut out = blast::create_output(output)?;
    let written = write_single_hits(reader, &mut out)
        .with_context(|| format!("Failed to extract single hits from {}", input.display()))?;

    info!("Number of single-hit queries: {}", written);
    Ok(written)
}
