//! Best-Hit Resolution Module
//!
//! Loads significant BLAST rows into a `query → target → records` table and
//! picks at most one representative alignment per query.
//!
//! # Selection rules
//! ```text
//! one target,  one record      → that record
//! one target,  many records    → record tie-break
//! many targets                 → target with the strictly smallest sum of
//!                                alignment starts, then record tie-break;
//!                                tied sums give no winner
//! ```
//!
//! # Record tie-break (records stable-sorted by alignment start)
//! ```text
//! L0.start != L1.start          → L0
//! L0.end   >  L1.end            → L0
//! L0.end   <  L1.end            → L0
//! all records share L0.start    → uniform random choice
//! otherwise                     → no winner
//! ```

use anyhow::{Context, Result};
use log::{debug, info};
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;
use std::io::{BufRead, Write};
use std::path::Path;

use crate::blast::{self, AlignmentRecord, BlastReader, DEFAULT_EVALUE_THRESHOLD};

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Rows with an e-value above this are dropped while loading.
    pub evalue_threshold: f64,

    /// Seed for the exact-tie random choice. `None` seeds from the OS.
    pub seed: Option<u64>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            evalue_threshold: DEFAULT_EVALUE_THRESHOLD,
            seed: None,
        }
    }
}

impl ResolverConfig {
    pub fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        }
    }
}

// ============================================================================
// Hit Table
// ============================================================================

/// Records grouped by query, then by target.
///
/// Both levels are ordered so output and target tie order are stable.
#[derive(Debug, Default)]
pub struct HitTable {
    queries: BTreeMap<String, BTreeMap<String, Vec<AlignmentRecord>>>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LoadStats {
    pub kept: usize,
    pub dropped: usize,
}

impl HitTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, record: AlignmentRecord) {
        self.queries
            .entry(record.query.clone())
            .or_default()
            .entry(record.target.clone())
            .or_default()
            .push(record);
    }

    /// Reads every row, keeping only those at or below `evalue_threshold`.
    ///
    /// A malformed row aborts the load.
    pub fn load<R: BufRead>(
        reader: BlastReader<R>,
        evalue_threshold: f64,
    ) -> Result<(Self, LoadStats)> {
        let mut table = Self::new();
        let mut stats = LoadStats::default();

        for record in reader {
            let record = record?;
            if record.is_significant(evalue_threshold) {
                table.insert(record);
                stats.kept += 1;
            } else {
                stats.dropped += 1;
            }
        }

        Ok((table, stats))
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }

    pub fn targets(&self, query: &str) -> Option<&BTreeMap<String, Vec<AlignmentRecord>>> {
        self.queries.get(query)
    }

    pub fn iter(
        &self,
    ) -> impl Iterator<Item = (&String, &BTreeMap<String, Vec<AlignmentRecord>>)> {
        self.queries.iter()
    }
}

// ============================================================================
// Resolution
// ============================================================================

/// The chosen alignment for one query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BestHit<'a> {
    pub query: &'a str,
    pub target: &'a str,
    pub record: &'a AlignmentRecord,
}

impl BestHit<'_> {
    /// `query<TAB>target<TAB><trailing fields>`.
    pub fn to_row(&self) -> String {
        let mut row = format!("{}\t{}", self.query, self.target);
        for field in self.record.trailing_fields() {
            row.push('\t');
            row.push_str(field);
        }
        row
    }
}

/// Why a query produced no winner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ambiguity {
    NoRecords,
    TiedTargets,
    TiedRecords,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Outcome<'a> {
    Hit(BestHit<'a>),
    Ambiguous(Ambiguity),
}

impl<'a> Outcome<'a> {
    pub fn hit(self) -> Option<BestHit<'a>> {
        match self {
            Outcome::Hit(hit) => Some(hit),
            Outcome::Ambiguous(_) => None,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ResolveStats {
    pub resolved: usize,
    pub tied_targets: usize,
    pub tied_records: usize,
}

/// Picks one alignment per query. The random source is only consulted on
/// exact ties.
pub struct BestHitResolver<R: Rng> {
    rng: R,
}

impl<R: Rng> BestHitResolver<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    /// Resolves a single query's target groups.
    pub fn resolve_query<'a>(
        &mut self,
        query: &'a str,
        targets: &'a BTreeMap<String, Vec<AlignmentRecord>>,
    ) -> Outcome<'a> {
        let (target, records) = match targets.len() {
            0 => return Outcome::Ambiguous(Ambiguity::NoRecords),
            1 => match targets.iter().next() {
                Some(entry) => entry,
                None => return Outcome::Ambiguous(Ambiguity::NoRecords),
            },
            _ => match best_target(targets) {
                Some(entry) => entry,
                None => return Outcome::Ambiguous(Ambiguity::TiedTargets),
            },
        };

        match self.pick_record(records) {
            Some(record) => Outcome::Hit(BestHit {
                query,
                target: target.as_str(),
                record,
            }),
            None if records.is_empty() => Outcome::Ambiguous(Ambiguity::NoRecords),
            None => Outcome::Ambiguous(Ambiguity::TiedRecords),
        }
    }

    /// Resolves every query in the table, in query order.
    pub fn resolve_table<'a>(
        &mut self,
        table: &'a HitTable,
    ) -> (Vec<BestHit<'a>>, ResolveStats) {
        let mut hits = Vec::with_capacity(table.len());
        let mut stats = ResolveStats::default();

        for (query, targets) in table.iter() {
            match self.resolve_query(query, targets) {
                Outcome::Hit(hit) => {
                    stats.resolved += 1;
                    hits.push(hit);
                }
                Outcome::Ambiguous(reason) => {
                    debug!("No best hit for {}: {:?}", query, reason);
                    match reason {
                        Ambiguity::TiedTargets => stats.tied_targets += 1,
                        Ambiguity::TiedRecords => stats.tied_records += 1,
                        Ambiguity::NoRecords => {}
                    }
                }
            }
        }

        (hits, stats)
    }

    /// Record tie-break within a single target.
    #[allow(clippy::if_same_then_else)]
    fn pick_record<'a>(
        &mut self,
        records: &'a [AlignmentRecord],
    ) -> Option<&'a AlignmentRecord> {
        match records {
            [] => None,
            [only] => Some(only),
            _ => {
                let mut sorted: Vec<&AlignmentRecord> = records.iter().collect();
                sorted.sort_by_key(|r| r.aln_start);
                let (first, second) = (sorted[0], sorted[1]);

                if first.aln_start != second.aln_start {
                    Some(first)
                } else if first.aln_end > second.aln_end {
                    Some(first)
                } else if first.aln_end < second.aln_end {
                    Some(first)
                } else if sorted.iter().all(|r| r.aln_start == first.aln_start) {
                    sorted.choose(&mut self.rng).copied()
                } else {
                    None
                }
            }
        }
    }
}

/// Target whose alignment starts sum strictly lowest, or `None` on a tie.
///
/// Sums are widened to `i128` so no run of `i64` starts can overflow.
fn best_target(
    targets: &BTreeMap<String, Vec<AlignmentRecord>>,
) -> Option<(&String, &Vec<AlignmentRecord>)> {
    let mut sums: Vec<(&String, &Vec<AlignmentRecord>, i128)> = targets
        .iter()
        .map(|(target, records)| {
            let sum: i128 = records.iter().map(|r| i128::from(r.aln_start)).sum();
            (target, records, sum)
        })
        .collect();
    sums.sort_by_key(|&(_, _, sum)| sum);

    match sums.as_slice() {
        [(target, records, _)] => Some((*target, *records)),
        [(target, records, best), (_, _, runner_up), ..] if best < runner_up => {
            Some((*target, *records))
        }
        _ => None,
    }
}

// ============================================================================
// Driver
// ============================================================================

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BestHitSummary {
    pub load: LoadStats,
    pub queries: usize,
    pub resolve: ResolveStats,
}

/// Loads, resolves and writes one row per resolved query.
pub fn write_best_hits<R: BufRead, W: Write, G: Rng>(
    reader: BlastReader<R>,
    out: &mut W,
    evalue_threshold: f64,
    resolver: &mut BestHitResolver<G>,
) -> Result<BestHitSummary> {
    let (table, load) = HitTable::load(reader, evalue_threshold)?;
    write_resolved(&table, load, out, resolver)
}

/// Resolves an already loaded table and writes its best hits.
fn write_resolved<W: Write, G: Rng>(
    table: &HitTable,
    load: LoadStats,
    out: &mut W,
    resolver: &mut BestHitResolver<G>,
) -> Result<BestHitSummary> {
    debug!(
        "Loaded {} significant rows ({} dropped) for {} queries",
        load.kept,
        load.dropped,
        table.len()
    );

    let (hits, resolve) = resolver.resolve_table(table);
    for hit in &hits {
        writeln!(out, "{}", hit.to_row())?;
    }
    out.flush()?;

    Ok(BestHitSummary {
        load,
        queries: table.len(),
        resolve,
    })
}

/// File-level entry point used by the `parse_blast` binary.
pub fn run(input: &Path, output: &Path, config: &ResolverConfig) -> Result<BestHitSummary> {
    let reader = BlastReader::open(input)?;
    let (table, load) = HitTable::load(reader, config.evalue_threshold)
        .with_context(|| format!("Failed to load BLAST hits from {}", input.display()))?;

    // The output is only touched once the whole input has parsed.
    let mut out = blast::create_output(output)?;
    let mut resolver = BestHitResolver::new(config.rng());
    let summary = write_resolved(&table, load, &mut out, &mut resolver)?;

    info!("Number of best hits: {}", summary.resolve.resolved);
    Ok(summary)
}

// ============================================================================
// Tests
// ============================================================================
