//! Reciprocal Best-Hit Filter
//!
//! Intersects two best-hit tables produced by `parse_blast`: one for genome A
//! aligned onto genome B and one for B aligned onto A. A pair survives only
//! when each side is the other's best hit.
//!
//! B-side query ids follow the `<chromosome>_<rest>` naming convention, so the
//! partner a B→A row must find among the A→B targets is its query id up to the
//! first delimiter. The A-side id is written out split on the same delimiter:
//!
//! ```text
//! A→B best hit : sc12_3400       Chr01          ...
//! B→A best hit : Chr01_100_400   sc12_3400      ...
//! output       : Chr01           sc12   3400
//! ```

use anyhow::{Context, Result};
use log::{debug, info};
use rustc_hash::{FxHashMap, FxHashSet};
use std::io::{BufRead, Write};
use std::path::Path;

use crate::blast::{self, ParseError};

pub const DEFAULT_ID_DELIMITER: char = '_';

/// Query and target ids of a best-hit row.
fn split_ids(line: &str) -> Result<(&str, &str), ParseError> {
    let mut fields = line.split('\t');
    match (fields.next(), fields.next()) {
        (Some(query), Some(target)) => Ok((query, target)),
        _ => Err(ParseError::TooFewFields {
            expected: 2,
            found: 1,
        }),
    }
}

/// Calls `f` with the ids of every non-empty, non-comment row.
fn for_each_pair<R: BufRead>(reader: R, mut f: impl FnMut(&str, &str)) -> Result<()> {
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim_end();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (query, target) = split_ids(line)
            .with_context(|| format!("Malformed best-hit row at line {}", idx + 1))?;
        f(query, target);
    }
    Ok(())
}

// ============================================================================
// Partner Index
// ============================================================================

/// Query → set of best-hit targets for one alignment direction.
#[derive(Debug, Default)]
pub struct PartnerIndex {
    partners: FxHashMap<String, FxHashSet<String>>,
}

impl PartnerIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, query: &str, target: &str) {
        self.partners
            .entry(query.to_string())
            .or_default()
            .insert(target.to_string());
    }

    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut index = Self::new();
        for_each_pair(reader, |query, target| index.insert(query, target))?;
        Ok(index)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        Self::from_reader(blast::open_input(path)?)
            .with_context(|| format!("Failed to load best hits: {}", path.display()))
    }

    /// True when `target` is recorded as a best hit of `query`.
    pub fn contains(&self, query: &str, target: &str) -> bool {
        self.partners
            .get(query)
            .is_some_and(|targets| targets.contains(target))
    }

    pub fn len(&self) -> usize {
        self.partners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.partners.is_empty()
    }
}

// ============================================================================
// Reciprocal Filter
// ============================================================================

/// A pair confirmed in both directions.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReciprocalPair {
    pub query_id: String,
    pub target_id: String,
}

impl ReciprocalPair {
    /// `query_id<TAB>` followed by `target_id` split on `delimiter`.
    pub fn to_row(&self, delimiter: char) -> String {
        let mut row = self.query_id.clone();
        for part in self.target_id.split(delimiter) {
            row.push('\t');
            row.push_str(part);
        }
        row
    }
}

pub struct ReciprocalFilter {
    a_to_b: PartnerIndex,
    delimiter: char,
}

impl ReciprocalFilter {
    pub fn new(a_to_b: PartnerIndex, delimiter: char) -> Self {
        Self { a_to_b, delimiter }
    }

    /// Returns the confirmed pair for one B→A row, if any.
    pub fn check(&self, query: &str, target: &str) -> Option<ReciprocalPair> {
        let partner = identifier_prefix(query, self.delimiter);
        self.a_to_b.contains(target, partner).then(|| ReciprocalPair {
            query_id: partner.to_string(),
            target_id: target.to_string(),
        })
    }

    /// Streams B→A rows and collects confirmed pairs in input order, each once.
    pub fn filter<R: BufRead>(&self, b_to_a: R) -> Result<Vec<ReciprocalPair>> {
        let mut seen = FxHashSet::default();
        let mut pairs = Vec::new();

        for_each_pair(b_to_a, |query, target| {
            if let Some(pair) = self.check(query, target) {
                if seen.insert(pair.clone()) {
                    pairs.push(pair);
                }
            } else {
                debug!("{} -> {} is not reciprocal", query, target);
            }
        })?;

        Ok(pairs)
    }

    pub fn write_pairs<W: Write>(&self, pairs: &[ReciprocalPair], out: &mut W) -> Result<()> {
        for pair in pairs {
            writeln!(out, "{}", pair.to_row(self.delimiter))?;
        }
        out.flush()?;
        Ok(())
    }
}

/// Text before the first `delimiter`, or the whole id.
pub fn identifier_prefix(id: &str, delimiter: char) -> &str {
    id.split(delimiter).next().unwrap_or(id)
}

/// File-level entry point used by the `recip_best` binary.
pub fn run(a_to_b: &Path, b_to_a: &Path, output: &Path, delimiter: char) -> Result<usize> {
    let index = PartnerIndex::load(a_to_b)?;
    debug!("Loaded {} A-side queries from {}", index.len(), a_to_b.display());

    let filter = ReciprocalFilter::new(index, delimiter);
    let pairs = filter
        .filter(blast::open_input(b_to_a)?)
        .with_context(|| format!("Failed to read best hits: {}", b_to_a.display()))?;

    let mut out = blast::create_output(output)?;
    filter.write_pairs(&pairs, &mut out)?;

    info!("Number of best hits: {}", pairs.len());
    Ok(pairs.len())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const A_TO_B: &str = "sc12_3400\tChr01\t99.0\t300\n\
                          sc40_900\tChr05\t98.0\t400\n";

    fn filter() -> ReciprocalFilter {
        let index = PartnerIndex::from_reader(Cursor::new(A_TO_B)).unwrap();
        ReciprocalFilter::new(index, DEFAULT_ID_DELIMITER)
    }

    #[test]
    fn test_identifier_prefix() {
        assert_eq!(identifier_prefix("Chr01_100_400", '_'), "Chr01");
        assert_eq!(identifier_prefix("Chr01", '_'), "Chr01");
        assert_eq!(identifier_prefix("", '_'), "");
    }

    #[test]
    fn test_partner_index_contains() {
        let index = PartnerIndex::from_reader(Cursor::new(A_TO_B)).unwrap();
        assert_eq!(index.len(), 2);
        assert!(index.contains("sc12_3400", "Chr01"));
        assert!(!index.contains("sc12_3400", "Chr05"));
        assert!(!index.contains("sc99", "Chr01"));
    }

    #[test]
    fn test_agreeing_pair_is_kept_once() {
        let b_to_a = "Chr01_100_400\tsc12_3400\t99.0\n\
                      Chr01_900_1200\tsc12_3400\t97.0\n";
        let pairs = filter().filter(Cursor::new(b_to_a)).unwrap();

        assert_eq!(
            pairs,
            vec![ReciprocalPair {
                query_id: "Chr01".to_string(),
                target_id: "sc12_3400".to_string(),
            }]
        );
    }

    #[test]
    fn test_disagreeing_direction_is_dropped() {
        // sc12_3400's best hit is on Chr01, not Chr02.
        let b_to_a = "Chr02_1_50\tsc12_3400\t99.0\n";
        let pairs = filter().filter(Cursor::new(b_to_a)).unwrap();
        assert!(pairs.is_empty());
    }

    #[test]
    fn test_unknown_target_is_dropped() {
        assert!(filter().check("Chr05_1_50", "sc99_1").is_none());
    }

    #[test]
    fn test_row_splits_target_id() {
        let pair = ReciprocalPair {
            query_id: "Chr01".to_string(),
            target_id: "sc12_3400".to_string(),
        };
        assert_eq!(pair.to_row('_'), "Chr01\tsc12\t3400");
    }

    #[test]
    fn test_single_column_row_is_an_error() {
        let err = PartnerIndex::from_reader(Cursor::new("sc12_3400\n")).unwrap_err();
        assert!(err.to_string().contains("line 1"));
    }

    #[test]
    fn test_run_writes_pairs() {
        let dir = tempfile::tempdir().unwrap();
        let a_to_b = dir.path().join("a_b.tab");
        let b_to_a = dir.path().join("b_a.tab");
        let out = dir.path().join("recip.tab");
        std::fs::write(&a_to_b, A_TO_B).unwrap();
        std::fs::write(
            &b_to_a,
            "Chr05_10_80\tsc40_900\t99.0\nChr03_1_9\tsc12_3400\t99.0\n",
        )
        .unwrap();

        let n = run(&a_to_b, &b_to_a, &out, DEFAULT_ID_DELIMITER).unwrap();

        assert_eq!(n, 1);
        assert_eq!(std::fs::read_to_string(&out).unwrap(), "Chr05\tsc40\t900\n");
    }
}
