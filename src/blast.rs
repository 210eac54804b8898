//! BLAST Tabular Parser Module
//!
//! Provides parsing for BLAST `-outfmt 6` / `-outfmt 7` tabular output.
//! Comment lines (`#`) written by `-outfmt 7` are skipped.
//!
//! # Tabular Format (first 12 columns)
//! ```text
//! Col  Type    Description
//! 1    string  Query sequence id
//! 2    string  Subject (target) sequence id
//! 3    float   Percent identity
//! 4    int     Alignment length
//! 5    int     Mismatches
//! 6    int     Gap openings
//! 7    int     Query start
//! 8    int     Query end
//! 9    int     Subject start   (alignment start)
//! 10   int     Subject end     (alignment end)
//! 11   float   E-value
//! 12   float   Bit score       (optional here)
//! ```
//!
//! Columns 3 onwards are kept verbatim so a chosen record can be written back
//! exactly as BLAST reported it.
//!
//! # Example Usage
//! ```no_run
//! use synteny_hits::blast::BlastReader;
//!
//! let mut reader = BlastReader::open("hits.tab").unwrap();
//! while let Some(record) = reader.read_next().unwrap() {
//!     println!("{} -> {} (e={:e})", record.query, record.target, record.evalue);
//! }
//! ```

use anyhow::{Context, Result};
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter};
use std::path::Path;
use thiserror::Error;

/// Minimum number of columns a BLAST row must carry.
pub const MIN_FIELDS: usize = 11;

/// Records with an e-value above this are not significant.
pub const DEFAULT_EVALUE_THRESHOLD: f64 = 1e-9;

const COL_ALN_START: usize = 8;
const COL_ALN_END: usize = 9;
const COL_EVALUE: usize = 10;
const COL_BIT_SCORE: usize = 11;

// ============================================================================
// Errors
// ============================================================================

/// Shape or numeric failure on a single BLAST row.
#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    #[error("expected at least {expected} tab-separated fields, found {found}")]
    TooFewFields { expected: usize, found: usize },

    #[error("invalid {column} in column {index}: {value:?}")]
    InvalidNumber {
        column: &'static str,
        index: usize,
        value: String,
    },
}

fn parse_field<T: std::str::FromStr>(
    fields: &[&str],
    idx: usize,
    column: &'static str,
) -> Result<T, ParseError> {
    let raw = fields[idx];
    raw.trim().parse().map_err(|_| ParseError::InvalidNumber {
        column,
        index: idx + 1,
        value: raw.to_string(),
    })
}

// ============================================================================
// Alignment Record
// ============================================================================

/// A single BLAST alignment row.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignmentRecord {
    /// Query sequence id (column 1).
    pub query: String,
    /// Target sequence id (column 2).
    pub target: String,
    /// Alignment start on the target (column 9).
    pub aln_start: i64,
    /// Alignment end on the target (column 10).
    pub aln_end: i64,
    /// E-value (column 11).
    pub evalue: f64,
    /// Bit score (column 12), absent on 11-column rows.
    pub bit_score: Option<f64>,
    /// Raw text of column 3 onwards.
    fields: Vec<String>,
}

impl AlignmentRecord {
    /// Parses a record from a tab-separated line.
    ///
    /// # Errors
    /// Returns a `ParseError` if:
    /// - The line has fewer than 11 fields
    /// - A coordinate or score field is not numeric
    pub fn parse_line(line: &str) -> Result<Self, ParseError> {
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < MIN_FIELDS {
            return Err(ParseError::TooFewFields {
                expected: MIN_FIELDS,
                found: fields.len(),
            });
        }

        let bit_score = if fields.len() > COL_BIT_SCORE {
            Some(parse_field(&fields, COL_BIT_SCORE, "bit score")?)
        } else {
            None
        };

        Ok(Self {
            query: fields[0].to_string(),
            target: fields[1].to_string(),
            aln_start: parse_field(&fields, COL_ALN_START, "alignment start")?,
            aln_end: parse_field(&fields, COL_ALN_END, "alignment end")?,
            evalue: parse_field(&fields, COL_EVALUE, "e-value")?,
            bit_score,
            fields: fields[2..].iter().map(|f| f.to_string()).collect(),
        })
    }

    /// True when the e-value is at or below `threshold`.
    pub fn is_significant(&self, threshold: f64) -> bool {
        self.evalue <= threshold
    }

    /// Columns 3 onwards, as read.
    pub fn trailing_fields(&self) -> &[String] {
        &self.fields
    }

    /// Lower and upper alignment coordinate, whatever the strand.
    pub fn span(&self) -> (i64, i64) {
        (self.aln_start.min(self.aln_end), self.aln_start.max(self.aln_end))
    }

    /// Formats the row back to tab-separated text without a trailing newline.
    pub fn to_row(&self) -> String {
        let mut row = String::with_capacity(
            self.query.len() + self.target.len() + self.fields.len() * 8,
        );
        row.push_str(&self.query);
        row.push('\t');
        row.push_str(&self.target);
        for field in &self.fields {
            row.push('\t');
            row.push_str(field);
        }
        row
    }
}

// ============================================================================
// File helpers
// ============================================================================

/// Opens a text file for buffered reading, decompressing `.gz` files.
pub fn open_input<P: AsRef<Path>>(path: P) -> Result<Box<dyn BufRead>> {
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("Failed to open input: {}", path.display()))?;

    if path.extension().and_then(|e| e.to_str()) == Some("gz") {
        Ok(Box::new(BufReader::with_capacity(
            1024 * 1024,
            MultiGzDecoder::new(file),
        )))
    } else {
        Ok(Box::new(BufReader::with_capacity(1024 * 1024, file)))
    }
}

/// Creates (truncating) an output file behind a buffered writer.
pub fn create_output<P: AsRef<Path>>(path: P) -> Result<BufWriter<File>> {
    let path = path.as_ref();
    let file = File::create(path)
        .with_context(|| format!("Failed to create output: {}", path.display()))?;
    Ok(BufWriter::with_capacity(1024 * 1024, file))
}

// ============================================================================
// BLAST Reader
// ============================================================================

/// Sequential reader for BLAST tabular files.
///
/// Blank lines and `#` comment lines are skipped. Implements Iterator for
/// convenient use in for loops.
pub struct BlastReader<R: BufRead> {
    reader: R,
    line_buf: String,
    line_no: usize,
}

impl BlastReader<Box<dyn BufRead>> {
    /// Opens a BLAST tabular file (plain or `.gz`).
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(open_input(path)?))
    }
}

impl<R: BufRead> BlastReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line_buf: String::with_capacity(512),
            line_no: 0,
        }
    }

    /// Number of lines consumed so far, comments included.
    pub fn line_no(&self) -> usize {
        self.line_no
    }

    /// Reads the next alignment record.
    ///
    /// # Returns
    /// - `Ok(Some(record))` - Successfully read a record
    /// - `Ok(None)` - End of input reached
    /// - `Err(e)` - I/O error, or a `ParseError` tagged with the line number
    pub fn read_next(&mut self) -> Result<Option<AlignmentRecord>> {
        loop {
            self.line_buf.clear();
            if self.reader.read_line(&mut self.line_buf)? == 0 {
                return Ok(None);
            }
            self.line_no += 1;

            let line = self.line_buf.trim_end();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let record = AlignmentRecord::parse_line(line)
                .with_context(|| format!("Malformed BLAST row at line {}", self.line_no))?;
            return Ok(Some(record));
        }
    }
}

impl<R: BufRead> Iterator for BlastReader<R> {
    type Item = Result<AlignmentRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_next().transpose()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};

    const ROW: &str = "query1\tchrA\t98.50\t200\t3\t0\t1\t200\t10\t20\t1e-20\t370";

    #[test]
    fn test_parse_blast_line() {
        let record = AlignmentRecord::parse_line(ROW).unwrap();

        assert_eq!(record.query, "query1");
        assert_eq!(record.target, "chrA");
        assert_eq!(record.aln_start, 10);
        assert_eq!(record.aln_end, 20);
        assert_eq!(record.evalue, 1e-20);
        assert_eq!(record.bit_score, Some(370.0));
        assert_eq!(record.trailing_fields().len(), 10);
        assert_eq!(record.trailing_fields()[0], "98.50");
    }

    #[test]
    fn test_row_written_back_unchanged() {
        let record = AlignmentRecord::parse_line(ROW).unwrap();
        assert_eq!(record.to_row(), ROW);
    }

    #[test]
    fn test_eleven_columns_without_bit_score() {
        let line = "q\tt\t90.0\t50\t0\t0\t1\t50\t100\t149\t0.0";
        let record = AlignmentRecord::parse_line(line).unwrap();
        assert_eq!(record.bit_score, None);
        assert_eq!(record.evalue, 0.0);
    }

    #[test]
    fn test_tolerant_numeric_fields() {
        let line = "q\tt\t90.0\t50\t0\t0\t1\t50\t 100 \t149\t2e-30 \t88.1";
        let record = AlignmentRecord::parse_line(line).unwrap();
        assert_eq!(record.aln_start, 100);
        assert_eq!(record.evalue, 2e-30);
    }

    #[test]
    fn test_too_few_fields() {
        let err = AlignmentRecord::parse_line("incomplete\tline").unwrap_err();
        assert_eq!(err, ParseError::TooFewFields { expected: 11, found: 2 });
    }

    #[test]
    fn test_non_numeric_start() {
        let line = "q\tt\t90.0\t50\t0\t0\t1\t50\tabc\t149\t1e-10";
        let err = AlignmentRecord::parse_line(line).unwrap_err();
        assert!(matches!(
            err,
            ParseError::InvalidNumber { index: 9, column: "alignment start", .. }
        ));
    }

    #[test]
    fn test_significance_threshold_is_inclusive() {
        let mut record = AlignmentRecord::parse_line(ROW).unwrap();
        record.evalue = 1e-9;
        assert!(record.is_significant(DEFAULT_EVALUE_THRESHOLD));
        record.evalue = 1e-5;
        assert!(!record.is_significant(DEFAULT_EVALUE_THRESHOLD));
    }

    #[test]
    fn test_span_orders_reverse_strand() {
        let line = "q\tt\t90.0\t50\t0\t0\t1\t50\t500\t451\t1e-10";
        let record = AlignmentRecord::parse_line(line).unwrap();
        assert_eq!(record.span(), (451, 500));
    }

    #[test]
    fn test_reader_skips_comments_and_blank_lines() {
        let input = format!(
            "# BLASTN 2.2.28+\n# Query: query1\n# 1 hits found\n{}\n\n{}\n",
            ROW, ROW
        );
        let reader = BlastReader::new(Cursor::new(input));
        let records: Vec<_> = reader.collect::<Result<_>>().unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_reader_reports_line_number() {
        let input = format!("{}\nbroken\trow\n", ROW);
        let mut reader = BlastReader::new(Cursor::new(input));
        assert!(reader.read_next().unwrap().is_some());

        let err = reader.read_next().unwrap_err();
        assert!(err.to_string().contains("line 2"));
        assert_eq!(
            err.downcast_ref::<ParseError>(),
            Some(&ParseError::TooFewFields { expected: 11, found: 2 })
        );
    }

    #[test]
    fn test_gz_input_is_decompressed() {
        use flate2::write::GzEncoder;
        use flate2::Compression;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hits.tab.gz");
        let mut encoder = GzEncoder::new(File::create(&path).unwrap(), Compression::default());
        writeln!(encoder, "{}", ROW).unwrap();
        encoder.finish().unwrap();

        let records: Vec<_> = BlastReader::open(&path)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].target, "chrA");
    }
}
