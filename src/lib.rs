//! synteny-hits - BLAST best-hit and reciprocal best-hit resolution
//!
//! Turns BLAST tabular output into best-hit tables, intersects two directions
//! into reciprocal best hits, and extracts single-hit queries as BED intervals
//! for downstream synteny and linkage-map work.
//!
//! # Modules
//! - `blast`: BLAST `-outfmt 6/7` row parsing with gzip support
//! - `best_hit`: Per-query best-hit selection
//! - `reciprocal`: Reciprocal best-hit intersection
//! - `bed`: Single-hit BED extraction
//! - `cli`: Shared logger setup for the binaries

pub mod blast;
pub mod best_hit;
pub mod reciprocal;
pub mod bed;
pub mod cli;
