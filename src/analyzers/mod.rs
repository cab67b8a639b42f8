//! Lap aggregation engine.
//!
//! Raw lap rows are normalized (validated, converted, enriched with speed and
//! gear figures), then reduced to per-driver statistics and chart series.
//! `analyzer` ties the pipeline to loaded sessions.

pub mod aggregate;
pub mod analyzer;
pub mod charts;
pub mod format;
pub mod normalize;
pub mod types;
pub mod utility;

#[cfg(test)]
mod testing;
