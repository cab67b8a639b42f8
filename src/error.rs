//! Error types shared by the lap engine and the session layer.
//!
//! [`LapError`] describes a single bad lap record or a corrupt numeric field
//! found while aggregating. The engine skips the offending record and keeps
//! going; only the `try_*` entry points hand these back to the caller.
//!
//! [`SessionError`] covers caller contract violations (bad year, round or
//! session type) and failures of the session data source.

use thiserror::Error;

/// Problems with an individual lap record.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LapError {
    #[error("lap has no lap number")]
    MissingLapNumber,

    #[error("lap {lap} has no lap time")]
    MissingDuration { lap: u32 },

    #[error("lap {lap} has non-positive lap time {value}")]
    NonPositiveDuration { lap: u32, value: f64 },

    #[error("lap {lap} time {value:.3}s is outside the plausible window {min}-{max}s")]
    OutsidePlausibilityWindow {
        lap: u32,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("lap {lap} has a corrupt {field} value")]
    CorruptField { lap: u32, field: &'static str },
}

/// Errors raised by session lookups and the requests built on them.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("invalid year {year}: must be between {min} and {max}")]
    InvalidYear { year: i32, min: i32, max: i32 },

    #[error("invalid round number {0}: must be between 1 and 30")]
    InvalidRound(u32),

    #[error("invalid session type '{0}': expected one of FP1, FP2, FP3, Q, R")]
    InvalidSessionType(String),

    #[error("at most {max} drivers can be compared, got {requested}")]
    TooManyDrivers { requested: usize, max: usize },

    #[error("session not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Load(#[from] anyhow::Error),
}
