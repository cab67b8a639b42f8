//! Session lookup: keys, loaded session data, data sources and the
//! in-memory session cache.
//!
//! A session is identified by season, round and [`SessionType`]. Sources
//! ([`FileSource`], [`HttpSource`]) load a [`SessionData`] for a key and the
//! [`SessionCache`] keeps the most recently used ones in memory.

pub mod cache;
pub mod data;
pub mod source;

pub use cache::{CacheStats, SessionCache};
pub use data::{DriverInfo, DriverResult, EventInfo, ScheduleRow, SessionData};
pub use source::{FileSource, HttpSource, SessionSource};

use chrono::Datelike;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::SessionError;

/// First season with lap-level timing data.
pub const FIRST_SEASON: i32 = 2018;

pub const MAX_ROUND: u32 = 30;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionType {
    FP1,
    FP2,
    FP3,
    Q,
    #[default]
    R,
}

impl SessionType {
    pub const ALL: [SessionType; 5] = [
        SessionType::FP1,
        SessionType::FP2,
        SessionType::FP3,
        SessionType::Q,
        SessionType::R,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionType::FP1 => "FP1",
            SessionType::FP2 => "FP2",
            SessionType::FP3 => "FP3",
            SessionType::Q => "Q",
            SessionType::R => "R",
        }
    }
}

impl fmt::Display for SessionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionType {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| SessionError::InvalidSessionType(s.to_string()))
    }
}

/// Identifies one session of one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SessionKey {
    pub year: i32,
    pub round: u32,
    pub session_type: SessionType,
}

impl SessionKey {
    pub fn new(year: i32, round: u32, session_type: SessionType) -> Self {
        Self {
            year,
            round,
            session_type,
        }
    }

    /// Checks the year against `FIRST_SEASON..=current year + 1` and the
    /// round against `1..=MAX_ROUND`.
    pub fn validate(&self) -> Result<(), SessionError> {
        self.validate_for(current_year())
    }

    fn validate_for(&self, current_year: i32) -> Result<(), SessionError> {
        validate_year_for(self.year, current_year)?;
        if !(1..=MAX_ROUND).contains(&self.round) {
            return Err(SessionError::InvalidRound(self.round));
        }
        Ok(())
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}", self.year, self.round, self.session_type)
    }
}

pub fn validate_year(year: i32) -> Result<(), SessionError> {
    validate_year_for(year, current_year())
}

fn validate_year_for(year: i32, current_year: i32) -> Result<(), SessionError> {
    let max = current_year + 1;
    if year < FIRST_SEASON || year > max {
        return Err(SessionError::InvalidYear {
            year,
            min: FIRST_SEASON,
            max,
        });
    }
    Ok(())
}

/// Seasons with data, oldest first.
pub fn available_seasons() -> Vec<i32> {
    (FIRST_SEASON..=current_year()).collect()
}

fn current_year() -> i32 {
    chrono::Utc::now().year()
}
