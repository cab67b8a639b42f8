//! Decoders for session JSON, season schedules and lap CSV exports.
//!
//! Every entry point accepts plain or gzip-compressed bytes.

use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use std::borrow::Cow;
use std::io::Read;

use crate::analyzers::types::RawLap;
use crate::session::{ScheduleRow, SessionData};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Inflates `bytes` when they start with the gzip magic number.
pub fn decompress(bytes: &[u8]) -> Result<Cow<'_, [u8]>> {
    if !bytes.starts_with(&GZIP_MAGIC) {
        return Ok(Cow::Borrowed(bytes));
    }
    let mut out = Vec::new();
    GzDecoder::new(bytes)
        .read_to_end(&mut out)
        .context("decompressing gzip data")?;
    Ok(Cow::Owned(out))
}

/// Decodes a session document.
///
/// # Errors
///
/// Returns an error if the bytes are not valid (optionally gzipped) session JSON.
pub fn parse_session(bytes: &[u8]) -> Result<SessionData> {
    let bytes = decompress(bytes)?;
    serde_json::from_slice(&bytes).context("parsing session JSON")
}

/// Decodes a season schedule: a JSON array of event rows.
pub fn parse_schedule(bytes: &[u8]) -> Result<Vec<ScheduleRow>> {
    let bytes = decompress(bytes)?;
    serde_json::from_slice(&bytes).context("parsing schedule JSON")
}

/// Decodes a lap table exported as CSV with the usual column names
/// (`DriverNumber`, `LapNumber`, `LapTime`, ...). Unknown columns are ignored.
pub fn parse_laps_csv(bytes: &[u8]) -> Result<Vec<RawLap>> {
    let bytes = decompress(bytes)?;
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(bytes.as_ref());

    let mut laps = Vec::new();
    for (row, result) in reader.deserialize().enumerate() {
        let lap: RawLap =
            result.with_context(|| format!("parsing lap CSV row {}", row + 1))?;
        laps.push(lap);
    }
    Ok(laps)
}

/// Decodes either a session document or a lap CSV, judged by the first
/// non-blank byte. A lap CSV is wrapped in a session with no metadata.
pub fn parse_lap_source(bytes: &[u8]) -> Result<SessionData> {
    let bytes = decompress(bytes)?;
    let first = bytes.iter().find(|b| !b.is_ascii_whitespace());
    match first {
        Some(b'{') => parse_session(&bytes),
        Some(b'[') => {
            let laps: Vec<RawLap> =
                serde_json::from_slice(&bytes).context("parsing lap JSON array")?;
            Ok(SessionData {
                laps,
                ..Default::default()
            })
        }
        _ => Ok(SessionData {
            laps: parse_laps_csv(&bytes)?,
            ..Default::default()
        }),
    }
}
