//! Output formatting and persistence for reports.
//!
//! Supports pretty-printing, JSON to stdout or file (optionally gzipped),
//! and CSV append.

use anyhow::{Context, Result};
use flate2::Compression;
use flate2::write::GzEncoder;
use serde::Serialize;
use tracing::{debug, info};

use csv::WriterBuilder;
use std::fmt::Debug;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

/// Logs a value using Rust's debug pretty-print format.
pub fn print_pretty<T: Debug>(value: &T) {
    debug!("{:#?}", value);
}

/// Writes a value to stdout as pretty-printed JSON.
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    serde_json::to_writer_pretty(&mut out, value)?;
    writeln!(out)?;
    Ok(())
}

/// Writes a value to `path` as pretty-printed JSON, gzip-compressed when
/// `gzip` is set. Parent directories are created as needed.
pub fn write_json<T: Serialize>(path: &Path, value: &T, gzip: bool) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let writer = BufWriter::new(file);

    if gzip {
        let mut encoder = GzEncoder::new(writer, Compression::default());
        serde_json::to_writer_pretty(&mut encoder, value)?;
        encoder.finish()?.flush()?;
    } else {
        let mut writer = writer;
        serde_json::to_writer_pretty(&mut writer, value)?;
        writer.flush()?;
    }

    info!(path = %path.display(), gzip, "Report written");
    Ok(())
}

/// Appends a record as a row to a CSV file.
///
/// Creates the file with headers if it does not already exist.
pub fn append_record<T: Serialize>(path: &Path, record: &T) -> Result<()> {
    append_records(path, std::slice::from_ref(record))
}

/// Appends several records, writing the header only for a new file.
pub fn append_records<T: Serialize>(path: &Path, records: &[T]) -> Result<()> {
    let file_exists = path.exists();
    debug!(path = %path.display(), file_exists, rows = records.len(), "Appending CSV records");

    let file = OpenOptions::new()
        .append(true)
        .create(true)
        .open(path)
        .with_context(|| format!("opening {}", path.display()))?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists) // IMPORTANT when appending
        .from_writer(file);

    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::types::LapStatistics;
    use crate::stats::DriverSummary;
    use flate2::read::GzDecoder;
    use std::fs;
    use std::io::Read;

    #[test]
    fn test_print_pretty_does_not_panic() {
        print_pretty(&LapStatistics::empty());
    }

    #[test]
    fn test_print_json_does_not_panic() {
        print_json(&LapStatistics::empty()).unwrap();
    }

    #[test]
    fn test_write_json_plain_and_gzip() {
        let dir = tempfile::tempdir().unwrap();
        let plain = dir.path().join("reports/driver.json");
        let zipped = dir.path().join("reports/driver.json.gz");
        let stats = LapStatistics::empty();

        write_json(&plain, &stats, false).unwrap();
        write_json(&zipped, &stats, true).unwrap();

        let text = fs::read_to_string(&plain).unwrap();
        let mut inflated = String::new();
        GzDecoder::new(File::open(&zipped).unwrap())
            .read_to_string(&mut inflated)
            .unwrap();
        assert_eq!(text, inflated);

        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["best_lap_time_formatted"], "N/A");
        assert!(value["gap_to_theoretical"].is_null());
    }

    #[test]
    fn test_append_record_writes_header_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("drivers.csv");

        let row = DriverSummary::from_statistics("44", &LapStatistics::empty());
        append_record(&path, &row).unwrap();
        append_records(&path, &[row.clone(), row]).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let header_count = content.lines().filter(|l| l.contains("timestamp")).count();
        assert_eq!(header_count, 1);
        // 1 header + 3 data rows
        assert_eq!(content.lines().count(), 4);
    }
}
