//! ---
//! fhm_section: "03-persistence-logging"
//! fhm_subsection: "module"
//! fhm_type: "source"
//! fhm_scope: "code"
//! fhm_description: "Persistence abstractions and storage bindings."
//! fhm_version: "v0.0.0-prealpha"
//! fhm_owner: "tbd"
//! ---
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::Digest;
use tracing::debug;

use r_fhm_telemetry::FuelSample;

use crate::{PersistenceError, Result};

/// Format version stamped into the log header.
pub const LOG_VERSION: u16 = 1;

/// Telemetry log file header stored as the first line of the file.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TelemetryLogHeader {
    version: u16,
    created_at: DateTime<Utc>,
    hash: String,
}

impl TelemetryLogHeader {
    fn new() -> Self {
        let created_at = Utc::now();
        let hash = format!(
            "{:x}",
            sha2::Sha256::digest(created_at.to_rfc3339().as_bytes())
        );
        Self {
            version: LOG_VERSION,
            created_at,
            hash,
        }
    }
}

/// Timestamp ordering for historical queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOrder {
    /// Oldest record first.
    Ascending,
    /// Newest record first.
    Descending,
}

/// Append-only JSONL store of enriched telemetry records.
///
/// Appends go through an internal mutex so the streaming loop and
/// request handlers can share one instance; queries open their own
/// reader and never block writers.
#[derive(Debug)]
pub struct TelemetryLog {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl TelemetryLog {
    /// Open a log for appending, writing a header if the file is new.
    ///
    /// Existing content must start with a header this version can read;
    /// a file that begins with anything else is refused so a record is
    /// never mistaken for the header.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let fresh = !path.exists() || is_empty(path)?;
        if !fresh {
            validate_header(path)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let mut writer = BufWriter::new(file);

        if fresh {
            let header = TelemetryLogHeader::new();
            let line = serde_json::to_string(&header)?;
            writer.write_all(line.as_bytes())?;
            writer.write_all(b"\n")?;
            writer.flush()?;
            debug!(path = %path.display(), "telemetry log created");
        }

        Ok(Self {
            path: path.to_path_buf(),
            writer: Mutex::new(writer),
        })
    }

    /// Append one record and flush it to disk.
    pub fn append(&self, sample: &FuelSample) -> Result<()> {
        let line = serde_json::to_string(sample)?;
        let mut writer = self.writer.lock();
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }

    /// Every record in append order.
    pub fn all(&self) -> Result<Vec<FuelSample>> {
        let file = File::open(&self.path)?;
        let reader = BufReader::new(file);
        let mut samples = Vec::new();
        for line in reader.lines().skip(1) {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            samples.push(serde_json::from_str(&line)?);
        }
        Ok(samples)
    }

    /// Number of stored records.
    pub fn len(&self) -> Result<usize> {
        Ok(self.all()?.len())
    }

    /// Whether the log holds no records yet.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// The newest `limit` records, newest first.
    pub fn recent(&self, limit: usize) -> Result<Vec<FuelSample>> {
        let mut samples = self.all()?;
        samples.sort_by_key(|sample| std::cmp::Reverse(sample.timestamp));
        samples.truncate(limit);
        Ok(samples)
    }

    /// Records flagged anomalous, ordered as requested and limited.
    pub fn anomalies(&self, order: ScanOrder, limit: usize) -> Result<Vec<FuelSample>> {
        let mut samples: Vec<FuelSample> = self
            .all()?
            .into_iter()
            .filter(FuelSample::is_anomalous)
            .collect();
        match order {
            ScanOrder::Ascending => samples.sort_by_key(|sample| sample.timestamp),
            ScanOrder::Descending => {
                samples.sort_by_key(|sample| std::cmp::Reverse(sample.timestamp))
            }
        }
        samples.truncate(limit);
        Ok(samples)
    }

    /// Anomalous records with `start <= timestamp < end`, in append order.
    pub fn anomalies_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<FuelSample>> {
        Ok(self
            .all()?
            .into_iter()
            .filter(FuelSample::is_anomalous)
            .filter(|sample| sample.timestamp >= start && sample.timestamp < end)
            .collect())
    }

    /// The most recent anomalous record, if any.
    pub fn latest_anomaly(&self) -> Result<Option<FuelSample>> {
        Ok(self.anomalies(ScanOrder::Descending, 1)?.into_iter().next())
    }

    /// Path of the backing file (useful for tests).
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn is_empty(path: &Path) -> Result<bool> {
    Ok(fs::metadata(path)?.len() == 0)
}

fn validate_header(path: &Path) -> Result<()> {
    let mut first = String::new();
    BufReader::new(File::open(path)?).read_line(&mut first)?;
    let header: TelemetryLogHeader = serde_json::from_str(first.trim())
        .map_err(|_| PersistenceError::MalformedHeader(path.display().to_string()))?;
    if header.version != LOG_VERSION {
        return Err(PersistenceError::MalformedHeader(path.display().to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn sample_at(day: u32, anomalous: bool) -> FuelSample {
        let mut sample = FuelSample::raw(2000 + day, 20.0, 4.4, 30.0, 3.0);
        sample.timestamp = Utc.with_ymd_and_hms(2024, 3, day, 8, 0, 0).unwrap();
        if anomalous {
            sample.anomaly = Some(true);
            sample.score = Some(-0.02);
            sample.probable_cause = Some("Anomaly detected, cause unknown".to_owned());
        } else {
            sample.anomaly = Some(false);
            sample.score = Some(0.05);
        }
        sample
    }

    #[test]
    fn append_then_read_back_in_order() {
        let dir = tempdir().unwrap();
        let log = TelemetryLog::open(&dir.path().join("telemetry.jsonl")).unwrap();

        log.append(&sample_at(1, false)).unwrap();
        log.append(&sample_at(2, true)).unwrap();
        log.append(&sample_at(3, false)).unwrap();

        let all = log.all().unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].rpm, 2001);
        assert_eq!(all[2].rpm, 2003);
    }

    #[test]
    fn reopening_appends_after_existing_records() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("telemetry.jsonl");
        {
            let log = TelemetryLog::open(&path).unwrap();
            log.append(&sample_at(1, false)).unwrap();
        }
        let log = TelemetryLog::open(&path).unwrap();
        log.append(&sample_at(2, false)).unwrap();
        assert_eq!(log.len().unwrap(), 2);
    }

    #[test]
    fn recent_returns_newest_first() {
        let dir = tempdir().unwrap();
        let log = TelemetryLog::open(&dir.path().join("telemetry.jsonl")).unwrap();
        for day in 1..=5 {
            log.append(&sample_at(day, false)).unwrap();
        }

        let recent = log.recent(2).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].rpm, 2005);
        assert_eq!(recent[1].rpm, 2004);
    }

    #[test]
    fn anomaly_queries_filter_and_order() {
        let dir = tempdir().unwrap();
        let log = TelemetryLog::open(&dir.path().join("telemetry.jsonl")).unwrap();
        log.append(&sample_at(1, true)).unwrap();
        log.append(&sample_at(2, false)).unwrap();
        log.append(&sample_at(3, true)).unwrap();
        log.append(&sample_at(4, true)).unwrap();

        let ascending = log.anomalies(ScanOrder::Ascending, 10).unwrap();
        assert_eq!(
            ascending.iter().map(|s| s.rpm).collect::<Vec<_>>(),
            vec![2001, 2003, 2004]
        );

        let descending = log.anomalies(ScanOrder::Descending, 2).unwrap();
        assert_eq!(
            descending.iter().map(|s| s.rpm).collect::<Vec<_>>(),
            vec![2004, 2003]
        );

        let latest = log.latest_anomaly().unwrap().unwrap();
        assert_eq!(latest.rpm, 2004);
    }

    #[test]
    fn date_range_is_inclusive_start_exclusive_end() {
        let dir = tempdir().unwrap();
        let log = TelemetryLog::open(&dir.path().join("telemetry.jsonl")).unwrap();
        for day in 1..=6 {
            log.append(&sample_at(day, true)).unwrap();
        }

        let start = Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 3, 5, 0, 0, 0).unwrap();
        let hits = log.anomalies_between(start, end).unwrap();
        assert_eq!(
            hits.iter().map(|s| s.rpm).collect::<Vec<_>>(),
            vec![2002, 2003, 2004]
        );
    }

    #[test]
    fn header_line_is_not_a_record() {
        let dir = tempdir().unwrap();
        let log = TelemetryLog::open(&dir.path().join("telemetry.jsonl")).unwrap();
        assert!(log.is_empty().unwrap());
        assert_eq!(log.all().unwrap().len(), 0);
    }

    #[test]
    fn open_rejects_file_with_foreign_first_line() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("telemetry.jsonl");
        fs::write(&path, "{\"rpm\": 2000}\n").unwrap();

        let err = TelemetryLog::open(&path).unwrap_err();
        assert!(matches!(err, PersistenceError::MalformedHeader(_)));
    }

    #[test]
    fn open_rejects_unknown_header_version() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("telemetry.jsonl");
        let header = format!(
            "{{\"version\": {}, \"created_at\": \"2024-03-01T08:00:00Z\", \"hash\": \"0\"}}\n",
            LOG_VERSION + 1
        );
        fs::write(&path, header).unwrap();

        let err = TelemetryLog::open(&path).unwrap_err();
        assert!(matches!(err, PersistenceError::MalformedHeader(_)));
    }
}
