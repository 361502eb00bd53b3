//! Newline-delimited JSON files and `date=YYYY-MM-DD` partition directories.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use crate::error::{AppError, Result};

const PARTITION_PREFIX: &str = "date=";

/// Read one record per non-blank line. A missing file reads as empty.
pub fn read_ndjson<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut out = Vec::new();
    for (idx, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let record = serde_json::from_str(trimmed).map_err(|e| {
            AppError::Input(format!("{}:{}: {e}", path.display(), idx + 1))
        })?;
        out.push(record);
    }
    Ok(out)
}

pub fn write_ndjson<T: Serialize>(path: &Path, records: &[T]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = BufWriter::new(File::create(path)?);
    for record in records {
        serde_json::to_writer(&mut writer, record)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

pub fn partition_dir(root: &Path, date: NaiveDate) -> std::path::PathBuf {
    root.join(format!("{PARTITION_PREFIX}{}", date.format("%Y-%m-%d")))
}

/// Dates of every `date=YYYY-MM-DD` directory under `root`, ascending.
/// A missing root yields no dates.
pub fn discover_partition_dates(root: &Path) -> Result<Vec<NaiveDate>> {
    let entries = match std::fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut dates = Vec::new();
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name();
        let Some(raw) = name.to_str().and_then(|n| n.strip_prefix(PARTITION_PREFIX)) else {
            continue;
        };
        match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            Ok(date) => dates.push(date),
            Err(_) => warn!(root = %root.display(), dir = raw, "skipping unparsable partition"),
        }
    }
    dates.sort_unstable();
    dates.dedup();
    Ok(dates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Rec {
        symbol: String,
        pd: Option<f64>,
    }

    #[test]
    fn missing_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let rows: Vec<Rec> = read_ndjson(&dir.path().join("nope.ndjson")).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn written_records_read_back_and_blank_lines_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a/b/rows.ndjson");
        let rows = vec![
            Rec { symbol: "PDI".into(), pd: Some(-3.5) },
            Rec { symbol: "UTG".into(), pd: None },
        ];
        write_ndjson(&path, &rows).unwrap();
        let mut raw = std::fs::read_to_string(&path).unwrap();
        raw.push_str("\n   \n");
        std::fs::write(&path, raw).unwrap();

        let back: Vec<Rec> = read_ndjson(&path).unwrap();
        assert_eq!(back, rows);
    }

    #[test]
    fn malformed_line_names_file_and_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.ndjson");
        std::fs::write(&path, "{\"symbol\":\"PDI\",\"pd\":1.0}\n{not json}\n").unwrap();
        let err = read_ndjson::<Rec>(&path).unwrap_err();
        match err {
            AppError::Input(msg) => assert!(msg.contains("bad.ndjson:2"), "{msg}"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn partitions_are_discovered_in_order() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["date=2026-03-05", "date=2026-03-01", "date=garbage", "other"] {
            std::fs::create_dir(dir.path().join(name)).unwrap();
        }
        std::fs::write(dir.path().join("date=2026-03-09"), "file, not dir").unwrap();

        let dates = discover_partition_dates(dir.path()).unwrap();
        assert_eq!(
            dates,
            vec![
                NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
                NaiveDate::from_ymd_opt(2026, 3, 5).unwrap(),
            ]
        );
        assert!(discover_partition_dates(&dir.path().join("missing")).unwrap().is_empty());
    }

    #[test]
    fn partition_dir_format() {
        let d = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        assert_eq!(partition_dir(Path::new("root"), d), Path::new("root/date=2026-03-01"));
    }
}
