//! CSV input and output.

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use chrono::{DateTime, Local};
use serde::Serialize;

/// Where a command writes its rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sink {
    Stdout,
    File(PathBuf),
}

impl Sink {
    /// `-` is stdout; no argument means a timestamped file in the working
    /// directory.
    pub fn resolve(arg: Option<&str>, now: DateTime<Local>) -> Self {
        match arg {
            Some("-") => Self::Stdout,
            Some(path) => Self::File(PathBuf::from(path)),
            None => Self::File(default_output_name(now)),
        }
    }
}

pub fn default_output_name(now: DateTime<Local>) -> PathBuf {
    PathBuf::from(format!("output_{}.csv", now.format("%Y-%m-%d_%H_%M_%S")))
}

/// Write `rows` with a header taken from the row type's field names.
/// Nothing is written, and no file created, when `rows` is empty.
pub fn write_rows<T: Serialize>(rows: &[T], sink: &Sink, delimiter: u8) -> anyhow::Result<()> {
    if rows.is_empty() {
        tracing::info!("no results, nothing written");
        return Ok(());
    }
    let writer: Box<dyn Write> = match sink {
        Sink::Stdout => Box::new(io::stdout().lock()),
        Sink::File(path) => Box::new(
            File::create(path).with_context(|| format!("creating {}", path.display()))?,
        ),
    };
    let mut csv = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(writer);
    for row in rows {
        csv.serialize(row).context("writing CSV row")?;
    }
    csv.flush().context("flushing CSV output")?;
    if let Sink::File(path) = sink {
        tracing::info!(path = %path.display(), rows = rows.len(), "results written");
    }
    Ok(())
}

/// Values of column `field` in a comma-separated file with a header row.
/// Empty cells are dropped.
pub fn read_column(path: &Path, field: &str) -> anyhow::Result<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("opening {}", path.display()))?;
    let headers = reader.headers().context("reading CSV header")?.clone();
    let Some(column) = headers.iter().position(|h| h.trim() == field) else {
        bail!(
            "column {field:?} not found in {} (columns: {})",
            path.display(),
            headers.iter().collect::<Vec<_>>().join(", ")
        );
    };
    let mut values = Vec::new();
    for record in reader.records() {
        let record = record.with_context(|| format!("reading {}", path.display()))?;
        if let Some(value) = record.get(column).map(str::trim)
            && !value.is_empty()
        {
            values.push(value.to_string());
        }
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[derive(Serialize)]
    #[serde(rename_all = "PascalCase")]
    struct Row {
        country: String,
        reporting_year: Option<i32>,
    }

    #[test]
    fn sink_resolution() {
        let now = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(Sink::resolve(Some("-"), now), Sink::Stdout);
        assert_eq!(
            Sink::resolve(Some("out.csv"), now),
            Sink::File(PathBuf::from("out.csv"))
        );
        assert_eq!(
            Sink::resolve(None, now),
            Sink::File(PathBuf::from("output_2024-03-09_14_05_07.csv"))
        );
    }

    #[test]
    fn writes_header_and_semicolons() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("qa.csv");
        let rows = vec![
            Row {
                country: "IT".into(),
                reporting_year: Some(2019),
            },
            Row {
                country: "ES".into(),
                reporting_year: None,
            },
        ];
        write_rows(&rows, &Sink::File(path.clone()), b';').unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "Country;ReportingYear\nIT;2019\nES;\n");
    }

    #[test]
    fn empty_result_creates_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("none.csv");
        write_rows::<Row>(&[], &Sink::File(path.clone()), b',').unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn reads_named_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clones.csv");
        std::fs::write(
            &path,
            "Obligation,Country,CDREnvelope,CDRTESTEnvelope\n\
             680,IT,https://cdr/a,https://cdrtest/a\n\
             680,ES,https://cdr/b,\n",
        )
        .unwrap();
        assert_eq!(
            read_column(&path, "CDRTESTEnvelope").unwrap(),
            vec!["https://cdrtest/a".to_string()]
        );
        assert!(read_column(&path, "Missing").is_err());
    }
}
