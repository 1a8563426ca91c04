//! JSON Lines persistence of run reports.
//!
//! Reports are appended to one file per UTC day,
//! `~/.logbench/runs/<YYYY-MM-DD>.jsonl`, one [`RunReport`] per line.

use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use thiserror::Error;
use tracing::debug;

use crate::config::logbench_dir;
use crate::runner::{RunReport, RunSummary};

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid report line {line}: {source}")]
    Json {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// A directory of daily report files.
#[derive(Debug, Clone)]
pub struct ReportStore {
    dir: PathBuf,
}

impl ReportStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The `runs/` directory under the logbench directory.
    pub fn default_location() -> Self {
        Self::new(logbench_dir().join("runs"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, date: NaiveDate) -> PathBuf {
        self.dir.join(format!("{}.jsonl", date.format("%Y-%m-%d")))
    }

    /// Appends `report` to the file of the day it started.
    pub fn append(&self, report: &RunReport) -> Result<PathBuf, ReportError> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path_for(report.started_at.date_naive());
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, report)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        debug!(path = %path.display(), scenario = %report.scenario, "report recorded");
        Ok(path)
    }

    /// Appends every report of `summary`; returns the last file written.
    pub fn append_all(&self, summary: &RunSummary) -> Result<Option<PathBuf>, ReportError> {
        let mut last = None;
        for report in &summary.reports {
            last = Some(self.append(report)?);
        }
        Ok(last)
    }

    /// Reads the reports recorded on `date`. A missing file is empty.
    pub fn load(&self, date: NaiveDate) -> Result<Vec<RunReport>, ReportError> {
        let path = self.path_for(date);
        let file = match std::fs::File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut reports = Vec::new();
        for (i, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let report = serde_json::from_str(&line)
                .map_err(|source| ReportError::Json { line: i + 1, source })?;
            reports.push(report);
        }
        Ok(reports)
    }
}
