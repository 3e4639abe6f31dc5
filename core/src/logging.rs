use std::{
    fs::{File, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::metrics::LossTerms;

/// A qualitative artifact written to disk during a run.
#[derive(Clone, Debug, Serialize)]
pub struct ImageArtifact {
    pub caption: String,
    pub path: PathBuf,
}

/// Sink for run events. The training loop reports through this boundary and
/// stays unaware of how events are persisted or displayed.
pub trait RunLogger {
    /// Record the size of the model being trained, once per run.
    fn watch(&mut self, parameter_count: usize) -> Result<()>;

    /// Record averaged loss terms for one split at the end of an epoch.
    fn log_epoch(&mut self, split: &str, epoch: usize, terms: &LossTerms) -> Result<()>;

    /// Record that an image artifact was written for the given split.
    fn log_image(&mut self, split: &str, epoch: usize, artifact: &ImageArtifact) -> Result<()>;
}

#[derive(Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum LogEvent<'a> {
    Watch {
        parameter_count: usize,
    },
    Epoch {
        split: &'a str,
        epoch: usize,
        #[serde(flatten)]
        terms: LossTerms,
    },
    Image {
        split: &'a str,
        epoch: usize,
        caption: &'a str,
        path: &'a Path,
    },
}

/// Logger that appends one JSON object per event to `<dir>/metrics.jsonl`.
pub struct FileLogger {
    file: File,
    path: PathBuf,
}

impl FileLogger {
    pub fn create(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create directory {}", dir.display()))?;
        let path = dir.join("metrics.jsonl");
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("failed to open metrics log at {}", path.display()))?;
        Ok(Self { file, path })
    }

    fn append(&mut self, event: &LogEvent) -> Result<()> {
        let line = serde_json::to_string(event)?;
        writeln!(self.file, "{}", line)
            .with_context(|| format!("failed to append to {}", self.path.display()))?;
        Ok(())
    }
}

impl RunLogger for FileLogger {
    fn watch(&mut self, parameter_count: usize) -> Result<()> {
        self.append(&LogEvent::Watch { parameter_count })
    }

    fn log_epoch(&mut self, split: &str, epoch: usize, terms: &LossTerms) -> Result<()> {
        self.append(&LogEvent::Epoch {
            split,
            epoch,
            terms: *terms,
        })
    }

    fn log_image(&mut self, split: &str, epoch: usize, artifact: &ImageArtifact) -> Result<()> {
        self.append(&LogEvent::Image {
            split,
            epoch,
            caption: &artifact.caption,
            path: &artifact.path,
        })
    }
}

/// Logger that drops every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullLogger;

impl RunLogger for NullLogger {
    fn watch(&mut self, _parameter_count: usize) -> Result<()> {
        Ok(())
    }

    fn log_epoch(&mut self, _split: &str, _epoch: usize, _terms: &LossTerms) -> Result<()> {
        Ok(())
    }

    fn log_image(&mut self, _split: &str, _epoch: usize, _artifact: &ImageArtifact) -> Result<()> {
        Ok(())
    }
}
