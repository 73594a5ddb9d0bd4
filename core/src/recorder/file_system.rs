use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, error};

use crate::errors::MapError;
use crate::recorder::{ApiErrorRecorder, ApiFailure, MapErrorEntry, MapErrorRecorder};
use crate::source::SourceRecord;

/// Writes map function failures as newline delimited JSON.
#[derive(Debug, Clone)]
pub struct FileSystemMapErrorRecorder {
    out_file_path: PathBuf,
}

impl FileSystemMapErrorRecorder {
    pub fn new(out_file_path: impl Into<PathBuf>) -> Self {
        Self {
            out_file_path: out_file_path.into(),
        }
    }

    pub fn out_file_path(&self) -> &Path {
        &self.out_file_path
    }
}

impl MapErrorRecorder for FileSystemMapErrorRecorder {
    fn record(&mut self, error: &MapError, record: &SourceRecord) {
        let entry = MapErrorEntry::new(error, record);
        debug!("logging map error {:?}", entry);
        append_json_line(&self.out_file_path, &entry);
    }
}

/// Writes rejected API requests as newline delimited JSON.
#[derive(Debug, Clone)]
pub struct FileSystemApiErrorRecorder {
    out_file_path: PathBuf,
}

impl FileSystemApiErrorRecorder {
    pub fn new(out_file_path: impl Into<PathBuf>) -> Self {
        Self {
            out_file_path: out_file_path.into(),
        }
    }

    pub fn out_file_path(&self) -> &Path {
        &self.out_file_path
    }
}

impl ApiErrorRecorder for FileSystemApiErrorRecorder {
    fn record(&mut self, failure: &ApiFailure) {
        debug!("logging api error with status {:?}", failure.status);
        append_json_line(&self.out_file_path, failure);
    }
}

// The file is reopened for every entry so that everything recorded so far
// is on disk if the process dies mid-run.
fn append_json_line<T: Serialize>(path: &Path, entry: &T) {
    let line = match serde_json::to_string(entry) {
        Ok(line) => line,
        Err(e) => {
            error!("Failed to serialize error entry for {}: {}", path.display(), e);
            return;
        }
    };

    let result = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .and_then(|mut file| writeln!(file, "{}", line));

    if let Err(e) = result {
        error!("Failed to write error entry to {}: {}", path.display(), e);
    }
}
