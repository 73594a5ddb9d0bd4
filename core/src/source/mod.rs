pub mod file_system;

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub use file_system::FileSystemSource;

/// A record read from the source regardless of whether it came from CSV or JSON.
/// Field names map to decoded values; CSV values are always strings.
pub type SourceRecord = Map<String, Value>;

/// Supported file formats for source records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileFormat {
    Csv,
    NewlineDelimitedJson,
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileFormat::Csv => write!(f, "csv"),
            FileFormat::NewlineDelimitedJson => write!(f, "newline_delimited_json"),
        }
    }
}
