use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::SourceError;
use crate::source::{FileFormat, SourceRecord};

/// Reads source records lazily from a file on the local file system.
///
/// The source is single-pass: once a record has been yielded it is not read
/// again, and the iterator ends when the file is exhausted.
pub struct FileSystemSource {
    path: PathBuf,
    format: FileFormat,
    reader: RecordReader,
}

enum RecordReader {
    Csv(csv::StringRecordsIntoIter<File>, csv::StringRecord),
    Json(Lines<BufReader<File>>, usize),
}

impl FileSystemSource {
    pub fn open(path: impl AsRef<Path>, format: FileFormat) -> Result<Self, SourceError> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|e| SourceError::Open {
            path: path.display().to_string(),
            source: e,
        })?;

        let reader = match format {
            FileFormat::Csv => {
                let mut csv_reader = csv::ReaderBuilder::new()
                    .has_headers(true)
                    .from_reader(file);
                let headers = csv_reader.headers()?.clone();
                RecordReader::Csv(csv_reader.into_records(), headers)
            }
            FileFormat::NewlineDelimitedJson => RecordReader::Json(BufReader::new(file).lines(), 0),
        };

        debug!("Opened {} source at {}", format, path.display());
        Ok(Self {
            path,
            format,
            reader,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> FileFormat {
        self.format
    }
}

impl Iterator for FileSystemSource {
    type Item = Result<SourceRecord, SourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.reader {
            RecordReader::Csv(records, headers) => {
                let record = records.next()?;
                Some(record.map_err(SourceError::from).map(|row| {
                    headers
                        .iter()
                        .zip(row.iter())
                        .map(|(key, value)| (key.to_string(), Value::String(value.to_string())))
                        .collect()
                }))
            }
            RecordReader::Json(lines, line_number) => loop {
                let line = lines.next()?;
                *line_number += 1;
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        return Some(Err(SourceError::Read {
                            line: *line_number,
                            source: e,
                        }));
                    }
                };
                if line.trim().is_empty() {
                    continue;
                }
                debug!("reading line {} from {}", line_number, self.path.display());
                return Some(parse_json_record(&line, *line_number));
            },
        }
    }
}

fn parse_json_record(line: &str, line_number: usize) -> Result<SourceRecord, SourceError> {
    match serde_json::from_str::<Value>(line) {
        Ok(Value::Object(record)) => Ok(record),
        Ok(other) => Err(SourceError::Json {
            line: line_number,
            reason: format!("expected a JSON object, found {}", json_type_name(&other)),
        }),
        Err(e) => Err(SourceError::Json {
            line: line_number,
            reason: e.to_string(),
        }),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
