//! Sinks for failures that do not abort an import.
//!
//! Two independent recorders exist: one for records the map function could
//! not handle and one for requests the remote API rejected. Recording never
//! fails from the caller's point of view; a recorder that cannot persist an
//! entry logs the problem and carries on.

pub mod file_system;

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::errors::MapError;
use crate::source::SourceRecord;

pub use file_system::{FileSystemApiErrorRecorder, FileSystemMapErrorRecorder};

/// A persisted map function failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapErrorEntry {
    pub exception: String,
    pub record: SourceRecord,
}

impl MapErrorEntry {
    pub fn new(error: &MapError, record: &SourceRecord) -> Self {
        Self {
            exception: error.to_string(),
            record: record.clone(),
        }
    }
}

/// A request the remote API did not accept, with enough context to replay it.
/// `status` is absent when no HTTP response was received at all.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiFailure {
    pub status: Option<u16>,
    pub body: String,
    pub request: Value,
}

pub trait MapErrorRecorder {
    fn record(&mut self, error: &MapError, record: &SourceRecord);
}

pub trait ApiErrorRecorder {
    fn record(&mut self, failure: &ApiFailure);
}

impl<R: MapErrorRecorder + ?Sized> MapErrorRecorder for Box<R> {
    fn record(&mut self, error: &MapError, record: &SourceRecord) {
        (**self).record(error, record)
    }
}

impl<R: ApiErrorRecorder + ?Sized> ApiErrorRecorder for Box<R> {
    fn record(&mut self, failure: &ApiFailure) {
        (**self).record(failure)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpMapErrorRecorder;

impl MapErrorRecorder for NoOpMapErrorRecorder {
    fn record(&mut self, error: &MapError, record: &SourceRecord) {
        debug!(
            "no op logging map error {:?}",
            MapErrorEntry::new(error, record)
        );
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpApiErrorRecorder;

impl ApiErrorRecorder for NoOpApiErrorRecorder {
    fn record(&mut self, failure: &ApiFailure) {
        debug!("no op logging api error {:?}", failure);
    }
}
