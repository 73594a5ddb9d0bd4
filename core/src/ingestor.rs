use std::panic::{self, AssertUnwindSafe};

use tracing::{error, info};

use crate::config::ImportConfig;
use crate::errors::{ImportError, MapError, Result, SourceError};
use crate::model::{ImportAction, IntoImportActions};
use crate::recorder::{
    ApiErrorRecorder, FileSystemApiErrorRecorder, FileSystemMapErrorRecorder, MapErrorRecorder,
    NoOpApiErrorRecorder, NoOpMapErrorRecorder,
};
use crate::sink::{ApiSink, HttpApiClient, NoOpSink, Sink, SinkBackend};
use crate::source::{FileSystemSource, SourceRecord};
use crate::telemetry::ImportMetrics;

const PROGRESS_INTERVAL: usize = 1000;

/// The ingestor orchestrates the data flow from source -> map function -> sink.
pub struct Ingestor<S, K, R> {
    source: S,
    sink: K,
    map_error_recorder: R,
    metrics: ImportMetrics,
}

impl Ingestor<FileSystemSource, SinkBackend, Box<dyn MapErrorRecorder>> {
    /// Builds an ingestor from configuration: a file-system source, file-backed
    /// error recorders where output paths are configured, and either the API
    /// sink or, for dry runs, a sink that sends nothing.
    pub fn create(config: &ImportConfig) -> Result<Self> {
        config.validate()?;

        let source = FileSystemSource::open(&config.source.path, config.source.format)?;

        let map_error_recorder: Box<dyn MapErrorRecorder> = match &config.errors.map_error_out {
            Some(path) => Box::new(FileSystemMapErrorRecorder::new(path)),
            None => Box::new(NoOpMapErrorRecorder),
        };

        let sink = if config.dry_run {
            info!("Dry run: no requests will be sent");
            SinkBackend::DryRun(NoOpSink::new())
        } else {
            let api_error_recorder: Box<dyn ApiErrorRecorder> = match &config.errors.api_error_out
            {
                Some(path) => Box::new(FileSystemApiErrorRecorder::new(path)),
                None => Box::new(NoOpApiErrorRecorder),
            };
            let client = HttpApiClient::new(&config.api)?;
            SinkBackend::Api(ApiSink::new(client, api_error_recorder, &config.batching)?)
        };

        Ok(Self::new(source, sink, map_error_recorder))
    }
}

impl<S, K, R> Ingestor<S, K, R>
where
    S: Iterator<Item = std::result::Result<SourceRecord, SourceError>>,
    K: Sink,
    R: MapErrorRecorder,
{
    pub fn new(source: S, sink: K, map_error_recorder: R) -> Self {
        Self {
            source,
            sink,
            map_error_recorder,
            metrics: ImportMetrics::default(),
        }
    }

    /// Runs the import to completion.
    ///
    /// Every record is passed to `map_fn`. A record whose map function fails
    /// (by returning `Err` or panicking) is written to the map error recorder
    /// and contributes no actions; the run carries on. The same applies when
    /// any action it produced has neither an email nor a user id. Once the source is
    /// exhausted the sink is shut down so partial batches are delivered.
    ///
    /// Returns `Ok(true)` when the source was fully processed, even if some
    /// records or requests failed; those failures only show up in the error
    /// recorders. Returns `Err` when the run had to stop early: the source
    /// could not be read or the sink refused an action.
    pub async fn run<F, T, E>(&mut self, mut map_fn: F) -> Result<bool>
    where
        F: FnMut(&SourceRecord) -> std::result::Result<T, E>,
        T: IntoImportActions,
        E: Into<anyhow::Error>,
    {
        info!("starting import...");
        self.metrics = ImportMetrics::default();
        let mut count = 0;

        for next in self.source.by_ref() {
            count += 1;

            let record = match next {
                Ok(record) => record,
                Err(e) => {
                    error!("failed to read record {}: {}", count, e);
                    self.sink.shutdown().await?;
                    return Err(ImportError::Source(e));
                }
            };
            self.metrics.records_read += 1;

            match apply_map_fn(&mut map_fn, &record) {
                Ok(actions) => {
                    self.metrics.actions_handled += actions.len();
                    self.sink.handle_actions(actions).await?;
                }
                Err(e) => {
                    error!("an error occurred processing record {}: {}", count, e);
                    self.metrics.map_failures += 1;
                    self.map_error_recorder.record(&e, &record);
                }
            }

            if count % PROGRESS_INTERVAL == 0 {
                info!("imported {} records", count);
            }
        }

        self.sink.shutdown().await?;
        info!(
            records = self.metrics.records_read,
            map_failures = self.metrics.map_failures,
            actions = self.metrics.actions_handled,
            "import complete"
        );
        Ok(true)
    }

    pub fn get_metrics(&self) -> &ImportMetrics {
        &self.metrics
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    pub fn map_error_recorder(&self) -> &R {
        &self.map_error_recorder
    }
}

/// Calls the map function inside a failure boundary, so neither an `Err` nor
/// a panic for one record can take down the run. A record whose actions do
/// not all name a user is rejected as a whole.
fn apply_map_fn<F, T, E>(
    map_fn: &mut F,
    record: &SourceRecord,
) -> std::result::Result<Vec<ImportAction>, MapError>
where
    F: FnMut(&SourceRecord) -> std::result::Result<T, E>,
    T: IntoImportActions,
    E: Into<anyhow::Error>,
{
    match panic::catch_unwind(AssertUnwindSafe(|| map_fn(record))) {
        Ok(Ok(output)) => {
            let actions = output.into_import_actions();
            if let Some(anonymous) = actions.iter().find(|action| !action.has_identity()) {
                return Err(MapError::MissingIdentity {
                    kind: anonymous.kind(),
                });
            }
            Ok(actions)
        }
        Ok(Err(e)) => Err(MapError::Failed(e.into())),
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic payload".to_string());
            Err(MapError::Panicked(message))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::UserProfile;
    use serde_json::json;

    #[derive(Default)]
    struct CountingSink {
        handle_calls: usize,
        actions: Vec<ImportAction>,
        shutdowns: usize,
    }

    impl Sink for CountingSink {
        async fn handle_actions(&mut self, actions: Vec<ImportAction>) -> Result<()> {
            self.handle_calls += 1;
            self.actions.extend(actions);
            Ok(())
        }

        async fn shutdown(&mut self) -> Result<()> {
            self.shutdowns += 1;
            Ok(())
        }
    }

    #[derive(Default)]
    struct CollectingRecorder {
        entries: Vec<(String, SourceRecord)>,
    }

    impl MapErrorRecorder for CollectingRecorder {
        fn record(&mut self, error: &MapError, record: &SourceRecord) {
            self.entries.push((error.to_string(), record.clone()));
        }
    }

    fn records(n: usize) -> Vec<std::result::Result<SourceRecord, SourceError>> {
        (1..=n)
            .map(|i| {
                Ok(json!({"id": i, "email": format!("user{}@placeholder.email", i)})
                    .as_object()
                    .cloned()
                    .unwrap())
            })
            .collect()
    }

    fn ingestor(
        records: Vec<std::result::Result<SourceRecord, SourceError>>,
    ) -> Ingestor<
        std::vec::IntoIter<std::result::Result<SourceRecord, SourceError>>,
        CountingSink,
        CollectingRecorder,
    > {
        Ingestor::new(
            records.into_iter(),
            CountingSink::default(),
            CollectingRecorder::default(),
        )
    }

    fn to_profile(record: &SourceRecord) -> anyhow::Result<ImportAction> {
        let email = record["email"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("email is not a string"))?;
        Ok(ImportAction::update_user(UserProfile::with_email(email)))
    }

    #[tokio::test]
    async fn test_map_fn_called_once_per_record() {
        let mut calls = 0;
        let mut ingestor = ingestor(records(25));

        let success = ingestor
            .run(|record| {
                calls += 1;
                to_profile(record)
            })
            .await
            .unwrap();

        assert!(success);
        assert_eq!(calls, 25);
        assert_eq!(ingestor.sink().actions.len(), 25);
        assert_eq!(ingestor.sink().shutdowns, 1);
        assert_eq!(ingestor.get_metrics().records_read, 25);
    }

    #[tokio::test]
    async fn test_shutdown_called_for_empty_source() {
        let mut ingestor = ingestor(Vec::new());
        let success = ingestor.run(to_profile).await.unwrap();

        assert!(success);
        assert_eq!(ingestor.sink().shutdowns, 1);
        assert_eq!(ingestor.sink().handle_calls, 0);
    }

    #[tokio::test]
    async fn test_failing_map_fn_is_recorded_and_run_succeeds() {
        let mut ingestor = ingestor(records(3));
        let success = ingestor
            .run(|_record| -> anyhow::Result<ImportAction> { Err(anyhow::anyhow!("boom!")) })
            .await
            .unwrap();

        assert!(success);
        assert_eq!(ingestor.sink().handle_calls, 0);
        assert_eq!(ingestor.sink().shutdowns, 1);

        let entries = &ingestor.map_error_recorder().entries;
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].0, "boom!");
        assert_eq!(entries[2].1["id"], 3);
        assert_eq!(ingestor.get_metrics().map_failures, 3);
    }

    #[tokio::test]
    async fn test_panicking_map_fn_is_recorded() {
        let mut ingestor = ingestor(records(2));
        ingestor
            .run(|record| -> anyhow::Result<Option<ImportAction>> {
                if record["id"] == 1 {
                    panic!("unexpected record shape");
                }
                to_profile(record).map(Some)
            })
            .await
            .unwrap();

        let entries = &ingestor.map_error_recorder().entries;
        assert_eq!(entries.len(), 1);
        assert!(entries[0].0.contains("unexpected record shape"));
        assert_eq!(ingestor.sink().actions.len(), 1);
    }

    #[tokio::test]
    async fn test_map_fn_outputs_are_normalized() {
        let mut ingestor = ingestor(records(4));
        ingestor
            .run(|record| -> anyhow::Result<Vec<ImportAction>> {
                let n = record["id"].as_u64().unwrap_or(0) as usize;
                Ok((0..n % 3).map(|_| to_profile(record).unwrap()).collect())
            })
            .await
            .unwrap();

        // ids 1..=4 produce 1, 2, 0 and 1 actions
        assert_eq!(ingestor.sink().actions.len(), 4);
        assert_eq!(ingestor.sink().handle_calls, 4);
    }

    #[tokio::test]
    async fn test_unit_output_produces_no_actions() {
        let mut ingestor = ingestor(records(2));
        ingestor
            .run(|_record| Ok::<(), anyhow::Error>(()))
            .await
            .unwrap();

        assert!(ingestor.sink().actions.is_empty());
        assert_eq!(ingestor.sink().shutdowns, 1);
    }

    #[tokio::test]
    async fn test_action_without_identity_is_recorded_and_run_continues() {
        let mut ingestor = ingestor(records(4));
        let success = ingestor
            .run(|record| -> anyhow::Result<Vec<ImportAction>> {
                let profile = to_profile(record)?;
                if record["id"] == 2 {
                    return Ok(vec![
                        profile,
                        ImportAction::update_user(UserProfile::with_email("")),
                    ]);
                }
                Ok(vec![profile])
            })
            .await
            .unwrap();

        assert!(success);
        // the whole record is dropped, including its valid action
        assert_eq!(ingestor.sink().actions.len(), 3);
        assert_eq!(ingestor.sink().shutdowns, 1);

        let entries = &ingestor.map_error_recorder().entries;
        assert_eq!(entries.len(), 1);
        assert_eq!(
            entries[0].0,
            "update_user_profile action has neither email nor userId"
        );
        assert_eq!(entries[0].1["id"], 2);
        assert_eq!(ingestor.get_metrics().map_failures, 1);
    }

    #[tokio::test]
    async fn test_source_error_aborts_after_shutdown() {
        let mut input = records(2);
        input.push(Err(SourceError::Json {
            line: 3,
            reason: "expected value".to_string(),
        }));
        input.extend(records(2));

        let mut ingestor = ingestor(input);
        let result = ingestor.run(to_profile).await;

        assert!(matches!(result, Err(ImportError::Source(_))));
        assert_eq!(ingestor.sink().actions.len(), 2);
        assert_eq!(ingestor.sink().shutdowns, 1);
    }

    #[tokio::test]
    async fn test_metrics_reset_between_runs() {
        let mut ingestor = ingestor(records(5));
        ingestor.run(to_profile).await.unwrap();
        assert_eq!(ingestor.get_metrics().records_read, 5);

        // the source is single-pass, so a second run sees nothing
        ingestor.run(to_profile).await.unwrap();
        assert_eq!(ingestor.get_metrics().records_read, 0);
        assert_eq!(ingestor.sink().shutdowns, 2);
    }
}
