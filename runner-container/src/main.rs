use anyhow::{Context, Result, anyhow};
use import_core::config::load_config;
use import_core::model::DataFields;
use import_core::telemetry::init_tracing;
use import_core::{ImportAction, Ingestor, SourceRecord, UserProfile};
use serde_json::Value;
use tracing::{error, info};

/// This is the entry point for running a one-off import job on container
/// hosting services like AWS ECS, Kubernetes jobs, etc.
///
/// What it does at a high-level:
///     Load config from the file named by IMPORT_CONFIG_PATH, or from the
///     YAML document in IMPORT_CONFIG.
///     Read every record of the configured file and upsert it as a user
///     profile, keyed by its `email` and/or `userId` (or `id`) column.
///     Flush the remaining batches and exit.
#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config_path = std::env::var("IMPORT_CONFIG_PATH").ok();
    let config = load_config(config_path.as_deref())
        .await
        .context("Failed to load configuration")?;

    let mut ingestor = Ingestor::create(&config).context("Failed to initialize import")?;

    match ingestor.run(record_to_profile).await {
        Ok(_) => {
            info!(metrics = ?ingestor.get_metrics(), "import finished");
            Ok(())
        }
        Err(e) => {
            error!("import aborted: {}", e);
            Err(e).context("Import aborted")
        }
    }
}

/// Every column other than the identity columns becomes a data field.
fn record_to_profile(record: &SourceRecord) -> Result<ImportAction> {
    let email = record.get("email").and_then(as_identity);
    let user_id = record
        .get("userId")
        .or_else(|| record.get("id"))
        .and_then(as_identity);

    if email.is_none() && user_id.is_none() {
        return Err(anyhow!("record has no email, userId or id"));
    }

    let data_fields: DataFields = record
        .iter()
        .filter(|(key, _)| !matches!(key.as_str(), "email" | "userId" | "id"))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    Ok(ImportAction::update_user(UserProfile::new(
        email, user_id, data_fields,
    )))
}

fn as_identity(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
