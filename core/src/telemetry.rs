use serde::Serialize;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "import_core=info,runner_container=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Counters kept by the import driver for a single run.
#[derive(Debug, Default, Clone, Serialize)]
pub struct ImportMetrics {
    pub records_read: usize,
    pub map_failures: usize,
    pub actions_handled: usize,
}

/// Counters kept by the API sink across its lifetime.
#[derive(Debug, Default, Clone, Serialize)]
pub struct DeliveryMetrics {
    pub user_batches_sent: usize,
    pub event_batches_sent: usize,
    pub purchases_sent: usize,
    pub delivery_failures: usize,
}
