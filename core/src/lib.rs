pub mod config;
pub mod errors;
pub mod ingestor;
pub mod model;
pub mod recorder;
pub mod sink;
pub mod source;
pub mod telemetry;

pub use config::ImportConfig;
pub use errors::{ImportError, Result};
pub use ingestor::Ingestor;
pub use model::{
    CommerceItem, CustomEvent, ImportAction, IntoImportActions, Purchase, UserProfile,
};
pub use source::{FileFormat, SourceRecord};
