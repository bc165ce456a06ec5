pub mod context;
pub mod formatter;
pub mod importer;
pub mod job;
pub mod kind;
pub mod tracker;

pub use crate::domain::model::{ExternalRecord, FormattedRecord, Page, RunResult, RunStatus};
pub use crate::domain::ports::{CacheBackend, ExternalClient, RecordWriter};
pub use crate::utils::error::Result;
