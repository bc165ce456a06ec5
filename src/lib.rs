pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod kinds;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliArgs;
pub use config::ImportConfig;

pub use core::context::{ImportContext, ImportServices};
pub use core::formatter::ImportFormatter;
pub use core::importer::{CancellationFlag, KindImporter, RunSettings};
pub use core::job::ImportJob;
pub use core::kind::{ImportKind, KindRegistry, MalformedPolicy};
pub use core::tracker::DedupTracker;
pub use utils::error::{ConfigurationError, ImportError, Result};
