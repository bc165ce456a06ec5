use thiserror::Error;

/// Reasons an import context cannot be built. Always fatal, never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("Issue tracker import feature is disabled.")]
    FeatureDisabled,

    #[error("Issue tracker integration not configured.")]
    IntegrationNotConfigured,

    #[error("Unable to find source project to import data from.")]
    SourceProjectMissing,

    #[error("Unknown import kind: {0}")]
    UnknownKind(String),

    #[error("Invalid configuration for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

#[derive(Error, Debug)]
pub enum ImportError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("Failed to fetch page: {message}")]
    TransientFetch { message: String },

    #[error("Fetch rejected by source: {message}")]
    FetchRejected { message: String },

    #[error("Failed to apply record {external_id}: {message}")]
    TransientApply { external_id: String, message: String },

    #[error("Malformed record {external_id}: {message}")]
    MalformedRecord { external_id: String, message: String },

    #[error("Cache error: {message}")]
    Cache { message: String },

    #[error("An import of {kind} is already running for project {project}")]
    RunInProgress { project: String, kind: String },

    #[error("API request failed: {0}")]
    Api(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ImportError {
    pub fn configuration(field: &str, reason: impl Into<String>) -> Self {
        ImportError::Configuration(ConfigurationError::InvalidValue {
            field: field.to_string(),
            reason: reason.into(),
        })
    }

    /// Whether retrying the same operation later may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            ImportError::TransientFetch { .. } | ImportError::TransientApply { .. } => true,
            ImportError::Api(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            ImportError::MalformedRecord { .. } => ErrorSeverity::Low,
            ImportError::TransientFetch { .. }
            | ImportError::TransientApply { .. }
            | ImportError::RunInProgress { .. }
            | ImportError::Api(_) => ErrorSeverity::Medium,
            ImportError::Configuration(_)
            | ImportError::FetchRejected { .. }
            | ImportError::Serialization(_) => ErrorSeverity::High,
            ImportError::Cache { .. } | ImportError::Io(_) => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            ImportError::Configuration(ConfigurationError::FeatureDisabled) => {
                "Enable the import feature for this project"
            }
            ImportError::Configuration(ConfigurationError::IntegrationNotConfigured) => {
                "Configure and activate the issue tracker integration"
            }
            ImportError::Configuration(ConfigurationError::SourceProjectMissing) => {
                "Select the source project to import from"
            }
            ImportError::Configuration(_) => "Check the configuration file",
            ImportError::TransientFetch { .. }
            | ImportError::TransientApply { .. }
            | ImportError::Api(_) => "Re-run the import; already imported records are skipped",
            ImportError::FetchRejected { .. } => {
                "Check the source project key and the integration credentials"
            }
            ImportError::MalformedRecord { .. } => "Inspect the record in the source system",
            ImportError::RunInProgress { .. } => "Wait for the running import to finish",
            ImportError::Cache { .. } | ImportError::Io(_) => {
                "Check that the cache and output paths are writable"
            }
            ImportError::Serialization(_) => "Check the format of the stored import data",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            ImportError::Configuration(e) => format!("Import cannot start: {}", e),
            ImportError::RunInProgress { kind, .. } => {
                format!("An import of {} is already running", kind)
            }
            other => format!("Import failed: {}", other),
        }
    }
}

pub type Result<T> = std::result::Result<T, ImportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_messages() {
        let err: ImportError = ConfigurationError::FeatureDisabled.into();
        assert_eq!(err.to_string(), "Issue tracker import feature is disabled.");
        assert_eq!(err.severity(), ErrorSeverity::High);
        assert!(!err.is_transient());
        assert!(err.user_friendly_message().starts_with("Import cannot start"));
    }

    #[test]
    fn test_transient_classification() {
        let fetch = ImportError::TransientFetch {
            message: "429".to_string(),
        };
        let rejected = ImportError::FetchRejected {
            message: "400".to_string(),
        };
        assert!(fetch.is_transient());
        assert!(!rejected.is_transient());
        assert_eq!(fetch.severity(), ErrorSeverity::Medium);
    }
}
