use crate::core::context::IMPORT_FEATURE;
use crate::core::importer::RunSettings;
use crate::domain::model::{Credentials, Integration, ProjectId, SourceProjectKey};
use crate::domain::ports::{CapabilityProvider, ImportConfigStore, IntegrationLookup};
use crate::utils::error::{ImportError, Result};
use crate::utils::validation::{
    validate_non_empty_string, validate_path, validate_positive_number, validate_range,
    validate_url, Validate,
};
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportConfig {
    pub project: ProjectConfig,
    #[serde(default)]
    pub features: FeatureConfig,
    pub integration: Option<IntegrationConfig>,
    #[serde(default)]
    pub import: ImportSettings,
    #[serde(default)]
    pub cache: CacheConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub id: u64,
    pub source_project_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureConfig {
    pub enabled: Vec<String>,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            enabled: vec![IMPORT_FEATURE.to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrationConfig {
    pub name: Option<String>,
    pub url: String,
    pub username: String,
    pub api_token: String,
    pub active: Option<bool>,
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportSettings {
    pub kinds: Option<Vec<String>>,
    pub page_size: Option<usize>,
    pub retry_attempts: Option<u32>,
    pub retry_delay_seconds: Option<u64>,
    pub cache_ttl_seconds: Option<u64>,
    pub resume_from_checkpoint: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackendKind {
    Memory,
    #[default]
    File,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub backend: CacheBackendKind,
    pub path: Option<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackendKind::File,
            path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub path: String,
}

impl ImportConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed = Self::substitute_env_vars(content)?;
        toml::from_str(&processed)
            .map_err(|e| ImportError::configuration("toml", format!("TOML parsing error: {}", e)))
    }

    /// Replaces `${VAR}` with the environment value; unknown variables are
    /// left as written.
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}")
            .map_err(|e| ImportError::configuration("toml", e.to_string()))?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn project_id(&self) -> ProjectId {
        ProjectId(self.project.id)
    }

    pub fn kinds(&self) -> Vec<String> {
        self.import.kinds.clone().unwrap_or_default()
    }

    pub fn client_timeout(&self) -> Duration {
        Duration::from_secs(
            self.integration
                .as_ref()
                .and_then(|i| i.timeout_seconds)
                .unwrap_or(30),
        )
    }

    pub fn cache_ttl(&self) -> Duration {
        self.import
            .cache_ttl_seconds
            .map(Duration::from_secs)
            .unwrap_or(crate::core::tracker::DEFAULT_TTL)
    }

    pub fn cache_path(&self) -> String {
        self.cache
            .path
            .clone()
            .unwrap_or_else(|| format!("{}/.import-cache.json", self.output.path))
    }

    pub fn run_settings(&self) -> RunSettings {
        let defaults = RunSettings::default();
        RunSettings {
            page_size: self.import.page_size.unwrap_or(defaults.page_size),
            fetch_retries: self.import.retry_attempts.unwrap_or(defaults.fetch_retries),
            retry_delay: self
                .import
                .retry_delay_seconds
                .map(Duration::from_secs)
                .unwrap_or(defaults.retry_delay),
            resume_from_checkpoint: self
                .import
                .resume_from_checkpoint
                .unwrap_or(defaults.resume_from_checkpoint),
        }
    }
}

impl Validate for ImportConfig {
    fn validate(&self) -> Result<()> {
        if let Some(key) = &self.project.source_project_key {
            validate_non_empty_string("project.source_project_key", key)?;
        }

        if let Some(integration) = &self.integration {
            validate_url("integration.url", &integration.url)?;
            validate_non_empty_string("integration.username", &integration.username)?;
            validate_non_empty_string("integration.api_token", &integration.api_token)?;
            if let Some(timeout) = integration.timeout_seconds {
                validate_range("integration.timeout_seconds", timeout, 1, 600)?;
            }
        }

        if let Some(page_size) = self.import.page_size {
            validate_range("import.page_size", page_size, 1, 1000)?;
        }
        if let Some(retries) = self.import.retry_attempts {
            validate_range("import.retry_attempts", retries, 0, 10)?;
        }
        if let Some(ttl) = self.import.cache_ttl_seconds {
            validate_positive_number("import.cache_ttl_seconds", ttl as usize, 1)?;
        }

        validate_path("output.path", &self.output.path)?;
        if let Some(path) = &self.cache.path {
            validate_path("cache.path", path)?;
        }

        Ok(())
    }
}

// The config file stands in for the project settings store when running
// from the command line. It only describes its own project.

#[async_trait]
impl CapabilityProvider for ImportConfig {
    async fn is_enabled(&self, feature: &str, project: &ProjectId) -> Result<bool> {
        Ok(*project == self.project_id() && self.features.enabled.iter().any(|f| f == feature))
    }
}

#[async_trait]
impl IntegrationLookup for ImportConfig {
    async fn active_integration(&self, project: &ProjectId) -> Result<Option<Integration>> {
        if *project != self.project_id() {
            return Ok(None);
        }
        Ok(self.integration.as_ref().map(|i| Integration {
            name: i.name.clone().unwrap_or_else(|| "jira".to_string()),
            base_url: i.url.clone(),
            credentials: Credentials {
                username: i.username.clone(),
                api_token: i.api_token.clone(),
            },
            active: i.active.unwrap_or(true),
        }))
    }
}

#[async_trait]
impl ImportConfigStore for ImportConfig {
    async fn current_source_project_key(
        &self,
        project: &ProjectId,
    ) -> Result<Option<SourceProjectKey>> {
        if *project != self.project_id() {
            return Ok(None);
        }
        Ok(self
            .project
            .source_project_key
            .clone()
            .map(SourceProjectKey))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const BASIC: &str = r#"
[project]
id = 42
source_project_key = "PROJ"

[integration]
url = "https://tracker.example.com"
username = "bot"
api_token = "secret"

[import]
kinds = ["issues"]
page_size = 50
retry_attempts = 1

[output]
path = "./imported"
"#;

    #[test]
    fn test_parse_basic_config() {
        let config = ImportConfig::from_toml_str(BASIC).unwrap();

        assert_eq!(config.project_id(), ProjectId(42));
        assert_eq!(config.kinds(), vec!["issues"]);
        assert_eq!(config.cache.backend, CacheBackendKind::File);
        assert_eq!(config.cache_path(), "./imported/.import-cache.json");
        assert_eq!(config.cache_ttl(), Duration::from_secs(86_400));

        let settings = config.run_settings();
        assert_eq!(settings.page_size, 50);
        assert_eq!(settings.fetch_retries, 1);
        assert!(settings.resume_from_checkpoint);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("TRACKER_IMPORT_TEST_TOKEN", "from-env");

        let content = BASIC.replace("\"secret\"", "\"${TRACKER_IMPORT_TEST_TOKEN}\"");
        let config = ImportConfig::from_toml_str(&content).unwrap();
        assert_eq!(config.integration.unwrap().api_token, "from-env");

        std::env::remove_var("TRACKER_IMPORT_TEST_TOKEN");
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let bad_url = BASIC.replace("https://tracker.example.com", "tracker.example.com");
        assert!(ImportConfig::from_toml_str(&bad_url)
            .unwrap()
            .validate()
            .is_err());

        let bad_page = BASIC.replace("page_size = 50", "page_size = 0");
        assert!(ImportConfig::from_toml_str(&bad_page)
            .unwrap()
            .validate()
            .is_err());
    }

    #[tokio::test]
    async fn test_config_answers_port_queries() {
        let content = BASIC.replace("[import]", "[features]\nenabled = []\n\n[import]");
        let config = ImportConfig::from_toml_str(&content).unwrap();

        assert!(!config.is_enabled(IMPORT_FEATURE, &ProjectId(42)).await.unwrap());
        let integration = config.active_integration(&ProjectId(42)).await.unwrap().unwrap();
        assert!(integration.active);
        assert_eq!(integration.name, "jira");
        assert!(config.active_integration(&ProjectId(7)).await.unwrap().is_none());
        assert_eq!(
            config.current_source_project_key(&ProjectId(42)).await.unwrap(),
            Some(SourceProjectKey("PROJ".to_string()))
        );
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(BASIC.as_bytes()).unwrap();

        let config = ImportConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.project.source_project_key.as_deref(), Some("PROJ"));
    }
}
