use crate::core::formatter::ImportFormatter;
use crate::domain::model::{ProjectId, SourceProjectKey};
use crate::domain::ports::{
    CapabilityProvider, ClientFactory, ExternalClient, ImportConfigStore, IntegrationLookup,
};
use crate::utils::error::{ConfigurationError, Result};
use std::sync::Arc;

pub const IMPORT_FEATURE: &str = "issue_tracker_import";

/// The collaborators consulted while building an [`ImportContext`].
#[derive(Clone)]
pub struct ImportServices {
    pub capabilities: Arc<dyn CapabilityProvider>,
    pub integrations: Arc<dyn IntegrationLookup>,
    pub import_config: Arc<dyn ImportConfigStore>,
    pub clients: Arc<dyn ClientFactory>,
}

/// Everything one import job needs, resolved up front.
#[derive(Clone)]
pub struct ImportContext {
    project: ProjectId,
    client: Arc<dyn ExternalClient>,
    source_project: SourceProjectKey,
    formatter: ImportFormatter,
}

impl ImportContext {
    /// Runs the precondition checks in order and binds the client. No client
    /// is built unless all checks pass.
    pub async fn build(project: ProjectId, services: &ImportServices) -> Result<Self> {
        if !services
            .capabilities
            .is_enabled(IMPORT_FEATURE, &project)
            .await?
        {
            return Err(ConfigurationError::FeatureDisabled.into());
        }

        let integration = match services.integrations.active_integration(&project).await? {
            Some(integration) if integration.active => integration,
            _ => return Err(ConfigurationError::IntegrationNotConfigured.into()),
        };

        let source_project = services
            .import_config
            .current_source_project_key(&project)
            .await?
            .filter(|key| !key.0.trim().is_empty())
            .ok_or(ConfigurationError::SourceProjectMissing)?;

        let client = services.clients.build(&integration)?;

        tracing::debug!(
            "Import context ready for project {} from {} ({})",
            project,
            source_project,
            integration.name
        );

        Ok(Self {
            project,
            client,
            source_project,
            formatter: ImportFormatter::new(),
        })
    }

    pub fn project(&self) -> &ProjectId {
        &self.project
    }

    pub fn client(&self) -> &Arc<dyn ExternalClient> {
        &self.client
    }

    pub fn source_project(&self) -> &SourceProjectKey {
        &self.source_project
    }

    pub fn formatter(&self) -> &ImportFormatter {
        &self.formatter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{Credentials, Integration, Page};
    use crate::domain::ports::PageRequest;
    use crate::utils::error::ImportError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Settings {
        enabled: bool,
        integration: Option<Integration>,
        source: Option<&'static str>,
    }

    #[async_trait]
    impl CapabilityProvider for Settings {
        async fn is_enabled(&self, _feature: &str, _project: &ProjectId) -> Result<bool> {
            Ok(self.enabled)
        }
    }

    #[async_trait]
    impl IntegrationLookup for Settings {
        async fn active_integration(&self, _project: &ProjectId) -> Result<Option<Integration>> {
            Ok(self.integration.clone())
        }
    }

    #[async_trait]
    impl ImportConfigStore for Settings {
        async fn current_source_project_key(
            &self,
            _project: &ProjectId,
        ) -> Result<Option<SourceProjectKey>> {
            Ok(self.source.map(|s| SourceProjectKey(s.to_string())))
        }
    }

    struct NullClient;

    #[async_trait]
    impl ExternalClient for NullClient {
        async fn fetch_page(&self, _request: PageRequest<'_>) -> Result<Page> {
            Ok(Page::default())
        }
    }

    #[derive(Default)]
    struct CountingFactory {
        builds: AtomicUsize,
    }

    impl ClientFactory for CountingFactory {
        fn build(&self, _integration: &Integration) -> Result<Arc<dyn ExternalClient>> {
            self.builds.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(NullClient))
        }
    }

    fn integration(active: bool) -> Integration {
        Integration {
            name: "jira".to_string(),
            base_url: "https://tracker.example.com".to_string(),
            credentials: Credentials {
                username: "bot".to_string(),
                api_token: "secret".to_string(),
            },
            active,
        }
    }

    fn services(settings: Settings) -> (ImportServices, Arc<CountingFactory>) {
        let settings = Arc::new(settings);
        let factory = Arc::new(CountingFactory::default());
        (
            ImportServices {
                capabilities: settings.clone(),
                integrations: settings.clone(),
                import_config: settings,
                clients: factory.clone(),
            },
            factory,
        )
    }

    async fn build_error(settings: Settings) -> (ConfigurationError, usize) {
        let (services, factory) = services(settings);
        match ImportContext::build(ProjectId(1), &services).await {
            Err(ImportError::Configuration(e)) => (e, factory.builds.load(Ordering::SeqCst)),
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("context should not build"),
        }
    }

    #[tokio::test]
    async fn test_disabled_feature_builds_no_client() {
        let (err, builds) = build_error(Settings {
            enabled: false,
            integration: Some(integration(true)),
            source: Some("PROJ"),
        })
        .await;

        assert_eq!(err, ConfigurationError::FeatureDisabled);
        assert_eq!(builds, 0);
    }

    #[tokio::test]
    async fn test_inactive_or_missing_integration() {
        let (err, builds) = build_error(Settings {
            enabled: true,
            integration: Some(integration(false)),
            source: Some("PROJ"),
        })
        .await;
        assert_eq!(err, ConfigurationError::IntegrationNotConfigured);
        assert_eq!(builds, 0);

        let (err, _) = build_error(Settings {
            enabled: true,
            integration: None,
            source: Some("PROJ"),
        })
        .await;
        assert_eq!(err, ConfigurationError::IntegrationNotConfigured);
    }

    #[tokio::test]
    async fn test_missing_source_project_is_distinct() {
        let (err, builds) = build_error(Settings {
            enabled: true,
            integration: Some(integration(true)),
            source: None,
        })
        .await;

        assert_eq!(err, ConfigurationError::SourceProjectMissing);
        assert_eq!(builds, 0);
    }

    #[tokio::test]
    async fn test_successful_build_binds_everything() {
        let (services, factory) = services(Settings {
            enabled: true,
            integration: Some(integration(true)),
            source: Some("PROJ"),
        });

        let context = ImportContext::build(ProjectId(9), &services).await.unwrap();

        assert_eq!(context.project(), &ProjectId(9));
        assert_eq!(context.source_project().0, "PROJ");
        assert_eq!(factory.builds.load(Ordering::SeqCst), 1);
    }
}
