//! Concrete import kinds.
//!
//! | kind   | namespace | malformed records                     |
//! |--------|-----------|---------------------------------------|
//! | labels | `labels`  | marked and skipped (blank names)      |
//! | issues | `issues`  | left unmarked, counted as failed      |

pub mod issues;
pub mod labels;

use crate::core::context::ImportContext;
use crate::domain::model::{Cursor, Page};
use crate::domain::ports::PageRequest;
use crate::utils::error::Result;

pub(crate) async fn fetch_collection(
    context: &ImportContext,
    collection: &str,
    cursor: Option<&Cursor>,
    page_size: usize,
) -> Result<Page> {
    context
        .client()
        .fetch_page(PageRequest {
            collection,
            source_project: context.source_project(),
            cursor,
            page_size,
        })
        .await
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::core::context::{ImportContext, ImportServices};
    use crate::domain::model::{Credentials, Integration, Page, ProjectId, SourceProjectKey};
    use crate::domain::ports::{
        CapabilityProvider, ClientFactory, ExternalClient, ImportConfigStore, IntegrationLookup,
        PageRequest,
    };
    use crate::utils::error::Result;
    use async_trait::async_trait;
    use std::sync::Arc;

    struct Everything;

    #[async_trait]
    impl CapabilityProvider for Everything {
        async fn is_enabled(&self, _feature: &str, _project: &ProjectId) -> Result<bool> {
            Ok(true)
        }
    }

    #[async_trait]
    impl IntegrationLookup for Everything {
        async fn active_integration(&self, _project: &ProjectId) -> Result<Option<Integration>> {
            Ok(Some(Integration {
                name: "jira".to_string(),
                base_url: "https://tracker.example.com".to_string(),
                credentials: Credentials {
                    username: "bot".to_string(),
                    api_token: "t".to_string(),
                },
                active: true,
            }))
        }
    }

    #[async_trait]
    impl ImportConfigStore for Everything {
        async fn current_source_project_key(
            &self,
            _project: &ProjectId,
        ) -> Result<Option<SourceProjectKey>> {
            Ok(Some(SourceProjectKey("PROJ".to_string())))
        }
    }

    #[async_trait]
    impl ExternalClient for Everything {
        async fn fetch_page(&self, _request: PageRequest<'_>) -> Result<Page> {
            Ok(Page::default())
        }
    }

    impl ClientFactory for Everything {
        fn build(&self, _integration: &Integration) -> Result<Arc<dyn ExternalClient>> {
            Ok(Arc::new(Everything))
        }
    }

    pub(crate) async fn context() -> ImportContext {
        let everything = Arc::new(Everything);
        let services = ImportServices {
            capabilities: everything.clone(),
            integrations: everything.clone(),
            import_config: everything.clone(),
            clients: everything,
        };
        ImportContext::build(ProjectId(1), &services).await.unwrap()
    }
}
