use crate::core::context::ImportContext;
use crate::core::kind::{ImportKind, MalformedPolicy};
use crate::domain::model::{Cursor, ExternalRecord, FormattedRecord, Page};
use crate::utils::error::{ImportError, Result};
use async_trait::async_trait;

pub const COLLECTION: &str = "labels";

/// Labels, identified by name. A blank label can never become valid, so it
/// is marked and skipped.
pub struct LabelsKind;

#[async_trait]
impl ImportKind for LabelsKind {
    fn name(&self) -> &'static str {
        "labels"
    }

    fn cache_namespace(&self) -> &'static str {
        "labels"
    }

    fn malformed_policy(&self) -> MalformedPolicy {
        MalformedPolicy::MarkAndSkip
    }

    async fn fetch_page(
        &self,
        context: &ImportContext,
        cursor: Option<&Cursor>,
        page_size: usize,
    ) -> Result<Page> {
        super::fetch_collection(context, COLLECTION, cursor, page_size).await
    }

    fn format(&self, context: &ImportContext, record: &ExternalRecord) -> Result<FormattedRecord> {
        let name = record
            .get_str("name")
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| ImportError::MalformedRecord {
                external_id: record.id.clone(),
                message: "blank label name".to_string(),
            })?;

        Ok(FormattedRecord {
            kind: self.name().to_string(),
            external_id: record.id.clone(),
            title: name.to_string(),
            body: context.formatter().source_line(&context.source_project().0),
            state: None,
            labels: Vec::new(),
        })
    }
}
