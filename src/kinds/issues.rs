use crate::core::context::ImportContext;
use crate::core::formatter::parse_timestamp;
use crate::core::kind::{ImportKind, MalformedPolicy};
use crate::domain::model::{Cursor, ExternalRecord, FormattedRecord, Page, RecordState};
use crate::utils::error::{ImportError, Result};
use async_trait::async_trait;

pub const COLLECTION: &str = "issues";

/// Issues with their reporter, assignee, state and labels.
///
/// A record without a key or summary stays unmarked so it is picked up again
/// once it has been fixed in the source system.
pub struct IssuesKind;

#[async_trait]
impl ImportKind for IssuesKind {
    fn name(&self) -> &'static str {
        "issues"
    }

    fn cache_namespace(&self) -> &'static str {
        "issues"
    }

    fn malformed_policy(&self) -> MalformedPolicy {
        MalformedPolicy::RetryLater
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
        let malformed = |message: &str| ImportError::MalformedRecord {
            external_id: record.id.clone(),
            message: message.to_string(),
        };

        let key = record
            .get_str("key")
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| malformed("missing issue key"))?;
        let summary = record
            .get_str("fields.summary")
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| malformed("missing summary"))?;

        let reporter = record.get_str("fields.reporter.displayName");
        let assignee = record.get_str("fields.assignee.displayName");
        let created = record.get_str("fields.created").and_then(parse_timestamp);

        let formatter = context.formatter();
        let mut body = formatter.attribution_line(key, reporter, created.as_ref());
        if assignee.is_some() {
            body.push_str(&formatter.assignee_line(assignee));
        }
        if let Some(description) = record.get_str("fields.description") {
            body.push_str(description);
        }
        append_comments(&mut body, context, record);

        let state = match record.get_str("fields.status.statusCategory.key") {
            Some("done") => RecordState::Closed,
            _ => RecordState::Opened,
        };

        let labels = record
            .get_path("fields.labels")
            .and_then(|v| v.as_array())
            .map(|values| {
                values
                    .iter()
                    .filter_map(|v| v.as_str())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(FormattedRecord {
            kind: self.name().to_string(),
            external_id: record.id.clone(),
            title: format!("[{}] {}", key, summary),
            body,
            state: Some(state),
            labels,
        })
    }
}

/// Comments arrive inline under `fields.comment.comments`. Comments without
/// a parseable date are left out.
fn append_comments(body: &mut String, context: &ImportContext, record: &ExternalRecord) {
    let comments = match record
        .get_path("fields.comment.comments")
        .and_then(|v| v.as_array())
    {
        Some(comments) if !comments.is_empty() => comments,
        _ => return,
    };

    let formatter = context.formatter();
    body.push_str(formatter.comments_header());
    for comment in comments {
        let created = comment
            .get("created")
            .and_then(|v| v.as_str())
            .and_then(parse_timestamp);
        let Some(created) = created else { continue };
        let author = comment
            .get("author")
            .and_then(|a| a.get("displayName"))
            .and_then(|v| v.as_str());
        let text = comment.get("body").and_then(|v| v.as_str()).unwrap_or("");
        body.push_str(&formatter.comment(author, &created, text));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinds::test_support::context;
    use serde_json::json;

    fn issue() -> ExternalRecord {
        ExternalRecord::new("10001")
            .with_field("key", json!("PROJ-1"))
            .with_field(
                "fields",
                json!({
                    "summary": "Login fails",
                    "description": "Steps to reproduce",
                    "created": "2020-03-01T10:15:00.000+0000",
                    "reporter": {"displayName": "Ada"},
                    "assignee": {"displayName": "Grace"},
                    "status": {"statusCategory": {"key": "done"}},
                    "labels": ["bug", "auth"]
                }),
            )
    }

    #[tokio::test]
    async fn test_format_issue() {
        let context = context().await;
        let formatted = IssuesKind.format(&context, &issue()).unwrap();

        assert_eq!(formatted.title, "[PROJ-1] Login fails");
        assert_eq!(formatted.external_id, "10001");
        assert_eq!(formatted.state, Some(RecordState::Closed));
        assert_eq!(formatted.labels, vec!["bug", "auth"]);
        assert_eq!(
            formatted.body,
            "*Imported from PROJ-1 (created by Ada on 2020-03-01 10:15:00 UTC)*\n\n\
             *Assigned to: Grace*\n\n\
             Steps to reproduce"
        );
    }

    #[tokio::test]
    async fn test_comments_are_appended() {
        let context = context().await;
        let record = ExternalRecord::new("10003")
            .with_field("key", json!("PROJ-3"))
            .with_field(
                "fields",
                json!({
                    "summary": "Crash",
                    "comment": {"comments": [
                        {"author": {"displayName": "Ada"}, "created": "2020-03-02T08:00:00.000+0000", "body": "Seen on v2"},
                        {"body": "no date"}
                    ]}
                }),
            );

        let formatted = IssuesKind.format(&context, &record).unwrap();

        assert!(formatted
            .body
            .ends_with("**Imported comments:**\n\n\n*By Ada on 2020-03-02 08:00:00 UTC*\n\nSeen on v2"));
        assert!(!formatted.body.contains("no date"));
    }

    #[tokio::test]
    async fn test_format_is_repeatable() {
        let context = context().await;
        let first = IssuesKind.format(&context, &issue()).unwrap();
        let second = IssuesKind.format(&context, &issue()).unwrap();
        assert_eq!(
            serde_json::to_vec(&first).unwrap(),
            serde_json::to_vec(&second).unwrap()
        );
    }

    #[tokio::test]
    async fn test_missing_summary_is_malformed() {
        let context = context().await;
        let record = ExternalRecord::new("10002").with_field("key", json!("PROJ-2"));

        assert!(matches!(
            IssuesKind.format(&context, &record),
            Err(ImportError::MalformedRecord { .. })
        ));
    }
}
