use chrono::{DateTime, Utc};

const ANONYMOUS: &str = "Anonymous";

/// Renders attribution text for imported records. Stateless, so replaying a
/// record after a crash always produces the same body.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImportFormatter;

impl ImportFormatter {
    pub fn new() -> Self {
        Self
    }

    pub fn assignee_line(&self, assignee: Option<&str>) -> String {
        format!("*Assigned to: {}*\n\n", assignee.unwrap_or(ANONYMOUS))
    }

    pub fn comment(&self, author: Option<&str>, date: &DateTime<Utc>, body: &str) -> String {
        format!(
            "\n\n*By {} on {}*\n\n{}",
            author.unwrap_or(ANONYMOUS),
            format_timestamp(date),
            body
        )
    }

    pub fn comments_header(&self) -> &'static str {
        "\n\n\n**Imported comments:**\n"
    }

    pub fn source_line(&self, source_project: &str) -> String {
        format!("*Imported from {}*", source_project)
    }

    pub fn attribution_line(
        &self,
        external_id: &str,
        author: Option<&str>,
        created_at: Option<&DateTime<Utc>>,
    ) -> String {
        match created_at {
            Some(date) => format!(
                "*Imported from {} (created by {} on {})*\n\n",
                external_id,
                author.unwrap_or(ANONYMOUS),
                format_timestamp(date)
            ),
            None => format!(
                "*Imported from {} (created by {})*\n\n",
                external_id,
                author.unwrap_or(ANONYMOUS)
            ),
        }
    }
}

fn format_timestamp(date: &DateTime<Utc>) -> String {
    date.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// Parses the timestamp formats issue trackers commonly emit.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(date) = DateTime::parse_from_rfc3339(raw) {
        return Some(date.with_timezone(&Utc));
    }
    // Jira style: 2020-03-01T10:15:00.000+0000
    DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.3f%z")
        .ok()
        .map(|date| date.with_timezone(&Utc))
}
