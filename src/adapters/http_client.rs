use crate::domain::model::{Credentials, Cursor, ExternalRecord, Integration, Page};
use crate::domain::ports::{ClientFactory, ExternalClient, PageRequest};
use crate::utils::error::{ImportError, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

const ISSUE_FIELDS: &str = "summary,description,created,reporter,assignee,status,labels,comment";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponse {
    start_at: usize,
    total: usize,
    issues: Vec<serde_json::Map<String, serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LabelResponse {
    start_at: usize,
    #[serde(default)]
    is_last: bool,
    values: Vec<String>,
}

/// Client for a Jira style REST API paginated with `startAt`/`maxResults`.
pub struct TrackerHttpClient {
    http: Client,
    base_url: Url,
    credentials: Credentials,
}

impl TrackerHttpClient {
    pub fn new(base_url: &str, credentials: Credentials, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(&format!("{}/", base_url.trim_end_matches('/')))
            .map_err(|e| ImportError::configuration("integration.url", e.to_string()))?;
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url,
            credentials,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| ImportError::configuration("integration.url", e.to_string()))
    }

    async fn get(&self, url: Url, query: &[(&str, String)]) -> Result<reqwest::Response> {
        tracing::debug!("GET {} {:?}", url, query);
        let response = self
            .http
            .get(url)
            .basic_auth(&self.credentials.username, Some(&self.credentials.api_token))
            .query(query)
            .send()
            .await
            .map_err(|e| ImportError::TransientFetch {
                message: e.to_string(),
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = format!("{} {}", status, body.chars().take(200).collect::<String>());
        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            Err(ImportError::TransientFetch { message })
        } else {
            Err(ImportError::FetchRejected { message })
        }
    }

    async fn fetch_issues(&self, request: &PageRequest<'_>, start_at: usize) -> Result<Page> {
        let query = [
            (
                "jql",
                format!(
                    "project = {} ORDER BY created ASC",
                    jql_string(&request.source_project.0)
                ),
            ),
            ("startAt", start_at.to_string()),
            ("maxResults", request.page_size.to_string()),
            ("fields", ISSUE_FIELDS.to_string()),
        ];
        let response = self.get(self.endpoint("rest/api/2/search")?, &query).await?;
        let body: SearchResponse = decode(response).await?;

        let fetched = body.issues.len();
        let records = body
            .issues
            .into_iter()
            .filter_map(|issue| {
                let id = match issue.get("id") {
                    Some(serde_json::Value::String(id)) => id.clone(),
                    Some(serde_json::Value::Number(id)) => id.to_string(),
                    _ => {
                        tracing::warn!("Ignoring issue without an id");
                        return None;
                    }
                };
                Some(ExternalRecord {
                    id,
                    data: issue.into_iter().collect(),
                })
            })
            .collect();

        let next = body.start_at + fetched;
        Ok(Page {
            records,
            next_cursor: (fetched > 0 && next < body.total).then(|| Cursor(next.to_string())),
        })
    }

    async fn fetch_labels(&self, request: &PageRequest<'_>, start_at: usize) -> Result<Page> {
        let query = [
            ("startAt", start_at.to_string()),
            ("maxResults", request.page_size.to_string()),
        ];
        let response = self.get(self.endpoint("rest/api/2/label")?, &query).await?;
        let body: LabelResponse = decode(response).await?;

        let fetched = body.values.len();
        let records = body
            .values
            .into_iter()
            .map(|name| {
                ExternalRecord::new(name.clone()).with_field("name", serde_json::Value::String(name))
            })
            .collect();

        Ok(Page {
            records,
            next_cursor: (!body.is_last && fetched > 0)
                .then(|| Cursor((body.start_at + fetched).to_string())),
        })
    }
}

/// Quotes a value as a JQL string literal.
fn jql_string(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        if c == '"' || c == '\\' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

async fn decode<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    response
        .json::<T>()
        .await
        .map_err(|e| ImportError::FetchRejected {
            message: format!("unexpected response body: {}", e),
        })
}

fn parse_start_at(cursor: Option<&Cursor>) -> Result<usize> {
    match cursor {
        None => Ok(0),
        Some(cursor) => cursor.0.parse().map_err(|_| ImportError::FetchRejected {
            message: format!("invalid cursor {:?}", cursor.0),
        }),
    }
}

#[async_trait]
impl ExternalClient for TrackerHttpClient {
    async fn fetch_page(&self, request: PageRequest<'_>) -> Result<Page> {
        let start_at = parse_start_at(request.cursor)?;
        match request.collection {
            "issues" => self.fetch_issues(&request, start_at).await,
            "labels" => self.fetch_labels(&request, start_at).await,
            other => Err(ImportError::FetchRejected {
                message: format!("unsupported collection {}", other),
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpClientFactory {
    timeout: Duration,
}

impl HttpClientFactory {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for HttpClientFactory {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

impl ClientFactory for HttpClientFactory {
    fn build(&self, integration: &Integration) -> Result<Arc<dyn ExternalClient>> {
        tracing::debug!("Building client for {} at {}", integration.name, integration.base_url);
        Ok(Arc::new(TrackerHttpClient::new(
            &integration.base_url,
            integration.credentials.clone(),
            self.timeout,
        )?))
    }
}
