//! Hosted BaaS store
//!
//! Talks to the backend's PostgREST endpoint (`{url}/rest/v1/{table}`).
//! Filters use PostgREST operators (`eq.`, `in.(...)`, `ilike.`), counts use
//! `Prefer: count=exact` and the `Content-Range` response header.

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Deserialize;

use super::{ArtistCatalog, RelationshipStore, observe};
use crate::config::RestBackendConfig;
use crate::data::{
    Artist, Relationship, RelationshipFilter, RelationshipKey, RelationshipKind, RelationshipRow,
    escape_like,
};
use crate::error::{AppError, Result};
use crate::session::Session;

const BACKEND: &str = "rest";
/// Postgres SQLSTATE for unique_violation
const UNIQUE_VIOLATION_CODE: &str = "23505";

/// Error body returned by PostgREST
#[derive(Debug, Deserialize)]
struct PostgrestError {
    code: Option<String>,
    message: Option<String>,
}

/// Map a non-success response to an error
///
/// # Arguments
/// * `status` - HTTP status code
/// * `body` - Raw response body (may be empty, e.g. for HEAD)
pub(crate) fn map_error_response(status: StatusCode, body: &str) -> AppError {
    let parsed = serde_json::from_str::<PostgrestError>(body).ok();
    let code = parsed.as_ref().and_then(|error| error.code.as_deref());
    let message = parsed
        .as_ref()
        .and_then(|error| error.message.clone())
        .filter(|message| !message.is_empty())
        .unwrap_or_else(|| format!("HTTP {status}"));

    if code == Some(UNIQUE_VIOLATION_CODE) {
        return AppError::UniquenessViolation;
    }

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AppError::NotAuthenticated,
        StatusCode::NOT_FOUND => AppError::NotFound,
        StatusCode::CONFLICT if code.is_none() => AppError::UniquenessViolation,
        StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => {
            AppError::RemoteUnavailable(message)
        }
        status if status.is_server_error() => AppError::RemoteUnavailable(message),
        _ => AppError::Rejected(message),
    }
}

/// Parse the total from a `Content-Range` header (`0-24/3573`, `*/0`)
pub(crate) fn parse_content_range_total(value: &str) -> Result<u64> {
    let total = value
        .rsplit_once('/')
        .map(|(_, total)| total.trim())
        .ok_or_else(|| AppError::InvalidData(format!("malformed Content-Range: {value}")))?;

    total
        .parse::<u64>()
        .map_err(|_| AppError::InvalidData(format!("Content-Range has no exact total: {value}")))
}

/// Quote a value for a PostgREST `in.(...)` list
fn quote_list_value(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

fn in_list(values: &[String]) -> String {
    let quoted: Vec<String> = values.iter().map(|value| quote_list_value(value)).collect();
    format!("({})", quoted.join(","))
}

/// PostgREST query parameters for a relationship filter
pub(crate) fn filter_params(filter: &RelationshipFilter) -> Vec<(String, String)> {
    let mut params = Vec::new();

    if let Some(actor_id) = &filter.actor_id {
        params.push(("actor_id".to_string(), format!("eq.{actor_id}")));
    }
    if let Some(kind) = filter.kind {
        params.push(("kind".to_string(), format!("eq.{}", kind.as_str())));
    }

    match (filter.kind, filter.target_ids.as_slice()) {
        (_, []) => {}
        (Some(kind), [target_id]) => {
            params.push((kind.target_column().to_string(), format!("eq.{target_id}")));
        }
        (Some(kind), target_ids) => {
            params.push((
                kind.target_column().to_string(),
                format!("in.{}", in_list(target_ids)),
            ));
        }
        (None, target_ids) => {
            let list = in_list(target_ids);
            let any_column: Vec<String> = RelationshipKind::ALL
                .iter()
                .map(|kind| format!("{}.in.{}", kind.target_column(), list))
                .collect();
            params.push(("or".to_string(), format!("({})", any_column.join(","))));
        }
    }

    params
}

/// PostgREST query parameters selecting exactly one relationship tuple
pub(crate) fn key_params(key: &RelationshipKey) -> Vec<(String, String)> {
    vec![
        ("actor_id".to_string(), format!("eq.{}", key.actor_id)),
        ("kind".to_string(), format!("eq.{}", key.kind.as_str())),
        (
            key.kind.target_column().to_string(),
            format!("eq.{}", key.target_id),
        ),
    ]
}

/// Store backed by the hosted BaaS REST endpoint
pub struct RestStore {
    client: reqwest::Client,
    rest_url: String,
    anon_key: String,
    access_token: Option<String>,
    relationships_table: String,
    artists_table: String,
}

impl RestStore {
    /// Create a REST store for the given session
    ///
    /// Requests carry the anon key as `apikey` and the session's access token
    /// (falling back to the anon key) as bearer token.
    ///
    /// # Errors
    /// Returns error if URL or anon key are missing, or the HTTP client
    /// cannot be built
    pub fn new(config: &RestBackendConfig, session: &Session) -> Result<Self> {
        let url = config
            .url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .ok_or_else(|| AppError::Config("backend.rest.url is required".to_string()))?;
        let anon_key = config
            .anon_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or_else(|| AppError::Config("backend.rest.anon_key is required".to_string()))?;

        let client = reqwest::Client::builder()
            .user_agent("Jaipp/0.1.0")
            .timeout(std::time::Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            rest_url: format!("{}/rest/v1", url.trim_end_matches('/')),
            anon_key: anon_key.to_string(),
            access_token: session.access_token().map(str::to_string),
            relationships_table: config.relationships_table.clone(),
            artists_table: config.artists_table.clone(),
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/{}", self.rest_url, table)
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        let bearer = self.access_token.as_deref().unwrap_or(&self.anon_key);
        builder
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer)
    }

    /// Send a request, mapping transport failures and error statuses
    async fn send(&self, builder: RequestBuilder) -> Result<Response> {
        let response = self
            .authorize(builder)
            .send()
            .await
            .map_err(|e| AppError::RemoteUnavailable(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let error = map_error_response(status, &body);
        tracing::debug!(%status, %error, "Backend request failed");
        Err(error)
    }

    async fn fetch_relationships(&self, filter: &RelationshipFilter) -> Result<Vec<Relationship>> {
        let mut params = vec![
            ("select".to_string(), "*".to_string()),
            ("order".to_string(), "created_at.desc".to_string()),
        ];
        params.extend(filter_params(filter));

        let response = self
            .send(
                self.client
                    .get(self.table_url(&self.relationships_table))
                    .query(&params),
            )
            .await?;
        let rows: Vec<RelationshipRow> = response
            .json()
            .await
            .map_err(|e| AppError::InvalidData(e.to_string()))?;

        rows.into_iter().map(Relationship::try_from).collect()
    }

    async fn insert_relationship(&self, relationship: &Relationship) -> Result<Relationship> {
        let row = RelationshipRow::from(relationship);

        let response = self
            .send(
                self.client
                    .post(self.table_url(&self.relationships_table))
                    .header("Prefer", "return=representation")
                    .json(&row),
            )
            .await?;
        let rows: Vec<RelationshipRow> = response
            .json()
            .await
            .map_err(|e| AppError::InvalidData(e.to_string()))?;

        match rows.into_iter().next() {
            Some(row) => Relationship::try_from(row),
            None => Ok(relationship.clone()),
        }
    }

    async fn delete_relationship(&self, key: &RelationshipKey) -> Result<()> {
        let result = self
            .send(
                self.client
                    .delete(self.table_url(&self.relationships_table))
                    .query(&key_params(key)),
            )
            .await;

        match result {
            Ok(_) | Err(AppError::NotFound) => Ok(()),
            Err(error) => Err(error),
        }
    }

    async fn count_relationships(&self, filter: &RelationshipFilter) -> Result<u64> {
        let mut params = vec![("select".to_string(), "id".to_string())];
        params.extend(filter_params(filter));

        let result = self
            .send(
                self.client
                    .head(self.table_url(&self.relationships_table))
                    .header("Prefer", "count=exact")
                    .query(&params),
            )
            .await;

        let response = match result {
            Ok(response) => response,
            Err(AppError::NotFound) => return Ok(0),
            Err(error) => return Err(error),
        };

        let content_range = response
            .headers()
            .get(reqwest::header::CONTENT_RANGE)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| {
                AppError::InvalidData("count response has no Content-Range".to_string())
            })?;

        parse_content_range_total(content_range)
    }

    async fn fetch_artists(&self, term: &str) -> Result<Vec<Artist>> {
        let mut params = vec![
            ("select".to_string(), "*".to_string()),
            ("order".to_string(), "created_at.desc".to_string()),
        ];
        let term = term.trim();
        if !term.is_empty() {
            params.push((
                "name".to_string(),
                format!("ilike.*{}*", escape_like(term)),
            ));
        }

        let response = self
            .send(
                self.client
                    .get(self.table_url(&self.artists_table))
                    .query(&params),
            )
            .await?;

        response
            .json()
            .await
            .map_err(|e| AppError::InvalidData(e.to_string()))
    }
}

#[async_trait]
impl RelationshipStore for RestStore {
    async fn query(&self, filter: &RelationshipFilter) -> Result<Vec<Relationship>> {
        observe(BACKEND, "query", self.fetch_relationships(filter)).await
    }

    async fn insert(&self, relationship: &Relationship) -> Result<Relationship> {
        observe(BACKEND, "insert", self.insert_relationship(relationship)).await
    }

    async fn delete(&self, key: &RelationshipKey) -> Result<()> {
        observe(BACKEND, "delete", self.delete_relationship(key)).await
    }

    async fn count(&self, filter: &RelationshipFilter) -> Result<u64> {
        observe(BACKEND, "count", self.count_relationships(filter)).await
    }
}

#[async_trait]
impl ArtistCatalog for RestStore {
    async fn search_artists(&self, term: &str) -> Result<Vec<Artist>> {
        observe(BACKEND, "search_artists", self.fetch_artists(term)).await
    }
}
