//! Common test utilities for E2E tests
//!
//! `MockBaas` is an in-process stand-in for the hosted backend's PostgREST
//! endpoint. It understands the subset of the dialect the REST store uses:
//! `eq.` / `in.(...)` / `ilike.*...*` filters, `order=created_at.desc`,
//! `Prefer: return=representation` and `Prefer: count=exact`.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use axum::Router;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use jaipp::config::{
    AppConfig, BackendConfig, BackendMode, LoggingConfig, RestBackendConfig, SearchConfig,
    SqliteBackendConfig,
};
use jaipp::session::Session;
use jaipp::{AppContext, data};
use serde_json::{Value, json};
use tempfile::TempDir;
use tokio::net::TcpListener;

pub const ANON_KEY: &str = "test-anon-key";

/// Request seen by the mock backend
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub table: String,
    pub apikey: Option<String>,
    pub authorization: Option<String>,
}

#[derive(Default)]
struct BaasState {
    relationships: Vec<Value>,
    artists: Vec<Value>,
    requests: Vec<RecordedRequest>,
    failure: Option<StatusCode>,
}

/// Mock hosted backend
pub struct MockBaas {
    pub addr: String,
    state: Arc<Mutex<BaasState>>,
}

impl MockBaas {
    /// Start a mock backend on a random port
    pub async fn start() -> Self {
        let state = Arc::new(Mutex::new(BaasState::default()));

        let app = Router::new()
            .route("/rest/v1/:table", axum::routing::any(handle_table))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr: format!("http://{}", addr),
            state,
        }
    }

    /// REST backend configuration pointing at this mock
    pub fn config(&self) -> AppConfig {
        AppConfig {
            backend: BackendConfig {
                mode: BackendMode::Rest,
                rest: RestBackendConfig {
                    url: Some(self.addr.clone()),
                    anon_key: Some(ANON_KEY.to_string()),
                    timeout_seconds: 5,
                    ..RestBackendConfig::default()
                },
                sqlite: SqliteBackendConfig::default(),
            },
            search: SearchConfig { debounce_ms: 250 },
            logging: test_logging(),
        }
    }

    /// Context for `session` backed by this mock
    pub async fn context(&self, session: Session) -> AppContext {
        AppContext::new(self.config(), session).await.unwrap()
    }

    /// Seed a relationship row
    pub fn seed_relationship(&self, actor_id: &str, target_id: &str, kind: data::RelationshipKind) {
        let relationship =
            data::Relationship::new(data::RelationshipKey::new(actor_id, target_id, kind));
        let row = serde_json::to_value(data::RelationshipRow::from(&relationship)).unwrap();
        self.state.lock().unwrap().relationships.push(row);
    }

    /// Seed an artist row
    pub fn seed_artist(&self, artist: &data::Artist) {
        let row = serde_json::to_value(artist).unwrap();
        self.state.lock().unwrap().artists.push(row);
    }

    /// Insert a raw relationship row, bypassing validation
    pub fn seed_raw_relationship(&self, row: Value) {
        self.state.lock().unwrap().relationships.push(row);
    }

    /// Answer every request with `status` until cleared
    pub fn fail_with(&self, status: Option<StatusCode>) {
        self.state.lock().unwrap().failure = status;
    }

    pub fn relationship_ids(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .relationships
            .iter()
            .filter_map(|row| row["id"].as_str().map(str::to_string))
            .collect()
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn request_count(&self) -> usize {
        self.state.lock().unwrap().requests.len()
    }
}

/// Context backed by a fresh SQLite file
pub async fn sqlite_context(session: Session) -> (AppContext, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let config = AppConfig {
        backend: BackendConfig {
            mode: BackendMode::Sqlite,
            rest: RestBackendConfig::default(),
            sqlite: SqliteBackendConfig {
                path: temp_dir.path().join("test.db"),
            },
        },
        search: SearchConfig { debounce_ms: 250 },
        logging: test_logging(),
    };

    let context = AppContext::new(config, session).await.unwrap();
    (context, temp_dir)
}

fn test_logging() -> LoggingConfig {
    LoggingConfig {
        level: "debug".to_string(),
        format: "pretty".to_string(),
    }
}

// =============================================================================
// PostgREST emulation
// =============================================================================

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

fn error_body(status: StatusCode, code: &str, message: &str) -> Response {
    (status, axum::Json(json!({ "code": code, "message": message }))).into_response()
}

/// Values of an `in.("a","b")` list
fn parse_in_list(list: &str) -> Vec<String> {
    let inner = list.trim_start_matches('(').trim_end_matches(')');
    let mut values = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut chars = inner.chars();

    while let Some(ch) = chars.next() {
        match ch {
            '\\' if quoted => {
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            '"' => quoted = !quoted,
            ',' if !quoted => values.push(std::mem::take(&mut current)),
            _ => current.push(ch),
        }
    }
    if !inner.is_empty() {
        values.push(current);
    }
    values
}

fn field_matches(row: &Value, column: &str, condition: &str) -> bool {
    let actual = row[column].as_str();

    if let Some(expected) = condition.strip_prefix("eq.") {
        actual == Some(expected)
    } else if let Some(list) = condition.strip_prefix("in.") {
        actual.is_some_and(|actual| parse_in_list(list).iter().any(|value| value == actual))
    } else if let Some(pattern) = condition.strip_prefix("ilike.") {
        let needle = pattern.trim_matches('*').replace('\\', "").to_lowercase();
        actual.is_some_and(|actual| actual.to_lowercase().contains(&needle))
    } else {
        false
    }
}

fn filter_rows(rows: &[Value], params: &[(String, String)]) -> Result<Vec<Value>, Response> {
    let mut filters = Vec::new();
    for (column, condition) in params {
        match column.as_str() {
            "select" | "order" => {}
            "or" => {
                return Err(error_body(
                    StatusCode::BAD_REQUEST,
                    "PGRST100",
                    "or filters are not supported by the mock",
                ));
            }
            _ => filters.push((column.as_str(), condition.as_str())),
        }
    }

    let mut matched: Vec<Value> = rows
        .iter()
        .filter(|row| {
            filters
                .iter()
                .all(|(column, condition)| field_matches(row, column, condition))
        })
        .cloned()
        .collect();

    if params
        .iter()
        .any(|(key, value)| key == "order" && value == "created_at.desc")
    {
        matched.sort_by(|a, b| {
            b["created_at"]
                .as_str()
                .unwrap_or_default()
                .cmp(a["created_at"].as_str().unwrap_or_default())
        });
    }

    Ok(matched)
}

async fn handle_table(
    State(state): State<Arc<Mutex<BaasState>>>,
    Path(table): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
    method: Method,
    headers: HeaderMap,
    body: String,
) -> Response {
    let mut state = state.lock().unwrap();

    state.requests.push(RecordedRequest {
        method: method.clone(),
        table: table.clone(),
        apikey: header(&headers, "apikey"),
        authorization: header(&headers, "authorization"),
    });

    if let Some(status) = state.failure {
        return error_body(status, "", "injected failure");
    }
    if header(&headers, "apikey").as_deref() != Some(ANON_KEY) {
        return error_body(StatusCode::UNAUTHORIZED, "", "No API key found in request");
    }

    let state = &mut *state;
    let rows = match table.as_str() {
        "relationships" => &mut state.relationships,
        "artists" => &mut state.artists,
        _ => return error_body(StatusCode::NOT_FOUND, "42P01", "relation does not exist"),
    };

    match method {
        Method::GET => match filter_rows(rows, &params) {
            Ok(matched) => axum::Json(matched).into_response(),
            Err(response) => response,
        },
        Method::HEAD => match filter_rows(rows, &params) {
            Ok(matched) => {
                let total = matched.len();
                let range = if total == 0 {
                    "*/0".to_string()
                } else {
                    format!("0-{}/{}", total - 1, total)
                };
                (StatusCode::OK, [("content-range", range)]).into_response()
            }
            Err(response) => response,
        },
        Method::POST => {
            let row: Value = match serde_json::from_str(&body) {
                Ok(row) => row,
                Err(e) => return error_body(StatusCode::BAD_REQUEST, "PGRST102", &e.to_string()),
            };
            if rows.iter().any(|existing| existing["id"] == row["id"]) {
                return error_body(
                    StatusCode::CONFLICT,
                    "23505",
                    "duplicate key value violates unique constraint \"relationships_pkey\"",
                );
            }
            rows.push(row.clone());

            let representation = header(&headers, "prefer")
                .is_some_and(|prefer| prefer.contains("return=representation"));
            if representation {
                (StatusCode::CREATED, axum::Json(vec![row])).into_response()
            } else {
                StatusCode::CREATED.into_response()
            }
        }
        Method::DELETE => match filter_rows(rows, &params) {
            Ok(matched) => {
                rows.retain(|row| !matched.contains(row));
                StatusCode::NO_CONTENT.into_response()
            }
            Err(response) => response,
        },
        _ => StatusCode::METHOD_NOT_ALLOWED.into_response(),
    }
}

