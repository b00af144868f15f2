#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::HashMap;

use konty_portal::catalog::ModuleDescriptor;
use konty_portal::config::{DocumentsConfig, StoreConfig};
use konty_portal::datastore::MemoryDataStore;
use konty_portal::permissions::Grant;
use konty_portal::portal::Portal;
use konty_portal::session::{Identity, Session};
use konty_portal::storage::{KeyValueStorage, MemoryStorage};
use konty_portal::sync::SyncChannel;

pub const ALICE: &str = "6f1f3c3e-0000-4000-8000-00000000a11c";
pub const BOB: &str = "6f1f3c3e-0000-4000-8000-000000000b0b";

pub fn sample_modules() -> Vec<ModuleDescriptor> {
    vec![
        ModuleDescriptor::new("separador-pdf", "Separador de PDF", "/modulos/separador-pdf")
            .with_description("Divide PDFs de recibos por funcionário")
            .with_category("Folha"),
        ModuleDescriptor::new("conciliacao", "Conciliação Bancária", "/modulos/conciliacao")
            .with_category("Financeiro"),
        ModuleDescriptor::new("relatorios", "Relatórios", "/modulos/relatorios"),
    ]
}

/// Portal wired to in-memory collaborators, with handles kept for assertions
pub struct Harness {
    pub portal: Portal,
    pub store: Arc<MemoryDataStore>,
    pub storage: Arc<MemoryStorage>,
    pub session: Arc<Session>,
    pub channel: Arc<SyncChannel>,
}

impl Harness {
    pub fn new(store: MemoryDataStore, storage: MemoryStorage, identity: Option<&str>) -> Self {
        let store = Arc::new(store);
        let storage = Arc::new(storage);
        let session = Arc::new(match identity {
            Some(id) => Session::signed_in(Identity::new(id).with_email(format!("{}@konty.com.br", &id[..4]))),
            None => Session::anonymous(),
        });
        let channel = SyncChannel::new();
        let portal = Portal::new(
            store.clone(),
            session.clone(),
            storage.clone() as Arc<dyn KeyValueStorage>,
            channel.clone(),
        );
        Self {
            portal,
            store,
            storage,
            session,
            channel,
        }
    }

    /// Alice holds every sample module except `relatorios`
    pub fn alice() -> Self {
        let store = MemoryDataStore::new(sample_modules())
            .with_grant(Grant::active(ALICE, "separador-pdf"))
            .with_grant(Grant::active(ALICE, "conciliacao"));
        Self::new(store, MemoryStorage::new(), Some(ALICE))
    }

    pub fn stored(&self, identity: &str) -> Option<String> {
        self.storage
            .get(&format!("moduleFavorites_{}", identity))
            .ok()
            .flatten()
    }
}

/// What the mock backend has seen and how it should misbehave
#[derive(Debug, Default)]
pub struct MockState {
    pub modules: Vec<Value>,
    pub grants: Vec<Value>,
    pub profiles: Vec<Value>,
    pub upserts: Vec<Value>,
    pub deleted: Vec<String>,
    pub reject_auth: bool,
    pub pdf_delay: Option<Duration>,
    pub pdf_failure: Option<(u16, Value)>,
    pub pdf_disposition: Option<String>,
    pub last_upload: Option<Vec<u8>>,
    /// email -> (password, user object returned on sign-in)
    pub accounts: HashMap<String, (String, Value)>,
    pub passwords_set: Vec<(String, String)>,
}

impl MockState {
    pub fn with_account(mut self, email: &str, password: &str, id: &str) -> Self {
        let user = json!({
            "id": id,
            "email": email,
            "user_metadata": { "full_name": "Alice Konty" }
        });
        self.accounts.insert(email.to_string(), (password.to_string(), user));
        self
    }
}

type Shared = Arc<Mutex<MockState>>;

/// In-process stand-in for the BaaS REST API and the document backend
pub struct MockBackend {
    pub base_url: String,
    pub state: Shared,
}

impl MockBackend {
    pub async fn start(state: MockState) -> Result<Self> {
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);
        let state: Shared = Arc::new(Mutex::new(state));

        let app = Router::new()
            .route("/rest/v1/modulos", get(list_modules))
            .route("/rest/v1/permissoes", get(list_grants).post(upsert_grant))
            .route("/rest/v1/profiles", get(list_profiles))
            .route("/auth/v1/token", post(issue_token))
            .route("/auth/v1/user", put(update_user))
            .route("/auth/v1/invite", post(invite))
            .route("/auth/v1/admin/users/:id", delete(delete_user))
            .route("/processar-pdf", post(split_pdf))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port)).await?;
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Ok(Self { base_url, state })
    }

    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            url: self.base_url.clone(),
            anon_key: "anon-key".to_string(),
            request_timeout_secs: 5,
            catalog_table: "modulos".to_string(),
            grants_table: "permissoes".to_string(),
            profiles_table: "profiles".to_string(),
        }
    }

    pub fn documents_config(&self, upload_timeout_secs: u64) -> DocumentsConfig {
        DocumentsConfig {
            api_url: self.base_url.clone(),
            upload_timeout_secs,
            default_archive_name: "recibos_processados.zip".to_string(),
            max_upload_bytes: 1024 * 1024,
            module_key: "separador-pdf".to_string(),
        }
    }

    pub fn state(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }
}

fn authorized(state: &MockState, headers: &HeaderMap) -> bool {
    !state.reject_auth && headers.contains_key("apikey") && headers.contains_key(header::AUTHORIZATION)
}

fn unauthorized() -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({ "message": "JWT expired" }))).into_response()
}

/// Value of a PostgREST `eq.` filter
fn eq_filter<'a>(params: &'a HashMap<String, String>, column: &str) -> Option<&'a str> {
    params.get(column).and_then(|v| v.strip_prefix("eq."))
}

async fn list_modules(State(state): State<Shared>, headers: HeaderMap) -> Response {
    let state = state.lock().unwrap();
    if !authorized(&state, &headers) {
        return unauthorized();
    }
    Json(state.modules.clone()).into_response()
}

async fn list_grants(
    State(state): State<Shared>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let state = state.lock().unwrap();
    if !authorized(&state, &headers) {
        return unauthorized();
    }
    let user = eq_filter(&params, "user_id");
    let rows: Vec<Value> = state
        .grants
        .iter()
        .filter(|g| user.map_or(true, |u| g["user_id"] == u))
        .cloned()
        .collect();
    Json(rows).into_response()
}

async fn upsert_grant(State(state): State<Shared>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    let mut state = state.lock().unwrap();
    if !authorized(&state, &headers) {
        return unauthorized();
    }
    let merge = headers
        .get("Prefer")
        .and_then(|v| v.to_str().ok())
        .map_or(false, |v| v.contains("merge-duplicates"));
    if !merge {
        return (StatusCode::CONFLICT, Json(json!({ "message": "duplicate key" }))).into_response();
    }
    state.upserts.push(body);
    StatusCode::CREATED.into_response()
}

async fn list_profiles(
    State(state): State<Shared>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let state = state.lock().unwrap();
    if !authorized(&state, &headers) {
        return unauthorized();
    }
    let id = eq_filter(&params, "id");
    let rows: Vec<Value> = state
        .profiles
        .iter()
        .filter(|p| id.map_or(true, |id| p["id"] == id))
        .cloned()
        .collect();
    Json(rows).into_response()
}

async fn issue_token(
    State(state): State<Shared>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
    Json(body): Json<Value>,
) -> Response {
    let state = state.lock().unwrap();
    if !headers.contains_key("apikey") || params.get("grant_type").map(String::as_str) != Some("password") {
        return (StatusCode::UNPROCESSABLE_ENTITY, Json(json!({ "msg": "unsupported grant type" }))).into_response();
    }
    let email = body["email"].as_str().unwrap_or_default();
    let password = body["password"].as_str().unwrap_or_default();
    match state.accounts.get(email) {
        Some((expected, user)) if expected == password => Json(json!({
            "access_token": format!("token-for-{}", user["id"].as_str().unwrap_or_default()),
            "token_type": "bearer",
            "expires_in": 3600,
            "refresh_token": "refresh-1",
            "user": user,
        }))
        .into_response(),
        _ => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "invalid_grant", "error_description": "Invalid login credentials" })),
        )
            .into_response(),
    }
}

async fn update_user(State(state): State<Shared>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    let mut state = state.lock().unwrap();
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string);
    let Some(bearer) = bearer.filter(|b| b.starts_with("token-for-")) else {
        return unauthorized();
    };
    if state.reject_auth {
        return unauthorized();
    }
    let password = body["password"].as_str().unwrap_or_default().to_string();
    state.passwords_set.push((bearer, password));
    Json(json!({ "id": "updated" })).into_response()
}

async fn invite(State(state): State<Shared>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    let state = state.lock().unwrap();
    if !authorized(&state, &headers) {
        return unauthorized();
    }
    Json(json!({ "id": "7a7a7a7a-0000-4000-8000-000000000001", "email": body["email"] })).into_response()
}

async fn delete_user(State(state): State<Shared>, headers: HeaderMap, Path(id): Path<String>) -> Response {
    let mut state = state.lock().unwrap();
    if !authorized(&state, &headers) {
        return unauthorized();
    }
    state.deleted.push(id);
    Json(json!({})).into_response()
}

async fn split_pdf(State(state): State<Shared>, body: Bytes) -> Response {
    let (delay, failure, disposition) = {
        let mut state = state.lock().unwrap();
        state.last_upload = Some(body.to_vec());
        (state.pdf_delay, state.pdf_failure.clone(), state.pdf_disposition.clone())
    };

    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
    if let Some((status, body)) = failure {
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        return (status, Json(body)).into_response();
    }

    let mut response = (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/zip")],
        b"PK\x03\x04fake-zip".to_vec(),
    )
        .into_response();
    if let Some(disposition) = disposition {
        if let Ok(value) = disposition.parse() {
            response.headers_mut().insert(header::CONTENT_DISPOSITION, value);
        }
    }
    response
}

/// Minimal PDF bytes; the backend mock never parses them
pub fn pdf_bytes() -> Vec<u8> {
    b"%PDF-1.4\n1 0 obj\n<<>>\nendobj\ntrailer\n<<>>\n%%EOF\n".to_vec()
}
