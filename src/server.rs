//! Web front end.
//!
//! Serves the single page and the form actions behind it. Every action
//! mutates the caller's session and answers with a `303 See Other` back to
//! `/` (post/redirect/get), so a reload never repeats an upload or question.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/` | Process pending uploads, render the page |
//! | `POST` | `/upload` | Multipart field `file` |
//! | `POST` | `/delete` | Form field `name` |
//! | `POST` | `/ask` | Form field `question` |
//! | `POST` | `/clear` | Empty the conversation |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Sessions
//!
//! A browser session is identified by the `ask_docs_session` cookie (a v4
//! UUID). Unknown or missing ids get a fresh session and a `Set-Cookie`.
//! A session idle for `[server].session_idle_minutes` is dropped on the next
//! lookup, and at most `[server].max_sessions` are kept; when full, the least
//! recently seen one makes room.
//!
//! # Error Contract
//!
//! Failures the user can act on become banners on the page. Anything else is
//! returned as JSON:
//!
//! ```json
//! { "error": { "code": "internal", "message": "..." } }
//! ```

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};
use uuid::Uuid;

use crate::app::App;
use crate::config::Config;
use crate::render;
use crate::session::Session;

pub const SESSION_COOKIE: &str = "ask_docs_session";

type SessionHandle = Arc<Mutex<Session>>;

struct SessionEntry {
    handle: SessionHandle,
    last_seen: Instant,
}

/// Live sessions by cookie id, with idle expiry and a size cap.
struct SessionRegistry {
    entries: HashMap<Uuid, SessionEntry>,
    idle_timeout: Duration,
    max_sessions: usize,
}

impl SessionRegistry {
    fn new(idle_timeout: Duration, max_sessions: usize) -> Self {
        Self {
            entries: HashMap::new(),
            idle_timeout,
            max_sessions: max_sessions.max(1),
        }
    }

    /// Returns the session for `id`, creating one if the id is missing,
    /// unknown or expired. The flag is true for a newly created session.
    fn get_or_create(&mut self, id: Option<Uuid>, now: Instant) -> (Uuid, SessionHandle, bool) {
        self.evict_idle(now);
        if let Some(id) = id {
            if let Some(entry) = self.entries.get_mut(&id) {
                entry.last_seen = now;
                return (id, entry.handle.clone(), false);
            }
        }

        while self.entries.len() >= self.max_sessions {
            self.evict_least_recent();
        }
        let id = Uuid::new_v4();
        let handle = Arc::new(Mutex::new(Session::new()));
        self.entries.insert(
            id,
            SessionEntry {
                handle: handle.clone(),
                last_seen: now,
            },
        );
        info!(session = %id, live = self.entries.len(), "new session");
        (id, handle, true)
    }

    fn evict_idle(&mut self, now: Instant) {
        let before = self.entries.len();
        let timeout = self.idle_timeout;
        self.entries
            .retain(|_, entry| now.saturating_duration_since(entry.last_seen) < timeout);
        let evicted = before - self.entries.len();
        if evicted > 0 {
            debug!(evicted, live = self.entries.len(), "dropped idle sessions");
        }
    }

    fn evict_least_recent(&mut self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_seen)
            .map(|(id, _)| *id);
        if let Some(id) = oldest {
            self.entries.remove(&id);
            debug!(session = %id, "session limit reached, dropped least recently seen");
        }
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    app: Arc<App>,
    sessions: Arc<Mutex<SessionRegistry>>,
}

impl AppState {
    pub fn new(app: Arc<App>) -> Self {
        let server = &app.config().server;
        let registry = SessionRegistry::new(
            Duration::from_secs(server.session_idle_minutes.saturating_mul(60)),
            server.max_sessions,
        );
        Self {
            app,
            sessions: Arc::new(Mutex::new(registry)),
        }
    }

    /// Looks up the caller's session, creating one if the cookie is missing
    /// or unknown. The flag is true for a newly created session.
    async fn session_for(&self, headers: &HeaderMap) -> (Uuid, SessionHandle, bool) {
        self.sessions
            .lock()
            .await
            .get_or_create(session_id(headers), Instant::now())
    }

    /// Number of sessions currently held.
    pub async fn session_count(&self) -> usize {
        self.sessions.lock().await.len()
    }
}

/// Starts the web app on `[server].bind`. Runs until the process is terminated.
pub async fn run_server(config: Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let app = Arc::new(App::from_config(config)?);
    let listener = TcpListener::bind(&bind_addr).await?;
    println!("Ask Your Documents listening on http://{}", bind_addr);
    serve(app, listener).await
}

/// Serves on an already bound listener.
pub async fn serve(app: Arc<App>, listener: TcpListener) -> anyhow::Result<()> {
    axum::serve(listener, router(AppState::new(app))).await?;
    Ok(())
}

pub fn router(state: AppState) -> Router {
    let max_upload = state.app.config().server.max_upload_mb * 1024 * 1024;
    Router::new()
        .route("/", get(handle_index))
        .route(
            "/upload",
            post(handle_upload).layer(DefaultBodyLimit::max(max_upload)),
        )
        .route("/delete", post(handle_delete))
        .route("/ask", post(handle_ask))
        .route("/clear", post(handle_clear))
        .route("/health", get(handle_health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn session_id(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .and_then(|(_, value)| Uuid::parse_str(value).ok())
}

/// Attaches the session cookie when the session was just created.
fn with_session_cookie(mut response: Response, id: Uuid, is_new: bool) -> Response {
    if is_new {
        let cookie = format!("{}={}; Path=/; HttpOnly; SameSite=Lax", SESSION_COOKIE, id);
        if let Ok(value) = HeaderValue::from_str(&cookie) {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
    }
    response
}

fn back_to_page(id: Uuid, is_new: bool) -> Response {
    with_session_cookie(Redirect::to("/").into_response(), id, is_new)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable error code (`"bad_request"` or `"internal"`).
    code: String,
    message: String,
}

/// Error type that converts into an Axum HTTP response.
struct HttpError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for HttpError {
    fn from(err: anyhow::Error) -> Self {
        tracing::error!(error = %err, "request failed");
        HttpError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "internal".to_string(),
            message: err.to_string(),
        }
    }
}

fn bad_request(message: impl Into<String>) -> HttpError {
    HttpError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

// ============ GET / ============

async fn handle_index(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, HttpError> {
    let (id, handle, is_new) = state.session_for(&headers).await;
    let mut session = handle.lock().await;
    state.app.ensure_ready(&mut session).await?;
    let view = state.app.view(&mut session)?;
    Ok(with_session_cookie(
        Html(render::page(&view)).into_response(),
        id,
        is_new,
    ))
}

// ============ POST /upload ============

async fn handle_upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Response, HttpError> {
    let (id, handle, is_new) = state.session_for(&headers).await;
    let mut received = false;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("failed to read multipart field: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| bad_request(format!("failed to read upload: {}", e)))?;

        let mut session = handle.lock().await;
        state.app.upload(&mut session, &filename, &data)?;
        received = true;
    }

    if !received {
        return Err(bad_request("multipart field 'file' is required"));
    }
    Ok(back_to_page(id, is_new))
}

// ============ POST /delete ============

#[derive(Deserialize)]
struct DeleteForm {
    name: String,
}

async fn handle_delete(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<DeleteForm>,
) -> Result<Response, HttpError> {
    let (id, handle, is_new) = state.session_for(&headers).await;
    let mut session = handle.lock().await;
    state.app.delete(&mut session, &form.name)?;
    Ok(back_to_page(id, is_new))
}

// ============ POST /ask ============

#[derive(Deserialize)]
struct AskForm {
    #[serde(default)]
    question: String,
}

async fn handle_ask(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<AskForm>,
) -> Result<Response, HttpError> {
    let (id, handle, is_new) = state.session_for(&headers).await;
    let mut session = handle.lock().await;
    state.app.ask(&mut session, &form.question).await?;
    Ok(back_to_page(id, is_new))
}

// ============ POST /clear ============

async fn handle_clear(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let (id, handle, is_new) = state.session_for(&headers).await;
    let mut session = handle.lock().await;
    state.app.clear(&mut session);
    back_to_page(id, is_new)
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    /// Always `"ok"` when the server is running.
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
