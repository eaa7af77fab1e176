//! Local HTTP interface.
//!
//! A thin adapter over the vault core: it parses requests into typed
//! bundles, calls the core, and renders HTML or JSON. Nothing here touches
//! the database or the storage directory directly.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/` | Dashboard with document count and upload form |
//! | `GET`  | `/documents` | HTML table of recent documents |
//! | `POST` | `/ingest` | Multipart upload from the dashboard form; redirects to `/` |
//! | `GET`  | `/api/documents` | Recent documents as JSON (`?limit=N`) |
//! | `POST` | `/api/documents` | Multipart upload; returns the created document |
//! | `GET`  | `/api/documents/{id}` | One document as JSON |
//! | `GET`  | `/api/stats` | Document count and preview diagnostics |
//! | `POST` | `/admin/reset` | Wipe stored files and metadata |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "duplicate_content", "message": "...", "existing_id": 3 } }
//! ```

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header::HeaderName, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::error::VaultError;
use crate::models::{Classification, Document};
use crate::reset::ResetReport;
use crate::session::ActiveSession;
use crate::vault::Vault;

const MAX_LIST_LIMIT: i64 = 1000;
const SESSION_NOTE_AFTER_RESET: &str = "serve (after reset)";

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    vault: Arc<Vault>,
    list_limit: i64,
    /// Session of the serving process; renewed after a reset wipes it.
    session: Option<Arc<ActiveSession>>,
    /// Serializes reset + session renewal.
    reset_lock: Arc<Mutex<()>>,
}

/// Builds the router. Split from [`run_server`] so tests can drive it
/// without binding a socket.
pub fn router(
    vault: Arc<Vault>,
    config: &ServerConfig,
    session: Option<Arc<ActiveSession>>,
) -> Router {
    let state = AppState {
        vault,
        list_limit: config.list_limit,
        session,
        reset_lock: Arc::new(Mutex::new(())),
    };

    Router::new()
        .route("/", get(handle_dashboard))
        .route("/documents", get(handle_documents_page))
        .route("/ingest", post(handle_form_ingest))
        .route(
            "/api/documents",
            get(handle_list_documents).post(handle_api_ingest),
        )
        .route("/api/documents/{id}", get(handle_get_document))
        .route("/api/stats", get(handle_stats))
        .route("/admin/reset", post(handle_reset))
        .route("/health", get(handle_health))
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Binds `config.bind`, announces the URL (opening it in a browser when
/// `config.open_browser` is set), and serves until `shutdown` resolves.
/// In-flight requests are allowed to finish.
pub async fn run_server<F>(
    vault: Arc<Vault>,
    config: &ServerConfig,
    session: Option<Arc<ActiveSession>>,
    shutdown: F,
) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(&config.bind).await?;
    let addr = listener.local_addr()?;
    let url = format!("http://{}/", addr);

    println!("PerDocMan running at {}", url);
    println!("Press Ctrl+C to stop.");
    tracing::info!(%addr, "server listening");

    if config.open_browser {
        open_in_browser(&url);
    }

    let app = router(vault, config, session);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}

/// Failing to launch a browser never stops the server.
fn open_in_browser(url: &str) {
    match open::that_detached(url) {
        Ok(()) => tracing::debug!(url, "opened browser"),
        Err(e) => tracing::warn!(url, error = %e, "could not open browser"),
    }
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
    /// Present for `duplicate_content`.
    #[serde(skip_serializing_if = "Option::is_none")]
    existing_id: Option<i64>,
}

pub struct AppError {
    status: StatusCode,
    code: String,
    message: String,
    existing_id: Option<i64>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
                existing_id: self.existing_id,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
        existing_id: None,
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: message.into(),
        existing_id: None,
    }
}

impl From<VaultError> for AppError {
    fn from(err: VaultError) -> Self {
        let status = match &err {
            VaultError::SourceNotFound(_) => StatusCode::BAD_REQUEST,
            VaultError::UnsupportedType { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            VaultError::DuplicateContent { .. } => StatusCode::CONFLICT,
            VaultError::DocumentNotFound(_) => StatusCode::NOT_FOUND,
            VaultError::Io(_) | VaultError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error = %err, "request failed");
        }
        let existing_id = match &err {
            VaultError::DuplicateContent { existing_id } => Some(*existing_id),
            _ => None,
        };
        AppError {
            status,
            code: err.code().to_string(),
            message: err.to_string(),
            existing_id,
        }
    }
}

// ============ Upload parsing ============

/// A validated upload: everything the core needs, nothing it doesn't.
///
/// The file part is spooled chunk by chunk into a temporary file under the
/// vault root, so memory use does not grow with the upload size. The spool
/// is deleted when the request is dropped.
#[derive(Debug)]
pub struct UploadRequest {
    pub file_name: String,
    pub spool: NamedTempFile,
    pub classification: Classification,
}

impl UploadRequest {
    /// Reads the `file`, `category`, `tags` and `doc_date` fields in any
    /// order. Unknown fields are ignored.
    async fn from_multipart(
        multipart: &mut Multipart,
        spool_dir: &std::path::Path,
    ) -> Result<Self, AppError> {
        let mut file: Option<(Option<String>, NamedTempFile)> = None;
        let mut classification = Classification::default();

        while let Some(mut field) = multipart
            .next_field()
            .await
            .map_err(|e| bad_request(e.body_text()))?
        {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "file" => {
                    let file_name = field.file_name().map(str::to_string);
                    let spool = spool_field(&mut field, spool_dir).await?;
                    file = Some((file_name, spool));
                }
                "category" | "tags" | "doc_date" => {
                    let value = field.text().await.map_err(|e| bad_request(e.body_text()))?;
                    match name.as_str() {
                        "category" => classification.category = Some(value),
                        "tags" => classification.tags = Some(value),
                        _ => classification.doc_date = Some(value),
                    }
                }
                _ => {}
            }
        }

        let (file_name, spool) = file.ok_or_else(|| bad_request("Missing form field: file"))?;
        let file_name = file_name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .ok_or_else(|| bad_request("No file selected"))?;

        let classification = classification.normalized();
        if let Some(date) = &classification.doc_date {
            NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|_| {
                bad_request(format!("doc_date must be YYYY-MM-DD, got '{}'", date))
            })?;
        }

        Ok(Self {
            file_name,
            spool,
            classification,
        })
    }
}

async fn spool_field(
    field: &mut axum::extract::multipart::Field<'_>,
    spool_dir: &std::path::Path,
) -> Result<NamedTempFile, AppError> {
    let spool = tempfile::Builder::new()
        .prefix(".upload-")
        .tempfile_in(spool_dir)
        .map_err(VaultError::from)?;
    let mut out = tokio::fs::File::from_std(spool.reopen().map_err(VaultError::from)?);

    while let Some(chunk) = field.chunk().await.map_err(|e| bad_request(e.body_text()))? {
        out.write_all(&chunk).await.map_err(VaultError::from)?;
    }
    out.flush().await.map_err(VaultError::from)?;
    Ok(spool)
}

/// Runs the ingestion on its own task so a dropped connection cannot
/// cancel it halfway.
async fn ingest_upload(vault: Arc<Vault>, upload: UploadRequest) -> Result<Document, AppError> {
    let task = tokio::spawn(async move {
        let mut reader = tokio::fs::File::open(upload.spool.path()).await?;
        let result = vault
            .ingest_reader(&mut reader, &upload.file_name, upload.classification)
            .await;
        drop(reader);
        drop(upload.spool);
        result
    });
    let doc = task
        .await
        .map_err(|e| internal(format!("ingestion task failed: {}", e)))??;
    Ok(doc)
}

// ============ Handlers ============

async fn handle_form_ingest(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Response, AppError> {
    let upload =
        UploadRequest::from_multipart(&mut multipart, &state.vault.paths().root).await?;
    let doc = ingest_upload(state.vault.clone(), upload).await?;
    let headers = [(HeaderName::from_static("x-document-id"), doc.id.to_string())];
    Ok((headers, Redirect::to("/")).into_response())
}

async fn handle_api_ingest(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Document>), AppError> {
    let upload =
        UploadRequest::from_multipart(&mut multipart, &state.vault.paths().root).await?;
    let doc = ingest_upload(state.vault.clone(), upload).await?;
    Ok((StatusCode::CREATED, Json(doc)))
}

#[derive(Debug, Deserialize)]
struct ListParams {
    limit: Option<i64>,
}

async fn handle_list_documents(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<Document>>, AppError> {
    let limit = params
        .limit
        .unwrap_or(state.list_limit)
        .clamp(1, MAX_LIST_LIMIT);
    let docs = state.vault.store().list_documents(limit).await?;
    Ok(Json(docs))
}

async fn handle_get_document(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Document>, AppError> {
    let doc = state.vault.store().get_document(id).await?;
    Ok(Json(doc))
}

#[derive(Serialize)]
struct StatsResponse {
    documents: i64,
    preview_failures: u64,
}

async fn handle_stats(State(state): State<AppState>) -> Result<Json<StatsResponse>, AppError> {
    Ok(Json(StatsResponse {
        documents: state.vault.store().count_documents().await?,
        preview_failures: state.vault.preview_failures(),
    }))
}

async fn handle_reset(State(state): State<AppState>) -> Result<Json<ResetReport>, AppError> {
    let _serialized = state.reset_lock.lock().await;
    let report = state.vault.reset().await?;

    // The wipe removed this process's session row along with the rest.
    if let Some(session) = &state.session {
        if let Err(e) = session.renew(SESSION_NOTE_AFTER_RESET).await {
            tracing::error!(error = %e, "could not reopen session after reset");
        }
    }
    Ok(Json(report))
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn handle_dashboard(State(state): State<AppState>) -> Result<Html<String>, AppError> {
    let count = state.vault.store().count_documents().await?;
    let paths = state.vault.paths();

    Ok(Html(format!(
        r#"<!doctype html>
<html>
<head>
  <meta charset="utf-8" />
  <title>PerDocMan</title>
</head>
<body>
  <h1>PerDocMan</h1>

  <p><strong>Documents indexed:</strong> {count}</p>
  <p><a href="/documents">View documents</a></p>
  <p><strong>Database:</strong> {db}</p>
  <p><strong>Vault Root:</strong> {root}</p>

  <hr/>
  <h2>Upload PDF</h2>
  <form method="POST" action="/ingest" enctype="multipart/form-data">
    <p><input type="file" name="file" accept=".pdf" required /></p>
    <p><label>Category <input type="text" name="category" /></label></p>
    <p><label>Tags <input type="text" name="tags" placeholder="bank,statement" /></label></p>
    <p><label>Document date <input type="date" name="doc_date" /></label></p>
    <button type="submit">Ingest</button>
  </form>
</body>
</html>"#,
        count = count,
        db = html_escape(&paths.db_path.display().to_string()),
        root = html_escape(&paths.root.display().to_string()),
    )))
}

async fn handle_documents_page(State(state): State<AppState>) -> Result<Html<String>, AppError> {
    let docs = state.vault.store().list_documents(state.list_limit).await?;

    let rows: String = if docs.is_empty() {
        "<tr><td colspan='6'>(no documents yet)</td></tr>".to_string()
    } else {
        docs.iter().map(document_row).collect()
    };

    Ok(Html(format!(
        r#"<!doctype html>
<html>
<head>
  <meta charset="utf-8" />
  <title>PerDocMan - Documents</title>
</head>
<body>
  <h1>Documents</h1>
  <p><a href="/">&larr; Back to Dashboard</a></p>
  <table border='1' cellpadding='6' cellspacing='0'>
    <thead><tr>
      <th>ID</th><th>Filename</th><th>Category</th><th>Tags</th><th>Doc Date</th><th>Ingested At</th>
    </tr></thead>
    <tbody>{rows}</tbody>
  </table>
</body>
</html>"#
    )))
}

fn document_row(doc: &Document) -> String {
    let opt = |v: &Option<String>| html_escape(v.as_deref().unwrap_or(""));
    format!(
        "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
        doc.id,
        html_escape(&doc.original_filename),
        opt(&doc.category),
        opt(&doc.tags),
        opt(&doc.doc_date),
        html_escape(&doc.ingested_at),
    )
}

fn html_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
