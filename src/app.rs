#![cfg(feature = "web")]

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Extension, Multipart, Query, State, multipart::MultipartError},
    http::{StatusCode, header},
    middleware,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
};
use handlebars::Handlebars;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;

use crate::config::Config;
use crate::error::{AppError, AppResult, ErrorKind};
use crate::inventory::{Inventory, InventoryStore};
use crate::loader::SourceFormat;
use crate::login::{self, AuthContext, SessionStore};
use crate::upload::{ProcessSettings, UploadAction, UploadJob, process_upload};

pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

pub struct AppState {
    pub config: Config,
    pub sessions: SessionStore,
    pub inventory: InventoryStore,
    templates: Handlebars<'static>,
}

/// Messages carried through a redirect
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct FlashQuery {
    pub error: Option<String>,
    pub success: Option<String>,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self, handlebars::TemplateError> {
        let mut templates = Handlebars::new();
        templates.register_partial("flash", include_str!("./static/flash.html"))?;
        templates.register_template_string("login", include_str!("./static/login.html"))?;
        templates.register_template_string("home", include_str!("./static/home.html"))?;
        templates.register_template_string("upload", include_str!("./static/upload.html"))?;
        templates.register_template_string("pivot", include_str!("./static/pivottable.html"))?;
        templates.register_template_string("inventory", include_str!("./static/inventory.html"))?;

        Ok(AppState {
            inventory: InventoryStore::new(config.inventory_file.clone()),
            sessions: SessionStore::new(),
            config,
            templates,
        })
    }

    pub fn process_settings(&self) -> ProcessSettings {
        ProcessSettings {
            keyword: self.config.split_keyword.clone(),
            enable_pivot: self.config.enable_pivot,
            upload_dir: Some(self.config.upload_dir.clone()),
            output_dir: Some(self.config.output_dir.clone()),
        }
    }
}

/// Build the application router
///
/// Everything except `/login` and `/logout` sits behind [`login::require_auth`].
pub fn router(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .route("/", get(serve_home))
        .route("/split-by-artist", get(serve_split_page))
        .route("/pivot-table", get(serve_pivot_page))
        .route("/upload", post(handle_upload))
        .route("/inventory", get(serve_inventory))
        .route("/inventory/upload", post(handle_inventory_upload))
        .route("/inventory/download", get(download_inventory))
        .route("/api/inventory", get(get_inventory).post(replace_inventory))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            login::require_auth,
        ));

    Router::new()
        .route(
            "/login",
            get(login::serve_login_page).post(login::handle_login),
        )
        .route("/logout", get(login::handle_logout))
        .merge(protected)
        .layer(
            ServiceBuilder::new()
                .layer(DefaultBodyLimit::disable())
                .layer(RequestBodyLimitLayer::new(state.config.max_upload_bytes)),
        )
        .with_state(state)
}

pub async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    config.prepare_dirs()?;
    let address = config.bind_address();
    if config.enable_pivot {
        log::info!("pivot tables enabled");
    }

    let state = Arc::new(AppState::new(config)?);
    let app = router(state);

    // Start server
    let listener = TcpListener::bind(&address).await?;
    log::info!("Listening on http://{}", address);
    axum::serve(listener, app).await?;

    Ok(())
}

/// Render a registered template, or a 500 if rendering fails
pub fn render_page<T: Serialize>(state: &AppState, name: &str, data: &T) -> Response {
    match state.templates.render(name, data) {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            log::error!("failed to render {}: {}", name, e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to render page").into_response()
        }
    }
}

fn redirect_with_error(path: &str, message: &str) -> Response {
    Redirect::to(&format!("{}?error={}", path, urlencoding::encode(message))).into_response()
}

fn redirect_with_success(path: &str, message: &str) -> Response {
    Redirect::to(&format!("{}?success={}", path, urlencoding::encode(message))).into_response()
}

fn attachment(filename: &str, bytes: Vec<u8>) -> Response {
    (
        [
            (header::CONTENT_TYPE, XLSX_CONTENT_TYPE.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        bytes,
    )
        .into_response()
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self.kind() {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
            ErrorKind::IoFailure => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (
            status,
            Json(json!({
                "status": "error",
                "message": self.user_message(),
            })),
        )
            .into_response()
    }
}

fn multipart_error(e: MultipartError) -> AppError {
    AppError::invalid_input(format!("Could not read the upload: {}", e))
}

async fn serve_home(
    State(state): State<Arc<AppState>>,
    Query(flash): Query<FlashQuery>,
) -> Response {
    render_page(&state, "home", &flash)
}

async fn serve_split_page(
    State(state): State<Arc<AppState>>,
    Query(flash): Query<FlashQuery>,
) -> Response {
    render_page(
        &state,
        "upload",
        &json!({
            "error": flash.error,
            "keyword": state.config.split_keyword,
        }),
    )
}

async fn serve_pivot_page(
    State(state): State<Arc<AppState>>,
    Query(flash): Query<FlashQuery>,
) -> Response {
    render_page(
        &state,
        "pivot",
        &json!({
            "error": flash.error,
            "pivot_enabled": state.config.enable_pivot,
        }),
    )
}

async fn read_upload(mut multipart: Multipart) -> AppResult<UploadJob> {
    let mut job = UploadJob::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                job.filename = field.file_name().map(str::to_string);
                job.bytes = field.bytes().await.map_err(multipart_error)?.to_vec();
            }
            "action" => job.action = Some(field.text().await.map_err(multipart_error)?),
            "index_column" => job.index_column = Some(field.text().await.map_err(multipart_error)?),
            "value_column" => job.value_column = Some(field.text().await.map_err(multipart_error)?),
            _ => {}
        }
    }

    Ok(job)
}

/// Handle a split or pivot upload
///
/// Success returns the generated workbook as a download. Failure redirects
/// back to the page the form came from with the reason.
async fn handle_upload(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    multipart: Multipart,
) -> Response {
    let job = match read_upload(multipart).await {
        Ok(job) => job,
        Err(e) => return redirect_with_error("/split-by-artist", &e.user_message()),
    };

    let back = match job.action.as_deref().and_then(UploadAction::parse) {
        Some(UploadAction::Pivot) => "/pivot-table",
        _ => "/split-by-artist",
    };

    log::info!(
        "upload of {:?} ({} bytes, action {:?}) in session {}",
        job.filename,
        job.bytes.len(),
        job.action,
        &auth.session_id[..8]
    );

    let settings = state.process_settings();
    let result = tokio::task::spawn_blocking(move || process_upload(job, &settings))
        .await
        .unwrap_or_else(|e| Err(AppError::io_failure(format!("upload task failed: {}", e))));

    match result {
        Ok(file) => attachment(&file.filename, file.bytes),
        Err(e) => {
            match e.kind() {
                ErrorKind::IoFailure => log::error!("upload failed: {}", e),
                _ => log::warn!("upload rejected: {}", e),
            }
            redirect_with_error(back, &e.user_message())
        }
    }
}

async fn serve_inventory(
    State(state): State<Arc<AppState>>,
    Query(flash): Query<FlashQuery>,
) -> Response {
    let (inventory, error) = match state.inventory.read() {
        Ok(inventory) => (inventory, flash.error),
        Err(e) => {
            log::error!("could not read inventory: {}", e);
            (Inventory::default(), Some(e.user_message()))
        }
    };

    let rows: Vec<Vec<String>> = inventory
        .rows
        .iter()
        .map(|row| {
            (0..inventory.headers.len().max(row.len()))
                .map(|i| row.get(i).map(|c| c.to_string()).unwrap_or_default())
                .collect()
        })
        .collect();

    render_page(
        &state,
        "inventory",
        &json!({
            "error": error,
            "success": flash.success,
            "headers": inventory.headers,
            "rows": rows,
            "count": rows.len(),
        }),
    )
}

async fn get_inventory(State(state): State<Arc<AppState>>) -> AppResult<Json<Inventory>> {
    Ok(Json(state.inventory.read()?))
}

async fn replace_inventory(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    Json(inventory): Json<Inventory>,
) -> AppResult<Json<serde_json::Value>> {
    state.inventory.replace(&inventory)?;
    log::info!("inventory saved in session {}", &auth.session_id[..8]);

    Ok(Json(json!({
        "status": "ok",
        "records": inventory.rows.len(),
    })))
}

async fn handle_inventory_upload(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    mut multipart: Multipart,
) -> Response {
    let mut upload: Option<(String, Vec<u8>)> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return redirect_with_error("/inventory", &multipart_error(e).user_message()),
        };
        if field.name() != Some("file") {
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        match field.bytes().await {
            Ok(bytes) => upload = Some((filename, bytes.to_vec())),
            Err(e) => return redirect_with_error("/inventory", &multipart_error(e).user_message()),
        }
    }

    let (filename, bytes) = match upload {
        Some((filename, bytes)) if !filename.is_empty() && !bytes.is_empty() => (filename, bytes),
        _ => return redirect_with_error("/inventory", "Missing file."),
    };

    if SourceFormat::from_filename(&filename) != Some(SourceFormat::Excel)
        || !filename.to_lowercase().ends_with(".xlsx")
    {
        return redirect_with_error("/inventory", "The inventory must be an .xlsx workbook.");
    }

    let inventory = state.inventory.clone();
    let result = tokio::task::spawn_blocking(move || inventory.replace_file(bytes))
        .await
        .unwrap_or_else(|e| Err(AppError::io_failure(format!("upload task failed: {}", e))));

    match result {
        Ok(()) => {
            log::info!("inventory file uploaded in session {}", &auth.session_id[..8]);
            redirect_with_success("/inventory", "Inventory updated.")
        }
        Err(e) => {
            log::warn!("inventory upload rejected: {}", e);
            redirect_with_error("/inventory", &e.user_message())
        }
    }
}

async fn download_inventory(State(state): State<Arc<AppState>>) -> Response {
    let filename = state
        .inventory
        .path()
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("inventory.xlsx")
        .to_string();

    match state.inventory.read_bytes() {
        Ok(bytes) => attachment(&filename, bytes),
        Err(e) => e.into_response(),
    }
}
