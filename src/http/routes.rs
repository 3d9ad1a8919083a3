//! HTTP route definitions

use std::time::Duration;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{error, warn};

use crate::app::AppState;
use crate::store::{
    InventoryItem, InventorySummary, ItemSearchScope, LogEntry, LogStats, LogbookStore, NewItem,
    NewLogEntry, NewProfile, ProfileSearchScope, StoreError, UserProfile,
};
use crate::util::time::uptime_secs;
use crate::validation::{Field, FormInput, UnknownField, ValidationError};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Client-facing text for storage failures; the detail only goes to the log
const STORAGE_FAILURE: &str = "Storage is temporarily unavailable";

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    // CORS configuration - support multiple origins (comma-separated in CLIENT_ORIGIN)
    let allowed_origins: Vec<header::HeaderValue> = state
        .config
        .client_origin
        .split(',')
        .filter_map(|s| s.trim().parse::<header::HeaderValue>().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(true);

    let item_routes = Router::new()
        .route("/", get(list_items_handler).post(create_item_handler))
        .route("/summary", get(item_summary_handler))
        .route("/categories", get(item_categories_handler))
        .route("/export", get(export_items_handler))
        .route("/import", post(import_items_handler))
        .route(
            "/:code",
            get(get_item_handler)
                .put(update_item_handler)
                .delete(delete_item_handler),
        );

    let user_routes = Router::new()
        .route("/", get(list_users_handler).post(create_user_handler))
        .route("/export", get(export_users_handler))
        .route("/import", post(import_users_handler))
        .route(
            "/:id",
            get(get_user_handler)
                .put(update_user_handler)
                .delete(delete_user_handler),
        );

    let logbook_routes = Router::new()
        .route("/", get(list_logs_handler).post(create_log_handler))
        .route("/stats", get(log_stats_handler))
        .route("/export", get(export_logs_handler))
        .route(
            "/:id",
            get(get_log_handler)
                .put(update_log_handler)
                .delete(delete_log_handler),
        );

    Router::new()
        .route("/health", get(health_handler))
        .route("/validate", post(validate_handler))
        .nest("/items", item_routes)
        .nest("/users", user_routes)
        .nest("/logbook", logbook_routes)
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Run a SQLite-backed store call off the async runtime
async fn blocking<T, F>(f: F) -> Result<T, AppError>
where
    F: FnOnce() -> Result<T, StoreError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
        .map_err(AppError::from)
}

fn csv_response(body: String) -> Response {
    (
        [(header::CONTENT_TYPE, "text/csv; charset=utf-8")],
        body,
    )
        .into_response()
}

fn csv_body(body: Bytes) -> Result<String, AppError> {
    String::from_utf8(body.to_vec())
        .map_err(|_| AppError::BadRequest("CSV body must be UTF-8".to_string()))
}

#[derive(Deserialize)]
struct SearchQuery {
    #[serde(default)]
    q: String,
    #[serde(default)]
    scope: String,
}

#[derive(Serialize)]
struct ImportResponse {
    imported: usize,
}

// ============================================================================
// Health and validation endpoints
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    database: &'static str,
    logbook_enabled: bool,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: uptime_secs(),
        database: if state.config.in_memory() {
            "memory"
        } else {
            "file"
        },
        logbook_enabled: state.logbook_store.is_some(),
    })
}

#[derive(Deserialize)]
struct ValidateRequest {
    field: String,
    #[serde(default)]
    value: String,
}

#[derive(Serialize)]
struct ValidateResponse {
    field: Field,
    valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'static str>,
}

async fn validate_handler(
    State(state): State<AppState>,
    Json(req): Json<ValidateRequest>,
) -> Result<Json<ValidateResponse>, AppError> {
    let field: Field = req
        .field
        .parse()
        .map_err(|e: UnknownField| AppError::BadRequest(e.to_string()))?;

    let error = state
        .validator
        .validate(field, &req.value)
        .err()
        .map(|e| e.reason);

    Ok(Json(ValidateResponse {
        field,
        valid: error.is_none(),
        error,
    }))
}

// ============================================================================
// Inventory endpoints
// ============================================================================

async fn list_items_handler(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<InventoryItem>>, AppError> {
    let scope: ItemSearchScope = query.scope.parse().map_err(AppError::BadRequest)?;
    let store = state.inventory_store.clone();
    let items = blocking(move || store.search(&query.q, scope)).await?;
    Ok(Json(items))
}

async fn create_item_handler(
    State(state): State<AppState>,
    Json(form): Json<FormInput>,
) -> Result<(StatusCode, Json<InventoryItem>), AppError> {
    let item = NewItem::from_form(&form, &state.validator)?;
    let store = state.inventory_store.clone();
    let saved = blocking(move || store.insert(item)).await?;
    Ok((StatusCode::CREATED, Json(saved)))
}

async fn get_item_handler(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<InventoryItem>, AppError> {
    let store = state.inventory_store.clone();
    let lookup = code.clone();
    blocking(move || store.get(&lookup))
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Item '{code}' not found")))
}

async fn update_item_handler(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Json(mut form): Json<FormInput>,
) -> Result<Json<InventoryItem>, AppError> {
    // The path names the item; codes are not renamed through the body
    form.set("code", code.clone());
    let item = NewItem::from_form(&form, &state.validator)?;
    let store = state.inventory_store.clone();
    let saved = blocking(move || store.update(&code, item)).await?;
    Ok(Json(saved))
}

async fn delete_item_handler(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<StatusCode, AppError> {
    let store = state.inventory_store.clone();
    blocking(move || store.delete(&code)).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn item_summary_handler(
    State(state): State<AppState>,
) -> Result<Json<InventorySummary>, AppError> {
    let store = state.inventory_store.clone();
    Ok(Json(blocking(move || store.aggregate()).await?))
}

async fn item_categories_handler(
    State(state): State<AppState>,
) -> Result<Json<Vec<String>>, AppError> {
    let store = state.inventory_store.clone();
    Ok(Json(blocking(move || store.categories()).await?))
}

async fn export_items_handler(State(state): State<AppState>) -> Result<Response, AppError> {
    let store = state.inventory_store.clone();
    Ok(csv_response(blocking(move || store.export_csv()).await?))
}

async fn import_items_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<ImportResponse>, AppError> {
    let data = csv_body(body)?;
    let store = state.inventory_store.clone();
    let imported = blocking(move || store.import_csv(&data)).await?;
    Ok(Json(ImportResponse { imported }))
}

// ============================================================================
// User profile endpoints
// ============================================================================

async fn list_users_handler(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<UserProfile>>, AppError> {
    let scope: ProfileSearchScope = query.scope.parse().map_err(AppError::BadRequest)?;
    let store = state.profile_store.clone();
    let users = blocking(move || store.search(&query.q, scope)).await?;
    Ok(Json(users))
}

async fn create_user_handler(
    State(state): State<AppState>,
    Json(form): Json<FormInput>,
) -> Result<(StatusCode, Json<UserProfile>), AppError> {
    let profile = NewProfile::from_form(&form, &state.validator)?;
    let store = state.profile_store.clone();
    let saved = blocking(move || store.insert(profile)).await?;
    Ok((StatusCode::CREATED, Json(saved)))
}

async fn get_user_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<UserProfile>, AppError> {
    let store = state.profile_store.clone();
    blocking(move || store.get(id))
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("User '{id}' not found")))
}

async fn update_user_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(form): Json<FormInput>,
) -> Result<Json<UserProfile>, AppError> {
    let profile = NewProfile::from_form(&form, &state.validator)?;
    let store = state.profile_store.clone();
    let saved = blocking(move || store.update(id, profile)).await?;
    Ok(Json(saved))
}

async fn delete_user_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    let store = state.profile_store.clone();
    blocking(move || store.delete(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn export_users_handler(State(state): State<AppState>) -> Result<Response, AppError> {
    let store = state.profile_store.clone();
    Ok(csv_response(blocking(move || store.export_csv()).await?))
}

async fn import_users_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<ImportResponse>, AppError> {
    let data = csv_body(body)?;
    let store = state.profile_store.clone();
    let imported = blocking(move || store.import_csv(&data)).await?;
    Ok(Json(ImportResponse { imported }))
}

// ============================================================================
// Logbook endpoints
// ============================================================================

fn logbook(state: &AppState) -> Result<&LogbookStore, AppError> {
    state
        .logbook_store
        .as_ref()
        .ok_or_else(|| AppError::Unavailable("Logbook storage is not configured".to_string()))
}

async fn list_logs_handler(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<LogEntry>>, AppError> {
    Ok(Json(logbook(&state)?.search(&query.q).await?))
}

async fn create_log_handler(
    State(state): State<AppState>,
    Json(form): Json<FormInput>,
) -> Result<(StatusCode, Json<LogEntry>), AppError> {
    let store = logbook(&state)?;
    let entry = NewLogEntry::from_form(&form, &state.validator)?;
    Ok((StatusCode::CREATED, Json(store.insert(entry).await?)))
}

async fn get_log_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<LogEntry>, AppError> {
    logbook(&state)?
        .get(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Log entry '{id}' not found")))
}

async fn update_log_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(form): Json<FormInput>,
) -> Result<Json<LogEntry>, AppError> {
    let store = logbook(&state)?;
    let entry = NewLogEntry::from_form(&form, &state.validator)?;
    Ok(Json(store.update(id, entry).await?))
}

async fn delete_log_handler(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    logbook(&state)?.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn log_stats_handler(State(state): State<AppState>) -> Result<Json<LogStats>, AppError> {
    Ok(Json(logbook(&state)?.stats().await?))
}

async fn export_logs_handler(State(state): State<AppState>) -> Result<Response, AppError> {
    Ok(csv_response(logbook(&state)?.export_csv().await?))
}

// ============================================================================
// Error handling
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Validation(e) => e.into(),
            StoreError::Tabular(_) => AppError::BadRequest(err.to_string()),
            StoreError::DuplicateKey { .. } => AppError::Conflict(err.to_string()),
            StoreError::NotFound { .. } => AppError::NotFound(err.to_string()),
            StoreError::StorageUnavailable(detail) => {
                error!(error = %detail, "Storage failure");
                AppError::Unavailable(STORAGE_FAILURE.to_string())
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Unavailable(msg) => {
                warn!(error = %msg, "Storage unavailable");
                (StatusCode::SERVICE_UNAVAILABLE, msg)
            }
            AppError::Internal(msg) => {
                error!(error = %msg, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, Json(body)).into_response()
    }
}
