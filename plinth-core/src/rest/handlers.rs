//! REST handlers.
//!
//! Every store-touching route runs the same readiness-aware pattern as the
//! boundary channel: wait on the gate, then use the handle. Failures map to
//! JSON `{error}` bodies, never to a crash.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::error;
use utoipa::ToSchema;

use crate::context::AppContext;
use crate::ready::StoreKind;
use crate::relational::SqlStore;

/// API error response
#[derive(Serialize, ToSchema)]
pub struct ApiError {
    pub error: String,
    #[serde(skip)]
    pub code: u16,
}

impl ApiError {
    fn bad_request(msg: impl Into<String>) -> Self {
        Self {
            error: msg.into(),
            code: 400,
        }
    }

    fn unavailable(msg: impl Into<String>) -> Self {
        Self {
            error: msg.into(),
            code: 503,
        }
    }

    fn internal(msg: impl Into<String>) -> Self {
        Self {
            error: msg.into(),
            code: 500,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.code {
            400 => StatusCode::BAD_REQUEST,
            404 => StatusCode::NOT_FOUND,
            503 => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        error!(error = %format!("{e:#}"), "database error");
        Self::internal(format!("{e:#}"))
    }
}

/// Gate wait + handle fetch, shared by every relational route.
async fn relational(state: &AppContext) -> Result<&SqlStore, ApiError> {
    state
        .gate
        .wait(StoreKind::Relational)
        .await
        .map_err(|_| ApiError::unavailable("Database not ready"))?;
    state
        .sql()
        .ok_or_else(|| ApiError::unavailable("Database not ready"))
}

// === Health ===

/// Health check payload
#[derive(Serialize, ToSchema)]
pub struct Health {
    pub status: String,
    pub timestamp: String,
}

/// Liveness probe
#[utoipa::path(
    get,
    path = "/api/health",
    responses(
        (status = 200, description = "Service is up", body = Health)
    ),
    tag = "system"
)]
pub async fn health() -> Json<Health> {
    Json(Health {
        status: "OK".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

// === Users ===

/// Request to create a user
#[derive(Deserialize, ToSchema)]
pub struct CreateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
}

/// Created user
#[derive(Serialize, ToSchema)]
pub struct UserCreated {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub message: String,
}

/// List users, newest first
#[utoipa::path(
    get,
    path = "/api/users",
    responses(
        (status = 200, description = "All users", body = Object),
        (status = 503, description = "Store not ready", body = ApiError)
    ),
    tag = "users"
)]
pub async fn list_users(State(state): State<Arc<AppContext>>) -> Result<Json<Value>, ApiError> {
    let store = relational(&state).await?;
    let rows = store
        .all("SELECT * FROM users ORDER BY created_at DESC", &[])
        .await?;
    Ok(Json(Value::Array(rows)))
}

/// Create a user
#[utoipa::path(
    post,
    path = "/api/users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = UserCreated),
        (status = 400, description = "Missing name or email", body = ApiError)
    ),
    tag = "users"
)]
pub async fn create_user(
    State(state): State<Arc<AppContext>>,
    Json(req): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserCreated>), ApiError> {
    // Validate before touching the store.
    let (Some(name), Some(email)) = (req.name, req.email) else {
        return Err(ApiError::bad_request("Name and email are required"));
    };
    if name.is_empty() || email.is_empty() {
        return Err(ApiError::bad_request("Name and email are required"));
    }

    let store = relational(&state).await?;
    let (id, _) = store
        .run(
            "INSERT INTO users (name, email) VALUES (?, ?)",
            &[Value::String(name.clone()), Value::String(email.clone())],
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(UserCreated {
            id,
            name,
            email,
            message: "User created successfully".to_string(),
        }),
    ))
}

/// Deletion outcome
#[derive(Serialize, ToSchema)]
pub struct UserDeleted {
    pub changes: u64,
    pub message: String,
}

/// Delete a user by id
#[utoipa::path(
    delete,
    path = "/api/users/{id}",
    params(
        ("id" = i64, Path, description = "User id")
    ),
    responses(
        (status = 200, description = "Deletion applied", body = UserDeleted)
    ),
    tag = "users"
)]
pub async fn delete_user(
    State(state): State<Arc<AppContext>>,
    Path(id): Path<i64>,
) -> Result<Json<UserDeleted>, ApiError> {
    let store = relational(&state).await?;
    let (_, changes) = store
        .run("DELETE FROM users WHERE id = ?", &[Value::from(id)])
        .await?;
    Ok(Json(UserDeleted {
        changes,
        message: "User deleted successfully".to_string(),
    }))
}

// === Settings ===

/// Request to update a setting
#[derive(Deserialize, ToSchema)]
pub struct UpdateSettingRequest {
    #[schema(value_type = Object)]
    pub value: Value,
}

/// Updated setting
#[derive(Serialize, ToSchema)]
pub struct SettingUpdated {
    pub key: String,
    #[schema(value_type = Object)]
    pub value: Value,
    pub message: String,
}

/// List all settings
#[utoipa::path(
    get,
    path = "/api/settings",
    responses(
        (status = 200, description = "All settings", body = Object),
        (status = 503, description = "Store not ready", body = ApiError)
    ),
    tag = "settings"
)]
pub async fn list_settings(State(state): State<Arc<AppContext>>) -> Result<Json<Value>, ApiError> {
    let store = relational(&state).await?;
    let rows = store.all("SELECT * FROM settings", &[]).await?;
    Ok(Json(Value::Array(rows)))
}

/// Update one setting
#[utoipa::path(
    put,
    path = "/api/settings/{key}",
    params(
        ("key" = String, Path, description = "Setting key")
    ),
    request_body = UpdateSettingRequest,
    responses(
        (status = 200, description = "Setting updated", body = SettingUpdated)
    ),
    tag = "settings"
)]
pub async fn update_setting(
    State(state): State<Arc<AppContext>>,
    Path(key): Path<String>,
    Json(req): Json<UpdateSettingRequest>,
) -> Result<Json<SettingUpdated>, ApiError> {
    let store = relational(&state).await?;
    store
        .run(
            "UPDATE settings SET value = ?, updated_at = CURRENT_TIMESTAMP WHERE key = ?",
            &[req.value.clone(), Value::String(key.clone())],
        )
        .await?;
    Ok(Json(SettingUpdated {
        key,
        value: req.value,
        message: "Setting updated successfully".to_string(),
    }))
}

// === Upload ===

/// Upload acknowledgment
#[derive(Serialize, ToSchema)]
pub struct UploadAck {
    pub message: String,
}

/// Placeholder upload endpoint: accepts the request, acknowledges only.
#[utoipa::path(
    post,
    path = "/api/upload",
    responses(
        (status = 200, description = "Endpoint ready", body = UploadAck)
    ),
    tag = "system"
)]
pub async fn upload() -> Json<UploadAck> {
    Json(UploadAck {
        message: "File upload endpoint ready".to_string(),
    })
}
