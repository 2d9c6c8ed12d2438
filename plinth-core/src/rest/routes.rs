use axum::{
    Router,
    routing::{delete, get, post, put},
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use super::handlers;
use crate::context::AppContext;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "plinth core API",
        version = "0.1.0",
        description = "Loopback REST surface of the plinth core process. Ephemeral port, started only once both backing stores are ready.",
        license(name = "MIT")
    ),
    tags(
        (name = "system", description = "Health and placeholders"),
        (name = "users", description = "User CRUD over the relational store"),
        (name = "settings", description = "Settings read/update")
    ),
    paths(
        handlers::health,
        handlers::list_users,
        handlers::create_user,
        handlers::delete_user,
        handlers::list_settings,
        handlers::update_setting,
        handlers::upload,
    ),
    components(schemas(
        handlers::Health,
        handlers::CreateUserRequest,
        handlers::UserCreated,
        handlers::UserDeleted,
        handlers::UpdateSettingRequest,
        handlers::SettingUpdated,
        handlers::UploadAck,
        handlers::ApiError,
    ))
)]
pub struct ApiDoc;

pub fn create_router(state: Arc<AppContext>) -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/api/health", get(handlers::health))
        .route("/api/users", get(handlers::list_users))
        .route("/api/users", post(handlers::create_user))
        .route("/api/users/{id}", delete(handlers::delete_user))
        .route("/api/settings", get(handlers::list_settings))
        .route("/api/settings/{key}", put(handlers::update_setting))
        .route("/api/upload", post(handlers::upload))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
