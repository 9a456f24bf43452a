//! Axum Router Configuration
//!
//! This module defines the complete HTTP routing for the application,
//! including the REST API, WebSocket endpoint, and OpenAPI documentation.

use crate::{
    handlers,
    models::{ErrorResponse, HealthResponse, PersonaSummary, PersonasResponse},
    state::AppState,
    ws::ws_handler,
};

use axum::{Router, routing::get};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health,
        handlers::list_personas,
        handlers::get_persona,
    ),
    components(
        schemas(HealthResponse, PersonaSummary, PersonasResponse, ErrorResponse)
    ),
    tags(
        (name = "Live Sales Coach API", description = "Health, practice personas and the live coaching WebSocket")
    )
)]
pub struct ApiDoc;

/// Creates the main Axum router for the application.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    // Group all routes that require AppState into their own router.
    let api_router = Router::new()
        .route("/health", get(handlers::health))
        .route("/api/personas", get(handlers::list_personas))
        .route("/api/personas/{id}", get(handlers::get_persona))
        .route("/ws", get(ws_handler))
        .with_state(app_state);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(api_router)
}
