//! Axum Handlers for the REST API
//!
//! Health and persona lookup. `utoipa` path annotations feed the OpenAPI
//! document served next to the Swagger UI.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use coach_core::{agents::COACH_AGENT_NAME, personas};
use std::sync::Arc;
use tracing::error;

use crate::{
    models::{ErrorResponse, HealthResponse, PersonaSummary, PersonasResponse},
    state::AppState,
};

/// A custom error type for the API.
pub enum ApiError {
    NotFound(String),
    InternalServerError(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::NotFound(message) => {
                (StatusCode::NOT_FOUND, Json(ErrorResponse { message })).into_response()
            }
            ApiError::InternalServerError(err) => {
                error!("Internal Server Error: {:?}", err);
                let message = "An internal server error occurred.".to_string();
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse { message }),
                )
                    .into_response()
            }
        }
    }
}

impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::InternalServerError(err.into())
    }
}

/// Service health and a snapshot of the session registry.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is up", body = HealthResponse)
    )
)]
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let sessions_by_state = state
        .registry
        .stats()
        .into_iter()
        .map(|(session_state, count)| (session_state.as_str().to_string(), count))
        .collect();
    Json(HealthResponse {
        status: "healthy".to_string(),
        agent: COACH_AGENT_NAME.to_string(),
        model: state.config.live_model.clone(),
        active_sessions: state.registry.len(),
        capacity: state.registry.capacity(),
        sessions_by_state,
    })
}

/// List the practice-mode personas.
#[utoipa::path(
    get,
    path = "/api/personas",
    responses(
        (status = 200, description = "All built-in personas", body = PersonasResponse)
    )
)]
pub async fn list_personas() -> Json<PersonasResponse> {
    Json(PersonasResponse {
        personas: personas::PERSONAS.iter().map(PersonaSummary::from).collect(),
    })
}

/// Get a single persona by id.
#[utoipa::path(
    get,
    path = "/api/personas/{id}",
    responses(
        (status = 200, description = "Persona found", body = PersonaSummary),
        (status = 404, description = "Unknown persona", body = ErrorResponse)
    ),
    params(
        ("id" = String, Path, description = "Persona id, e.g. `sarah-startup`")
    )
)]
pub async fn get_persona(Path(id): Path<String>) -> Result<Json<PersonaSummary>, ApiError> {
    personas::find(&id)
        .map(|persona| Json(PersonaSummary::from(persona)))
        .ok_or_else(|| ApiError::NotFound(format!("Persona with id {id} not found")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::registry::SessionState;
    use coach_core::agents::AgentCatalog;
    use coach_core::prompts::PromptLibrary;
    use coach_core::runtime::MockAgentRuntime;
    use std::collections::HashMap;

    fn app_state() -> Arc<AppState> {
        let prompts = PromptLibrary::from_map(HashMap::from([(
            "coach_system".to_string(),
            "Coach.".to_string(),
        )]));
        Arc::new(AppState::new(
            Config::with_defaults(),
            AgentCatalog::new(prompts).unwrap(),
            Arc::new(MockAgentRuntime::new()),
        ))
    }

    #[tokio::test]
    async fn test_health_reports_registry_snapshot() {
        let state = app_state();
        let active = state.registry.create("rep-1").unwrap();
        active.advance(SessionState::Active);
        let _waiting = state.registry.create("rep-2").unwrap();

        let Json(health) = health(State(Arc::clone(&state))).await;
        assert_eq!(health.status, "healthy");
        assert_eq!(health.agent, COACH_AGENT_NAME);
        assert_eq!(health.active_sessions, 2);
        assert_eq!(health.capacity, 256);
        assert_eq!(health.sessions_by_state.get("active"), Some(&1));
        assert_eq!(health.sessions_by_state.get("awaiting_config"), Some(&1));
    }

    #[tokio::test]
    async fn test_list_personas_returns_all_builtins() {
        let Json(response) = list_personas().await;
        let ids: Vec<_> = response.personas.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "sarah-startup",
                "marcus-enterprise",
                "jennifer-skeptic",
                "david-gatekeeper"
            ]
        );
    }

    #[tokio::test]
    async fn test_get_persona_not_found() {
        let found = get_persona(Path("david-gatekeeper".to_string())).await;
        assert!(matches!(found, Ok(Json(ref p)) if p.name == "David Park"));

        let missing = get_persona(Path("nobody".to_string())).await;
        let response = match missing {
            Err(err) => err.into_response(),
            Ok(_) => panic!("expected an error"),
        };
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
