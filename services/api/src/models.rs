//! API Models
//!
//! Response bodies for the REST endpoints, annotated for OpenAPI generation
//! with `utoipa`.

use coach_core::personas::Persona;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
pub struct PersonaSummary {
    #[schema(example = "marcus-enterprise")]
    pub id: String,
    pub name: String,
    pub title: String,
    pub company: String,
    #[schema(example = "medium")]
    pub difficulty: String,
    pub industry: String,
}

impl From<&Persona> for PersonaSummary {
    fn from(persona: &Persona) -> Self {
        Self {
            id: persona.id.to_string(),
            name: persona.name.to_string(),
            title: persona.title.to_string(),
            company: persona.company.to_string(),
            difficulty: persona.difficulty.to_string(),
            industry: persona.industry.to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
pub struct PersonasResponse {
    pub personas: Vec<PersonaSummary>,
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
pub struct HealthResponse {
    #[schema(example = "healthy")]
    pub status: String,
    /// Name of the agent hosted in live mode.
    #[schema(example = "live_sales_coach")]
    pub agent: String,
    pub model: String,
    pub active_sessions: usize,
    pub capacity: usize,
    /// Registered sessions per lifecycle state, e.g. `{"active": 2}`.
    pub sessions_by_state: BTreeMap<String, usize>,
}

#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use coach_core::personas;
    use serde_json::json;

    #[test]
    fn test_persona_summary_from_persona() {
        let summary = PersonaSummary::from(personas::find("jennifer-skeptic").unwrap());
        assert_eq!(
            serde_json::to_value(&summary).unwrap(),
            json!({
                "id": "jennifer-skeptic",
                "name": "Jennifer Rodriguez",
                "title": "Director of Sales",
                "company": "Velocity Consulting",
                "difficulty": "hard",
                "industry": "Consulting",
            })
        );
    }

    #[test]
    fn test_health_response_serialization() {
        let health = HealthResponse {
            status: "healthy".into(),
            agent: "live_sales_coach".into(),
            model: "some-model".into(),
            active_sessions: 1,
            capacity: 8,
            sessions_by_state: BTreeMap::from([("active".to_string(), 1)]),
        };
        let value = serde_json::to_value(&health).unwrap();
        assert_eq!(value["status"], "healthy");
        assert_eq!(value["sessions_by_state"], json!({"active": 1}));
    }
}
