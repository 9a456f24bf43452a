//! Mode Resolver
//!
//! Turns the client's (optional) config frame into everything a session needs
//! before it can start: which agent to host, how the runtime should be
//! configured, and what to ask the agent for when the call ends.

use crate::config::Config;
use coach_core::agents::{AgentVariant, SUMMARY_REQUEST, SUMMARY_TOOL};
use coach_core::live::{Modality, RunConfiguration};
use coach_core::personas;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionMode {
    /// Silent coach on a real call.
    #[default]
    Live,
    /// Role-play against an AI prospect.
    Practice,
}

impl SessionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionMode::Live => "live",
            SessionMode::Practice => "practice",
        }
    }
}

impl fmt::Display for SessionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the client asked for in its config frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionConfig {
    pub mode: Option<String>,
    pub voice: Option<String>,
    pub persona: Option<String>,
}

/// Sent to the agent once the client ends the call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosingRequest {
    pub instruction: &'static str,
    /// The tool whose result means the agent has answered.
    pub tool: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionPlan {
    pub mode: SessionMode,
    /// Resolved persona, practice mode only.
    pub persona_id: Option<String>,
    pub variant: AgentVariant,
    pub run_config: RunConfiguration,
    pub closing: Option<ClosingRequest>,
}

impl SessionPlan {
    pub fn status_message(&self) -> String {
        match &self.persona_id {
            Some(persona) => format!("Session started: mode={}, persona={}", self.mode, persona),
            None => format!("Session started: mode={}", self.mode),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ModeResolver {
    default_voice: String,
    language_code: String,
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(|s| s.trim()).filter(|s| !s.is_empty())
}

impl ModeResolver {
    pub fn new(default_voice: impl Into<String>, language_code: impl Into<String>) -> Self {
        Self {
            default_voice: default_voice.into(),
            language_code: language_code.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.default_voice, &config.language_code)
    }

    /// Resolves a plan. `None` (no or unreadable config) means all defaults.
    pub fn resolve(&self, config: Option<&SessionConfig>) -> SessionPlan {
        let config = config.cloned().unwrap_or_default();
        let mode = match non_empty(config.mode.as_ref()) {
            Some(mode) if mode.eq_ignore_ascii_case("practice") => SessionMode::Practice,
            _ => SessionMode::Live,
        };

        match mode {
            SessionMode::Live => SessionPlan {
                mode,
                persona_id: None,
                variant: AgentVariant::Coach,
                run_config: RunConfiguration {
                    response_modality: Modality::Text,
                    voice: non_empty(config.voice.as_ref())
                        .unwrap_or(&self.default_voice)
                        .to_string(),
                    language_code: None,
                    input_transcription: true,
                    output_transcription: false,
                },
                closing: Some(ClosingRequest {
                    instruction: SUMMARY_REQUEST,
                    tool: SUMMARY_TOOL,
                }),
            },
            SessionMode::Practice => {
                let persona = personas::resolve(
                    non_empty(config.persona.as_ref()).unwrap_or(personas::DEFAULT_PERSONA_ID),
                );
                let voice = if persona.voice.is_empty() {
                    self.default_voice.clone()
                } else {
                    persona.voice.to_string()
                };
                SessionPlan {
                    mode,
                    persona_id: Some(persona.id.to_string()),
                    variant: AgentVariant::Prospect {
                        persona_id: persona.id.to_string(),
                    },
                    run_config: RunConfiguration {
                        response_modality: Modality::Audio,
                        voice,
                        language_code: Some(self.language_code.clone()),
                        input_transcription: true,
                        output_transcription: true,
                    },
                    closing: None,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> ModeResolver {
        ModeResolver::new("Kore", "en-US")
    }

    fn config(mode: &str, voice: Option<&str>, persona: Option<&str>) -> SessionConfig {
        SessionConfig {
            mode: Some(mode.to_string()),
            voice: voice.map(str::to_string),
            persona: persona.map(str::to_string),
        }
    }

    #[test]
    fn test_missing_config_is_live_coach_with_default_voice() {
        let plan = resolver().resolve(None);
        assert_eq!(plan.mode, SessionMode::Live);
        assert_eq!(plan.variant, AgentVariant::Coach);
        assert_eq!(plan.run_config.response_modality, Modality::Text);
        assert_eq!(plan.run_config.voice, "Kore");
        assert!(plan.run_config.input_transcription);
        assert!(!plan.run_config.output_transcription);
        assert_eq!(plan.closing.as_ref().map(|c| c.tool), Some(SUMMARY_TOOL));
        assert_eq!(plan.status_message(), "Session started: mode=live");
    }

    #[test]
    fn test_live_mode_honors_voice_override() {
        let plan = resolver().resolve(Some(&config("live", Some("Puck"), None)));
        assert_eq!(plan.run_config.voice, "Puck");
        assert_eq!(plan.run_config.language_code, None);
    }

    #[test]
    fn test_practice_mode_uses_persona_voice_not_default() {
        let plan = resolver().resolve(Some(&config(
            "practice",
            Some("Puck"),
            Some("marcus-enterprise"),
        )));
        assert_eq!(plan.mode, SessionMode::Practice);
        assert_eq!(plan.run_config.voice, "Orus");
        assert_eq!(plan.run_config.response_modality, Modality::Audio);
        assert_eq!(plan.run_config.language_code.as_deref(), Some("en-US"));
        assert!(plan.run_config.input_transcription && plan.run_config.output_transcription);
        assert!(plan.closing.is_none());
        assert_eq!(
            plan.status_message(),
            "Session started: mode=practice, persona=marcus-enterprise"
        );
    }

    #[test]
    fn test_unknown_persona_falls_back_to_default_persona() {
        let plan = resolver().resolve(Some(&config("practice", None, Some("nobody"))));
        assert_eq!(plan.persona_id.as_deref(), Some(personas::DEFAULT_PERSONA_ID));
        assert_eq!(
            plan.variant,
            AgentVariant::Prospect {
                persona_id: personas::DEFAULT_PERSONA_ID.into()
            }
        );
        assert_eq!(plan.run_config.voice, "Kore");
    }

    #[test]
    fn test_unknown_mode_is_live() {
        let plan = resolver().resolve(Some(&config("karaoke", None, Some("jennifer-skeptic"))));
        assert_eq!(plan.mode, SessionMode::Live);
        assert_eq!(plan.persona_id, None);
    }
}
