//! Agent Catalog
//!
//! Maps an [`AgentVariant`] to the [`AgentSpec`] a runtime hosts: the live
//! coach that listens silently and reports through tool calls, or a practice
//! prospect that role-plays one of the built-in personas.

use crate::personas::{self, Persona};
use crate::prompts::PromptLibrary;
use crate::runtime::AgentSpec;
use anyhow::Result;

pub const COACH_AGENT_NAME: &str = "live_sales_coach";
pub const PROSPECT_AGENT_NAME: &str = "practice_prospect";

/// Tool the coach calls to report the final call analysis.
pub const SUMMARY_TOOL: &str = "save_call_summary";

/// Instruction injected when a live call ends, asking for the final summary.
pub const SUMMARY_REQUEST: &str =
    "The call has ended. Please call save_call_summary() with the complete call analysis.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentVariant {
    /// Silent coach for a real call.
    Coach,
    /// AI buyer for role-play, keyed by persona id.
    Prospect { persona_id: String },
}

#[derive(Debug, Clone)]
pub struct AgentCatalog {
    coach_instruction: String,
    prompts: PromptLibrary,
}

impl AgentCatalog {
    /// Builds the catalog. The coach system prompt must be present.
    pub fn new(prompts: PromptLibrary) -> Result<Self> {
        let coach_instruction = prompts.require("coach_system")?.to_string();
        Ok(Self {
            coach_instruction,
            prompts,
        })
    }

    pub fn build(&self, variant: &AgentVariant) -> AgentSpec {
        match variant {
            AgentVariant::Coach => AgentSpec {
                name: COACH_AGENT_NAME.to_string(),
                instruction: self.coach_instruction.clone(),
                coaching_tools: true,
                google_search: true,
            },
            AgentVariant::Prospect { persona_id } => {
                let persona = personas::resolve(persona_id);
                AgentSpec {
                    name: PROSPECT_AGENT_NAME.to_string(),
                    instruction: self.persona_instruction(persona),
                    coaching_tools: false,
                    google_search: false,
                }
            }
        }
    }

    /// Persona prompt followed by the shared practice rules.
    fn persona_instruction(&self, persona: &Persona) -> String {
        let mut prompt = match self.prompts.get(&format!("persona-{}", persona.id)) {
            Some(text) => text.trim_end().to_string(),
            None => format!(
                "You are {}, {} at {} ({}). A salesperson is cold-calling you. \
                 Objections you tend to raise: {}.",
                persona.name,
                persona.title,
                persona.company,
                persona.industry,
                persona.common_objections.join("; ")
            ),
        };
        if let Some(rules) = self.prompts.get("practice_rules") {
            prompt.push_str("\n\n");
            prompt.push_str(&rules.replace("{difficulty}", persona.difficulty.guide()));
        }
        prompt
    }
}
