//! Practice-mode personas: the AI buyers a rep can role-play against.

use serde::Serialize;
use std::fmt;

/// Persona used when a client asks for one we don't know.
pub const DEFAULT_PERSONA_ID: &str = "sarah-startup";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    /// How hard the persona should make the rep work for it.
    pub fn guide(&self) -> &'static str {
        match self {
            Difficulty::Easy => {
                "Be tough but fair: a good pitch can win you over after some resistance."
            }
            Difficulty::Medium => {
                "Be very resistant. Only show small cracks if they're exceptional."
            }
            Difficulty::Hard => {
                "Be brutally difficult. Only the absolute best should make any progress."
            }
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Difficulty::Easy => write!(f, "easy"),
            Difficulty::Medium => write!(f, "medium"),
            Difficulty::Hard => write!(f, "hard"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Persona {
    pub id: &'static str,
    pub name: &'static str,
    pub title: &'static str,
    pub company: &'static str,
    pub difficulty: Difficulty,
    pub industry: &'static str,
    /// Prebuilt voice the agent speaks with in practice mode.
    pub voice: &'static str,
    pub common_objections: &'static [&'static str],
}

pub static PERSONAS: &[Persona] = &[
    Persona {
        id: "sarah-startup",
        name: "Sarah Chen",
        title: "CEO & Co-founder",
        company: "TechFlow Startup",
        difficulty: Difficulty::Easy,
        industry: "SaaS / Technology",
        voice: "Kore",
        common_objections: &[
            "I'm super busy, make it quick",
            "Just email me whatever it is",
            "We're not looking for anything right now",
        ],
    },
    Persona {
        id: "marcus-enterprise",
        name: "Marcus Williams",
        title: "VP of Operations",
        company: "Global Manufacturing Inc.",
        difficulty: Difficulty::Medium,
        industry: "Manufacturing",
        voice: "Orus",
        common_objections: &[
            "This needs to go through our procurement process",
            "We have a 3-year vendor contract already",
            "I need to loop in 6 other stakeholders",
        ],
    },
    Persona {
        id: "jennifer-skeptic",
        name: "Jennifer Rodriguez",
        title: "Director of Sales",
        company: "Velocity Consulting",
        difficulty: Difficulty::Hard,
        industry: "Consulting",
        voice: "Fenrir",
        common_objections: &[
            "I can see right through that sales tactic",
            "Your competitor gave us a better deal yesterday",
            "Why should I waste my team's time on a demo?",
        ],
    },
    Persona {
        id: "david-gatekeeper",
        name: "David Park",
        title: "Executive Assistant",
        company: "Apex Financial",
        difficulty: Difficulty::Medium,
        industry: "Financial Services",
        voice: "Puck",
        common_objections: &[
            "She's not available, period.",
            "We don't accept sales calls.",
            "You can try email but I wouldn't hold your breath.",
        ],
    },
];

/// Looks up a persona by id.
pub fn find(id: &str) -> Option<&'static Persona> {
    PERSONAS.iter().find(|p| p.id == id)
}

/// Looks up a persona by id, falling back to the default persona.
pub fn resolve(id: &str) -> &'static Persona {
    find(id).unwrap_or_else(default_persona)
}

pub fn default_persona() -> &'static Persona {
    // PERSONAS always contains the default id; the first entry is a safe backstop.
    find(DEFAULT_PERSONA_ID).unwrap_or(&PERSONAS[0])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_known_persona() {
        let marcus = find("marcus-enterprise").unwrap();
        assert_eq!(marcus.voice, "Orus");
        assert_eq!(marcus.difficulty, Difficulty::Medium);
    }

    #[test]
    fn test_unknown_persona_resolves_to_default() {
        assert!(find("nobody").is_none());
        assert_eq!(resolve("nobody").id, DEFAULT_PERSONA_ID);
        assert_eq!(resolve("").voice, "Kore");
    }

    #[test]
    fn test_persona_ids_are_unique() {
        for (i, a) in PERSONAS.iter().enumerate() {
            for b in &PERSONAS[i + 1..] {
                assert_ne!(a.id, b.id);
            }
        }
    }

    #[test]
    fn test_difficulty_display_and_serialization() {
        assert_eq!(Difficulty::Hard.to_string(), "hard");
        assert_eq!(
            serde_json::to_string(&Difficulty::Easy).unwrap(),
            "\"easy\""
        );
    }
}
