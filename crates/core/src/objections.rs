//! Objection categories, their trigger phrases and handling frameworks.

#[derive(Debug)]
pub struct ObjectionCategory {
    pub id: &'static str,
    pub name: &'static str,
    pub triggers: &'static [&'static str],
    pub framework: &'static str,
}

pub const CUSTOM: &str = "custom";

/// Categories in detection priority order. `custom` is last and has no triggers.
pub static CATEGORIES: &[ObjectionCategory] = &[
    ObjectionCategory {
        id: "price",
        name: "Price & Budget",
        triggers: &[
            "too expensive",
            "budget",
            "cost",
            "can't afford",
            "cheaper",
            "discount",
            "free",
            "pricing",
            "investment",
            "money",
        ],
        framework: "Reframe from cost to ROI. Ask what the cost of NOT solving the problem is.",
    },
    ObjectionCategory {
        id: "timing",
        name: "Timing",
        triggers: &[
            "not now",
            "next quarter",
            "bad timing",
            "not ready",
            "later",
            "busy",
            "next year",
            "revisit",
            "not a priority right now",
        ],
        framework: "Create urgency with the cost of delay. Ask what changes between now and then.",
    },
    ObjectionCategory {
        id: "authority",
        name: "Authority",
        triggers: &[
            "need to ask",
            "my boss",
            "committee",
            "stakeholders",
            "decision maker",
            "board",
            "leadership",
            "manager",
            "sign-off",
            "approval",
        ],
        framework: "Champion-build. Help them sell internally. Offer to join the next meeting.",
    },
    ObjectionCategory {
        id: "need",
        name: "Need & Value",
        triggers: &[
            "don't need",
            "already have",
            "works fine",
            "not a priority",
            "happy with current",
            "no problem",
            "satisfied",
            "not looking",
        ],
        framework: "Surface hidden pain. Ask about their process and find the inefficiency they've normalized.",
    },
    ObjectionCategory {
        id: "trust",
        name: "Trust & Risk",
        triggers: &[
            "never heard of",
            "too small",
            "risky",
            "references",
            "case study",
            "proof",
            "guarantee",
            "track record",
            "reputation",
        ],
        framework: "Social proof + risk reversal. Offer pilot/trial. Name similar companies.",
    },
    ObjectionCategory {
        id: "competitor",
        name: "Competitor",
        triggers: &[
            "using",
            "competitor",
            "other options",
            "shopping around",
            "evaluating",
            "comparing",
            "alternative",
            "already have",
        ],
        framework: "Don't trash the competitor. Ask what's working and what's not. Find the gap.",
    },
    ObjectionCategory {
        id: "contract",
        name: "Contract & Legal",
        triggers: &[
            "locked in",
            "legal",
            "procurement",
            "compliance",
            "contract",
            "agreement",
            "vendor list",
            "preferred vendor",
        ],
        framework: "Timeline the contract end. Start building the relationship now for the renewal window.",
    },
    ObjectionCategory {
        id: CUSTOM,
        name: "Custom",
        triggers: &[],
        framework: "Acknowledge, ask clarifying questions, find the real concern underneath.",
    },
];

pub fn category(id: &str) -> Option<&'static ObjectionCategory> {
    CATEGORIES.iter().find(|c| c.id == id)
}

/// Detects the objection category from what the prospect said.
pub fn detect(text: &str) -> &'static str {
    let lower = text.to_lowercase();
    CATEGORIES
        .iter()
        .find(|c| c.triggers.iter().any(|t| lower.contains(t)))
        .map(|c| c.id)
        .unwrap_or(CUSTOM)
}

/// Renders the handling framework for a category, e.g. `"Timing: Create urgency..."`.
pub fn framework(id: &str) -> String {
    let info = category(id)
        .or_else(|| category(CUSTOM))
        .unwrap_or(&CATEGORIES[CATEGORIES.len() - 1]);
    format!("{}: {}", info.name, info.framework)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_uses_first_matching_category() {
        assert_eq!(detect("Honestly it's just too expensive"), "price");
        assert_eq!(detect("Call me back next quarter"), "timing");
        // "already have" triggers both need and competitor; need wins by order.
        assert_eq!(detect("We already have a tool for that"), "need");
    }

    #[test]
    fn test_detect_is_case_insensitive_and_falls_back() {
        assert_eq!(detect("MY BOSS decides"), "authority");
        assert_eq!(detect("I just don't like you"), CUSTOM);
    }

    #[test]
    fn test_framework_for_unknown_category_is_custom() {
        assert!(framework("price").starts_with("Price & Budget: "));
        assert!(framework("weather").starts_with("Custom: "));
    }
}
