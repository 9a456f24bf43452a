//! Prompt Library
//!
//! Prompts are plain markdown files kept outside the binary so they can be
//! tuned without a rebuild. Each `*.md` file in the prompts directory is
//! stored under its file stem (`coach_system.md` -> `coach_system`).

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default)]
pub struct PromptLibrary {
    prompts: HashMap<String, String>,
}

impl PromptLibrary {
    /// Loads every markdown file from `dir`.
    pub fn load(dir: &Path) -> Result<Self> {
        let mut prompts = HashMap::new();
        let entries = fs::read_dir(dir)
            .with_context(|| format!("Could not read prompts directory {}", dir.display()))?;
        for entry in entries {
            let path = entry?.path();
            if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("md") {
                let key = path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .context("Could not get file stem")?
                    .to_string();
                let content = fs::read_to_string(&path)?;
                prompts.insert(key, content);
            }
        }
        Ok(Self { prompts })
    }

    pub fn from_map(prompts: HashMap<String, String>) -> Self {
        Self { prompts }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.prompts.get(key).map(String::as_str)
    }

    /// Like [`get`](Self::get), but missing prompts are an error.
    pub fn require(&self, key: &str) -> Result<&str> {
        self.get(key)
            .with_context(|| format!("{key}.md not found in prompts directory"))
    }

    pub fn len(&self) -> usize {
        self.prompts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prompts.is_empty()
    }
}
