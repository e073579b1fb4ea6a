use std::{collections::HashMap, fs, path::Path};

use serde::Deserialize;

use crate::EmbedError;

pub const KEY_VALUE: &str = "Value";
pub const KEY_CATEGORY: &str = "Category";
pub const KEY_ATTEMPTS_REMAINING: &str = "Attempts Remaining";
pub const KEY_UNLIMITED: &str = "Unlimited";
pub const KEY_LOADING: &str = "Loading Challenge";
pub const KEY_LOAD_FAILED: &str = "Failed to load challenge";
pub const KEY_ALREADY_SOLVED: &str = "Challenge already solved";
pub const KEY_ENTER_FLAG: &str = "Enter flag";
pub const KEY_SUBMITTING: &str = "Submitting...";
pub const KEY_SOLVED: &str = "Challenge solved!";
pub const KEY_INCORRECT: &str = "Incorrect flag";
pub const KEY_SUBMISSION_FAILED: &str = "Submission failed";
pub const KEY_UNEXPECTED: &str = "Unexpected error";
pub const KEY_COMPLETED: &str = "Completed";
pub const KEY_IN_PROGRESS: &str = "In Progress";

/// Message catalogue keyed by the English text. Keys without an entry render
/// as themselves.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(transparent)]
pub struct Translations {
    entries: HashMap<String, String>,
}

impl Translations {
    pub fn from_json_str(raw: &str) -> Result<Self, EmbedError> {
        serde_json::from_str(raw)
            .map_err(|err| EmbedError::Config(format!("invalid translations: {err}")))
    }

    pub fn load(path: &Path) -> Result<Self, EmbedError> {
        let raw = fs::read_to_string(path).map_err(|err| {
            EmbedError::Config(format!(
                "failed to read translations '{}': {err}",
                path.display()
            ))
        })?;
        Self::from_json_str(&raw)
    }

    pub fn t(&self, key: &str) -> String {
        match self.entries.get(key) {
            Some(value) if !value.is_empty() => value.clone(),
            _ => key.to_string(),
        }
    }
}
