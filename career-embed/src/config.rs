use std::{collections::BTreeMap, fs, path::Path};

use serde::Deserialize;

use crate::{AssetPolicy, EmbedError, Translations};

/// Runtime overrides for the per-type convention table.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct ConventionOverride {
    #[serde(default)]
    pub view: Option<String>,
    #[serde(default)]
    pub script: Option<String>,
}

#[derive(Clone, Debug)]
pub struct EngineConfig {
    pub base_url: String,
    pub session_cookie: Option<String>,
    pub csrf_token: Option<String>,
    pub career_id: u64,
    pub request_timeout_ms: Option<u64>,
    pub asset_policy: AssetPolicy,
    pub convention_overrides: BTreeMap<String, ConventionOverride>,
    pub translations: Translations,
}

impl EngineConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            session_cookie: None,
            csrf_token: None,
            career_id: 0,
            request_timeout_ms: None,
            asset_policy: AssetPolicy::default(),
            convention_overrides: BTreeMap::new(),
            translations: Translations::default(),
        }
    }

    pub fn with_career(mut self, career_id: u64) -> Self {
        self.career_id = career_id;
        self
    }

    pub fn with_csrf_token(mut self, token: impl Into<String>) -> Self {
        self.csrf_token = Some(token.into());
        self
    }

    pub fn with_asset_policy(mut self, policy: AssetPolicy) -> Self {
        self.asset_policy = policy;
        self
    }

    pub fn with_convention(mut self, challenge_type: &str, convention: ConventionOverride) -> Self {
        self.convention_overrides
            .insert(challenge_type.to_string(), convention);
        self
    }

    pub fn load_convention_overrides(&mut self, path: &Path) -> Result<(), EmbedError> {
        let raw = fs::read_to_string(path).map_err(|err| {
            EmbedError::Config(format!(
                "failed to read conventions '{}': {err}",
                path.display()
            ))
        })?;
        let overrides = parse_convention_overrides(&raw)?;
        self.convention_overrides.extend(overrides);
        Ok(())
    }
}

pub fn parse_convention_overrides(
    raw: &str,
) -> Result<BTreeMap<String, ConventionOverride>, EmbedError> {
    let overrides: BTreeMap<String, ConventionOverride> = serde_json::from_str(raw)
        .map_err(|err| EmbedError::Config(format!("invalid conventions: {err}")))?;
    if let Some(name) = overrides.keys().find(|name| name.trim().is_empty()) {
        return Err(EmbedError::Config(format!(
            "convention type name cannot be empty: {name:?}"
        )));
    }
    Ok(overrides)
}
