use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Server record describing one challenge. Only the fields the engine reads
/// are modelled; anything else a challenge plugin adds is ignored.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ChallengeDescriptor {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "type")]
    pub challenge_type: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub view: Option<String>,
    #[serde(default)]
    pub type_data: Option<TypeData>,
    #[serde(default)]
    pub scripts: Option<AssetPaths>,
    #[serde(default)]
    pub solved: Option<bool>,
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub category: Option<String>,
    /// Outer `None` when the field is absent, inner `None` when it is `null`.
    #[serde(
        default,
        deserialize_with = "deserialize_present",
        skip_serializing_if = "Option::is_none"
    )]
    pub max_attempts: Option<Option<u64>>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TypeData {
    #[serde(default)]
    pub templates: Option<AssetPaths>,
    #[serde(default)]
    pub scripts: Option<AssetPaths>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AssetPaths {
    #[serde(default)]
    pub view: Option<String>,
}

impl ChallengeDescriptor {
    pub fn is_solved(&self) -> bool {
        self.solved.unwrap_or(false)
    }

    pub fn template_override(&self) -> Option<&str> {
        self.type_data
            .as_ref()
            .and_then(|data| data.templates.as_ref())
            .and_then(|paths| paths.view.as_deref())
    }

    pub fn type_script_override(&self) -> Option<&str> {
        self.type_data
            .as_ref()
            .and_then(|data| data.scripts.as_ref())
            .and_then(|paths| paths.view.as_deref())
    }

    pub fn legacy_script_override(&self) -> Option<&str> {
        self.scripts.as_ref().and_then(|paths| paths.view.as_deref())
    }

    pub fn value_text(&self) -> Option<String> {
        match self.value.as_ref()? {
            Value::Null => None,
            Value::String(text) => Some(text.clone()),
            other => Some(other.to_string()),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct ApiEnvelope<T> {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub data: Option<T>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct AttemptRequest {
    pub challenge_id: u64,
    pub submission: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct AttemptResult {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct CareersPayload {
    #[serde(default)]
    pub careers: Vec<CareerEntry>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CareerEntry {
    pub id: u64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub total_steps: Option<u64>,
    #[serde(default)]
    pub completed_steps: Option<u64>,
    #[serde(default)]
    pub steps: Vec<CareerStepEntry>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CareerStepEntry {
    pub id: u64,
    #[serde(default)]
    pub completed: bool,
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct CareerProgressSnapshot {
    pub career_id: u64,
    pub total_steps: u64,
    pub completed_steps: u64,
    pub steps: Vec<StepProgress>,
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct StepProgress {
    pub step_id: u64,
    pub completed: bool,
}

impl From<&CareerEntry> for CareerProgressSnapshot {
    fn from(entry: &CareerEntry) -> Self {
        let total_steps = match entry.total_steps {
            Some(total) if total > 0 => total,
            _ => entry.steps.len() as u64,
        };
        Self {
            career_id: entry.id,
            total_steps,
            completed_steps: entry.completed_steps.unwrap_or(0),
            steps: entry
                .steps
                .iter()
                .map(|step| StepProgress {
                    step_id: step.id,
                    completed: step.completed,
                })
                .collect(),
        }
    }
}

fn deserialize_present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
