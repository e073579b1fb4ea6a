use thiserror::Error;

/// Everything that can go wrong between activating a step and patching its
/// progress. None of these escape `ChallengeSession`; they end up as region
/// feedback or log lines.
#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("{what} failed: {url} ({reason})")]
    FetchFailure {
        what: &'static str,
        url: String,
        reason: String,
    },
    #[error("challenge payload missing data: {0}")]
    DescriptorMissing(String),
    #[error("view not found for challenge {challenge_id} (type {challenge_type:?})")]
    ViewUnresolved {
        challenge_id: u64,
        challenge_type: String,
    },
    #[error("script load error: {url} ({reason})")]
    ScriptLoadFailure { url: String, reason: String },
    #[error("submission failed: {0}")]
    SubmissionFailure(String),
    #[error("asset not in trusted manifest: {0}")]
    UntrustedAsset(String),
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl EmbedError {
    pub(crate) fn template_fetch(url: &str, reason: impl ToString) -> Self {
        EmbedError::FetchFailure {
            what: "template fetch",
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn script_fetch(url: &str, reason: impl ToString) -> Self {
        EmbedError::FetchFailure {
            what: "script fetch",
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn api_fetch(url: &str, reason: impl ToString) -> Self {
        EmbedError::FetchFailure {
            what: "api request",
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }
}
