use std::time::Duration;

use reqwest::{
    RequestBuilder,
    header::{COOKIE, HeaderValue},
};
use tracing::{debug, warn};
use url::{Origin, Url};

use crate::{
    ApiEnvelope, AttemptRequest, AttemptResult, CareerEntry, CareersPayload, ChallengeDescriptor,
    EmbedError, EngineConfig,
    logging::{category_asset, category_challenge, category_progress},
};

pub const CHALLENGE_PATH: &str = "/api/v1/challenges";
pub const ATTEMPT_PATH: &str = "/api/v1/challenges/attempt";
pub const CAREERS_PATH: &str = "/plugins/career/api/v1/career";
pub const CSRF_HEADER: &str = "CSRF-Token";

/// REST collaborator. Requests to the CTF server's own origin carry the
/// learner's session cookie; assets on any other host are fetched without it.
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
    base_origin: Option<Origin>,
    session_cookie: Option<String>,
    csrf_token: Option<String>,
    request_timeout: Option<Duration>,
}

impl ApiClient {
    pub fn new(config: &EngineConfig) -> Self {
        let base_url = normalize_base_url(&config.base_url);
        Self {
            client: reqwest::Client::new(),
            base_origin: Url::parse(&base_url).ok().map(|url| url.origin()),
            base_url,
            session_cookie: config.session_cookie.clone(),
            csrf_token: config.csrf_token.clone(),
            request_timeout: config.request_timeout_ms.map(Duration::from_millis),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute `http(s)` URLs pass through; site-absolute paths are joined
    /// onto the configured base URL.
    pub fn resolve_url(&self, path_or_url: &str) -> String {
        let trimmed = path_or_url.trim();
        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            trimmed.to_string()
        } else {
            format!("{}{}", self.base_url, trimmed)
        }
    }

    /// Whether `url` shares scheme, host and port with the base URL.
    pub fn is_same_origin(&self, url: &str) -> bool {
        let Some(base_origin) = self.base_origin.as_ref() else {
            return false;
        };
        Url::parse(url)
            .map(|target| target.origin() == *base_origin)
            .unwrap_or(false)
    }

    /// Fetches raw text. Errors carry only the reason; callers decide which
    /// kind of fetch failed.
    pub async fn fetch_text(&self, url: &str) -> Result<String, String> {
        let url = self.resolve_url(url);
        let response = self
            .with_credentials(self.client.get(&url), &url)
            .send()
            .await
            .map_err(|err| err.to_string())?;
        let status = response.status();
        if !status.is_success() {
            return Err(status.to_string());
        }
        response.text().await.map_err(|err| err.to_string())
    }

    pub async fn get_challenge(&self, challenge_id: u64) -> Result<ChallengeDescriptor, EmbedError> {
        let url = self.resolve_url(&format!("{CHALLENGE_PATH}/{challenge_id}"));
        let response = self
            .with_credentials(self.client.get(&url), &url)
            .send()
            .await
            .map_err(|err| EmbedError::api_fetch(&url, err))?;
        let status = response.status();
        if !status.is_success() {
            return Err(EmbedError::api_fetch(&url, status));
        }

        let envelope = response
            .json::<ApiEnvelope<ChallengeDescriptor>>()
            .await
            .map_err(|err| EmbedError::DescriptorMissing(err.to_string()))?;
        if envelope.success == Some(false) {
            return Err(EmbedError::DescriptorMissing(
                envelope
                    .message
                    .unwrap_or_else(|| "request reported failure".to_string()),
            ));
        }
        envelope
            .data
            .ok_or_else(|| EmbedError::DescriptorMissing(format!("challenge {challenge_id}")))
    }

    pub async fn post_attempt(
        &self,
        challenge_id: u64,
        submission: &str,
    ) -> Result<ApiEnvelope<AttemptResult>, EmbedError> {
        let url = self.resolve_url(ATTEMPT_PATH);
        let token = match self.csrf_token.as_deref() {
            Some(token) if !token.is_empty() => token,
            _ => {
                warn!(
                    "{} csrf token unavailable; submitting with an empty token",
                    category_challenge()
                );
                ""
            }
        };

        let request = AttemptRequest {
            challenge_id,
            submission: submission.to_string(),
        };
        let response = self
            .with_credentials(self.client.post(&url), &url)
            .header(CSRF_HEADER, token)
            .json(&request)
            .send()
            .await
            .map_err(|err| EmbedError::SubmissionFailure(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(EmbedError::SubmissionFailure(format!(
                "attempt endpoint returned {status}"
            )));
        }

        response
            .json::<ApiEnvelope<AttemptResult>>()
            .await
            .map_err(|err| EmbedError::SubmissionFailure(format!("malformed attempt reply: {err}")))
    }

    pub async fn list_careers(&self) -> Result<Vec<CareerEntry>, EmbedError> {
        let url = self.resolve_url(CAREERS_PATH);
        let response = self
            .with_credentials(self.client.get(&url), &url)
            .send()
            .await
            .map_err(|err| EmbedError::api_fetch(&url, err))?;
        let status = response.status();
        if !status.is_success() {
            return Err(EmbedError::api_fetch(&url, status));
        }

        let envelope = response
            .json::<ApiEnvelope<CareersPayload>>()
            .await
            .map_err(|err| EmbedError::api_fetch(&url, format!("malformed payload: {err}")))?;
        if envelope.success == Some(false) {
            return Err(EmbedError::api_fetch(
                &url,
                envelope
                    .message
                    .unwrap_or_else(|| "failed to refresh progress".to_string()),
            ));
        }

        let careers = envelope.data.unwrap_or_default().careers;
        debug!(
            "{} fetched {} career entries",
            category_progress(),
            careers.len()
        );
        Ok(careers)
    }

    fn with_credentials(&self, mut builder: RequestBuilder, url: &str) -> RequestBuilder {
        if !self.is_same_origin(url) {
            debug!("{} cross-origin request without cookie: {url}", category_asset());
        } else if let Some(cookie) = self.session_cookie.as_deref()
            && let Ok(value) = HeaderValue::from_str(cookie)
        {
            builder = builder.header(COOKIE, value);
        }
        if let Some(timeout) = self.request_timeout {
            builder = builder.timeout(timeout);
        }
        builder
    }
}

fn normalize_base_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}
