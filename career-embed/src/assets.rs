use std::collections::BTreeMap;

use conventions::{SCRIPT_EXTENSION, convention_by_type, template_stem};
use tracing::{debug, info, warn};
use url::Url;

use crate::{
    ApiClient, ChallengeDescriptor, ConventionOverride, EmbedError, logging::category_asset,
};

/// Markup heuristic. Wins over URL classification when both could apply.
pub fn is_probably_html(value: &str) -> bool {
    let trimmed = value.trim();
    trimmed.starts_with('<') || trimmed.contains("<div") || trimmed.contains("<template")
}

/// A site-absolute path or an absolute `http(s)` URL that is not markup.
pub fn is_urlish(value: &str) -> bool {
    if is_probably_html(value) {
        return false;
    }
    let trimmed = value.trim();
    if trimmed.starts_with("//") {
        return false;
    }
    if trimmed.starts_with('/') {
        return true;
    }
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return false;
    }
    Url::parse(trimmed)
        .map(|url| url.has_host())
        .unwrap_or(false)
}

/// Replaces a trailing template extension on the path portion of `url` with
/// the script extension, keeping any query or fragment.
pub fn derive_script_url(url: &str) -> Option<String> {
    let split_at = url.find(['?', '#']).unwrap_or(url.len());
    let (path, suffix) = url.split_at(split_at);
    let stem = template_stem(path)?;
    Some(format!("{stem}{SCRIPT_EXTENSION}{suffix}"))
}

/// Trusted asset manifest. With no prefixes configured every URL-like value is
/// allowed.
#[derive(Clone, Debug)]
pub struct AssetPolicy {
    allowed_prefixes: Vec<String>,
    allow_inline_scripts: bool,
}

impl Default for AssetPolicy {
    fn default() -> Self {
        Self {
            allowed_prefixes: Vec::new(),
            allow_inline_scripts: true,
        }
    }
}

impl AssetPolicy {
    pub fn allow_list<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed_prefixes: prefixes
                .into_iter()
                .map(Into::<String>::into)
                .filter(|prefix| !prefix.trim().is_empty())
                .collect(),
            allow_inline_scripts: true,
        }
    }

    pub fn without_inline_scripts(mut self) -> Self {
        self.allow_inline_scripts = false;
        self
    }

    pub fn allows(&self, url: &str) -> bool {
        let url = url.trim();
        self.allowed_prefixes.is_empty()
            || self
                .allowed_prefixes
                .iter()
                .any(|prefix| url.starts_with(prefix.as_str()))
    }

    pub fn allows_inline_scripts(&self) -> bool {
        self.allow_inline_scripts
    }

    pub fn check(&self, url: &str) -> Result<(), EmbedError> {
        if self.allows(url) {
            Ok(())
        } else {
            Err(EmbedError::UntrustedAsset(url.to_string()))
        }
    }
}

/// Built-in per-type defaults from `career-conventions`, shadowed by
/// configured overrides.
#[derive(Clone, Debug, Default)]
pub struct ConventionTable {
    overrides: BTreeMap<String, ConventionOverride>,
}

impl ConventionTable {
    pub fn new(overrides: BTreeMap<String, ConventionOverride>) -> Self {
        Self { overrides }
    }

    pub fn view_for(&self, challenge_type: &str) -> Option<String> {
        self.overrides
            .get(challenge_type)
            .and_then(|entry| entry.view.clone())
            .or_else(|| convention_by_type(challenge_type).map(|entry| entry.view.to_string()))
    }

    pub fn script_for(&self, challenge_type: &str) -> Option<String> {
        self.overrides
            .get(challenge_type)
            .and_then(|entry| entry.script.clone())
            .or_else(|| convention_by_type(challenge_type).map(|entry| entry.script.to_string()))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ViewSource {
    Inline,
    Url(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedView {
    pub source: ViewSource,
    pub markup: String,
}

#[derive(Clone, Debug)]
pub struct AssetResolver {
    api: ApiClient,
    policy: AssetPolicy,
    conventions: ConventionTable,
}

impl AssetResolver {
    pub fn new(api: ApiClient, policy: AssetPolicy, conventions: ConventionTable) -> Self {
        Self {
            api,
            policy,
            conventions,
        }
    }

    pub async fn resolve_view(
        &self,
        descriptor: &ChallengeDescriptor,
    ) -> Result<ResolvedView, EmbedError> {
        if let Some(view) = descriptor.view.as_deref()
            && is_probably_html(view)
        {
            debug!(
                "{} challenge {} carries inline view markup",
                category_asset(),
                descriptor.id
            );
            return Ok(ResolvedView {
                source: ViewSource::Inline,
                markup: view.to_string(),
            });
        }

        let convention_view = self.conventions.view_for(&descriptor.challenge_type);
        let candidate = self
            .usable(descriptor.view.as_deref())
            .or_else(|| self.usable(descriptor.template_override()))
            .or_else(|| self.usable(convention_view.as_deref()));

        let Some(url) = candidate else {
            warn!(
                "{} no view strategy matched challenge {} type={}",
                category_asset(),
                descriptor.id,
                descriptor.challenge_type
            );
            return Err(EmbedError::ViewUnresolved {
                challenge_id: descriptor.id,
                challenge_type: descriptor.challenge_type.clone(),
            });
        };

        let url = url.trim().to_string();
        let markup = self
            .api
            .fetch_text(&url)
            .await
            .map_err(|reason| EmbedError::template_fetch(&url, reason))?;
        info!(
            "{} fetched view for challenge {} from {} ({} bytes)",
            category_asset(),
            descriptor.id,
            url,
            markup.len()
        );
        Ok(ResolvedView {
            source: ViewSource::Url(url),
            markup,
        })
    }

    pub fn resolve_script(
        &self,
        descriptor: &ChallengeDescriptor,
        view: &ViewSource,
    ) -> Option<String> {
        let derived = match view {
            ViewSource::Url(url) => derive_script_url(url),
            ViewSource::Inline => None,
        };
        let convention_script = self.conventions.script_for(&descriptor.challenge_type);

        let script = self
            .usable(descriptor.type_script_override())
            .or_else(|| self.usable(descriptor.legacy_script_override()))
            .or_else(|| self.usable(derived.as_deref()))
            .or_else(|| self.usable(convention_script.as_deref()))
            .map(|url| url.trim().to_string());

        match script.as_deref() {
            Some(url) => debug!(
                "{} challenge {} controller script {}",
                category_asset(),
                descriptor.id,
                url
            ),
            None => debug!(
                "{} challenge {} has no controller script",
                category_asset(),
                descriptor.id
            ),
        }
        script
    }

    fn usable<'a>(&self, candidate: Option<&'a str>) -> Option<&'a str> {
        let candidate = candidate.filter(|value| is_urlish(value))?;
        if self.policy.allows(candidate) {
            Some(candidate)
        } else {
            warn!(
                "{} skipping asset outside trusted manifest: {}",
                category_asset(),
                candidate.trim()
            );
            None
        }
    }
}
