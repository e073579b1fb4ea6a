use tracing::{info, warn};

use crate::{
    AssetPolicy, EmbedError, ScriptHost, SharedPage, assets::is_urlish, logging::category_script,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadStatus {
    /// Empty or not URL-like; nothing to load.
    Skipped,
    AlreadyPresent,
    Loaded,
}

impl LoadStatus {
    pub fn attached(self) -> bool {
        matches!(self, LoadStatus::AlreadyPresent | LoadStatus::Loaded)
    }
}

/// Attaches controller scripts to the page body, at most one element per URL.
#[derive(Clone, Debug)]
pub struct ScriptLoader {
    page: SharedPage,
    policy: AssetPolicy,
}

impl ScriptLoader {
    pub fn new(page: SharedPage, policy: AssetPolicy) -> Self {
        Self { page, policy }
    }

    pub async fn ensure_loaded<H: ScriptHost>(
        &self,
        host: &H,
        url: &str,
    ) -> Result<LoadStatus, EmbedError> {
        let url = url.trim();
        if url.is_empty() || !is_urlish(url) {
            return Ok(LoadStatus::Skipped);
        }
        if let Err(err) = self.policy.check(url) {
            warn!("{} refused controller script {url}", category_script());
            return Err(err);
        }

        // The existence check and the append happen under one lock, before
        // the first await.
        let appended = {
            let mut page = self.page.lock().expect("page lock poisoned");
            page.append_external_script(url)
        };
        if !appended {
            return Ok(LoadStatus::AlreadyPresent);
        }

        host.load(url)
            .await
            .map_err(|reason| EmbedError::ScriptLoadFailure {
                url: url.to_string(),
                reason,
            })?;
        info!("{} controller script loaded {url}", category_script());
        Ok(LoadStatus::Loaded)
    }
}
