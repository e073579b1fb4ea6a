use std::{future::Future, sync::Mutex};

use serde::Serialize;
use tracing::{debug, info};

use crate::{ApiClient, ChallengeDescriptor, EmbedError, logging::category_script};

/// What happened when the host asked the embedded controller for its
/// post-render hook.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HookOutcome {
    Missing,
    Completed,
    Failed(String),
}

/// Executes script elements on behalf of the page. A browser build wires this
/// to real `<script>` elements; the headless binary and the tests provide
/// their own.
pub trait ScriptHost: Send + Sync {
    /// Runs an external script. Resolves when its load event would fire.
    fn load(&self, src: &str) -> impl Future<Output = Result<(), String>> + Send;

    fn run_inline(&self, text: &str) -> Result<(), String>;

    /// Invokes the post-render hook exposed by the most recently attached
    /// controller, if it exposes one.
    fn post_render(&self, challenge: &ChallengeDescriptor) -> HookOutcome;
}

/// Ambient layout/reactivity library.
pub trait Reactivity: Send + Sync {
    fn init_tree(&self, step_id: u64);
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoReactivity;

impl Reactivity for NoReactivity {
    fn init_tree(&self, _step_id: u64) {}
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExecutedScript {
    External { src: String, bytes: usize },
    Inline { bytes: usize },
}

/// Headless host: external scripts are fetched with the learner's
/// credentials so a missing asset surfaces as a load error, but nothing is
/// evaluated. There is never a post-render hook.
#[derive(Debug)]
pub struct HttpScriptHost {
    api: ApiClient,
    executed: Mutex<Vec<ExecutedScript>>,
}

impl HttpScriptHost {
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            executed: Mutex::new(Vec::new()),
        }
    }

    pub fn executed(&self) -> Vec<ExecutedScript> {
        self.executed
            .lock()
            .expect("executed scripts lock poisoned")
            .clone()
    }

    fn record(&self, script: ExecutedScript) {
        self.executed
            .lock()
            .expect("executed scripts lock poisoned")
            .push(script);
    }
}

impl ScriptHost for HttpScriptHost {
    async fn load(&self, src: &str) -> Result<(), String> {
        let body = self
            .api
            .fetch_text(src)
            .await
            .map_err(|reason| EmbedError::script_fetch(src, reason).to_string())?;
        info!(
            "{} fetched {} ({} bytes)",
            category_script(),
            src,
            body.len()
        );
        self.record(ExecutedScript::External {
            src: src.to_string(),
            bytes: body.len(),
        });
        Ok(())
    }

    fn run_inline(&self, text: &str) -> Result<(), String> {
        debug!(
            "{} recorded inline script ({} bytes)",
            category_script(),
            text.len()
        );
        self.record(ExecutedScript::Inline { bytes: text.len() });
        Ok(())
    }

    fn post_render(&self, _challenge: &ChallengeDescriptor) -> HookOutcome {
        HookOutcome::Missing
    }
}
