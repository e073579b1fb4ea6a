use std::sync::{
    Arc, Mutex,
    atomic::{AtomicU64, Ordering},
};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{
    ActivationState, ApiClient, AssetResolver, ChallengeDescriptor, ConventionTable, EmbedError,
    EngineConfig, FeedbackLevel, HookOutcome, LoadStatus, ProgressSynchronizer, Reactivity,
    SafeInjector, ScriptHost, ScriptLoader, SharedPage, Translations,
    logging::{category_challenge, category_script, status_label},
    markup::escape_html,
    translations::{
        KEY_ALREADY_SOLVED, KEY_ATTEMPTS_REMAINING, KEY_CATEGORY, KEY_ENTER_FLAG, KEY_INCORRECT,
        KEY_LOAD_FAILED, KEY_LOADING, KEY_SOLVED, KEY_SUBMISSION_FAILED, KEY_SUBMITTING,
        KEY_UNEXPECTED, KEY_UNLIMITED, KEY_VALUE,
    },
};

pub const STATUS_CORRECT: &str = "correct";

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SubmissionOutcome {
    /// Not the current challenge, or its region is gone.
    Ignored,
    EmptySubmission,
    Correct { message: String },
    Incorrect { status: String, message: String },
    /// The server answered with `success: false`.
    Rejected { message: String },
    /// Transport or decoding failure.
    Failed { message: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct CurrentActivation {
    generation: u64,
    challenge_id: u64,
    step_id: u64,
}

/// Owns one page's worth of challenge activations. Everything that would be
/// page-global state in a browser (current challenge, attached scripts) lives
/// on this instance or on its page model.
pub struct ChallengeSession<H, R> {
    api: ApiClient,
    page: SharedPage,
    resolver: AssetResolver,
    injector: SafeInjector,
    loader: ScriptLoader,
    progress: ProgressSynchronizer,
    translations: Translations,
    career_id: u64,
    host: Arc<H>,
    reactivity: R,
    generation: AtomicU64,
    current: Mutex<Option<CurrentActivation>>,
}

impl<H: ScriptHost, R: Reactivity> ChallengeSession<H, R> {
    pub fn new(config: EngineConfig, page: SharedPage, host: Arc<H>, reactivity: R) -> Self {
        let api = ApiClient::new(&config);
        let policy = config.asset_policy;
        let resolver = AssetResolver::new(
            api.clone(),
            policy.clone(),
            ConventionTable::new(config.convention_overrides),
        );
        Self {
            resolver,
            injector: SafeInjector::new(page.clone(), policy.clone()),
            loader: ScriptLoader::new(page.clone(), policy),
            progress: ProgressSynchronizer::new(
                api.clone(),
                page.clone(),
                config.translations.clone(),
            ),
            api,
            page,
            translations: config.translations,
            career_id: config.career_id,
            host,
            reactivity,
            generation: AtomicU64::new(0),
            current: Mutex::new(None),
        }
    }

    pub fn page(&self) -> &SharedPage {
        &self.page
    }

    pub fn host(&self) -> &Arc<H> {
        &self.host
    }

    pub fn progress(&self) -> &ProgressSynchronizer {
        &self.progress
    }

    pub fn current_challenge(&self) -> Option<u64> {
        self.current_activation()
            .map(|activation| activation.challenge_id)
    }

    /// Shows `challenge_id`'s region and fills it with the challenge's view.
    /// Failures end up in the region, never in the return path.
    pub async fn activate(&self, challenge_id: u64, display_name: &str) -> ActivationState {
        if challenge_id == 0 {
            return ActivationState::Idle;
        }

        let placeholder = format!(
            "<div class=\"text-center py-5\">{} {}...</div>",
            escape_html(&self.translations.t(KEY_LOADING)),
            escape_html(display_name)
        );
        let step_id = {
            let mut page = self.page.lock().expect("page lock poisoned");
            let Some(step_id) = page
                .region_for_challenge(challenge_id)
                .map(|region| region.step_id)
            else {
                debug!(
                    "{} no region bound to challenge {challenge_id}",
                    category_challenge()
                );
                return ActivationState::Idle;
            };
            page.show_only(step_id);
            if let Some(region) = page.region_mut(step_id) {
                region.clear_feedback();
                region.meta.clear();
                region.mounted = false;
                region.content = placeholder;
                region.state = ActivationState::Loading;
            }
            step_id
        };
        let generation = self.begin(challenge_id, step_id);
        info!(
            "{} activating challenge {challenge_id} ({display_name}) in step {step_id}",
            category_challenge()
        );

        let descriptor = match self.api.get_challenge(challenge_id).await {
            Ok(descriptor) => descriptor,
            Err(err) => return self.fail_load(generation, step_id, &err),
        };
        if !self.is_current(generation) {
            return self.superseded(challenge_id);
        }
        self.render_meta(step_id, &descriptor);

        let view = match self.resolver.resolve_view(&descriptor).await {
            Ok(view) => view,
            Err(err) => return self.fail_load(generation, step_id, &err),
        };
        if !self.is_current(generation) {
            return self.superseded(challenge_id);
        }
        let script = self.resolver.resolve_script(&descriptor, &view.source);

        self.injector.suspend(step_id);
        self.injector
            .mount(self.host.as_ref(), step_id, &view.markup, || {
                self.is_current(generation)
            })
            .await;
        let outcome = self.attach(generation, step_id, &descriptor, script).await;

        if self.owns_region(generation, step_id) {
            self.injector.resume(&self.reactivity, step_id);
        }
        outcome
    }

    /// Runs after the view is mounted: controller script, then post-render
    /// hook.
    async fn attach(
        &self,
        generation: u64,
        step_id: u64,
        descriptor: &ChallengeDescriptor,
        script: Option<String>,
    ) -> ActivationState {
        if !self.is_current(generation) {
            return self.superseded(descriptor.id);
        }
        self.set_state(step_id, ActivationState::Mounted {
            script_attached: false,
        });

        let status = match script.as_deref() {
            Some(url) => self.loader.ensure_loaded(self.host.as_ref(), url).await,
            None => Ok(LoadStatus::Skipped),
        };
        if !self.is_current(generation) {
            return self.superseded(descriptor.id);
        }
        let status = match status {
            Ok(status) => status,
            Err(err) => {
                warn!(
                    "{} challenge {} controller failed: {err}",
                    category_challenge(),
                    descriptor.id
                );
                let message = self.translations.t(KEY_LOAD_FAILED);
                let mut page = self.page.lock().expect("page lock poisoned");
                page.reveal_global_error();
                let state = ActivationState::Failed {
                    message: err.to_string(),
                };
                if let Some(region) = page.region_mut(step_id) {
                    region.set_feedback(FeedbackLevel::Danger, message);
                    region.state = state.clone();
                }
                return state;
            }
        };
        self.set_state(step_id, ActivationState::Mounted {
            script_attached: status.attached(),
        });

        match self.host.post_render(descriptor) {
            HookOutcome::Completed => {
                debug!("{} post-render hook completed", category_script())
            }
            HookOutcome::Missing => debug!(
                "{} controller for challenge {} exposes no post-render hook",
                category_script(),
                descriptor.id
            ),
            HookOutcome::Failed(reason) => warn!(
                "{} post-render hook for challenge {} failed: {reason}",
                category_script(),
                descriptor.id
            ),
        }

        if !self.is_current(generation) {
            return self.superseded(descriptor.id);
        }
        self.set_state(step_id, ActivationState::Ready);
        info!(
            "{} challenge {} ready (script_attached={})",
            category_challenge(),
            descriptor.id,
            status.attached()
        );
        ActivationState::Ready
    }

    pub async fn submit_flag(&self, challenge_id: u64) -> SubmissionOutcome {
        let Some(current) = self
            .current_activation()
            .filter(|activation| challenge_id != 0 && activation.challenge_id == challenge_id)
        else {
            return SubmissionOutcome::Ignored;
        };
        let step_id = current.step_id;

        let submission = {
            let mut page = self.page.lock().expect("page lock poisoned");
            let Some(region) = page.region_mut(step_id) else {
                return SubmissionOutcome::Ignored;
            };
            let submission = region.flag_input.trim().to_string();
            if submission.is_empty() {
                region.set_feedback(FeedbackLevel::Info, self.translations.t(KEY_ENTER_FLAG));
                return SubmissionOutcome::EmptySubmission;
            }
            region.submit_enabled = false;
            region.set_feedback(FeedbackLevel::Info, self.translations.t(KEY_SUBMITTING));
            submission
        };

        let outcome = match self.api.post_attempt(challenge_id, &submission).await {
            Ok(envelope) if envelope.success == Some(false) => SubmissionOutcome::Rejected {
                message: envelope
                    .data
                    .and_then(|data| data.message)
                    .or(envelope.message)
                    .filter(|message| !message.is_empty())
                    .unwrap_or_else(|| self.translations.t(KEY_UNEXPECTED)),
            },
            Ok(envelope) => {
                let result = envelope.data.unwrap_or_default();
                let message = result.message.filter(|message| !message.is_empty());
                if result.status == STATUS_CORRECT {
                    SubmissionOutcome::Correct {
                        message: message.unwrap_or_else(|| self.translations.t(KEY_SOLVED)),
                    }
                } else {
                    SubmissionOutcome::Incorrect {
                        status: result.status,
                        message: message.unwrap_or_else(|| self.translations.t(KEY_INCORRECT)),
                    }
                }
            }
            Err(err) => {
                warn!(
                    "{} flag submission for challenge {challenge_id} failed: {err}",
                    category_challenge()
                );
                SubmissionOutcome::Failed {
                    message: self.translations.t(KEY_SUBMISSION_FAILED),
                }
            }
        };

        {
            let mut page = self.page.lock().expect("page lock poisoned");
            if let Some(region) = page.region_mut(step_id) {
                region.submit_enabled = true;
                match &outcome {
                    SubmissionOutcome::Correct { message } => {
                        region.flag_input.clear();
                        region.set_feedback(FeedbackLevel::Success, message.clone());
                    }
                    SubmissionOutcome::Incorrect { message, .. }
                    | SubmissionOutcome::Rejected { message }
                    | SubmissionOutcome::Failed { message } => {
                        region.set_feedback(FeedbackLevel::Danger, message.clone());
                    }
                    SubmissionOutcome::Ignored | SubmissionOutcome::EmptySubmission => {}
                }
            }
        }

        let status = match &outcome {
            SubmissionOutcome::Correct { .. } => STATUS_CORRECT,
            SubmissionOutcome::Incorrect { status, .. } if status.is_empty() => "incorrect",
            SubmissionOutcome::Incorrect { status, .. } => status.as_str(),
            _ => "error",
        };
        info!(
            "{} challenge {challenge_id} submission {}",
            category_challenge(),
            status_label(status)
        );

        if matches!(outcome, SubmissionOutcome::Correct { .. })
            && let Err(err) = self.progress.refresh(self.career_id).await
        {
            warn!(
                "{} progress refresh after solve failed: {err}",
                category_challenge()
            );
        }
        outcome
    }

    fn begin(&self, challenge_id: u64, step_id: u64) -> u64 {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        *self.current.lock().expect("activation lock poisoned") = Some(CurrentActivation {
            generation,
            challenge_id,
            step_id,
        });
        generation
    }

    fn current_activation(&self) -> Option<CurrentActivation> {
        *self.current.lock().expect("activation lock poisoned")
    }

    fn is_current(&self, generation: u64) -> bool {
        self.current_activation()
            .map(|activation| activation.generation == generation)
            .unwrap_or(false)
    }

    /// A superseded activation still releases its region unless the newer
    /// activation has taken that same region over.
    fn owns_region(&self, generation: u64, step_id: u64) -> bool {
        match self.current_activation() {
            Some(activation) => activation.generation == generation || activation.step_id != step_id,
            None => true,
        }
    }

    fn superseded(&self, challenge_id: u64) -> ActivationState {
        debug!(
            "{} discarding stale response for challenge {challenge_id}",
            category_challenge()
        );
        ActivationState::Superseded
    }

    fn set_state(&self, step_id: u64, state: ActivationState) {
        let mut page = self.page.lock().expect("page lock poisoned");
        if let Some(region) = page.region_mut(step_id) {
            region.state = state;
        }
    }

    fn fail_load(&self, generation: u64, step_id: u64, err: &EmbedError) -> ActivationState {
        if !self.is_current(generation) {
            debug!(
                "{} ignoring failure from superseded activation: {err}",
                category_challenge()
            );
            return ActivationState::Superseded;
        }
        warn!("{} failed to load challenge: {err}", category_challenge());

        let message = self.translations.t(KEY_LOAD_FAILED);
        let state = ActivationState::Failed {
            message: err.to_string(),
        };
        let mut page = self.page.lock().expect("page lock poisoned");
        page.reveal_global_error();
        if let Some(region) = page.region_mut(step_id) {
            region.content = format!(
                "<div class=\"alert alert-danger\">{}</div>",
                escape_html(&message)
            );
            region.mounted = false;
            region.set_feedback(FeedbackLevel::Danger, message);
            region.state = state.clone();
        }
        state
    }

    fn render_meta(&self, step_id: u64, descriptor: &ChallengeDescriptor) {
        let meta = meta_line(descriptor, &self.translations);
        let solved_notice = descriptor
            .is_solved()
            .then(|| self.translations.t(KEY_ALREADY_SOLVED));

        let mut page = self.page.lock().expect("page lock poisoned");
        if let Some(region) = page.region_mut(step_id) {
            region.meta = meta;
            match solved_notice {
                Some(notice) => region.set_feedback(FeedbackLevel::Success, notice),
                None => region.clear_feedback(),
            }
        }
    }
}

/// `Value: 100 • Category: web • Attempts Remaining: Unlimited`, skipping
/// whatever the descriptor does not carry.
pub fn meta_line(descriptor: &ChallengeDescriptor, translations: &Translations) -> String {
    let mut segments = Vec::new();
    if let Some(value) = descriptor.value_text() {
        segments.push(format!("{}: {value}", translations.t(KEY_VALUE)));
    }
    if let Some(category) = descriptor
        .category
        .as_deref()
        .filter(|category| !category.is_empty())
    {
        segments.push(format!("{}: {category}", translations.t(KEY_CATEGORY)));
    }
    if let Some(max_attempts) = descriptor.max_attempts {
        let remaining = match max_attempts {
            Some(count) if count != 0 => count.to_string(),
            _ => translations.t(KEY_UNLIMITED),
        };
        segments.push(format!(
            "{}: {remaining}",
            translations.t(KEY_ATTEMPTS_REMAINING)
        ));
    }
    segments.join(" • ")
}
