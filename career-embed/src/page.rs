use std::{
    collections::{BTreeMap, BTreeSet},
    sync::{Arc, Mutex},
};

use serde::Serialize;

pub type SharedPage = Arc<Mutex<Page>>;

pub const CLASS_COMPLETED: &str = "bg-success";
pub const CLASS_PENDING: &str = "bg-secondary";

#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ActivationState {
    #[default]
    Idle,
    Loading,
    Mounted {
        script_attached: bool,
    },
    Ready,
    Failed {
        message: String,
    },
    /// A later activation took over the page before this one finished.
    Superseded,
}

#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackLevel {
    Success,
    Danger,
    Info,
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct Feedback {
    pub level: FeedbackLevel,
    pub message: String,
}

/// A `<script>` element as it exists in the page body.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct ScriptElement {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl ScriptElement {
    pub fn external(src: impl Into<String>) -> Self {
        Self {
            src: Some(src.into()),
            text: None,
        }
    }

    pub fn inline(text: impl Into<String>) -> Self {
        Self {
            src: None,
            text: Some(text.into()),
        }
    }
}

/// On-screen area owned by one career step.
#[derive(Clone, Debug, Serialize)]
pub struct Region {
    pub step_id: u64,
    pub challenge_id: u64,
    pub visible: bool,
    pub mounted: bool,
    pub reactivity_suspended: bool,
    pub content: String,
    pub meta: String,
    pub feedback: Option<Feedback>,
    pub flag_input: String,
    pub submit_enabled: bool,
    pub state: ActivationState,
}

impl Region {
    fn new(step_id: u64, challenge_id: u64) -> Self {
        Self {
            step_id,
            challenge_id,
            visible: false,
            mounted: false,
            reactivity_suspended: false,
            content: String::new(),
            meta: String::new(),
            feedback: None,
            flag_input: String::new(),
            submit_enabled: true,
            state: ActivationState::Idle,
        }
    }

    pub fn set_feedback(&mut self, level: FeedbackLevel, message: impl Into<String>) {
        self.feedback = Some(Feedback {
            level,
            message: message.into(),
        });
    }

    pub fn clear_feedback(&mut self) {
        self.feedback = None;
    }
}

#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
pub struct ProgressBar {
    pub width: String,
    pub aria_valuenow: String,
    pub label: String,
}

#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
pub struct Badge {
    pub text: String,
    pub classes: BTreeSet<String>,
}

impl Badge {
    pub fn toggle_class(&mut self, class: &str, on: bool) {
        if on {
            self.classes.insert(class.to_string());
        } else {
            self.classes.remove(class);
        }
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.contains(class)
    }
}

#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
pub struct StepCard {
    /// Mirrors the card's `data-step-completed` attribute.
    pub completed: Option<bool>,
    pub badge: Option<Badge>,
}

/// In-memory model of the host page: step regions, the body's script list,
/// progress widgets and the global error banner.
#[derive(Clone, Debug, Default, Serialize)]
pub struct Page {
    regions: BTreeMap<u64, Region>,
    body_scripts: Vec<ScriptElement>,
    global_error_visible: bool,
    progress_bar: Option<ProgressBar>,
    progress_count: Option<String>,
    step_cards: BTreeMap<u64, StepCard>,
}

impl Page {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_shared(self) -> SharedPage {
        Arc::new(Mutex::new(self))
    }

    pub fn with_region(mut self, step_id: u64, challenge_id: u64) -> Self {
        self.regions
            .insert(step_id, Region::new(step_id, challenge_id));
        self
    }

    pub fn with_progress_bar(mut self) -> Self {
        self.progress_bar = Some(ProgressBar::default());
        self
    }

    pub fn with_progress_count(mut self) -> Self {
        self.progress_count = Some(String::new());
        self
    }

    pub fn with_step_card(mut self, step_id: u64, with_badge: bool) -> Self {
        let badge = with_badge.then(Badge::default);
        self.step_cards.insert(
            step_id,
            StepCard {
                completed: None,
                badge,
            },
        );
        self
    }

    pub fn region(&self, step_id: u64) -> Option<&Region> {
        self.regions.get(&step_id)
    }

    pub fn region_mut(&mut self, step_id: u64) -> Option<&mut Region> {
        self.regions.get_mut(&step_id)
    }

    pub fn region_for_challenge(&self, challenge_id: u64) -> Option<&Region> {
        self.regions
            .values()
            .find(|region| region.challenge_id == challenge_id)
    }

    pub fn region_for_challenge_mut(&mut self, challenge_id: u64) -> Option<&mut Region> {
        self.regions
            .values_mut()
            .find(|region| region.challenge_id == challenge_id)
    }

    /// Makes `step_id` the only visible region.
    pub fn show_only(&mut self, step_id: u64) {
        for region in self.regions.values_mut() {
            region.visible = region.step_id == step_id;
        }
    }

    pub fn visible_regions(&self) -> usize {
        self.regions.values().filter(|region| region.visible).count()
    }

    pub fn set_flag_input(&mut self, challenge_id: u64, value: impl Into<String>) -> bool {
        match self.region_for_challenge_mut(challenge_id) {
            Some(region) => {
                region.flag_input = value.into();
                true
            }
            None => false,
        }
    }

    pub fn body_scripts(&self) -> &[ScriptElement] {
        &self.body_scripts
    }

    pub fn has_script_src(&self, src: &str) -> bool {
        self.body_scripts
            .iter()
            .any(|script| script.src.as_deref() == Some(src))
    }

    pub fn count_script_src(&self, src: &str) -> usize {
        self.body_scripts
            .iter()
            .filter(|script| script.src.as_deref() == Some(src))
            .count()
    }

    /// Appends an external script unless one with the same `src` exists.
    /// Returns whether an element was added.
    pub fn append_external_script(&mut self, src: &str) -> bool {
        if self.has_script_src(src) {
            return false;
        }
        self.body_scripts.push(ScriptElement::external(src));
        true
    }

    pub fn append_inline_script(&mut self, text: &str) {
        self.body_scripts.push(ScriptElement::inline(text));
    }

    pub fn global_error_visible(&self) -> bool {
        self.global_error_visible
    }

    pub fn reveal_global_error(&mut self) {
        self.global_error_visible = true;
    }

    pub fn progress_bar(&self) -> Option<&ProgressBar> {
        self.progress_bar.as_ref()
    }

    pub fn progress_bar_mut(&mut self) -> Option<&mut ProgressBar> {
        self.progress_bar.as_mut()
    }

    pub fn progress_count(&self) -> Option<&str> {
        self.progress_count.as_deref()
    }

    pub fn set_progress_count(&mut self, text: impl Into<String>) {
        if let Some(count) = self.progress_count.as_mut() {
            *count = text.into();
        }
    }

    pub fn step_card(&self, step_id: u64) -> Option<&StepCard> {
        self.step_cards.get(&step_id)
    }

    pub fn step_card_mut(&mut self, step_id: u64) -> Option<&mut StepCard> {
        self.step_cards.get_mut(&step_id)
    }
}
