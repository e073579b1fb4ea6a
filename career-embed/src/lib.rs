mod api;
mod assets;
mod config;
mod descriptor;
mod error;
mod host;
mod injector;
mod logging;
mod markup;
mod page;
mod progress;
mod script_loader;
mod session;
mod translations;

pub use api::{ATTEMPT_PATH, ApiClient, CAREERS_PATH, CHALLENGE_PATH, CSRF_HEADER};
pub use assets::{
    AssetPolicy, AssetResolver, ConventionTable, ResolvedView, ViewSource, derive_script_url,
    is_probably_html, is_urlish,
};
pub use config::{ConventionOverride, EngineConfig, parse_convention_overrides};
pub use descriptor::{
    ApiEnvelope, AssetPaths, AttemptRequest, AttemptResult, CareerEntry, CareerProgressSnapshot,
    CareerStepEntry, CareersPayload, ChallengeDescriptor, StepProgress, TypeData,
};
pub use error::EmbedError;
pub use host::{ExecutedScript, HookOutcome, HttpScriptHost, NoReactivity, Reactivity, ScriptHost};
pub use injector::{MountReport, SafeInjector};
pub use logging::init as init_logging;
pub use markup::{ScannedMarkup, escape_html, extract_scripts};
pub use page::{
    ActivationState, Badge, CLASS_COMPLETED, CLASS_PENDING, Feedback, FeedbackLevel, Page,
    ProgressBar, Region, ScriptElement, SharedPage, StepCard,
};
pub use progress::{ProgressSynchronizer, progress_percent};
pub use script_loader::{LoadStatus, ScriptLoader};
pub use session::{ChallengeSession, STATUS_CORRECT, SubmissionOutcome, meta_line};
pub use translations::Translations;
