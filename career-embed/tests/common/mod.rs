#![allow(dead_code)]

use std::{
    collections::{HashMap, HashSet},
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, Uri, header::COOKIE},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use embed::{
    CSRF_HEADER, ChallengeDescriptor, EngineConfig, HookOutcome, Page, Reactivity, ScriptHost,
    SharedPage,
};
use serde_json::{Value, json};
use tokio::task::JoinHandle;

#[derive(Clone, Debug)]
pub struct RecordedAttempt {
    pub csrf_token: Option<String>,
    pub body: Value,
}

/// In-process stand-in for the CTF server: challenge records, static assets,
/// the attempt endpoint and the career listing.
pub struct Fixture {
    challenges: Mutex<HashMap<u64, (Value, Duration)>>,
    assets: Mutex<HashMap<String, String>>,
    verdicts: Mutex<HashMap<String, Value>>,
    careers: Mutex<Value>,
    careers_fail: AtomicBool,
    asset_hits: Mutex<Vec<String>>,
    asset_cookies: Mutex<Vec<Option<String>>>,
    attempts: Mutex<Vec<RecordedAttempt>>,
    career_hits: AtomicUsize,
}

impl Fixture {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            challenges: Mutex::new(HashMap::new()),
            assets: Mutex::new(HashMap::new()),
            verdicts: Mutex::new(HashMap::new()),
            careers: Mutex::new(json!([])),
            careers_fail: AtomicBool::new(false),
            asset_hits: Mutex::new(Vec::new()),
            asset_cookies: Mutex::new(Vec::new()),
            attempts: Mutex::new(Vec::new()),
            career_hits: AtomicUsize::new(0),
        })
    }

    pub fn challenge(&self, descriptor: Value) {
        self.delayed_challenge(descriptor, Duration::ZERO);
    }

    pub fn delayed_challenge(&self, descriptor: Value, delay: Duration) {
        let id = descriptor["id"].as_u64().expect("descriptor needs an id");
        self.challenges
            .lock()
            .expect("fixture lock poisoned")
            .insert(id, (descriptor, delay));
    }

    pub fn asset(&self, path: &str, body: &str) {
        self.assets
            .lock()
            .expect("fixture lock poisoned")
            .insert(path.to_string(), body.to_string());
    }

    pub fn verdict(&self, submission: &str, reply: Value) {
        self.verdicts
            .lock()
            .expect("fixture lock poisoned")
            .insert(submission.to_string(), reply);
    }

    pub fn careers(&self, careers: Value) {
        *self.careers.lock().expect("fixture lock poisoned") = careers;
    }

    pub fn fail_careers(&self) {
        self.careers_fail.store(true, Ordering::SeqCst);
    }

    pub fn asset_hits(&self) -> Vec<String> {
        self.asset_hits
            .lock()
            .expect("fixture lock poisoned")
            .clone()
    }

    /// `Cookie` header of every asset request, in arrival order.
    pub fn asset_cookies(&self) -> Vec<Option<String>> {
        self.asset_cookies
            .lock()
            .expect("fixture lock poisoned")
            .clone()
    }

    pub fn attempts(&self) -> Vec<RecordedAttempt> {
        self.attempts.lock().expect("fixture lock poisoned").clone()
    }

    pub fn career_hits(&self) -> usize {
        self.career_hits.load(Ordering::SeqCst)
    }
}

pub async fn spawn_fixture(fixture: Arc<Fixture>) -> (String, JoinHandle<()>) {
    let app = Router::new()
        .route("/api/v1/challenges/attempt", post(attempt))
        .route("/api/v1/challenges/{id}", get(challenge))
        .route("/plugins/career/api/v1/career", get(careers))
        .fallback(asset)
        .with_state(fixture);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("listener should bind");
    let addr = listener.local_addr().expect("listener should have addr");
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.expect("server should run");
    });
    (format!("http://{addr}"), handle)
}

async fn challenge(State(fixture): State<Arc<Fixture>>, Path(id): Path<u64>) -> Response {
    let entry = fixture
        .challenges
        .lock()
        .expect("fixture lock poisoned")
        .get(&id)
        .cloned();
    let Some((descriptor, delay)) = entry else {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({"success": false, "message": "not found"})),
        )
            .into_response();
    };
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
    Json(json!({"success": true, "data": descriptor})).into_response()
}

async fn attempt(
    State(fixture): State<Arc<Fixture>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    let csrf_token = headers
        .get(CSRF_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    let submission = body["submission"].as_str().unwrap_or_default().to_string();
    fixture
        .attempts
        .lock()
        .expect("fixture lock poisoned")
        .push(RecordedAttempt {
            csrf_token,
            body: body.clone(),
        });

    let verdict = fixture
        .verdicts
        .lock()
        .expect("fixture lock poisoned")
        .get(&submission)
        .cloned();
    Json(verdict.unwrap_or_else(|| {
        json!({"success": true, "data": {"status": "incorrect", "message": "Incorrect"}})
    }))
}

async fn careers(State(fixture): State<Arc<Fixture>>) -> Response {
    fixture.career_hits.fetch_add(1, Ordering::SeqCst);
    if fixture.careers_fail.load(Ordering::SeqCst) {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    let careers = fixture
        .careers
        .lock()
        .expect("fixture lock poisoned")
        .clone();
    Json(json!({"success": true, "data": {"careers": careers}})).into_response()
}

async fn asset(State(fixture): State<Arc<Fixture>>, headers: HeaderMap, uri: Uri) -> Response {
    let path = uri.path().to_string();
    let cookie = headers
        .get(COOKIE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    fixture
        .asset_cookies
        .lock()
        .expect("fixture lock poisoned")
        .push(cookie);
    fixture
        .asset_hits
        .lock()
        .expect("fixture lock poisoned")
        .push(path.clone());
    let body = fixture
        .assets
        .lock()
        .expect("fixture lock poisoned")
        .get(&path)
        .cloned();
    match body {
        Some(body) => body.into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Shared, ordered record of what the host and reactivity layer were asked
/// to do.
#[derive(Clone, Debug, Default)]
pub struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    pub fn push(&self, event: impl Into<String>) {
        self.0.lock().expect("event log poisoned").push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.0.lock().expect("event log poisoned").clone()
    }

    pub fn count(&self, event: &str) -> usize {
        self.0
            .lock()
            .expect("event log poisoned")
            .iter()
            .filter(|entry| entry.as_str() == event)
            .count()
    }
}

pub struct RecordingHost {
    log: EventLog,
    failing: HashSet<String>,
    delays: HashMap<String, Duration>,
    hook: HookOutcome,
}

impl RecordingHost {
    pub fn new(log: EventLog) -> Self {
        Self {
            log,
            failing: HashSet::new(),
            delays: HashMap::new(),
            hook: HookOutcome::Completed,
        }
    }

    pub fn failing(mut self, src: &str) -> Self {
        self.failing.insert(src.to_string());
        self
    }

    pub fn delayed(mut self, src: &str, delay: Duration) -> Self {
        self.delays.insert(src.to_string(), delay);
        self
    }

    pub fn with_hook(mut self, hook: HookOutcome) -> Self {
        self.hook = hook;
        self
    }
}

impl ScriptHost for RecordingHost {
    async fn load(&self, src: &str) -> Result<(), String> {
        if let Some(delay) = self.delays.get(src).copied() {
            tokio::time::sleep(delay).await;
        }
        self.log.push(format!("load:{src}"));
        if self.failing.contains(src) {
            Err(format!("{src} did not load"))
        } else {
            Ok(())
        }
    }

    fn run_inline(&self, text: &str) -> Result<(), String> {
        self.log.push(format!("inline:{}", text.trim()));
        Ok(())
    }

    fn post_render(&self, challenge: &ChallengeDescriptor) -> HookOutcome {
        self.log.push(format!("hook:{}", challenge.id));
        self.hook.clone()
    }
}

#[derive(Clone, Debug, Default)]
pub struct RecordingReactivity {
    log: EventLog,
}

impl RecordingReactivity {
    pub fn new(log: EventLog) -> Self {
        Self { log }
    }
}

impl Reactivity for RecordingReactivity {
    fn init_tree(&self, step_id: u64) {
        self.log.push(format!("init:{step_id}"));
    }
}

pub fn config_for(base_url: &str) -> EngineConfig {
    EngineConfig::new(base_url)
        .with_career(1)
        .with_csrf_token("nonce-123")
}

/// Two steps bound to challenges 1 and 2, with progress widgets and badges.
pub fn two_step_page() -> SharedPage {
    Page::new()
        .with_region(1, 1)
        .with_region(2, 2)
        .with_progress_bar()
        .with_progress_count()
        .with_step_card(1, true)
        .with_step_card(2, true)
        .into_shared()
}
