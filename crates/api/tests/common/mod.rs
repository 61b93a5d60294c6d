#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tempfile::TempDir;
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use retroreel_api::config::ServerConfig;
use retroreel_api::engine::{
    spawn_generation_driver, GenerationClient, GenerationQueue, RetryConfig,
};
use retroreel_api::router::build_app_router;
use retroreel_api::state::AppState;
use retroreel_core::generation::GenerationRequest;
use retroreel_effects::{EffectOrchestrator, OrchestratorConfig};
use retroreel_seedance::{GenerationOutput, ProviderError, ProviderEvent, VideoProvider};
use retroreel_store::MetadataStore;

/// Scriptable in-process stand-in for the upstream generation service.
///
/// `failures` are consumed one per `generate` call before any success.
/// An optional gate semaphore holds each successful call in flight
/// until the test adds a permit, so tests can observe processing state.
pub struct MockProvider {
    failures: Mutex<Vec<ProviderError>>,
    gate: Option<Arc<Semaphore>>,
    attempts: AtomicU32,
}

impl MockProvider {
    pub fn succeeding() -> Self {
        Self::scripted(Vec::new())
    }

    pub fn scripted(failures: Vec<ProviderError>) -> Self {
        Self {
            failures: Mutex::new(failures),
            gate: None,
            attempts: AtomicU32::new(0),
        }
    }

    pub fn gated(gate: Arc<Semaphore>) -> Self {
        Self {
            failures: Mutex::new(Vec::new()),
            gate: Some(gate),
            attempts: AtomicU32::new(0),
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VideoProvider for MockProvider {
    async fn generate(
        &self,
        _request: &GenerationRequest,
        events: mpsc::Sender<ProviderEvent>,
    ) -> Result<GenerationOutput, ProviderError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let scripted = self.failures.lock().unwrap().pop();
        if let Some(error) = scripted {
            return Err(error);
        }

        let _ = events.send(ProviderEvent::Status("running".into())).await;
        if let Some(gate) = &self.gate {
            let permit = gate
                .acquire()
                .await
                .map_err(|e| ProviderError::Permanent(e.to_string()))?;
            // One permit releases exactly one in-flight call.
            permit.forget();
        }

        Ok(GenerationOutput {
            video_url: "https://example.com/clip".into(),
            content_type: "video/mp4".into(),
            file_name: "clip.mp4".into(),
            size_bytes: 11,
            duration_secs: 5.0,
            fps: 24,
            width: 1280,
            height: 720,
            seed: 7,
        })
    }

    async fn fetch(&self, _url: &str, dest: &Path) -> Result<u64, ProviderError> {
        tokio::fs::write(dest, b"video-bytes")
            .await
            .map_err(|e| ProviderError::Permanent(e.to_string()))?;
        Ok(11)
    }
}

/// Everything a test needs, with temp dirs kept alive for the duration.
pub struct TestHarness {
    pub app: Router,
    pub state: AppState,
    pub provider: Arc<MockProvider>,
    pub cancel: CancellationToken,
    pub data_dir: TempDir,
    pub script_dir: TempDir,
}

impl Drop for TestHarness {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config(data_dir: &Path, script_dir: &Path) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        data_dir: data_dir.to_path_buf(),
        ark_api_key: "test-key".to_string(),
        ark_base_url: None,
        processor_dir: script_dir.to_path_buf(),
        effect_concurrency: 2,
        avg_processing_secs: 60,
        job_retention_secs: 3600,
    }
}

pub async fn harness() -> TestHarness {
    harness_with(MockProvider::succeeding()).await
}

/// Build the full application with all middleware layers around the
/// given mock provider. This mirrors the wiring in `main.rs` so tests
/// exercise the same stack production uses, with millisecond retry
/// delays so retry tests run fast.
pub async fn harness_with(provider: MockProvider) -> TestHarness {
    let data_dir = tempfile::tempdir().expect("tempdir");
    let script_dir = tempfile::tempdir().expect("tempdir");
    let config = test_config(data_dir.path(), script_dir.path());

    let store = Arc::new(
        MetadataStore::open(data_dir.path())
            .await
            .expect("store open"),
    );
    let provider = Arc::new(provider);
    let queue = Arc::new(GenerationQueue::new(config.avg_processing_secs));
    let client = Arc::new(
        GenerationClient::new(
            Arc::clone(&provider) as Arc<dyn VideoProvider>,
            Arc::clone(&store),
        )
        .with_retry(RetryConfig {
            max_attempts: 3,
            base_delay: std::time::Duration::from_millis(1),
            max_delay: std::time::Duration::from_millis(5),
        }),
    );

    let cancel = CancellationToken::new();
    spawn_generation_driver(Arc::clone(&queue), client, cancel.child_token());

    let effects = Arc::new(EffectOrchestrator::new(
        Arc::clone(&store),
        OrchestratorConfig {
            processor_dir: script_dir.path().to_path_buf(),
            interpreter: "sh".to_string(),
            max_concurrency: config.effect_concurrency,
        },
    ));
    let effect_jobs = effects.jobs();

    let state = AppState {
        config: Arc::new(config.clone()),
        store,
        queue,
        effects,
        effect_jobs,
    };
    let app = build_app_router(state.clone(), &config);

    TestHarness {
        app,
        state,
        provider,
        cancel,
        data_dir,
        script_dir,
    }
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn get(app: &Router, uri: &str) -> Response<Body> {
    app.clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap()
}

pub async fn post_json(app: &Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    app.clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap()
}

pub async fn delete(app: &Router, uri: &str) -> Response<Body> {
    app.clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Poll `check` until it returns `Some` or the timeout elapses.
pub async fn wait_until<T, F, Fut>(timeout: std::time::Duration, mut check: F) -> T
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Option<T>>,
{
    tokio::time::timeout(timeout, async {
        loop {
            if let Some(value) = check().await {
                return value;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached before the timeout")
}

/// Canonical valid generation request body.
pub fn generation_body(prompt: &str) -> serde_json::Value {
    serde_json::json!({
        "prompt": prompt,
        "duration": 5,
        "resolution": "720p",
    })
}

/// Seed one stored video directly through the store and return its id
/// and filename.
pub async fn seed_video(state: &AppState, prompt: &str) -> retroreel_store::VideoMetadata {
    let request: GenerationRequest = serde_json::from_value(generation_body(prompt)).unwrap();
    let staged = state.store.scratch_path("seed.mp4");
    tokio::fs::write(&staged, b"source-bytes").await.unwrap();
    let row = retroreel_store::VideoMetadata::for_generation(&request, "mp4");
    state.store.save_artifact(&staged, row).await.unwrap()
}

/// Install a fake effect processor script for `kind`.
pub async fn write_processor(script_dir: &Path, kind: &str, body: &str) {
    let path = script_dir.join(format!("{kind}_processor.py"));
    tokio::fs::write(&path, body).await.unwrap();
}
