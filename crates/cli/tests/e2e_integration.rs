//! End-to-end tests for the Bolty generation pipeline.
//!
//! These drive a real orchestrator, file store and local workspace against a
//! scripted model backend, from prompt to files on disk.

use std::collections::HashMap;
use std::error::Error as _;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bolty_core::error::{Error, ProviderError};
use bolty_core::provider::{
    BackendRequest, BackendResponse, Capability, ChunkReceiver, ModelBackend, StreamChunk,
};
use bolty_core::store::ConversationStore;
use bolty_core::turn::{ProjectId, TurnRole};
use bolty_providers::RetryPolicy;
use bolty_store::FileStore;
use bolty_worker::{ConcurrencyLimiter, GenerateRequest, Orchestrator};
use bolty_workspace::{AuditOutcome, LocalWorkspace};

// ── Scripted backend ─────────────────────────────────────────────────────

#[derive(Clone)]
enum Reply {
    Chunks(Vec<String>),
    Fail(ProviderError),
}

struct ScriptedBackend {
    replies: HashMap<String, Reply>,
    calls: Mutex<Vec<(String, Capability)>>,
    chunk_delay: Duration,
    active: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl ScriptedBackend {
    fn new(replies: &[(&str, Reply)]) -> Self {
        Self {
            replies: replies
                .iter()
                .map(|(m, r)| (m.to_string(), r.clone()))
                .collect(),
            calls: Mutex::new(Vec::new()),
            chunk_delay: Duration::ZERO,
            active: Arc::new(AtomicUsize::new(0)),
            peak: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = delay;
        self
    }

    fn calls_to(&self, model: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(m, _)| m == model)
            .count()
    }

    fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn reply(&self, model: &str, mode: Capability) -> Reply {
        self.calls.lock().unwrap().push((model.to_string(), mode));
        self.replies
            .get(model)
            .cloned()
            .unwrap_or_else(|| Reply::Fail(ProviderError::ModelNotFound(model.to_string())))
    }
}

#[async_trait::async_trait]
impl ModelBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "e2e_mock"
    }

    async fn generate(&self, request: BackendRequest) -> Result<BackendResponse, ProviderError> {
        match self.reply(&request.model, Capability::NonStreaming) {
            Reply::Chunks(chunks) => Ok(BackendResponse {
                text: chunks.concat(),
                model: request.model,
                usage: None,
            }),
            Reply::Fail(e) => Err(e),
        }
    }

    async fn generate_stream(&self, request: BackendRequest) -> Result<ChunkReceiver, ProviderError> {
        let chunks = match self.reply(&request.model, Capability::Streaming) {
            Reply::Chunks(chunks) => chunks,
            Reply::Fail(e) => return Err(e),
        };

        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        let (tx, rx) = tokio::sync::mpsc::channel(8);
        let delay = self.chunk_delay;
        let active = self.active.clone();
        tokio::spawn(async move {
            for chunk in chunks {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                if tx.send(Ok(StreamChunk::text(chunk))).await.is_err() {
                    break;
                }
            }
            let _ = tx.send(Ok(StreamChunk::done(None))).await;
            active.fetch_sub(1, Ordering::SeqCst);
        });
        Ok(rx)
    }
}

/// Split `text` into pieces of `size` characters.
fn chunked(text: &str, size: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars.chunks(size).map(|c| c.iter().collect()).collect()
}

fn overloaded() -> ProviderError {
    ProviderError::ApiError {
        status_code: 503,
        message: "The model is overloaded. Please try again later.".into(),
    }
}

const ARTIFACT: &str = r#"Here is your app.
<boltArtifact id="todo" title="Todo app">
<boltAction type="file" filePath="package.json">
{ "name": "todo" }
</boltAction>
<boltAction type="file" filePath="src/App.tsx">
export default function App() { return <p>todo</p>; }
</boltAction>
<boltAction type="shell">
mkdir -p build && echo ok > build/done.txt
</boltAction>
</boltArtifact>
Done!"#;

struct Pipeline {
    _dir: tempfile::TempDir,
    root: std::path::PathBuf,
    store_path: std::path::PathBuf,
    workspace: Arc<LocalWorkspace>,
    orchestrator: Orchestrator,
}

fn pipeline(backend: Arc<ScriptedBackend>, preferred: &[&str], limit: usize) -> Pipeline {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("workspaces");
    let store_path = dir.path().join("conversations.jsonl");
    let store = Arc::new(FileStore::open(&store_path).unwrap());
    let workspace = Arc::new(LocalWorkspace::new(&root));
    let orchestrator = Orchestrator::new(
        backend,
        store,
        workspace.clone(),
        Arc::new(ConcurrencyLimiter::new(limit)),
    )
    .with_preferred_models(preferred.iter().map(|m| m.to_string()).collect())
    .with_retry_policy(RetryPolicy::new(6, Duration::from_millis(400)));

    Pipeline {
        _dir: dir,
        root,
        store_path,
        workspace,
        orchestrator,
    }
}

// ── Tests ────────────────────────────────────────────────────────────────

#[cfg(unix)]
#[tokio::test]
async fn e2e_prompt_to_files_on_disk() {
    let backend = Arc::new(ScriptedBackend::new(&[(
        "gemini-2.5-flash",
        Reply::Chunks(chunked(ARTIFACT, 7)),
    )]));
    let p = pipeline(backend.clone(), &["gemini-2.5-flash"], 3);

    let outcome = p
        .orchestrator
        .generate(GenerateRequest::new("todo", "build a todo app"))
        .await
        .unwrap();

    assert_eq!(outcome.mode, Capability::Streaming);
    assert_eq!(outcome.actions_dispatched, 3);
    assert_eq!(outcome.actions_failed, 0);
    assert_eq!(outcome.text, ARTIFACT);

    let project = p.root.join("todo");
    assert_eq!(
        std::fs::read_to_string(project.join("package.json")).unwrap(),
        r#"{ "name": "todo" }"#
    );
    assert!(std::fs::read_to_string(project.join("src/App.tsx"))
        .unwrap()
        .contains("export default function App()"));
    assert_eq!(
        std::fs::read_to_string(project.join("build/done.txt")).unwrap(),
        "ok\n"
    );
    assert!(p.workspace.audit().entries_by_outcome(AuditOutcome::Failure).is_empty());

    // Both turns survive a reopen of the store
    let reopened = FileStore::open(&p.store_path).unwrap();
    let history = reopened.history(&ProjectId::new("todo")).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].role, TurnRole::User);
    assert_eq!(history[1].role, TurnRole::Model);
    assert_eq!(history[1].text, ARTIFACT);
}

#[tokio::test(start_paused = true)]
async fn e2e_falls_back_to_second_model_after_transient_failures() {
    let backend = Arc::new(ScriptedBackend::new(&[
        ("m1", Reply::Fail(overloaded())),
        ("m2", Reply::Chunks(vec!["all good".into()])),
    ]));
    let p = pipeline(backend.clone(), &["m1", "m2"], 3);

    let outcome = p
        .orchestrator
        .generate(GenerateRequest::new("p", "hello"))
        .await
        .unwrap();

    assert_eq!(outcome.model_id, "m2");
    assert_eq!(outcome.mode, Capability::Streaming);
    assert_eq!(outcome.failed_attempts, 6);
    assert_eq!(backend.calls_to("m1"), 6);
    assert_eq!(backend.calls_to("m2"), 1);
}

#[tokio::test]
async fn e2e_not_found_model_is_skipped_without_retry() {
    let backend = Arc::new(ScriptedBackend::new(&[(
        "real-model",
        Reply::Chunks(vec!["hi".into()]),
    )]));
    let p = pipeline(backend.clone(), &["retired-model", "real-model"], 3);

    let outcome = p
        .orchestrator
        .generate(GenerateRequest::new("p", "hello"))
        .await
        .unwrap();

    assert_eq!(outcome.model_id, "real-model");
    assert_eq!(backend.calls_to("retired-model"), 1);
}

#[tokio::test(start_paused = true)]
async fn e2e_exhaustion_reports_last_cause() {
    let backend = Arc::new(ScriptedBackend::new(&[("m1", Reply::Fail(overloaded()))]));
    let p = pipeline(backend.clone(), &["m1"], 3);

    let err = p
        .orchestrator
        .generate(GenerateRequest::new("p", "hello"))
        .await
        .unwrap_err();

    let Error::Provider(provider_err) = &err else {
        panic!("expected provider error, got {err}");
    };
    assert!(matches!(provider_err, ProviderError::Exhausted { .. }));
    let cause = provider_err.source().expect("exhaustion carries its cause");
    assert!(cause.to_string().contains("overloaded"));

    // 6 streaming attempts, then 6 non-streaming attempts
    assert_eq!(backend.total_calls(), 12);
}

#[tokio::test(start_paused = true)]
async fn e2e_limiter_bounds_concurrent_generations() {
    let artifact = "<boltAction type=\"file\" filePath=\"out.txt\">\nx\n</boltAction>";
    let backend = Arc::new(
        ScriptedBackend::new(&[("m", Reply::Chunks(chunked(artifact, 5)))])
            .with_chunk_delay(Duration::from_millis(20)),
    );
    let p = pipeline(backend.clone(), &["m"], 3);
    let o = &p.orchestrator;

    let (r1, r2, r3, r4, r5, r6) = tokio::join!(
        o.generate(GenerateRequest::new("p1", "go")),
        o.generate(GenerateRequest::new("p2", "go")),
        o.generate(GenerateRequest::new("p3", "go")),
        o.generate(GenerateRequest::new("p4", "go")),
        o.generate(GenerateRequest::new("p5", "go")),
        o.generate(GenerateRequest::new("p6", "go")),
    );
    for result in [r1, r2, r3, r4, r5, r6] {
        assert_eq!(result.unwrap().actions_dispatched, 1);
    }

    assert_eq!(backend.peak.load(Ordering::SeqCst), 3);
    assert_eq!(o.limiter().in_flight(), 0);
    for i in 1..=6 {
        assert!(p.root.join(format!("p{i}/out.txt")).exists());
    }
}

#[tokio::test]
async fn e2e_empty_prompt_never_reaches_backend() {
    let backend = Arc::new(ScriptedBackend::new(&[("m", Reply::Chunks(vec!["x".into()]))]));
    let p = pipeline(backend.clone(), &["m"], 3);

    let err = p
        .orchestrator
        .generate(GenerateRequest::new("p", ""))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Validation(_)));
    assert_eq!(backend.total_calls(), 0);
    assert!(!p.store_path.exists());
}

#[tokio::test]
async fn e2e_rejected_path_does_not_stop_later_actions() {
    let artifact = concat!(
        "<boltAction type=\"file\" filePath=\"../escape.txt\">\nbad\n</boltAction>\n",
        "<boltAction type=\"file\" filePath=\"ok.txt\">\ngood\n</boltAction>",
    );
    let backend = Arc::new(ScriptedBackend::new(&[(
        "m",
        Reply::Chunks(chunked(artifact, 3)),
    )]));
    let p = pipeline(backend, &["m"], 3);

    let outcome = p
        .orchestrator
        .generate(GenerateRequest::new("p", "go"))
        .await
        .unwrap();

    assert_eq!(outcome.actions_dispatched, 2);
    assert_eq!(outcome.actions_failed, 1);
    assert_eq!(std::fs::read_to_string(p.root.join("p/ok.txt")).unwrap(), "good");
    assert!(!p.root.join("escape.txt").exists());
    assert_eq!(p.workspace.audit().entries_by_outcome(AuditOutcome::Denied).len(), 1);
}
