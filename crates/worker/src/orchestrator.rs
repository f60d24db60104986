//! The generation cycle for one user prompt.

use std::sync::Arc;

use bolty_artifact::ArtifactParser;
use bolty_config::AppConfig;
use bolty_core::error::{Error, ProviderError, Result};
use bolty_core::provider::{Capability, GenerationRequest, ModelBackend};
use bolty_core::store::ConversationStore;
use bolty_core::turn::{ConversationTurn, ProjectId, TurnRole};
use bolty_core::workspace::Workspace;
use bolty_providers::router::retry_policy;
use bolty_providers::{InvocationOutput, InvokeOptions, ResilientInvoker, RetryPolicy};
use tracing::{debug, info, warn};

use crate::dispatcher::ActionDispatcher;
use crate::limiter::ConcurrencyLimiter;
use crate::prompt::ProjectType;

/// One inbound prompt.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub project_id: ProjectId,
    pub prompt: String,
    /// Models to try before the configured preference list
    pub model_hints: Vec<String>,
    /// Overrides the orchestrator's default project type
    pub project_type: Option<ProjectType>,
}

impl GenerateRequest {
    pub fn new(project_id: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            project_id: ProjectId::new(project_id),
            prompt: prompt.into(),
            model_hints: Vec::new(),
            project_type: None,
        }
    }

    pub fn with_model_hints(mut self, hints: Vec<String>) -> Self {
        self.model_hints = hints;
        self
    }

    pub fn with_project_type(mut self, project_type: ProjectType) -> Self {
        self.project_type = Some(project_type);
        self
    }
}

/// The result of a completed generation cycle.
#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    /// Everything the model produced, exactly as received
    pub text: String,
    pub model_id: String,
    pub mode: Capability,
    pub actions_dispatched: usize,
    pub actions_failed: usize,
    /// Failed attempts before the serving model answered
    pub failed_attempts: usize,
}

/// Raw output of the model phase, before dispatch has drained.
struct Generated {
    text: String,
    model_id: String,
    mode: Capability,
    failed_attempts: usize,
}

pub struct Orchestrator {
    invoker: ResilientInvoker,
    limiter: Arc<ConcurrencyLimiter>,
    store: Arc<dyn ConversationStore>,
    workspace: Arc<dyn Workspace>,
    retry: RetryPolicy,
    preferred_models: Vec<String>,
    max_output_tokens: u32,
    temperature: f32,
    project_type: ProjectType,
}

impl Orchestrator {
    pub fn new(
        backend: Arc<dyn ModelBackend>,
        store: Arc<dyn ConversationStore>,
        workspace: Arc<dyn Workspace>,
        limiter: Arc<ConcurrencyLimiter>,
    ) -> Self {
        Self {
            invoker: ResilientInvoker::new(backend),
            limiter,
            store,
            workspace,
            retry: RetryPolicy::default(),
            preferred_models: Vec::new(),
            max_output_tokens: 9000,
            temperature: 0.7,
            project_type: ProjectType::default(),
        }
    }

    /// Build an orchestrator with every knob taken from `config`.
    pub fn from_config(
        config: &AppConfig,
        backend: Arc<dyn ModelBackend>,
        store: Arc<dyn ConversationStore>,
        workspace: Arc<dyn Workspace>,
    ) -> Result<Self> {
        let project_type = config
            .project_type
            .parse::<ProjectType>()
            .map_err(|message| Error::Config { message })?;
        let limiter = Arc::new(ConcurrencyLimiter::new(config.concurrency.max_in_flight));

        Ok(Self::new(backend, store, workspace, limiter)
            .with_retry_policy(retry_policy(config))
            .with_preferred_models(config.preferred_models.clone())
            .with_max_output_tokens(config.max_output_tokens)
            .with_temperature(config.temperature)
            .with_project_type(project_type))
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_preferred_models(mut self, models: Vec<String>) -> Self {
        self.preferred_models = models;
        self
    }

    pub fn with_max_output_tokens(mut self, max: u32) -> Self {
        self.max_output_tokens = max;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_project_type(mut self, project_type: ProjectType) -> Self {
        self.project_type = project_type;
        self
    }

    pub fn limiter(&self) -> Arc<ConcurrencyLimiter> {
        self.limiter.clone()
    }

    pub fn invoker(&self) -> &ResilientInvoker {
        &self.invoker
    }

    /// Run one full generation cycle for `request`.
    ///
    /// 1. Validates the request; nothing is stored or sent on failure
    /// 2. Appends the USER turn and reads back the project history
    /// 3. Streams from the first working model inside a limiter slot, falling
    ///    back to one non-streaming invocation if streaming fails
    /// 4. Waits for dispatched actions to be applied
    /// 5. Appends the MODEL turn with the raw accumulated text
    pub async fn generate(&self, request: GenerateRequest) -> Result<GenerationOutcome> {
        self.validate(&request)?;
        let project = &request.project_id;

        info!(project = %project, prompt_len = request.prompt.len(), "Generation requested");

        self.store.append(project, TurnRole::User, &request.prompt).await?;
        let history = self.store.history(project).await?;

        let project_type = request.project_type.unwrap_or(self.project_type);
        let mut conversation = Vec::with_capacity(history.len() + 1);
        conversation.push(ConversationTurn::transient(
            TurnRole::Model,
            project_type.system_instruction(),
        ));
        conversation.extend(history);

        let generation = GenerationRequest {
            conversation,
            model_preferences: request
                .model_hints
                .iter()
                .chain(&self.preferred_models)
                .cloned()
                .collect(),
            max_output_tokens: self.max_output_tokens,
            temperature: self.temperature,
        };

        debug!(
            project = %project,
            turns = generation.conversation.len(),
            preferences = ?generation.model_preferences,
            in_flight = self.limiter.in_flight(),
            waiting = self.limiter.waiting(),
            "Waiting for generation slot"
        );

        let mut dispatcher = ActionDispatcher::spawn(self.workspace.clone(), project.clone());
        let generated = self
            .limiter
            .submit(self.run_model(&generation, &mut dispatcher))
            .await;
        let queued = dispatcher.queued();
        // Drain even on failure: actions already dispatched are never rolled back
        let report = dispatcher.finish().await;
        let generated = generated??;

        self.store.append(project, TurnRole::Model, &generated.text).await?;

        info!(
            project = %project,
            model = %generated.model_id,
            mode = %generated.mode,
            chars = generated.text.len(),
            actions = queued,
            failed_actions = report.failed,
            "Generation complete"
        );

        Ok(GenerationOutcome {
            text: generated.text,
            model_id: generated.model_id,
            mode: generated.mode,
            actions_dispatched: queued,
            actions_failed: report.failed,
            failed_attempts: generated.failed_attempts,
        })
    }

    fn validate(&self, request: &GenerateRequest) -> Result<()> {
        if request.prompt.trim().is_empty() {
            return Err(Error::Validation("Prompt is required and cannot be empty".into()));
        }
        if request.project_id.is_blank() {
            return Err(Error::Validation("Project id is required".into()));
        }
        if !(0.0..=1.0).contains(&self.temperature) {
            return Err(Error::Validation(format!(
                "Temperature must be between 0 and 1, got {}",
                self.temperature
            )));
        }
        Ok(())
    }

    async fn run_model(
        &self,
        request: &GenerationRequest,
        dispatcher: &mut ActionDispatcher,
    ) -> std::result::Result<Generated, ProviderError> {
        // text streamed before a failure stays in front of the fallback text
        let mut artifact = String::new();
        match self.stream(request, dispatcher, &mut artifact).await {
            Ok(generated) => return Ok(generated),
            Err(e) => warn!(
                error = %e,
                kept_chars = artifact.len(),
                "Streaming failed; falling back to non-streaming generation"
            ),
        }

        let invocation = self
            .invoker
            .invoke(
                &request.model_preferences,
                request,
                &InvokeOptions::non_streaming(self.retry),
            )
            .await?;

        let text = match invocation.output {
            InvocationOutput::Text(text) => text,
            InvocationOutput::Stream(mut stream) => {
                let mut text = String::new();
                while let Some(chunk) = stream.next().await {
                    text.push_str(&chunk?.text);
                }
                text
            }
        };

        info!(model = %invocation.model_id, chars = text.len(), "Using non-streaming response");

        let mut parser = ArtifactParser::new();
        parser.push(&text, |action| dispatcher.dispatch(action));
        parser.finish();
        artifact.push_str(&text);

        Ok(Generated {
            text: artifact,
            model_id: invocation.model_id,
            mode: Capability::NonStreaming,
            failed_attempts: invocation.attempts.len(),
        })
    }

    /// Stream from the first model that accepts, appending every raw chunk
    /// to `artifact`. On error `artifact` holds what arrived before it.
    async fn stream(
        &self,
        request: &GenerationRequest,
        dispatcher: &mut ActionDispatcher,
        artifact: &mut String,
    ) -> std::result::Result<Generated, ProviderError> {
        let invocation = self
            .invoker
            .invoke(
                &request.model_preferences,
                request,
                &InvokeOptions::streaming(self.retry),
            )
            .await?;

        info!(model = %invocation.model_id, "Using streaming model");

        let mut parser = ArtifactParser::new();

        match invocation.output {
            InvocationOutput::Stream(mut stream) => {
                while let Some(item) = stream.next().await {
                    let chunk = item?;
                    if !chunk.text.is_empty() {
                        artifact.push_str(&chunk.text);
                        parser.push(&chunk.text, |action| dispatcher.dispatch(action));
                    }
                    if let Some(usage) = chunk.usage {
                        debug!(
                            prompt_tokens = usage.prompt_tokens,
                            completion_tokens = usage.completion_tokens,
                            total_tokens = usage.total_tokens,
                            "Token usage"
                        );
                    }
                    if chunk.done {
                        break;
                    }
                }
            }
            InvocationOutput::Text(text) => {
                parser.push(&text, |action| dispatcher.dispatch(action));
                artifact.push_str(&text);
            }
        }

        parser.finish();

        Ok(Generated {
            text: std::mem::take(artifact),
            model_id: invocation.model_id,
            mode: Capability::Streaming,
            failed_attempts: invocation.attempts.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bolty_core::action::Action;
    use bolty_core::error::WorkspaceError;
    use bolty_core::provider::{BackendRequest, BackendResponse, StreamChunk};
    use bolty_core::provider::ChunkReceiver;
    use bolty_store::InMemoryStore;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Streams `chunks`, optionally breaking after `break_after` of them.
    struct MockBackend {
        chunks: Vec<&'static str>,
        break_after: Option<usize>,
        stream_error: Option<ProviderError>,
        text: std::result::Result<&'static str, ProviderError>,
        calls: Mutex<Vec<(Capability, BackendRequest)>>,
    }

    impl MockBackend {
        fn streaming(chunks: Vec<&'static str>) -> Self {
            Self {
                chunks,
                break_after: None,
                stream_error: None,
                text: Err(ProviderError::Unsupported("non-streaming not scripted".into())),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<(Capability, BackendRequest)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ModelBackend for MockBackend {
        fn name(&self) -> &str {
            "mock"
        }

        async fn generate(
            &self,
            request: BackendRequest,
        ) -> std::result::Result<BackendResponse, ProviderError> {
            self.calls
                .lock()
                .unwrap()
                .push((Capability::NonStreaming, request.clone()));
            let text = self.text.clone()?;
            Ok(BackendResponse {
                text: text.into(),
                model: request.model,
                usage: None,
            })
        }

        async fn generate_stream(
            &self,
            request: BackendRequest,
        ) -> std::result::Result<ChunkReceiver, ProviderError> {
            self.calls.lock().unwrap().push((Capability::Streaming, request));
            if let Some(e) = &self.stream_error {
                return Err(e.clone());
            }
            let (tx, rx) = tokio::sync::mpsc::channel(self.chunks.len() + 2);
            for (i, chunk) in self.chunks.iter().enumerate() {
                if self.break_after == Some(i) {
                    let _ = tx
                        .send(Err(ProviderError::StreamInterrupted("connection reset".into())))
                        .await;
                    return Ok(rx);
                }
                let _ = tx.send(Ok(StreamChunk::text(*chunk))).await;
            }
            let _ = tx.send(Ok(StreamChunk::done(None))).await;
            Ok(rx)
        }
    }

    #[derive(Default)]
    struct RecordingWorkspace {
        actions: Mutex<Vec<Action>>,
    }

    #[async_trait]
    impl Workspace for RecordingWorkspace {
        async fn write_file(
            &self,
            _project: &ProjectId,
            path: &str,
            content: &str,
        ) -> std::result::Result<(), WorkspaceError> {
            self.actions.lock().unwrap().push(Action::file(path, content));
            Ok(())
        }

        async fn run_shell_command(
            &self,
            _project: &ProjectId,
            command_line: &str,
        ) -> std::result::Result<String, WorkspaceError> {
            self.actions.lock().unwrap().push(Action::shell(command_line));
            Ok(String::new())
        }
    }

    struct Harness {
        backend: Arc<MockBackend>,
        store: Arc<InMemoryStore>,
        workspace: Arc<RecordingWorkspace>,
        orchestrator: Orchestrator,
    }

    fn harness(backend: MockBackend) -> Harness {
        let backend = Arc::new(backend);
        let store = Arc::new(InMemoryStore::new());
        let workspace = Arc::new(RecordingWorkspace::default());
        let orchestrator = Orchestrator::new(
            backend.clone(),
            store.clone(),
            workspace.clone(),
            Arc::new(ConcurrencyLimiter::new(3)),
        )
        .with_preferred_models(vec!["m1".into()])
        .with_retry_policy(RetryPolicy::new(2, Duration::from_millis(10)));
        Harness {
            backend,
            store,
            workspace,
            orchestrator,
        }
    }

    const SPLIT_ARTIFACT: [&str; 4] = [
        "<boltArtifact id=\"x\">\n<boltAction type=\"file\" filePath=\"a.txt\">\nhel",
        "lo\n</boltAction>\n<boltAc",
        "tion type=\"shell\">\nnpm install\n</boltAction>\n",
        "</boltArtifact>",
    ];

    #[tokio::test]
    async fn streams_dispatches_and_persists() {
        let h = harness(MockBackend::streaming(SPLIT_ARTIFACT.to_vec()));

        let outcome = h
            .orchestrator
            .generate(GenerateRequest::new("p1", "build a todo app"))
            .await
            .unwrap();

        assert_eq!(outcome.mode, Capability::Streaming);
        assert_eq!(outcome.model_id, "m1");
        assert_eq!(outcome.text, SPLIT_ARTIFACT.concat());
        assert_eq!(outcome.actions_dispatched, 2);
        assert_eq!(
            *h.workspace.actions.lock().unwrap(),
            vec![Action::file("a.txt", "hello"), Action::shell("npm install")]
        );

        let history = h.store.history(&ProjectId::new("p1")).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, TurnRole::User);
        assert_eq!(history[0].text, "build a todo app");
        assert_eq!(history[1].role, TurnRole::Model);
        assert_eq!(history[1].text, SPLIT_ARTIFACT.concat());
    }

    #[tokio::test]
    async fn system_instruction_leads_and_is_not_persisted() {
        let h = harness(MockBackend::streaming(vec!["plain text"]));
        h.orchestrator
            .generate(GenerateRequest::new("p1", "hi").with_project_type(ProjectType::React))
            .await
            .unwrap();

        let calls = h.backend.calls();
        let contents = &calls[0].1.contents;
        assert_eq!(contents.len(), 2);
        assert_eq!(contents[0].role, TurnRole::Model);
        assert!(contents[0].text.contains("Vite"));
        assert_eq!(contents[1].text, "hi");

        let history = h.store.history(&ProjectId::new("p1")).await.unwrap();
        assert!(history.iter().all(|t| !t.text.contains("You are Bolty")));
    }

    #[tokio::test]
    async fn history_is_sent_in_order() {
        let h = harness(MockBackend::streaming(vec!["ok"]));
        h.orchestrator.generate(GenerateRequest::new("p1", "first")).await.unwrap();
        h.orchestrator.generate(GenerateRequest::new("p1", "second")).await.unwrap();

        let calls = h.backend.calls();
        let texts: Vec<_> = calls[1].1.contents.iter().skip(1).map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "ok", "second"]);
    }

    #[tokio::test]
    async fn zero_actions_still_persist_model_turn() {
        let h = harness(MockBackend::streaming(vec!["Sorry, ", "I can't help with that."]));
        let outcome = h
            .orchestrator
            .generate(GenerateRequest::new("p1", "do something"))
            .await
            .unwrap();

        assert_eq!(outcome.actions_dispatched, 0);
        let history = h.store.history(&ProjectId::new("p1")).await.unwrap();
        assert_eq!(history[1].text, "Sorry, I can't help with that.");
    }

    #[tokio::test]
    async fn mid_stream_failure_falls_back_to_non_streaming() {
        let mut backend = MockBackend::streaming(SPLIT_ARTIFACT.to_vec());
        backend.break_after = Some(2);
        backend.text = Ok("<boltAction type=\"file\" filePath=\"b.txt\">\nfallback\n</boltAction>");
        let h = harness(backend);

        let outcome = h
            .orchestrator
            .generate(GenerateRequest::new("p1", "go"))
            .await
            .unwrap();

        assert_eq!(outcome.mode, Capability::NonStreaming);
        // partial streamed text is kept ahead of the fallback text
        let expected = format!(
            "{}{}<boltAction type=\"file\" filePath=\"b.txt\">\nfallback\n</boltAction>",
            SPLIT_ARTIFACT[0], SPLIT_ARTIFACT[1]
        );
        assert_eq!(outcome.text, expected);
        let turns = h.store.history(&ProjectId::new("p1")).await.unwrap();
        assert_eq!(turns.last().unwrap().text, expected);
        // the action completed before the break is not rolled back
        assert_eq!(
            *h.workspace.actions.lock().unwrap(),
            vec![Action::file("a.txt", "hello"), Action::file("b.txt", "fallback")]
        );
        assert_eq!(outcome.actions_dispatched, 2);
    }

    #[tokio::test]
    async fn unsupported_streaming_falls_back() {
        let mut backend = MockBackend::streaming(vec![]);
        backend.stream_error = Some(ProviderError::Unsupported("streaming".into()));
        backend.text = Ok("whole answer");
        let h = harness(backend);

        let outcome = h
            .orchestrator
            .generate(GenerateRequest::new("p1", "go"))
            .await
            .unwrap();

        assert_eq!(outcome.mode, Capability::NonStreaming);
        assert_eq!(outcome.text, "whole answer");
        let modes: Vec<_> = h.backend.calls().iter().map(|(m, _)| *m).collect();
        assert_eq!(modes, vec![Capability::Streaming, Capability::NonStreaming]);
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_surfaces_and_skips_model_turn() {
        let mut backend = MockBackend::streaming(vec![]);
        backend.stream_error = Some(ProviderError::ApiError {
            status_code: 503,
            message: "overloaded".into(),
        });
        backend.text = Err(ProviderError::ApiError {
            status_code: 503,
            message: "overloaded".into(),
        });
        let h = harness(backend);

        let err = h
            .orchestrator
            .generate(GenerateRequest::new("p1", "go"))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Provider(ProviderError::Exhausted { .. })));
        // two attempts per mode against the single candidate
        assert_eq!(h.backend.calls().len(), 4);
        let history = h.store.history(&ProjectId::new("p1")).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].role, TurnRole::User);
    }

    #[tokio::test]
    async fn blank_prompt_is_rejected_before_anything_happens() {
        let h = harness(MockBackend::streaming(vec!["x"]));

        let err = h
            .orchestrator
            .generate(GenerateRequest::new("p1", "   "))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Validation(_)));
        assert!(h.backend.calls().is_empty());
        assert_eq!(h.store.count(&ProjectId::new("p1")).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn blank_project_and_bad_temperature_are_rejected() {
        let h = harness(MockBackend::streaming(vec!["x"]));
        let err = h
            .orchestrator
            .generate(GenerateRequest::new(" ", "hello"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        let h = harness(MockBackend::streaming(vec!["x"]));
        let orchestrator = h.orchestrator.with_temperature(1.5);
        let err = orchestrator
            .generate(GenerateRequest::new("p1", "hello"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(h.backend.calls().is_empty());
    }

    #[tokio::test]
    async fn model_hints_are_tried_first() {
        let h = harness(MockBackend::streaming(vec!["ok"]));
        let outcome = h
            .orchestrator
            .generate(GenerateRequest::new("p1", "go").with_model_hints(vec!["hinted".into()]))
            .await
            .unwrap();

        assert_eq!(outcome.model_id, "hinted");
        assert_eq!(h.backend.calls()[0].1.model, "hinted");
    }

    #[tokio::test]
    async fn unclosed_action_is_never_dispatched() {
        let h = harness(MockBackend::streaming(vec![
            "<boltAction type=\"file\" filePath=\"a.txt\">\nnever closed",
        ]));
        let outcome = h
            .orchestrator
            .generate(GenerateRequest::new("p1", "go"))
            .await
            .unwrap();

        assert_eq!(outcome.actions_dispatched, 0);
        assert!(h.workspace.actions.lock().unwrap().is_empty());
        assert!(outcome.text.ends_with("never closed"));
    }

    #[test]
    fn from_config_rejects_unknown_project_type() {
        let mut config = AppConfig::default();
        config.project_type = "angular".into();
        let result = Orchestrator::from_config(
            &config,
            Arc::new(MockBackend::streaming(vec![])),
            Arc::new(InMemoryStore::new()),
            Arc::new(RecordingWorkspace::default()),
        );
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[test]
    fn from_config_carries_limits() {
        let mut config = AppConfig::default();
        config.concurrency.max_in_flight = 5;
        let orchestrator = Orchestrator::from_config(
            &config,
            Arc::new(MockBackend::streaming(vec![])),
            Arc::new(InMemoryStore::new()),
            Arc::new(RecordingWorkspace::default()),
        )
        .unwrap();
        assert_eq!(orchestrator.limiter().capacity(), 5);
    }
}
