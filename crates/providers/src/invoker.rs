//! Resilient invoker: model fallback with per-model retry budgets.
//!
//! Candidates are the caller's preferred models (deduplicated, order kept)
//! followed by every catalog model that supports the requested mode. Each
//! candidate gets up to `max_retries` attempts:
//!
//! - not found / unsupported: move on immediately
//! - transient: sleep `base * 2^attempt + jitter(0..base)` and retry the same model
//! - anything else: move on without retrying
//!
//! When every candidate is spent the call fails with `ProviderError::Exhausted`
//! carrying the last underlying error.

use bolty_core::error::{FailureClass, ProviderError};
use bolty_core::provider::{Capability, ChunkReceiver, GenerationRequest, ModelBackend, StreamChunk};
use rand::Rng;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::catalog::ProviderCatalog;

/// Per-model retry budget and backoff base.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per model, at least 1
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries: max_retries.max(1),
            base_delay,
        }
    }

    /// Delay before retrying after the zero-based `attempt` failed.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let base = u64::try_from(self.base_delay.as_millis()).unwrap_or(u64::MAX);
        let exp = base.saturating_mul(2u64.saturating_pow(attempt));
        let jitter = if base == 0 {
            0
        } else {
            rand::rng().random_range(0..base)
        };
        Duration::from_millis(exp.saturating_add(jitter))
    }
}

/// How one invocation should run.
#[derive(Debug, Clone, Copy)]
pub struct InvokeOptions {
    pub mode: Capability,
    pub retry: RetryPolicy,
}

impl InvokeOptions {
    pub fn streaming(retry: RetryPolicy) -> Self {
        Self {
            mode: Capability::Streaming,
            retry,
        }
    }

    pub fn non_streaming(retry: RetryPolicy) -> Self {
        Self {
            mode: Capability::NonStreaming,
            retry,
        }
    }
}

/// One failed attempt against one model.
#[derive(Debug, Clone)]
pub struct AttemptRecord {
    pub model: String,
    /// One-based attempt number for this model
    pub attempt: u32,
    pub class: FailureClass,
    pub error: ProviderError,
}

/// A chunk sequence whose first item has already been received.
///
/// The invoker waits for the first item before declaring a streaming
/// attempt successful, so a stream that fails straight away is retried like
/// any other failed call.
pub struct ChunkStream {
    head: Option<std::result::Result<StreamChunk, ProviderError>>,
    rx: ChunkReceiver,
}

impl ChunkStream {
    /// Next chunk in arrival order, or `None` when the stream has ended.
    pub async fn next(&mut self) -> Option<std::result::Result<StreamChunk, ProviderError>> {
        match self.head.take() {
            Some(item) => Some(item),
            None => self.rx.recv().await,
        }
    }
}

pub enum InvocationOutput {
    Stream(ChunkStream),
    Text(String),
}

/// A successful invocation.
pub struct Invocation {
    /// The model that served the request
    pub model_id: String,
    pub output: InvocationOutput,
    /// Every failed attempt that preceded the success
    pub attempts: Vec<AttemptRecord>,
}

pub struct ResilientInvoker {
    backend: Arc<dyn ModelBackend>,
    catalog: ProviderCatalog,
}

impl ResilientInvoker {
    pub fn new(backend: Arc<dyn ModelBackend>) -> Self {
        Self {
            catalog: ProviderCatalog::new(backend.clone()),
            backend,
        }
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Preferred models first, then discovered models supporting `mode`.
    pub async fn candidates(&self, preferred: &[String], mode: Capability) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut ordered = Vec::new();
        for id in preferred {
            if seen.insert(id.clone()) {
                ordered.push(id.clone());
            }
        }
        for id in self.catalog.supporting(mode).await {
            if seen.insert(id.clone()) {
                ordered.push(id);
            }
        }
        ordered
    }

    pub async fn invoke(
        &self,
        preferred: &[String],
        request: &GenerationRequest,
        options: &InvokeOptions,
    ) -> std::result::Result<Invocation, ProviderError> {
        let candidates = self.candidates(preferred, options.mode).await;
        if candidates.is_empty() {
            return Err(ProviderError::Exhausted {
                message: "no candidate models".into(),
                last: None,
            });
        }

        let max_retries = options.retry.max_retries.max(1);
        let mut attempts: Vec<AttemptRecord> = Vec::new();

        debug!(mode = %options.mode, candidates = ?candidates, "Resolved candidate models");

        for model in &candidates {
            for attempt in 0..max_retries {
                info!(
                    model = %model,
                    mode = %options.mode,
                    attempt = attempt + 1,
                    max = max_retries,
                    "Invoking model"
                );

                let error = match self.attempt(model, request, options.mode).await {
                    Ok(output) => {
                        if !attempts.is_empty() {
                            info!(model = %model, failed_attempts = attempts.len(), "Model succeeded after fallback");
                        }
                        return Ok(Invocation {
                            model_id: model.clone(),
                            output,
                            attempts,
                        });
                    }
                    Err(e) => e,
                };

                let class = error.class();
                attempts.push(AttemptRecord {
                    model: model.clone(),
                    attempt: attempt + 1,
                    class,
                    error: error.clone(),
                });

                match class {
                    FailureClass::Transient if attempt + 1 < max_retries => {
                        let delay = options.retry.backoff(attempt);
                        warn!(
                            model = %model,
                            attempt = attempt + 1,
                            delay_ms = delay.as_millis() as u64,
                            error = %error,
                            "Transient failure, backing off"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    _ => {
                        warn!(
                            model = %model,
                            attempt = attempt + 1,
                            class = ?class,
                            error = %error,
                            "Abandoning model"
                        );
                        break;
                    }
                }
            }
        }

        let last = attempts.last().map(|a| Box::new(a.error.clone()));
        let message = match &last {
            Some(e) => format!(
                "{} candidate model(s) failed in {} mode; last error: {e}",
                candidates.len(),
                options.mode
            ),
            None => format!("{} candidate model(s) failed in {} mode", candidates.len(), options.mode),
        };
        Err(ProviderError::Exhausted { message, last })
    }

    async fn attempt(
        &self,
        model: &str,
        request: &GenerationRequest,
        mode: Capability,
    ) -> std::result::Result<InvocationOutput, ProviderError> {
        let call = request.for_model(model);
        match mode {
            Capability::Streaming => {
                let mut rx = self.backend.generate_stream(call).await?;
                match rx.recv().await {
                    Some(Err(e)) => Err(e),
                    head => Ok(InvocationOutput::Stream(ChunkStream { head, rx })),
                }
            }
            Capability::NonStreaming => {
                let response = self.backend.generate(call).await?;
                Ok(InvocationOutput::Text(response.text))
            }
        }
    }
}
