//! Model backends and the resilience layer in front of them.
//!
//! All backends implement `bolty_core::ModelBackend`. The catalog and the
//! resilient invoker work against that trait only; the router builds the
//! configured backend.

pub mod catalog;
pub mod gemini;
mod http;
pub mod invoker;
pub mod openai_compat;
pub mod router;

pub use catalog::ProviderCatalog;
pub use gemini::GeminiBackend;
pub use invoker::{
    AttemptRecord, ChunkStream, Invocation, InvocationOutput, InvokeOptions, ResilientInvoker,
    RetryPolicy,
};
pub use openai_compat::OpenAiCompatBackend;
pub use router::build_from_config;
