//! The Bolty generation pipeline.
//!
//! [`Orchestrator::generate`] takes one user prompt through the whole cycle:
//! persist the prompt, invoke a model through the [`ConcurrencyLimiter`],
//! parse `<boltAction>` tags out of the output as it streams, hand each
//! action to the workspace in order, and persist the model's reply.

pub mod dispatcher;
pub mod limiter;
pub mod orchestrator;
pub mod prompt;

pub use dispatcher::{ActionDispatcher, DispatchReport};
pub use limiter::ConcurrencyLimiter;
pub use orchestrator::{GenerateRequest, GenerationOutcome, Orchestrator};
pub use prompt::ProjectType;
