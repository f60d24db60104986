//! # Bolty Core
//!
//! Domain types, traits, and error definitions for the Bolty generation worker.
//! Every other crate depends inward on this one.
//!
//! The three outbound seams are traits defined here: [`ModelBackend`] for
//! remote text generation, [`ConversationStore`] for turn persistence and
//! [`Workspace`] for file and shell side effects.

pub mod error;
pub mod turn;
pub mod provider;
pub mod action;
pub mod store;
pub mod workspace;

// Re-export key types at crate root for ergonomics
pub use error::{Error, FailureClass, ProviderError, Result, StoreError, WorkspaceError};
pub use turn::{ConversationTurn, ProjectId, TurnRole};
pub use provider::{
    BackendRequest, BackendResponse, Capability, ChunkReceiver, GenerationRequest, ModelBackend,
    ModelDescriptor, StreamChunk, Usage,
};
pub use action::Action;
pub use store::ConversationStore;
pub use workspace::Workspace;
