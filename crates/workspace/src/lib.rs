//! Local workspace collaborator for Bolty.
//!
//! Every project gets its own directory under a shared base directory.
//! File writes are confined to that directory and shell commands run inside
//! it. Each operation is recorded in an [`AuditLog`].

pub mod audit;
pub mod local;
pub mod path;

pub use audit::{AuditEntry, AuditEvent, AuditLog, AuditOutcome};
pub use local::LocalWorkspace;
pub use path::resolve_relative;
