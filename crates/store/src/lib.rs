//! Conversation store implementations.
//!
//! Both stores implement `bolty_core::ConversationStore`: append-only turns,
//! sequences `1, 2, 3, ...` per project.

pub mod file_store;
pub mod in_memory;

pub use file_store::FileStore;
pub use in_memory::InMemoryStore;

use bolty_core::turn::{ConversationTurn, ProjectId};

/// Next sequence number for `project` given all stored turns.
fn next_sequence(turns: &[ConversationTurn], project: &ProjectId) -> u64 {
    turns
        .iter()
        .filter(|t| &t.project_id == project)
        .map(|t| t.sequence)
        .max()
        .unwrap_or(0)
        + 1
}

/// Turns for `project`, ordered by sequence.
fn project_history(turns: &[ConversationTurn], project: &ProjectId) -> Vec<ConversationTurn> {
    let mut history: Vec<ConversationTurn> = turns
        .iter()
        .filter(|t| &t.project_id == project)
        .cloned()
        .collect();
    history.sort_by_key(|t| t.sequence);
    history
}
