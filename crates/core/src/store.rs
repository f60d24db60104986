//! Conversation store trait: the append-only persistence boundary.
//!
//! The worker reads a project's ordered turns to build a request and appends
//! exactly one model turn per successful generation. Durability is the
//! implementation's concern.

use async_trait::async_trait;
use crate::error::StoreError;
use crate::turn::{ConversationTurn, ProjectId, TurnRole};

#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Backend name (e.g., "memory", "file").
    fn name(&self) -> &str;

    /// Append a turn, assigning the next sequence number for the project.
    async fn append(
        &self,
        project: &ProjectId,
        role: TurnRole,
        text: &str,
    ) -> std::result::Result<ConversationTurn, StoreError>;

    /// All turns for a project, ordered by sequence.
    async fn history(&self, project: &ProjectId) -> std::result::Result<Vec<ConversationTurn>, StoreError>;

    /// Number of turns stored for a project.
    async fn count(&self, project: &ProjectId) -> std::result::Result<usize, StoreError> {
        Ok(self.history(project).await?.len())
    }
}
