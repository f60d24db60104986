//! In-memory conversation store, for tests and one-shot CLI runs.

use async_trait::async_trait;
use bolty_core::error::StoreError;
use bolty_core::store::ConversationStore;
use bolty_core::turn::{ConversationTurn, ProjectId, TurnRole};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default, Clone)]
pub struct InMemoryStore {
    turns: Arc<RwLock<Vec<ConversationTurn>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConversationStore for InMemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn append(
        &self,
        project: &ProjectId,
        role: TurnRole,
        text: &str,
    ) -> Result<ConversationTurn, StoreError> {
        let mut turns = self.turns.write().await;
        let sequence = crate::next_sequence(&turns, project);
        let turn = ConversationTurn::new(project.clone(), role, text, sequence);
        turns.push(turn.clone());
        Ok(turn)
    }

    async fn history(&self, project: &ProjectId) -> Result<Vec<ConversationTurn>, StoreError> {
        let turns = self.turns.read().await;
        Ok(crate::project_history(&turns, project))
    }
}
