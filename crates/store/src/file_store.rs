//! File-based conversation store: persistent JSON-lines storage.
//!
//! Each line is a JSON-encoded `ConversationTurn`. The file is loaded once on
//! open and every append writes one line, so the file is a faithful log of
//! every turn ever stored.
//!
//! Storage location: `~/.bolty/conversations.jsonl` unless configured.

use async_trait::async_trait;
use bolty_core::error::StoreError;
use bolty_core::store::ConversationStore;
use bolty_core::turn::{ConversationTurn, ProjectId, TurnRole};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{debug, warn};

pub struct FileStore {
    path: PathBuf,
    turns: Arc<RwLock<Vec<ConversationTurn>>>,
}

impl FileStore {
    /// Open a store at `path`, loading any existing turns.
    ///
    /// A missing file starts empty; it is created on first append.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let turns = Self::load_from_disk(&path)?;
        debug!(path = %path.display(), count = turns.len(), "Conversation store loaded");
        Ok(Self {
            path,
            turns: Arc::new(RwLock::new(turns)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load_from_disk(path: &Path) -> Result<Vec<ConversationTurn>, StoreError> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(StoreError::Storage(format!(
                    "Failed to read {}: {e}",
                    path.display()
                )));
            }
        };

        Ok(content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str::<ConversationTurn>(line) {
                Ok(turn) => Some(turn),
                Err(e) => {
                    warn!(error = %e, "Skipping corrupted conversation record");
                    None
                }
            })
            .collect())
    }

    async fn write_line(&self, turn: &ConversationTurn) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                StoreError::Storage(format!("Failed to create store directory: {e}"))
            })?;
        }

        let mut line = serde_json::to_string(turn)
            .map_err(|e| StoreError::Corrupted(format!("Failed to serialize turn: {e}")))?;
        line.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to open store file: {e}")))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to write store file: {e}")))?;
        file.flush()
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to flush store file: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl ConversationStore for FileStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn append(
        &self,
        project: &ProjectId,
        role: TurnRole,
        text: &str,
    ) -> Result<ConversationTurn, StoreError> {
        // Hold the write lock across the disk write so file order matches sequence order
        let mut turns = self.turns.write().await;
        let sequence = crate::next_sequence(&turns, project);
        let turn = ConversationTurn::new(project.clone(), role, text, sequence);
        self.write_line(&turn).await?;
        turns.push(turn.clone());
        Ok(turn)
    }

    async fn history(&self, project: &ProjectId) -> Result<Vec<ConversationTurn>, StoreError> {
        let turns = self.turns.read().await;
        Ok(crate::project_history(&turns, project))
    }
}
