//! Workspace trait: where dispatched actions land.
//!
//! The worker calls these methods in action order and does not consume their
//! output beyond logging. Isolation, durability and audit records belong to
//! the implementation.

use async_trait::async_trait;
use crate::action::Action;
use crate::error::WorkspaceError;
use crate::turn::ProjectId;

#[async_trait]
pub trait Workspace: Send + Sync {
    /// Write `content` to `path`, relative to the project's root.
    async fn write_file(
        &self,
        project: &ProjectId,
        path: &str,
        content: &str,
    ) -> std::result::Result<(), WorkspaceError>;

    /// Run a command line in the project's root and return its combined output.
    async fn run_shell_command(
        &self,
        project: &ProjectId,
        command_line: &str,
    ) -> std::result::Result<String, WorkspaceError>;

    /// Route an action to the matching operation.
    async fn apply(&self, project: &ProjectId, action: &Action) -> std::result::Result<(), WorkspaceError> {
        match action {
            Action::FileWrite { path, content } => self.write_file(project, path, content).await,
            Action::ShellCommand { command_line } => {
                self.run_shell_command(project, command_line).await.map(|_| ())
            }
        }
    }
}
