//! Local-directory workspace: one sub-directory per project.
//!
//! Supports path scoping, `&&`-chained command lines and an optional
//! command allowlist. No sandboxing beyond the working directory is applied.

use crate::audit::{AuditEvent, AuditLog, AuditOutcome};
use crate::path::resolve_relative;
use async_trait::async_trait;
use bolty_core::error::WorkspaceError;
use bolty_core::turn::ProjectId;
use bolty_core::workspace::Workspace;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::process::Command;
use tracing::{debug, warn};

pub struct LocalWorkspace {
    base_dir: PathBuf,
    /// If non-empty, only these commands are allowed.
    allowed_commands: Vec<String>,
    audit: Arc<AuditLog>,
}

impl LocalWorkspace {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            allowed_commands: Vec::new(),
            audit: Arc::new(AuditLog::new()),
        }
    }

    pub fn with_allowed_commands(mut self, allowed_commands: Vec<String>) -> Self {
        self.allowed_commands = allowed_commands;
        self
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn audit(&self) -> Arc<AuditLog> {
        self.audit.clone()
    }

    /// Root directory for `project`. The id itself must be a single path segment.
    pub fn project_dir(&self, project: &ProjectId) -> Result<PathBuf, WorkspaceError> {
        let id = project.as_str();
        if id.contains(['/', '\\']) {
            return Err(WorkspaceError::PathRejected {
                path: id.into(),
                reason: "project id must be a single path segment".into(),
            });
        }
        resolve_relative(&self.base_dir, id)
    }

    fn is_command_allowed(&self, segment: &str) -> bool {
        if self.allowed_commands.is_empty() {
            return true;
        }
        let base_cmd = segment.split_whitespace().next().unwrap_or("");
        self.allowed_commands.iter().any(|a| a == base_cmd)
    }

    async fn run_segment(&self, dir: &Path, segment: &str) -> Result<String, WorkspaceError> {
        debug!(command = %segment, dir = %dir.display(), "Executing shell command");

        let output = Command::new("sh")
            .args(["-c", segment])
            .current_dir(dir)
            .output()
            .await
            .map_err(|e| WorkspaceError::CommandFailed {
                command: segment.into(),
                reason: e.to_string(),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if !stdout.is_empty() {
            debug!(command = %segment, %stdout, "Command stdout");
        }
        if !stderr.is_empty() {
            debug!(command = %segment, %stderr, "Command stderr");
        }

        if output.status.success() {
            Ok(if stderr.is_empty() {
                stdout
            } else {
                format!("{stdout}\n[stderr]: {stderr}")
            })
        } else {
            let code = output.status.code().unwrap_or(-1);
            warn!(command = %segment, exit_code = code, "Command failed");
            Err(WorkspaceError::CommandFailed {
                command: segment.into(),
                reason: format!("exit code {code}: {stderr}"),
            })
        }
    }
}

#[async_trait]
impl Workspace for LocalWorkspace {
    async fn write_file(
        &self,
        project: &ProjectId,
        path: &str,
        content: &str,
    ) -> Result<(), WorkspaceError> {
        let event = AuditEvent::FileWrite { path: path.into() };
        let target = match self
            .project_dir(project)
            .and_then(|dir| resolve_relative(&dir, path))
        {
            Ok(target) => target,
            Err(e) => {
                self.audit
                    .record(project.as_str(), event, AuditOutcome::Denied, Some(e.to_string()));
                return Err(e);
            }
        };

        let write = async {
            if let Some(parent) = target.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&target, content).await
        };

        match write.await {
            Ok(()) => {
                self.audit.record(
                    project.as_str(),
                    event,
                    AuditOutcome::Success,
                    Some(format!("{} bytes", content.len())),
                );
                Ok(())
            }
            Err(e) => {
                self.audit
                    .record(project.as_str(), event, AuditOutcome::Failure, Some(e.to_string()));
                Err(WorkspaceError::WriteFailed {
                    path: path.into(),
                    reason: e.to_string(),
                })
            }
        }
    }

    async fn run_shell_command(
        &self,
        project: &ProjectId,
        command_line: &str,
    ) -> Result<String, WorkspaceError> {
        let dir = self.project_dir(project)?;
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| WorkspaceError::CommandFailed {
                command: command_line.into(),
                reason: format!("Failed to create project directory: {e}"),
            })?;

        let segments: Vec<&str> = command_line
            .split("&&")
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();

        // The whole line is refused if any segment is outside the allowlist
        if let Some(denied) = segments.iter().find(|s| !self.is_command_allowed(s)) {
            let base = denied.split_whitespace().next().unwrap_or("").to_string();
            self.audit.record(
                project.as_str(),
                AuditEvent::ShellCommand { command: command_line.into() },
                AuditOutcome::Denied,
                Some(format!("'{base}' not in allowlist")),
            );
            return Err(WorkspaceError::CommandDenied(base));
        }

        let mut outputs = Vec::with_capacity(segments.len());
        for segment in segments {
            let event = AuditEvent::ShellCommand { command: segment.into() };
            match self.run_segment(&dir, segment).await {
                Ok(out) => {
                    self.audit
                        .record(project.as_str(), event, AuditOutcome::Success, None);
                    outputs.push(out);
                }
                Err(e) => {
                    self.audit
                        .record(project.as_str(), event, AuditOutcome::Failure, Some(e.to_string()));
                    return Err(e);
                }
            }
        }

        Ok(outputs
            .into_iter()
            .filter(|o| !o.is_empty())
            .collect::<Vec<_>>()
            .join("\n"))
    }
}
