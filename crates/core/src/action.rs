//! Actions extracted from model output.
//!
//! An action is a discrete side effect the model asked for: write a file into
//! the project workspace, or run a shell command there.

use serde::{Deserialize, Serialize};

/// A complete action, ready for dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    /// Write `content` to `path`, relative to the project root
    FileWrite { path: String, content: String },

    /// Run a shell command line in the project root
    ShellCommand { command_line: String },
}

impl Action {
    pub fn file(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self::FileWrite {
            path: path.into(),
            content: content.into(),
        }
    }

    pub fn shell(command_line: impl Into<String>) -> Self {
        Self::ShellCommand {
            command_line: command_line.into(),
        }
    }

    /// Short label used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::FileWrite { .. } => "file",
            Self::ShellCommand { .. } => "shell",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FileWrite { path, content } => write!(f, "file {path} ({} bytes)", content.len()),
            Self::ShellCommand { command_line } => write!(f, "shell `{command_line}`"),
        }
    }
}
