//! Hands parsed actions to the workspace one at a time.
//!
//! The parser emits actions synchronously from inside the chunk loop, so they
//! are queued on an unbounded channel and applied by a single background
//! task. One task means strict arrival order and no parallel side effects.

use bolty_core::action::Action;
use bolty_core::turn::ProjectId;
use bolty_core::workspace::Workspace;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// What the dispatcher did with the actions it was given.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub applied: usize,
    pub failed: usize,
}

pub struct ActionDispatcher {
    tx: mpsc::UnboundedSender<Action>,
    handle: JoinHandle<DispatchReport>,
    queued: usize,
}

impl ActionDispatcher {
    /// Start the background task for `project`.
    pub fn spawn(workspace: Arc<dyn Workspace>, project: ProjectId) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Action>();

        let handle = tokio::spawn(async move {
            let mut report = DispatchReport::default();
            while let Some(action) = rx.recv().await {
                debug!(project = %project, action = %action, "Applying action");
                match workspace.apply(&project, &action).await {
                    Ok(()) => report.applied += 1,
                    Err(e) => {
                        warn!(project = %project, action = %action, error = %e, "Action failed");
                        report.failed += 1;
                    }
                }
            }
            report
        });

        Self { tx, handle, queued: 0 }
    }

    /// Queue an action. Never blocks.
    pub fn dispatch(&mut self, action: Action) {
        match self.tx.send(action) {
            Ok(()) => self.queued += 1,
            Err(e) => warn!(action = %e.0, "Dispatcher stopped, dropping action"),
        }
    }

    /// Number of actions queued so far.
    pub fn queued(&self) -> usize {
        self.queued
    }

    /// Close the queue and wait until every queued action has been applied.
    pub async fn finish(self) -> DispatchReport {
        drop(self.tx);
        match self.handle.await {
            Ok(report) => report,
            Err(e) => {
                warn!(error = %e, "Dispatcher task ended abnormally");
                DispatchReport::default()
            }
        }
    }
}
