//! Finite State Machine for a single workflow invocation

use serde::{Deserialize, Serialize};

/// Workflow state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowState {
    /// Nothing done yet
    Idle,

    /// Uploading artifacts to the device
    Staging,

    /// Running commands that put the artifacts into effect
    Activating,

    /// Terminal: every step completed
    Succeeded,

    /// Terminal: a step raised an error
    Failed,
}

impl WorkflowState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkflowState::Succeeded | WorkflowState::Failed)
    }
}

impl std::fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            WorkflowState::Idle => "idle",
            WorkflowState::Staging => "staging",
            WorkflowState::Activating => "activating",
            WorkflowState::Succeeded => "succeeded",
            WorkflowState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Workflow event
#[derive(Debug, Clone)]
pub enum WorkflowEvent {
    /// Begin uploading artifacts
    Stage,

    /// Begin running activation commands
    Activate,

    /// All steps completed
    Succeed,

    /// A step failed
    Fail(String),
}

/// Workflow FSM
#[derive(Debug, Clone)]
pub struct WorkflowFsm {
    state: WorkflowState,
    error: Option<String>,
}

impl WorkflowFsm {
    /// Create a new FSM in idle state
    pub fn new() -> Self {
        Self {
            state: WorkflowState::Idle,
            error: None,
        }
    }

    /// Get current state
    pub fn state(&self) -> WorkflowState {
        self.state
    }

    /// Get error message if any
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Process an event and transition state
    pub fn process(&mut self, event: WorkflowEvent) -> Result<WorkflowState, String> {
        let new_state = match (&self.state, &event) {
            // Workflows without artifacts go straight to activation
            (WorkflowState::Idle, WorkflowEvent::Stage) => WorkflowState::Staging,
            (WorkflowState::Idle, WorkflowEvent::Activate) => WorkflowState::Activating,

            (WorkflowState::Staging, WorkflowEvent::Activate) => WorkflowState::Activating,
            // Staging-only workflows (screen uploads)
            (WorkflowState::Staging, WorkflowEvent::Succeed) => WorkflowState::Succeeded,

            (WorkflowState::Activating, WorkflowEvent::Succeed) => WorkflowState::Succeeded,

            (state, WorkflowEvent::Fail(err)) if !state.is_terminal() => {
                self.error = Some(err.clone());
                WorkflowState::Failed
            }

            // Invalid transitions
            (state, event) => {
                return Err(format!("Invalid transition: {:?} -> {:?}", state, event));
            }
        };

        self.state = new_state;
        Ok(new_state)
    }
}

impl Default for WorkflowFsm {
    fn default() -> Self {
        Self::new()
    }
}
