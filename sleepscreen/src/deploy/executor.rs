//! Per-invocation workflow bookkeeping

use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::deploy::fsm::{WorkflowEvent, WorkflowFsm, WorkflowState};
use crate::errors::ManagerError;
use crate::models::deployment::{DeploymentResult, WorkflowKind, WorkflowProgress, WorkflowReport};
use crate::utils::timestamp;

/// Status label for failures that were stopped before contacting the device
pub const BLOCKED_LABEL: &str = "Blocked";

/// Status label for every other failure
pub const ERROR_LABEL: &str = "Error";

/// Tracks one workflow invocation: its state machine, progress events and
/// the notes that end up in the report
pub struct WorkflowRun {
    kind: WorkflowKind,
    fsm: WorkflowFsm,
    notes: Vec<String>,
    events: Option<mpsc::UnboundedSender<WorkflowProgress>>,
    device_contacted: bool,
}

impl WorkflowRun {
    /// Create a run in the idle state
    pub fn new(kind: WorkflowKind, events: Option<mpsc::UnboundedSender<WorkflowProgress>>) -> Self {
        info!("Starting workflow: {}", kind);
        Self {
            kind,
            fsm: WorkflowFsm::new(),
            notes: Vec::new(),
            events,
            device_contacted: false,
        }
    }

    pub fn kind(&self) -> WorkflowKind {
        self.kind
    }

    pub fn state(&self) -> WorkflowState {
        self.fsm.state()
    }

    /// Record that a session to the device was opened
    pub fn mark_contacted(&mut self) {
        self.device_contacted = true;
    }

    /// Record a timestamped line for the caller's activity log
    pub fn note(&mut self, message: impl AsRef<str>) {
        debug!("[{}] {}", self.kind, message.as_ref());
        self.notes.push(format!("{}  {}", timestamp(), message.as_ref()));
    }

    /// Move the state machine and tell listeners about it
    pub fn transition(&mut self, event: WorkflowEvent, message: &str) -> Result<(), ManagerError> {
        let state = self
            .fsm
            .process(event)
            .map_err(ManagerError::WorkflowError)?;
        self.emit(state, message);
        Ok(())
    }

    fn emit(&self, state: WorkflowState, message: &str) {
        if let Some(events) = &self.events {
            // A dropped receiver only means nobody is watching
            let _ = events.send(WorkflowProgress {
                workflow: self.kind,
                state,
                message: message.to_string(),
            });
        }
    }

    /// Close the run with the outcome of its steps.
    ///
    /// A sequence whose atomic command reported failure is turned into a
    /// [`ManagerError::CommandError`]; its captured output stays in the report.
    pub fn finish(self, outcome: Result<DeploymentResult, ManagerError>) -> WorkflowReport {
        match outcome {
            Ok(result) if result.succeeded => self.succeeded(result),
            Ok(result) => {
                let err = command_failure(&result);
                self.failed(err, result)
            }
            Err(err) => self.failed(err, DeploymentResult::default()),
        }
    }

    fn fail(&mut self, err: &ManagerError) {
        if self.fsm.state().is_terminal() {
            return;
        }
        let message = err.to_string();
        if let Err(e) = self.fsm.process(WorkflowEvent::Fail(message.clone())) {
            debug!("{}", e);
        }
        self.emit(WorkflowState::Failed, &message);
    }

    fn succeeded(mut self, result: DeploymentResult) -> WorkflowReport {
        if let Err(err) = self.transition(WorkflowEvent::Succeed, self.kind.success_label()) {
            return self.failed(err, result);
        }
        info!("Workflow {} succeeded", self.kind);

        WorkflowReport {
            workflow: self.kind,
            state: WorkflowState::Succeeded,
            status: self.kind.success_label().to_string(),
            result,
            error: None,
            notes: self.notes,
            device_contacted: self.device_contacted,
        }
    }

    fn failed(mut self, err: ManagerError, result: DeploymentResult) -> WorkflowReport {
        error!("Workflow {} failed: {}", self.kind, err);
        self.fail(&err);
        let status = if err.is_local() {
            BLOCKED_LABEL
        } else {
            ERROR_LABEL
        };
        self.note(format!("{}: {}", ERROR_LABEL, err));

        WorkflowReport {
            workflow: self.kind,
            state: WorkflowState::Failed,
            status: status.to_string(),
            result: DeploymentResult {
                succeeded: false,
                ..result
            },
            error: Some(err.to_string()),
            notes: self.notes,
            device_contacted: self.device_contacted,
        }
    }
}

/// Describe the failing command of an atomic sequence
fn command_failure(result: &DeploymentResult) -> ManagerError {
    let step = result
        .failure_point
        .and_then(|index| result.steps.get(index));

    match step {
        Some(output) => ManagerError::CommandError(format!(
            "`{}` exited with status {}: {}",
            output.command,
            output.exit_status.unwrap_or_default(),
            output.combined().trim()
        )),
        None => ManagerError::CommandError("remote command reported failure".to_string()),
    }
}
