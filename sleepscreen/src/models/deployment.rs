//! Deployment results and workflow reports

use serde::{Deserialize, Serialize};

use crate::deploy::fsm::WorkflowState;

/// Captured result of one remote command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutput {
    /// The command line as sent
    pub command: String,

    pub stdout: String,

    pub stderr: String,

    /// Exit status reported by the remote shell, if any
    pub exit_status: Option<u32>,
}

impl CommandOutput {
    /// stdout followed by stderr
    pub fn combined(&self) -> String {
        format!("{}{}", self.stdout, self.stderr)
    }

    /// A command only fails when the shell reports a non-zero status
    pub fn failed(&self) -> bool {
        matches!(self.exit_status, Some(code) if code != 0)
    }
}

/// Outcome of running a command sequence
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentResult {
    pub succeeded: bool,

    /// Output of every executed command, in execution order
    pub combined_output: String,

    /// Index of the first command that reported failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_point: Option<usize>,

    /// Per-command captures
    #[serde(default)]
    pub steps: Vec<CommandOutput>,
}

impl DeploymentResult {
    /// A successful result with no remote commands
    pub fn empty_success() -> Self {
        Self {
            succeeded: true,
            ..Default::default()
        }
    }
}

/// The named procedures the orchestrator can run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowKind {
    TestConnection,
    ApplyImage,
    RestoreDefault,
    UploadScreens,
    InstallRotation,
    UninstallRotation,
    TestRotation,
    InstallFromGallery,
}

impl WorkflowKind {
    pub fn name(&self) -> &'static str {
        match self {
            WorkflowKind::TestConnection => "test connection",
            WorkflowKind::ApplyImage => "apply image",
            WorkflowKind::RestoreDefault => "restore default",
            WorkflowKind::UploadScreens => "upload screens",
            WorkflowKind::InstallRotation => "install rotation",
            WorkflowKind::UninstallRotation => "uninstall rotation",
            WorkflowKind::TestRotation => "test rotation",
            WorkflowKind::InstallFromGallery => "install from gallery",
        }
    }

    /// Status label shown when the workflow succeeds
    pub fn success_label(&self) -> &'static str {
        match self {
            WorkflowKind::TestConnection => "Connected",
            WorkflowKind::ApplyImage => "Completed",
            WorkflowKind::RestoreDefault => "Restored",
            WorkflowKind::UploadScreens => "OK",
            WorkflowKind::InstallRotation => "Rotation installed",
            WorkflowKind::UninstallRotation => "Uninstalled",
            WorkflowKind::TestRotation => "OK",
            WorkflowKind::InstallFromGallery => "Installed",
        }
    }
}

impl std::fmt::Display for WorkflowKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Terminal report of one workflow invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowReport {
    pub workflow: WorkflowKind,

    /// Terminal state: `Succeeded` or `Failed`
    pub state: WorkflowState,

    /// Short status label ("Completed", "Error", "Blocked", ...)
    pub status: String,

    /// Remote command results (empty when nothing was executed)
    pub result: DeploymentResult,

    /// Underlying error message, verbatim
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Timestamped notes for the caller's activity log
    #[serde(default)]
    pub notes: Vec<String>,

    /// Whether any session to the device was opened
    #[serde(default)]
    pub device_contacted: bool,
}

impl WorkflowReport {
    pub fn succeeded(&self) -> bool {
        self.state == WorkflowState::Succeeded
    }
}

/// What the rotation hook left on the device
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationStatus {
    pub override_installed: bool,
    pub script_installed: bool,
    pub log_present: bool,
    pub screens_present: bool,
}

impl RotationStatus {
    /// Nothing of the hook remains
    pub fn is_clean(&self) -> bool {
        !(self.override_installed || self.script_installed || self.log_present || self.screens_present)
    }

    /// Both the drop-in and the script are in place
    pub fn is_installed(&self) -> bool {
        self.override_installed && self.script_installed
    }
}

/// Progress event emitted on every state change of a workflow
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowProgress {
    pub workflow: WorkflowKind,
    pub state: WorkflowState,
    pub message: String,
}
