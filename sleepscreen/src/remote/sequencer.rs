//! Ordered execution of remote command lines

use tracing::{debug, warn};

use crate::errors::ManagerError;
use crate::models::deployment::DeploymentResult;
use crate::remote::session::CommandSession;

/// How a failing command affects the rest of a sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceMode {
    /// A non-zero exit fails the result and stops the sequence.
    /// Used with `&&`-joined compound lines.
    Atomic,

    /// Every command runs whatever the exit status of the previous ones.
    /// Failures are recorded, the result stays successful.
    BestEffort,
}

/// An ordered list of shell command lines
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSequence {
    commands: Vec<String>,
    mode: SequenceMode,
}

impl CommandSequence {
    /// A single compound command line whose clauses short-circuit on failure
    pub fn atomic<I, S>(clauses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            commands: vec![join_clauses(clauses)],
            mode: SequenceMode::Atomic,
        }
    }

    /// Independent commands, each run regardless of the others
    pub fn best_effort<I, S>(commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            commands: commands.into_iter().map(Into::into).collect(),
            mode: SequenceMode::BestEffort,
        }
    }

    pub fn commands(&self) -> &[String] {
        &self.commands
    }

    pub fn mode(&self) -> SequenceMode {
        self.mode
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

/// Join shell clauses with `&&` so a failing clause prevents the next ones
pub fn join_clauses<I, S>(clauses: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    clauses
        .into_iter()
        .map(|c| c.as_ref().trim().to_string())
        .filter(|c| !c.is_empty())
        .collect::<Vec<_>>()
        .join(" && ")
}

/// Run `sequence` on an open session.
///
/// Outputs are concatenated in execution order. A transport error aborts the
/// sequence in both modes and is returned as `Err`.
pub async fn run_sequence(
    session: &mut dyn CommandSession,
    sequence: &CommandSequence,
) -> Result<DeploymentResult, ManagerError> {
    let mut result = DeploymentResult::empty_success();

    for (index, command) in sequence.commands.iter().enumerate() {
        let output = session.execute(command).await?;
        result.combined_output.push_str(&output.combined());

        let failed = output.failed();
        result.steps.push(output);

        if !failed {
            continue;
        }

        if result.failure_point.is_none() {
            result.failure_point = Some(index);
        }

        match sequence.mode {
            SequenceMode::Atomic => {
                debug!("Command {} failed, stopping sequence: {}", index, command);
                result.succeeded = false;
                break;
            }
            SequenceMode::BestEffort => {
                warn!("Command {} failed, continuing: {}", index, command);
            }
        }
    }

    Ok(result)
}
