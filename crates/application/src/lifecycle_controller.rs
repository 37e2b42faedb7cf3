use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rigger_core::{AppError, AppResult};
use rigger_domain::{DeviceId, InstanceParams, ProvisionOperation};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::provisioning_ports::{ProcessOutput, ProcessRunner, ToolCommand};

/// Output name holding the provisioned instance identifier.
pub const INSTANCE_ID_OUTPUT: &str = "ec2_instance_id";

/// Invocation settings of the external declarative-infra tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolSettings {
    /// Executable name or path.
    pub program: String,
    /// `key=value` pairs passed to init as `-backend-config` flags.
    pub backend_config: Vec<(String, String)>,
    /// Deadline applied to every sub-command.
    pub timeout: Option<Duration>,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            program: "terraform".to_owned(),
            backend_config: Vec::new(),
            timeout: Some(Duration::from_secs(30 * 60)),
        }
    }
}

/// States of one lifecycle run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecyclePhase {
    /// Not started.
    Idle,
    /// Running the init sub-command.
    Initializing,
    /// Running apply or destroy.
    Executing,
    /// Apply or destroy exited with status zero.
    Succeeded,
    /// A sub-command failed, timed out, was cancelled or could not start.
    Failed,
}

impl LifecyclePhase {
    /// Returns stable log value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Initializing => "initializing",
            Self::Executing => "executing",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}

/// Outcome of one lifecycle run.
#[derive(Debug)]
pub struct LifecycleReport {
    /// Final phase, `Succeeded` or `Failed`.
    pub phase: LifecyclePhase,
    /// Output of every invoked sub-command, in invocation order.
    pub combined_output: String,
    /// Wall-clock time from the first invocation to the last completion.
    pub duration: Duration,
    /// Failure cause when `phase` is `Failed`.
    pub failure: Option<AppError>,
}

impl LifecycleReport {
    /// Returns whether the run succeeded.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.phase == LifecyclePhase::Succeeded
    }
}

/// Sequences init followed by apply or destroy for one device workspace.
#[derive(Clone)]
pub struct LifecycleController {
    runner: Arc<dyn ProcessRunner>,
    settings: ToolSettings,
}

impl LifecycleController {
    /// Creates a controller driving the tool through the given runner.
    #[must_use]
    pub fn new(runner: Arc<dyn ProcessRunner>, settings: ToolSettings) -> Self {
        Self { runner, settings }
    }

    /// Returns the tool settings.
    #[must_use]
    pub fn settings(&self) -> &ToolSettings {
        &self.settings
    }

    /// Runs the lifecycle in the workspace. Never returns early with an error:
    /// every failure is folded into the report.
    pub async fn run(
        &self,
        operation: ProvisionOperation,
        workspace: &Path,
        device_id: &DeviceId,
        params: &InstanceParams,
        cancel: &CancellationToken,
    ) -> LifecycleReport {
        let mut phase = LifecyclePhase::Idle;
        let mut combined_output = String::new();
        let started = Instant::now();

        transition(device_id, &mut phase, LifecyclePhase::Initializing);
        let init = self.init_command(workspace);
        if let Err(failure) = self
            .run_step(&init, cancel, &mut combined_output)
            .await
        {
            transition(device_id, &mut phase, LifecyclePhase::Failed);
            return LifecycleReport {
                phase,
                combined_output,
                duration: started.elapsed(),
                failure: Some(failure),
            };
        }

        transition(device_id, &mut phase, LifecyclePhase::Executing);
        let execute = self.execute_command(operation, workspace, device_id, params);
        let failure = self
            .run_step(&execute, cancel, &mut combined_output)
            .await
            .err();
        let duration = started.elapsed();

        let final_phase = if failure.is_none() {
            LifecyclePhase::Succeeded
        } else {
            LifecyclePhase::Failed
        };
        transition(device_id, &mut phase, final_phase);

        info!(
            device_id = %device_id,
            operation = operation.as_str(),
            phase = phase.as_str(),
            duration_seconds = duration.as_secs_f64(),
            "lifecycle finished"
        );

        LifecycleReport {
            phase,
            combined_output,
            duration,
            failure,
        }
    }

    /// Reads the provisioned instance id through the tool's JSON output query.
    ///
    /// Returns `Ok(None)` when the output is absent or not a string.
    pub async fn query_instance_id(
        &self,
        workspace: &Path,
        cancel: &CancellationToken,
    ) -> AppResult<Option<String>> {
        let command = ToolCommand {
            program: self.settings.program.clone(),
            args: vec!["output".to_owned(), "-json".to_owned()],
            working_dir: workspace.to_path_buf(),
            timeout: self.settings.timeout,
        };
        let output = self.runner.run(&command, cancel).await?;
        if !output.success() {
            return Err(AppError::ExternalTool {
                command: command.display_name(),
                exit_code: output.exit_code,
                output: output.combined(),
            });
        }

        parse_instance_id(output.stdout.as_str())
    }

    async fn run_step(
        &self,
        command: &ToolCommand,
        cancel: &CancellationToken,
        combined_output: &mut String,
    ) -> AppResult<()> {
        debug!(command = %command.display_name(), "running external tool step");
        let output = match self.runner.run(command, cancel).await {
            Ok(output) => output,
            Err(error) => {
                if let Some(captured) = error.captured_output() {
                    append_output(combined_output, captured);
                }
                warn!(
                    command = %command.display_name(),
                    error = %error,
                    "external tool step aborted"
                );
                return Err(with_combined_output(error, combined_output));
            }
        };

        append_output(combined_output, output.combined().as_str());
        if output.success() {
            return Ok(());
        }

        warn!(
            command = %command.display_name(),
            exit_code = output.exit_code,
            "external tool step failed"
        );
        Err(AppError::ExternalTool {
            command: command.display_name(),
            exit_code: output.exit_code,
            output: combined_output.clone(),
        })
    }

    fn init_command(&self, workspace: &Path) -> ToolCommand {
        let mut args = vec!["init".to_owned(), "-input=false".to_owned()];
        args.extend(
            self.settings
                .backend_config
                .iter()
                .map(|(key, value)| format!("-backend-config={key}={value}")),
        );

        ToolCommand {
            program: self.settings.program.clone(),
            args,
            working_dir: workspace.to_path_buf(),
            timeout: self.settings.timeout,
        }
    }

    fn execute_command(
        &self,
        operation: ProvisionOperation,
        workspace: &Path,
        device_id: &DeviceId,
        params: &InstanceParams,
    ) -> ToolCommand {
        ToolCommand {
            program: self.settings.program.clone(),
            args: vec![
                operation.tool_subcommand().to_owned(),
                "-auto-approve".to_owned(),
                "-input=false".to_owned(),
                format!("-var=device_id={device_id}"),
                format!("-var=instance_name={}", params.instance_name()),
            ],
            working_dir: workspace.to_path_buf(),
            timeout: self.settings.timeout,
        }
    }
}

fn transition(device_id: &DeviceId, phase: &mut LifecyclePhase, next: LifecyclePhase) {
    debug!(
        device_id = %device_id,
        from = phase.as_str(),
        to = next.as_str(),
        "lifecycle transition"
    );
    *phase = next;
}

fn append_output(combined_output: &mut String, segment: &str) {
    if !combined_output.is_empty() {
        combined_output.push('\n');
    }
    combined_output.push_str(segment);
}

// Runner errors carry only their own step's output; failures surfaced to
// the caller carry everything captured so far.
fn with_combined_output(error: AppError, combined_output: &str) -> AppError {
    match error {
        AppError::Timeout { command, limit, .. } => AppError::Timeout {
            command,
            limit,
            output: combined_output.to_owned(),
        },
        AppError::Cancelled { command, .. } => AppError::Cancelled {
            command,
            output: combined_output.to_owned(),
        },
        other => other,
    }
}

fn parse_instance_id(stdout: &str) -> AppResult<Option<String>> {
    let outputs: Value = serde_json::from_str(stdout).map_err(|error| {
        AppError::Internal(format!("failed to parse tool output query: {error}"))
    })?;

    Ok(outputs
        .get(INSTANCE_ID_OUTPUT)
        .and_then(|output| output.get("value"))
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned))
}

#[cfg(test)]
mod tests;
