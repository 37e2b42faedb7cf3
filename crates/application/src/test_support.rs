use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use rigger_core::{AppError, AppResult};
use rigger_domain::{DeviceId, InstanceParams};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::provisioning_ports::{ProcessOutput, ProcessRunner, ToolCommand, WorkspaceMaterializer};

#[derive(Debug, Clone)]
pub(crate) enum ScriptedStep {
    Exit {
        code: i32,
        stdout: &'static str,
        stderr: &'static str,
    },
    SpawnFailure,
    Timeout,
    WaitForCancel,
}

impl ScriptedStep {
    pub(crate) fn ok(stdout: &'static str) -> Self {
        Self::Exit {
            code: 0,
            stdout,
            stderr: "",
        }
    }

    pub(crate) fn fail(code: i32, stderr: &'static str) -> Self {
        Self::Exit {
            code,
            stdout: "",
            stderr,
        }
    }
}

/// Ordered log of workspace and tool events shared between fakes.
pub(crate) type Timeline = Arc<Mutex<Vec<String>>>;

/// Process runner answering by sub-command name.
#[derive(Default)]
pub(crate) struct ScriptedRunner {
    steps: Mutex<HashMap<&'static str, ScriptedStep>>,
    calls: Mutex<Vec<ToolCommand>>,
    delay: Option<Duration>,
    active: AtomicUsize,
    max_active: AtomicUsize,
    timeline: Option<Timeline>,
}

impl ScriptedRunner {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub(crate) fn with_timeline(delay: Duration, timeline: Timeline) -> Self {
        Self {
            delay: Some(delay),
            timeline: Some(timeline),
            ..Self::default()
        }
    }

    pub(crate) async fn script(&self, subcommand: &'static str, step: ScriptedStep) {
        self.steps.lock().await.insert(subcommand, step);
    }

    pub(crate) async fn calls(&self) -> Vec<ToolCommand> {
        self.calls.lock().await.clone()
    }

    pub(crate) async fn subcommands(&self) -> Vec<String> {
        self.calls
            .lock()
            .await
            .iter()
            .filter_map(|command| command.subcommand().map(ToOwned::to_owned))
            .collect()
    }

    pub(crate) fn max_concurrent_runs(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProcessRunner for ScriptedRunner {
    async fn run(
        &self,
        command: &ToolCommand,
        cancel: &CancellationToken,
    ) -> AppResult<ProcessOutput> {
        self.calls.lock().await.push(command.clone());
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let step = self
            .steps
            .lock()
            .await
            .get(command.subcommand().unwrap_or_default())
            .cloned();
        let result = match step {
            None => Ok(ProcessOutput::default()),
            Some(ScriptedStep::Exit {
                code,
                stdout,
                stderr,
            }) => Ok(ProcessOutput {
                exit_code: code,
                stdout: stdout.to_owned(),
                stderr: stderr.to_owned(),
            }),
            Some(ScriptedStep::SpawnFailure) => Err(AppError::Spawn(format!(
                "{}: No such file or directory",
                command.program
            ))),
            Some(ScriptedStep::Timeout) => Err(AppError::Timeout {
                command: command.display_name(),
                limit: command.timeout.unwrap_or_default(),
                output: "still creating...".to_owned(),
            }),
            Some(ScriptedStep::WaitForCancel) => {
                cancel.cancelled().await;
                Err(AppError::Cancelled {
                    command: command.display_name(),
                    output: String::new(),
                })
            }
        };

        if let Some(timeline) = &self.timeline {
            timeline.lock().await.push(format!(
                "finished {} in {}",
                command.subcommand().unwrap_or_default(),
                command.working_dir.display()
            ));
        }
        self.active.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

/// Materializer recording calls without touching the filesystem.
#[derive(Default)]
pub(crate) struct RecordingMaterializer {
    pub(crate) materialized: Mutex<Vec<String>>,
    pub(crate) fail_with: Option<&'static str>,
    pub(crate) panic: bool,
    pub(crate) timeline: Option<Timeline>,
}

#[async_trait]
impl WorkspaceMaterializer for RecordingMaterializer {
    async fn materialize(
        &self,
        device_id: &DeviceId,
        _params: &InstanceParams,
    ) -> AppResult<PathBuf> {
        if self.panic {
            panic!("materializer fault");
        }
        if let Some(message) = self.fail_with {
            return Err(AppError::Io(message.to_owned()));
        }

        self.materialized
            .lock()
            .await
            .push(device_id.as_str().to_owned());
        let workspace = PathBuf::from("workspaces").join(device_id.as_str());
        if let Some(timeline) = &self.timeline {
            timeline
                .lock()
                .await
                .push(format!("materialized {}", workspace.display()));
        }
        Ok(workspace)
    }
}

pub(crate) fn device(value: &str) -> DeviceId {
    let Ok(device_id) = DeviceId::new(value) else {
        panic!("device id should be valid");
    };
    device_id
}

pub(crate) fn params(value: &str) -> InstanceParams {
    let Ok(params) = InstanceParams::new(value) else {
        panic!("instance params should be valid");
    };
    params
}
