use std::path::Path;
use std::sync::Arc;

use rigger_core::AppError;
use rigger_domain::ProvisionOperation;
use tokio_util::sync::CancellationToken;

use crate::test_support::{ScriptedRunner, ScriptedStep, device, params};

use super::{LifecycleController, LifecyclePhase, ToolSettings};

fn controller(runner: Arc<ScriptedRunner>) -> LifecycleController {
    LifecycleController::new(
        runner,
        ToolSettings {
            program: "terraform".to_owned(),
            backend_config: vec![("bucket".to_owned(), "state-bucket".to_owned())],
            timeout: None,
        },
    )
}

#[tokio::test]
async fn apply_runs_after_successful_init() {
    let runner = Arc::new(ScriptedRunner::new());
    runner.script("init", ScriptedStep::ok("initialized")).await;
    runner.script("apply", ScriptedStep::ok("applied")).await;

    let report = controller(runner.clone())
        .run(
            ProvisionOperation::Create,
            Path::new("workspaces/dev123"),
            &device("dev123"),
            &params("web-1"),
            &CancellationToken::new(),
        )
        .await;

    assert!(report.succeeded());
    assert!(report.failure.is_none());
    assert_eq!(runner.subcommands().await, vec!["init", "apply"]);

    let init_position = report.combined_output.find("initialized");
    let apply_position = report.combined_output.find("applied");
    assert!(matches!((init_position, apply_position), (Some(init), Some(apply)) if init < apply));
}

#[tokio::test]
async fn tool_arguments_follow_the_invocation_protocol() {
    let runner = Arc::new(ScriptedRunner::new());

    controller(runner.clone())
        .run(
            ProvisionOperation::Destroy,
            Path::new("workspaces/dev123"),
            &device("dev123"),
            &params("web-1"),
            &CancellationToken::new(),
        )
        .await;

    let calls = runner.calls().await;
    assert_eq!(calls.len(), 2);
    assert_eq!(
        calls[0].args,
        vec!["init", "-input=false", "-backend-config=bucket=state-bucket"]
    );
    assert_eq!(
        calls[1].args,
        vec![
            "destroy",
            "-auto-approve",
            "-input=false",
            "-var=device_id=dev123",
            "-var=instance_name=web-1",
        ]
    );
    assert!(calls.iter().all(|call| call.working_dir == Path::new("workspaces/dev123")));
}

#[tokio::test]
async fn failed_init_never_executes_apply() {
    let runner = Arc::new(ScriptedRunner::new());
    runner
        .script("init", ScriptedStep::fail(1, "backend unreachable"))
        .await;

    let report = controller(runner.clone())
        .run(
            ProvisionOperation::Create,
            Path::new("workspaces/dev123"),
            &device("dev123"),
            &params("web-1"),
            &CancellationToken::new(),
        )
        .await;

    assert_eq!(report.phase, LifecyclePhase::Failed);
    assert_eq!(runner.calls().await.len(), 1);
    assert!(matches!(
        report.failure,
        Some(AppError::ExternalTool { exit_code: 1, ref output, .. }) if output.contains("backend unreachable")
    ));
}

#[tokio::test]
async fn failed_apply_carries_combined_output() {
    let runner = Arc::new(ScriptedRunner::new());
    runner.script("init", ScriptedStep::ok("initialized")).await;
    runner
        .script("apply", ScriptedStep::fail(1, "quota exceeded"))
        .await;

    let report = controller(runner)
        .run(
            ProvisionOperation::Create,
            Path::new("workspaces/dev123"),
            &device("dev123"),
            &params("web-1"),
            &CancellationToken::new(),
        )
        .await;

    assert_eq!(report.phase, LifecyclePhase::Failed);
    let Some(AppError::ExternalTool { output, .. }) = report.failure else {
        panic!("expected external tool failure");
    };
    assert!(output.contains("initialized"));
    assert!(output.contains("quota exceeded"));
}

#[tokio::test]
async fn timeout_is_a_failed_run() {
    let runner = Arc::new(ScriptedRunner::new());
    runner.script("apply", ScriptedStep::Timeout).await;

    let report = controller(runner)
        .run(
            ProvisionOperation::Create,
            Path::new("workspaces/dev123"),
            &device("dev123"),
            &params("web-1"),
            &CancellationToken::new(),
        )
        .await;

    assert_eq!(report.phase, LifecyclePhase::Failed);
    let Some(failure) = report.failure else {
        panic!("expected timeout failure");
    };
    assert!(failure.is_operational_failure());
    assert!(failure.audit_detail().starts_with("timeout"));
    assert!(failure.audit_detail().contains("still creating..."));
}

#[tokio::test]
async fn spawn_failure_is_reported_as_defect() {
    let runner = Arc::new(ScriptedRunner::new());
    runner.script("init", ScriptedStep::SpawnFailure).await;

    let report = controller(runner)
        .run(
            ProvisionOperation::Create,
            Path::new("workspaces/dev123"),
            &device("dev123"),
            &params("web-1"),
            &CancellationToken::new(),
        )
        .await;

    assert_eq!(report.phase, LifecyclePhase::Failed);
    assert!(matches!(report.failure, Some(AppError::Spawn(_))));
}

#[tokio::test]
async fn instance_id_is_read_from_output_query() {
    let runner = Arc::new(ScriptedRunner::new());
    runner
        .script(
            "output",
            ScriptedStep::ok(r#"{"ec2_instance_id":{"sensitive":false,"type":"string","value":"i-0abc"}}"#),
        )
        .await;

    let instance_id = controller(runner.clone())
        .query_instance_id(Path::new("workspaces/dev123"), &CancellationToken::new())
        .await;

    assert!(matches!(instance_id, Ok(Some(ref value)) if value == "i-0abc"));
    assert_eq!(
        runner.calls().await[0].args,
        vec!["output".to_owned(), "-json".to_owned()]
    );
}

#[tokio::test]
async fn missing_instance_output_yields_none() {
    let runner = Arc::new(ScriptedRunner::new());
    runner.script("output", ScriptedStep::ok("{}")).await;

    let instance_id = controller(runner)
        .query_instance_id(Path::new("workspaces/dev123"), &CancellationToken::new())
        .await;

    assert!(matches!(instance_id, Ok(None)));
}
