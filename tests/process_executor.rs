//! ProcessExecutor tests against a real shell

use conductor::execution::{ExecutorError, ProcessExecutor, StepExecutor, StepInvocation};
use std::collections::HashMap;
use std::time::Duration;

fn invocation(commands: Vec<&str>) -> StepInvocation {
    StepInvocation {
        step_name: "test-step".to_string(),
        image: "test-image".to_string(),
        commands: commands.into_iter().map(String::from).collect(),
        env: HashMap::new(),
        timeout: Duration::from_secs(10),
    }
}

#[tokio::test]
async fn test_commands_exiting_zero_succeed() {
    let executor = ProcessExecutor::new();
    let exit = executor.execute(&invocation(vec!["true"])).await.unwrap();
    assert!(exit.success());
}

#[tokio::test]
async fn test_nonzero_exit_code_is_reported() {
    let executor = ProcessExecutor::new();
    let exit = executor.execute(&invocation(vec!["exit 7"])).await.unwrap();
    assert!(!exit.success());
    assert_eq!(exit.code(), 7);
}

#[tokio::test]
async fn test_first_failing_command_stops_the_script() {
    let executor = ProcessExecutor::new();
    let exit = executor
        .execute(&invocation(vec!["false", "exit 0"]))
        .await
        .unwrap();
    assert!(!exit.success());
}

#[tokio::test]
async fn test_environment_is_visible_to_commands() {
    let executor = ProcessExecutor::new();
    let mut inv = invocation(vec![r#"test "$PLUGIN_GREETING" = hello"#]);
    inv.env
        .insert("PLUGIN_GREETING".to_string(), "hello".to_string());
    let exit = executor.execute(&inv).await.unwrap();
    assert!(exit.success());
}

#[tokio::test]
async fn test_missing_tool_is_a_spawn_error() {
    let executor = ProcessExecutor::new();
    // No commands: the image is invoked directly as a program
    let inv = StepInvocation {
        step_name: "publish".to_string(),
        image: "definitely-not-a-real-tool-457a1".to_string(),
        commands: vec![],
        env: HashMap::new(),
        timeout: Duration::from_secs(10),
    };
    let err = executor.execute(&inv).await.unwrap_err();
    assert!(matches!(err, ExecutorError::Spawn { .. }));
}

#[tokio::test]
async fn test_slow_step_times_out() {
    let executor = ProcessExecutor::new();
    let mut inv = invocation(vec!["sleep 5"]);
    inv.timeout = Duration::from_millis(200);
    let err = executor.execute(&inv).await.unwrap_err();
    assert!(matches!(err, ExecutorError::Timeout(_)));
}
