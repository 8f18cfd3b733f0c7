//! End-to-end harness runs against scripted agents.

mod common;

use std::path::Path;
use std::sync::Arc;

use common::ScriptedAgent;
use parity_core::{
    HarnessConfig, SuccessCriterion, TestHarness, TestStatus, UseCase,
};

fn harness(agent: Arc<ScriptedAgent>, transcripts: &Path) -> TestHarness {
    TestHarness::builder()
        .config(HarnessConfig {
            transcript_dir: transcripts.to_path_buf(),
            ..Default::default()
        })
        .executor(agent)
        .build()
        .unwrap()
}

fn out_txt_case() -> Arc<UseCase> {
    Arc::new(
        UseCase::builder("Write Output", "Create out.txt")
            .criterion(SuccessCriterion::file_exists("out.txt"))
            .build()
            .unwrap(),
    )
}

#[tokio::test]
async fn test_agent_writing_file_passes() {
    let dir = tempfile::tempdir().unwrap();
    let agent = Arc::new(ScriptedAgent::new("User: go\nwrote out.txt").writes("out.txt", "hello"));
    let result = harness(Arc::clone(&agent), dir.path()).run(out_txt_case()).await;

    assert_eq!(result.status, TestStatus::Passed);
    assert!(result.issues.is_empty());
    assert_eq!(result.turns, 1);
    assert_eq!(result.usage.total(), 15);

    // Temporary workspace is gone after teardown.
    let dirs = agent.seen_dirs();
    assert!(!dirs[0].exists());

    // Transcript saved under the sanitized name.
    let transcript = result.transcript_path.unwrap();
    assert!(transcript.ends_with("write-output.txt"));
    assert_eq!(
        std::fs::read_to_string(transcript).unwrap(),
        "User: go\nwrote out.txt"
    );
}

#[tokio::test]
async fn test_agent_writing_nothing_fails_with_one_issue() {
    let dir = tempfile::tempdir().unwrap();
    let agent = Arc::new(ScriptedAgent::new("did nothing"));
    let result = harness(agent, dir.path()).run(out_txt_case()).await;

    assert_eq!(result.status, TestStatus::Failed);
    assert_eq!(result.issues.len(), 1);
    assert!(result.issues[0].contains("out.txt"));
    assert!(result.issues[0].contains("not found"));
}

#[tokio::test]
async fn test_zero_criteria_pass_with_full_confidence() {
    let dir = tempfile::tempdir().unwrap();
    let uc = Arc::new(UseCase::builder("Free form", "Do anything").build().unwrap());
    let result = harness(Arc::new(ScriptedAgent::new("")), dir.path()).run(uc).await;

    assert_eq!(result.status, TestStatus::Passed);
    assert_eq!(result.confidence(), 1.0);
    // Empty output: no transcript, zero turns.
    assert!(result.transcript_path.is_none());
    assert_eq!(result.turns, 0);
}

#[tokio::test]
async fn test_output_contains_is_case_insensitive() {
    let dir = tempfile::tempdir().unwrap();
    let uc = Arc::new(
        UseCase::builder("Success word", "Say success")
            .criterion(SuccessCriterion::output_contains("success"))
            .build()
            .unwrap(),
    );

    let passing = harness(Arc::new(ScriptedAgent::new("Task completed with SUCCESS")), dir.path())
        .run(Arc::clone(&uc))
        .await;
    assert_eq!(passing.status, TestStatus::Passed);

    let failing = harness(Arc::new(ScriptedAgent::new("Task failed")), dir.path())
        .run(uc)
        .await;
    assert_eq!(failing.status, TestStatus::Failed);
}

#[tokio::test]
async fn test_timeout_skips_validation() {
    let dir = tempfile::tempdir().unwrap();
    let agent = Arc::new(ScriptedAgent::new("partial").timing_out());
    let result = harness(agent, dir.path()).run(out_txt_case()).await;

    assert_eq!(result.status, TestStatus::Timeout);
    assert!(result.verdict.is_none());
    assert!(result.issues[0].contains("timed out"));
}

#[tokio::test]
async fn test_setup_failure_is_error_result() {
    let dir = tempfile::tempdir().unwrap();
    let uc = Arc::new(
        UseCase::builder("Escaping", "p")
            .setup_file("../../etc/evil", "x")
            .build()
            .unwrap(),
    );
    let agent = Arc::new(ScriptedAgent::new("never"));
    let result = harness(Arc::clone(&agent), dir.path()).run(uc).await;

    assert_eq!(result.status, TestStatus::Error);
    assert!(result.error.is_some());
    assert_eq!(agent.executions(), 0);
}

#[tokio::test]
async fn test_fixed_workspace_survives_run() {
    let dir = tempfile::tempdir().unwrap();
    let fixed = dir.path().join("ws-{{timestamp}}");
    let uc = Arc::new(
        UseCase::builder("Fixed", "p")
            .workspace(fixed.to_string_lossy())
            .setup_file("seed.txt", "seed")
            .criterion(SuccessCriterion::file_contains("seed.txt", "seed"))
            .build()
            .unwrap(),
    );
    let result = harness(Arc::new(ScriptedAgent::new("ok")), dir.path()).run(uc).await;

    assert_eq!(result.status, TestStatus::Passed);
    let workspace = result.workspace.unwrap();
    assert!(workspace.join("seed.txt").exists());
    assert!(!workspace.to_string_lossy().contains("{{timestamp}}"));
}

#[tokio::test]
async fn test_run_all_turns_load_failures_into_errors() {
    let cases = tempfile::tempdir().unwrap();
    std::fs::write(
        cases.path().join("a.yaml"),
        "name: Greeting\ncategory: basics\nprompt: Write out.txt\nsuccessCriteria:\n  - type: file_exists\n    args: [out.txt]\n",
    )
    .unwrap();
    std::fs::write(cases.path().join("b.yaml"), "name: [unterminated").unwrap();
    std::fs::write(
        cases.path().join("c.json"),
        r#"{"name": "Other", "category": "advanced", "prompt": "p"}"#,
    )
    .unwrap();

    let transcripts = tempfile::tempdir().unwrap();
    let agent = Arc::new(ScriptedAgent::new("done").writes("out.txt", "x"));
    let h = harness(agent, transcripts.path());

    let all = h.run_all(cases.path()).await.unwrap();
    let statuses: Vec<TestStatus> = all.iter().map(|r| r.status).collect();
    assert_eq!(
        statuses,
        vec![TestStatus::Passed, TestStatus::Error, TestStatus::Passed]
    );

    let basics = h.run_category(cases.path(), "BASICS").await.unwrap();
    assert_eq!(basics.len(), 2);
    assert_eq!(basics[0].use_case, "Greeting");
    assert_eq!(basics[1].status, TestStatus::Error);
}
