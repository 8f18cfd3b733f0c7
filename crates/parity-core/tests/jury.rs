//! Jury evaluation against real workspaces.

use std::sync::Arc;

use async_trait::async_trait;
use parity_core::domain::Result;
use parity_core::jury::{HolisticRequest, HolisticScorer};
use parity_core::{JudgeContext, Jury, ParityError, SuccessCriterion, UseCase};

struct FixedScorer(&'static str);

#[async_trait]
impl HolisticScorer for FixedScorer {
    async fn score(&self, _request: HolisticRequest<'_>) -> Result<String> {
        Ok(self.0.to_string())
    }
}

struct BrokenScorer;

#[async_trait]
impl HolisticScorer for BrokenScorer {
    async fn score(&self, _request: HolisticRequest<'_>) -> Result<String> {
        Err(ParityError::Agent("model unavailable".to_string()))
    }
}

fn use_case(criteria: Vec<SuccessCriterion>) -> UseCase {
    UseCase::builder("jury case", "Make the thing")
        .criteria(criteria)
        .expected_behavior("Creates notes.md with a heading")
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_file_criteria() {
    let ws = tempfile::tempdir().unwrap();
    std::fs::write(ws.path().join("notes.md"), "# Title\nbody").unwrap();
    let uc = use_case(vec![
        SuccessCriterion::file_exists("notes.md"),
        SuccessCriterion::file_contains("notes.md", "# Title"),
        SuccessCriterion::file_contains("notes.md", "missing text"),
    ]);

    let verdict = Jury::build(&uc, None)
        .evaluate(&JudgeContext {
            use_case: &uc,
            workspace: ws.path(),
            output: "",
        })
        .await;

    assert_eq!(verdict.judgments.len(), 3);
    // weights 1 + 2 pass, 2 fails => 3/5
    assert!((verdict.weighted_score() - 0.6).abs() < 1e-9);
    assert!(!verdict.passed());
    assert!((verdict.confidence() - 2.0 / 3.0).abs() < 1e-9);
    assert_eq!(verdict.issues().len(), 1);
}

#[tokio::test]
async fn test_no_exceptions_ignores_plain_error_word() {
    let ws = tempfile::tempdir().unwrap();
    let uc = use_case(vec![SuccessCriterion::no_exceptions()]);
    let jury = Jury::build(&uc, None);

    let clean = jury
        .evaluate(&JudgeContext {
            use_case: &uc,
            workspace: ws.path(),
            output: "fixed the error handling, 0 errors",
        })
        .await;
    assert!(clean.passed());

    let crashed = jury
        .evaluate(&JudgeContext {
            use_case: &uc,
            workspace: ws.path(),
            output: "Traceback (most recent call last):\n  File \"a.py\"\nKeyError: 'x'",
        })
        .await;
    assert!(!crashed.passed());
}

#[cfg(unix)]
#[tokio::test]
async fn test_command_succeeds_runs_in_workspace() {
    let ws = tempfile::tempdir().unwrap();
    std::fs::write(ws.path().join("marker"), "").unwrap();
    let uc = use_case(vec![
        SuccessCriterion::command_succeeds("test -f marker"),
        SuccessCriterion::command_succeeds("exit 3"),
    ]);

    let verdict = Jury::build(&uc, None)
        .evaluate(&JudgeContext {
            use_case: &uc,
            workspace: ws.path(),
            output: "",
        })
        .await;
    assert!(verdict.judgments[0].passed);
    assert!(!verdict.judgments[1].passed);
    assert!(verdict.judgments[1].reasoning.contains("exited 3"));
}

#[tokio::test]
async fn test_compiles_without_sources_passes() {
    let ws = tempfile::tempdir().unwrap();
    let uc = use_case(vec![SuccessCriterion::compiles(None)]);
    let verdict = Jury::build(&uc, None)
        .evaluate(&JudgeContext {
            use_case: &uc,
            workspace: ws.path(),
            output: "",
        })
        .await;
    assert!(verdict.passed());
    assert!(verdict.judgments[0].reasoning.contains("nothing to compile"));
}

#[tokio::test]
async fn test_holistic_judge_dominates() {
    let ws = tempfile::tempdir().unwrap();
    std::fs::write(ws.path().join("notes.md"), "# Title").unwrap();
    let uc = use_case(vec![SuccessCriterion::file_exists("notes.md")]);

    let low: Arc<dyn HolisticScorer> = Arc::new(FixedScorer("Score: 2\nReasoning: wrong heading"));
    let jury = Jury::build(&uc, Some(low));
    assert_eq!(jury.judge_names(), vec!["file_exists(notes.md)", "holistic"]);

    let verdict = jury
        .evaluate(&JudgeContext {
            use_case: &uc,
            workspace: ws.path(),
            output: "done",
        })
        .await;
    // (1.0 * 1 + 0.2 * 5) / 6
    assert!((verdict.weighted_score() - 2.0 / 6.0).abs() < 1e-9);
    assert!(!verdict.passed());
    let holistic = &verdict.by_name["holistic"];
    assert_eq!(holistic.reasoning, "wrong heading");
    assert_eq!(holistic.metadata["raw_score"], serde_json::json!(2.0));
}

#[tokio::test]
async fn test_holistic_scorer_failure_is_failing_judgment() {
    let ws = tempfile::tempdir().unwrap();
    let uc = use_case(vec![]);
    let verdict = Jury::build(&uc, Some(Arc::new(BrokenScorer)))
        .evaluate(&JudgeContext {
            use_case: &uc,
            workspace: ws.path(),
            output: "",
        })
        .await;

    let holistic = &verdict.by_name["holistic"];
    assert!(!holistic.passed);
    assert!(holistic.reasoning.contains("model unavailable"));
}
