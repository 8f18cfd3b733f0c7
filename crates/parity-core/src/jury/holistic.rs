//! Holistic scoring through an external scorer (typically an LLM).

use std::path::Path;
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use regex::Regex;

use super::{Judge, JudgeContext, PASS_THRESHOLD};
use crate::domain::{Judgment, Result, Score};

/// Upper bound of the holistic scale.
pub const MAX_SCORE: f64 = 10.0;

/// Score assumed when a response carries no parsable `Score:` line.
pub const FALLBACK_SCORE: f64 = 5.0;

/// Everything a holistic scorer is shown.
#[derive(Debug, Clone, Copy)]
pub struct HolisticRequest<'a> {
    pub goal: &'a str,
    pub expected_behavior: &'a str,
    pub output: &'a str,
    pub workspace: &'a Path,
}

/// External scorer returning a free-form response body.
///
/// The body is expected to contain a `Score: <number>` line followed by
/// reasoning; see [`parse_score_response`].
#[async_trait]
pub trait HolisticScorer: Send + Sync {
    async fn score(&self, request: HolisticRequest<'_>) -> Result<String>;
}

/// Parsed holistic response.
#[derive(Debug, Clone, PartialEq)]
pub struct HolisticScore {
    /// Clamped to `[0, 10]`.
    pub score: f64,
    pub reasoning: String,
}

fn score_line() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?im)^[\s*#>_]*score[\s*_]*:[\s*_]*(-?\d+(?:\.\d+)?)").ok())
        .as_ref()
}

/// Extract the score and reasoning from a scorer response.
///
/// Scores are clamped to `[0, 10]`; a missing or unparsable score becomes
/// [`FALLBACK_SCORE`]. Text after the score line is the reasoning (a leading
/// `Reasoning:` label is dropped); without a score line the whole body is.
pub fn parse_score_response(body: &str) -> HolisticScore {
    let captured = score_line().and_then(|re| re.captures(body));
    let Some(caps) = captured else {
        return HolisticScore {
            score: FALLBACK_SCORE,
            reasoning: body.trim().to_string(),
        };
    };

    let score = caps
        .get(1)
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .filter(|s| s.is_finite())
        .map_or(FALLBACK_SCORE, |s| s.clamp(0.0, MAX_SCORE));

    let line_end = caps.get(0).map_or(0, |m| m.end());
    let rest = body[line_end..]
        .split_once('\n')
        .map_or("", |(_, after)| after)
        .trim();
    let reasoning = strip_label(rest, "reasoning:").trim().to_string();

    HolisticScore { score, reasoning }
}

fn strip_label<'a>(text: &'a str, label: &str) -> &'a str {
    match text.get(..label.len()) {
        Some(head) if head.eq_ignore_ascii_case(label) => &text[label.len()..],
        _ => text,
    }
}

/// Judge delegating to a [`HolisticScorer`].
pub struct HolisticJudge {
    scorer: Arc<dyn HolisticScorer>,
    expected_behavior: String,
}

impl HolisticJudge {
    pub fn new(scorer: Arc<dyn HolisticScorer>, expected_behavior: impl Into<String>) -> Self {
        Self {
            scorer,
            expected_behavior: expected_behavior.into(),
        }
    }
}

#[async_trait]
impl Judge for HolisticJudge {
    fn name(&self) -> &str {
        "holistic"
    }

    async fn judge(&self, ctx: &JudgeContext<'_>) -> Judgment {
        let request = HolisticRequest {
            goal: ctx.use_case.prompt(),
            expected_behavior: &self.expected_behavior,
            output: ctx.output,
            workspace: ctx.workspace,
        };
        match self.scorer.score(request).await {
            Ok(body) => {
                let parsed = parse_score_response(&body);
                let score = Score::Scale {
                    value: parsed.score,
                    max: MAX_SCORE,
                };
                let passed = score.normalized() >= PASS_THRESHOLD;
                Judgment::scored(self.name(), score, passed, parsed.reasoning)
                    .with_metadata("raw_score", parsed.score)
                    .with_metadata("loss", 1.0 - score.normalized())
            }
            Err(e) => Judgment::fail(self.name(), format!("holistic scorer failed: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_score_and_reasoning() {
        let parsed = parse_score_response("Score: 8.5\nReasoning: solid work, tests pass.");
        assert_eq!(parsed.score, 8.5);
        assert_eq!(parsed.reasoning, "solid work, tests pass.");
    }

    #[test]
    fn test_parse_clamps() {
        assert_eq!(parse_score_response("Score: 14").score, 10.0);
        assert_eq!(parse_score_response("score: -3").score, 0.0);
    }

    #[test]
    fn test_parse_markdown_score() {
        let parsed = parse_score_response("Some preamble\n**Score:** 6\nMostly fine.");
        assert_eq!(parsed.score, 6.0);
        assert_eq!(parsed.reasoning, "Mostly fine.");
    }

    #[test]
    fn test_parse_missing_score_defaults() {
        let parsed = parse_score_response("I could not decide.");
        assert_eq!(parsed.score, FALLBACK_SCORE);
        assert_eq!(parsed.reasoning, "I could not decide.");
    }
}
