//! Offline heuristic judge.
//!
//! Deterministic keyword and pattern rules, used when no LLM is configured
//! and in tests that need realistic verdicts without a network.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::RegexSet;

use peerhelp_core::traits::{Judge, JudgeRequest, Verdict, VerdictCategory};

/// Hints shorter than this (after trimming) are too brief to help.
const MIN_HINT_CHARS: usize = 30;

static CODE_PATTERNS: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        r"def\s+\w+\s*\(",
        r"for\s+\w+\s+in",
        r"while\s+.*:",
        r"if\s+.*:\s*\n",
        r"return\s+\w+",
        r"print\s*\([^)]+\)\s*\n.*print",
    ])
    .expect("CODE_PATTERNS should compile")
});

const DISMISSIVE_PHRASES: &[&str] = &[
    "just google",
    "google it",
    "read the docs",
    "read documentation",
    "that's just how",
    "figure it out",
    "it's obvious",
    "it's easy",
    "just use",
    "simply do",
];

const GUIDING_PHRASES: &[&str] = &[
    "think about",
    "consider",
    "what happens when",
    "try to",
    "notice that",
    "the concept",
    "this is because",
    "ask yourself",
    "look at",
    "compare",
    "difference between",
];

/// Rule-based judge that never fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeuristicJudge;

impl HeuristicJudge {
    pub fn new() -> Self {
        Self
    }

    /// Classify a request without the async trait machinery.
    pub fn classify(&self, request: &JudgeRequest) -> Verdict {
        let hint = request.hint.as_str();
        let lower = hint.to_lowercase();

        let (category, reason) = if CODE_PATTERNS.is_match(hint) {
            (
                VerdictCategory::HarmfulOrDirectAnswer,
                "Response contains direct code solution instead of guiding hints.",
            )
        } else if hint.trim().chars().count() < MIN_HINT_CHARS {
            (
                VerdictCategory::LowQuality,
                "Response is too brief to be helpful.",
            )
        } else if DISMISSIVE_PHRASES.iter().any(|p| lower.contains(p)) {
            (
                VerdictCategory::LowQuality,
                "Response contains dismissive or unhelpful language.",
            )
        } else if GUIDING_PHRASES.iter().any(|p| lower.contains(p))
            && request.concept.trim().chars().count() > 5
        {
            (
                VerdictCategory::Helpful,
                "Response provides constructive guidance without giving away the solution.",
            )
        } else {
            (
                VerdictCategory::Helpful,
                "Response appears to provide reasonable guidance.",
            )
        };

        Verdict {
            category,
            reason: reason.to_string(),
        }
    }
}

#[async_trait]
impl Judge for HeuristicJudge {
    fn name(&self) -> &str {
        "heuristic"
    }

    async fn evaluate(&self, request: &JudgeRequest) -> anyhow::Result<Verdict> {
        Ok(self.classify(request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(concept: &str, hint: &str) -> JudgeRequest {
        JudgeRequest {
            question_title: "Loop skips last element".into(),
            question_description: "range(0, len - 1) misses one".into(),
            code_snippet: None,
            category: "Loops".into(),
            concept: concept.into(),
            hint: hint.into(),
            next_step: None,
        }
    }

    fn classify(concept: &str, hint: &str) -> Verdict {
        HeuristicJudge.classify(&request(concept, hint))
    }

    #[test]
    fn code_is_a_direct_answer() {
        for hint in [
            "Replace it with: for i in range(len(xs)): total += xs[i]",
            "def add(a, b): that's the whole fix",
            "while n > 0: keep dividing and it terminates",
            "just return total at the end of the function body",
        ] {
            assert_eq!(
                classify("range bounds", hint).category,
                VerdictCategory::HarmfulOrDirectAnswer,
                "{hint}"
            );
        }
    }

    #[test]
    fn short_hints_are_low_quality() {
        let v = classify("range bounds", "check the range");
        assert_eq!(v.category, VerdictCategory::LowQuality);
        assert_eq!(v.reason, "Response is too brief to be helpful.");
    }

    #[test]
    fn dismissive_hints_are_low_quality() {
        let v = classify("anything", "Honestly you should just google this, it is a classic");
        assert_eq!(v.category, VerdictCategory::LowQuality);
        assert!(v.reason.contains("dismissive"));
    }

    #[test]
    fn guiding_hints_are_helpful() {
        let v = classify(
            "range bounds",
            "Think about what value the last index has and whether range reaches it.",
        );
        assert_eq!(v.category, VerdictCategory::Helpful);
        assert!(v.reason.contains("constructive"));

        let v = classify(
            "x",
            "Print the index on every pass and see where the output stops.",
        );
        assert_eq!(v.category, VerdictCategory::Helpful);
        assert_eq!(v.reason, "Response appears to provide reasonable guidance.");
    }

    #[tokio::test]
    async fn trait_call_matches_classify() {
        let req = request("range bounds", "Consider what range(0, n - 1) produces for n = 3.");
        let verdict = HeuristicJudge.evaluate(&req).await.unwrap();
        assert_eq!(verdict, HeuristicJudge.classify(&req));
    }
}
