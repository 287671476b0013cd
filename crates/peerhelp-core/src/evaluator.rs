//! Response evaluator.
//!
//! Judges a peer response exactly once, at submission, then persists the
//! response and its karma effect as a single unit. If no verdict is reached
//! nothing is written.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::error::ForumError;
use crate::lifecycle;
use crate::model::{Guidance, Outcome, QuestionId, Response, Role, UserId};
use crate::traits::{Clock, ForumStore, Judge, JudgeRequest, ResponseDraft};

/// A peer response as submitted by a student.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub question_id: QuestionId,
    pub responder_id: UserId,
    pub concept: String,
    pub hint: String,
    #[serde(default)]
    pub next_step: Option<String>,
}

impl Submission {
    /// Trim the guidance fields and reject blank required ones.
    fn guidance(&self) -> Result<Guidance, ForumError> {
        let concept = self.concept.trim();
        let hint = self.hint.trim();
        if concept.is_empty() {
            return Err(ForumError::ValidationFailed(
                "concept involved is required".into(),
            ));
        }
        if hint.is_empty() {
            return Err(ForumError::ValidationFailed(
                "hint/guidance is required".into(),
            ));
        }
        let next_step = self
            .next_step
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from);
        Ok(Guidance {
            concept: concept.to_string(),
            hint: hint.to_string(),
            next_step,
        })
    }
}

/// Orchestrates the judge call and the response commit.
#[derive(Clone)]
pub struct ResponseEvaluator {
    store: Arc<dyn ForumStore>,
    judge: Arc<dyn Judge>,
    clock: Arc<dyn Clock>,
    judge_timeout: Duration,
}

impl ResponseEvaluator {
    pub fn new(
        store: Arc<dyn ForumStore>,
        judge: Arc<dyn Judge>,
        clock: Arc<dyn Clock>,
        judge_timeout: Duration,
    ) -> Self {
        Self {
            store,
            judge,
            clock,
            judge_timeout,
        }
    }

    /// Evaluate and persist a response.
    ///
    /// Returns the response with its outcome whether or not it is visible.
    #[instrument(skip(self, submission), fields(question = %submission.question_id, responder = %submission.responder_id))]
    pub async fn submit(&self, submission: Submission) -> Result<Response, ForumError> {
        let guidance = submission.guidance()?;

        let question = self
            .store
            .question(submission.question_id)
            .await
            .ok_or_else(|| ForumError::not_found("question", submission.question_id))?;
        lifecycle::ensure_can_respond(&question)?;
        if question.student_id == submission.responder_id {
            return Err(ForumError::Forbidden(
                "cannot respond to your own question".into(),
            ));
        }

        let responder = self
            .store
            .user(submission.responder_id)
            .await
            .ok_or_else(|| ForumError::not_found("user", submission.responder_id))?;
        if responder.role != Role::Student {
            return Err(ForumError::Forbidden(format!(
                "{} is not a student; only students submit peer responses",
                responder.name
            )));
        }

        let category = self
            .store
            .category(question.category_id)
            .await
            .ok_or_else(|| ForumError::not_found("category", question.category_id))?;

        let request = JudgeRequest {
            question_title: question.title.clone(),
            question_description: question.description.clone(),
            code_snippet: question.code_snippet.clone(),
            category: category.name,
            concept: guidance.concept.clone(),
            hint: guidance.hint.clone(),
            next_step: guidance.next_step.clone(),
        };

        let verdict = match tokio::time::timeout(self.judge_timeout, self.judge.evaluate(&request))
            .await
        {
            Ok(Ok(verdict)) => verdict,
            Ok(Err(e)) => {
                tracing::warn!(judge = self.judge.name(), "evaluation failed: {e:#}");
                return Err(ForumError::EvaluationUnavailable(format!(
                    "{} judge failed: {e:#}",
                    self.judge.name()
                )));
            }
            Err(_) => {
                tracing::warn!(
                    judge = self.judge.name(),
                    timeout_ms = self.judge_timeout.as_millis() as u64,
                    "evaluation timed out"
                );
                return Err(ForumError::EvaluationUnavailable(format!(
                    "{} judge timed out after {}ms",
                    self.judge.name(),
                    self.judge_timeout.as_millis()
                )));
            }
        };

        let outcome = Outcome::from_verdict(&verdict);
        let response = self
            .store
            .commit_response(ResponseDraft {
                question_id: question.id,
                responder_id: responder.id,
                expected_status: question.status,
                guidance,
                outcome,
                created_at: self.clock.now(),
            })
            .await?;

        tracing::info!(
            response = %response.id,
            rating = %response.ai_rating(),
            karma = response.karma_awarded(),
            visible = response.is_visible(),
            "response evaluated"
        );
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submission(concept: &str, hint: &str, next: Option<&str>) -> Submission {
        Submission {
            question_id: QuestionId(1),
            responder_id: UserId(2),
            concept: concept.into(),
            hint: hint.into(),
            next_step: next.map(String::from),
        }
    }

    #[test]
    fn guidance_is_trimmed() {
        let g = submission("  scope ", " where is x defined? ", Some("   "))
            .guidance()
            .unwrap();
        assert_eq!(g.concept, "scope");
        assert_eq!(g.hint, "where is x defined?");
        assert_eq!(g.next_step, None);
    }

    #[test]
    fn blank_required_fields_fail_validation() {
        assert!(matches!(
            submission("", "hint", None).guidance(),
            Err(ForumError::ValidationFailed(_))
        ));
        assert!(matches!(
            submission("concept", "  ", None).guidance(),
            Err(ForumError::ValidationFailed(_))
        ));
    }
}
