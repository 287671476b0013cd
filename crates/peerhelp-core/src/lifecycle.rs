//! Question status state machine.
//!
//! `open → escalated → closed`, plus `open → closed` when an instructor
//! answers a question nobody escalated. The manager decides whether a
//! transition is allowed; the store applies it with compare-and-set on the
//! `from` status so racing transitions surface as `InvalidTransition`.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::ForumError;
use crate::model::{Question, QuestionId, QuestionStatus, UserId};
use crate::traits::{Clock, ForumStore};

/// A status change, conditioned on the status it starts from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub from: QuestionStatus,
    pub to: QuestionStatus,
}

impl Transition {
    /// Returns `true` if the transition strictly raises the status rank.
    pub fn is_forward(&self) -> bool {
        self.to.rank() > self.from.rank()
    }
}

/// True iff peers may still respond to the question.
pub fn can_respond(question: &Question) -> bool {
    question.status == QuestionStatus::Open
}

pub fn ensure_can_respond(question: &Question) -> Result<(), ForumError> {
    if can_respond(question) {
        Ok(())
    } else {
        Err(ForumError::invalid_transition(
            question.id,
            question.status,
            "question is not open for responses",
        ))
    }
}

/// Decide whether `actor` may escalate `question`.
pub fn plan_escalate(question: &Question, actor: UserId) -> Result<Transition, ForumError> {
    if question.status != QuestionStatus::Open {
        return Err(ForumError::invalid_transition(
            question.id,
            question.status,
            "only open questions can be escalated",
        ));
    }
    if question.student_id != actor {
        return Err(ForumError::invalid_transition(
            question.id,
            question.status,
            format!("user {actor} does not own this question"),
        ));
    }
    Ok(Transition {
        from: QuestionStatus::Open,
        to: QuestionStatus::Escalated,
    })
}

/// Decide whether `question` may be closed.
pub fn plan_close(question: &Question) -> Result<Transition, ForumError> {
    if question.status.is_terminal() {
        return Err(ForumError::invalid_transition(
            question.id,
            question.status,
            "question is already closed",
        ));
    }
    Ok(Transition {
        from: question.status,
        to: QuestionStatus::Closed,
    })
}

/// Owns question status changes.
#[derive(Clone)]
pub struct LifecycleManager {
    store: Arc<dyn ForumStore>,
    clock: Arc<dyn Clock>,
}

impl LifecycleManager {
    pub fn new(store: Arc<dyn ForumStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    async fn load(&self, id: QuestionId) -> Result<Question, ForumError> {
        self.store
            .question(id)
            .await
            .ok_or_else(|| ForumError::not_found("question", id))
    }

    /// Move an open question to `escalated`. Only its owner may do this.
    pub async fn escalate(&self, id: QuestionId, actor: UserId) -> Result<Question, ForumError> {
        let question = self.load(id).await?;
        let transition = plan_escalate(&question, actor)?;
        let updated = self
            .store
            .transition(id, transition, self.clock.now())
            .await?;
        tracing::info!(question = %id, actor = %actor, "question escalated");
        Ok(updated)
    }

    /// Authorize closing a question.
    ///
    /// Returns the transition rather than applying it: closing only happens
    /// together with an instructor answer, and the store applies both in one
    /// unit.
    pub async fn close(&self, id: QuestionId) -> Result<(Question, Transition), ForumError> {
        let question = self.load(id).await?;
        let transition = plan_close(&question)?;
        Ok((question, transition))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CategoryId;
    use chrono::Utc;

    fn question(status: QuestionStatus) -> Question {
        Question {
            id: QuestionId(1),
            student_id: UserId(10),
            category_id: CategoryId(1),
            title: "t".into(),
            description: "d".into(),
            code_snippet: None,
            status,
            created_at: Utc::now(),
            closed_at: None,
        }
    }

    #[test]
    fn only_open_questions_accept_responses() {
        assert!(can_respond(&question(QuestionStatus::Open)));
        assert!(!can_respond(&question(QuestionStatus::Escalated)));
        assert!(ensure_can_respond(&question(QuestionStatus::Closed)).is_err());
    }

    #[test]
    fn owner_escalates_open_question() {
        let t = plan_escalate(&question(QuestionStatus::Open), UserId(10)).unwrap();
        assert_eq!(t.from, QuestionStatus::Open);
        assert_eq!(t.to, QuestionStatus::Escalated);
        assert!(t.is_forward());
    }

    #[test]
    fn escalation_rejections() {
        let err = plan_escalate(&question(QuestionStatus::Open), UserId(11)).unwrap_err();
        assert!(matches!(err, ForumError::InvalidTransition { .. }));
        let err = plan_escalate(&question(QuestionStatus::Escalated), UserId(10)).unwrap_err();
        assert!(matches!(err, ForumError::InvalidTransition { .. }));
    }

    #[test]
    fn close_from_open_or_escalated_only() {
        assert_eq!(
            plan_close(&question(QuestionStatus::Open)).unwrap().from,
            QuestionStatus::Open
        );
        assert_eq!(
            plan_close(&question(QuestionStatus::Escalated)).unwrap().to,
            QuestionStatus::Closed
        );
        assert!(plan_close(&question(QuestionStatus::Closed)).is_err());
    }

    #[test]
    fn backward_transitions_are_not_forward() {
        let back = Transition {
            from: QuestionStatus::Closed,
            to: QuestionStatus::Open,
        };
        assert!(!back.is_forward());
        let same = Transition {
            from: QuestionStatus::Open,
            to: QuestionStatus::Open,
        };
        assert!(!same.is_forward());
    }
}
