//! Escalation and instructor-answer workflow.

use std::sync::Arc;

use crate::error::ForumError;
use crate::lifecycle::LifecycleManager;
use crate::model::{InstructorAnswer, Question, QuestionId, Role, UserId};
use crate::traits::{AnswerDraft, Clock, ForumStore};

#[derive(Clone)]
pub struct EscalationWorkflow {
    lifecycle: LifecycleManager,
    store: Arc<dyn ForumStore>,
    clock: Arc<dyn Clock>,
}

impl EscalationWorkflow {
    pub fn new(
        lifecycle: LifecycleManager,
        store: Arc<dyn ForumStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            lifecycle,
            store,
            clock,
        }
    }

    pub async fn escalate(&self, question: QuestionId, actor: UserId) -> Result<Question, ForumError> {
        self.lifecycle.escalate(question, actor).await
    }

    /// Record the authoritative answer and close the question.
    ///
    /// Answering an open question is treated as escalate-then-close. The
    /// answer and the close are committed together.
    pub async fn create_instructor_answer(
        &self,
        question_id: QuestionId,
        instructor_id: UserId,
        content: &str,
    ) -> Result<InstructorAnswer, ForumError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(ForumError::ValidationFailed(
                "answer content is required".into(),
            ));
        }

        let instructor = self
            .store
            .user(instructor_id)
            .await
            .ok_or_else(|| ForumError::not_found("user", instructor_id))?;
        if instructor.role != Role::Instructor {
            return Err(ForumError::Forbidden(format!(
                "{} is not an instructor",
                instructor.name
            )));
        }

        if self.store.instructor_answer(question_id).await.is_some() {
            let status = self
                .store
                .question(question_id)
                .await
                .map(|q| q.status)
                .ok_or_else(|| ForumError::not_found("question", question_id))?;
            return Err(ForumError::invalid_transition(
                question_id,
                status,
                "question already has an instructor answer",
            ));
        }

        let (question, transition) = self.lifecycle.close(question_id).await?;
        let answer = self
            .store
            .commit_instructor_answer(AnswerDraft {
                question_id: question.id,
                instructor_id: instructor.id,
                content: content.to_string(),
                transition,
                created_at: self.clock.now(),
            })
            .await?;

        tracing::info!(
            question = %question.id,
            instructor = %instructor.id,
            from = %transition.from,
            "instructor answer recorded, question closed"
        );
        Ok(answer)
    }
}
