//! The forum engine.
//!
//! `Forum` is the read/write surface the presentation layer talks to. It
//! wires the lifecycle manager, evaluator, escalation workflow and karma
//! ledger to one store and one judge, and enforces response visibility by
//! the caller's role.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::analytics::{self, Dashboard, LeaderboardEntry};
use crate::error::ForumError;
use crate::escalation::EscalationWorkflow;
use crate::evaluator::{ResponseEvaluator, Submission};
use crate::ledger::{KarmaLedger, Reconciliation};
use crate::lifecycle::LifecycleManager;
use crate::model::{
    AnswerView, Category, InstructorAnswer, NewQuestion, Question, QuestionFilter, QuestionId,
    QuestionSummary, Response, ResponseView, Role, User, UserId,
};
use crate::traits::{Clock, ForumStore, Judge, SystemClock};

/// Default roster installed by [`Forum::seed_defaults`].
pub const DEFAULT_USERS: &[(&str, Role)] = &[
    ("Riya", Role::Instructor),
    ("Amit", Role::Instructor),
    ("Pooja", Role::Student),
    ("Rahul", Role::Student),
    ("Sneha", Role::Student),
    ("Vikram", Role::Student),
    ("Priya", Role::Student),
    ("Arjun", Role::Student),
];

/// Default categories installed by [`Forum::seed_defaults`].
pub const DEFAULT_CATEGORIES: &[&str] = &[
    "Variables",
    "Loops",
    "Functions",
    "Data Structures",
    "Conditionals",
    "File Handling",
    "Error Handling",
    "Object-Oriented Programming",
];

/// Configuration for the forum engine.
#[derive(Debug, Clone)]
pub struct ForumConfig {
    /// Upper bound on one judge call.
    pub judge_timeout: Duration,
    /// Number of misconception clusters shown on the dashboard.
    pub misconception_limit: usize,
}

impl Default for ForumConfig {
    fn default() -> Self {
        Self {
            judge_timeout: Duration::from_secs(30),
            misconception_limit: 10,
        }
    }
}

/// The forum engine.
pub struct Forum {
    store: Arc<dyn ForumStore>,
    clock: Arc<dyn Clock>,
    config: ForumConfig,
    lifecycle: LifecycleManager,
    evaluator: ResponseEvaluator,
    escalation: EscalationWorkflow,
    ledger: KarmaLedger,
}

impl Forum {
    pub fn new(store: Arc<dyn ForumStore>, judge: Arc<dyn Judge>, config: ForumConfig) -> Self {
        Self::with_clock(store, judge, config, Arc::new(SystemClock))
    }

    pub fn with_clock(
        store: Arc<dyn ForumStore>,
        judge: Arc<dyn Judge>,
        config: ForumConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let lifecycle = LifecycleManager::new(Arc::clone(&store), Arc::clone(&clock));
        let evaluator = ResponseEvaluator::new(
            Arc::clone(&store),
            judge,
            Arc::clone(&clock),
            config.judge_timeout,
        );
        let escalation =
            EscalationWorkflow::new(lifecycle.clone(), Arc::clone(&store), Arc::clone(&clock));
        let ledger = KarmaLedger::new(Arc::clone(&store));
        Self {
            store,
            clock,
            config,
            lifecycle,
            evaluator,
            escalation,
            ledger,
        }
    }

    pub fn ledger(&self) -> &KarmaLedger {
        &self.ledger
    }

    pub fn lifecycle(&self) -> &LifecycleManager {
        &self.lifecycle
    }

    async fn require_user(&self, id: UserId) -> Result<User, ForumError> {
        self.store
            .user(id)
            .await
            .ok_or_else(|| ForumError::not_found("user", id))
    }

    async fn require_question(&self, id: QuestionId) -> Result<Question, ForumError> {
        self.store
            .question(id)
            .await
            .ok_or_else(|| ForumError::not_found("question", id))
    }

    async fn user_names(&self) -> HashMap<UserId, String> {
        self.store
            .users()
            .await
            .into_iter()
            .map(|u| (u.id, u.name))
            .collect()
    }

    async fn view_responses(&self, mut responses: Vec<Response>) -> Vec<ResponseView> {
        let names = self.user_names().await;
        responses.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        responses
            .into_iter()
            .map(|response| ResponseView {
                responder_name: names
                    .get(&response.responder_id)
                    .cloned()
                    .unwrap_or_default(),
                response,
            })
            .collect()
    }

    // -- provisioning -------------------------------------------------------

    pub async fn create_user(&self, name: &str, role: Role) -> Result<User, ForumError> {
        let user = self.store.insert_user(name, role, self.clock.now()).await?;
        tracing::info!(user = %user.id, role = %user.role, "user created");
        Ok(user)
    }

    pub async fn create_category(&self, name: &str) -> Result<Category, ForumError> {
        self.store.insert_category(name).await
    }

    /// Install the default roster and categories into an empty store.
    ///
    /// Returns `false` and changes nothing if any user already exists.
    pub async fn seed_defaults(&self) -> Result<bool, ForumError> {
        if !self.store.users().await.is_empty() {
            return Ok(false);
        }
        for (name, role) in DEFAULT_USERS {
            self.create_user(name, *role).await?;
        }
        for name in DEFAULT_CATEGORIES {
            self.create_category(name).await?;
        }
        tracing::info!(
            users = DEFAULT_USERS.len(),
            categories = DEFAULT_CATEGORIES.len(),
            "seeded defaults"
        );
        Ok(true)
    }

    pub async fn users(&self) -> Vec<User> {
        self.store.users().await
    }

    pub async fn user(&self, id: UserId) -> Result<User, ForumError> {
        self.require_user(id).await
    }

    pub async fn user_by_name(&self, name: &str) -> Result<User, ForumError> {
        self.store
            .users()
            .await
            .into_iter()
            .find(|u| u.name.eq_ignore_ascii_case(name.trim()))
            .ok_or_else(|| ForumError::name_not_found("user", name.trim()))
    }

    pub async fn categories(&self) -> Vec<Category> {
        let mut categories = self.store.categories().await;
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        categories
    }

    /// Post a new question on behalf of a student.
    pub async fn post_question(
        &self,
        student_id: UserId,
        question: NewQuestion,
    ) -> Result<Question, ForumError> {
        let student = self.require_user(student_id).await?;
        if student.role != Role::Student {
            return Err(ForumError::Forbidden(format!(
                "{} is not a student; only students post questions",
                student.name
            )));
        }
        if self.store.category(question.category_id).await.is_none() {
            return Err(ForumError::not_found("category", question.category_id));
        }
        let title = question.title.trim().to_string();
        let description = question.description.trim().to_string();
        if title.is_empty() {
            return Err(ForumError::ValidationFailed("title is required".into()));
        }
        if description.is_empty() {
            return Err(ForumError::ValidationFailed(
                "description is required".into(),
            ));
        }
        let code_snippet = question.code_snippet.filter(|c| !c.trim().is_empty());

        let posted = self
            .store
            .insert_question(
                student_id,
                NewQuestion {
                    category_id: question.category_id,
                    title,
                    description,
                    code_snippet,
                },
                self.clock.now(),
            )
            .await?;
        tracing::info!(question = %posted.id, student = %student_id, "question posted");
        Ok(posted)
    }

    // -- reads --------------------------------------------------------------

    /// Questions matching `filter`, newest first.
    pub async fn list_questions(&self, filter: &QuestionFilter) -> Vec<QuestionSummary> {
        let names = self.user_names().await;
        let categories: HashMap<_, _> = self
            .store
            .categories()
            .await
            .into_iter()
            .map(|c| (c.id, c.name))
            .collect();
        let mut visible_counts: HashMap<QuestionId, usize> = HashMap::new();
        for r in self.store.responses().await {
            if r.is_visible() {
                *visible_counts.entry(r.question_id).or_default() += 1;
            }
        }

        let mut questions: Vec<Question> = self
            .store
            .questions()
            .await
            .into_iter()
            .filter(|q| filter.matches(q))
            .collect();
        questions.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        questions
            .into_iter()
            .map(|question| QuestionSummary {
                student_name: names.get(&question.student_id).cloned().unwrap_or_default(),
                category_name: categories
                    .get(&question.category_id)
                    .cloned()
                    .unwrap_or_default(),
                response_count: visible_counts.get(&question.id).copied().unwrap_or(0),
                question,
            })
            .collect()
    }

    pub async fn question(&self, id: QuestionId) -> Result<QuestionSummary, ForumError> {
        let question = self.require_question(id).await?;
        let student_name = self
            .store
            .user(question.student_id)
            .await
            .map(|u| u.name)
            .unwrap_or_default();
        let category_name = self
            .store
            .category(question.category_id)
            .await
            .map(|c| c.name)
            .unwrap_or_default();
        let response_count = self
            .store
            .responses_for_question(id)
            .await
            .iter()
            .filter(|r| r.is_visible())
            .count();
        Ok(QuestionSummary {
            question,
            student_name,
            category_name,
            response_count,
        })
    }

    /// Responses to a question as `viewer` may see them, oldest first.
    ///
    /// Hidden responses are only returned to instructors who ask for them.
    pub async fn question_responses(
        &self,
        question: QuestionId,
        viewer: UserId,
        include_hidden: bool,
    ) -> Result<Vec<ResponseView>, ForumError> {
        let viewer = self.require_user(viewer).await?;
        if include_hidden && !viewer.is_instructor() {
            return Err(ForumError::Forbidden(
                "only instructors may see hidden responses".into(),
            ));
        }
        self.require_question(question).await?;
        let responses: Vec<Response> = self
            .store
            .responses_for_question(question)
            .await
            .into_iter()
            .filter(|r| include_hidden || r.is_visible())
            .collect();
        tracing::debug!(question = %question, viewer = %viewer.id, count = responses.len(), "listing responses");
        Ok(self.view_responses(responses).await)
    }

    pub async fn instructor_answer(
        &self,
        question: QuestionId,
    ) -> Result<Option<AnswerView>, ForumError> {
        self.require_question(question).await?;
        let Some(answer) = self.store.instructor_answer(question).await else {
            return Ok(None);
        };
        let instructor_name = self
            .store
            .user(answer.instructor_id)
            .await
            .map(|u| u.name)
            .unwrap_or_default();
        Ok(Some(AnswerView {
            answer,
            instructor_name,
        }))
    }

    /// Responses written by `user`, newest first.
    ///
    /// Non-instructor viewers only receive the visible ones; a student sees
    /// their own hidden outcome only as the return value of the submission.
    pub async fn user_responses(
        &self,
        user: UserId,
        viewer: UserId,
    ) -> Result<Vec<ResponseView>, ForumError> {
        let viewer = self.require_user(viewer).await?;
        self.require_user(user).await?;
        let responses: Vec<Response> = self
            .store
            .responses_by(user)
            .await
            .into_iter()
            .filter(|r| viewer.is_instructor() || r.is_visible())
            .collect();
        let mut views = self.view_responses(responses).await;
        views.reverse();
        Ok(views)
    }

    /// Every response, hidden ones included. Instructors only.
    pub async fn all_responses(&self, viewer: UserId) -> Result<Vec<ResponseView>, ForumError> {
        let viewer = self.require_user(viewer).await?;
        if !viewer.is_instructor() {
            return Err(ForumError::Forbidden(
                "only instructors may review all responses".into(),
            ));
        }
        let mut views = self.view_responses(self.store.responses().await).await;
        views.reverse();
        Ok(views)
    }

    pub async fn leaderboard(&self) -> Vec<LeaderboardEntry> {
        let users = self.store.users().await;
        let responses = self.store.responses().await;
        analytics::leaderboard(&users, &responses)
    }

    pub async fn dashboard(&self) -> Dashboard {
        let categories = self.store.categories().await;
        let questions = self.store.questions().await;
        let responses = self.store.responses().await;
        analytics::dashboard(
            &categories,
            &questions,
            &responses,
            self.config.misconception_limit,
        )
    }

    // -- writes -------------------------------------------------------------

    pub async fn submit_response(&self, submission: Submission) -> Result<Response, ForumError> {
        self.evaluator.submit(submission).await
    }

    pub async fn escalate(&self, question: QuestionId, actor: UserId) -> Result<Question, ForumError> {
        self.escalation.escalate(question, actor).await
    }

    pub async fn answer(
        &self,
        question: QuestionId,
        instructor: UserId,
        content: &str,
    ) -> Result<InstructorAnswer, ForumError> {
        self.escalation
            .create_instructor_answer(question, instructor, content)
            .await
    }

    // -- ledger -------------------------------------------------------------

    pub async fn reconcile_karma(&self, user: UserId) -> Result<Reconciliation, ForumError> {
        self.ledger.reconcile(user).await
    }

    pub async fn reconcile_all(&self) -> Vec<Reconciliation> {
        self.ledger.reconcile_all().await
    }
}
