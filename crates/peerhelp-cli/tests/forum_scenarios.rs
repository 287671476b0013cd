//! End-to-end engine scenarios against the in-memory store and mock judge.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use tokio::sync::Barrier;

use peerhelp_core::error::ForumError;
use peerhelp_core::lifecycle::Transition;
use peerhelp_core::model::{
    AiRating, Category, CategoryId, InstructorAnswer, NewQuestion, Question, QuestionId,
    QuestionStatus, Response, Role, User, UserId,
};
use peerhelp_core::traits::{AnswerDraft, ForumStore, ResponseDraft};
use peerhelp_core::{Forum, ForumConfig, MemoryStore, Submission, VerdictCategory};
use peerhelp_judge::mock::MockReply;
use peerhelp_judge::MockJudge;

const HARMFUL: &str = "[direct]";
const VAGUE: &str = "[vague]";

fn judge() -> MockJudge {
    MockJudge::helpful()
        .on_hint(
            HARMFUL,
            VerdictCategory::HarmfulOrDirectAnswer,
            "Gives away the corrected loop.",
        )
        .on_hint(VAGUE, VerdictCategory::LowQuality, "Too vague to act on.")
}

struct World {
    forum: Arc<Forum>,
    judge: Arc<MockJudge>,
    owner: User,
    peers: Vec<User>,
    instructor: User,
    question: Question,
}

async fn world_with(judge: MockJudge, config: ForumConfig) -> World {
    world_on(Arc::new(MemoryStore::new()), judge, config).await
}

async fn world_on(store: Arc<dyn ForumStore>, judge: MockJudge, config: ForumConfig) -> World {
    let judge = Arc::new(judge);
    let forum = Arc::new(Forum::new(store, judge.clone(), config));
    forum.seed_defaults().await.unwrap();

    let owner = forum.user_by_name("Pooja").await.unwrap();
    let mut peers = Vec::new();
    for name in ["Rahul", "Sneha", "Vikram", "Priya", "Arjun"] {
        peers.push(forum.user_by_name(name).await.unwrap());
    }
    let instructor = forum.user_by_name("Riya").await.unwrap();
    let loops = forum
        .categories()
        .await
        .into_iter()
        .find(|c| c.name == "Loops")
        .unwrap();
    let question = forum
        .post_question(
            owner.id,
            NewQuestion {
                category_id: loops.id,
                title: "Loop skips last element".into(),
                description: "My sum is always short by the last item.".into(),
                code_snippet: Some("for i in range(0, len(xs) - 1):\n    total += xs[i]".into()),
            },
        )
        .await
        .unwrap();

    World {
        forum,
        judge,
        owner,
        peers,
        instructor,
        question,
    }
}

async fn world() -> World {
    world_with(judge(), ForumConfig::default()).await
}

impl World {
    fn submission(&self, responder: UserId, hint: &str) -> Submission {
        Submission {
            question_id: self.question.id,
            responder_id: responder,
            concept: "range bounds".into(),
            hint: hint.into(),
            next_step: Some("Print i on each pass.".into()),
        }
    }

    async fn submit(&self, responder: UserId, hint: &str) -> Result<Response, ForumError> {
        self.forum
            .submit_response(self.submission(responder, hint))
            .await
    }

    async fn karma(&self, user: UserId) -> i64 {
        self.forum.user(user).await.unwrap().karma
    }

    async fn status(&self) -> QuestionStatus {
        self.forum
            .question(self.question.id)
            .await
            .unwrap()
            .question
            .status
    }

    async fn all_responses(&self) -> Vec<Response> {
        self.forum
            .all_responses(self.instructor.id)
            .await
            .unwrap()
            .into_iter()
            .map(|v| v.response)
            .collect()
    }
}

#[tokio::test]
async fn karma_always_equals_response_history() {
    let w = world().await;
    let hints = ["think about the end bound", HARMFUL, VAGUE];

    // Every peer answers three times, all in flight together.
    let submissions: Vec<(UserId, String)> = w
        .peers
        .iter()
        .flat_map(|p| {
            hints
                .iter()
                .map(move |h| (p.id, format!("{h}: consider what range returns")))
        })
        .collect();
    let results = join_all(submissions.iter().map(|(id, hint)| w.submit(*id, hint))).await;
    assert!(results.iter().all(Result::is_ok));

    let responses = w.all_responses().await;
    assert_eq!(responses.len(), w.peers.len() * hints.len());
    for peer in &w.peers {
        let recomputed: i64 = responses
            .iter()
            .filter(|r| r.responder_id == peer.id)
            .map(Response::karma_awarded)
            .sum();
        assert_eq!(w.karma(peer.id).await, recomputed);
        assert_eq!(recomputed, 0); // +1, -1, 0
        assert!(w.forum.reconcile_karma(peer.id).await.unwrap().is_consistent());
    }
    assert!(w.forum.reconcile_all().await.is_empty());
}

#[tokio::test]
async fn outcomes_never_change_after_creation() {
    let w = world().await;
    w.submit(w.peers[0].id, "think about the end bound").await.unwrap();
    w.submit(w.peers[1].id, HARMFUL).await.unwrap();
    let before = w.all_responses().await;

    w.forum.escalate(w.question.id, w.owner.id).await.unwrap();
    w.forum
        .answer(w.question.id, w.instructor.id, "range excludes its stop value.")
        .await
        .unwrap();

    let after = w.all_responses().await;
    assert_eq!(before.len(), after.len());
    for (b, a) in before.iter().zip(&after) {
        assert_eq!(b.id, a.id);
        assert_eq!(b.outcome(), a.outcome());
    }
}

#[tokio::test]
async fn status_never_moves_backwards() {
    let w = world().await;
    let mut seen = vec![w.status().await];

    w.forum.escalate(w.question.id, w.owner.id).await.unwrap();
    seen.push(w.status().await);
    assert!(w.forum.escalate(w.question.id, w.owner.id).await.is_err());
    seen.push(w.status().await);

    w.forum
        .answer(w.question.id, w.instructor.id, "range excludes its stop value.")
        .await
        .unwrap();
    seen.push(w.status().await);
    assert!(w.forum.escalate(w.question.id, w.owner.id).await.is_err());
    seen.push(w.status().await);

    assert!(seen.windows(2).all(|p| p[0].rank() <= p[1].rank()));
    assert_eq!(seen.last(), Some(&QuestionStatus::Closed));
}

#[tokio::test]
async fn responding_to_non_open_question_changes_nothing() {
    for close in [false, true] {
        let w = world().await;
        let responder = w.peers[0].id;
        w.submit(responder, "think about the end bound").await.unwrap();
        w.forum.escalate(w.question.id, w.owner.id).await.unwrap();
        if close {
            w.forum
                .answer(w.question.id, w.instructor.id, "See the docs for range.")
                .await
                .unwrap();
        }
        let calls = w.judge.call_count();

        let err = w.submit(responder, "think about the end bound").await.unwrap_err();
        assert!(matches!(err, ForumError::InvalidTransition { .. }));
        assert_eq!(w.karma(responder).await, 1);
        assert_eq!(w.all_responses().await.len(), 1);
        assert_eq!(w.judge.call_count(), calls, "judge consulted for a closed door");
    }
}

#[tokio::test]
async fn owner_cannot_respond_to_own_question() {
    let w = world().await;
    let err = w.submit(w.owner.id, "think about the end bound").await.unwrap_err();
    assert!(matches!(err, ForumError::Forbidden(_)));
    assert!(w.all_responses().await.is_empty());
    assert_eq!(w.judge.call_count(), 0);
}

#[tokio::test]
async fn second_instructor_answer_fails_and_first_survives() {
    let w = world().await;
    w.forum.escalate(w.question.id, w.owner.id).await.unwrap();
    let first = w
        .forum
        .answer(w.question.id, w.instructor.id, "range excludes its stop value.")
        .await
        .unwrap();

    let amit = w.forum.user_by_name("Amit").await.unwrap();
    let err = w
        .forum
        .answer(w.question.id, amit.id, "Use range(len(xs)).")
        .await
        .unwrap_err();
    assert!(matches!(err, ForumError::InvalidTransition { .. }));

    let stored = w.forum.instructor_answer(w.question.id).await.unwrap().unwrap();
    assert_eq!(stored.answer, first);
}

#[tokio::test]
async fn empty_dashboard_reports_zero_percent() {
    let w = world().await;
    let dashboard = w.forum.dashboard().await;
    assert_eq!(dashboard.response_quality.total_responses, 0);
    assert_eq!(dashboard.response_quality.helpful_percentage, 0.0);
    assert_eq!(dashboard.avg_resolution_time_hours, None);
    assert!(dashboard.common_misconceptions.is_empty());
    assert!(w.forum.leaderboard().await.is_empty());
}

#[tokio::test]
async fn helpful_response_is_visible_and_rewarded() {
    let w = world().await;
    let s2 = w.peers[0].id;

    let response = w.submit(s2, "think about the end bound").await.unwrap();
    assert!(response.is_visible());
    assert_eq!(response.ai_rating(), AiRating::Helpful);
    assert_eq!(response.karma_awarded(), 1);
    assert_eq!(w.karma(s2).await, 1);
    assert_eq!(w.status().await, QuestionStatus::Open);

    let request = w.judge.last_request().unwrap();
    assert_eq!(request.category, "Loops");
    assert_eq!(request.question_title, "Loop skips last element");
    assert!(request.code_snippet.unwrap().contains("range(0, len(xs) - 1)"));
    assert_eq!(request.next_step.as_deref(), Some("Print i on each pass."));
}

#[tokio::test]
async fn harmful_response_is_hidden_from_students() {
    let w = world().await;
    let s2 = w.peers[0].id;

    let response = w.submit(s2, HARMFUL).await.unwrap();
    assert!(!response.is_visible());
    assert_eq!(response.ai_rating(), AiRating::Unhelpful);
    assert_eq!(response.karma_awarded(), -1);
    assert_eq!(w.karma(s2).await, -1);

    let owner_view = w
        .forum
        .question_responses(w.question.id, w.owner.id, false)
        .await
        .unwrap();
    assert!(owner_view.is_empty());

    let instructor_view = w
        .forum
        .question_responses(w.question.id, w.instructor.id, true)
        .await
        .unwrap();
    assert_eq!(instructor_view.len(), 1);
    assert_eq!(instructor_view[0].response.id, response.id);

    let misconceptions = w.forum.dashboard().await.common_misconceptions;
    assert_eq!(misconceptions.len(), 1);
    assert_eq!(misconceptions[0].category_name, "Loops");
    assert_eq!(misconceptions[0].misconception, "Gives away the corrected loop.");
}

#[tokio::test]
async fn low_quality_response_is_hidden_without_penalty() {
    let w = world().await;
    let s2 = w.peers[0].id;

    let response = w.submit(s2, VAGUE).await.unwrap();
    assert!(!response.is_visible());
    assert_eq!(response.ai_rating(), AiRating::Unhelpful);
    assert_eq!(response.karma_awarded(), 0);
    assert_eq!(w.karma(s2).await, 0);

    let leaderboard = w.forum.leaderboard().await;
    assert_eq!(leaderboard.len(), 1);
    assert_eq!(leaderboard[0].unhelpful_responses, 1);
}

#[tokio::test]
async fn escalation_then_answer_closes_question() {
    let w = world().await;

    let escalated = w.forum.escalate(w.question.id, w.owner.id).await.unwrap();
    assert_eq!(escalated.status, QuestionStatus::Escalated);

    let answer = w
        .forum
        .answer(w.question.id, w.instructor.id, "range excludes its stop value.")
        .await
        .unwrap();
    assert_eq!(answer.question_id, w.question.id);

    let closed = w.forum.question(w.question.id).await.unwrap().question;
    assert_eq!(closed.status, QuestionStatus::Closed);
    assert!(closed.closed_at.is_some());

    let dashboard = w.forum.dashboard().await;
    assert!(dashboard.avg_resolution_time_hours.is_some());

    let err = w
        .forum
        .answer(w.question.id, w.instructor.id, "Again.")
        .await
        .unwrap_err();
    assert!(matches!(err, ForumError::InvalidTransition { .. }));
}

#[tokio::test]
async fn only_the_owner_escalates() {
    let w = world().await;
    let err = w
        .forum
        .escalate(w.question.id, w.peers[0].id)
        .await
        .unwrap_err();
    assert!(matches!(err, ForumError::InvalidTransition { .. }));
    assert_eq!(w.status().await, QuestionStatus::Open);
}

#[tokio::test(start_paused = true)]
async fn judge_timeout_commits_nothing() {
    let config = ForumConfig {
        judge_timeout: Duration::from_secs(1),
        ..Default::default()
    };
    let w = world_with(judge().with_delay(Duration::from_secs(60)), config).await;
    let s2 = w.peers[0].id;

    let err = w.submit(s2, "think about the end bound").await.unwrap_err();
    assert!(matches!(err, ForumError::EvaluationUnavailable(_)));
    assert!(err.is_transient());
    assert!(w.all_responses().await.is_empty());
    assert_eq!(w.karma(s2).await, 0);
}

#[tokio::test]
async fn failed_evaluation_can_be_resubmitted() {
    let w = world().await;
    let s2 = w.peers[0].id;
    w.judge.push(MockReply::Fail("no JSON object in reply".into()));

    let err = w.submit(s2, "think about the end bound").await.unwrap_err();
    assert!(matches!(err, ForumError::EvaluationUnavailable(_)));
    assert!(w.all_responses().await.is_empty());

    w.submit(s2, "think about the end bound").await.unwrap();
    assert_eq!(w.all_responses().await.len(), 1);
    assert_eq!(w.karma(s2).await, 1);
}

/// Store that holds every caller of a gated commit until all racers have
/// arrived, so each one has passed the engine's checks before any commits.
struct GatedStore {
    inner: MemoryStore,
    transitions: Option<Barrier>,
    answers: Option<Barrier>,
}

impl GatedStore {
    fn gate_transitions(racers: usize) -> Self {
        Self {
            inner: MemoryStore::new(),
            transitions: Some(Barrier::new(racers)),
            answers: None,
        }
    }

    fn gate_answers(racers: usize) -> Self {
        Self {
            inner: MemoryStore::new(),
            transitions: None,
            answers: Some(Barrier::new(racers)),
        }
    }
}

#[async_trait]
impl ForumStore for GatedStore {
    async fn insert_user(
        &self,
        name: &str,
        role: Role,
        now: DateTime<Utc>,
    ) -> Result<User, ForumError> {
        self.inner.insert_user(name, role, now).await
    }
    async fn user(&self, id: UserId) -> Option<User> {
        self.inner.user(id).await
    }
    async fn users(&self) -> Vec<User> {
        self.inner.users().await
    }
    async fn insert_category(&self, name: &str) -> Result<Category, ForumError> {
        self.inner.insert_category(name).await
    }
    async fn category(&self, id: CategoryId) -> Option<Category> {
        self.inner.category(id).await
    }
    async fn categories(&self) -> Vec<Category> {
        self.inner.categories().await
    }
    async fn insert_question(
        &self,
        student_id: UserId,
        question: NewQuestion,
        now: DateTime<Utc>,
    ) -> Result<Question, ForumError> {
        self.inner.insert_question(student_id, question, now).await
    }
    async fn question(&self, id: QuestionId) -> Option<Question> {
        self.inner.question(id).await
    }
    async fn questions(&self) -> Vec<Question> {
        self.inner.questions().await
    }
    async fn transition(
        &self,
        id: QuestionId,
        transition: Transition,
        now: DateTime<Utc>,
    ) -> Result<Question, ForumError> {
        if let Some(gate) = &self.transitions {
            gate.wait().await;
        }
        self.inner.transition(id, transition, now).await
    }
    async fn commit_response(&self, draft: ResponseDraft) -> Result<Response, ForumError> {
        self.inner.commit_response(draft).await
    }
    async fn commit_instructor_answer(
        &self,
        draft: AnswerDraft,
    ) -> Result<InstructorAnswer, ForumError> {
        if let Some(gate) = &self.answers {
            gate.wait().await;
        }
        self.inner.commit_instructor_answer(draft).await
    }
    async fn apply_karma(&self, user: UserId, delta: i64) -> Result<i64, ForumError> {
        self.inner.apply_karma(user, delta).await
    }
    async fn responses(&self) -> Vec<Response> {
        self.inner.responses().await
    }
    async fn responses_for_question(&self, question: QuestionId) -> Vec<Response> {
        self.inner.responses_for_question(question).await
    }
    async fn responses_by(&self, responder: UserId) -> Vec<Response> {
        self.inner.responses_by(responder).await
    }
    async fn instructor_answer(&self, question: QuestionId) -> Option<InstructorAnswer> {
        self.inner.instructor_answer(question).await
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_escalations_succeed_once() {
    let w = world_on(
        Arc::new(GatedStore::gate_transitions(4)),
        judge(),
        ForumConfig::default(),
    )
    .await;

    let tasks: Vec<_> = (0..4)
        .map(|_| {
            let forum = Arc::clone(&w.forum);
            let (question, owner) = (w.question.id, w.owner.id);
            tokio::spawn(async move { forum.escalate(question, owner).await })
        })
        .collect();
    let results: Vec<_> = join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    for err in results.iter().filter_map(|r| r.as_ref().err()) {
        match err {
            ForumError::InvalidTransition { status, .. } => {
                assert_eq!(*status, QuestionStatus::Escalated)
            }
            other => panic!("expected a lost race, got {other:?}"),
        }
    }
    assert_eq!(w.status().await, QuestionStatus::Escalated);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_answers_succeed_once() {
    let w = world_on(
        Arc::new(GatedStore::gate_answers(2)),
        judge(),
        ForumConfig::default(),
    )
    .await;
    w.forum.escalate(w.question.id, w.owner.id).await.unwrap();
    let amit = w.forum.user_by_name("Amit").await.unwrap();

    let answer = |instructor: UserId, content: &'static str| {
        let forum = Arc::clone(&w.forum);
        let question = w.question.id;
        tokio::spawn(async move { forum.answer(question, instructor, content).await })
    };
    let riya = answer(w.instructor.id, "From Riya.");
    let from_amit = answer(amit.id, "From Amit.");
    let (a, b) = (riya.await.unwrap(), from_amit.await.unwrap());

    assert!(a.is_ok() ^ b.is_ok());
    let (winner, loser) = if a.is_ok() { (a, b) } else { (b, a) };
    match loser.unwrap_err() {
        ForumError::InvalidTransition { status, .. } => assert_eq!(status, QuestionStatus::Closed),
        other => panic!("expected a lost race, got {other:?}"),
    }
    let stored = w
        .forum
        .instructor_answer(w.question.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.answer.id, winner.unwrap().id);
    assert_eq!(w.status().await, QuestionStatus::Closed);
}
