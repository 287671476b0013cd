//! Trait definitions for the engine's external collaborators.
//!
//! The judge is implemented by the `peerhelp-judge` crate; the store by
//! [`crate::store::MemoryStore`] (or anything else that can honor the paired
//! write contracts below).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ForumError, JudgeError};
use crate::lifecycle::Transition;
use crate::model::{
    Category, CategoryId, Guidance, InstructorAnswer, NewQuestion, Outcome, Question,
    QuestionId, QuestionStatus, Response, Role, User, UserId,
};

// ---------------------------------------------------------------------------
// Judge trait
// ---------------------------------------------------------------------------

/// An external capability that classifies a peer response.
#[async_trait]
pub trait Judge: Send + Sync {
    /// Human-readable judge name (e.g. "gemini").
    fn name(&self) -> &str;

    /// Classify one response. Any error means no verdict was reached.
    async fn evaluate(&self, request: &JudgeRequest) -> anyhow::Result<Verdict>;
}

/// Everything the judge is told about a response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JudgeRequest {
    pub question_title: String,
    pub question_description: String,
    #[serde(default)]
    pub code_snippet: Option<String>,
    pub category: String,
    pub concept: String,
    pub hint: String,
    #[serde(default)]
    pub next_step: Option<String>,
}

/// The judge's three-way quality classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictCategory {
    /// Factually wrong, or hands over the solution instead of guiding.
    HarmfulOrDirectAnswer,
    /// Vague, generic or off-target, but not harmful.
    LowQuality,
    /// Guides the student toward understanding.
    Helpful,
}

/// A judge's classification plus its rationale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub category: VerdictCategory,
    pub reason: String,
}

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

/// Source of timestamps for created/closed fields.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

// ---------------------------------------------------------------------------
// Store trait
// ---------------------------------------------------------------------------

/// A response ready to be persisted together with its karma effect.
#[derive(Debug, Clone)]
pub struct ResponseDraft {
    pub question_id: QuestionId,
    pub responder_id: UserId,
    /// Status the question had when the submission was accepted.
    pub expected_status: QuestionStatus,
    pub guidance: Guidance,
    pub outcome: Outcome,
    pub created_at: DateTime<Utc>,
}

/// An instructor answer ready to be persisted together with the close.
#[derive(Debug, Clone)]
pub struct AnswerDraft {
    pub question_id: QuestionId,
    pub instructor_id: UserId,
    pub content: String,
    pub transition: Transition,
    pub created_at: DateTime<Utc>,
}

/// Strongly consistent storage for forum entities.
///
/// Every mutating method is one atomic unit: it either applies completely or
/// returns an error having changed nothing. Status changes are
/// compare-and-set against the `from` status the caller read.
#[async_trait]
pub trait ForumStore: Send + Sync {
    async fn insert_user(
        &self,
        name: &str,
        role: Role,
        now: DateTime<Utc>,
    ) -> Result<User, ForumError>;
    async fn user(&self, id: UserId) -> Option<User>;
    async fn users(&self) -> Vec<User>;

    async fn insert_category(&self, name: &str) -> Result<Category, ForumError>;
    async fn category(&self, id: CategoryId) -> Option<Category>;
    async fn categories(&self) -> Vec<Category>;

    async fn insert_question(
        &self,
        student_id: UserId,
        question: NewQuestion,
        now: DateTime<Utc>,
    ) -> Result<Question, ForumError>;
    async fn question(&self, id: QuestionId) -> Option<Question>;
    async fn questions(&self) -> Vec<Question>;

    /// Move a question along `transition`, failing if its status is no
    /// longer `transition.from`.
    async fn transition(
        &self,
        id: QuestionId,
        transition: Transition,
        now: DateTime<Utc>,
    ) -> Result<Question, ForumError>;

    /// Persist a response and add its karma to the responder, as one unit.
    async fn commit_response(&self, draft: ResponseDraft) -> Result<Response, ForumError>;

    /// Persist an instructor answer and close its question, as one unit.
    async fn commit_instructor_answer(
        &self,
        draft: AnswerDraft,
    ) -> Result<InstructorAnswer, ForumError>;

    /// Add `delta` to a user's karma and return the new total.
    async fn apply_karma(&self, user: UserId, delta: i64) -> Result<i64, ForumError>;

    async fn responses(&self) -> Vec<Response>;
    async fn responses_for_question(&self, question: QuestionId) -> Vec<Response>;
    async fn responses_by(&self, responder: UserId) -> Vec<Response>;

    async fn instructor_answer(&self, question: QuestionId) -> Option<InstructorAnswer>;
}

// ---------------------------------------------------------------------------
// Judging prompt and verdict parsing
// ---------------------------------------------------------------------------

/// Build the prompt sent to LLM-backed judges.
pub fn build_judge_prompt(request: &JudgeRequest) -> String {
    let code = request
        .code_snippet
        .as_deref()
        .filter(|c| !c.trim().is_empty())
        .unwrap_or("No code provided");
    let next_step = request
        .next_step
        .as_deref()
        .filter(|n| !n.trim().is_empty())
        .unwrap_or("Not provided");

    format!(
        r#"You judge peer responses on a programming help forum for students.

QUESTION
- Category: {category}
- Title: {title}
- Description: {description}
- Code:
{code}

PEER RESPONSE
- Concept involved: {concept}
- Hint / guidance: {hint}
- What to try next: {next_step}

A response fails if it is:
1. INCORRECT: states something factually wrong about programming.
2. A DIRECT SOLUTION: hands over the code or answer instead of guiding.
3. UNINFORMATIVE: too vague or generic to be useful.
4. MISFOCUSED: does not address the student's actual problem.
5. UNCLEAR: confusing or hard to follow.

Classify the response as exactly one of:
- "harmful_or_direct_answer" for criteria 1 or 2,
- "low_quality" for criteria 3, 4 or 5,
- "helpful" when it guides the student toward understanding the specific issue without giving the answer away.

Reply with JSON only:
{{"verdict": "<classification>", "reason": "<one or two sentences>"}}"#,
        category = request.category,
        title = request.question_title,
        description = request.question_description,
        code = code,
        concept = request.concept,
        hint = request.hint,
        next_step = next_step,
    )
}

#[derive(Deserialize)]
struct RawVerdict {
    #[serde(default)]
    verdict: Option<String>,
    #[serde(default)]
    rating: Option<String>,
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    karma_change: Option<i64>,
}

/// Extract a verdict from a judge's free-text reply.
///
/// Reads the first JSON object in the text. Accepts
/// `{"verdict", "reason"}`, and the older `{"rating", "reason",
/// "karma_change"}` shape when rating and karma agree. Anything else is
/// rejected; nothing is defaulted.
pub fn parse_verdict(text: &str) -> Result<Verdict, JudgeError> {
    let object = first_json_object(text)
        .ok_or_else(|| JudgeError::MalformedVerdict("no JSON object in reply".into()))?;
    let raw: RawVerdict = serde_json::from_value(object)
        .map_err(|e| JudgeError::MalformedVerdict(format!("unexpected field types: {e}")))?;

    let reason = raw
        .reason
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty())
        .ok_or_else(|| JudgeError::MalformedVerdict("missing reason".into()))?;

    let category = match (raw.verdict, raw.rating, raw.karma_change) {
        (Some(verdict), _, _) => parse_category(&verdict)?,
        (None, Some(rating), Some(karma)) => {
            match (rating.trim().to_lowercase().as_str(), karma) {
                ("helpful", 1) => VerdictCategory::Helpful,
                ("unhelpful", 0) => VerdictCategory::LowQuality,
                ("unhelpful", -1) => VerdictCategory::HarmfulOrDirectAnswer,
                (rating, karma) => {
                    return Err(JudgeError::MalformedVerdict(format!(
                        "rating '{rating}' does not match karma_change {karma}"
                    )))
                }
            }
        }
        _ => return Err(JudgeError::MalformedVerdict("missing verdict".into())),
    };

    Ok(Verdict { category, reason })
}

fn parse_category(s: &str) -> Result<VerdictCategory, JudgeError> {
    let normalized = s.trim().to_lowercase().replace(['-', ' '], "_");
    match normalized.as_str() {
        "helpful" => Ok(VerdictCategory::Helpful),
        "low_quality" => Ok(VerdictCategory::LowQuality),
        "harmful_or_direct_answer" | "harmful" | "direct_answer" | "incorrect" => {
            Ok(VerdictCategory::HarmfulOrDirectAnswer)
        }
        other => Err(JudgeError::MalformedVerdict(format!(
            "unknown verdict '{other}'"
        ))),
    }
}

/// Find the first position in `text` where a JSON object parses.
fn first_json_object(text: &str) -> Option<serde_json::Value> {
    text.match_indices('{').find_map(|(start, _)| {
        serde_json::Deserializer::from_str(&text[start..])
            .into_iter::<serde_json::Value>()
            .next()
            .and_then(Result::ok)
            .filter(serde_json::Value::is_object)
    })
}
