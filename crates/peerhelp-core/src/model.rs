//! Core data model types for the forum.
//!
//! Users, categories, questions, peer responses and instructor answers, plus
//! the read-side views the engine hands to the presentation layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::traits::{Verdict, VerdictCategory};

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<$name> for u64 {
            fn from(id: $name) -> u64 {
                id.0
            }
        }
    };
}

id_type!(
    /// Identifier of a [`User`].
    UserId
);
id_type!(
    /// Identifier of a [`Category`].
    CategoryId
);
id_type!(
    /// Identifier of a [`Question`].
    QuestionId
);
id_type!(
    /// Identifier of a [`Response`].
    ResponseId
);
id_type!(
    /// Identifier of an [`InstructorAnswer`].
    AnswerId
);

/// What a user is allowed to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Instructor,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Student => write!(f, "student"),
            Role::Instructor => write!(f, "instructor"),
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "student" => Ok(Role::Student),
            "instructor" => Ok(Role::Instructor),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// A forum participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub role: Role,
    /// Running helpfulness score. Only the karma ledger changes it.
    pub karma: i64,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn is_instructor(&self) -> bool {
        self.role == Role::Instructor
    }
}

/// A static topic that questions are filed under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
}

/// Where a question is in its lifecycle.
///
/// Statuses are ordered: `Open < Escalated < Closed`. A question never moves
/// to a lower-ranked status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionStatus {
    Open,
    Escalated,
    Closed,
}

impl QuestionStatus {
    pub fn rank(self) -> u8 {
        match self {
            QuestionStatus::Open => 0,
            QuestionStatus::Escalated => 1,
            QuestionStatus::Closed => 2,
        }
    }

    pub fn is_terminal(self) -> bool {
        self == QuestionStatus::Closed
    }
}

impl fmt::Display for QuestionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuestionStatus::Open => write!(f, "open"),
            QuestionStatus::Escalated => write!(f, "escalated"),
            QuestionStatus::Closed => write!(f, "closed"),
        }
    }
}

impl FromStr for QuestionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "open" => Ok(QuestionStatus::Open),
            "escalated" => Ok(QuestionStatus::Escalated),
            "closed" => Ok(QuestionStatus::Closed),
            other => Err(format!("unknown status: {other}")),
        }
    }
}

/// A programming question posted by a student.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    pub student_id: UserId,
    pub category_id: CategoryId,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub code_snippet: Option<String>,
    pub status: QuestionStatus,
    pub created_at: DateTime<Utc>,
    /// Set once, when the question reaches `closed`.
    #[serde(default)]
    pub closed_at: Option<DateTime<Utc>>,
}

/// Input for posting a question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewQuestion {
    pub category_id: CategoryId,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub code_snippet: Option<String>,
}

/// The three guidance fields of a peer response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guidance {
    pub concept: String,
    pub hint: String,
    #[serde(default)]
    pub next_step: Option<String>,
}

/// Two-valued rating stored with every response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AiRating {
    Helpful,
    Unhelpful,
}

impl fmt::Display for AiRating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AiRating::Helpful => write!(f, "helpful"),
            AiRating::Unhelpful => write!(f, "unhelpful"),
        }
    }
}

/// The frozen result of evaluating a response.
///
/// Built once from a judge verdict and never updated; there are no setters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    ai_rating: AiRating,
    ai_reason: String,
    karma_awarded: i64,
    is_visible: bool,
}

impl Outcome {
    /// Apply the fixed karma/visibility policy to a verdict.
    pub fn from_verdict(verdict: &Verdict) -> Self {
        let (ai_rating, karma_awarded, is_visible) = match verdict.category {
            VerdictCategory::HarmfulOrDirectAnswer => (AiRating::Unhelpful, -1, false),
            VerdictCategory::LowQuality => (AiRating::Unhelpful, 0, false),
            VerdictCategory::Helpful => (AiRating::Helpful, 1, true),
        };
        Self {
            ai_rating,
            ai_reason: verdict.reason.clone(),
            karma_awarded,
            is_visible,
        }
    }

    pub fn ai_rating(&self) -> AiRating {
        self.ai_rating
    }

    pub fn ai_reason(&self) -> &str {
        &self.ai_reason
    }

    pub fn karma_awarded(&self) -> i64 {
        self.karma_awarded
    }

    pub fn is_visible(&self) -> bool {
        self.is_visible
    }
}

/// A peer response together with its evaluation outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub id: ResponseId,
    pub question_id: QuestionId,
    pub responder_id: UserId,
    #[serde(flatten)]
    pub guidance: Guidance,
    #[serde(flatten)]
    outcome: Outcome,
    pub created_at: DateTime<Utc>,
}

impl Response {
    pub(crate) fn new(
        id: ResponseId,
        question_id: QuestionId,
        responder_id: UserId,
        guidance: Guidance,
        outcome: Outcome,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            question_id,
            responder_id,
            guidance,
            outcome,
            created_at,
        }
    }

    pub fn outcome(&self) -> &Outcome {
        &self.outcome
    }

    pub fn ai_rating(&self) -> AiRating {
        self.outcome.ai_rating
    }

    pub fn karma_awarded(&self) -> i64 {
        self.outcome.karma_awarded
    }

    pub fn is_visible(&self) -> bool {
        self.outcome.is_visible
    }
}

/// The authoritative answer that closes an escalated question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstructorAnswer {
    pub id: AnswerId,
    pub question_id: QuestionId,
    pub instructor_id: UserId,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Filters for question listings. Unset fields match everything.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuestionFilter {
    #[serde(default)]
    pub status: Option<QuestionStatus>,
    #[serde(default)]
    pub category_id: Option<CategoryId>,
    #[serde(default)]
    pub student_id: Option<UserId>,
    #[serde(default)]
    pub exclude_student_id: Option<UserId>,
}

impl QuestionFilter {
    pub fn matches(&self, question: &Question) -> bool {
        self.status.map_or(true, |s| question.status == s)
            && self.category_id.map_or(true, |c| question.category_id == c)
            && self.student_id.map_or(true, |s| question.student_id == s)
            && self
                .exclude_student_id
                .map_or(true, |s| question.student_id != s)
    }
}

/// A question as shown in listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionSummary {
    #[serde(flatten)]
    pub question: Question,
    pub student_name: String,
    pub category_name: String,
    /// Number of responses visible to ordinary viewers.
    pub response_count: usize,
}

/// A response as shown in listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseView {
    #[serde(flatten)]
    pub response: Response,
    pub responder_name: String,
}

/// An instructor answer as shown on a question page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerView {
    #[serde(flatten)]
    pub answer: InstructorAnswer,
    pub instructor_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verdict(category: VerdictCategory) -> Verdict {
        Verdict {
            category,
            reason: "because".into(),
        }
    }

    #[test]
    fn status_display_and_parse() {
        assert_eq!(QuestionStatus::Escalated.to_string(), "escalated");
        assert_eq!(
            "CLOSED".parse::<QuestionStatus>().unwrap(),
            QuestionStatus::Closed
        );
        assert!("resolved".parse::<QuestionStatus>().is_err());
        assert_eq!("Instructor".parse::<Role>().unwrap(), Role::Instructor);
    }

    #[test]
    fn status_ranks_are_ordered() {
        assert!(QuestionStatus::Open.rank() < QuestionStatus::Escalated.rank());
        assert!(QuestionStatus::Escalated.rank() < QuestionStatus::Closed.rank());
        assert!(QuestionStatus::Closed.is_terminal());
    }

    #[test]
    fn outcome_policy() {
        let harmful = Outcome::from_verdict(&verdict(VerdictCategory::HarmfulOrDirectAnswer));
        assert_eq!(harmful.ai_rating(), AiRating::Unhelpful);
        assert_eq!(harmful.karma_awarded(), -1);
        assert!(!harmful.is_visible());

        let vague = Outcome::from_verdict(&verdict(VerdictCategory::LowQuality));
        assert_eq!(vague.ai_rating(), AiRating::Unhelpful);
        assert_eq!(vague.karma_awarded(), 0);
        assert!(!vague.is_visible());

        let helpful = Outcome::from_verdict(&verdict(VerdictCategory::Helpful));
        assert_eq!(helpful.ai_rating(), AiRating::Helpful);
        assert_eq!(helpful.karma_awarded(), 1);
        assert!(helpful.is_visible());
        assert_eq!(helpful.ai_reason(), "because");
    }

    #[test]
    fn response_serializes_flat() {
        let response = Response::new(
            ResponseId(1),
            QuestionId(2),
            UserId(3),
            Guidance {
                concept: "loop bounds".into(),
                hint: "look at the last index".into(),
                next_step: None,
            },
            Outcome::from_verdict(&verdict(VerdictCategory::Helpful)),
            Utc::now(),
        );
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["ai_rating"], "helpful");
        assert_eq!(json["karma_awarded"], 1);
        assert_eq!(json["is_visible"], true);
        assert_eq!(json["concept"], "loop bounds");

        let back: Response = serde_json::from_value(json).unwrap();
        assert_eq!(back, response);
    }

    #[test]
    fn filter_matching() {
        let question = Question {
            id: QuestionId(1),
            student_id: UserId(4),
            category_id: CategoryId(2),
            title: "t".into(),
            description: "d".into(),
            code_snippet: None,
            status: QuestionStatus::Open,
            created_at: Utc::now(),
            closed_at: None,
        };
        assert!(QuestionFilter::default().matches(&question));
        let exclude_owner = QuestionFilter {
            exclude_student_id: Some(UserId(4)),
            ..Default::default()
        };
        assert!(!exclude_owner.matches(&question));
        let escalated_only = QuestionFilter {
            status: Some(QuestionStatus::Escalated),
            ..Default::default()
        };
        assert!(!escalated_only.matches(&question));
        let by_category = QuestionFilter {
            category_id: Some(CategoryId(2)),
            student_id: Some(UserId(4)),
            ..Default::default()
        };
        assert!(by_category.matches(&question));
    }
}
