//! Read-side analytics: karma leaderboard, instructor dashboard and
//! misconception clusters.
//!
//! Everything here is a pure function of the entities passed in; nothing is
//! cached, so the views are always consistent with the store they were read
//! from.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    AiRating, Category, CategoryId, Question, QuestionId, QuestionStatus, Response, Role, User,
    UserId,
};

/// One student's row on the karma leaderboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub user_id: UserId,
    pub name: String,
    pub karma: i64,
    pub helpful_responses: usize,
    pub unhelpful_responses: usize,
    pub first_response_at: DateTime<Utc>,
}

/// Rank every student with at least one response.
///
/// Ordered by karma descending; ties go to whoever responded first, then to
/// the lower user id.
pub fn leaderboard(users: &[User], responses: &[Response]) -> Vec<LeaderboardEntry> {
    struct Tally {
        helpful: usize,
        unhelpful: usize,
        first: DateTime<Utc>,
    }

    let mut tallies: HashMap<UserId, Tally> = HashMap::new();
    for r in responses {
        let tally = tallies.entry(r.responder_id).or_insert(Tally {
            helpful: 0,
            unhelpful: 0,
            first: r.created_at,
        });
        match r.ai_rating() {
            AiRating::Helpful => tally.helpful += 1,
            AiRating::Unhelpful => tally.unhelpful += 1,
        }
        tally.first = tally.first.min(r.created_at);
    }

    let mut entries: Vec<LeaderboardEntry> = users
        .iter()
        .filter(|u| u.role == Role::Student)
        .filter_map(|u| {
            tallies.get(&u.id).map(|t| LeaderboardEntry {
                user_id: u.id,
                name: u.name.clone(),
                karma: u.karma,
                helpful_responses: t.helpful,
                unhelpful_responses: t.unhelpful,
                first_response_at: t.first,
            })
        })
        .collect();

    entries.sort_by(|a, b| {
        b.karma
            .cmp(&a.karma)
            .then(a.first_response_at.cmp(&b.first_response_at))
            .then(a.user_id.cmp(&b.user_id))
    });
    entries
}

/// Overall response quality.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseQualityStats {
    pub total_responses: usize,
    pub helpful_count: usize,
    pub unhelpful_count: usize,
    /// Percent, rounded to one decimal. Zero when there are no responses.
    pub helpful_percentage: f64,
}

/// Per-category activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryStats {
    pub category_id: CategoryId,
    pub category_name: String,
    pub question_count: usize,
    pub avg_responses_per_question: f64,
    pub avg_resolution_time_hours: Option<f64>,
}

/// A recurring reason for unhelpful responses within one category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Misconception {
    pub category_name: String,
    pub misconception: String,
    pub occurrence_count: usize,
}

/// The instructor dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dashboard {
    pub response_quality: ResponseQualityStats,
    pub avg_resolution_time_hours: Option<f64>,
    pub category_stats: Vec<CategoryStats>,
    pub common_misconceptions: Vec<Misconception>,
}

fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

fn resolution_hours(question: &Question) -> Option<f64> {
    if question.status != QuestionStatus::Closed {
        return None;
    }
    let closed_at = question.closed_at?;
    let millis = (closed_at - question.created_at).num_milliseconds();
    Some(millis as f64 / 3_600_000.0)
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

pub fn response_quality(responses: &[Response]) -> ResponseQualityStats {
    let total_responses = responses.len();
    let helpful_count = responses
        .iter()
        .filter(|r| r.ai_rating() == AiRating::Helpful)
        .count();
    let helpful_percentage = if total_responses == 0 {
        0.0
    } else {
        round1(helpful_count as f64 / total_responses as f64 * 100.0)
    };
    ResponseQualityStats {
        total_responses,
        helpful_count,
        unhelpful_count: total_responses - helpful_count,
        helpful_percentage,
    }
}

/// Mean hours from creation to close over closed questions, if any.
pub fn avg_resolution_hours(questions: &[Question]) -> Option<f64> {
    let hours: Vec<f64> = questions.iter().filter_map(resolution_hours).collect();
    mean(&hours).map(round1)
}

pub fn category_stats(
    categories: &[Category],
    questions: &[Question],
    responses: &[Response],
) -> Vec<CategoryStats> {
    let mut per_question: HashMap<QuestionId, usize> = HashMap::new();
    for r in responses {
        *per_question.entry(r.question_id).or_default() += 1;
    }

    let mut stats: Vec<CategoryStats> = categories
        .iter()
        .map(|c| {
            let in_category: Vec<&Question> = questions
                .iter()
                .filter(|q| q.category_id == c.id)
                .collect();
            let response_total: usize = in_category
                .iter()
                .map(|q| per_question.get(&q.id).copied().unwrap_or(0))
                .sum();
            let avg_responses = if in_category.is_empty() {
                0.0
            } else {
                round1(response_total as f64 / in_category.len() as f64)
            };
            let hours: Vec<f64> = in_category
                .iter()
                .filter_map(|q| resolution_hours(q))
                .collect();
            CategoryStats {
                category_id: c.id,
                category_name: c.name.clone(),
                question_count: in_category.len(),
                avg_responses_per_question: avg_responses,
                avg_resolution_time_hours: mean(&hours).map(round1),
            }
        })
        .collect();

    stats.sort_by(|a, b| {
        b.question_count
            .cmp(&a.question_count)
            .then_with(|| a.category_name.cmp(&b.category_name))
    });
    stats
}

/// Canonical form of a judge reason used as a clustering key: lowercase,
/// single-spaced, without trailing punctuation.
pub fn normalize_reason(reason: &str) -> String {
    reason
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
        .trim_end_matches(|c: char| c.is_ascii_punctuation())
        .to_string()
}

/// Cluster unhelpful responses by category and normalized reason.
///
/// Each cluster is labelled with the earliest reason text that fell into it.
/// Ordered by count descending, then category and reason, so the same input
/// always yields the same list.
pub fn misconceptions(
    categories: &[Category],
    questions: &[Question],
    responses: &[Response],
    limit: usize,
) -> Vec<Misconception> {
    let category_names: HashMap<CategoryId, &str> = categories
        .iter()
        .map(|c| (c.id, c.name.as_str()))
        .collect();
    let question_category: HashMap<QuestionId, &str> = questions
        .iter()
        .filter_map(|q| category_names.get(&q.category_id).map(|name| (q.id, *name)))
        .collect();

    let mut unhelpful: Vec<&Response> = responses
        .iter()
        .filter(|r| r.ai_rating() == AiRating::Unhelpful)
        .collect();
    unhelpful.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

    let mut clusters: HashMap<(String, String), Misconception> = HashMap::new();
    for r in unhelpful {
        let Some(category) = question_category.get(&r.question_id) else {
            continue;
        };
        let key = normalize_reason(r.outcome().ai_reason());
        if key.is_empty() {
            continue;
        }
        clusters
            .entry((category.to_string(), key))
            .or_insert_with(|| Misconception {
                category_name: category.to_string(),
                misconception: r.outcome().ai_reason().trim().to_string(),
                occurrence_count: 0,
            })
            .occurrence_count += 1;
    }

    let mut ranked: Vec<((String, String), Misconception)> = clusters.into_iter().collect();
    ranked.sort_by(|(ka, a), (kb, b)| {
        b.occurrence_count
            .cmp(&a.occurrence_count)
            .then_with(|| ka.cmp(kb))
    });
    ranked.into_iter().take(limit).map(|(_, m)| m).collect()
}

/// Build the full instructor dashboard.
pub fn dashboard(
    categories: &[Category],
    questions: &[Question],
    responses: &[Response],
    misconception_limit: usize,
) -> Dashboard {
    Dashboard {
        response_quality: response_quality(responses),
        avg_resolution_time_hours: avg_resolution_hours(questions),
        category_stats: category_stats(categories, questions, responses),
        common_misconceptions: misconceptions(categories, questions, responses, misconception_limit),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Guidance, Outcome, ResponseId};
    use crate::traits::{Verdict, VerdictCategory};
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap()
    }

    fn student(id: u64, name: &str, karma: i64) -> User {
        User {
            id: UserId(id),
            name: name.into(),
            role: Role::Student,
            karma,
            created_at: t0(),
        }
    }

    fn question(id: u64, category: u64, status: QuestionStatus, hours_open: Option<i64>) -> Question {
        Question {
            id: QuestionId(id),
            student_id: UserId(1),
            category_id: CategoryId(category),
            title: format!("q{id}"),
            description: "d".into(),
            code_snippet: None,
            status,
            created_at: t0(),
            closed_at: hours_open.map(|h| t0() + Duration::hours(h)),
        }
    }

    fn response(
        id: u64,
        question: u64,
        responder: u64,
        category: VerdictCategory,
        reason: &str,
        minute: i64,
    ) -> Response {
        Response::new(
            ResponseId(id),
            QuestionId(question),
            UserId(responder),
            Guidance {
                concept: "c".into(),
                hint: "h".into(),
                next_step: None,
            },
            Outcome::from_verdict(&Verdict {
                category,
                reason: reason.into(),
            }),
            t0() + Duration::minutes(minute),
        )
    }

    fn categories() -> Vec<Category> {
        vec![
            Category {
                id: CategoryId(10),
                name: "Loops".into(),
            },
            Category {
                id: CategoryId(11),
                name: "Functions".into(),
            },
            Category {
                id: CategoryId(12),
                name: "Variables".into(),
            },
        ]
    }

    #[test]
    fn leaderboard_orders_by_karma_then_first_response() {
        let users = vec![
            student(2, "Rahul", 1),
            student(3, "Sneha", 1),
            student(4, "Vikram", 5),
            student(5, "Priya", 0),
            User {
                role: Role::Instructor,
                ..student(6, "Riya", 0)
            },
        ];
        let responses = vec![
            response(1, 100, 3, VerdictCategory::Helpful, "ok", 1),
            response(2, 100, 2, VerdictCategory::Helpful, "ok", 2),
            response(3, 100, 4, VerdictCategory::Helpful, "ok", 3),
            response(4, 100, 2, VerdictCategory::LowQuality, "vague", 4),
        ];
        let board = leaderboard(&users, &responses);
        let names: Vec<&str> = board.iter().map(|e| e.name.as_str()).collect();
        // Priya never responded; instructors never rank.
        assert_eq!(names, vec!["Vikram", "Sneha", "Rahul"]);
        assert_eq!(board[2].helpful_responses, 1);
        assert_eq!(board[2].unhelpful_responses, 1);
    }

    #[test]
    fn empty_dashboard_has_zero_percentage() {
        let d = dashboard(&categories(), &[], &[], 10);
        assert_eq!(d.response_quality.total_responses, 0);
        assert_eq!(d.response_quality.helpful_percentage, 0.0);
        assert_eq!(d.avg_resolution_time_hours, None);
        assert_eq!(d.category_stats.len(), 3);
        assert!(d.category_stats.iter().all(|c| c.question_count == 0));
        assert!(d.common_misconceptions.is_empty());
    }

    #[test]
    fn helpful_percentage_rounds_to_one_decimal() {
        let responses = vec![
            response(1, 100, 2, VerdictCategory::Helpful, "ok", 1),
            response(2, 100, 2, VerdictCategory::LowQuality, "vague", 2),
            response(3, 100, 2, VerdictCategory::LowQuality, "vague", 3),
        ];
        let q = response_quality(&responses);
        assert_eq!(q.helpful_count, 1);
        assert_eq!(q.unhelpful_count, 2);
        assert_eq!(q.helpful_percentage, 33.3);
    }

    #[test]
    fn resolution_time_counts_closed_questions_only() {
        let questions = vec![
            question(1, 10, QuestionStatus::Closed, Some(2)),
            question(2, 10, QuestionStatus::Closed, Some(5)),
            question(3, 11, QuestionStatus::Escalated, None),
            question(4, 11, QuestionStatus::Open, None),
        ];
        assert_eq!(avg_resolution_hours(&questions), Some(3.5));

        let stats = category_stats(&categories(), &questions, &[]);
        let loops = stats.iter().find(|c| c.category_name == "Loops").unwrap();
        assert_eq!(loops.avg_resolution_time_hours, Some(3.5));
        let functions = stats
            .iter()
            .find(|c| c.category_name == "Functions")
            .unwrap();
        assert_eq!(functions.avg_resolution_time_hours, None);
    }

    #[test]
    fn category_stats_ordering_and_averages() {
        let questions = vec![
            question(1, 11, QuestionStatus::Open, None),
            question(2, 11, QuestionStatus::Open, None),
            question(3, 10, QuestionStatus::Open, None),
        ];
        let responses = vec![
            response(1, 1, 2, VerdictCategory::Helpful, "ok", 1),
            response(2, 1, 3, VerdictCategory::LowQuality, "vague", 2),
            response(3, 2, 2, VerdictCategory::Helpful, "ok", 3),
        ];
        let stats = category_stats(&categories(), &questions, &responses);
        let names: Vec<&str> = stats.iter().map(|c| c.category_name.as_str()).collect();
        assert_eq!(names, vec!["Functions", "Loops", "Variables"]);
        assert_eq!(stats[0].avg_responses_per_question, 1.5);
        assert_eq!(stats[1].avg_responses_per_question, 0.0);
    }

    #[test]
    fn reason_normalization() {
        assert_eq!(
            normalize_reason("  Response is TOO brief\tto be helpful. "),
            "response is too brief to be helpful"
        );
        assert_eq!(normalize_reason("..."), "");
    }

    #[test]
    fn misconceptions_cluster_deterministically() {
        let questions = vec![
            question(1, 10, QuestionStatus::Open, None),
            question(2, 11, QuestionStatus::Open, None),
        ];
        let responses = vec![
            response(1, 1, 2, VerdictCategory::LowQuality, "Too brief.", 1),
            response(2, 1, 3, VerdictCategory::LowQuality, "too  brief", 2),
            response(3, 1, 4, VerdictCategory::HarmfulOrDirectAnswer, "Gives the code", 3),
            response(4, 2, 2, VerdictCategory::LowQuality, "Too brief.", 4),
            response(5, 2, 2, VerdictCategory::Helpful, "Too brief.", 5),
        ];
        let clusters = misconceptions(&categories(), &questions, &responses, 10);
        assert_eq!(clusters.len(), 3);
        assert_eq!(clusters[0].category_name, "Loops");
        assert_eq!(clusters[0].misconception, "Too brief.");
        assert_eq!(clusters[0].occurrence_count, 2);
        // ties on count fall back to (category, reason)
        assert_eq!(clusters[1].category_name, "Functions");
        assert_eq!(clusters[2].misconception, "Gives the code");

        let mut shuffled = responses.clone();
        shuffled.reverse();
        assert_eq!(
            misconceptions(&categories(), &questions, &shuffled, 10),
            clusters
        );
        assert_eq!(misconceptions(&categories(), &questions, &responses, 1).len(), 1);
    }
}
