use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

use peerhelp_core::analytics;
use peerhelp_core::model::{NewQuestion, Role};
use peerhelp_core::store::ForumSnapshot;
use peerhelp_core::{
    Forum, ForumConfig, Judge, JudgeRequest, MemoryStore, Submission, Verdict, VerdictCategory,
};

/// Cycles through the three verdicts with a handful of repeated reasons.
struct CyclingJudge(AtomicUsize);

#[async_trait]
impl Judge for CyclingJudge {
    fn name(&self) -> &str {
        "cycling"
    }

    async fn evaluate(&self, _: &JudgeRequest) -> anyhow::Result<Verdict> {
        let n = self.0.fetch_add(1, Ordering::Relaxed);
        let (category, reason) = match n % 3 {
            0 => (VerdictCategory::Helpful, "Guides without answering."),
            1 => (VerdictCategory::LowQuality, "Too brief to be helpful."),
            _ => (
                VerdictCategory::HarmfulOrDirectAnswer,
                ["Gives the full loop.", "Pastes the fixed function.", "Writes the code for them."]
                    [n % 3],
            ),
        };
        Ok(Verdict {
            category,
            reason: reason.to_string(),
        })
    }
}

fn build_history(questions_per_student: usize) -> ForumSnapshot {
    let runtime = tokio::runtime::Runtime::new().expect("runtime");
    runtime.block_on(async {
        let store = Arc::new(MemoryStore::new());
        let forum = Forum::new(
            store.clone(),
            Arc::new(CyclingJudge(AtomicUsize::new(0))),
            ForumConfig::default(),
        );
        forum.seed_defaults().await.expect("seed");
        let students: Vec<_> = forum
            .users()
            .await
            .into_iter()
            .filter(|u| u.role == Role::Student)
            .collect();
        let categories = forum.categories().await;

        for (i, owner) in students.iter().enumerate() {
            for j in 0..questions_per_student {
                let category = &categories[(i + j) % categories.len()];
                let question = forum
                    .post_question(
                        owner.id,
                        NewQuestion {
                            category_id: category.id,
                            title: format!("question {i}-{j}"),
                            description: "why does this fail?".into(),
                            code_snippet: None,
                        },
                    )
                    .await
                    .expect("post");
                for peer in students.iter().filter(|s| s.id != owner.id) {
                    forum
                        .submit_response(Submission {
                            question_id: question.id,
                            responder_id: peer.id,
                            concept: category.name.clone(),
                            hint: "look at what the loop does on its last pass".into(),
                            next_step: None,
                        })
                        .await
                        .expect("submit");
                }
            }
        }
        store.snapshot()
    })
}

fn bench_dashboard(c: &mut Criterion) {
    let mut group = c.benchmark_group("analytics");

    for size in [5, 50] {
        let history = build_history(size);
        group.bench_function(format!("dashboard_{size}"), |b| {
            b.iter(|| {
                analytics::dashboard(
                    black_box(&history.categories),
                    black_box(&history.questions),
                    black_box(&history.responses),
                    10,
                )
            })
        });
        group.bench_function(format!("leaderboard_{size}"), |b| {
            b.iter(|| analytics::leaderboard(black_box(&history.users), black_box(&history.responses)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_dashboard);
criterion_main!(benches);
