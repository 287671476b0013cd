//! Mock judge for testing.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use peerhelp_core::error::JudgeError;
use peerhelp_core::traits::{Judge, JudgeRequest, Verdict, VerdictCategory};

/// What the mock does on one call.
#[derive(Debug, Clone)]
pub enum MockReply {
    Verdict(Verdict),
    /// Fail with a malformed-verdict error carrying this text.
    Fail(String),
}

/// A scriptable judge for exercising the engine without real API calls.
///
/// Replies come from, in order: the queued script, the earliest registered
/// hint keyword that matches, then the default reply. An optional delay is applied to
/// every call before it answers.
pub struct MockJudge {
    /// Hint substring → reply, in registration order.
    keywords: Vec<(String, MockReply)>,
    script: Mutex<VecDeque<MockReply>>,
    default_reply: MockReply,
    delay: Option<Duration>,
    /// Number of calls made.
    call_count: AtomicU32,
    /// Last request received.
    last_request: Mutex<Option<JudgeRequest>>,
}

impl MockJudge {
    fn with_default(default_reply: MockReply) -> Self {
        Self {
            keywords: Vec::new(),
            script: Mutex::new(VecDeque::new()),
            default_reply,
            delay: None,
            call_count: AtomicU32::new(0),
            last_request: Mutex::new(None),
        }
    }

    /// A judge that always returns `category` with `reason`.
    pub fn always(category: VerdictCategory, reason: &str) -> Self {
        Self::with_default(MockReply::Verdict(Verdict {
            category,
            reason: reason.to_string(),
        }))
    }

    pub fn helpful() -> Self {
        Self::always(VerdictCategory::Helpful, "Guides without giving the answer.")
    }

    /// A judge whose every call fails.
    pub fn failing(message: &str) -> Self {
        Self::with_default(MockReply::Fail(message.to_string()))
    }

    /// Reply with `category` whenever the hint contains `keyword`.
    ///
    /// Re-registering a keyword replaces its reply but keeps its position.
    pub fn on_hint(mut self, keyword: &str, category: VerdictCategory, reason: &str) -> Self {
        let reply = MockReply::Verdict(Verdict {
            category,
            reason: reason.to_string(),
        });
        match self.keywords.iter_mut().find(|(key, _)| key == keyword) {
            Some((_, existing)) => *existing = reply,
            None => self.keywords.push((keyword.to_string(), reply)),
        }
        self
    }

    /// Wait `delay` before answering each call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queue a one-shot reply ahead of the keyword and default replies.
    pub fn push(&self, reply: MockReply) {
        self.script.lock().unwrap_or_else(PoisonError::into_inner).push_back(reply);
    }

    /// Get the number of calls made to this judge.
    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }

    /// Get the last request made to this judge.
    pub fn last_request(&self) -> Option<JudgeRequest> {
        self.last_request.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn next_reply(&self, request: &JudgeRequest) -> MockReply {
        if let Some(reply) = self.script.lock().unwrap_or_else(PoisonError::into_inner).pop_front() {
            return reply;
        }
        self.keywords
            .iter()
            .find(|(key, _)| request.hint.contains(key.as_str()))
            .map(|(_, reply)| reply.clone())
            .unwrap_or_else(|| self.default_reply.clone())
    }
}

#[async_trait]
impl Judge for MockJudge {
    fn name(&self) -> &str {
        "mock"
    }

    async fn evaluate(&self, request: &JudgeRequest) -> anyhow::Result<Verdict> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        *self.last_request.lock().unwrap_or_else(PoisonError::into_inner) = Some(request.clone());
        let reply = self.next_reply(request);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match reply {
            MockReply::Verdict(verdict) => Ok(verdict),
            MockReply::Fail(message) => Err(JudgeError::MalformedVerdict(message).into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(hint: &str) -> JudgeRequest {
        JudgeRequest {
            question_title: "t".into(),
            question_description: "d".into(),
            code_snippet: None,
            category: "Loops".into(),
            concept: "c".into(),
            hint: hint.into(),
            next_step: None,
        }
    }

    #[tokio::test]
    async fn fixed_reply() {
        let judge = MockJudge::helpful();
        let verdict = judge.evaluate(&request("anything")).await.unwrap();
        assert_eq!(verdict.category, VerdictCategory::Helpful);
        assert_eq!(judge.call_count(), 1);
        assert_eq!(judge.last_request().unwrap().hint, "anything");
    }

    #[tokio::test]
    async fn script_then_keywords_then_default() {
        let judge = MockJudge::helpful().on_hint(
            "for i in",
            VerdictCategory::HarmfulOrDirectAnswer,
            "Gives the loop away.",
        );
        judge.push(MockReply::Fail("judge offline".into()));

        let err = judge.evaluate(&request("for i in xs")).await.unwrap_err();
        assert!(err.to_string().contains("judge offline"));

        let v = judge.evaluate(&request("for i in xs")).await.unwrap();
        assert_eq!(v.category, VerdictCategory::HarmfulOrDirectAnswer);

        let v = judge.evaluate(&request("think about it")).await.unwrap();
        assert_eq!(v.category, VerdictCategory::Helpful);
        assert_eq!(judge.call_count(), 3);
    }

    #[tokio::test]
    async fn earliest_matching_keyword_wins() {
        let judge = MockJudge::helpful()
            .on_hint("print", VerdictCategory::HarmfulOrDirectAnswer, "first")
            .on_hint("loop", VerdictCategory::LowQuality, "second")
            .on_hint("range", VerdictCategory::LowQuality, "third");

        for _ in 0..20 {
            let v = judge
                .evaluate(&request("use range in the loop and print it"))
                .await
                .unwrap();
            assert_eq!(v.reason, "first");
        }

        let judge = judge.on_hint("print", VerdictCategory::Helpful, "replaced");
        let v = judge.evaluate(&request("loop then print")).await.unwrap();
        assert_eq!(v.reason, "replaced");
    }

    #[tokio::test(start_paused = true)]
    async fn delay_is_applied() {
        let judge = MockJudge::helpful().with_delay(Duration::from_secs(10));
        let start = tokio::time::Instant::now();
        judge.evaluate(&request("x")).await.unwrap();
        assert!(start.elapsed() >= Duration::from_secs(10));
    }
}
