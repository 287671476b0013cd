//! Karma ledger.
//!
//! Karma is adjusted incrementally, one response outcome at a time. A full
//! recomputation from response history exists only for reconciliation and
//! must always agree with the incremental total.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::ForumError;
use crate::model::{Response, Role, User, UserId};
use crate::traits::ForumStore;

/// Compute `user`'s karma after `delta`, rejecting instructors and overflow.
pub fn checked_apply(user: &User, delta: i64) -> Result<i64, ForumError> {
    if user.role != Role::Student && delta != 0 {
        return Err(ForumError::Forbidden(format!(
            "{} is an instructor and does not accrue karma",
            user.name
        )));
    }
    user.karma.checked_add(delta).ok_or_else(|| {
        ForumError::ValidationFailed(format!("karma overflow for user {}", user.id))
    })
}

/// Sum of the karma awarded across `responses`.
pub fn sum_awarded<'a>(responses: impl IntoIterator<Item = &'a Response>) -> i64 {
    responses.into_iter().map(Response::karma_awarded).sum()
}

/// Stored vs. recomputed karma for one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reconciliation {
    pub user_id: UserId,
    pub name: String,
    pub stored: i64,
    pub recomputed: i64,
}

impl Reconciliation {
    pub fn is_consistent(&self) -> bool {
        self.stored == self.recomputed
    }
}

/// Maintains each student's running karma total.
#[derive(Clone)]
pub struct KarmaLedger {
    store: Arc<dyn ForumStore>,
}

impl KarmaLedger {
    pub fn new(store: Arc<dyn ForumStore>) -> Self {
        Self { store }
    }

    /// Atomically add `delta` to a user's karma; returns the new total.
    pub async fn apply_delta(&self, user: UserId, delta: i64) -> Result<i64, ForumError> {
        let total = self.store.apply_karma(user, delta).await?;
        tracing::debug!(user = %user, delta, total, "karma adjusted");
        Ok(total)
    }

    /// Recompute a user's karma from their response history.
    pub async fn recompute(&self, user: UserId) -> Result<i64, ForumError> {
        if self.store.user(user).await.is_none() {
            return Err(ForumError::not_found("user", user));
        }
        Ok(sum_awarded(&self.store.responses_by(user).await))
    }

    pub async fn reconcile(&self, user: UserId) -> Result<Reconciliation, ForumError> {
        let record = self
            .store
            .user(user)
            .await
            .ok_or_else(|| ForumError::not_found("user", user))?;
        let recomputed = sum_awarded(&self.store.responses_by(user).await);
        Ok(Reconciliation {
            user_id: record.id,
            name: record.name,
            stored: record.karma,
            recomputed,
        })
    }

    /// Every student whose stored karma disagrees with their history.
    pub async fn reconcile_all(&self) -> Vec<Reconciliation> {
        let responses = self.store.responses().await;
        let mut diverging = Vec::new();
        for user in self.store.users().await {
            if user.role != Role::Student {
                continue;
            }
            let recomputed =
                sum_awarded(responses.iter().filter(|r| r.responder_id == user.id));
            if recomputed != user.karma {
                tracing::warn!(
                    user = %user.id,
                    stored = user.karma,
                    recomputed,
                    "karma diverges from response history"
                );
                diverging.push(Reconciliation {
                    user_id: user.id,
                    name: user.name,
                    stored: user.karma,
                    recomputed,
                });
            }
        }
        diverging
    }
}
