//! Question bank access
//!
//! The engine only reads from the bank. Storage and admin editing live
//! elsewhere; this module defines the seam and ships an in-memory bank.

mod memory;

use async_trait::async_trait;
use std::collections::HashSet;
use std::time::Duration;

pub use memory::InMemoryQuestionStore;

use crate::types::{Question, QuestionId};

pub type StoreResult<T> = Result<T, QuestionStoreError>;

#[derive(Debug, thiserror::Error)]
pub enum QuestionStoreError {
    #[error("Failed to read question bank: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse question bank: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid question {id}: {reason}")]
    InvalidQuestion { id: String, reason: String },

    #[error("Question store backend failed: {0}")]
    Backend(String),

    #[error("Question store timed out after {0:?}")]
    Timeout(Duration),
}

/// Read-only provider of questions
#[async_trait]
pub trait QuestionStore: Send + Sync {
    /// A random question whose id is not in `exclude_ids`, drawn from the
    /// Fast Money pool when `fast_money` is set and the main-round pool
    /// otherwise
    async fn get_random_question(
        &self,
        exclude_ids: &HashSet<QuestionId>,
        fast_money: bool,
    ) -> StoreResult<Option<Question>>;

    async fn get_question_by_id(&self, id: &str) -> StoreResult<Option<Question>>;

    /// Number of questions in one pool
    async fn count(&self, fast_money: bool) -> StoreResult<usize>;
}

/// Run a store call with an upper bound on how long it may take
pub async fn fetch_with_timeout<T, F>(timeout: Duration, fut: F) -> StoreResult<T>
where
    F: std::future::Future<Output = StoreResult<T>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(QuestionStoreError::Timeout(timeout)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SlowStore;

    #[async_trait]
    impl QuestionStore for SlowStore {
        async fn get_random_question(
            &self,
            _exclude_ids: &HashSet<QuestionId>,
            _fast_money: bool,
        ) -> StoreResult<Option<Question>> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(None)
        }

        async fn get_question_by_id(&self, _id: &str) -> StoreResult<Option<Question>> {
            Ok(None)
        }

        async fn count(&self, _fast_money: bool) -> StoreResult<usize> {
            Ok(0)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_times_out() {
        let store = SlowStore;
        let exclude = HashSet::new();
        let result = fetch_with_timeout(
            Duration::from_millis(200),
            store.get_random_question(&exclude, false),
        )
        .await;
        assert!(matches!(result, Err(QuestionStoreError::Timeout(_))));
    }
}
