//! Grade appeals
//!
//! A learner can appeal a question's grading once; closing the appeal is
//! terminal. Appeals surface in session views from the reviewing step on.

use chrono::{DateTime, Utc};

use crate::error::{CoreError, CourseError};
use crate::record::Appeal;
use crate::store::{Store, StoreError};

/// File an appeal against one question's grading. One per
/// (question, learner), enforced at insert time.
pub async fn create_appeal(
    store: &dyn Store,
    learner_id: &str,
    question_id: u64,
    explanation: String,
    now: DateTime<Utc>,
) -> Result<Appeal, CoreError> {
    let appeal = Appeal {
        id: 0,
        question_id,
        learner_id: learner_id.to_string(),
        explanation,
        review: String::new(),
        closed_at: None,
        created_at: now,
    };

    match store.insert_appeal(appeal).await {
        Ok(appeal) => Ok(appeal),
        Err(StoreError::Conflict { .. }) => Err(CourseError::AppealExists.into()),
        Err(other) => Err(other.into()),
    }
}

/// Close an appeal. The closed timestamp is terminal: closing an already
/// closed appeal keeps the original timestamp.
pub async fn close_appeal(store: &dyn Store, id: u64, now: DateTime<Utc>) -> Result<(), CoreError> {
    store.close_appeal(id, now).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn one_appeal_per_question_and_learner() {
        let store = MemoryStore::new();
        let now = Utc::now();

        create_appeal(&store, "u1", 7, "wrong key".to_string(), now)
            .await
            .unwrap();

        let result = create_appeal(&store, "u1", 7, "again".to_string(), now).await;
        assert!(matches!(
            result,
            Err(CoreError::Course(CourseError::AppealExists))
        ));

        // A different learner can appeal the same question.
        create_appeal(&store, "u2", 7, "me too".to_string(), now)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn closing_is_terminal() {
        let store = MemoryStore::new();
        let t1 = Utc::now();
        let appeal = create_appeal(&store, "u1", 7, "why".to_string(), t1)
            .await
            .unwrap();

        close_appeal(&store, appeal.id, t1).await.unwrap();
        let t2 = t1 + chrono::Duration::seconds(60);
        close_appeal(&store, appeal.id, t2).await.unwrap();

        let appeals = store.appeals_for("u1", &[7]).await.unwrap();
        assert_eq!(appeals[0].closed_at, Some(t1));
    }
}
