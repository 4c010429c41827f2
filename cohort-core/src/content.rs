//! Item content selection
//!
//! Exams compose a randomized set from the pool's per-format composition;
//! assignments and discussions draw a single random question.

use rand::seq::SliceRandom;

use crate::error::AttemptError;
use crate::record::{Question, QuestionPool};

/// Compose an exam question set: for each format in the pool's composition,
/// shuffle that format's questions, take the requested count, and keep the
/// picked ids in ascending order.
pub fn compose_exam_set(pool: &QuestionPool, questions: &[Question]) -> Vec<u64> {
    let mut rng = rand::thread_rng();
    let mut selected = Vec::new();

    for (format, count) in &pool.composition {
        let mut ids: Vec<u64> = questions
            .iter()
            .filter(|q| q.format == *format)
            .map(|q| q.id)
            .collect();
        ids.shuffle(&mut rng);
        ids.truncate(*count);
        ids.sort_unstable();
        selected.extend(ids);
    }

    selected
}

/// Draw one random question from the pool.
pub fn draw_question(questions: &[Question]) -> Result<Question, AttemptError> {
    let mut rng = rand::thread_rng();
    questions
        .choose(&mut rng)
        .cloned()
        .ok_or(AttemptError::PoolEmpty)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use cohort_models::QuestionFormat;

    use super::*;

    fn question(id: u64, format: QuestionFormat) -> Question {
        Question {
            id,
            pool_id: "p1".to_string(),
            format,
            text: format!("q{id}"),
            supplement: String::new(),
            options: vec![],
            point: 1,
            rubric: vec![],
            requirements: None,
            attachment_file_count: 0,
        }
    }

    fn pool(composition: BTreeMap<QuestionFormat, usize>) -> QuestionPool {
        QuestionPool {
            id: "p1".to_string(),
            title: "Pool".to_string(),
            composition,
        }
    }

    #[test]
    fn composition_takes_requested_counts_per_format() {
        let questions: Vec<Question> = (1..=6)
            .map(|id| question(id, QuestionFormat::SingleChoice))
            .chain((7..=9).map(|id| question(id, QuestionFormat::Essay)))
            .collect();
        let pool = pool(BTreeMap::from([
            (QuestionFormat::SingleChoice, 2),
            (QuestionFormat::Essay, 1),
        ]));

        let set = compose_exam_set(&pool, &questions);
        assert_eq!(set.len(), 3);

        let choice: Vec<u64> = set.iter().copied().filter(|id| *id <= 6).collect();
        let essay: Vec<u64> = set.iter().copied().filter(|id| *id >= 7).collect();
        assert_eq!(choice.len(), 2);
        assert_eq!(essay.len(), 1);
    }

    #[test]
    fn composition_keeps_ascending_order_within_format() {
        let questions: Vec<Question> = (1..=20)
            .map(|id| question(id, QuestionFormat::TextInput))
            .collect();
        let pool = pool(BTreeMap::from([(QuestionFormat::TextInput, 5)]));

        let set = compose_exam_set(&pool, &questions);
        let mut sorted = set.clone();
        sorted.sort_unstable();
        assert_eq!(set, sorted);
    }

    #[test]
    fn composition_caps_at_available_questions() {
        let questions = vec![question(1, QuestionFormat::NumberInput)];
        let pool = pool(BTreeMap::from([(QuestionFormat::NumberInput, 10)]));

        let set = compose_exam_set(&pool, &questions);
        assert_eq!(set, vec![1]);
    }

    #[test]
    fn draw_picks_one_of_the_questions() {
        let questions = vec![
            question(1, QuestionFormat::Essay),
            question(2, QuestionFormat::Essay),
        ];
        let drawn = draw_question(&questions).unwrap();
        assert!(drawn.id == 1 || drawn.id == 2);
    }

    #[test]
    fn draw_from_empty_pool_fails() {
        let result = draw_question(&[]);
        assert!(matches!(result, Err(AttemptError::PoolEmpty)));
    }
}
