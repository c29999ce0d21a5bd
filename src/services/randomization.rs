use rand::rngs::StdRng;
use rand::{seq::SliceRandom, SeedableRng};

use crate::schemas::quiz::Question;

/// A question order drawn for one attempt-open event.
#[derive(Debug, Clone)]
pub struct ShuffledQuestions {
    pub seed: u64,
    pub questions: Vec<Question>,
}

/// Shuffles questions and, within each question, its alternatives.
///
/// A fresh seed is drawn on every call; a reopened attempt therefore gets a
/// new order unless the caller replays the recorded seed through
/// [`shuffle_with_seed`].
pub fn shuffle_for_attempt(questions: Vec<Question>) -> ShuffledQuestions {
    let seed = rand::random::<u64>();
    ShuffledQuestions { seed, questions: shuffle_with_seed(questions, seed) }
}

pub fn shuffle_with_seed(mut questions: Vec<Question>, seed: u64) -> Vec<Question> {
    let mut rng = StdRng::seed_from_u64(seed);
    questions.shuffle(&mut rng);
    for question in &mut questions {
        question.alternatives.shuffle(&mut rng);
    }
    questions
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeSet, HashMap};

    use super::*;
    use crate::test_support;

    fn ids(questions: &[Question]) -> BTreeSet<i64> {
        questions.iter().map(|question| question.id).collect()
    }

    #[test]
    fn shuffle_is_a_permutation_of_questions_and_alternatives() {
        for size in [0usize, 1, 2, 5, 17] {
            let original = test_support::questions(size, 4);
            let shuffled = shuffle_for_attempt(original.clone()).questions;

            assert_eq!(shuffled.len(), original.len());
            assert_eq!(ids(&shuffled), ids(&original));

            let by_id: HashMap<i64, &Question> =
                original.iter().map(|question| (question.id, question)).collect();
            for question in &shuffled {
                let source = by_id[&question.id];
                assert_eq!(question.alternatives.len(), source.alternatives.len());
                let mut got: Vec<i64> = question.alternatives.iter().map(|a| a.id).collect();
                let mut want: Vec<i64> = source.alternatives.iter().map(|a| a.id).collect();
                got.sort_unstable();
                want.sort_unstable();
                assert_eq!(got, want);
                assert_eq!(question.statement, source.statement);
            }
        }
    }

    #[test]
    fn same_seed_replays_same_order() {
        let original = test_support::questions(8, 5);
        let first = shuffle_with_seed(original.clone(), 1234);
        let second = shuffle_with_seed(original, 1234);
        assert_eq!(first, second);
    }

    #[test]
    fn shuffle_reaches_more_than_one_order() {
        let original = test_support::questions(6, 2);
        let orders: BTreeSet<Vec<i64>> = (0..32u64)
            .map(|seed| {
                shuffle_with_seed(original.clone(), seed).iter().map(|q| q.id).collect()
            })
            .collect();
        assert!(orders.len() > 1);
    }
}
