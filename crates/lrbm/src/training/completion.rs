//! Multiple-choice sentence-completion accuracy.
//!
//! Each candidate sentence is scored by the sum of `ln u` over its n-grams,
//! where `u` is the model's un-normalized score. The prediction for a group
//! is the arg-max candidate; exact ties go to the lowest index.

use corpus::{NgramMatrix, SentenceChallenge};

use crate::error::HarnessError;
use crate::model::EnergyModel;
use crate::training::trace::TrainingTrace;
use crate::training::trainer::TrainingCallback;

/// Index of the largest score; the first index wins ties.
///
/// NaN scores are treated as `-inf`. Returns `None` for an empty slice.
pub fn argmax_first(scores: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &s) in scores.iter().enumerate() {
        let s = if s.is_nan() { f64::NEG_INFINITY } else { s };
        match best {
            Some((_, b)) if s <= b => {}
            _ => best = Some((i, s)),
        }
    }
    best.map(|(i, _)| i)
}

/// Sum of `ln u` over the n-grams of one candidate.
pub fn candidate_log_score(model: &dyn EnergyModel, candidate: &NgramMatrix) -> anyhow::Result<f64> {
    if candidate.is_empty() {
        return Ok(0.0);
    }
    let log_scores = model.log_score_unnormalized(candidate)?;
    if log_scores.len() != candidate.len() {
        anyhow::bail!("model returned {} scores for {} n-grams", log_scores.len(), candidate.len());
    }
    Ok(log_scores.iter().sum())
}

/// Predicted candidate index for every group.
pub fn predict(model: &dyn EnergyModel, groups: &[Vec<NgramMatrix>]) -> Result<Vec<usize>, HarnessError> {
    groups
        .iter()
        .enumerate()
        .map(|(g, group)| {
            let scores = group
                .iter()
                .map(|candidate| candidate_log_score(model, candidate))
                .collect::<anyhow::Result<Vec<f64>>>()?;
            argmax_first(&scores).ok_or(HarnessError::EmptyCandidateGroup { group: g })
        })
        .collect()
}

/// Fraction of groups whose prediction equals the known answer.
///
/// Zero groups score 0.
pub fn evaluate(
    model: &dyn EnergyModel,
    groups: &[Vec<NgramMatrix>],
    answers: &[usize],
) -> Result<f64, HarnessError> {
    if groups.len() != answers.len() {
        return Err(HarnessError::AnswerCountMismatch {
            groups: groups.len(),
            answers: answers.len(),
        });
    }
    if let Some(g) = groups.iter().position(|group| group.is_empty()) {
        return Err(HarnessError::EmptyCandidateGroup { group: g });
    }
    if groups.is_empty() {
        tracing::warn!("Sentence-completion challenge has no groups");
        return Ok(0.0);
    }

    let predictions = predict(model, groups)?;
    let correct = predictions.iter().zip(answers).filter(|(p, a)| p == a).count();
    Ok(correct as f64 / groups.len() as f64)
}

/// Epoch callback recording sentence-completion accuracy.
#[derive(Debug, Clone)]
pub struct SentenceCompletionEvaluator {
    challenge: SentenceChallenge,
}

impl SentenceCompletionEvaluator {
    pub fn new(challenge: SentenceChallenge) -> Self {
        Self { challenge }
    }

    pub fn challenge(&self) -> &SentenceChallenge {
        &self.challenge
    }

    pub fn accuracy(&self, model: &dyn EnergyModel) -> Result<f64, HarnessError> {
        evaluate(model, &self.challenge.groups, &self.challenge.answers)
    }
}

impl TrainingCallback for SentenceCompletionEvaluator {
    fn name(&self) -> &str {
        "sentence_completion"
    }

    fn on_epoch(&mut self, model: &dyn EnergyModel, trace: &mut TrainingTrace, epoch: usize) -> anyhow::Result<()> {
        let accuracy = self.accuracy(model)?;
        trace.push_sentence_completion(epoch, accuracy);
        tracing::info!(epoch, accuracy, groups = self.challenge.len(), "Sentence completion");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::MockModel;

    fn candidate(word: u32) -> NgramMatrix {
        NgramMatrix::from_rows(&[vec![word, 1], vec![2, word]]).unwrap()
    }

    #[test]
    fn test_argmax_first() {
        assert_eq!(argmax_first(&[]), None);
        assert_eq!(argmax_first(&[1.0, 3.0, 2.0]), Some(1));
        assert_eq!(argmax_first(&[2.0, 2.0]), Some(0));
        assert_eq!(argmax_first(&[1.0, 5.0, 5.0]), Some(1));
        assert_eq!(argmax_first(&[f64::NAN, 1.0]), Some(1));
        assert_eq!(argmax_first(&[f64::NAN, f64::NAN]), Some(0));
        assert_eq!(argmax_first(&[f64::NEG_INFINITY, f64::NEG_INFINITY]), Some(0));
    }

    #[test]
    fn test_candidate_score_sums_logs() {
        let model = MockModel::new().with_unnormalized(|r| if r[0] == 7 { 2.0 } else { 3.0 });
        let score = candidate_log_score(&model, &candidate(7)).unwrap();
        assert!((score - (2.0_f64.ln() + 3.0_f64.ln())).abs() < 1e-12);
        assert_eq!(candidate_log_score(&model, &NgramMatrix::empty(2).unwrap()).unwrap(), 0.0);
    }

    #[test]
    fn test_huge_scores_still_rank() {
        // exp(900) is inf; ranking must use the log scores.
        let model = MockModel::new().with_log_unnormalized(|r| if r[0] == 4 { 901.0 } else { 900.0 });
        let groups = vec![vec![candidate(3), candidate(4)], vec![candidate(4), candidate(5)]];
        let score = candidate_log_score(&model, &candidate(4)).unwrap();
        assert!((score - 1801.0).abs() < 1e-9);
        assert_eq!(predict(&model, &groups).unwrap(), vec![1, 0]);
    }

    #[test]
    fn test_equal_scores_pick_first() {
        let model = MockModel::new();
        let groups = vec![vec![candidate(3), candidate(4)]];
        assert_eq!(predict(&model, &groups).unwrap(), vec![0]);
        assert_eq!(evaluate(&model, &groups, &[0]).unwrap(), 1.0);
        assert_eq!(evaluate(&model, &groups, &[1]).unwrap(), 0.0);
    }

    #[test]
    fn test_empty_group_is_an_error() {
        let model = MockModel::new();
        let groups = vec![vec![candidate(1)], vec![]];
        let err = evaluate(&model, &groups, &[0, 0]).unwrap_err();
        assert!(matches!(err, HarnessError::EmptyCandidateGroup { group: 1 }));
        // Nothing is scored before the malformed group is reported.
        assert_eq!(model.unnormalized_calls(), 0);
    }

    #[test]
    fn test_answer_count_mismatch() {
        let model = MockModel::new();
        let err = evaluate(&model, &[vec![candidate(1)]], &[0, 1]).unwrap_err();
        assert!(matches!(err, HarnessError::AnswerCountMismatch { groups: 1, answers: 2 }));
    }

    #[test]
    fn test_model_failure_is_passed_through() {
        let model = MockModel::new().failing_on_scoring();
        let err = evaluate(&model, &[vec![candidate(1)]], &[0]).unwrap_err();
        assert!(matches!(err, HarnessError::Model(_)));
        assert!(err.to_string().contains("mock scoring failure"));
    }

    #[test]
    fn test_callback_records_epoch() {
        let challenge = SentenceChallenge {
            vocab_size: 10,
            groups: vec![vec![candidate(1), candidate(2)]],
            answers: vec![1],
        };
        let mut evaluator = SentenceCompletionEvaluator::new(challenge);
        let model = MockModel::new().with_unnormalized(|r| if r[0] == 2 && r[1] == 2 { 5.0 } else { 1.0 });
        let mut trace = TrainingTrace::new();
        evaluator.on_epoch(&model, &mut trace, 3).unwrap();
        assert_eq!(trace.sentence_completion().len(), 1);
        assert_eq!(trace.sentence_completion()[0].epoch, 3);
        assert_eq!(trace.sentence_completion()[0].value, 1.0);
    }
}
