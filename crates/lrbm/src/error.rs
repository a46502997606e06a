//! Error taxonomy for the evaluation protocol.

/// Errors surfaced by the partitioner, control-set generator, evaluators and
/// the training orchestrator.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    /// Split fractions violate `0 < validation`, `0 < test`, `validation + test < 1`.
    #[error("invalid split fractions: validation={validation}, test={test} (need both > 0 and validation + test < 1)")]
    InvalidSplitFraction { validation: f64, test: f64 },
    /// A sentence-completion group with zero candidates.
    #[error("candidate group {group} has no candidates")]
    EmptyCandidateGroup { group: usize },
    /// The number of answers does not match the number of candidate groups.
    #[error("{groups} candidate groups but {answers} answers")]
    AnswerCountMismatch { groups: usize, answers: usize },
    /// A sampling distribution that is not a probability vector over the vocabulary.
    #[error("invalid sampling distribution: {0}")]
    InvalidDistribution(String),
    /// Orchestrator parameters out of range.
    #[error("invalid training config: {0}")]
    InvalidConfig(String),
    /// `Orchestrator::run` called on an orchestrator that has already left `Idle`.
    #[error("orchestrator already started (state: {0})")]
    AlreadyStarted(String),
    /// Failure inside the model collaborator, propagated unmodified.
    #[error(transparent)]
    Model(#[from] anyhow::Error),
}
