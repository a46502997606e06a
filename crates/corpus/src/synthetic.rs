//! Seeded synthetic corpora for demos and end-to-end tests.
//!
//! Sentences are drawn from a sparse first-order Markov chain: every word has
//! `branching` preferred successors taken with probability `1 - noise`, and a
//! uniformly random successor otherwise. The matching challenge blanks one
//! position of a fresh sentence and offers the true word alongside random
//! distractors, so a model that has learned the chain beats chance.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::types::{NgramMatrix, SentenceChallenge};

/// Parameters for [`generate`].
#[derive(Debug, Clone)]
pub struct SyntheticConfig {
    /// N-gram order.
    pub n: usize,
    /// Vocabulary size.
    pub vocab_size: usize,
    /// Number of training sentences.
    pub sentences: usize,
    /// Tokens per sentence (must be >= n).
    pub sentence_len: usize,
    /// Number of challenge groups.
    pub groups: usize,
    /// Candidates per challenge group (must be >= 2).
    pub candidates: usize,
    /// Preferred successors per word.
    pub branching: usize,
    /// Probability of leaving the preferred successors.
    pub noise: f64,
    /// RNG seed.
    pub seed: u64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            n: 4,
            vocab_size: 50,
            sentences: 500,
            sentence_len: 12,
            groups: 40,
            candidates: 5,
            branching: 3,
            noise: 0.1,
            seed: 12345,
        }
    }
}

/// A generated n-gram corpus with its sentence-completion challenge.
#[derive(Debug, Clone)]
pub struct SyntheticCorpus {
    /// Training n-grams extracted from all sentences.
    pub ngrams: NgramMatrix,
    /// Multiple-choice challenge over held-out sentences.
    pub challenge: SentenceChallenge,
}

/// Generate a synthetic corpus.
pub fn generate(config: &SyntheticConfig) -> anyhow::Result<SyntheticCorpus> {
    if config.n == 0 || config.sentence_len < config.n {
        anyhow::bail!(
            "sentence_len ({}) must be >= n ({}) and n > 0",
            config.sentence_len,
            config.n
        );
    }
    if config.candidates < 2 {
        anyhow::bail!("a challenge group needs at least 2 candidates");
    }
    if config.vocab_size < config.candidates || config.branching == 0 {
        anyhow::bail!("vocab_size must be >= candidates and branching > 0");
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let successors: Vec<Vec<u32>> = (0..config.vocab_size)
        .map(|_| {
            (0..config.branching)
                .map(|_| rng.gen_range(0..config.vocab_size as u32))
                .collect()
        })
        .collect();

    let mut data = Vec::new();
    for _ in 0..config.sentences {
        let sentence = sample_sentence(config, &successors, &mut rng);
        data.extend(sentence_ngrams(&sentence, config.n));
    }
    let ngrams = NgramMatrix::new(data, config.n)?;

    let mut groups = Vec::with_capacity(config.groups);
    let mut answers = Vec::with_capacity(config.groups);
    for _ in 0..config.groups {
        let sentence = sample_sentence(config, &successors, &mut rng);
        let blank = rng.gen_range(config.n - 1..config.sentence_len);
        let truth = sentence[blank];

        let mut words: Vec<u32> = vec![truth];
        while words.len() < config.candidates {
            let w = rng.gen_range(0..config.vocab_size as u32);
            if !words.contains(&w) {
                words.push(w);
            }
        }
        words.shuffle(&mut rng);
        let answer = words.iter().position(|&w| w == truth).unwrap_or(0);

        let candidates = words
            .iter()
            .map(|&w| {
                let mut s = sentence.clone();
                s[blank] = w;
                NgramMatrix::new(sentence_ngrams(&s, config.n), config.n)
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        groups.push(candidates);
        answers.push(answer);
    }

    tracing::info!(
        ngrams = ngrams.len(),
        groups = groups.len(),
        vocab_size = config.vocab_size,
        "Generated synthetic corpus"
    );

    Ok(SyntheticCorpus {
        ngrams,
        challenge: SentenceChallenge {
            vocab_size: config.vocab_size,
            groups,
            answers,
        },
    })
}

fn sample_sentence(config: &SyntheticConfig, successors: &[Vec<u32>], rng: &mut StdRng) -> Vec<u32> {
    let mut sentence = Vec::with_capacity(config.sentence_len);
    let mut word = rng.gen_range(0..config.vocab_size as u32);
    sentence.push(word);
    while sentence.len() < config.sentence_len {
        word = if rng.gen_bool(config.noise) {
            rng.gen_range(0..config.vocab_size as u32)
        } else {
            successors[word as usize][rng.gen_range(0..config.branching)]
        };
        sentence.push(word);
    }
    sentence
}

/// Flat n-gram rows `[w_t, w_{t-1}, .., w_{t-n+1}]`, conditioned term first.
fn sentence_ngrams(sentence: &[u32], n: usize) -> Vec<u32> {
    (n - 1..sentence.len())
        .flat_map(|t| (0..n).map(move |k| sentence[t - k]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentence_ngrams_conditioned_first() {
        let rows = sentence_ngrams(&[1, 2, 3, 4], 3);
        assert_eq!(rows, vec![3, 2, 1, 4, 3, 2]);
    }

    #[test]
    fn test_generate_shapes() {
        let config = SyntheticConfig {
            sentences: 10,
            groups: 6,
            ..SyntheticConfig::default()
        };
        let corpus = generate(&config).unwrap();
        let per_sentence = config.sentence_len - config.n + 1;
        assert_eq!(corpus.ngrams.len(), 10 * per_sentence);
        assert!(corpus.ngrams.validate(config.vocab_size).is_ok());

        assert_eq!(corpus.challenge.len(), 6);
        assert_eq!(corpus.challenge.answers.len(), 6);
        for (group, &answer) in corpus.challenge.groups.iter().zip(&corpus.challenge.answers) {
            assert_eq!(group.len(), config.candidates);
            assert!(answer < config.candidates);
            for candidate in group {
                assert_eq!(candidate.len(), per_sentence);
            }
        }
    }

    #[test]
    fn test_generate_is_deterministic() {
        let config = SyntheticConfig::default();
        let a = generate(&config).unwrap();
        let b = generate(&config).unwrap();
        assert_eq!(a.ngrams, b.ngrams);
        assert_eq!(a.challenge.answers, b.challenge.answers);
    }

    #[test]
    fn test_generate_rejects_short_sentences() {
        let config = SyntheticConfig {
            sentence_len: 2,
            ..SyntheticConfig::default()
        };
        assert!(generate(&config).is_err());
    }
}
