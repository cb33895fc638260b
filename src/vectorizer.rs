//! Bag-of-words vector space over a fixed vocabulary.
//!
//! Vectors hold raw term counts with no inverse-document-frequency weighting.
//! Corpora here are small and hand-curated, so plain counts keep retrieval
//! predictable and the vocabulary rebuild trivial.

use crate::normalizer;
use std::collections::{BTreeSet, HashMap};

/// Sorted, deduplicated terms drawn from a corpus' prompts.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Vocabulary {
    terms: Vec<String>,
    index: HashMap<String, usize>,
}

impl Vocabulary {
    /// Build from any set of texts. Ordering is lexicographic so two builds
    /// over the same input index terms identically.
    pub fn build<'a, I>(texts: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let unique: BTreeSet<String> = texts
            .into_iter()
            .flat_map(normalizer::tokens)
            .collect();
        let terms: Vec<String> = unique.into_iter().collect();
        let index = terms
            .iter()
            .enumerate()
            .map(|(i, t)| (t.clone(), i))
            .collect();
        Self { terms, index }
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    pub fn position(&self, term: &str) -> Option<usize> {
        self.index.get(term).copied()
    }

    /// Term-count vector for `text`. Length always equals `self.len()`.
    pub fn vectorize(&self, text: &str) -> TermVector {
        let mut counts = vec![0.0; self.terms.len()];
        for token in normalizer::tokens(text) {
            if let Some(i) = self.position(&token) {
                counts[i] += 1.0;
            }
        }
        TermVector::from_counts(counts)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TermVector {
    counts: Vec<f64>,
    norm: f64,
}

impl TermVector {
    pub fn from_counts(counts: Vec<f64>) -> Self {
        let norm = counts.iter().map(|c| c * c).sum::<f64>().sqrt();
        Self { counts, norm }
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn is_zero(&self) -> bool {
        self.norm == 0.0
    }

    pub fn counts(&self) -> &[f64] {
        &self.counts
    }

    /// Cosine similarity. Zero vectors (and mismatched lengths) score 0.
    pub fn cosine(&self, other: &TermVector) -> f64 {
        if self.is_zero() || other.is_zero() || self.counts.len() != other.counts.len() {
            return 0.0;
        }
        let dot: f64 = self
            .counts
            .iter()
            .zip(&other.counts)
            .map(|(a, b)| a * b)
            .sum();
        (dot / (self.norm * other.norm)).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROMPTS: [&str; 3] = [
        "What is bitcoin?",
        "How does ethereum staking work",
        "Explain wallets and private keys",
    ];

    #[test]
    fn test_vocabulary_is_deterministic() {
        let a = Vocabulary::build(PROMPTS);
        let b = Vocabulary::build(PROMPTS.iter().rev().copied());
        assert_eq!(a, b);
        assert_eq!(a.terms(), b.terms());
        let mut sorted = a.terms().to_vec();
        sorted.sort();
        assert_eq!(a.terms(), sorted.as_slice());
    }

    #[test]
    fn test_vector_length_matches_vocabulary() {
        let vocab = Vocabulary::build(PROMPTS);
        for text in ["", "bitcoin bitcoin", "totally unrelated words here"] {
            assert_eq!(vocab.vectorize(text).len(), vocab.len());
        }
    }

    #[test]
    fn test_counts_repeated_terms() {
        let vocab = Vocabulary::build(PROMPTS);
        let v = vocab.vectorize("BTC bitcoin wallets");
        let btc = vocab.position("bitcoin").unwrap();
        let wallets = vocab.position("wallets").unwrap();
        assert_eq!(v.counts()[btc], 2.0);
        assert_eq!(v.counts()[wallets], 1.0);
    }

    #[test]
    fn test_self_similarity_and_bounds() {
        let vocab = Vocabulary::build(PROMPTS);
        let v = vocab.vectorize("how does ethereum staking work");
        assert!((v.cosine(&v) - 1.0).abs() < 1e-9);

        let unknown = vocab.vectorize("completely foreign sentence");
        assert_eq!(unknown.cosine(&unknown), 0.0);

        for (a, b) in [
            ("bitcoin", "ethereum staking"),
            ("what is bitcoin", "bitcoin"),
            ("private keys wallets", "explain wallets"),
        ] {
            let s = vocab.vectorize(a).cosine(&vocab.vectorize(b));
            assert!((0.0..=1.0).contains(&s), "{} vs {} gave {}", a, b, s);
        }
    }

    #[test]
    fn test_zero_vector_similarity_is_zero() {
        let vocab = Vocabulary::build(PROMPTS);
        let zero = vocab.vectorize("");
        let v = vocab.vectorize("bitcoin");
        assert_eq!(zero.cosine(&v), 0.0);
        assert_eq!(v.cosine(&zero), 0.0);
    }

    #[test]
    fn test_empty_vocabulary() {
        let vocab = Vocabulary::build(std::iter::empty());
        assert!(vocab.is_empty());
        assert!(vocab.vectorize("bitcoin").is_zero());
    }
}
