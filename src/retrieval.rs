//! Similarity retrieval over one persona's corpus.
//!
//! Lookup order: response cache, then cosine similarity against every entry
//! with a descending threshold cascade, then a persona fallback line chosen by
//! a keyword-category test. Every result is cached under the canonical query.

use crate::config::RetrievalConfig;
use crate::corpus::CorpusEntry;
use crate::logging;
use crate::normalizer;
use crate::persona::{self, Mode};
use crate::vectorizer::{TermVector, Vocabulary};
use indexmap::IndexMap;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq)]
pub struct CachedResponse {
    pub response: String,
    pub similarity: f64,
}

/// Bounded map from canonical query to response, evicting the least recently
/// used key once full.
#[derive(Debug)]
pub struct ResponseCache {
    entries: IndexMap<String, CachedResponse>,
    capacity: usize,
    evictions: u64,
}

impl ResponseCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: IndexMap::new(),
            capacity: capacity.max(1),
            evictions: 0,
        }
    }

    /// Lookup that refreshes recency on hit.
    pub fn get(&mut self, key: &str) -> Option<CachedResponse> {
        let index = self.entries.get_index_of(key)?;
        let last = self.entries.len() - 1;
        self.entries.move_index(index, last);
        self.entries.get_index(last).map(|(_, v)| v.clone())
    }

    pub fn insert(&mut self, key: String, value: CachedResponse) {
        if self.entries.contains_key(&key) {
            self.entries.shift_remove(&key);
        } else if self.entries.len() >= self.capacity {
            self.entries.shift_remove_index(0);
            self.evictions += 1;
        }
        self.entries.insert(key, value);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalSource {
    Cache,
    Similarity,
    Fallback,
}

#[derive(Debug, Clone, Serialize)]
pub struct Retrieval {
    pub response: String,
    pub source: RetrievalSource,
    /// Similarity of the chosen entry when it was first computed (0 for fallbacks).
    pub similarity: f64,
    /// Threshold the winning candidates qualified at, if any.
    pub threshold: Option<f64>,
    /// Thresholds attempted, in order.
    pub thresholds_tried: Vec<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetrievalStats {
    pub entries: usize,
    pub vocabulary: usize,
    pub cached: usize,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub evictions: u64,
    pub similarity_computations: u64,
}

/// One persona's corpus, vector space and cache.
pub struct RetrievalEngine {
    mode: Mode,
    entries: Vec<CorpusEntry>,
    vocabulary: Vocabulary,
    vectors: Vec<TermVector>,
    cache: Mutex<ResponseCache>,
    rng: Mutex<StdRng>,
    thresholds: Vec<f64>,
    top_k: usize,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    similarity_computations: AtomicU64,
}

impl RetrievalEngine {
    pub fn new(mode: Mode, entries: Vec<CorpusEntry>, config: &RetrievalConfig) -> Self {
        let vocabulary = Vocabulary::build(entries.iter().map(|e| e.prompt.as_str()));
        let vectors = entries
            .iter()
            .map(|e| vocabulary.vectorize(&e.prompt))
            .collect();
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        logging::log_retrieval(
            None,
            &format!(
                "{} engine ready: {} entries, {} terms",
                mode.as_str(),
                entries.len(),
                vocabulary.len()
            ),
        );

        Self {
            mode,
            entries,
            vocabulary,
            vectors,
            cache: Mutex::new(ResponseCache::new(config.cache_capacity)),
            rng: Mutex::new(rng),
            thresholds: config.thresholds.clone(),
            top_k: config.top_k.max(1),
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
            similarity_computations: AtomicU64::new(0),
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    pub fn entries(&self) -> &[CorpusEntry] {
        &self.entries
    }

    pub fn retrieve(&self, query: &str) -> Retrieval {
        let key = normalizer::canonical(query);

        if let Some(hit) = self.lock_cache().get(&key) {
            self.cache_hits.fetch_add(1, Ordering::Relaxed);
            return Retrieval {
                response: hit.response,
                source: RetrievalSource::Cache,
                similarity: hit.similarity,
                threshold: None,
                thresholds_tried: Vec::new(),
            };
        }
        self.cache_misses.fetch_add(1, Ordering::Relaxed);

        let result = self.compute(query);
        self.lock_cache().insert(key, CachedResponse {
            response: result.response.clone(),
            similarity: result.similarity,
        });
        result
    }

    fn compute(&self, query: &str) -> Retrieval {
        let query_vector = self.vocabulary.vectorize(query);
        let scores: Vec<f64> = self
            .vectors
            .iter()
            .map(|v| query_vector.cosine(v))
            .collect();
        self.similarity_computations
            .fetch_add(scores.len() as u64, Ordering::Relaxed);

        let mut thresholds_tried = Vec::with_capacity(self.thresholds.len());
        for &threshold in &self.thresholds {
            thresholds_tried.push(threshold);

            let mut candidates: Vec<(usize, f64)> = scores
                .iter()
                .copied()
                .enumerate()
                .filter(|(_, s)| *s >= threshold)
                .collect();
            if candidates.is_empty() {
                continue;
            }

            candidates.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
            candidates.truncate(self.top_k);
            let best = candidates[0].1;
            let (index, similarity) = {
                let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
                *candidates.choose(&mut *rng).unwrap_or(&candidates[0])
            };

            if threshold < self.thresholds[0] {
                logging::log_retrieval(
                    None,
                    &format!(
                        "{}: relaxed to threshold {:.2} (best {:.3})",
                        self.mode.as_str(),
                        threshold,
                        best
                    ),
                );
            }

            return Retrieval {
                response: self.entries[index].response.clone(),
                source: RetrievalSource::Similarity,
                similarity,
                threshold: Some(threshold),
                thresholds_tried,
            };
        }

        logging::log_retrieval(
            None,
            &format!(
                "{}: no candidate after {} thresholds, using fallback",
                self.mode.as_str(),
                thresholds_tried.len()
            ),
        );

        let lines = if persona::is_crypto_related(query) {
            persona::crypto_fallbacks(self.mode)
        } else {
            persona::generic_fallbacks(self.mode)
        };
        let response = {
            let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
            lines.choose(&mut *rng).copied().unwrap_or(lines[0]).to_string()
        };

        Retrieval {
            response,
            source: RetrievalSource::Fallback,
            similarity: 0.0,
            threshold: None,
            thresholds_tried,
        }
    }

    fn lock_cache(&self) -> std::sync::MutexGuard<'_, ResponseCache> {
        // Poisoning leaves the map intact.
        self.cache.lock().unwrap_or_else(|e| e.into_inner())
    }

    #[cfg(test)]
    pub(crate) fn is_cached(&self, query: &str) -> bool {
        self.lock_cache().contains(&normalizer::canonical(query))
    }

    pub fn stats(&self) -> RetrievalStats {
        let cache = self.lock_cache();
        RetrievalStats {
            entries: self.entries.len(),
            vocabulary: self.vocabulary.len(),
            cached: cache.len(),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            evictions: cache.evictions,
            similarity_computations: self.similarity_computations.load(Ordering::Relaxed),
        }
    }
}
