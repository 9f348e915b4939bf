//! Term-frequency-weighted text similarity.
//!
//! A `TfidfScorer` is fit once over a training corpus and then frozen inside
//! the feature schema; replay only ever calls `similarity`, which cannot
//! grow the vocabulary. Cosine similarity lives in [0,1]; if either side
//! vectorizes to an all-zero vector (no shared vocabulary terms) the
//! similarity is defined as exactly 0.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};

/// Common English stop words excluded from the vocabulary.
const STOP_WORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "all", "also", "am", "an", "and", "any", "are", "as",
    "at", "be", "because", "been", "before", "being", "below", "between", "both", "but", "by",
    "can", "could", "did", "do", "does", "doing", "down", "during", "each", "few", "for", "from",
    "further", "had", "has", "have", "having", "he", "her", "here", "hers", "him", "his", "how",
    "if", "in", "into", "is", "it", "its", "just", "me", "more", "most", "my", "no", "nor", "not",
    "now", "of", "off", "on", "once", "only", "or", "other", "our", "out", "over", "own", "same",
    "she", "should", "so", "some", "such", "than", "that", "the", "their", "them", "then", "there",
    "these", "they", "this", "those", "through", "to", "too", "under", "until", "up", "very",
    "was", "we", "were", "what", "when", "where", "which", "while", "who", "whom", "why", "will",
    "with", "would", "you", "your", "yours",
];

/// A fitted tf-idf similarity scorer. Frozen after `fit`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TfidfScorer {
    /// Term → vocabulary index, alphabetical.
    vocab: BTreeMap<String, usize>,
    /// Smoothed inverse document frequency per vocabulary index.
    idf: Vec<f64>,
    max_features: usize,
}

impl TfidfScorer {
    /// Learns a vocabulary of at most `max_features` terms from the corpus,
    /// ranked by total corpus frequency (ties broken lexicographically so
    /// the fitted state is deterministic).
    pub fn fit(corpus: &[String], max_features: usize) -> Self {
        let n_docs = corpus.len();
        let mut term_freq: HashMap<String, usize> = HashMap::new();
        let mut doc_freq: HashMap<String, usize> = HashMap::new();

        for doc in corpus {
            let tokens = tokenize(doc);
            let mut seen: HashSet<&str> = HashSet::new();
            for token in &tokens {
                *term_freq.entry(token.clone()).or_insert(0) += 1;
                seen.insert(token.as_str());
            }
            for term in seen {
                *doc_freq.entry(term.to_string()).or_insert(0) += 1;
            }
        }

        let mut ranked: Vec<(String, usize)> = term_freq.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(max_features);

        let mut terms: Vec<String> = ranked.into_iter().map(|(t, _)| t).collect();
        terms.sort();
        let mut vocab = BTreeMap::new();
        for (index, term) in terms.into_iter().enumerate() {
            vocab.insert(term, index);
        }

        let mut idf = vec![0.0; vocab.len()];
        for (term, &index) in &vocab {
            let df = doc_freq.get(term).copied().unwrap_or(0);
            idf[index] = (((1 + n_docs) as f64) / ((1 + df) as f64)).ln() + 1.0;
        }

        TfidfScorer {
            vocab,
            idf,
            max_features,
        }
    }

    pub fn vocab_len(&self) -> usize {
        self.vocab.len()
    }

    /// L2-normalized tf·idf vector for a text. Texts with no vocabulary
    /// terms map to the all-zero vector.
    pub fn vectorize(&self, text: &str) -> Vec<f64> {
        let mut vector = vec![0.0; self.vocab.len()];
        for token in tokenize(text) {
            if let Some(&index) = self.vocab.get(&token) {
                vector[index] += 1.0;
            }
        }
        for (index, value) in vector.iter_mut().enumerate() {
            *value *= self.idf[index];
        }
        let norm = vector.iter().map(|v| v * v).sum::<f64>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }
        vector
    }

    /// Cosine similarity of two texts in the frozen vocabulary space.
    pub fn similarity(&self, a: &str, b: &str) -> f64 {
        let va = self.vectorize(a);
        let vb = self.vectorize(b);
        // Both vectors are unit-length (or zero), so the dot product is the
        // cosine; an all-zero side yields 0, not NaN.
        va.iter()
            .zip(&vb)
            .map(|(x, y)| x * y)
            .sum::<f64>()
            .clamp(0.0, 1.0)
    }
}

/// Lowercase alphanumeric tokens of at least two characters, stop words
/// removed.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() >= 2 && !STOP_WORDS.contains(t))
        .map(|t| t.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus(texts: &[&str]) -> Vec<String> {
        texts.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn test_identical_texts_similarity_one() {
        let scorer = TfidfScorer::fit(
            &corpus(&["backend python services", "frontend react apps"]),
            100,
        );
        let sim = scorer.similarity("backend python services", "backend python services");
        assert!((sim - 1.0).abs() < 1e-9, "sim was {sim}");
    }

    #[test]
    fn test_disjoint_vocabulary_similarity_zero() {
        let scorer = TfidfScorer::fit(&corpus(&["backend python", "frontend react"]), 100);
        assert_eq!(scorer.similarity("backend python", "kernel drivers"), 0.0);
    }

    #[test]
    fn test_zero_vector_side_is_zero_not_nan() {
        let scorer = TfidfScorer::fit(&corpus(&["backend python"]), 100);
        let sim = scorer.similarity("", "backend python");
        assert_eq!(sim, 0.0);
    }

    #[test]
    fn test_vocabulary_capped_at_max_features() {
        let scorer = TfidfScorer::fit(
            &corpus(&["alpha beta gamma delta epsilon zeta eta theta"]),
            3,
        );
        assert_eq!(scorer.vocab_len(), 3);
    }

    #[test]
    fn test_stop_words_excluded() {
        let scorer = TfidfScorer::fit(&corpus(&["the and of backend"]), 100);
        assert_eq!(scorer.vocab_len(), 1);
    }

    #[test]
    fn test_transform_never_grows_vocabulary() {
        let scorer = TfidfScorer::fit(&corpus(&["backend python"]), 100);
        let before = scorer.vocab_len();
        let vector = scorer.vectorize("entirely novel terms everywhere");
        assert_eq!(scorer.vocab_len(), before);
        assert!(vector.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_partial_overlap_between_zero_and_one() {
        let scorer = TfidfScorer::fit(
            &corpus(&["backend python sql services", "devops kubernetes"]),
            100,
        );
        let sim = scorer.similarity("backend python sql services", "python developer");
        assert!(sim > 0.0 && sim < 1.0, "sim was {sim}");
    }

    #[test]
    fn test_fit_is_deterministic() {
        let docs = corpus(&["python backend api", "api design review", "python tooling"]);
        let a = TfidfScorer::fit(&docs, 2);
        let b = TfidfScorer::fit(&docs, 2);
        assert_eq!(a.vocab, b.vocab);
        assert_eq!(a.idf, b.idf);
    }

    #[test]
    fn test_tokenize_splits_on_punctuation() {
        // single-char shards like "c" are dropped by the length filter
        let tokens = tokenize("C++, Rust/Go; back-end!");
        assert_eq!(tokens, vec!["rust", "go", "back", "end"]);
    }
}
