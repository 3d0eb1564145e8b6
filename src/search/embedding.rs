//! Text encoders
//!
//! The default encoder is Harmonic Token Projection (HTP): every token is read
//! as a base-2^16 integer of its code points, reduced modulo a set of coprime
//! moduli, and each residue is projected onto the unit circle. Token vectors
//! are mean-pooled and L2-normalized. No model file, fully deterministic.
//!
//! See "Harmonic Token Projection: A Vocabulary-Free, Training-Free,
//! Deterministic, and Reversible Embedding Methodology"
//! (https://arxiv.org/html/2511.20665).

use std::f64::consts::TAU;

use crate::core::error::{CatalogError, Result};

/// Fixed-length embedding of a piece of text
pub type EncodedVector = Vec<f32>;

/// Largest supported dimension (two components per modulus)
pub const MAX_DIMENSION: usize = 384;

/// Identifier prefix for the HTP encoder; `htp` alone means `htp-384`
const HTP_PREFIX: &str = "htp";

/// Tokens are truncated to this many code points before projection
const MAX_TOKEN_CHARS: usize = 64;

/// Maps text to vectors. Implementations must be pure: the same model and the
/// same text always give the same vector.
pub trait TextEncoder {
    /// Identity recorded alongside an index so queries use the same model
    fn model_id(&self) -> &str;

    fn dimension(&self) -> usize;

    fn encode(&self, text: &str) -> Result<EncodedVector>;

    /// Whether `text` carries anything to encode. Text for which this is false
    /// encodes to the zero vector, which matches nothing.
    fn has_content(&self, text: &str) -> bool {
        !text.trim().is_empty()
    }

    fn encode_batch(&self, texts: &[&str]) -> Result<Vec<EncodedVector>> {
        texts.iter().map(|t| self.encode(t)).collect()
    }
}

/// Harmonic Token Projection encoder
#[derive(Debug, Clone)]
pub struct HarmonicEncoder {
    model_id: String,
    moduli: Vec<u64>,
}

impl HarmonicEncoder {
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 || dimension % 2 != 0 || dimension > MAX_DIMENSION {
            return Err(CatalogError::config(format!(
                "HTP dimension must be even and between 2 and {}, got {}",
                MAX_DIMENSION, dimension
            )));
        }
        Ok(Self {
            model_id: format!("{}-{}", HTP_PREFIX, dimension),
            moduli: first_primes(dimension / 2),
        })
    }

    /// Resolve an `embedding_model` config value: `htp` or `htp-<dims>`
    pub fn from_identifier(identifier: &str) -> Result<Self> {
        let identifier = identifier.trim().to_ascii_lowercase();
        if identifier == HTP_PREFIX {
            return Self::new(MAX_DIMENSION);
        }
        let dims = identifier
            .strip_prefix(HTP_PREFIX)
            .and_then(|rest| rest.strip_prefix('-'))
            .and_then(|d| d.parse::<usize>().ok())
            .ok_or_else(|| {
                CatalogError::config(format!(
                    "unknown embedding model '{}' (expected 'htp' or 'htp-<dims>')",
                    identifier
                ))
            })?;
        Self::new(dims)
    }

    fn project_token(&self, token: &str, acc: &mut [f64]) {
        let n = token
            .chars()
            .take(MAX_TOKEN_CHARS)
            .fold(0u64, |n, c| n.wrapping_mul(1 << 16).wrapping_add(c as u64));

        for (i, &m) in self.moduli.iter().enumerate() {
            let theta = TAU * (n % m) as f64 / m as f64;
            acc[2 * i] += theta.sin();
            acc[2 * i + 1] += theta.cos();
        }
    }
}

impl TextEncoder for HarmonicEncoder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dimension(&self) -> usize {
        self.moduli.len() * 2
    }

    fn has_content(&self, text: &str) -> bool {
        tokenize(text).next().is_some()
    }

    /// Empty or punctuation-only text encodes to the zero vector
    fn encode(&self, text: &str) -> Result<EncodedVector> {
        let mut acc = vec![0.0f64; self.dimension()];
        let mut tokens = 0usize;
        for token in tokenize(text) {
            self.project_token(&token, &mut acc);
            tokens += 1;
        }

        if tokens == 0 {
            return Ok(vec![0.0; self.dimension()]);
        }

        // Mean pooling is absorbed by the normalization below
        let norm = acc.iter().map(|x| x * x).sum::<f64>().sqrt();
        if norm == 0.0 {
            return Ok(vec![0.0; self.dimension()]);
        }
        Ok(acc.iter().map(|x| (x / norm) as f32).collect())
    }
}

/// Lowercased runs of alphanumeric characters; punctuation and symbols
/// separate tokens and are never tokens themselves
fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase)
}

/// First `count` primes; pairwise coprime by construction
fn first_primes(count: usize) -> Vec<u64> {
    let mut primes: Vec<u64> = Vec::with_capacity(count);
    let mut candidate = 2u64;
    while primes.len() < count {
        if primes
            .iter()
            .take_while(|&&p| p * p <= candidate)
            .all(|&p| candidate % p != 0)
        {
            primes.push(candidate);
        }
        candidate += 1;
    }
    primes
}

/// Cosine similarity; 0.0 for mismatched lengths or zero vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a > 0.0 && norm_b > 0.0 {
        dot / (norm_a * norm_b)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic() {
        let a = HarmonicEncoder::from_identifier("htp").unwrap();
        let b = HarmonicEncoder::from_identifier("htp").unwrap();

        let text = "A red ceramic mug";
        assert_eq!(a.encode(text).unwrap(), a.encode(text).unwrap());
        // Separate instances of the same model agree bit for bit
        assert_eq!(a.encode(text).unwrap(), b.encode(text).unwrap());
        assert_ne!(a.encode(text).unwrap(), a.encode("Steel kettle").unwrap());
    }

    #[test]
    fn test_identifiers() {
        let default = HarmonicEncoder::from_identifier("HTP").unwrap();
        assert_eq!(default.dimension(), MAX_DIMENSION);
        assert_eq!(default.model_id(), "htp-384");

        let small = HarmonicEncoder::from_identifier("htp-64").unwrap();
        assert_eq!(small.dimension(), 64);
        assert_eq!(small.encode("mug").unwrap().len(), 64);

        assert!(HarmonicEncoder::from_identifier("htp-63").is_err());
        assert!(HarmonicEncoder::from_identifier("htp-0").is_err());
        assert!(HarmonicEncoder::from_identifier("htp-1024").is_err());
        assert!(HarmonicEncoder::from_identifier("all-MiniLM-L6-v2").is_err());
    }

    #[test]
    fn test_normalized_and_degenerate() {
        let encoder = HarmonicEncoder::new(128).unwrap();

        let v = encoder.encode("Soft cotton t-shirt, 한국어").unwrap();
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);

        let empty = encoder.encode("  ...  ").unwrap();
        assert!(empty.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_shared_tokens_score_higher() {
        let encoder = HarmonicEncoder::from_identifier("htp").unwrap();
        let mug = encoder.encode("A red ceramic mug").unwrap();
        let query = encoder.encode("ceramic mug").unwrap();
        let unrelated = encoder.encode("wireless noise cancelling headphones").unwrap();

        assert!(cosine_similarity(&mug, &query) > cosine_similarity(&unrelated, &query));
    }

    #[test]
    fn test_has_content_follows_tokenizer() {
        let encoder = HarmonicEncoder::new(32).unwrap();
        assert!(encoder.has_content("red mug"));
        assert!(encoder.has_content("한국어"));
        assert!(!encoder.has_content(""));
        assert!(!encoder.has_content("---"));
        assert!(!encoder.has_content(" ?? ... "));
        assert!(!encoder.has_content("— …"));
        assert!(encoder.encode("---").unwrap().iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_batch_matches_single() {
        let encoder = HarmonicEncoder::new(32).unwrap();
        let batch = encoder.encode_batch(&["one", "two"]).unwrap();
        assert_eq!(batch[0], encoder.encode("one").unwrap());
        assert_eq!(batch[1], encoder.encode("two").unwrap());
    }

    #[test]
    fn test_first_primes() {
        assert_eq!(first_primes(6), vec![2, 3, 5, 7, 11, 13]);
    }

    #[test]
    fn test_cosine_similarity() {
        let a = [1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &[1.0, 0.0, 0.0]) - 1.0).abs() < 0.001);
        assert!(cosine_similarity(&a, &[0.0, 1.0, 0.0]).abs() < 0.001);
        assert!((cosine_similarity(&a, &[-1.0, 0.0, 0.0]) + 1.0).abs() < 0.001);
        assert_eq!(cosine_similarity(&a, &[1.0, 0.0]), 0.0);
    }
}
