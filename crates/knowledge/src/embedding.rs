//! Deterministic local embeddings.
//!
//! Words (minus stop words) are hashed into a fixed number of buckets, both
//! whole and as character trigrams, and the result is L2-normalized. Not a
//! semantic model, but content-dependent and stable across runs, which is
//! all the local index needs to rank chunks.

use std::collections::HashMap;

const STOP_WORDS: &[&str] = &[
    "the", "is", "at", "which", "on", "a", "an", "as", "are", "was", "were", "for", "to", "of",
    "in", "and", "or", "but", "with", "by", "from", "this", "that", "be", "have", "has", "had",
    "it", "its", "their", "they", "them", "what", "who", "does", "did",
];

/// Embed `text` into a unit vector of `dim` dimensions.
pub fn embed_text(text: &str, dim: usize) -> Vec<f32> {
    let dim = dim.max(1);
    let mut embedding = vec![0.0f32; dim];

    let lower = text.to_lowercase();
    let mut word_freq: HashMap<&str, u32> = HashMap::new();
    for word in lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() > 2 && !STOP_WORDS.contains(w))
    {
        *word_freq.entry(word).or_insert(0) += 1;
    }

    for (word, freq) in &word_freq {
        let weight = *freq as f32;

        let chars: Vec<char> = word.chars().collect();
        for window in chars.windows(3) {
            let idx = bucket(window.iter().flat_map(|c| c.to_string().into_bytes()), 37, dim);
            embedding[idx] += weight.sqrt();
        }

        embedding[bucket(word.bytes(), 31, dim)] += weight;
    }

    let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in &mut embedding {
            *v /= norm;
        }
    }

    embedding
}

fn bucket(bytes: impl Iterator<Item = u8>, multiplier: u64, dim: usize) -> usize {
    let hash = bytes.fold(0u64, |acc, b| acc.wrapping_mul(multiplier).wrapping_add(b as u64));
    (hash % dim as u64) as usize
}

/// Cosine similarity; 0.0 for mismatched or zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_length_and_deterministic() {
        let a = embed_text("Quarterly portfolio review for the finance team", 64);
        let b = embed_text("Quarterly portfolio review for the finance team", 64);

        assert_eq!(a, b);
        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_related_text_scores_higher() {
        let query = embed_text("portfolio performance finance", 384);
        let related = embed_text("The finance portfolio performance improved this quarter", 384);
        let unrelated = embed_text("Patient intake procedures for hospital wards", 384);

        assert!(cosine_similarity(&query, &related) > cosine_similarity(&query, &unrelated));
    }

    #[test]
    fn test_stop_words_only_is_zero_vector() {
        let v = embed_text("the and of it", 16);
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }
}
