//! Vector helpers shared by the storage backends.

/// Cosine similarity of two vectors.
///
/// Returns `None` on dimension mismatch, empty input, or a zero-length vector.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }
    let mut dot = 0.0_f64;
    let mut norm_a = 0.0_f64;
    let mut norm_b = 0.0_f64;
    for (&x, &y) in a.iter().zip(b) {
        let (x, y) = (f64::from(x), f64::from(y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom <= f64::EPSILON {
        return None;
    }
    #[allow(clippy::cast_possible_truncation, reason = "similarity is within [-1, 1]")]
    Some((dot / denom) as f32)
}

/// pgvector text literal, bound as `$n::vector`.
pub(crate) fn to_pg_vector(embedding: &[f32]) -> String {
    format!("[{}]", embedding.iter().map(ToString::to_string).collect::<Vec<_>>().join(","))
}
