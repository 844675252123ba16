use serde::{Deserialize, Serialize};

/// A dense embedding vector
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct Vector {
    data: Vec<f32>,
}

impl Vector {
    #[inline]
    #[must_use]
    pub fn new(data: Vec<f32>) -> Self {
        Self { data }
    }

    #[inline]
    #[must_use]
    pub fn from_slice(data: &[f32]) -> Self {
        Self {
            data: data.to_vec(),
        }
    }

    #[inline]
    #[must_use]
    pub fn dim(&self) -> usize {
        self.data.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    #[inline]
    pub fn is_finite(&self) -> bool {
        self.data.iter().all(|x| x.is_finite())
    }

    #[inline]
    pub fn norm(&self) -> f32 {
        dot(&self.data, &self.data).sqrt()
    }

    #[inline]
    pub fn dot(&self, other: &Vector) -> f32 {
        dot(&self.data, &other.data)
    }

    /// Cosine similarity with another vector.
    ///
    /// Returns `None` when the dimensions differ or either side has zero norm,
    /// so callers decide whether that is a data-quality issue or a request error.
    #[inline]
    pub fn cosine_similarity(&self, other: &Vector) -> Option<f32> {
        if self.dim() != other.dim() {
            return None;
        }

        let norm_a = self.norm();
        let norm_b = other.norm();

        if norm_a == 0.0 || norm_b == 0.0 {
            return None;
        }

        Some(self.dot(other) / (norm_a * norm_b))
    }

    /// Normalize the vector to unit length in place.
    ///
    /// Returns `false` and leaves the data untouched when the norm is zero.
    #[inline]
    pub fn normalize(&mut self) -> bool {
        let norm = self.norm();
        if norm <= f32::EPSILON {
            return false;
        }
        let inv_norm = 1.0 / norm;
        for x in &mut self.data {
            *x *= inv_norm;
        }
        true
    }

    #[inline]
    #[must_use]
    pub fn normalized(&self) -> Option<Self> {
        let mut v = self.clone();
        v.normalize().then_some(v)
    }
}

/// Dot product with four independent accumulators for better pipelining.
#[inline]
fn dot(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());

    let mut acc = [0.0f32; 4];
    let chunks_a = a.chunks_exact(4);
    let chunks_b = b.chunks_exact(4);
    let rem_a = chunks_a.remainder();
    let rem_b = chunks_b.remainder();

    for (ca, cb) in chunks_a.zip(chunks_b) {
        acc[0] += ca[0] * cb[0];
        acc[1] += ca[1] * cb[1];
        acc[2] += ca[2] * cb[2];
        acc[3] += ca[3] * cb[3];
    }

    let tail: f32 = rem_a.iter().zip(rem_b).map(|(x, y)| x * y).sum();
    (acc[0] + acc[1]) + (acc[2] + acc[3]) + tail
}
