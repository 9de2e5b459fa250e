use ndarray::{Array1, ArrayView1};

pub(crate) fn normalize_vector(vec: &Array1<f32>) -> Array1<f32> {
    let norm: f32 = vec.iter().map(|&x| x * x).sum::<f32>().sqrt();
    if norm > 1e-10 {
        vec / norm
    } else {
        Array1::zeros(vec.len())
    }
}

pub(crate) fn average_vectors(vectors: &[ArrayView1<f32>], dimension: usize) -> Array1<f32> {
    if vectors.is_empty() {
        return Array1::zeros(dimension);
    }
    let sum = vectors.iter().fold(Array1::<f32>::zeros(dimension), |acc, v| acc + v);
    sum / vectors.len() as f32
}

pub(crate) fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Softmax with the max subtracted first so large margins cannot overflow.
pub(crate) fn softmax(scores: ArrayView1<f32>) -> Array1<f32> {
    if scores.is_empty() {
        return Array1::zeros(0);
    }
    let max = scores.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    let exp = scores.mapv(|s| (s - max).exp());
    let total = exp.sum();
    exp / total
}

/// Index of the largest score; ties resolve to the lowest index.
pub(crate) fn argmax(scores: ArrayView1<f32>) -> Option<usize> {
    scores
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f32)>, (i, &s)| match best {
            Some((_, b)) if b >= s => best,
            _ => Some((i, s)),
        })
        .map(|(i, _)| i)
}
