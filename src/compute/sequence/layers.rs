//! Shared numeric helpers for the sequence networks.

use rand::Rng;

#[inline]
pub(crate) fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Numerically stable softmax in place.
pub(crate) fn softmax_inplace(values: &mut [f32]) {
    let max = values.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let mut sum = 0.0;
    for v in values.iter_mut() {
        *v = (*v - max).exp();
        sum += *v;
    }
    if sum > 0.0 {
        for v in values.iter_mut() {
            *v /= sum;
        }
    }
}

/// Fill `weights` from the Glorot uniform distribution for a `fan_in x fan_out` layer.
pub(crate) fn glorot_uniform<R: Rng + ?Sized>(
    weights: &mut [f32],
    fan_in: usize,
    fan_out: usize,
    rng: &mut R,
) {
    let limit = (6.0 / (fan_in + fan_out).max(1) as f32).sqrt();
    for w in weights.iter_mut() {
        *w = rng.gen_range(-limit..=limit);
    }
}

/// Softmax cross-entropy against a single target. Returns the loss and
/// overwrites `probs` with `d loss / d logits`.
pub(crate) fn cross_entropy_grad(probs: &mut [f32], target: usize) -> f32 {
    let p = probs.get(target).copied().unwrap_or(0.0);
    let loss = -p.max(1e-12).ln();
    if let Some(t) = probs.get_mut(target) {
        *t -= 1.0;
    }
    loss
}

/// Rescale `grads` so its L2 norm does not exceed `max_norm`.
pub(crate) fn clip_global_norm(grads: &mut [f32], max_norm: f32) {
    let norm = grads.iter().map(|g| g * g).sum::<f32>().sqrt();
    if norm > max_norm && norm.is_finite() {
        let scale = max_norm / norm;
        for g in grads.iter_mut() {
            *g *= scale;
        }
    }
}
