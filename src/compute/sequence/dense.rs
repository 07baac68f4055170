//! Flatten -> ReLU -> softmax network.
//!
//! Layout: `[w1 (H x W*V) | b1 (H) | w2 (V x H) | b2 (V)]`.

use rand::Rng;

use super::layers::{cross_entropy_grad, glorot_uniform, softmax_inplace};

/// Feed-forward next-token network over the flattened one-hot window.
#[derive(Debug, Clone)]
pub struct DenseNetwork {
    window_length: usize,
    vocab_size: usize,
    units: usize,
    params: Vec<f32>,
}

impl DenseNetwork {
    /// Parameter count for the given shape.
    pub fn parameter_count(window_length: usize, vocab_size: usize, units: usize) -> usize {
        units * (window_length * vocab_size + 1) + vocab_size * (units + 1)
    }

    pub fn new<R: Rng + ?Sized>(
        window_length: usize,
        vocab_size: usize,
        units: usize,
        rng: &mut R,
    ) -> Self {
        let mut net = Self {
            window_length,
            vocab_size,
            units,
            params: vec![0.0; Self::parameter_count(window_length, vocab_size, units)],
        };
        let flat = window_length * vocab_size;
        let b1 = net.b1_offset();
        let w2 = net.w2_offset();
        let b2 = net.b2_offset();
        glorot_uniform(&mut net.params[..b1], flat, units, rng);
        glorot_uniform(&mut net.params[w2..b2], units, vocab_size, rng);
        net
    }

    pub fn window_length(&self) -> usize {
        self.window_length
    }

    pub fn units(&self) -> usize {
        self.units
    }

    pub fn params(&self) -> &[f32] {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut [f32] {
        &mut self.params
    }

    #[inline]
    fn flat_width(&self) -> usize {
        self.window_length * self.vocab_size
    }

    #[inline]
    fn b1_offset(&self) -> usize {
        self.units * self.flat_width()
    }

    #[inline]
    fn w2_offset(&self) -> usize {
        self.b1_offset() + self.units
    }

    #[inline]
    fn b2_offset(&self) -> usize {
        self.w2_offset() + self.vocab_size * self.units
    }

    /// Flattened column of each hot input, skipping out-of-range rows.
    fn hot_columns<'a>(&'a self, tokens: &'a [usize]) -> impl Iterator<Item = usize> + 'a {
        tokens
            .iter()
            .enumerate()
            .filter(|&(_, &tok)| tok < self.vocab_size)
            .map(|(t, &tok)| t * self.vocab_size + tok)
    }

    /// Hidden pre-activations and the softmax output.
    fn forward(&self, tokens: &[usize]) -> (Vec<f32>, Vec<f32>) {
        let (h, v) = (self.units, self.vocab_size);
        let flat = self.flat_width();
        let p = &self.params;
        let b1 = self.b1_offset();
        let w2 = self.w2_offset();
        let b2 = self.b2_offset();

        let mut pre: Vec<f32> = p[b1..b1 + h].to_vec();
        for col in self.hot_columns(tokens) {
            for (j, pj) in pre.iter_mut().enumerate() {
                *pj += p[j * flat + col];
            }
        }

        let mut out: Vec<f32> = (0..v)
            .map(|k| {
                let row = &p[w2 + k * h..w2 + (k + 1) * h];
                p[b2 + k] + row.iter().zip(&pre).map(|(w, &x)| w * x.max(0.0)).sum::<f32>()
            })
            .collect();
        softmax_inplace(&mut out);
        (pre, out)
    }

    pub fn predict(&self, tokens: &[usize]) -> Vec<f32> {
        self.forward(tokens).1
    }

    /// Add the cross-entropy gradient for one example into `grad`; returns the loss.
    pub fn accumulate_gradient(&self, tokens: &[usize], target: usize, grad: &mut [f32]) -> f32 {
        let h = self.units;
        let flat = self.flat_width();
        let p = &self.params;
        let b1 = self.b1_offset();
        let w2 = self.w2_offset();
        let b2 = self.b2_offset();

        let (pre, mut d_logits) = self.forward(tokens);
        let loss = cross_entropy_grad(&mut d_logits, target);

        let mut d_pre = vec![0.0; h];
        for (k, &dl) in d_logits.iter().enumerate() {
            grad[b2 + k] += dl;
            for j in 0..h {
                grad[w2 + k * h + j] += dl * pre[j].max(0.0);
                d_pre[j] += p[w2 + k * h + j] * dl;
            }
        }
        for (j, d) in d_pre.iter_mut().enumerate() {
            if pre[j] <= 0.0 {
                *d = 0.0;
            }
            grad[b1 + j] += *d;
        }
        for col in self.hot_columns(tokens) {
            for (j, &d) in d_pre.iter().enumerate() {
                grad[j * flat + col] += d;
            }
        }

        loss
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_predict_is_distribution() {
        let mut rng = StdRng::seed_from_u64(1);
        let net = DenseNetwork::new(2, 5, 6, &mut rng);
        let probs = net.predict(&[1, 4]);
        assert_eq!(probs.len(), 5);
        assert!((probs.iter().sum::<f32>() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_output_bias_gradient() {
        let mut rng = StdRng::seed_from_u64(2);
        let net = DenseNetwork::new(2, 3, 4, &mut rng);
        let probs = net.predict(&[0, 2]);
        let mut grad = vec![0.0; net.params().len()];
        let loss = net.accumulate_gradient(&[0, 2], 1, &mut grad);

        assert!((loss + probs[1].ln()).abs() < 1e-5);
        let b2 = net.b2_offset();
        assert!((grad[b2] - probs[0]).abs() < 1e-6);
        assert!((grad[b2 + 1] - (probs[1] - 1.0)).abs() < 1e-6);
    }

    #[test]
    fn test_only_hot_columns_receive_gradient() {
        let mut rng = StdRng::seed_from_u64(3);
        let net = DenseNetwork::new(2, 3, 4, &mut rng);
        let mut grad = vec![0.0; net.params().len()];
        net.accumulate_gradient(&[0, 2], 1, &mut grad);

        let flat = net.flat_width();
        // column 1 (row 0, token 1) is never hot
        for j in 0..4 {
            assert_eq!(grad[j * flat + 1], 0.0);
        }
    }
}
