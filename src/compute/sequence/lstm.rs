//! Single-layer LSTM over a one-hot window, followed by a softmax layer.
//!
//! Parameters live in one flat vector laid out as
//! `[w_in (4H x V) | w_rec (4H x H) | bias (4H) | w_out (V x H) | b_out (V)]`,
//! with gate rows ordered input, forget, cell, output.
//!
//! The one-hot input is never expanded: `w_in * x_t` is the column of `w_in`
//! at the hot index.

use rand::Rng;

use super::layers::{cross_entropy_grad, glorot_uniform, sigmoid, softmax_inplace};

/// LSTM next-token network.
#[derive(Debug, Clone)]
pub struct LstmNetwork {
    window_length: usize,
    vocab_size: usize,
    units: usize,
    params: Vec<f32>,
}

/// Per-timestep activations kept for backpropagation through time.
struct StepCache {
    token: usize,
    h_prev: Vec<f32>,
    c_prev: Vec<f32>,
    /// Gate activations `[i | f | g | o]`.
    gates: Vec<f32>,
    tanh_c: Vec<f32>,
}

impl LstmNetwork {
    /// Parameter count for the given shape.
    pub fn parameter_count(vocab_size: usize, units: usize) -> usize {
        4 * units * (vocab_size + units + 1) + vocab_size * (units + 1)
    }

    /// Allocate with Glorot-uniform weights, zero biases and forget-gate bias 1.
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
            params: vec![0.0; Self::parameter_count(vocab_size, units)],
        };

        let (h, v) = (units, vocab_size);
        let w_rec = net.w_rec_offset();
        let bias = net.bias_offset();
        let w_out = net.w_out_offset();
        let b_out = net.b_out_offset();

        glorot_uniform(&mut net.params[..w_rec], v, 4 * h, rng);
        glorot_uniform(&mut net.params[w_rec..bias], h, 4 * h, rng);
        for b in &mut net.params[bias + h..bias + 2 * h] {
            *b = 1.0;
        }
        glorot_uniform(&mut net.params[w_out..b_out], h, v, rng);

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
    fn w_rec_offset(&self) -> usize {
        4 * self.units * self.vocab_size
    }

    #[inline]
    fn bias_offset(&self) -> usize {
        self.w_rec_offset() + 4 * self.units * self.units
    }

    #[inline]
    fn w_out_offset(&self) -> usize {
        self.bias_offset() + 4 * self.units
    }

    #[inline]
    fn b_out_offset(&self) -> usize {
        self.w_out_offset() + self.vocab_size * self.units
    }

    /// Run the recurrence and return the final hidden state plus the step caches.
    fn run(&self, tokens: &[usize]) -> (Vec<f32>, Vec<StepCache>) {
        let (h, v) = (self.units, self.vocab_size);
        let p = &self.params;
        let w_rec = self.w_rec_offset();
        let bias = self.bias_offset();

        let mut hidden = vec![0.0; h];
        let mut cell = vec![0.0; h];
        let mut caches = Vec::with_capacity(tokens.len());

        for &token in tokens {
            let mut z: Vec<f32> = p[bias..bias + 4 * h].to_vec();
            if token < v {
                for (r, zr) in z.iter_mut().enumerate() {
                    *zr += p[r * v + token];
                }
            }
            for (r, zr) in z.iter_mut().enumerate() {
                let row = &p[w_rec + r * h..w_rec + (r + 1) * h];
                *zr += row.iter().zip(&hidden).map(|(w, x)| w * x).sum::<f32>();
            }

            let mut gates = z;
            for (r, g) in gates.iter_mut().enumerate() {
                *g = if (2 * h..3 * h).contains(&r) {
                    g.tanh()
                } else {
                    sigmoid(*g)
                };
            }

            let mut next_cell = vec![0.0; h];
            let mut tanh_c = vec![0.0; h];
            let mut next_hidden = vec![0.0; h];
            for j in 0..h {
                let (i, f, g, o) = (gates[j], gates[h + j], gates[2 * h + j], gates[3 * h + j]);
                next_cell[j] = f * cell[j] + i * g;
                tanh_c[j] = next_cell[j].tanh();
                next_hidden[j] = o * tanh_c[j];
            }

            caches.push(StepCache {
                token,
                h_prev: std::mem::replace(&mut hidden, next_hidden),
                c_prev: std::mem::replace(&mut cell, next_cell),
                gates,
                tanh_c,
            });
        }

        (hidden, caches)
    }

    /// Softmax output for the final hidden state.
    fn output(&self, hidden: &[f32]) -> Vec<f32> {
        let (h, v) = (self.units, self.vocab_size);
        let w_out = self.w_out_offset();
        let b_out = self.b_out_offset();
        let mut logits: Vec<f32> = (0..v)
            .map(|k| {
                let row = &self.params[w_out + k * h..w_out + (k + 1) * h];
                self.params[b_out + k] + row.iter().zip(hidden).map(|(w, x)| w * x).sum::<f32>()
            })
            .collect();
        softmax_inplace(&mut logits);
        logits
    }

    /// Next-token distribution for a window of token indices.
    pub fn predict(&self, tokens: &[usize]) -> Vec<f32> {
        let (hidden, _) = self.run(tokens);
        self.output(&hidden)
    }

    /// Add the cross-entropy gradient for one example into `grad`; returns the loss.
    pub fn accumulate_gradient(&self, tokens: &[usize], target: usize, grad: &mut [f32]) -> f32 {
        let (h, v) = (self.units, self.vocab_size);
        let p = &self.params;
        let w_rec = self.w_rec_offset();
        let bias = self.bias_offset();
        let w_out = self.w_out_offset();
        let b_out = self.b_out_offset();

        let (hidden, caches) = self.run(tokens);
        let mut d_logits = self.output(&hidden);
        let loss = cross_entropy_grad(&mut d_logits, target);

        let mut dh = vec![0.0; h];
        for (k, &dl) in d_logits.iter().enumerate() {
            grad[b_out + k] += dl;
            for j in 0..h {
                grad[w_out + k * h + j] += dl * hidden[j];
                dh[j] += p[w_out + k * h + j] * dl;
            }
        }

        let mut dc = vec![0.0; h];
        let mut dz = vec![0.0; 4 * h];
        for step in caches.iter().rev() {
            let g = &step.gates;
            for j in 0..h {
                let (i, f, gc, o) = (g[j], g[h + j], g[2 * h + j], g[3 * h + j]);
                let tc = step.tanh_c[j];
                let d_o = dh[j] * tc;
                dc[j] += dh[j] * o * (1.0 - tc * tc);
                let d_i = dc[j] * gc;
                let d_g = dc[j] * i;
                let d_f = dc[j] * step.c_prev[j];

                dz[j] = d_i * i * (1.0 - i);
                dz[h + j] = d_f * f * (1.0 - f);
                dz[2 * h + j] = d_g * (1.0 - gc * gc);
                dz[3 * h + j] = d_o * o * (1.0 - o);

                dc[j] *= f;
            }

            let mut dh_prev = vec![0.0; h];
            for (r, &dzr) in dz.iter().enumerate() {
                grad[bias + r] += dzr;
                if step.token < v {
                    grad[r * v + step.token] += dzr;
                }
                let row = w_rec + r * h;
                for j in 0..h {
                    grad[row + j] += dzr * step.h_prev[j];
                    dh_prev[j] += p[row + j] * dzr;
                }
            }
            dh = dh_prev;
        }

        loss
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn tiny() -> LstmNetwork {
        let mut rng = StdRng::seed_from_u64(7);
        LstmNetwork::new(3, 4, 5, &mut rng)
    }

    #[test]
    fn test_parameter_layout() {
        let net = tiny();
        assert_eq!(net.params().len(), LstmNetwork::parameter_count(4, 5));
        // forget-gate biases start at one
        let bias = net.bias_offset();
        assert!(net.params()[bias + 5..bias + 10].iter().all(|&b| b == 1.0));
        assert!(net.params()[bias..bias + 5].iter().all(|&b| b == 0.0));
    }

    #[test]
    fn test_predict_is_distribution() {
        let net = tiny();
        let probs = net.predict(&[0, 1, 3]);
        assert_eq!(probs.len(), 4);
        assert!((probs.iter().sum::<f32>() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_gradient_matches_finite_difference() {
        let mut net = tiny();
        let tokens = [2, 0, 1];
        let target = 3;

        let mut grad = vec![0.0; net.params().len()];
        net.accumulate_gradient(&tokens, target, &mut grad);

        let loss = |n: &LstmNetwork| -n.predict(&tokens)[target].ln();
        let eps = 1e-2;
        // one weight from each block
        for idx in [
            1,
            net.w_rec_offset() + 3,
            net.bias_offset() + 7,
            net.w_out_offset() + 2,
            net.b_out_offset() + 1,
        ] {
            let original = net.params()[idx];
            net.params_mut()[idx] = original + eps;
            let plus = loss(&net);
            net.params_mut()[idx] = original - eps;
            let minus = loss(&net);
            net.params_mut()[idx] = original;

            let numeric = (plus - minus) / (2.0 * eps);
            assert!(
                (numeric - grad[idx]).abs() < 1e-2,
                "param {idx}: numeric {numeric} analytic {}",
                grad[idx]
            );
        }
    }
}
