//! Adam optimiser over a flat parameter vector.

use crate::schema::ModelConfig;

/// Adam state for one network.
#[derive(Debug, Clone)]
pub struct Adam {
    learning_rate: f32,
    beta1: f32,
    beta2: f32,
    epsilon: f32,
    m: Vec<f32>,
    v: Vec<f32>,
    step: i32,
}

impl Adam {
    /// Create optimiser state for `size` parameters.
    pub fn new(config: &ModelConfig, size: usize) -> Self {
        Self {
            learning_rate: config.learning_rate,
            beta1: config.beta1,
            beta2: config.beta2,
            epsilon: config.epsilon,
            m: vec![0.0; size],
            v: vec![0.0; size],
            step: 0,
        }
    }

    /// Updates applied so far.
    pub fn steps(&self) -> i32 {
        self.step
    }

    /// Apply one bias-corrected update.
    pub fn update(&mut self, params: &mut [f32], grads: &[f32]) {
        debug_assert_eq!(params.len(), self.m.len());
        debug_assert_eq!(grads.len(), self.m.len());

        self.step = self.step.saturating_add(1);
        let correction1 = 1.0 - self.beta1.powi(self.step);
        let correction2 = 1.0 - self.beta2.powi(self.step);
        let step_size = self.learning_rate / correction1;

        for (((p, &g), m), v) in params
            .iter_mut()
            .zip(grads)
            .zip(self.m.iter_mut())
            .zip(self.v.iter_mut())
        {
            *m = self.beta1 * *m + (1.0 - self.beta1) * g;
            *v = self.beta2 * *v + (1.0 - self.beta2) * g * g;
            let v_hat = *v / correction2;
            *p -= step_size * *m / (v_hat.sqrt() + self.epsilon);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimizes_quadratic() {
        let config = ModelConfig {
            learning_rate: 0.1,
            ..Default::default()
        };
        let mut adam = Adam::new(&config, 2);
        let mut params = vec![3.0, -2.0];
        for _ in 0..1000 {
            let grads: Vec<f32> = params.iter().map(|p| 2.0 * p).collect();
            adam.update(&mut params, &grads);
        }
        assert!(params.iter().all(|p| p.abs() < 0.1), "{params:?}");
        assert_eq!(adam.steps(), 1000);
    }

    #[test]
    fn test_first_step_moves_by_learning_rate() {
        let config = ModelConfig::default();
        let mut adam = Adam::new(&config, 1);
        let mut params = vec![1.0];
        adam.update(&mut params, &[0.5]);
        assert!((params[0] - (1.0 - config.learning_rate)).abs() < 1e-4);
    }
}
