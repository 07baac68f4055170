//! Temperature-adjusted categorical sampling.

use rand::Rng;

/// Draw an index from `probs` after sharpening or flattening it by `temperature`.
///
/// Each probability is raised to `1 / temperature` and the vector is
/// renormalized. A vector with zero (or non-finite) total mass yields index 0.
/// The draw returns the first index with positive mass whose cumulative mass
/// reaches a uniform `r` in `[0, 1)`, or the last index if round-off leaves
/// the total just under `r`.
///
/// A non-positive or non-finite temperature selects the most probable index.
pub fn sample_with_temperature<R: Rng + ?Sized>(
    probs: &[f32],
    temperature: f32,
    rng: &mut R,
) -> usize {
    if probs.is_empty() {
        return 0;
    }
    if !(temperature > 0.0) || !temperature.is_finite() {
        return argmax(probs);
    }

    let exponent = 1.0 / f64::from(temperature);
    let adjusted: Vec<f64> = probs
        .iter()
        .map(|&p| {
            let p = f64::from(p).max(0.0);
            if temperature == 1.0 { p } else { p.powf(exponent) }
        })
        .collect();

    let sum: f64 = adjusted.iter().sum();
    if !(sum > 0.0) || !sum.is_finite() {
        return 0;
    }

    let r: f64 = rng.r#gen();
    let mut cumulative = 0.0;
    for (i, &p) in adjusted.iter().enumerate() {
        if p <= 0.0 {
            continue;
        }
        cumulative += p / sum;
        if r <= cumulative {
            return i;
        }
    }
    adjusted.len() - 1
}

/// Index of the largest value; ties resolve to the lowest index.
pub fn argmax(values: &[f32]) -> usize {
    values
        .iter()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |(best, best_v), (i, &v)| {
            if v > best_v { (i, v) } else { (best, best_v) }
        })
        .0
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_all_zero_returns_zero() {
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..100 {
            assert_eq!(sample_with_temperature(&[0.0; 8], 1.0, &mut rng), 0);
            assert_eq!(sample_with_temperature(&[0.0; 8], 0.5, &mut rng), 0);
        }
    }

    #[test]
    fn test_empty_returns_zero() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(sample_with_temperature(&[], 1.0, &mut rng), 0);
    }

    #[test]
    fn test_zero_temperature_is_greedy() {
        let mut rng = StdRng::seed_from_u64(3);
        let probs = [0.1, 0.6, 0.3];
        assert_eq!(sample_with_temperature(&probs, 0.0, &mut rng), 1);
        assert_eq!(sample_with_temperature(&probs, f32::NAN, &mut rng), 1);
    }

    #[test]
    fn test_low_temperature_sharpens() {
        let mut rng = StdRng::seed_from_u64(9);
        let probs = [0.2, 0.5, 0.3];
        let hits = (0..500)
            .filter(|_| sample_with_temperature(&probs, 0.05, &mut rng) == 1)
            .count();
        assert!(hits > 490, "mode chosen {hits}/500 times");
    }

    #[test]
    fn test_distribution_roughly_followed() {
        let mut rng = StdRng::seed_from_u64(11);
        let probs = [0.25, 0.75];
        let ones = (0..4000)
            .filter(|_| sample_with_temperature(&probs, 1.0, &mut rng) == 1)
            .count();
        let frac = ones as f32 / 4000.0;
        assert!((frac - 0.75).abs() < 0.05, "observed {frac}");
    }

    #[test]
    fn test_argmax_ties_lowest() {
        assert_eq!(argmax(&[0.5, 0.5, 0.1]), 0);
        assert_eq!(argmax(&[]), 0);
    }

    proptest! {
        #[test]
        fn prop_one_hot_returns_hot_index(len in 1usize..40, seed in any::<u64>(), k_frac in 0.0f64..1.0) {
            let k = ((len as f64 * k_frac) as usize).min(len - 1);
            let mut probs = vec![0.0f32; len];
            probs[k] = 1.0;
            let mut rng = StdRng::seed_from_u64(seed);
            prop_assert_eq!(sample_with_temperature(&probs, 1.0, &mut rng), k);
        }

        #[test]
        fn prop_index_in_range(probs in proptest::collection::vec(0.0f32..1.0, 1..30), t in 0.1f32..3.0, seed in any::<u64>()) {
            let mut rng = StdRng::seed_from_u64(seed);
            prop_assert!(sample_with_temperature(&probs, t, &mut rng) < probs.len());
        }
    }
}
