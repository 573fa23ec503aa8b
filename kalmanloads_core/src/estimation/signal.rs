// kalmanloads_core/src/estimation/signal.rs

use nalgebra::DVector;
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};

use crate::types::Trajectory;

/// Trailing moving average over `window` samples.
///
/// The signal is front-padded with its first value so the output has the
/// same length as the input and `out[i]` only depends on `x[..=i]`.
pub fn moving_average(x: &[f64], window: usize) -> Vec<f64> {
    let Some(&first) = x.first() else {
        return Vec::new();
    };
    let n = window.max(1);
    let mut out = Vec::with_capacity(x.len());
    let mut sum = first * n as f64;
    for i in 0..x.len() {
        let entering = x[i];
        let leaving = if i >= n { x[i - n] } else { first };
        sum += entering - leaving;
        out.push(sum / n as f64);
    }
    out
}

/// `clean + factor · σ_row · N(0, 1)` for every entry of a channel-by-sample
/// trajectory. Draws are taken row by row from `rng`.
///
/// A zero factor returns the clean values unchanged and draws nothing.
pub fn add_measurement_noise<R: Rng + ?Sized>(
    clean: &Trajectory,
    sigmas: &DVector<f64>,
    factor: f64,
    rng: &mut R,
) -> Trajectory {
    let mut noisy = clean.clone();
    if factor == 0.0 {
        return noisy;
    }
    for (i, mut row) in noisy.row_iter_mut().enumerate() {
        let scale = factor * sigmas[i];
        for v in row.iter_mut() {
            let z: f64 = StandardNormal.sample(rng);
            *v += scale * z;
        }
    }
    noisy
}
