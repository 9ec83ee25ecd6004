use ndarray::Array2;
use rand::prelude::*;

use crate::features::schema::{N_FEATURES, REFERENCE_CENTER, SYNTHETIC_SPREAD};

/// Draws `rows` samples from independent normals centred on
/// [`REFERENCE_CENTER`] with [`SYNTHETIC_SPREAD`] standard deviations.
/// The same seed always yields the same matrix.
pub fn synthetic_population(rows: usize, seed: u64) -> Array2<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    Array2::from_shape_fn((rows, N_FEATURES), |(_, j)| {
        REFERENCE_CENTER[j] + SYNTHETIC_SPREAD[j] * standard_normal(&mut rng)
    })
}

// Box-Muller transform
fn standard_normal<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    let u1 = rng.gen::<f64>().max(1e-12);
    let u2 = rng.gen::<f64>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}
