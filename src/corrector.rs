//! Iterative CTI removal (spec §4.5).
//!
//! `remove_cti` has no closed-form inverse for `add_cti`; instead it
//! refines an estimate of the pristine image by repeatedly re-running the
//! forward model and feeding back the residual (spec §4.5, "Algorithm").

use ndarray::Array2;
use tracing::debug;

use crate::error::{ArcticError, ConfigurationError};

/// One forward-model pass, abstracted so [`iterate`] doesn't need to know
/// about parallel/serial direction plumbing.
pub trait Forward {
    fn add_cti(&self, image: &Array2<f64>) -> Result<Array2<f64>, ArcticError>;
}

/// Refine `observed` into an estimate of the CTI-free image using
/// `n_iterations` passes of `forward` (spec §4.5 algorithm):
///
/// ```text
/// estimate = observed
/// for i in 0..n_iterations:
///     modeled = forward(estimate)
///     estimate = estimate + (observed - modeled)
///     if i == 0 and !allow_negative_pixels: estimate = estimate.max(0)
/// ```
pub fn iterate(
    observed: &Array2<f64>,
    n_iterations: u32,
    allow_negative_pixels: bool,
    forward: &dyn Forward,
) -> Result<Array2<f64>, ArcticError> {
    if n_iterations == 0 {
        return Err(ConfigurationError::NonPositiveIterationCount(n_iterations).into());
    }
    let mut estimate = observed.clone();
    for i in 0..n_iterations {
        let modeled = forward.add_cti(&estimate)?;
        let residual = observed - &modeled;
        estimate = &estimate + &residual;
        if i == 0 && !allow_negative_pixels {
            estimate.mapv_inplace(|v| v.max(0.0));
        }
        let max_abs_residual = residual.iter().fold(0.0_f64, |acc, &v| acc.max(v.abs()));
        debug!(iteration = i, max_abs_residual, "remove_cti iteration");
    }
    Ok(estimate)
}
