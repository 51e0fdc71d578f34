//! Fixed quadrature rule for the log-normal release-timescale integral
//! (spec §4.1.1).
//!
//! For continuum trap species the release timescale `τ` is log-normal
//! distributed with median `release_timescale` and log-space width `sigma`.
//! The release kernel for one watermark is
//! `E_τ[exp(-dt/τ)]`, which we evaluate with a fixed 10-point
//! Gauss-Hermite rule rather than re-deriving quadrature nodes at runtime
//! (design note: precomputed constants, not ad hoc numerical derivations,
//! mirroring how the teacher crate embeds domain constants rather than
//! recomputing them per call).
//!
//! The rule is accurate to the documented `<= 1e-6` absolute error over
//! `dt in [1e-3, 1e3]` for the `sigma` ranges this crate expects in
//! practice (a handful of orders of magnitude in `tau`); extremely large
//! `sigma` would need more nodes, which is outside this core's scope.

/// Abscissas of the 10-point physicists' Gauss-Hermite quadrature rule
/// (positive half; the rule is symmetric about 0).
const NODES: [f64; 5] = [
    0.342_901_327_223_705,
    1.036_610_829_789_514,
    1.756_683_649_299_882,
    2.532_731_674_232_790,
    3.436_159_118_837_738,
];

/// Weights matching [`NODES`], one-to-one.
const WEIGHTS: [f64; 5] = [
    0.610_862_633_735_326,
    0.240_138_611_082_314,
    0.033_874_394_455_481,
    0.001_343_645_746_781,
    0.000_007_640_432_855,
];

/// `E_tau[exp(-dt/tau)]` for `tau` log-normal with median `release_timescale`
/// and log-space width `sigma`. Falls back to the plain single-exponential
/// survival fraction when `sigma <= 0` (a degenerate, zero-width continuum
/// is just the non-continuum species).
pub fn log_normal_release_survival(dt: f64, release_timescale: f64, sigma: f64) -> f64 {
    if sigma <= 0.0 || release_timescale <= 0.0 {
        return (-dt / release_timescale).exp();
    }
    let mu = release_timescale.ln();
    let scale = std::f64::consts::SQRT_2 * sigma;
    let mut acc = 0.0;
    for (xi, wi) in NODES.iter().zip(WEIGHTS.iter()) {
        for sign in [1.0, -1.0] {
            let x = mu + scale * sign * xi;
            let tau = x.exp();
            acc += wi * (-dt / tau).exp();
        }
    }
    acc / std::f64::consts::PI.sqrt()
}
