//! Error taxonomy for the core engine.
//!
//! Three kinds, per the contract: a caller-supplied parameter violating an
//! invariant is a [`ConfigurationError`]; an image shape incompatible with
//! the requested windows or clocking order is a [`DimensionError`]; and a
//! watermark invariant broken by a bug (never expected under valid inputs)
//! is an [`InternalConsistencyError`]. All three are unified behind
//! [`ArcticError`] so every public entry point has a single `Result` type.

/// Top-level error type returned by [`crate::add_cti`] and [`crate::remove_cti`].
#[derive(Debug, thiserror::Error)]
pub enum ArcticError {
    /// A caller-supplied parameter violates a documented invariant.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    /// Image dimensions are incompatible with the requested windows or
    /// clocking order.
    #[error(transparent)]
    Dimension(#[from] DimensionError),
    /// A watermark invariant was violated by a bug, not by caller input.
    #[error(transparent)]
    InternalConsistency(#[from] InternalConsistencyError),
}

/// Invalid caller-supplied configuration, surfaced before any mutation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    /// Trap density must be non-negative.
    #[error("trap density must be >= 0 (got {0})")]
    NegativeDensity(f64),
    /// Release timescale must be strictly positive.
    #[error("release timescale must be > 0 (got {0})")]
    NonPositiveReleaseTimescale(f64),
    /// Capture timescale must be non-negative.
    #[error("capture timescale must be >= 0 (got {0})")]
    NegativeCaptureTimescale(f64),
    /// Log-normal sigma must be non-negative.
    #[error("release timescale sigma must be >= 0 (got {0})")]
    NegativeSigma(f64),
    /// CCD phase full-well depth must exceed the notch depth.
    #[error("full_well_depth ({fwd}) must be > well_notch_depth ({notch})")]
    FullWellNotAboveNotch { fwd: f64, notch: f64 },
    /// CCD phase well-fill power must be non-negative.
    #[error("well_fill_power must be >= 0 (got {0})")]
    NegativeWellFillPower(f64),
    /// `first_electron_fill` must lie in `[0, 1]`.
    #[error("first_electron_fill must be in [0, 1] (got {0})")]
    FirstElectronFillOutOfRange(f64),
    /// Number of CCD phases does not match the ROE's dwell-time sequence.
    #[error("CCD has {ccd_phases} phases but ROE has {roe_phases} dwell times")]
    PhaseCountMismatch { ccd_phases: usize, roe_phases: usize },
    /// `fraction_of_traps_per_phase` does not sum to 1 within tolerance.
    #[error("fraction_of_traps_per_phase must sum to 1 within 1e-6 (got {0})")]
    TrapFractionsDoNotSumToOne(f64),
    /// A requested window lies outside the image.
    #[error("window [{start}, {stop}) is outside the image's {axis} range 0..{len}")]
    WindowOutsideImage {
        axis: &'static str,
        start: i64,
        stop: i64,
        len: usize,
    },
    /// Neither a parallel nor a serial clocking block was supplied.
    #[error("at least one of parallel or serial clocking parameters must be present")]
    NoClockingDirectionRequested,
    /// `n_iterations` passed to the corrector must be at least 1.
    #[error("n_iterations must be >= 1 (got {0})")]
    NonPositiveIterationCount(u32),
    /// Pruning threshold must be non-negative.
    #[error("prune_n_electrons must be >= 0 (got {0})")]
    NegativePruneThreshold(f64),
    /// Pruning frequency must be at least 1 (0 would never prune via modulo).
    #[error("prune_frequency must be >= 1 (got {0})")]
    NonPositivePruneFrequency(u64),
    /// A `TrapPumping` ROE must pump at least once.
    #[error("n_pumps must be >= 1 for a trap-pumping ROE (got {0})")]
    NonPositivePumpCount(u64),
}

/// Image dimensions incompatible with windows or invocation order.
#[derive(Debug, thiserror::Error)]
pub enum DimensionError {
    /// The image has zero rows or zero columns.
    #[error("image must have at least one row and one column (got {rows}x{cols})")]
    EmptyImage { rows: usize, cols: usize },
    /// `window_start >= window_stop` after resolving negative indices.
    #[error("window_start ({start}) must be < window_stop ({stop})")]
    EmptyWindow { start: i64, stop: i64 },
    /// `overscan_start` is out of range for the image.
    #[error("overscan_start ({overscan_start}) must be < {len} or -1 for none")]
    OverscanOutOfRange { overscan_start: i64, len: usize },
}

/// A watermark invariant was violated; indicates a bug, not bad input.
///
/// Per spec: never silently swallowed. These are only ever raised from
/// `debug_assert!`-style checks that have already detected the problem, so
/// the description carries enough state to diagnose it.
#[derive(Debug, thiserror::Error)]
pub enum InternalConsistencyError {
    /// Cumulative watermark volumes are not strictly ascending in `[0, 1]`.
    #[error("watermark volumes not strictly ascending: {0:?}")]
    VolumesNotAscending(Vec<f64>),
    /// A watermark's cumulative volume left `[0, 1]`.
    #[error("watermark volume {0} outside [0, 1]")]
    VolumeOutOfRange(f64),
    /// A fill fraction left `[0, 1]`.
    #[error("fill fraction {0} outside [0, 1]")]
    FillOutOfRange(f64),
    /// The occupancy store was expected to be empty (single watermark at
    /// volume 0 with zero fill) but was not.
    #[error("occupancy store not empty after emptying: {0:?}")]
    NotEmptyAfterEmpty(String),
}
