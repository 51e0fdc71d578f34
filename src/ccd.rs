//! CCD fill model (spec §3, §4.2): maps an electron count in a pixel phase
//! to the fractional pixel volume occupied by the charge cloud.

use crate::error::ConfigurationError;

/// One potential well within a pixel (spec §3 `CCDPhase`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CCDPhase {
    full_well_depth: f64,
    well_notch_depth: f64,
    well_fill_power: f64,
    first_electron_fill: f64,
}

impl CCDPhase {
    /// Construct a phase, validating `fwd > notch`, `p >= 0`, and
    /// `0 <= first_electron_fill <= 1` (spec §3 invariants).
    ///
    /// `first_electron_fill` defaults to `0` when unspecified by callers
    /// using [`CCDPhase::new`] — the original source versions that predate
    /// this parameter behave identically (spec §9, open question (iii)).
    pub fn new(
        full_well_depth: f64,
        well_notch_depth: f64,
        well_fill_power: f64,
    ) -> Result<Self, ConfigurationError> {
        Self::with_first_electron_fill(full_well_depth, well_notch_depth, well_fill_power, 0.0)
    }

    /// Construct a phase with an explicit `first_electron_fill`.
    pub fn with_first_electron_fill(
        full_well_depth: f64,
        well_notch_depth: f64,
        well_fill_power: f64,
        first_electron_fill: f64,
    ) -> Result<Self, ConfigurationError> {
        if !(full_well_depth > well_notch_depth) {
            return Err(ConfigurationError::FullWellNotAboveNotch {
                fwd: full_well_depth,
                notch: well_notch_depth,
            });
        }
        if well_fill_power < 0.0 {
            return Err(ConfigurationError::NegativeWellFillPower(well_fill_power));
        }
        if !(0.0..=1.0).contains(&first_electron_fill) {
            return Err(ConfigurationError::FirstElectronFillOutOfRange(
                first_electron_fill,
            ));
        }
        Ok(CCDPhase {
            full_well_depth,
            well_notch_depth,
            well_fill_power,
            first_electron_fill,
        })
    }

    /// Fractional pixel-potential-well volume occupied by `n_e` electrons
    /// (spec §4.2):
    /// `v(n_e) = fef + (1 - fef) * clip((n_e - notch) / (fwd - notch), 0, 1) ^ p`.
    #[inline]
    pub fn volume_fraction(&self, n_e: f64) -> f64 {
        if n_e <= self.well_notch_depth {
            return self.first_electron_fill;
        }
        let span = self.full_well_depth - self.well_notch_depth;
        let x = ((n_e - self.well_notch_depth) / span).clamp(0.0, 1.0);
        self.first_electron_fill + (1.0 - self.first_electron_fill) * x.powf(self.well_fill_power)
    }

    /// The configured full-well depth.
    pub fn full_well_depth(&self) -> f64 {
        self.full_well_depth
    }
}

/// A CCD, as an ordered sequence of phases plus the fraction of traps
/// active in each (spec §3 `CCD`).
#[derive(Debug, Clone)]
pub struct CCD {
    phases: Vec<CCDPhase>,
    fraction_of_traps_per_phase: Vec<f64>,
}

impl CCD {
    /// Construct a multi-phase CCD, validating that
    /// `fraction_of_traps_per_phase` sums to 1 within `1e-6` and has one
    /// entry per phase.
    pub fn new(
        phases: Vec<CCDPhase>,
        fraction_of_traps_per_phase: Vec<f64>,
    ) -> Result<Self, ConfigurationError> {
        if phases.len() != fraction_of_traps_per_phase.len() {
            return Err(ConfigurationError::PhaseCountMismatch {
                ccd_phases: phases.len(),
                roe_phases: fraction_of_traps_per_phase.len(),
            });
        }
        let sum: f64 = fraction_of_traps_per_phase.iter().sum();
        if (sum - 1.0).abs() > 1e-6 {
            return Err(ConfigurationError::TrapFractionsDoNotSumToOne(sum));
        }
        Ok(CCD {
            phases,
            fraction_of_traps_per_phase,
        })
    }

    /// A single-phase CCD with all traps in that one phase.
    pub fn single_phase(phase: CCDPhase) -> Self {
        CCD {
            phases: vec![phase],
            fraction_of_traps_per_phase: vec![1.0],
        }
    }

    /// The number of phases per pixel.
    pub fn n_phases(&self) -> usize {
        self.phases.len()
    }

    /// The phases, in clocking order.
    pub fn phases(&self) -> &[CCDPhase] {
        &self.phases
    }

    /// The fraction of each species' trap density active in phase `p`.
    pub fn fraction_of_traps_per_phase(&self) -> &[f64] {
        &self.fraction_of_traps_per_phase
    }
}
