//! Trap species: parameterised models of defect populations.
//!
//! Four variants (spec §3), dispatched through the small [`TrapKinetics`]
//! capability trait rather than a runtime type tag — design note "runtime
//! type tagging → sealed variants": dispatch happens once per row in the
//! clocker, not once per watermark.

use crate::error::ConfigurationError;
use crate::quadrature::log_normal_release_survival;

/// One parameterised trap species (spec §3).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TrapSpecies {
    /// Capture completes within one dwell; release is single-exponential.
    InstantCapture {
        /// Traps per pixel.
        density: f64,
        /// Release timescale, in pixel-transfer units.
        release_timescale: f64,
        /// Cloud-volume fraction below which this species is unexposed.
        volume_none_exposed: f64,
        /// Cloud-volume fraction above which this species is fully exposed.
        volume_full_exposed: f64,
    },
    /// Capture is exponential with its own timescale.
    SlowCapture {
        /// Traps per pixel.
        density: f64,
        /// Release timescale, in pixel-transfer units.
        release_timescale: f64,
        /// Capture timescale, in pixel-transfer units.
        capture_timescale: f64,
    },
    /// Instant capture, but release times are log-normal distributed.
    InstantCaptureContinuum {
        /// Traps per pixel.
        density: f64,
        /// Mean of the log-normal release-timescale distribution.
        release_timescale: f64,
        /// Width (sigma) of the log-normal release-timescale distribution.
        sigma: f64,
    },
    /// Both slow capture and a log-normal release-timescale distribution.
    SlowCaptureContinuum {
        /// Traps per pixel.
        density: f64,
        /// Mean of the log-normal release-timescale distribution.
        release_timescale: f64,
        /// Width (sigma) of the log-normal release-timescale distribution.
        sigma: f64,
        /// Capture timescale, in pixel-transfer units.
        capture_timescale: f64,
    },
}

impl TrapSpecies {
    /// Construct an instant-capture trap, validating the invariants in
    /// spec §3 (`density >= 0`, `release_timescale > 0`).
    pub fn instant_capture(
        density: f64,
        release_timescale: f64,
    ) -> Result<Self, ConfigurationError> {
        Self::instant_capture_windowed(density, release_timescale, 0.0, 0.0)
    }

    /// Instant-capture trap with explicit volume-screening window (spec §4.1.2).
    pub fn instant_capture_windowed(
        density: f64,
        release_timescale: f64,
        volume_none_exposed: f64,
        volume_full_exposed: f64,
    ) -> Result<Self, ConfigurationError> {
        validate_density(density)?;
        validate_release_timescale(release_timescale)?;
        Ok(TrapSpecies::InstantCapture {
            density,
            release_timescale,
            volume_none_exposed,
            volume_full_exposed,
        })
    }

    /// Construct a slow-capture trap.
    pub fn slow_capture(
        density: f64,
        release_timescale: f64,
        capture_timescale: f64,
    ) -> Result<Self, ConfigurationError> {
        validate_density(density)?;
        validate_release_timescale(release_timescale)?;
        validate_capture_timescale(capture_timescale)?;
        Ok(TrapSpecies::SlowCapture {
            density,
            release_timescale,
            capture_timescale,
        })
    }

    /// Construct an instant-capture trap with log-normal release times.
    pub fn instant_capture_continuum(
        density: f64,
        release_timescale: f64,
        sigma: f64,
    ) -> Result<Self, ConfigurationError> {
        validate_density(density)?;
        validate_release_timescale(release_timescale)?;
        validate_sigma(sigma)?;
        Ok(TrapSpecies::InstantCaptureContinuum {
            density,
            release_timescale,
            sigma,
        })
    }

    /// Construct a slow-capture trap with log-normal release times.
    pub fn slow_capture_continuum(
        density: f64,
        release_timescale: f64,
        sigma: f64,
        capture_timescale: f64,
    ) -> Result<Self, ConfigurationError> {
        validate_density(density)?;
        validate_release_timescale(release_timescale)?;
        validate_sigma(sigma)?;
        validate_capture_timescale(capture_timescale)?;
        Ok(TrapSpecies::SlowCaptureContinuum {
            density,
            release_timescale,
            sigma,
            capture_timescale,
        })
    }

    /// Traps per pixel.
    #[inline]
    pub fn density(&self) -> f64 {
        match *self {
            TrapSpecies::InstantCapture { density, .. }
            | TrapSpecies::SlowCapture { density, .. }
            | TrapSpecies::InstantCaptureContinuum { density, .. }
            | TrapSpecies::SlowCaptureContinuum { density, .. } => density,
        }
    }

    /// This species with `density` multiplied by `fraction` (spec §4.2
    /// `fraction_of_traps_per_phase`); every other parameter is unchanged.
    #[inline]
    pub fn scaled_density(&self, fraction: f64) -> Self {
        match *self {
            TrapSpecies::InstantCapture {
                density,
                release_timescale,
                volume_none_exposed,
                volume_full_exposed,
            } => TrapSpecies::InstantCapture {
                density: density * fraction,
                release_timescale,
                volume_none_exposed,
                volume_full_exposed,
            },
            TrapSpecies::SlowCapture {
                density,
                release_timescale,
                capture_timescale,
            } => TrapSpecies::SlowCapture {
                density: density * fraction,
                release_timescale,
                capture_timescale,
            },
            TrapSpecies::InstantCaptureContinuum {
                density,
                release_timescale,
                sigma,
            } => TrapSpecies::InstantCaptureContinuum {
                density: density * fraction,
                release_timescale,
                sigma,
            },
            TrapSpecies::SlowCaptureContinuum {
                density,
                release_timescale,
                sigma,
                capture_timescale,
            } => TrapSpecies::SlowCaptureContinuum {
                density: density * fraction,
                release_timescale,
                sigma,
                capture_timescale,
            },
        }
    }

    /// Fraction of currently-trapped charge that survives a dwell of `dt`
    /// (spec §4.1: `release(dt)`; continuum species integrate over the
    /// log-normal distribution of release timescales, spec §4.1.1).
    #[inline]
    pub fn release_survival_fraction(&self, dt: f64) -> f64 {
        match *self {
            TrapSpecies::InstantCapture {
                release_timescale, ..
            }
            | TrapSpecies::SlowCapture {
                release_timescale, ..
            } => (-dt / release_timescale).exp(),
            TrapSpecies::InstantCaptureContinuum {
                release_timescale,
                sigma,
                ..
            }
            | TrapSpecies::SlowCaptureContinuum {
                release_timescale,
                sigma,
                ..
            } => log_normal_release_survival(dt, release_timescale, sigma),
        }
    }

    /// Whether this species captures within a single dwell (true) or
    /// exponentially with its own `capture_timescale` (false).
    #[inline]
    pub fn captures_instantly(&self) -> bool {
        matches!(
            self,
            TrapSpecies::InstantCapture { .. } | TrapSpecies::InstantCaptureContinuum { .. }
        )
    }

    /// The capture timescale for slow-capture species (0 for instant ones).
    #[inline]
    pub fn capture_timescale(&self) -> f64 {
        match *self {
            TrapSpecies::SlowCapture {
                capture_timescale, ..
            }
            | TrapSpecies::SlowCaptureContinuum {
                capture_timescale, ..
            } => capture_timescale,
            TrapSpecies::InstantCapture { .. } | TrapSpecies::InstantCaptureContinuum { .. } => {
                0.0
            }
        }
    }

    /// New fill fraction after exposing a previous fill to a filling cloud
    /// for duration `dt` (spec §4.1: instant species set fill to 1 below
    /// `V_cloud`; slow-capture species evolve exponentially).
    #[inline]
    pub fn fill_after_capture(&self, previous_fill: f64, dt: f64) -> f64 {
        if self.captures_instantly() {
            1.0
        } else {
            let tau_c = self.capture_timescale();
            if tau_c <= 0.0 {
                1.0
            } else {
                previous_fill + (1.0 - previous_fill) * (1.0 - (-dt / tau_c).exp())
            }
        }
    }

    /// Whether capture is suppressed at cloud volume `volume` (spec §4.1.2,
    /// `InstantCapture` only; all other species are always exposed).
    #[inline]
    pub fn capture_suppressed_at(&self, volume: f64) -> bool {
        match *self {
            TrapSpecies::InstantCapture {
                volume_none_exposed,
                volume_full_exposed,
                ..
            } => {
                volume_full_exposed > volume_none_exposed
                    && volume >= volume_none_exposed
                    && volume <= volume_full_exposed
            }
            _ => false,
        }
    }
}

fn validate_density(density: f64) -> Result<(), ConfigurationError> {
    if density < 0.0 {
        Err(ConfigurationError::NegativeDensity(density))
    } else {
        Ok(())
    }
}

fn validate_release_timescale(tau: f64) -> Result<(), ConfigurationError> {
    if tau <= 0.0 {
        Err(ConfigurationError::NonPositiveReleaseTimescale(tau))
    } else {
        Ok(())
    }
}

fn validate_capture_timescale(tau_c: f64) -> Result<(), ConfigurationError> {
    if tau_c < 0.0 {
        Err(ConfigurationError::NegativeCaptureTimescale(tau_c))
    } else {
        Ok(())
    }
}

fn validate_sigma(sigma: f64) -> Result<(), ConfigurationError> {
    if sigma < 0.0 {
        Err(ConfigurationError::NegativeSigma(sigma))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_invalid_parameters() {
        assert!(TrapSpecies::instant_capture(-1.0, 1.0).is_err());
        assert!(TrapSpecies::instant_capture(1.0, 0.0).is_err());
        assert!(TrapSpecies::slow_capture(1.0, 1.0, -1.0).is_err());
        assert!(TrapSpecies::instant_capture_continuum(1.0, 1.0, -1.0).is_err());
    }

    #[test]
    fn release_survival_matches_single_exponential() {
        let tau = -1.0 / 0.5_f64.ln();
        let trap = TrapSpecies::instant_capture(10.0, tau).unwrap();
        // After one release_timescale, survival fraction is exp(-1) by definition of tau.
        let expected = (-1.0_f64).exp();
        assert!((trap.release_survival_fraction(tau) - expected).abs() < 1e-12);
    }

    #[test]
    fn instant_capture_sets_full_fill() {
        let trap = TrapSpecies::instant_capture(1.0, 1.0).unwrap();
        assert_eq!(trap.fill_after_capture(0.0, 100.0), 1.0);
    }

    #[test]
    fn slow_capture_approaches_full_fill_asymptotically() {
        let trap = TrapSpecies::slow_capture(1.0, 1.0, 2.0).unwrap();
        let f1 = trap.fill_after_capture(0.0, 2.0);
        let f2 = trap.fill_after_capture(0.0, 2000.0);
        assert!(f1 > 0.0 && f1 < 1.0);
        assert!(f2 > 0.999);
    }

    #[test]
    fn volume_window_suppresses_instant_capture() {
        let trap =
            TrapSpecies::instant_capture_windowed(1.0, 1.0, 0.2, 0.4).unwrap();
        assert!(trap.capture_suppressed_at(0.3));
        assert!(!trap.capture_suppressed_at(0.1));
        assert!(!trap.capture_suppressed_at(0.5));
    }
}
