//! The clocking loop (spec §4.4): drives one direction (parallel or serial)
//! of a single `add_cti` pass over an image.
//!
//! The transfer axis is always "rows": serial clocking is performed by
//! transposing the image before and after calling [`clock`] (spec §4.4
//! design note: "parallel/serial symmetry via transpose").

use ndarray::Array2;

use crate::ccd::CCD;
use crate::error::{ArcticError, ConfigurationError, DimensionError};
use crate::express::ExpressMatrix;
use crate::roe::ROE;
use crate::traps::TrapSpecies;
use crate::watermark::Watermarks;

/// Per-direction clocking configuration (spec §6 `parallel_*`/`serial_*`
/// parameter block).
#[derive(Debug, Clone)]
pub struct ClockConfig {
    pub express: u32,
    /// Additional transfers before row 0, on top of `roe.prescan_offset()`
    /// (spec §6 `window_offset`; kept distinct from the ROE's own prescan
    /// offset because the original call site overrides it independently of
    /// the ROE object, per `original_source/arcticpy/src/roe.py`).
    pub window_offset: u64,
    /// First column to simulate.
    pub window_start: i64,
    /// One past the last column to simulate, or `-1` for "to the end".
    pub window_stop: i64,
    /// First row to simulate.
    pub time_start: i64,
    /// One past the last row to simulate, or `-1` for "to the end".
    pub time_stop: i64,
    /// Electron threshold below which a watermark is pruned away.
    pub prune_n_electrons: f64,
    /// Prune every this-many transfers (must be `>= 1`).
    pub prune_frequency: u64,
    /// Electrons may go negative during capture (disables the pixel-floor
    /// clip described in spec §4.1 edge cases).
    pub allow_negative_pixels: bool,
}

impl ClockConfig {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.prune_n_electrons < 0.0 {
            return Err(ConfigurationError::NegativePruneThreshold(
                self.prune_n_electrons,
            ));
        }
        if self.prune_frequency == 0 {
            return Err(ConfigurationError::NonPositivePruneFrequency(
                self.prune_frequency,
            ));
        }
        Ok(())
    }
}

fn resolve_range(start: i64, stop: i64, len: usize, axis: &'static str) -> Result<(usize, usize), ArcticError> {
    if start < 0 {
        return Err(ConfigurationError::WindowOutsideImage {
            axis,
            start,
            stop,
            len,
        }
        .into());
    }
    let stop = if stop == -1 { len as i64 } else { stop };
    if stop < 0 || stop as usize > len || start as usize > len {
        return Err(ConfigurationError::WindowOutsideImage {
            axis,
            start,
            stop,
            len,
        }
        .into());
    }
    let (start, stop) = (start as usize, stop as usize);
    if start >= stop {
        return Err(DimensionError::EmptyWindow {
            start: start as i64,
            stop: stop as i64,
        }
        .into());
    }
    Ok((start, stop))
}

/// Trap species with density scaled by the phase's share of the total trap
/// population (spec §4.2 `fraction_of_traps_per_phase`).
fn scale_for_phase(species: &[TrapSpecies], fraction: f64) -> Vec<TrapSpecies> {
    species
        .iter()
        .map(|s| s.scaled_density(fraction))
        .collect()
}

/// Clock `image` along its row axis in place for one direction.
///
/// `image[(r, c)]` is row `r`, column `c`; row `0` is nearest the readout
/// register (spec §9, open question resolution: the source's "row 0 is
/// farthest from readout" prose and its own `row + 1` transfer-count
/// formula disagree, and this core follows the formula plus the worked
/// single-pixel trail example, both of which place row 0 nearest readout).
pub fn clock(
    image: &mut Array2<f64>,
    ccd: &CCD,
    roe: &ROE,
    species: &[TrapSpecies],
    cfg: &ClockConfig,
) -> Result<(), ArcticError> {
    cfg.validate()?;
    let (n_rows, n_cols) = image.dim();
    if n_rows == 0 || n_cols == 0 {
        return Err(DimensionError::EmptyImage {
            rows: n_rows,
            cols: n_cols,
        }
        .into());
    }
    let (col_start, col_stop) = resolve_range(cfg.window_start, cfg.window_stop, n_cols, "column")?;
    let (row_start, row_stop) = resolve_range(cfg.time_start, cfg.time_stop, n_rows, "row")?;

    if let Some(overscan_start) = roe.overscan_start() {
        if overscan_start as usize >= n_rows {
            return Err(DimensionError::OverscanOutOfRange {
                overscan_start: overscan_start as i64,
                len: n_rows,
            }
            .into());
        }
    }

    let offset_roe;
    let roe = if cfg.window_offset != 0 {
        offset_roe = roe_with_extra_offset(roe, cfg.window_offset)?;
        &offset_roe
    } else {
        roe
    };

    let n_phases = ccd.n_phases();
    let per_phase_species: Vec<Vec<TrapSpecies>> = ccd
        .fraction_of_traps_per_phase()
        .iter()
        .map(|&f| scale_for_phase(species, f))
        .collect();

    if roe.roe_type() == crate::roe::RoeType::TrapPumping {
        clock_trap_pumping(
            image,
            ccd,
            roe,
            &per_phase_species,
            col_start,
            col_stop,
            row_start,
            row_stop,
        );
        if !cfg.allow_negative_pixels {
            image.mapv_inplace(|v| v.max(0.0));
        }
        return Ok(());
    }

    let express_matrix = ExpressMatrix::build(roe, n_rows, cfg.express);
    let mut occupancy: Vec<Watermarks> = (0..n_phases).map(|_| Watermarks::new(species.len())).collect();
    let mut transfer_count: u64 = 0;

    for c in col_start..col_stop {
        if roe.empty_traps_between_columns() {
            for w in occupancy.iter_mut() {
                w.empty();
                debug_assert!(w.check_empty().is_ok());
            }
        }
        for e in 0..express_matrix.n_steps() {
            if e == 0 && roe.empty_traps_for_first_transfers() {
                for w in occupancy.iter_mut() {
                    w.empty();
                    debug_assert!(w.check_empty().is_ok());
                }
            }
            for r in row_start..row_stop {
                let (mult, monitor) = express_matrix.get(e, r);
                if mult == 0.0 && !monitor {
                    continue;
                }
                for p in 0..n_phases {
                    let charge = image[(r, c)];
                    let v_cloud = ccd.phases()[p].volume_fraction(charge);
                    let released = occupancy[p].release(roe.dwell_times()[p], &per_phase_species[p]);
                    let captured = occupancy[p].capture(v_cloud, roe.dwell_times()[p], &per_phase_species[p]);

                    if mult == 0.0 {
                        // Monitored zero-multiplier cell: the watermark store
                        // still ages (releases between rare express-step
                        // updates must not be forgotten), but no real
                        // transfer happens here, so the image is untouched.
                        continue;
                    }

                    let captured = captured.min(charge.max(0.0) * mult);
                    image[(r, c)] -= captured;

                    let dest_row = if roe.force_release_away_from_readout() {
                        r.checked_add(1)
                    } else {
                        Some(r)
                    };
                    if let Some(dest_row) = dest_row {
                        if dest_row < n_rows {
                            image[(dest_row, c)] += released * mult;
                        }
                        // else: released electrons fall beyond the image and
                        // are discarded (spec §9, open question (i)).
                    }
                }
                transfer_count += 1;
                if transfer_count % cfg.prune_frequency == 0 {
                    for (p, w) in occupancy.iter_mut().enumerate() {
                        w.prune(cfg.prune_n_electrons, &per_phase_species[p]);
                    }
                }
                for w in &occupancy {
                    debug_assert!(w.check_invariants().is_ok(), "{:?}", w.check_invariants());
                }
            }
        }
    }

    if !cfg.allow_negative_pixels {
        image.mapv_inplace(|v| v.max(0.0));
    }
    Ok(())
}

/// Trap-pumping mode (spec §4.3 "trap pumping"): each pixel's charge is
/// shifted forward then back `n_pumps` times, net displacement zero,
/// solely to exercise the traps it crosses.
///
/// This core has no two-row transfer primitive to reuse (every other ROE
/// type advances charge monotonically toward readout by construction), so
/// "forward then back" is realised as repeatedly walking the pixel's own
/// `n_phases` potential wells forward and back, reusing each phase's own
/// occupancy store (the express matrix is not involved: pumping's transfer
/// count does not vary with row, so there is nothing to compress).
fn clock_trap_pumping(
    image: &mut Array2<f64>,
    ccd: &CCD,
    roe: &ROE,
    per_phase_species: &[Vec<TrapSpecies>],
    col_start: usize,
    col_stop: usize,
    row_start: usize,
    row_stop: usize,
) {
    let n_phases = ccd.n_phases();
    if n_phases == 0 {
        return;
    }
    let dwell = roe.dwell_times();
    for c in col_start..col_stop {
        for r in row_start..row_stop {
            let mut occupancy: Vec<Watermarks> = (0..n_phases)
                .map(|p| Watermarks::new(per_phase_species[p].len()))
                .collect();
            for _ in 0..roe.n_pumps() {
                for p in 0..n_phases {
                    let charge = image[(r, c)];
                    let v_cloud = ccd.phases()[p].volume_fraction(charge);
                    let delta =
                        occupancy[p].capture_release(v_cloud, dwell[p], &per_phase_species[p]);
                    image[(r, c)] = charge + delta;
                }
                for p in (0..n_phases).rev() {
                    let charge = image[(r, c)];
                    let v_cloud = ccd.phases()[p].volume_fraction(charge);
                    let delta =
                        occupancy[p].capture_release(v_cloud, dwell[p], &per_phase_species[p]);
                    image[(r, c)] = charge + delta;
                }
            }
        }
    }
}

fn roe_with_extra_offset(roe: &ROE, extra: u64) -> Result<ROE, ArcticError> {
    ROE::new(
        roe.dwell_times().to_vec(),
        roe.prescan_offset() + extra,
        roe.overscan_start().map(|v| v as i64).unwrap_or(-1),
        roe.empty_traps_between_columns(),
        roe.empty_traps_for_first_transfers(),
        roe.force_release_away_from_readout(),
        roe.use_integer_express_matrix(),
        roe.roe_type(),
        roe.n_pumps(),
    )
    .map_err(ArcticError::from)
}
