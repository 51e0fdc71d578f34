//! Watermark occupancy store (spec §3, §4.1).
//!
//! A pixel phase's trap-fill state is recorded as an ordered list of
//! watermarks, each the upper bound of a volume bin over which every trap
//! species' fill fraction is uniform. The implicit lower bound of the first
//! bin is volume 0; an empty list of marks is the canonical "nothing
//! trapped" state, equivalent to the single watermark `(0, 0)` required by
//! spec invariant (iv) — there is no bin to subdivide until some capture
//! raises the cloud volume above 0, so representing "empty" as "no marks"
//! avoids carrying a redundant always-present zero entry through every
//! operation (design note "pre-sized ring or arena": the common case is a
//! handful of marks, so a [`SmallVec`] avoids a heap allocation per pixel
//! phase for typical images).
use smallvec::SmallVec;

use crate::traps::TrapSpecies;

/// Inline capacity before [`Watermarks`] falls back to a heap allocation.
/// Chosen generously above the handful of bins a typical pruning cadence
/// leaves in place.
const INLINE_WATERMARKS: usize = 8;

#[derive(Debug, Clone, PartialEq)]
struct Watermark {
    /// Cumulative volume fraction at the top of this bin, in `(0, 1]`.
    volume: f64,
    /// Fill fraction per species, one-to-one with the species slice passed
    /// to every operation.
    fill: SmallVec<[f64; 4]>,
}

/// Per-pixel-phase trap occupancy, one bin per watermark (spec §3).
#[derive(Debug, Clone, PartialEq)]
pub struct Watermarks {
    n_species: usize,
    marks: SmallVec<[Watermark; INLINE_WATERMARKS]>,
}

impl Watermarks {
    /// A fresh occupancy store with nothing trapped (spec §4.1 `empty()`).
    pub fn new(n_species: usize) -> Self {
        Watermarks {
            n_species,
            marks: SmallVec::new(),
        }
    }

    /// Reset occupancy to the single watermark `(0, 0)`.
    pub fn empty(&mut self) {
        self.marks.clear();
    }

    /// Whether the store currently holds no trapped charge.
    pub fn is_empty(&self) -> bool {
        self.marks.is_empty()
    }

    /// Cumulative volumes of the current watermarks, strictly ascending in
    /// `(0, 1]` (spec invariant (i); `(0, 1]` rather than `[0, 1]` because we
    /// never store the implicit `0` lower bound explicitly).
    pub fn volumes(&self) -> Vec<f64> {
        self.marks.iter().map(|w| w.volume).collect()
    }

    /// Bound electrons for one species, integrated up to cloud volume `V`
    /// (spec §4.1 `n_trapped_electrons`), including the partial bin that
    /// straddles `V`.
    pub fn n_trapped_electrons(&self, volume: f64, species_idx: usize, density: f64) -> f64 {
        let mut prev = 0.0;
        let mut total = 0.0;
        for w in &self.marks {
            if w.volume <= volume {
                total += (w.volume - prev) * density * w.fill[species_idx];
                prev = w.volume;
            } else {
                total += (volume - prev) * density * w.fill[species_idx];
                return total;
            }
        }
        total
    }

    /// Total bound electrons across every species and the full `[0, 1]`
    /// volume range (used by the charge-conservation property, spec §8 P1).
    pub fn total_bound_electrons(&self, species: &[TrapSpecies]) -> f64 {
        let mut prev = 0.0;
        let mut total = 0.0;
        for w in &self.marks {
            let width = w.volume - prev;
            for (i, sp) in species.iter().enumerate() {
                total += width * sp.density() * w.fill[i];
            }
            prev = w.volume;
        }
        total
    }

    /// Apply release to every existing watermark for duration `dt`,
    /// returning the total electrons liberated across all species and bins
    /// (spec §4.1 `release(dt)`).
    pub fn release(&mut self, dt: f64, species: &[TrapSpecies]) -> f64 {
        debug_assert_eq!(species.len(), self.n_species);
        let mut released = 0.0;
        let mut prev = 0.0;
        for w in self.marks.iter_mut() {
            let width = w.volume - prev;
            for (i, sp) in species.iter().enumerate() {
                let survival = sp.release_survival_fraction(dt);
                let old_fill = w.fill[i];
                let new_fill = old_fill * survival;
                released += width * sp.density() * (old_fill - new_fill);
                w.fill[i] = new_fill;
            }
            prev = w.volume;
        }
        self.merge_adjacent_equal();
        released.max(0.0)
    }

    /// Expose all traps below cloud volume `v_cloud` to a filling cloud for
    /// duration `dt`, updating fills and returning total electrons captured
    /// (spec §4.1 `capture`). Splits or extends watermarks as needed (spec
    /// §4.1 "Watermark management").
    pub fn capture(&mut self, v_cloud: f64, dt: f64, species: &[TrapSpecies]) -> f64 {
        debug_assert_eq!(species.len(), self.n_species);
        if v_cloud <= 0.0 {
            return 0.0;
        }
        let mut captured = 0.0;
        let mut prev = 0.0;
        let mut idx = 0;
        while idx < self.marks.len() && self.marks[idx].volume <= v_cloud {
            let width = self.marks[idx].volume - prev;
            for (i, sp) in species.iter().enumerate() {
                if sp.capture_suppressed_at(v_cloud) {
                    continue;
                }
                let old_fill = self.marks[idx].fill[i];
                let new_fill = sp.fill_after_capture(old_fill, dt);
                captured += width * sp.density() * (new_fill - old_fill);
                self.marks[idx].fill[i] = new_fill;
            }
            prev = self.marks[idx].volume;
            idx += 1;
        }
        if v_cloud - prev > 1e-15 {
            let mut fill: SmallVec<[f64; 4]> = if idx < self.marks.len() {
                self.marks[idx].fill.clone()
            } else {
                smallvec::smallvec![0.0; species.len()]
            };
            for (i, sp) in species.iter().enumerate() {
                if sp.capture_suppressed_at(v_cloud) {
                    continue;
                }
                let old_fill = fill[i];
                let new_fill = sp.fill_after_capture(old_fill, dt);
                captured += (v_cloud - prev) * sp.density() * (new_fill - old_fill);
                fill[i] = new_fill;
            }
            self.marks.insert(
                idx,
                Watermark {
                    volume: v_cloud,
                    fill,
                },
            );
        }
        self.merge_adjacent_equal();
        captured.max(0.0)
    }

    /// Combined release-then-capture step used by the clocker (spec §4.1
    /// `capture_release`). Returns the net electrons added to the pixel
    /// (release minus capture).
    pub fn capture_release(&mut self, v_cloud: f64, dt: f64, species: &[TrapSpecies]) -> f64 {
        let released = self.release(dt, species);
        let captured = self.capture(v_cloud, dt, species);
        released - captured
    }

    /// Discard watermarks whose contribution to every species falls below
    /// `threshold_electrons` (spec §4.1 pruning; design note (ii): "discard
    /// watermarks whose contribution to every species is below threshold").
    /// A discarded bin is folded into its upper neighbour, which keeps the
    /// volume axis contiguous at the cost of losing that bin's distinct
    /// fill — pruning is a performance control, not bit-exact (spec §4.1).
    pub fn prune(&mut self, threshold_electrons: f64, species: &[TrapSpecies]) {
        if self.marks.is_empty() {
            return;
        }
        let mut prev = 0.0;
        let mut result: SmallVec<[Watermark; INLINE_WATERMARKS]> = SmallVec::new();
        for w in self.marks.iter() {
            let width = w.volume - prev;
            let max_contrib = species
                .iter()
                .enumerate()
                .fold(0.0_f64, |acc, (i, sp)| acc.max(width * sp.density() * w.fill[i]));
            if max_contrib < threshold_electrons {
                if let Some(last) = result.last_mut() {
                    last.volume = w.volume;
                }
            } else {
                result.push(w.clone());
            }
            prev = w.volume;
        }
        self.marks = result;
    }

    /// Merge adjacent watermarks whose fills agree for every species (spec
    /// §4.1 "Watermark management").
    fn merge_adjacent_equal(&mut self) {
        let mut i = 0;
        while i + 1 < self.marks.len() {
            if self.marks[i].fill == self.marks[i + 1].fill {
                self.marks.remove(i);
            } else {
                i += 1;
            }
        }
    }

    /// Assert the strictly-ascending-in-`(0,1]` invariant (spec invariant
    /// (i)); used by tests and available to callers who want extra
    /// assurance in debug builds.
    pub fn check_ordering(&self) -> Result<(), crate::error::InternalConsistencyError> {
        let mut prev = 0.0;
        for w in &self.marks {
            if w.volume <= prev || w.volume > 1.0 {
                return Err(crate::error::InternalConsistencyError::VolumesNotAscending(
                    self.volumes(),
                ));
            }
            prev = w.volume;
        }
        Ok(())
    }

    /// Assert every watermark's volume and per-species fill fractions lie
    /// within their documented ranges (spec invariants (i)-(ii)), and that
    /// [`Watermarks::empty`] really does leave nothing trapped. Cheap
    /// enough to run from a `debug_assert!` at the end of a clocking step;
    /// a bug tripping this should abort loudly rather than silently
    /// corrupt the occupancy store (spec §7: `InternalConsistencyError` is
    /// "never silently swallowed").
    pub fn check_invariants(&self) -> Result<(), crate::error::InternalConsistencyError> {
        self.check_ordering()?;
        for w in &self.marks {
            if !(0.0..=1.0).contains(&w.volume) {
                return Err(crate::error::InternalConsistencyError::VolumeOutOfRange(
                    w.volume,
                ));
            }
            for &f in &w.fill {
                if !(0.0..=1.0).contains(&f) {
                    return Err(crate::error::InternalConsistencyError::FillOutOfRange(f));
                }
            }
        }
        Ok(())
    }

    /// Assert the store is in the canonical post-[`Watermarks::empty`]
    /// state: no marks, hence no bound charge for any species.
    pub fn check_empty(&self) -> Result<(), crate::error::InternalConsistencyError> {
        if !self.marks.is_empty() {
            return Err(crate::error::InternalConsistencyError::NotEmptyAfterEmpty(
                format!("{:?}", self.marks),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traps::TrapSpecies;

    fn one_instant_trap(density: f64, tau: f64) -> Vec<TrapSpecies> {
        vec![TrapSpecies::instant_capture(density, tau).unwrap()]
    }

    #[test]
    fn empty_has_no_trapped_electrons() {
        let w = Watermarks::new(1);
        let species = one_instant_trap(10.0, 1.0);
        assert_eq!(w.n_trapped_electrons(1.0, 0, species[0].density()), 0.0);
        assert!(w.is_empty());
    }

    #[test]
    fn capture_then_release_round_trips_mass() {
        let mut w = Watermarks::new(1);
        let species = one_instant_trap(10.0, 1.0);
        let captured = w.capture(0.5, 1.0, &species);
        assert!(captured > 0.0);
        w.check_ordering().unwrap();
        let released = w.release(1e6, &species);
        assert!((released - captured).abs() < 1e-6);
    }

    #[test]
    fn empty_after_empty_call_has_no_bound_charge() {
        let mut w = Watermarks::new(1);
        let species = one_instant_trap(10.0, 1.0);
        w.capture(0.5, 1.0, &species);
        w.empty();
        assert_eq!(w.total_bound_electrons(&species), 0.0);
    }

    #[test]
    fn ordering_stays_valid_through_many_operations() {
        let mut w = Watermarks::new(1);
        let species = one_instant_trap(10.0, 1.0);
        for v in [0.1, 0.3, 0.2, 0.5, 0.9, 0.4] {
            w.capture(v, 0.3, &species);
            w.release(0.1, &species);
            w.check_ordering().unwrap();
        }
    }

    #[test]
    fn capture_is_limited_to_unsuppressed_window() {
        let species = vec![TrapSpecies::instant_capture_windowed(10.0, 1.0, 0.2, 0.4).unwrap()];
        let mut w = Watermarks::new(1);
        let captured = w.capture(0.3, 1.0, &species);
        assert_eq!(captured, 0.0);
    }

    #[test]
    fn check_invariants_passes_after_normal_operations() {
        let mut w = Watermarks::new(1);
        let species = one_instant_trap(10.0, 1.0);
        w.capture(0.5, 1.0, &species);
        w.release(0.2, &species);
        w.check_invariants().unwrap();
        w.empty();
        w.check_empty().unwrap();
    }

    #[test]
    fn pruning_removes_negligible_trailing_marks() {
        let species = one_instant_trap(1e-12, 1.0);
        let mut w = Watermarks::new(1);
        w.capture(0.1, 1.0, &species);
        w.capture(0.9, 1.0, &species);
        let before = w.volumes().len();
        w.prune(1e-6, &species);
        assert!(w.volumes().len() <= before);
    }
}
