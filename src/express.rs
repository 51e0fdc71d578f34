//! Express time-compression matrix (spec §4.3).
//!
//! Collapses the `r + 1` (or similar) discrete transfers physically
//! undergone by row `r` into `express` effective sub-sums. Windows and
//! express are orthogonal speedups (design note §9): this module only
//! ever skips *transfers*, never *pixels*.

use ndarray::Array2;

use crate::roe::ROE;

/// The express matrix (real-valued multiplier) plus its companion monitor
/// matrix (spec §3 "Express matrix").
#[derive(Debug, Clone)]
pub struct ExpressMatrix {
    /// Shape `(n_steps, n_rows)`; entry `(e, r)` is how many of row `r`'s
    /// physical transfers are represented by express-step `e`.
    mult: Array2<f64>,
    /// Same shape; `true` where occupancy must still evolve even though
    /// `mult == 0` (spec §4.3).
    monitor: Array2<bool>,
    physical_transfer_counts: Vec<u64>,
}

impl ExpressMatrix {
    /// Build the express matrix for `n_rows` rows under `roe`.
    ///
    /// `express == 0` means "no compression": one effective sub-transfer
    /// per physical transfer (spec §4.3), i.e. `n_steps == max(T_r)`.
    pub fn build(roe: &ROE, n_rows: usize, express: u32) -> Self {
        let physical_transfer_counts: Vec<u64> = (0..n_rows)
            .map(|r| roe.physical_transfer_count(r, n_rows))
            .collect();
        let t_max = physical_transfer_counts.iter().copied().max().unwrap_or(0);
        let n_steps = if express == 0 {
            t_max.max(1) as usize
        } else {
            (express as u64).min(t_max.max(1)) as usize
        };

        let mut mult = Array2::<f64>::zeros((n_steps, n_rows));
        // Step boundaries partition [0, t_max] into n_steps contiguous
        // intervals. Row r's own T_r transfers are right-aligned against
        // t_max (occupy the *last* T_r units of the axis), so that rows
        // needing few transfers (near readout) only appear in the final
        // steps, while rows needing many (far from readout) appear from
        // the very first step onward (spec §4.3 ordering requirement).
        let boundaries: Vec<f64> = (0..=n_steps)
            .map(|e| (e as f64) * (t_max as f64) / (n_steps as f64))
            .collect();
        for (r, &t_r) in physical_transfer_counts.iter().enumerate() {
            let lo = (t_max - t_r) as f64;
            let hi = t_max as f64;
            for e in 0..n_steps {
                let overlap = (boundaries[e + 1].min(hi) - boundaries[e].max(lo)).max(0.0);
                mult[(e, r)] = overlap;
            }
        }

        if roe.use_integer_express_matrix() {
            integerize_columns(&mut mult);
        }

        // Monitor: keep occupancy evolving through zero-multiplier cells
        // whenever the first express step does not reset it (spec §4.3:
        // "This occurs when empty_traps_for_first_transfers is false").
        let always_monitor = !roe.empty_traps_for_first_transfers();
        let monitor = mult.mapv(|m| always_monitor && m == 0.0);

        ExpressMatrix {
            mult,
            monitor,
            physical_transfer_counts,
        }
    }

    /// Number of express steps.
    pub fn n_steps(&self) -> usize {
        self.mult.shape()[0]
    }

    /// Multiplier and monitor flag for step `e`, row `r`.
    pub fn get(&self, e: usize, r: usize) -> (f64, bool) {
        (self.mult[(e, r)], self.monitor[(e, r)])
    }

    /// Sum over express-steps for row `r` (spec §8 P5: must equal the
    /// physical transfer count for that row).
    pub fn row_sum(&self, r: usize) -> f64 {
        self.mult.column(r).sum()
    }

    /// The physical (uncompressed) transfer count per row, as computed by
    /// the ROE; exposed so `row_sum` can be checked against it directly
    /// without recomputing it a second time.
    pub fn physical_transfer_count(&self, r: usize) -> u64 {
        self.physical_transfer_counts[r]
    }
}

/// Round each column to integers while preserving the column sum, using
/// the largest-remainder method (spec §4.3: "entries are integers but the
/// column sums still match physical counts; the distribution minimises
/// per-row max error").
fn integerize_columns(mult: &mut Array2<f64>) {
    let n_steps = mult.shape()[0];
    let n_rows = mult.shape()[1];
    for r in 0..n_rows {
        let target: f64 = mult.column(r).sum();
        let target_int = target.round() as i64;
        let mut floors = vec![0i64; n_steps];
        let mut remainders = vec![0.0f64; n_steps];
        let mut floor_sum = 0i64;
        for e in 0..n_steps {
            let v = mult[(e, r)];
            let f = v.floor();
            floors[e] = f as i64;
            remainders[e] = v - f;
            floor_sum += floors[e];
        }
        let mut deficit = target_int - floor_sum;
        let mut order: Vec<usize> = (0..n_steps).collect();
        order.sort_by(|&a, &b| remainders[b].partial_cmp(&remainders[a]).unwrap());
        for &e in order.iter() {
            if deficit <= 0 {
                break;
            }
            floors[e] += 1;
            deficit -= 1;
        }
        for e in 0..n_steps {
            mult[(e, r)] = floors[e] as f64;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roe::ROE;

    #[test]
    fn row_sums_match_physical_transfer_counts() {
        let roe = ROE::standard(vec![1.0]).unwrap();
        for express in [0u32, 1, 2, 5, 10, 20] {
            let m = ExpressMatrix::build(&roe, 20, express);
            for r in 0..20 {
                let sum = m.row_sum(r);
                let want = m.physical_transfer_count(r) as f64;
                assert!(
                    (sum - want).abs() < 1e-9,
                    "express={express} r={r} sum={sum} want={want}"
                );
            }
        }
    }

    #[test]
    fn integer_mode_row_sums_match_exactly() {
        let roe = ROE::new(
            vec![1.0],
            0,
            -1,
            true,
            false,
            true,
            true,
            crate::roe::RoeType::Standard,
            0,
        )
        .unwrap();
        let m = ExpressMatrix::build(&roe, 20, 5);
        for r in 0..20 {
            let sum = m.row_sum(r);
            let want = m.physical_transfer_count(r) as f64;
            assert!((sum - want).abs() < 1e-9);
        }
    }

    #[test]
    fn earlier_steps_favour_far_rows_later_steps_favour_near_rows() {
        let roe = ROE::standard(vec![1.0]).unwrap();
        let m = ExpressMatrix::build(&roe, 20, 4);
        // Row 0 (nearest, 1 transfer) should only ever appear in the last step.
        for e in 0..m.n_steps() - 1 {
            assert_eq!(m.get(e, 0).0, 0.0);
        }
        assert!(m.get(m.n_steps() - 1, 0).0 > 0.0);
        // Row 19 (farthest) appears starting from the very first step.
        assert!(m.get(0, 19).0 > 0.0);
    }

    #[test]
    fn express_zero_is_uncompressed() {
        let roe = ROE::standard(vec![1.0]).unwrap();
        let m = ExpressMatrix::build(&roe, 20, 0);
        assert_eq!(m.n_steps(), 20);
    }
}
