//! Readout-electronics (ROE) parameters and physical transfer counts
//! (spec §3, §4.3).

use crate::error::ConfigurationError;

/// The three clocking sequence variants (spec §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoeType {
    /// Each row undergoes `row + 1` transfers plus `prescan_offset`; charge
    /// moves monotonically toward readout.
    Standard,
    /// Every row undergoes the same `n_rows + prescan_offset` transfers;
    /// charge is introduced at the far end.
    ChargeInjection,
    /// Charge is shifted forward then back `n_pumps` times per pixel; net
    /// displacement is zero but traps are exercised (the "pumping dipole").
    TrapPumping,
}

/// Readout-electronics parameters for one clocking cycle (spec §3 `ROE`).
#[derive(Debug, Clone)]
pub struct ROE {
    dwell_times: Vec<f64>,
    prescan_offset: u64,
    overscan_start: i64,
    empty_traps_between_columns: bool,
    empty_traps_for_first_transfers: bool,
    force_release_away_from_readout: bool,
    use_integer_express_matrix: bool,
    roe_type: RoeType,
    n_pumps: u64,
}

impl ROE {
    /// Fully explicit constructor; validates dwell times are all positive
    /// and `overscan_start >= -1`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        dwell_times: Vec<f64>,
        prescan_offset: u64,
        overscan_start: i64,
        empty_traps_between_columns: bool,
        empty_traps_for_first_transfers: bool,
        force_release_away_from_readout: bool,
        use_integer_express_matrix: bool,
        roe_type: RoeType,
        n_pumps: u64,
    ) -> Result<Self, ConfigurationError> {
        if dwell_times.is_empty() || dwell_times.iter().any(|&t| t <= 0.0) {
            return Err(ConfigurationError::NonPositiveReleaseTimescale(
                dwell_times.iter().cloned().find(|&t| t <= 0.0).unwrap_or(0.0),
            ));
        }
        if overscan_start < -1 {
            return Err(ConfigurationError::WindowOutsideImage {
                axis: "overscan_start",
                start: overscan_start,
                stop: overscan_start,
                len: 0,
            });
        }
        if roe_type == RoeType::TrapPumping && n_pumps == 0 {
            return Err(ConfigurationError::NonPositivePumpCount(n_pumps));
        }
        Ok(ROE {
            dwell_times,
            prescan_offset,
            overscan_start,
            empty_traps_between_columns,
            empty_traps_for_first_transfers,
            force_release_away_from_readout,
            use_integer_express_matrix,
            roe_type,
            n_pumps,
        })
    }

    /// A standard ROE: one phase, emptied between columns, releases toward
    /// readout, no overscan (mirrors `arcticpy.roe.ROE`'s defaults).
    pub fn standard(dwell_times: Vec<f64>) -> Result<Self, ConfigurationError> {
        ROE::new(
            dwell_times,
            0,
            -1,
            true,
            false,
            true,
            false,
            RoeType::Standard,
            0,
        )
    }

    /// A charge-injection ROE (mirrors `arcticpy.roe.ROEChargeInjection`):
    /// `empty_traps_for_first_transfers` is always `false` for this type.
    pub fn charge_injection(
        dwell_times: Vec<f64>,
        empty_traps_between_columns: bool,
        force_release_away_from_readout: bool,
        use_integer_express_matrix: bool,
    ) -> Result<Self, ConfigurationError> {
        ROE::new(
            dwell_times,
            0,
            -1,
            empty_traps_between_columns,
            false,
            force_release_away_from_readout,
            use_integer_express_matrix,
            RoeType::ChargeInjection,
            0,
        )
    }

    /// A trap-pumping ROE (mirrors `arcticpy.roe.ROETrapPumping`):
    /// `force_release_away_from_readout` is always `false` for this type,
    /// since pumping has no preferred readout direction.
    pub fn trap_pumping(
        dwell_times: Vec<f64>,
        n_pumps: u64,
        empty_traps_for_first_transfers: bool,
        use_integer_express_matrix: bool,
    ) -> Result<Self, ConfigurationError> {
        ROE::new(
            dwell_times,
            0,
            -1,
            true,
            empty_traps_for_first_transfers,
            false,
            use_integer_express_matrix,
            RoeType::TrapPumping,
            n_pumps,
        )
    }

    /// Dwell time for phase `p` (spec §3 `dwell_times[]`).
    pub fn dwell_times(&self) -> &[f64] {
        &self.dwell_times
    }

    /// Number of phases per pixel, as implied by the dwell-time sequence.
    pub fn n_phases(&self) -> usize {
        self.dwell_times.len()
    }

    pub fn prescan_offset(&self) -> u64 {
        self.prescan_offset
    }

    /// First row of the overscan region, or `None` for "no overscan".
    pub fn overscan_start(&self) -> Option<u64> {
        if self.overscan_start < 0 {
            None
        } else {
            Some(self.overscan_start as u64)
        }
    }

    pub fn empty_traps_between_columns(&self) -> bool {
        self.empty_traps_between_columns
    }

    pub fn empty_traps_for_first_transfers(&self) -> bool {
        self.empty_traps_for_first_transfers
    }

    pub fn force_release_away_from_readout(&self) -> bool {
        self.force_release_away_from_readout
    }

    pub fn use_integer_express_matrix(&self) -> bool {
        self.use_integer_express_matrix
    }

    pub fn roe_type(&self) -> RoeType {
        self.roe_type
    }

    pub fn n_pumps(&self) -> u64 {
        self.n_pumps
    }

    /// The physical (uncompressed) number of transfers row `r` undergoes
    /// before express compression (spec §4.3).
    pub fn physical_transfer_count(&self, row: usize, n_rows: usize) -> u64 {
        match self.roe_type {
            RoeType::Standard => row as u64 + 1 + self.prescan_offset,
            RoeType::ChargeInjection => n_rows as u64 + self.prescan_offset,
            RoeType::TrapPumping => 2 * self.n_pumps,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_transfer_count_grows_with_row() {
        let roe = ROE::standard(vec![1.0]).unwrap();
        assert_eq!(roe.physical_transfer_count(0, 20), 1);
        assert_eq!(roe.physical_transfer_count(19, 20), 20);
    }

    #[test]
    fn charge_injection_transfer_count_is_uniform() {
        let roe =
            ROE::charge_injection(vec![1.0], true, true, false).unwrap();
        assert_eq!(roe.physical_transfer_count(0, 20), 20);
        assert_eq!(roe.physical_transfer_count(19, 20), 20);
    }

    #[test]
    fn rejects_non_positive_dwell_times() {
        assert!(ROE::standard(vec![0.0]).is_err());
        assert!(ROE::standard(vec![]).is_err());
    }

    #[test]
    fn trap_pumping_rejects_zero_pumps() {
        assert!(ROE::trap_pumping(vec![0.5, 0.5], 0, false, false).is_err());
        assert!(ROE::trap_pumping(vec![0.5, 0.5], 3, false, false).is_ok());
    }

    #[test]
    fn trap_pumping_transfer_count_is_twice_the_pump_count() {
        let roe = ROE::trap_pumping(vec![0.5, 0.5], 4, false, false).unwrap();
        assert_eq!(roe.physical_transfer_count(0, 10), 8);
        assert_eq!(roe.physical_transfer_count(9, 10), 8);
    }
}
