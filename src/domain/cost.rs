//! Transaction cost model.
//!
//! Fees and slippage are quoted in basis points per side. The drag is the
//! same for longs and shorts and is applied once per round trip to the gross
//! return.

use serde::{Deserialize, Serialize};

use crate::domain::error::RegimetraderError;

const BPS: f64 = 10_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostModel {
    pub fee_bps: f64,
    pub slip_bps: f64,
}

impl Default for CostModel {
    fn default() -> Self {
        CostModel {
            fee_bps: 5.0,
            slip_bps: 5.0,
        }
    }
}

impl CostModel {
    pub fn new(fee_bps: f64, slip_bps: f64) -> Result<Self, RegimetraderError> {
        let model = CostModel { fee_bps, slip_bps };
        model.validate()?;
        Ok(model)
    }

    pub fn zero() -> Self {
        CostModel {
            fee_bps: 0.0,
            slip_bps: 0.0,
        }
    }

    pub fn validate(&self) -> Result<(), RegimetraderError> {
        if !self.fee_bps.is_finite() || self.fee_bps < 0.0 {
            return Err(RegimetraderError::invalid("fee_bps", "must be finite and non-negative"));
        }
        if !self.slip_bps.is_finite() || self.slip_bps < 0.0 {
            return Err(RegimetraderError::invalid("slip_bps", "must be finite and non-negative"));
        }
        Ok(())
    }

    pub fn cost_per_side(&self) -> f64 {
        (self.fee_bps + self.slip_bps) / BPS
    }

    pub fn round_trip(&self) -> f64 {
        2.0 * self.cost_per_side()
    }

    pub fn net_return(&self, gross: f64) -> f64 {
        gross - self.round_trip()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cost_per_side_from_bps() {
        let c = CostModel::new(12.5, 12.5).unwrap();
        assert!((c.cost_per_side() - 0.0025).abs() < 1e-15);
        assert!((c.round_trip() - 0.005).abs() < 1e-15);
    }

    #[test]
    fn net_subtracts_round_trip() {
        let c = CostModel::default();
        assert!((c.net_return(0.01) - 0.008).abs() < 1e-12);
        assert!((c.net_return(-0.01) + 0.012).abs() < 1e-12);
    }

    #[test]
    fn zero_cost_is_identity() {
        assert_eq!(CostModel::zero().net_return(0.05), 0.05);
    }

    #[test]
    fn negative_bps_rejected() {
        assert!(matches!(
            CostModel::new(-1.0, 0.0),
            Err(RegimetraderError::InvalidParameter { name, .. }) if name == "fee_bps"
        ));
        assert!(CostModel::new(0.0, -0.5).is_err());
        assert!(CostModel::new(f64::NAN, 0.0).is_err());
    }

    #[test]
    fn infinite_bps_rejected() {
        assert!(matches!(
            CostModel::new(f64::INFINITY, 0.0),
            Err(RegimetraderError::InvalidParameter { name, .. }) if name == "fee_bps"
        ));
        assert!(matches!(
            CostModel::new(0.0, f64::INFINITY),
            Err(RegimetraderError::InvalidParameter { name, .. }) if name == "slip_bps"
        ));
    }
}
