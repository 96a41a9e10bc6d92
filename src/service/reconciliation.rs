use bigdecimal::BigDecimal;
use serde::Serialize;
use std::str::FromStr;

/// Absorbs rounding between the printed total and the summed rows.
pub const DEFAULT_TOLERANCE: &str = "0.05";

/// Header total vs. summed item totals
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reconciliation {
    pub header_total: BigDecimal,
    pub calculated_total: BigDecimal,
    pub difference: BigDecimal,
    pub matches: bool,
}

#[derive(Debug, Clone)]
pub struct Reconciler {
    tolerance: BigDecimal,
}

impl Default for Reconciler {
    fn default() -> Self {
        Self {
            tolerance: BigDecimal::from_str(DEFAULT_TOLERANCE).unwrap_or_default(),
        }
    }
}

impl Reconciler {
    pub fn new(tolerance: BigDecimal) -> Self {
        Self {
            tolerance: tolerance.abs(),
        }
    }

    pub fn tolerance(&self) -> &BigDecimal {
        &self.tolerance
    }

    /// Match iff |header - calculated| is strictly below the tolerance.
    pub fn check(&self, header_total: &BigDecimal, calculated_total: &BigDecimal) -> Reconciliation {
        let difference = (header_total - calculated_total).abs();
        Reconciliation {
            header_total: header_total.clone(),
            calculated_total: calculated_total.clone(),
            matches: difference < self.tolerance,
            difference,
        }
    }
}
