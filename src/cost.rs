//! Per-type and total cost rows
//!
//! All arithmetic is done in `Decimal` so the report carries exact sums:
//! 4 instances at 0.10 is 0.4, 100 GB of gp2 over 36 months at 0.12 is 432.

use crate::aggregate::ResultMeasure;
use crate::config::SizingConfig;
use crate::error::{FleetCostError, Result};
use rust_decimal::Decimal;
use serde::Serialize;

/// Label of the synthetic last row
pub const TOTAL_LABEL: &str = "TOTAL(EC2)";

/// Block-storage price for the whole term
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EbsRate {
    pub per_gb_month: Decimal,
    pub term_months: u32,
}

impl EbsRate {
    pub fn term_price(&self, disk_total_gb: u64) -> Decimal {
        Decimal::from(disk_total_gb) * self.per_gb_month * Decimal::from(self.term_months)
    }
}

impl From<&SizingConfig> for EbsRate {
    fn from(config: &SizingConfig) -> Self {
        Self {
            per_gb_month: config.ebs_gb_month_rate,
            term_months: config.term_months,
        }
    }
}

/// One line of the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryRow {
    pub instance_type: String,
    pub instance_count: Decimal,
    /// Reserved price per instance; zero when the price list had none
    pub unit_price: Decimal,
    pub ec2_total_price: Decimal,
    pub disk_total_gb: u64,
    pub ebs_total_price: Decimal,
}

/// Cost row for one instance type. Pure: same inputs, same row.
pub fn cost_row(
    instance_type: &str,
    instance_count: Decimal,
    unit_price: Option<Decimal>,
    disk_total_gb: u64,
    rate: EbsRate,
) -> SummaryRow {
    let unit_price = unit_price.unwrap_or(Decimal::ZERO);
    SummaryRow {
        instance_type: instance_type.to_string(),
        instance_count,
        unit_price,
        ec2_total_price: instance_count * unit_price,
        disk_total_gb,
        ebs_total_price: rate.term_price(disk_total_gb),
    }
}

/// Convenience wrapper over `cost_row` for a measured result.
pub fn cost_row_for_measure(
    instance_type: &str,
    measure: &ResultMeasure,
    utilization_factor: Decimal,
    unit_price: Option<Decimal>,
    rate: EbsRate,
) -> SummaryRow {
    cost_row(
        instance_type,
        measure.instance_count(utilization_factor),
        unit_price,
        measure.disk_total_gb,
        rate,
    )
}

/// Running totals across all instance types processed so far
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunningTotals {
    pub instance_count: Decimal,
    pub ec2_total_price: Decimal,
    pub disk_total_gb: u64,
    pub ebs_total_price: Decimal,
}

impl RunningTotals {
    /// Fold one row into the totals. Fails instead of wrapping when a sum
    /// no longer fits.
    pub fn accumulate(self, row: &SummaryRow) -> Result<Self> {
        let overflow = |total: &'static str| FleetCostError::TotalOverflow {
            total,
            context: format!("adding {}", row.instance_type),
        };
        Ok(Self {
            instance_count: self
                .instance_count
                .checked_add(row.instance_count)
                .ok_or_else(|| overflow("instance count"))?,
            ec2_total_price: self
                .ec2_total_price
                .checked_add(row.ec2_total_price)
                .ok_or_else(|| overflow("EC2 price"))?,
            disk_total_gb: self
                .disk_total_gb
                .checked_add(row.disk_total_gb)
                .ok_or_else(|| overflow("disk size"))?,
            ebs_total_price: self
                .ebs_total_price
                .checked_add(row.ebs_total_price)
                .ok_or_else(|| overflow("EBS price"))?,
        })
    }

    /// Totals of `rows`, folded in order.
    pub fn from_rows<'a, I>(rows: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a SummaryRow>,
    {
        rows.into_iter()
            .try_fold(RunningTotals::default(), RunningTotals::accumulate)
    }

    /// The `TOTAL(EC2)` row. Its unit price is always zero.
    pub fn total_row(&self) -> SummaryRow {
        SummaryRow {
            instance_type: TOTAL_LABEL.to_string(),
            instance_count: self.instance_count,
            unit_price: Decimal::ZERO,
            ec2_total_price: self.ec2_total_price,
            disk_total_gb: self.disk_total_gb,
            ebs_total_price: self.ebs_total_price,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn gp2() -> EbsRate {
        EbsRate {
            per_gb_month: Decimal::new(12, 2),
            term_months: 36,
        }
    }

    #[test]
    fn test_ebs_price_for_100_gb() {
        assert_eq!(gp2().term_price(100), Decimal::from(432));
    }

    #[test]
    fn test_cost_row_with_price() {
        let row = cost_row(
            "m5.large",
            Decimal::from(4),
            Some(Decimal::from_str("0.10").unwrap()),
            60,
            gp2(),
        );
        assert_eq!(row.ec2_total_price.normalize().to_string(), "0.4");
        assert_eq!(row.ebs_total_price.normalize().to_string(), "259.2");
    }

    #[test]
    fn test_missing_price_is_zero() {
        let row = cost_row("x1.32xlarge", Decimal::from(3), None, 0, gp2());
        assert_eq!(row.unit_price, Decimal::ZERO);
        assert_eq!(row.ec2_total_price, Decimal::ZERO);
    }

    #[test]
    fn test_cost_row_is_pure() {
        let a = cost_row("m5.large", Decimal::from(2), Some(Decimal::from(7)), 10, gp2());
        let b = cost_row("m5.large", Decimal::from(2), Some(Decimal::from(7)), 10, gp2());
        assert_eq!(a, b);
    }

    #[test]
    fn test_totals_fold() {
        let rows = vec![
            cost_row("a", Decimal::from(2), Some(Decimal::from(10)), 5, gp2()),
            cost_row("b", Decimal::from(3), None, 7, gp2()),
        ];
        let totals = RunningTotals::from_rows(&rows).unwrap();
        assert_eq!(totals.instance_count, Decimal::from(5));
        assert_eq!(totals.ec2_total_price, Decimal::from(20));
        assert_eq!(totals.disk_total_gb, 12);

        let total = totals.total_row();
        assert_eq!(total.instance_type, TOTAL_LABEL);
        assert_eq!(total.unit_price, Decimal::ZERO);
        assert_eq!(total.ebs_total_price, gp2().term_price(12));
    }

    #[test]
    fn test_disk_total_overflow_is_an_error() {
        let big = cost_row("a", Decimal::ONE, None, u64::MAX, gp2());
        let one = cost_row("b", Decimal::ONE, None, 1, gp2());
        let totals = RunningTotals::default().accumulate(&big).unwrap();
        let err = totals.accumulate(&one).unwrap_err();
        assert!(matches!(err, FleetCostError::TotalOverflow { total: "disk size", .. }));
    }

    #[test]
    fn test_price_total_overflow_is_an_error() {
        let row = cost_row("a", Decimal::ONE, Some(Decimal::MAX), 0, gp2());
        let err = RunningTotals::from_rows([&row, &row]).unwrap_err();
        match err {
            FleetCostError::TotalOverflow { total, context } => {
                assert_eq!(total, "EC2 price");
                assert_eq!(context, "adding a");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
