//! # Tax Calculator
//!
//! Exclusive and inclusive tax splits, rule resolution, line allocation and
//! stored-tax validation.
//!
//! ## Resolution Order
//! ```text
//! explicit rule ──► tenant default rule ──► system default (PPN 11%)
//! ```
//!
//! Rounding is half-up to a whole minor unit everywhere.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::{div_round_half_up, Money};
use crate::types::{Sale, SaleLine, TaxRate, TaxRule};

/// Name of the system fallback tax.
pub const DEFAULT_TAX_NAME: &str = "PPN";

/// System fallback rate: 11%.
pub const DEFAULT_TAX_RATE_BPS: u32 = 1100;

// =============================================================================
// Breakdown
// =============================================================================

/// `base + tax = total`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct TaxBreakdown {
    pub base: Money,
    pub tax: Money,
    pub total: Money,
}

/// The tax that applies to a sale after resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedTax {
    /// `None` for the system default.
    pub rule_id: Option<String>,
    pub name: String,
    pub rate: TaxRate,
}

/// Outcome of comparing a stored tax amount with a recomputation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct TaxValidation {
    pub valid: bool,
    pub stored: Money,
    pub calculated: Money,
    pub difference: Money,
}

// =============================================================================
// Calculator
// =============================================================================

/// Stateless tax math plus the configured system default.
#[derive(Debug, Clone)]
pub struct TaxCalculator {
    default_name: String,
    default_rate: TaxRate,
}

impl Default for TaxCalculator {
    fn default() -> Self {
        TaxCalculator {
            default_name: DEFAULT_TAX_NAME.to_string(),
            default_rate: TaxRate::from_bps(DEFAULT_TAX_RATE_BPS),
        }
    }
}

impl TaxCalculator {
    /// Creates a calculator with a custom system default.
    ///
    /// Fails when the rate is not a fraction below one.
    pub fn new(default_name: impl Into<String>, default_rate: TaxRate) -> CoreResult<Self> {
        ensure_rule_rate(default_rate)?;
        Ok(TaxCalculator {
            default_name: default_name.into(),
            default_rate,
        })
    }

    /// Tax on top of a net amount.
    ///
    /// ```rust
    /// use harbor_core::money::Money;
    /// use harbor_core::tax::TaxCalculator;
    /// use harbor_core::types::TaxRate;
    ///
    /// let split = TaxCalculator::compute_exclusive(Money::from_major(100_000), TaxRate::from_bps(1100));
    /// assert_eq!(split.tax, Money::from_major(11_000));
    /// assert_eq!(split.total, Money::from_major(111_000));
    /// ```
    pub fn compute_exclusive(amount: Money, rate: TaxRate) -> TaxBreakdown {
        let tax = amount.apply_rate(rate);
        TaxBreakdown {
            base: amount,
            tax,
            total: amount + tax,
        }
    }

    /// Tax contained in a gross amount.
    ///
    /// `base = round(amount / (1 + rate))`, `tax = total - base`.
    ///
    /// ```rust
    /// use harbor_core::money::Money;
    /// use harbor_core::tax::TaxCalculator;
    /// use harbor_core::types::TaxRate;
    ///
    /// let split = TaxCalculator::compute_inclusive(Money::from_major(111_000), TaxRate::from_bps(1100));
    /// assert_eq!(split.base, Money::from_major(100_000));
    /// assert_eq!(split.tax, Money::from_major(11_000));
    /// ```
    pub fn compute_inclusive(amount: Money, rate: TaxRate) -> TaxBreakdown {
        let scale = TaxRate::BPS_SCALE as i128;
        let base = div_round_half_up(amount.cents() as i128 * scale, scale + rate.bps() as i128);
        let base = Money::from_cents(base as i64);
        TaxBreakdown {
            base,
            tax: amount - base,
            total: amount,
        }
    }

    /// Picks the applicable tax: explicit rule, else tenant default, else
    /// the system default.
    pub fn resolve(&self, explicit: Option<&TaxRule>, tenant_default: Option<&TaxRule>) -> ResolvedTax {
        match explicit.or(tenant_default) {
            Some(rule) => ResolvedTax {
                rule_id: Some(rule.id.clone()),
                name: rule.name.clone(),
                rate: rule.rate(),
            },
            None => self.system_default(),
        }
    }

    pub fn system_default(&self) -> ResolvedTax {
        ResolvedTax {
            rule_id: None,
            name: self.default_name.clone(),
            rate: self.default_rate,
        }
    }

    /// Splits a sale tax across lines by line-total share.
    ///
    /// `line_tax = round(line_total × tax / sub_total)`, zero when the
    /// sub total is zero. Shares are rounded independently, so their sum may
    /// differ from `tax` by a minor unit per line.
    pub fn allocate_line_tax(line_totals: &[Money], tax: Money) -> Vec<Money> {
        let sub_total: Money = line_totals.iter().sum();
        line_totals
            .iter()
            .map(|line_total| tax.proportion(*line_total, sub_total))
            .collect()
    }

    /// Recomputes a sale's tax from its lines and compares it with the
    /// stored amount.
    ///
    /// The recomputation applies the sale's rate snapshot to
    /// `Σ line_total − discount`.
    pub fn validate(sale: &Sale, lines: &[SaleLine], tolerance: Money) -> TaxValidation {
        let sub_total: Money = lines.iter().map(SaleLine::line_total).sum();
        let taxable = sub_total - sale.discount();
        let calculated = Self::compute_exclusive(taxable, sale.tax_rate()).tax;
        let stored = sale.tax();
        let difference = (stored - calculated).abs();
        TaxValidation {
            valid: difference <= tolerance,
            stored,
            calculated,
            difference,
        }
    }
}

/// Rule rates are fractions in `[0, 1)`.
pub fn ensure_rule_rate(rate: TaxRate) -> CoreResult<()> {
    if rate.bps() >= TaxRate::BPS_SCALE {
        return Err(CoreError::InvalidTaxRate { bps: rate.bps() });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SaleStatus;
    use chrono::Utc;

    fn rule(id: &str, bps: u32) -> TaxRule {
        let now = Utc::now();
        TaxRule {
            id: id.to_string(),
            tenant_id: "t1".to_string(),
            name: format!("Rule {}", id),
            rate_bps: bps,
            is_default: false,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    fn sale(discount: i64, tax: i64, bps: u32) -> Sale {
        let now = Utc::now();
        Sale {
            id: "s1".into(),
            tenant_id: "t1".into(),
            order_number: "20240101-0001".into(),
            payment_method_id: "pm".into(),
            tax_rule_id: None,
            tax_rate_bps: bps,
            sub_total_cents: 0,
            discount_cents: discount,
            tax_cents: tax,
            grand_total_cents: 0,
            paid_cents: 0,
            change_cents: 0,
            status: SaleStatus::Completed,
            notes: None,
            void_reason: None,
            voided_at: None,
            refund_cents: None,
            refund_reason: None,
            refunded_at: None,
            created_by: "u1".into(),
            device_id: None,
            created_at: now,
            updated_at: now,
            completed_at: Some(now),
            deleted_at: None,
        }
    }

    fn line(total: i64) -> SaleLine {
        SaleLine {
            id: format!("l{}", total),
            tenant_id: "t1".into(),
            sale_id: "s1".into(),
            item_id: "i".into(),
            quantity: 1,
            unit_price_cents: total,
            line_total_cents: total,
            tax_cents: 0,
            refunded_at: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_exclusive_ppn() {
        let split =
            TaxCalculator::compute_exclusive(Money::from_major(100_000), TaxRate::from_bps(1100));
        assert_eq!(split.base, Money::from_major(100_000));
        assert_eq!(split.tax, Money::from_major(11_000));
        assert_eq!(split.total, Money::from_major(111_000));
    }

    #[test]
    fn test_inclusive_rounds_half_up() {
        // 10.00 gross at 11%: base 9.009 → 9.01, tax 0.99
        let split = TaxCalculator::compute_inclusive(Money::from_cents(1000), TaxRate::from_bps(1100));
        assert_eq!(split.base.cents(), 901);
        assert_eq!(split.tax.cents(), 99);
        assert_eq!(split.base + split.tax, split.total);
    }

    #[test]
    fn test_resolve_order() {
        let calc = TaxCalculator::default();
        let explicit = rule("explicit", 500);
        let tenant_default = rule("default", 1000);

        let resolved = calc.resolve(Some(&explicit), Some(&tenant_default));
        assert_eq!(resolved.rule_id.as_deref(), Some("explicit"));

        let resolved = calc.resolve(None, Some(&tenant_default));
        assert_eq!(resolved.rate, TaxRate::from_bps(1000));

        let resolved = calc.resolve(None, None);
        assert_eq!(resolved.rule_id, None);
        assert_eq!(resolved.name, "PPN");
        assert_eq!(resolved.rate, TaxRate::from_bps(1100));
    }

    #[test]
    fn test_invalid_default_rate() {
        assert!(TaxCalculator::new("VAT", TaxRate::from_bps(10_000)).is_err());
        assert!(TaxCalculator::new("VAT", TaxRate::from_bps(2000)).is_ok());
    }

    #[test]
    fn test_allocate_line_tax() {
        let shares = TaxCalculator::allocate_line_tax(
            &[Money::from_cents(2000), Money::from_cents(1000)],
            Money::from_cents(330),
        );
        assert_eq!(shares, vec![Money::from_cents(220), Money::from_cents(110)]);

        let shares = TaxCalculator::allocate_line_tax(&[Money::zero()], Money::from_cents(10));
        assert_eq!(shares, vec![Money::zero()]);
    }

    #[test]
    fn test_validate_within_tolerance() {
        // 30000 - 5000 discount = 25000 at 11% = 2750
        let lines = vec![line(20_000), line(10_000)];
        let ok = TaxCalculator::validate(&sale(5_000, 2_751, 1100), &lines, Money::from_cents(1));
        assert!(ok.valid);
        assert_eq!(ok.calculated.cents(), 2_750);
        assert_eq!(ok.difference.cents(), 1);

        let bad = TaxCalculator::validate(&sale(5_000, 2_800, 1100), &lines, Money::from_cents(1));
        assert!(!bad.valid);
        assert_eq!(bad.difference.cents(), 50);
    }
}
