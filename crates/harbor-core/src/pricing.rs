//! # Sale Pricing
//!
//! Pure totals for a sale before anything is persisted.
//!
//! ```text
//! lines ──► sub_total = Σ unit_price × qty
//!              │
//!              ▼
//!           discounted = sub_total − discount      (0 ≤ discount ≤ sub_total)
//!              │
//!              ▼
//!           tax = round(discounted × rate)         (exclusive)
//!              │
//!              ▼
//!           grand_total = discounted + tax
//!              │
//!              ▼
//!           line_tax[i] = round(line_total[i] × tax / sub_total)
//! ```

use std::collections::BTreeMap;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::tax::TaxCalculator;
use crate::types::TaxRate;
use crate::validation::{validate_line_count, validate_quantity, validate_unit_price};

/// A line with its price already resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedLine {
    pub item_id: String,
    pub quantity: i64,
    pub unit_price: Money,
}

impl PricedLine {
    #[inline]
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply_quantity(self.quantity)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaleTotals {
    pub sub_total: Money,
    pub discount: Money,
    /// Rate actually applied; zero when the sale is untaxed.
    pub tax_rate: TaxRate,
    pub tax: Money,
    pub grand_total: Money,
    /// Tax share per line, same order as the input lines.
    pub line_taxes: Vec<Money>,
}

/// Computes sale totals.
///
/// ```rust
/// use harbor_core::money::Money;
/// use harbor_core::pricing::{compute_totals, PricedLine};
///
/// let lines = vec![
///     PricedLine { item_id: "a".into(), quantity: 2, unit_price: Money::from_major(10_000) },
///     PricedLine { item_id: "b".into(), quantity: 1, unit_price: Money::from_major(5_000) },
/// ];
/// let totals = compute_totals(&lines, Money::zero(), None).unwrap();
/// assert_eq!(totals.grand_total, Money::from_major(25_000));
/// ```
pub fn compute_totals(
    lines: &[PricedLine],
    discount: Money,
    tax_rate: Option<TaxRate>,
) -> CoreResult<SaleTotals> {
    if lines.is_empty() {
        return Err(ValidationError::Required {
            field: "items".to_string(),
        }
        .into());
    }
    validate_line_count(lines.len())?;
    for line in lines {
        validate_quantity(line.quantity)?;
        validate_unit_price(line.unit_price.cents())?;
    }

    let line_totals = lines
        .iter()
        .map(|line| line.unit_price.checked_mul_quantity(line.quantity))
        .collect::<Option<Vec<Money>>>()
        .ok_or_else(total_overflow)?;
    let sub_total = Money::checked_sum(line_totals.iter().copied()).ok_or_else(total_overflow)?;

    if discount.is_negative() || discount > sub_total {
        return Err(ValidationError::OutOfRange {
            field: "discount".to_string(),
            min: 0,
            max: sub_total.cents(),
        }
        .into());
    }

    let discounted = sub_total - discount;
    let tax_rate = tax_rate.unwrap_or_default();
    let tax = TaxCalculator::compute_exclusive(discounted, tax_rate).tax;
    let line_taxes = TaxCalculator::allocate_line_tax(&line_totals, tax);

    let grand_total = discounted.checked_add(tax).ok_or_else(total_overflow)?;

    Ok(SaleTotals {
        sub_total,
        discount,
        tax_rate,
        tax,
        grand_total,
        line_taxes,
    })
}

fn total_overflow() -> CoreError {
    ValidationError::OutOfRange {
        field: "sale total".to_string(),
        min: 0,
        max: i64::MAX,
    }
    .into()
}

/// Total requested quantity per item, so repeated lines of one item are
/// checked against stock together.
pub fn aggregate_quantities(lines: &[PricedLine]) -> BTreeMap<String, i64> {
    let mut totals = BTreeMap::new();
    for line in lines {
        *totals.entry(line.item_id.clone()).or_insert(0) += line.quantity;
    }
    totals
}

/// Fails with `InsufficientStock` when `requested > available`.
pub fn ensure_available(item_id: &str, requested: i64, available: i64) -> CoreResult<()> {
    if requested > available {
        return Err(CoreError::InsufficientStock {
            item_id: item_id.to_string(),
            requested,
            available,
        });
    }
    Ok(())
}
