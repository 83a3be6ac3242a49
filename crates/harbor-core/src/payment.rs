//! # Payment Calculator
//!
//! Tender validation per payment kind, change, cash denomination breakdown
//! and split tender.
//!
//! ## Tender Rules
//! ```text
//! ┌──────────┬───────────────────────────────────────────────────────────┐
//! │ Kind     │ Rule                                                      │
//! ├──────────┼───────────────────────────────────────────────────────────┤
//! │ cash     │ tendered ≥ due; strict mode: multiple of smallest unit   │
//! │ card     │ tendered = due; card number (if given) 13-19 digits      │
//! │ digital  │ tendered = due; reference required                        │
//! │ other    │ tendered ≥ due                                            │
//! └──────────┴───────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::PaymentKind;
use crate::validation::validate_tendered_amount;

/// Indonesian Rupiah notes and coins in major units, largest first.
pub const DEFAULT_IDR_DENOMINATIONS: [i64; 10] =
    [100_000, 50_000, 20_000, 10_000, 5_000, 2_000, 1_000, 500, 200, 100];

/// Smallest cash unit accepted in strict mode: 1 rupiah.
pub const DEFAULT_SMALLEST_CASH_UNIT_CENTS: i64 = 100;

/// The default denomination table in minor units.
pub fn default_denominations() -> Vec<Money> {
    DEFAULT_IDR_DENOMINATIONS
        .iter()
        .map(|major| Money::from_major(*major))
        .collect()
}

// =============================================================================
// Options & Results
// =============================================================================

/// Per-tender extras supplied by the client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase", default)]
pub struct TenderOptions {
    /// Cash must be a multiple of the smallest currency unit.
    pub strict_denominations: bool,
    pub card_number: Option<String>,
    pub reference: Option<String>,
}

/// One denomination and how many of it to hand out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct DenominationCount {
    pub denomination: Money,
    pub count: u32,
}

/// One leg of a split payment, with its method already resolved to a kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tender {
    pub kind: PaymentKind,
    pub amount: Money,
    pub options: TenderOptions,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct SplitTenderResult {
    pub total_due: Money,
    pub total_tendered: Money,
    pub change: Money,
    /// `None` when the change cannot be expressed in the table.
    pub change_breakdown: Option<Vec<DenominationCount>>,
}

// =============================================================================
// Calculator
// =============================================================================

/// Tender rules with a configured cash unit and denomination table.
#[derive(Debug, Clone)]
pub struct PaymentCalculator {
    smallest_cash_unit: Money,
    denominations: Vec<Money>,
}

impl Default for PaymentCalculator {
    fn default() -> Self {
        PaymentCalculator {
            smallest_cash_unit: Money::from_cents(DEFAULT_SMALLEST_CASH_UNIT_CENTS),
            denominations: default_denominations(),
        }
    }
}

impl PaymentCalculator {
    /// Denominations are sorted largest first; non-positive values are dropped.
    pub fn new(smallest_cash_unit: Money, denominations: Vec<Money>) -> Self {
        let mut denominations: Vec<Money> =
            denominations.into_iter().filter(Money::is_positive).collect();
        denominations.sort_by(|a, b| b.cmp(a));
        denominations.dedup();
        PaymentCalculator {
            smallest_cash_unit,
            denominations,
        }
    }

    pub fn denominations(&self) -> &[Money] {
        &self.denominations
    }

    /// Checks a tendered amount against the rules for `kind`.
    pub fn validate_tender(
        &self,
        kind: PaymentKind,
        due: Money,
        tendered: Money,
        options: &TenderOptions,
    ) -> CoreResult<()> {
        match kind {
            PaymentKind::Cash => {
                ensure_covers(due, tendered)?;
                if options.strict_denominations
                    && self.smallest_cash_unit.is_positive()
                    && tendered.cents() % self.smallest_cash_unit.cents() != 0
                {
                    return Err(CoreError::InvalidCashDenomination {
                        amount: tendered,
                        unit: self.smallest_cash_unit,
                    });
                }
                Ok(())
            }
            PaymentKind::Card => {
                ensure_exact(kind, due, tendered)?;
                if let Some(number) = options.card_number.as_deref() {
                    validate_card_number(number)?;
                }
                Ok(())
            }
            PaymentKind::Digital => {
                ensure_exact(kind, due, tendered)?;
                let has_reference = options
                    .reference
                    .as_deref()
                    .is_some_and(|r| !r.trim().is_empty());
                if !has_reference {
                    return Err(CoreError::MissingPaymentReference);
                }
                Ok(())
            }
            PaymentKind::Other => ensure_covers(due, tendered),
        }
    }

    /// `tendered − due`, failing when negative.
    ///
    /// ```rust
    /// use harbor_core::money::Money;
    /// use harbor_core::payment::PaymentCalculator;
    ///
    /// let change = PaymentCalculator::compute_change(Money::from_major(25_000), Money::from_major(30_000)).unwrap();
    /// assert_eq!(change, Money::from_major(5_000));
    /// ```
    pub fn compute_change(due: Money, tendered: Money) -> CoreResult<Money> {
        tendered
            .checked_sub_non_negative(due)
            .ok_or(CoreError::InsufficientPayment {
                required: due,
                tendered,
            })
    }

    /// Greedy breakdown of `amount` using this calculator's table.
    pub fn breakdown(&self, amount: Money) -> CoreResult<Vec<DenominationCount>> {
        denomination_breakdown(amount, &self.denominations)
    }

    /// Validates each tender against its own amount, then computes one
    /// aggregate change for the whole split.
    pub fn split_tender(&self, due: Money, tenders: &[Tender]) -> CoreResult<SplitTenderResult> {
        if due.is_negative() {
            return Err(ValidationError::OutOfRange {
                field: "amount due".to_string(),
                min: 0,
                max: i64::MAX,
            }
            .into());
        }
        for tender in tenders {
            validate_tendered_amount(tender.amount.cents())?;
            self.validate_tender(tender.kind, tender.amount, tender.amount, &tender.options)?;
        }
        let total_tendered = Money::checked_sum(tenders.iter().map(|t| t.amount)).ok_or_else(|| {
            ValidationError::OutOfRange {
                field: "tendered amount".to_string(),
                min: 0,
                max: i64::MAX,
            }
        })?;
        let change = Self::compute_change(due, total_tendered)?;
        Ok(SplitTenderResult {
            total_due: due,
            total_tendered,
            change,
            change_breakdown: self.breakdown(change).ok(),
        })
    }
}

/// Greedy descending breakdown.
///
/// Returns counts summing exactly to `amount`, or
/// [`CoreError::Denomination`] carrying what the table cannot cover.
///
/// ```rust
/// use harbor_core::money::Money;
/// use harbor_core::payment::{default_denominations, denomination_breakdown};
///
/// let parts = denomination_breakdown(Money::from_major(73_000), &default_denominations()).unwrap();
/// let total: Money = parts.iter().map(|p| p.denomination * p.count as i64).sum();
/// assert_eq!(total, Money::from_major(73_000));
/// ```
pub fn denomination_breakdown(amount: Money, table: &[Money]) -> CoreResult<Vec<DenominationCount>> {
    if amount.is_negative() {
        return Err(CoreError::Denomination {
            amount,
            remainder: amount,
        });
    }

    let mut sorted: Vec<Money> = table.iter().copied().filter(Money::is_positive).collect();
    sorted.sort_by(|a, b| b.cmp(a));

    let mut remaining = amount.cents();
    let mut parts = Vec::new();
    for denomination in sorted {
        let count = remaining / denomination.cents();
        if count > 0 {
            parts.push(DenominationCount {
                denomination,
                count: count as u32,
            });
            remaining -= count * denomination.cents();
        }
    }

    if remaining != 0 {
        return Err(CoreError::Denomination {
            amount,
            remainder: Money::from_cents(remaining),
        });
    }
    Ok(parts)
}

/// Card numbers are 13 to 19 digits once spaces and dashes are removed.
pub fn validate_card_number(number: &str) -> CoreResult<()> {
    let digits: String = number.chars().filter(|c| *c != ' ' && *c != '-').collect();
    let len = digits.len();
    if !(13..=19).contains(&len) || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(CoreError::InvalidCardNumber);
    }
    Ok(())
}

fn ensure_covers(due: Money, tendered: Money) -> CoreResult<()> {
    if tendered < due {
        return Err(CoreError::InsufficientPayment {
            required: due,
            tendered,
        });
    }
    Ok(())
}

fn ensure_exact(kind: PaymentKind, due: Money, tendered: Money) -> CoreResult<()> {
    if tendered < due {
        return Err(CoreError::InsufficientPayment {
            required: due,
            tendered,
        });
    }
    if tendered != due {
        return Err(CoreError::ExactTenderRequired { kind, due, tendered });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
