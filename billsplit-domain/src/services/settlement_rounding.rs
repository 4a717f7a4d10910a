//! Presentation rounding of per-person amounts.
//!
//! Person subtotals and taxes are computed at working precision. Rounding each
//! of them independently to the atomic unit (e.g. one cent) can make the
//! rounded column disagree with the rounded bill total. This module rounds a
//! column so that:
//! 1. Every amount is a whole number of atomic units
//! 2. The rounded amounts sum to the rounded column total
//! 3. Repairs touch as few people as possible, chosen deterministically

use crate::model::{Money, PersonId, PersonTotal, Settlement};
use rust_decimal::{
    Decimal, RoundingStrategy,
    prelude::{FromPrimitive, ToPrimitive},
};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Rounding mode for settlement quantization.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoundingMode {
    /// Round half away from zero (e.g., 0.005 -> 0.01 at scale 2).
    HalfUp,
    /// Round half to nearest even number (banker's rounding).
    HalfEven,
}

/// Context for settlement quantization.
///
/// # Example
/// ```
/// use billsplit_domain::services::{RoundingMode, SettlementContext};
///
/// let ctx = SettlementContext {
///     scale: 2,  // cents
///     rounding_mode: RoundingMode::HalfUp,
/// };
/// assert_eq!(ctx, SettlementContext::cents());
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SettlementContext {
    /// Number of decimal places for the atomic unit (e.g., 0 for JPY, 2 for USD).
    pub scale: u32,
    /// Rounding strategy to use.
    pub rounding_mode: RoundingMode,
}

impl SettlementContext {
    /// Two decimal places, HalfUp rounding.
    pub fn cents() -> Self {
        Self {
            scale: 2,
            rounding_mode: RoundingMode::HalfUp,
        }
    }

    fn strategy(self) -> RoundingStrategy {
        match self.rounding_mode {
            RoundingMode::HalfUp => RoundingStrategy::MidpointAwayFromZero,
            RoundingMode::HalfEven => RoundingStrategy::MidpointNearestEven,
        }
    }
}

impl Default for SettlementContext {
    fn default() -> Self {
        Self::cents()
    }
}

/// Errors that can occur during settlement quantization.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SettlementRoundingError {
    /// The repair needs more unit adjustments than there are people.
    #[error("rounding repair needs more unit adjustments than there are people")]
    InvalidAdjustmentCount,
    /// Internal invariant violation: repaired amounts do not hit the rounded total.
    #[error("rounded amounts do not sum to the rounded total")]
    TargetSumViolation,
    /// Quantized units could not be represented as integral values.
    #[error("rounded amount is not a whole number of units")]
    NonIntegral,
    /// Settlement context scale is not supported by decimal precision constraints.
    #[error("scale {scale} is not supported (maximum {max_supported})")]
    UnsupportedScale { scale: u32, max_supported: u32 },
    /// An amount has more atomic units than a decimal can hold.
    #[error("amount is too large to round to the requested scale")]
    Overflow,
}

const STABLE_KEY_FORMAT_VERSION: u8 = 1;
const MAX_SETTLEMENT_SCALE: u32 = 22;

/// Rounds every person's subtotal and tax, then re-derives the total.
///
/// Line items are left at working precision.
pub fn quantize_settlement(
    settlement: &Settlement,
    context: SettlementContext,
) -> Result<Settlement, SettlementRoundingError> {
    let subtotals: Vec<(PersonId, Money)> = settlement
        .person_totals
        .iter()
        .map(|total| (total.person_id.clone(), total.subtotal))
        .collect();
    let taxes: Vec<(PersonId, Money)> = settlement
        .person_totals
        .iter()
        .map(|total| (total.person_id.clone(), total.tax))
        .collect();

    let rounded_subtotals = quantize_amounts(&subtotals, context)?;
    let rounded_taxes = quantize_amounts(&taxes, context)?;

    let person_totals = settlement
        .person_totals
        .iter()
        .zip(rounded_subtotals.into_iter().zip(rounded_taxes))
        .map(|(total, ((_, subtotal), (_, tax)))| PersonTotal {
            subtotal,
            tax,
            total: subtotal + tax,
            ..total.clone()
        })
        .collect();

    Ok(Settlement { person_totals })
}

/// Rounds `amounts` to the atomic unit keeping their rounded sum.
///
/// Each amount is rounded to nearest; `V = Σ q_i - round(Σ original)` units
/// are then taken back from (V > 0) or given to (V < 0) the people whose
/// rounding moved them furthest in that direction. Exact ties fall back to a
/// stable per-person key, then to the person id.
pub fn quantize_amounts(
    amounts: &[(PersonId, Money)],
    context: SettlementContext,
) -> Result<Vec<(PersonId, Money)>, SettlementRoundingError> {
    validate_scale(context.scale)?;
    let atomic_unit = Decimal::new(1, context.scale);
    let strategy = context.strategy();

    let original_sum: Money = amounts.iter().map(|(_, amount)| *amount).sum();
    let target_units = quantize_to_int(original_sum.as_decimal(), atomic_unit, strategy)?;

    let mut entries: Vec<(PersonId, Decimal, Decimal, Decimal)> = amounts
        .iter()
        .map(|(id, money)| {
            let original = money.as_decimal();
            let q_i = quantize_to_int(original, atomic_unit, strategy)?;
            let rounded = units_to_decimal(q_i, atomic_unit)?;
            Ok((id.clone(), original, rounded, rounded - original))
        })
        .collect::<Result<Vec<_>, SettlementRoundingError>>()?;

    let rounded_units = units_sum(&entries, atomic_unit)?;
    let v_int = rounded_units
        .checked_sub(target_units)
        .ok_or(SettlementRoundingError::InvalidAdjustmentCount)?;

    if v_int != 0 {
        let adjustment_count = usize::try_from(v_int.unsigned_abs())
            .map_err(|_| SettlementRoundingError::InvalidAdjustmentCount)?;
        if adjustment_count > entries.len() {
            tracing::error!(
                reject_reason = "k_gt_n",
                v_int,
                adjustment_count,
                member_count = entries.len(),
                atomic_unit = %atomic_unit,
                sum_original = %original_sum,
                "Adjustment count exceeds participant count during settlement quantization"
            );
            return Err(SettlementRoundingError::InvalidAdjustmentCount);
        }

        let score_sign = if v_int > 0 {
            Decimal::ONE
        } else {
            Decimal::NEGATIVE_ONE
        };

        let mut ranked: Vec<(usize, Decimal, [u8; 32])> = entries
            .iter()
            .enumerate()
            .map(|(idx, (id, _, _, diff))| (idx, *diff * score_sign, stable_key(id, context)))
            .collect();
        ranked.sort_by(|(idx_a, score_a, key_a), (idx_b, score_b, key_b)| {
            score_b
                .cmp(score_a)
                .then_with(|| key_a.cmp(key_b))
                .then_with(|| entries[*idx_a].0.cmp(&entries[*idx_b].0))
        });

        let adjustment = if v_int > 0 { -atomic_unit } else { atomic_unit };
        let selected: Vec<usize> = ranked
            .iter()
            .take(adjustment_count)
            .map(|(idx, _, _)| *idx)
            .collect();

        let selected_ids: Vec<&str> = selected
            .iter()
            .map(|idx| entries[*idx].0.as_str())
            .collect();
        tracing::debug!(
            v_int,
            adjustment_count,
            selected_ids = ?selected_ids,
            member_count = entries.len(),
            sum_original = %original_sum,
            "Settlement quantization diagnostics"
        );

        for idx in selected {
            entries[idx].2 = entries[idx]
                .2
                .checked_add(adjustment)
                .ok_or(SettlementRoundingError::Overflow)?;
        }

        if units_sum(&entries, atomic_unit)? != target_units {
            tracing::error!(
                reject_reason = "target_sum_violation",
                member_count = entries.len(),
                atomic_unit = %atomic_unit,
                sum_original = %original_sum,
                "Settlement quantization failed target-sum check"
            );
            return Err(SettlementRoundingError::TargetSumViolation);
        }
    }

    Ok(entries
        .into_iter()
        .map(|(id, _, rounded, _)| (id, Money::from_decimal(rounded)))
        .collect())
}

fn units_sum(
    entries: &[(PersonId, Decimal, Decimal, Decimal)],
    atomic_unit: Decimal,
) -> Result<i128, SettlementRoundingError> {
    entries.iter().try_fold(0_i128, |acc, (_, _, rounded, _)| {
        let q_decimal = rounded
            .checked_div(atomic_unit)
            .ok_or(SettlementRoundingError::Overflow)?;
        let q_i = q_decimal
            .to_i128()
            .ok_or(SettlementRoundingError::NonIntegral)?;
        if Decimal::from(q_i) != q_decimal {
            return Err(SettlementRoundingError::NonIntegral);
        }
        acc.checked_add(q_i)
            .ok_or(SettlementRoundingError::InvalidAdjustmentCount)
    })
}

fn validate_scale(scale: u32) -> Result<(), SettlementRoundingError> {
    if scale <= MAX_SETTLEMENT_SCALE {
        return Ok(());
    }
    Err(SettlementRoundingError::UnsupportedScale {
        scale,
        max_supported: MAX_SETTLEMENT_SCALE,
    })
}

fn stable_key(person_id: &PersonId, context: SettlementContext) -> [u8; 32] {
    let rounding_mode_tag = match context.rounding_mode {
        RoundingMode::HalfUp => 0_u8,
        RoundingMode::HalfEven => 1_u8,
    };

    let mut hasher = Sha256::new();
    hasher.update([STABLE_KEY_FORMAT_VERSION]);
    hasher.update((person_id.as_str().len() as u64).to_be_bytes());
    hasher.update(person_id.as_str().as_bytes());
    hasher.update(context.scale.to_be_bytes());
    hasher.update([rounding_mode_tag]);

    let digest = hasher.finalize();
    let mut out = [0_u8; 32];
    out.copy_from_slice(&digest);
    out
}

fn units_to_decimal(units: i128, atomic_unit: Decimal) -> Result<Decimal, SettlementRoundingError> {
    Decimal::from_i128(units)
        .and_then(|units| units.checked_mul(atomic_unit))
        .ok_or(SettlementRoundingError::Overflow)
}

fn quantize_to_int(
    original: Decimal,
    atomic_unit: Decimal,
    rounding_strategy: RoundingStrategy,
) -> Result<i128, SettlementRoundingError> {
    let Some(scaled) = original.checked_div(atomic_unit) else {
        tracing::warn!(
            reject_reason = "unit_overflow",
            original = %original,
            atomic_unit = %atomic_unit,
            "Amount exceeds the decimal range in atomic units"
        );
        return Err(SettlementRoundingError::Overflow);
    };
    let q_decimal = scaled.round_dp_with_strategy(0, rounding_strategy);
    let Some(q_i) = q_decimal.to_i128() else {
        tracing::warn!(
            reject_reason = "quantize_failure",
            original = %original,
            atomic_unit = %atomic_unit,
            rounded_units = %q_decimal,
            "Quantization unit conversion failed"
        );
        return Err(SettlementRoundingError::NonIntegral);
    };
    Ok(q_i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(value: &str) -> Decimal {
        Decimal::from_str(value).expect("valid decimal")
    }

    fn amounts(values: &[(&str, &str)]) -> Vec<(PersonId, Money)> {
        values
            .iter()
            .map(|(id, value)| (PersonId::from(*id), Money::from_decimal(dec(value))))
            .collect()
    }

    fn value_of(rounded: &[(PersonId, Money)], id: &str) -> Decimal {
        rounded
            .iter()
            .find(|(person, _)| person.as_str() == id)
            .map(|(_, money)| money.as_decimal())
            .expect("person should be present")
    }

    #[test]
    fn rejects_unsupported_scale() {
        let context = SettlementContext {
            scale: MAX_SETTLEMENT_SCALE + 1,
            ..SettlementContext::cents()
        };

        assert_eq!(
            quantize_amounts(&amounts(&[("a", "1")]), context),
            Err(SettlementRoundingError::UnsupportedScale {
                scale: MAX_SETTLEMENT_SCALE + 1,
                max_supported: MAX_SETTLEMENT_SCALE,
            })
        );
    }

    #[test]
    fn thirds_round_to_the_rounded_total_with_stable_tie_break() {
        let values = amounts(&[
            ("a", "3.3333333333"),
            ("b", "3.3333333333"),
            ("c", "3.3333333334"),
        ]);

        let rounded =
            quantize_amounts(&values, SettlementContext::cents()).expect("quantize should succeed");

        let sum: Decimal = rounded.iter().map(|(_, money)| money.as_decimal()).sum();
        assert_eq!(sum, dec("10.00"));

        // c lost the most to rounding, so it gets the missing cent.
        assert_eq!(value_of(&rounded, "c"), dec("3.34"));
        assert_eq!(value_of(&rounded, "a"), dec("3.33"));
        assert_eq!(value_of(&rounded, "b"), dec("3.33"));
    }

    #[test]
    fn equal_diffs_use_stable_key() {
        let values = amounts(&[("a", "0.005"), ("b", "0.005")]);
        let context = SettlementContext {
            scale: 2,
            rounding_mode: RoundingMode::HalfEven,
        };

        let rounded = quantize_amounts(&values, context).expect("quantize should succeed");

        let key_a = stable_key(&PersonId::from("a"), context);
        let key_b = stable_key(&PersonId::from("b"), context);
        let (selected, other) = if key_a <= key_b { ("a", "b") } else { ("b", "a") };

        assert_eq!(value_of(&rounded, selected), dec("0.01"));
        assert_eq!(value_of(&rounded, other), dec("0.00"));
    }

    #[test]
    fn takes_back_from_largest_gain() {
        // 0.006 + 0.006 + 0.006 = 0.018 -> 0.02, but each rounds up to 0.01.
        let values = amounts(&[("a", "0.006"), ("b", "0.006"), ("c", "0.006")]);

        let rounded =
            quantize_amounts(&values, SettlementContext::cents()).expect("quantize should succeed");

        let sum: Decimal = rounded.iter().map(|(_, money)| money.as_decimal()).sum();
        assert_eq!(sum, dec("0.02"));
        assert_eq!(
            rounded
                .iter()
                .filter(|(_, money)| money.as_decimal() == dec("0.01"))
                .count(),
            2
        );
    }

    #[test]
    fn already_rounded_amounts_are_unchanged() {
        let values = amounts(&[("a", "15"), ("b", "115")]);
        let rounded =
            quantize_amounts(&values, SettlementContext::cents()).expect("quantize should succeed");
        assert_eq!(rounded, values);
    }

    #[test]
    fn half_up_and_half_even_differ_on_midpoints() {
        let values = amounts(&[("a", "0.125")]);

        let half_up =
            quantize_amounts(&values, SettlementContext::cents()).expect("half up should succeed");
        let half_even = quantize_amounts(
            &values,
            SettlementContext {
                scale: 2,
                rounding_mode: RoundingMode::HalfEven,
            },
        )
        .expect("half even should succeed");

        assert_eq!(value_of(&half_up, "a"), dec("0.13"));
        assert_eq!(value_of(&half_even, "a"), dec("0.12"));
    }

    #[test]
    fn negative_amounts_round_symmetrically() {
        let values = amounts(&[("a", "-1.005"), ("b", "2.010")]);
        let rounded =
            quantize_amounts(&values, SettlementContext::cents()).expect("quantize should succeed");

        let sum: Decimal = rounded.iter().map(|(_, money)| money.as_decimal()).sum();
        assert_eq!(sum, dec("1.01"));
    }

    #[test]
    fn quantize_settlement_keeps_total_decomposition() {
        let person = |id: &str, subtotal: &str, tax: &str| PersonTotal {
            person_id: PersonId::from(id),
            name: id.to_string(),
            line_items: Vec::new(),
            subtotal: Money::from_decimal(dec(subtotal)),
            tax: Money::from_decimal(dec(tax)),
            total: Money::from_decimal(dec(subtotal) + dec(tax)),
        };
        let settlement = Settlement {
            person_totals: vec![
                person("a", "3.3333333333", "0.3333333333"),
                person("b", "3.3333333333", "0.3333333333"),
                person("c", "3.3333333334", "0.3333333334"),
            ],
        };

        let rounded = quantize_settlement(&settlement, SettlementContext::cents())
            .expect("quantize should succeed");

        assert_eq!(rounded.subtotal(), Money::from_decimal(dec("10.00")));
        assert_eq!(rounded.tax(), Money::from_decimal(dec("1.00")));
        for total in &rounded.person_totals {
            assert_eq!(total.total, total.subtotal + total.tax);
        }
    }

    #[test]
    fn amounts_beyond_the_unit_range_are_rejected() {
        let values = vec![(PersonId::from("a"), Money::from_decimal(Decimal::MAX))];

        assert_eq!(
            quantize_amounts(&values, SettlementContext::cents()),
            Err(SettlementRoundingError::Overflow)
        );
    }

    #[test]
    fn errors_read_as_sentences() {
        let err = SettlementRoundingError::UnsupportedScale {
            scale: 30,
            max_supported: MAX_SETTLEMENT_SCALE,
        };
        assert_eq!(err.to_string(), "scale 30 is not supported (maximum 22)");
    }

    #[test]
    fn empty_input_is_empty() {
        let rounded =
            quantize_amounts(&[], SettlementContext::cents()).expect("quantize should succeed");
        assert!(rounded.is_empty());
    }

    #[test]
    fn stable_key_changes_across_settlement_contexts() {
        let id = PersonId::from("a");
        let cents = stable_key(&id, SettlementContext::cents());
        let whole = stable_key(
            &id,
            SettlementContext {
                scale: 0,
                ..SettlementContext::cents()
            },
        );
        assert_ne!(cents, whole);
    }
}
