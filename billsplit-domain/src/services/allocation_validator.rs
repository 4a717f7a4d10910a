use crate::model::{Allocation, SplitType};
use rust_decimal::Decimal;

/// Tolerance on the percentage total.
const PERCENTAGE_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Checks a custom split before it is committed to an item.
pub struct AllocationValidator;

impl AllocationValidator {
    /// Percentage splits need non-negative values totalling 100 within
    /// 0.01; every other split type needs strictly positive values. An
    /// empty or missing list is never valid.
    pub fn validate(&self, allocations: Option<&[Allocation]>, split_type: SplitType) -> bool {
        let Some(allocations) = allocations else {
            return false;
        };
        if allocations.is_empty() {
            return false;
        }

        match split_type {
            SplitType::Percentage => {
                let total = allocations
                    .iter()
                    .fold(Decimal::ZERO, |acc, allocation| acc.saturating_add(allocation.value));
                allocations
                    .iter()
                    .all(|allocation| allocation.value >= Decimal::ZERO)
                    && (total - Decimal::ONE_HUNDRED).abs() < PERCENTAGE_TOLERANCE
            }
            SplitType::Fraction | SplitType::Equal => allocations
                .iter()
                .all(|allocation| allocation.value > Decimal::ZERO),
        }
    }
}
