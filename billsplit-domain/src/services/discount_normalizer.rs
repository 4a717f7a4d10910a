use crate::model::{DiscountType, Item, Money};
use rust_decimal::Decimal;

/// Resolves an item's effective unit price.
pub struct DiscountNormalizer;

impl DiscountNormalizer {
    /// Unit price after the item's discount.
    ///
    /// A flat discount larger than the price yields a negative unit price;
    /// no floor is applied.
    pub fn discounted_unit_price(&self, item: &Item) -> Money {
        match item.discount_type {
            DiscountType::Flat => item.price - Money::from_decimal(item.discount),
            DiscountType::Percentage => {
                item.price - item.price * (item.discount / Decimal::ONE_HUNDRED)
            }
        }
    }

    /// Discounted unit price times quantity.
    pub fn line_total(&self, item: &Item) -> Money {
        self.discounted_unit_price(item) * Decimal::from(item.quantity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn normalizer() -> DiscountNormalizer {
        DiscountNormalizer
    }

    #[rstest]
    #[case::no_discount(Money::from_i64(100), Decimal::ZERO, DiscountType::Flat, Money::from_i64(100))]
    #[case::flat(Money::from_i64(100), Decimal::from(15), DiscountType::Flat, Money::from_i64(85))]
    #[case::percentage(Money::from_i64(100), Decimal::from(10), DiscountType::Percentage, Money::from_i64(90))]
    #[case::fractional_percentage(Money::new(1999, 2), Decimal::new(125, 1), DiscountType::Percentage, Money::new(1749125, 5))]
    #[case::flat_exceeding_price(Money::from_i64(10), Decimal::from(15), DiscountType::Flat, Money::from_i64(-5))]
    #[case::full_percentage(Money::from_i64(40), Decimal::ONE_HUNDRED, DiscountType::Percentage, Money::ZERO)]
    fn discounted_unit_price_cases(
        normalizer: DiscountNormalizer,
        #[case] price: Money,
        #[case] discount: Decimal,
        #[case] discount_type: DiscountType,
        #[case] expected: Money,
    ) {
        let item = Item::new("i1", "Item", price).with_discount(discount, discount_type);
        assert_eq!(normalizer.discounted_unit_price(&item), expected);
    }

    #[rstest]
    fn line_total_multiplies_by_quantity(normalizer: DiscountNormalizer) {
        let item = Item::new("i1", "Soda", Money::from_i64(5))
            .with_quantity(3)
            .with_discount(Decimal::ONE, DiscountType::Flat);
        assert_eq!(normalizer.line_total(&item), Money::from_i64(12));
    }

    #[rstest]
    fn is_idempotent(normalizer: DiscountNormalizer) {
        let item = Item::new("i1", "Pizza", Money::from_i64(30))
            .with_discount(Decimal::from(20), DiscountType::Percentage);
        let first = normalizer.discounted_unit_price(&item);
        let second = normalizer.discounted_unit_price(&item);
        assert_eq!(first, second);
        assert_eq!(item.price, Money::from_i64(30));
    }
}
