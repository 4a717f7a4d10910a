use crate::{
    model::{Item, PersonAmounts, RemainderPolicy, SplitType},
    services::DiscountNormalizer,
};
use rust_decimal::Decimal;

/// Computes each assignee's share of an item.
pub struct AllocationResolver;

impl AllocationResolver {
    /// Resolves the monetary share of every person in `item.consumed_by`.
    ///
    /// The result holds one entry per distinct person, in first-appearance
    /// order. A person listed twice keeps the share of the last listing,
    /// while every listing still counts toward the weight total; the shares
    /// of the overwritten listings are dropped, so the result sums short of
    /// the line total. For a list without duplicates the shares sum exactly
    /// to the item's line total.
    pub fn resolve_shares(&self, item: &Item) -> PersonAmounts {
        let mut shares = PersonAmounts::default();
        if item.consumed_by.is_empty() {
            return shares;
        }

        let line_total = DiscountNormalizer.line_total(item);
        let split = match item.split_type {
            SplitType::Equal => {
                line_total.split_even(item.consumed_by.len(), RemainderPolicy::FrontLoad)
            }
            SplitType::Percentage | SplitType::Fraction => {
                let weights: Vec<Decimal> = item
                    .consumed_by
                    .iter()
                    .map(|allocation| allocation.value)
                    .collect();
                line_total.split_weighted(&weights, RemainderPolicy::FrontLoad)
            }
        };

        for (allocation, share) in item.consumed_by.iter().zip(split) {
            shares.insert(allocation.person_id.clone(), share);
        }

        if shares.len() != item.consumed_by.len() {
            tracing::debug!(
                item_id = %item.id,
                allocation_count = item.consumed_by.len(),
                distinct_people = shares.len(),
                "Duplicate allocations collapsed to last listing"
            );
        }

        shares
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Allocation, DiscountType, Money, PersonId};
    use rstest::{fixture, rstest};

    #[fixture]
    fn resolver() -> AllocationResolver {
        AllocationResolver
    }

    fn item(price: i64, split_type: SplitType, allocations: &[(&str, i64)]) -> Item {
        Item::new("item", "Item", Money::from_i64(price)).split(
            split_type,
            allocations
                .iter()
                .map(|(id, value)| Allocation::new(*id, Decimal::from(*value)))
                .collect(),
        )
    }

    #[rstest]
    #[case::equal_two(item(30, SplitType::Equal, &[("a", 1), ("b", 1)]), vec![("a", 15), ("b", 15)])]
    #[case::equal_ignores_values(item(30, SplitType::Equal, &[("a", 5), ("b", 1)]), vec![("a", 15), ("b", 15)])]
    #[case::percentage(item(30, SplitType::Percentage, &[("a", 70), ("b", 30)]), vec![("a", 21), ("b", 9)])]
    #[case::percentage_normalizes_sum(item(30, SplitType::Percentage, &[("a", 35), ("b", 15)]), vec![("a", 21), ("b", 9)])]
    #[case::fraction(item(30, SplitType::Fraction, &[("a", 2), ("b", 1)]), vec![("a", 20), ("b", 10)])]
    #[case::zero_sum_weights(item(30, SplitType::Fraction, &[("a", 0), ("b", 0)]), vec![("a", 0), ("b", 0)])]
    #[case::single(item(12, SplitType::Percentage, &[("a", 100)]), vec![("a", 12)])]
    fn resolve_shares_cases(
        resolver: AllocationResolver,
        #[case] item: Item,
        #[case] expected: Vec<(&str, i64)>,
    ) {
        let shares = resolver.resolve_shares(&item);
        let actual: Vec<(PersonId, Money)> = shares.into_iter().collect();
        let expected: Vec<(PersonId, Money)> = expected
            .into_iter()
            .map(|(id, amount)| (PersonId::from(id), Money::from_i64(amount)))
            .collect();
        assert_eq!(actual, expected);
    }

    #[rstest]
    fn empty_consumers_yield_empty_map(resolver: AllocationResolver) {
        let item = item(30, SplitType::Equal, &[]);
        assert!(resolver.resolve_shares(&item).is_empty());
    }

    #[rstest]
    fn equal_split_of_ten_among_three_sums_exactly(resolver: AllocationResolver) {
        let item = item(10, SplitType::Equal, &[("a", 1), ("b", 1), ("c", 1)]);
        let shares = resolver.resolve_shares(&item);

        assert_eq!(shares.len(), 3);
        assert_eq!(shares.values().sum::<Money>(), Money::from_i64(10));
    }

    #[rstest]
    fn quantity_and_discount_feed_the_line_total(resolver: AllocationResolver) {
        let item = item(50, SplitType::Equal, &[("a", 1), ("b", 1)])
            .with_quantity(2)
            .with_discount(Decimal::from(10), DiscountType::Percentage);
        let shares = resolver.resolve_shares(&item);

        assert_eq!(shares.get(&PersonId::from("a")), Some(&Money::from_i64(45)));
        assert_eq!(shares.get(&PersonId::from("b")), Some(&Money::from_i64(45)));
    }

    #[rstest]
    fn duplicate_person_is_last_write_wins(resolver: AllocationResolver) {
        let item = item(40, SplitType::Fraction, &[("a", 1), ("b", 2), ("a", 1)]);
        let shares = resolver.resolve_shares(&item);

        assert_eq!(shares.len(), 2);
        assert_eq!(shares.get(&PersonId::from("a")), Some(&Money::from_i64(10)));
        assert_eq!(shares.get(&PersonId::from("b")), Some(&Money::from_i64(20)));
        assert_eq!(shares.get_index(0).map(|(id, _)| id.as_str()), Some("a"));
        // The first listing of "a" is overwritten, taking its 10 with it.
        assert_eq!(shares.values().sum::<Money>(), Money::from_i64(30));
    }
}
