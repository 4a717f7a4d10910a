use crate::{
    model::{
        Bill, LineItem, Money, PersonId, PersonTotal, SectionKey, SectionSummary, Settlement,
    },
    services::{
        AllocationResolver, DiscountNormalizer, SectionSubtotals, SectionTaxes, TaxApportioner,
    },
};
use fxhash::{FxBuildHasher, FxHashSet};
use indexmap::IndexMap;

/// Settlement calculation service
pub struct SettlementCalculator;

impl SettlementCalculator {
    /// Calculate the per-person bill
    ///
    /// Every person in the bill appears in the result, in bill order, even
    /// without assigned items. Items nobody consumes are skipped entirely.
    ///
    /// # Arguments
    /// * `bill` - Snapshot of people, items, sections and taxes
    ///
    /// # Returns
    /// Subtotal, apportioned tax, total and itemized lines for each person
    pub fn calculate(&self, bill: &Bill) -> Settlement {
        let mut totals: IndexMap<PersonId, PersonTotal, FxBuildHasher> = bill
            .people
            .iter()
            .map(|person| (person.id.clone(), PersonTotal::empty(person)))
            .collect();
        let subtotals = self.accumulate(bill, Some(&mut totals));

        let taxes = TaxApportioner.apportion(&subtotals, &SectionTaxes::from_bill(bill));
        for (person_id, tax) in taxes {
            if let Some(total) = totals.get_mut(&person_id) {
                total.tax += tax;
            }
        }

        for total in totals.values_mut() {
            total.total = total.subtotal + total.tax;
        }

        let settlement = Settlement {
            person_totals: totals.into_values().collect(),
        };

        let assigned_subtotal = self.assigned_subtotal(bill);
        if settlement.subtotal() != assigned_subtotal {
            tracing::warn!(
                person_subtotal = %settlement.subtotal(),
                assigned_subtotal = %assigned_subtotal,
                "Person subtotals do not reconcile with assigned item totals"
            );
        }

        tracing::debug!(
            person_count = settlement.person_totals.len(),
            item_count = bill.items.len(),
            section_count = bill.sections.len(),
            subtotal = %settlement.subtotal(),
            tax = %settlement.tax(),
            grand_total = %settlement.grand_total(),
            "Settlement calculated"
        );

        settlement
    }

    /// Sum of discounted line totals across all items, assigned or not.
    pub fn bill_subtotal(&self, bill: &Bill) -> Money {
        bill.items
            .iter()
            .map(|item| DiscountNormalizer.line_total(item))
            .sum()
    }

    /// Sum of discounted line totals across items somebody consumes.
    pub fn assigned_subtotal(&self, bill: &Bill) -> Money {
        bill.items
            .iter()
            .filter(|item| item.is_assigned())
            .map(|item| DiscountNormalizer.line_total(item))
            .sum()
    }

    /// Subtotal, tax and total per section, over assigned items only.
    ///
    /// The default section comes first, then sections in bill order, then
    /// section ids no section defines. Sections with a zero subtotal are
    /// omitted.
    pub fn sections_summary(&self, bill: &Bill) -> Vec<SectionSummary> {
        let subtotals = self.accumulate(bill, None);
        let taxes = SectionTaxes::from_bill(bill);

        let mut keys: Vec<SectionKey> = Vec::with_capacity(bill.sections.len() + 1);
        keys.push(None);
        keys.extend(bill.sections.iter().map(|section| Some(section.id.clone())));
        let known: FxHashSet<SectionKey> = keys.iter().cloned().collect();
        keys.extend(
            subtotals
                .sections()
                .filter(|key| !known.contains(*key))
                .cloned(),
        );

        keys.into_iter()
            .filter_map(|key| {
                let subtotal = subtotals.section_total(&key);
                if subtotal.is_zero() {
                    return None;
                }
                let tax = if subtotal.is_positive() {
                    taxes.get(&key)
                } else {
                    Money::ZERO
                };
                let name = key
                    .as_ref()
                    .and_then(|id| bill.section(id))
                    .map(|section| section.name.clone());
                Some(SectionSummary {
                    section_id: key,
                    name,
                    subtotal,
                    tax,
                    total: subtotal + tax,
                })
            })
            .collect()
    }

    /// Runs every assigned item through the resolver.
    ///
    /// When `totals` is given, shares are added to the matching person's
    /// subtotal and line items; allocations naming a person outside the bill
    /// are skipped.
    fn accumulate(
        &self,
        bill: &Bill,
        mut totals: Option<&mut IndexMap<PersonId, PersonTotal, FxBuildHasher>>,
    ) -> SectionSubtotals {
        let mut subtotals = SectionSubtotals::new();
        let known_people: FxHashSet<&PersonId> = bill.people.iter().map(|p| &p.id).collect();

        for item in bill.items.iter().filter(|item| item.is_assigned()) {
            let unit_price = DiscountNormalizer.discounted_unit_price(item);
            let shares = AllocationResolver.resolve_shares(item);
            let co_assignee_count = shares.len();

            for (person_id, share) in shares {
                if !known_people.contains(&person_id) {
                    tracing::warn!(
                        item_id = %item.id,
                        person_id = %person_id,
                        share = %share,
                        "Skipping allocation for a person outside the bill"
                    );
                    continue;
                }

                if let Some(total) = totals
                    .as_deref_mut()
                    .and_then(|totals| totals.get_mut(&person_id))
                {
                    let allocation_value = item
                        .consumed_by
                        .iter()
                        .rev()
                        .find(|allocation| allocation.person_id == person_id)
                        .map(|allocation| allocation.value)
                        .unwrap_or_default();
                    total.subtotal += share;
                    total.line_items.push(LineItem {
                        item_id: item.id.clone(),
                        name: item.name.clone(),
                        unit_price_after_discount: unit_price,
                        quantity: item.quantity,
                        split_type: item.split_type,
                        allocation_value,
                        share,
                        co_assignee_count,
                        discount: item.discount,
                        discount_type: item.discount_type,
                        section_id: item.section_id.clone(),
                    });
                }

                subtotals.add(item.section_id.clone(), person_id, share);
            }
        }

        subtotals
    }
}
