use crate::model::{Bill, Money, PersonAmounts, PersonId, RemainderPolicy, SectionKey};
use fxhash::FxBuildHasher;
use indexmap::IndexMap;
use rust_decimal::Decimal;

/// Per-section, per-person subtotals of assigned items.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SectionSubtotals {
    sections: IndexMap<SectionKey, PersonAmounts, FxBuildHasher>,
}

impl SectionSubtotals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, section: SectionKey, person: PersonId, amount: Money) {
        *self
            .sections
            .entry(section)
            .or_default()
            .entry(person)
            .or_insert(Money::ZERO) += amount;
    }

    pub fn people_in(&self, section: &SectionKey) -> Option<&PersonAmounts> {
        self.sections.get(section)
    }

    /// Sum across all people of their subtotal within `section`.
    pub fn section_total(&self, section: &SectionKey) -> Money {
        self.sections
            .get(section)
            .map(|people| people.values().sum())
            .unwrap_or(Money::ZERO)
    }

    pub fn sections(&self) -> impl Iterator<Item = &SectionKey> + '_ {
        self.sections.keys()
    }
}

/// Flat tax per section key; the default section sits under `None`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SectionTaxes {
    taxes: IndexMap<SectionKey, Money, FxBuildHasher>,
}

impl SectionTaxes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_bill(bill: &Bill) -> Self {
        let mut taxes = Self::new();
        taxes.insert(None, bill.default_tax);
        for section in &bill.sections {
            taxes.insert(Some(section.id.clone()), section.tax_amount);
        }
        taxes
    }

    pub fn insert(&mut self, section: SectionKey, tax: Money) {
        self.taxes.insert(section, tax);
    }

    pub fn get(&self, section: &SectionKey) -> Money {
        self.taxes.get(section).copied().unwrap_or(Money::ZERO)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SectionKey, Money)> + '_ {
        self.taxes.iter().map(|(key, tax)| (key, *tax))
    }
}

/// Distributes section taxes over the people who consumed in each section.
pub struct TaxApportioner;

impl TaxApportioner {
    /// Weighted proportional apportionment.
    ///
    /// For each section with a positive tax and a positive subtotal, every
    /// person with a non-zero subtotal there receives
    /// `tax * person_subtotal / section_subtotal`. A section whose subtotal is
    /// zero or negative apportions nothing, so its tax is dropped.
    pub fn apportion(&self, subtotals: &SectionSubtotals, taxes: &SectionTaxes) -> PersonAmounts {
        let mut apportioned = PersonAmounts::default();

        for (section, tax) in taxes.iter() {
            if !tax.is_positive() {
                continue;
            }
            let section_subtotal = subtotals.section_total(section);
            if !section_subtotal.is_positive() {
                if !section_subtotal.is_zero() || subtotals.people_in(section).is_some() {
                    tracing::warn!(
                        section = ?section,
                        tax = %tax,
                        section_subtotal = %section_subtotal,
                        "Section tax dropped: no positive subtotal to apportion over"
                    );
                }
                continue;
            }
            let Some(people) = subtotals.people_in(section) else {
                continue;
            };

            let participants: Vec<(&PersonId, Decimal)> = people
                .iter()
                .filter(|(_, subtotal)| !subtotal.is_zero())
                .map(|(person, subtotal)| (person, subtotal.as_decimal()))
                .collect();
            let weights: Vec<Decimal> = participants.iter().map(|(_, weight)| *weight).collect();
            let shares = tax.split_weighted(&weights, RemainderPolicy::BackLoad);

            for ((person, _), share) in participants.into_iter().zip(shares) {
                *apportioned.entry(person.clone()).or_insert(Money::ZERO) += share;
            }
        }

        apportioned
    }
}
