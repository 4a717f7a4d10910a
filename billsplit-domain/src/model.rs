use arcstr::ArcStr;
use fxhash::FxBuildHasher;
use indexmap::IndexMap;
use rust_decimal::Decimal;
use std::{
    fmt,
    iter::Sum,
    ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign},
};

/// Decimal places kept for intermediate shares before the remainder is repaired.
pub const WORKING_SCALE: u32 = 10;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money(Decimal);

/// Which share absorbs the sub-unit remainder of a split.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RemainderPolicy {
    /// First participant with a non-zero weight.
    FrontLoad,
    /// Last participant with a non-zero weight.
    BackLoad,
}

impl Money {
    pub const ZERO: Self = Self(Decimal::ZERO);

    pub fn zero() -> Self {
        Self::ZERO
    }

    pub fn new(num: i64, scale: u32) -> Self {
        Self(Decimal::new(num, scale))
    }

    pub fn from_i64(value: i64) -> Self {
        Self(Decimal::from(value))
    }

    pub fn from_u64(value: u64) -> Self {
        Self(Decimal::from(value))
    }

    pub fn from_decimal(value: Decimal) -> Self {
        Self(value)
    }

    pub fn as_decimal(self) -> Decimal {
        self.0
    }

    pub fn abs(self) -> Self {
        Self(self.0.abs())
    }

    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }

    pub fn is_positive(self) -> bool {
        self.0 > Decimal::ZERO
    }

    pub fn signum(self) -> i64 {
        if self.0 > Decimal::ZERO {
            1
        } else if self.0 < Decimal::ZERO {
            -1
        } else {
            0
        }
    }

    /// Splits into `parts` equal shares that sum exactly to `self`.
    pub fn split_even(self, parts: usize, policy: RemainderPolicy) -> Vec<Money> {
        self.split_weighted(&vec![Decimal::ONE; parts], policy)
    }

    /// Splits proportionally to `weights`.
    ///
    /// Each share is `self * weight / sum(weights)` kept at [`WORKING_SCALE`]
    /// places; the rounding remainder goes to one participant chosen by
    /// `policy`, so the shares sum exactly to `self`. A zero weight sum yields
    /// all-zero shares. A ratio beyond the decimal range saturates, and then
    /// conservation no longer holds.
    pub fn split_weighted(self, weights: &[Decimal], policy: RemainderPolicy) -> Vec<Money> {
        let total_weight = weights
            .iter()
            .fold(Decimal::ZERO, |acc, weight| acc.saturating_add(*weight));
        if total_weight.is_zero() {
            return vec![Money::ZERO; weights.len()];
        }

        let mut shares: Vec<Money> = weights
            .iter()
            .map(|weight| {
                let share = match weight.checked_div(total_weight) {
                    Some(ratio) => self.0.saturating_mul(ratio),
                    None => saturated(
                        self.0.is_sign_negative()
                            != (weight.is_sign_negative() != total_weight.is_sign_negative()),
                    ),
                };
                Money(share.round_dp(WORKING_SCALE))
            })
            .collect();

        let remainder = self - shares.iter().copied().sum::<Money>();
        if !remainder.is_zero() {
            let target = match policy {
                RemainderPolicy::FrontLoad => weights.iter().position(|w| !w.is_zero()),
                RemainderPolicy::BackLoad => weights.iter().rposition(|w| !w.is_zero()),
            };
            if let Some(idx) = target {
                shares[idx] += remainder;
            }
        }

        shares
    }
}

/// Decimal bound on the side given by `negative`.
fn saturated(negative: bool) -> Decimal {
    if negative { Decimal::MIN } else { Decimal::MAX }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.normalize())
    }
}

impl Add for Money {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.0 = self.0.saturating_add(rhs.0);
    }
}

impl Sub for Money {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0.saturating_sub(rhs.0))
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 = self.0.saturating_sub(rhs.0);
    }
}

impl Neg for Money {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Self(-self.0)
    }
}

impl Mul<Decimal> for Money {
    type Output = Self;

    fn mul(self, rhs: Decimal) -> Self::Output {
        Self(self.0.saturating_mul(rhs))
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Money::ZERO, |acc, value| acc + value)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

macro_rules! string_id {
    ($name:ident) => {
        #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(ArcStr);

        impl $name {
            pub fn new(id: impl Into<ArcStr>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }
    };
}

string_id!(PersonId);
string_id!(ItemId);
string_id!(SectionId);

/// `None` is the implicit default section.
pub type SectionKey = Option<SectionId>;

/// Insertion-ordered person -> amount table.
pub type PersonAmounts = IndexMap<PersonId, Money, FxBuildHasher>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Person {
    pub id: PersonId,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Section {
    pub id: SectionId,
    pub name: String,
    pub tax_amount: Money,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum DiscountType {
    #[default]
    Flat,
    Percentage,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SplitType {
    #[default]
    Equal,
    Percentage,
    Fraction,
}

impl DiscountType {
    pub fn as_str(self) -> &'static str {
        match self {
            DiscountType::Flat => "flat",
            DiscountType::Percentage => "percentage",
        }
    }
}

impl SplitType {
    pub fn as_str(self) -> &'static str {
        match self {
            SplitType::Equal => "equal",
            SplitType::Percentage => "percentage",
            SplitType::Fraction => "fraction",
        }
    }
}

impl fmt::Display for DiscountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for SplitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One person's participation weight in an item.
///
/// `value` is a percentage point under [`SplitType::Percentage`], a relative
/// weight under [`SplitType::Fraction`], and ignored under [`SplitType::Equal`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Allocation {
    pub person_id: PersonId,
    pub value: Decimal,
}

impl Allocation {
    pub fn new(person_id: impl Into<PersonId>, value: Decimal) -> Self {
        Self {
            person_id: person_id.into(),
            value,
        }
    }

    pub fn equal(person_id: impl Into<PersonId>) -> Self {
        Self::new(person_id, Decimal::ONE)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Item {
    pub id: ItemId,
    pub name: String,
    /// Unit price before discount.
    pub price: Money,
    pub quantity: u32,
    pub discount: Decimal,
    pub discount_type: DiscountType,
    pub section_id: SectionKey,
    pub split_type: SplitType,
    pub consumed_by: Vec<Allocation>,
}

impl Item {
    pub fn new(id: impl Into<ItemId>, name: impl Into<String>, price: Money) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            price,
            quantity: 1,
            discount: Decimal::ZERO,
            discount_type: DiscountType::Flat,
            section_id: None,
            split_type: SplitType::Equal,
            consumed_by: Vec::new(),
        }
    }

    pub fn with_quantity(mut self, quantity: u32) -> Self {
        self.quantity = quantity;
        self
    }

    pub fn with_discount(mut self, discount: Decimal, discount_type: DiscountType) -> Self {
        self.discount = discount;
        self.discount_type = discount_type;
        self
    }

    pub fn in_section(mut self, section_id: impl Into<SectionId>) -> Self {
        self.section_id = Some(section_id.into());
        self
    }

    pub fn split(mut self, split_type: SplitType, consumed_by: Vec<Allocation>) -> Self {
        self.split_type = split_type;
        self.consumed_by = consumed_by;
        self
    }

    pub fn is_assigned(&self) -> bool {
        !self.consumed_by.is_empty()
    }
}

/// Snapshot of everything being split.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Bill {
    pub people: Vec<Person>,
    pub items: Vec<Item>,
    pub sections: Vec<Section>,
    /// Flat tax of the default section.
    pub default_tax: Money,
}

impl Bill {
    pub fn person(&self, id: &PersonId) -> Option<&Person> {
        self.people.iter().find(|person| &person.id == id)
    }

    pub fn item(&self, id: &ItemId) -> Option<&Item> {
        self.items.iter().find(|item| &item.id == id)
    }

    pub fn section(&self, id: &SectionId) -> Option<&Section> {
        self.sections.iter().find(|section| &section.id == id)
    }
}

/// One assigned item as seen from one person's bill.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LineItem {
    pub item_id: ItemId,
    pub name: String,
    pub unit_price_after_discount: Money,
    pub quantity: u32,
    pub split_type: SplitType,
    pub allocation_value: Decimal,
    pub share: Money,
    /// Distinct people sharing the item, this person included.
    pub co_assignee_count: usize,
    pub discount: Decimal,
    pub discount_type: DiscountType,
    pub section_id: SectionKey,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PersonTotal {
    pub person_id: PersonId,
    pub name: String,
    pub line_items: Vec<LineItem>,
    pub subtotal: Money,
    pub tax: Money,
    pub total: Money,
}

impl PersonTotal {
    pub fn empty(person: &Person) -> Self {
        Self {
            person_id: person.id.clone(),
            name: person.name.clone(),
            line_items: Vec::new(),
            subtotal: Money::ZERO,
            tax: Money::ZERO,
            total: Money::ZERO,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Settlement {
    pub person_totals: Vec<PersonTotal>,
}

impl Settlement {
    pub fn get(&self, person_id: &PersonId) -> Option<&PersonTotal> {
        self.person_totals
            .iter()
            .find(|total| &total.person_id == person_id)
    }

    pub fn subtotal(&self) -> Money {
        self.person_totals.iter().map(|total| total.subtotal).sum()
    }

    pub fn tax(&self) -> Money {
        self.person_totals.iter().map(|total| total.tax).sum()
    }

    pub fn grand_total(&self) -> Money {
        self.person_totals.iter().map(|total| total.total).sum()
    }
}

/// Per-section view for display.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SectionSummary {
    pub section_id: SectionKey,
    /// `None` for the default section and for ids no section defines.
    pub name: Option<String>,
    pub subtotal: Money,
    pub tax: Money,
    pub total: Money,
}
