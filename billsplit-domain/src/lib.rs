#![warn(clippy::uninlined_format_args)]

pub mod model;
pub mod services;

pub use model::{
    Allocation, Bill, DiscountType, Item, ItemId, LineItem, Money, Person, PersonAmounts,
    PersonId, PersonTotal, RemainderPolicy, Section, SectionId, SectionKey, SectionSummary,
    Settlement, SplitType, WORKING_SCALE,
};
pub use services::{
    AllocationResolver, AllocationValidator, DiscountNormalizer, SettlementCalculator,
    TaxApportioner,
};
