pub mod allocation_resolver;
pub mod allocation_validator;
pub mod discount_normalizer;
pub mod settlement_calculator;
pub mod settlement_rounding;
pub mod tax_apportioner;

pub use allocation_resolver::AllocationResolver;
pub use allocation_validator::AllocationValidator;
pub use discount_normalizer::DiscountNormalizer;
pub use settlement_calculator::SettlementCalculator;
pub use settlement_rounding::{
    RoundingMode, SettlementContext, SettlementRoundingError, quantize_amounts,
    quantize_settlement,
};
pub use tax_apportioner::{SectionSubtotals, SectionTaxes, TaxApportioner};
