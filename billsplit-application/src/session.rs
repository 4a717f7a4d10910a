use crate::{
    error::SessionError, model::BillCommand, ports::BillRepository, reducer::BillReducer,
};
use billsplit_domain::{
    Bill, Money, SectionSummary, Settlement, SettlementCalculator,
    services::{SettlementContext, SettlementRoundingError, quantize_settlement},
};

/// Everything a caller renders after a bill changes.
#[derive(Debug, Clone, PartialEq)]
pub struct SettlementResult {
    pub settlement: Settlement,
    /// Every item's discounted line total, assigned or not.
    pub bill_subtotal: Money,
    pub sections: Vec<SectionSummary>,
}

impl SettlementResult {
    pub fn from_bill(bill: &Bill) -> Self {
        let calculator = SettlementCalculator;
        Self {
            settlement: calculator.calculate(bill),
            bill_subtotal: calculator.bill_subtotal(bill),
            sections: calculator.sections_summary(bill),
        }
    }

    /// Rounds person subtotals and taxes to `context`'s atomic unit.
    pub fn rounded(self, context: SettlementContext) -> Result<Self, SettlementRoundingError> {
        Ok(Self {
            settlement: quantize_settlement(&self.settlement, context)?,
            ..self
        })
    }
}

/// Applies commands to a bill and hands every new state to the repository.
pub struct BillSession<'a> {
    repository: &'a dyn BillRepository,
    bill: Bill,
}

impl<'a> BillSession<'a> {
    /// Starts from the stored bill, or an empty one when nothing is stored.
    pub fn open(repository: &'a dyn BillRepository) -> Result<Self, SessionError> {
        let bill = repository.load()?.unwrap_or_default();
        tracing::debug!(
            person_count = bill.people.len(),
            item_count = bill.items.len(),
            "Bill session opened"
        );
        Ok(Self { repository, bill })
    }

    pub fn with_bill(repository: &'a dyn BillRepository, bill: Bill) -> Self {
        Self { repository, bill }
    }

    pub fn bill(&self) -> &Bill {
        &self.bill
    }

    /// Reduces `command` and saves the result.
    ///
    /// The session state only advances once the save succeeded.
    pub fn dispatch(&mut self, command: BillCommand) -> Result<(), SessionError> {
        let kind = command.kind();
        let next = match BillReducer::apply(self.bill.clone(), command) {
            Ok(next) => next,
            Err(err) => {
                tracing::warn!(command = kind, error = %err, "Bill command rejected");
                return Err(err.into());
            }
        };

        if let Err(err) = self.repository.save(&next) {
            tracing::error!(command = kind, error = %err, "Failed to persist bill");
            return Err(err.into());
        }

        self.bill = next;
        tracing::debug!(command = kind, "Bill command applied");
        Ok(())
    }

    pub fn settlement(&self) -> SettlementResult {
        SettlementResult::from_bill(&self.bill)
    }
}
