use billsplit_domain::{
    Allocation, DiscountType, Item, ItemId, Money, PersonId, SectionId, SectionKey, SplitType,
};
use rust_decimal::Decimal;

/// Data transitions the surrounding application issues against a bill.
#[derive(Debug, Clone, PartialEq)]
pub enum BillCommand {
    AddPerson {
        id: PersonId,
        name: String,
    },
    RenamePerson {
        id: PersonId,
        name: String,
    },
    /// Also drops the person from every item's allocations.
    RemovePerson {
        id: PersonId,
    },
    AddItem(Item),
    UpdateItem {
        id: ItemId,
        patch: ItemPatch,
    },
    RemoveItem {
        id: ItemId,
    },
    /// Always clears the item's allocations.
    SetSplitType {
        item_id: ItemId,
        split_type: SplitType,
    },
    /// Replaces the item's allocations under its current split type.
    AssignItem {
        item_id: ItemId,
        allocations: Vec<Allocation>,
    },
    /// Adds or removes one person from an equally split item.
    ToggleConsumer {
        item_id: ItemId,
        person_id: PersonId,
    },
    AddSection {
        id: SectionId,
        name: String,
        tax_amount: Money,
    },
    UpdateSection {
        id: SectionId,
        patch: SectionPatch,
    },
    /// Moves the section's items to the default section.
    RemoveSection {
        id: SectionId,
    },
    SetDefaultTax(Money),
}

impl BillCommand {
    pub fn kind(&self) -> &'static str {
        match self {
            BillCommand::AddPerson { .. } => "add_person",
            BillCommand::RenamePerson { .. } => "rename_person",
            BillCommand::RemovePerson { .. } => "remove_person",
            BillCommand::AddItem(_) => "add_item",
            BillCommand::UpdateItem { .. } => "update_item",
            BillCommand::RemoveItem { .. } => "remove_item",
            BillCommand::SetSplitType { .. } => "set_split_type",
            BillCommand::AssignItem { .. } => "assign_item",
            BillCommand::ToggleConsumer { .. } => "toggle_consumer",
            BillCommand::AddSection { .. } => "add_section",
            BillCommand::UpdateSection { .. } => "update_section",
            BillCommand::RemoveSection { .. } => "remove_section",
            BillCommand::SetDefaultTax(_) => "set_default_tax",
        }
    }
}

/// Fields of an item to overwrite; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemPatch {
    pub name: Option<String>,
    pub price: Option<Money>,
    pub quantity: Option<u32>,
    pub discount: Option<Decimal>,
    pub discount_type: Option<DiscountType>,
    /// `Some(None)` moves the item to the default section.
    pub section_id: Option<SectionKey>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SectionPatch {
    pub name: Option<String>,
    pub tax_amount: Option<Money>,
}
