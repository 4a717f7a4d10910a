use crate::{
    error::BillCommandError,
    model::{BillCommand, ItemPatch, SectionPatch},
};
use billsplit_domain::{
    Allocation, AllocationValidator, Bill, Item, ItemId, Money, Person, PersonId, Section,
    SectionId, SplitType,
};
use fxhash::FxHashSet;
use rust_decimal::Decimal;

/// Pure state transition over a bill snapshot.
pub struct BillReducer;

impl BillReducer {
    /// Applies `command` to `bill`.
    ///
    /// Takes ownership of the bill and returns the new state. On error the
    /// input is consumed and the caller keeps its own copy.
    pub fn apply(mut bill: Bill, command: BillCommand) -> Result<Bill, BillCommandError> {
        match command {
            BillCommand::AddPerson { id, name } => {
                if bill.person(&id).is_some() {
                    return Err(BillCommandError::DuplicatePerson(id));
                }
                bill.people.push(Person { id, name });
            }
            BillCommand::RenamePerson { id, name } => {
                let person = bill
                    .people
                    .iter_mut()
                    .find(|person| person.id == id)
                    .ok_or(BillCommandError::UnknownPerson(id))?;
                person.name = name;
            }
            BillCommand::RemovePerson { id } => {
                let before = bill.people.len();
                bill.people.retain(|person| person.id != id);
                if bill.people.len() == before {
                    return Err(BillCommandError::UnknownPerson(id));
                }
                for item in &mut bill.items {
                    item.consumed_by
                        .retain(|allocation| allocation.person_id != id);
                }
            }
            BillCommand::AddItem(mut item) => {
                if bill.item(&item.id).is_some() {
                    return Err(BillCommandError::DuplicateItem(item.id));
                }
                ensure_section(&bill, item.section_id.as_ref())?;
                ensure_people(&bill, &item.consumed_by)?;
                item.quantity = item.quantity.max(1);
                if item.is_assigned() {
                    let allocations = std::mem::take(&mut item.consumed_by);
                    let consumed_by = normalize_allocations(&item, allocations)?;
                    item.consumed_by = consumed_by;
                }
                bill.items.push(item);
            }
            BillCommand::UpdateItem { id, patch } => {
                if let Some(Some(section_id)) = &patch.section_id {
                    ensure_section(&bill, Some(section_id))?;
                }
                apply_item_patch(item_mut(&mut bill, &id)?, patch);
            }
            BillCommand::RemoveItem { id } => {
                let before = bill.items.len();
                bill.items.retain(|item| item.id != id);
                if bill.items.len() == before {
                    return Err(BillCommandError::UnknownItem(id));
                }
            }
            BillCommand::SetSplitType {
                item_id,
                split_type,
            } => {
                let item = item_mut(&mut bill, &item_id)?;
                item.split_type = split_type;
                item.consumed_by.clear();
            }
            BillCommand::AssignItem {
                item_id,
                allocations,
            } => {
                ensure_people(&bill, &allocations)?;
                let item = item_mut(&mut bill, &item_id)?;
                let consumed_by = normalize_allocations(item, allocations)?;
                item.consumed_by = consumed_by;
            }
            BillCommand::ToggleConsumer { item_id, person_id } => {
                if bill.person(&person_id).is_none() {
                    return Err(BillCommandError::UnknownPerson(person_id));
                }
                let item = item_mut(&mut bill, &item_id)?;
                if item.split_type != SplitType::Equal {
                    return Err(BillCommandError::NotEqualSplit {
                        item_id,
                        split_type: item.split_type,
                    });
                }
                let before = item.consumed_by.len();
                item.consumed_by
                    .retain(|allocation| allocation.person_id != person_id);
                if item.consumed_by.len() == before {
                    item.consumed_by.push(Allocation::equal(person_id));
                }
            }
            BillCommand::AddSection {
                id,
                name,
                tax_amount,
            } => {
                if bill.section(&id).is_some() {
                    return Err(BillCommandError::DuplicateSection(id));
                }
                ensure_tax(tax_amount)?;
                bill.sections.push(Section {
                    id,
                    name,
                    tax_amount,
                });
            }
            BillCommand::UpdateSection { id, patch } => {
                let SectionPatch { name, tax_amount } = patch;
                if let Some(tax) = tax_amount {
                    ensure_tax(tax)?;
                }
                let section = bill
                    .sections
                    .iter_mut()
                    .find(|section| section.id == id)
                    .ok_or(BillCommandError::UnknownSection(id))?;
                if let Some(name) = name {
                    section.name = name;
                }
                if let Some(tax) = tax_amount {
                    section.tax_amount = tax;
                }
            }
            BillCommand::RemoveSection { id } => {
                let before = bill.sections.len();
                bill.sections.retain(|section| section.id != id);
                if bill.sections.len() == before {
                    return Err(BillCommandError::UnknownSection(id));
                }
                for item in &mut bill.items {
                    if item.section_id.as_ref() == Some(&id) {
                        item.section_id = None;
                    }
                }
            }
            BillCommand::SetDefaultTax(tax) => {
                ensure_tax(tax)?;
                bill.default_tax = tax;
            }
        }

        Ok(bill)
    }
}

fn item_mut<'a>(bill: &'a mut Bill, id: &ItemId) -> Result<&'a mut Item, BillCommandError> {
    bill.items
        .iter_mut()
        .find(|item| &item.id == id)
        .ok_or_else(|| BillCommandError::UnknownItem(id.clone()))
}

fn ensure_people(bill: &Bill, allocations: &[Allocation]) -> Result<(), BillCommandError> {
    let known: FxHashSet<&PersonId> = bill.people.iter().map(|person| &person.id).collect();
    match allocations
        .iter()
        .find(|allocation| !known.contains(&allocation.person_id))
    {
        Some(allocation) => Err(BillCommandError::UnknownPerson(
            allocation.person_id.clone(),
        )),
        None => Ok(()),
    }
}

fn ensure_section(bill: &Bill, section_id: Option<&SectionId>) -> Result<(), BillCommandError> {
    match section_id {
        Some(id) if bill.section(id).is_none() => {
            Err(BillCommandError::UnknownSection(id.clone()))
        }
        _ => Ok(()),
    }
}

fn ensure_tax(tax: Money) -> Result<(), BillCommandError> {
    if tax.signum() < 0 {
        return Err(BillCommandError::NegativeTax(tax));
    }
    Ok(())
}

fn apply_item_patch(item: &mut Item, patch: ItemPatch) {
    let ItemPatch {
        name,
        price,
        quantity,
        discount,
        discount_type,
        section_id,
    } = patch;

    if let Some(name) = name {
        item.name = name;
    }
    if let Some(price) = price {
        item.price = price;
    }
    if let Some(quantity) = quantity {
        item.quantity = quantity.max(1);
    }
    if let Some(discount) = discount {
        item.discount = discount;
    }
    if let Some(discount_type) = discount_type {
        item.discount_type = discount_type;
    }
    if let Some(section_id) = section_id {
        item.section_id = section_id;
    }
}

/// Collapses duplicate people (last listing wins, first position kept) and
/// checks the result against the item's split type.
fn normalize_allocations(
    item: &Item,
    allocations: Vec<Allocation>,
) -> Result<Vec<Allocation>, BillCommandError> {
    let mut normalized: Vec<Allocation> = Vec::with_capacity(allocations.len());
    for allocation in allocations {
        match normalized
            .iter_mut()
            .find(|existing| existing.person_id == allocation.person_id)
        {
            Some(existing) => existing.value = allocation.value,
            None => normalized.push(allocation),
        }
    }

    if item.split_type == SplitType::Equal {
        for allocation in &mut normalized {
            allocation.value = Decimal::ONE;
        }
        return Ok(normalized);
    }

    if !AllocationValidator.validate(Some(normalized.as_slice()), item.split_type) {
        tracing::warn!(
            item_id = %item.id,
            split_type = %item.split_type,
            allocation_count = normalized.len(),
            "Rejected allocations that do not form a valid split"
        );
        return Err(BillCommandError::InvalidAllocations {
            item_id: item.id.clone(),
            split_type: item.split_type,
        });
    }

    Ok(normalized)
}
