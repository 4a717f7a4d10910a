use billsplit_domain::{ItemId, Money, PersonId, SectionId, SplitType};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BillCommandError {
    #[error("person '{0}' already exists")]
    DuplicatePerson(PersonId),
    #[error("person '{0}' does not exist")]
    UnknownPerson(PersonId),
    #[error("item '{0}' already exists")]
    DuplicateItem(ItemId),
    #[error("item '{0}' does not exist")]
    UnknownItem(ItemId),
    #[error("section '{0}' already exists")]
    DuplicateSection(SectionId),
    #[error("section '{0}' does not exist")]
    UnknownSection(SectionId),
    #[error("allocations for item '{item_id}' do not form a valid {split_type} split")]
    InvalidAllocations {
        item_id: ItemId,
        split_type: SplitType,
    },
    #[error("item '{item_id}' is split by {split_type}; toggling consumers needs an equal split")]
    NotEqualSplit {
        item_id: ItemId,
        split_type: SplitType,
    },
    #[error("tax amount must not be negative (found {0})")]
    NegativeTax(Money),
}

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("bill storage is unavailable: {0}")]
    Unavailable(String),
    #[error("stored bill could not be decoded: {0}")]
    Corrupted(String),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Command(#[from] BillCommandError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("bill document is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
}
