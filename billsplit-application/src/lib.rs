#![warn(clippy::uninlined_format_args)]

pub mod error;
pub mod model;
pub mod ports;
pub mod reducer;
pub mod session;
pub mod snapshot;

pub use error::{BillCommandError, RepositoryError, SessionError, SnapshotError};
pub use model::{BillCommand, ItemPatch, SectionPatch};
pub use ports::BillRepository;
pub use reducer::BillReducer;
pub use session::{BillSession, SettlementResult};
pub use snapshot::{BillSnapshot, SettlementReport};
