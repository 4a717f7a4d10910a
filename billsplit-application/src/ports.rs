use crate::error::RepositoryError;
use billsplit_domain::Bill;

/// Persistence adapter owned by the surrounding application.
pub trait BillRepository: Send + Sync {
    /// `Ok(None)` when nothing has been stored yet.
    fn load(&self) -> Result<Option<Bill>, RepositoryError>;

    fn save(&self, bill: &Bill) -> Result<(), RepositoryError>;
}
