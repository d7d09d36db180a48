//! Transaction machinery: contexts, the id/commit manager and the logging
//! seam.

pub mod logging;
pub mod transaction_context;
pub mod transaction_manager;

pub use transaction_context::{TransactionContext, TransactionPhase};
pub use transaction_manager::TransactionManager;
