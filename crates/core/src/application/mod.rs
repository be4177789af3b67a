// Application Layer - Unit of work coordination

pub mod factory;
pub mod unit_of_work;

// Re-exports
pub use factory::UnitOfWorkFactory;
pub use unit_of_work::{ActiveTransactionRecord, Attendee, TransactionRegistry, UnitOfWork};
