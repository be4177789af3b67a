// Unitwork Core - Domain, Ports & Unit-of-Work Coordination
// NO infrastructure dependencies (hexagonal architecture)

pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod port;

pub use application::{UnitOfWork, UnitOfWorkFactory};
pub use error::{Result, StoreError, StoreResult, UnitOfWorkError};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
