// Context Configuration Provider Port

use crate::domain::{ConnectionConfiguration, ContextType};
use crate::error::Result;

/// Maps a context type to its connection configuration
#[cfg_attr(test, mockall::automock)]
pub trait ContextConfigProvider: Send + Sync {
    /// Fails with `MissingContextConfiguration` if `context` has no configuration
    fn config_for(&self, context: &ContextType) -> Result<ConnectionConfiguration>;
}
