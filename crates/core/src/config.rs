// Data Configuration - connection settings per persistence context

use crate::domain::{ConnectionConfiguration, ContextType};
use crate::error::{Result, UnitOfWorkError};
use crate::port::ContextConfigProvider;
use ::config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

pub use ::config::FileFormat;

/// Environment prefix, e.g. `UNITWORK__CONTEXTS__SALES__CONNECTION_STRING`
pub const ENV_PREFIX: &str = "UNITWORK";

/// Named context configurations
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default)]
    pub contexts: BTreeMap<String, ConnectionConfiguration>,
}

impl DataConfig {
    /// Load from an optional file, overridden by `UNITWORK__`-prefixed environment variables
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }
        let settings = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let data: DataConfig = settings.try_deserialize()?;
        data.validate()?;

        info!(contexts = data.contexts.len(), "Data configuration loaded");
        Ok(data)
    }

    /// Parse from an in-memory document (tests, embedded defaults)
    pub fn parse(content: &str, format: FileFormat) -> Result<Self> {
        let data: DataConfig = Config::builder()
            .add_source(File::from_str(content, format))
            .build()?
            .try_deserialize()?;
        data.validate()?;
        Ok(data)
    }

    pub fn with_context(mut self, name: impl Into<String>, config: ConnectionConfiguration) -> Self {
        self.contexts.insert(name.into(), config);
        self
    }

    pub fn validate(&self) -> Result<()> {
        for (name, entry) in &self.contexts {
            if entry.context_type.as_str().trim().is_empty() {
                return Err(UnitOfWorkError::Config(format!(
                    "context entry `{}` has an empty context_type",
                    name
                )));
            }
            if entry.connection_string.trim().is_empty() {
                return Err(UnitOfWorkError::Config(format!(
                    "context entry `{}` has an empty connection_string",
                    name
                )));
            }
        }
        Ok(())
    }
}

impl ContextConfigProvider for DataConfig {
    fn config_for(&self, context: &ContextType) -> Result<ConnectionConfiguration> {
        let mut matches = self
            .contexts
            .values()
            .filter(|entry| entry.context_type == *context);

        match (matches.next(), matches.next()) {
            (Some(entry), None) => Ok(entry.clone()),
            (None, _) => Err(UnitOfWorkError::MissingContextConfiguration {
                context: context.clone(),
            }),
            (Some(_), Some(_)) => Err(UnitOfWorkError::AmbiguousContextConfiguration {
                context: context.clone(),
                count: 2 + matches.count(),
            }),
        }
    }
}
