// Unit of Work Factory - one unit of work per logical operation

use crate::application::UnitOfWork;
use crate::error::UnitOfWorkError;
use crate::port::{
    ContextConfigProvider, ContextResolver, EntityContextLocator, SystemTimeProvider, TimeProvider,
};
use futures::future::BoxFuture;
use std::sync::Arc;
use tracing::error;

/// Holds the process-wide collaborators and hands out fresh units of work
#[derive(Clone)]
pub struct UnitOfWorkFactory {
    locator: Arc<dyn EntityContextLocator>,
    config_provider: Arc<dyn ContextConfigProvider>,
    resolver: Arc<dyn ContextResolver>,
    time_provider: Arc<dyn TimeProvider>,
}

impl UnitOfWorkFactory {
    pub fn new(
        locator: Arc<dyn EntityContextLocator>,
        config_provider: Arc<dyn ContextConfigProvider>,
        resolver: Arc<dyn ContextResolver>,
    ) -> Self {
        Self {
            locator,
            config_provider,
            resolver,
            time_provider: Arc::new(SystemTimeProvider),
        }
    }

    pub fn with_time_provider(mut self, time_provider: Arc<dyn TimeProvider>) -> Self {
        self.time_provider = time_provider;
        self
    }

    /// Empty unit of work; the caller must dispose it
    pub fn begin(&self) -> UnitOfWork {
        UnitOfWork::new(
            Arc::clone(&self.locator),
            Arc::clone(&self.config_provider),
            Arc::clone(&self.resolver),
            Arc::clone(&self.time_provider),
        )
    }

    /// Run `work` in a fresh unit of work, commit if it succeeds, and always dispose.
    ///
    /// When both the work (or commit) and the disposal fail, the first error is
    /// returned and the disposal error is logged.
    ///
    /// # Example
    /// ```text
    /// let id = factory
    ///     .scope(|uow| Box::pin(async move {
    ///         let sales = uow.context_as::<Order, SqliteContext>().await?;
    ///         sales.execute("INSERT INTO orders (id) VALUES (1)").await?;
    ///         Ok::<_, UnitOfWorkError>(1)
    ///     }))
    ///     .await?;
    /// ```
    pub async fn scope<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: for<'u> FnOnce(&'u mut UnitOfWork) -> BoxFuture<'u, Result<T, E>>,
        E: From<UnitOfWorkError>,
    {
        let mut uow = self.begin();

        let outcome = match work(&mut uow).await {
            Ok(value) => uow.commit().await.map(|_| value).map_err(E::from),
            Err(err) => Err(err),
        };
        let disposed = uow.dispose().await;

        match (outcome, disposed) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(dispose_err)) => Err(E::from(dispose_err)),
            (Err(err), Ok(())) => Err(err),
            (Err(err), Err(dispose_err)) => {
                error!(error = %dispose_err, "Dispose failed after unit of work error");
                Err(err)
            }
        }
    }
}
