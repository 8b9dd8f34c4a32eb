//! Validating wrapper for drivers.
//!
//! `Base` checks paths and offsets before an operation reaches the wrapped driver, and traces
//! every operation that does. Drivers wrapped in it can assume their input is well formed.

use std::{future::Future, sync::Arc, time::Instant};
use tokio::io::AsyncRead;

use crate::{
    driver::{ContentReader, Driver, StorageDriver, UrlProvider},
    models, path, Error, Result,
};

#[derive(Debug)]
pub struct Base<D> {
    driver: D,
}

impl<D: StorageDriver + 'static> Base<D> {
    pub fn new(driver: D) -> Base<D> {
        Base { driver }
    }

    pub fn into_driver(self) -> Driver {
        Arc::new(self)
    }

    pub fn inner(&self) -> &D {
        &self.driver
    }

    fn check_offset(&self, path: &str, offset: i64) -> Result<()> {
        if offset < 0 {
            Err(Error::invalid_offset(self.name(), path, offset))
        } else {
            Ok(())
        }
    }
}

async fn traced<T>(
    driver: &str,
    operation: &'static str,
    path: &str,
    future: impl Future<Output = Result<T>>,
) -> Result<T> {
    let start = Instant::now();
    let result = future.await;

    match &result {
        Ok(_) => tracing::trace!(
            driver,
            operation,
            path,
            elapsed = ?start.elapsed(),
            "operation finished"
        ),
        Err(err) => tracing::debug!(
            driver,
            operation,
            path,
            elapsed = ?start.elapsed(),
            "operation failed: {}",
            err
        ),
    }

    result
}

#[async_trait::async_trait]
impl<D: StorageDriver + 'static> StorageDriver for Base<D> {
    fn name(&self) -> &str {
        self.driver.name()
    }

    async fn get_content(&self, path: &str) -> Result<Vec<u8>> {
        path::validate(self.name(), path)?;

        traced(self.name(), "get_content", path, self.driver.get_content(path)).await
    }

    async fn put_content(&self, path: &str, content: &[u8]) -> Result<()> {
        path::validate(self.name(), path)?;

        let future = self.driver.put_content(path, content);
        traced(self.name(), "put_content", path, future).await
    }

    async fn read_stream(&self, path: &str, offset: i64) -> Result<ContentReader> {
        path::validate(self.name(), path)?;
        self.check_offset(path, offset)?;

        let future = self.driver.read_stream(path, offset);
        traced(self.name(), "read_stream", path, future).await
    }

    async fn write_stream(
        &self,
        path: &str,
        offset: i64,
        reader: &mut (dyn AsyncRead + Send + Unpin),
    ) -> Result<i64> {
        path::validate(self.name(), path)?;
        self.check_offset(path, offset)?;

        let future = self.driver.write_stream(path, offset, reader);
        traced(self.name(), "write_stream", path, future).await
    }

    async fn stat(&self, path: &str) -> Result<models::FileInfo> {
        path::validate(self.name(), path)?;

        traced(self.name(), "stat", path, self.driver.stat(path)).await
    }

    async fn list(&self, path: &str) -> Result<Vec<String>> {
        path::validate_listing(self.name(), path)?;

        traced(self.name(), "list", path, self.driver.list(path)).await
    }

    async fn move_path(&self, source: &str, dest: &str) -> Result<()> {
        path::validate(self.name(), source)?;
        path::validate(self.name(), dest)?;

        let future = self.driver.move_path(source, dest);
        traced(self.name(), "move_path", source, future).await
    }

    async fn delete(&self, path: &str) -> Result<()> {
        path::validate(self.name(), path)?;

        traced(self.name(), "delete", path, self.driver.delete(path)).await
    }

    fn url_provider(&self) -> Option<&dyn UrlProvider> {
        self.driver
            .url_provider()
            .map(|_| self as &dyn UrlProvider)
    }
}

#[async_trait::async_trait]
impl<D: StorageDriver + 'static> UrlProvider for Base<D> {
    async fn url_for(&self, path: &str, options: &models::UrlOptions) -> Result<String> {
        path::validate(self.name(), path)?;

        match self.driver.url_provider() {
            Some(provider) => {
                let future = provider.url_for(path, options);
                traced(self.name(), "url_for", path, future).await
            }
            None => Err(Error::unsupported_method(self.name(), "url_for")),
        }
    }
}
