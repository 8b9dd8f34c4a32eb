use std::{fmt::Debug, sync::Arc};
use tokio::io::AsyncRead;

use crate::{models, Error, Result};

pub type Driver = Arc<dyn StorageDriver>;

/// Sequential stream of content returned by `StorageDriver::read_stream`.
pub type ContentReader = Box<dyn AsyncRead + Send + Unpin>;

/// A storage backend.
///
/// Paths given to content operations must satisfy [`crate::path::is_valid`], drivers reject
/// anything else with `Error::InvalidPath` before touching storage. Wrapping a driver in
/// [`crate::Base`] takes care of that.
///
/// Operations may be called concurrently. Independent reads, and writes to different paths, must
/// not interfere with each other. The outcome of concurrent writes to the same path is
/// unspecified.
///
/// Dropping a returned future cancels the operation. A cancelled `put_content` must leave either
/// the old or the new content in place.
#[async_trait::async_trait]
pub trait StorageDriver: Debug + Send + Sync {
    /// Name of the driver, included in every error it returns.
    fn name(&self) -> &str;

    /// Reads the full content at `path`.
    async fn get_content(&self, path: &str) -> Result<Vec<u8>>;

    /// Replaces the content at `path`. Readers see either the old or the new content in full.
    async fn put_content(&self, path: &str, content: &[u8]) -> Result<()>;

    /// Opens a stream of the content at `path` starting at `offset`.
    ///
    /// Negative offsets fail with `Error::InvalidOffset`. Offsets at or past the end of the
    /// content yield an empty stream.
    async fn read_stream(&self, path: &str, offset: i64) -> Result<ContentReader>;

    /// Writes everything from `reader` into `path` starting at `offset` and returns the number of
    /// bytes consumed.
    ///
    /// Bytes outside the written range are kept. Writing past the end extends the content, the
    /// gap between the old end and `offset` reads as zeroes.
    async fn write_stream(
        &self,
        path: &str,
        offset: i64,
        reader: &mut (dyn AsyncRead + Send + Unpin),
    ) -> Result<i64>;

    /// Gets metadata for a file or a directory.
    async fn stat(&self, path: &str) -> Result<models::FileInfo>;

    /// Lists the direct children of `path` as absolute paths, in no particular order.
    ///
    /// The root can always be listed, even when empty.
    async fn list(&self, path: &str) -> Result<Vec<String>>;

    /// Moves the content at `source` to `dest`, replacing anything at `dest`.
    ///
    /// A missing source fails with `Error::PathNotFound` and leaves `dest` untouched.
    async fn move_path(&self, source: &str, dest: &str) -> Result<()>;

    /// Deletes the content at `path`, or everything below it if it is a directory.
    async fn delete(&self, path: &str) -> Result<()>;

    /// Direct access URLs, for drivers that support them.
    fn url_provider(&self) -> Option<&dyn UrlProvider> {
        None
    }
}

/// Optional capability of drivers that can hand out URLs for direct access to content.
#[async_trait::async_trait]
pub trait UrlProvider: Send + Sync {
    async fn url_for(&self, path: &str, options: &models::UrlOptions) -> Result<String>;
}

/// Gets a direct access URL for `path`, failing with `Error::UnsupportedMethod` if the driver has
/// no [`UrlProvider`].
pub async fn url_for(
    driver: &dyn StorageDriver,
    path: &str,
    options: &models::UrlOptions,
) -> Result<String> {
    match driver.url_provider() {
        Some(provider) => provider.url_for(path, options).await,
        None => Err(Error::unsupported_method(driver.name(), "url_for")),
    }
}
