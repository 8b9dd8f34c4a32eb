//! Storage driver contract.
//!
//! A storage driver stores opaque byte content under slash separated paths. Drivers may be backed
//! by anything from a local directory to an eventually consistent object store, so the contract
//! only promises what all of them can deliver:
//!
//! - `put_content` is atomic from the caller's point of view and replaces any previous content.
//! - `write_stream` writes at an offset, extending the content and zero filling any gap.
//! - `read_stream` reading past the end yields an empty stream, not an error.
//! - Once `stat` reports a size, reads up to that size return the written bytes.
//!
//! Every error carries the name of the driver that produced it, see [`Error`].

pub use base::Base;
pub use driver::{url_for, ContentReader, Driver, StorageDriver, UrlProvider};
pub use error::{Error, ErrorKind, Result};
pub use models::{FileInfo, UrlOptions};

pub mod base;
pub mod driver;
pub mod error;
pub mod models;
pub mod path;
