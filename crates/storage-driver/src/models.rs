use chrono::{DateTime, Utc};

/// Metadata for a path, as returned by `StorageDriver::stat`.
///
/// A snapshot taken at the time of the call, it is never refreshed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileInfo {
    pub path: String,
    /// Size in bytes, always 0 for directories.
    pub size: i64,
    pub is_dir: bool,
    /// Last modification time. Directories are not required to have one.
    pub mod_time: Option<DateTime<Utc>>,
}

impl FileInfo {
    pub fn file(path: impl Into<String>, size: i64, mod_time: DateTime<Utc>) -> FileInfo {
        FileInfo {
            path: path.into(),
            size,
            is_dir: false,
            mod_time: Some(mod_time),
        }
    }

    pub fn directory(path: impl Into<String>, mod_time: Option<DateTime<Utc>>) -> FileInfo {
        FileInfo {
            path: path.into(),
            size: 0,
            is_dir: true,
            mod_time,
        }
    }
}

/// Options for `UrlProvider::url_for`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UrlOptions {
    /// HTTP method the URL will be used with.
    pub method: http::Method,
    /// Time after which the URL no longer has to be valid.
    pub expiry: Option<DateTime<Utc>>,
}

impl Default for UrlOptions {
    fn default() -> UrlOptions {
        UrlOptions {
            method: http::Method::GET,
            expiry: None,
        }
    }
}

impl UrlOptions {
    pub fn with_method(method: http::Method) -> UrlOptions {
        UrlOptions {
            method,
            ..UrlOptions::default()
        }
    }
}
