/// Result type used by every driver operation.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors returned by storage drivers.
///
/// The set of variants is closed. Anything that is not a caller or state error, such as I/O,
/// permission or transport failures, is reported as [`Error::Backend`]. The display output of every
/// variant starts with the driver name.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{driver}: invalid path: {path}")]
    InvalidPath { driver: String, path: String },

    #[error("{driver}: path not found: {path}")]
    PathNotFound { driver: String, path: String },

    #[error("{driver}: invalid offset: {offset} for path: {path}")]
    InvalidOffset {
        driver: String,
        path: String,
        offset: i64,
    },

    #[error("{driver}: unsupported method: {method}")]
    UnsupportedMethod {
        driver: String,
        method: &'static str,
    },

    #[error("{driver}: {error:#}")]
    Backend {
        driver: String,
        error: anyhow::Error,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidPath,
    PathNotFound,
    InvalidOffset,
    UnsupportedMethod,
    Backend,
}

impl Error {
    pub fn invalid_path(driver: impl Into<String>, path: impl Into<String>) -> Error {
        Error::InvalidPath {
            driver: driver.into(),
            path: path.into(),
        }
    }

    pub fn path_not_found(driver: impl Into<String>, path: impl Into<String>) -> Error {
        Error::PathNotFound {
            driver: driver.into(),
            path: path.into(),
        }
    }

    pub fn invalid_offset(driver: impl Into<String>, path: impl Into<String>, offset: i64) -> Error {
        Error::InvalidOffset {
            driver: driver.into(),
            path: path.into(),
            offset,
        }
    }

    pub fn unsupported_method(driver: impl Into<String>, method: &'static str) -> Error {
        Error::UnsupportedMethod {
            driver: driver.into(),
            method,
        }
    }

    pub fn backend(driver: impl Into<String>, error: impl Into<anyhow::Error>) -> Error {
        Error::Backend {
            driver: driver.into(),
            error: error.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidPath { .. } => ErrorKind::InvalidPath,
            Error::PathNotFound { .. } => ErrorKind::PathNotFound,
            Error::InvalidOffset { .. } => ErrorKind::InvalidOffset,
            Error::UnsupportedMethod { .. } => ErrorKind::UnsupportedMethod,
            Error::Backend { .. } => ErrorKind::Backend,
        }
    }

    /// Name of the driver that produced the error.
    pub fn driver(&self) -> &str {
        match self {
            Error::InvalidPath { driver, .. }
            | Error::PathNotFound { driver, .. }
            | Error::InvalidOffset { driver, .. }
            | Error::UnsupportedMethod { driver, .. }
            | Error::Backend { driver, .. } => driver,
        }
    }

    pub fn is_invalid_path(&self) -> bool {
        self.kind() == ErrorKind::InvalidPath
    }

    pub fn is_path_not_found(&self) -> bool {
        self.kind() == ErrorKind::PathNotFound
    }

    pub fn is_invalid_offset(&self) -> bool {
        self.kind() == ErrorKind::InvalidOffset
    }

    pub fn is_unsupported_method(&self) -> bool {
        self.kind() == ErrorKind::UnsupportedMethod
    }
}
