//! Path grammar.
//!
//! A content path starts with a single `/`, has no empty segments and no trailing `/`. The root
//! `/` can be listed but never holds content. Segments are otherwise unrestricted and case
//! sensitive. Paths are keys, not file system paths: drivers are free to map them to directories,
//! object keys or rows.

use crate::{Error, Result};

pub const ROOT: &str = "/";

/// Returns `true` if `path` is a valid content path.
pub fn is_valid(path: &str) -> bool {
    path != ROOT && is_valid_listing(path)
}

/// Returns `true` if `path` may be listed, which is any valid content path and the root.
pub fn is_valid_listing(path: &str) -> bool {
    if path == ROOT {
        return true;
    }

    path.starts_with('/') && !path.ends_with('/') && !path.contains("//")
}

/// Validates a content path, returning `Error::InvalidPath` attributed to `driver` otherwise.
pub fn validate(driver: &str, path: &str) -> Result<()> {
    if is_valid(path) {
        Ok(())
    } else {
        Err(Error::invalid_path(driver, path))
    }
}

/// Validates a listing target.
pub fn validate_listing(driver: &str, path: &str) -> Result<()> {
    if is_valid_listing(path) {
        Ok(())
    } else {
        Err(Error::invalid_path(driver, path))
    }
}

/// Gets the top level segment of a path: `/a/b/c` becomes `/a`.
///
/// Deleting the first part removes everything a path could have created, which makes it handy for
/// cleaning up. Empty segments and trailing slashes are ignored, a path without any segments
/// yields the root.
pub fn first_part(path: &str) -> String {
    match path.split('/').find(|segment| !segment.is_empty()) {
        Some(segment) => format!("/{}", segment),
        None => ROOT.to_owned(),
    }
}

/// Joins two paths with a single `/` between them.
pub fn join(parent: &str, child: &str) -> String {
    let parent = parent.trim_end_matches('/');
    let child = child.trim_start_matches('/');

    format!("{}/{}", parent, child)
}

/// Gets the parent of a content path, the root for top level paths.
pub fn parent(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) | None => ROOT,
        Some(pos) => &path[..pos],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_paths() {
        let paths = [
            "/a",
            "/2",
            "/a.a",
            "/0-9/abcdefg",
            "/abc/1.2.3.4.5-6_zyx/123.z/4",
            "/.abc",
            "/Abc/Cba",
            "/with space/ünïcödé",
        ];

        for path in paths {
            assert!(is_valid(path), "{:?} should be valid", path);
            assert!(is_valid_listing(path), "{:?} should be listable", path);
        }
    }

    #[test]
    fn invalid_paths() {
        let paths = ["", "/", "abc", "123.abc", "//bcd", "/abc_123/", "/a//b"];

        for path in paths {
            assert!(!is_valid(path), "{:?} should be invalid", path);
        }
    }

    #[test]
    fn root_is_listable() {
        assert!(is_valid_listing("/"));
        assert!(!is_valid_listing(""));
        assert!(!is_valid_listing("//"));
        assert!(!is_valid_listing("/a/"));
    }

    #[test]
    fn validate_reports_driver() {
        let err = validate("memory", "abc").unwrap_err();
        assert!(err.is_invalid_path());
        assert_eq!(err.to_string(), "memory: invalid path: abc");

        assert!(validate("memory", "/abc").is_ok());
        assert!(validate_listing("memory", "/").is_ok());
        assert!(validate("memory", "/").is_err());
    }

    #[test]
    fn first_part_of_paths() {
        assert_eq!(first_part(""), "/");
        assert_eq!(first_part("/"), "/");
        assert_eq!(first_part("/a"), "/a");
        assert_eq!(first_part("/a/b/c"), "/a");
        assert_eq!(first_part("/abc_123/"), "/abc_123");
        assert_eq!(first_part("abc/def"), "/abc");
        assert_eq!(first_part("//bcd"), "/bcd");
    }

    #[test]
    fn join_paths() {
        assert_eq!(join("/a/b", "/c/d"), "/a/b/c/d");
        assert_eq!(join("/a/", "c"), "/a/c");
        assert_eq!(join("/", "c"), "/c");
    }

    #[test]
    fn parent_of_paths() {
        assert_eq!(parent("/a"), "/");
        assert_eq!(parent("/a/b/c.txt"), "/a/b");
    }
}
