//! A storage driver keeping everything in memory.
//!
//! Directories aren't stored, a directory exists as long as there is a file below it. Contents are
//! lost when the last handle to the driver is dropped.

use anyhow::{anyhow, ensure};
use chrono::{DateTime, Utc};
use std::{
    collections::{BTreeMap, BTreeSet},
    io,
};
use tokio::{
    io::{AsyncRead, AsyncReadExt},
    sync::RwLock,
};

use storage_driver::{
    path, Base, ContentReader, Driver, Error, FileInfo, Result, StorageDriver,
};

pub const DRIVER_NAME: &str = "inmemory";

/// Largest file the driver accepts, in bytes.
pub const MAX_FILE_SIZE: u64 = 16 << 30;

/// Creates an empty in-memory driver.
pub fn new() -> Driver {
    Base::new(InMemoryDriver::default()).into_driver()
}

#[derive(Debug, Default)]
pub struct InMemoryDriver {
    state: RwLock<State>,
}

#[derive(Debug, Default)]
struct State {
    files: BTreeMap<String, File>,
    last_mod_time: Option<DateTime<Utc>>,
}

#[derive(Debug)]
struct File {
    data: Vec<u8>,
    mod_time: DateTime<Utc>,
}

impl State {
    /// Current time, always after any time handed out before.
    fn tick(&mut self) -> DateTime<Utc> {
        let mut now = Utc::now();

        if let Some(last) = self.last_mod_time {
            if now <= last {
                now = last + chrono::Duration::microseconds(1);
            }
        }

        self.last_mod_time = Some(now);
        now
    }

    /// Every file below `dir`, in order.
    fn descendants<'a>(&'a self, dir: &str) -> impl Iterator<Item = (&'a String, &'a File)> + 'a {
        let prefix = dir_prefix(dir);

        self.files
            .range(prefix.clone()..)
            .take_while(move |(key, _)| key.starts_with(&prefix))
    }

    fn is_dir(&self, path: &str) -> bool {
        self.descendants(path).next().is_some()
    }

    /// Checks that a file can be stored at `path` without clobbering a directory or nesting
    /// below a file.
    fn check_writable(&self, path: &str) -> anyhow::Result<()> {
        ensure!(!self.is_dir(path), "{} is a directory", path);

        let mut parent = path::parent(path);
        while parent != path::ROOT {
            ensure!(
                !self.files.contains_key(parent),
                "{} is not a directory",
                parent
            );
            parent = path::parent(parent);
        }

        Ok(())
    }
}

fn dir_prefix(dir: &str) -> String {
    if dir == path::ROOT {
        path::ROOT.to_owned()
    } else {
        format!("{}/", dir)
    }
}

fn backend(err: anyhow::Error) -> Error {
    Error::backend(DRIVER_NAME, err)
}

/// Writes `buffer` at `offset`, zero filling any gap. `data` is left alone if it can't grow.
fn splice(data: &mut Vec<u8>, offset: usize, buffer: &[u8]) -> Result<()> {
    let end = offset + buffer.len();

    if data.len() < end {
        data.try_reserve(end - data.len())
            .map_err(|err| backend(anyhow!(err).context("growing file")))?;
        data.resize(end, 0);
    }
    data[offset..end].copy_from_slice(buffer);

    Ok(())
}

fn offset_index(path: &str, offset: i64) -> Result<usize> {
    usize::try_from(offset).map_err(|_| Error::invalid_offset(DRIVER_NAME, path, offset))
}

#[async_trait::async_trait]
impl StorageDriver for InMemoryDriver {
    fn name(&self) -> &str {
        DRIVER_NAME
    }

    async fn get_content(&self, path: &str) -> Result<Vec<u8>> {
        let state = self.state.read().await;

        state
            .files
            .get(path)
            .map(|file| file.data.clone())
            .ok_or_else(|| Error::path_not_found(DRIVER_NAME, path))
    }

    async fn put_content(&self, path: &str, content: &[u8]) -> Result<()> {
        let mut state = self.state.write().await;
        state.check_writable(path).map_err(backend)?;

        let mod_time = state.tick();
        state.files.insert(
            path.to_owned(),
            File {
                data: content.to_vec(),
                mod_time,
            },
        );

        Ok(())
    }

    async fn read_stream(&self, path: &str, offset: i64) -> Result<ContentReader> {
        let offset = offset_index(path, offset)?;
        let state = self.state.read().await;

        let file = state
            .files
            .get(path)
            .ok_or_else(|| Error::path_not_found(DRIVER_NAME, path))?;
        let offset = offset.min(file.data.len());

        Ok(Box::new(io::Cursor::new(file.data[offset..].to_vec())))
    }

    async fn write_stream(
        &self,
        path: &str,
        offset: i64,
        reader: &mut (dyn AsyncRead + Send + Unpin),
    ) -> Result<i64> {
        let offset = offset_index(path, offset)?;

        // Buffer the input first, the lock isn't held while waiting on the reader.
        let mut buffer = Vec::new();
        reader
            .read_to_end(&mut buffer)
            .await
            .map_err(|err| backend(anyhow!(err).context("reading input")))?;

        offset
            .checked_add(buffer.len())
            .filter(|&end| end as u64 <= MAX_FILE_SIZE)
            .ok_or_else(|| {
                backend(anyhow!(
                    "writing {} bytes at offset {} to {} exceeds the {} byte file limit",
                    buffer.len(),
                    offset,
                    path,
                    MAX_FILE_SIZE
                ))
            })?;

        let mut guard = self.state.write().await;
        let state = &mut *guard;
        state.check_writable(path).map_err(backend)?;

        match state.files.get_mut(path) {
            Some(file) => {
                splice(&mut file.data, offset, &buffer)?;
                let mod_time = state.tick();
                if let Some(file) = state.files.get_mut(path) {
                    file.mod_time = mod_time;
                }
            }
            None => {
                let mut data = Vec::new();
                splice(&mut data, offset, &buffer)?;

                let mod_time = state.tick();
                state.files.insert(path.to_owned(), File { data, mod_time });
            }
        }

        Ok(buffer.len() as i64)
    }

    async fn stat(&self, path: &str) -> Result<FileInfo> {
        let state = self.state.read().await;

        if let Some(file) = state.files.get(path) {
            return Ok(FileInfo::file(path, file.data.len() as i64, file.mod_time));
        }

        state
            .descendants(path)
            .map(|(_, file)| file.mod_time)
            .max()
            .map(|mod_time| FileInfo::directory(path, Some(mod_time)))
            .ok_or_else(|| Error::path_not_found(DRIVER_NAME, path))
    }

    async fn list(&self, path: &str) -> Result<Vec<String>> {
        let state = self.state.read().await;
        let prefix = dir_prefix(path);

        let children = state
            .descendants(path)
            .map(|(key, _)| {
                let rest = &key[prefix.len()..];
                match rest.find('/') {
                    Some(pos) => path::join(path, &rest[..pos]),
                    None => path::join(path, rest),
                }
            })
            .collect::<BTreeSet<_>>();

        if children.is_empty() && path != path::ROOT {
            return Err(Error::path_not_found(DRIVER_NAME, path));
        }

        Ok(children.into_iter().collect())
    }

    async fn move_path(&self, source: &str, dest: &str) -> Result<()> {
        let mut guard = self.state.write().await;
        let state = &mut *guard;

        if state.files.contains_key(source) {
            if source == dest {
                return Ok(());
            }

            state.check_writable(dest).map_err(backend)?;
            if let Some(file) = state.files.remove(source) {
                state.files.insert(dest.to_owned(), file);
            }

            return Ok(());
        }

        let keys = state
            .descendants(source)
            .map(|(key, _)| key.clone())
            .collect::<Vec<_>>();
        if keys.is_empty() {
            return Err(Error::path_not_found(DRIVER_NAME, source));
        }

        if dest.starts_with(&dir_prefix(source)) || dest == source {
            return Err(backend(anyhow!("cannot move {} into itself", source)));
        }
        if state.files.contains_key(dest) || state.is_dir(dest) {
            return Err(backend(anyhow!("{} already exists", dest)));
        }
        state.check_writable(dest).map_err(backend)?;

        tracing::trace!(source, dest, files = keys.len(), "moving directory");

        for key in keys {
            if let Some(file) = state.files.remove(&key) {
                let moved = format!("{}{}", dest, &key[source.len()..]);
                state.files.insert(moved, file);
            }
        }

        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let mut state = self.state.write().await;
        let prefix = dir_prefix(path);

        let before = state.files.len();
        state
            .files
            .retain(|key, _| key != path && !key.starts_with(&prefix));

        if state.files.len() == before {
            return Err(Error::path_not_found(DRIVER_NAME, path));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storage_driver::ErrorKind;

    async fn read(driver: &Driver, path: &str, offset: i64) -> Vec<u8> {
        let mut reader = driver.read_stream(path, offset).await.unwrap();
        let mut contents = Vec::new();
        reader.read_to_end(&mut contents).await.unwrap();
        contents
    }

    #[tokio::test]
    async fn write_stream_fills_gaps_with_zeros() {
        let driver = new();

        let written = driver
            .write_stream("/file", 0, &mut &b"AAAA"[..])
            .await
            .unwrap();
        assert_eq!(written, 4);

        let written = driver
            .write_stream("/file", 8, &mut &b"BBBB"[..])
            .await
            .unwrap();
        assert_eq!(written, 4);

        assert_eq!(
            driver.get_content("/file").await.unwrap(),
            b"AAAA\0\0\0\0BBBB"
        );
        assert_eq!(driver.stat("/file").await.unwrap().size, 12);
    }

    #[tokio::test]
    async fn write_stream_rejects_writes_past_the_size_limit() {
        let driver = new();

        let err = driver
            .write_stream("/file", i64::MAX - 8, &mut &b"x"[..])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Backend);
        assert!(err.to_string().contains(DRIVER_NAME));

        let err = driver
            .write_stream("/file", MAX_FILE_SIZE as i64, &mut &b"x"[..])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Backend);

        let err = driver.get_content("/file").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PathNotFound);

        driver
            .write_stream("/file", 0, &mut &b"x"[..])
            .await
            .unwrap();
        assert_eq!(driver.get_content("/file").await.unwrap(), b"x");
    }

    #[tokio::test]
    async fn write_stream_keeps_bytes_past_the_write() {
        let driver = new();
        driver.put_content("/file", b"AAAAAAAA").await.unwrap();

        driver
            .write_stream("/file", 2, &mut &b"BB"[..])
            .await
            .unwrap();

        assert_eq!(driver.get_content("/file").await.unwrap(), b"AABBAAAA");
    }

    #[tokio::test]
    async fn directories_are_implied() {
        let driver = new();
        driver.put_content("/a/b/c.txt", b"hello").await.unwrap();

        assert_eq!(driver.list("/").await.unwrap(), ["/a"]);
        assert_eq!(driver.list("/a").await.unwrap(), ["/a/b"]);
        assert_eq!(driver.list("/a/b").await.unwrap(), ["/a/b/c.txt"]);

        let info = driver.stat("/a").await.unwrap();
        assert!(info.is_dir);
        assert_eq!(info.size, 0);

        let info = driver.stat("/a/b/c.txt").await.unwrap();
        assert!(!info.is_dir);
        assert_eq!(info.size, 5);
    }

    #[tokio::test]
    async fn list_missing_directory() {
        let driver = new();
        assert!(driver.list("/").await.unwrap().is_empty());

        let err = driver.list("/missing").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PathNotFound);
    }

    #[tokio::test]
    async fn files_are_not_directories() {
        let driver = new();
        driver.put_content("/file", b"").await.unwrap();
        driver.put_content("/dir/file", b"").await.unwrap();

        let err = driver.put_content("/file/nested", b"").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Backend);
        assert!(err.to_string().contains(DRIVER_NAME));

        let err = driver.put_content("/dir", b"").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Backend);
    }

    #[tokio::test]
    async fn read_past_the_end() {
        let driver = new();
        driver.put_content("/file", b"abc").await.unwrap();

        assert_eq!(read(&driver, "/file", 2).await, b"c");
        assert!(read(&driver, "/file", 3).await.is_empty());
        assert!(read(&driver, "/file", 100).await.is_empty());
    }

    #[tokio::test]
    async fn raw_driver_rejects_negative_offsets() {
        let driver = InMemoryDriver::default();

        let err = driver.read_stream("/file", -1).await.err().unwrap();
        assert_eq!(err.kind(), ErrorKind::InvalidOffset);
    }

    #[tokio::test]
    async fn delete_is_recursive() {
        let driver = new();
        driver.put_content("/dir/a", b"a").await.unwrap();
        driver.put_content("/dir/sub/b", b"b").await.unwrap();
        driver.put_content("/dirty", b"c").await.unwrap();

        driver.delete("/dir").await.unwrap();

        assert_eq!(driver.list("/").await.unwrap(), ["/dirty"]);

        let err = driver.delete("/dir").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PathNotFound);
    }

    #[tokio::test]
    async fn move_directory() {
        let driver = new();
        driver.put_content("/src/a", b"a").await.unwrap();
        driver.put_content("/src/sub/b", b"b").await.unwrap();

        driver.move_path("/src", "/dest/nested").await.unwrap();

        assert_eq!(driver.list("/").await.unwrap(), ["/dest"]);
        assert_eq!(driver.get_content("/dest/nested/a").await.unwrap(), b"a");
        assert_eq!(driver.get_content("/dest/nested/sub/b").await.unwrap(), b"b");

        let err = driver.move_path("/dest", "/dest/inside").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Backend);
    }

    #[tokio::test]
    async fn move_missing_file() {
        let driver = new();

        let err = driver.move_path("/missing", "/dest").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PathNotFound);
    }

    #[tokio::test]
    async fn modification_times_increase() {
        let driver = new();

        driver.put_content("/file", b"1").await.unwrap();
        let first = driver.stat("/file").await.unwrap().mod_time.unwrap();

        driver.put_content("/file", b"2").await.unwrap();
        let second = driver.stat("/file").await.unwrap().mod_time.unwrap();

        assert!(second > first);
    }
}
