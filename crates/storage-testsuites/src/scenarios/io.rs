use anyhow::{ensure, Context, Result};
use tokio::io::AsyncReadExt;

use storage_driver::ErrorKind;

use super::{expect_error, ScenarioContext};
use crate::{
    suite::Outcome,
    util::{ensure_bytes_eq, read_all, HashingReader, RandReader},
};

/// Puts `contents` in one go and reads it back.
pub(super) async fn write_read_compare(
    cx: &mut ScenarioContext,
    contents: &[u8],
) -> Result<Outcome> {
    let path = cx.random_path(32);

    put_get(cx, &path, contents).await?;

    Ok(Outcome::Passed)
}

async fn put_get(cx: &ScenarioContext, path: &str, contents: &[u8]) -> Result<()> {
    cx.driver
        .put_content(path, contents)
        .await
        .context("putting content")?;

    let received = cx
        .driver
        .get_content(path)
        .await
        .context("getting content")?;

    ensure_bytes_eq(&received, contents, "read contents")
}

/// Streams `contents` in and reads it back as a stream.
pub(super) async fn write_read_compare_streams(
    cx: &mut ScenarioContext,
    contents: &[u8],
) -> Result<Outcome> {
    let path = cx.random_path(32);

    let mut reader = contents;
    let written = cx
        .driver
        .write_stream(&path, 0, &mut reader)
        .await
        .context("writing stream")?;
    ensure!(
        written == contents.len() as i64,
        "wrote {} bytes, expected {}",
        written,
        contents.len()
    );

    let reader = cx
        .driver
        .read_stream(&path, 0)
        .await
        .context("opening stream")?;
    let received = read_all(reader).await.context("reading stream")?;

    ensure_bytes_eq(&received, contents, "streamed contents")?;

    Ok(Outcome::Passed)
}

/// Putting shorter content after longer content drops the excess.
pub(super) async fn truncate(cx: &mut ScenarioContext) -> Result<Outcome> {
    let path = cx.random_path(32);

    let contents = cx.generator.contents(1 << 20);
    put_get(cx, &path, &contents).await.context("long content")?;

    let contents = cx.generator.contents(1024);
    put_get(cx, &path, &contents).await.context("short content")?;

    Ok(Outcome::Passed)
}

pub(super) async fn read_nonexistent(cx: &mut ScenarioContext) -> Result<Outcome> {
    let path = cx.generator.path(32);
    let name = cx.driver_name();

    let result = cx.driver.get_content(&path).await;
    expect_error(result, ErrorKind::PathNotFound, &name)?;

    Ok(Outcome::Passed)
}

/// Streams a payload that is never held in memory in full, and compares checksums.
pub(super) async fn write_read_large_streams(cx: &mut ScenarioContext) -> Result<Outcome> {
    let path = cx.random_path(32);
    let size = cx.config.large_stream_size;

    let mut contents = HashingReader::new(RandReader::new(&mut cx.generator, size));
    let written = cx
        .driver
        .write_stream(&path, 0, &mut contents)
        .await
        .context("writing large stream")?;
    ensure!(
        written == size as i64,
        "wrote {} bytes, expected {}",
        written,
        size
    );

    let reader = cx
        .driver
        .read_stream(&path, 0)
        .await
        .context("opening large stream")?;
    let mut reader = HashingReader::new(reader);
    let read = tokio::io::copy(&mut reader, &mut tokio::io::sink())
        .await
        .context("reading large stream")?;
    ensure!(read == size, "read {} bytes, expected {}", read, size);

    let expected = contents.checksum();
    let actual = reader.checksum();
    ensure!(
        actual == expected,
        "checksum mismatch: got {}, expected {}",
        hex::encode(actual),
        hex::encode(expected)
    );

    Ok(Outcome::Passed)
}

pub(super) async fn read_stream_with_offset(cx: &mut ScenarioContext) -> Result<Outcome> {
    const CHUNK_SIZE: usize = 32;

    let path = cx.random_path(32);
    let name = cx.driver_name();

    let chunk1 = cx.generator.contents(CHUNK_SIZE);
    let chunk2 = cx.generator.contents(CHUNK_SIZE);
    let chunk3 = cx.generator.contents(CHUNK_SIZE);
    let contents = [&chunk1[..], &chunk2[..], &chunk3[..]].concat();

    cx.driver
        .put_content(&path, &contents)
        .await
        .context("putting content")?;

    for chunk in 0..3 {
        let offset = chunk * CHUNK_SIZE;
        let reader = cx
            .driver
            .read_stream(&path, offset as i64)
            .await
            .with_context(|| format!("opening stream at offset {}", offset))?;
        let received = read_all(reader).await?;

        ensure_bytes_eq(
            &received,
            &contents[offset..],
            &format!("contents from offset {}", offset),
        )?;
    }

    let result = cx.driver.read_stream(&path, -1).await;
    match expect_error(result, ErrorKind::InvalidOffset, &name)? {
        storage_driver::Error::InvalidOffset {
            path: err_path,
            offset,
            ..
        } => {
            ensure!(offset == -1, "error reports offset {}, expected -1", offset);
            ensure!(
                err_path == path,
                "error reports path {:?}, expected {:?}",
                err_path,
                path
            );
        }
        err => anyhow::bail!("unexpected error: {}", err),
    }

    let mut buf = [0u8; CHUNK_SIZE];

    // Reading at the end yields an empty stream.
    let mut reader = cx
        .driver
        .read_stream(&path, 3 * CHUNK_SIZE as i64)
        .await
        .context("opening stream at the end")?;
    let n = reader.read(&mut buf).await?;
    ensure!(n == 0, "read {} bytes at the end of the content", n);

    // One byte before the end yields that byte, then nothing.
    let mut reader = cx
        .driver
        .read_stream(&path, 3 * CHUNK_SIZE as i64 - 1)
        .await
        .context("opening stream before the end")?;
    let n = reader.read(&mut buf).await?;
    ensure!(n == 1, "read {} bytes one byte before the end", n);
    ensure!(buf[0] == contents[3 * CHUNK_SIZE - 1], "read the wrong last byte");

    let n = reader.read(&mut buf).await?;
    ensure!(n == 0, "read {} bytes past the end", n);

    Ok(Outcome::Passed)
}

/// Resumes a stream write chunk by chunk, the way uploads are resumed.
pub(super) async fn continue_stream_append(
    cx: &mut ScenarioContext,
    chunk_size: usize,
) -> Result<Outcome> {
    let path = cx.random_path(32);
    let name = cx.driver_name();
    let chunk = chunk_size as i64;

    let chunk1 = cx.generator.contents(chunk_size);
    let chunk2 = cx.generator.contents(chunk_size);
    let chunk3 = cx.generator.contents(chunk_size);
    let chunk4 = cx.generator.contents(chunk_size);
    let zero_chunk = vec![0u8; chunk_size];

    let mut full_contents = [&chunk1[..], &chunk2[..], &chunk3[..]].concat();

    write_at(cx, &path, 0, &chunk1).await?;
    let size = stat_size(cx, &path).await?;
    ensure!(size == chunk, "size is {} after chunk 1, expected {}", size, chunk);

    write_at(cx, &path, size, &chunk2).await?;
    let size = stat_size(cx, &path).await?;
    ensure!(size == 2 * chunk, "size is {} after chunk 2", size);

    // Rewriting the last chunk leaves the size alone.
    write_at(cx, &path, size - chunk, &chunk2).await?;
    let size = stat_size(cx, &path).await?;
    ensure!(size == 2 * chunk, "size is {} after rewriting chunk 2", size);

    write_at(cx, &path, size, &full_contents[size as usize..]).await?;

    let received = cx.driver.get_content(&path).await.context("getting content")?;
    ensure_bytes_eq(&received, &full_contents, "appended contents")?;

    // Writing a chunk past the end extends the content with zeroes.
    full_contents.extend_from_slice(&zero_chunk);
    full_contents.extend_from_slice(&chunk4);

    write_at(cx, &path, full_contents.len() as i64 - chunk, &chunk4).await?;
    let size = stat_size(cx, &path).await?;
    ensure!(
        size == full_contents.len() as i64,
        "size is {} after writing past the end, expected {}",
        size,
        full_contents.len()
    );

    let received = cx.driver.get_content(&path).await.context("getting content")?;
    ensure!(
        received.len() == full_contents.len(),
        "got {} bytes, expected {}",
        received.len(),
        full_contents.len()
    );
    ensure_bytes_eq(
        &received[chunk_size * 3..chunk_size * 4],
        &zero_chunk,
        "zero filled gap",
    )?;
    ensure_bytes_eq(
        &received[chunk_size * 4..chunk_size * 5],
        &chunk4,
        "chunk past the gap",
    )?;
    ensure_bytes_eq(&received, &full_contents, "extended contents")?;

    let mut reader = &zero_chunk[..];
    let result = cx.driver.write_stream(&path, -1, &mut reader).await;
    match expect_error(result, ErrorKind::InvalidOffset, &name)? {
        storage_driver::Error::InvalidOffset {
            path: err_path,
            offset,
            ..
        } => {
            ensure!(offset == -1, "error reports offset {}, expected -1", offset);
            ensure!(err_path == path, "error reports path {:?}", err_path);
        }
        err => anyhow::bail!("unexpected error: {}", err),
    }

    Ok(Outcome::Passed)
}

async fn write_at(cx: &ScenarioContext, path: &str, offset: i64, contents: &[u8]) -> Result<()> {
    let mut reader = contents;
    let written = cx
        .driver
        .write_stream(path, offset, &mut reader)
        .await
        .with_context(|| format!("writing {} bytes at offset {}", contents.len(), offset))?;

    ensure!(
        written == contents.len() as i64,
        "wrote {} bytes at offset {}, expected {}",
        written,
        offset,
        contents.len()
    );

    Ok(())
}

async fn stat_size(cx: &ScenarioContext, path: &str) -> Result<i64> {
    let info = cx.driver.stat(path).await.context("stat")?;
    Ok(info.size)
}

pub(super) async fn read_nonexistent_stream(cx: &mut ScenarioContext) -> Result<Outcome> {
    let path = cx.generator.path(32);
    let name = cx.driver_name();

    for offset in [0, 64] {
        let result = cx.driver.read_stream(&path, offset).await;
        expect_error(result, ErrorKind::PathNotFound, &name)
            .with_context(|| format!("reading missing path at offset {}", offset))?;
    }

    Ok(Outcome::Passed)
}

/// A second, smaller put replaces the first one instead of writing over its start.
pub(super) async fn put_content_multiple_times(cx: &mut ScenarioContext) -> Result<Outcome> {
    let path = cx.random_path(32);

    let contents = cx.generator.contents(4096);
    cx.driver
        .put_content(&path, &contents)
        .await
        .context("putting first content")?;

    let contents = cx.generator.contents(2048);
    put_get(cx, &path, &contents).await?;

    Ok(Outcome::Passed)
}

/// Once stat reports the size of a write, reading it back must return the written bytes. Drivers
/// are allowed to be late in reporting the size.
pub(super) async fn eventual_consistency(cx: &mut ScenarioContext) -> Result<Outcome> {
    const CHUNK_SIZE: usize = 32;

    let path = cx.random_path(32);
    let iterations = cx.config.eventual_consistency_iterations;

    let mut offset = 0i64;
    let mut misswrites = 0;

    for _ in 0..iterations {
        let contents = cx.generator.contents(CHUNK_SIZE);

        let mut reader = &contents[..];
        let written = cx
            .driver
            .write_stream(&path, offset, &mut reader)
            .await
            .with_context(|| format!("writing at offset {}", offset))?;

        let info = cx.driver.stat(&path).await.context("stat")?;

        if info.size == offset + CHUNK_SIZE as i64 {
            let reader = cx
                .driver
                .read_stream(&path, offset)
                .await
                .with_context(|| format!("opening stream at offset {}", offset))?;
            let received = read_all(reader).await?;

            ensure_bytes_eq(
                &received,
                &contents,
                &format!("visible write at offset {}", offset),
            )?;

            offset += written;
        } else {
            misswrites += 1;
        }
    }

    if misswrites > 0 {
        tracing::info!(
            "there were {} occurrences of a write not being instantly available",
            misswrites
        );
    }

    ensure!(
        misswrites != iterations,
        "none of the {} writes became visible",
        iterations
    );

    Ok(Outcome::Passed)
}
