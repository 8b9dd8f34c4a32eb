use anyhow::{anyhow, Context, Result};
use std::{io::SeekFrom, sync::Arc};
use tokio::{
    io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt},
    task::JoinSet,
};

use storage_driver::Driver;

use super::ScenarioContext;
use crate::{
    suite::Outcome,
    util::{ensure_bytes_eq, read_all, Generator},
};

/// Reads random ranges of one file from many tasks at once.
pub(super) async fn concurrent_stream_reads(cx: &mut ScenarioContext) -> Result<Outcome> {
    let size = cx.config.concurrent_read_size();
    let readers = cx.config.concurrent_readers;
    let path = cx.random_path(32);
    let contents = Arc::new(cx.generator.contents(size as usize));

    cx.driver
        .put_content(&path, &contents)
        .await
        .context("putting content")?;

    let mut tasks = JoinSet::new();
    for reader in 0..readers {
        let offset = cx.generator.below(size.max(1));
        let driver = cx.driver.clone();
        let path = path.clone();
        let contents = contents.clone();

        tasks.spawn(async move {
            read_range(driver, &path, offset, &contents)
                .await
                .with_context(|| format!("reader {} at offset {}", reader, offset))
        });
    }

    join_all(tasks).await?;

    Ok(Outcome::Passed)
}

async fn read_range(driver: Driver, path: &str, offset: u64, contents: &[u8]) -> Result<()> {
    let reader = driver
        .read_stream(path, offset as i64)
        .await
        .context("opening stream")?;

    let mut received = Vec::new();
    reader
        .take(contents.len() as u64 - offset)
        .read_to_end(&mut received)
        .await
        .context("reading stream")?;

    ensure_bytes_eq(&received, &contents[offset as usize..], "read range")
}

/// Streams temporary files into the driver from many tasks at once.
pub(super) async fn concurrent_file_streams(cx: &mut ScenarioContext) -> Result<Outcome> {
    let writers = cx.config.concurrent_writers();
    let size = cx.config.concurrent_write_size();

    let mut tasks = JoinSet::new();
    for writer in 0..writers {
        let path = cx.random_path(32);
        let generator = cx.generator.fork();
        let driver = cx.driver.clone();

        tasks.spawn(async move {
            stream_file(driver, generator, &path, size)
                .await
                .with_context(|| format!("writer {} to {}", writer, path))
        });
    }

    join_all(tasks).await?;

    Ok(Outcome::Passed)
}

async fn stream_file(driver: Driver, mut generator: Generator, path: &str, size: u64) -> Result<()> {
    let contents = generator.contents(size as usize);

    let file = tempfile::tempfile().context("creating temporary file")?;
    let mut file = tokio::fs::File::from_std(file);
    file.write_all(&contents)
        .await
        .context("filling temporary file")?;
    file.sync_all().await.context("syncing temporary file")?;
    file.seek(SeekFrom::Start(0))
        .await
        .context("rewinding temporary file")?;

    let written = driver
        .write_stream(path, 0, &mut file)
        .await
        .context("writing stream")?;
    anyhow::ensure!(
        written == size as i64,
        "wrote {} bytes, expected {}",
        written,
        size
    );

    let reader = driver.read_stream(path, 0).await.context("opening stream")?;
    let received = read_all(reader).await.context("reading stream")?;

    ensure_bytes_eq(&received, &contents, "streamed file")
}

/// Waits for every task, reporting the first failure.
async fn join_all(mut tasks: JoinSet<Result<()>>) -> Result<()> {
    let mut first_error = None;

    while let Some(joined) = tasks.join_next().await {
        let result = joined.map_err(|err| anyhow!("task panicked or was cancelled: {}", err));
        if let Err(err) = result.and_then(|result| result) {
            tracing::debug!("concurrent task failed: {:#}", err);
            first_error.get_or_insert(err);
        }
    }

    match first_error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
