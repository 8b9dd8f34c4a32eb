use anyhow::{ensure, Context, Result};
use std::collections::BTreeSet;

use storage_driver::{path, ErrorKind, UrlOptions};

use super::{expect_error, ScenarioContext};
use crate::{suite::Outcome, util::ensure_bytes_eq};

/// Lists a two level tree and checks that only direct children come back.
pub(super) async fn list(cx: &mut ScenarioContext) -> Result<Outcome> {
    let len = 8 + cx.generator.below(8) as usize;
    let root_directory = format!("/{}", cx.generator.filename(len));
    cx.track(&root_directory);

    let len = 8 + cx.generator.below(8) as usize;
    let parent_directory = path::join(&root_directory, &cx.generator.filename(len));

    let mut child_files = BTreeSet::new();
    while child_files.len() < 50 {
        let len = 8 + cx.generator.below(8) as usize;
        child_files.insert(path::join(&parent_directory, &cx.generator.filename(len)));
    }

    for child_file in &child_files {
        let contents = cx.generator.contents(32);
        cx.driver
            .put_content(child_file, &contents)
            .await
            .with_context(|| format!("putting {}", child_file))?;
    }

    let keys = cx.driver.list(path::ROOT).await.context("listing root")?;
    ensure!(
        keys == [root_directory.clone()],
        "root lists {:?}, expected [{:?}]",
        keys,
        root_directory
    );

    let keys = cx
        .driver
        .list(&root_directory)
        .await
        .context("listing root directory")?;
    ensure!(
        keys == [parent_directory.clone()],
        "{} lists {:?}, expected [{:?}]",
        root_directory,
        keys,
        parent_directory
    );

    let mut keys = cx
        .driver
        .list(&parent_directory)
        .await
        .context("listing parent directory")?;
    keys.sort();

    let child_files = child_files.into_iter().collect::<Vec<_>>();
    ensure!(
        keys == child_files,
        "{} lists {} entries, expected the {} child files",
        parent_directory,
        keys.len(),
        child_files.len()
    );

    Ok(Outcome::Passed)
}

/// A moved file exists at the destination only.
pub(super) async fn move_path(cx: &mut ScenarioContext) -> Result<Outcome> {
    let contents = cx.generator.contents(32);
    let source_path = cx.random_path(32);
    let dest_path = cx.random_path(32);

    cx.driver
        .put_content(&source_path, &contents)
        .await
        .context("putting source")?;

    cx.driver
        .move_path(&source_path, &dest_path)
        .await
        .context("moving")?;

    check_moved(cx, &source_path, &dest_path, &contents).await?;

    Ok(Outcome::Passed)
}

/// Moving onto an existing file replaces it.
pub(super) async fn move_overwrite(cx: &mut ScenarioContext) -> Result<Outcome> {
    let source_path = cx.random_path(32);
    let dest_path = cx.random_path(32);
    let source_contents = cx.generator.contents(32);
    let dest_contents = cx.generator.contents(64);

    cx.driver
        .put_content(&source_path, &source_contents)
        .await
        .context("putting source")?;
    cx.driver
        .put_content(&dest_path, &dest_contents)
        .await
        .context("putting destination")?;

    cx.driver
        .move_path(&source_path, &dest_path)
        .await
        .context("moving")?;

    check_moved(cx, &source_path, &dest_path, &source_contents).await?;

    Ok(Outcome::Passed)
}

async fn check_moved(
    cx: &ScenarioContext,
    source_path: &str,
    dest_path: &str,
    contents: &[u8],
) -> Result<()> {
    let received = cx
        .driver
        .get_content(dest_path)
        .await
        .context("getting destination")?;
    ensure_bytes_eq(&received, contents, "moved contents")?;

    let result = cx.driver.get_content(source_path).await;
    expect_error(result, ErrorKind::PathNotFound, cx.driver.name())
        .context("getting source after move")?;

    Ok(())
}

/// Moving a missing file fails and leaves the destination alone.
pub(super) async fn move_nonexistent(cx: &mut ScenarioContext) -> Result<Outcome> {
    let contents = cx.generator.contents(32);
    let source_path = cx.generator.path(32);
    let dest_path = cx.random_path(32);
    let name = cx.driver_name();

    cx.driver
        .put_content(&dest_path, &contents)
        .await
        .context("putting destination")?;

    let result = cx.driver.move_path(&source_path, &dest_path).await;
    expect_error(result, ErrorKind::PathNotFound, &name)?;

    let received = cx
        .driver
        .get_content(&dest_path)
        .await
        .context("getting destination")?;
    ensure_bytes_eq(&received, &contents, "destination after failed move")?;

    Ok(Outcome::Passed)
}

/// Moving below a plain file, as if it were a directory, fails.
pub(super) async fn move_invalid(cx: &mut ScenarioContext) -> Result<Outcome> {
    let contents = cx.generator.contents(32);

    cx.track("/notadir");
    cx.driver
        .put_content("/notadir", &contents)
        .await
        .context("putting /notadir")?;

    let result = cx.driver.move_path("/notadir/foo", "/notadir/bar").await;
    ensure!(result.is_err(), "moving below a file succeeded");

    Ok(Outcome::Passed)
}

pub(super) async fn delete(cx: &mut ScenarioContext) -> Result<Outcome> {
    let path = cx.random_path(32);
    let contents = cx.generator.contents(32);
    let name = cx.driver_name();

    cx.driver
        .put_content(&path, &contents)
        .await
        .context("putting content")?;

    cx.driver.delete(&path).await.context("deleting")?;

    let result = cx.driver.get_content(&path).await;
    expect_error(result, ErrorKind::PathNotFound, &name)?;

    Ok(Outcome::Passed)
}

/// Fetches content through a direct access URL, for drivers that can hand them out.
pub(super) async fn url_for(cx: &mut ScenarioContext) -> Result<Outcome> {
    let path = cx.random_path(32);
    let contents = cx.generator.contents(32);

    cx.driver
        .put_content(&path, &contents)
        .await
        .context("putting content")?;

    let driver = cx.driver.clone();
    let provider = match driver.url_provider() {
        Some(provider) => provider,
        None => return Ok(Outcome::NotApplicable("driver does not provide URLs".to_owned())),
    };

    let url = match provider.url_for(&path, &UrlOptions::default()).await {
        Err(err) if err.is_unsupported_method() => {
            return Ok(Outcome::NotApplicable(err.to_string()))
        }
        result => result.context("getting url")?,
    };

    let received = reqwest::get(&url)
        .await
        .and_then(|response| response.error_for_status())
        .with_context(|| format!("fetching {}", url))?
        .bytes()
        .await
        .context("reading response")?;
    ensure_bytes_eq(&received, &contents, "fetched contents")?;

    let options = UrlOptions::with_method(reqwest::Method::HEAD);
    let url = match provider.url_for(&path, &options).await {
        Err(err) if err.is_unsupported_method() => {
            return Ok(Outcome::NotApplicable(err.to_string()))
        }
        result => result.context("getting HEAD url")?,
    };

    let response = reqwest::Client::new()
        .head(&url)
        .send()
        .await
        .with_context(|| format!("HEAD {}", url))?;
    ensure!(
        response.status() == reqwest::StatusCode::OK,
        "HEAD {} returned {}",
        url,
        response.status()
    );

    let content_length = response
        .headers()
        .get(reqwest::header::CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<u64>().ok());
    ensure!(
        content_length == Some(contents.len() as u64),
        "HEAD {} reports content length {:?}, expected {}",
        url,
        content_length,
        contents.len()
    );

    Ok(Outcome::Passed)
}

pub(super) async fn delete_nonexistent(cx: &mut ScenarioContext) -> Result<Outcome> {
    let path = cx.generator.path(32);
    let name = cx.driver_name();

    let result = cx.driver.delete(&path).await;
    expect_error(result, ErrorKind::PathNotFound, &name)?;

    Ok(Outcome::Passed)
}

/// Deleting a file removes only that file, deleting a directory removes everything below it.
pub(super) async fn delete_folder(cx: &mut ScenarioContext) -> Result<Outcome> {
    let dirname = cx.random_path(32);
    let filenames = [
        path::join(&dirname, &cx.generator.path(32)),
        path::join(&dirname, &cx.generator.path(32)),
        path::join(&dirname, &cx.generator.path(32)),
    ];
    let contents = cx.generator.contents(32);
    let name = cx.driver_name();

    for filename in &filenames {
        cx.driver
            .put_content(filename, &contents)
            .await
            .with_context(|| format!("putting {}", filename))?;
    }

    cx.driver
        .delete(&filenames[0])
        .await
        .context("deleting first file")?;

    let result = cx.driver.get_content(&filenames[0]).await;
    expect_error(result, ErrorKind::PathNotFound, &name).context("deleted file")?;

    for filename in &filenames[1..] {
        cx.driver
            .get_content(filename)
            .await
            .with_context(|| format!("{} should survive deleting its sibling", filename))?;
    }

    cx.driver
        .delete(&dirname)
        .await
        .context("deleting directory")?;

    for filename in &filenames {
        let result = cx.driver.get_content(filename).await;
        expect_error(result, ErrorKind::PathNotFound, &name)
            .with_context(|| format!("{} after deleting its directory", filename))?;
    }

    Ok(Outcome::Passed)
}

pub(super) async fn stat_call(cx: &mut ScenarioContext) -> Result<Outcome> {
    let mut content = cx.generator.contents(4096);
    let dir_path = cx.random_path(32);
    let file_path = path::join(&dir_path, &cx.generator.filename(32));
    let name = cx.driver_name();

    let result = cx.driver.stat(&dir_path).await;
    expect_error(result, ErrorKind::PathNotFound, &name).context("stat of missing directory")?;

    let result = cx.driver.stat(&file_path).await;
    expect_error(result, ErrorKind::PathNotFound, &name).context("stat of missing file")?;

    cx.driver
        .put_content(&file_path, &content)
        .await
        .context("putting content")?;

    let info = cx.driver.stat(&file_path).await.context("stat of file")?;
    ensure!(info.path == file_path, "stat reports path {:?}", info.path);
    ensure!(
        info.size == content.len() as i64,
        "stat reports size {}, expected {}",
        info.size,
        content.len()
    );
    ensure!(!info.is_dir, "stat reports a file as a directory");
    let created_time = info
        .mod_time
        .context("stat reports no modification time for a file")?;

    // Give backends with drifting clocks a chance to agree on the time.
    tokio::time::sleep(cx.config.stat_modtime_delay()).await;

    content = cx.generator.contents(4096);
    cx.driver
        .put_content(&file_path, &content)
        .await
        .context("overwriting content")?;

    let info = cx.driver.stat(&file_path).await.context("stat of file")?;
    tokio::time::sleep(cx.config.propagation_delay()).await;

    let mod_time = info
        .mod_time
        .context("stat reports no modification time for a file")?;
    ensure!(
        mod_time > created_time,
        "modification time ({}) is not after the creation time ({})",
        mod_time,
        created_time
    );

    // Directories don't need to support modification times.
    let info = cx.driver.stat(&dir_path).await.context("stat of directory")?;
    ensure!(info.path == dir_path, "stat reports path {:?}", info.path);
    ensure!(info.size == 0, "stat reports size {} for a directory", info.size);
    ensure!(info.is_dir, "stat reports a directory as a file");

    Ok(Outcome::Passed)
}
