use anyhow::{Context, Result};

use storage_driver::{path::ROOT, ErrorKind};

use super::{expect_error, ScenarioContext};
use crate::{suite::Outcome, util::ensure_bytes_eq};

const VALID_FILES: &[&str] = &[
    "/a",
    "/2",
    "/aa",
    "/a.a",
    "/0-9/abcdefg",
    "/abcdefg/z.75",
    "/abc/1.2.3.4.5-6_zyx/123.z/4",
    "/docker/docker-registry",
    "/123.abc",
    "/abc./abc",
    "/.abc",
    "/a--b",
    "/a-.b",
    "/_.abc",
    "/Docker/docker-registry",
    "/Abc/Cba",
];

const INVALID_FILES: &[&str] = &["", "/", "abc", "123.abc", "//bcd", "/abc_123/"];

/// The root can always be listed.
pub(super) async fn root_exists(cx: &mut ScenarioContext) -> Result<Outcome> {
    cx.driver
        .list(ROOT)
        .await
        .context(r#"the root path "/" should always exist"#)?;

    Ok(Outcome::Passed)
}

pub(super) async fn valid_paths(cx: &mut ScenarioContext) -> Result<Outcome> {
    let contents = cx.generator.contents(64);

    for &path in VALID_FILES {
        cx.track(path);

        cx.driver
            .put_content(path, &contents)
            .await
            .with_context(|| format!("putting valid path {:?}", path))?;

        let received = cx
            .driver
            .get_content(path)
            .await
            .with_context(|| format!("getting valid path {:?}", path))?;

        ensure_bytes_eq(&received, &contents, path)?;
    }

    Ok(Outcome::Passed)
}

pub(super) async fn invalid_paths(cx: &mut ScenarioContext) -> Result<Outcome> {
    let contents = cx.generator.contents(64);
    let name = cx.driver_name();

    for &path in INVALID_FILES {
        let result = cx.driver.put_content(path, &contents).await;
        expect_error(result, ErrorKind::InvalidPath, &name)
            .with_context(|| format!("putting invalid path {:?}", path))?;

        let result = cx.driver.get_content(path).await;
        expect_error(result, ErrorKind::InvalidPath, &name)
            .with_context(|| format!("getting invalid path {:?}", path))?;

        let result = cx.driver.stat(path).await;
        expect_error(result, ErrorKind::InvalidPath, &name)
            .with_context(|| format!("stating invalid path {:?}", path))?;
    }

    Ok(Outcome::Passed)
}
