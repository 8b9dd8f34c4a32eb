use storage_testsuites::{util::Generator, Benchmark, BenchmarkKind};

#[tokio::test]
async fn benchmarks_clean_up_after_themselves() -> anyhow::Result<()> {
    storage_testsuites::init_tracing();

    let driver = inmemory_driver::new();

    for &kind in BenchmarkKind::ALL {
        if kind.bytes_per_iteration() > 1 << 20 {
            continue;
        }

        let report = Benchmark::new(driver.clone(), kind)
            .with_generator(Generator::new(42))
            .run(3)
            .await?;

        assert_eq!(report.kind, kind);
        assert_eq!(report.iterations, 3);
        assert_eq!(report.bytes, 3 * kind.bytes_per_iteration());
        assert!(driver.list("/").await?.is_empty(), "{} left files behind", kind);
    }

    Ok(())
}
