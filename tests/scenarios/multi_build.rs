//! Test: Several builds sharing one output root

use crate::helpers::*;
use assetline::execution::{BuildDriver, SchedulingStrategy};
use std::sync::Arc;
use std::time::Duration;

/// The root is cleared once, before any build writes into it
#[tokio::test]
async fn test_root_cleared_once_per_batch() {
    let dir = fixture(&[("build/old/index.html", "old")]);
    let root = build_root(dir.path());
    let builder = Arc::new(
        MarkerBuilder::new(&root).with_delay("slow", Duration::from_millis(50)),
    );
    let driver = BuildDriver::new(builder.clone(), &root);

    let states = driver.run(vec![named("fast"), named("slow")]).await.unwrap();

    assert_eq!(states.len(), 2);
    assert_eq!(builder.finished(), vec!["fast", "slow"]);
    assert_eq!(
        files_under(&root),
        vec!["fast/marker.txt", "slow/marker.txt"]
    );
}

/// A failing build does not cancel the builds running next to it
#[tokio::test]
async fn test_failure_does_not_cancel_siblings() {
    let dir = fixture(&[]);
    let root = build_root(dir.path());
    let builder = Arc::new(
        MarkerBuilder::new(&root)
            .failing("broken")
            .with_delay("survivor", Duration::from_millis(50)),
    );
    let driver = BuildDriver::new(builder.clone(), &root);

    let err = driver
        .run(vec![named("broken"), named("survivor")])
        .await
        .unwrap_err();

    assert!(err.to_string().contains("broken broke"));
    assert_eq!(builder.finished(), vec!["survivor"]);
    assert_eq!(files_under(&root), vec!["survivor/marker.txt"]);
}

/// Sequential batches keep going after a failure and report it at the end
#[tokio::test]
async fn test_sequential_batch_reports_first_failure() {
    let dir = fixture(&[]);
    let root = build_root(dir.path());
    let builder = Arc::new(MarkerBuilder::new(&root).failing("b").failing("c"));
    let driver =
        BuildDriver::new(builder.clone(), &root).with_strategy(SchedulingStrategy::Sequential);

    let err = driver
        .run(vec![named("a"), named("b"), named("c"), named("d")])
        .await
        .unwrap_err();

    assert!(err.to_string().contains("b broke"));
    assert_eq!(builder.finished(), vec!["a", "d"]);
}
