//! # Driver Tests
//!
//! Runs the full driver (watch loops, relist, scheduler) over the in-process
//! stores and checks that records converge without manual attempts.

mod common;

use common::{key, robot, test_config, Env};
use harbor_provider::crd::{Managed, CONDITION_READY, REASON_AVAILABLE};
use harbor_provider::runtime::{Driver, DriverSettings};
use harbor_provider::store::{RecordStore, SecretStore};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

async fn eventually(what: &str, mut check: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    while !check() {
        assert!(tokio::time::Instant::now() < deadline, "timed out waiting for {what}");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

fn ready(env: &Env, name: &str) -> bool {
    env.robots
        .snapshot(&key(name))
        .and_then(|r| r.managed_status()?.condition(CONDITION_READY).cloned())
        .is_some_and(|c| c.reason() == Some(REASON_AVAILABLE))
}

#[tokio::test]
async fn test_driver_converges_listed_and_watched_records() {
    common::init_rustls();
    let env = Env::new().await;
    env.robots.create(&robot("listed")).await.unwrap();

    let readiness = Arc::new(AtomicBool::new(false));
    let driver = Driver::new(
        env.registry.clone(),
        DriverSettings::from_config(&test_config()),
    )
    .with_readiness(Arc::clone(&readiness));
    let shutdown = driver.shutdown_token();
    let handle = tokio::spawn(driver.run());

    eventually("listed robot", || ready(&env, "listed")).await;
    assert!(readiness.load(Ordering::Relaxed));

    env.robots.create(&robot("watched")).await.unwrap();
    eventually("watched robot", || ready(&env, "watched")).await;
    assert_eq!(env.harbor.robot_count(), 2);
    assert_eq!(env.harbor.count("create_robot"), 2);

    // Deletion is picked up from the watch as well
    env.robots.delete(&key("watched")).await.unwrap();
    eventually("finalized robot", || !env.robots.contains(&key("watched"))).await;
    assert_eq!(env.harbor.robot_count(), 1);

    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(10), handle)
        .await
        .unwrap()
        .unwrap();
    assert!(!readiness.load(Ordering::Relaxed));
}

#[tokio::test]
async fn test_driver_retries_after_credentials_appear() {
    let env = Env::bare();
    env.robots.create(&robot("ci")).await.unwrap();

    let settings = DriverSettings::from_config(&harbor_provider::config::ControllerConfig {
        backoff_start_ms: 50,
        backoff_max_ms: 200,
        ..test_config()
    });
    let driver = Driver::new(env.registry.clone(), settings);
    let shutdown = driver.shutdown_token();
    let handle = tokio::spawn(driver.run());

    eventually("first failed attempt", || {
        env.robots
            .snapshot(&key("ci"))
            .and_then(|r| r.managed_status().cloned())
            .is_some()
    })
    .await;
    assert_eq!(env.harbor.robot_count(), 0);

    env.add_provider_config("default").await;
    eventually("robot after credentials", || ready(&env, "ci")).await;
    assert_eq!(env.harbor.robot_count(), 1);
    assert!(env
        .secrets
        .get(common::NAMESPACE, "ci-creds")
        .await
        .unwrap()
        .is_some());

    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(10), handle)
        .await
        .unwrap()
        .unwrap();
}
