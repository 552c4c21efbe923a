//! Failure scenarios: provisioning, invocation transport, teardown.

use exam_e2e::{ScriptedProvisioner, TestConfig, TestFixtures, TestHarness, assert_no_leaks};
use exam_reactor::{ReactorError, ReactorPhase, ReactorStrategy};

fn three_environments() -> TestConfig {
    TestConfig::default()
        .with_strategy(ReactorStrategy::PerSuite)
        .with_environments(&["e1", "e2", "e3"])
}

// ============================================================================
// Provisioning
// ============================================================================

#[tokio::test]
async fn test_second_of_three_fails_without_leaks() {
    let harness =
        TestHarness::new(three_environments(), ScriptedProvisioner::new().refusing_nth(2)).unwrap();
    let mut driver = harness.driver();

    let err = driver.on_start(vec![TestFixtures::foo()]).await.unwrap_err();
    let ReactorError::Staging(failure) = &err else {
        panic!("expected staging error, got {err}");
    };
    assert_eq!(failure.failed_environments(), vec!["e2"]);
    assert_eq!(failure.released, vec!["e1".to_string()]);
    assert_eq!(failure.skipped, vec!["e3".to_string()]);
    assert!(err.to_string().contains("e2 did not start"));

    assert_eq!(harness.ledger().attempts(), vec!["e1", "e2"]);
    assert_no_leaks!(harness.ledger());
    assert!(harness.manager().directory().is_empty());
    assert_eq!(harness.manager().phase().await, ReactorPhase::Idle);
    assert!(driver.staged().is_none());
}

#[tokio::test]
async fn test_manager_recovers_after_failed_staging() {
    let harness = TestHarness::new(
        three_environments().with_strategy(ReactorStrategy::PerClass),
        ScriptedProvisioner::new().refusing_nth(1),
    )
    .unwrap();
    let mut driver = harness.driver();
    let foo = TestFixtures::foo();

    assert!(driver.on_start(vec![foo.clone()]).await.unwrap_err().is_staging());

    // Only the first attempt is refused.
    driver.on_before_class(&foo).await.unwrap();
    assert_eq!(driver.intercept().unwrap().len(), 3);
    driver.on_after_class(&foo).await.unwrap();
    driver.on_finish().await.unwrap();
    assert_no_leaks!(harness.ledger());
}

#[tokio::test]
async fn test_per_method_provision_failure_is_staging_error() {
    let harness = TestHarness::new(
        TestConfig::default()
            .with_strategy(ReactorStrategy::PerMethod)
            .with_environments(&["good", "bad"]),
        ScriptedProvisioner::new().refusing("bad"),
    )
    .unwrap();
    let mut driver = harness.driver();
    driver.on_start(vec![TestFixtures::foo()]).await.unwrap();
    driver.intercept().unwrap();

    assert!(driver.run("Foo#bar:good").await.is_passed());
    let outcome = driver.run("Foo#bar:bad").await;
    assert!(outcome.error().unwrap().is_staging());

    driver.on_finish().await.unwrap();
    assert_no_leaks!(harness.ledger());
}

// ============================================================================
// Invocation
// ============================================================================

#[tokio::test]
async fn test_unreachable_environment_is_not_a_test_failure() {
    let harness = TestHarness::new(
        three_environments(),
        ScriptedProvisioner::new().unreachable("e3"),
    )
    .unwrap();
    let mut driver = harness.driver();
    driver.on_start(vec![TestFixtures::foo()]).await.unwrap();
    driver.intercept().unwrap();

    let outcome = driver.run("Foo#bar:e3").await;
    let err = outcome.error().unwrap();
    assert!(err.is_remote_invocation());
    assert!(!err.is_test_failure());
    assert_eq!(outcome.cause().unwrap().to_string(), "e3 is unreachable");

    assert!(driver.run("Foo#bar:e1").await.is_passed());
    driver.on_finish().await.unwrap();
}

// ============================================================================
// Teardown
// ============================================================================

#[tokio::test]
async fn test_teardown_failure_still_releases_the_rest() {
    let harness = TestHarness::new(
        three_environments(),
        ScriptedProvisioner::new().failing_release("e2"),
    )
    .unwrap();
    let mut driver = harness.driver();
    driver.on_start(vec![TestFixtures::foo()]).await.unwrap();

    let err = driver.on_finish().await.unwrap_err();
    assert!(err.is_teardown());
    assert!(err.to_string().contains("e2 refused to stop"));

    assert_eq!(harness.ledger().released(), 2);
    assert_eq!(harness.ledger().live(), vec!["e2".to_string()]);
    assert_eq!(harness.manager().phase().await, ReactorPhase::Idle);
    assert!(harness.manager().directory().is_empty());
}
