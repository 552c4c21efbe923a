//! Reactor lifecycle scenarios through the host-runner driver.

use exam_e2e::{
    ScriptedProvisioner, TestConfig, TestFixtures, TestHarness, assert_failed, assert_no_leaks,
    assert_passed, assert_unknown_target,
};
use exam_reactor::{ReactorPhase, ReactorStrategy, TestProbeBuilder};

// ============================================================================
// Addressing Across Environments
// ============================================================================

#[tokio::test]
async fn test_two_environments_one_method() {
    let harness = TestHarness::new(
        TestConfig::default()
            .with_strategy(ReactorStrategy::PerSuite)
            .with_environments(&["e1", "e2"]),
        ScriptedProvisioner::new().failing("e1", "bar"),
    )
    .unwrap();
    let mut driver = harness.driver();

    driver.on_start(vec![TestFixtures::foo()]).await.unwrap();
    assert_eq!(harness.manager().num_configurations(), 2);

    let staged = driver.staged().unwrap().clone();
    assert_eq!(staged.targets().len(), 2);
    for target in staged.targets() {
        assert_eq!(target.root().identifier(), "Foo#bar");
    }

    let names: Vec<_> = driver
        .intercept()
        .unwrap()
        .iter()
        .map(|m| m.qualified_name())
        .collect();
    assert_eq!(names, vec!["Foo#bar:e1", "Foo#bar:e2"]);

    let failed = driver.run("Foo#bar:e1").await;
    assert_failed!(failed, "bar failed in e1");
    assert!(failed.error().unwrap().is_test_failure());
    assert_passed!(driver.run("Foo#bar:e2").await);

    driver.on_finish().await.unwrap();
    assert_no_leaks!(harness.ledger());
}

#[tokio::test]
async fn test_single_environment_is_not_mangled() {
    let harness = TestHarness::with_defaults().unwrap();
    let mut driver = harness.driver();

    driver.on_start(vec![TestFixtures::calculator()]).await.unwrap();
    let names: Vec<_> = driver
        .intercept()
        .unwrap()
        .iter()
        .map(|m| m.qualified_name())
        .collect();
    assert_eq!(
        names,
        vec![
            "com.acme.CalculatorTest#adds",
            "com.acme.CalculatorTest#divides",
            "com.acme.CalculatorTest#overflows",
        ]
    );
    assert_eq!(harness.ledger().probe_size("native"), Some(3));

    driver.on_finish().await.unwrap();
}

// ============================================================================
// Strategies
// ============================================================================

#[tokio::test]
async fn test_per_class_rebuilds_per_class() {
    let harness = TestHarness::new(
        TestConfig::default().with_environments(&["a", "b"]),
        ScriptedProvisioner::new(),
    )
    .unwrap();
    let mut driver = harness.driver();
    let suite = TestFixtures::suite();

    driver.on_start(suite.clone()).await.unwrap();
    for class in &suite {
        driver.on_before_class(class).await.unwrap();
        let methods = driver.intercept().unwrap();
        assert_eq!(methods.len(), class.methods.len() * 2);
        for method in methods {
            assert!(method.qualified_name().starts_with(&class.name));
            assert_passed!(driver.run(&method.qualified_name()).await);
        }
        driver.on_after_class(class).await.unwrap();
        assert_eq!(harness.manager().phase().await, ReactorPhase::Idle);
        assert_no_leaks!(harness.ledger());
    }

    // The reactor staged at suite start serves the first class, the second is rebuilt.
    assert_eq!(harness.ledger().provisioned(), 4);
    driver.on_finish().await.unwrap();
    assert!(harness.manager().directory().is_empty());
}

#[tokio::test]
async fn test_per_suite_stages_once() {
    let harness = TestHarness::new(
        TestConfig::default()
            .with_strategy(ReactorStrategy::PerSuite)
            .with_environments(&["a", "b"]),
        ScriptedProvisioner::new(),
    )
    .unwrap();
    let mut driver = harness.driver();
    let suite = TestFixtures::suite();

    driver.on_start(suite.clone()).await.unwrap();
    for class in &suite {
        driver.on_before_class(class).await.unwrap();
        driver.on_after_class(class).await.unwrap();
        assert_eq!(harness.manager().phase().await, ReactorPhase::Staged);
    }
    let methods = driver.intercept().unwrap();
    assert_eq!(methods.len(), 8);

    assert_eq!(harness.ledger().provisioned(), 2);
    driver.on_finish().await.unwrap();
    assert_eq!(harness.ledger().released(), 2);
    assert_eq!(harness.manager().phase().await, ReactorPhase::Idle);
}

#[tokio::test]
async fn test_per_method_provisions_per_run() {
    let harness = TestHarness::new(
        TestConfig::default()
            .with_strategy(ReactorStrategy::PerMethod)
            .with_environments(&["a", "b"]),
        ScriptedProvisioner::new(),
    )
    .unwrap();
    let mut driver = harness.driver();
    let foo = TestFixtures::foo();

    driver.on_start(vec![foo.clone()]).await.unwrap();
    assert_eq!(harness.ledger().provisioned(), 0);

    driver.on_before_class(&foo).await.unwrap();
    for method in driver.intercept().unwrap() {
        assert_passed!(driver.run(&method.qualified_name()).await);
        assert_no_leaks!(harness.ledger());
    }
    assert_eq!(harness.ledger().provisioned(), 2);
    assert_eq!(harness.ledger().released(), 2);

    driver.on_after_class(&foo).await.unwrap();
    driver.on_finish().await.unwrap();
}

#[tokio::test]
async fn test_class_environments_take_precedence() {
    let harness = TestHarness::with_defaults().unwrap();
    let mut driver = harness.driver();
    let class = TestFixtures::with_environments("Karaf", &["boots"], &["karaf-4", "karaf-5"]);

    driver.on_start(vec![class]).await.unwrap();
    assert_eq!(harness.manager().num_configurations(), 2);
    assert_eq!(harness.ledger().attempts(), vec!["karaf-4", "karaf-5"]);

    let methods = driver.intercept().unwrap();
    assert_eq!(methods[0].qualified_name(), "Karaf#boots:karaf-4");
    driver.on_finish().await.unwrap();
}

// ============================================================================
// Teardown And Unknown Targets
// ============================================================================

#[tokio::test]
async fn test_double_teardown_is_harmless() {
    let harness = TestHarness::with_defaults().unwrap();
    let mut driver = harness.driver();
    driver.on_start(vec![TestFixtures::foo()]).await.unwrap();

    let staged = driver.staged().unwrap().clone();
    staged.tear_down().await.unwrap();
    staged.tear_down().await.unwrap();
    assert_eq!(harness.ledger().released(), 1);

    driver.on_finish().await.unwrap();
    assert_eq!(harness.ledger().released(), 1);
    assert_no_leaks!(harness.ledger());
}

#[tokio::test]
async fn test_foreign_address_never_reaches_environment() {
    let harness = TestHarness::with_defaults().unwrap();
    let mut driver = harness.driver();
    driver.on_start(vec![TestFixtures::foo()]).await.unwrap();
    let staged = driver.staged().unwrap().clone();

    let mut builder = TestProbeBuilder::default();
    let foreign = builder.add_test(&TestFixtures::calculator(), "adds").unwrap();

    assert_unknown_target!(staged.invoke(&foreign).await);
    assert!(harness.ledger().invocations().is_empty());

    driver.on_finish().await.unwrap();
}

#[tokio::test]
async fn test_independent_managers_do_not_share_state() {
    let first = TestHarness::with_defaults().unwrap();
    let second = TestHarness::with_defaults().unwrap();

    let mut driver = first.driver();
    driver.on_start(vec![TestFixtures::foo()]).await.unwrap();

    assert_eq!(second.manager().phase().await, ReactorPhase::Idle);
    assert!(second.manager().directory().is_empty());
    driver.on_finish().await.unwrap();
}
