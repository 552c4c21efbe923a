//! Test assertions for end-to-end scenarios.

/// Asserts that a test outcome passed.
#[macro_export]
macro_rules! assert_passed {
    ($outcome:expr) => {
        match &$outcome {
            ::exam_reactor::TestOutcome::Passed => {}
            ::exam_reactor::TestOutcome::Failed(err) => {
                panic!("Expected test to pass but it failed: {err}")
            }
        }
    };
}

/// Asserts that a test outcome failed, optionally with a root cause
/// containing a substring.
#[macro_export]
macro_rules! assert_failed {
    ($outcome:expr) => {
        assert!(
            !$outcome.is_passed(),
            "Expected test to fail but it passed"
        )
    };
    ($outcome:expr, $cause:expr) => {
        match $outcome.cause() {
            Some(cause) => assert!(
                cause.to_string().contains($cause),
                "Expected cause to contain '{}', got '{}'",
                $cause,
                cause
            ),
            None => panic!("Expected test to fail with '{}' but it passed", $cause),
        }
    };
}

/// Asserts that every provisioned environment has been released.
#[macro_export]
macro_rules! assert_no_leaks {
    ($ledger:expr) => {
        assert_eq!(
            $ledger.leaked(),
            0,
            "Leaked environments: {:?}",
            $ledger.live()
        )
    };
}

/// Asserts that a result failed with an unknown target error.
#[macro_export]
macro_rules! assert_unknown_target {
    ($result:expr) => {
        match $result {
            Err(err) => assert!(
                err.is_unknown_target(),
                "Expected unknown target, got: {err}"
            ),
            Ok(_) => panic!("Expected unknown target but the call succeeded"),
        }
    };
}
