//! A small test harness that drives a [`TestEventListener`].
//!
//! Every rank registers the same cases and runs them in the same order, so
//! the start/end hooks line up across the group while individual
//! assertions are free to pass on some ranks and fail on others.

use std::fmt::Debug;
use std::panic::{self, AssertUnwindSafe, Location};
use std::time::Instant;

use crate::errors::Result;
use crate::listener::TestEventListener;
use crate::models::{OutcomeKind, OutcomeRecord, TestId};

/// Returned by a fatal assertion; propagate it with `?` to stop the test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fatal;

pub type TestResult = std::result::Result<(), Fatal>;

type TestBody = Box<dyn Fn(&mut TestContext<'_>) -> TestResult + Send + Sync>;

pub struct TestContext<'l> {
    rank: usize,
    size: usize,
    failed: bool,
    listener: &'l mut dyn TestEventListener,
}

impl TestContext<'_> {
    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn size(&self) -> usize {
        self.size
    }

    fn report(&mut self, kind: OutcomeKind, location: &Location<'_>, message: String) {
        self.failed |= kind.is_failure();
        self.listener.on_assertion_result(OutcomeRecord::new(
            kind,
            location.file(),
            location.line(),
            message,
        ));
    }

    /// Records an explicit success.
    #[track_caller]
    pub fn succeed(&mut self, message: &str) {
        self.report(OutcomeKind::Success, Location::caller(), message.to_owned());
    }

    /// Records a non-fatal failure; the test keeps running.
    #[track_caller]
    pub fn fail(&mut self, message: &str) {
        self.report(OutcomeKind::NonFatalFailure, Location::caller(), message.to_owned());
    }

    #[track_caller]
    pub fn expect_true(&mut self, condition: bool, message: &str) -> bool {
        if !condition {
            self.fail(message);
        }
        condition
    }

    #[track_caller]
    pub fn expect_eq<T: PartialEq + Debug>(&mut self, actual: T, expected: T) -> bool {
        let equal = actual == expected;
        if !equal {
            self.report(
                OutcomeKind::NonFatalFailure,
                Location::caller(),
                inequality(&actual, &expected),
            );
        }
        equal
    }

    /// Like [`expect_eq`](Self::expect_eq), but a mismatch ends the test.
    #[track_caller]
    pub fn assert_eq<T: PartialEq + Debug>(&mut self, actual: T, expected: T) -> TestResult {
        if actual == expected {
            return Ok(());
        }
        self.report(
            OutcomeKind::FatalFailure,
            Location::caller(),
            inequality(&actual, &expected),
        );
        Err(Fatal)
    }
}

fn inequality<T: Debug>(actual: &T, expected: &T) -> String {
    format!("Expected equality of these values:\n  actual: {actual:?}\n  expected: {expected:?}")
}

pub struct TestCase {
    id: TestId,
    body: TestBody,
}

impl TestCase {
    pub fn id(&self) -> &TestId {
        &self.id
    }
}

#[derive(Default)]
pub struct Harness {
    cases: Vec<TestCase>,
    filter: Option<String>,
}

impl Harness {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<F>(&mut self, suite: &str, name: &str, body: F) -> &mut Self
    where
        F: Fn(&mut TestContext<'_>) -> TestResult + Send + Sync + 'static,
    {
        self.cases.push(TestCase {
            id: TestId::new(suite, name),
            body: Box::new(body),
        });
        self
    }

    /// Runs only tests whose `Suite.Name` contains `filter`.
    #[must_use]
    pub fn with_filter(mut self, filter: Option<String>) -> Self {
        self.filter = filter;
        self
    }

    pub fn selected(&self) -> Vec<&TestCase> {
        self.cases
            .iter()
            .filter(|case| {
                self.filter
                    .as_deref()
                    .is_none_or(|f| case.id.to_string().contains(f))
            })
            .collect()
    }

    /// Selected cases grouped by suite, suites in first-registration order.
    fn suites(&self) -> Vec<(&str, Vec<&TestCase>)> {
        let mut suites: Vec<(&str, Vec<&TestCase>)> = Vec::new();
        for case in self.selected() {
            match suites.iter_mut().find(|(s, _)| *s == case.id.suite()) {
                Some((_, cases)) => cases.push(case),
                None => suites.push((case.id.suite(), vec![case])),
            }
        }
        suites
    }

    /// Runs every selected case on this rank. Returns whether every test
    /// passed locally; the group-wide verdict is the coordinator's report.
    pub fn run(
        &self,
        rank: usize,
        size: usize,
        listener: &mut dyn TestEventListener,
    ) -> Result<bool> {
        let run_started = Instant::now();
        let suites = self.suites();
        let tests: usize = suites.iter().map(|(_, cases)| cases.len()).sum();
        let mut passed = true;

        listener.on_run_start(tests, suites.len(), self.filter.as_deref())?;
        for (suite, cases) in &suites {
            let suite_started = Instant::now();
            listener.on_suite_start(suite, cases.len())?;

            for case in cases {
                listener.on_test_start(&case.id)?;
                let mut ctx = TestContext {
                    rank,
                    size,
                    failed: false,
                    listener: &mut *listener,
                };
                run_body(case, &mut ctx);
                passed &= !ctx.failed;
                listener.on_test_end(&case.id)?;
            }

            listener.on_suite_end(suite, cases.len(), suite_started.elapsed())?;
        }
        listener.on_run_end(run_started.elapsed())?;

        Ok(passed)
    }
}

/// A panicking body counts as a fatal failure of its test.
fn run_body(case: &TestCase, ctx: &mut TestContext<'_>) {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| (case.body)(ctx)));
    if let Err(payload) = outcome {
        let reason = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_owned())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic payload".to_owned());
        ctx.report(
            OutcomeKind::FatalFailure,
            Location::caller(),
            format!("test body panicked: {reason}"),
        );
    }
}
