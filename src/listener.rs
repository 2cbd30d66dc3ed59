//! Host test framework hooks and the per-rank listener that implements them.

use std::io::Write;
use std::time::{Duration, Instant};

use console::Term;
use strum::{AsRefStr, Display};
use tracing::{debug, warn};

use crate::buffer::OutcomeBuffer;
use crate::errors::{Error, Result, Stage};
use crate::group::ProcessGroup;
use crate::models::{OutcomeRecord, TestId};
use crate::output::{Output, RunSummary, TestSummary};
use crate::session::aggregate;

/// Callbacks a test framework fires while it runs. Every rank must fire the
/// same start/end sequence; assertion results may differ per rank.
pub trait TestEventListener {
    fn on_run_start(&mut self, _tests: usize, _suites: usize, _filter: Option<&str>) -> Result<()> {
        Ok(())
    }

    fn on_suite_start(&mut self, _suite: &str, _tests: usize) -> Result<()> {
        Ok(())
    }

    fn on_test_start(&mut self, test: &TestId) -> Result<()>;

    /// Called for every evaluated assertion, on whichever ranks evaluate it.
    fn on_assertion_result(&mut self, record: OutcomeRecord);

    fn on_test_end(&mut self, test: &TestId) -> Result<()>;

    fn on_suite_end(&mut self, _suite: &str, _tests: usize, _elapsed: Duration) -> Result<()> {
        Ok(())
    }

    fn on_run_end(&mut self, elapsed: Duration) -> Result<()>;
}

/// Where a rank is in the per-test cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr, Display)]
#[strum(serialize_all = "snake_case")]
pub enum Phase {
    /// Between tests.
    Idle,
    /// A test is running and outcomes are being buffered.
    Collecting,
    /// The count handshake and transfer are in progress.
    Aggregating,
    /// The coordinator is printing the test's summary.
    Reporting,
    /// The run summary has been printed.
    Finalized,
}

pub struct RankListener<G: ProcessGroup, W: Write = Term> {
    group: G,
    buffer: OutcomeBuffer,
    /// Present only on the coordinator.
    output: Option<Output<W>>,
    max_payload: usize,
    phase: Phase,
    current: Option<(TestId, Instant)>,
    last_test: Option<TestSummary>,
    run_summary: Option<RunSummary>,
}

impl<G: ProcessGroup, W: Write> RankListener<G, W> {
    /// `output` is only invoked on the coordinator.
    pub fn new(group: G, max_payload: usize, output: impl FnOnce() -> Output<W>) -> Self {
        let output = group.is_coordinator().then(output);
        Self {
            group,
            buffer: OutcomeBuffer::new(),
            output,
            max_payload,
            phase: Phase::Idle,
            current: None,
            last_test: None,
            run_summary: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn buffer(&self) -> &OutcomeBuffer {
        &self.buffer
    }

    /// Summary of the most recently finished test. Coordinator only.
    pub fn last_test(&self) -> Option<&TestSummary> {
        self.last_test.as_ref()
    }

    /// Set once the run has finished. Coordinator only.
    pub fn run_summary(&self) -> Option<&RunSummary> {
        self.run_summary.as_ref()
    }

    pub fn into_output(self) -> Option<Output<W>> {
        self.output
    }

    fn expect_phase(&self, expected: Phase, event: &str) -> Result<()> {
        if self.phase != expected {
            return Err(Error::setup(
                self.group.rank(),
                Stage::Setup,
                format!("{event} while {}, expected {expected}", self.phase),
            ));
        }
        Ok(())
    }
}

impl<G: ProcessGroup, W: Write> TestEventListener for RankListener<G, W> {
    fn on_run_start(&mut self, tests: usize, suites: usize, filter: Option<&str>) -> Result<()> {
        self.expect_phase(Phase::Idle, "run start")?;
        if let Some(output) = &mut self.output {
            output.run_start(tests, suites, filter)?;
        }
        Ok(())
    }

    fn on_suite_start(&mut self, suite: &str, tests: usize) -> Result<()> {
        self.expect_phase(Phase::Idle, "suite start")?;
        if let Some(output) = &mut self.output {
            output.suite_start(suite, tests)?;
        }
        Ok(())
    }

    fn on_test_start(&mut self, test: &TestId) -> Result<()> {
        self.expect_phase(Phase::Idle, "test start")?;
        self.buffer.clear();
        self.current = Some((test.clone(), Instant::now()));
        self.phase = Phase::Collecting;

        if let Some(output) = &mut self.output {
            output.test_start(test)?;
        }
        Ok(())
    }

    fn on_assertion_result(&mut self, record: OutcomeRecord) {
        if self.phase != Phase::Collecting {
            warn!(
                rank = self.group.rank(),
                phase = %self.phase,
                "dropping assertion result reported outside of a test"
            );
            return;
        }
        self.buffer.push(record);
    }

    fn on_test_end(&mut self, test: &TestId) -> Result<()> {
        self.expect_phase(Phase::Collecting, "test end")?;
        let (current, started) = self.current.take().ok_or_else(|| {
            Error::setup(self.group.rank(), Stage::Setup, "no test in progress")
        })?;
        if &current != test {
            return Err(Error::setup(
                self.group.rank(),
                Stage::Setup,
                format!("test {test} ended but {current} was running"),
            ));
        }

        self.phase = Phase::Aggregating;
        debug!(
            rank = self.group.rank(),
            %test,
            local = self.buffer.len(),
            failed = self.buffer.has_failures(),
            "aggregating"
        );

        let Self {
            group,
            buffer,
            output,
            max_payload,
            ..
        } = self;
        match output {
            Some(output) => {
                aggregate(buffer, group, *max_payload, |sourced| output.record(&sourced))?;
            }
            None => aggregate(buffer, group, *max_payload, |_| Ok(()))?,
        }

        if let Some(output) = &mut self.output {
            self.phase = Phase::Reporting;
            self.last_test = Some(output.test_end(started.elapsed())?);
        }
        self.phase = Phase::Idle;
        Ok(())
    }

    fn on_suite_end(&mut self, suite: &str, tests: usize, elapsed: Duration) -> Result<()> {
        self.expect_phase(Phase::Idle, "suite end")?;
        if let Some(output) = &mut self.output {
            output.suite_end(suite, tests, elapsed)?;
        }
        Ok(())
    }

    fn on_run_end(&mut self, elapsed: Duration) -> Result<()> {
        self.expect_phase(Phase::Idle, "run end")?;
        if let Some(output) = &mut self.output {
            self.run_summary = Some(output.run_end(elapsed)?);
        }
        self.phase = Phase::Finalized;
        Ok(())
    }
}
