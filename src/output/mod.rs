//! Coordinator-side report rendering.
//!
//! [`Output`] consumes the merged record stream of each test, prints it with
//! the configured printer, and keeps the run-wide [`FailureDigest`].

mod minimal;
mod pretty;

use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;
use std::time::Duration;

use console::{Style, Term};
use jiff::Timestamp;
use serde::Serialize;

use crate::config::{PrinterKind, ReportConfig};
use crate::errors::{Error, Result, Stage};
use crate::group::COORDINATOR;
use crate::models::{FailureDigest, TestId};
use crate::session::SourcedRecord;

pub(crate) struct Styles {
    pass: Style,
    fail: Style,
    note: Style,
    bold: Style,
}

impl Styles {
    fn new(color: bool) -> Self {
        Self {
            pass: Style::new().green().force_styling(color),
            fail: Style::new().red().force_styling(color),
            note: Style::new().yellow().force_styling(color),
            bold: Style::new().bold().force_styling(color),
        }
    }
}

/// "1 test", "2 tests".
pub(crate) fn countable(count: usize, singular: &str, plural: &str) -> String {
    format!("{count} {}", if count == 1 { singular } else { plural })
}

/// "rank 3" or "ranks 0-2,5".
pub(crate) fn ranks_phrase(ranks: &BTreeSet<usize>) -> String {
    let noun = if ranks.len() == 1 { "rank" } else { "ranks" };
    format!("{noun} {}", crate::ranges::format_ranges(ranks))
}

/// What the group did for one test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestSummary {
    pub test: TestId,
    pub failed_ranks: BTreeSet<usize>,
    /// Records rendered per source rank; ranks without records are absent.
    pub records_by_rank: BTreeMap<usize, usize>,
}

impl TestSummary {
    fn new(test: TestId) -> Self {
        Self {
            test,
            failed_ranks: BTreeSet::new(),
            records_by_rank: BTreeMap::new(),
        }
    }

    pub fn passed(&self) -> bool {
        self.failed_ranks.is_empty()
    }
}

/// End-of-run totals, also the `--json` document.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub started_at: Timestamp,
    pub finished_at: Timestamp,
    pub ranks: usize,
    pub suites: usize,
    pub tests_run: usize,
    pub tests_passed: usize,
    pub tests_failed: usize,
    pub elapsed_ms: u128,
    pub failures: FailureDigest,
}

pub struct Output<W: Write = Term> {
    out: W,
    styles: Styles,
    printer: PrinterKind,
    json: bool,
    show_successes: bool,
    show_elapsed: bool,
    ranks: usize,
    started_at: Timestamp,
    suites: usize,
    tests_run: usize,
    tests_passed: usize,
    current: Option<TestSummary>,
    digest: FailureDigest,
}

impl Output<Term> {
    pub fn stdout(config: &ReportConfig, color: bool, ranks: usize) -> Self {
        Self::new(Term::stdout(), config, color, ranks)
    }
}

impl<W: Write> Output<W> {
    /// `color` is the already resolved color decision, see
    /// [`ColorChoice::resolve`](crate::config::ColorChoice::resolve).
    pub fn new(out: W, config: &ReportConfig, color: bool, ranks: usize) -> Self {
        Self {
            out,
            styles: Styles::new(color),
            printer: config.printer,
            json: false,
            show_successes: config.show_successes,
            show_elapsed: config.show_elapsed,
            ranks,
            started_at: Timestamp::now(),
            suites: 0,
            tests_run: 0,
            tests_passed: 0,
            current: None,
            digest: FailureDigest::new(),
        }
    }

    /// Suppresses the text report and prints a JSON [`RunSummary`] at the end.
    #[must_use]
    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn text(&self) -> bool {
        !self.json
    }

    /// `filter` is echoed as a reminder that some tests may not run.
    pub fn run_start(&mut self, tests: usize, suites: usize, filter: Option<&str>) -> Result<()> {
        self.started_at = Timestamp::now();
        if self.text() && self.printer == PrinterKind::Pretty {
            pretty::run_start(&mut self.out, &self.styles, tests, suites, self.ranks, filter)?;
        }
        Ok(())
    }

    pub fn suite_start(&mut self, suite: &str, tests: usize) -> Result<()> {
        self.suites += 1;
        if self.text() && self.printer == PrinterKind::Pretty {
            pretty::suite_start(&mut self.out, &self.styles, suite, tests)?;
        }
        Ok(())
    }

    pub fn test_start(&mut self, test: &TestId) -> Result<()> {
        self.current = Some(TestSummary::new(test.clone()));
        if !self.text() {
            return Ok(());
        }
        match self.printer {
            PrinterKind::Minimal => minimal::test_start(&mut self.out, test)?,
            PrinterKind::Pretty => pretty::test_start(&mut self.out, &self.styles, test)?,
        }
        Ok(())
    }

    /// Handles one record of the merged stream.
    pub fn record(&mut self, sourced: &SourcedRecord) -> Result<()> {
        let current = self.current.as_mut().ok_or_else(|| {
            Error::setup(COORDINATOR, Stage::Transfer, "record received outside of a test")
        })?;

        *current.records_by_rank.entry(sourced.rank).or_default() += 1;
        if sourced.record.is_failure() {
            current.failed_ranks.insert(sourced.rank);
        } else if !self.show_successes {
            return Ok(());
        }

        if !self.text() {
            return Ok(());
        }
        match self.printer {
            PrinterKind::Minimal => minimal::record(&mut self.out, &self.styles, sourced)?,
            PrinterKind::Pretty => pretty::record(&mut self.out, &self.styles, sourced)?,
        }
        Ok(())
    }

    /// Prints the test's summary line and updates the digest.
    pub fn test_end(&mut self, elapsed: Duration) -> Result<TestSummary> {
        let summary = self.current.take().ok_or_else(|| {
            Error::setup(COORDINATOR, Stage::Setup, "test ended without starting")
        })?;

        self.tests_run += 1;
        if summary.passed() {
            self.tests_passed += 1;
        }
        self.digest.record(&summary.test, &summary.failed_ranks);

        if self.text() {
            let elapsed = self.show_elapsed.then_some(elapsed);
            match self.printer {
                PrinterKind::Minimal => {
                    minimal::test_end(&mut self.out, &self.styles, &summary, elapsed)?;
                }
                PrinterKind::Pretty => {
                    pretty::test_end(&mut self.out, &self.styles, &summary, elapsed)?;
                }
            }
        }
        Ok(summary)
    }

    pub fn suite_end(&mut self, suite: &str, tests: usize, elapsed: Duration) -> Result<()> {
        if self.text() && self.printer == PrinterKind::Pretty {
            let elapsed = self.show_elapsed.then_some(elapsed);
            pretty::suite_end(&mut self.out, &self.styles, suite, tests, elapsed)?;
        }
        Ok(())
    }

    /// Prints totals and the failure digest.
    pub fn run_end(&mut self, elapsed: Duration) -> Result<RunSummary> {
        let summary = RunSummary {
            started_at: self.started_at,
            finished_at: Timestamp::now(),
            ranks: self.ranks,
            suites: self.suites,
            tests_run: self.tests_run,
            tests_passed: self.tests_passed,
            tests_failed: self.tests_run - self.tests_passed,
            elapsed_ms: elapsed.as_millis(),
            failures: self.digest.clone(),
        };

        if self.json {
            let json = serde_json::to_string_pretty(&summary)
                .map_err(|e| Error::Render(std::io::Error::other(e)))?;
            writeln!(self.out, "{json}")?;
        } else {
            let elapsed = self.show_elapsed.then_some(elapsed);
            match self.printer {
                PrinterKind::Minimal => minimal::run_end(&mut self.out, &self.styles, &summary)?,
                PrinterKind::Pretty => {
                    pretty::run_end(&mut self.out, &self.styles, &summary, elapsed)?;
                }
            }
        }
        self.out.flush()?;
        Ok(summary)
    }
}
