use std::io::{self, Write};
use std::time::Duration;

use super::{RunSummary, Styles, TestSummary, countable, ranks_phrase};
use crate::models::TestId;
use crate::session::SourcedRecord;

fn ms(elapsed: Option<Duration>, suffix: &str) -> String {
    elapsed.map_or_else(String::new, |e| format!(" ({} ms{suffix})", e.as_millis()))
}

pub(super) fn run_start(
    out: &mut impl Write,
    styles: &Styles,
    tests: usize,
    suites: usize,
    ranks: usize,
    filter: Option<&str>,
) -> io::Result<()> {
    if let Some(filter) = filter {
        writeln!(out, "{}", styles.note.apply_to(format!("Note: test filter = {filter}")))?;
    }
    writeln!(
        out,
        "{} Running {} from {} using {}.",
        styles.pass.apply_to("[==========]"),
        countable(tests, "test", "tests"),
        countable(suites, "test suite", "test suites"),
        countable(ranks, "rank", "ranks"),
    )?;
    writeln!(
        out,
        "{} Global test environment set-up.",
        styles.pass.apply_to("[----------]")
    )
}

pub(super) fn suite_start(
    out: &mut impl Write,
    styles: &Styles,
    suite: &str,
    tests: usize,
) -> io::Result<()> {
    writeln!(
        out,
        "{} {} from {suite}",
        styles.pass.apply_to("[----------]"),
        countable(tests, "test", "tests")
    )
}

pub(super) fn test_start(out: &mut impl Write, styles: &Styles, test: &TestId) -> io::Result<()> {
    writeln!(out, "{} {test}", styles.pass.apply_to("[ RUN      ]"))
}

pub(super) fn record(
    out: &mut impl Write,
    styles: &Styles,
    sourced: &SourcedRecord,
) -> io::Result<()> {
    let record = &sourced.record;
    let label = record.kind().label();
    let label = if record.is_failure() {
        styles.fail.apply_to(label)
    } else {
        styles.pass.apply_to(label)
    };

    writeln!(
        out,
        "{}:{}: {label} on rank {}",
        record.file(),
        record.line(),
        sourced.rank
    )?;
    if !record.message().is_empty() {
        let body = textwrap::indent(record.message(), "  ");
        writeln!(out, "{}", body.trim_end_matches('\n'))?;
    }
    Ok(())
}

pub(super) fn test_end(
    out: &mut impl Write,
    styles: &Styles,
    summary: &TestSummary,
    elapsed: Option<Duration>,
) -> io::Result<()> {
    if summary.passed() {
        writeln!(
            out,
            "{} {}{}",
            styles.pass.apply_to("[       OK ]"),
            summary.test,
            ms(elapsed, "")
        )
    } else {
        writeln!(
            out,
            "{} {} on {}{}",
            styles.fail.apply_to("[  FAILED  ]"),
            summary.test,
            ranks_phrase(&summary.failed_ranks),
            ms(elapsed, "")
        )
    }
}

pub(super) fn suite_end(
    out: &mut impl Write,
    styles: &Styles,
    suite: &str,
    tests: usize,
    elapsed: Option<Duration>,
) -> io::Result<()> {
    writeln!(
        out,
        "{} {} from {suite}{}",
        styles.pass.apply_to("[----------]"),
        countable(tests, "test", "tests"),
        ms(elapsed, " total")
    )?;
    writeln!(out)
}

pub(super) fn run_end(
    out: &mut impl Write,
    styles: &Styles,
    summary: &RunSummary,
    elapsed: Option<Duration>,
) -> io::Result<()> {
    writeln!(
        out,
        "{} Global test environment tear-down",
        styles.pass.apply_to("[----------]")
    )?;
    writeln!(
        out,
        "{} {} from {} ran.{}",
        styles.pass.apply_to("[==========]"),
        countable(summary.tests_run, "test", "tests"),
        countable(summary.suites, "test suite", "test suites"),
        ms(elapsed, " total")
    )?;
    writeln!(
        out,
        "{} {}.",
        styles.pass.apply_to("[  PASSED  ]"),
        countable(summary.tests_passed, "test", "tests")
    )?;

    if summary.failures.is_empty() {
        return Ok(());
    }

    let failed = styles.fail.apply_to("[  FAILED  ]");
    writeln!(
        out,
        "{failed} {}, listed below:",
        countable(summary.tests_failed, "test", "tests")
    )?;
    for entry in summary.failures.entries() {
        writeln!(
            out,
            "{failed} {} on {}",
            entry.test(),
            ranks_phrase(entry.failed_ranks())
        )?;
    }
    writeln!(out)?;
    writeln!(
        out,
        "{}",
        styles.bold.apply_to(format!(
            " {} FAILED {}",
            summary.tests_failed,
            if summary.tests_failed == 1 { "TEST" } else { "TESTS" }
        ))
    )
}
