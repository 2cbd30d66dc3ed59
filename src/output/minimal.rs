use std::io::{self, Write};
use std::time::Duration;

use super::{RunSummary, Styles, TestSummary, countable, ranks_phrase};
use crate::models::TestId;
use crate::session::SourcedRecord;

pub(super) fn test_start(out: &mut impl Write, test: &TestId) -> io::Result<()> {
    writeln!(out, "*** Test {test} starting.")
}

pub(super) fn record(
    out: &mut impl Write,
    styles: &Styles,
    sourced: &SourcedRecord,
) -> io::Result<()> {
    let record = &sourced.record;
    let label = if record.is_failure() {
        styles.fail.apply_to("*** Failure")
    } else {
        styles.pass.apply_to("Success")
    };

    writeln!(
        out,
        "      {label} on rank {}, {}:{}",
        sourced.rank,
        record.file(),
        record.line()
    )?;
    writeln!(out, "{}", record.message())
}

pub(super) fn test_end(
    out: &mut impl Write,
    styles: &Styles,
    summary: &TestSummary,
    elapsed: Option<Duration>,
) -> io::Result<()> {
    let time = elapsed.map_or_else(String::new, |e| format!(" ({} ms)", e.as_millis()));
    if summary.passed() {
        writeln!(
            out,
            "*** Test {} ending: {}.{time}",
            summary.test,
            styles.pass.apply_to("PASSED")
        )
    } else {
        writeln!(
            out,
            "*** Test {} ending: {} on {}.{time}",
            summary.test,
            styles.fail.apply_to("FAILED"),
            ranks_phrase(&summary.failed_ranks)
        )
    }
}

pub(super) fn run_end(
    out: &mut impl Write,
    styles: &Styles,
    summary: &RunSummary,
) -> io::Result<()> {
    writeln!(
        out,
        "*** {} ran on {}: {} passed, {} failed.",
        countable(summary.tests_run, "test", "tests"),
        countable(summary.ranks, "rank", "ranks"),
        summary.tests_passed,
        summary.tests_failed
    )?;

    if summary.failures.is_empty() {
        return Ok(());
    }
    writeln!(out, "*** {}", styles.fail.apply_to("Failed tests:"))?;
    for entry in summary.failures.entries() {
        writeln!(
            out,
            "***   {} on {}",
            entry.test(),
            ranks_phrase(entry.failed_ranks())
        )?;
    }
    Ok(())
}
