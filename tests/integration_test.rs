use std::collections::{BTreeMap, BTreeSet};
use std::process::Command;
use std::time::Duration;

use rstest::rstest;
use serde_json::Value;

use rankreport::config::{PrinterKind, ReportConfig};
use rankreport::demo;
use rankreport::group::{Delivery, LocalGroup, ProcessGroup};
use rankreport::listener::{RankListener, TestEventListener};
use rankreport::models::{OutcomeKind, OutcomeRecord, TestId};
use rankreport::output::{Output, TestSummary};

fn quiet_config(printer: PrinterKind) -> ReportConfig {
    ReportConfig {
        printer,
        show_elapsed: false,
        ..ReportConfig::default()
    }
}

fn listener(group: LocalGroup, printer: PrinterKind) -> RankListener<LocalGroup, Vec<u8>> {
    let size = group.size();
    let config = quiet_config(printer);
    RankListener::new(group, config.max_payload_bytes, || {
        Output::new(Vec::new(), &config, false, size)
    })
}

/// Runs the demo suite on `size` ranks and returns the coordinator's report
/// plus every rank's local verdict.
fn run_demo(
    size: usize,
    delivery: Delivery,
    fail_on: &[usize],
    printer: PrinterKind,
) -> (String, Vec<bool>) {
    let fail_on: BTreeSet<usize> = fail_on.iter().copied().collect();
    let harness = demo::harness(fail_on);

    let results = LocalGroup::run(size, delivery, |group| {
        let rank = group.rank();
        let mut listener = listener(group, printer);
        let passed = harness.run(rank, size, &mut listener).unwrap();
        let report = listener
            .into_output()
            .map(|o| String::from_utf8(o.into_inner()).unwrap());
        (report, passed)
    })
    .unwrap();

    let report = results[0].0.clone().expect("coordinator report");
    assert!(results[1..].iter().all(|(r, _)| r.is_none()));
    (report, results.into_iter().map(|(_, p)| p).collect())
}

#[rstest]
#[case(Delivery::Buffered)]
#[case(Delivery::Synchronous)]
fn demo_suite_attributes_failures_to_ranks(#[case] delivery: Delivery) {
    let (report, passed) = run_demo(4, delivery, &[2], PrinterKind::Pretty);

    assert!(report.contains("[==========] Running 5 tests from 1 test suite using 4 ranks."));
    assert!(report.contains("[       OK ] BasicRanks.PassOnAllRanks\n"));
    assert!(report.contains("[  FAILED  ] BasicRanks.FailOnAllRanks on ranks 0-3\n"));
    assert!(report.contains("[  FAILED  ] BasicRanks.FailExceptOnRankZero on ranks 1-3\n"));
    assert!(report.contains("[  FAILED  ] BasicRanks.PassExceptOnRankZero on rank 0\n"));
    assert!(report.contains("[  FAILED  ] BasicRanks.FailOnSelectedRanks on rank 2\n"));
    assert!(report.contains("[  PASSED  ] 1 test."));
    assert!(report.contains("[  FAILED  ] 4 tests, listed below:"));
    assert!(report.ends_with(" 4 FAILED TESTS\n"));

    // Every rank fails FailOnAllRanks, so no rank passes locally.
    assert_eq!(passed, [false; 4]);
}

#[test]
fn failure_lines_appear_in_ascending_rank_order() {
    let (report, _) = run_demo(5, Delivery::Synchronous, &[], PrinterKind::Minimal);

    let start = report
        .find("*** Test BasicRanks.FailOnAllRanks starting.")
        .unwrap();
    let end = report.find("*** Test BasicRanks.FailOnAllRanks ending").unwrap();
    let section = &report[start..end];

    let ranks: Vec<usize> = section
        .lines()
        .filter_map(|l| l.trim_start().strip_prefix("*** Failure on rank "))
        .map(|l| l.split(',').next().unwrap().parse().unwrap())
        .collect();
    assert_eq!(ranks, [0, 1, 2, 3, 4]);
    assert!(report.contains("*** Test BasicRanks.FailOnAllRanks ending: FAILED on ranks 0-4."));
    assert!(report.contains("***   BasicRanks.FailExceptOnRankZero on ranks 1-4"));
}

#[test]
fn single_rank_group_reports_locally() {
    let (report, passed) = run_demo(1, Delivery::Buffered, &[0], PrinterKind::Pretty);

    assert!(report.contains("using 1 rank."));
    assert!(report.contains("[       OK ] BasicRanks.FailExceptOnRankZero\n"));
    assert!(report.contains("[  FAILED  ] BasicRanks.FailOnSelectedRanks on rank 0\n"));
    assert_eq!(passed, [false]);
}

/// How many records rank `rank` produces in test `test`: uneven, often zero.
fn trace_length(rank: usize, test: usize) -> usize {
    (rank * 7 + test * 3) % 4
}

#[rstest]
#[case(Delivery::Buffered, 6)]
#[case(Delivery::Synchronous, 6)]
#[case(Delivery::Synchronous, 2)]
fn no_record_is_lost_or_duplicated(#[case] delivery: Delivery, #[case] size: usize) {
    const TESTS: usize = 5;

    let results = LocalGroup::run(size, delivery, |group| {
        let rank = group.rank();
        let mut listener = listener(group, PrinterKind::Minimal);
        let mut summaries: Vec<TestSummary> = Vec::new();

        for test in 0..TESTS {
            let id = TestId::new("Trace", format!("t{test}"));
            listener.on_test_start(&id).unwrap();
            for i in 0..trace_length(rank, test) {
                let kind = if i % 2 == 0 {
                    OutcomeKind::Success
                } else {
                    OutcomeKind::FatalFailure
                };
                listener.on_assertion_result(OutcomeRecord::new(
                    kind,
                    "trace.rs",
                    u32::try_from(i).unwrap(),
                    format!("rank {rank} test {test} #{i}"),
                ));
            }
            listener.on_test_end(&id).unwrap();
            assert!(listener.buffer().is_empty());
            summaries.extend(listener.last_test().cloned());
        }
        listener.on_run_end(Duration::ZERO).unwrap();
        summaries
    })
    .unwrap();

    let summaries = &results[0];
    assert_eq!(summaries.len(), TESTS);
    for (test, summary) in summaries.iter().enumerate() {
        let expected: BTreeMap<usize, usize> = (0..size)
            .map(|r| (r, trace_length(r, test)))
            .filter(|(_, n)| *n > 0)
            .collect();
        assert_eq!(summary.records_by_rank, expected, "test {test}");

        let failed: BTreeSet<usize> = (0..size).filter(|r| trace_length(*r, test) > 1).collect();
        assert_eq!(summary.failed_ranks, failed, "test {test}");
    }
}

#[test]
fn failure_only_on_a_non_coordinator_rank() {
    let results = LocalGroup::run(4, Delivery::Buffered, |group| {
        let rank = group.rank();
        let mut listener = listener(group, PrinterKind::Pretty);
        let quiet = TestId::new("S", "Quiet");
        let odd = TestId::new("S", "OnlyThree");

        listener.on_test_start(&quiet).unwrap();
        listener.on_test_end(&quiet).unwrap();
        let quiet_summary = listener.last_test().cloned();

        listener.on_test_start(&odd).unwrap();
        if rank == 3 {
            listener.on_assertion_result(OutcomeRecord::new(
                OutcomeKind::FatalFailure,
                "foo.cpp",
                42,
                "expected 1 got 2\nsecond line ✗",
            ));
        }
        listener.on_test_end(&odd).unwrap();
        listener.on_run_end(Duration::ZERO).unwrap();

        let digest = listener.run_summary().map(|s| s.failures.clone());
        let report = listener
            .into_output()
            .map(|o| String::from_utf8(o.into_inner()).unwrap());
        (quiet_summary, digest, report)
    })
    .unwrap();

    let (quiet, digest, report) = &results[0];
    let quiet = quiet.as_ref().unwrap();
    assert!(quiet.passed());
    assert!(quiet.failed_ranks.is_empty());

    let digest = digest.as_ref().unwrap();
    assert_eq!(digest.len(), 1);
    assert_eq!(digest.entries()[0].test().name(), "OnlyThree");
    assert_eq!(digest.entries()[0].failed_ranks(), &BTreeSet::from([3]));

    let report = report.as_ref().unwrap();
    assert!(
        report.contains("foo.cpp:42: Failure on rank 3\n  expected 1 got 2\n  second line ✗\n")
    );
}

struct Cli {
    binary: &'static str,
}

impl Cli {
    fn new() -> Self {
        Self {
            binary: env!("CARGO_BIN_EXE_rankreport"),
        }
    }

    /// Returns (exit code, stdout, stderr).
    fn run(&self, args: &[&str]) -> (i32, String, String) {
        let output = Command::new(self.binary)
            .args(args)
            .env("NO_COLOR", "1")
            .output()
            .expect("Failed to execute rankreport");

        (
            output.status.code().unwrap_or(-1),
            String::from_utf8_lossy(&output.stdout).to_string(),
            String::from_utf8_lossy(&output.stderr).to_string(),
        )
    }
}

#[test]
fn binary_exits_nonzero_when_tests_fail() {
    let (code, stdout, _) = Cli::new().run(&["run", "-n", "3", "--color", "never", "--no-elapsed"]);

    assert_eq!(code, 1);
    assert!(stdout.contains("[  FAILED  ] BasicRanks.FailOnAllRanks on ranks 0-2"));
    // Only the coordinator prints: the banner appears once.
    assert_eq!(stdout.matches("[==========] Running").count(), 1);
}

#[test]
fn binary_exits_zero_when_filtered_to_passing_tests() {
    let (code, stdout, _) = Cli::new().run(&[
        "run",
        "-n",
        "3",
        "--filter",
        "PassOnAllRanks",
        "--printer",
        "minimal",
        "--color",
        "never",
    ]);

    assert_eq!(code, 0);
    assert!(stdout.contains("*** Test BasicRanks.PassOnAllRanks ending: PASSED."));
    assert!(stdout.contains("*** 1 test ran on 3 ranks: 1 passed, 0 failed."));
}

#[test]
fn binary_prints_json_summary() {
    let (code, stdout, _) = Cli::new().run(&[
        "run",
        "-n",
        "4",
        "--json",
        "--delivery",
        "synchronous",
        "--fail-on",
        "1,3",
    ]);

    assert_eq!(code, 1);
    let json: Value = serde_json::from_str(&stdout).expect("stdout is JSON");
    assert_eq!(json["ranks"], 4);
    assert_eq!(json["tests_run"], 5);
    assert_eq!(json["tests_failed"], 4);

    let failures = json["failures"].as_array().unwrap();
    let selected = failures
        .iter()
        .find(|f| f["name"] == "FailOnSelectedRanks")
        .unwrap();
    assert_eq!(selected["failed_ranks"], "1,3");
}

#[test]
fn binary_normalizes_rank_lists() {
    let cli = Cli::new();
    let (code, stdout, _) = cli.run(&["ranges", "7,0-2,5,8,10"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "0-2,5,7-8,10");

    let (code, _, stderr) = cli.run(&["ranges", "4-1"]);
    assert_eq!(code, 2);
    assert!(stderr.contains("Invalid rank list"));
}

#[rstest]
#[case("18446744073709551615", "18446744073709551615")]
#[case("18446744073709551614,18446744073709551615", "18446744073709551614-18446744073709551615")]
#[case("0-100000000000,5", "0-100000000000")]
fn binary_normalizes_extreme_rank_lists(#[case] list: &str, #[case] expected: &str) {
    let (code, stdout, _) = Cli::new().run(&["ranges", list]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), expected);
}

#[rstest]
#[case("2")]
#[case("0-100000000000")]
fn binary_rejects_fail_on_ranks_outside_the_group(#[case] list: &str) {
    let (code, stdout, stderr) = Cli::new().run(&["run", "-n", "2", "--fail-on", list]);
    assert_eq!(code, 2);
    assert!(stdout.is_empty());
    assert!(stderr.contains("Invalid --fail-on rank list"));
    assert!(stderr.contains("outside a group of 2 ranks"));
}

#[test]
fn binary_rejects_an_empty_group() {
    let (code, _, stderr) = Cli::new().run(&["run", "-n", "0"]);
    assert_eq!(code, 2);
    assert!(stderr.contains("at least 1"));
}
