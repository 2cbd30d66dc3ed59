use std::collections::BTreeSet;

use serde::{Serialize, Serializer};

use super::TestId;
use crate::ranges::format_ranges;

/// A test that failed on at least one rank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DigestEntry {
    #[serde(flatten)]
    test: TestId,
    #[serde(serialize_with = "serialize_ranks")]
    failed_ranks: BTreeSet<usize>,
}

impl DigestEntry {
    pub fn new(test: TestId, failed_ranks: BTreeSet<usize>) -> Self {
        Self { test, failed_ranks }
    }

    pub fn test(&self) -> &TestId {
        &self.test
    }

    pub fn failed_ranks(&self) -> &BTreeSet<usize> {
        &self.failed_ranks
    }
}

fn serialize_ranks<S: Serializer>(ranks: &BTreeSet<usize>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&format_ranges(ranks))
}

/// Run-wide list of failed tests, in completion order. Coordinator only.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct FailureDigest {
    entries: Vec<DigestEntry>,
}

impl FailureDigest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `test` if any rank failed it. Passing tests are ignored.
    pub fn record(&mut self, test: &TestId, failed_ranks: &BTreeSet<usize>) {
        if failed_ranks.is_empty() {
            return;
        }
        self.entries
            .push(DigestEntry::new(test.clone(), failed_ranks.clone()));
    }

    pub fn entries(&self) -> &[DigestEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
