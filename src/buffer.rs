use crate::models::{OutcomeKind, OutcomeRecord};

/// Outcomes recorded on this rank for the test currently running, in
/// evaluation order.
#[derive(Debug, Default)]
pub struct OutcomeBuffer {
    records: Vec<OutcomeRecord>,
}

impl OutcomeBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: OutcomeRecord) {
        self.records.push(record);
    }

    /// Convenience for the assertion hook.
    pub fn record(&mut self, kind: OutcomeKind, file: &str, line: u32, message: &str) {
        self.push(OutcomeRecord::new(kind, file, line, message));
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, OutcomeRecord> {
        self.records.iter()
    }

    pub fn has_failures(&self) -> bool {
        self.records.iter().any(OutcomeRecord::is_failure)
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}

impl<'a> IntoIterator for &'a OutcomeBuffer {
    type Item = &'a OutcomeRecord;
    type IntoIter = std::slice::Iter<'a, OutcomeRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
