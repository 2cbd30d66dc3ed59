//! Per-test aggregation of every rank's outcomes onto the coordinator.
//!
//! Opening a session performs the count handshake, so nothing can be sent
//! or received before every rank has reported how many records it holds.
//! The coordinator then yields its own records first and drains the other
//! ranks one at a time in ascending rank order, which keeps output
//! reproducible regardless of which rank finished first.

use std::slice;

use tracing::debug;

use crate::buffer::OutcomeBuffer;
use crate::errors::{Error, Result, Stage};
use crate::group::{COORDINATOR, ProcessGroup};
use crate::models::OutcomeRecord;
use crate::transfer::{receive_record, send_record};

/// A record together with the rank that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcedRecord {
    pub rank: usize,
    pub record: OutcomeRecord,
}

pub struct AggregationSession<'a, G: ProcessGroup> {
    buffer: &'a OutcomeBuffer,
    group: G,
    partial_counts: Option<Vec<u64>>,
    max_payload: usize,
}

impl<'a, G: ProcessGroup> AggregationSession<'a, G> {
    /// Duplicates `group` and runs the count handshake. Blocks until every
    /// rank has contributed its count.
    pub fn open(buffer: &'a OutcomeBuffer, group: &G, max_payload: usize) -> Result<Self> {
        let group = group.duplicate()?;
        let local = u64::try_from(buffer.len()).map_err(|_| {
            Error::setup(group.rank(), Stage::Handshake, "local record count overflows")
        })?;

        let partial_counts = group.gather_counts(local)?;
        if let Some(counts) = &partial_counts {
            if counts.len() != group.size() {
                return Err(Error::setup(
                    group.rank(),
                    Stage::Handshake,
                    format!(
                        "handshake returned {} counts for a group of {}",
                        counts.len(),
                        group.size()
                    ),
                ));
            }
            debug!(rank = group.rank(), ?counts, "handshake complete");
        }

        Ok(Self {
            buffer,
            group,
            partial_counts,
            max_payload,
        })
    }

    pub fn rank(&self) -> usize {
        self.group.rank()
    }

    pub fn size(&self) -> usize {
        self.group.size()
    }

    pub fn is_coordinator(&self) -> bool {
        self.group.is_coordinator()
    }

    /// Per-rank record counts. Only known on the coordinator.
    pub fn partial_counts(&self) -> Option<&[u64]> {
        self.partial_counts.as_deref()
    }

    pub fn local_records(&self) -> slice::Iter<'a, OutcomeRecord> {
        self.buffer.iter()
    }

    /// Sends every local record to the coordinator, in order.
    pub fn send_all(&self) -> Result<()> {
        if self.is_coordinator() {
            return Err(Error::setup(
                self.rank(),
                Stage::Transfer,
                "the coordinator does not send its own records",
            ));
        }

        for record in self.buffer {
            send_record(&self.group, record)?;
        }
        debug!(rank = self.rank(), sent = self.buffer.len(), "records sent");
        Ok(())
    }

    /// Cursor over the records `source` is about to send. Coordinator only.
    pub fn receive_from(&self, source: usize) -> Result<ReceiveCursor<'_, 'a, G>> {
        let counts = self.partial_counts.as_ref().ok_or_else(|| {
            Error::setup(
                self.rank(),
                Stage::Transfer,
                "only the coordinator can receive records",
            )
        })?;

        if source == COORDINATOR || source >= counts.len() {
            return Err(Error::setup(
                self.rank(),
                Stage::Transfer,
                format!("cannot receive from rank {source}"),
            ));
        }

        Ok(ReceiveCursor {
            session: self,
            source,
            remaining: counts[source],
        })
    }

    /// Every rank's records, coordinator first, then ascending by rank.
    pub fn merged(&self) -> Result<Merged<'_, 'a, G>> {
        if !self.is_coordinator() {
            return Err(Error::setup(
                self.rank(),
                Stage::Transfer,
                "only the coordinator can merge records",
            ));
        }

        Ok(Merged {
            session: self,
            local: self.local_records(),
            next_source: COORDINATOR + 1,
            current: None,
        })
    }
}

/// Lazily receives a known number of records from one rank. Not restartable;
/// after an error it yields nothing more.
pub struct ReceiveCursor<'s, 'a, G: ProcessGroup> {
    session: &'s AggregationSession<'a, G>,
    source: usize,
    remaining: u64,
}

impl<G: ProcessGroup> ReceiveCursor<'_, '_, G> {
    pub fn source(&self) -> usize {
        self.source
    }

}

impl<G: ProcessGroup> Iterator for ReceiveCursor<'_, '_, G> {
    type Item = Result<OutcomeRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;

        let received =
            receive_record(&self.session.group, self.source, self.session.max_payload);
        if received.is_err() {
            self.remaining = 0;
        }
        Some(received)
    }
}

pub struct Merged<'s, 'a, G: ProcessGroup> {
    session: &'s AggregationSession<'a, G>,
    local: slice::Iter<'a, OutcomeRecord>,
    next_source: usize,
    current: Option<ReceiveCursor<'s, 'a, G>>,
}

impl<G: ProcessGroup> Iterator for Merged<'_, '_, G> {
    type Item = Result<SourcedRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(record) = self.local.next() {
            return Some(Ok(SourcedRecord {
                rank: COORDINATOR,
                record: record.clone(),
            }));
        }

        loop {
            if let Some(cursor) = &mut self.current {
                let source = cursor.source();
                match cursor.next() {
                    Some(Ok(record)) => return Some(Ok(SourcedRecord { rank: source, record })),
                    Some(Err(e)) => {
                        self.next_source = self.session.size();
                        self.current = None;
                        return Some(Err(e));
                    }
                    None => self.current = None,
                }
            }

            if self.next_source >= self.session.size() {
                return None;
            }
            let source = self.next_source;
            self.next_source += 1;
            match self.session.receive_from(source) {
                Ok(cursor) => self.current = Some(cursor),
                Err(e) => {
                    self.next_source = self.session.size();
                    return Some(Err(e));
                }
            }
        }
    }
}

/// Runs one full aggregation for the test that just ended and clears
/// `buffer`, whatever the outcome. On the coordinator every merged record
/// is handed to `sink`; other ranks only send.
pub fn aggregate<G, F>(
    buffer: &mut OutcomeBuffer,
    group: &G,
    max_payload: usize,
    sink: F,
) -> Result<()>
where
    G: ProcessGroup,
    F: FnMut(SourcedRecord) -> Result<()>,
{
    let result = exchange(buffer, group, max_payload, sink);
    buffer.clear();
    result
}

fn exchange<G, F>(buffer: &OutcomeBuffer, group: &G, max_payload: usize, mut sink: F) -> Result<()>
where
    G: ProcessGroup,
    F: FnMut(SourcedRecord) -> Result<()>,
{
    let session = AggregationSession::open(buffer, group, max_payload)?;

    if !session.is_coordinator() {
        return session.send_all();
    }

    for item in session.merged()? {
        sink(item?)?;
    }
    Ok(())
}
