//! In-process process group: every rank is a thread, every ordered pair of
//! ranks is joined by its own channel.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use clap::ValueEnum;
use crossbeam_channel::{Receiver, Sender, bounded, unbounded};
use strum::AsRefStr;
use tracing::trace;

use super::{COORDINATOR, ProcessGroup};
use crate::errors::{Error, Result, Stage};

/// Tag reserved for the count gather.
const GATHER_TAG: usize = usize::MAX;

/// How sends behave when no receive is posted yet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, AsRefStr, ValueEnum)]
#[strum(serialize_all = "lowercase")]
pub enum Delivery {
    /// Sends complete immediately; messages queue at the receiver.
    #[default]
    Buffered,
    /// Every send blocks until the receiver takes the message.
    Synchronous,
}

#[derive(Debug)]
enum Payload {
    Count(u64),
    Int(i64),
    Bytes(Vec<u8>),
}

impl Payload {
    fn describe(&self) -> &'static str {
        match self {
            Self::Count(_) => "count",
            Self::Int(_) => "integer",
            Self::Bytes(_) => "byte buffer",
        }
    }
}

#[derive(Debug)]
struct Envelope {
    context: u64,
    tag: usize,
    payload: Payload,
}

#[derive(Debug)]
struct Links {
    /// Indexed by destination rank.
    outgoing: Vec<Sender<Envelope>>,
    /// Indexed by source rank.
    incoming: Vec<Receiver<Envelope>>,
}

#[derive(Debug)]
pub struct LocalGroup {
    rank: usize,
    size: usize,
    context: u64,
    contexts: Arc<AtomicU64>,
    links: Arc<Links>,
}

impl LocalGroup {
    /// Builds one handle per rank. Hand each to its own thread.
    pub fn create(size: usize, delivery: Delivery) -> Result<Vec<Self>> {
        if size == 0 {
            return Err(Error::setup(
                COORDINATOR,
                Stage::Setup,
                "a process group needs at least one rank",
            ));
        }

        // channels[src][dst]
        let mut senders: Vec<Vec<Option<Sender<Envelope>>>> = Vec::with_capacity(size);
        let mut receivers: Vec<Vec<Option<Receiver<Envelope>>>> =
            (0..size).map(|_| (0..size).map(|_| None).collect()).collect();

        for src in 0..size {
            let mut row = Vec::with_capacity(size);
            for receiver_row in receivers.iter_mut() {
                let (tx, rx) = match delivery {
                    Delivery::Buffered => unbounded(),
                    Delivery::Synchronous => bounded(0),
                };
                row.push(Some(tx));
                receiver_row[src] = Some(rx);
            }
            senders.push(row);
        }

        let mut handles = Vec::with_capacity(size);
        for (rank, incoming) in receivers.into_iter().enumerate() {
            let outgoing = senders[rank].iter_mut().filter_map(Option::take).collect();
            let incoming = incoming.into_iter().flatten().collect();
            handles.push(Self {
                rank,
                size,
                context: 0,
                contexts: Arc::new(AtomicU64::new(0)),
                links: Arc::new(Links { outgoing, incoming }),
            });
        }

        Ok(handles)
    }

    /// Runs `body` once per rank, each on its own scoped thread, and
    /// returns the results indexed by rank.
    pub fn run<T, F>(size: usize, delivery: Delivery, body: F) -> Result<Vec<T>>
    where
        T: Send,
        F: Fn(Self) -> T + Sync,
    {
        let handles = Self::create(size, delivery)?;
        let body = &body;

        let results = thread::scope(|scope| {
            let workers: Vec<_> = handles
                .into_iter()
                .map(|group| {
                    let rank = group.rank;
                    thread::Builder::new()
                        .name(format!("rank-{rank}"))
                        .spawn_scoped(scope, move || body(group))
                        .map_err(|e| Error::setup(rank, Stage::Setup, e.to_string()))
                })
                .collect::<Result<_>>()?;

            workers
                .into_iter()
                .enumerate()
                .map(|(rank, worker)| {
                    worker.join().map_err(|_| {
                        Error::setup(rank, Stage::Setup, format!("rank {rank} panicked"))
                    })
                })
                .collect::<Result<Vec<T>>>()
        })?;

        Ok(results)
    }

    fn check_peer(&self, peer: usize, stage: Stage) -> Result<()> {
        if peer >= self.size {
            return Err(Error::setup(
                self.rank,
                stage,
                format!("rank {peer} is outside a group of {}", self.size),
            ));
        }
        Ok(())
    }

    fn post(&self, dest: usize, tag: usize, payload: Payload, stage: Stage) -> Result<()> {
        self.check_peer(dest, stage)?;
        trace!(rank = self.rank, dest, tag, kind = payload.describe(), "send");
        let envelope = Envelope {
            context: self.context,
            tag,
            payload,
        };
        self.links.outgoing[dest].send(envelope).map_err(|_| {
            Error::protocol(self.rank, stage, format!("rank {dest} is no longer receiving"))
        })
    }

    fn take(&self, source: usize, tag: usize, stage: Stage) -> Result<Payload> {
        self.check_peer(source, stage)?;
        let envelope = self.links.incoming[source].recv().map_err(|_| {
            let details = format!("rank {source} disconnected before sending");
            match stage {
                Stage::Handshake => Error::setup(self.rank, stage, details),
                _ => Error::protocol(self.rank, stage, details),
            }
        })?;

        if envelope.context != self.context {
            return Err(Error::protocol(
                self.rank,
                stage,
                format!(
                    "message from rank {source} belongs to context {}, expected {}",
                    envelope.context, self.context
                ),
            ));
        }
        if envelope.tag != tag {
            return Err(Error::protocol(
                self.rank,
                stage,
                format!(
                    "message from rank {source} has tag {}, expected {tag}",
                    envelope.tag
                ),
            ));
        }

        trace!(rank = self.rank, source, tag, kind = envelope.payload.describe(), "recv");
        Ok(envelope.payload)
    }

    fn unexpected(&self, source: usize, wanted: &str, got: &Payload) -> Error {
        Error::protocol(
            self.rank,
            Stage::Transfer,
            format!("expected {wanted} from rank {source}, got {}", got.describe()),
        )
    }
}

impl ProcessGroup for LocalGroup {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn duplicate(&self) -> Result<Self> {
        let context = self.contexts.fetch_add(1, Ordering::Relaxed) + 1;
        Ok(Self {
            rank: self.rank,
            size: self.size,
            context,
            contexts: Arc::clone(&self.contexts),
            links: Arc::clone(&self.links),
        })
    }

    fn gather_counts(&self, local: u64) -> Result<Option<Vec<u64>>> {
        if !self.is_coordinator() {
            self.post(COORDINATOR, GATHER_TAG, Payload::Count(local), Stage::Handshake)?;
            return Ok(None);
        }

        let mut counts = Vec::with_capacity(self.size);
        counts.push(local);
        for source in 1..self.size {
            match self.take(source, GATHER_TAG, Stage::Handshake)? {
                Payload::Count(n) => counts.push(n),
                other => {
                    return Err(Error::setup(
                        self.rank,
                        Stage::Handshake,
                        format!("expected count from rank {source}, got {}", other.describe()),
                    ));
                }
            }
        }
        Ok(Some(counts))
    }

    fn send_int(&self, dest: usize, tag: usize, value: i64) -> Result<()> {
        self.post(dest, tag, Payload::Int(value), Stage::Transfer)
    }

    fn recv_int(&self, source: usize, tag: usize) -> Result<i64> {
        match self.take(source, tag, Stage::Transfer)? {
            Payload::Int(v) => Ok(v),
            other => Err(self.unexpected(source, "integer", &other)),
        }
    }

    fn send_bytes(&self, dest: usize, tag: usize, bytes: &[u8]) -> Result<()> {
        self.post(dest, tag, Payload::Bytes(bytes.to_vec()), Stage::Transfer)
    }

    fn recv_bytes(&self, source: usize, tag: usize) -> Result<Vec<u8>> {
        match self.take(source, tag, Stage::Transfer)? {
            Payload::Bytes(b) => Ok(b),
            other => Err(self.unexpected(source, "byte buffer", &other)),
        }
    }
}
