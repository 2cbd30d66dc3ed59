//! The process-group interface the aggregation core runs on.
//!
//! A group is a fixed set of ranks executing the same code. The core only
//! needs the primitives below: a count gather rooted at rank 0 and blocking,
//! tagged, order-preserving point-to-point messages. Order is guaranteed per
//! (sender, tag) pair; nothing is assumed about buffering, so a send may
//! return immediately or block until the matching receive.

mod local;

pub use local::{Delivery, LocalGroup};

use crate::errors::Result;

/// The coordinating rank, where reports are gathered and printed.
pub const COORDINATOR: usize = 0;

pub trait ProcessGroup {
    fn rank(&self) -> usize;

    fn size(&self) -> usize;

    fn is_coordinator(&self) -> bool {
        self.rank() == COORDINATOR
    }

    /// A handle on the same ranks with a fresh communication context, so
    /// traffic on the duplicate can never match traffic on the original.
    /// Collective: every rank must duplicate in the same order.
    fn duplicate(&self) -> Result<Self>
    where
        Self: Sized;

    /// Gathers one count from every rank onto the coordinator. Returns the
    /// counts indexed by rank on the coordinator and `None` elsewhere.
    /// Collective: every rank must call it.
    fn gather_counts(&self, local: u64) -> Result<Option<Vec<u64>>>;

    fn send_int(&self, dest: usize, tag: usize, value: i64) -> Result<()>;

    fn recv_int(&self, source: usize, tag: usize) -> Result<i64>;

    fn send_bytes(&self, dest: usize, tag: usize, bytes: &[u8]) -> Result<()>;

    /// Receives one byte message. The length is whatever the sender sent;
    /// callers validate it against what they expected.
    fn recv_bytes(&self, source: usize, tag: usize) -> Result<Vec<u8>>;
}
