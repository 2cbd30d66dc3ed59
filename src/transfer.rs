//! Wire protocol for moving one [`OutcomeRecord`] to the coordinator.
//!
//! A record travels as six messages, all tagged with the sender's rank:
//! kind code, file length, line, message length, file bytes, message bytes.
//! The receiver posts the same six receives in the same order. Per-sender
//! ordering keeps consecutive records from one rank aligned.

use tracing::trace;

use crate::errors::{Error, Result, Stage};
use crate::group::{COORDINATOR, ProcessGroup};
use crate::models::{OutcomeKind, OutcomeRecord};

pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 1024 * 1024;

/// Sends `record` to the coordinator. No acknowledgement is awaited.
pub fn send_record<G: ProcessGroup>(group: &G, record: &OutcomeRecord) -> Result<()> {
    let tag = group.rank();
    let file = record.file().as_bytes();
    let message = record.message().as_bytes();

    group.send_int(COORDINATOR, tag, record.kind().code())?;
    group.send_int(COORDINATOR, tag, length_field(group, file.len())?)?;
    group.send_int(COORDINATOR, tag, i64::from(record.line()))?;
    group.send_int(COORDINATOR, tag, length_field(group, message.len())?)?;
    group.send_bytes(COORDINATOR, tag, file)?;
    group.send_bytes(COORDINATOR, tag, message)?;

    trace!(rank = tag, kind = record.kind().as_ref(), line = record.line(), "sent record");
    Ok(())
}

/// Receives one record from `source`, rejecting declared lengths above
/// `max_payload` and payloads that do not match their declared length.
pub fn receive_record<G: ProcessGroup>(
    group: &G,
    source: usize,
    max_payload: usize,
) -> Result<OutcomeRecord> {
    let tag = source;
    let protocol = |details: String| Error::protocol(group.rank(), Stage::Transfer, details);

    let code = group.recv_int(source, tag)?;
    let kind = OutcomeKind::from_code(code)
        .ok_or_else(|| protocol(format!("rank {source} sent unknown outcome kind {code}")))?;

    let file_len = group.recv_int(source, tag)?;
    let file_len = declared_length(group, source, "file name", file_len, max_payload)?;

    let line = group.recv_int(source, tag)?;
    let line = u32::try_from(line)
        .map_err(|_| protocol(format!("rank {source} sent line number {line}")))?;

    let message_len = group.recv_int(source, tag)?;
    let message_len = declared_length(group, source, "message", message_len, max_payload)?;

    let file = receive_text(group, source, "file name", file_len)?;
    let message = receive_text(group, source, "message", message_len)?;

    trace!(rank = group.rank(), source, line, "received record");
    Ok(OutcomeRecord::new(kind, file, line, message))
}

fn length_field<G: ProcessGroup>(group: &G, len: usize) -> Result<i64> {
    i64::try_from(len).map_err(|_| {
        Error::protocol(
            group.rank(),
            Stage::Transfer,
            format!("payload of {len} bytes cannot be described"),
        )
    })
}

fn declared_length<G: ProcessGroup>(
    group: &G,
    source: usize,
    field: &str,
    declared: i64,
    max_payload: usize,
) -> Result<usize> {
    let len = usize::try_from(declared).map_err(|_| {
        Error::protocol(
            group.rank(),
            Stage::Transfer,
            format!("rank {source} declared a negative {field} length ({declared})"),
        )
    })?;

    if len > max_payload {
        return Err(Error::protocol(
            group.rank(),
            Stage::Transfer,
            format!("rank {source} declared a {field} of {len} bytes, limit is {max_payload}"),
        ));
    }
    Ok(len)
}

fn receive_text<G: ProcessGroup>(
    group: &G,
    source: usize,
    field: &str,
    expected: usize,
) -> Result<String> {
    let bytes = group.recv_bytes(source, source)?;
    if bytes.len() != expected {
        return Err(Error::protocol(
            group.rank(),
            Stage::Transfer,
            format!(
                "short transfer of {field} from rank {source}: declared {expected} bytes, got {}",
                bytes.len()
            ),
        ));
    }

    String::from_utf8(bytes).map_err(|_| {
        Error::protocol(
            group.rank(),
            Stage::Transfer,
            format!("{field} from rank {source} is not valid UTF-8"),
        )
    })
}
