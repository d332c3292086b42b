//! The seam between the driver and the PostgreSQL client library
//!
//! The worker only ever speaks to its connection through [`PgTransport`]:
//! submit a query, flush outgoing bytes, wait on and consume incoming
//! bytes, drain result records, and drive the reset-based reconnect state
//! machine. The live implementation wraps libpq (see the `session`
//! module); tests substitute a scripted transport.

use std::os::fd::RawFd;
use std::time::Duration;

use crate::error::PgError;

/// Longest a single `poll(2)` slice may block.
pub(crate) const POLL_SLICE: Duration = Duration::from_millis(5000);

/// Outcome of flushing queued outgoing bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushStatus {
    /// Everything was sent.
    Sent,
    /// Bytes remain; wait for the socket to accept more.
    Pending,
    /// The connection rejected the flush.
    Failed,
}

/// Progress of the asynchronous connection reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetPolling {
    /// Reset complete; the connection is usable again.
    Ok,
    /// Reset failed; the connection stays dead.
    Failed,
    /// Waiting for the socket to become readable.
    Reading,
    /// Waiting for the socket to become writable.
    Writing,
}

/// One record drained from the connection after a query.
///
/// Decoding cell bytes into user types is the caller's business; the
/// driver is bit-transparent.
pub trait ResultSet: Send + std::fmt::Debug {
    /// Whether the record carries a successful tuple or command status.
    fn is_ok(&self) -> bool;

    /// The server's message for a failed record.
    fn error_message(&self) -> String;

    /// Number of rows.
    fn num_rows(&self) -> usize;

    /// Number of columns per row.
    fn num_columns(&self) -> usize;

    /// Raw cell bytes; `None` for SQL NULL or out-of-range coordinates.
    fn value(&self, row: usize, column: usize) -> Option<Vec<u8>>;

    /// Rows affected by a command.
    fn affected_rows(&self) -> u64;
}

/// Protocol-level primitives the worker drives on its single connection.
pub trait PgTransport: Send {
    /// File descriptor of the underlying socket, if one is open.
    fn socket(&self) -> Option<RawFd>;

    /// Submit `sql` with positional text-format parameters.
    fn send_query(&mut self, sql: &str, params: &[String]) -> Result<(), PgError>;

    /// Push queued outgoing bytes.
    fn flush(&mut self) -> FlushStatus;

    /// Absorb whatever input is available on the socket.
    fn consume_input(&mut self) -> Result<(), PgError>;

    /// Whether reading a result would still block.
    fn is_busy(&mut self) -> bool;

    /// Next queued result record; `None` once the query is fully drained.
    fn next_record(&mut self) -> Option<Box<dyn ResultSet>>;

    /// Cheap liveness probe: handle present and status OK.
    fn is_healthy(&self) -> bool;

    /// Begin an asynchronous reset of the connection.
    fn reset_start(&mut self) -> bool;

    /// Advance the reset state machine.
    fn reset_poll(&mut self) -> ResetPolling;

    /// Put the socket into non-blocking mode.
    fn set_nonblocking(&mut self) -> Result<(), String>;
}

/// Readiness a wait can ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Interest {
    Read,
    Write,
}

/// Outcome of waiting on the socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PollStatus {
    Ready,
    TimedOut,
    /// `poll(2)` failed or reported `POLLERR`/`POLLHUP`/`POLLNVAL`.
    Failed,
}

/// Wait until `fd` is ready for `interest`, up to `timeout`.
pub(crate) fn poll_fd(fd: RawFd, interest: Interest, timeout: Duration) -> PollStatus {
    let events = match interest {
        Interest::Read => libc::POLLIN,
        Interest::Write => libc::POLLOUT,
    };
    let mut pfd = libc::pollfd {
        fd,
        events,
        revents: 0,
    };

    let timeout_ms = timeout.as_millis().min(libc::c_int::MAX as u128) as libc::c_int;
    let ready = unsafe { libc::poll(&mut pfd, 1, timeout_ms) };
    if ready < 0 {
        return PollStatus::Failed;
    }
    if ready == 0 {
        return PollStatus::TimedOut;
    }
    if pfd.revents & (libc::POLLERR | libc::POLLHUP | libc::POLLNVAL) != 0 {
        return PollStatus::Failed;
    }
    PollStatus::Ready
}
