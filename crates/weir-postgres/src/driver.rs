//! The single-worker PostgreSQL driver

use std::collections::VecDeque;
use std::os::fd::RawFd;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, bounded};
use parking_lot::{Condvar, Mutex};
use rand::Rng;
use weir_core::Connection;
#[cfg(feature = "libpq")]
use weir_core::ConnectionError;

use crate::error::PgError;
use crate::transport::{
    FlushStatus, Interest, POLL_SLICE, PgTransport, PollStatus, ResetPolling, ResultSet, poll_fd,
};

/// Wall-clock budget for one reconnect attempt.
const RECONNECT_BUDGET: Duration = Duration::from_millis(5000);

/// Liveness query issued by the heartbeat.
const HEARTBEAT_QUERY: &str = "SELECT 1";

/// Bounds of the randomized heartbeat interval, in seconds.
const HEARTBEAT_SECS: std::ops::RangeInclusive<u64> = 60..=120;

/// Callback fired with the first successful result record.
pub type ResultCallback = Box<dyn FnOnce(Box<dyn ResultSet>) + Send>;

/// Callback fired with the failure.
pub type ErrorCallback = Box<dyn FnOnce(PgError) + Send>;

struct Request {
    sql: String,
    params: Vec<String>,
    on_ok: ResultCallback,
    on_err: ErrorCallback,
}

#[derive(Default)]
struct Inbox {
    requests: VecDeque<Request>,
    stopping: bool,
}

struct Shared {
    inbox: Mutex<Inbox>,
    wakeup: Condvar,
}

/// A PostgreSQL connection driven by a dedicated worker thread.
///
/// Callers enqueue requests from any thread; the worker owns the socket
/// exclusively, executes one request at a time in enqueue order, reconnects
/// a dead connection within a fixed budget, and - when enabled - issues a
/// randomized `SELECT 1` heartbeat to keep intermediaries from reaping the
/// idle link. Dropping the driver stops the worker and fails every pending
/// request with [`ShuttingDown`](crate::PgErrorKind::ShuttingDown).
pub struct Postgres {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

impl Connection for Postgres {}

impl Postgres {
    /// Connect using [`POSTGRES_DB_URL`](crate::config::DATABASE_URL_VAR)
    /// with the heartbeat enabled.
    ///
    /// This is the constructor to register with a
    /// [`ConnectionFactory`](weir_core::ConnectionFactory).
    #[cfg(feature = "libpq")]
    pub fn connection_factory() -> Result<Self, ConnectionError> {
        let uri = crate::config::database_url()?;
        Self::connect(&uri, true)
    }

    /// Connect to `uri` and spawn the query worker.
    #[cfg(feature = "libpq")]
    pub fn connect(uri: &str, heartbeat_enabled: bool) -> Result<Self, ConnectionError> {
        let mut session = crate::session::PqSession::connect(uri)?;
        session
            .set_nonblocking()
            .map_err(ConnectionError::SocketFailed)?;
        tracing::info!("postgres connection established");
        Ok(Self::with_transport(Box::new(session), heartbeat_enabled))
    }

    /// Spawn the worker over an already-established transport.
    pub(crate) fn with_transport(transport: Box<dyn PgTransport>, heartbeat_enabled: bool) -> Self {
        let shared = Arc::new(Shared {
            inbox: Mutex::new(Inbox::default()),
            wakeup: Condvar::new(),
        });
        let worker_shared = Arc::clone(&shared);
        let worker =
            thread::spawn(move || query_worker(transport, &worker_shared, heartbeat_enabled));
        Self {
            shared,
            worker: Some(worker),
        }
    }

    /// Queue `sql` and return a future for its result.
    ///
    /// Parameters are forwarded positionally (`$1`, `$2`, ...) in text
    /// format; the driver does not interpret the SQL.
    pub fn execute(&self, sql: &str, params: Vec<String>) -> QueryFuture {
        let (reply, future) = bounded(1);
        let ok_reply = reply.clone();
        self.execute_async(
            sql,
            params,
            move |rows| {
                let _ = ok_reply.send(Ok(rows));
            },
            move |err| {
                let _ = reply.send(Err(err));
            },
        );
        QueryFuture { reply: future }
    }

    /// Queue `sql`; exactly one of the callbacks fires with the outcome.
    ///
    /// Submission never blocks beyond the inbox lock. After the driver has
    /// begun shutting down, `on_err` fires immediately with
    /// [`ShuttingDown`](crate::PgErrorKind::ShuttingDown).
    pub fn execute_async<S, E>(&self, sql: &str, params: Vec<String>, on_ok: S, on_err: E)
    where
        S: FnOnce(Box<dyn ResultSet>) + Send + 'static,
        E: FnOnce(PgError) + Send + 'static,
    {
        let request = Request {
            sql: sql.to_string(),
            params,
            on_ok: Box::new(on_ok),
            on_err: Box::new(on_err),
        };
        {
            let mut inbox = self.shared.inbox.lock();
            if inbox.stopping {
                drop(inbox);
                (request.on_err)(PgError::ShuttingDown("driver is shutting down".into()));
                return;
            }
            inbox.requests.push_back(request);
        }
        self.shared.wakeup.notify_one();
    }

    /// Flag the worker to stop and wake it.
    pub(crate) fn request_stop(&self) {
        self.shared.inbox.lock().stopping = true;
        self.shared.wakeup.notify_all();
    }
}

impl Drop for Postgres {
    fn drop(&mut self) {
        self.request_stop();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::error!("postgres worker panicked");
            }
        }
    }
}

/// Pending result of [`Postgres::execute`].
pub struct QueryFuture {
    reply: Receiver<Result<Box<dyn ResultSet>, PgError>>,
}

impl QueryFuture {
    /// Block until the worker replies.
    pub fn wait(self) -> Result<Box<dyn ResultSet>, PgError> {
        self.reply.recv().unwrap_or_else(|_| {
            Err(PgError::ShuttingDown(
                "worker exited without replying".into(),
            ))
        })
    }

    /// Block up to `timeout` for the reply.
    pub fn wait_timeout(self, timeout: Duration) -> Result<Box<dyn ResultSet>, PgError> {
        match self.reply.recv_timeout(timeout) {
            Ok(outcome) => outcome,
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                Err(PgError::Timeout("no reply within the deadline".into()))
            }
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => Err(PgError::ShuttingDown(
                "worker exited without replying".into(),
            )),
        }
    }
}

enum Work {
    Request(Request),
    Heartbeat,
}

/// The worker: one request in flight at a time, in enqueue order.
fn query_worker(mut transport: Box<dyn PgTransport>, shared: &Shared, heartbeat_enabled: bool) {
    let mut rng = rand::thread_rng();
    let mut next_heartbeat = Instant::now() + Duration::from_secs(rng.gen_range(HEARTBEAT_SECS));

    loop {
        let work = {
            let mut inbox = shared.inbox.lock();
            loop {
                if inbox.stopping {
                    let pending = std::mem::take(&mut inbox.requests);
                    drop(inbox);
                    tracing::debug!(pending = pending.len(), "postgres worker stopping");
                    for request in pending {
                        (request.on_err)(PgError::ShuttingDown("worker thread stopped".into()));
                    }
                    return;
                }
                // Serve anything that arrived while waiting before even
                // considering the heartbeat.
                if let Some(request) = inbox.requests.pop_front() {
                    break Work::Request(request);
                }
                if heartbeat_enabled {
                    if Instant::now() >= next_heartbeat {
                        break Work::Heartbeat;
                    }
                    let _ = shared.wakeup.wait_until(&mut inbox, next_heartbeat);
                } else {
                    shared.wakeup.wait(&mut inbox);
                }
            }
        };

        match work {
            Work::Request(request) => {
                match execute_with_retry(
                    transport.as_mut(),
                    &request.sql,
                    &request.params,
                    RECONNECT_BUDGET,
                ) {
                    Ok(rows) => (request.on_ok)(rows),
                    Err(err) => (request.on_err)(err),
                }
            }
            Work::Heartbeat => {
                match execute_with_retry(transport.as_mut(), HEARTBEAT_QUERY, &[], RECONNECT_BUDGET)
                {
                    Ok(_) => tracing::debug!("heartbeat ok"),
                    Err(err) => tracing::warn!(error = %err, "heartbeat failed"),
                }
                next_heartbeat = Instant::now() + Duration::from_secs(rng.gen_range(HEARTBEAT_SECS));
            }
        }
    }
}

/// Run one query with a single reconnect-and-retry cycle.
///
/// A dead connection is reconnected before the attempt; a
/// [`BadConnection`](PgError::BadConnection) failure on the first attempt
/// reconnects (consuming the whole budget) and retries once. Anything else
/// surfaces as-is.
fn execute_with_retry(
    transport: &mut dyn PgTransport,
    sql: &str,
    params: &[String],
    reconnect_budget: Duration,
) -> Result<Box<dyn ResultSet>, PgError> {
    for attempt in 1..=2 {
        if !transport.is_healthy() {
            tracing::debug!("connection is dead; reconnecting");
            attempt_reconnect(transport, reconnect_budget)?;
        }

        match execute_query(transport, sql, params) {
            Ok(rows) => return Ok(rows),
            Err(PgError::BadConnection(message)) if attempt == 1 => {
                tracing::warn!(error = %message, "bad connection; reconnecting before retry");
                attempt_reconnect(transport, reconnect_budget)?;
            }
            Err(err) => return Err(err),
        }
    }
    Err(PgError::QueryFailed("unreachable".into()))
}

/// Submit one query and drive it through the non-blocking send/receive
/// cycle.
fn execute_query(
    transport: &mut dyn PgTransport,
    sql: &str,
    params: &[String],
) -> Result<Box<dyn ResultSet>, PgError> {
    let socket = transport
        .socket()
        .ok_or_else(|| PgError::SocketFailed("failed to get socket".into()))?;

    transport.send_query(sql, params)?;
    flush_outgoing(transport, socket)?;
    await_reply(transport, socket)?;
    collect_result(transport)
}

/// Push queued bytes until the connection reports none pending.
fn flush_outgoing(transport: &mut dyn PgTransport, socket: RawFd) -> Result<(), PgError> {
    loop {
        match transport.flush() {
            FlushStatus::Sent => return Ok(()),
            FlushStatus::Failed => {
                return Err(PgError::SocketFailed("failed to flush socket".into()));
            }
            FlushStatus::Pending => {}
        }
        match poll_fd(socket, Interest::Write, POLL_SLICE) {
            PollStatus::Ready => {}
            PollStatus::TimedOut => return Err(PgError::SocketFailed("socket timed out".into())),
            PollStatus::Failed => return Err(PgError::SocketFailed("socket poll failed".into())),
        }
    }
}

/// Wait for the reply and absorb input until a result can be read without
/// blocking.
fn await_reply(transport: &mut dyn PgTransport, socket: RawFd) -> Result<(), PgError> {
    loop {
        match poll_fd(socket, Interest::Read, POLL_SLICE) {
            PollStatus::Ready => {}
            PollStatus::TimedOut => return Err(PgError::SocketFailed("socket timed out".into())),
            PollStatus::Failed => return Err(PgError::SocketFailed("socket poll failed".into())),
        }
        transport.consume_input()?;
        if !transport.is_busy() {
            return Ok(());
        }
    }
}

/// Drain every queued record and keep the first successful one.
///
/// On a failed record the remainder is still drained so the connection is
/// clean for the next query.
fn collect_result(transport: &mut dyn PgTransport) -> Result<Box<dyn ResultSet>, PgError> {
    let mut first: Option<Box<dyn ResultSet>> = None;
    while let Some(record) = transport.next_record() {
        if record.is_ok() {
            if first.is_none() {
                first = Some(record);
            }
        } else {
            let failure = PgError::QueryFailed(record.error_message());
            while transport.next_record().is_some() {}
            return Err(failure);
        }
    }
    first.ok_or_else(|| PgError::QueryFailed("no results received".into()))
}

/// Reset the connection asynchronously within `timeout`.
fn attempt_reconnect(transport: &mut dyn PgTransport, timeout: Duration) -> Result<(), PgError> {
    if !transport.reset_start() {
        return Err(PgError::ReconnectFailed("reset failed to start".into()));
    }

    let deadline = Instant::now() + timeout;
    loop {
        let now = Instant::now();
        if now >= deadline {
            return Err(PgError::ReconnectFailed("timed out".into()));
        }

        let interest = match transport.reset_poll() {
            ResetPolling::Ok => {
                transport
                    .set_nonblocking()
                    .map_err(PgError::ReconnectFailed)?;
                tracing::debug!("reconnected");
                return Ok(());
            }
            ResetPolling::Failed => {
                return Err(PgError::ReconnectFailed("reset polling failed".into()));
            }
            ResetPolling::Reading => Interest::Read,
            ResetPolling::Writing => Interest::Write,
        };

        let socket = transport
            .socket()
            .ok_or_else(|| PgError::ReconnectFailed("failed to get socket".into()))?;
        match poll_fd(socket, interest, deadline - now) {
            PollStatus::Ready => {}
            PollStatus::TimedOut | PollStatus::Failed => {
                return Err(PgError::ReconnectFailed("socket poll failed".into()));
            }
        }
    }
}
