//! Error type for the driver layer

use thiserror::Error;

/// Failure class of a [`PgError`].
///
/// `Busy`, `FlushFailed`, `PollFailed`, and `ConsumeFailed` are reserved:
/// declared for future precision, emitted by no current path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PgErrorKind {
    /// The initial connect failed.
    ConnectionFailed,
    /// A reconnect attempt did not complete within its budget.
    ReconnectFailed,
    /// The server rejected the query, or no result arrived.
    QueryFailed,
    /// Reserved.
    FlushFailed,
    /// Reserved.
    PollFailed,
    /// Reserved.
    ConsumeFailed,
    /// A socket-level operation failed or timed out.
    SocketFailed,
    /// Reserved.
    Busy,
    /// A caller-visible deadline expired.
    Timeout,
    /// The worker is stopping; the request was not executed.
    ShuttingDown,
    /// The connection is unusable; triggers one reconnect-and-retry cycle.
    BadConnection,
}

/// Error produced by the PostgreSQL driver.
///
/// The variant is the kind, the payload the advisory message. Kinds drive
/// control flow - [`BadConnection`](Self::BadConnection) is the one that
/// triggers the worker's reconnect-and-retry cycle.
#[derive(Debug, Clone, Error)]
pub enum PgError {
    #[error("postgres connection failed: {0}")]
    ConnectionFailed(String),

    #[error("postgres reconnect failed: {0}")]
    ReconnectFailed(String),

    #[error("postgres query failed: {0}")]
    QueryFailed(String),

    #[error("postgres flush failed: {0}")]
    FlushFailed(String),

    #[error("postgres poll failed: {0}")]
    PollFailed(String),

    #[error("postgres consume failed: {0}")]
    ConsumeFailed(String),

    #[error("postgres socket failed: {0}")]
    SocketFailed(String),

    #[error("postgres connection busy: {0}")]
    Busy(String),

    #[error("postgres timed out: {0}")]
    Timeout(String),

    #[error("postgres shutting down: {0}")]
    ShuttingDown(String),

    #[error("postgres bad connection: {0}")]
    BadConnection(String),
}

impl PgError {
    /// The failure class, independent of the message.
    pub fn kind(&self) -> PgErrorKind {
        match self {
            Self::ConnectionFailed(_) => PgErrorKind::ConnectionFailed,
            Self::ReconnectFailed(_) => PgErrorKind::ReconnectFailed,
            Self::QueryFailed(_) => PgErrorKind::QueryFailed,
            Self::FlushFailed(_) => PgErrorKind::FlushFailed,
            Self::PollFailed(_) => PgErrorKind::PollFailed,
            Self::ConsumeFailed(_) => PgErrorKind::ConsumeFailed,
            Self::SocketFailed(_) => PgErrorKind::SocketFailed,
            Self::Busy(_) => PgErrorKind::Busy,
            Self::Timeout(_) => PgErrorKind::Timeout,
            Self::ShuttingDown(_) => PgErrorKind::ShuttingDown,
            Self::BadConnection(_) => PgErrorKind::BadConnection,
        }
    }

    /// The detail message attached at the failure site.
    pub fn message(&self) -> &str {
        match self {
            Self::ConnectionFailed(msg)
            | Self::ReconnectFailed(msg)
            | Self::QueryFailed(msg)
            | Self::FlushFailed(msg)
            | Self::PollFailed(msg)
            | Self::ConsumeFailed(msg)
            | Self::SocketFailed(msg)
            | Self::Busy(msg)
            | Self::Timeout(msg)
            | Self::ShuttingDown(msg)
            | Self::BadConnection(msg) => msg,
        }
    }
}
