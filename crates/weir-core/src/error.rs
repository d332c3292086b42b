//! Error type for the factory and pool layer

use thiserror::Error;

/// Failure class of a [`ConnectionError`], for callers that branch on what
/// went wrong rather than on the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionErrorKind {
    /// The driver could not establish a session.
    ConnectionFailed,
    /// Required configuration is absent.
    MissingConfig,
    /// No constructor is registered for the requested connection type.
    FactoryNotRegistered,
    /// The operation's deadline expired.
    Timeout,
    /// A socket-level operation failed.
    SocketFailed,
    /// The server rejected the credentials.
    AuthFailed,
}

/// Error produced by the factory registry and the connection pool.
///
/// The variant is the kind; the payload is an advisory human-readable
/// message. Kinds drive control flow, messages end up in logs.
#[derive(Debug, Clone, Error)]
pub enum ConnectionError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("missing configuration: {0}")]
    MissingConfig(String),

    #[error("no factory registered: {0}")]
    FactoryNotRegistered(String),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("socket failed: {0}")]
    SocketFailed(String),

    #[error("authentication failed: {0}")]
    AuthFailed(String),
}

impl ConnectionError {
    /// The failure class, independent of the message.
    pub fn kind(&self) -> ConnectionErrorKind {
        match self {
            Self::ConnectionFailed(_) => ConnectionErrorKind::ConnectionFailed,
            Self::MissingConfig(_) => ConnectionErrorKind::MissingConfig,
            Self::FactoryNotRegistered(_) => ConnectionErrorKind::FactoryNotRegistered,
            Self::Timeout(_) => ConnectionErrorKind::Timeout,
            Self::SocketFailed(_) => ConnectionErrorKind::SocketFailed,
            Self::AuthFailed(_) => ConnectionErrorKind::AuthFailed,
        }
    }

    /// The detail message attached at the failure site.
    pub fn message(&self) -> &str {
        match self {
            Self::ConnectionFailed(msg)
            | Self::MissingConfig(msg)
            | Self::FactoryNotRegistered(msg)
            | Self::Timeout(msg)
            | Self::SocketFailed(msg)
            | Self::AuthFailed(msg) => msg,
        }
    }
}

/// Result alias for factory and pool operations.
pub type Result<T> = std::result::Result<T, ConnectionError>;
