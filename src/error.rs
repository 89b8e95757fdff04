//! Error types for the TN3270 protocol and display core.
//!
//! Parser-level tolerances (a truncated operand, an unrecognized write
//! command or order) never surface here — they are handled in place by
//! `stream::process` and never propagate past it. Only transport-fatal
//! conditions get a typed error.

use std::error::Error as StdError;
use std::fmt;
use std::io;

/// Top-level error type for connection operations.
#[derive(Debug)]
pub enum Error {
    /// Failed or aborted connection attempt.
    Connect(ConnectError),
    /// The peer closed the connection.
    PeerClosed,
}

/// Connection-establishment and transport errors.
#[derive(Debug)]
pub enum ConnectError {
    /// The connect attempt exceeded the 30s budget.
    Timeout { host: String, port: u16 },
    /// DNS resolution for the host failed.
    Dns { host: String },
    /// The peer actively refused the connection.
    Refused { host: String, port: u16 },
    /// Any other transport-level failure (socket I/O, TLS handshake).
    Transport { message: String },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Connect(err) => write!(f, "connect error: {err}"),
            Error::PeerClosed => write!(f, "peer closed the connection"),
        }
    }
}

impl fmt::Display for ConnectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectError::Timeout { host, port } => {
                write!(f, "connect timeout to {host}:{port}")
            }
            ConnectError::Dns { host } => write!(f, "DNS resolution failed for {host}"),
            ConnectError::Refused { host, port } => {
                write!(f, "connection refused by {host}:{port}")
            }
            ConnectError::Transport { message } => write!(f, "transport error: {message}"),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Error::Connect(err) => Some(err),
            Error::PeerClosed => None,
        }
    }
}

impl StdError for ConnectError {}

impl From<ConnectError> for Error {
    fn from(err: ConnectError) -> Self {
        Error::Connect(err)
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::TimedOut => Error::Connect(ConnectError::Timeout {
                host: "unknown".to_string(),
                port: 0,
            }),
            io::ErrorKind::ConnectionRefused => Error::Connect(ConnectError::Refused {
                host: "unknown".to_string(),
                port: 0,
            }),
            io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::UnexpectedEof => Error::PeerClosed,
            _ => Error::Connect(ConnectError::Transport {
                message: err.to_string(),
            }),
        }
    }
}

impl From<rustls::Error> for Error {
    fn from(err: rustls::Error) -> Self {
        Error::Connect(ConnectError::Transport {
            message: err.to_string(),
        })
    }
}

/// Result alias for connection operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_timeout_displays_host_and_port() {
        let err = Error::Connect(ConnectError::Timeout {
            host: "mainframe.example.com".to_string(),
            port: 23,
        });
        assert_eq!(
            err.to_string(),
            "connect error: connect timeout to mainframe.example.com:23"
        );
    }

    #[test]
    fn io_error_reset_becomes_peer_closed() {
        let io_err = io::Error::from(io::ErrorKind::ConnectionReset);
        let err: Error = io_err.into();
        assert!(matches!(err, Error::PeerClosed));
    }

    #[test]
    fn io_error_timeout_maps_to_connect_timeout() {
        let io_err = io::Error::from(io::ErrorKind::TimedOut);
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Connect(ConnectError::Timeout { .. })));
    }
}
