//! Server error types.

use std::io;

use thiserror::Error;

pub type ServerResult<T> = std::result::Result<T, ServerError>;

/// Error type for server startup and operation.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The listener could not be bound.
    #[error("Failed to bind to {address}: {source}")]
    BindError {
        address: String,
        #[source]
        source: io::Error,
    },

    /// The serve loop failed after startup.
    #[error("Runtime error: {0}")]
    Runtime(#[source] io::Error),

    /// Certificate or key files are unusable.
    #[error("TLS certificate error: {0}")]
    #[cfg_attr(not(feature = "tls"), allow(dead_code))]
    TlsCertificate(String),
}

impl ServerError {
    /// Keeps the whole `anyhow` cause chain in the message.
    pub fn invalid_config(err: &anyhow::Error) -> Self {
        Self::InvalidConfig(format!("{err:#}"))
    }

    pub fn bind_error(address: impl ToString, source: io::Error) -> Self {
        Self::BindError {
            address: address.to_string(),
            source,
        }
    }

    /// Hint printed next to the error in the startup log.
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::InvalidConfig(_) => {
                Some("Check the command-line arguments and environment variables")
            }
            Self::BindError { source, .. } => match source.kind() {
                io::ErrorKind::PermissionDenied => {
                    Some("Try using a port above 1024 or run with appropriate privileges")
                }
                io::ErrorKind::AddrInUse => Some(
                    "The port is already in use. Try a different port or stop the conflicting service",
                ),
                io::ErrorKind::AddrNotAvailable => {
                    Some("The address is not available. Check network interface configuration")
                }
                _ => Some("Check network configuration and firewall settings"),
            },
            Self::Runtime(err) => match err.kind() {
                io::ErrorKind::InvalidData => {
                    Some("Check that certificate files are in correct PEM format")
                }
                io::ErrorKind::Interrupted => Some("The operation was interrupted, you may retry"),
                _ => None,
            },
            Self::TlsCertificate(_) => {
                Some("Verify certificate and key files exist and are in correct PEM format")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_errors_have_suggestions() {
        let err = ServerError::bind_error(
            "127.0.0.1:80",
            io::Error::new(io::ErrorKind::AddrInUse, "address in use"),
        );

        assert!(err.to_string().contains("127.0.0.1:80"));
        assert!(err.suggestion().is_some_and(|s| s.contains("already in use")));
    }

    #[test]
    fn invalid_config_keeps_the_cause_chain() {
        let err = anyhow::anyhow!("port 80 is below 1024").context("invalid server configuration");
        let err = ServerError::invalid_config(&err);

        assert!(err.to_string().contains("port 80 is below 1024"));
        assert!(err.suggestion().is_some());
    }
}
