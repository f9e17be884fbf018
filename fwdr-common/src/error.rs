use thiserror::Error;

/// Errors raised while driving the SMTP wire protocol itself (line reads, command parsing).
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed command line: {0}")]
    MalformedCommand(String),

    #[error("message exceeded maximum size of {limit} bytes")]
    MessageTooLarge { limit: usize },

    #[error("connection closed by peer")]
    ConnectionClosed,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ProtocolError {
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(self, Self::MalformedCommand(_) | Self::MessageTooLarge { .. })
    }
}

/// Errors raised by a single connection's session driver loop.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("session timed out after {0}s of inactivity")]
    Timeout(u64),

    #[error("shutdown requested")]
    Shutdown,
}

impl SessionError {
    #[must_use]
    pub const fn is_shutdown(&self) -> bool {
        matches!(self, Self::Shutdown)
    }

    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::Protocol(ProtocolError::MalformedCommand(_)))
    }
}

/// Errors raised while evaluating the rule engine against one message (§4.2).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RuleEvalError {
    #[error("unknown predicate tag: {0}")]
    UnknownPredicate(String),

    #[error("unknown field: {0}")]
    UnknownField(String),

    #[error("malformed TIME_AFTER value: {0}")]
    MalformedTimeAfter(String),

    #[error("webhook action requires exactly 2 values (endpoint, secret), got {0}")]
    InvalidWebhookArity(usize),

    #[error("failed to extract field candidates: {0}")]
    FieldExtraction(String),
}

/// The outcome of the body handler's per-message processing pipeline (§4.7), tagged with
/// the literal SMTP reply each variant maps to (§6).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("451 4.3.0 Internal server errror")]
    Processing(#[source] Option<BoxError>),

    #[error("451 4.5.2 Internal server errror")]
    Parse(#[source] mailparse::MailParseError),

    #[error("550 5.7.28 Our system has detected that this message is likely suspicious.")]
    Spam,

    #[error("550 4.4.6 Routing error")]
    Loop { count: usize, limit: usize },

    #[error("451 4.3.5 Internal server errror")]
    Config(#[source] BoxError),

    #[error("450 4.4.2 Temporarily rate limited; suspicious behavior")]
    RateLimited,
}

impl PipelineError {
    /// The exact line that must be written back to the SMTP client, per §6's reply table.
    #[must_use]
    pub fn smtp_reply(&self) -> String {
        self.to_string()
    }
}

/// Errors raised while accepting connections on a listener.
#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Accept(#[from] std::io::Error),
}

/// Fatal top-level errors, surfaced from `main` before/while the controller is running.
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error("a listener task panicked or was cancelled: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_error_reply_matches_spec_table() {
        assert_eq!(
            PipelineError::RateLimited.smtp_reply(),
            "450 4.4.2 Temporarily rate limited; suspicious behavior"
        );
        assert_eq!(
            PipelineError::Loop { count: 30, limit: 25 }.smtp_reply(),
            "550 4.4.6 Routing error"
        );
        assert_eq!(PipelineError::Spam.smtp_reply(), "550 5.7.28 Our system has detected that this message is likely suspicious.");
    }

    #[test]
    fn session_error_recoverability() {
        let err = SessionError::Protocol(ProtocolError::MalformedCommand("???".into()));
        assert!(err.is_recoverable());
        assert!(!SessionError::Shutdown.is_recoverable());
        assert!(SessionError::Shutdown.is_shutdown());
    }

    #[test]
    fn error_source_chain_is_preserved() {
        use std::error::Error as _;
        let io_err = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        let protocol: ProtocolError = io_err.into();
        let session: SessionError = protocol.into();
        assert!(session.source().is_some());
    }
}
