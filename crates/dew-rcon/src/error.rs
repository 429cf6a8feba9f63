use std::time::Duration;

/// Failures of one server's session. None of these are fatal to the process.
#[derive(Clone, Debug, thiserror::Error)]
pub enum RconError {
    // Connection: the session never reached streaming
    #[error("dial failed: {0}")]
    Dial(String),
    #[error("handshake timed out after {0:?}")]
    HandshakeTimeout(Duration),
    #[error("sending password failed: {0}")]
    Auth(String),

    // Control channel, after streaming started
    #[error("read failed: {0}")]
    Read(String),
    #[error("control channel closed: {0}")]
    Closed(String),

    // Stats poll, recovered locally by the poller
    #[error("stats request failed: {0}")]
    StatsRequest(String),
    #[error("stats endpoint returned status {0}")]
    StatsStatus(u16),
    #[error("stats body could not be decoded: {0}")]
    StatsDecode(String),
    #[error("stats request timed out after {0:?}")]
    StatsTimeout(Duration),
}

impl RconError {
    /// The session could not be established at all.
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Self::Dial(_) | Self::HandshakeTimeout(_) | Self::Auth(_))
    }

    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::Dial(_) => "dial",
            Self::HandshakeTimeout(_) => "handshake_timeout",
            Self::Auth(_) => "auth",
            Self::Read(_) => "read",
            Self::Closed(_) => "closed",
            Self::StatsRequest(_) => "stats_request",
            Self::StatsStatus(_) => "stats_status",
            Self::StatsDecode(_) => "stats_decode",
            Self::StatsTimeout(_) => "stats_timeout",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_classification() {
        assert!(RconError::Dial("refused".into()).is_connection_error());
        assert!(RconError::HandshakeTimeout(Duration::from_secs(45)).is_connection_error());
        assert!(RconError::Auth("broken pipe".into()).is_connection_error());
        assert!(!RconError::Read("reset".into()).is_connection_error());
        assert!(!RconError::Closed("bye".into()).is_connection_error());
    }

    #[test]
    fn error_kind_strings() {
        assert_eq!(RconError::Auth("x".into()).error_kind(), "auth");
        assert_eq!(RconError::StatsStatus(404).error_kind(), "stats_status");
        assert_eq!(
            RconError::HandshakeTimeout(Duration::from_secs(1)).error_kind(),
            "handshake_timeout"
        );
    }

    #[test]
    fn display_includes_detail() {
        assert_eq!(
            RconError::StatsStatus(503).to_string(),
            "stats endpoint returned status 503"
        );
    }
}
