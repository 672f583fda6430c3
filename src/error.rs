use std::fmt;
use thiserror::Error;

// --------------------------------------------------------------------------------------------------------------

/// The two response bodies that mean the Eagle gateway is wedged and needs a power cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayFaultKind {
    RequestTimeout,
    ServiceUnavailable,
}

impl GatewayFaultKind {
    /// Text the gateway embeds in its reply when it is in this state.
    pub fn signature(&self) -> &'static str {
        match self {
            GatewayFaultKind::RequestTimeout     => "Request Timeout",
            GatewayFaultKind::ServiceUnavailable => "Service Unavailable",
        }
    }

    /// Classify a reply body. Request Timeout wins if both appear.
    pub fn detect(body: &str) -> Option<Self> {
        [GatewayFaultKind::RequestTimeout, GatewayFaultKind::ServiceUnavailable]
            .into_iter()
            .find(|kind| body.contains(kind.signature()))
    }
}

impl fmt::Display for GatewayFaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.signature())
    }
}

// --------------------------------------------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ReadFailure {
    #[error("meter transport error: {0}")]
    Transport(String),
    #[error("gateway fault: {0}")]
    GatewayFault(GatewayFaultKind),
    #[error("unparsable meter response: {0}")]
    UnparsableResponse(String),
}

#[derive(Debug, Error)]
pub enum ActuationFailure {
    #[error("hub transport error: {0}")]
    Transport(String),
    #[error("hub rejected command (HTTP {status})")]
    Rejected { status: u16 },
    #[error("switch did not confirm the requested state")]
    Unconfirmed,
}

#[derive(Debug, Error)]
pub enum NotificationFailure {
    #[error("invalid mail address '{0}'")]
    Address(String),
    #[error("failed to build message: {0}")]
    Build(String),
    #[error("mail transport error: {0}")]
    Transport(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration file '{path}': {source}")]
    Read {
        path:   String,
        source: std::io::Error,
    },
    #[error("failed to parse configuration file '{path}': {source}")]
    Parse {
        path:   String,
        source: serde_json::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("could not switch the charger off after {attempts} attempts: {source}")]
    SwitchOff {
        attempts: u32,
        source:   ActuationFailure,
    },
    #[error("mail notifier could not be built: {0}")]
    Notifier(#[from] NotificationFailure),
    #[error("http client could not be built: {0}")]
    Http(#[from] reqwest::Error),
}

// --------------------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_request_timeout() {
        let body = "<html><body>408 Request Timeout</body></html>";
        assert_eq!(GatewayFaultKind::detect(body), Some(GatewayFaultKind::RequestTimeout));
    }

    #[test]
    fn detects_service_unavailable() {
        let body = "HTTP/1.1 503 Service Unavailable";
        assert_eq!(GatewayFaultKind::detect(body), Some(GatewayFaultKind::ServiceUnavailable));
    }

    #[test]
    fn timeout_wins_when_both_signatures_present() {
        let body = "Service Unavailable after Request Timeout";
        assert_eq!(GatewayFaultKind::detect(body), Some(GatewayFaultKind::RequestTimeout));
    }

    #[test]
    fn unrelated_body_is_not_a_fault() {
        assert_eq!(GatewayFaultKind::detect("<Error>Unknown command</Error>"), None);
    }
}
