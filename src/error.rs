use std::fmt;

use reqwest::StatusCode;

#[derive(Debug)]
pub enum Error {
    Http(reqwest::Error),
    /// Remote service unreachable or shedding load, reported by a non-HTTP facade.
    Transport { status: Option<u16>, message: String },
    Decode(serde_json::Error),
    /// Response had an unexpected shape.
    Api(String),
    UnknownSystem(String),
    /// A status zone without a config zone (or vice versa). Caller error.
    ZoneMismatch { serial: String, zone_id: String },
    UnknownActivity { zone_id: String, activity: String },
    AlreadyStarted,
    Io(std::io::Error),
}

/// Retry policy bucket for a failed cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Service down or rate limiting; retry soon.
    Transport,
    /// Unknown duration; keep the regular interval.
    Unclassified,
}

impl ErrorClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorClass::Transport => "transport",
            ErrorClass::Unclassified => "unclassified",
        }
    }
}

impl Error {
    pub fn class(&self) -> ErrorClass {
        match self {
            Error::Transport { .. } => ErrorClass::Transport,
            Error::Http(e) => classify_http(e),
            _ => ErrorClass::Unclassified,
        }
    }

    pub fn is_transport(&self) -> bool {
        self.class() == ErrorClass::Transport
    }
}

fn classify_http(e: &reqwest::Error) -> ErrorClass {
    if e.is_connect() || e.is_timeout() {
        return ErrorClass::Transport;
    }
    match e.status() {
        Some(s) if s.is_server_error() => ErrorClass::Transport,
        Some(StatusCode::TOO_MANY_REQUESTS | StatusCode::REQUEST_TIMEOUT) => ErrorClass::Transport,
        _ => ErrorClass::Unclassified,
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Http(e) => write!(f, "HTTP error: {e}"),
            Error::Transport {
                status: Some(status),
                message,
            } => write!(f, "service unavailable ({status}): {message}"),
            Error::Transport {
                status: None,
                message,
            } => write!(f, "service unavailable: {message}"),
            Error::Decode(e) => write!(f, "decode error: {e}"),
            Error::Api(msg) => write!(f, "unexpected response: {msg}"),
            Error::UnknownSystem(serial) => write!(f, "unknown system: {serial}"),
            Error::ZoneMismatch { serial, zone_id } => {
                write!(f, "zone {zone_id} of system {serial} has no matching status/config entry")
            }
            Error::UnknownActivity { zone_id, activity } => {
                write!(f, "zone {zone_id} has no activity {activity}")
            }
            Error::AlreadyStarted => write!(f, "coordinator already started"),
            Error::Io(e) => write!(f, "IO error: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Http(e) => Some(e),
            Error::Decode(e) => Some(e),
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Http(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Decode(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_transport_is_transport() {
        let err = Error::Transport {
            status: Some(503),
            message: "maintenance".into(),
        };
        assert_eq!(err.class(), ErrorClass::Transport);
        assert_eq!(err.to_string(), "service unavailable (503): maintenance");
    }

    #[test]
    fn decode_and_shape_errors_are_unclassified() {
        let decode = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert_eq!(Error::from(decode).class(), ErrorClass::Unclassified);
        assert_eq!(Error::Api("no systems key".into()).class(), ErrorClass::Unclassified);
    }

    #[test]
    fn zone_mismatch_message() {
        let err = Error::ZoneMismatch {
            serial: "S1".into(),
            zone_id: "2".into(),
        };
        assert!(err.to_string().contains("zone 2 of system S1"));
    }
}
