use std::fmt;

/// Which side of the backend a target lives on. Devices take commands,
/// groups take properties.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TargetKind {
    Device,
    Group,
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetKind::Device => write!(f, "device"),
            TargetKind::Group => write!(f, "group"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Network or HTTP level failure talking to the backend proxy. Covers
    /// timeouts, non-2xx responses, undecodable bodies and envelopes that
    /// report `success: false`.
    #[error("{method} {path} failed{}: {reason}", status_suffix(.status))]
    TransportFailure {
        method: &'static str,
        path: String,
        status: Option<u16>,
        reason: String,
    },

    #[error("malformed colour encoding {input:?}: {reason}")]
    MalformedColorEncoding { input: String, reason: &'static str },

    #[error("invalid value for {code}: {reason}")]
    InvalidStatusValue { code: String, reason: String },

    #[error("unknown {kind} {id}")]
    UnknownTarget { kind: TargetKind, id: String },
}

fn status_suffix(status: &Option<u16>) -> String {
    match status {
        Some(status) => format!(" with status {status}"),
        None => String::new(),
    }
}

impl Error {
    pub(crate) fn transport(
        method: &'static str,
        path: impl Into<String>,
        status: Option<u16>,
        reason: impl ToString,
    ) -> Self {
        Error::TransportFailure {
            method,
            path: path.into(),
            status,
            reason: reason.to_string(),
        }
    }

    pub(crate) fn invalid_value(code: &str, reason: impl Into<String>) -> Self {
        Error::InvalidStatusValue {
            code: code.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
