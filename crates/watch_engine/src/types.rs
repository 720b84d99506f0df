use std::fmt;

use thiserror::Error;
use watch_core::CycleStage;

use crate::persist::PersistError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("login failed: invalid credentials")]
    InvalidCredentials,
    #[error("login form not usable: {0}")]
    LoginForm(String),
    #[error("login page returned http status {0}")]
    HttpStatus(u16),
    #[error("login timed out")]
    Timeout,
    #[error("network error during login: {0}")]
    Network(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct FetchError {
    pub kind: FailureKind,
    pub message: String,
}

impl FetchError {
    pub(crate) fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    InvalidSelector,
    HttpStatus(u16),
    Timeout,
    TooLarge { max_bytes: u64, actual: Option<u64> },
    UnsupportedContentType { content_type: String },
    ContentNotReady { missing: Vec<String> },
    Network,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::InvalidSelector => write!(f, "invalid selector"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::TooLarge { max_bytes, actual } => {
                write!(f, "response too large (max {max_bytes}, actual {actual:?})")
            }
            FailureKind::UnsupportedContentType { content_type } => {
                write!(f, "unsupported content type {content_type}")
            }
            FailureKind::ContentNotReady { missing } => {
                write!(f, "content not ready (missing {})", missing.join(", "))
            }
            FailureKind::Network => write!(f, "network error"),
        }
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid mail address {address:?}: {message}")]
    Address { address: String, message: String },
    #[error("could not build message: {0}")]
    Message(String),
    #[error("smtp delivery failed: {0}")]
    Smtp(String),
}

/// Why a cycle was abandoned.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),
    #[error("reading previous snapshot failed: {0}")]
    SnapshotRead(#[source] PersistError),
    #[error("writing snapshot failed: {0}")]
    SnapshotWrite(#[source] PersistError),
}

impl CycleError {
    /// Stage the cycle was in when it failed.
    pub fn stage(&self) -> CycleStage {
        match self {
            CycleError::Auth(_) => CycleStage::Authenticating,
            CycleError::Fetch(_) => CycleStage::Fetching,
            CycleError::SnapshotRead(_) => CycleStage::Diffing,
            CycleError::SnapshotWrite(_) => CycleStage::Persisting,
        }
    }
}
