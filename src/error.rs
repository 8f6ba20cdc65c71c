use std::fmt::{self, Display};
use std::io::Error as IoError;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

/// Network-level failure, distinct from a valid HTTP response with an
/// unexpected status.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("failed to read response: {0}")]
    Read(String),
}

impl TransportError {
    /// Whether retrying the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::InvalidRequest(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "INVALID_REQUEST",
            Self::Connect(_) => "CONNECT_ERROR",
            Self::Timeout(_) => "TIMEOUT",
            Self::Read(_) => "READ_ERROR",
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return Self::Timeout(err.to_string());
        }
        if err.is_builder() {
            return Self::InvalidRequest(err.to_string());
        }
        if err.is_connect() {
            return Self::Connect(err.to_string());
        }

        let message = err.to_string();
        let lowered = message.to_ascii_lowercase();
        if lowered.contains("dns") || lowered.contains("failed to lookup address") {
            return Self::Connect(message);
        }

        Self::Read(message)
    }
}

/// A single mismatch between the documented contract and what the service
/// returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContractViolation {
    pub condition: String,
    pub expected: String,
    pub actual: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl ContractViolation {
    pub fn new(
        condition: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self {
            condition: condition.into(),
            expected: expected.into(),
            actual: actual.into(),
            note: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    /// Prefix the condition with a parent path, e.g. `[3]` or `rating`.
    pub fn nested_under(mut self, parent: &str) -> Self {
        self.condition = join_path(parent, &self.condition);
        self
    }
}

impl Display for ContractViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: expected {}, got {}",
            self.condition, self.expected, self.actual
        )?;
        if let Some(note) = &self.note {
            write!(f, " ({note})")?;
        }
        Ok(())
    }
}

impl std::error::Error for ContractViolation {}

pub(crate) fn join_path(parent: &str, child: &str) -> String {
    if parent.is_empty() {
        child.to_string()
    } else if child.is_empty() {
        parent.to_string()
    } else if child.starts_with('[') {
        format!("{parent}{child}")
    } else {
        format!("{parent}.{child}")
    }
}

/// Non-empty set of violations produced by one check.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{} contract violation(s): {}", .0.len(), render_list(.0))]
pub struct Violations(pub Vec<ContractViolation>);

impl Violations {
    pub fn single(violation: ContractViolation) -> Self {
        Self(vec![violation])
    }

    pub fn into_inner(self) -> Vec<ContractViolation> {
        self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = &ContractViolation> {
        self.0.iter()
    }
}

impl From<ContractViolation> for Violations {
    fn from(violation: ContractViolation) -> Self {
        Self::single(violation)
    }
}

fn render_list(items: &[ContractViolation]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// A pre-condition request failed, so the scenario under test could not run.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SetupFailure {
    #[error("setup request {request} failed: {source}")]
    Transport {
        request: String,
        source: TransportError,
    },

    #[error("setup request {request} returned {actual}, expected {expected}")]
    UnexpectedStatus {
        request: String,
        expected: u16,
        actual: u16,
    },

    #[error("setup request {request} returned an unusable body: {reason}")]
    InvalidBody { request: String, reason: String },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file `{}`: {source}", path.display())]
    Read { path: PathBuf, source: IoError },

    #[error("failed to parse config file `{}`: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: String, reason: String },
}

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] IoError),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to start stub server on {addr}: {source}")]
    StubBind { addr: String, source: IoError },

    #[error("failed to build HTTP client: {0}")]
    Client(String),

    #[error("{0}")]
    Usage(String),
}

impl HarnessError {
    /// Process exit code: 2 for configuration and usage mistakes, 1 otherwise.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) | Self::Usage(_) => 2,
            _ => 1,
        }
    }
}
