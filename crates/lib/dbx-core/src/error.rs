use std::fmt;

use thiserror::Error;

const REDACTED: &str = "[REDACTED]";

/// Whether a remote failure is worth retrying by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClass {
    /// Timeouts, throttling, 5xx and transport failures.
    Transient,
    /// Caller-attributable failures such as 4xx responses.
    Permanent,
}

impl RetryClass {
    #[must_use]
    pub const fn from_status(status: u16) -> Self {
        if status == 408 || status == 429 || status >= 500 {
            Self::Transient
        } else {
            Self::Permanent
        }
    }
}

impl fmt::Display for RetryClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transient => f.write_str("transient"),
            Self::Permanent => f.write_str("permanent"),
        }
    }
}

/// One argument problem found by the validator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldIssue {
    /// JSON pointer style path of the offending field, `/` for the root.
    pub path: String,
    /// Expected type or shape, when the schema declares one.
    pub expected: Option<String>,
    pub detail: String,
}

impl FieldIssue {
    #[must_use]
    pub fn new(path: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            expected: None,
            detail: detail.into(),
        }
    }

    #[must_use]
    pub fn with_expected(mut self, expected: impl Into<String>) -> Self {
        self.expected = Some(expected.into());
        self
    }
}

impl fmt::Display for FieldIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.detail)?;
        if let Some(expected) = &self.expected {
            write!(f, " (expected {expected})")?;
        }
        Ok(())
    }
}

/// Arguments rejected before execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub issues: Vec<FieldIssue>,
}

impl ValidationError {
    #[must_use]
    pub const fn new(issues: Vec<FieldIssue>) -> Self {
        Self { issues }
    }

    #[must_use]
    pub fn single(issue: FieldIssue) -> Self {
        Self {
            issues: vec![issue],
        }
    }

    /// Paths of every offending field.
    #[must_use]
    pub fn paths(&self) -> Vec<&str> {
        self.issues.iter().map(|issue| issue.path.as_str()).collect()
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, issue) in self.issues.iter().enumerate() {
            if index > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// Failure taxonomy shared by every tool.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Missing or invalid connection settings. Never retried.
    #[error("{0}")]
    Configuration(String),
    #[error("{message}")]
    RemoteService {
        retry: RetryClass,
        status: Option<u16>,
        message: String,
    },
    /// A successful remote response had an unexpected structure.
    #[error("{0}")]
    DataShape(String),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("unknown tool: {0}")]
    NotFound(String),
    #[error("{operation} did not reach a terminal state after {attempts} attempts (last status: {last_status})")]
    Timeout {
        operation: String,
        attempts: u32,
        last_status: String,
    },
    #[error("{0} was cancelled")]
    Cancelled(String),
    #[error("{0}")]
    Unknown(String),
}

/// Discriminant of [`ToolError`], used as the rendered prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolErrorKind {
    Configuration,
    RemoteService,
    DataShape,
    Validation,
    NotFound,
    Timeout,
    Cancelled,
    Unknown,
}

impl ToolErrorKind {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Configuration => "ConfigurationError",
            Self::RemoteService => "RemoteServiceError",
            Self::DataShape => "DataShapeError",
            Self::Validation => "ValidationError",
            Self::NotFound => "NotFoundError",
            Self::Timeout => "TimeoutError",
            Self::Cancelled => "CancelledError",
            Self::Unknown => "UnknownError",
        }
    }
}

impl fmt::Display for ToolErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl ToolError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Remote failure classified by its HTTP-equivalent status.
    pub fn remote_status(status: u16, message: impl Into<String>) -> Self {
        Self::RemoteService {
            retry: RetryClass::from_status(status),
            status: Some(status),
            message: message.into(),
        }
    }

    /// Connection, timeout or other transport-level remote failure.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::RemoteService {
            retry: RetryClass::Transient,
            status: None,
            message: message.into(),
        }
    }

    /// Remote failure reported inside an otherwise successful response.
    pub fn remote_permanent(message: impl Into<String>) -> Self {
        Self::RemoteService {
            retry: RetryClass::Permanent,
            status: None,
            message: message.into(),
        }
    }

    pub fn data_shape(message: impl Into<String>) -> Self {
        Self::DataShape(message.into())
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::Unknown(message.into())
    }

    #[must_use]
    pub const fn kind(&self) -> ToolErrorKind {
        match self {
            Self::Configuration(_) => ToolErrorKind::Configuration,
            Self::RemoteService { .. } => ToolErrorKind::RemoteService,
            Self::DataShape(_) => ToolErrorKind::DataShape,
            Self::Validation(_) => ToolErrorKind::Validation,
            Self::NotFound(_) => ToolErrorKind::NotFound,
            Self::Timeout { .. } => ToolErrorKind::Timeout,
            Self::Cancelled(_) => ToolErrorKind::Cancelled,
            Self::Unknown(_) => ToolErrorKind::Unknown,
        }
    }

    /// True for failures a caller may retry unchanged.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RemoteService {
                retry: RetryClass::Transient,
                ..
            } | Self::Timeout { .. }
        )
    }

    /// Renders a single-line, kind-prefixed message with secrets scrubbed.
    #[must_use]
    pub fn render(&self, redactor: &Redactor) -> String {
        let detail = match self {
            Self::RemoteService {
                retry,
                status: Some(status),
                message,
            } => format!("({retry}, status {status}) {message}"),
            Self::RemoteService {
                retry,
                status: None,
                message,
            } => format!("({retry}) {message}"),
            other => other.to_string(),
        };
        let line = detail.split_whitespace().collect::<Vec<_>>().join(" ");
        redactor.redact(&format!("{}: {line}", self.kind()))
    }
}

impl From<serde_json::Error> for ToolError {
    fn from(err: serde_json::Error) -> Self {
        Self::DataShape(format!("unexpected response structure: {err}"))
    }
}

/// Scrubs configured secret values out of rendered text.
#[derive(Clone, Default)]
pub struct Redactor {
    secrets: Vec<String>,
}

impl Redactor {
    pub fn new<I, S>(secrets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let secrets = secrets
            .into_iter()
            .map(Into::into)
            .filter(|secret| !secret.trim().is_empty())
            .collect();
        Self { secrets }
    }

    #[must_use]
    pub fn redact(&self, text: &str) -> String {
        self.secrets
            .iter()
            .fold(text.to_string(), |acc, secret| acc.replace(secret.as_str(), REDACTED))
    }
}

impl fmt::Debug for Redactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Redactor")
            .field("secrets", &self.secrets.len())
            .finish()
    }
}
