use std::fmt;

/// Failure of one collaborator call. Never aborts a run: callers turn it into
/// a block reason or a fallback.
#[derive(Debug, Clone, PartialEq)]
pub enum CollaboratorError {
    /// Capability not configured.
    Disabled,
    /// The call did not complete in time.
    Timeout(String),
    /// The collaborator answered but had nothing.
    NotFound,
    /// Any other failure (network, provider error, bad payload).
    Failed(String),
}

impl CollaboratorError {
    pub fn is_disabled(&self) -> bool {
        matches!(self, Self::Disabled)
    }
}

impl fmt::Display for CollaboratorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled => write!(f, "collaborator disabled"),
            Self::Timeout(msg) => write!(f, "timeout: {msg}"),
            Self::NotFound => write!(f, "not found"),
            Self::Failed(msg) => write!(f, "collaborator failed: {msg}"),
        }
    }
}

impl std::error::Error for CollaboratorError {}

#[derive(Debug)]
pub enum ExportError {
    /// JSON serialization / deserialization error.
    Serialize(String),
    /// IO error (file write, etc.).
    Io(String),
}

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Serialize(msg) => write!(f, "serialization error: {msg}"),
            Self::Io(msg) => write!(f, "IO error: {msg}"),
        }
    }
}

impl std::error::Error for ExportError {}

impl From<serde_json::Error> for ExportError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialize(e.to_string())
    }
}

impl From<std::io::Error> for ExportError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}
