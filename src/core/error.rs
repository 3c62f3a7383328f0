use thiserror::Error;

/// Errors that can occur while building, validating or packaging an export.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ExportError {
    /// Gateway configuration is missing or malformed.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Document construction error.
    #[error("document error: {0}")]
    Document(String),

    /// XML generation or parsing error.
    #[error("XML error: {0}")]
    Xml(String),

    /// One or more documents failed schema validation. The whole run is
    /// aborted and no payment status is mutated.
    #[error("schema validation failed: {}", format_diagnostics(diagnostics))]
    Schema {
        /// Ordered diagnostics across all failed documents.
        diagnostics: Vec<Diagnostic>,
    },

    /// Scratch directory or export file could not be written.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// ZIP archive error.
    #[error("archive error: {0}")]
    Archive(String),
}

fn format_diagnostics(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// A single validation diagnostic with element path and message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Slash-separated path to the offending element (e.g. "GrpHdr/MsgId").
    pub path: String,
    /// Human-readable description, trimmed of surrounding whitespace.
    pub message: String,
}

impl Diagnostic {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        let message: String = message.into();
        Self {
            path: path.into(),
            message: message.trim().to_string(),
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}
