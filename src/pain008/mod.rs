//! pain.008 document model, XML generation and schema validation.
//!
//! Implements the ISO 20022 customer direct-debit initiation message
//! (`CstmrDrctDbtInitn`) in the two format revisions accepted by French and
//! German banks: `pain.008.001.02` (default) and `pain.008.001.03`.

mod document;
mod validate;
pub(crate) mod xml_utils;

pub use document::{DirectDebitDocument, Transfer};
pub use validate::{validate_document, SchemaReport};

use serde::{Deserialize, Serialize};

/// Supported pain.008 schema revisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SchemaFormat {
    /// pain.008.001.02 — the widely deployed revision.
    Pain00800102,
    /// pain.008.001.03 — successor revision (`BICFI` instead of `BIC`).
    Pain00800103,
}

impl SchemaFormat {
    /// Canonical format name as stored in the gateway configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pain00800102 => "pain.008.001.02",
            Self::Pain00800103 => "pain.008.001.03",
        }
    }

    /// Resolve a configured format name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim() {
            "pain.008.001.02" => Some(Self::Pain00800102),
            "pain.008.001.03" => Some(Self::Pain00800103),
            _ => None,
        }
    }

    /// XML namespace of the message root.
    pub fn namespace(&self) -> &'static str {
        match self {
            Self::Pain00800102 => "urn:iso:std:iso:20022:tech:xsd:pain.008.001.02",
            Self::Pain00800103 => "urn:iso:std:iso:20022:tech:xsd:pain.008.001.03",
        }
    }

    /// Element name carrying a BIC inside `FinInstnId` (renamed in .03).
    pub fn bic_element(&self) -> &'static str {
        match self {
            Self::Pain00800102 => "BIC",
            Self::Pain00800103 => "BICFI",
        }
    }
}

impl Default for SchemaFormat {
    fn default() -> Self {
        Self::Pain00800102
    }
}

impl std::fmt::Display for SchemaFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sanitize a free-text name for pain.008 fields: em-dash becomes a hyphen,
/// anything outside `[0-9a-zA-Z_\-\s]` is stripped, result is trimmed.
pub fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| if c == '\u{2014}' { '-' } else { c })
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-' || c.is_whitespace())
        .collect::<String>()
        .trim()
        .to_string()
}

/// Uppercase a BIC and right-pad it with `X` to the 11-character form.
pub fn pad_bic(bic: &str) -> String {
    let mut bic = bic.to_ascii_uppercase();
    while bic.len() < 11 {
        bic.push('X');
    }
    bic
}
