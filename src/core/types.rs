use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::iban;

/// Gateway kind tag carried by every SEPA payment mean.
pub const GATEWAY_KIND: &str = "sepa";

/// Lifecycle status of a payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentStatus {
    /// Waiting for export.
    Ready,
    /// Included in a delivered export file.
    Exported,
    /// Debit confirmed by the bank.
    Success,
    /// Failed or rejected.
    Error,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::Exported => "exported",
            Self::Success => "success",
            Self::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ready" => Some(Self::Ready),
            "exported" => Some(Self::Exported),
            "success" => Some(Self::Success),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    /// Statuses from which a payment may enter an export run. A payment may
    /// be re-exported after a first export (e.g. a corrected file).
    pub fn is_exportable(&self) -> bool {
        matches!(self, Self::Ready | Self::Exported)
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of a payment's append-only status history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusEntry {
    pub status: PaymentStatus,
    pub message: String,
    pub at: DateTime<Utc>,
    /// Free-form metadata (e.g. `filename`, `rejected_by_bank`).
    pub metadata: BTreeMap<String, String>,
}

/// SEPA sequence type of a debit instruction (pain.008 `SeqTp`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SequenceType {
    /// First debit under a mandate (`FRST`).
    First,
    /// Subsequent debit under a mandate (`RCUR`).
    Recurring,
    /// Last debit under a mandate (`FNAL`). Never auto-assigned; reserved
    /// for manual selection.
    Final,
}

impl SequenceType {
    /// ISO 20022 sequence-type code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::First => "FRST",
            Self::Recurring => "RCUR",
            Self::Final => "FNAL",
        }
    }

    /// Parse either the ISO code (`FRST`) or the long name (`FIRST`),
    /// case-insensitive.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "FRST" | "FIRST" => Some(Self::First),
            "RCUR" | "RECURRING" => Some(Self::Recurring),
            "FNAL" | "FINAL" => Some(Self::Final),
            _ => None,
        }
    }

    pub const ALL: [SequenceType; 3] = [Self::First, Self::Recurring, Self::Final];
}

impl std::fmt::Display for SequenceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Per-payment (or gateway-wide) sequence-type selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeSelection {
    /// Let the detector decide.
    Auto,
    /// Force this type.
    Fixed(SequenceType),
}

impl TypeSelection {
    /// Parse `"AUTO"` or an explicit type, case-insensitive.
    pub fn parse(s: &str) -> Option<Self> {
        if s.trim().eq_ignore_ascii_case("auto") {
            Some(Self::Auto)
        } else {
            SequenceType::parse(s).map(Self::Fixed)
        }
    }
}

impl Default for TypeSelection {
    fn default() -> Self {
        Self::Auto
    }
}

/// The debtor behind a payment mean.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    /// Opaque identifier, may contain separators.
    pub id: String,
    /// Registered legal name, preferred for SEPA debtor display.
    pub org_legal_name: Option<String>,
    /// Trading/business name, fallback.
    pub org_business_name: String,
}

impl Customer {
    /// Debtor display name: legal name if set and non-empty, else business name.
    pub fn debtor_name(&self) -> &str {
        match &self.org_legal_name {
            Some(name) if !name.trim().is_empty() => name,
            _ => &self.org_business_name,
        }
    }

    /// Fallback mandate reference: the customer identifier, separator-free.
    pub fn mandate_reference(&self) -> String {
        self.id.replace('-', "")
    }
}

/// A recurring direct-debit authorization: the debtor account plus mandate
/// data. Read-only input for the duration of an export run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentMean {
    pub id: String,
    /// Gateway kind tag; only `"sepa"` means are exported.
    pub kind: String,
    /// IBAN country code (two letters, e.g. `DE`).
    pub iban_country: String,
    /// IBAN check digits.
    pub iban_key: String,
    /// Country-specific account number part.
    pub iban_code: String,
    pub bic: String,
    /// Explicit mandate reference, if one was recorded.
    pub mandate_id: Option<String>,
    /// Mandate signature date, if recorded.
    pub mandate_sign_date: Option<NaiveDate>,
    /// Creation date, used as the default mandate anchor.
    pub created: NaiveDate,
    pub customer: Customer,
}

impl PaymentMean {
    /// Assemble the debtor IBAN in machine format from its stored parts.
    pub fn full_iban(&self) -> String {
        iban::iban_to_machine_format(&format!(
            "{}{}{}",
            self.iban_country, self.iban_key, self.iban_code
        ))
    }

    /// Validate the stored SEPA parameters: all three IBAN parts present,
    /// assembled IBAN passes the checksum, BIC well-formed.
    pub fn validate_parameters(&self) -> bool {
        if self.iban_country.trim().is_empty()
            || self.iban_key.trim().is_empty()
            || self.iban_code.trim().is_empty()
        {
            return false;
        }
        if !iban::validate_iban(&self.full_iban()) {
            return false;
        }
        iban::validate_bic(&self.bic)
    }
}

/// A debt obligation tied to one payment mean, as selected for export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    /// Opaque identifier, may contain separators.
    pub id: String,
    /// Amount to collect (currency-implicit, EUR).
    pub amount: Decimal,
    pub status: PaymentStatus,
    /// Append-only status history.
    pub history: Vec<StatusEntry>,
    pub payment_mean: PaymentMean,
}

impl Payment {
    /// Separator-free identifier used inside generated documents.
    pub fn document_ref(&self) -> String {
        self.id.replace('-', "")
    }

    /// Append a status transition to the history and make it current.
    pub fn update_status(
        &mut self,
        status: PaymentStatus,
        message: impl Into<String>,
        metadata: BTreeMap<String, String>,
    ) {
        self.history.push(StatusEntry {
            status,
            message: message.into(),
            at: Utc::now(),
            metadata,
        });
        self.status = status;
    }
}
