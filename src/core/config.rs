//! Creditor-side gateway configuration.
//!
//! The host application stores the gateway configuration as flat key/value
//! properties; `GatewayConfig::from_properties` parses them and `validate`
//! reports per-field diagnostics.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::error::Diagnostic;
use super::iban;
use super::types::TypeSelection;
use crate::pain008::SchemaFormat;

/// Creditor identity and export behavior of the SEPA gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Creditor legal name (`compagny` property, spelling kept from storage).
    pub company: String,
    /// Creditor account IBAN.
    pub iban: String,
    /// Creditor agent BIC.
    pub bic: String,
    /// Creditor identifier (ICS).
    pub ics: String,
    /// Target pain.008 schema format.
    pub format: SchemaFormat,
    /// Forced sequence type, or `Auto` to let the detector decide.
    pub forced_type: TypeSelection,
    /// pain.008 `BtchBookg` flag.
    pub batch_booking: bool,
}

impl GatewayConfig {
    /// Build a configuration from the stored key/value properties.
    ///
    /// Missing optional keys fall back to defaults: format
    /// `pain.008.001.02`, forced type `AUTO`, batch booking `false`.
    /// Batch booking is enabled only by the literal string `"true"`.
    pub fn from_properties(properties: &BTreeMap<String, String>) -> Self {
        let get = |key: &str| properties.get(key).cloned().unwrap_or_default();

        Self {
            company: get("compagny"),
            iban: get("iban"),
            bic: get("bic"),
            ics: get("ics"),
            format: properties
                .get("format")
                .and_then(|f| SchemaFormat::from_name(f))
                .unwrap_or_default(),
            forced_type: properties
                .get("force_export_type")
                .and_then(|t| TypeSelection::parse(t))
                .unwrap_or_default(),
            batch_booking: properties.get("batchBooking").map(String::as_str) == Some("true"),
        }
    }

    /// Validate the creditor-side fields. Returns all diagnostics found.
    pub fn validate(&self) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();

        if self.company.trim().is_empty() {
            diagnostics.push(Diagnostic::new("compagny", "creditor legal name is required"));
        }
        if self.iban.trim().is_empty() {
            diagnostics.push(Diagnostic::new("iban", "creditor IBAN is required"));
        } else if !iban::validate_iban(&self.iban) {
            diagnostics.push(Diagnostic::new("iban", "IBAN format is incorrect"));
        }
        if !iban::validate_bic(&self.bic) {
            diagnostics.push(Diagnostic::new("bic", "BIC format is incorrect"));
        }
        if self.ics.trim().is_empty() {
            diagnostics.push(Diagnostic::new("ics", "creditor identifier (ICS) is required"));
        }

        diagnostics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::SequenceType;

    fn properties(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn parses_full_properties() {
        let config = GatewayConfig::from_properties(&properties(&[
            ("compagny", "ACME SARL"),
            ("iban", "FR1420041010050500013M02606"),
            ("bic", "SOGEFRPP"),
            ("ics", "FR12ZZZ123456"),
            ("format", "pain.008.001.03"),
            ("force_export_type", "RCUR"),
            ("batchBooking", "true"),
        ]));

        assert_eq!(config.format, SchemaFormat::Pain00800103);
        assert_eq!(
            config.forced_type,
            TypeSelection::Fixed(SequenceType::Recurring)
        );
        assert!(config.batch_booking);
        assert!(config.validate().is_empty());
    }

    #[test]
    fn defaults_apply() {
        let config = GatewayConfig::from_properties(&properties(&[
            ("compagny", "ACME SARL"),
            ("iban", "FR1420041010050500013M02606"),
            ("bic", "SOGEFRPP"),
            ("ics", "FR12ZZZ123456"),
        ]));

        assert_eq!(config.format, SchemaFormat::Pain00800102);
        assert_eq!(config.forced_type, TypeSelection::Auto);
        assert!(!config.batch_booking);
    }

    #[test]
    fn batch_booking_requires_literal_true() {
        let config = GatewayConfig::from_properties(&properties(&[("batchBooking", "1")]));
        assert!(!config.batch_booking);
        let config = GatewayConfig::from_properties(&properties(&[("batchBooking", "TRUE")]));
        assert!(!config.batch_booking);
    }

    #[test]
    fn validation_reports_bad_fields() {
        let config = GatewayConfig::from_properties(&properties(&[
            ("compagny", "ACME SARL"),
            ("iban", "FR1420041010050500013M02607"),
            ("bic", "NOPE"),
        ]));

        let diagnostics = config.validate();
        let fields: Vec<&str> = diagnostics.iter().map(|d| d.path.as_str()).collect();
        assert_eq!(fields, vec!["iban", "bic", "ics"]);
    }
}
