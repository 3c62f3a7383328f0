//! # lastschrift
//!
//! SEPA direct-debit batch export: classifies due payments into FIRST /
//! RECURRING / FINAL sequence types, groups them into per-type pain.008 XML
//! documents, validates each document against the target schema revision,
//! and packages the result as a single XML file or a ZIP bundle.
//!
//! All monetary values use [`rust_decimal::Decimal`] — never floating point.
//!
//! Status commits are deferred: [`export::ExportService::export`] produces a
//! [`export::Deliverable`], and only after the file has been fully streamed
//! does [`export::ExportService::commit_exported`] delete the scratch file
//! and transition the exported payments.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::collections::HashMap;
//! use chrono::NaiveDate;
//! use lastschrift::core::*;
//! use lastschrift::export::{DeliveryTarget, ExportOutcome, ExportRequest, ExportService};
//! use rust_decimal_macros::dec;
//!
//! let config = GatewayConfig {
//!     company: "ACME SARL".into(),
//!     iban: "FR1420041010050500013M02606".into(),
//!     bic: "SOGEFRPP".into(),
//!     ics: "FR12ZZZ123456".into(),
//!     format: Default::default(),
//!     forced_type: TypeSelection::Auto,
//!     batch_booking: false,
//! };
//!
//! let payment = Payment {
//!     id: "7c9a-0041".into(),
//!     amount: dec!(49.90),
//!     status: PaymentStatus::Ready,
//!     history: Vec::new(),
//!     payment_mean: PaymentMean {
//!         id: "pm-1".into(),
//!         kind: GATEWAY_KIND.into(),
//!         iban_country: "DE".into(),
//!         iban_key: "89".into(),
//!         iban_code: "370400440532013000".into(),
//!         bic: "COBADEFF".into(),
//!         mandate_id: None,
//!         mandate_sign_date: None,
//!         created: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
//!         customer: Customer {
//!             id: "c-1".into(),
//!             org_legal_name: Some("ACME Kunde GmbH".into()),
//!             org_business_name: "ACME Kunde".into(),
//!         },
//!     },
//! };
//!
//! let service = ExportService::new(config, std::env::temp_dir().join("sepa"));
//! let request = ExportRequest {
//!     selection: vec![payment.id.clone()],
//!     requested_types: HashMap::from([(payment.id.clone(), TypeSelection::Auto)]),
//!     target: DeliveryTarget::Bundle,
//! };
//!
//! let outcome = service.export(&[payment], request, HashMap::new()).unwrap();
//! if let ExportOutcome::Delivered { deliverable, .. } = outcome {
//!     // stream `deliverable.open()` to the caller, then run
//!     // `service.commit_exported(..)` once the transfer completed
//! }
//! ```

pub mod core;
pub mod export;
pub mod pain008;

// Re-export core types at crate root for convenience
pub use crate::core::*;
