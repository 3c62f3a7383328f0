//! Core domain model: payments, payment means, gateway configuration,
//! IBAN/BIC validation and error types.

mod config;
mod error;
pub mod iban;
mod types;

pub use config::GatewayConfig;
pub use error::{Diagnostic, ExportError};
pub use iban::{
    iban_to_machine_format, mask_iban, validate_bic, validate_iban, validate_iban_parts,
};
pub use types::{
    Customer, Payment, PaymentMean, PaymentStatus, SequenceType, StatusEntry, TypeSelection,
    GATEWAY_KIND,
};
