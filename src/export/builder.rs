//! Accumulates selected payments into per-sequence-type pain.008 documents.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;

use chrono::{DateTime, NaiveDate, Utc};
use sha2::{Digest, Sha256};

use super::detect::SequenceTypeDetector;
use crate::core::{GatewayConfig, Payment, PaymentStatus, SequenceType, TypeSelection};
use crate::pain008::{pad_bic, sanitize_name, DirectDebitDocument, Transfer};

/// Mandate anchor used when a payment mean has no recorded signature date.
fn fallback_mandate_sign_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2014, 2, 1).expect("valid constant date")
}

/// Why a selected payment was left out of the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// No sequence-type selection was submitted for this payment.
    MissingTypeSelection,
    /// Current status does not allow export.
    NotExportable(PaymentStatus),
    /// Debtor IBAN failed the checksum.
    InvalidIban,
    /// Debtor BIC is malformed.
    InvalidBic,
}

/// Outcome of feeding one payment to the builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Included(SequenceType),
    Ignored(IgnoreReason),
}

/// The documents and partitions produced by one run.
#[derive(Debug)]
pub struct BuiltRun {
    /// One document per sequence type present, in stable type order.
    pub documents: BTreeMap<SequenceType, DirectDebitDocument>,
    /// Identifiers of payments that entered a document, in selection order.
    pub included: Vec<String>,
    /// Identifiers of payments left out, with the reason.
    pub ignored: Vec<(String, IgnoreReason)>,
}

impl BuiltRun {
    /// Total number of transfer entries across all documents.
    pub fn entry_count(&self) -> usize {
        self.documents.values().map(|d| d.transfers().len()).sum()
    }
}

/// Builds the per-type documents for one export run.
pub struct BatchBuilder<'a> {
    config: &'a GatewayConfig,
    detector: SequenceTypeDetector,
    documents: BTreeMap<SequenceType, DirectDebitDocument>,
    selection_hash: String,
    collection_date: NaiveDate,
    created_at: DateTime<Utc>,
    included: Vec<String>,
    ignored: Vec<(String, IgnoreReason)>,
}

impl<'a> BatchBuilder<'a> {
    /// Start a run over the given selection.
    ///
    /// `success_counts` maps payment-mean ids to their count of successful
    /// prior payments, precomputed from persisted history.
    pub fn new(
        config: &'a GatewayConfig,
        selection: &[String],
        success_counts: HashMap<String, u64>,
    ) -> Self {
        let now = Utc::now();
        Self {
            detector: SequenceTypeDetector::new(config.forced_type, success_counts),
            documents: BTreeMap::new(),
            selection_hash: selection_hash(selection),
            collection_date: now.date_naive(),
            created_at: now,
            included: Vec::new(),
            ignored: Vec::new(),
            config,
        }
    }

    /// Deterministic name shared by all documents of this run.
    pub fn document_name(&self) -> &str {
        &self.selection_hash
    }

    /// Process one payment in selection order.
    ///
    /// `requested` is the POST-time selection for this payment; `None` means
    /// the selector was absent and the payment is ignored.
    pub fn add(&mut self, payment: &Payment, requested: Option<TypeSelection>) -> Disposition {
        let Some(requested) = requested else {
            return self.ignore(payment, IgnoreReason::MissingTypeSelection);
        };
        if !payment.status.is_exportable() {
            return self.ignore(payment, IgnoreReason::NotExportable(payment.status));
        }

        let mean = &payment.payment_mean;
        let debtor_iban = mean.full_iban();
        if !crate::core::validate_iban(&debtor_iban) {
            return self.ignore(payment, IgnoreReason::InvalidIban);
        }
        if !crate::core::validate_bic(&mean.bic) {
            return self.ignore(payment, IgnoreReason::InvalidBic);
        }

        let sequence_type = match requested {
            TypeSelection::Fixed(explicit) => explicit,
            TypeSelection::Auto => self.detector.detect(&mean.id),
        };

        let transfer = Transfer {
            end_to_end_id: payment.document_ref(),
            amount: payment.amount,
            debtor_iban,
            debtor_bic: pad_bic(&mean.bic),
            debtor_name: sanitize_name(mean.customer.debtor_name()),
            mandate_id: match &mean.mandate_id {
                Some(id) if !id.trim().is_empty() => id.clone(),
                _ => mean.customer.mandate_reference(),
            },
            mandate_sign_date: mean
                .mandate_sign_date
                .unwrap_or_else(fallback_mandate_sign_date),
            remittance: payment.id.clone(),
        };

        match self.documents.entry(sequence_type) {
            Entry::Occupied(mut occupied) => occupied.get_mut().add_transfer(transfer),
            Entry::Vacant(vacant) => {
                let mut document = new_document(
                    self.config,
                    &self.selection_hash,
                    self.created_at,
                    self.collection_date,
                    sequence_type,
                );
                document.add_transfer(transfer);
                vacant.insert(document);
            }
        }

        self.included.push(payment.id.clone());
        Disposition::Included(sequence_type)
    }

    /// Finish the run and hand over the produced documents.
    pub fn finish(self) -> BuiltRun {
        BuiltRun {
            documents: self.documents,
            included: self.included,
            ignored: self.ignored,
        }
    }

    fn ignore(&mut self, payment: &Payment, reason: IgnoreReason) -> Disposition {
        self.ignored.push((payment.id.clone(), reason));
        Disposition::Ignored(reason)
    }
}

fn new_document(
    config: &GatewayConfig,
    selection_hash: &str,
    created_at: DateTime<Utc>,
    collection_date: NaiveDate,
    sequence_type: SequenceType,
) -> DirectDebitDocument {
    let creditor_name = sanitize_name(&config.company);
    DirectDebitDocument::new(
        selection_hash,
        creditor_name.clone(),
        config.format,
        created_at,
        selection_hash,
        creditor_name,
        config.iban.to_ascii_uppercase(),
        pad_bic(&config.bic),
        config.ics.clone(),
        sequence_type,
        collection_date,
        config.batch_booking,
    )
}

/// Content hash of the sorted selection. Stable across re-renders of the
/// same selection, independent of wall-clock time.
pub fn selection_hash(selection: &[String]) -> String {
    let mut ids: Vec<&str> = selection.iter().map(String::as_str).collect();
    ids.sort_unstable();
    let digest = Sha256::digest(ids.join(",").as_bytes());

    // 16 bytes of the digest keep the id within the 35-character MsgId limit.
    let mut hash = String::with_capacity(32);
    for byte in &digest[..16] {
        let _ = write!(hash, "{byte:02x}");
    }
    hash
}
