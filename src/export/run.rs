//! Export orchestration: one run from selection to deliverable, plus the
//! deferred status-commit phase and the bank-rejection companion operation.

use std::collections::{BTreeMap, HashMap};

use super::builder::{BatchBuilder, IgnoreReason};
use super::package::{DeliveryTarget, Deliverable, PackageOutcome, Packager};
use crate::core::{
    ExportError, GatewayConfig, Payment, PaymentStatus, SequenceType, TypeSelection, GATEWAY_KIND,
};
use crate::pain008::validate_document;

/// Persistence seam for payment status transitions. Implemented by the host
/// application's storage layer.
pub trait PaymentStatusSink {
    fn save(&mut self, payment: &Payment) -> Result<(), ExportError>;
}

/// One export run's input: the selection and the POST-time type choices.
///
/// The request is consumed by [`ExportService::export`] — the selection is
/// cleared whatever the outcome, including the graceful empty ones.
#[derive(Debug, Clone)]
pub struct ExportRequest {
    /// The full selection of payment identifiers, as captured at request
    /// time. Drives the deterministic document name.
    pub selection: Vec<String>,
    /// Per-payment sequence-type choice. A payment missing from this map is
    /// ignored by the run.
    pub requested_types: HashMap<String, TypeSelection>,
    /// Single-type XML or everything-as-ZIP.
    pub target: DeliveryTarget,
}

/// Outcome of a run that did not fail.
#[derive(Debug)]
pub enum ExportOutcome {
    /// A file is ready to stream. After full delivery the caller must invoke
    /// [`ExportService::commit_exported`] with this value.
    Delivered {
        deliverable: Deliverable,
        /// Payments that entered a document, in selection order.
        exported: Vec<String>,
        /// Payments left out, with reasons. Informational.
        ignored: Vec<(String, IgnoreReason)>,
    },
    /// The run produced no document at all.
    NothingToExport,
    /// A single type was requested but not produced by this run.
    NothingMatched(SequenceType),
}

/// Aggregate result of a status-commit or rejection pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CommitSummary {
    pub committed: usize,
    pub failed: usize,
}

/// Split a mixed selection into payments handled by this gateway and the
/// rest. Only the first partition is exported; the second is informational.
pub fn partition_payments(payments: Vec<Payment>) -> (Vec<Payment>, Vec<Payment>) {
    payments
        .into_iter()
        .partition(|p| p.payment_mean.kind == GATEWAY_KIND)
}

/// Coordinates detector, builder, validator and packager over one run.
pub struct ExportService {
    config: GatewayConfig,
    packager: Packager,
}

impl ExportService {
    pub fn new(config: GatewayConfig, scratch_dir: impl Into<std::path::PathBuf>) -> Self {
        Self {
            config,
            packager: Packager::new(scratch_dir),
        }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Run one export over the matching payments.
    ///
    /// `success_counts` maps payment-mean ids to their count of successful
    /// prior payments (precomputed from persisted history).
    ///
    /// On schema-validation failure the whole run aborts: no file is written
    /// and no payment is touched. Graceful empty outcomes also touch
    /// nothing. Status commits happen only in [`Self::commit_exported`],
    /// after the deliverable has been fully streamed.
    pub fn export(
        &self,
        payments: &[Payment],
        request: ExportRequest,
        success_counts: HashMap<String, u64>,
    ) -> Result<ExportOutcome, ExportError> {
        let mut builder = BatchBuilder::new(&self.config, &request.selection, success_counts);

        for payment in payments {
            if payment.payment_mean.kind != GATEWAY_KIND {
                continue;
            }
            builder.add(payment, request.requested_types.get(&payment.id).copied());
        }
        let built = builder.finish();

        // All documents must pass schema validation before anything ships.
        let mut serialized = BTreeMap::new();
        let mut diagnostics = Vec::new();
        for (sequence_type, document) in &built.documents {
            let xml = document.to_xml()?;
            let report = validate_document(&xml, self.config.format);
            if report.is_valid() {
                serialized.insert(*sequence_type, xml);
            } else {
                log::error!(
                    "document {} failed {} schema validation",
                    sequence_type.code(),
                    self.config.format
                );
                diagnostics.extend(report.into_diagnostics());
            }
        }
        if !diagnostics.is_empty() {
            return Err(ExportError::Schema { diagnostics });
        }

        match self.packager.package(&serialized, request.target)? {
            PackageOutcome::Delivered(deliverable) => Ok(ExportOutcome::Delivered {
                deliverable,
                exported: built.included,
                ignored: built.ignored,
            }),
            PackageOutcome::Empty => Ok(ExportOutcome::NothingToExport),
            PackageOutcome::TypeNotProduced(sequence_type) => {
                Ok(ExportOutcome::NothingMatched(sequence_type))
            }
        }
    }

    /// Deferred phase, to run only after the deliverable has been fully
    /// streamed: delete the scratch file, then transition every exported
    /// payment to `exported`.
    ///
    /// Commits are independent per payment — a persistence failure is
    /// logged and counted but never blocks the siblings.
    pub fn commit_exported(
        &self,
        deliverable: Deliverable,
        exported: &[String],
        payments: &mut [Payment],
        sink: &mut dyn PaymentStatusSink,
    ) -> CommitSummary {
        let file_name = deliverable.file_name().to_string();
        if let Err(e) = deliverable.remove_file() {
            log::warn!("could not remove scratch file {file_name}: {e}");
        }

        let mut summary = CommitSummary::default();
        for id in exported {
            let Some(payment) = payments.iter_mut().find(|p| &p.id == id) else {
                log::warn!("exported payment {id} not found for status commit");
                summary.failed += 1;
                continue;
            };
            payment.update_status(
                PaymentStatus::Exported,
                format!("Exported into file `{file_name}`"),
                BTreeMap::from([("filename".to_string(), file_name.clone())]),
            );
            match sink.save(payment) {
                Ok(()) => summary.committed += 1,
                Err(e) => {
                    log::warn!("could not persist status of payment {id}: {e}");
                    summary.failed += 1;
                }
            }
        }
        summary
    }

    /// Companion operation: mark every eligible matching payment as rejected
    /// by the bank. Does not touch the export machinery.
    pub fn mark_rejected(
        &self,
        payments: &mut [Payment],
        sink: &mut dyn PaymentStatusSink,
    ) -> CommitSummary {
        let mut summary = CommitSummary::default();
        for payment in payments.iter_mut() {
            if payment.payment_mean.kind != GATEWAY_KIND
                || payment.status != PaymentStatus::Exported
            {
                continue;
            }
            payment.update_status(
                PaymentStatus::Error,
                "Rejected by bank",
                BTreeMap::from([("rejected_by_bank".to_string(), "true".to_string())]),
            );
            match sink.save(payment) {
                Ok(()) => summary.committed += 1,
                Err(e) => {
                    log::warn!("could not persist rejection of payment {}: {e}", payment.id);
                    summary.failed += 1;
                }
            }
        }
        summary
    }
}
