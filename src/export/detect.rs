//! Sequence-type detection.
//!
//! A payment mean's first-ever debit in a successful context must be flagged
//! `FRST`; later ones are `RCUR`. A single run may batch several payments for
//! the same payment mean before any of them is recorded successful, so the
//! detector keeps a run-local set of means already assigned `FRST`.
//!
//! The detector is a value constructed fresh for every export run and owned
//! by it. It must never be shared across runs: a longer-lived set would
//! carry stale first-assignments into unrelated selections.

use std::collections::{HashMap, HashSet};

use crate::core::{SequenceType, TypeSelection};

/// Run-scoped FIRST/RECURRING classifier.
///
/// `FNAL` is never auto-assigned; it is reserved for explicit selection.
#[derive(Debug)]
pub struct SequenceTypeDetector {
    forced: TypeSelection,
    /// Successful prior payments per payment-mean id, computed once per run
    /// from persisted history before any assignment.
    success_counts: HashMap<String, u64>,
    /// Payment means already assigned `FRST` in this run.
    firsts: HashSet<String>,
}

impl SequenceTypeDetector {
    pub fn new(forced: TypeSelection, success_counts: HashMap<String, u64>) -> Self {
        Self {
            forced,
            success_counts,
            firsts: HashSet::new(),
        }
    }

    /// Classify the next payment for `payment_mean_id`, in selection order.
    pub fn detect(&mut self, payment_mean_id: &str) -> SequenceType {
        if let TypeSelection::Fixed(forced) = self.forced {
            return forced;
        }

        if self.firsts.contains(payment_mean_id) {
            return SequenceType::Recurring;
        }

        let successes = self
            .success_counts
            .get(payment_mean_id)
            .copied()
            .unwrap_or(0);
        if successes < 1 {
            self.firsts.insert(payment_mean_id.to_string());
            return SequenceType::First;
        }

        SequenceType::Recurring
    }
}
