//! The export engine: sequence-type detection, batch building, packaging
//! and run orchestration.

mod builder;
mod detect;
mod package;
mod run;

pub use builder::{selection_hash, BatchBuilder, BuiltRun, Disposition, IgnoreReason};
pub use detect::SequenceTypeDetector;
pub use package::{DeliveryTarget, Deliverable, PackageOutcome, Packager};
pub use run::{
    partition_payments, CommitSummary, ExportOutcome, ExportRequest, ExportService,
    PaymentStatusSink,
};
