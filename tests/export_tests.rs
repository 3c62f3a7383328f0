use std::collections::HashMap;
use std::io::Read;

use chrono::NaiveDate;
use lastschrift::core::*;
use lastschrift::export::{
    partition_payments, BatchBuilder, DeliveryTarget, ExportOutcome, ExportRequest, ExportService,
    IgnoreReason, PaymentStatusSink,
};
use lastschrift::pain008::SchemaFormat;
use rust_decimal_macros::dec;

fn config() -> GatewayConfig {
    GatewayConfig {
        company: "ACME SARL".into(),
        iban: "FR1420041010050500013M02606".into(),
        bic: "SOGEFRPP".into(),
        ics: "FR12ZZZ123456".into(),
        format: SchemaFormat::Pain00800102,
        forced_type: TypeSelection::Auto,
        batch_booking: false,
    }
}

fn payment(id: &str, mean_id: &str) -> Payment {
    Payment {
        id: id.into(),
        amount: dec!(100),
        status: PaymentStatus::Ready,
        history: Vec::new(),
        payment_mean: PaymentMean {
            id: mean_id.into(),
            kind: GATEWAY_KIND.into(),
            iban_country: "DE".into(),
            iban_key: "89".into(),
            iban_code: "370400440532013000".into(),
            bic: "COBADEFF".into(),
            mandate_id: Some(format!("MANDATE-{mean_id}")),
            mandate_sign_date: NaiveDate::from_ymd_opt(2023, 3, 15),
            created: NaiveDate::from_ymd_opt(2023, 3, 1).unwrap(),
            customer: Customer {
                id: format!("c-{mean_id}"),
                org_legal_name: None,
                org_business_name: "Kunde AG".into(),
            },
        },
    }
}

fn auto_request(payments: &[Payment], target: DeliveryTarget) -> ExportRequest {
    ExportRequest {
        selection: payments.iter().map(|p| p.id.clone()).collect(),
        requested_types: payments
            .iter()
            .map(|p| (p.id.clone(), TypeSelection::Auto))
            .collect(),
        target,
    }
}

#[derive(Default)]
struct MemorySink {
    saved: Vec<(String, PaymentStatus)>,
    fail_for: Option<String>,
}

impl PaymentStatusSink for MemorySink {
    fn save(&mut self, payment: &Payment) -> Result<(), ExportError> {
        if self.fail_for.as_deref() == Some(payment.id.as_str()) {
            return Err(ExportError::Configuration("storage unavailable".into()));
        }
        self.saved.push((payment.id.clone(), payment.status));
        Ok(())
    }
}

// --- Detection through the builder ---

#[test]
fn same_mean_yields_first_then_recurring() {
    let config = config();
    let payments = [
        payment("p-1", "pm-1"),
        payment("p-2", "pm-1"),
        payment("p-3", "pm-1"),
    ];
    let selection: Vec<String> = payments.iter().map(|p| p.id.clone()).collect();

    let mut builder = BatchBuilder::new(&config, &selection, HashMap::new());
    for p in &payments {
        builder.add(p, Some(TypeSelection::Auto));
    }
    let built = builder.finish();

    assert_eq!(built.documents[&SequenceType::First].transfers().len(), 1);
    assert_eq!(built.documents[&SequenceType::Recurring].transfers().len(), 2);
    assert_eq!(built.entry_count(), 3);
}

#[test]
fn forced_type_applies_to_all_auto_payments() {
    let mut config = config();
    config.forced_type = TypeSelection::Fixed(SequenceType::Recurring);
    let payments = [payment("p-1", "pm-1"), payment("p-2", "pm-2")];
    let selection: Vec<String> = payments.iter().map(|p| p.id.clone()).collect();

    let mut builder = BatchBuilder::new(&config, &selection, HashMap::new());
    for p in &payments {
        builder.add(p, Some(TypeSelection::Auto));
    }
    let built = builder.finish();

    assert_eq!(built.documents.len(), 1);
    assert_eq!(built.documents[&SequenceType::Recurring].transfers().len(), 2);
}

#[test]
fn explicit_type_bypasses_detection() {
    let config = config();
    let payments = [payment("p-1", "pm-1")];
    let selection = vec!["p-1".to_string()];

    let mut builder = BatchBuilder::new(&config, &selection, HashMap::new());
    builder.add(
        &payments[0],
        Some(TypeSelection::Fixed(SequenceType::Final)),
    );
    let built = builder.finish();

    assert!(built.documents.contains_key(&SequenceType::Final));
}

#[test]
fn ignored_payments_contribute_no_entries() {
    let config = config();
    let mut success = payment("p-2", "pm-2");
    success.status = PaymentStatus::Success;
    let mut bad_iban = payment("p-3", "pm-3");
    bad_iban.payment_mean.iban_key = "90".into();
    let mut bad_bic = payment("p-4", "pm-4");
    bad_bic.payment_mean.bic = "X".into();
    let payments = [payment("p-1", "pm-1"), success, bad_iban, bad_bic];
    let selection: Vec<String> = payments.iter().map(|p| p.id.clone()).collect();

    let mut builder = BatchBuilder::new(&config, &selection, HashMap::new());
    builder.add(&payments[0], Some(TypeSelection::Auto));
    builder.add(&payments[1], Some(TypeSelection::Auto));
    builder.add(&payments[2], Some(TypeSelection::Auto));
    builder.add(&payments[3], None); // selector absent from the POST payload
    let built = builder.finish();

    assert_eq!(built.included, vec!["p-1".to_string()]);
    assert_eq!(built.entry_count(), 1);

    let reasons: Vec<IgnoreReason> = built.ignored.iter().map(|(_, r)| *r).collect();
    assert!(reasons.contains(&IgnoreReason::NotExportable(PaymentStatus::Success)));
    assert!(reasons.contains(&IgnoreReason::InvalidIban));
    assert!(reasons.contains(&IgnoreReason::MissingTypeSelection));
}

// --- Orchestration ---

#[test]
fn partition_splits_by_gateway_kind() {
    let mut other = payment("p-2", "pm-2");
    other.payment_mean.kind = "card".into();
    let (matching, rest) = partition_payments(vec![payment("p-1", "pm-1"), other]);
    assert_eq!(matching.len(), 1);
    assert_eq!(rest.len(), 1);
    assert_eq!(matching[0].id, "p-1");
}

#[test]
fn bundle_export_and_commit_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let service = ExportService::new(config(), dir.path());
    let mut payments = vec![payment("p-1", "pm-1"), payment("p-2", "pm-1")];
    let request = auto_request(&payments, DeliveryTarget::Bundle);

    let outcome = service.export(&payments, request, HashMap::new()).unwrap();
    let ExportOutcome::Delivered {
        deliverable,
        exported,
        ignored,
    } = outcome
    else {
        panic!("expected a deliverable");
    };

    assert_eq!(exported, vec!["p-1".to_string(), "p-2".to_string()]);
    assert!(ignored.is_empty());
    assert_eq!(deliverable.content_type(), "application/zip");
    assert!(deliverable.file_name().starts_with("sepa-exports-"));
    assert!(deliverable.file_name().ends_with(".zip"));

    // ZIP magic, one entry per produced type
    let mut magic = [0u8; 2];
    deliverable.open().unwrap().read_exact(&mut magic).unwrap();
    assert_eq!(&magic, b"PK");
    let archive = zip::ZipArchive::new(deliverable.open().unwrap()).unwrap();
    let mut names: Vec<&str> = archive.file_names().collect();
    names.sort_unstable();
    assert_eq!(names, vec!["FRST.xml", "RCUR.xml"]);

    // Statuses are untouched until the deferred commit phase
    assert!(payments.iter().all(|p| p.status == PaymentStatus::Ready));

    let path = deliverable.path().to_path_buf();
    let mut sink = MemorySink::default();
    let summary = service.commit_exported(deliverable, &exported, &mut payments, &mut sink);

    assert_eq!(summary.committed, 2);
    assert_eq!(summary.failed, 0);
    assert!(!path.exists());
    for p in &payments {
        assert_eq!(p.status, PaymentStatus::Exported);
        let entry = p.history.last().unwrap();
        assert!(entry.message.contains(entry.metadata.get("filename").unwrap()));
    }
    assert_eq!(sink.saved.len(), 2);
}

#[test]
fn single_type_export_produces_raw_xml() {
    let dir = tempfile::tempdir().unwrap();
    let service = ExportService::new(config(), dir.path());
    let payments = vec![payment("p-1", "pm-1")];
    let request = auto_request(&payments, DeliveryTarget::Single(SequenceType::First));

    let outcome = service.export(&payments, request, HashMap::new()).unwrap();
    let ExportOutcome::Delivered { deliverable, .. } = outcome else {
        panic!("expected a deliverable");
    };

    assert_eq!(deliverable.content_type(), "text/xml");
    assert!(deliverable.file_name().starts_with("sepa-exports-FRST-"));
    let content = std::fs::read_to_string(deliverable.path()).unwrap();
    assert!(content.contains("<CstmrDrctDbtInitn>"));
}

#[test]
fn requesting_absent_type_is_a_graceful_no_op() {
    let dir = tempfile::tempdir().unwrap();
    let service = ExportService::new(config(), dir.path());
    let payments = vec![payment("p-1", "pm-1")];
    // pm-1 has no prior successes, so only FRST is produced
    let request = auto_request(&payments, DeliveryTarget::Single(SequenceType::Final));

    let outcome = service.export(&payments, request, HashMap::new()).unwrap();
    assert!(matches!(
        outcome,
        ExportOutcome::NothingMatched(SequenceType::Final)
    ));
    assert!(payments.iter().all(|p| p.status == PaymentStatus::Ready));
    assert!(payments.iter().all(|p| p.history.is_empty()));
}

#[test]
fn empty_run_exports_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let service = ExportService::new(config(), dir.path());
    let request = ExportRequest {
        selection: Vec::new(),
        requested_types: HashMap::new(),
        target: DeliveryTarget::Bundle,
    };

    let outcome = service.export(&[], request, HashMap::new()).unwrap();
    assert!(matches!(outcome, ExportOutcome::NothingToExport));
}

#[test]
fn schema_failure_aborts_the_whole_run() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config();
    config.company = String::new(); // empty creditor name fails validation
    let service = ExportService::new(config, dir.path());
    let payments = vec![payment("p-1", "pm-1"), payment("p-2", "pm-2")];
    let request = auto_request(&payments, DeliveryTarget::Bundle);

    let result = service.export(&payments, request, HashMap::new());
    let Err(ExportError::Schema { diagnostics }) = result else {
        panic!("expected a schema failure");
    };
    assert!(!diagnostics.is_empty());

    // No file was produced and no payment was touched
    assert!(std::fs::read_dir(dir.path()).map(|d| d.count()).unwrap_or(0) == 0);
    assert!(payments.iter().all(|p| p.status == PaymentStatus::Ready));
}

#[test]
fn commit_failures_are_isolated_per_payment() {
    let dir = tempfile::tempdir().unwrap();
    let service = ExportService::new(config(), dir.path());
    let mut payments = vec![payment("p-1", "pm-1"), payment("p-2", "pm-2")];
    let request = auto_request(&payments, DeliveryTarget::Bundle);

    let ExportOutcome::Delivered {
        deliverable,
        exported,
        ..
    } = service.export(&payments, request, HashMap::new()).unwrap()
    else {
        panic!("expected a deliverable");
    };

    let mut sink = MemorySink {
        fail_for: Some("p-1".into()),
        ..Default::default()
    };
    let summary = service.commit_exported(deliverable, &exported, &mut payments, &mut sink);

    assert_eq!(summary.committed, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(sink.saved, vec![("p-2".to_string(), PaymentStatus::Exported)]);
}

#[test]
fn concurrent_runs_never_collide_on_file_names() {
    let dir = tempfile::tempdir().unwrap();
    let service = ExportService::new(config(), dir.path());

    let mut names = Vec::new();
    for i in 0..3 {
        let payments = vec![payment(&format!("p-{i}"), &format!("pm-{i}"))];
        let request = auto_request(&payments, DeliveryTarget::Bundle);
        let ExportOutcome::Delivered { deliverable, .. } =
            service.export(&payments, request, HashMap::new()).unwrap()
        else {
            panic!("expected a deliverable");
        };
        names.push(deliverable.file_name().to_string());
    }
    names.sort_unstable();
    names.dedup();
    assert_eq!(names.len(), 3);
}

#[test]
fn mark_rejected_targets_exported_sepa_payments_only() {
    let dir = tempfile::tempdir().unwrap();
    let service = ExportService::new(config(), dir.path());

    let mut exported = payment("p-1", "pm-1");
    exported.status = PaymentStatus::Exported;
    let ready = payment("p-2", "pm-2");
    let mut foreign = payment("p-3", "pm-3");
    foreign.status = PaymentStatus::Exported;
    foreign.payment_mean.kind = "card".into();
    let mut payments = vec![exported, ready, foreign];

    let mut sink = MemorySink::default();
    let summary = service.mark_rejected(&mut payments, &mut sink);

    assert_eq!(summary.committed, 1);
    assert_eq!(summary.failed, 0);
    assert_eq!(payments[0].status, PaymentStatus::Error);
    assert_eq!(
        payments[0].history.last().unwrap().metadata.get("rejected_by_bank"),
        Some(&"true".to_string())
    );
    assert_eq!(payments[1].status, PaymentStatus::Ready);
    assert_eq!(payments[2].status, PaymentStatus::Exported);
}

#[test]
fn non_matching_payments_are_skipped_by_export() {
    let dir = tempfile::tempdir().unwrap();
    let service = ExportService::new(config(), dir.path());
    let mut foreign = payment("p-1", "pm-1");
    foreign.payment_mean.kind = "card".into();
    let payments = vec![foreign, payment("p-2", "pm-2")];
    let request = auto_request(&payments, DeliveryTarget::Bundle);

    let ExportOutcome::Delivered { exported, .. } =
        service.export(&payments, request, HashMap::new()).unwrap()
    else {
        panic!("expected a deliverable");
    };
    assert_eq!(exported, vec!["p-2".to_string()]);
}
