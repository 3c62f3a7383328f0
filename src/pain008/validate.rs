//! Structural validation of generated pain.008 XML.
//!
//! Re-parses a serialized document and checks it against the grammar of the
//! target schema revision: element presence, lexical field formats, counts
//! and control sums. Returns every diagnostic found, in document order.

use chrono::{NaiveDate, NaiveDateTime};
use quick_xml::events::Event;
use quick_xml::Reader;
use rust_decimal::Decimal;
use std::str::FromStr;

use super::SchemaFormat;
use crate::core::Diagnostic;

/// Result of validating one document.
#[derive(Debug, Clone)]
pub struct SchemaReport {
    diagnostics: Vec<Diagnostic>,
}

impl SchemaReport {
    pub fn is_valid(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }
}

/// Validate a serialized pain.008 document against the given format.
pub fn validate_document(xml: &str, format: SchemaFormat) -> SchemaReport {
    let mut diagnostics = Vec::new();

    let root = match parse_tree(xml) {
        Ok(root) => root,
        Err(message) => {
            diagnostics.push(Diagnostic::new("Document", message));
            return SchemaReport { diagnostics };
        }
    };

    check_document(&root, format, &mut diagnostics);
    SchemaReport { diagnostics }
}

// --- Minimal element tree -------------------------------------------------

struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    text: String,
    children: Vec<Element>,
}

impl Element {
    fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> {
        self.children.iter().filter(move |c| c.name == name)
    }

    fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Text content of a nested child, following a slash-free path.
    fn text_at(&self, path: &[&str]) -> Option<&str> {
        let mut node = self;
        for name in path {
            node = node.child(name)?;
        }
        Some(node.text.trim())
    }
}

fn parse_tree(xml: &str) -> Result<Element, String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) => {
                let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
                let mut attributes = Vec::new();
                for attr in start.attributes() {
                    let attr = attr.map_err(|e| format!("malformed attribute: {e}"))?;
                    let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
                    let value = attr
                        .unescape_value()
                        .map_err(|e| format!("malformed attribute value: {e}"))?
                        .into_owned();
                    attributes.push((key, value));
                }
                stack.push(Element {
                    name,
                    attributes,
                    text: String::new(),
                    children: Vec::new(),
                });
            }
            Ok(Event::Text(text)) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(
                        &text
                            .unescape()
                            .map_err(|e| format!("malformed text: {e}"))?,
                    );
                }
            }
            Ok(Event::Empty(start)) => {
                let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
                let element = Element {
                    name,
                    attributes: Vec::new(),
                    text: String::new(),
                    children: Vec::new(),
                };
                match stack.last_mut() {
                    Some(parent) => parent.children.push(element),
                    None => root = Some(element),
                }
            }
            Ok(Event::End(_)) => {
                let element = stack.pop().ok_or("unbalanced end tag")?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(element),
                    None => root = Some(element),
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(format!("not well-formed: {e}")),
        }
    }

    if !stack.is_empty() {
        return Err("unclosed elements at end of document".into());
    }
    root.ok_or_else(|| "empty document".into())
}

// --- Grammar checks -------------------------------------------------------

const MAX_ID: usize = 35;
const MAX_NAME: usize = 70;

fn check_document(root: &Element, format: SchemaFormat, out: &mut Vec<Diagnostic>) {
    if root.name != "Document" {
        out.push(Diagnostic::new(
            "Document",
            format!("unexpected root element '{}'", root.name),
        ));
        return;
    }
    match root.attribute("xmlns") {
        Some(ns) if ns == format.namespace() => {}
        Some(ns) => out.push(Diagnostic::new(
            "Document",
            format!("namespace '{}' does not match format {}", ns, format),
        )),
        None => out.push(Diagnostic::new("Document", "missing xmlns declaration")),
    }

    let Some(initn) = root.child("CstmrDrctDbtInitn") else {
        out.push(Diagnostic::new("Document", "missing CstmrDrctDbtInitn"));
        return;
    };

    let payment_infos: Vec<&Element> = initn.children_named("PmtInf").collect();
    let transactions: Vec<&Element> = payment_infos
        .iter()
        .flat_map(|p| p.children_named("DrctDbtTxInf"))
        .collect();

    match initn.child("GrpHdr") {
        Some(header) => check_group_header(header, &transactions, out),
        None => out.push(Diagnostic::new("CstmrDrctDbtInitn", "missing GrpHdr")),
    }

    if payment_infos.is_empty() {
        out.push(Diagnostic::new(
            "CstmrDrctDbtInitn",
            "at least one PmtInf is required",
        ));
    }
    for info in payment_infos {
        check_payment_info(info, format, out);
    }
}

fn check_group_header(header: &Element, transactions: &[&Element], out: &mut Vec<Diagnostic>) {
    check_id(header, "MsgId", "GrpHdr/MsgId", out);

    match header.text_at(&["CreDtTm"]) {
        Some(value) => {
            let raw = value.strip_suffix('Z').unwrap_or(value);
            if NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S").is_err() {
                out.push(Diagnostic::new(
                    "GrpHdr/CreDtTm",
                    format!("'{value}' is not an ISO date-time"),
                ));
            }
        }
        None => out.push(Diagnostic::new("GrpHdr/CreDtTm", "missing creation date-time")),
    }

    check_transaction_count(header, transactions.len(), "GrpHdr", out);
    check_control_sum(header, transactions, "GrpHdr", out);

    match header.text_at(&["InitgPty", "Nm"]) {
        Some(name) if !name.is_empty() && name.len() <= MAX_NAME => {}
        Some(_) => out.push(Diagnostic::new(
            "GrpHdr/InitgPty/Nm",
            format!("initiating party name must be 1-{MAX_NAME} characters"),
        )),
        None => out.push(Diagnostic::new("GrpHdr/InitgPty/Nm", "missing initiating party name")),
    }
}

fn check_payment_info(info: &Element, format: SchemaFormat, out: &mut Vec<Diagnostic>) {
    check_id(info, "PmtInfId", "PmtInf/PmtInfId", out);

    if info.text_at(&["PmtMtd"]) != Some("DD") {
        out.push(Diagnostic::new("PmtInf/PmtMtd", "payment method must be 'DD'"));
    }
    if let Some(booking) = info.text_at(&["BtchBookg"]) {
        if booking != "true" && booking != "false" {
            out.push(Diagnostic::new(
                "PmtInf/BtchBookg",
                format!("'{booking}' is not a boolean"),
            ));
        }
    }

    match info.text_at(&["PmtTpInf", "SeqTp"]) {
        Some(code) if matches!(code, "FRST" | "RCUR" | "FNAL" | "OOFF") => {}
        Some(code) => out.push(Diagnostic::new(
            "PmtInf/PmtTpInf/SeqTp",
            format!("'{code}' is not a sequence-type code"),
        )),
        None => out.push(Diagnostic::new("PmtInf/PmtTpInf/SeqTp", "missing sequence type")),
    }

    check_date(info, &["ReqdColltnDt"], "PmtInf/ReqdColltnDt", out);
    check_name(info, &["Cdtr", "Nm"], "PmtInf/Cdtr/Nm", out);
    check_iban(info, &["CdtrAcct", "Id", "IBAN"], "PmtInf/CdtrAcct", out);
    check_bic(info, &["CdtrAgt", "FinInstnId", format.bic_element()], "PmtInf/CdtrAgt", out);

    match info.text_at(&["CdtrSchmeId", "Id", "PrvtId", "Othr", "Id"]) {
        Some(id) if !id.is_empty() => {}
        _ => out.push(Diagnostic::new(
            "PmtInf/CdtrSchmeId",
            "missing creditor scheme identifier",
        )),
    }

    let transactions: Vec<&Element> = info.children_named("DrctDbtTxInf").collect();
    if transactions.is_empty() {
        out.push(Diagnostic::new("PmtInf", "at least one DrctDbtTxInf is required"));
    }
    check_transaction_count(info, transactions.len(), "PmtInf", out);
    check_control_sum(info, &transactions, "PmtInf", out);

    for tx in transactions {
        check_transaction(tx, format, out);
    }
}

fn check_transaction(tx: &Element, format: SchemaFormat, out: &mut Vec<Diagnostic>) {
    match tx.text_at(&["PmtId", "EndToEndId"]) {
        Some(id) if !id.is_empty() && id.len() <= MAX_ID => {}
        Some(_) => out.push(Diagnostic::new(
            "DrctDbtTxInf/PmtId/EndToEndId",
            format!("identifier must be 1-{MAX_ID} characters"),
        )),
        None => out.push(Diagnostic::new(
            "DrctDbtTxInf/PmtId/EndToEndId",
            "missing end-to-end identifier",
        )),
    }

    match tx.child("InstdAmt") {
        Some(amount) => {
            match Decimal::from_str(amount.text.trim()) {
                Ok(value) if value > Decimal::ZERO => {}
                Ok(_) => out.push(Diagnostic::new(
                    "DrctDbtTxInf/InstdAmt",
                    "amount must be positive",
                )),
                Err(_) => out.push(Diagnostic::new(
                    "DrctDbtTxInf/InstdAmt",
                    format!("'{}' is not a decimal amount", amount.text.trim()),
                )),
            }
            if amount.attribute("Ccy").is_none() {
                out.push(Diagnostic::new(
                    "DrctDbtTxInf/InstdAmt",
                    "missing Ccy currency attribute",
                ));
            }
        }
        None => out.push(Diagnostic::new("DrctDbtTxInf/InstdAmt", "missing amount")),
    }

    match tx.text_at(&["DrctDbtTx", "MndtRltdInf", "MndtId"]) {
        Some(id) if !id.is_empty() && id.len() <= MAX_ID => {}
        _ => out.push(Diagnostic::new(
            "DrctDbtTxInf/DrctDbtTx/MndtRltdInf/MndtId",
            format!("mandate reference must be 1-{MAX_ID} characters"),
        )),
    }
    check_date(
        tx,
        &["DrctDbtTx", "MndtRltdInf", "DtOfSgntr"],
        "DrctDbtTxInf/DrctDbtTx/MndtRltdInf/DtOfSgntr",
        out,
    );

    check_bic(tx, &["DbtrAgt", "FinInstnId", format.bic_element()], "DrctDbtTxInf/DbtrAgt", out);
    check_name(tx, &["Dbtr", "Nm"], "DrctDbtTxInf/Dbtr/Nm", out);
    check_iban(tx, &["DbtrAcct", "Id", "IBAN"], "DrctDbtTxInf/DbtrAcct", out);
}

fn check_id(parent: &Element, name: &str, path: &str, out: &mut Vec<Diagnostic>) {
    match parent.text_at(&[name]) {
        Some(id) if !id.is_empty() && id.len() <= MAX_ID => {}
        Some(_) => out.push(Diagnostic::new(
            path,
            format!("identifier must be 1-{MAX_ID} characters"),
        )),
        None => out.push(Diagnostic::new(path, "missing identifier")),
    }
}

fn check_name(parent: &Element, steps: &[&str], path: &str, out: &mut Vec<Diagnostic>) {
    match parent.text_at(steps) {
        Some(name) if !name.is_empty() && name.len() <= MAX_NAME => {}
        Some(_) => out.push(Diagnostic::new(
            path,
            format!("name must be 1-{MAX_NAME} characters"),
        )),
        None => out.push(Diagnostic::new(path, "missing name")),
    }
}

fn check_date(parent: &Element, steps: &[&str], path: &str, out: &mut Vec<Diagnostic>) {
    match parent.text_at(steps) {
        Some(value) if NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok() => {}
        Some(value) => out.push(Diagnostic::new(
            path,
            format!("'{value}' is not an ISO date"),
        )),
        None => out.push(Diagnostic::new(path, "missing date")),
    }
}

fn check_iban(parent: &Element, steps: &[&str], path: &str, out: &mut Vec<Diagnostic>) {
    match parent.text_at(steps) {
        Some(iban) if is_lexical_iban(iban) => {}
        Some(iban) => out.push(Diagnostic::new(
            path,
            format!("'{iban}' does not match the IBAN pattern"),
        )),
        None => out.push(Diagnostic::new(path, "missing IBAN")),
    }
}

fn check_bic(parent: &Element, steps: &[&str], path: &str, out: &mut Vec<Diagnostic>) {
    match parent.text_at(steps) {
        Some(bic) if is_lexical_bic(bic) => {}
        Some(bic) => out.push(Diagnostic::new(
            path,
            format!("'{bic}' does not match the BIC pattern"),
        )),
        None => out.push(Diagnostic::new(path, "missing BIC")),
    }
}

fn check_transaction_count(parent: &Element, actual: usize, path: &str, out: &mut Vec<Diagnostic>) {
    match parent.text_at(&["NbOfTxs"]).map(str::parse::<usize>) {
        Some(Ok(declared)) if declared == actual => {}
        Some(Ok(declared)) => out.push(Diagnostic::new(
            format!("{path}/NbOfTxs"),
            format!("declares {declared} transactions but {actual} are present"),
        )),
        Some(Err(_)) => out.push(Diagnostic::new(
            format!("{path}/NbOfTxs"),
            "transaction count is not numeric",
        )),
        None => out.push(Diagnostic::new(
            format!("{path}/NbOfTxs"),
            "missing transaction count",
        )),
    }
}

fn check_control_sum(
    parent: &Element,
    transactions: &[&Element],
    path: &str,
    out: &mut Vec<Diagnostic>,
) {
    let actual: Decimal = transactions
        .iter()
        .filter_map(|tx| tx.child("InstdAmt"))
        .filter_map(|amt| Decimal::from_str(amt.text.trim()).ok())
        .sum();

    match parent.text_at(&["CtrlSum"]).map(Decimal::from_str) {
        Some(Ok(declared)) if declared == actual => {}
        Some(Ok(declared)) => out.push(Diagnostic::new(
            format!("{path}/CtrlSum"),
            format!("declares {declared} but transactions sum to {actual}"),
        )),
        Some(Err(_)) => out.push(Diagnostic::new(
            format!("{path}/CtrlSum"),
            "control sum is not a decimal",
        )),
        None => out.push(Diagnostic::new(format!("{path}/CtrlSum"), "missing control sum")),
    }
}

fn is_lexical_iban(value: &str) -> bool {
    let bytes = value.as_bytes();
    value.len() >= 15
        && value.len() <= 34
        && bytes[0].is_ascii_uppercase()
        && bytes[1].is_ascii_uppercase()
        && bytes[2].is_ascii_digit()
        && bytes[3].is_ascii_digit()
        && bytes[4..].iter().all(|b| b.is_ascii_alphanumeric())
}

fn is_lexical_bic(value: &str) -> bool {
    crate::core::validate_bic(value)
}
