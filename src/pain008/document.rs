use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::xml_utils::XmlWriter;
use super::SchemaFormat;
use crate::core::{ExportError, SequenceType};

/// One SEPA direct-debit initiation document: a single payment-information
/// block for one sequence type, plus its debit transactions.
///
/// The creation instant is fixed at construction so that serializing the
/// same document twice yields byte-identical XML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectDebitDocument {
    /// Message identifier (`GrpHdr/MsgId`), derived from the selection hash.
    pub message_id: String,
    /// Initiating party name (`InitgPty/Nm`), the sanitized creditor name.
    pub initiating_party: String,
    pub format: SchemaFormat,
    created_at: DateTime<Utc>,
    /// Payment-information identifier (`PmtInf/PmtInfId`).
    pub payment_info_id: String,
    pub creditor_name: String,
    pub creditor_iban: String,
    /// Creditor agent BIC, already padded to 11 characters.
    pub creditor_bic: String,
    /// Creditor identifier (ICS).
    pub creditor_id: String,
    pub sequence_type: SequenceType,
    /// Requested collection date (`ReqdColltnDt`).
    pub collection_date: NaiveDate,
    pub batch_booking: bool,
    transfers: Vec<Transfer>,
}

/// One debit transaction (`DrctDbtTxInf`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transfer {
    /// End-to-end identifier, separator-free.
    pub end_to_end_id: String,
    pub amount: Decimal,
    pub debtor_iban: String,
    /// Debtor agent BIC, already padded to 11 characters.
    pub debtor_bic: String,
    /// Sanitized debtor display name.
    pub debtor_name: String,
    /// Mandate reference (`MndtId`).
    pub mandate_id: String,
    /// Mandate signature date (`DtOfSgntr`).
    pub mandate_sign_date: NaiveDate,
    /// Unstructured remittance information (`RmtInf/Ustrd`).
    pub remittance: String,
}

impl DirectDebitDocument {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        message_id: impl Into<String>,
        initiating_party: impl Into<String>,
        format: SchemaFormat,
        created_at: DateTime<Utc>,
        payment_info_id: impl Into<String>,
        creditor_name: impl Into<String>,
        creditor_iban: impl Into<String>,
        creditor_bic: impl Into<String>,
        creditor_id: impl Into<String>,
        sequence_type: SequenceType,
        collection_date: NaiveDate,
        batch_booking: bool,
    ) -> Self {
        Self {
            message_id: message_id.into(),
            initiating_party: initiating_party.into(),
            format,
            created_at,
            payment_info_id: payment_info_id.into(),
            creditor_name: creditor_name.into(),
            creditor_iban: creditor_iban.into(),
            creditor_bic: creditor_bic.into(),
            creditor_id: creditor_id.into(),
            sequence_type,
            collection_date,
            batch_booking,
            transfers: Vec::new(),
        }
    }

    pub fn add_transfer(&mut self, transfer: Transfer) {
        self.transfers.push(transfer);
    }

    pub fn transfers(&self) -> &[Transfer] {
        &self.transfers
    }

    /// Sum of all transaction amounts (`CtrlSum`).
    pub fn control_sum(&self) -> Decimal {
        self.transfers.iter().map(|t| t.amount).sum()
    }

    /// Serialize to pain.008 XML. Deterministic for a given document.
    pub fn to_xml(&self) -> Result<String, ExportError> {
        if self.transfers.is_empty() {
            return Err(ExportError::Document(format!(
                "document {} has no transactions",
                self.message_id
            )));
        }

        let bic_tag = self.format.bic_element();
        let tx_count = self.transfers.len().to_string();
        let control_sum = super::xml_utils::format_amount(self.control_sum());
        let mut w = XmlWriter::new()?;

        w.start_element_with_attrs(
            "Document",
            &[
                ("xmlns", self.format.namespace()),
                ("xmlns:xsi", "http://www.w3.org/2001/XMLSchema-instance"),
            ],
        )?;
        w.start_element("CstmrDrctDbtInitn")?;

        w.start_element("GrpHdr")?;
        w.text_element("MsgId", &self.message_id)?;
        w.text_element(
            "CreDtTm",
            &self.created_at.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        )?;
        w.text_element("NbOfTxs", &tx_count)?;
        w.text_element("CtrlSum", &control_sum)?;
        w.start_element("InitgPty")?;
        w.text_element("Nm", &self.initiating_party)?;
        w.end_element("InitgPty")?;
        w.end_element("GrpHdr")?;

        w.start_element("PmtInf")?;
        w.text_element("PmtInfId", &self.payment_info_id)?;
        w.text_element("PmtMtd", "DD")?;
        w.text_element("BtchBookg", if self.batch_booking { "true" } else { "false" })?;
        w.text_element("NbOfTxs", &tx_count)?;
        w.text_element("CtrlSum", &control_sum)?;

        w.start_element("PmtTpInf")?;
        w.start_element("SvcLvl")?;
        w.text_element("Cd", "SEPA")?;
        w.end_element("SvcLvl")?;
        w.start_element("LclInstrm")?;
        w.text_element("Cd", "CORE")?;
        w.end_element("LclInstrm")?;
        w.text_element("SeqTp", self.sequence_type.code())?;
        w.end_element("PmtTpInf")?;

        w.text_element("ReqdColltnDt", &self.collection_date.to_string())?;
        w.start_element("Cdtr")?;
        w.text_element("Nm", &self.creditor_name)?;
        w.end_element("Cdtr")?;
        w.start_element("CdtrAcct")?;
        w.start_element("Id")?;
        w.text_element("IBAN", &self.creditor_iban)?;
        w.end_element("Id")?;
        w.end_element("CdtrAcct")?;
        w.start_element("CdtrAgt")?;
        w.start_element("FinInstnId")?;
        w.text_element(bic_tag, &self.creditor_bic)?;
        w.end_element("FinInstnId")?;
        w.end_element("CdtrAgt")?;
        w.text_element("ChrgBr", "SLEV")?;

        w.start_element("CdtrSchmeId")?;
        w.start_element("Id")?;
        w.start_element("PrvtId")?;
        w.start_element("Othr")?;
        w.text_element("Id", &self.creditor_id)?;
        w.start_element("SchmeNm")?;
        w.text_element("Prtry", "SEPA")?;
        w.end_element("SchmeNm")?;
        w.end_element("Othr")?;
        w.end_element("PrvtId")?;
        w.end_element("Id")?;
        w.end_element("CdtrSchmeId")?;

        for transfer in &self.transfers {
            w.start_element("DrctDbtTxInf")?;
            w.start_element("PmtId")?;
            w.text_element("EndToEndId", &transfer.end_to_end_id)?;
            w.end_element("PmtId")?;
            w.amount_element("InstdAmt", transfer.amount, "EUR")?;
            w.start_element("DrctDbtTx")?;
            w.start_element("MndtRltdInf")?;
            w.text_element("MndtId", &transfer.mandate_id)?;
            w.text_element("DtOfSgntr", &transfer.mandate_sign_date.to_string())?;
            w.end_element("MndtRltdInf")?;
            w.end_element("DrctDbtTx")?;
            w.start_element("DbtrAgt")?;
            w.start_element("FinInstnId")?;
            w.text_element(bic_tag, &transfer.debtor_bic)?;
            w.end_element("FinInstnId")?;
            w.end_element("DbtrAgt")?;
            w.start_element("Dbtr")?;
            w.text_element("Nm", &transfer.debtor_name)?;
            w.end_element("Dbtr")?;
            w.start_element("DbtrAcct")?;
            w.start_element("Id")?;
            w.text_element("IBAN", &transfer.debtor_iban)?;
            w.end_element("Id")?;
            w.end_element("DbtrAcct")?;
            w.start_element("RmtInf")?;
            w.text_element("Ustrd", &transfer.remittance)?;
            w.end_element("RmtInf")?;
            w.end_element("DrctDbtTxInf")?;
        }

        w.end_element("PmtInf")?;
        w.end_element("CstmrDrctDbtInitn")?;
        w.end_element("Document")?;
        w.into_string()
    }
}
