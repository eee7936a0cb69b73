use serde::{Deserialize, Serialize};

/// Readings reported for one nozzle. Every field is the raw token as printed;
/// a field the receipt did not yield stays empty rather than absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct NozzleReading {
    #[serde(rename = "NOZZLE")]
    pub nozzle_id: String,
    #[serde(rename = "A")]
    pub volume_a: String,
    #[serde(rename = "V")]
    pub volume_v: String,
    #[serde(rename = "TOT SALES")]
    pub total_sales: String,
}

impl NozzleReading {
    /// A freshly opened nozzle: id set, readings empty.
    pub fn open(nozzle_id: impl Into<String>) -> Self {
        Self { nozzle_id: nozzle_id.into(), ..Self::default() }
    }
}

/// The structured contents of one printed pump receipt.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReceiptRecord {
    #[serde(rename = "PRINT DATE")]
    pub print_date: String,
    #[serde(rename = "PUMP SERIAL NUMBER")]
    pub pump_serial_number: String,
    /// In the order the nozzles first appear on the receipt.
    #[serde(rename = "NOZZLES")]
    pub nozzles: Vec<NozzleReading>,
}

impl ReceiptRecord {
    /// True when nothing at all was recognised.
    pub fn is_empty(&self) -> bool {
        self.print_date.is_empty() && self.pump_serial_number.is_empty() && self.nozzles.is_empty()
    }
}

impl std::fmt::Display for ReceiptRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "PRINT DATE: {}", self.print_date)?;
        writeln!(f, "PUMP SERIAL NUMBER: {}", self.pump_serial_number)?;
        for n in &self.nozzles {
            writeln!(f, "NOZZLE : {}", n.nozzle_id)?;
            writeln!(f, "A: {}", n.volume_a)?;
            writeln!(f, "V: {}", n.volume_v)?;
            writeln!(f, "TOT SALES: {}", n.total_sales)?;
            writeln!(f, "{}", "-".repeat(30))?;
        }
        Ok(())
    }
}

/// Which region of the scanned image a result came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReceiptPart {
    Whole,
    Left,
    Right,
}

impl std::fmt::Display for ReceiptPart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReceiptPart::Whole => write!(f, "whole"),
            ReceiptPart::Left => write!(f, "left"),
            ReceiptPart::Right => write!(f, "right"),
        }
    }
}

/// One receipt's extracted record paired with the OCR text it came from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OcrResult {
    pub part: ReceiptPart,
    #[serde(rename = "data")]
    pub record: ReceiptRecord,
    /// Kept for auditing even when the record came out empty.
    #[serde(rename = "ocr_text")]
    pub raw_text: String,
}
