use std::sync::OnceLock;

use regex::Regex;

use crate::types::{NozzleReading, ReceiptRecord};

// ── Compiled regex cache ─────────────────────────────────────────────────────

macro_rules! re {
    ($name:ident, $pat:expr) => {
        fn $name() -> &'static Regex {
            static R: OnceLock<Regex> = OnceLock::new();
            R.get_or_init(|| Regex::new($pat).expect("invalid regex"))
        }
    };
}

re!(re_print_date,
    r"(?i)PRINT\s*DATE\s*[:\-]?\s*([0-9A-Z\-]+)");
re!(re_pump_serial,
    r"(?i)PUMP\s*SERIAL\s*NUMBER\s*[:\-]?\s*([A-Z0-9]+)");
re!(re_nozzle,
    r"(?i)NOZZLE\s*[:\-]?\s*(\d+)");
// Single-letter labels must not be the tail of a word ("SALES", "DATA").
re!(re_volume_a,
    r"(?i)(?:^|[^A-Z])A\s*[:\-]?\s*(\d+\.?\d*|\.\d+)");
re!(re_volume_v,
    r"(?i)(?:^|[^A-Z])V\s*[:\-]?\s*(\d+\.?\d*|\.\d+)");
re!(re_total_sales,
    r"(?i)TOT\s*SALES\s*[:\-]?\s*(\d+)");

// ── Line rules ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    PrintDate,
    PumpSerial,
    NozzleStart,
    VolumeA,
    VolumeV,
    TotalSales,
}

/// Tried in this order on every line; a line may hit several.
const RULES: [(Field, fn() -> &'static Regex); 6] = [
    (Field::PrintDate, re_print_date),
    (Field::PumpSerial, re_pump_serial),
    (Field::NozzleStart, re_nozzle),
    (Field::VolumeA, re_volume_a),
    (Field::VolumeV, re_volume_v),
    (Field::TotalSales, re_total_sales),
];

/// Accumulator threaded through the line fold.
#[derive(Debug, Default)]
struct ScanState {
    record: ReceiptRecord,
    /// Nozzle whose readings are still being collected.
    open: Option<NozzleReading>,
}

impl ScanState {
    fn apply(mut self, field: Field, value: &str) -> Self {
        match field {
            Field::PrintDate => self.record.print_date = value.to_string(),
            Field::PumpSerial => self.record.pump_serial_number = value.to_string(),
            Field::NozzleStart => {
                if let Some(done) = self.open.replace(NozzleReading::open(value)) {
                    self.record.nozzles.push(done);
                }
            }
            // Readings before the first NOZZLE line have nowhere to go.
            Field::VolumeA => self.set_reading(|n| &mut n.volume_a, value),
            Field::VolumeV => self.set_reading(|n| &mut n.volume_v, value),
            Field::TotalSales => self.set_reading(|n| &mut n.total_sales, value),
        }
        self
    }

    fn set_reading(&mut self, slot: fn(&mut NozzleReading) -> &mut String, value: &str) {
        if let Some(nozzle) = self.open.as_mut() {
            *slot(nozzle) = value.to_string();
        }
    }

    fn scan_line(self, line: &str) -> Self {
        RULES.iter().fold(self, |state, (field, pattern)| {
            match pattern().captures(line).and_then(|c| c.get(1)) {
                Some(m) => state.apply(*field, m.as_str()),
                None => state,
            }
        })
    }

    fn finish(mut self) -> ReceiptRecord {
        if let Some(last) = self.open.take() {
            self.record.nozzles.push(last);
        }
        self.record
    }
}

// ── Public extraction API ─────────────────────────────────────────────────────

pub struct Extractor;

impl Extractor {
    /// Extract structured fields from raw OCR text.
    ///
    /// Never fails: anything that cannot be found is left empty.
    pub fn extract(ocr_text: &str) -> ReceiptRecord {
        ocr_text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .fold(ScanState::default(), ScanState::scan_line)
            .finish()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn nozzle(id: &str, a: &str, v: &str, sales: &str) -> NozzleReading {
        NozzleReading {
            nozzle_id: id.into(),
            volume_a: a.into(),
            volume_v: v.into(),
            total_sales: sales.into(),
        }
    }

    // ── Totality ─────────────────────────────────────────────────────────────

    #[test]
    fn empty_text_gives_empty_record() {
        assert_eq!(Extractor::extract(""), ReceiptRecord::default());
    }

    #[test]
    fn blank_lines_only() {
        assert_eq!(Extractor::extract("\n   \n\t\n\r\n"), ReceiptRecord::default());
    }

    #[test]
    fn no_panic_on_garbage_input() {
        let _ = Extractor::extract("!@#$%^&*()\n\0\x01\x02\nNOZZLE\nA:\n:::\u{1F600}");
    }

    // ── Header fields ────────────────────────────────────────────────────────

    #[test]
    fn print_date_and_serial() {
        let r = Extractor::extract("PRINT DATE: 2024-03-15\nPUMP SERIAL NUMBER: PS4471");
        assert_eq!(r.print_date, "2024-03-15");
        assert_eq!(r.pump_serial_number, "PS4471");
        assert!(r.nozzles.is_empty());
    }

    #[test]
    fn last_print_date_wins() {
        let r = Extractor::extract("PRINT DATE: 01-JAN-24\nsomething\nPRINT DATE: 02-JAN-24");
        assert_eq!(r.print_date, "02-JAN-24");
    }

    #[test]
    fn labels_are_case_insensitive() {
        let r = Extractor::extract("pump serial number: ABC123");
        assert_eq!(r.pump_serial_number, "ABC123");
    }

    #[test]
    fn separator_may_be_hyphen_space_or_absent() {
        assert_eq!(Extractor::extract("PRINT DATE - 15MAR24").print_date, "15MAR24");
        assert_eq!(Extractor::extract("PRINT DATE 15MAR24").print_date, "15MAR24");
        assert_eq!(Extractor::extract("PRINTDATE15MAR24").print_date, "15MAR24");
        assert_eq!(Extractor::extract("PUMP SERIAL NUMBER X9").pump_serial_number, "X9");
    }

    #[test]
    fn print_date_stops_at_time() {
        let r = Extractor::extract("  PRINT DATE: 2024-03-15 10:42  ");
        assert_eq!(r.print_date, "2024-03-15");
    }

    // ── Nozzles ──────────────────────────────────────────────────────────────

    #[test]
    fn trailing_nozzle_is_flushed() {
        let r = Extractor::extract("NOZZLE: 1\nA: 10.5\nV: 2.3\nTOT SALES: 100");
        assert_eq!(r.nozzles, vec![nozzle("1", "10.5", "2.3", "100")]);
    }

    #[test]
    fn nozzles_keep_first_seen_order() {
        let r = Extractor::extract("NOZZLE:1\nA:5\nNOZZLE:2\nA:7");
        assert_eq!(r.nozzles, vec![nozzle("1", "5", "", ""), nozzle("2", "7", "", "")]);
    }

    #[test]
    fn repeated_nozzle_id_is_not_merged() {
        let r = Extractor::extract("NOZZLE 1\nA 1\nNOZZLE 1\nA 2");
        assert_eq!(r.nozzles.len(), 2);
        assert_eq!(r.nozzles[0].volume_a, "1");
        assert_eq!(r.nozzles[1].volume_a, "2");
    }

    #[test]
    fn closed_nozzle_is_not_backfilled() {
        let r = Extractor::extract("NOZZLE: 1\nNOZZLE: 2\nV: 3.3");
        assert_eq!(r.nozzles[0], nozzle("1", "", "", ""));
        assert_eq!(r.nozzles[1], nozzle("2", "", "3.3", ""));
    }

    #[test]
    fn orphan_reading_is_dropped() {
        let r = Extractor::extract("A: 99");
        assert!(r.nozzles.is_empty());
        let r = Extractor::extract("TOT SALES: 400\nV: 1.0");
        assert!(r.nozzles.is_empty());
    }

    #[test]
    fn later_reading_overwrites_earlier() {
        let r = Extractor::extract("NOZZLE: 4\nA: 1.0\nA: 2.0");
        assert_eq!(r.nozzles[0].volume_a, "2.0");
    }

    #[test]
    fn several_fields_on_one_line() {
        let r = Extractor::extract("NOZZLE: 3 A: 12.25 V: 9.5 TOT SALES: 7700");
        assert_eq!(r.nozzles, vec![nozzle("3", "12.25", "9.5", "7700")]);
    }

    #[test]
    fn total_sales_is_integer_only() {
        let r = Extractor::extract("NOZZLE: 1\nTOT SALES: 1234.56");
        assert_eq!(r.nozzles[0].total_sales, "1234");
    }

    #[test]
    fn volume_takes_a_single_decimal_point() {
        let r = Extractor::extract("NOZZLE: 1\nA: 1.2.3\nV: 4.5.6");
        assert_eq!(r.nozzles[0].volume_a, "1.2");
        assert_eq!(r.nozzles[0].volume_v, "4.5");
    }

    #[test]
    fn volume_keeps_raw_token_around_the_point() {
        let r = Extractor::extract("NOZZLE: 1\nA: .5\nV: 10.");
        assert_eq!(r.nozzles[0].volume_a, ".5");
        assert_eq!(r.nozzles[0].volume_v, "10.");

        let r = Extractor::extract("NOZZLE: 2\nA: 10.\nV: .25");
        assert_eq!(r.nozzles[0].volume_a, "10.");
        assert_eq!(r.nozzles[0].volume_v, ".25");
    }

    #[test]
    fn lone_point_is_not_a_volume() {
        let r = Extractor::extract("NOZZLE: 1\nA: .");
        assert_eq!(r.nozzles[0].volume_a, "");
    }

    #[test]
    fn a_inside_words_is_not_a_label() {
        // The A in SALES must not be read as a volume label.
        let r = Extractor::extract("NOZZLE: 2\nTOT SALES: 500\nDATA 77");
        assert_eq!(r.nozzles[0].volume_a, "");
        assert_eq!(r.nozzles[0].total_sales, "500");
    }

    #[test]
    fn full_receipt() {
        let text = "\
            FUEL STATION 12\n\
            PRINT DATE: 2024-06-30\n\
            PUMP SERIAL NUMBER: DX20931\n\
            \n\
            NOZZLE : 1\n\
            A: 15234.75\n\
            V: 11020.10\n\
            TOT SALES: 884512\n\
            ------------------------------\n\
            NOZZLE : 2\n\
            a - 733.5\n\
            v - 640\n\
            tot sales - 51000\n";
        let r = Extractor::extract(text);
        assert_eq!(r.print_date, "2024-06-30");
        assert_eq!(r.pump_serial_number, "DX20931");
        assert_eq!(
            r.nozzles,
            vec![
                nozzle("1", "15234.75", "11020.10", "884512"),
                nozzle("2", "733.5", "640", "51000"),
            ]
        );
    }

    #[test]
    fn crlf_line_endings() {
        let r = Extractor::extract("NOZZLE: 1\r\nA: 3.5\r\n");
        assert_eq!(r.nozzles, vec![nozzle("1", "3.5", "", "")]);
    }
}
