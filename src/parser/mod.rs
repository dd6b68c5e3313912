pub mod lines;
pub mod record;
pub mod sections;
pub mod status;

pub use record::{BillRecord, HistoryEntry, RawDocument};

/// Three-stage pipeline: text → classified lines → sections → record.
pub fn extract_record(doc: &RawDocument) -> BillRecord {
    let lines = lines::classify_lines(&doc.text);
    let sections = sections::accumulate(&lines);
    record::assemble(doc, sections)
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use record::Chamber;

    fn extract(text: &str) -> BillRecord {
        extract_record(&RawDocument {
            identifier: "0001".to_string(),
            session_id: 126,
            text: text.to_string(),
        })
    }

    #[test]
    fn example_bill() {
        let r = extract("S*0001\nSummary:\nEXAMPLE SUMMARY\n12/04/24 Senate Introduced and adopted");
        assert_eq!(r.title_line.as_deref(), Some("S*0001"));
        assert_eq!(r.summary_text, "EXAMPLE SUMMARY");
        assert_eq!(r.headline.as_deref(), Some("EXAMPLE SUMMARY"));
        assert_eq!(r.history.len(), 1);
        assert_eq!(r.history[0].date_text, "12/04/24");
        assert_eq!(r.history[0].chamber, "Senate");
        assert_eq!(r.history[0].action, "Introduced and adopted");
        assert_eq!(r.current_status, "12/04/24 Senate Introduced and adopted");
        assert_eq!(r.chamber, Chamber::Senate);
    }

    #[test]
    fn empty_text() {
        let r = extract("");
        assert_eq!(r.title_line, None);
        assert_eq!(r.summary_text, "");
        assert!(r.history.is_empty());
        assert_eq!(r.current_status, "No history");
        assert!(r.is_empty());
    }

    #[test]
    fn nothing_recognisable() {
        let r = extract("just some words\nand more words");
        assert!(r.is_empty());
        assert_eq!(r.current_status, "No history");
    }

    #[test]
    fn later_date_listed_second() {
        let r = extract("01/02/23 House Referred\n12/04/24 Senate Adopted");
        assert_eq!(r.history[0].date_text, "01/02/23");
        assert_eq!(r.history[1].date_text, "12/04/24");
        assert_eq!(r.current_status, "12/04/24 Senate Adopted");
    }

    #[test]
    fn later_date_listed_first() {
        let r = extract("12/04/24 Senate Adopted\n01/02/23 House Referred");
        assert_eq!(r.history[0].date_text, "12/04/24");
        assert_eq!(r.current_status, "12/04/24 Senate Adopted");
    }

    #[test]
    fn unparsable_date_loses() {
        let r = extract("01/02/23 House Referred\n99/99/99 Senate Filed");
        assert_eq!(r.history.len(), 2);
        assert_eq!(r.history[1].parsed_date, None);
        assert_eq!(r.current_status, "01/02/23 House Referred");
    }

    #[test]
    fn status_empty_iff_no_history() {
        for text in ["", "S*0001", "Summary:\nX", "12/04/24 Senate", "12/04/24 Senate Adopted"] {
            let r = extract(text);
            assert_eq!(r.current_status == "No history", r.history.is_empty(), "{text:?}");
        }
    }

    #[test]
    fn fixture_bill() {
        let text = std::fs::read_to_string("tests/fixtures/s0001.txt").unwrap();
        let r = extract(&text);
        assert_eq!(r.title_line.as_deref(), Some("S*0001 (Word version) -- Senators Massey and Peeler"));
        assert_eq!(r.summary_title.as_deref(), Some("Senate Rules"));
        assert_eq!(r.headline.as_deref(), Some("SENATE RULES FOR THE 126TH GENERAL ASSEMBLY"));
        assert!(r.summary_text.starts_with("SENATE RULES FOR THE 126TH GENERAL ASSEMBLY A Senate Resolution"));
        assert!(!r.summary_text.contains("12/03/24"));
        assert_eq!(r.history.len(), 4);
        assert_eq!(r.history[3].parsed_date, None);
        assert_eq!(r.current_status, "01/14/25 Senate Adopted as amended");
        assert_eq!(r.bill_number(), "0001");
    }

    #[test]
    fn idempotent() {
        let text = std::fs::read_to_string("tests/fixtures/s0001.txt").unwrap();
        assert_eq!(extract(&text), extract(&text));
    }
}
