use super::record::HistoryEntry;

pub const NO_HISTORY: &str = "No history";

/// Entry with the greatest parsed date. Missing dates sort below every real
/// date; ties (including all-missing) go to the last entry in document order.
pub fn latest_entry(history: &[HistoryEntry]) -> Option<&HistoryEntry> {
    history.iter().max_by_key(|entry| entry.parsed_date)
}

pub fn current_status(history: &[HistoryEntry]) -> String {
    latest_entry(history)
        .map(|entry| entry.to_string())
        .unwrap_or_else(|| NO_HISTORY.to_string())
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(date: &str, action: &str) -> HistoryEntry {
        HistoryEntry::new(date, "Senate", action)
    }

    #[test]
    fn empty_history() {
        assert!(latest_entry(&[]).is_none());
        assert_eq!(current_status(&[]), "No history");
    }

    #[test]
    fn max_by_date_not_position() {
        let history = vec![entry("12/04/24", "Adopted"), entry("01/02/23", "Referred")];
        assert_eq!(current_status(&history), "12/04/24 Senate Adopted");

        let reversed = vec![entry("01/02/23", "Referred"), entry("12/04/24", "Adopted")];
        assert_eq!(current_status(&reversed), "12/04/24 Senate Adopted");
    }

    #[test]
    fn unparsable_date_never_beats_real_date() {
        let history = vec![entry("01/02/23", "Referred"), entry("99/99/99", "Filed")];
        assert_eq!(latest_entry(&history).unwrap().action, "Referred");
    }

    #[test]
    fn all_unparsable_picks_last() {
        let history = vec![entry("99/99/99", "First"), entry("00/00/00", "Second")];
        assert_eq!(latest_entry(&history).unwrap().action, "Second");
    }

    #[test]
    fn same_date_picks_last() {
        let history = vec![entry("03/05/25", "Introduced"), entry("03/05/25", "Referred")];
        assert_eq!(current_status(&history), "03/05/25 Senate Referred");
    }

    #[test]
    fn chosen_date_is_maximal() {
        let history = vec![
            entry("05/01/24", "a"),
            entry("13/01/24", "bad"),
            entry("02/11/25", "b"),
            entry("12/31/24", "c"),
        ];
        let latest = latest_entry(&history).unwrap();
        assert!(history
            .iter()
            .filter_map(|e| e.parsed_date)
            .all(|d| Some(d) <= latest.parsed_date));
        assert_eq!(latest.action, "b");
    }
}
