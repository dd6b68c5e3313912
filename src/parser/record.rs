use std::fmt;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::sections::Sections;
use super::status;

static BILL_NAME_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[SH]\*?\d{4}").unwrap());

const HISTORY_DATE_FORMAT: &str = "%m/%d/%y";

/// Raw bill text as handed over by the fetch side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawDocument {
    pub identifier: String,
    pub session_id: i64,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    pub date_text: String,
    pub parsed_date: Option<NaiveDate>,
    pub chamber: String,
    pub action: String,
}

impl HistoryEntry {
    /// `parsed_date` is `None` when `date_text` is not a valid MM/DD/YY date.
    pub fn new(date_text: &str, chamber: &str, action: &str) -> Self {
        HistoryEntry {
            date_text: date_text.to_string(),
            parsed_date: NaiveDate::parse_from_str(date_text, HISTORY_DATE_FORMAT).ok(),
            chamber: chamber.to_string(),
            action: action.to_string(),
        }
    }
}

impl fmt::Display for HistoryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.date_text, self.chamber, self.action)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Chamber {
    Senate,
    House,
    Unknown,
}

impl Chamber {
    fn from_caption(caption: &str) -> Self {
        match caption.trim_start().chars().next() {
            Some('S') => Chamber::Senate,
            Some('H') => Chamber::House,
            _ => Chamber::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Chamber::Senate => "Senate",
            Chamber::House => "House",
            Chamber::Unknown => "Unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BillRecord {
    pub identifier: String,
    pub session_id: i64,
    pub title_line: Option<String>,
    pub summary_title: Option<String>,
    pub summary_text: String,
    pub headline: Option<String>,
    pub bill_name: Option<String>,
    pub chamber: Chamber,
    pub history: Vec<HistoryEntry>,
    pub current_status: String,
}

impl BillRecord {
    /// Digits of the bill name, falling back to the document identifier.
    pub fn bill_number(&self) -> String {
        self.bill_name
            .as_deref()
            .map(|name| name.chars().filter(char::is_ascii_digit).collect())
            .unwrap_or_else(|| self.identifier.clone())
    }

    /// True when nothing in the text was recognised.
    pub fn is_empty(&self) -> bool {
        self.title_line.is_none() && self.summary_text.is_empty() && self.history.is_empty()
    }
}

pub fn assemble(doc: &RawDocument, sections: Sections) -> BillRecord {
    let summary_text = sections.summary_text();
    let headline = sections.headline();
    let current_status = status::current_status(&sections.history);
    let bill_name = BILL_NAME_RE
        .find(&doc.text)
        .map(|m| m.as_str().to_string());
    let chamber = bill_name
        .as_deref()
        .or(sections.title_line.as_deref())
        .map(Chamber::from_caption)
        .unwrap_or(Chamber::Unknown);

    BillRecord {
        identifier: doc.identifier.clone(),
        session_id: doc.session_id,
        title_line: sections.title_line,
        summary_title: sections.summary_title,
        summary_text,
        headline,
        bill_name,
        chamber,
        history: sections.history,
        current_status,
    }
}

// ── Tests ──
