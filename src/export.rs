use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::db::StoredBill;
use crate::fiscal::FiscalImpact;
use crate::parser::HistoryEntry;

/// Full record for the hierarchical JSON file.
#[derive(Serialize)]
pub struct BillDocument<'a> {
    pub session: i64,
    pub bill_number: &'a str,
    pub bill_name: Option<&'a str>,
    pub chamber: &'a str,
    pub title_line: Option<&'a str>,
    pub summary_title: Option<&'a str>,
    pub summary_text: &'a str,
    pub headline: Option<&'a str>,
    pub current_status: &'a str,
    pub fiscal_impact: FiscalImpact,
    pub bill_url: Option<&'a str>,
    pub history: &'a [HistoryEntry],
}

/// Flat row for the CSV file.
#[derive(Serialize)]
pub struct BillRow<'a> {
    pub bill_session: i64,
    pub bill_name: &'a str,
    pub bill_number: &'a str,
    pub chamber: &'a str,
    pub bill_summary: &'a str,
    pub current_status: &'a str,
    pub fiscal_impact: FiscalImpact,
    pub bill_url: &'a str,
}

impl<'a> From<&'a StoredBill> for BillDocument<'a> {
    fn from(b: &'a StoredBill) -> Self {
        BillDocument {
            session: b.session,
            bill_number: &b.bill_number,
            bill_name: b.bill_name.as_deref(),
            chamber: &b.chamber,
            title_line: b.title_line.as_deref(),
            summary_title: b.summary_title.as_deref(),
            summary_text: &b.summary_text,
            headline: b.headline.as_deref(),
            current_status: &b.current_status,
            fiscal_impact: b.fiscal_impact,
            bill_url: b.bill_url.as_deref(),
            history: &b.history,
        }
    }
}

impl<'a> From<&'a StoredBill> for BillRow<'a> {
    fn from(b: &'a StoredBill) -> Self {
        BillRow {
            bill_session: b.session,
            bill_name: b.bill_name.as_deref().unwrap_or("N/A"),
            bill_number: &b.bill_number,
            chamber: &b.chamber,
            // All-caps caption when present.
            bill_summary: b
                .headline
                .as_deref()
                .filter(|h| !h.is_empty())
                .unwrap_or(b.summary_text.as_str()),
            current_status: &b.current_status,
            fiscal_impact: b.fiscal_impact,
            bill_url: b.bill_url.as_deref().unwrap_or(""),
        }
    }
}

pub struct ExportPaths {
    pub json: PathBuf,
    pub csv: PathBuf,
}

/// Write `sc_bills_parsed_session_<s>.{json,csv}` into `dir`.
pub fn export_session(dir: &Path, session: i64, bills: &[StoredBill]) -> Result<ExportPaths> {
    std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {:?}", dir))?;
    let stem = format!("sc_bills_parsed_session_{}", session);
    let paths = ExportPaths {
        json: dir.join(format!("{}.json", stem)),
        csv: dir.join(format!("{}.csv", stem)),
    };

    let file = File::create(&paths.json).with_context(|| format!("Failed to create {:?}", paths.json))?;
    write_json(BufWriter::new(file), bills)?;

    let file = File::create(&paths.csv).with_context(|| format!("Failed to create {:?}", paths.csv))?;
    write_csv(file, bills)?;

    Ok(paths)
}

pub fn write_json<W: Write>(mut out: W, bills: &[StoredBill]) -> Result<()> {
    let docs: Vec<BillDocument> = bills.iter().map(BillDocument::from).collect();
    serde_json::to_writer_pretty(&mut out, &docs)?;
    out.flush()?;
    Ok(())
}

pub fn write_csv<W: Write>(out: W, bills: &[StoredBill]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    for bill in bills {
        writer.serialize(BillRow::from(bill))?;
    }
    writer.flush()?;
    Ok(())
}
