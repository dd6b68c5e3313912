use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::Connection;

use crate::fiscal::FiscalImpact;
use crate::parser::{BillRecord, HistoryEntry, RawDocument};

pub fn connect(path: &str) -> Result<Connection> {
    if let Some(dir) = Path::new(path).parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {:?}", dir))?;
    }
    let conn = Connection::open(path).with_context(|| format!("Failed to open {}", path))?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS documents (
            id          INTEGER PRIMARY KEY,
            session     INTEGER NOT NULL,
            bill_number TEXT NOT NULL,
            url         TEXT,
            format      TEXT NOT NULL DEFAULT 'PDF',
            text        TEXT,
            found       BOOLEAN NOT NULL DEFAULT 1,
            status      INTEGER,
            error       TEXT,
            latency_ms  INTEGER,
            scraped_at  TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(session, bill_number)
        );
        CREATE INDEX IF NOT EXISTS idx_documents_found ON documents(found);

        CREATE TABLE IF NOT EXISTS bills (
            session        INTEGER NOT NULL,
            bill_number    TEXT NOT NULL,
            bill_name      TEXT,
            title_line     TEXT,
            summary_title  TEXT,
            summary_text   TEXT NOT NULL,
            headline       TEXT,
            chamber        TEXT NOT NULL CHECK(chamber IN ('Senate','House','Unknown')),
            current_status TEXT NOT NULL,
            bill_url       TEXT,
            processed_at   TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (session, bill_number)
        );

        CREATE TABLE IF NOT EXISTS bill_history (
            session     INTEGER NOT NULL,
            bill_number TEXT NOT NULL,
            position    INTEGER NOT NULL,
            date_text   TEXT NOT NULL,
            parsed_date TEXT,
            chamber     TEXT NOT NULL,
            action      TEXT NOT NULL,
            PRIMARY KEY (session, bill_number, position),
            FOREIGN KEY (session, bill_number) REFERENCES bills(session, bill_number)
        );

        CREATE TABLE IF NOT EXISTS fiscal_impact (
            session     INTEGER NOT NULL,
            bill_number TEXT NOT NULL,
            flag        TEXT NOT NULL CHECK(flag IN ('yes','no','unknown')),
            checked_at  TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (session, bill_number)
        );
        ",
    )?;
    Ok(())
}

// ── Documents ──

pub struct DocumentRow {
    pub session: i64,
    pub bill_number: String,
    pub url: Option<String>,
    pub format: String,
    pub text: Option<String>,
    pub found: bool,
    pub status: Option<i32>,
    pub error: Option<String>,
    pub latency_ms: Option<i64>,
}

pub fn save_documents(conn: &Connection, rows: &[DocumentRow]) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let mut count = 0;
    {
        let mut stmt = tx.prepare(
            "INSERT OR REPLACE INTO documents
             (session, bill_number, url, format, text, found, status, error, latency_ms)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        )?;
        for r in rows {
            count += stmt.execute(rusqlite::params![
                r.session, r.bill_number, r.url, r.format, r.text, r.found, r.status, r.error,
                r.latency_ms,
            ])?;
        }
    }
    tx.commit()?;
    Ok(count)
}

/// Found documents with no bill record yet (or all found ones when `reprocess`).
pub fn fetch_unprocessed(
    conn: &Connection,
    session: Option<i64>,
    reprocess: bool,
    limit: Option<usize>,
) -> Result<Vec<RawDocument>> {
    let mut sql = String::from(
        "SELECT d.bill_number, d.session, d.text
         FROM documents d
         LEFT JOIN bills b ON b.session = d.session AND b.bill_number = d.bill_number
         WHERE d.found = 1 AND d.text IS NOT NULL",
    );
    if !reprocess {
        sql.push_str(" AND b.bill_number IS NULL");
    }
    if session.is_some() {
        sql.push_str(" AND d.session = ?1");
    }
    sql.push_str(" ORDER BY d.session, d.bill_number");
    if let Some(n) = limit {
        sql.push_str(&format!(" LIMIT {}", n));
    }

    let mut stmt = conn.prepare(&sql)?;
    let rows = match session {
        Some(s) => stmt.query_map([s], document_from_row)?.collect::<Result<Vec<_>, _>>()?,
        None => stmt.query_map([], document_from_row)?.collect::<Result<Vec<_>, _>>()?,
    };
    Ok(rows)
}

fn document_from_row(row: &rusqlite::Row) -> rusqlite::Result<RawDocument> {
    Ok(RawDocument {
        identifier: row.get(0)?,
        session_id: row.get(1)?,
        text: row.get(2)?,
    })
}

// ── Bills ──

/// Upsert keyed by (session, bill number); history rows are replaced wholesale.
pub fn save_bills(conn: &Connection, bills: &[BillRecord], print_url: &str) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    {
        let mut b_stmt = tx.prepare(
            "INSERT OR REPLACE INTO bills
             (session, bill_number, bill_name, title_line, summary_title, summary_text,
              headline, chamber, current_status, bill_url)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        )?;
        let mut clear_stmt =
            tx.prepare("DELETE FROM bill_history WHERE session = ?1 AND bill_number = ?2")?;
        let mut h_stmt = tx.prepare(
            "INSERT INTO bill_history
             (session, bill_number, position, date_text, parsed_date, chamber, action)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )?;

        for b in bills {
            let url = bill_url(print_url, b.session_id, &b.identifier);
            clear_stmt.execute(rusqlite::params![b.session_id, b.identifier])?;
            b_stmt.execute(rusqlite::params![
                b.session_id, b.identifier, b.bill_name, b.title_line, b.summary_title,
                b.summary_text, b.headline, b.chamber.as_str(), b.current_status, url,
            ])?;
            for (pos, h) in b.history.iter().enumerate() {
                h_stmt.execute(rusqlite::params![
                    b.session_id,
                    b.identifier,
                    pos as i64,
                    h.date_text,
                    h.parsed_date.map(|d| d.to_string()),
                    h.chamber,
                    h.action,
                ])?;
            }
        }
    }
    tx.commit()?;
    Ok(())
}

pub fn bill_url(print_url: &str, session: i64, bill_number: &str) -> String {
    format!(
        "{}?billnumbers={}&session={}&summary=B&headerfooter=1",
        print_url, bill_number, session
    )
}

pub struct StoredBill {
    pub session: i64,
    pub bill_number: String,
    pub bill_name: Option<String>,
    pub title_line: Option<String>,
    pub summary_title: Option<String>,
    pub summary_text: String,
    pub headline: Option<String>,
    pub chamber: String,
    pub current_status: String,
    pub bill_url: Option<String>,
    pub fiscal_impact: FiscalImpact,
    pub history: Vec<HistoryEntry>,
}

pub fn fetch_bills(conn: &Connection, session: i64) -> Result<Vec<StoredBill>> {
    let mut stmt = conn.prepare(
        "SELECT b.session, b.bill_number, b.bill_name, b.title_line, b.summary_title,
                b.summary_text, b.headline, b.chamber, b.current_status, b.bill_url,
                COALESCE(f.flag, 'unknown')
         FROM bills b
         LEFT JOIN fiscal_impact f ON f.session = b.session AND f.bill_number = b.bill_number
         WHERE b.session = ?1
         ORDER BY b.bill_number",
    )?;
    let mut bills = stmt
        .query_map([session], |row| {
            let flag: String = row.get(10)?;
            Ok(StoredBill {
                session: row.get(0)?,
                bill_number: row.get(1)?,
                bill_name: row.get(2)?,
                title_line: row.get(3)?,
                summary_title: row.get(4)?,
                summary_text: row.get(5)?,
                headline: row.get(6)?,
                chamber: row.get(7)?,
                current_status: row.get(8)?,
                bill_url: row.get(9)?,
                fiscal_impact: FiscalImpact::from_flag(&flag),
                history: Vec::new(),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut h_stmt = conn.prepare(
        "SELECT date_text, chamber, action FROM bill_history
         WHERE session = ?1 AND bill_number = ?2
         ORDER BY position",
    )?;
    for bill in &mut bills {
        bill.history = h_stmt
            .query_map(rusqlite::params![bill.session, bill.bill_number], |row| {
                let date_text: String = row.get(0)?;
                let chamber: String = row.get(1)?;
                let action: String = row.get(2)?;
                Ok(HistoryEntry::new(&date_text, &chamber, &action))
            })?
            .collect::<Result<Vec<_>, _>>()?;
    }
    Ok(bills)
}

// ── Fiscal impact ──

/// Bills lacking a fiscal flag (or every bill when `refresh`).
pub fn fetch_fiscal_pending(
    conn: &Connection,
    session: i64,
    refresh: bool,
    limit: Option<usize>,
) -> Result<Vec<(i64, String)>> {
    let sql = format!(
        "SELECT b.session, b.bill_number
         FROM bills b
         LEFT JOIN fiscal_impact f ON f.session = b.session AND f.bill_number = b.bill_number
         WHERE b.session = ?1{}
         ORDER BY b.bill_number{}",
        if refresh { "" } else { " AND f.flag IS NULL" },
        match limit {
            Some(n) => format!(" LIMIT {}", n),
            None => String::new(),
        }
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([session], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn save_fiscal(conn: &Connection, session: i64, bill_number: &str, flag: FiscalImpact) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO fiscal_impact (session, bill_number, flag, checked_at)
         VALUES (?1, ?2, ?3, datetime('now'))",
        rusqlite::params![session, bill_number, flag.as_str()],
    )?;
    Ok(())
}

// ── Overview ──

pub struct OverviewRow {
    pub bill_number: String,
    pub bill_name: String,
    pub chamber: String,
    pub fiscal: String,
    pub history_len: i64,
    pub current_status: String,
}

pub fn fetch_overview(
    conn: &Connection,
    session: i64,
    chamber: Option<&str>,
    limit: usize,
) -> Result<Vec<OverviewRow>> {
    let mut params: Vec<Box<dyn rusqlite::types::ToSql>> = vec![Box::new(session)];
    let mut where_clause = String::from(" WHERE b.session = ?1");
    if let Some(c) = chamber {
        params.push(Box::new(c.to_string()));
        where_clause.push_str(&format!(" AND b.chamber = ?{}", params.len()));
    }

    let sql = format!(
        "SELECT b.bill_number, COALESCE(b.bill_name, ''), b.chamber,
                COALESCE(f.flag, '-'),
                (SELECT COUNT(*) FROM bill_history h
                  WHERE h.session = b.session AND h.bill_number = b.bill_number),
                b.current_status
         FROM bills b
         LEFT JOIN fiscal_impact f ON f.session = b.session AND f.bill_number = b.bill_number{}
         ORDER BY b.bill_number
         LIMIT {}",
        where_clause, limit
    );

    let mut stmt = conn.prepare(&sql)?;
    let param_refs: Vec<&dyn rusqlite::types::ToSql> = params.iter().map(|p| p.as_ref()).collect();
    let rows = stmt
        .query_map(param_refs.as_slice(), |row| {
            Ok(OverviewRow {
                bill_number: row.get(0)?,
                bill_name: row.get(1)?,
                chamber: row.get(2)?,
                fiscal: row.get(3)?,
                history_len: row.get(4)?,
                current_status: row.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ── Stats ──

pub struct Stats {
    pub documents: usize,
    pub found: usize,
    pub missing: usize,
    pub processed: usize,
    pub fiscal_yes: usize,
    pub fiscal_no: usize,
    pub fiscal_unknown: usize,
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let count = |sql: &str| -> Result<usize> { Ok(conn.query_row(sql, [], |r| r.get(0))?) };
    let documents = count("SELECT COUNT(*) FROM documents")?;
    let found = count("SELECT COUNT(*) FROM documents WHERE found = 1")?;
    Ok(Stats {
        documents,
        found,
        missing: documents - found,
        processed: count("SELECT COUNT(*) FROM bills")?,
        fiscal_yes: count("SELECT COUNT(*) FROM fiscal_impact WHERE flag = 'yes'")?,
        fiscal_no: count("SELECT COUNT(*) FROM fiscal_impact WHERE flag = 'no'")?,
        fiscal_unknown: count("SELECT COUNT(*) FROM fiscal_impact WHERE flag = 'unknown'")?,
    })
}

// ── Tests ──
