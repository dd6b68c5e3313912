use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use regex::Regex;
use rusqlite::Connection;
use spider_client::shapes::request::{ReturnFormat, ReturnFormatHandling};
use spider_client::{RequestParams, Spider};
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::db::{self, DocumentRow};
use crate::settings::Settings;

const INVALID_BILL_MARKER: &str = "INVALID BILL";

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("SPIDER_API_KEY environment variable must be set")]
    MissingApiKey,
    #[error("failed to create spider client: {0}")]
    Client(String),
    #[error("request failed: {0}")]
    Request(String),
    #[error("bill {0} not found or not yet published")]
    NotPublished(String),
    #[error("no content in response")]
    EmptyContent,
}

impl FetchError {
    fn is_retryable(&self) -> bool {
        match self {
            FetchError::Request(e) => {
                e.contains("429") || e.contains("rate") || e.contains("500") || e.contains("502")
                    || e.contains("503")
            }
            _ => false,
        }
    }
}

pub struct ScrapeStats {
    pub total: usize,
    pub ok: usize,
    pub missing: usize,
    pub errors: usize,
    /// Lowest bill number reported as not published.
    pub first_missing: Option<u32>,
}

impl ScrapeStats {
    fn new(total: usize) -> Self {
        ScrapeStats {
            total,
            ok: 0,
            missing: 0,
            errors: 0,
            first_missing: None,
        }
    }

    /// Only `NotPublished` counts as missing; other failures are errors.
    fn record(&mut self, number: u32, outcome: &Result<(), FetchError>) {
        match outcome {
            Ok(()) => self.ok += 1,
            Err(FetchError::NotPublished(_)) => {
                self.missing += 1;
                self.first_missing = Some(self.first_missing.map_or(number, |m| m.min(number)));
            }
            Err(_) => self.errors += 1,
        }
    }
}

/// Exponential backoff, saturating instead of overflowing.
fn backoff_delay(base_ms: u64, attempt: u32) -> Duration {
    let factor = 2u64.checked_pow(attempt).unwrap_or(u64::MAX);
    Duration::from_millis(base_ms.saturating_mul(factor))
}

/// Zero-padded four-digit bill identifier.
pub fn bill_identifier(number: u32) -> String {
    format!("{:04}", number)
}

/// Scrape a range of bill numbers concurrently, saving each document as it arrives.
pub async fn scrape_bills(
    conn: &Connection,
    settings: &Settings,
    session: i64,
    numbers: Vec<u32>,
) -> Result<ScrapeStats> {
    let api_key = std::env::var("SPIDER_API_KEY").map_err(|_| FetchError::MissingApiKey)?;
    let spider = Arc::new(
        Spider::new(Some(api_key)).map_err(|e| FetchError::Client(e.to_string()))?,
    );
    let semaphore = Arc::new(Semaphore::new(settings.concurrency.max(1)));
    let total = numbers.len();

    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")?
            .progress_chars("=> "),
    );

    let (tx, mut rx) = tokio::sync::mpsc::channel::<(u32, DocumentRow, Result<(), FetchError>)>(
        settings.concurrency.max(1) * 2,
    );

    for number in numbers {
        let spider = Arc::clone(&spider);
        let sem = Arc::clone(&semaphore);
        let tx = tx.clone();
        let settings = settings.clone();

        tokio::spawn(async move {
            let Ok(_permit) = sem.acquire().await else {
                return;
            };
            let (row, outcome) = scrape_with_retry(&spider, &settings, session, number).await;
            let _ = tx.send((number, row, outcome)).await;
            tokio::time::sleep(settings.request_delay()).await;
        });
    }

    drop(tx);

    let mut stats = ScrapeStats::new(total);

    while let Some((number, row, outcome)) = rx.recv().await {
        stats.record(number, &outcome);
        db::save_documents(conn, std::slice::from_ref(&row))?;
        pb.inc(1);
    }

    pb.finish_and_clear();
    info!(
        "Scraped {} bills ({} ok, {} missing, {} errors)",
        stats.total, stats.ok, stats.missing, stats.errors
    );
    Ok(stats)
}

async fn scrape_with_retry(
    spider: &Spider,
    settings: &Settings,
    session: i64,
    number: u32,
) -> (DocumentRow, Result<(), FetchError>) {
    let identifier = bill_identifier(number);
    let url = db::bill_url(&settings.print_url, session, &identifier);

    let mut attempt = 0;
    loop {
        let start = Instant::now();
        let result = fetch_text(spider, &url).await;
        let latency_ms = Some(start.elapsed().as_millis() as i64);

        let error = match result {
            Ok(raw) => return document_row(session, &identifier, &url, raw, latency_ms),
            Err(e) => e,
        };

        if !error.is_retryable() || attempt >= settings.max_retries {
            warn!("Bill {} failed: {}", identifier, error);
            let row = DocumentRow {
                session,
                bill_number: identifier,
                url: Some(url),
                format: "PDF".to_string(),
                text: None,
                found: false,
                status: None,
                error: Some(error.to_string()),
                latency_ms,
            };
            return (row, Err(error));
        }

        let backoff = backoff_delay(settings.base_backoff_ms, attempt);
        warn!(
            "Rate limited on bill {} (attempt {}/{}), backing off {:.1}s",
            identifier,
            attempt + 1,
            settings.max_retries,
            backoff.as_secs_f64()
        );
        tokio::time::sleep(backoff).await;
        attempt += 1;
    }
}

/// Build the stored row; "not published" pages keep their text but are flagged missing.
fn document_row(
    session: i64,
    identifier: &str,
    url: &str,
    raw: String,
    latency_ms: Option<i64>,
) -> (DocumentRow, Result<(), FetchError>) {
    let checked = check_published(identifier, &raw);
    let row = DocumentRow {
        session,
        bill_number: identifier.to_string(),
        url: Some(url.to_string()),
        format: "PDF".to_string(),
        found: checked.is_ok(),
        error: checked.as_ref().err().map(|e| e.to_string()),
        text: Some(raw),
        status: None,
        latency_ms,
    };
    (row, checked)
}

pub fn check_published(identifier: &str, text: &str) -> Result<(), FetchError> {
    if text.trim().is_empty() {
        return Err(FetchError::EmptyContent);
    }
    if text.contains(INVALID_BILL_MARKER) {
        return Err(FetchError::NotPublished(identifier.to_string()));
    }
    Ok(())
}

async fn fetch_text(spider: &Spider, url: &str) -> Result<String, FetchError> {
    let params = RequestParams {
        return_format: Some(ReturnFormatHandling::Single(ReturnFormat::Markdown)),
        ..Default::default()
    };

    let response = spider
        .scrape_url(url, Some(params), "application/json")
        .await
        .map_err(|e| FetchError::Request(e.to_string()))?;

    let parsed: serde_json::Value = match response.as_str() {
        Some(s) => serde_json::from_str(s).unwrap_or(response.clone()),
        None => response,
    };

    parsed
        .as_array()
        .and_then(|arr| arr.first())
        .and_then(|obj| obj.get("content"))
        .and_then(|c| c.as_str())
        .map(normalize_text)
        .ok_or(FetchError::EmptyContent)
}

/// Collapse runs of blank lines and strip trailing whitespace per line.
fn normalize_text(text: &str) -> String {
    static BLANKS: std::sync::LazyLock<Regex> =
        std::sync::LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());
    let trimmed: Vec<&str> = text.lines().map(str::trim_end).collect();
    BLANKS.replace_all(&trimmed.join("\n"), "\n\n").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers_are_zero_padded() {
        assert_eq!(bill_identifier(1), "0001");
        assert_eq!(bill_identifier(3456), "3456");
        assert_eq!(bill_identifier(12345), "12345");
    }

    #[test]
    fn invalid_bill_is_not_published() {
        let err = check_published("0999", "INVALID BILL NUMBER").unwrap_err();
        assert!(matches!(err, FetchError::NotPublished(ref id) if id == "0999"));
        assert!(matches!(check_published("0001", "  \n"), Err(FetchError::EmptyContent)));
        assert!(check_published("0001", "S*0001\nSummary:").is_ok());
    }

    #[test]
    fn missing_row_keeps_text() {
        let (row, outcome) = document_row(126, "0999", "https://x", "INVALID BILL".to_string(), Some(3));
        assert!(!row.found);
        assert_eq!(row.text.as_deref(), Some("INVALID BILL"));
        assert!(row.error.unwrap().contains("0999"));
        assert!(matches!(outcome, Err(FetchError::NotPublished(_))));

        let (row, outcome) = document_row(126, "0001", "https://x", "S*0001".to_string(), None);
        assert!(row.found);
        assert!(row.error.is_none());
        assert!(outcome.is_ok());
    }

    #[test]
    fn blank_page_is_not_end_of_session() {
        let mut stats = ScrapeStats::new(4);
        let (_, blank) = document_row(126, "0003", "https://x", "  \n\t".to_string(), None);
        stats.record(3, &blank);
        stats.record(9, &Err(FetchError::Request("timeout".into())));
        assert_eq!(stats.first_missing, None);
        assert_eq!((stats.ok, stats.missing, stats.errors), (0, 0, 2));

        let (_, invalid) = document_row(126, "0007", "https://x", "INVALID BILL".to_string(), None);
        stats.record(7, &invalid);
        stats.record(1, &Ok(()));
        assert_eq!(stats.first_missing, Some(7));
        assert_eq!((stats.ok, stats.missing, stats.errors), (1, 1, 2));
    }

    #[test]
    fn backoff_saturates() {
        assert_eq!(backoff_delay(2000, 0), Duration::from_millis(2000));
        assert_eq!(backoff_delay(2000, 3), Duration::from_millis(16000));
        assert_eq!(backoff_delay(2000, 64), Duration::from_millis(u64::MAX));
        assert_eq!(backoff_delay(u64::MAX / 2, 2), Duration::from_millis(u64::MAX));
    }

    #[test]
    fn retry_classification() {
        assert!(FetchError::Request("HTTP 429 Too Many Requests".into()).is_retryable());
        assert!(FetchError::Request("status 503".into()).is_retryable());
        assert!(!FetchError::Request("404".into()).is_retryable());
        assert!(!FetchError::NotPublished("0001".into()).is_retryable());
    }

    #[test]
    fn normalize_collapses_blank_runs() {
        assert_eq!(normalize_text("a  \n\n\n\nb\t\nc"), "a\n\nb\nc");
    }
}
