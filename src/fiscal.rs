use std::sync::Arc;

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use rusqlite::Connection;
use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::db;
use crate::settings::Settings;

const NO_STATEMENTS_MARKER: &str = "No Fiscal Impact Statements Returned";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FiscalImpact {
    Yes,
    No,
    Unknown,
}

impl FiscalImpact {
    /// Any page without the "none returned" marker counts as having a statement.
    pub fn from_page(body: &str) -> Self {
        if body.contains(NO_STATEMENTS_MARKER) {
            FiscalImpact::No
        } else {
            FiscalImpact::Yes
        }
    }

    pub fn from_flag(flag: &str) -> Self {
        match flag {
            "yes" => FiscalImpact::Yes,
            "no" => FiscalImpact::No,
            _ => FiscalImpact::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FiscalImpact::Yes => "yes",
            FiscalImpact::No => "no",
            FiscalImpact::Unknown => "unknown",
        }
    }
}

pub struct FiscalStats {
    pub yes: usize,
    pub no: usize,
    pub unknown: usize,
}

pub fn lookup_url(base: &str, session: i64, bill_number: &str) -> String {
    format!("{}?type=BILL&session={}&bill_number={}", base, session, bill_number)
}

/// Look up fiscal flags concurrently, saving each one as it arrives.
pub async fn check_bills(
    conn: &Connection,
    settings: &Settings,
    bills: Vec<(i64, String)>,
) -> Result<FiscalStats> {
    let client = reqwest::Client::builder()
        .timeout(settings.lookup_timeout())
        .build()?;
    let semaphore = Arc::new(Semaphore::new(settings.concurrency.max(1)));
    let delay = settings.request_delay();

    let pb = ProgressBar::new(bills.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")?
            .progress_chars("=> "),
    );

    let (tx, mut rx) = tokio::sync::mpsc::channel::<(i64, String, FiscalImpact)>(
        settings.concurrency.max(1) * 2,
    );

    for (session, bill_number) in bills {
        let client = client.clone();
        let sem = Arc::clone(&semaphore);
        let tx = tx.clone();
        let url = lookup_url(&settings.fiscal_url, session, &bill_number);

        tokio::spawn(async move {
            let Ok(_permit) = sem.acquire().await else {
                return;
            };
            let flag = check_one(&client, &url, &bill_number).await;
            let _ = tx.send((session, bill_number, flag)).await;
            tokio::time::sleep(delay).await;
        });
    }

    drop(tx);

    let mut stats = FiscalStats { yes: 0, no: 0, unknown: 0 };
    while let Some((session, bill_number, flag)) = rx.recv().await {
        match flag {
            FiscalImpact::Yes => stats.yes += 1,
            FiscalImpact::No => stats.no += 1,
            FiscalImpact::Unknown => stats.unknown += 1,
        }
        db::save_fiscal(conn, session, &bill_number, flag)?;
        pb.inc(1);
    }

    pb.finish_and_clear();
    info!(
        "Fiscal lookup done ({} yes, {} no, {} unknown)",
        stats.yes, stats.no, stats.unknown
    );
    Ok(stats)
}

async fn check_one(client: &reqwest::Client, url: &str, bill_number: &str) -> FiscalImpact {
    let response = match client.get(url).send().await.and_then(|r| r.error_for_status()) {
        Ok(r) => r,
        Err(e) => {
            warn!("Fiscal lookup failed for bill {}: {}", bill_number, e);
            return FiscalImpact::Unknown;
        }
    };
    match response.text().await {
        Ok(body) => FiscalImpact::from_page(&body),
        Err(e) => {
            warn!("Fiscal lookup body unreadable for bill {}: {}", bill_number, e);
            FiscalImpact::Unknown
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_marker() {
        let none = "<p>No Fiscal Impact Statements Returned</p>";
        assert_eq!(FiscalImpact::from_page(none), FiscalImpact::No);
        assert_eq!(FiscalImpact::from_page("<a>Statement 1</a>"), FiscalImpact::Yes);
    }

    #[test]
    fn flag_round_trip() {
        for flag in [FiscalImpact::Yes, FiscalImpact::No, FiscalImpact::Unknown] {
            assert_eq!(FiscalImpact::from_flag(flag.as_str()), flag);
        }
        assert_eq!(FiscalImpact::from_flag("maybe"), FiscalImpact::Unknown);
    }

    #[test]
    fn url_shape() {
        assert_eq!(
            lookup_url("https://www.scstatehouse.gov/fiscalimpact.php", 126, "0001"),
            "https://www.scstatehouse.gov/fiscalimpact.php?type=BILL&session=126&bill_number=0001"
        );
    }

    #[test]
    fn serializes_lowercase() {
        assert_eq!(serde_json::to_string(&FiscalImpact::Unknown).unwrap(), "\"unknown\"");
    }
}
