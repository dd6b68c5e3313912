mod db;
mod export;
mod fiscal;
mod parser;
mod scraper;
mod settings;

use std::io::Read;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Deserialize;
use tracing::{info, warn};

use settings::Settings;

#[derive(Parser)]
#[command(name = "sc_bills", about = "Legislative bill scraper and record extractor")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load raw documents from a JSON dump ([{bill_number, session, format, text}])
    Import {
        file: PathBuf,
    },
    /// Download bill print pages for a range of bill numbers
    Scrape {
        /// Legislative session (default from settings)
        #[arg(short, long)]
        session: Option<i64>,
        /// First bill number
        #[arg(long, default_value = "1")]
        start: u32,
        /// Number of bills to fetch
        #[arg(short = 'n', long, default_value = "50")]
        limit: u32,
    },
    /// Extract bill records from stored documents
    Process {
        #[arg(short, long)]
        session: Option<i64>,
        /// Max documents to process (default: all unprocessed)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
        /// Re-extract documents that already have a record
        #[arg(long)]
        reprocess: bool,
    },
    /// Look up fiscal impact flags for processed bills
    Fiscal {
        #[arg(short, long)]
        session: Option<i64>,
        #[arg(short = 'n', long)]
        limit: Option<usize>,
        /// Re-check bills that already have a flag
        #[arg(long)]
        refresh: bool,
    },
    /// Write JSON and CSV files for a session
    Export {
        #[arg(short, long)]
        session: Option<i64>,
        /// Output directory
        #[arg(short, long, default_value = "data")]
        out: PathBuf,
    },
    /// Extract one document from a text file ("-" for stdin) and print it as JSON
    Parse {
        file: PathBuf,
        #[arg(long, default_value = "0000")]
        identifier: String,
        #[arg(short, long)]
        session: Option<i64>,
    },
    /// Bills overview table
    Overview {
        #[arg(short, long)]
        session: Option<i64>,
        /// Filter by chamber (Senate, House, Unknown)
        #[arg(short, long)]
        chamber: Option<String>,
        /// Max rows to display
        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,
    },
    /// Show pipeline statistics
    Stats,
}

/// One entry of a raw JSON dump.
#[derive(Deserialize)]
struct DumpEntry {
    bill_number: serde_json::Value,
    session: i64,
    #[serde(default = "default_format")]
    format: String,
    #[serde(default)]
    text: String,
}

fn default_format() -> String {
    "PDF".to_string()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let settings = Settings::load()?;

    let result = match cli.command {
        Commands::Import { file } => {
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let raw = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {:?}", file))?;
            let entries: Vec<DumpEntry> = serde_json::from_str(&raw)
                .with_context(|| format!("Failed to parse {:?}", file))?;
            let rows: Vec<db::DocumentRow> = entries.into_iter().map(dump_to_row).collect();
            let saved = db::save_documents(&conn, &rows)?;
            let missing = rows.iter().filter(|r| !r.found).count();
            println!("Imported {} documents ({} marked missing).", saved, missing);
            Ok(())
        }
        Commands::Scrape { session, start, limit } => {
            let session = session.unwrap_or(settings.session);
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let numbers: Vec<u32> = (start..start.saturating_add(limit)).collect();
            println!("Scraping {} bills for session {} (streaming to DB)...", numbers.len(), session);
            let stats = scraper::scrape_bills(&conn, &settings, session, numbers).await?;
            println!(
                "Done: {} fetched ({} ok, {} missing, {} errors).",
                stats.total, stats.ok, stats.missing, stats.errors
            );
            if let Some(n) = stats.first_missing {
                println!("Bill {} is not published; the session likely ends before it.", scraper::bill_identifier(n));
            }
            Ok(())
        }
        Commands::Process { session, limit, reprocess } => {
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let docs = db::fetch_unprocessed(&conn, session, reprocess, limit)?;
            if docs.is_empty() {
                println!("No unprocessed documents. Run 'scrape' or 'import' first.");
                return Ok(());
            }
            println!("Processing {} documents...", docs.len());
            let counts = process_documents(&conn, &docs, &settings.print_url)?;
            counts.print();
            Ok(())
        }
        Commands::Fiscal { session, limit, refresh } => {
            let session = session.unwrap_or(settings.session);
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let pending = db::fetch_fiscal_pending(&conn, session, refresh, limit)?;
            if pending.is_empty() {
                println!("No bills need a fiscal lookup. Run 'process' first.");
                return Ok(());
            }
            println!("Checking fiscal impact for {} bills...", pending.len());
            let stats = fiscal::check_bills(&conn, &settings, pending).await?;
            println!("Fiscal impact: {} yes, {} no, {} unknown.", stats.yes, stats.no, stats.unknown);
            Ok(())
        }
        Commands::Export { session, out } => {
            let session = session.unwrap_or(settings.session);
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let bills = db::fetch_bills(&conn, session)?;
            if bills.is_empty() {
                println!("No bills for session {}.", session);
                return Ok(());
            }
            let paths = export::export_session(&out, session, &bills)?;
            println!(
                "Wrote {} bills to {} and {}",
                bills.len(),
                paths.json.display(),
                paths.csv.display()
            );
            Ok(())
        }
        Commands::Parse { file, identifier, session } => {
            let text = if file.as_os_str() == "-" {
                let mut buf = String::new();
                std::io::stdin().read_to_string(&mut buf)?;
                buf
            } else {
                std::fs::read_to_string(&file).with_context(|| format!("Failed to read {:?}", file))?
            };
            let doc = parser::RawDocument {
                identifier,
                session_id: session.unwrap_or(settings.session),
                text,
            };
            let record = parser::extract_record(&doc);
            println!("{}", serde_json::to_string_pretty(&record)?);
            Ok(())
        }
        Commands::Overview { session, chamber, limit } => {
            let session = session.unwrap_or(settings.session);
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let rows = db::fetch_overview(&conn, session, chamber.as_deref(), limit)?;
            if rows.is_empty() {
                println!("No bills found.");
                return Ok(());
            }

            println!(
                "{:>3} | {:<6} | {:<8} | {:<8} | {:<7} | {:>4} | {:<48}",
                "#", "Number", "Name", "Chamber", "Fiscal", "Hist", "Current status"
            );
            println!("{}", "-".repeat(100));
            for (i, r) in rows.iter().enumerate() {
                println!(
                    "{:>3} | {:<6} | {:<8} | {:<8} | {:<7} | {:>4} | {:<48}",
                    i + 1,
                    r.bill_number,
                    truncate(&r.bill_name, 8),
                    r.chamber,
                    r.fiscal,
                    r.history_len,
                    truncate(&r.current_status, 48)
                );
            }
            println!("\n{} bills | session {}", rows.len(), session);
            Ok(())
        }
        Commands::Stats => {
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let s = db::get_stats(&conn)?;
            println!("Documents: {}", s.documents);
            println!("Found:     {}", s.found);
            println!("Missing:   {}", s.missing);
            println!("Processed: {}", s.processed);
            println!("Fiscal:    {} yes, {} no, {} unknown", s.fiscal_yes, s.fiscal_no, s.fiscal_unknown);
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn dump_to_row(entry: DumpEntry) -> db::DocumentRow {
    let bill_number = match &entry.bill_number {
        serde_json::Value::Number(n) => n
            .as_u64()
            .map(|n| format!("{:04}", n))
            .unwrap_or_else(|| n.to_string()),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    let checked = scraper::check_published(&bill_number, &entry.text);
    db::DocumentRow {
        session: entry.session,
        bill_number,
        url: None,
        format: entry.format,
        found: checked.is_ok(),
        error: checked.err().map(|e| e.to_string()),
        text: Some(entry.text),
        status: None,
        latency_ms: None,
    }
}

struct ProcessCounts {
    bills: usize,
    history: usize,
    empty: usize,
}

impl ProcessCounts {
    fn print(&self) {
        println!(
            "Saved {} bills, {} history entries ({} with nothing extractable).",
            self.bills, self.history, self.empty,
        );
    }
}

fn process_documents(
    conn: &rusqlite::Connection,
    docs: &[parser::RawDocument],
    print_url: &str,
) -> anyhow::Result<ProcessCounts> {
    use indicatif::{ProgressBar, ProgressStyle};
    use rayon::prelude::*;

    let pb = ProgressBar::new(docs.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")?
            .progress_chars("#>-"),
    );

    let mut counts = ProcessCounts {
        bills: 0,
        history: 0,
        empty: 0,
    };

    for chunk in docs.chunks(500) {
        let records: Vec<_> = chunk.par_iter().map(parser::extract_record).collect();

        for r in &records {
            if r.bill_number() != r.identifier {
                warn!(
                    "Document {} carries caption {:?}",
                    r.identifier,
                    r.bill_name.as_deref().unwrap_or_default()
                );
            }
            counts.history += r.history.len();
            if r.is_empty() {
                counts.empty += 1;
            }
        }
        counts.bills += records.len();
        db::save_bills(conn, &records, print_url)?;
        pb.inc(chunk.len() as u64);
    }

    pb.finish_and_clear();
    info!("Processed {} documents", counts.bills);
    Ok(counts)
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
