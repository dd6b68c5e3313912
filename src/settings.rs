use std::time::Duration;

use anyhow::{Context, Result};
use config::{Config, Environment};
use serde::Deserialize;

const ENV_PREFIX: &str = "SCBILLS";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub db_path: String,
    pub session: i64,
    pub concurrency: usize,
    pub max_retries: u32,
    pub base_backoff_ms: u64,
    pub request_delay_ms: u64,
    pub lookup_timeout_secs: u64,
    pub print_url: String,
    pub fiscal_url: String,
}

impl Settings {
    /// Defaults overlaid with `SCBILLS_*` environment variables.
    pub fn load() -> Result<Self> {
        Self::from_builder(Config::builder().add_source(Environment::with_prefix(ENV_PREFIX)))
    }

    fn from_builder(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self> {
        builder
            .set_default("db_path", "data/sc_bills.sqlite")?
            .set_default("session", 126)?
            .set_default("concurrency", 5)?
            .set_default("max_retries", 3)?
            .set_default("base_backoff_ms", 2000)?
            .set_default("request_delay_ms", 1000)?
            .set_default("lookup_timeout_secs", 5)?
            .set_default("print_url", "https://www.scstatehouse.gov/billsearch.php")?
            .set_default("fiscal_url", "https://www.scstatehouse.gov/fiscalimpact.php")?
            .build()
            .context("Failed to build settings")?
            .try_deserialize()
            .context("Invalid settings")
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_secs(self.lookup_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let s = Settings::from_builder(Config::builder()).unwrap();
        assert_eq!(s.db_path, "data/sc_bills.sqlite");
        assert_eq!(s.session, 126);
        assert_eq!(s.concurrency, 5);
        assert_eq!(s.request_delay(), Duration::from_secs(1));
        assert_eq!(s.lookup_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn overrides_win() {
        let builder = Config::builder()
            .set_override("session", 125)
            .unwrap()
            .set_override("concurrency", 2)
            .unwrap();
        let s = Settings::from_builder(builder).unwrap();
        assert_eq!(s.session, 125);
        assert_eq!(s.concurrency, 2);
    }
}
