//! Source record feed.
//!
//! Fetches the raw tender list over HTTP and keeps a local backup of the
//! last good response. When the network fetch fails the backup is used
//! instead.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use tokio::fs;
use tracing::{info, warn};

use tender_search::{FeedConfig, RawTender, TenderRecord};

#[derive(Debug, Deserialize)]
struct FeedPayload {
    data: Vec<RawTender>,
}

/// Parse a feed body of the form `{ "data": [ ... ] }`.
///
/// Records without a usable id are skipped with a warning.
pub fn parse_feed(body: &[u8]) -> Result<Vec<TenderRecord>> {
    let payload: FeedPayload =
        serde_json::from_slice(body).context("feed body is not a tender list")?;

    let mut records = Vec::with_capacity(payload.data.len());
    for raw in payload.data {
        match TenderRecord::try_from(raw) {
            Ok(record) => records.push(record),
            Err(e) => warn!("Skipping feed entry: {e}"),
        }
    }
    Ok(records)
}

/// Read records from the backup file only.
pub async fn load_backup(path: &Path) -> Result<Vec<TenderRecord>> {
    let body = fs::read(path)
        .await
        .with_context(|| format!("no data available: cannot read backup {}", path.display()))?;
    let records = parse_feed(&body)
        .with_context(|| format!("backup {} is unreadable", path.display()))?;
    info!("Loaded {} tenders from backup {}", records.len(), path.display());
    Ok(records)
}

async fn fetch_remote(config: &FeedConfig) -> Result<(Vec<u8>, Vec<TenderRecord>)> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;

    let body = client
        .get(&config.url)
        .send()
        .await?
        .error_for_status()?
        .bytes()
        .await?
        .to_vec();

    let records = parse_feed(&body)?;
    Ok((body, records))
}

async fn write_backup(path: &Path, body: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, body).await?;
    fs::rename(&tmp, path).await?;
    Ok(())
}

/// Fetch the feed, falling back to `backup` when the fetch fails.
pub async fn fetch_records(config: &FeedConfig, backup: &Path) -> Result<Vec<TenderRecord>> {
    match fetch_remote(config).await {
        Ok((body, records)) => {
            info!("Fetched {} tenders from {}", records.len(), config.url);
            if let Err(e) = write_backup(backup, &body).await {
                warn!("Could not write feed backup {}: {e:#}", backup.display());
            }
            Ok(records)
        }
        Err(e) => {
            warn!("Error fetching tenders from {}: {e:#}; using backup", config.url);
            load_backup(backup).await
        }
    }
}
