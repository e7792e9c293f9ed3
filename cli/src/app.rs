//! Wiring between configuration, the source feed, and the search session.

use std::sync::Arc;

use anyhow::Result;
use chrono::NaiveDateTime;
use tokio::sync::OnceCell;

use tender_search::{
    EmbeddingProvider, IndexBuilder, PartitionStore, SearchConfig, SearchEngine, SearchError,
    SearchOutcome, Session, TenderRecord,
};

use crate::feed;
use crate::stats::DeadlineStats;

/// Application state shared by every subcommand and the interactive shell.
pub struct App {
    config: SearchConfig,
    session: Session,
    offline: bool,
    records: OnceCell<Vec<TenderRecord>>,
}

impl App {
    /// Create the app with the provider named in `config`.
    pub async fn new(config: SearchConfig, offline: bool) -> Result<Self> {
        let provider = config.embedding.build_provider();
        Self::with_provider(config, provider, offline).await
    }

    pub async fn with_provider(
        config: SearchConfig,
        provider: Arc<dyn EmbeddingProvider>,
        offline: bool,
    ) -> Result<Self> {
        let store = PartitionStore::new(config.partitions_dir()).await?;
        Ok(Self {
            session: Session::new(IndexBuilder::new(provider, store)),
            config,
            offline,
            records: OnceCell::new(),
        })
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Source records, fetched at most once per process.
    pub async fn source_records(&self) -> Result<Vec<TenderRecord>> {
        let records = self
            .records
            .get_or_try_init(|| async {
                let backup = self.config.backup_path();
                if self.offline {
                    feed::load_backup(&backup).await
                } else {
                    feed::fetch_records(&self.config.feed, &backup).await
                }
            })
            .await?;
        Ok(records.clone())
    }

    /// Load or build `year` and make it active.
    pub async fn select_year(&self, year: &str, force_rebuild: bool) -> Result<Arc<SearchEngine>> {
        self.session
            .select_year(year, force_rebuild, || self.source_records())
            .await
            .map_err(|e| {
                let rebuildable = e
                    .downcast_ref::<SearchError>()
                    .is_some_and(SearchError::is_recoverable_by_rebuild);
                if rebuildable {
                    e.context(format!("partition {year} needs a rebuild (build --force)"))
                } else {
                    e
                }
            })
    }

    /// Delete the saved partition for `year`.
    pub async fn remove_year(&self, year: &str) -> Result<()> {
        Ok(self.session.builder().store().remove(year).await?)
    }

    /// Search the active year, falling back to configured defaults.
    pub async fn search(
        &self,
        query: &str,
        threshold: Option<f32>,
        top_k: Option<usize>,
    ) -> Result<SearchOutcome> {
        let threshold = threshold.unwrap_or(self.config.query.threshold);
        let top_k = top_k.unwrap_or(self.config.query.top_k);
        Ok(self.session.search(query, threshold, top_k).await?)
    }

    /// Deadline statistics for the active year.
    pub async fn stats(&self, now: NaiveDateTime) -> Result<(String, DeadlineStats)> {
        let engine = self
            .session
            .current()
            .await
            .ok_or(SearchError::NoActivePartition)?;
        let stats = DeadlineStats::compute(engine.partition().records(), now);
        Ok((engine.year().to_string(), stats))
    }

    /// Financial years with a saved partition.
    pub async fn cached_years(&self) -> Result<Vec<String>> {
        Ok(self.session.builder().store().list_years().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;
    use tender_search::EmbeddingConfig;

    async fn offline_app(dir: &TempDir) -> App {
        let config = SearchConfig::new(dir.path()).with_embedding(EmbeddingConfig::hashing());
        let feed = serde_json::json!({
            "data": [
                { "id": 7, "title": "Borehole drilling", "financial_year": "2024-2025" },
                { "id": 8, "title": "Office furniture", "financial_year": "2024-2025" }
            ]
        });
        std::fs::write(config.backup_path(), feed.to_string()).unwrap();
        App::new(config, true).await.unwrap()
    }

    #[tokio::test]
    async fn test_corrupt_partition_suggests_rebuild() {
        let dir = TempDir::new().unwrap();
        let app = offline_app(&dir).await;
        app.select_year("2024-2025", false).await.unwrap();

        let vectors = app.session().builder().store().vectors_path("2024-2025");
        std::fs::write(&vectors, b"garbage").unwrap();

        let fresh = App::new(app.config().clone(), true).await.unwrap();
        let err = fresh.select_year("2024-2025", false).await.unwrap_err();
        assert!(format!("{err:#}").contains("needs a rebuild"));

        let engine = fresh.select_year("2024-2025", true).await.unwrap();
        assert_eq!(engine.partition().len(), 2);
    }

    #[tokio::test]
    async fn test_remove_year() {
        let dir = TempDir::new().unwrap();
        let app = offline_app(&dir).await;
        app.select_year("2024-2025", false).await.unwrap();
        assert_eq!(app.cached_years().await.unwrap(), vec!["2024-2025".to_string()]);

        app.remove_year("2024-2025").await.unwrap();
        assert!(app.cached_years().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_offline_without_backup_fails() {
        let dir = TempDir::new().unwrap();
        let config = SearchConfig::new(dir.path()).with_embedding(EmbeddingConfig::hashing());
        let app = App::new(config, true).await.unwrap();

        let err = app.select_year("2024-2025", false).await.unwrap_err();
        assert!(format!("{err:#}").contains("no data available"));
    }
}
