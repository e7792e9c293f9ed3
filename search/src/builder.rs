//! Building partitions from source records.

use std::future::Future;
use std::sync::Arc;

use tracing::{info, warn};

use tender_embeddings::{EmbeddingError, EmbeddingProvider};

use crate::compose::compose;
use crate::error::{Result, SearchError};
use crate::partition::{Partition, PartitionMeta};
use crate::record::TenderRecord;
use crate::store::PartitionStore;

/// Builds, persists, and reloads partitions.
#[derive(Clone)]
pub struct IndexBuilder {
    provider: Arc<dyn EmbeddingProvider>,
    store: PartitionStore,
}

impl IndexBuilder {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, store: PartitionStore) -> Self {
        Self { provider, store }
    }

    pub fn provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.provider
    }

    pub fn store(&self) -> &PartitionStore {
        &self.store
    }

    /// Embed every record of `year` and save the result.
    ///
    /// Records keep their relative order from `all_records`. The partition
    /// is on disk before this returns.
    pub async fn build(&self, all_records: &[TenderRecord], year: &str) -> Result<Partition> {
        let records: Vec<TenderRecord> = all_records
            .iter()
            .filter(|r| r.financial_year == year)
            .cloned()
            .collect();

        if records.is_empty() {
            return Err(SearchError::EmptyPartition {
                year: year.to_string(),
            });
        }

        info!(
            "Found {} tenders for {year}, embedding with {}/{}",
            records.len(),
            self.provider.name(),
            self.provider.model()
        );

        let texts: Vec<String> = records.iter().map(compose).collect();
        let operation = || format!("batch embedding for {year}");
        let vectors = self
            .provider
            .embed_batch(&texts)
            .await
            .map_err(|e| SearchError::provider(operation(), e))?;

        if vectors.len() != records.len() {
            return Err(SearchError::provider(
                operation(),
                EmbeddingError::CountMismatch {
                    requested: records.len(),
                    returned: vectors.len(),
                },
            ));
        }

        let declared = self.provider.dimension();
        if let Some(v) = vectors.iter().find(|v| v.len() != declared) {
            return Err(SearchError::DimensionMismatch {
                year: year.to_string(),
                expected: declared,
                actual: v.len(),
            });
        }

        let meta = PartitionMeta::for_provider(self.provider.as_ref());
        let partition = Partition::new(year, records, vectors, meta)?;
        self.store.save(&partition).await?;

        info!("Built partition {year} with {} records", partition.len());
        Ok(partition)
    }

    /// Load the saved partition for `year`, building it when needed.
    ///
    /// `fetch` is only called when a build happens: when `force` is set,
    /// nothing is saved yet, or the saved vectors came from an older text
    /// composer. A corrupt save is returned as an error; rebuilding it is
    /// the caller's decision (pass `force`).
    pub async fn load_or_build<F, Fut, E>(
        &self,
        year: &str,
        force: bool,
        fetch: F,
    ) -> std::result::Result<Partition, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<Vec<TenderRecord>, E>>,
        E: From<SearchError>,
    {
        if !force {
            match self.store.load(year).await {
                Ok(partition) => {
                    info!("Loaded saved partition {year} ({} records)", partition.len());
                    return Ok(partition);
                }
                Err(SearchError::NotFound { .. }) => {
                    info!("No saved partition for {year}, building");
                }
                Err(e @ SearchError::StalePartition { .. }) => {
                    warn!("{e}; rebuilding");
                }
                Err(e) => return Err(e.into()),
            }
        }

        let records = fetch().await?;
        Ok(self.build(&records, year).await?)
    }
}
