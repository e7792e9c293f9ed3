//! # Tender Search
//!
//! Per-financial-year embedding index and exact similarity search over
//! procurement tenders.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         Tender Search                           │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                  │
//! │  TenderRecord ──► compose ──► EmbeddingProvider                  │
//! │                                   │                              │
//! │                                   ▼                              │
//! │                           ┌──────────────┐    ┌──────────────┐   │
//! │                           │ IndexBuilder │◄──►│PartitionStore│   │
//! │                           └──────────────┘    └──────────────┘   │
//! │                                   │                              │
//! │                                   ▼                              │
//! │                              Partition                           │
//! │                                   │                              │
//! │                                   ▼                              │
//! │  Session ──(active handle)──► SearchEngine ──► SearchOutcome     │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tender_search::{IndexBuilder, PartitionStore, SearchConfig, Session};
//!
//! let config = SearchConfig::load(None)?;
//! let store = PartitionStore::new(config.partitions_dir()).await?;
//! let session = Session::new(IndexBuilder::new(config.embedding.build_provider(), store));
//!
//! session.select_year("2024-2025", false, || fetch_records()).await?;
//! let outcome = session.search("road construction", 0.3, 5).await?;
//! ```

pub mod builder;
pub mod compose;
pub mod config;
pub mod engine;
pub mod error;
pub mod partition;
pub mod record;
pub mod session;
pub mod store;

pub use builder::IndexBuilder;
pub use compose::{COMPOSER_VERSION, compose};
pub use config::{EmbeddingConfig, EmbeddingProviderType, FeedConfig, QueryConfig, SearchConfig};
pub use engine::{Scoring, SearchEngine, SearchOutcome, SearchResult, rank};
pub use error::{Result, SearchError};
pub use partition::{Partition, PartitionMeta};
pub use record::{RawTender, TenderRecord};
pub use session::Session;
pub use store::PartitionStore;

// Re-export from dependencies for convenience
pub use tender_embeddings::{Embedding, EmbeddingProvider};
