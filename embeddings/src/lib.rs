//! # Embeddings
//!
//! This crate turns tender text into dense vectors and provides the vector
//! math the search engine scores with.
//!
//! ## Features
//!
//! - **Embedding Generation**: [`EmbeddingProvider`] maps text to a
//!   fixed-dimension vector, one at a time or in batches
//! - **Normalization Guarantee**: every provider declares whether its
//!   outputs are unit-length via [`EmbeddingProvider::normalizes`]
//! - **Multiple Providers**: an OpenAI-compatible HTTP API and a
//!   deterministic offline hashing model
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Embeddings System                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  EmbeddingProvider ──► Embedding ──► similarity                 │
//! │       │                                 │                       │
//! │       ▼                                 ▼                       │
//! │  OpenAI / Hashing            dot_product / cosine_similarity   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod provider;
pub mod similarity;

pub use error::{EmbeddingError, Result};
pub use provider::{EmbeddingProvider, HashingProvider, OpenAIProvider};
pub use similarity::{cosine_similarity, dot_product, magnitude, normalize};

/// A dense vector embedding.
pub type Embedding = Vec<f32>;

/// Dimension of embeddings produced by the offline hashing provider.
pub const DEFAULT_HASHING_DIMENSION: usize = 384;
