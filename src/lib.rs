//! wikirag - Two-phase retrieval over pre-embedded wiki corpora
//!
//! Retrieves grounding passages for a natural-language query from a sharded,
//! in-memory vector store: a title-level phase and a concurrent body-chunk
//! phase, followed by document grouping, overlap-aware chunk merging, and
//! redirect/markup normalization.
//!
//! # Architecture
//!
//! - [`store`]: immutable sharded vector store built from loader input
//! - [`search`]: two-phase ranker, document grouper, multi-query aggregation,
//!   and the [`SearchEngine`] facade
//! - [`text`]: chunk merging, wiki markup cleanup, redirect resolution
//! - [`embedding`]: the external text-to-vector boundary

pub mod config;
pub mod embedding;
pub mod errors;
pub mod page_index;
pub mod search;
pub mod store;
pub mod text;

// Re-export commonly used types
pub use config::RetrievalConfig;
pub use errors::{Result, RetrievalError};
pub use search::{build_context, RetrievedPassage, SearchEngine, SearchResults};
pub use store::{StoreBuilder, VectorStore};
