//! Two-phase ranking, document grouping, and multi-query aggregation.

pub mod aggregate;
pub mod engine;
pub mod grouper;
pub mod ranker;

pub use aggregate::PhaseMerger;
pub use engine::{build_context, RetrievedPassage, SearchEngine, SearchResults};
pub use grouper::{group_by_document, DocumentGroup};
pub use ranker::TwoPhaseRanker;
