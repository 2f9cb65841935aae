//! Recommendation resolution & ranking engine
//!
//! Stages, leaves first:
//! - `normalize`: title normalization used by every comparison
//! - `query_planner`: seeds → bounded query variants
//! - `aggregator`: query variants → flat record list from both backends
//! - `dedup`: flat list → bounded candidate pool
//! - `seed_resolver`: raw seed → best-matching catalog record
//! - `requester`: prompt contract + structured call with free-text fallback
//! - `post_filter`, `enricher`, `reranker`: shape the model's output
//! - `pipeline`: wires the stages into the title and image flows

pub mod aggregator;
pub mod dedup;
pub mod enricher;
pub mod info_url;
pub mod normalize;
pub mod pipeline;
pub mod post_filter;
pub mod query_planner;
pub mod requester;
pub mod reranker;
pub mod seed_resolver;

pub use aggregator::CatalogAggregator;
pub use dedup::CandidatePool;
pub use normalize::normalize;
pub use post_filter::SeedIndex;
pub use pipeline::{ImageRecommendation, RecommendationEngine, TitleRecommendation};
pub use query_planner::QueryPlanner;
pub use requester::{GenerationOutcome, RecommendationRequester};
pub use seed_resolver::SeedResolver;
