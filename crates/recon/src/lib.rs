//! `dedup-recon`: fuzzy duplicate reconciliation for incoming computer records.
//!
//! Pure engine crate: receives a candidate batch and a corpus snapshot, returns
//! a three-bucket report (import / review / refuse). The only IO is in `load`.

pub mod config;
pub mod engine;
pub mod error;
pub mod load;
pub mod matcher;
pub mod model;
pub mod similarity;

pub use config::ReconConfig;
pub use engine::{reconcile, run, run_with_workers, Reconciler, Thresholds};
pub use error::ReconError;
pub use model::{
    Bucket, CandidateRecord, CanonicalRecord, Classification, MatchGroup, ReconInput,
    ReconResult, RejectedRow, Report, ReportSummary, ScoredMatch, SimilarityScore,
};
pub use similarity::{similarity, Levenshtein, Normalization, SimilarityMetric};
