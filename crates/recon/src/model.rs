use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::engine::Thresholds;
use crate::similarity::Normalization;

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// An incoming record, already field-validated upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateRecord {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub introduced: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discontinued: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
}

impl CandidateRecord {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            introduced: None,
            discontinued: None,
            company_name: None,
        }
    }
}

/// An already-persisted record. Read-only for the whole run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub id: i64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub introduced: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discontinued: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
}

impl CanonicalRecord {
    pub fn named(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            introduced: None,
            discontinued: None,
            company_name: None,
        }
    }
}

/// A candidate feed row that failed field validation. It is never classified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedRow {
    pub line: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub reason: String,
}

/// Fully materialized inputs for one run.
#[derive(Debug, Clone, Default)]
pub struct ReconInput {
    pub candidates: Vec<CandidateRecord>,
    pub corpus: Vec<CanonicalRecord>,
    /// Candidate rows dropped by the loaders, carried into the result.
    pub rejected: Vec<RejectedRow>,
}

// ---------------------------------------------------------------------------
// Scoring
// ---------------------------------------------------------------------------

/// Closeness of two names in [0, 100]. 100 means identical.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct SimilarityScore(f64);

impl SimilarityScore {
    pub const IDENTICAL: Self = Self(100.0);

    pub(crate) fn from_percent(value: f64) -> Self {
        Self(value.clamp(0.0, 100.0))
    }

    pub fn value(self) -> f64 {
        self.0
    }

    pub fn meets(self, threshold: f64) -> bool {
        self.0 >= threshold
    }
}

impl std::fmt::Display for SimilarityScore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

/// A canonical record that qualified at some threshold, with its score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredMatch {
    pub record: CanonicalRecord,
    pub score: SimilarityScore,
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Bucket {
    Import,
    Review,
    Refuse,
}

impl std::fmt::Display for Bucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Import => write!(f, "import"),
            Self::Review => write!(f, "review"),
            Self::Refuse => write!(f, "refuse"),
        }
    }
}

/// A candidate paired with every canonical record that matched it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchGroup {
    pub candidate: CandidateRecord,
    pub threshold: f64,
    pub matches: Vec<ScoredMatch>,
}

/// Outcome for a single candidate.
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    Import,
    Review(MatchGroup),
    Refuse(MatchGroup),
}

impl Classification {
    pub fn bucket(&self) -> Bucket {
        match self {
            Self::Import => Bucket::Import,
            Self::Review(_) => Bucket::Review,
            Self::Refuse(_) => Bucket::Refuse,
        }
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Three disjoint, input-ordered buckets. Append-only while the engine builds it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Report {
    to_import: Vec<CandidateRecord>,
    to_review: Vec<MatchGroup>,
    refused: Vec<MatchGroup>,
    #[serde(skip_serializing_if = "is_zero")]
    unprocessed: usize,
    #[serde(skip)]
    placement: Vec<Bucket>,
}

fn is_zero(n: &usize) -> bool {
    *n == 0
}

impl Report {
    pub fn to_import(&self) -> &[CandidateRecord] {
        &self.to_import
    }

    pub fn to_review(&self) -> &[MatchGroup] {
        &self.to_review
    }

    pub fn refused(&self) -> &[MatchGroup] {
        &self.refused
    }

    /// Candidates skipped because the run was cancelled.
    pub fn unprocessed(&self) -> usize {
        self.unprocessed
    }

    pub fn is_complete(&self) -> bool {
        self.unprocessed == 0
    }

    /// Number of classified candidates.
    pub fn len(&self) -> usize {
        self.placement.len()
    }

    pub fn is_empty(&self) -> bool {
        self.placement.is_empty()
    }

    /// Bucket of the candidate at `index` in the input batch.
    pub fn bucket_of(&self, index: usize) -> Option<Bucket> {
        self.placement.get(index).copied()
    }

    pub fn summary(&self) -> ReportSummary {
        ReportSummary {
            total: self.len() + self.unprocessed,
            to_import: self.to_import.len(),
            to_review: self.to_review.len(),
            refused: self.refused.len(),
            unprocessed: self.unprocessed,
            rejected: 0,
        }
    }

    pub(crate) fn push(&mut self, candidate: &CandidateRecord, classification: Classification) {
        self.placement.push(classification.bucket());
        match classification {
            Classification::Import => self.to_import.push(candidate.clone()),
            Classification::Review(group) => self.to_review.push(group),
            Classification::Refuse(group) => self.refused.push(group),
        }
    }

    pub(crate) fn append(&mut self, other: Report) {
        self.to_import.extend(other.to_import);
        self.to_review.extend(other.to_review);
        self.refused.extend(other.refused);
        self.placement.extend(other.placement);
        self.unprocessed += other.unprocessed;
    }

    pub(crate) fn mark_unprocessed(&mut self, count: usize) {
        self.unprocessed += count;
    }
}

// ---------------------------------------------------------------------------
// Summary + Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReportSummary {
    pub total: usize,
    pub to_import: usize,
    pub to_review: usize,
    pub refused: usize,
    pub unprocessed: usize,
    /// Feed rows rejected before classification. Not part of `total`.
    pub rejected: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconResult {
    pub meta: ReconMeta,
    pub summary: ReportSummary,
    pub report: Report,
    pub rejected: Vec<RejectedRow>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconMeta {
    pub config_name: String,
    pub engine_version: String,
    pub run_at: String,
    pub thresholds: Thresholds,
    pub normalization: Normalization,
    pub corpus_size: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(name: &str) -> MatchGroup {
        MatchGroup {
            candidate: CandidateRecord::named(name),
            threshold: 60.0,
            matches: vec![ScoredMatch {
                record: CanonicalRecord::named(1, name),
                score: SimilarityScore::IDENTICAL,
            }],
        }
    }

    #[test]
    fn push_tracks_placement_and_summary() {
        let mut report = Report::default();
        let a = CandidateRecord::named("a");
        let b = CandidateRecord::named("b");
        report.push(&a, Classification::Import);
        report.push(&b, Classification::Refuse(group("b")));

        assert_eq!(report.len(), 2);
        assert_eq!(report.bucket_of(0), Some(Bucket::Import));
        assert_eq!(report.bucket_of(1), Some(Bucket::Refuse));
        assert_eq!(report.bucket_of(2), None);

        let s = report.summary();
        assert_eq!(s.total, 2);
        assert_eq!(s.to_import, 1);
        assert_eq!(s.refused, 1);
        assert_eq!(s.to_review, 0);
        assert!(report.is_complete());
    }

    #[test]
    fn append_keeps_chunk_order() {
        let mut first = Report::default();
        first.push(&CandidateRecord::named("a"), Classification::Import);
        let mut second = Report::default();
        second.push(&CandidateRecord::named("b"), Classification::Import);
        second.mark_unprocessed(3);

        first.append(second);
        let names: Vec<_> = first.to_import().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["a", "b"]);
        assert_eq!(first.unprocessed(), 3);
        assert_eq!(first.summary().total, 5);
    }

    #[test]
    fn report_serializes_bucket_names() {
        let mut report = Report::default();
        report.push(&CandidateRecord::named("x"), Classification::Review(group("x")));
        let json = serde_json::to_value(&report).unwrap();
        assert!(json["to_import"].as_array().unwrap().is_empty());
        assert_eq!(json["to_review"][0]["candidate"]["name"], "x");
        assert_eq!(json["to_review"][0]["matches"][0]["score"], 100.0);
        assert!(json.get("unprocessed").is_none());
    }

    #[test]
    fn bucket_display() {
        assert_eq!(Bucket::Import.to_string(), "import");
        assert_eq!(Bucket::Review.to_string(), "review");
        assert_eq!(Bucket::Refuse.to_string(), "refuse");
    }
}
