use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;

use crate::config::ReconConfig;
use crate::error::ReconError;
use crate::matcher::matches_at_or_above;
use crate::model::{
    CandidateRecord, CanonicalRecord, Classification, MatchGroup, ReconInput, ReconMeta,
    ReconResult, Report,
};
use crate::similarity::{Levenshtein, SimilarityMetric};

// ---------------------------------------------------------------------------
// Thresholds
// ---------------------------------------------------------------------------

/// The two similarity cut-offs, in percent.
///
/// Always `0 <= low <= high <= 100`. Because every match at `high` also
/// qualifies at `low`, and `low` is checked first, nothing ever reaches the
/// review bucket.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Thresholds {
    low: f64,
    high: f64,
}

impl Thresholds {
    pub const REFERENCE: Self = Self { low: 60.0, high: 70.0 };

    pub fn new(low: f64, high: f64) -> Result<Self, ReconError> {
        for (label, value) in [("low", low), ("high", high)] {
            if !value.is_finite() || !(0.0..=100.0).contains(&value) {
                return Err(ReconError::InvalidThreshold(format!(
                    "{label} threshold must be within [0, 100], got {value}"
                )));
            }
        }
        if low > high {
            return Err(ReconError::InvalidThreshold(format!(
                "low threshold {low} is above high threshold {high}"
            )));
        }
        Ok(Self { low, high })
    }

    pub fn low(&self) -> f64 {
        self.low
    }

    pub fn high(&self) -> f64 {
        self.high
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self::REFERENCE
    }
}

// ---------------------------------------------------------------------------
// Reconciler
// ---------------------------------------------------------------------------

/// Classifies candidates against a read-only corpus snapshot.
#[derive(Debug, Clone)]
pub struct Reconciler<M = Levenshtein> {
    metric: M,
    thresholds: Thresholds,
}

impl Reconciler<Levenshtein> {
    pub fn from_config(config: &ReconConfig) -> Result<Self, ReconError> {
        Ok(Self::new(
            Levenshtein::new(config.similarity.normalization),
            config.thresholds()?,
        ))
    }
}

impl<M: SimilarityMetric> Reconciler<M> {
    pub fn new(metric: M, thresholds: Thresholds) -> Self {
        Self { metric, thresholds }
    }

    pub fn thresholds(&self) -> Thresholds {
        self.thresholds
    }

    pub fn metric(&self) -> &M {
        &self.metric
    }

    /// Low threshold first: any match there refuses the candidate. Only a
    /// candidate with no low match is checked at the high threshold.
    pub fn classify(
        &self,
        candidate: &CandidateRecord,
        corpus: &[CanonicalRecord],
    ) -> Classification {
        let low = self.thresholds.low;
        let low_matches = matches_at_or_above(&self.metric, candidate, corpus, low);
        if !low_matches.is_empty() {
            return Classification::Refuse(MatchGroup {
                candidate: candidate.clone(),
                threshold: low,
                matches: low_matches,
            });
        }

        let high = self.thresholds.high;
        let high_matches = matches_at_or_above(&self.metric, candidate, corpus, high);
        if !high_matches.is_empty() {
            return Classification::Review(MatchGroup {
                candidate: candidate.clone(),
                threshold: high,
                matches: high_matches,
            });
        }

        Classification::Import
    }

    /// Single pass over the batch. Bucket order follows input order.
    pub fn reconcile(
        &self,
        candidates: &[CandidateRecord],
        corpus: &[CanonicalRecord],
    ) -> Report {
        let mut report = Report::default();
        for candidate in candidates {
            self.place(&mut report, candidate, corpus);
        }
        log_summary(&report);
        report
    }

    /// Like [`reconcile`](Self::reconcile) but stops between candidates once
    /// `cancel` is set. Already-placed candidates stay in the report; the rest
    /// are counted as unprocessed.
    pub fn reconcile_until(
        &self,
        candidates: &[CandidateRecord],
        corpus: &[CanonicalRecord],
        cancel: &AtomicBool,
    ) -> Report {
        let mut report = Report::default();
        for (i, candidate) in candidates.iter().enumerate() {
            if cancel.load(Ordering::Relaxed) {
                let remaining = candidates.len() - i;
                log::warn!("reconciliation cancelled, {remaining} candidate(s) not processed");
                report.mark_unprocessed(remaining);
                break;
            }
            self.place(&mut report, candidate, corpus);
        }
        log_summary(&report);
        report
    }

    /// Classifies contiguous chunks of the batch on scoped threads and
    /// concatenates them in order. Same result as [`reconcile`](Self::reconcile).
    pub fn reconcile_parallel(
        &self,
        candidates: &[CandidateRecord],
        corpus: &[CanonicalRecord],
        workers: usize,
    ) -> Report {
        let workers = workers.max(1);
        if workers == 1 || candidates.len() < 2 {
            return self.reconcile(candidates, corpus);
        }

        let chunk_size = candidates.len().div_ceil(workers);
        let chunks: Vec<Report> = std::thread::scope(|scope| {
            let handles: Vec<_> = candidates
                .chunks(chunk_size)
                .map(|chunk| {
                    scope.spawn(move || {
                        let mut partial = Report::default();
                        for candidate in chunk {
                            self.place(&mut partial, candidate, corpus);
                        }
                        partial
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|h| match h.join() {
                    Ok(partial) => partial,
                    Err(panic) => std::panic::resume_unwind(panic),
                })
                .collect()
        });

        let mut report = Report::default();
        for partial in chunks {
            report.append(partial);
        }
        log_summary(&report);
        report
    }

    fn place(&self, report: &mut Report, candidate: &CandidateRecord, corpus: &[CanonicalRecord]) {
        let classification = self.classify(candidate, corpus);
        log::debug!(
            "candidate '{}' -> {}",
            candidate.name,
            classification.bucket()
        );
        report.push(candidate, classification);
    }
}

fn log_summary(report: &Report) {
    let s = report.summary();
    log::info!(
        "reconciled {} candidate(s): {} to import, {} to review, {} refused",
        s.total - s.unprocessed,
        s.to_import,
        s.to_review,
        s.refused
    );
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Reconcile with the reference metric. Thresholds are validated before any
/// scan, so an error never comes with a partial report.
pub fn reconcile(
    candidates: &[CandidateRecord],
    corpus: &[CanonicalRecord],
    low_threshold: f64,
    high_threshold: f64,
) -> Result<Report, ReconError> {
    let thresholds = Thresholds::new(low_threshold, high_threshold)?;
    Ok(Reconciler::new(Levenshtein::default(), thresholds).reconcile(candidates, corpus))
}

/// Run reconciliation per config. Returns the report + meta and summary.
pub fn run(config: &ReconConfig, input: &ReconInput) -> Result<ReconResult, ReconError> {
    run_with_workers(config, input, 1)
}

/// [`run`] with candidates spread over `workers` threads.
pub fn run_with_workers(
    config: &ReconConfig,
    input: &ReconInput,
    workers: usize,
) -> Result<ReconResult, ReconError> {
    let limit = config.limits.max_corpus_size;
    if input.corpus.len() > limit {
        return Err(ReconError::CorpusTooLarge {
            size: input.corpus.len(),
            limit,
        });
    }

    let reconciler = Reconciler::from_config(config)?;
    let report = reconciler.reconcile_parallel(&input.candidates, &input.corpus, workers);
    let mut summary = report.summary();
    summary.rejected = input.rejected.len();

    Ok(ReconResult {
        meta: ReconMeta {
            config_name: config.name.clone(),
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            run_at: chrono::Utc::now().to_rfc3339(),
            thresholds: reconciler.thresholds(),
            normalization: reconciler.metric().normalization(),
            corpus_size: input.corpus.len(),
        },
        summary,
        report,
        rejected: input.rejected.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Bucket, RejectedRow, SimilarityScore};
    use crate::similarity::Normalization;
    use proptest::prelude::*;

    fn corpus(names: &[&str]) -> Vec<CanonicalRecord> {
        names
            .iter()
            .enumerate()
            .map(|(i, n)| CanonicalRecord::named(i as i64 + 1, *n))
            .collect()
    }

    fn candidates(names: &[&str]) -> Vec<CandidateRecord> {
        names.iter().map(|n| CandidateRecord::named(*n)).collect()
    }

    /// Scores every pair the same.
    struct Fixed(f64);

    impl SimilarityMetric for Fixed {
        fn similarity(&self, _a: &str, _b: &str) -> SimilarityScore {
            SimilarityScore::from_percent(self.0)
        }
    }

    #[test]
    fn near_duplicate_is_refused_with_its_match() {
        let corpus = corpus(&["Macintosh"]);
        let report = reconcile(&candidates(&["Macintош"]), &corpus, 60.0, 70.0).unwrap();
        assert!(report.to_import().is_empty());
        assert!(report.to_review().is_empty());
        assert_eq!(report.refused().len(), 1);
        let group = &report.refused()[0];
        assert_eq!(group.candidate.name, "Macintош");
        assert_eq!(group.threshold, 60.0);
        assert_eq!(group.matches[0].record, corpus[0]);
    }

    #[test]
    fn empty_corpus_imports_everything() {
        let batch = candidates(&["Amiga", "Atari ST", "", "BBC Micro"]);
        let report = reconcile(&batch, &[], 60.0, 70.0).unwrap();
        assert_eq!(report.to_import().len(), 4);
        assert!(report.to_review().is_empty());
        assert!(report.refused().is_empty());
    }

    #[test]
    fn reversed_thresholds_are_rejected() {
        let err = reconcile(&candidates(&["Amiga"]), &corpus(&["Amiga"]), 70.0, 60.0).unwrap_err();
        assert!(matches!(err, ReconError::InvalidThreshold(_)));
    }

    #[test]
    fn out_of_range_thresholds_are_rejected() {
        assert!(Thresholds::new(-1.0, 70.0).is_err());
        assert!(Thresholds::new(60.0, 100.5).is_err());
        assert!(Thresholds::new(f64::NAN, 70.0).is_err());
        assert!(Thresholds::new(0.0, 100.0).is_ok());
        assert!(Thresholds::new(65.0, 65.0).is_ok());
    }

    #[test]
    fn reference_thresholds_are_default() {
        let t = Thresholds::default();
        assert_eq!((t.low(), t.high()), (60.0, 70.0));
    }

    #[test]
    fn buckets_keep_input_order() {
        let corpus = corpus(&["Apple II", "Commodore 64"]);
        let batch = candidates(&["Osborne 1", "Apple IIc", "Kaypro II", "Commodore 128", "Cray-1"]);
        let report = reconcile(&batch, &corpus, 60.0, 70.0).unwrap();

        let imported: Vec<_> = report.to_import().iter().map(|c| c.name.as_str()).collect();
        let refused: Vec<_> = report.refused().iter().map(|g| g.candidate.name.as_str()).collect();
        assert_eq!(imported, ["Osborne 1", "Kaypro II", "Cray-1"]);
        assert_eq!(refused, ["Apple IIc", "Commodore 128"]);
        assert_eq!(report.bucket_of(1), Some(Bucket::Refuse));
        assert_eq!(report.bucket_of(2), Some(Bucket::Import));
    }

    #[test]
    fn refuse_group_holds_every_low_match() {
        let corpus = corpus(&["Amiga 500", "Amiga 500", "Amiga 600", "PET"]);
        let report = reconcile(&candidates(&["Amiga 500"]), &corpus, 60.0, 70.0).unwrap();
        let ids: Vec<_> = report.refused()[0].matches.iter().map(|m| m.record.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn review_unreachable_with_any_metric() {
        // Landing in review needs score < low and score >= high, i.e. low > high.
        let reconciler = Reconciler::new(Fixed(65.0), Thresholds::new(66.0, 66.0).unwrap());
        let report = reconciler.reconcile(&candidates(&["x"]), &corpus(&["y"]));
        assert_eq!(report.to_import().len(), 1);
        assert!(report.to_review().is_empty());

        let reconciler = Reconciler::new(Fixed(65.0), Thresholds::new(65.0, 65.0).unwrap());
        let report = reconciler.reconcile(&candidates(&["x"]), &corpus(&["y"]));
        assert_eq!(report.refused().len(), 1);
        assert!(report.to_review().is_empty());
    }

    #[test]
    fn folded_normalization_changes_outcome() {
        let corpus = corpus(&["IBM PC"]);
        let batch = candidates(&["ibm pc"]);

        let exact = Reconciler::new(Levenshtein::default(), Thresholds::REFERENCE);
        assert_eq!(exact.reconcile(&batch, &corpus).to_import().len(), 1);

        let folded = Reconciler::new(Levenshtein::new(Normalization::Folded), Thresholds::REFERENCE);
        assert_eq!(folded.reconcile(&batch, &corpus).refused().len(), 1);
    }

    #[test]
    fn cancellation_keeps_placed_candidates() {
        let cancel = AtomicBool::new(false);
        let reconciler = Reconciler::new(Levenshtein::default(), Thresholds::REFERENCE);
        let batch = candidates(&["Amiga", "Atari", "Acorn"]);

        let full = reconciler.reconcile_until(&batch, &[], &cancel);
        assert!(full.is_complete());
        assert_eq!(full.len(), 3);

        cancel.store(true, Ordering::Relaxed);
        let cancelled = reconciler.reconcile_until(&batch, &[], &cancel);
        assert_eq!(cancelled.len(), 0);
        assert_eq!(cancelled.unprocessed(), 3);
        assert!(!cancelled.is_complete());
        assert_eq!(cancelled.summary().total, 3);
    }

    #[test]
    fn parallel_matches_sequential() {
        let corpus = corpus(&["Apple II", "Commodore 64", "ZX Spectrum", "Amstrad CPC"]);
        let batch = candidates(&[
            "Apple IIe", "Osborne 1", "ZX Spectrum+", "TRS-80", "Amstrad PCW", "Commodore 16",
            "Cray-1", "Apple III", "Oric-1",
        ]);
        let reconciler = Reconciler::new(Levenshtein::default(), Thresholds::REFERENCE);
        let sequential = reconciler.reconcile(&batch, &corpus);
        for workers in [0, 1, 2, 4, 16] {
            assert_eq!(reconciler.reconcile_parallel(&batch, &corpus, workers), sequential);
        }
    }

    #[test]
    fn run_rejects_oversized_corpus() {
        let config = ReconConfig::from_toml(
            r#"
name = "tiny"
[limits]
max_corpus_size = 1
"#,
        )
        .unwrap();
        let input = ReconInput {
            candidates: candidates(&["Amiga"]),
            corpus: corpus(&["Atari", "Acorn"]),
            ..ReconInput::default()
        };
        let err = run(&config, &input).unwrap_err();
        assert_eq!(err, ReconError::CorpusTooLarge { size: 2, limit: 1 });
    }

    #[test]
    fn run_fills_meta_and_summary() {
        let config = ReconConfig::from_toml("name = \"nightly\"").unwrap();
        let input = ReconInput {
            candidates: candidates(&["Macintош", "Osborne 1"]),
            corpus: corpus(&["Macintosh"]),
            rejected: vec![RejectedRow {
                line: 4,
                name: None,
                reason: "name is required".into(),
            }],
        };
        let result = run(&config, &input).unwrap();
        assert_eq!(result.meta.config_name, "nightly");
        assert_eq!(result.meta.corpus_size, 1);
        assert_eq!(result.meta.thresholds, Thresholds::REFERENCE);
        assert_eq!(result.meta.normalization, Normalization::Exact);
        assert_eq!(result.summary.total, 2);
        assert_eq!(result.summary.refused, 1);
        assert_eq!(result.summary.to_import, 1);
        assert_eq!(result.summary.rejected, 1);
        assert_eq!(result.rejected[0].line, 4);
    }

    proptest! {
        #[test]
        fn prop_every_candidate_in_exactly_one_bucket(
            batch in proptest::collection::vec("[a-dA-D ]{0,6}", 0..16),
            names in proptest::collection::vec("[a-dA-D ]{0,6}", 0..10),
            low in 0.0f64..=100.0,
            high in 0.0f64..=100.0,
        ) {
            let (low, high) = if low <= high { (low, high) } else { (high, low) };
            let refs: Vec<&str> = names.iter().map(String::as_str).collect();
            let batch: Vec<_> = batch.into_iter().map(CandidateRecord::named).collect();
            let report = reconcile(&batch, &corpus(&refs), low, high).unwrap();
            let s = report.summary();
            prop_assert_eq!(s.to_import + s.to_review + s.refused, batch.len());
            prop_assert_eq!(report.len(), batch.len());
            prop_assert_eq!(report.bucket_of(batch.len()), None);

            // replaying placements in input order must rebuild each bucket exactly
            let (mut import, mut review, mut refuse) = (Vec::new(), Vec::new(), Vec::new());
            for (i, candidate) in batch.iter().enumerate() {
                match report.bucket_of(i) {
                    Some(Bucket::Import) => import.push(candidate.name.as_str()),
                    Some(Bucket::Review) => review.push(candidate.name.as_str()),
                    Some(Bucket::Refuse) => refuse.push(candidate.name.as_str()),
                    None => prop_assert!(false, "candidate {} has no bucket", i),
                }
            }
            let imported: Vec<_> = report.to_import().iter().map(|c| c.name.as_str()).collect();
            let reviewed: Vec<_> = report.to_review().iter().map(|g| g.candidate.name.as_str()).collect();
            let refused: Vec<_> = report.refused().iter().map(|g| g.candidate.name.as_str()).collect();
            prop_assert_eq!(imported, import);
            prop_assert_eq!(reviewed, review);
            prop_assert_eq!(refused, refuse);
        }

        #[test]
        fn prop_review_unreachable_at_reference_thresholds(
            batch in proptest::collection::vec("[a-cA-C]{0,6}", 0..12),
            names in proptest::collection::vec("[a-cA-C]{0,6}", 0..12),
        ) {
            let refs: Vec<&str> = names.iter().map(String::as_str).collect();
            let batch: Vec<_> = batch.into_iter().map(CandidateRecord::named).collect();
            let report = reconcile(&batch, &corpus(&refs), 60.0, 70.0).unwrap();
            prop_assert!(report.to_review().is_empty());
        }
    }
}
