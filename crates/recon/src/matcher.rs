use crate::model::{CandidateRecord, CanonicalRecord, ScoredMatch};
use crate::similarity::SimilarityMetric;

/// Every canonical record whose name scores `>= threshold` against the candidate.
///
/// Scans the whole corpus, one similarity computation per record, and keeps
/// corpus order. `corpus` can be any iterator, so a caller that cannot hold
/// the full table in memory may stream it through here.
pub fn matches_at_or_above<'c, M, I>(
    metric: &M,
    candidate: &CandidateRecord,
    corpus: I,
    threshold: f64,
) -> Vec<ScoredMatch>
where
    M: SimilarityMetric + ?Sized,
    I: IntoIterator<Item = &'c CanonicalRecord>,
{
    corpus
        .into_iter()
        .filter_map(|record| {
            let score = metric.similarity(&candidate.name, &record.name);
            score.meets(threshold).then(|| ScoredMatch {
                record: record.clone(),
                score,
            })
        })
        .collect()
}

/// True as soon as one record qualifies. Only for emptiness checks; callers
/// that need the matched records must use [`matches_at_or_above`].
pub fn has_match_at_or_above<'c, M, I>(
    metric: &M,
    candidate: &CandidateRecord,
    corpus: I,
    threshold: f64,
) -> bool
where
    M: SimilarityMetric + ?Sized,
    I: IntoIterator<Item = &'c CanonicalRecord>,
{
    corpus
        .into_iter()
        .any(|record| metric.similarity(&candidate.name, &record.name).meets(threshold))
}
