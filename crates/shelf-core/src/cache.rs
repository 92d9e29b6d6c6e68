//! Replace-only cache of assay outcomes.
//!
//! Entries are addressed by product, lot set and assay, and guarded by a
//! SHA-256 fingerprint of every input that influences the outcome. A lookup
//! with a different fingerprint is a miss, and the stored entry is replaced
//! wholesale by the fresh outcome.

use std::collections::HashMap;

use sha2::{Digest, Sha256};
use shelf_model::{AnalysisOptions, BoundKind, LimitDirection, LotGroup, SpecLimit};
use tracing::trace;

use crate::assay::AssayOutcome;

/// Cache address of one assay outcome.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub product_id: String,
    /// Sorted lot identifiers.
    pub lot_ids: Vec<String>,
    pub assay: String,
}

impl CacheKey {
    pub fn new(product_id: impl Into<String>, lots: &[LotGroup], assay: impl Into<String>) -> Self {
        let mut lot_ids: Vec<String> = lots.iter().map(|lot| lot.lot_id().to_string()).collect();
        lot_ids.sort();
        lot_ids.dedup();
        Self {
            product_id: product_id.into(),
            lot_ids,
            assay: assay.into(),
        }
    }
}

/// Hex SHA-256 over the assay's observations, limit and options.
///
/// Observations are hashed per lot in sorted order, so record order does not
/// change the fingerprint.
pub fn fingerprint(
    lots: &[LotGroup],
    assay: &str,
    spec_limit: &SpecLimit,
    options: &AnalysisOptions,
) -> String {
    let mut ordered: Vec<&LotGroup> = lots.iter().collect();
    ordered.sort_by(|a, b| a.lot_id().cmp(b.lot_id()));

    let mut hasher = Sha256::new();
    update_str(&mut hasher, assay);
    for lot in ordered {
        update_str(&mut hasher, lot.product_id());
        update_str(&mut hasher, lot.lot_id());
        let points = lot.points(assay);
        hasher.update((points.len() as u64).to_le_bytes());
        for (time, value) in points {
            hasher.update(time.to_bits().to_le_bytes());
            hasher.update(value.to_bits().to_le_bytes());
        }
    }

    hasher.update(spec_limit.value.to_bits().to_le_bytes());
    hasher.update([match spec_limit.direction {
        LimitDirection::Upper => 1u8,
        LimitDirection::Lower => 2u8,
    }]);

    hasher.update(options.significance.to_bits().to_le_bytes());
    hasher.update(options.confidence.to_bits().to_le_bytes());
    hasher.update(options.horizon_factor.to_bits().to_le_bytes());
    hasher.update([match options.bound {
        BoundKind::Confidence => 1u8,
        BoundKind::Prediction => 2u8,
    }]);
    hasher.update((options.curve_points as u64).to_le_bytes());

    hex::encode(hasher.finalize())
}

fn update_str(hasher: &mut Sha256, value: &str) {
    hasher.update((value.len() as u64).to_le_bytes());
    hasher.update(value.as_bytes());
}

#[derive(Debug, Clone)]
struct CacheEntry {
    fingerprint: String,
    outcome: AssayOutcome,
}

/// In-memory outcome cache.
#[derive(Debug, Clone, Default)]
pub struct ResultCache {
    entries: HashMap<CacheKey, CacheEntry>,
    hits: u64,
    misses: u64,
}

impl ResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the stored outcome only if it was computed from identical
    /// inputs.
    pub fn get(&self, key: &CacheKey, fingerprint: &str) -> Option<&AssayOutcome> {
        self.entries
            .get(key)
            .filter(|entry| entry.fingerprint == fingerprint)
            .map(|entry| &entry.outcome)
    }

    /// Stores an outcome, replacing whatever the key held before.
    pub fn insert(&mut self, key: CacheKey, fingerprint: String, outcome: AssayOutcome) {
        self.entries.insert(
            key,
            CacheEntry {
                fingerprint,
                outcome,
            },
        );
    }

    /// Cached outcome for matching inputs, otherwise computes and stores a
    /// fresh one.
    pub fn get_or_compute<F>(&mut self, key: CacheKey, fingerprint: String, compute: F) -> AssayOutcome
    where
        F: FnOnce() -> AssayOutcome,
    {
        if let Some(outcome) = self.get(&key, &fingerprint) {
            let outcome = outcome.clone();
            self.record_hit(&key);
            return outcome;
        }
        self.record_miss(&key);
        let outcome = compute();
        self.insert(key, fingerprint, outcome.clone());
        outcome
    }

    pub(crate) fn record_hit(&mut self, key: &CacheKey) {
        self.hits += 1;
        trace!(assay = %key.assay, product = %key.product_id, "cache hit");
    }

    pub(crate) fn record_miss(&mut self, key: &CacheKey) {
        self.misses += 1;
        trace!(assay = %key.assay, product = %key.product_id, "cache miss");
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shelf_model::{Grouping, StabilityRecord};

    fn lot(lot_id: &str, series: &[(f64, f64)]) -> LotGroup {
        LotGroup::new(
            series
                .iter()
                .map(|&(t, v)| StabilityRecord::new("P", lot_id, t).with_assay("purity", v))
                .collect(),
        )
        .unwrap()
    }

    fn outcome(label: &str) -> AssayOutcome {
        AssayOutcome {
            assay: label.to_string(),
            spec_limit: SpecLimit::lower(95.0),
            lot_ids: Vec::new(),
            poolability: None,
            grouping: Grouping::Pooled,
            projection: None,
            failure: None,
        }
    }

    #[test]
    fn test_fingerprint_ignores_lot_order() {
        let a = lot("L1", &[(0.0, 99.5), (6.0, 99.2)]);
        let b = lot("L2", &[(0.0, 99.4), (6.0, 99.0)]);
        let limit = SpecLimit::lower(95.0);
        let options = AnalysisOptions::default();
        assert_eq!(
            fingerprint(&[a.clone(), b.clone()], "purity", &limit, &options),
            fingerprint(&[b, a], "purity", &limit, &options)
        );
    }

    #[test]
    fn test_fingerprint_tracks_every_input() {
        let lots = [lot("L1", &[(0.0, 99.5), (6.0, 99.2)])];
        let limit = SpecLimit::lower(95.0);
        let options = AnalysisOptions::default();
        let base = fingerprint(&lots, "purity", &limit, &options);
        assert_eq!(base.len(), 64);

        let changed_data = [lot("L1", &[(0.0, 99.5), (6.0, 99.1)])];
        assert_ne!(base, fingerprint(&changed_data, "purity", &limit, &options));
        assert_ne!(
            base,
            fingerprint(&lots, "purity", &SpecLimit::upper(95.0), &options)
        );
        assert_ne!(
            base,
            fingerprint(&lots, "purity", &limit, &options.with_confidence(0.99))
        );
    }

    #[test]
    fn test_mismatched_fingerprint_recomputes_and_replaces() {
        let lots = [lot("L1", &[(0.0, 99.5), (6.0, 99.2)])];
        let key = CacheKey::new("P", &lots, "purity");
        let mut cache = ResultCache::new();

        let first = cache.get_or_compute(key.clone(), "aaa".to_string(), || outcome("first"));
        assert_eq!(first.assay, "first");
        let again = cache.get_or_compute(key.clone(), "aaa".to_string(), || outcome("unused"));
        assert_eq!(again.assay, "first");
        let replaced = cache.get_or_compute(key.clone(), "bbb".to_string(), || outcome("second"));
        assert_eq!(replaced.assay, "second");

        assert!(cache.get(&key, "aaa").is_none());
        assert_eq!(cache.len(), 1);
        assert_eq!((cache.hits(), cache.misses()), (1, 2));
    }
}
