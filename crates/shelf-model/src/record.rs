//! Stability observations and their grouping by manufacturing lot.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};

/// One stability observation of a lot at a single timepoint.
///
/// Assays that were not measured (or came in empty) are simply absent from
/// `assay_values`; they are never zero-filled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StabilityRecord {
    pub product_id: String,
    pub lot_id: String,
    /// Time since manufacture in study units (usually months).
    pub timepoint: f64,
    pub assay_values: BTreeMap<String, f64>,
}

impl StabilityRecord {
    pub fn new(product_id: impl Into<String>, lot_id: impl Into<String>, timepoint: f64) -> Self {
        Self {
            product_id: product_id.into(),
            lot_id: lot_id.into(),
            timepoint,
            assay_values: BTreeMap::new(),
        }
    }

    /// Adds a measurement. Non-finite values are treated as missing.
    #[must_use]
    pub fn with_assay(mut self, assay: impl Into<String>, value: f64) -> Self {
        if value.is_finite() {
            self.assay_values.insert(assay.into(), value);
        }
        self
    }

    /// Returns the measured value for `assay`, if present and finite.
    pub fn value(&self, assay: &str) -> Option<f64> {
        self.assay_values
            .get(assay)
            .copied()
            .filter(|value| value.is_finite())
    }
}

/// All records of one lot. Every record shares the same product and lot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LotGroup {
    product_id: String,
    lot_id: String,
    records: Vec<StabilityRecord>,
}

impl LotGroup {
    /// Builds a lot group, rejecting records from other lots or products.
    pub fn new(records: Vec<StabilityRecord>) -> Result<Self> {
        let first = records.first().ok_or(ModelError::EmptyLotGroup)?;
        let product_id = first.product_id.clone();
        let lot_id = first.lot_id.clone();
        for record in &records {
            if record.lot_id != lot_id {
                return Err(ModelError::MixedLots {
                    expected: lot_id,
                    found: record.lot_id.clone(),
                });
            }
            if record.product_id != product_id {
                return Err(ModelError::MixedProducts {
                    lot_id,
                    expected: product_id,
                    found: record.product_id.clone(),
                });
            }
        }
        Ok(Self {
            product_id,
            lot_id,
            records,
        })
    }

    pub fn product_id(&self) -> &str {
        &self.product_id
    }

    pub fn lot_id(&self) -> &str {
        &self.lot_id
    }

    pub fn records(&self) -> &[StabilityRecord] {
        &self.records
    }

    /// `(time, value)` pairs for `assay`, skipping missing measurements and
    /// non-finite timepoints.
    ///
    /// Pairs are returned in ascending `(time, value)` order so downstream
    /// numerics never depend on the order records were loaded in.
    pub fn points(&self, assay: &str) -> Vec<(f64, f64)> {
        let mut points: Vec<(f64, f64)> = self
            .records
            .iter()
            .filter(|record| record.timepoint.is_finite())
            .filter_map(|record| record.value(assay).map(|value| (record.timepoint, value)))
            .collect();
        points.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)));
        points
    }
}

/// Groups records by product and lot, ordered by product then lot
/// identifier. Products sharing a lot identifier get separate groups.
pub fn group_records(records: Vec<StabilityRecord>) -> Result<Vec<LotGroup>> {
    let mut by_lot: BTreeMap<(String, String), Vec<StabilityRecord>> = BTreeMap::new();
    for record in records {
        by_lot
            .entry((record.product_id.clone(), record.lot_id.clone()))
            .or_default()
            .push(record);
    }
    by_lot.into_values().map(LotGroup::new).collect()
}
