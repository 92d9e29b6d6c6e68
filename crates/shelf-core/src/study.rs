//! Study-level workflow: split records by product, then analyse every
//! configured assay of each product independently.

use std::collections::{BTreeMap, BTreeSet};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use shelf_model::{LotGroup, SpecLimit, StabilityRecord, group_records};
use tracing::{debug, info, info_span};

use crate::assay::{AssayOutcome, analyze_assay};
use crate::cache::{CacheKey, ResultCache, fingerprint};
use crate::context::AnalysisContext;
use crate::error::{CoreError, Result};

/// Outcomes of every assay for one product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductAnalysis {
    pub product_id: String,
    pub lot_ids: Vec<String>,
    /// In the context's assay order.
    pub assays: Vec<AssayOutcome>,
}

/// Outcomes of a whole analysis run, products in name order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StudyAnalysis {
    pub products: Vec<ProductAnalysis>,
}

impl StudyAnalysis {
    pub fn outcomes(&self) -> impl Iterator<Item = (&str, &AssayOutcome)> {
        self.products.iter().flat_map(|product| {
            product
                .assays
                .iter()
                .map(move |outcome| (product.product_id.as_str(), outcome))
        })
    }

    pub fn failure_count(&self) -> usize {
        self.outcomes().filter(|(_, outcome)| outcome.is_failure()).count()
    }
}

/// Analyses every selected product and assay.
///
/// Only selection and configuration problems fail the run. Statistical
/// failures stay inside the affected assay's outcome.
pub fn analyze_study(
    records: Vec<StabilityRecord>,
    context: &AnalysisContext,
) -> Result<StudyAnalysis> {
    run(records, context, None)
}

/// Like [`analyze_study`], reusing outcomes from `cache` whose inputs are
/// unchanged and storing fresh ones.
pub fn analyze_study_cached(
    records: Vec<StabilityRecord>,
    context: &AnalysisContext,
    cache: &mut ResultCache,
) -> Result<StudyAnalysis> {
    run(records, context, Some(cache))
}

fn run(
    records: Vec<StabilityRecord>,
    context: &AnalysisContext,
    mut cache: Option<&mut ResultCache>,
) -> Result<StudyAnalysis> {
    context.validate()?;
    let products = select_products(records, context)?;
    let assays = context.assay_order();
    info!(
        products = products.len(),
        assays = assays.len(),
        parallel = context.parallel,
        "Starting stability analysis"
    );

    let mut analysis = StudyAnalysis::default();
    for (product_id, lots) in products {
        let span = info_span!("product", product = %product_id);
        let _guard = span.enter();
        let outcomes = analyze_product(&product_id, &lots, &assays, context, cache.as_deref_mut());
        analysis.products.push(ProductAnalysis {
            product_id,
            lot_ids: lots.iter().map(|lot| lot.lot_id().to_string()).collect(),
            assays: outcomes,
        });
    }

    info!(
        outcomes = analysis.outcomes().count(),
        failures = analysis.failure_count(),
        "Stability analysis complete"
    );
    Ok(analysis)
}

fn analyze_product(
    product_id: &str,
    lots: &[LotGroup],
    assays: &[String],
    context: &AnalysisContext,
    cache: Option<&mut ResultCache>,
) -> Vec<AssayOutcome> {
    let options = &context.options;
    // Validation guarantees a limit for every assay in the order.
    let jobs: Vec<Job<'_>> = assays
        .iter()
        .enumerate()
        .filter_map(|(index, assay)| {
            let limit = *context.spec_limit(assay)?;
            Some(Job {
                index,
                assay: assay.as_str(),
                limit,
                key: CacheKey::new(product_id, lots, assay.as_str()),
                fingerprint: fingerprint(lots, assay, &limit, options),
            })
        })
        .collect();
    let compute = |job: &Job<'_>| analyze_assay(lots, job.assay, &job.limit, options);

    let mut slots: Vec<Option<AssayOutcome>> = vec![None; assays.len()];
    match cache {
        Some(cache) if !context.parallel => {
            for job in jobs {
                let outcome =
                    cache.get_or_compute(job.key.clone(), job.fingerprint.clone(), || compute(&job));
                slots[job.index] = Some(outcome);
            }
        }
        Some(cache) => {
            let mut pending = Vec::new();
            for job in jobs {
                if let Some(hit) = cache.get(&job.key, &job.fingerprint) {
                    slots[job.index] = Some(hit.clone());
                    cache.record_hit(&job.key);
                } else {
                    cache.record_miss(&job.key);
                    pending.push(job);
                }
            }
            let fresh: Vec<(Job<'_>, AssayOutcome)> = pending
                .into_par_iter()
                .map(|job| {
                    let outcome = compute(&job);
                    (job, outcome)
                })
                .collect();
            for (job, outcome) in fresh {
                slots[job.index] = Some(outcome.clone());
                cache.insert(job.key, job.fingerprint, outcome);
            }
        }
        None if context.parallel => {
            let fresh: Vec<(usize, AssayOutcome)> = jobs
                .par_iter()
                .map(|job| (job.index, compute(job)))
                .collect();
            for (index, outcome) in fresh {
                slots[index] = Some(outcome);
            }
        }
        None => {
            for job in &jobs {
                slots[job.index] = Some(compute(job));
            }
        }
    }

    debug!(product = product_id, assays = assays.len(), "Product analysed");
    slots.into_iter().flatten().collect()
}

struct Job<'a> {
    index: usize,
    assay: &'a str,
    limit: SpecLimit,
    key: CacheKey,
    fingerprint: String,
}

/// Lots per product after applying the context's product and lot filters.
fn select_products(
    records: Vec<StabilityRecord>,
    context: &AnalysisContext,
) -> Result<Vec<(String, Vec<LotGroup>)>> {
    if records.is_empty() {
        return Err(CoreError::NoRecords);
    }

    let mut by_product: BTreeMap<String, Vec<LotGroup>> = BTreeMap::new();
    for lot in group_records(records)? {
        if let Some(product) = &context.product
            && lot.product_id() != product
        {
            continue;
        }
        if let Some(selected) = &context.lots
            && !selected.contains(lot.lot_id())
        {
            continue;
        }
        by_product
            .entry(lot.product_id().to_string())
            .or_default()
            .push(lot);
    }

    if let Some(selected) = &context.lots {
        let found: BTreeSet<&str> = by_product
            .values()
            .flatten()
            .map(LotGroup::lot_id)
            .collect();
        let missing: Vec<String> = selected
            .iter()
            .filter(|lot| !found.contains(lot.as_str()))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(CoreError::UnknownLots {
                product: context.product.clone().unwrap_or_else(|| "any".to_string()),
                lots: missing,
            });
        }
    }
    if by_product.is_empty() {
        return Err(match &context.product {
            Some(product) => CoreError::UnknownProduct {
                product: product.clone(),
            },
            None => CoreError::NoRecords,
        });
    }

    Ok(by_product.into_iter().collect())
}
