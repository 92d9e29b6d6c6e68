//! Inputs shared by every assay of one analysis run.

use std::collections::{BTreeMap, BTreeSet};

use shelf_model::{AnalysisOptions, SpecLimit};

use crate::error::{CoreError, Result};

/// What to analyse and how.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisContext {
    /// Limits per assay; also the default assay list.
    pub spec_limits: BTreeMap<String, SpecLimit>,
    /// Explicit assay order. `None` analyses every assay with a limit, in
    /// name order.
    pub assays: Option<Vec<String>>,
    pub options: AnalysisOptions,
    /// Restrict the run to one product.
    pub product: Option<String>,
    /// Restrict the run to these lots.
    pub lots: Option<BTreeSet<String>>,
    /// Evaluate assays on the rayon thread pool.
    pub parallel: bool,
}

impl AnalysisContext {
    pub fn new(spec_limits: BTreeMap<String, SpecLimit>) -> Self {
        Self {
            spec_limits,
            assays: None,
            options: AnalysisOptions::default(),
            product: None,
            lots: None,
            parallel: true,
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: AnalysisOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn with_assays(mut self, assays: Vec<String>) -> Self {
        self.assays = Some(assays);
        self
    }

    #[must_use]
    pub fn with_product(mut self, product: impl Into<String>) -> Self {
        self.product = Some(product.into());
        self
    }

    #[must_use]
    pub fn with_lots<I, S>(mut self, lots: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.lots = Some(lots.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Assays in reporting order.
    pub fn assay_order(&self) -> Vec<String> {
        match &self.assays {
            Some(assays) => {
                let mut seen = BTreeSet::new();
                assays
                    .iter()
                    .filter(|assay| seen.insert(assay.as_str()))
                    .cloned()
                    .collect()
            }
            None => self.spec_limits.keys().cloned().collect(),
        }
    }

    pub fn spec_limit(&self, assay: &str) -> Option<&SpecLimit> {
        self.spec_limits.get(assay)
    }

    /// Checks options and that every requested assay has a valid limit.
    pub fn validate(&self) -> Result<()> {
        self.options.validate()?;
        for assay in self.assay_order() {
            let limit = self
                .spec_limit(&assay)
                .ok_or_else(|| CoreError::MissingSpecLimit {
                    assay: assay.clone(),
                })?;
            limit.validate(&assay)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> BTreeMap<String, SpecLimit> {
        BTreeMap::from([
            ("purity".to_string(), SpecLimit::lower(98.0)),
            ("main_impurity".to_string(), SpecLimit::upper(0.75)),
        ])
    }

    #[test]
    fn test_default_order_is_by_name() {
        let context = AnalysisContext::new(limits());
        assert_eq!(context.assay_order(), vec!["main_impurity", "purity"]);
    }

    #[test]
    fn test_explicit_order_is_kept_without_duplicates() {
        let context = AnalysisContext::new(limits()).with_assays(vec![
            "purity".to_string(),
            "main_impurity".to_string(),
            "purity".to_string(),
        ]);
        assert_eq!(context.assay_order(), vec!["purity", "main_impurity"]);
    }

    #[test]
    fn test_unknown_assay_fails_validation() {
        let context = AnalysisContext::new(limits()).with_assays(vec!["water".to_string()]);
        assert!(matches!(
            context.validate(),
            Err(CoreError::MissingSpecLimit { .. })
        ));
    }

    #[test]
    fn test_invalid_options_fail_validation() {
        let context = AnalysisContext::new(limits())
            .with_options(AnalysisOptions::default().with_confidence(1.0));
        assert!(matches!(context.validate(), Err(CoreError::Model(_))));
    }
}
