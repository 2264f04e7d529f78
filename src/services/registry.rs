//! Extractor registry and selection policy.
//!
//! The registry is built once at startup and read-only afterwards; it
//! indexes extractors by country while preserving registration order, which
//! downstream ordering guarantees depend on.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::AppError;
use crate::country::{Country, MacroRegion};
use crate::extractors::Extractor;

/// Which extractors to run for one request.
#[derive(Debug, Clone)]
pub struct SelectionPolicy {
    pub base: Country,
    pub current: Option<Country>,
    pub use_macro_region: bool,
}

/// Country-indexed store of extractor handles.
#[derive(Default)]
pub struct ExtractorRegistry {
    by_country: HashMap<Country, Vec<Arc<dyn Extractor>>>,
    /// Global registration order, the tiebreaker for every listing
    order: Vec<Arc<dyn Extractor>>,
}

impl ExtractorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an extractor under its country. Identifiers are unique
    /// across the whole registry.
    pub fn register(&mut self, extractor: Arc<dyn Extractor>) -> Result<(), AppError> {
        if self.order.iter().any(|e| e.id() == extractor.id()) {
            return Err(AppError::Internal(format!(
                "Duplicate extractor id: {}",
                extractor.id()
            )));
        }

        self.by_country
            .entry(extractor.country())
            .or_default()
            .push(extractor.clone());
        self.order.push(extractor);
        Ok(())
    }

    /// Extractors registered for exactly this country.
    pub fn for_country(&self, country: Country) -> Vec<Arc<dyn Extractor>> {
        self.by_country.get(&country).cloned().unwrap_or_default()
    }

    /// Union of `for_country` over every country in the region, in
    /// registration order.
    pub fn for_macro_region(&self, region: MacroRegion) -> Vec<Arc<dyn Extractor>> {
        self.order
            .iter()
            .filter(|e| e.macro_region() == region)
            .cloned()
            .collect()
    }

    pub fn all(&self) -> &HashMap<Country, Vec<Arc<dyn Extractor>>> {
        &self.by_country
    }

    /// Countries with at least one extractor, in `Country::ALL` order.
    pub fn supported_countries(&self) -> Vec<Country> {
        Country::ALL
            .iter()
            .copied()
            .filter(|c| self.by_country.contains_key(c))
            .collect()
    }

    /// Resolves the set of extractors to run for a request.
    ///
    /// The base country's extractors always come first; the current
    /// country (or its macro-region when expansion is on) follows. The
    /// result is deduplicated by extractor id, first occurrence wins.
    pub fn select(&self, policy: &SelectionPolicy) -> Vec<Arc<dyn Extractor>> {
        let mut selected: Vec<Arc<dyn Extractor>> = Vec::new();
        let mut seen: HashSet<&'static str> = HashSet::new();

        let mut push_all = |extractors: Vec<Arc<dyn Extractor>>,
                            selected: &mut Vec<Arc<dyn Extractor>>| {
            for extractor in extractors {
                if seen.insert(extractor.id()) {
                    selected.push(extractor);
                }
            }
        };

        push_all(self.for_country(policy.base), &mut selected);

        if let Some(current) = policy.current {
            if current != policy.base {
                if policy.use_macro_region {
                    push_all(self.for_macro_region(current.macro_region()), &mut selected);
                } else {
                    push_all(self.for_country(current), &mut selected);
                }
            }

            // expansion also applies when base and current coincide
            if policy.use_macro_region {
                push_all(self.for_macro_region(current.macro_region()), &mut selected);
            }
        }

        selected
    }
}
