use super::evaluator::{EvaluationError, Evaluator};
use super::lennard_jones::LennardJones;
use super::params::LennardJonesParams;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

pub const LENNARD_JONES: &str = "lennard-jones";

/// Evaluators available to a document, keyed by id.
#[derive(Clone, Default)]
pub struct EvaluatorRegistry {
    evaluators: BTreeMap<String, Arc<dyn Evaluator>>,
}

impl EvaluatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with the built-in evaluators for a structure.
    ///
    /// # Arguments
    ///
    /// * `elements` - Element symbol of every particle, in document order.
    /// * `params` - Lennard-Jones parameter overrides and cutoff.
    ///
    /// # Errors
    ///
    /// Fails if an element has no Lennard-Jones parameters.
    pub fn with_defaults<S: AsRef<str>>(
        elements: &[S],
        params: &LennardJonesParams,
    ) -> Result<Self, EvaluationError> {
        let mut registry = Self::new();
        registry.register(LENNARD_JONES, LennardJones::for_elements(elements, params)?);
        Ok(registry)
    }

    /// Adds or replaces the evaluator registered under `id`.
    pub fn register(&mut self, id: impl Into<String>, evaluator: impl Evaluator + 'static) {
        let id = id.into();
        debug!(evaluator = %id, "Registering evaluator.");
        self.evaluators.insert(id, Arc::new(evaluator));
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn Evaluator>> {
        self.evaluators.get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.evaluators.contains_key(id)
    }

    /// Registered ids in sorted order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.evaluators.keys().map(String::as_str)
    }
}

impl fmt::Debug for EvaluatorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.ids()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::forcefield::harmonic::HarmonicWell;
    use nalgebra::Point3;

    #[test]
    fn with_defaults_registers_lennard_jones() {
        let registry =
            EvaluatorRegistry::with_defaults(&["C", "H"], &LennardJonesParams::default()).unwrap();
        assert!(registry.contains(LENNARD_JONES));
        assert_eq!(registry.get(LENNARD_JONES).unwrap().name(), LENNARD_JONES);
    }

    #[test]
    fn register_replaces_and_ids_are_sorted() {
        let mut registry = EvaluatorRegistry::new();
        registry.register("zeta", HarmonicWell::new(vec![Point3::origin()], 1.0));
        registry.register("alpha", HarmonicWell::new(vec![Point3::origin()], 1.0));
        registry.register("alpha", HarmonicWell::new(vec![Point3::origin()], 2.0));

        assert_eq!(registry.ids().collect::<Vec<_>>(), vec!["alpha", "zeta"]);
        assert!(registry.get("missing").is_none());
    }
}
