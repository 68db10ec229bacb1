//! Nonlinear factor graph and its linearization.

use crate::core::values::Values;
use crate::error::FactorResult;
use crate::factors::Factor;
use crate::linalg::{GaussianFactorGraph, JacobianFactor};
use rayon::prelude::*;
use tracing::debug;

/// Options for [`NonlinearFactorGraph::linearize`].
#[derive(Debug, Clone)]
pub struct LinearizationConfig {
    /// Linearize factors on the rayon thread pool.
    pub parallel: bool,
    /// Graphs with fewer factors are linearized sequentially.
    pub parallel_threshold: usize,
}

impl Default for LinearizationConfig {
    fn default() -> Self {
        Self {
            parallel: true,
            parallel_threshold: 64,
        }
    }
}

impl LinearizationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_parallel_threshold(mut self, threshold: usize) -> Self {
        self.parallel_threshold = threshold;
        self
    }
}

/// An ordered collection of nonlinear factors.
#[derive(Debug, Default)]
pub struct NonlinearFactorGraph {
    factors: Vec<Box<dyn Factor>>,
}

impl NonlinearFactorGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<F: Factor + 'static>(&mut self, factor: F) {
        self.factors.push(Box::new(factor));
    }

    pub fn len(&self) -> usize {
        self.factors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factors.is_empty()
    }

    /// Total cost `Σ ½‖rᵢ‖²_Σ` at `values`.
    pub fn error(&self, values: &Values) -> FactorResult<f64> {
        self.factors.iter().map(|factor| factor.error(values)).sum()
    }

    /// Linearize every active factor at `values`.
    ///
    /// Output order follows factor order; inactive factors are skipped. The
    /// first failing factor aborts the whole call.
    pub fn linearize(
        &self,
        values: &Values,
        config: &LinearizationConfig,
    ) -> FactorResult<GaussianFactorGraph> {
        let parallel = config.parallel && self.factors.len() >= config.parallel_threshold;

        let linearized: Vec<Option<JacobianFactor>> = if parallel {
            self.factors
                .par_iter()
                .map(|factor| factor.linearize(values))
                .collect::<FactorResult<_>>()?
        } else {
            self.factors
                .iter()
                .map(|factor| factor.linearize(values))
                .collect::<FactorResult<_>>()?
        };

        let graph: GaussianFactorGraph = linearized.into_iter().flatten().collect();
        debug!(
            "Linearized {} of {} factors ({} rows, parallel: {})",
            graph.len(),
            self.factors.len(),
            graph.rows(),
            parallel
        );
        Ok(graph)
    }
}
