//! Fitting configuration.
//!
//! [`IpfConfig`] gathers every knob of a fitting run: the ordered clique
//! list, scaler parameters, the cell budget and an optional sampling seed.
//! [`IpfConfig::validate`] performs all configuration checks up front so
//! that a bad clique or parameter is rejected before any tensor is
//! allocated.

use crate::error::{Result, SynthError};
use crate::marginal::Clique;
use crate::scaler::{
    StoppingRule, TensorScaler, DEFAULT_EPS, DEFAULT_MAX_ITERATIONS, DEFAULT_TOLERANCE,
};
use crate::tensor::{DEFAULT_MAX_CELLS, MAX_AXES};

/// Configuration for one IPF fitting run.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct IpfConfig {
    /// Ordered cliques (attribute-index tuples) whose marginals are preserved.
    /// Cliques may overlap. Processing order follows this list.
    pub cliques: Vec<Vec<usize>>,
    /// Hard cap on scaler sweeps. Default: 10 000.
    pub max_iterations: u32,
    /// Stopping tolerance (L1, count units). Default: 0.5.
    pub tolerance: f64,
    /// Denominator guard in the rescale factor. Default: 1e-5.
    pub eps: f64,
    /// Quantity compared against `tolerance`. Default: marginal error.
    pub stopping: StoppingRule,
    /// Largest joint tensor (in cells) the run may allocate. Default: 2²⁴.
    pub max_cells: usize,
    /// Seed for the sampling RNG; `None` draws from OS entropy.
    pub seed: Option<u64>,
}

impl Default for IpfConfig {
    fn default() -> Self {
        Self {
            cliques: Vec::new(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            tolerance: DEFAULT_TOLERANCE,
            eps: DEFAULT_EPS,
            stopping: StoppingRule::default(),
            max_cells: DEFAULT_MAX_CELLS,
            seed: None,
        }
    }
}

impl IpfConfig {
    /// Config preserving the given cliques, defaults elsewhere.
    pub fn with_cliques<I, C>(cliques: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: AsRef<[usize]>,
    {
        Self {
            cliques: cliques.into_iter().map(|c| c.as_ref().to_vec()).collect(),
            ..Self::default()
        }
    }

    /// One single-attribute clique per attribute: `(0), (1), …, (n−1)`.
    pub fn one_way(n_attributes: usize) -> Self {
        Self::with_cliques((0..n_attributes).map(|i| [i]))
    }

    /// Set the sampling seed.
    pub fn seeded(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// The scaler these parameters describe.
    pub fn scaler(&self) -> Result<TensorScaler> {
        let s = TensorScaler {
            tolerance: self.tolerance,
            max_iterations: self.max_iterations,
            eps: self.eps,
            stopping: self.stopping,
        };
        s.validate()?;
        Ok(s)
    }

    /// Check every parameter against `n_attributes` declared attributes and
    /// return the validated cliques in configured order.
    pub fn validate(&self, n_attributes: usize) -> Result<Vec<Clique>> {
        if n_attributes == 0 {
            return Err(SynthError::config("at least one attribute is required"));
        }
        if n_attributes > MAX_AXES {
            return Err(SynthError::config(format!(
                "{n_attributes} attributes declared, at most {MAX_AXES} are supported"
            )));
        }
        if self.max_cells == 0 {
            return Err(SynthError::config("max_cells must be positive"));
        }
        self.scaler()?;
        if self.cliques.is_empty() {
            return Err(SynthError::config("at least one clique is required"));
        }
        self.cliques
            .iter()
            .map(|axes| Clique::for_attributes(axes, n_attributes))
            .collect()
    }
}
