//! Python FFI bindings via PyO3.
//!
//! Exposes the IPF synthesizer to Python. Tables cross the boundary as a
//! column list plus a list of string rows, which keeps the binding free of
//! any dataframe dependency.
//!
//! # Building the Python extension
//!
//! ```bash
//! pip install maturin
//! maturin develop --features python-ffi
//! ```
//!
//! # Usage
//!
//! ```python
//! from ipf_core import IpfSynthesizer
//!
//! attrs = [("sex", ["f", "m"]), ("age", ["young", "mid", "old"])]
//! synth = IpfSynthesizer(attrs, cliques=[[0, 1]], seed=7)
//! synth.fit(["sex", "age"], [["f", "young"], ["m", "old"], ["m", "mid"]])
//! columns, rows, warnings = synth.sample(100)
//! ```

use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

use crate::config::IpfConfig;
use crate::encoder::{Attribute, Table};
use crate::error::SynthError;
use crate::scaler::{DEFAULT_MAX_ITERATIONS, DEFAULT_TOLERANCE};
use crate::synth::{IpfSynthesizer, SynthesisMethod};

fn to_py_err(e: SynthError) -> PyErr {
    PyValueError::new_err(e.to_string())
}

/// Rows returned by `sample`: columns, rows, warning messages.
type PySample = (Vec<String>, Vec<Vec<String>>, Vec<String>);

/// Iterative proportional fitting synthesizer.
///
/// Args:
///     attributes:     list of (name, domain) pairs; order fixes tensor axes
///     cliques:        list of attribute-index lists (default: one per attribute)
///     max_iterations: sweep cap (default 10000)
///     tolerance:      L1 stopping tolerance in count units (default 0.5)
///     seed:           sampling seed, or None for OS entropy
#[pyclass(name = "IpfSynthesizer")]
pub struct PyIpfSynthesizer {
    inner: IpfSynthesizer,
}

#[pymethods]
impl PyIpfSynthesizer {
    /// Create a synthesizer. Raises ValueError on a bad configuration.
    #[new]
    #[pyo3(signature = (
        attributes,
        cliques=None,
        max_iterations=DEFAULT_MAX_ITERATIONS,
        tolerance=DEFAULT_TOLERANCE,
        seed=None
    ))]
    pub fn new(
        attributes: Vec<(String, Vec<String>)>,
        cliques: Option<Vec<Vec<usize>>>,
        max_iterations: u32,
        tolerance: f64,
        seed: Option<u64>,
    ) -> PyResult<Self> {
        let attributes: Vec<Attribute> =
            attributes.into_iter().map(|(name, domain)| Attribute::new(name, domain)).collect();
        let mut config = match cliques {
            Some(c) => IpfConfig::with_cliques(c),
            None => IpfConfig::one_way(attributes.len()),
        };
        config.max_iterations = max_iterations;
        config.tolerance = tolerance;
        config.seed = seed;
        let inner = IpfSynthesizer::new(attributes, config).map_err(to_py_err)?;
        Ok(Self { inner })
    }

    /// Fit on a table given as column names plus string rows.
    pub fn fit(&mut self, columns: Vec<String>, rows: Vec<Vec<String>>) -> PyResult<()> {
        let table = Table::from_rows(columns, rows).map_err(to_py_err)?;
        self.inner.fit(&table).map_err(to_py_err)
    }

    /// Draw `n` synthetic rows.
    ///
    /// Returns:
    ///     (columns, rows, warnings) where warnings are human-readable strings
    pub fn sample(&mut self, n: usize) -> PyResult<PySample> {
        let out = self.inner.sample(n).map_err(to_py_err)?;
        let warnings = out.warnings.iter().map(ToString::to_string).collect();
        Ok((out.table.columns().to_vec(), out.table.rows().to_vec(), warnings))
    }

    /// True once `fit` has succeeded.
    #[getter]
    pub fn fitted(&self) -> bool {
        self.inner.is_fitted()
    }

    /// Sweeps performed by the last fit, or None before fitting.
    #[getter]
    pub fn iterations(&self) -> Option<u32> {
        self.inner.model().map(|m| m.convergence().iterations)
    }

    /// Whether the last fit met its tolerance, or None before fitting.
    #[getter]
    pub fn converged(&self) -> Option<bool> {
        self.inner.model().map(|m| m.convergence().converged)
    }

    /// Python repr string.
    pub fn __repr__(&self) -> String {
        format!(
            "IpfSynthesizer(attributes={}, cliques={:?}, fitted={})",
            self.inner.attributes().len(),
            self.inner.config().cliques,
            self.inner.is_fitted()
        )
    }
}

// ── Module entry point ────────────────────────────────────────────────────────

/// Categorical synthetic data via iterative proportional fitting.
#[pymodule]
pub fn ipf_core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyIpfSynthesizer>()?;
    m.add("__version__", env!("CARGO_PKG_VERSION"))?;
    Ok(())
}
