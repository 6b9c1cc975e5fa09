//! Portable snapshot of a fitted model for persistence and transport.
//!
//! A [`FittedSnapshot`] records everything sampling needs: the attributes in
//! canonical domain order, the cliques, the scaler parameters, the fitted
//! joint mass and the convergence report. Restoring re-validates the shape against the domains,
//! so a hand-edited or truncated snapshot is rejected rather than sampled.
//!
//! Requires the `serde` feature.
//!
//! ```rust,ignore
//! use ipf_core::snapshot::FittedSnapshot;
//!
//! let snap = FittedSnapshot::from_model(synth.model().unwrap());
//! let json = serde_json::to_string(&snap)?;
//! let model = serde_json::from_str::<FittedSnapshot>(&json)?.into_model()?;
//! ```

use crate::encoder::{codecs_for, Attribute};
use crate::error::{Result, SynthError};
use crate::marginal::Clique;
use crate::scaler::{ConvergenceResult, Fit, TensorScaler};
use crate::synth::FittedModel;
use crate::tensor::{MassTensor, Shape};

/// Current snapshot format version. Version 2 added `scaler`.
pub const FITTED_SNAPSHOT_VERSION: u16 = 2;

/// Serializable form of a [`FittedModel`].
#[derive(serde::Serialize, serde::Deserialize, Clone, Debug, PartialEq)]
pub struct FittedSnapshot {
    /// Format version, [`FITTED_SNAPSHOT_VERSION`] for new snapshots.
    pub version: u16,
    /// Attributes in axis order, domains in code order.
    pub attributes: Vec<Attribute>,
    /// Axis lengths of the fitted tensor.
    pub dims: Vec<usize>,
    /// Fitted cliques as attribute-index lists.
    pub cliques: Vec<Vec<usize>>,
    /// Tolerance, sweep cap, `eps` and stopping rule used for the fit.
    pub scaler: TensorScaler,
    /// Row count of the fitting table.
    pub observations: u64,
    /// Fitted mass in row-major order.
    pub mass: Vec<f64>,
    /// How fitting ended.
    pub convergence: ConvergenceResult,
}

impl FittedSnapshot {
    /// Capture a fitted model.
    pub fn from_model(model: &FittedModel) -> Self {
        Self {
            version: FITTED_SNAPSHOT_VERSION,
            attributes: model.codecs().iter().map(|c| c.attribute()).collect(),
            dims: model.tensor().dims().to_vec(),
            cliques: model.cliques().iter().map(|c| c.axes().to_vec()).collect(),
            scaler: model.scaler().clone(),
            observations: model.observations(),
            mass: model.tensor().as_slice().to_vec(),
            convergence: model.convergence().clone(),
        }
    }

    /// Number of joint cells stored.
    pub fn cell_count(&self) -> usize {
        self.mass.len()
    }

    /// Rebuild the model. Fails on an unknown version, a mass vector that
    /// does not fit the attribute domains, invalid scaler parameters, or
    /// negative mass.
    pub fn into_model(self) -> Result<FittedModel> {
        if self.version != FITTED_SNAPSHOT_VERSION {
            return Err(SynthError::config(format!(
                "unsupported snapshot version {} (expected {})",
                self.version, FITTED_SNAPSHOT_VERSION
            )));
        }
        let codecs = codecs_for(&self.attributes)?;
        let dims: Vec<usize> = codecs.iter().map(|c| c.cardinality()).collect();
        if dims != self.dims {
            return Err(SynthError::config(format!(
                "snapshot shape {:?} does not match attribute domains {:?}",
                self.dims, dims
            )));
        }
        // The stored mass already exists, so its own length is the cell budget.
        let shape = Shape::new(&dims, self.mass.len().max(1))?;
        let tensor = MassTensor::from_vec(shape, self.mass)?;
        let cliques = self
            .cliques
            .iter()
            .map(|axes| Clique::for_attributes(axes, dims.len()))
            .collect::<Result<Vec<_>>>()?;
        let fit = Fit { tensor, convergence: self.convergence, warnings: Vec::new() };
        FittedModel::from_parts(codecs, cliques, self.scaler, self.observations, fit)
    }
}
