/*
 * This source code is licensed under the Business Source License 1.1.
 */

//! Generalised iterative proportional fitting (Sinkhorn tensor scaling).
//!
//! Given a non-negative support tensor and an ordered list of
//! `(clique, target marginal)` pairs, repeatedly rescales a working copy of
//! the support so that its marginal on every clique matches the target:
//!
//! ```text
//! current := support
//! repeat
//!     for (clique, target) in targets:            (caller order)
//!         observed := marginal(current, clique)
//!         factor   := target / (observed + eps)   (elementwise)
//!         current[x] *= factor[x|clique]          (broadcast over other axes)
//! until stopping rule met  or  iterations = max_iterations
//! ```
//!
//! Each clique update is an I-projection onto that marginal constraint.
//! Seeded with uniform mass and given feasible targets, the sweeps converge
//! to the maximum-entropy tensor consistent with all of them. Clique order
//! changes the path, not the limit.
//!
//! `eps` enters the denominator only: a zero target drives its slice to zero,
//! and a zero observed slice never produces NaN.
//!
//! # Stopping rule
//!
//! [`StoppingRule::MarginalError`] (default) stops once the largest L1 gap
//! between any clique's marginal and its target is below `tolerance` after a
//! sweep. Per cell, only the gap beyond `eps` counts: the guard alone keeps
//! every fitted cell about `eps` short of its target, and that floor would
//! otherwise grow with the clique's cell count.
//!
//! [`StoppingRule::SweepDelta`] stops once the L1 change of the whole
//! tensor across one sweep is below `tolerance`. The two differ for
//! infeasible targets: conflicting totals settle into a cycle whose sweep
//! delta vanishes while the marginal gap does not.
//!
//! Reaching `max_iterations` is not an error: the best-available tensor is
//! returned with a [`SynthWarning::Convergence`].
//!
//! # Invariants
//! - Cells stay finite and ≥ 0 for finite, non-negative inputs.
//! - The working tensor is owned by one `fit` call and never shared.

use tracing::{debug, info, warn};

use crate::error::{Result, SynthError, SynthWarning};
use crate::marginal::{marginal, Clique, Projection};
use crate::tensor::{l1, CountTensor, MassTensor};

/// Denominator guard added to every observed marginal cell.
pub const DEFAULT_EPS: f64 = 1e-5;

/// Default stopping tolerance (L1, in count units).
pub const DEFAULT_TOLERANCE: f64 = 0.5;

/// Default sweep cap.
pub const DEFAULT_MAX_ITERATIONS: u32 = 10_000;

// ─── MarginalTarget ──────────────────────────────────────────────────────────

/// One fitting constraint: the clique and the marginal it must reproduce.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MarginalTarget {
    /// Axes the constraint ranges over.
    pub clique: Clique,
    /// Target sums, axes in clique order.
    pub target: MassTensor,
}

impl MarginalTarget {
    /// Pair a clique with an explicit target.
    pub fn new(clique: Clique, target: MassTensor) -> Self {
        Self { clique, target }
    }

    /// Derive the target from an empirical count tensor.
    pub fn from_counts(counts: &CountTensor, clique: Clique) -> Result<Self> {
        let target = marginal(counts, &clique)?.to_mass();
        Ok(Self { clique, target })
    }
}

// ─── Results ─────────────────────────────────────────────────────────────────

/// Which quantity the scaler compares against its tolerance.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StoppingRule {
    /// Largest L1 distance between a clique marginal and its target.
    #[default]
    MarginalError,
    /// L1 change of the working tensor across one full sweep.
    SweepDelta,
}

/// Outcome of a fitting run.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConvergenceResult {
    /// Whether the tolerance was met within `max_iterations`.
    pub converged: bool,
    /// Number of sweeps performed.
    pub iterations: u32,
    /// Final value of the quantity tested by the stopping rule.
    pub residual: f64,
    /// L1 change across the final sweep.
    pub sweep_delta: f64,
    /// Largest clique-marginal L1 gap after the final sweep, net of the
    /// `eps` floor (see [`max_marginal_error`]).
    pub marginal_error: f64,
}

/// A fitted tensor together with its convergence report.
#[derive(Clone, Debug)]
pub struct Fit {
    /// The fitted joint mass.
    pub tensor: MassTensor,
    /// How the run ended.
    pub convergence: ConvergenceResult,
    /// Non-fatal conditions raised during fitting.
    pub warnings: Vec<SynthWarning>,
}

// ─── TensorScaler ────────────────────────────────────────────────────────────

/// Iterative proportional fitting over an ordered list of marginal targets.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TensorScaler {
    /// Stop when the stopping-rule residual falls below this (default 0.5).
    pub tolerance: f64,
    /// Hard cap on sweeps (default 10 000).
    pub max_iterations: u32,
    /// Denominator guard (default 1e-5).
    pub eps: f64,
    /// Residual definition (default [`StoppingRule::MarginalError`]).
    pub stopping: StoppingRule,
}

impl Default for TensorScaler {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            eps: DEFAULT_EPS,
            stopping: StoppingRule::default(),
        }
    }
}

impl TensorScaler {
    /// Create a scaler with the given tolerance and sweep cap.
    pub fn new(tolerance: f64, max_iterations: u32) -> Result<Self> {
        let s = Self { tolerance, max_iterations, ..Self::default() };
        s.validate()?;
        Ok(s)
    }

    /// Replace the denominator guard.
    pub fn with_eps(mut self, eps: f64) -> Self {
        self.eps = eps;
        self
    }

    /// Replace the stopping rule.
    pub fn with_stopping(mut self, stopping: StoppingRule) -> Self {
        self.stopping = stopping;
        self
    }

    /// Reject non-positive or non-finite parameters.
    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(SynthError::config("max_iterations must be positive"));
        }
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(SynthError::config(format!(
                "tolerance must be positive and finite, got {}",
                self.tolerance
            )));
        }
        if !(self.eps.is_finite() && self.eps > 0.0) {
            return Err(SynthError::config(format!(
                "eps must be positive and finite, got {}",
                self.eps
            )));
        }
        Ok(())
    }

    /// Fit `support` to `targets`.
    ///
    /// Errors only on malformed input (bad parameters, a clique outside the
    /// support's axes, a target of the wrong shape, negative or non-finite
    /// mass). Infeasible or conflicting targets are valid input.
    pub fn fit(&self, support: &MassTensor, targets: &[MarginalTarget]) -> Result<Fit> {
        self.validate()?;
        if targets.is_empty() {
            return Err(SynthError::config("at least one marginal target is required"));
        }
        support.check_non_negative("support tensor")?;
        for (i, t) in targets.iter().enumerate() {
            let expected = t.clique.projected_shape(support.shape())?;
            if expected.dims() != t.target.dims() {
                return Err(SynthError::config(format!(
                    "target {i} on clique {:?} has shape {:?}, expected {:?}",
                    t.clique.axes(),
                    t.target.dims(),
                    expected.dims()
                )));
            }
            t.target.check_non_negative("target marginal")?;
        }

        // Working tensor and previous-sweep snapshot: the only two full-size
        // buffers of the run.
        let mut current = support.clone();
        let mut previous = support.as_slice().to_vec();
        let mut factors: Vec<Vec<f64>> =
            targets.iter().map(|t| vec![0.0; t.target.len()]).collect();

        let mut iterations = 0u32;
        let mut sweep_delta = f64::INFINITY;
        let mut marginal_error = f64::INFINITY;
        let mut converged = false;

        while iterations < self.max_iterations {
            previous.copy_from_slice(current.as_slice());

            for (t, factor) in targets.iter().zip(factors.iter_mut()) {
                self.rescale(&mut current, t, factor)?;
            }
            iterations += 1;

            sweep_delta = l1(current.as_slice(), &previous);
            marginal_error = max_marginal_error(&current, targets, self.eps)?;
            let residual = self.residual(sweep_delta, marginal_error);
            debug!(iteration = iterations, residual, sweep_delta, marginal_error, "ipf sweep");

            if residual < self.tolerance {
                converged = true;
                break;
            }
        }

        let residual = self.residual(sweep_delta, marginal_error);
        let mut warnings = Vec::new();
        if converged {
            info!(iterations, residual, cliques = targets.len(), "tensor scaling converged");
        } else {
            let w = SynthWarning::Convergence { iterations, residual, tolerance: self.tolerance };
            warn!(iterations, residual, tolerance = self.tolerance, "{}", w);
            warnings.push(w);
        }

        Ok(Fit {
            tensor: current,
            convergence: ConvergenceResult {
                converged,
                iterations,
                residual,
                sweep_delta,
                marginal_error,
            },
            warnings,
        })
    }

    /// One clique update: multiply every cell by `target / (observed + eps)`
    /// at the cell's projection onto the clique.
    fn rescale(
        &self,
        current: &mut MassTensor,
        t: &MarginalTarget,
        factor: &mut [f64],
    ) -> Result<()> {
        let observed = marginal(current, &t.clique)?;
        let pairs = t.target.as_slice().iter().zip(observed.as_slice());
        for (f, (&want, &have)) in factor.iter_mut().zip(pairs) {
            *f = want / (have + self.eps);
        }
        let proj = Projection::new(current.shape(), &t.clique, observed.shape());
        for (x, j) in current.as_mut_slice().iter_mut().zip(proj) {
            *x *= factor[j];
        }
        Ok(())
    }

    fn residual(&self, sweep_delta: f64, marginal_error: f64) -> f64 {
        match self.stopping {
            StoppingRule::MarginalError => marginal_error,
            StoppingRule::SweepDelta => sweep_delta,
        }
    }
}

/// Largest L1 gap between `tensor`'s marginal and its target, over all
/// targets, net of the `eps` floor.
///
/// The denominator guard settles each fitted marginal cell at
/// `t · obs / (obs + eps)`, just under `eps` short of its target. Only the
/// part of each cell's gap beyond `eps` is counted, so the error of an exactly
/// fitted clique is zero however many cells it has.
pub fn max_marginal_error(
    tensor: &MassTensor,
    targets: &[MarginalTarget],
    eps: f64,
) -> Result<f64> {
    let mut worst = 0.0f64;
    for t in targets {
        let m = marginal(tensor, &t.clique)?;
        let gap: f64 = m
            .as_slice()
            .iter()
            .zip(t.target.as_slice())
            .map(|(got, want)| ((got - want).abs() - eps).max(0.0))
            .sum();
        worst = worst.max(gap);
    }
    Ok(worst)
}
