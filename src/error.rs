//! Fatal errors and non-fatal warnings for the fitting pipeline.
//!
//! Fatal conditions ([`SynthError`]) abort a run immediately: a malformed
//! domain, clique list or size budget would only ever yield an unusable
//! tensor, so nothing is recovered silently.
//!
//! Recoverable conditions ([`SynthWarning`]) never abort synthesis. They are
//! returned next to the output they qualify and are also logged through
//! `tracing` at `warn` level where they are raised.

use core::fmt;

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = core::result::Result<T, SynthError>;

/// Fatal error raised by encoding, tensor construction, fitting or sampling.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SynthError {
    /// Malformed configuration: bad clique, non-positive parameter,
    /// inconsistent shapes or domains.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The joint tensor would hold more cells than the configured budget.
    ///
    /// Raised before any allocation takes place.
    #[error("joint tensor needs {cells} cells, above the configured limit of {limit}")]
    SizeLimitExceeded {
        /// Requested element count (saturated at `u128::MAX`).
        cells: u128,
        /// Configured element cap.
        limit: usize,
    },

    /// A value was encoded that is absent from its attribute's declared domain.
    #[error("value '{value}' is not in the declared domain of attribute '{attribute}'")]
    UnknownCategory {
        /// Attribute (column) name.
        attribute: String,
        /// The offending raw value.
        value: String,
    },
}

impl SynthError {
    /// Shorthand for [`SynthError::Configuration`].
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}

/// Non-fatal condition surfaced alongside a fitted tensor or a sample.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SynthWarning {
    /// The scaler hit `max_iterations` without meeting its tolerance.
    /// The best-available tensor was still returned.
    Convergence {
        /// Sweeps performed.
        iterations: u32,
        /// Final value of the quantity tested by the stopping rule.
        residual: f64,
        /// Tolerance that was not met.
        tolerance: f64,
    },

    /// Conditional slices with zero total mass were met while sampling;
    /// a uniform draw over the axis domain was used instead.
    SamplingFallback {
        /// Axis whose conditional was empty.
        axis: usize,
        /// Number of draws on that axis that fell back.
        draws: u64,
    },
}

impl fmt::Display for SynthWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Convergence { iterations, residual, tolerance } => write!(
                f,
                "tensor scaling stopped after {iterations} sweeps with residual {residual:.6e} \
                 (tolerance {tolerance:.6e})"
            ),
            Self::SamplingFallback { axis, draws } => write!(
                f,
                "{draws} draw(s) on axis {axis} met a zero-mass conditional \
                 and fell back to uniform"
            ),
        }
    }
}
