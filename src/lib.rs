//! # ipf-core
//!
//! Categorical synthetic data by iterative proportional fitting.
//!
//! ---
//!
//! ## Marginals in, joint distribution out
//!
//! A table of categorical attributes defines an empirical joint distribution:
//! one count per combination of values. Publishing that joint directly leaks
//! individual rows. Publishing a handful of low-order marginals does not, and
//! those marginals still pin down most of the structure analysts care about.
//!
//! **Iterative proportional fitting** (Sinkhorn scaling generalised to
//! tensors) starts from a uniform joint and repeatedly rescales it so each
//! chosen marginal matches its target. When the targets are consistent the
//! result is the maximum-entropy joint agreeing with all of them.
//!
//! **Sequential conditional sampling** then draws synthetic rows one
//! attribute at a time from the fitted joint.
//!
//! ---
//!
//! ## The pipeline
//!
//! ```text
//! Table → OrdinalCodec → EncodedMatrix → CountTensor
//!                                           │ marginal per clique
//!                                           ↓
//!               uniform support → TensorScaler → fitted MassTensor
//!                                                    │
//! Table ← decode ← EncodedMatrix ← JointSampler ←────┘
//! ```
//!
//! ## Module overview
//!
//! | Module | Key types | What it does |
//! |--------|-----------|--------------|
//! | [`encoder`] | [`Attribute`], [`Table`], [`OrdinalCodec`] | Sorted-domain ordinal codes |
//! | [`matrix`] | [`EncodedMatrix`] | Row-major `n × m` code matrix |
//! | [`tensor`] | [`Shape`], [`CountTensor`], [`MassTensor`] | Bounded dense joint tensors |
//! | [`marginal`] | [`Clique`], [`marginal()`] | Sum a tensor onto a subset of axes |
//! | [`scaler`] | [`TensorScaler`], [`MarginalTarget`] | Fit a joint to clique marginals |
//! | [`sampler`] | [`JointSampler`] | Sequential conditional row sampling |
//! | [`config`] | [`IpfConfig`] | Cliques and scaler parameters, validated up front |
//! | [`synth`] | [`SynthesisMethod`], [`IpfSynthesizer`] | Fit then sample, end to end |
//! | [`snapshot`] | `FittedSnapshot` | Serialisable fitted model (requires `serde` feature) |
//!
//! ## Features
//!
//! - `serde`: serialisation of configs, tensors and fitted snapshots.
//! - `parallel`: chunked sampling on the rayon pool.
//! - `python-ffi`: the `ipf_core` Python module.
//!
//! ## Logging
//!
//! The crate emits [`tracing`] events: `debug` per scaler sweep, `info` on
//! fit and sample summaries, `warn` whenever a [`SynthWarning`] is raised.
//! Install any subscriber to see them.
//!
//! ## License
//!
//! Business Source License 1.1. Free for evaluation and non-production use.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod config;
pub mod encoder;
pub mod error;
pub mod marginal;
pub mod matrix;
pub mod sampler;
pub mod scaler;
pub mod synth;
pub mod tensor;
#[cfg(feature = "serde")]
pub mod snapshot;

#[cfg(feature = "python-ffi")]
pub mod ffi;

pub use config::IpfConfig;
pub use encoder::{decode, encode, Attribute, OrdinalCodec, Table};
pub use error::{Result, SynthError, SynthWarning};
pub use marginal::{marginal, Clique};
pub use matrix::EncodedMatrix;
pub use sampler::{sample, JointSampler, Sample};
pub use scaler::{ConvergenceResult, Fit, MarginalTarget, StoppingRule, TensorScaler};
pub use synth::{FittedModel, IpfSynthesizer, Synthesis, SynthesisMethod};
pub use tensor::{CountTensor, MassTensor, Shape, Tensor};
