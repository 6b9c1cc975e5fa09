//! The synthesis pipeline and its pluggable method capability.
//!
//! ```text
//! Table ─encode→ EncodedMatrix ─count→ CountTensor ─marginal per clique→ targets
//!                                                                          │
//! Table ←decode─ EncodedMatrix ←sample─ fitted MassTensor ←scale uniform──┘
//! ```
//!
//! [`SynthesisMethod`] is the capability every synthesis backend exposes:
//! learn from a table, then draw any number of synthetic rows.
//! [`IpfSynthesizer`] is the tensor-scaling implementation.
//!
//! # Lifecycle
//!
//! `fit` builds the empirical count tensor once, derives one target per
//! configured clique and scales a uniform support to match them. The fitted
//! tensor is kept and reused by every later `sample` call. Replacing the
//! configuration discards it.

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;

use crate::config::IpfConfig;
use crate::encoder::{codecs_for, decode, encode_with, Attribute, OrdinalCodec, Table};
use crate::error::{Result, SynthError, SynthWarning};
use crate::marginal::Clique;
use crate::sampler::JointSampler;
use crate::scaler::{ConvergenceResult, Fit, MarginalTarget, TensorScaler};
use crate::tensor::{CountTensor, MassTensor, Shape};

/// Synthetic output plus every non-fatal warning raised producing it.
#[derive(Clone, Debug)]
pub struct Synthesis {
    /// Synthetic rows with the input's columns and domains.
    pub table: Table,
    /// Fitting and sampling warnings, in that order.
    pub warnings: Vec<SynthWarning>,
}

/// A synthesis backend: fit on a table, then sample synthetic rows.
pub trait SynthesisMethod {
    /// Short method identifier.
    fn name(&self) -> &'static str;

    /// Learn from `table`.
    fn fit(&mut self, table: &Table) -> Result<()>;

    /// Draw `n` synthetic rows. Errors if called before [`Self::fit`].
    fn sample(&mut self, n: usize) -> Result<Synthesis>;

    /// Fit then sample. `size` defaults to the input row count.
    fn run(&mut self, table: &Table, size: Option<usize>) -> Result<Synthesis> {
        self.fit(table)?;
        self.sample(size.unwrap_or_else(|| table.n_rows()))
    }
}

// ─── FittedModel ─────────────────────────────────────────────────────────────

/// Everything a fitted IPF run produced: codecs, cliques, the scaler
/// parameters and the tensor.
#[derive(Clone, Debug)]
pub struct FittedModel {
    codecs: Vec<OrdinalCodec>,
    cliques: Vec<Clique>,
    scaler: TensorScaler,
    observations: u64,
    fit: Fit,
}

impl FittedModel {
    /// Assemble a model from parts, checking they agree.
    pub fn from_parts(
        codecs: Vec<OrdinalCodec>,
        cliques: Vec<Clique>,
        scaler: TensorScaler,
        observations: u64,
        fit: Fit,
    ) -> Result<Self> {
        let dims: Vec<usize> = codecs.iter().map(OrdinalCodec::cardinality).collect();
        if fit.tensor.dims() != dims.as_slice() {
            return Err(SynthError::config(format!(
                "fitted tensor shape {:?} does not match attribute domains {:?}",
                fit.tensor.dims(),
                dims
            )));
        }
        for c in &cliques {
            c.check_rank(dims.len())?;
        }
        scaler.validate()?;
        fit.tensor.check_non_negative("fitted tensor")?;
        Ok(Self { codecs, cliques, scaler, observations, fit })
    }

    /// One codec per attribute, in axis order.
    pub fn codecs(&self) -> &[OrdinalCodec] {
        &self.codecs
    }

    /// Cliques the tensor was fitted to.
    pub fn cliques(&self) -> &[Clique] {
        &self.cliques
    }

    /// Tolerance, cap, `eps` and stopping rule the tensor was fitted with.
    pub fn scaler(&self) -> &TensorScaler {
        &self.scaler
    }

    /// Row count of the table the model was fitted on.
    pub fn observations(&self) -> u64 {
        self.observations
    }

    /// Fitted joint mass.
    pub fn tensor(&self) -> &MassTensor {
        &self.fit.tensor
    }

    /// How fitting ended.
    pub fn convergence(&self) -> &ConvergenceResult {
        &self.fit.convergence
    }

    /// Fitting warnings.
    pub fn warnings(&self) -> &[SynthWarning] {
        &self.fit.warnings
    }

    /// Sampler over the fitted tensor.
    pub fn sampler(&self) -> JointSampler<'_> {
        JointSampler::new(&self.fit.tensor)
    }
}

// ─── IpfSynthesizer ──────────────────────────────────────────────────────────

/// Iterative proportional fitting synthesizer.
///
/// ```rust,ignore
/// use ipf_core::{Attribute, IpfConfig, IpfSynthesizer, SynthesisMethod};
///
/// let attrs = vec![Attribute::new("A", ["a", "b", "c"]), Attribute::new("B", ["0", "1"])];
/// let mut ipf = IpfSynthesizer::new(attrs, IpfConfig::with_cliques([[0, 1]]).seeded(1))?;
/// let out = ipf.run(&table, Some(50))?;
/// ```
#[derive(Debug)]
pub struct IpfSynthesizer {
    attributes: Vec<Attribute>,
    config: IpfConfig,
    rng: StdRng,
    model: Option<FittedModel>,
}

impl IpfSynthesizer {
    /// Create a synthesizer. Attributes and configuration are validated
    /// immediately.
    pub fn new(attributes: Vec<Attribute>, config: IpfConfig) -> Result<Self> {
        config.validate(attributes.len())?;
        codecs_for(&attributes)?;
        let rng = rng_for(&config);
        Ok(Self { attributes, config, rng, model: None })
    }

    /// Resume from a previously fitted model.
    ///
    /// `config` must describe the same fit: identical cliques in the same
    /// order and identical scaler parameters. Only the seed and the cell
    /// budget are free to differ.
    pub fn from_model(model: FittedModel, config: IpfConfig) -> Result<Self> {
        let attributes: Vec<Attribute> =
            model.codecs.iter().map(OrdinalCodec::attribute).collect();
        let cliques = config.validate(attributes.len())?;
        if cliques != model.cliques {
            return Err(SynthError::config(format!(
                "configured cliques {:?} do not match the fitted cliques {:?}",
                config.cliques,
                model.cliques.iter().map(|c| c.axes().to_vec()).collect::<Vec<_>>()
            )));
        }
        let scaler = config.scaler()?;
        if scaler != model.scaler {
            return Err(SynthError::config(format!(
                "configured scaler {:?} does not match the fitted scaler {:?}",
                scaler, model.scaler
            )));
        }
        let mut s = Self::new(attributes, config)?;
        s.model = Some(model);
        Ok(s)
    }

    /// Declared attributes, in axis order.
    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    /// Current configuration.
    pub fn config(&self) -> &IpfConfig {
        &self.config
    }

    /// Replace the configuration. Any fitted model is discarded and the
    /// sampling RNG is re-seeded.
    pub fn set_config(&mut self, config: IpfConfig) -> Result<()> {
        config.validate(self.attributes.len())?;
        self.rng = rng_for(&config);
        self.config = config;
        self.model = None;
        Ok(())
    }

    /// The fitted model, if [`SynthesisMethod::fit`] has run.
    pub fn model(&self) -> Option<&FittedModel> {
        self.model.as_ref()
    }

    /// Whether a fitted model is available.
    pub fn is_fitted(&self) -> bool {
        self.model.is_some()
    }

    /// Portable snapshot of the fitted model, if any.
    #[cfg(feature = "serde")]
    pub fn snapshot(&self) -> Option<crate::snapshot::FittedSnapshot> {
        self.model.as_ref().map(crate::snapshot::FittedSnapshot::from_model)
    }

    /// Draw `n` rows on the rayon pool. The seed for the parallel streams is
    /// taken from this synthesizer's RNG, so seeded runs stay reproducible.
    #[cfg(feature = "parallel")]
    pub fn sample_parallel(&mut self, n: usize) -> Result<Synthesis> {
        use rand::Rng;

        let model = self.model.as_ref().ok_or_else(not_fitted)?;
        let seed: u64 = self.rng.gen();
        let s = model.sampler().sample_par(n, seed)?;
        let table = decode(&s.matrix, &model.codecs)?;
        Ok(Synthesis { table, warnings: merge_warnings(model.warnings(), s.warnings) })
    }
}

impl SynthesisMethod for IpfSynthesizer {
    fn name(&self) -> &'static str {
        "ipf"
    }

    fn fit(&mut self, table: &Table) -> Result<()> {
        // Every configuration check happens before anything is allocated.
        let cliques = self.config.validate(self.attributes.len())?;
        let scaler = self.config.scaler()?;
        let codecs = codecs_for(&self.attributes)?;
        let dims: Vec<usize> = codecs.iter().map(OrdinalCodec::cardinality).collect();
        let shape = Shape::new(&dims, self.config.max_cells)?;

        let matrix = encode_with(table, &codecs)?;
        let counts = CountTensor::from_matrix(&matrix, &dims, self.config.max_cells)?;
        let targets = cliques
            .iter()
            .map(|c| MarginalTarget::from_counts(&counts, c.clone()))
            .collect::<Result<Vec<_>>>()?;

        let fit = scaler.fit(&MassTensor::uniform(shape), &targets)?;
        info!(
            rows = matrix.n_rows(),
            cells = counts.len(),
            cliques = cliques.len(),
            iterations = fit.convergence.iterations,
            converged = fit.convergence.converged,
            "ipf model fitted"
        );

        self.model = Some(FittedModel {
            codecs,
            cliques,
            scaler,
            observations: matrix.n_rows() as u64,
            fit,
        });
        Ok(())
    }

    fn sample(&mut self, n: usize) -> Result<Synthesis> {
        let model = self.model.as_ref().ok_or_else(not_fitted)?;
        let s = model.sampler().sample(n, &mut self.rng)?;
        let table = decode(&s.matrix, &model.codecs)?;
        Ok(Synthesis { table, warnings: merge_warnings(model.warnings(), s.warnings) })
    }
}

fn rng_for(config: &IpfConfig) -> StdRng {
    match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

fn not_fitted() -> SynthError {
    SynthError::config("sample called before fit")
}

fn merge_warnings(fit: &[SynthWarning], sample: Vec<SynthWarning>) -> Vec<SynthWarning> {
    let mut all = fit.to_vec();
    all.extend(sample);
    all
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scaler::StoppingRule;

    fn attrs() -> Vec<Attribute> {
        vec![Attribute::new("A", ["a", "b"]), Attribute::new("B", ["x", "y", "z"])]
    }

    fn table() -> Table {
        Table::from_rows(
            ["A", "B"],
            [
                vec!["a", "x"],
                vec!["a", "y"],
                vec!["b", "z"],
                vec!["b", "z"],
                vec!["a", "x"],
                vec!["b", "y"],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_sample_before_fit_is_an_error() {
        let mut s = IpfSynthesizer::new(attrs(), IpfConfig::one_way(2).seeded(1)).unwrap();
        assert!(!s.is_fitted());
        assert!(matches!(s.sample(5), Err(SynthError::Configuration(_))));
    }

    #[test]
    fn test_run_defaults_to_input_size() {
        let mut s = IpfSynthesizer::new(attrs(), IpfConfig::one_way(2).seeded(1)).unwrap();
        let out = s.run(&table(), None).unwrap();
        assert_eq!(out.table.n_rows(), 6);
        assert_eq!(out.table.columns(), &["A", "B"]);
        assert_eq!(s.name(), "ipf");
    }

    #[test]
    fn test_fitted_model_accessors() {
        let config = IpfConfig::with_cliques([[0usize, 1]]).seeded(3);
        let mut s = IpfSynthesizer::new(attrs(), config).unwrap();
        s.fit(&table()).unwrap();
        let m = s.model().unwrap();
        assert_eq!(m.observations(), 6);
        assert_eq!(m.tensor().dims(), &[2, 3]);
        assert_eq!(m.cliques().len(), 1);
        assert!(m.convergence().converged);
        assert!((m.tensor().sum() - 6.0).abs() < 1e-3);
    }

    #[test]
    fn test_set_config_discards_model() {
        let mut s = IpfSynthesizer::new(attrs(), IpfConfig::one_way(2).seeded(1)).unwrap();
        s.fit(&table()).unwrap();
        assert!(s.is_fitted());
        s.set_config(IpfConfig::with_cliques([[0usize, 1]]).seeded(1)).unwrap();
        assert!(!s.is_fitted());
    }

    #[test]
    fn test_seeded_runs_repeat() {
        let run = || {
            let mut s = IpfSynthesizer::new(attrs(), IpfConfig::one_way(2).seeded(99)).unwrap();
            s.run(&table(), Some(40)).unwrap().table
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_from_model_resumes_sampling() {
        let mut s = IpfSynthesizer::new(attrs(), IpfConfig::one_way(2).seeded(1)).unwrap();
        s.fit(&table()).unwrap();
        let model = s.model().unwrap().clone();
        let mut resumed =
            IpfSynthesizer::from_model(model, IpfConfig::one_way(2).seeded(2)).unwrap();
        assert_eq!(resumed.sample(10).unwrap().table.n_rows(), 10);
    }

    #[test]
    fn test_from_model_rejects_other_cliques() {
        let mut s = IpfSynthesizer::new(attrs(), IpfConfig::one_way(2).seeded(1)).unwrap();
        s.fit(&table()).unwrap();
        let model = s.model().unwrap().clone();

        let joint = IpfConfig::with_cliques([[0usize, 1]]);
        assert!(matches!(
            IpfSynthesizer::from_model(model.clone(), joint),
            Err(SynthError::Configuration(_))
        ));
        let reordered = IpfConfig::with_cliques([[1usize], [0]]);
        assert!(matches!(
            IpfSynthesizer::from_model(model, reordered),
            Err(SynthError::Configuration(_))
        ));
    }

    #[test]
    fn test_from_model_rejects_other_scaler() {
        let mut s = IpfSynthesizer::new(attrs(), IpfConfig::one_way(2).seeded(1)).unwrap();
        s.fit(&table()).unwrap();
        let model = s.model().unwrap().clone();
        assert_eq!(model.scaler(), &IpfConfig::one_way(2).scaler().unwrap());

        let looser = IpfConfig { tolerance: 2.0, ..IpfConfig::one_way(2) };
        assert!(matches!(
            IpfSynthesizer::from_model(model.clone(), looser),
            Err(SynthError::Configuration(_))
        ));
        let sweep = IpfConfig { stopping: StoppingRule::SweepDelta, ..IpfConfig::one_way(2) };
        assert!(matches!(
            IpfSynthesizer::from_model(model, sweep),
            Err(SynthError::Configuration(_))
        ));
    }

    #[test]
    fn test_unknown_category_aborts_fit() {
        let mut s = IpfSynthesizer::new(attrs(), IpfConfig::one_way(2)).unwrap();
        let t = Table::from_rows(["A", "B"], [vec!["a", "w"]]).unwrap();
        assert!(matches!(s.fit(&t), Err(SynthError::UnknownCategory { .. })));
        assert!(!s.is_fitted());
    }
}
