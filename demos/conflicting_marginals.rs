//! # Conflicting marginals
//!
//! Feeds the scaler two one-way targets whose totals disagree (100 vs 20).
//! No tensor satisfies both. Under the marginal-error rule the run hits its
//! sweep cap and returns a warning; under the sweep-delta rule it settles on
//! the cycle's fixed point and reports convergence with a large gap.
//!
//! Run with: `RUST_LOG=ipf_core=debug cargo run --example conflicting_marginals`

use ipf_core::marginal::Clique;
use ipf_core::scaler::{MarginalTarget, StoppingRule, TensorScaler};
use ipf_core::tensor::{MassTensor, Shape, DEFAULT_MAX_CELLS};
use ipf_core::{sample, SynthWarning};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing_subscriber::EnvFilter;

fn main() -> ipf_core::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let joint = Shape::new(&[2, 3], DEFAULT_MAX_CELLS)?;
    let targets = vec![
        MarginalTarget::new(
            Clique::new(&[0])?,
            MassTensor::from_vec(Shape::new(&[2], DEFAULT_MAX_CELLS)?, vec![60.0, 40.0])?,
        ),
        MarginalTarget::new(
            Clique::new(&[1])?,
            MassTensor::from_vec(Shape::new(&[3], DEFAULT_MAX_CELLS)?, vec![5.0, 10.0, 5.0])?,
        ),
    ];
    let support = MassTensor::uniform(joint);

    for rule in [StoppingRule::MarginalError, StoppingRule::SweepDelta] {
        let scaler = TensorScaler::new(0.5, 50)?.with_stopping(rule);
        let fit = scaler.fit(&support, &targets)?;
        let c = &fit.convergence;
        println!("▶  {rule:?}");
        println!(
            "  converged: {}  sweeps: {}  marginal error: {:.3}",
            c.converged, c.iterations, c.marginal_error
        );
        for w in &fit.warnings {
            if let SynthWarning::Convergence { .. } = w {
                println!("  warning: {w}");
            }
        }

        let drawn = sample(10, &fit.tensor, &mut StdRng::seed_from_u64(1))?;
        println!("  first sampled rows: {:?}\n", drawn.matrix.rows().take(3).collect::<Vec<_>>());
    }
    Ok(())
}
