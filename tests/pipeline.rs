//! End-to-end scenarios: encode, count, fit, sample, decode.
//!
//! Run with: `cargo test --test pipeline`

use ipf_core::marginal::{marginal, Clique};
use ipf_core::scaler::{MarginalTarget, TensorScaler};
use ipf_core::tensor::{CountTensor, MassTensor, Shape, DEFAULT_MAX_CELLS};
use ipf_core::{
    encode, Attribute, IpfConfig, IpfSynthesizer, SynthError, SynthWarning, SynthesisMethod, Table,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

// ─── helpers ─────────────────────────────────────────────────────────────────

fn ab_attributes() -> Vec<Attribute> {
    vec![
        Attribute::new("A", ["a", "b", "c"]),
        Attribute::new("B", ["0", "1", "2", "3", "4"]),
    ]
}

/// 100 rows, A and B both uniform, every (A, B) pair present.
fn ab_table() -> Table {
    let a = ["a", "b", "c"];
    let rows = (0..100).map(|i| vec![a[i % 3].to_string(), (i % 5).to_string()]);
    Table::from_rows(["A", "B"], rows).unwrap()
}

/// Skewed three-attribute table drawn from a fixed seed.
fn survey_table(rows: usize) -> (Vec<Attribute>, Table) {
    let attrs = vec![
        Attribute::new("region", ["north", "south", "east", "west"]),
        Attribute::new("tenure", ["own", "rent"]),
        Attribute::new("size", ["1", "2", "3", "4+"]),
    ];
    let mut rng = StdRng::seed_from_u64(2024);
    let mut table = Table::new(["region", "tenure", "size"]);
    for _ in 0..rows {
        let region = ["north", "north", "south", "east", "west"][rng.gen_range(0..5)];
        let tenure = if rng.gen_bool(0.65) { "own" } else { "rent" };
        let size = ["1", "2", "2", "3", "4+"][rng.gen_range(0..5)];
        table.push_row(vec![region, tenure, size]).unwrap();
    }
    (attrs, table)
}

fn empirical_counts(attrs: &[Attribute], table: &Table) -> CountTensor {
    let (m, codecs) = encode(table, attrs).unwrap();
    let dims: Vec<usize> = codecs.iter().map(|c| c.cardinality()).collect();
    CountTensor::from_matrix(&m, &dims, DEFAULT_MAX_CELLS).unwrap()
}

// ─── full-joint clique ───────────────────────────────────────────────────────

/// A clique covering every attribute is matched exactly by one rescale.
#[test]
fn test_full_clique_converges_in_one_sweep() {
    let config = IpfConfig::with_cliques([[0usize, 1]]).seeded(11);
    let mut s = IpfSynthesizer::new(ab_attributes(), config).unwrap();
    s.fit(&ab_table()).unwrap();

    let model = s.model().unwrap();
    assert!(model.convergence().converged);
    assert_eq!(model.convergence().iterations, 1);
    assert!(model.warnings().is_empty());

    let counts = empirical_counts(&ab_attributes(), &ab_table()).to_mass();
    assert!(model.tensor().l1_distance(&counts).unwrap() < 0.01);
}

#[test]
fn test_sample_fifty_rows() {
    let config = IpfConfig::with_cliques([[0usize, 1]]).seeded(11);
    let mut s = IpfSynthesizer::new(ab_attributes(), config).unwrap();
    let out = s.run(&ab_table(), Some(50)).unwrap();

    assert_eq!(out.table.n_rows(), 50);
    assert_eq!(out.table.columns(), &["A", "B"]);
    assert!(out.warnings.is_empty());
    for row in out.table.rows() {
        assert!(["a", "b", "c"].contains(&row[0].as_str()));
        assert!(["0", "1", "2", "3", "4"].contains(&row[1].as_str()));
    }
}

/// Large samples reproduce the empirical joint frequencies.
#[test]
fn test_sampling_reproduces_joint() {
    let config = IpfConfig::with_cliques([[0usize, 1]]).seeded(5);
    let mut s = IpfSynthesizer::new(ab_attributes(), config).unwrap();
    let n = 30_000;
    let out = s.run(&ab_table(), Some(n)).unwrap();

    let attrs = ab_attributes();
    let empirical = empirical_counts(&attrs, &ab_table()).to_mass().normalized();
    let synthetic = empirical_counts(&attrs, &out.table).to_mass().normalized();
    for (e, g) in empirical.as_slice().iter().zip(synthetic.as_slice()) {
        assert!((e - g).abs() < 0.01, "empirical {e} vs synthetic {g}");
    }
}

// ─── single-attribute cliques ────────────────────────────────────────────────

#[test]
fn test_one_way_cliques_match_targets() {
    let (attrs, table) = survey_table(500);
    let mut s = IpfSynthesizer::new(attrs.clone(), IpfConfig::one_way(3).seeded(1)).unwrap();
    s.fit(&table).unwrap();
    let model = s.model().unwrap();
    assert!(model.convergence().converged);

    let counts = empirical_counts(&attrs, &table);
    for axis in 0..3 {
        let clique = Clique::new(&[axis]).unwrap();
        let target = marginal(&counts, &clique).unwrap().to_mass();
        let fitted = marginal(model.tensor(), &clique).unwrap();
        assert!(
            fitted.l1_distance(&target).unwrap() < s.config().tolerance,
            "axis {axis} off target"
        );
    }
}

#[test]
fn test_overlapping_cliques_match_targets() {
    let (attrs, table) = survey_table(800);
    let cfg = IpfConfig::with_cliques([vec![0usize, 1], vec![1, 2]]).seeded(1);
    let mut s = IpfSynthesizer::new(attrs.clone(), cfg).unwrap();
    s.fit(&table).unwrap();
    let model = s.model().unwrap();
    assert!(model.convergence().converged);

    let counts = empirical_counts(&attrs, &table);
    for axes in [[0usize, 1], [1, 2]] {
        let clique = Clique::new(&axes).unwrap();
        let target = marginal(&counts, &clique).unwrap().to_mass();
        let fitted = marginal(model.tensor(), &clique).unwrap();
        assert!(fitted.l1_distance(&target).unwrap() < 0.5);
    }
}

// ─── conflicting targets ─────────────────────────────────────────────────────

/// Targets with different totals cannot all be met. The scaler must stop at
/// the cap, hand back a tensor and raise a convergence warning.
#[test]
fn test_conflicting_totals_hit_iteration_cap() {
    let shape = Shape::new(&[2, 2], DEFAULT_MAX_CELLS).unwrap();
    let row_shape = Shape::new(&[2], DEFAULT_MAX_CELLS).unwrap();
    let targets = vec![
        MarginalTarget::new(
            Clique::new(&[0]).unwrap(),
            MassTensor::from_vec(row_shape.clone(), vec![50.0, 50.0]).unwrap(),
        ),
        MarginalTarget::new(
            Clique::new(&[1]).unwrap(),
            MassTensor::from_vec(row_shape, vec![10.0, 10.0]).unwrap(),
        ),
    ];
    let scaler = TensorScaler::new(0.5, 40).unwrap();
    let fit = scaler.fit(&MassTensor::uniform(shape), &targets).unwrap();

    assert!(!fit.convergence.converged);
    assert_eq!(fit.convergence.iterations, 40);
    assert_eq!(fit.tensor.len(), 4);
    assert!(fit.tensor.as_slice().iter().all(|v| v.is_finite() && *v >= 0.0));
    assert!(matches!(
        fit.warnings.as_slice(),
        [SynthWarning::Convergence { iterations: 40, .. }]
    ));
}

#[test]
fn test_iteration_cap_surfaces_in_synthesis() {
    let (attrs, table) = survey_table(300);
    let cfg = IpfConfig {
        max_iterations: 1,
        tolerance: 1e-9,
        ..IpfConfig::with_cliques([vec![0usize, 1], vec![1, 2], vec![0, 2]]).seeded(3)
    };
    let mut s = IpfSynthesizer::new(attrs, cfg).unwrap();
    let out = s.run(&table, Some(20)).unwrap();
    assert_eq!(out.table.n_rows(), 20);
    assert!(out.warnings.iter().any(|w| matches!(w, SynthWarning::Convergence { .. })));
}

// ─── configuration errors ────────────────────────────────────────────────────

fn wide_attributes() -> Vec<Attribute> {
    // 100⁸ cells: far beyond any cell budget.
    (0..8)
        .map(|i| Attribute::new(format!("x{i}"), (0..100).map(|v| format!("{v:03}"))))
        .collect()
}

#[test]
fn test_out_of_range_clique_rejected_before_allocation() {
    let cfg = IpfConfig::with_cliques([vec![0usize, 1], vec![3, 8]]);
    match IpfSynthesizer::new(wide_attributes(), cfg) {
        Err(SynthError::Configuration(msg)) => assert!(msg.contains('8'), "{msg}"),
        other => panic!("expected Configuration error, got {other:?}"),
    }
}

#[test]
fn test_bad_config_rejected_by_set_config() {
    let mut s = IpfSynthesizer::new(ab_attributes(), IpfConfig::one_way(2)).unwrap();
    let bad = IpfConfig { tolerance: 0.0, ..IpfConfig::one_way(2) };
    assert!(matches!(s.set_config(bad), Err(SynthError::Configuration(_))));
}

#[test]
fn test_oversized_joint_rejected() {
    let mut s = IpfSynthesizer::new(wide_attributes(), IpfConfig::one_way(8)).unwrap();
    let table = Table::new((0..8).map(|i| format!("x{i}")));
    assert!(matches!(s.fit(&table), Err(SynthError::SizeLimitExceeded { .. })));
}

#[test]
fn test_unknown_category_aborts_run() {
    let mut s = IpfSynthesizer::new(ab_attributes(), IpfConfig::one_way(2)).unwrap();
    let table = Table::from_rows(["A", "B"], [vec!["a", "9"]]).unwrap();
    assert!(matches!(
        s.run(&table, None),
        Err(SynthError::UnknownCategory { ref attribute, .. }) if attribute == "B"
    ));
}

// ─── degenerate input ────────────────────────────────────────────────────────

/// An empty table yields an all-zero fit; sampling falls back to uniform and
/// says so instead of failing.
#[test]
fn test_empty_table_falls_back_to_uniform() {
    let mut s = IpfSynthesizer::new(ab_attributes(), IpfConfig::one_way(2).seeded(9)).unwrap();
    let out = s.run(&Table::new(["A", "B"]), Some(10)).unwrap();
    assert_eq!(out.table.n_rows(), 10);
    assert!(out
        .warnings
        .iter()
        .any(|w| matches!(w, SynthWarning::SamplingFallback { axis: 0, draws: 10 })));
}
