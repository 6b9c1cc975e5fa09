//! Fitted-model snapshot round trips through JSON.
//!
//! Run with: `cargo test --features serde`

#![cfg(feature = "serde")]

use ipf_core::marginal::Clique;
use ipf_core::snapshot::{FittedSnapshot, FITTED_SNAPSHOT_VERSION};
use ipf_core::tensor::{MassTensor, Shape};
use ipf_core::{
    Attribute, EncodedMatrix, IpfConfig, IpfSynthesizer, SynthError, SynthesisMethod, Table,
};

fn fitted_synth() -> IpfSynthesizer {
    let attrs = vec![
        Attribute::new("colour", ["red", "green", "blue"]),
        Attribute::new("shape", ["circle", "square"]),
    ];
    let table = Table::from_rows(
        ["colour", "shape"],
        [
            vec!["red", "circle"],
            vec!["red", "square"],
            vec!["blue", "circle"],
            vec!["green", "circle"],
            vec!["blue", "circle"],
        ],
    )
    .unwrap();
    let config = IpfConfig::with_cliques([[0usize, 1]]).seeded(17);
    let mut s = IpfSynthesizer::new(attrs, config).unwrap();
    s.fit(&table).unwrap();
    s
}

#[test]
fn test_snapshot_json_roundtrip() {
    let s = fitted_synth();
    let snap = s.snapshot().unwrap();
    let json = serde_json::to_string(&snap).unwrap();
    let back: FittedSnapshot = serde_json::from_str(&json).unwrap();
    assert_eq!(back, snap);
    assert_eq!(back.version, FITTED_SNAPSHOT_VERSION);
}

/// A restored model samples exactly like the original under the same seed.
#[test]
fn test_restored_model_samples_identically() {
    let mut original = fitted_synth();
    let json = serde_json::to_string(&original.snapshot().unwrap()).unwrap();
    let model = serde_json::from_str::<FittedSnapshot>(&json)
        .unwrap()
        .into_model()
        .unwrap();

    let cfg = IpfConfig::with_cliques([[0usize, 1]]).seeded(17);
    let mut restored = IpfSynthesizer::from_model(model, cfg).unwrap();
    assert_eq!(
        restored.sample(25).unwrap().table,
        original.sample(25).unwrap().table
    );
}

#[test]
fn test_unfitted_has_no_snapshot() {
    let attrs = vec![Attribute::new("x", ["0", "1"])];
    let s = IpfSynthesizer::new(attrs, IpfConfig::one_way(1)).unwrap();
    assert!(s.snapshot().is_none());
}

#[test]
fn test_config_serde_defaults() {
    let cfg: IpfConfig = serde_json::from_str(r#"{"cliques": [[0], [1, 2]], "seed": 4}"#).unwrap();
    assert_eq!(cfg.cliques, vec![vec![0], vec![1, 2]]);
    assert_eq!(cfg.max_iterations, 10_000);
    assert_eq!(cfg.seed, Some(4));
}

/// Restoring under a different tolerance would report a convergence the
/// stored tensor never reached.
#[test]
fn test_restore_rejects_mismatched_config() {
    let s = fitted_synth();
    let json = serde_json::to_string(&s.snapshot().unwrap()).unwrap();
    let model = serde_json::from_str::<FittedSnapshot>(&json)
        .unwrap()
        .into_model()
        .unwrap();

    let tighter = IpfConfig { tolerance: 1e-3, ..IpfConfig::with_cliques([[0usize, 1]]) };
    assert!(matches!(
        IpfSynthesizer::from_model(model.clone(), tighter),
        Err(SynthError::Configuration(_))
    ));
    assert!(matches!(
        IpfSynthesizer::from_model(model, IpfConfig::one_way(2)),
        Err(SynthError::Configuration(_))
    ));
}

// ─── malformed input ─────────────────────────────────────────────────────────

#[test]
fn test_tensor_json_keeps_shape() {
    let shape = Shape::new(&[2, 3], 6).unwrap();
    let t = MassTensor::from_vec(shape, vec![0.5, 1.0, 1.5, 2.0, 2.5, 3.0]).unwrap();
    let json = serde_json::to_string(&t).unwrap();
    let back: MassTensor = serde_json::from_str(&json).unwrap();
    assert_eq!(back, t);
    assert_eq!(back.shape().strides(), &[3, 1]);
}

#[test]
fn test_tensor_with_short_buffer_rejected() {
    let json = r#"{"shape":{"dims":[2,2],"strides":[2,1],"len":3},"data":[1,1,1]}"#;
    assert!(serde_json::from_str::<MassTensor>(json).is_err());
    let json = r#"{"shape":{"dims":[2,2]},"data":[1,1,1]}"#;
    assert!(serde_json::from_str::<MassTensor>(json).is_err());
}

#[test]
fn test_shape_with_wrong_strides_rejected() {
    assert!(serde_json::from_str::<Shape>(r#"{"dims":[2,3],"strides":[1,1],"len":6}"#).is_err());
    assert!(serde_json::from_str::<Shape>(r#"{"dims":[2,0]}"#).is_err());
    assert!(serde_json::from_str::<Shape>(r#"{"dims":[]}"#).is_err());
    let shape: Shape = serde_json::from_str(r#"{"dims":[2,3]}"#).unwrap();
    assert_eq!(shape.len(), 6);
}

#[test]
fn test_invalid_clique_rejected() {
    assert!(serde_json::from_str::<Clique>("[]").is_err());
    assert!(serde_json::from_str::<Clique>("[1, 1]").is_err());
    let c: Clique = serde_json::from_str("[2, 0]").unwrap();
    assert_eq!(c.axes(), &[2, 0]);
    assert_eq!(serde_json::to_string(&c).unwrap(), "[2,0]");
}

#[test]
fn test_ragged_matrix_rejected() {
    let json = r#"{"n_cols":2,"data":[0,1,2]}"#;
    assert!(serde_json::from_str::<EncodedMatrix>(json).is_err());
    let json = r#"{"n_cols":0,"data":[]}"#;
    assert!(serde_json::from_str::<EncodedMatrix>(json).is_err());
    let m: EncodedMatrix = serde_json::from_str(r#"{"n_cols":2,"data":[0,1,2,3]}"#).unwrap();
    assert_eq!(m.n_rows(), 2);
}
