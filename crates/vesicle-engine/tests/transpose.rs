//! Dense weight transposition through the built-in transpose model.

use proptest::prelude::*;
use vesicle_core::{ModelError, Namespace, Precision, ScalarType, VarAccess};
use vesicle_engine::{CustomUpdate, Model, ModelBuilder, ModelConfig};
use vesicle_store::{Connectivity, VarInit};
use vesicle_update::{VarRef, TRANSPOSE_MODEL};

fn transpose_update(name: &str) -> CustomUpdate {
    CustomUpdate::new(name, "Transpose", TRANSPOSE_MODEL).var_ref(
        "variable",
        VarRef::wu_transpose("Forward", "g", "Backward", "g"),
    )
}

/// `Pre(num_pre)` → `Post(num_post)` forward and the mirror-image backward
/// population, both dense with a duplicated `g`.
fn builder(num_pre: usize, num_post: usize, batch: usize, g: VarInit) -> ModelBuilder {
    let config = ModelConfig::default()
        .with_precision(Precision::Double)
        .with_batch_size(batch)
        .with_seed(1234);
    let mut b = ModelBuilder::new(config).unwrap();
    b.add_neuron_population("Pre", num_pre).unwrap();
    b.add_neuron_population("Post", num_post).unwrap();
    b.add_synapse_population("Forward", "Pre", "Post", Connectivity::Dense)
        .unwrap();
    b.add_synapse_population("Backward", "Post", "Pre", Connectivity::Dense)
        .unwrap();
    for (sg, init) in [("Forward", g), ("Backward", VarInit::Constant(0.0))] {
        b.declare_variable(
            sg,
            Namespace::SynapseWeight,
            "g",
            ScalarType::Scalar,
            VarAccess::READ_WRITE,
            init,
        )
        .unwrap();
    }
    b
}

fn transposed(model: &mut Model) -> (Vec<f64>, Vec<f64>) {
    model.invoke_group("Transpose").unwrap();
    let fwd = model.pull_var("Forward", Namespace::SynapseWeight, "g").unwrap();
    let back = model.pull_var("Backward", Namespace::SynapseWeight, "g").unwrap();
    (fwd, back)
}

fn assert_transposed(fwd: &[f64], back: &[f64], num_pre: usize, num_post: usize, batch: usize) {
    let per_lane = num_pre * num_post;
    assert_eq!(fwd.len(), per_lane * batch);
    assert_eq!(back.len(), per_lane * batch);
    for lane in 0..batch {
        for i in 0..num_pre {
            for j in 0..num_post {
                assert_eq!(
                    back[lane * per_lane + j * num_pre + i],
                    fwd[lane * per_lane + i * num_post + j],
                    "lane {lane}, pre {i}, post {j}"
                );
            }
        }
    }
}

#[test]
fn normal_weights_transpose() {
    let g = VarInit::Normal { mean: 0.0, sd: 1.0 };
    let mut b = builder(100, 100, 1, g);
    b.declare_custom_update(transpose_update("Transpose")).unwrap();
    let mut model = b.finalize().unwrap();

    let (fwd, back) = transposed(&mut model);
    assert_transposed(&fwd, &back, 100, 100, 1);
    assert!(fwd.iter().any(|&v| v != 0.0));
}

#[test]
fn rectangular_batched_transpose() {
    let (num_pre, num_post, batch) = (3, 4, 5);
    let g: Vec<f64> = (0..num_pre * num_post * batch).map(|v| v as f64).collect();
    let mut b = builder(num_pre, num_post, batch, VarInit::Values(g.clone()));
    b.declare_custom_update(transpose_update("Transpose")).unwrap();
    let mut model = b.finalize().unwrap();
    assert!(model.update("Transpose").unwrap().is_batched());

    let (fwd, back) = transposed(&mut model);
    assert_eq!(fwd, g);
    assert_transposed(&fwd, &back, num_pre, num_post, batch);
}

#[test]
fn forward_weights_are_left_untouched() {
    let g: Vec<f64> = (0..6).map(|v| v as f64 * 0.5).collect();
    let mut b = builder(2, 3, 1, VarInit::Values(g.clone()));
    b.declare_custom_update(transpose_update("Transpose")).unwrap();
    let mut model = b.finalize().unwrap();

    model.invoke_group("Transpose").unwrap();
    model.invoke_group("Transpose").unwrap();
    let fwd = model.pull_var("Forward", Namespace::SynapseWeight, "g").unwrap();
    let back = model.pull_var("Backward", Namespace::SynapseWeight, "g").unwrap();
    assert_eq!(fwd, g);
    assert_eq!(back, vec![0.0, 1.5, 0.5, 2.0, 1.0, 2.5]);
    assert_eq!(model.invocation_count("Transpose"), Some(2));
}

#[test]
fn sparse_source_cannot_be_transposed() {
    let config = ModelConfig::default();
    let mut b = ModelBuilder::new(config).unwrap();
    b.add_neuron_population("Pre", 10).unwrap();
    b.add_neuron_population("Post", 10).unwrap();
    b.add_synapse_population_fixed_number_post("Forward", "Pre", "Post", 2)
        .unwrap();
    b.add_synapse_population("Backward", "Post", "Pre", Connectivity::Dense)
        .unwrap();
    for sg in ["Forward", "Backward"] {
        b.declare_variable(
            sg,
            Namespace::SynapseWeight,
            "g",
            ScalarType::Scalar,
            VarAccess::READ_WRITE,
            0.0,
        )
        .unwrap();
    }
    b.declare_custom_update(transpose_update("Transpose")).unwrap();

    let err = b.finalize().unwrap_err();
    assert!(matches!(
        err.errors.as_slice(),
        [ModelError::UnsupportedConnectivityTranspose { population, .. }] if population == "Forward"
    ));
}

#[test]
fn non_mirrored_sizes_are_incompatible() {
    let mut b = ModelBuilder::new(ModelConfig::default()).unwrap();
    b.add_neuron_population("Pre", 3).unwrap();
    b.add_neuron_population("Post", 4).unwrap();
    b.add_synapse_population("Forward", "Pre", "Post", Connectivity::Dense)
        .unwrap();
    b.add_synapse_population("Backward", "Pre", "Post", Connectivity::Dense)
        .unwrap();
    for sg in ["Forward", "Backward"] {
        b.declare_variable(
            sg,
            Namespace::SynapseWeight,
            "g",
            ScalarType::Scalar,
            VarAccess::READ_WRITE,
            0.0,
        )
        .unwrap();
    }
    b.declare_custom_update(transpose_update("Transpose")).unwrap();

    let err = b.finalize().unwrap_err();
    assert!(matches!(
        err.errors.as_slice(),
        [ModelError::IncompatibleTranspose { .. }]
    ));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn transpose_mirrors_any_dense_shape(
        num_pre in 1usize..8,
        num_post in 1usize..8,
        batch in 1usize..4,
        seed in any::<u64>(),
    ) {
        let config = ModelConfig::default()
            .with_precision(Precision::Double)
            .with_batch_size(batch)
            .with_seed(seed);
        let mut b = ModelBuilder::new(config).unwrap();
        b.add_neuron_population("Pre", num_pre).unwrap();
        b.add_neuron_population("Post", num_post).unwrap();
        b.add_synapse_population("Forward", "Pre", "Post", Connectivity::Dense).unwrap();
        b.add_synapse_population("Backward", "Post", "Pre", Connectivity::Dense).unwrap();
        let g = VarInit::Uniform { min: -1.0, max: 1.0 };
        b.declare_variable(
            "Forward",
            Namespace::SynapseWeight,
            "g",
            ScalarType::Scalar,
            VarAccess::READ_WRITE,
            g,
        )
        .unwrap();
        b.declare_variable(
            "Backward",
            Namespace::SynapseWeight,
            "g",
            ScalarType::Scalar,
            VarAccess::READ_WRITE,
            0.0,
        )
        .unwrap();
        b.declare_custom_update(transpose_update("Transpose")).unwrap();
        let mut model = b.finalize().unwrap();

        let (fwd, back) = transposed(&mut model);
        assert_transposed(&fwd, &back, num_pre, num_post, batch);
    }
}
