//! Batch duplication: storage shapes, per-lane execution, host access and
//! build warnings.

use proptest::prelude::*;
use vesicle_core::{Namespace, Precision, ScalarType, VarAccess, VarShape};
use vesicle_engine::{CustomUpdate, Model, ModelBuilder, ModelConfig};
use vesicle_store::StoreError;
use vesicle_test_utils::{copy_model, scale_model};
use vesicle_update::{BuildWarning, VarRef};

const NEURONS: usize = 6;

fn builder(batch: usize) -> ModelBuilder {
    let config = ModelConfig::default().with_batch_size(batch);
    let mut b = ModelBuilder::new(config).unwrap();
    b.add_neuron_population("Pop", NEURONS).unwrap();
    let vars = [
        ("D", ScalarType::Scalar, VarAccess::READ_WRITE),
        ("S", ScalarType::Scalar, VarAccess::READ_WRITE_SHARED),
        ("N", ScalarType::Scalar, VarAccess::READ_WRITE_SHARED_NEURON),
        ("Count", ScalarType::Int32, VarAccess::READ_WRITE),
    ];
    for (name, ty, access) in vars {
        b.declare_variable("Pop", Namespace::Neuron, name, ty, access, 1.0)
            .unwrap();
    }
    b.add_custom_update_model(scale_model()).unwrap();
    b.add_custom_update_model(copy_model()).unwrap();
    b
}

fn scale(name: &str, group: &str, var: &str) -> CustomUpdate {
    CustomUpdate::new(name, group, "Scale")
        .param("k", 3.0)
        .var_ref("R", VarRef::neuron("Pop", var))
}

fn shape(model: &Model, var: &str) -> VarShape {
    model.var_shape("Pop", Namespace::Neuron, var).unwrap()
}

#[test]
fn duplicated_update_runs_every_lane() {
    let mut b = builder(3);
    b.declare_custom_update(scale("ScaleD", "Scale", "D")).unwrap();
    let mut model = b.finalize().unwrap();
    assert!(model.update("ScaleD").unwrap().is_batched());

    let values: Vec<f64> = (0..NEURONS * 3).map(|v| v as f64).collect();
    model.push_var("Pop", Namespace::Neuron, "D", &values).unwrap();
    model.invoke_group("Scale").unwrap();
    let expected: Vec<f64> = values.iter().map(|v| v * 3.0).collect();
    assert_eq!(model.pull_var("Pop", Namespace::Neuron, "D").unwrap(), expected);
}

#[test]
fn shared_neuron_update_runs_one_element_per_lane() {
    let mut b = builder(4);
    b.declare_custom_update(scale("ScaleN", "Scale", "N")).unwrap();
    let mut model = b.finalize().unwrap();
    let update = model.update("ScaleN").unwrap();
    assert_eq!((update.size(), update.lanes), (1, 4));

    model
        .push_var("Pop", Namespace::Neuron, "N", &[1.0, 2.0, 3.0, 4.0])
        .unwrap();
    model.invoke_group("Scale").unwrap();
    assert_eq!(
        model.var_view("Pop", Namespace::Neuron, "N").unwrap(),
        &[3.0, 6.0, 9.0, 12.0]
    );
}

#[test]
fn shared_update_is_not_batched() {
    let mut b = builder(4);
    b.declare_custom_update(scale("ScaleS", "Scale", "S")).unwrap();
    let mut model = b.finalize().unwrap();
    assert!(!model.update("ScaleS").unwrap().is_batched());
    assert!(model.warnings().is_empty());

    model.invoke_group("Scale").unwrap();
    assert_eq!(
        model.pull_var("Pop", Namespace::Neuron, "S").unwrap(),
        vec![3.0; NEURONS]
    );
}

#[test]
fn batched_write_to_shared_storage_warns() {
    let mut b = builder(2);
    b.declare_custom_update(
        CustomUpdate::new("Gather", "Copy", "Copy")
            .var_ref("Src", VarRef::neuron("Pop", "D"))
            .var_ref("Dst", VarRef::neuron("Pop", "S")),
    )
    .unwrap();
    let model = b.finalize().unwrap();
    assert!(model.warnings().iter().any(|w| matches!(
        w,
        BuildWarning::SharedWriteAcrossBatch { update, symbol, var }
            if update == "Gather" && symbol == "Dst" && var == "Pop.S"
    )));
}

#[test]
fn overlapping_writes_in_one_group_warn() {
    let mut b = builder(1);
    b.declare_custom_update(scale("First", "Twice", "D")).unwrap();
    b.declare_custom_update(scale("Second", "Twice", "D")).unwrap();
    let mut model = b.finalize().unwrap();
    assert_eq!(
        model.warnings(),
        &[BuildWarning::OverlappingWrites {
            group: "Twice".to_string(),
            var: "Pop.D".to_string(),
            first: "First".to_string(),
            second: "Second".to_string(),
        }]
    );

    model.invoke_group("Twice").unwrap();
    assert_eq!(
        model.pull_var("Pop", Namespace::Neuron, "D").unwrap(),
        vec![9.0; NEURONS]
    );
}

#[test]
fn push_quantizes_to_the_variable_type() {
    let mut model = builder(1).finalize().unwrap();
    model
        .push_var("Pop", Namespace::Neuron, "D", &[0.1; NEURONS])
        .unwrap();
    let d = model.pull_var("Pop", Namespace::Neuron, "D").unwrap();
    assert!(d.iter().all(|&v| v == 0.1f32 as f64));

    model
        .push_var("Pop", Namespace::Neuron, "Count", &[2.7; NEURONS])
        .unwrap();
    let count = model.pull_var("Pop", Namespace::Neuron, "Count").unwrap();
    assert_eq!(count, vec![2.0; NEURONS]);
}

#[test]
fn double_precision_keeps_full_values() {
    let config = ModelConfig::default().with_precision(Precision::Double);
    let mut b = ModelBuilder::new(config).unwrap();
    b.add_neuron_population("Pop", 2).unwrap();
    b.declare_variable(
        "Pop",
        Namespace::Neuron,
        "D",
        ScalarType::Scalar,
        VarAccess::READ_WRITE,
        0.0,
    )
    .unwrap();
    let mut model = b.finalize().unwrap();
    model.push_var("Pop", Namespace::Neuron, "D", &[0.1, 0.2]).unwrap();
    assert_eq!(
        model.pull_var("Pop", Namespace::Neuron, "D").unwrap(),
        vec![0.1, 0.2]
    );
}

#[test]
fn push_of_wrong_length_is_rejected() {
    let mut model = builder(2).finalize().unwrap();
    let err = model
        .push_var("Pop", Namespace::Neuron, "D", &[0.0; NEURONS])
        .unwrap_err();
    assert!(matches!(
        err,
        StoreError::LengthMismatch {
            expected,
            found: NEURONS,
            ..
        } if expected == NEURONS * 2
    ));
    assert!(model.pull_var("Pop", Namespace::Neuron, "D").unwrap().iter().all(|v| *v == 1.0));
}

#[test]
fn unknown_variable_access() {
    let model = builder(1).finalize().unwrap();
    assert!(matches!(
        model.pull_var("Pop", Namespace::Neuron, "Missing"),
        Err(StoreError::UnknownVariable { .. })
    ));
    assert!(matches!(
        model.pull_var("Nobody", Namespace::Neuron, "D"),
        Err(StoreError::UnknownEntity { .. })
    ));
}

proptest! {
    #[test]
    fn shapes_follow_duplication(batch in 1usize..9) {
        let model = builder(batch).finalize().unwrap();
        prop_assert_eq!(shape(&model, "D"), VarShape::new(NEURONS, batch));
        prop_assert_eq!(shape(&model, "S"), VarShape::new(NEURONS, 1));
        prop_assert_eq!(shape(&model, "N"), VarShape::new(1, batch));
        prop_assert_eq!(model.batch_size(), batch);
    }
}
