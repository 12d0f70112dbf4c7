//! Structural errors reported by finalize.

use vesicle_core::{ModelError, Namespace, ScalarType, VarAccess};
use vesicle_engine::{CustomUpdate, ModelBuilder, ModelConfig};
use vesicle_store::Connectivity;
use vesicle_test_utils::{copy_model, scale_model, softmax_models};
use vesicle_update::VarRef;

fn builder() -> ModelBuilder {
    let mut b = ModelBuilder::new(ModelConfig::default()).unwrap();
    b.add_neuron_population("Pre", 10).unwrap();
    b.add_neuron_population("Post", 20).unwrap();
    b.add_synapse_population("Syn", "Pre", "Post", Connectivity::Dense)
        .unwrap();
    let vars = [
        ("Pre", Namespace::Neuron, "V", ScalarType::Scalar, VarAccess::READ_WRITE),
        ("Pre", Namespace::Neuron, "Fixed", ScalarType::Scalar, VarAccess::READ_ONLY_DUPLICATE),
        ("Pre", Namespace::Neuron, "Count", ScalarType::Int32, VarAccess::READ_WRITE),
        ("Post", Namespace::Neuron, "V", ScalarType::Scalar, VarAccess::READ_WRITE),
        ("Syn", Namespace::SynapseWeight, "g", ScalarType::Scalar, VarAccess::READ_WRITE),
    ];
    for (entity, ns, name, ty, access) in vars {
        b.declare_variable(entity, ns, name, ty, access, 0.0).unwrap();
    }
    b.add_custom_update_model(scale_model()).unwrap();
    b.add_custom_update_model(copy_model()).unwrap();
    b
}

fn scale(name: &str, target: VarRef) -> CustomUpdate {
    CustomUpdate::new(name, "Test", "Scale")
        .param("k", 2.0)
        .var_ref("R", target)
}

#[test]
fn read_write_reference_to_read_only_variable() {
    let mut b = builder();
    b.declare_custom_update(scale("ScaleFixed", VarRef::neuron("Pre", "Fixed")))
        .unwrap();

    let err = b.finalize().unwrap_err();
    assert!(matches!(
        err.errors.as_slice(),
        [ModelError::AccessViolation { update, reference, .. }]
            if update == "ScaleFixed" && reference == "R"
    ));
}

#[test]
fn every_error_is_reported_in_declaration_order() {
    let mut b = builder();
    b.declare_custom_update(scale("Ghostly", VarRef::neuron("Ghost", "V")))
        .unwrap();
    b.declare_custom_update(scale("Counting", VarRef::neuron("Pre", "Count")))
        .unwrap();
    b.declare_custom_update(scale("Missing", VarRef::neuron("Pre", "W")))
        .unwrap();
    b.declare_custom_update(scale("Fine", VarRef::neuron("Pre", "V")))
        .unwrap();
    b.declare_custom_update(scale("ScaleFixed", VarRef::neuron("Pre", "Fixed")))
        .unwrap();

    let err = b.finalize().unwrap_err();
    assert_eq!(err.errors.len(), 4, "{err}");
    assert!(matches!(&err.errors[0], ModelError::UnknownEntity { name } if name == "Ghost"));
    assert!(matches!(
        &err.errors[1],
        ModelError::TypeMismatch {
            expected: ScalarType::Float,
            found: ScalarType::Int32,
            ..
        }
    ));
    assert!(matches!(&err.errors[2], ModelError::UnknownVariable { name, .. } if name == "W"));
    assert!(matches!(&err.errors[3], ModelError::AccessViolation { .. }));
    assert!(err.to_string().contains("4 error(s)"));
}

#[test]
fn mismatched_neuron_counts() {
    let mut b = builder();
    b.declare_custom_update(
        CustomUpdate::new("Copy", "Test", "Copy")
            .var_ref("Src", VarRef::neuron("Pre", "V"))
            .var_ref("Dst", VarRef::neuron("Post", "V")),
    )
    .unwrap();

    let err = b.finalize().unwrap_err();
    assert!(matches!(
        err.errors.as_slice(),
        [ModelError::ShapeMismatch { context, .. }] if context == "Copy"
    ));
}

#[test]
fn synapse_and_neuron_references_cannot_mix() {
    let mut b = builder();
    b.declare_custom_update(
        CustomUpdate::new("Copy", "Test", "Copy")
            .var_ref("Src", VarRef::wu("Syn", "g"))
            .var_ref("Dst", VarRef::neuron("Post", "V")),
    )
    .unwrap();

    let err = b.finalize().unwrap_err();
    assert!(matches!(
        err.errors.as_slice(),
        [ModelError::ShapeMismatch { .. }]
    ));
}

#[test]
fn neuron_reduction_over_synapses() {
    let mut b = builder();
    let [max, ..] = softmax_models();
    b.add_custom_update_model(max).unwrap();
    b.declare_custom_update(
        CustomUpdate::new("MaxWeight", "Test", "Softmax1")
            .var_init("MaxX", 0.0)
            .var_ref("X", VarRef::wu("Syn", "g")),
    )
    .unwrap();

    let err = b.finalize().unwrap_err();
    assert!(matches!(
        err.errors.as_slice(),
        [ModelError::AccessViolation { reference, .. }] if reference == "MaxX"
    ));
}

#[test]
fn read_write_reference_to_reduction_target() {
    let mut b = builder();
    let [max, ..] = softmax_models();
    b.add_custom_update_model(max).unwrap();
    b.declare_custom_update(
        CustomUpdate::new("Max", "Reduce", "Softmax1")
            .var_init("MaxX", 0.0)
            .var_ref("X", VarRef::neuron("Pre", "V")),
    )
    .unwrap();
    b.declare_custom_update(scale("ScaleMax", VarRef::custom_update("Max", "MaxX")))
        .unwrap();

    let err = b.finalize().unwrap_err();
    assert!(matches!(
        err.errors.as_slice(),
        [ModelError::AccessViolation { update, .. }] if update == "ScaleMax"
    ));
}

#[test]
fn valid_updates_do_not_mask_errors() {
    let mut b = builder();
    b.declare_custom_update(scale("Fine", VarRef::neuron("Pre", "V")))
        .unwrap();
    b.declare_custom_update(scale("Ghostly", VarRef::neuron("Ghost", "V")))
        .unwrap();
    let err = b.finalize().unwrap_err();
    assert_eq!(err.errors.len(), 1);
}
