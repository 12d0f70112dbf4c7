//! Benchmark profiles for the Vesicle custom update engine.
//!
//! Provides pre-built [`Model`]s for benchmarking:
//!
//! - [`reference_profile`]: 1000-neuron softmax in one three-member group
//! - [`batched_profile`]: the same softmax over 32 batch lanes
//! - [`transpose_profile`]: dense `n × n` weight transposition

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::error::Error;

use vesicle_core::{Namespace, Precision, ScalarType, VarAccess};
use vesicle_engine::{CustomUpdate, Model, ModelBuilder, ModelConfig};
use vesicle_store::{Connectivity, VarInit};
use vesicle_test_utils::softmax_models;
use vesicle_update::{VarRef, TRANSPOSE_MODEL};

/// Neurons in the softmax profiles.
pub const SOFTMAX_NEURONS: usize = 1000;

/// Build the reference profile: softmax over 1000 neurons, one lane.
///
/// Group `Softmax`: max reduction → sum-of-exp reduction → normalize.
pub fn reference_profile(seed: u64) -> Result<Model, Box<dyn Error>> {
    softmax_profile(SOFTMAX_NEURONS, 1, seed)
}

/// Build the batched profile: [`reference_profile`] over 32 lanes.
pub fn batched_profile(seed: u64) -> Result<Model, Box<dyn Error>> {
    softmax_profile(SOFTMAX_NEURONS, 32, seed)
}

/// Softmax of `Neurons.X` into `Neurons.Y` as one group named `Softmax`.
pub fn softmax_profile(neurons: usize, batch: usize, seed: u64) -> Result<Model, Box<dyn Error>> {
    let config = ModelConfig::default()
        .with_batch_size(batch)
        .with_seed(seed);
    let mut b = ModelBuilder::new(config)?;
    b.add_neuron_population("Neurons", neurons)?;
    let x = VarInit::Uniform {
        min: 0.0,
        max: 100.0,
    };
    for (name, init) in [("X", x), ("Y", VarInit::Constant(0.0))] {
        b.declare_variable(
            "Neurons",
            Namespace::Neuron,
            name,
            ScalarType::Scalar,
            VarAccess::READ_WRITE,
            init,
        )?;
    }
    for model in softmax_models() {
        b.add_custom_update_model(model)?;
    }
    b.declare_custom_update(
        CustomUpdate::new("Softmax1", "Softmax", "Softmax1")
            .var_init("MaxX", 0.0)
            .var_ref("X", VarRef::neuron("Neurons", "X")),
    )?;
    b.declare_custom_update(
        CustomUpdate::new("Softmax2", "Softmax", "Softmax2")
            .var_init("SumExpX", 0.0)
            .var_ref("X", VarRef::neuron("Neurons", "X"))
            .var_ref("MaxX", VarRef::custom_update("Softmax1", "MaxX")),
    )?;
    b.declare_custom_update(
        CustomUpdate::new("Softmax3", "Softmax", "Softmax3")
            .var_ref("X", VarRef::neuron("Neurons", "X"))
            .var_ref("MaxX", VarRef::custom_update("Softmax1", "MaxX"))
            .var_ref("SumExpX", VarRef::custom_update("Softmax2", "SumExpX"))
            .var_ref("Y", VarRef::neuron("Neurons", "Y")),
    )?;
    Ok(b.finalize()?)
}

/// Dense `n × n` forward weights transposed into the backward population
/// by group `Transpose`.
pub fn transpose_profile(n: usize, batch: usize, seed: u64) -> Result<Model, Box<dyn Error>> {
    let config = ModelConfig::default()
        .with_precision(Precision::Double)
        .with_batch_size(batch)
        .with_seed(seed);
    let mut b = ModelBuilder::new(config)?;
    b.add_neuron_population("Pre", n)?;
    b.add_neuron_population("Post", n)?;
    b.add_synapse_population("Forward", "Pre", "Post", Connectivity::Dense)?;
    b.add_synapse_population("Backward", "Post", "Pre", Connectivity::Dense)?;
    let g = VarInit::Normal { mean: 0.0, sd: 1.0 };
    for (sg, init) in [("Forward", g), ("Backward", VarInit::Constant(0.0))] {
        b.declare_variable(
            sg,
            Namespace::SynapseWeight,
            "g",
            ScalarType::Scalar,
            VarAccess::READ_WRITE,
            init,
        )?;
    }
    b.declare_custom_update(CustomUpdate::new("Transpose", "Transpose", TRANSPOSE_MODEL).var_ref(
        "variable",
        VarRef::wu_transpose("Forward", "g", "Backward", "g"),
    ))?;
    Ok(b.finalize()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_profile_finalizes() {
        let model = reference_profile(42).unwrap();
        assert_eq!(
            model.group_members("Softmax"),
            Some(vec!["Softmax1", "Softmax2", "Softmax3"])
        );
        assert!(model.warnings().is_empty());
    }

    #[test]
    fn batched_profile_runs_every_lane() {
        let model = batched_profile(42).unwrap();
        assert_eq!(model.batch_size(), 32);
        assert_eq!(model.update("Softmax3").unwrap().lanes, 32);
    }

    #[test]
    fn transpose_profile_runs() {
        let mut model = transpose_profile(16, 2, 7).unwrap();
        model.invoke_group("Transpose").unwrap();
        let fwd = model.pull_var("Forward", Namespace::SynapseWeight, "g").unwrap();
        let back = model.pull_var("Backward", Namespace::SynapseWeight, "g").unwrap();
        assert_eq!(back[1], fwd[16]);
    }

    #[test]
    fn profiles_are_deterministic() {
        let a = reference_profile(42).unwrap();
        let b = reference_profile(42).unwrap();
        assert_eq!(
            a.pull_var("Neurons", Namespace::Neuron, "X").unwrap(),
            b.pull_var("Neurons", Namespace::Neuron, "X").unwrap()
        );
    }
}
