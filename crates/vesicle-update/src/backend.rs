//! The execution seam: [`Backend`] and the per-member [`MemberFrame`].

use indexmap::IndexMap;
use vesicle_core::{BackendError, VarKey};

use crate::plan::ResolvedUpdate;

/// Buffers handed to a backend for one member of a group invocation.
///
/// `inputs[i]` is the full extent of symbol `i` as of the start of the
/// member: staged output of an earlier member if one wrote it, the store
/// otherwise. `outputs` holds one owned buffer per variable the member
/// writes, seeded with the same state, so elements the backend does not
/// visit keep their values.
#[derive(Debug)]
pub struct MemberFrame<'a> {
    inputs: Vec<&'a [f64]>,
    outputs: IndexMap<VarKey, Vec<f64>>,
    time: f64,
}

impl<'a> MemberFrame<'a> {
    /// Create a frame.
    pub fn new(inputs: Vec<&'a [f64]>, outputs: IndexMap<VarKey, Vec<f64>>, time: f64) -> Self {
        Self {
            inputs,
            outputs,
            time,
        }
    }

    /// Simulation time of the invocation.
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Input of symbol `symbol`.
    pub fn input(&self, symbol: usize) -> Option<&'a [f64]> {
        self.inputs.get(symbol).copied()
    }

    /// Output buffer of `key`, if the member writes it.
    pub fn output(&self, key: VarKey) -> Option<&[f64]> {
        self.outputs.get(&key).map(Vec::as_slice)
    }

    /// Mutable output buffer of `key`, if the member writes it.
    pub fn output_mut(&mut self, key: VarKey) -> Option<&mut [f64]> {
        self.outputs.get_mut(&key).map(Vec::as_mut_slice)
    }

    /// Inputs and outputs borrowed together.
    pub fn split_mut(&mut self) -> (&[&'a [f64]], &mut IndexMap<VarKey, Vec<f64>>) {
        (&self.inputs, &mut self.outputs)
    }

    /// Release the outputs.
    pub fn into_outputs(self) -> IndexMap<VarKey, Vec<f64>> {
        self.outputs
    }
}

/// Executes resolved custom updates.
///
/// A backend runs one member at a time against a [`MemberFrame`]. It may
/// parallelise internally across elements and lanes, but from the
/// caller's perspective `launch` is synchronous.
///
/// # Contract
///
/// - `launch` reads only `frame` inputs and writes only `frame` outputs.
/// - On error, whatever the backend left in the outputs is discarded by
///   the caller; the store is never observed half-written.
/// - The same `update` and inputs must always produce the same outputs.
///
/// # Object safety
///
/// `Backend` is object-safe; models hold a `Box<dyn Backend>`.
pub trait Backend: Send {
    /// Human-readable name for diagnostics.
    fn name(&self) -> &str;

    /// Run `update` over every element and lane it covers.
    fn launch(
        &mut self,
        update: &ResolvedUpdate,
        frame: &mut MemberFrame<'_>,
    ) -> Result<(), BackendError>;
}
