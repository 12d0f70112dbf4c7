//! Test fixtures and fault-injecting backends for Vesicle development.
//!
//! Provides the standard custom update models used across the test suite
//! and a [`FailingBackend`] that fails a chosen launch, optionally after
//! scribbling over its outputs.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

use vesicle_core::{BackendError, ScalarType, UpdateError, VarAccess, VarRefAccess};
use vesicle_update::{Backend, CustomUpdateModel, MemberFrame, ResolvedUpdate};

// ── Model fixtures ─────────────────────────────────────────────────

fn build(builder: vesicle_update::CustomUpdateModelBuilder) -> CustomUpdateModel {
    match builder.build() {
        Ok(model) => model,
        Err(e) => panic!("fixture model is invalid: {e}"),
    }
}

/// `SetTime`: owns `V`, references `R` read-write; sets both to `t`.
pub fn set_time_model() -> CustomUpdateModel {
    build(
        CustomUpdateModel::builder("SetTime")
            .var("V", ScalarType::Scalar, VarAccess::READ_WRITE)
            .var_ref("R", ScalarType::Scalar, VarRefAccess::ReadWrite)
            .code(|env| {
                let t = env.t();
                env.set("V", t)?;
                env.set("R", t)
            }),
    )
}

/// `SetTimeShared`: references `R` read-write; sets it to `t`.
pub fn set_time_shared_model() -> CustomUpdateModel {
    build(
        CustomUpdateModel::builder("SetTimeShared")
            .var_ref("R", ScalarType::Scalar, VarRefAccess::ReadWrite)
            .code(|env| {
                let t = env.t();
                env.set("R", t)
            }),
    )
}

/// `Holder`: owns `X`, references `R` read-only; no code.
pub fn holder_model() -> CustomUpdateModel {
    build(
        CustomUpdateModel::builder("Holder")
            .var("X", ScalarType::Scalar, VarAccess::READ_WRITE)
            .var_ref("R", ScalarType::Scalar, VarRefAccess::ReadOnly),
    )
}

/// `Copy`: `Dst = Src`.
pub fn copy_model() -> CustomUpdateModel {
    build(
        CustomUpdateModel::builder("Copy")
            .var_ref("Src", ScalarType::Scalar, VarRefAccess::ReadOnly)
            .var_ref("Dst", ScalarType::Scalar, VarRefAccess::ReadWrite)
            .code(|env| {
                let src = env.get("Src")?;
                env.set("Dst", src)
            }),
    )
}

/// `Scale`: `R = R * k`.
pub fn scale_model() -> CustomUpdateModel {
    build(
        CustomUpdateModel::builder("Scale")
            .param("k")
            .var_ref("R", ScalarType::Scalar, VarRefAccess::ReadWrite)
            .code(|env| {
                let r = env.get("R")?;
                let k = env.param("k")?;
                env.set("R", r * k)
            }),
    )
}

/// `Fail`: references `R` read-only; its code always fails.
pub fn failing_code_model() -> CustomUpdateModel {
    build(
        CustomUpdateModel::builder("Fail")
            .var_ref("R", ScalarType::Scalar, VarRefAccess::ReadOnly)
            .code(|_env| {
                Err(UpdateError::ExecutionFailed {
                    reason: "always fails".to_string(),
                })
            }),
    )
}

/// The three stages of a softmax over a population's `X` into `Y`:
///
/// 1. `Softmax1`: `MaxX` (neuron max reduction) `= X`
/// 2. `Softmax2`: `SumExpX` (neuron sum reduction) `= exp(X - MaxX)`
/// 3. `Softmax3`: `Y = exp(X - MaxX) / SumExpX`
pub fn softmax_models() -> [CustomUpdateModel; 3] {
    let max = CustomUpdateModel::builder("Softmax1")
        .var("MaxX", ScalarType::Scalar, VarAccess::REDUCE_NEURON_MAX)
        .var_ref("X", ScalarType::Scalar, VarRefAccess::ReadOnly)
        .code(|env| {
            let x = env.get("X")?;
            env.set("MaxX", x)
        });
    let sum = CustomUpdateModel::builder("Softmax2")
        .var("SumExpX", ScalarType::Scalar, VarAccess::REDUCE_NEURON_SUM)
        .var_ref("X", ScalarType::Scalar, VarRefAccess::ReadOnly)
        .var_ref("MaxX", ScalarType::Scalar, VarRefAccess::ReadOnly)
        .code(|env| {
            let e = (env.get("X")? - env.get("MaxX")?).exp();
            env.set("SumExpX", e)
        });
    let normalize = CustomUpdateModel::builder("Softmax3")
        .var_ref("X", ScalarType::Scalar, VarRefAccess::ReadOnly)
        .var_ref("MaxX", ScalarType::Scalar, VarRefAccess::ReadOnly)
        .var_ref("SumExpX", ScalarType::Scalar, VarRefAccess::ReadOnly)
        .var_ref("Y", ScalarType::Scalar, VarRefAccess::ReadWrite)
        .code(|env| {
            let e = (env.get("X")? - env.get("MaxX")?).exp();
            let y = e / env.get("SumExpX")?;
            env.set("Y", y)
        });
    [build(max), build(sum), build(normalize)]
}

/// Reference softmax of one row.
pub fn softmax(row: &[f64]) -> Vec<f64> {
    let max = row.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let sum: f64 = row.iter().map(|x| (x - max).exp()).sum();
    row.iter().map(|x| (x - max).exp() / sum).collect()
}

// ── FailingBackend ─────────────────────────────────────────────────

/// Delegates to an inner backend but fails the `fail_on_launch`-th launch
/// (1-based, counted across invocations).
pub struct FailingBackend {
    inner: Box<dyn Backend>,
    fail_on_launch: u64,
    scribble: bool,
    launches: u64,
}

impl FailingBackend {
    pub fn new(inner: Box<dyn Backend>, fail_on_launch: u64) -> Self {
        Self {
            inner,
            fail_on_launch,
            scribble: false,
            launches: 0,
        }
    }

    /// Run the inner backend and overwrite every output with NaN before
    /// failing.
    pub fn scribbling(mut self) -> Self {
        self.scribble = true;
        self
    }

    pub fn launches(&self) -> u64 {
        self.launches
    }
}

impl Backend for FailingBackend {
    fn name(&self) -> &str {
        "failing"
    }

    fn launch(
        &mut self,
        update: &ResolvedUpdate,
        frame: &mut MemberFrame<'_>,
    ) -> Result<(), BackendError> {
        self.launches += 1;
        if self.launches != self.fail_on_launch {
            return self.inner.launch(update, frame);
        }
        if self.scribble {
            self.inner.launch(update, frame)?;
            let (_, outputs) = frame.split_mut();
            for buf in outputs.values_mut() {
                buf.fill(f64::NAN);
            }
        }
        Err(BackendError::Device {
            reason: format!("injected failure on launch {}", self.launches),
        })
    }
}
