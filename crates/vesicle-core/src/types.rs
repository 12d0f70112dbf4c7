//! Scalar types, variable namespaces, entity kinds and storage shapes.

use std::fmt;

// ── Precision ──────────────────────────────────────────────────────

/// Floating-point precision a model is built with.
///
/// Resolves the [`ScalarType::Scalar`] alias.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum Precision {
    /// Single precision: `scalar` means `float`.
    #[default]
    Float,
    /// Double precision: `scalar` means `double`.
    Double,
}

// ── ScalarType ─────────────────────────────────────────────────────

/// Declared type of a variable or variable-reference parameter.
///
/// Storage is always `f64`; the type decides how committed values are
/// quantized and which references may bind to which variables.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScalarType {
    /// Precision-dependent alias for `Float` or `Double`.
    Scalar,
    /// 32-bit float.
    Float,
    /// 64-bit float.
    Double,
    /// Signed 32-bit integer.
    Int32,
    /// Unsigned 32-bit integer.
    Uint32,
}

impl ScalarType {
    /// Replace the `Scalar` alias with the concrete type for `precision`.
    pub fn resolve(self, precision: Precision) -> Self {
        match (self, precision) {
            (Self::Scalar, Precision::Float) => Self::Float,
            (Self::Scalar, Precision::Double) => Self::Double,
            (other, _) => other,
        }
    }

    /// Round `value` to what this type can represent.
    ///
    /// Must be called on a resolved type; `Scalar` passes values through.
    pub fn quantize(self, value: f64) -> f64 {
        match self {
            Self::Float => value as f32 as f64,
            Self::Int32 => value as i32 as f64,
            Self::Uint32 => value as u32 as f64,
            Self::Double | Self::Scalar => value,
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Scalar => "scalar",
            Self::Float => "float",
            Self::Double => "double",
            Self::Int32 => "int32_t",
            Self::Uint32 => "uint32_t",
        };
        f.write_str(name)
    }
}

// ── Namespace ──────────────────────────────────────────────────────

/// The namespace a variable lives in within its owning entity.
///
/// Synapse populations own four namespaces; every other entity kind
/// owns exactly one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Namespace {
    /// Neuron population state.
    Neuron,
    /// Current source state.
    CurrentSource,
    /// Custom update owned variables.
    CustomUpdate,
    /// Per-synapse weight-update state.
    SynapseWeight,
    /// Per-presynaptic-neuron weight-update state.
    Presynaptic,
    /// Per-postsynaptic-neuron weight-update state.
    Postsynaptic,
    /// Postsynaptic model state.
    PostsynapticModel,
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Neuron => "neuron",
            Self::CurrentSource => "current-source",
            Self::CustomUpdate => "custom-update",
            Self::SynapseWeight => "synapse-weight",
            Self::Presynaptic => "presynaptic",
            Self::Postsynaptic => "postsynaptic",
            Self::PostsynapticModel => "postsynaptic-model",
        };
        f.write_str(name)
    }
}

// ── EntityKind ─────────────────────────────────────────────────────

/// Kind of an addressable owner of variables.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntityKind {
    /// A population of neurons.
    NeuronPopulation,
    /// A population of synapses between two neuron populations.
    SynapsePopulation,
    /// A current source injecting into a neuron population.
    CurrentSource,
    /// A custom update instance.
    CustomUpdate,
}

impl EntityKind {
    /// Whether entities of this kind own variables in `ns`.
    pub fn admits(self, ns: Namespace) -> bool {
        match self {
            Self::NeuronPopulation => ns == Namespace::Neuron,
            Self::CurrentSource => ns == Namespace::CurrentSource,
            Self::CustomUpdate => ns == Namespace::CustomUpdate,
            Self::SynapsePopulation => matches!(
                ns,
                Namespace::SynapseWeight
                    | Namespace::Presynaptic
                    | Namespace::Postsynaptic
                    | Namespace::PostsynapticModel
            ),
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NeuronPopulation => "neuron population",
            Self::SynapsePopulation => "synapse population",
            Self::CurrentSource => "current source",
            Self::CustomUpdate => "custom update",
        };
        f.write_str(name)
    }
}

// ── ConnectivityKind ───────────────────────────────────────────────

/// Storage layout of a synapse population's connectivity matrix.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConnectivityKind {
    /// Full `pre × post` matrix.
    Dense,
    /// Row-compressed matrix with a fixed maximum row length.
    Sparse,
    /// Shared convolution kernel.
    Kernel,
}

impl fmt::Display for ConnectivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Dense => "dense",
            Self::Sparse => "sparse",
            Self::Kernel => "kernel",
        };
        f.write_str(name)
    }
}

// ── VarShape ───────────────────────────────────────────────────────

/// Logical shape of a variable's storage: `count` elements per lane,
/// `lanes` batch lanes, laid out lane-major.
///
/// A dimension of extent 1 broadcasts: every lane of a shared variable
/// maps to lane 0, and every element of a per-population scalar maps to
/// element 0.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct VarShape {
    /// Elements per lane.
    pub count: usize,
    /// Number of batch lanes.
    pub lanes: usize,
}

impl VarShape {
    /// Create a shape.
    pub fn new(count: usize, lanes: usize) -> Self {
        Self { count, lanes }
    }

    /// Flat length of the storage.
    pub fn len(&self) -> usize {
        self.count * self.lanes
    }

    /// Whether the storage holds no values.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flat index of `(lane, element)`, broadcasting unit dimensions.
    pub fn index(&self, lane: usize, element: usize) -> usize {
        let lane = if self.lanes == 1 { 0 } else { lane };
        let element = if self.count == 1 { 0 } else { element };
        lane * self.count + element
    }
}

impl fmt::Display for VarShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.lanes, self.count)
    }
}
