//! Variable access and batch-duplication modes.
//!
//! Every variable carries a [`VarAccess`]: whether it may be written
//! (`mode`) and how its storage is replicated across batch lanes
//! (`duplication`). Variable-reference parameters carry a
//! [`VarRefAccess`] describing what the custom update wants to do with
//! the referenced variable.

use std::fmt;

use crate::types::VarShape;

// ── Reductions ─────────────────────────────────────────────────────

/// Associative, commutative operator used by reduction variables.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ReductionOp {
    /// Sum of contributions. Identity 0.
    Sum,
    /// Maximum of contributions. Identity −∞.
    Max,
}

impl ReductionOp {
    /// The operator's identity element.
    pub fn identity(self) -> f64 {
        match self {
            Self::Sum => 0.0,
            Self::Max => f64::NEG_INFINITY,
        }
    }

    /// Combine two contributions.
    pub fn combine(self, a: f64, b: f64) -> f64 {
        match self {
            Self::Sum => a + b,
            Self::Max => a.max(b),
        }
    }
}

impl fmt::Display for ReductionOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sum => f.write_str("sum"),
            Self::Max => f.write_str("max"),
        }
    }
}

/// Dimension a reduction accumulates over.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ReduceScope {
    /// Accumulate over the elements of the update, one result per lane.
    Neuron,
    /// Accumulate over batch lanes, one result per element.
    Batch,
}

// ── Duplication ────────────────────────────────────────────────────

/// How a variable's storage is replicated across batch lanes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Duplication {
    /// One value per element per lane.
    Duplicate,
    /// One value per element, shared by every lane.
    Shared,
    /// One value per lane, shared by every element of the population.
    SharedNeuron,
    /// Accumulator written only by the reduction operator.
    Reduce {
        /// Dimension being reduced.
        scope: ReduceScope,
        /// Operator combining contributions.
        op: ReductionOp,
    },
}

impl Duplication {
    /// Storage shape for `count` elements replicated over `lanes` lanes.
    pub fn shape(self, count: usize, lanes: usize) -> VarShape {
        match self {
            Self::Duplicate => VarShape::new(count, lanes),
            Self::Shared
            | Self::Reduce {
                scope: ReduceScope::Batch,
                ..
            } => VarShape::new(count, 1),
            Self::SharedNeuron
            | Self::Reduce {
                scope: ReduceScope::Neuron,
                ..
            } => VarShape::new(1, lanes),
        }
    }

    /// Whether one stored value is seen by every element of the population.
    pub fn broadcasts_elements(self) -> bool {
        matches!(
            self,
            Self::SharedNeuron
                | Self::Reduce {
                    scope: ReduceScope::Neuron,
                    ..
                }
        )
    }
}

impl fmt::Display for Duplication {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Duplicate => f.write_str("duplicate"),
            Self::Shared => f.write_str("shared"),
            Self::SharedNeuron => f.write_str("shared-neuron"),
            Self::Reduce {
                scope: ReduceScope::Neuron,
                op,
            } => write!(f, "reduce-neuron-{op}"),
            Self::Reduce {
                scope: ReduceScope::Batch,
                op,
            } => write!(f, "reduce-batch-{op}"),
        }
    }
}

// ── VarAccess ──────────────────────────────────────────────────────

/// Whether a variable may be written by references.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VarAccessMode {
    /// Readable only.
    ReadOnly,
    /// Readable and writable.
    ReadWrite,
}

/// Declared access of a variable: write mode crossed with duplication.
///
/// Fixed at declaration for the lifetime of the model.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct VarAccess {
    /// Write permission seen by references.
    pub mode: VarAccessMode,
    /// Batch replication of the storage.
    pub duplication: Duplication,
}

impl VarAccess {
    /// Read-write, one value per lane. The default for every entity kind.
    pub const READ_WRITE: Self = Self::new(VarAccessMode::ReadWrite, Duplication::Duplicate);
    /// Read-only, one value per lane.
    pub const READ_ONLY_DUPLICATE: Self =
        Self::new(VarAccessMode::ReadOnly, Duplication::Duplicate);
    /// Read-only, shared by every lane.
    pub const READ_ONLY_SHARED: Self = Self::new(VarAccessMode::ReadOnly, Duplication::Shared);
    /// Read-only, one value per population per lane.
    pub const READ_ONLY_SHARED_NEURON: Self =
        Self::new(VarAccessMode::ReadOnly, Duplication::SharedNeuron);
    /// Read-write, shared by every lane.
    pub const READ_WRITE_SHARED: Self = Self::new(VarAccessMode::ReadWrite, Duplication::Shared);
    /// Read-write, one value per population per lane.
    pub const READ_WRITE_SHARED_NEURON: Self =
        Self::new(VarAccessMode::ReadWrite, Duplication::SharedNeuron);
    /// Sum over the elements of the update.
    pub const REDUCE_NEURON_SUM: Self = Self::reduce(ReduceScope::Neuron, ReductionOp::Sum);
    /// Maximum over the elements of the update.
    pub const REDUCE_NEURON_MAX: Self = Self::reduce(ReduceScope::Neuron, ReductionOp::Max);
    /// Sum over batch lanes.
    pub const REDUCE_BATCH_SUM: Self = Self::reduce(ReduceScope::Batch, ReductionOp::Sum);
    /// Maximum over batch lanes.
    pub const REDUCE_BATCH_MAX: Self = Self::reduce(ReduceScope::Batch, ReductionOp::Max);

    /// Combine a mode and a duplication.
    pub const fn new(mode: VarAccessMode, duplication: Duplication) -> Self {
        Self { mode, duplication }
    }

    /// A reduction accumulator. Read-only towards references.
    pub const fn reduce(scope: ReduceScope, op: ReductionOp) -> Self {
        Self {
            mode: VarAccessMode::ReadOnly,
            duplication: Duplication::Reduce { scope, op },
        }
    }

    /// Whether references may write this variable.
    pub fn is_writable(&self) -> bool {
        self.mode == VarAccessMode::ReadWrite
    }

    /// The reduction this variable accumulates, if any.
    pub fn reduction(&self) -> Option<(ReduceScope, ReductionOp)> {
        match self.duplication {
            Duplication::Reduce { scope, op } => Some((scope, op)),
            _ => None,
        }
    }
}

impl Default for VarAccess {
    fn default() -> Self {
        Self::READ_WRITE
    }
}

impl fmt::Display for VarAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = match self.mode {
            VarAccessMode::ReadOnly => "read-only",
            VarAccessMode::ReadWrite => "read-write",
        };
        write!(f, "{mode} {}", self.duplication)
    }
}

// ── VarRefAccess ───────────────────────────────────────────────────

/// Access a custom update requests on a referenced variable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VarRefAccess {
    /// Read the referenced variable.
    ReadOnly,
    /// Read and write the referenced variable.
    ReadWrite,
    /// Accumulate into a referenced shared variable.
    Reduce(ReductionOp),
}

impl fmt::Display for VarRefAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadOnly => f.write_str("read-only"),
            Self::ReadWrite => f.write_str("read-write"),
            Self::Reduce(op) => write!(f, "reduce-{op}"),
        }
    }
}
