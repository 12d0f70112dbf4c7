//! Access mode policy.
//!
//! Decides, for each symbol of a custom update, whether the requested
//! access is admissible and what role the symbol plays during execution.

use std::fmt;

use vesicle_core::{
    Duplication, ModelError, ReduceScope, ReductionOp, VarAccessMode, VarRefAccess,
};

use crate::model::{VarDecl, VarRefDecl};
use crate::resolve::ResolvedRef;

/// How an update uses one of its symbols.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SymbolRole {
    /// Read only.
    Read,
    /// Read and assigned; the assigned value is committed.
    ReadWrite,
    /// Accumulated with `op` over `scope`; starts at the identity.
    Reduce {
        /// Dimension being reduced.
        scope: ReduceScope,
        /// Combining operator.
        op: ReductionOp,
    },
    /// Source of a transpose pair. `write_back` commits code assignments
    /// to the source as well.
    Transpose {
        /// Whether assignments are committed to the source.
        write_back: bool,
    },
}

impl SymbolRole {
    /// Whether update code may assign the symbol.
    pub fn is_assignable(&self) -> bool {
        !matches!(self, Self::Read | Self::Transpose { write_back: false })
    }
}

impl fmt::Display for SymbolRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read => f.write_str("read"),
            Self::ReadWrite => f.write_str("read-write"),
            Self::Reduce { scope, op } => {
                let scope = match scope {
                    ReduceScope::Neuron => "neuron",
                    ReduceScope::Batch => "batch",
                };
                write!(f, "reduce-{scope}-{op}")
            }
            Self::Transpose { write_back } => write!(f, "transpose(write_back={write_back})"),
        }
    }
}

/// Role of an owned variable.
///
/// Reduce-typed variables are written only by their reduction operator.
pub fn owned_role(decl: &VarDecl) -> SymbolRole {
    match decl.access.reduction() {
        Some((scope, op)) => SymbolRole::Reduce { scope, op },
        None if decl.access.mode == VarAccessMode::ReadWrite => SymbolRole::ReadWrite,
        None => SymbolRole::Read,
    }
}

/// Decide the role of a resolved reference parameter.
///
/// - read-only parameters bind to anything;
/// - read-write parameters need a read-write target; reduction
///   accumulators are read-only to references;
/// - `Reduce(op)` parameters need a read-write target shared across the
///   batch (batch reduction) or across neurons (neuron reduction);
/// - transpose pairs cannot be reduced. The source is written back only
///   when the update has code, the parameter is read-write and the source
///   itself is writable.
pub fn reference_role(
    update: &str,
    decl: &VarRefDecl,
    resolved: &ResolvedRef,
    has_code: bool,
) -> Result<SymbolRole, ModelError> {
    let violation = |reason: String| ModelError::AccessViolation {
        update: update.to_string(),
        reference: decl.name.clone(),
        reason,
    };
    match resolved {
        ResolvedRef::Simple(loc) => match decl.access {
            VarRefAccess::ReadOnly => Ok(SymbolRole::Read),
            VarRefAccess::ReadWrite => {
                if loc.access.is_writable() {
                    Ok(SymbolRole::ReadWrite)
                } else if loc.access.reduction().is_some() {
                    Err(violation(format!(
                        "'{}' is a reduction target and is written only by its reduction",
                        loc.label
                    )))
                } else {
                    Err(violation(format!(
                        "read-write reference to {} variable '{}'",
                        loc.access, loc.label
                    )))
                }
            }
            VarRefAccess::Reduce(op) => {
                if !loc.access.is_writable() {
                    return Err(violation(format!(
                        "reduction into {} variable '{}'",
                        loc.access, loc.label
                    )));
                }
                match loc.access.duplication {
                    Duplication::Shared => Ok(SymbolRole::Reduce {
                        scope: ReduceScope::Batch,
                        op,
                    }),
                    Duplication::SharedNeuron => Ok(SymbolRole::Reduce {
                        scope: ReduceScope::Neuron,
                        op,
                    }),
                    other => Err(violation(format!(
                        "reduction target '{}' must be shared, not {other}",
                        loc.label
                    ))),
                }
            }
        },
        ResolvedRef::Transpose { source, .. } => match decl.access {
            VarRefAccess::Reduce(_) => Err(violation(
                "transpose references cannot be reduced".to_string(),
            )),
            VarRefAccess::ReadOnly => Ok(SymbolRole::Transpose { write_back: false }),
            VarRefAccess::ReadWrite => Ok(SymbolRole::Transpose {
                write_back: has_code && source.access.is_writable(),
            }),
        },
    }
}
