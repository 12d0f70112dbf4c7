//! Error types for the Vesicle custom-update core.
//!
//! Organized by phase: structural errors detected while a model is built
//! ([`ModelError`], collected into [`FinalizeError`]), failures raised by
//! opaque update code ([`UpdateError`]) or the backend running it
//! ([`BackendError`]), and run-time invocation errors ([`InvokeError`]).

use std::error::Error;
use std::fmt;

use crate::types::{ConnectivityKind, Namespace, ScalarType};

// ── ModelError ─────────────────────────────────────────────────────

/// Structural errors found during registration or finalize.
///
/// None of these are ever deferred to run time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ModelError {
    /// A name is already taken within its scope.
    DuplicateName {
        /// Where the clash happened, e.g. `"entity"` or `"model 'Softmax'"`.
        scope: String,
        /// The clashing name.
        name: String,
    },
    /// Supplied parameters, initialisers or references do not match the model.
    ArityMismatch {
        /// Custom update being declared.
        update: String,
        /// Which list mismatched: `"params"`, `"vars"` or `"var_refs"`.
        what: &'static str,
        /// Names the model declares.
        expected: Vec<String>,
        /// Names that were supplied.
        found: Vec<String>,
    },
    /// A referenced variable's type differs from the parameter's type.
    TypeMismatch {
        /// Custom update owning the reference.
        update: String,
        /// Reference parameter name.
        reference: String,
        /// Type declared by the model parameter.
        expected: ScalarType,
        /// Type of the referenced variable.
        found: ScalarType,
    },
    /// A reference requests an access its target does not permit.
    AccessViolation {
        /// Custom update owning the reference or variable.
        update: String,
        /// Reference parameter or owned variable name.
        reference: String,
        /// What was not permitted.
        reason: String,
    },
    /// A transpose pair does not connect mirror-image populations.
    IncompatibleTranspose {
        /// Custom update owning the transpose reference.
        update: String,
        /// Source synapse population.
        source: String,
        /// Target synapse population.
        target: String,
        /// Which property differs.
        reason: String,
    },
    /// A transpose pair uses connectivity that cannot be transposed.
    UnsupportedConnectivityTranspose {
        /// Custom update owning the transpose reference.
        update: String,
        /// Offending synapse population.
        population: String,
        /// Its connectivity kind.
        kind: ConnectivityKind,
    },
    /// No custom update model is registered under this name.
    UnknownModel {
        /// The requested model name.
        name: String,
    },
    /// No entity is registered under this name.
    UnknownEntity {
        /// The requested entity name.
        name: String,
    },
    /// The entity has no such variable in the namespace.
    UnknownVariable {
        /// Owning entity.
        entity: String,
        /// Namespace searched.
        namespace: Namespace,
        /// Missing variable name.
        name: String,
    },
    /// The entity does not own variables in the namespace.
    NamespaceMismatch {
        /// Entity addressed.
        entity: String,
        /// Namespace it does not have.
        namespace: Namespace,
    },
    /// Element counts of a declaration or an update's references disagree.
    ShapeMismatch {
        /// Entity or custom update concerned.
        context: String,
        /// What disagreed.
        reason: String,
    },
    /// A reference targets a member declared later in the same group.
    OrderViolation {
        /// Group containing both updates.
        group: String,
        /// Update holding the reference.
        update: String,
        /// Later member being referenced.
        target: String,
    },
    /// A reference targets a custom update that has not been finalized.
    UnresolvedTarget {
        /// Update holding the reference.
        update: String,
        /// Custom update being referenced.
        target: String,
    },
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateName { scope, name } => {
                write!(f, "duplicate name '{name}' in {scope}")
            }
            Self::ArityMismatch {
                update,
                what,
                expected,
                found,
            } => {
                write!(
                    f,
                    "custom update '{update}' {what}: model declares {expected:?}, got {found:?}"
                )
            }
            Self::TypeMismatch {
                update,
                reference,
                expected,
                found,
            } => {
                write!(
                    f,
                    "custom update '{update}' reference '{reference}' expects {expected}, \
                     variable is {found}"
                )
            }
            Self::AccessViolation {
                update,
                reference,
                reason,
            } => {
                write!(
                    f,
                    "custom update '{update}' access violation on '{reference}': {reason}"
                )
            }
            Self::IncompatibleTranspose {
                update,
                source,
                target,
                reason,
            } => {
                write!(
                    f,
                    "custom update '{update}' cannot transpose '{source}' into '{target}': {reason}"
                )
            }
            Self::UnsupportedConnectivityTranspose {
                update,
                population,
                kind,
            } => {
                write!(
                    f,
                    "custom update '{update}' cannot transpose {kind} connectivity \
                     of '{population}'"
                )
            }
            Self::UnknownModel { name } => write!(f, "unknown custom update model '{name}'"),
            Self::UnknownEntity { name } => write!(f, "unknown entity '{name}'"),
            Self::UnknownVariable {
                entity,
                namespace,
                name,
            } => {
                write!(f, "'{entity}' has no {namespace} variable '{name}'")
            }
            Self::NamespaceMismatch { entity, namespace } => {
                write!(f, "'{entity}' has no {namespace} namespace")
            }
            Self::ShapeMismatch { context, reason } => {
                write!(f, "shape mismatch in '{context}': {reason}")
            }
            Self::OrderViolation {
                group,
                update,
                target,
            } => {
                write!(
                    f,
                    "custom update '{update}' references '{target}', \
                     which runs later in group '{group}'"
                )
            }
            Self::UnresolvedTarget { update, target } => {
                write!(
                    f,
                    "custom update '{update}' references unresolved custom update '{target}'"
                )
            }
        }
    }
}

impl Error for ModelError {}

// ── FinalizeError ──────────────────────────────────────────────────

/// Every structural error found by a failed finalize.
///
/// Finalize never stops at the first error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FinalizeError {
    /// All errors, in declaration order of the updates they concern.
    pub errors: Vec<ModelError>,
}

impl fmt::Display for FinalizeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "finalize failed with {} error(s)", self.errors.len())?;
        for e in &self.errors {
            write!(f, "\n  - {e}")?;
        }
        Ok(())
    }
}

impl Error for FinalizeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.errors.first().map(|e| e as &(dyn Error + 'static))
    }
}

// ── UpdateError ────────────────────────────────────────────────────

/// Failures raised by opaque update code against its symbol environment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UpdateError {
    /// The update computation itself failed.
    ExecutionFailed {
        /// Human-readable description.
        reason: String,
    },
    /// The code asked for a symbol the update does not bind.
    UnknownSymbol {
        /// The requested name.
        name: String,
    },
    /// The code assigned to a read-only symbol.
    ReadOnlySymbol {
        /// The symbol written.
        name: String,
    },
}

impl fmt::Display for UpdateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExecutionFailed { reason } => write!(f, "execution failed: {reason}"),
            Self::UnknownSymbol { name } => write!(f, "unknown symbol '{name}'"),
            Self::ReadOnlySymbol { name } => write!(f, "symbol '{name}' is read-only"),
        }
    }
}

impl Error for UpdateError {}

// ── BackendError ───────────────────────────────────────────────────

/// Failures reported by a backend while running one update.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BackendError {
    /// The update's code failed.
    Code {
        /// Custom update being run.
        update: String,
        /// The code's error.
        source: UpdateError,
    },
    /// The execution target failed independently of the code.
    Device {
        /// Human-readable description.
        reason: String,
    },
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Code { update, source } => write!(f, "update '{update}': {source}"),
            Self::Device { reason } => write!(f, "device error: {reason}"),
        }
    }
}

impl Error for BackendError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Code { source, .. } => Some(source),
            Self::Device { .. } => None,
        }
    }
}

// ── InvokeError ────────────────────────────────────────────────────

/// Run-time errors from invoking a custom update group.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InvokeError {
    /// No finalized group has this name.
    UnknownGroup {
        /// The requested group name.
        name: String,
    },
    /// A member failed; the whole group invocation was discarded.
    BackendExecutionFailure {
        /// The group being invoked.
        group: String,
        /// Member that failed.
        update: String,
        /// Error reported by the backend, unmodified.
        source: BackendError,
    },
}

impl fmt::Display for InvokeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownGroup { name } => write!(f, "unknown custom update group '{name}'"),
            Self::BackendExecutionFailure {
                group,
                update,
                source,
            } => {
                write!(
                    f,
                    "group '{group}' failed in member '{update}': {source}"
                )
            }
        }
    }
}

impl Error for InvokeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::BackendExecutionFailure { source, .. } => Some(source),
            Self::UnknownGroup { .. } => None,
        }
    }
}
