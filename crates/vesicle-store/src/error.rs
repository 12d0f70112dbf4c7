//! Store-specific error types.

use std::error::Error;
use std::fmt;

use vesicle_core::{ModelError, Namespace, VarKey};

/// Errors that can occur during store registration, pull or push.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreError {
    /// An entity with this name already exists.
    DuplicateEntity {
        /// The clashing name.
        name: String,
    },
    /// The namespace already holds a variable with this name.
    DuplicateVariable {
        /// Owning entity.
        entity: String,
        /// Namespace of the clash.
        namespace: Namespace,
        /// The clashing name.
        name: String,
    },
    /// No entity is registered under this name.
    UnknownEntity {
        /// The requested name.
        name: String,
    },
    /// The entity has no such variable.
    UnknownVariable {
        /// Owning entity.
        entity: String,
        /// Namespace searched.
        namespace: Namespace,
        /// The requested variable.
        name: String,
    },
    /// The entity kind does not own variables in this namespace.
    NamespaceMismatch {
        /// Entity addressed.
        entity: String,
        /// The namespace it lacks.
        namespace: Namespace,
    },
    /// The key was not issued by this store.
    UnknownKey {
        /// The foreign key.
        key: VarKey,
    },
    /// The variable has no storage yet (its custom update is not finalized).
    NotAllocated {
        /// Owning entity.
        entity: String,
        /// The variable.
        name: String,
    },
    /// A buffer or initialiser has the wrong number of values.
    LengthMismatch {
        /// What was being filled, e.g. `"Neurons.X"`.
        target: String,
        /// Length required by the variable's shape.
        expected: usize,
        /// Length supplied.
        found: usize,
    },
    /// A connectivity descriptor is inconsistent with its populations.
    InvalidConnectivity {
        /// Description of the inconsistency.
        reason: String,
    },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateEntity { name } => write!(f, "entity '{name}' already exists"),
            Self::DuplicateVariable {
                entity,
                namespace,
                name,
            } => {
                write!(f, "'{entity}' already has a {namespace} variable '{name}'")
            }
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
            Self::UnknownKey { key } => write!(f, "unknown variable key {key}"),
            Self::NotAllocated { entity, name } => {
                write!(f, "variable '{entity}.{name}' is not allocated")
            }
            Self::LengthMismatch {
                target,
                expected,
                found,
            } => {
                write!(f, "'{target}' expects {expected} values, got {found}")
            }
            Self::InvalidConnectivity { reason } => write!(f, "invalid connectivity: {reason}"),
        }
    }
}

impl Error for StoreError {}

impl From<StoreError> for ModelError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::DuplicateEntity { name } => ModelError::DuplicateName {
                scope: "entity".to_string(),
                name,
            },
            StoreError::DuplicateVariable {
                entity,
                namespace,
                name,
            } => ModelError::DuplicateName {
                scope: format!("{namespace} variables of '{entity}'"),
                name,
            },
            StoreError::UnknownEntity { name } => ModelError::UnknownEntity { name },
            StoreError::UnknownVariable {
                entity,
                namespace,
                name,
            } => ModelError::UnknownVariable {
                entity,
                namespace,
                name,
            },
            StoreError::NamespaceMismatch { entity, namespace } => {
                ModelError::NamespaceMismatch { entity, namespace }
            }
            StoreError::UnknownKey { key } => ModelError::ShapeMismatch {
                context: format!("var#{key}"),
                reason: "unknown variable key".to_string(),
            },
            StoreError::NotAllocated { entity, name } => ModelError::ShapeMismatch {
                context: format!("{entity}.{name}"),
                reason: "storage not allocated".to_string(),
            },
            StoreError::LengthMismatch {
                target,
                expected,
                found,
            } => ModelError::ShapeMismatch {
                context: target,
                reason: format!("expected {expected} values, got {found}"),
            },
            StoreError::InvalidConnectivity { reason } => ModelError::ShapeMismatch {
                context: "connectivity".to_string(),
                reason,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicates_become_duplicate_name() {
        let err: ModelError = StoreError::DuplicateVariable {
            entity: "Neurons".into(),
            namespace: Namespace::Neuron,
            name: "V".into(),
        }
        .into();
        match err {
            ModelError::DuplicateName { scope, name } => {
                assert_eq!(name, "V");
                assert!(scope.contains("Neurons"));
            }
            other => panic!("expected DuplicateName, got {other:?}"),
        }
    }

    #[test]
    fn length_mismatch_becomes_shape_mismatch() {
        let err: ModelError = StoreError::LengthMismatch {
            target: "Neurons.X".into(),
            expected: 100,
            found: 3,
        }
        .into();
        assert!(matches!(err, ModelError::ShapeMismatch { .. }));
    }
}
