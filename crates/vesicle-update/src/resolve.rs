//! Reference resolution: [`VarRef`] to bound [`VarLocator`]s.
//!
//! Resolution reads the store and never mutates it, so resolving the same
//! reference twice yields equal results.

use vesicle_core::{
    ConnectivityKind, EntityId, ModelError, Namespace, ScalarType, VarAccess, VarKey, VarShape,
};
use vesicle_store::{Connectivity, EntityDetail, VariableStore};

use crate::model::VarRefDecl;
use crate::reference::{VarRef, VarTarget};

/// A variable bound to its storage slot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VarLocator {
    /// Storage slot.
    pub key: VarKey,
    /// Owning entity.
    pub entity: EntityId,
    /// Namespace within the entity.
    pub namespace: Namespace,
    /// `Entity.var` label for diagnostics.
    pub label: String,
    /// Resolved type.
    pub ty: ScalarType,
    /// Declared access of the variable.
    pub access: VarAccess,
    /// Allocated storage shape.
    pub shape: VarShape,
}

/// A resolved reference parameter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResolvedRef {
    /// One variable.
    Simple(VarLocator),
    /// A dense transpose pair.
    Transpose {
        /// Weights read at `(pre, post)`.
        source: VarLocator,
        /// Weights written at `(post, pre)`.
        target: VarLocator,
        /// Presynaptic size of the source population.
        num_pre: usize,
        /// Postsynaptic size of the source population.
        num_post: usize,
    },
}

impl ResolvedRef {
    /// The variable the update code sees under the parameter name.
    pub fn primary(&self) -> &VarLocator {
        match self {
            Self::Simple(loc) | Self::Transpose { source: loc, .. } => loc,
        }
    }
}

/// Bind a single target to its storage.
///
/// A target whose storage is not yet allocated belongs to a custom update
/// that has not been finalized, reported as
/// [`ModelError::UnresolvedTarget`].
pub fn resolve_target(
    store: &VariableStore,
    update: &str,
    target: &VarTarget,
) -> Result<VarLocator, ModelError> {
    let key = store.lookup(&target.entity, target.namespace, &target.var)?;
    let meta = store.meta(key).ok_or_else(|| ModelError::UnknownVariable {
        entity: target.entity.clone(),
        namespace: target.namespace,
        name: target.var.clone(),
    })?;
    let shape = store.shape(key).ok_or_else(|| ModelError::UnresolvedTarget {
        update: update.to_string(),
        target: target.entity.clone(),
    })?;
    Ok(VarLocator {
        key,
        entity: meta.entity,
        namespace: meta.namespace,
        label: store.describe(key),
        ty: meta.ty.resolve(store.precision()),
        access: meta.access,
        shape,
    })
}

/// Resolve a reference parameter and check it against its declaration.
///
/// Checks the resolved type, and for transpose pairs the mirror-image
/// shape, dense connectivity, matching duplication and a writable target.
/// Access-mode admissibility of the parameter itself is decided by
/// [`crate::access::reference_role`].
pub fn resolve_reference(
    store: &VariableStore,
    update: &str,
    decl: &VarRefDecl,
    reference: &VarRef,
) -> Result<ResolvedRef, ModelError> {
    match reference {
        VarRef::Simple(target) => {
            let loc = resolve_target(store, update, target)?;
            check_type(store, update, decl, &loc)?;
            Ok(ResolvedRef::Simple(loc))
        }
        VarRef::Transpose { source, target } => {
            resolve_transpose(store, update, decl, source, target)
        }
    }
}

fn check_type(
    store: &VariableStore,
    update: &str,
    decl: &VarRefDecl,
    loc: &VarLocator,
) -> Result<(), ModelError> {
    let expected = decl.ty.resolve(store.precision());
    if expected != loc.ty {
        return Err(ModelError::TypeMismatch {
            update: update.to_string(),
            reference: decl.name.clone(),
            expected,
            found: loc.ty,
        });
    }
    Ok(())
}

struct SynapseDims<'a> {
    name: &'a str,
    num_pre: usize,
    num_post: usize,
    connectivity: &'a Connectivity,
}

fn synapse_dims<'a>(
    store: &'a VariableStore,
    loc: &VarLocator,
) -> Result<SynapseDims<'a>, ModelError> {
    match store.entity(loc.entity) {
        Some(meta) => match &meta.detail {
            EntityDetail::SynapsePopulation {
                num_pre,
                num_post,
                connectivity,
                ..
            } => Ok(SynapseDims {
                name: &meta.name,
                num_pre: *num_pre,
                num_post: *num_post,
                connectivity,
            }),
            _ => Err(ModelError::NamespaceMismatch {
                entity: meta.name.clone(),
                namespace: Namespace::SynapseWeight,
            }),
        },
        None => Err(ModelError::UnknownEntity {
            name: loc.entity.to_string(),
        }),
    }
}

fn resolve_transpose(
    store: &VariableStore,
    update: &str,
    decl: &VarRefDecl,
    source: &VarTarget,
    target: &VarTarget,
) -> Result<ResolvedRef, ModelError> {
    let src = resolve_target(store, update, source)?;
    let dst = resolve_target(store, update, target)?;
    let incompatible = |reason: String| ModelError::IncompatibleTranspose {
        update: update.to_string(),
        source: source.entity.clone(),
        target: target.entity.clone(),
        reason,
    };
    for loc in [&src, &dst] {
        if loc.namespace != Namespace::SynapseWeight {
            return Err(incompatible(format!("'{}' is not a synapse weight", loc.label)));
        }
    }
    check_type(store, update, decl, &src)?;
    check_type(store, update, decl, &dst)?;

    let fwd = synapse_dims(store, &src)?;
    let back = synapse_dims(store, &dst)?;
    for side in [&fwd, &back] {
        let kind = side.connectivity.kind();
        if kind != ConnectivityKind::Dense {
            return Err(ModelError::UnsupportedConnectivityTranspose {
                update: update.to_string(),
                population: side.name.to_string(),
                kind,
            });
        }
    }
    if fwd.num_pre != back.num_post || fwd.num_post != back.num_pre {
        return Err(incompatible(format!(
            "{}x{} does not mirror {}x{}",
            fwd.num_pre, fwd.num_post, back.num_pre, back.num_post
        )));
    }
    if src.access.duplication != dst.access.duplication {
        return Err(incompatible(format!(
            "duplication differs ({} vs {})",
            src.access.duplication, dst.access.duplication
        )));
    }
    if !dst.access.is_writable() {
        return Err(ModelError::AccessViolation {
            update: update.to_string(),
            reference: decl.name.clone(),
            reason: format!("transpose target '{}' is {}", dst.label, dst.access),
        });
    }
    Ok(ResolvedRef::Transpose {
        num_pre: fwd.num_pre,
        num_post: fwd.num_post,
        source: src,
        target: dst,
    })
}
