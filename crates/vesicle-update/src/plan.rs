//! Per-update planning: domain inference, owned-variable allocation and
//! symbol binding.
//!
//! [`plan_update`] turns one declared custom update into a
//! [`ResolvedUpdate`], the immutable description every backend executes.

use std::fmt;
use std::sync::Arc;

use vesicle_core::{EntityId, ModelError, Namespace, ReduceScope, VarKey};
use vesicle_store::{ElementSet, EntityDetail, UpdateDomain, VariableStore};

use crate::access::{owned_role, reference_role, SymbolRole};
use crate::env::EnvSymbol;
use crate::model::{CustomUpdateModel, UpdateCode};
use crate::reference::{VarRef, VarTarget};
use crate::resolve::{resolve_reference, resolve_target, ResolvedRef, VarLocator};

/// Which engine executes an update.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpdateKind {
    /// Element-wise read and write.
    Plain,
    /// At least one symbol is accumulated by a reduction operator.
    Reduction,
    /// Copies a weight matrix into its transpose.
    Transpose,
}

/// A symbol of an update bound to storage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SymbolBinding {
    /// Name the update code uses.
    pub name: String,
    /// Storage it reads (and for assignable roles, writes).
    pub locator: VarLocator,
    /// How the update uses it.
    pub role: SymbolRole,
}

/// Where a transpose update writes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransposeBinding {
    /// Index of the source symbol in [`ResolvedUpdate::symbols`].
    pub symbol: usize,
    /// Transposed weight variable.
    pub target: VarLocator,
    /// Presynaptic size of the source population.
    pub num_pre: usize,
    /// Postsynaptic size of the source population.
    pub num_post: usize,
}

/// A finalized custom update.
#[derive(Clone)]
pub struct ResolvedUpdate {
    /// Entity id of the update.
    pub entity: EntityId,
    /// Update name.
    pub name: String,
    /// Group it belongs to.
    pub group: String,
    /// Engine executing it.
    pub kind: UpdateKind,
    /// Iteration domain.
    pub domain: UpdateDomain,
    /// Batch lanes executed: the batch size when batched, else 1.
    pub lanes: usize,
    /// Elements visited per lane.
    pub elements: ElementSet,
    /// Owned variables first, then references, in model order.
    pub symbols: Vec<SymbolBinding>,
    /// Set for transpose updates.
    pub transpose: Option<TransposeBinding>,
    /// Parameter values, in model order.
    pub params: Vec<(String, f64)>,
    /// Per-element computation.
    pub code: Option<Arc<dyn UpdateCode>>,
}

impl ResolvedUpdate {
    /// Elements per lane of the domain.
    pub fn size(&self) -> usize {
        self.domain.size()
    }

    /// Whether lanes are executed independently.
    pub fn is_batched(&self) -> bool {
        self.lanes > 1
    }

    /// Symbol layout seen by the update code.
    pub fn env_layout(&self) -> Vec<EnvSymbol> {
        self.symbols
            .iter()
            .map(|s| EnvSymbol {
                name: s.name.clone(),
                writable: s.role.is_assignable(),
            })
            .collect()
    }

    /// Variables whose storage the update changes, in first-use order.
    pub fn writes(&self) -> Vec<VarKey> {
        let mut keys = Vec::new();
        let assigned = self
            .symbols
            .iter()
            .filter(|s| s.role.is_assignable())
            .map(|s| s.locator.key);
        let transposed = self.transpose.as_ref().map(|t| t.target.key);
        for key in assigned.chain(transposed) {
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        keys
    }

    /// Every variable the update touches, in first-use order.
    pub fn accessed(&self) -> Vec<VarKey> {
        let mut keys: Vec<VarKey> = Vec::new();
        for key in self.symbols.iter().map(|s| s.locator.key).chain(self.writes()) {
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        keys
    }
}

impl fmt::Debug for ResolvedUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedUpdate")
            .field("name", &self.name)
            .field("group", &self.group)
            .field("kind", &self.kind)
            .field("domain", &self.domain)
            .field("lanes", &self.lanes)
            .field("symbols", &self.symbols.len())
            .field("has_code", &self.code.is_some())
            .finish()
    }
}

// ── Domain inference ───────────────────────────────────────────────

/// Iteration domain and lane count inferred from an update's references.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DomainPlan {
    /// Domain iterated.
    pub domain: UpdateDomain,
    /// Batch lanes executed.
    pub lanes: usize,
    /// Elements visited per lane.
    pub elements: ElementSet,
}

fn synapse_of(store: &VariableStore, loc: &VarLocator) -> Option<EntityId> {
    match loc.namespace {
        Namespace::SynapseWeight => Some(loc.entity),
        Namespace::CustomUpdate => match store.entity(loc.entity).map(|e| &e.detail) {
            Some(EntityDetail::CustomUpdate {
                domain: Some(UpdateDomain::Synapse { synapse, .. }),
                ..
            }) => Some(*synapse),
            _ => None,
        },
        _ => None,
    }
}

/// Infer the domain of an update from its resolved references.
///
/// The update iterates synapses when any reference addresses synapse
/// weights (directly, through a synapse-domain custom update, or as a
/// transpose pair); all such references must share one population.
/// Otherwise it iterates the common element count of every reference that
/// does not broadcast over elements, or a single element if there is none.
///
/// The update is batched when the model is and either some referenced
/// storage has several lanes or the update reduces over the batch.
pub fn plan_domain(
    store: &VariableStore,
    update: &str,
    refs: &[ResolvedRef],
    batch_reduce: bool,
) -> Result<DomainPlan, ModelError> {
    let mismatch = |reason: String| ModelError::ShapeMismatch {
        context: update.to_string(),
        reason,
    };
    let mut synapse: Option<(EntityId, &str)> = None;
    let mut neuron: Option<(usize, &str)> = None;
    let mut any_lanes = false;

    for r in refs {
        let (loc, population) = match r {
            ResolvedRef::Transpose { source, target, .. } => {
                any_lanes |= target.shape.lanes > 1;
                (source, Some(source.entity))
            }
            ResolvedRef::Simple(loc) => (loc, synapse_of(store, loc)),
        };
        any_lanes |= loc.shape.lanes > 1;
        match population {
            Some(id) => match synapse {
                Some((prev, label)) if prev != id => {
                    return Err(mismatch(format!(
                        "'{label}' and '{}' belong to different synapse populations",
                        loc.label
                    )));
                }
                Some(_) => {}
                None => synapse = Some((id, &loc.label)),
            },
            None if loc.access.duplication.broadcasts_elements() => {}
            None => match neuron {
                Some((count, label)) if count != loc.shape.count => {
                    return Err(mismatch(format!(
                        "'{label}' has {count} elements but '{}' has {}",
                        loc.label, loc.shape.count
                    )));
                }
                Some(_) => {}
                None => neuron = Some((loc.shape.count, &loc.label)),
            },
        }
    }

    let (domain, elements) = match (synapse, neuron) {
        (Some((_, syn_label)), Some((_, neuron_label))) => {
            return Err(mismatch(format!(
                "'{syn_label}' iterates synapses but '{neuron_label}' iterates neurons"
            )));
        }
        (Some((id, label)), None) => match store.entity(id).map(|e| &e.detail) {
            Some(EntityDetail::SynapsePopulation {
                num_pre,
                num_post,
                connectivity,
                ..
            }) => (
                UpdateDomain::Synapse {
                    synapse: id,
                    size: connectivity.element_count(*num_pre, *num_post),
                },
                connectivity.elements(*num_pre, *num_post),
            ),
            _ => {
                return Err(mismatch(format!(
                    "'{label}' does not belong to a synapse population"
                )));
            }
        },
        (None, Some((count, _))) => (UpdateDomain::Neuron { size: count }, ElementSet::All(count)),
        (None, None) => (UpdateDomain::Neuron { size: 1 }, ElementSet::All(1)),
    };

    let batch = store.batch_size();
    let lanes = if batch > 1 && (any_lanes || batch_reduce) {
        batch
    } else {
        1
    };
    Ok(DomainPlan {
        domain,
        lanes,
        elements,
    })
}

// ── Update planning ────────────────────────────────────────────────

/// A declared custom update awaiting finalize.
#[derive(Clone, Copy, Debug)]
pub struct PendingUpdate<'a> {
    /// Entity id the update was registered under.
    pub entity: EntityId,
    /// Update name.
    pub name: &'a str,
    /// Group name.
    pub group: &'a str,
    /// Model it instantiates.
    pub model: &'a CustomUpdateModel,
    /// Parameter values, in model order.
    pub params: &'a [(String, f64)],
    /// References, in the model's reference order.
    pub refs: &'a [VarRef],
}

/// Finalize one custom update.
///
/// Resolves every reference, applies the access policy, infers the domain,
/// allocates the update's owned variables and binds every symbol. All
/// errors found in one phase are returned together; the store is only
/// mutated once every check has passed.
pub fn plan_update(
    store: &mut VariableStore,
    pending: &PendingUpdate<'_>,
) -> Result<ResolvedUpdate, Vec<ModelError>> {
    let name = pending.name;
    let model = pending.model;

    let mut errors = Vec::new();
    let mut resolved = Vec::with_capacity(pending.refs.len());
    for (decl, reference) in model.var_refs().iter().zip(pending.refs) {
        match resolve_reference(store, name, decl, reference) {
            Ok(r) => resolved.push(r),
            Err(e) => errors.push(e),
        }
    }
    if !errors.is_empty() {
        return Err(errors);
    }

    let has_code = model.code().is_some();
    let owned_roles: Vec<SymbolRole> = model.vars().iter().map(owned_role).collect();
    let mut ref_roles = Vec::with_capacity(resolved.len());
    for (decl, r) in model.var_refs().iter().zip(&resolved) {
        match reference_role(name, decl, r, has_code) {
            Ok(role) => ref_roles.push(role),
            Err(e) => errors.push(e),
        }
    }

    let transposes: Vec<&ResolvedRef> = resolved
        .iter()
        .filter(|r| matches!(r, ResolvedRef::Transpose { .. }))
        .collect();
    if let [first, second, ..] = transposes.as_slice() {
        errors.push(ModelError::IncompatibleTranspose {
            update: name.to_string(),
            source: first.primary().label.clone(),
            target: second.primary().label.clone(),
            reason: "an update binds at most one transpose reference".to_string(),
        });
    }
    if !errors.is_empty() {
        return Err(errors);
    }

    let symbol_names = model
        .vars()
        .iter()
        .map(|v| v.name.as_str())
        .chain(model.var_refs().iter().map(|r| r.name.as_str()));
    let roles: Vec<(&str, SymbolRole)> = symbol_names
        .zip(owned_roles.iter().chain(&ref_roles).copied())
        .collect();
    let reduces = |scope: Option<ReduceScope>| {
        roles.iter().filter(move |(_, role)| match role {
            SymbolRole::Reduce { scope: s, .. } => scope.is_none_or(|want| *s == want),
            _ => false,
        })
    };
    if !transposes.is_empty() {
        for (symbol, _) in reduces(None) {
            errors.push(ModelError::AccessViolation {
                update: name.to_string(),
                reference: symbol.to_string(),
                reason: "a transpose update cannot also reduce".to_string(),
            });
        }
    }
    if !errors.is_empty() {
        return Err(errors);
    }

    let batch_reduce = reduces(Some(ReduceScope::Batch)).next().is_some();
    let plan = plan_domain(store, name, &resolved, batch_reduce).map_err(|e| vec![e])?;
    if matches!(plan.domain, UpdateDomain::Synapse { .. }) {
        for (symbol, _) in reduces(Some(ReduceScope::Neuron)) {
            errors.push(ModelError::AccessViolation {
                update: name.to_string(),
                reference: symbol.to_string(),
                reason: "neuron reductions need a neuron domain".to_string(),
            });
        }
        if !errors.is_empty() {
            return Err(errors);
        }
    }

    store.set_update_domain(pending.entity, plan.domain);
    let mut symbols = Vec::with_capacity(roles.len());
    for (decl, role) in model.vars().iter().zip(&owned_roles) {
        let target = VarTarget::new(name, Namespace::CustomUpdate, decl.name.as_str());
        let key = store
            .lookup(name, Namespace::CustomUpdate, &decl.name)
            .map_err(|e| vec![ModelError::from(e)])?;
        store.allocate(key, plan.lanes).map_err(|e| vec![ModelError::from(e)])?;
        let locator = resolve_target(store, name, &target).map_err(|e| vec![e])?;
        symbols.push(SymbolBinding {
            name: decl.name.clone(),
            locator,
            role: *role,
        });
    }

    let mut transpose = None;
    for ((decl, r), role) in model.var_refs().iter().zip(resolved).zip(ref_roles) {
        if let ResolvedRef::Transpose {
            target,
            num_pre,
            num_post,
            ..
        } = &r
        {
            transpose = Some(TransposeBinding {
                symbol: symbols.len(),
                target: target.clone(),
                num_pre: *num_pre,
                num_post: *num_post,
            });
        }
        symbols.push(SymbolBinding {
            name: decl.name.clone(),
            locator: r.primary().clone(),
            role,
        });
    }

    let kind = if transpose.is_some() {
        UpdateKind::Transpose
    } else if symbols
        .iter()
        .any(|s| matches!(s.role, SymbolRole::Reduce { .. }))
    {
        UpdateKind::Reduction
    } else {
        UpdateKind::Plain
    };

    Ok(ResolvedUpdate {
        entity: pending.entity,
        name: name.to_string(),
        group: pending.group.to_string(),
        kind,
        domain: plan.domain,
        lanes: plan.lanes,
        elements: plan.elements,
        symbols,
        transpose,
        params: pending.params.to_vec(),
        code: model.code().cloned(),
    })
}
