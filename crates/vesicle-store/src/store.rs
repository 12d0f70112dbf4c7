//! The variable store: entity registry plus flat per-variable storage.
//!
//! [`VariableStore`] is the central table of the model. Every variable
//! slot is addressed by a [`VarKey`] and keeps its metadata separate from
//! its data, so callers can inspect a variable's shape and type while
//! holding a mutable borrow of another variable's buffer.
//!
//! Variables of ordinary entities are allocated at declaration. Variables
//! owned by custom updates have no shape until the update is finalized;
//! their initialiser is held back until [`VariableStore::allocate`].

use indexmap::IndexMap;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::debug;
use vesicle_core::{
    EntityId, EntityKind, Namespace, Precision, ScalarType, VarAccess, VarKey, VarShape,
};

use crate::entity::{EntityDetail, EntityMeta, UpdateDomain};
use crate::error::StoreError;
use crate::init::VarInit;

/// Metadata of one variable (immutable after declaration).
#[derive(Clone, Debug, PartialEq)]
pub struct VarMeta {
    /// Slot key.
    pub key: VarKey,
    /// Owning entity.
    pub entity: EntityId,
    /// Namespace within the entity.
    pub namespace: Namespace,
    /// Name, unique within the namespace.
    pub name: String,
    /// Declared (unresolved) type.
    pub ty: ScalarType,
    /// Declared access and duplication.
    pub access: VarAccess,
}

struct VarSlot {
    meta: VarMeta,
    shape: Option<VarShape>,
    data: Vec<f64>,
    pending: Option<VarInit>,
}

/// Per-entity named variables with flat `f64` storage.
pub struct VariableStore {
    batch_size: usize,
    precision: Precision,
    rng: ChaCha8Rng,
    entities: Vec<EntityMeta>,
    entity_index: IndexMap<String, EntityId>,
    slots: Vec<VarSlot>,
    index: IndexMap<(EntityId, Namespace, String), VarKey>,
}

impl VariableStore {
    /// Create an empty store.
    ///
    /// `seed` drives every random initialiser and connectivity generator
    /// drawn through [`rng_mut`](Self::rng_mut).
    pub fn new(batch_size: usize, precision: Precision, seed: u64) -> Self {
        Self {
            batch_size,
            precision,
            rng: ChaCha8Rng::seed_from_u64(seed),
            entities: Vec::new(),
            entity_index: IndexMap::new(),
            slots: Vec::new(),
            index: IndexMap::new(),
        }
    }

    /// Lanes of batch-duplicated storage.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Precision resolving the `scalar` alias.
    pub fn precision(&self) -> Precision {
        self.precision
    }

    /// The model's seeded generator.
    pub fn rng_mut(&mut self) -> &mut ChaCha8Rng {
        &mut self.rng
    }

    // ── Entities ───────────────────────────────────────────────────

    /// Register an entity under a unique name.
    pub fn add_entity(
        &mut self,
        name: impl Into<String>,
        detail: EntityDetail,
    ) -> Result<EntityId, StoreError> {
        let name = name.into();
        if self.entity_index.contains_key(&name) {
            return Err(StoreError::DuplicateEntity { name });
        }
        if let EntityDetail::SynapsePopulation {
            num_pre,
            num_post,
            connectivity,
            ..
        } = &detail
        {
            connectivity.validate(*num_pre, *num_post)?;
        }
        let id = EntityId(self.entities.len() as u32);
        self.entity_index.insert(name.clone(), id);
        self.entities.push(EntityMeta { id, name, detail });
        Ok(id)
    }

    /// Look up an entity by id.
    pub fn entity(&self, id: EntityId) -> Option<&EntityMeta> {
        self.entities.get(id.0 as usize)
    }

    /// Look up an entity by name.
    pub fn entity_by_name(&self, name: &str) -> Result<&EntityMeta, StoreError> {
        self.entity_index
            .get(name)
            .and_then(|id| self.entity(*id))
            .ok_or_else(|| StoreError::UnknownEntity {
                name: name.to_string(),
            })
    }

    /// All entities in registration order.
    pub fn entities(&self) -> impl Iterator<Item = &EntityMeta> {
        self.entities.iter()
    }

    /// Record the iteration domain of a custom update.
    ///
    /// Has no effect on other entity kinds.
    pub fn set_update_domain(&mut self, id: EntityId, domain: UpdateDomain) {
        if let Some(EntityMeta {
            detail: EntityDetail::CustomUpdate { domain: slot, .. },
            ..
        }) = self.entities.get_mut(id.0 as usize)
        {
            *slot = Some(domain);
        }
    }

    // ── Declaration ────────────────────────────────────────────────

    /// Declare a variable.
    ///
    /// Variables of custom updates are allocated later by
    /// [`allocate`](Self::allocate); every other variable is allocated and
    /// initialised immediately.
    pub fn declare_var(
        &mut self,
        entity: EntityId,
        namespace: Namespace,
        name: impl Into<String>,
        ty: ScalarType,
        access: VarAccess,
        init: VarInit,
    ) -> Result<VarKey, StoreError> {
        let name = name.into();
        let owner = self
            .entity(entity)
            .ok_or_else(|| StoreError::UnknownEntity {
                name: entity.to_string(),
            })?;
        if !owner.kind().admits(namespace) {
            return Err(StoreError::NamespaceMismatch {
                entity: owner.name.clone(),
                namespace,
            });
        }
        let index_key = (entity, namespace, name.clone());
        if self.index.contains_key(&index_key) {
            return Err(StoreError::DuplicateVariable {
                entity: owner.name.clone(),
                namespace,
                name,
            });
        }
        let deferred = owner.kind() == EntityKind::CustomUpdate;
        let key = VarKey(self.slots.len() as u32);
        let meta = VarMeta {
            key,
            entity,
            namespace,
            name,
            ty,
            access,
        };

        let slot = if deferred {
            VarSlot {
                meta,
                shape: None,
                data: Vec::new(),
                pending: Some(init),
            }
        } else {
            let count = owner.element_count(namespace).unwrap_or(0);
            let shape = access.duplication.shape(count, self.batch_size);
            let target = format!("{}.{}", owner.name, meta.name);
            let data = init.fill(&target, shape, ty.resolve(self.precision), &mut self.rng)?;
            VarSlot {
                meta,
                shape: Some(shape),
                data,
                pending: None,
            }
        };
        self.index.insert(index_key, key);
        self.slots.push(slot);
        Ok(key)
    }

    /// Allocate a custom-update variable once its update's domain is known.
    ///
    /// `lanes` is the update's lane count: the batch size for batched
    /// updates, 1 otherwise.
    pub fn allocate(&mut self, key: VarKey, lanes: usize) -> Result<VarShape, StoreError> {
        let slot = self
            .slots
            .get(key.0 as usize)
            .ok_or_else(|| unknown_key(key))?;
        if let Some(shape) = slot.shape {
            return Ok(shape);
        }
        let owner = self
            .entity(slot.meta.entity)
            .ok_or_else(|| StoreError::UnknownEntity {
                name: slot.meta.entity.to_string(),
            })?;
        let count = owner
            .element_count(slot.meta.namespace)
            .ok_or_else(|| StoreError::NotAllocated {
                entity: owner.name.clone(),
                name: slot.meta.name.clone(),
            })?;
        let shape = slot.meta.access.duplication.shape(count, lanes);
        let target = format!("{}.{}", owner.name, slot.meta.name);
        let ty = slot.meta.ty.resolve(self.precision);
        let init = slot.pending.clone().unwrap_or_default();
        let data = init.fill(&target, shape, ty, &mut self.rng)?;

        debug!(var = %target, shape = %shape, "allocated custom update variable");
        let slot = &mut self.slots[key.0 as usize];
        slot.shape = Some(shape);
        slot.data = data;
        slot.pending = None;
        Ok(shape)
    }

    // ── Lookup ─────────────────────────────────────────────────────

    /// Find a variable by entity name, namespace and variable name.
    pub fn lookup(
        &self,
        entity: &str,
        namespace: Namespace,
        name: &str,
    ) -> Result<VarKey, StoreError> {
        let owner = self.entity_by_name(entity)?;
        if !owner.kind().admits(namespace) {
            return Err(StoreError::NamespaceMismatch {
                entity: owner.name.clone(),
                namespace,
            });
        }
        self.find(owner.id, namespace, name)
            .ok_or_else(|| StoreError::UnknownVariable {
                entity: owner.name.clone(),
                namespace,
                name: name.to_string(),
            })
    }

    /// Find a variable of a known entity.
    pub fn find(&self, entity: EntityId, namespace: Namespace, name: &str) -> Option<VarKey> {
        self.index
            .get(&(entity, namespace, name.to_string()))
            .copied()
    }

    /// Metadata of a variable.
    pub fn meta(&self, key: VarKey) -> Option<&VarMeta> {
        self.slots.get(key.0 as usize).map(|s| &s.meta)
    }

    /// Storage shape, once allocated.
    pub fn shape(&self, key: VarKey) -> Option<VarShape> {
        self.slots.get(key.0 as usize).and_then(|s| s.shape)
    }

    /// Declared type with the `scalar` alias resolved.
    pub fn resolved_type(&self, key: VarKey) -> Option<ScalarType> {
        self.meta(key).map(|m| m.ty.resolve(self.precision))
    }

    /// All variables in declaration order.
    pub fn vars(&self) -> impl Iterator<Item = &VarMeta> {
        self.slots.iter().map(|s| &s.meta)
    }

    // ── Data access ────────────────────────────────────────────────

    /// Borrow a variable's current values.
    pub fn view(&self, key: VarKey) -> Result<&[f64], StoreError> {
        let slot = self.allocated(key)?;
        Ok(&slot.data)
    }

    /// Copy a variable's current values out of the store.
    pub fn pull(&self, key: VarKey) -> Result<Vec<f64>, StoreError> {
        self.view(key).map(<[f64]>::to_vec)
    }

    /// Overwrite a variable's values from the host.
    ///
    /// `values` must cover the full flat shape; each value is quantized to
    /// the variable's type.
    pub fn push(&mut self, key: VarKey, values: &[f64]) -> Result<(), StoreError> {
        let ty = self
            .resolved_type(key)
            .ok_or_else(|| unknown_key(key))?;
        let target = self.describe(key);
        let slot = self.allocated_mut(key)?;
        if values.len() != slot.data.len() {
            return Err(StoreError::LengthMismatch {
                target,
                expected: slot.data.len(),
                found: values.len(),
            });
        }
        for (dst, src) in slot.data.iter_mut().zip(values) {
            *dst = ty.quantize(*src);
        }
        Ok(())
    }

    /// Replace a variable's full extent with already-quantized data.
    pub fn commit(&mut self, key: VarKey, data: Vec<f64>) -> Result<(), StoreError> {
        let target = self.describe(key);
        let slot = self.allocated_mut(key)?;
        if data.len() != slot.data.len() {
            return Err(StoreError::LengthMismatch {
                target,
                expected: slot.data.len(),
                found: data.len(),
            });
        }
        slot.data = data;
        Ok(())
    }

    /// `Entity.variable` label for diagnostics.
    pub fn describe(&self, key: VarKey) -> String {
        match self.meta(key) {
            Some(meta) => {
                let owner = self
                    .entity(meta.entity)
                    .map(|e| e.name.as_str())
                    .unwrap_or("?");
                format!("{owner}.{}", meta.name)
            }
            None => format!("var#{key}"),
        }
    }

    fn allocated(&self, key: VarKey) -> Result<&VarSlot, StoreError> {
        let slot = self
            .slots
            .get(key.0 as usize)
            .ok_or_else(|| unknown_key(key))?;
        if slot.shape.is_none() {
            return Err(self.not_allocated(&slot.meta));
        }
        Ok(slot)
    }

    fn allocated_mut(&mut self, key: VarKey) -> Result<&mut VarSlot, StoreError> {
        let err = match self.slots.get(key.0 as usize) {
            None => Some(unknown_key(key)),
            Some(slot) if slot.shape.is_none() => Some(self.not_allocated(&slot.meta)),
            Some(_) => None,
        };
        match err {
            Some(e) => Err(e),
            None => Ok(&mut self.slots[key.0 as usize]),
        }
    }

    fn not_allocated(&self, meta: &VarMeta) -> StoreError {
        StoreError::NotAllocated {
            entity: self
                .entity(meta.entity)
                .map(|e| e.name.clone())
                .unwrap_or_default(),
            name: meta.name.clone(),
        }
    }
}

fn unknown_key(key: VarKey) -> StoreError {
    StoreError::UnknownKey { key }
}

impl std::fmt::Debug for VariableStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VariableStore")
            .field("batch_size", &self.batch_size)
            .field("precision", &self.precision)
            .field("entities", &self.entities.len())
            .field("vars", &self.slots.len())
            .finish()
    }
}
