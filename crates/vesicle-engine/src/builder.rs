//! Model registration and finalize.
//!
//! [`ModelBuilder`] is the `Registered` phase of a model: entities,
//! variables, custom update models and custom updates are added to it,
//! then [`finalize`](ModelBuilder::finalize) resolves everything at once
//! and produces a runnable [`Model`].

use indexmap::IndexMap;
use tracing::{debug, info, warn};
use vesicle_core::{
    EntityId, EntityKind, FinalizeError, ModelError, Namespace, ScalarType, VarAccess, VarKey,
};
use vesicle_store::{Connectivity, EntityDetail, SparseConnectivity, VarInit, VariableStore};
use vesicle_update::{
    plan_group, plan_update, update_warnings, Backend, CustomUpdateModel, PendingUpdate,
    ResolvedUpdate, VarRef,
};

use crate::config::{ConfigError, ModelConfig};
use crate::cpu::CpuBackend;
use crate::model::Model;

// ── CustomUpdate ───────────────────────────────────────────────────

/// Declaration of one custom update instance.
///
/// Parameters, variable initialisers and references are matched to the
/// model by name; every name the model declares must be supplied exactly
/// once.
#[derive(Clone, Debug)]
pub struct CustomUpdate {
    name: String,
    group: String,
    model: String,
    params: Vec<(String, f64)>,
    var_inits: Vec<(String, VarInit)>,
    var_refs: Vec<(String, VarRef)>,
}

impl CustomUpdate {
    /// Start a declaration of `model` named `name`, invoked with `group`.
    pub fn new(
        name: impl Into<String>,
        group: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            group: group.into(),
            model: model.into(),
            params: Vec::new(),
            var_inits: Vec::new(),
            var_refs: Vec::new(),
        }
    }

    /// Supply a parameter value.
    pub fn param(mut self, name: impl Into<String>, value: f64) -> Self {
        self.params.push((name.into(), value));
        self
    }

    /// Supply the initialiser of an owned variable.
    pub fn var_init(mut self, name: impl Into<String>, init: impl Into<VarInit>) -> Self {
        self.var_inits.push((name.into(), init.into()));
        self
    }

    /// Bind a reference parameter.
    pub fn var_ref(mut self, name: impl Into<String>, target: VarRef) -> Self {
        self.var_refs.push((name.into(), target));
        self
    }

    /// Instance name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Group name.
    pub fn group(&self) -> &str {
        &self.group
    }
}

/// Reorder `supplied` into `expected` order, or report an arity mismatch.
fn arrange<T: Clone>(
    update: &str,
    what: &'static str,
    expected: &[&str],
    supplied: &[(String, T)],
) -> Result<Vec<T>, ModelError> {
    let mismatch = || ModelError::ArityMismatch {
        update: update.to_string(),
        what,
        expected: expected.iter().map(|s| s.to_string()).collect(),
        found: supplied.iter().map(|(n, _)| n.clone()).collect(),
    };
    if supplied.len() != expected.len() {
        return Err(mismatch());
    }
    expected
        .iter()
        .map(|name| {
            supplied
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| v.clone())
                .ok_or_else(mismatch)
        })
        .collect()
}

struct Declared {
    entity: EntityId,
    name: String,
    group: String,
    model: CustomUpdateModel,
    params: Vec<(String, f64)>,
    refs: Vec<VarRef>,
}

// ── ModelBuilder ───────────────────────────────────────────────────

/// A model under construction.
pub struct ModelBuilder {
    config: ModelConfig,
    store: VariableStore,
    models: IndexMap<String, CustomUpdateModel>,
    updates: Vec<Declared>,
}

impl ModelBuilder {
    /// Create an empty builder. The built-in `Transpose` model is
    /// registered up front.
    pub fn new(config: ModelConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let store = VariableStore::new(config.batch_size, config.precision, config.seed);
        let transpose = CustomUpdateModel::transpose();
        let mut models = IndexMap::new();
        models.insert(transpose.name().to_string(), transpose);
        Ok(Self {
            config,
            store,
            models,
            updates: Vec::new(),
        })
    }

    /// The configuration the builder was created with.
    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    fn neuron_size(&self, name: &str, context: &str) -> Result<(EntityId, usize), ModelError> {
        let meta = self.store.entity_by_name(name)?;
        match meta.detail {
            EntityDetail::NeuronPopulation { size } => Ok((meta.id, size)),
            _ => Err(ModelError::ShapeMismatch {
                context: context.to_string(),
                reason: format!("'{name}' is a {}, not a neuron population", meta.kind()),
            }),
        }
    }

    // ── Entities ───────────────────────────────────────────────────

    /// Register a neuron population of `size` neurons.
    pub fn add_neuron_population(
        &mut self,
        name: impl Into<String>,
        size: usize,
    ) -> Result<EntityId, ModelError> {
        Ok(self
            .store
            .add_entity(name, EntityDetail::NeuronPopulation { size })?)
    }

    /// Register a current source injecting into neuron population `target`.
    pub fn add_current_source(
        &mut self,
        name: impl Into<String>,
        target: &str,
    ) -> Result<EntityId, ModelError> {
        let name = name.into();
        let (target, size) = self.neuron_size(target, &name)?;
        Ok(self
            .store
            .add_entity(name, EntityDetail::CurrentSource { target, size })?)
    }

    /// Register synapses from neuron population `source` to `target`.
    pub fn add_synapse_population(
        &mut self,
        name: impl Into<String>,
        source: &str,
        target: &str,
        connectivity: Connectivity,
    ) -> Result<EntityId, ModelError> {
        let name = name.into();
        let (source, num_pre) = self.neuron_size(source, &name)?;
        let (target, num_post) = self.neuron_size(target, &name)?;
        Ok(self.store.add_entity(
            name,
            EntityDetail::SynapsePopulation {
                source,
                target,
                num_pre,
                num_post,
                connectivity,
            },
        )?)
    }

    /// Register sparse synapses where every presynaptic neuron connects to
    /// `row_length` postsynaptic neurons drawn, with replacement, from the
    /// model's seeded generator.
    pub fn add_synapse_population_fixed_number_post(
        &mut self,
        name: impl Into<String>,
        source: &str,
        target: &str,
        row_length: usize,
    ) -> Result<EntityId, ModelError> {
        let (_, num_pre) = self.neuron_size(source, source)?;
        let (_, num_post) = self.neuron_size(target, target)?;
        let sparse = SparseConnectivity::fixed_number_post_with_replacement(
            num_pre,
            num_post,
            row_length,
            self.store.rng_mut(),
        )?;
        self.add_synapse_population(name, source, target, Connectivity::Sparse(sparse))
    }

    /// Id of a registered entity.
    pub fn entity_id(&self, name: &str) -> Result<EntityId, ModelError> {
        Ok(self.store.entity_by_name(name)?.id)
    }

    // ── Variables ──────────────────────────────────────────────────

    /// Declare a variable of a population or current source.
    ///
    /// Reduce duplications are reserved for custom-update variables, which
    /// are declared through their model instead.
    pub fn declare_variable(
        &mut self,
        entity: &str,
        namespace: Namespace,
        name: impl Into<String>,
        ty: ScalarType,
        access: VarAccess,
        init: impl Into<VarInit>,
    ) -> Result<VarKey, ModelError> {
        let name = name.into();
        let owner = self.store.entity_by_name(entity)?;
        let (id, kind) = (owner.id, owner.kind());
        if kind == EntityKind::CustomUpdate {
            return Err(ModelError::AccessViolation {
                update: entity.to_string(),
                reference: name,
                reason: "custom update variables are declared by their model".to_string(),
            });
        }
        if access.reduction().is_some() {
            return Err(ModelError::AccessViolation {
                update: entity.to_string(),
                reference: name,
                reason: format!("{access} is only legal on custom update variables"),
            });
        }
        Ok(self
            .store
            .declare_var(id, namespace, name, ty, access, init.into())?)
    }

    // ── Custom updates ─────────────────────────────────────────────

    /// Register a custom update model under its name.
    pub fn add_custom_update_model(&mut self, model: CustomUpdateModel) -> Result<(), ModelError> {
        if self.models.contains_key(model.name()) {
            return Err(ModelError::DuplicateName {
                scope: "custom update model".to_string(),
                name: model.name().to_string(),
            });
        }
        self.models.insert(model.name().to_string(), model);
        Ok(())
    }

    /// Declare a custom update instance.
    ///
    /// References are checked for arity here but resolved at finalize, so
    /// they may name entities registered later.
    pub fn declare_custom_update(&mut self, update: CustomUpdate) -> Result<EntityId, ModelError> {
        let model = self
            .models
            .get(&update.model)
            .ok_or_else(|| ModelError::UnknownModel {
                name: update.model.clone(),
            })?
            .clone();

        let param_names: Vec<&str> = model.params().iter().map(String::as_str).collect();
        let var_names: Vec<&str> = model.vars().iter().map(|v| v.name.as_str()).collect();
        let ref_names: Vec<&str> = model.var_refs().iter().map(|r| r.name.as_str()).collect();
        let params = arrange(&update.name, "params", &param_names, &update.params)?;
        let inits = arrange(&update.name, "vars", &var_names, &update.var_inits)?;
        let refs = arrange(&update.name, "var_refs", &ref_names, &update.var_refs)?;

        let entity = self.store.add_entity(
            update.name.as_str(),
            EntityDetail::CustomUpdate {
                group: update.group.clone(),
                domain: None,
            },
        )?;
        for (decl, init) in model.vars().iter().zip(inits) {
            self.store.declare_var(
                entity,
                Namespace::CustomUpdate,
                decl.name.as_str(),
                decl.ty,
                decl.access,
                init,
            )?;
        }

        self.updates.push(Declared {
            entity,
            params: param_names
                .iter()
                .map(|n| n.to_string())
                .zip(params)
                .collect(),
            name: update.name,
            group: update.group,
            model,
            refs,
        });
        Ok(entity)
    }

    // ── Finalize ───────────────────────────────────────────────────

    /// Finalize with the reference [`CpuBackend`].
    pub fn finalize(self) -> Result<Model, FinalizeError> {
        self.finalize_with_backend(Box::new(CpuBackend::new()))
    }

    /// Resolve every custom update and plan every group.
    ///
    /// Updates are finalized in declaration order, so a reference to
    /// another custom update's variable sees that update's storage only if
    /// it was declared earlier. All errors are collected; no model is
    /// produced if there is any.
    pub fn finalize_with_backend(
        mut self,
        backend: Box<dyn Backend>,
    ) -> Result<Model, FinalizeError> {
        let mut errors = Vec::new();
        let mut resolved: Vec<ResolvedUpdate> = Vec::new();

        for (index, decl) in self.updates.iter().enumerate() {
            // 1. References to custom updates must point backwards.
            let order_errors = self.order_errors(index, decl);
            if !order_errors.is_empty() {
                errors.extend(order_errors);
                continue;
            }
            // 2. Resolve, check access, infer domain, allocate.
            let pending = PendingUpdate {
                entity: decl.entity,
                name: &decl.name,
                group: &decl.group,
                model: &decl.model,
                params: &decl.params,
                refs: &decl.refs,
            };
            match plan_update(&mut self.store, &pending) {
                Ok(update) => {
                    debug!(
                        update = %update.name,
                        kind = ?update.kind,
                        size = update.size(),
                        lanes = update.lanes,
                        "resolved custom update"
                    );
                    resolved.push(update);
                }
                Err(errs) => errors.extend(errs),
            }
        }
        if !errors.is_empty() {
            return Err(FinalizeError { errors });
        }

        // 3. Plan every group in first-declaration order.
        let mut warnings = Vec::new();
        for update in &resolved {
            warnings.extend(update_warnings(update));
        }
        let mut by_group: IndexMap<&str, Vec<(usize, &ResolvedUpdate)>> = IndexMap::new();
        for (index, update) in resolved.iter().enumerate() {
            by_group
                .entry(update.group.as_str())
                .or_default()
                .push((index, update));
        }
        let mut groups = IndexMap::new();
        for (name, members) in by_group {
            let (plan, group_warnings) = plan_group(name, &members);
            debug!(group = name, members = plan.len(), "planned custom update group");
            warnings.extend(group_warnings);
            groups.insert(name.to_string(), plan);
        }
        for warning in &warnings {
            warn!(%warning, "custom update build warning");
        }
        info!(
            groups = groups.len(),
            updates = resolved.len(),
            batch_size = self.config.batch_size,
            backend = backend.name(),
            "model finalized"
        );

        Ok(Model::new(
            self.store, resolved, groups, backend, warnings, self.config.dt,
        ))
    }

    fn order_errors(&self, index: usize, decl: &Declared) -> Vec<ModelError> {
        let mut errors = Vec::new();
        let targets = decl
            .refs
            .iter()
            .flat_map(VarRef::targets)
            .filter(|t| t.namespace == Namespace::CustomUpdate);
        for target in targets {
            let Some(position) = self.updates.iter().position(|u| u.name == target.entity) else {
                continue;
            };
            if position < index {
                continue;
            }
            let referenced = &self.updates[position];
            let error = if referenced.group == decl.group {
                ModelError::OrderViolation {
                    group: decl.group.clone(),
                    update: decl.name.clone(),
                    target: referenced.name.clone(),
                }
            } else {
                ModelError::UnresolvedTarget {
                    update: decl.name.clone(),
                    target: referenced.name.clone(),
                }
            };
            if !errors.contains(&error) {
                errors.push(error);
            }
        }
        errors
    }
}

impl std::fmt::Debug for ModelBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelBuilder")
            .field("config", &self.config)
            .field("store", &self.store)
            .field("models", &self.models.keys().collect::<Vec<_>>())
            .field("updates", &self.updates.len())
            .finish()
    }
}
