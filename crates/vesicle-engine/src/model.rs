//! The finalized, runnable model.

use indexmap::IndexMap;
use vesicle_core::{InvokeError, Namespace, VarShape};
use vesicle_store::{StoreError, VariableStore};
use vesicle_update::{Backend, BuildWarning, GroupPlan, ResolvedUpdate};

use crate::exec::execute_group;
use crate::metrics::InvokeMetrics;

// Compile-time assertion: Model must be Send so it can move between threads.
// Fails to compile if any field is !Send.
const _: () = {
    #[allow(dead_code)]
    fn assert_send<T: Send>() {}
    #[allow(dead_code)]
    fn check() {
        assert_send::<Model>();
    }
};

/// A finalized model: resolved custom updates, planned groups, variable
/// storage and a simulation clock.
///
/// Produced by [`ModelBuilder::finalize`](crate::ModelBuilder::finalize).
/// The structure is frozen; only variable values and the clock change.
pub struct Model {
    store: VariableStore,
    updates: Vec<ResolvedUpdate>,
    groups: IndexMap<String, GroupPlan>,
    invocations: IndexMap<String, u64>,
    backend: Box<dyn Backend>,
    warnings: Vec<BuildWarning>,
    dt: f64,
    timestep: u64,
    last_metrics: InvokeMetrics,
}

impl Model {
    pub(crate) fn new(
        store: VariableStore,
        updates: Vec<ResolvedUpdate>,
        groups: IndexMap<String, GroupPlan>,
        backend: Box<dyn Backend>,
        warnings: Vec<BuildWarning>,
        dt: f64,
    ) -> Self {
        let invocations = groups.keys().map(|name| (name.clone(), 0)).collect();
        Self {
            store,
            updates,
            groups,
            invocations,
            backend,
            warnings,
            dt,
            timestep: 0,
            last_metrics: InvokeMetrics::default(),
        }
    }

    // ── Invocation ─────────────────────────────────────────────────

    /// Run every member of `group` as one atomic step.
    ///
    /// Members run in declaration order; each sees the values written by
    /// the members before it. If any member fails, nothing is committed
    /// and the error is returned unmodified.
    pub fn invoke_group(&mut self, group: &str) -> Result<InvokeMetrics, InvokeError> {
        let plan = self
            .groups
            .get(group)
            .ok_or_else(|| InvokeError::UnknownGroup {
                name: group.to_string(),
            })?;
        let time = self.time();
        let metrics = execute_group(
            &mut self.store,
            &self.updates,
            plan,
            self.backend.as_mut(),
            time,
        )?;
        if let Some(count) = self.invocations.get_mut(group) {
            *count += 1;
        }
        self.last_metrics = metrics.clone();
        Ok(metrics)
    }

    /// Advance the clock by one timestep.
    pub fn step_time(&mut self) {
        self.timestep += 1;
    }

    /// Timesteps taken so far.
    pub fn timestep(&self) -> u64 {
        self.timestep
    }

    /// Current simulation time, `timestep × dt`.
    pub fn time(&self) -> f64 {
        self.timestep as f64 * self.dt
    }

    /// Timestep length.
    pub fn dt(&self) -> f64 {
        self.dt
    }

    // ── Host access ────────────────────────────────────────────────

    /// Copy a variable's full extent out of the model.
    pub fn pull_var(
        &self,
        entity: &str,
        namespace: Namespace,
        name: &str,
    ) -> Result<Vec<f64>, StoreError> {
        let key = self.store.lookup(entity, namespace, name)?;
        self.store.pull(key)
    }

    /// Borrow a variable's full extent.
    pub fn var_view(
        &self,
        entity: &str,
        namespace: Namespace,
        name: &str,
    ) -> Result<&[f64], StoreError> {
        let key = self.store.lookup(entity, namespace, name)?;
        self.store.view(key)
    }

    /// Overwrite a variable's full extent. Values are quantized to the
    /// variable's type.
    pub fn push_var(
        &mut self,
        entity: &str,
        namespace: Namespace,
        name: &str,
        values: &[f64],
    ) -> Result<(), StoreError> {
        let key = self.store.lookup(entity, namespace, name)?;
        self.store.push(key, values)
    }

    /// Storage shape of a variable.
    pub fn var_shape(
        &self,
        entity: &str,
        namespace: Namespace,
        name: &str,
    ) -> Result<VarShape, StoreError> {
        let key = self.store.lookup(entity, namespace, name)?;
        self.store.shape(key).ok_or_else(|| StoreError::NotAllocated {
            entity: entity.to_string(),
            name: name.to_string(),
        })
    }

    /// The variable store.
    pub fn store(&self) -> &VariableStore {
        &self.store
    }

    // ── Introspection ──────────────────────────────────────────────

    /// Warnings found at finalize.
    pub fn warnings(&self) -> &[BuildWarning] {
        &self.warnings
    }

    /// Group names, in first-declaration order.
    pub fn group_names(&self) -> Vec<&str> {
        self.groups.keys().map(String::as_str).collect()
    }

    /// Member names of `group`, in execution order.
    pub fn group_members(&self, group: &str) -> Option<Vec<&str>> {
        let plan = self.groups.get(group)?;
        Some(
            plan.members()
                .iter()
                .filter_map(|&i| self.updates.get(i))
                .map(|u| u.name.as_str())
                .collect(),
        )
    }

    /// Resolved form of a custom update.
    pub fn update(&self, name: &str) -> Option<&ResolvedUpdate> {
        self.updates.iter().find(|u| u.name == name)
    }

    /// Successful invocations of `group` so far.
    pub fn invocation_count(&self, group: &str) -> Option<u64> {
        self.invocations.get(group).copied()
    }

    /// Metrics of the most recent successful invocation.
    pub fn last_metrics(&self) -> &InvokeMetrics {
        &self.last_metrics
    }

    /// Lanes of batch-duplicated storage.
    pub fn batch_size(&self) -> usize {
        self.store.batch_size()
    }

    /// Name of the backend executing updates.
    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }
}

impl std::fmt::Debug for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Model")
            .field("store", &self.store)
            .field("updates", &self.updates.len())
            .field("groups", &self.groups.keys().collect::<Vec<_>>())
            .field("backend", &self.backend.name())
            .field("timestep", &self.timestep)
            .finish()
    }
}
