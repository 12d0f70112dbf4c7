//! Staged group execution.
//!
//! A group invocation runs every member against a staging overlay:
//!
//! ```text
//! for each member (declaration order):
//!   inputs  ← staged[key] if an earlier member wrote key, else store
//!   outputs ← copy of the same state, one buffer per written key
//!   backend.launch(update, frame)
//!   staged[key] ← quantized outputs
//! commit staged → store           (only if every member succeeded)
//! ```
//!
//! Nothing reaches the store until every member has succeeded, so a
//! failed invocation leaves the store exactly as it was.

use std::time::Instant;

use indexmap::IndexMap;
use tracing::{trace, warn};
use vesicle_core::{BackendError, InvokeError, VarKey};
use vesicle_store::VariableStore;
use vesicle_update::{Backend, GroupPlan, MemberFrame, ReadSource, ResolvedUpdate};

use crate::metrics::InvokeMetrics;

/// Staged buffers of one invocation, keyed by variable.
type Staging = IndexMap<VarKey, Vec<f64>>;

fn read<'a>(
    store: &'a VariableStore,
    staged: &'a Staging,
    plan: &GroupPlan,
    position: usize,
    key: VarKey,
) -> Result<&'a [f64], BackendError> {
    let staged_value = match plan.source(position, key) {
        Some(ReadSource::Staged { .. }) => staged.get(&key).map(Vec::as_slice),
        _ => None,
    };
    match staged_value {
        Some(data) => Ok(data),
        None => store.view(key).map_err(|e| BackendError::Device {
            reason: e.to_string(),
        }),
    }
}

/// Outputs must cover exactly the variables the member writes, at full
/// extent, before they are staged.
fn check_outputs(
    store: &VariableStore,
    writes: &[VarKey],
    outputs: &Staging,
) -> Result<(), BackendError> {
    if outputs.len() != writes.len() {
        return Err(BackendError::Device {
            reason: format!(
                "backend returned {} output buffers, expected {}",
                outputs.len(),
                writes.len()
            ),
        });
    }
    for key in writes {
        let expected = store.shape(*key).map(|s| s.len());
        let found = outputs.get(key).map(Vec::len);
        if expected.is_none() || expected != found {
            return Err(BackendError::Device {
                reason: format!("output for '{}' has the wrong length", store.describe(*key)),
            });
        }
    }
    Ok(())
}

/// Run one group invocation and commit its result.
///
/// `updates` is the model's full update list; `plan` addresses it by index.
pub(crate) fn execute_group(
    store: &mut VariableStore,
    updates: &[ResolvedUpdate],
    plan: &GroupPlan,
    backend: &mut dyn Backend,
    time: f64,
) -> Result<InvokeMetrics, InvokeError> {
    let start = Instant::now();
    let group = plan.name();
    let mut staged = Staging::new();
    let mut member_us = Vec::with_capacity(plan.len());

    for (position, &index) in plan.members().iter().enumerate() {
        let Some(update) = updates.get(index) else {
            return Err(InvokeError::BackendExecutionFailure {
                group: group.to_string(),
                update: format!("#{index}"),
                source: BackendError::Device {
                    reason: format!("group refers to unknown update #{index}"),
                },
            });
        };
        let failure = |source: BackendError| InvokeError::BackendExecutionFailure {
            group: group.to_string(),
            update: update.name.clone(),
            source,
        };
        let member_start = Instant::now();
        let writes = plan.writes_for(position);

        // 1. Build the frame from the overlay.
        let outputs = {
            let inputs = update
                .symbols
                .iter()
                .map(|s| read(store, &staged, plan, position, s.locator.key))
                .collect::<Result<Vec<_>, _>>()
                .map_err(failure)?;
            let seeded = writes
                .iter()
                .map(|&key| read(store, &staged, plan, position, key).map(|d| (key, d.to_vec())))
                .collect::<Result<Staging, _>>()
                .map_err(failure)?;
            let mut frame = MemberFrame::new(inputs, seeded, time);

            // 2. Launch. A failure abandons everything staged so far.
            trace!(group, update = %update.name, backend = backend.name(), "launching member");
            if let Err(source) = backend.launch(update, &mut frame) {
                warn!(
                    group,
                    update = %update.name,
                    error = %source,
                    staged = staged.len(),
                    "member failed, group invocation discarded"
                );
                return Err(failure(source));
            }
            frame.into_outputs()
        };

        // 3. Quantize and stage.
        check_outputs(store, writes, &outputs).map_err(failure)?;
        for (key, mut data) in outputs {
            if let Some(ty) = store.resolved_type(key) {
                for value in &mut data {
                    *value = ty.quantize(*value);
                }
            }
            staged.insert(key, data);
        }
        member_us.push((update.name.clone(), member_start.elapsed().as_micros() as u64));
    }

    // 4. Commit. Every buffer was length-checked when it was staged.
    let commit_start = Instant::now();
    let committed_vars = staged.len();
    for (key, data) in staged {
        store
            .commit(key, data)
            .map_err(|e| InvokeError::BackendExecutionFailure {
                group: group.to_string(),
                update: String::new(),
                source: BackendError::Device {
                    reason: e.to_string(),
                },
            })?;
    }
    let commit_us = commit_start.elapsed().as_micros() as u64;

    Ok(InvokeMetrics {
        total_us: start.elapsed().as_micros() as u64,
        member_us,
        commit_us,
        committed_vars,
    })
}
