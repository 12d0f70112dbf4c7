//! Reduction engine.
//!
//! Every element of every lane produces one contribution per reduce
//! symbol. Contributions are then combined with [`tree_reduce`]:
//!
//! ```text
//! neuron scope: lane b ── tree_reduce(contrib[b][0..n]) ──► out[b]
//! batch scope:  elem e ── tree_reduce(contrib[0..lanes][e]) ──► out[e]
//! ```
//!
//! The tree has a fixed shape over index order, so the result depends
//! only on the contributions, not on how they were produced.

use vesicle_core::{BackendError, ReduceScope, ReductionOp};
use vesicle_update::{MemberFrame, ResolvedUpdate, SymbolRole};

use crate::kernel::{gather, run_code, scatter};
use crate::scratch::ScratchRegion;

/// Combine `values` pairwise with `op`, doubling the stride each round.
///
/// Overwrites `values`. Returns the operator's identity for an empty slice.
pub fn tree_reduce(op: ReductionOp, values: &mut [f64]) -> f64 {
    let n = values.len();
    if n == 0 {
        return op.identity();
    }
    let mut stride = 1;
    while stride < n {
        let mut i = 0;
        while i + stride < n {
            values[i] = op.combine(values[i], values[i + stride]);
            i += 2 * stride;
        }
        stride *= 2;
    }
    values[0]
}

/// Run a reduction update.
pub(crate) fn run(
    update: &ResolvedUpdate,
    frame: &mut MemberFrame<'_>,
    scratch: &mut ScratchRegion,
) -> Result<(), BackendError> {
    let reduces: Vec<(usize, ReduceScope, ReductionOp)> = update
        .symbols
        .iter()
        .enumerate()
        .filter_map(|(i, s)| match s.role {
            SymbolRole::Reduce { scope, op } => Some((i, scope, op)),
            _ => None,
        })
        .collect();
    let lanes = update.lanes;
    let n = update.elements.len();
    let block = reduces.len() * lanes * n;

    scratch.reserve(block + lanes);
    scratch.reset();
    let buf = scratch
        .alloc(block + lanes)
        .ok_or_else(|| BackendError::Device {
            reason: format!("scratch too small for reduction '{}'", update.name),
        })?;
    let (contrib, column) = buf.split_at_mut(block);

    let layout = update.env_layout();
    let mut values = vec![0.0; layout.len()];
    let t = frame.time();
    let (inputs, outputs) = frame.split_mut();

    for lane in 0..lanes {
        for (k, element) in update.elements.iter().enumerate() {
            gather(update, inputs, lane, element, &mut values);
            run_code(update, &layout, &mut values, t, lane, element)?;
            scatter(update, &values, outputs, lane, element);
            for (r, (symbol, _, _)) in reduces.iter().enumerate() {
                contrib[(r * lanes + lane) * n + k] = values[*symbol];
            }
        }
    }

    for (r, &(symbol, scope, op)) in reduces.iter().enumerate() {
        let locator = &update.symbols[symbol].locator;
        let out = outputs
            .get_mut(&locator.key)
            .ok_or_else(|| BackendError::Device {
                reason: format!("no output for reduction target '{}'", locator.label),
            })?;
        match scope {
            ReduceScope::Neuron => {
                for lane in 0..lanes {
                    let start = (r * lanes + lane) * n;
                    out[locator.shape.index(lane, 0)] =
                        tree_reduce(op, &mut contrib[start..start + n]);
                }
            }
            ReduceScope::Batch => {
                for (k, element) in update.elements.iter().enumerate() {
                    for (lane, slot) in column.iter_mut().enumerate() {
                        *slot = contrib[(r * lanes + lane) * n + k];
                    }
                    out[locator.shape.index(0, element)] = tree_reduce(op, column);
                }
            }
        }
    }
    Ok(())
}
