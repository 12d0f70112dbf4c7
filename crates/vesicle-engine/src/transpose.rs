//! Transpose engine.
//!
//! For a source population of `num_pre × num_post` dense weights, element
//! `(i, j)` of every lane is written to element `(j, i)` of the target:
//!
//! ```text
//! target[lane][j * num_pre + i] = source[lane][i * num_post + j]
//! ```
//!
//! When the update has code, it runs first and the transposed value is
//! whatever the code left in the source symbol.

use vesicle_core::BackendError;
use vesicle_update::{MemberFrame, ResolvedUpdate};

use crate::kernel::{gather, run_code, scatter};

/// Run a transpose update.
pub(crate) fn run(
    update: &ResolvedUpdate,
    frame: &mut MemberFrame<'_>,
) -> Result<(), BackendError> {
    let binding = update
        .transpose
        .as_ref()
        .ok_or_else(|| BackendError::Device {
            reason: format!("'{}' has no transpose binding", update.name),
        })?;
    let source = &update.symbols[binding.symbol].locator;
    let target = &binding.target;
    let (num_pre, num_post) = (binding.num_pre, binding.num_post);

    let layout = update.env_layout();
    let mut values = vec![0.0; layout.len()];
    let t = frame.time();
    let (inputs, outputs) = frame.split_mut();
    let input = inputs[binding.symbol];

    for lane in 0..update.lanes {
        for element in update.elements.iter() {
            let value = if update.code.is_some() {
                gather(update, inputs, lane, element, &mut values);
                run_code(update, &layout, &mut values, t, lane, element)?;
                scatter(update, &values, outputs, lane, element);
                values[binding.symbol]
            } else {
                input[source.shape.index(lane, element)]
            };
            let (i, j) = (element / num_post, element % num_post);
            if let Some(out) = outputs.get_mut(&target.key) {
                out[target.shape.index(lane, j * num_pre + i)] = value;
            }
        }
    }
    Ok(())
}
