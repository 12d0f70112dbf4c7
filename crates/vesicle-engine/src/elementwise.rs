//! Element-wise engine for plain custom updates.

use vesicle_core::BackendError;
use vesicle_update::{MemberFrame, ResolvedUpdate};

use crate::kernel::{gather, run_code, scatter};

/// Run `update` independently for every lane and element.
///
/// Each element reads the member's inputs, never values written by other
/// elements of the same launch.
pub(crate) fn run(
    update: &ResolvedUpdate,
    frame: &mut MemberFrame<'_>,
) -> Result<(), BackendError> {
    let layout = update.env_layout();
    let mut values = vec![0.0; layout.len()];
    let t = frame.time();
    let (inputs, outputs) = frame.split_mut();
    for lane in 0..update.lanes {
        for element in update.elements.iter() {
            gather(update, inputs, lane, element, &mut values);
            run_code(update, &layout, &mut values, t, lane, element)?;
            scatter(update, &values, outputs, lane, element);
        }
    }
    Ok(())
}
