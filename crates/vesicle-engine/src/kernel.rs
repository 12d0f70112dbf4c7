//! Element-level helpers shared by the CPU engines.
//!
//! Every engine walks `(lane, element)` pairs and, for each pair, gathers
//! symbol values from the frame inputs, runs the update code, then
//! scatters assignable symbols into the frame outputs.

use indexmap::IndexMap;
use vesicle_core::{BackendError, VarKey};
use vesicle_update::{EnvSymbol, MemberFrame, ResolvedUpdate, SymbolRole, UpdateEnv};

/// Check that `frame` carries one correctly sized input per symbol and one
/// correctly sized output per written variable.
///
/// After this passes, indexing inputs and outputs with the shapes of
/// `update` cannot go out of bounds.
pub(crate) fn check_frame(
    update: &ResolvedUpdate,
    frame: &MemberFrame<'_>,
) -> Result<(), BackendError> {
    for (i, symbol) in update.symbols.iter().enumerate() {
        let expected = symbol.locator.shape.len();
        match frame.input(i) {
            Some(buf) if buf.len() == expected => {}
            Some(buf) => {
                return Err(BackendError::Device {
                    reason: format!(
                        "input '{}' of '{}' has {} values, expected {expected}",
                        symbol.name,
                        update.name,
                        buf.len()
                    ),
                });
            }
            None => {
                return Err(BackendError::Device {
                    reason: format!("input '{}' of '{}' is missing", symbol.name, update.name),
                });
            }
        }
    }
    let locators = update
        .symbols
        .iter()
        .map(|s| &s.locator)
        .chain(update.transpose.as_ref().map(|t| &t.target));
    for key in update.writes() {
        let expected = locators
            .clone()
            .find(|loc| loc.key == key)
            .map(|loc| loc.shape.len());
        match (frame.output(key), expected) {
            (Some(buf), Some(len)) if buf.len() == len => {}
            _ => {
                return Err(BackendError::Device {
                    reason: format!(
                        "output var#{key} of '{}' is missing or mis-sized",
                        update.name
                    ),
                });
            }
        }
    }
    Ok(())
}

/// Load the value of every symbol at `(lane, element)`.
///
/// Reduce symbols start at their operator's identity.
pub(crate) fn gather(
    update: &ResolvedUpdate,
    inputs: &[&[f64]],
    lane: usize,
    element: usize,
    values: &mut [f64],
) {
    for ((symbol, input), value) in update.symbols.iter().zip(inputs).zip(values.iter_mut()) {
        *value = match symbol.role {
            SymbolRole::Reduce { op, .. } => op.identity(),
            _ => input[symbol.locator.shape.index(lane, element)],
        };
    }
}

/// Run the update's code, if it has any, over gathered `values`.
pub(crate) fn run_code(
    update: &ResolvedUpdate,
    layout: &[EnvSymbol],
    values: &mut [f64],
    t: f64,
    lane: usize,
    element: usize,
) -> Result<(), BackendError> {
    let Some(code) = &update.code else {
        return Ok(());
    };
    let mut env = UpdateEnv::new(layout, values, &update.params, t, element, lane);
    code.run(&mut env).map_err(|source| BackendError::Code {
        update: update.name.clone(),
        source,
    })
}

/// Store assignable, non-reduce symbols at `(lane, element)`.
pub(crate) fn scatter(
    update: &ResolvedUpdate,
    values: &[f64],
    outputs: &mut IndexMap<VarKey, Vec<f64>>,
    lane: usize,
    element: usize,
) {
    for (symbol, value) in update.symbols.iter().zip(values) {
        let writes = match symbol.role {
            SymbolRole::ReadWrite => true,
            SymbolRole::Transpose { write_back } => write_back,
            SymbolRole::Read | SymbolRole::Reduce { .. } => false,
        };
        if !writes {
            continue;
        }
        if let Some(buf) = outputs.get_mut(&symbol.locator.key) {
            buf[symbol.locator.shape.index(lane, element)] = *value;
        }
    }
}
