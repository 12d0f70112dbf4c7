//! Per-element symbol environment handed to update code.

use vesicle_core::UpdateError;

/// One symbol bound in an [`UpdateEnv`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnvSymbol {
    /// Name the update code uses.
    pub name: String,
    /// Whether the code may assign it.
    pub writable: bool,
}

/// The values an update's code sees while processing one element.
///
/// Symbols are positional: `values[i]` holds the current value of
/// `symbols[i]`. The caller gathers values before [`UpdateCode::run`]
/// and scatters writable ones back afterwards.
///
/// [`UpdateCode::run`]: crate::model::UpdateCode::run
pub struct UpdateEnv<'a> {
    symbols: &'a [EnvSymbol],
    values: &'a mut [f64],
    params: &'a [(String, f64)],
    t: f64,
    id: usize,
    batch: usize,
}

impl<'a> UpdateEnv<'a> {
    /// Create an environment over gathered `values`.
    ///
    /// `values` must be as long as `symbols`.
    pub fn new(
        symbols: &'a [EnvSymbol],
        values: &'a mut [f64],
        params: &'a [(String, f64)],
        t: f64,
        id: usize,
        batch: usize,
    ) -> Self {
        debug_assert_eq!(symbols.len(), values.len());
        Self {
            symbols,
            values,
            params,
            t,
            id,
            batch,
        }
    }

    /// Current value of a bound symbol.
    pub fn get(&self, name: &str) -> Result<f64, UpdateError> {
        let i = self.position(name)?;
        Ok(self.values[i])
    }

    /// Assign a writable symbol.
    pub fn set(&mut self, name: &str, value: f64) -> Result<(), UpdateError> {
        let i = self.position(name)?;
        if !self.symbols[i].writable {
            return Err(UpdateError::ReadOnlySymbol {
                name: name.to_string(),
            });
        }
        self.values[i] = value;
        Ok(())
    }

    /// Value of a model parameter.
    pub fn param(&self, name: &str) -> Result<f64, UpdateError> {
        self.params
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
            .ok_or_else(|| UpdateError::UnknownSymbol {
                name: name.to_string(),
            })
    }

    /// Simulation time.
    pub fn t(&self) -> f64 {
        self.t
    }

    /// Index of the element being processed.
    pub fn id(&self) -> usize {
        self.id
    }

    /// Batch lane being processed.
    pub fn batch(&self) -> usize {
        self.batch
    }

    fn position(&self, name: &str) -> Result<usize, UpdateError> {
        self.symbols
            .iter()
            .position(|s| s.name == name)
            .ok_or_else(|| UpdateError::UnknownSymbol {
                name: name.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn symbols() -> Vec<EnvSymbol> {
        vec![
            EnvSymbol {
                name: "V".into(),
                writable: true,
            },
            EnvSymbol {
                name: "R".into(),
                writable: false,
            },
        ]
    }

    #[test]
    fn get_and_set_by_name() {
        let syms = symbols();
        let mut values = [1.0, 2.0];
        let params = [("k".to_string(), 3.0)];
        let mut env = UpdateEnv::new(&syms, &mut values, &params, 5.0, 7, 1);
        assert_eq!(env.get("R").unwrap(), 2.0);
        env.set("V", 9.0).unwrap();
        assert_eq!(env.param("k").unwrap(), 3.0);
        assert_eq!((env.t(), env.id(), env.batch()), (5.0, 7, 1));
        assert_eq!(values, [9.0, 2.0]);
    }

    #[test]
    fn read_only_symbol_rejects_writes() {
        let syms = symbols();
        let mut values = [0.0, 0.0];
        let mut env = UpdateEnv::new(&syms, &mut values, &[], 0.0, 0, 0);
        assert_eq!(
            env.set("R", 1.0),
            Err(UpdateError::ReadOnlySymbol { name: "R".into() })
        );
    }

    #[test]
    fn unknown_names_reported() {
        let syms = symbols();
        let mut values = [0.0, 0.0];
        let env = UpdateEnv::new(&syms, &mut values, &[], 0.0, 0, 0);
        assert!(matches!(env.get("Q"), Err(UpdateError::UnknownSymbol { .. })));
        assert!(matches!(env.param("k"), Err(UpdateError::UnknownSymbol { .. })));
    }
}
