//! Reference CPU backend.

use vesicle_core::BackendError;
use vesicle_update::{Backend, MemberFrame, ResolvedUpdate, UpdateKind};

use crate::kernel::check_frame;
use crate::scratch::ScratchRegion;
use crate::{elementwise, reduction, transpose};

/// Runs updates sequentially on the calling thread.
///
/// Dispatches on [`UpdateKind`] to the element-wise, reduction and
/// transpose engines. The reduction scratch region grows to the largest
/// reduction launched and is reused afterwards.
#[derive(Debug, Default)]
pub struct CpuBackend {
    scratch: ScratchRegion,
    launches: u64,
}

impl CpuBackend {
    /// Create a backend with an empty scratch region.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of launches performed, successful or not.
    pub fn launches(&self) -> u64 {
        self.launches
    }
}

impl Backend for CpuBackend {
    fn name(&self) -> &str {
        "cpu"
    }

    fn launch(
        &mut self,
        update: &ResolvedUpdate,
        frame: &mut MemberFrame<'_>,
    ) -> Result<(), BackendError> {
        self.launches += 1;
        check_frame(update, frame)?;
        match update.kind {
            UpdateKind::Plain => elementwise::run(update, frame),
            UpdateKind::Reduction => reduction::run(update, frame, &mut self.scratch),
            UpdateKind::Transpose => transpose::run(update, frame),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;
    use std::sync::Arc;
    use vesicle_core::{
        EntityId, Namespace, ReduceScope, ReductionOp, ScalarType, UpdateError, VarAccess, VarKey,
        VarShape,
    };
    use vesicle_store::{ElementSet, UpdateDomain};
    use vesicle_update::{
        SymbolBinding, SymbolRole, TransposeBinding, UpdateCode, UpdateEnv, VarLocator,
    };

    fn code<F>(f: F) -> Option<Arc<dyn UpdateCode>>
    where
        F: Fn(&mut UpdateEnv<'_>) -> Result<(), UpdateError> + Send + Sync + 'static,
    {
        Some(Arc::new(f))
    }

    fn locator(key: u32, shape: VarShape) -> VarLocator {
        VarLocator {
            key: VarKey(key),
            entity: EntityId(0),
            namespace: Namespace::Neuron,
            label: format!("E.v{key}"),
            ty: ScalarType::Double,
            access: VarAccess::READ_WRITE,
            shape,
        }
    }

    fn binding(name: &str, key: u32, shape: VarShape, role: SymbolRole) -> SymbolBinding {
        SymbolBinding {
            name: name.into(),
            locator: locator(key, shape),
            role,
        }
    }

    fn resolved(
        kind: UpdateKind,
        lanes: usize,
        size: usize,
        symbols: Vec<SymbolBinding>,
        code: Option<Arc<dyn UpdateCode>>,
    ) -> ResolvedUpdate {
        ResolvedUpdate {
            entity: EntityId(1),
            name: "U".into(),
            group: "G".into(),
            kind,
            domain: UpdateDomain::Neuron { size },
            lanes,
            elements: ElementSet::All(size),
            symbols,
            transpose: None,
            params: vec![("k".into(), 2.0)],
            code,
        }
    }

    fn outputs_for(update: &ResolvedUpdate, inputs: &[&[f64]]) -> IndexMap<VarKey, Vec<f64>> {
        update
            .writes()
            .into_iter()
            .map(|key| {
                let i = update
                    .symbols
                    .iter()
                    .position(|s| s.locator.key == key)
                    .unwrap();
                (key, inputs[i].to_vec())
            })
            .collect()
    }

    #[test]
    fn plain_update_scales_every_lane() {
        let code = code(|env| {
            let x = env.get("X")?;
            let k = env.param("k")?;
            env.set("X", x * k + env.batch() as f64)
        });
        let update = resolved(
            UpdateKind::Plain,
            2,
            3,
            vec![binding("X", 0, VarShape::new(3, 2), SymbolRole::ReadWrite)],
            code,
        );
        let x = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let inputs = vec![&x[..]];
        let mut frame = MemberFrame::new(inputs.clone(), outputs_for(&update, &inputs), 0.0);
        let mut cpu = CpuBackend::new();
        cpu.launch(&update, &mut frame).unwrap();
        assert_eq!(
            frame.output(VarKey(0)).unwrap(),
            &[2.0, 4.0, 6.0, 9.0, 11.0, 13.0]
        );
        assert_eq!(cpu.launches(), 1);
    }

    #[test]
    fn code_error_is_wrapped() {
        let code = code(|env| env.set("R", 1.0));
        let update = resolved(
            UpdateKind::Plain,
            1,
            2,
            vec![binding("R", 0, VarShape::new(2, 1), SymbolRole::Read)],
            code,
        );
        let r = [0.0, 0.0];
        let mut frame = MemberFrame::new(vec![&r[..]], IndexMap::new(), 0.0);
        let err = CpuBackend::new().launch(&update, &mut frame).unwrap_err();
        assert_eq!(
            err,
            BackendError::Code {
                update: "U".into(),
                source: UpdateError::ReadOnlySymbol { name: "R".into() },
            }
        );
    }

    #[test]
    fn mis_sized_input_rejected() {
        let update = resolved(
            UpdateKind::Plain,
            1,
            4,
            vec![binding("X", 0, VarShape::new(4, 1), SymbolRole::Read)],
            None,
        );
        let short = [0.0; 3];
        let mut frame = MemberFrame::new(vec![&short[..]], IndexMap::new(), 0.0);
        assert!(matches!(
            CpuBackend::new().launch(&update, &mut frame),
            Err(BackendError::Device { .. })
        ));
    }

    #[test]
    fn neuron_reduction_per_lane() {
        let code = code(|env| {
            let x = env.get("X")?;
            env.set("M", x)
        });
        let max = SymbolRole::Reduce {
            scope: ReduceScope::Neuron,
            op: ReductionOp::Max,
        };
        let update = resolved(
            UpdateKind::Reduction,
            2,
            4,
            vec![
                binding("M", 0, VarShape::new(1, 2), max),
                binding("X", 1, VarShape::new(4, 2), SymbolRole::Read),
            ],
            code,
        );
        let m = [0.0, 0.0];
        let x = [1.0, 7.0, 3.0, 2.0, -1.0, -5.0, -2.0, -3.0];
        let inputs = vec![&m[..], &x[..]];
        let mut frame = MemberFrame::new(inputs.clone(), outputs_for(&update, &inputs), 0.0);
        CpuBackend::new().launch(&update, &mut frame).unwrap();
        assert_eq!(frame.output(VarKey(0)).unwrap(), &[7.0, -1.0]);
    }

    #[test]
    fn batch_reduction_per_element() {
        let code = code(|env| {
            let x = env.get("X")?;
            env.set("S", x)
        });
        let sum = SymbolRole::Reduce {
            scope: ReduceScope::Batch,
            op: ReductionOp::Sum,
        };
        let update = resolved(
            UpdateKind::Reduction,
            3,
            2,
            vec![
                binding("S", 0, VarShape::new(2, 1), sum),
                binding("X", 1, VarShape::new(2, 3), SymbolRole::Read),
            ],
            code,
        );
        let s = [9.0, 9.0];
        let x = [1.0, 10.0, 2.0, 20.0, 3.0, 30.0];
        let inputs = vec![&s[..], &x[..]];
        let mut frame = MemberFrame::new(inputs.clone(), outputs_for(&update, &inputs), 0.0);
        CpuBackend::new().launch(&update, &mut frame).unwrap();
        assert_eq!(frame.output(VarKey(0)).unwrap(), &[6.0, 60.0]);
    }

    #[test]
    fn transpose_without_code_mirrors_matrix() {
        let mut update = resolved(
            UpdateKind::Transpose,
            2,
            6,
            vec![binding(
                "variable",
                0,
                VarShape::new(6, 2),
                SymbolRole::Transpose { write_back: false },
            )],
            None,
        );
        update.transpose = Some(TransposeBinding {
            symbol: 0,
            target: locator(1, VarShape::new(6, 2)),
            num_pre: 2,
            num_post: 3,
        });
        // lane 0: [[0,1,2],[3,4,5]], lane 1: +10
        let src: Vec<f64> = (0..6).chain(10..16).map(f64::from).collect();
        let mut outputs = IndexMap::new();
        outputs.insert(VarKey(1), vec![0.0; 12]);
        let mut frame = MemberFrame::new(vec![&src[..]], outputs, 0.0);
        CpuBackend::new().launch(&update, &mut frame).unwrap();
        assert_eq!(
            frame.output(VarKey(1)).unwrap(),
            &[0.0, 3.0, 1.0, 4.0, 2.0, 5.0, 10.0, 13.0, 11.0, 14.0, 12.0, 15.0]
        );
    }
}
