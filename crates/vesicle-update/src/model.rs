//! Custom update models and the opaque [`UpdateCode`] trait.
//!
//! A [`CustomUpdateModel`] is an immutable template: parameter names,
//! owned variables, variable-reference parameters and the computation to
//! run per element. Models are built once with
//! [`CustomUpdateModel::builder`] and may be instantiated any number of
//! times.

use std::fmt;
use std::sync::Arc;

use vesicle_core::{ModelError, ScalarType, UpdateError, VarAccess, VarRefAccess};

use crate::env::UpdateEnv;

/// Name of the built-in transpose model.
pub const TRANSPOSE_MODEL: &str = "Transpose";

/// The computation a custom update performs on one element.
///
/// Implementations read and write bound symbols through the
/// [`UpdateEnv`]. The same code runs for every element and batch lane of
/// an update, so it must not depend on call order.
///
/// Closures with the matching signature implement this trait.
pub trait UpdateCode: Send + Sync + 'static {
    /// Run the computation for the element described by `env`.
    fn run(&self, env: &mut UpdateEnv<'_>) -> Result<(), UpdateError>;
}

impl<F> UpdateCode for F
where
    F: Fn(&mut UpdateEnv<'_>) -> Result<(), UpdateError> + Send + Sync + 'static,
{
    fn run(&self, env: &mut UpdateEnv<'_>) -> Result<(), UpdateError> {
        self(env)
    }
}

/// An owned variable declared by a model.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VarDecl {
    /// Symbol name.
    pub name: String,
    /// Declared type.
    pub ty: ScalarType,
    /// Access and duplication of the owned storage.
    pub access: VarAccess,
}

/// A variable-reference parameter declared by a model.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VarRefDecl {
    /// Symbol name.
    pub name: String,
    /// Type the referenced variable must have.
    pub ty: ScalarType,
    /// Access requested on the referenced variable.
    pub access: VarRefAccess,
}

/// An immutable custom update template.
#[derive(Clone)]
pub struct CustomUpdateModel {
    name: String,
    params: Vec<String>,
    vars: Vec<VarDecl>,
    var_refs: Vec<VarRefDecl>,
    code: Option<Arc<dyn UpdateCode>>,
}

impl CustomUpdateModel {
    /// Start building a model.
    pub fn builder(name: impl Into<String>) -> CustomUpdateModelBuilder {
        CustomUpdateModelBuilder {
            name: name.into(),
            params: Vec::new(),
            vars: Vec::new(),
            var_refs: Vec::new(),
            code: None,
        }
    }

    /// The built-in transpose model: one read-write scalar reference named
    /// `variable` and no code, so each value is copied unchanged.
    pub fn transpose() -> Self {
        Self {
            name: TRANSPOSE_MODEL.to_string(),
            params: Vec::new(),
            vars: Vec::new(),
            var_refs: vec![VarRefDecl {
                name: "variable".to_string(),
                ty: ScalarType::Scalar,
                access: VarRefAccess::ReadWrite,
            }],
            code: None,
        }
    }

    /// Model name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parameter names.
    pub fn params(&self) -> &[String] {
        &self.params
    }

    /// Owned variables.
    pub fn vars(&self) -> &[VarDecl] {
        &self.vars
    }

    /// Variable-reference parameters.
    pub fn var_refs(&self) -> &[VarRefDecl] {
        &self.var_refs
    }

    /// The per-element computation, if any.
    pub fn code(&self) -> Option<&Arc<dyn UpdateCode>> {
        self.code.as_ref()
    }
}

impl fmt::Debug for CustomUpdateModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomUpdateModel")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("vars", &self.vars)
            .field("var_refs", &self.var_refs)
            .field("has_code", &self.code.is_some())
            .finish()
    }
}

/// Builder for [`CustomUpdateModel`].
pub struct CustomUpdateModelBuilder {
    name: String,
    params: Vec<String>,
    vars: Vec<VarDecl>,
    var_refs: Vec<VarRefDecl>,
    code: Option<Arc<dyn UpdateCode>>,
}

impl CustomUpdateModelBuilder {
    /// Declare a numeric parameter.
    pub fn param(mut self, name: impl Into<String>) -> Self {
        self.params.push(name.into());
        self
    }

    /// Declare an owned variable.
    pub fn var(mut self, name: impl Into<String>, ty: ScalarType, access: VarAccess) -> Self {
        self.vars.push(VarDecl {
            name: name.into(),
            ty,
            access,
        });
        self
    }

    /// Declare a variable-reference parameter.
    pub fn var_ref(
        mut self,
        name: impl Into<String>,
        ty: ScalarType,
        access: VarRefAccess,
    ) -> Self {
        self.var_refs.push(VarRefDecl {
            name: name.into(),
            ty,
            access,
        });
        self
    }

    /// Set the per-element computation.
    pub fn code<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut UpdateEnv<'_>) -> Result<(), UpdateError> + Send + Sync + 'static,
    {
        self.code = Some(Arc::new(f));
        self
    }

    /// Set the per-element computation from a shared implementation.
    pub fn code_object(mut self, code: Arc<dyn UpdateCode>) -> Self {
        self.code = Some(code);
        self
    }

    /// Finish the model.
    ///
    /// Fails with [`ModelError::DuplicateName`] if two symbols share a
    /// name: parameters, owned variables and references form one
    /// namespace inside the update code.
    pub fn build(self) -> Result<CustomUpdateModel, ModelError> {
        let mut seen: Vec<&str> = Vec::new();
        let names = self
            .params
            .iter()
            .map(String::as_str)
            .chain(self.vars.iter().map(|v| v.name.as_str()))
            .chain(self.var_refs.iter().map(|r| r.name.as_str()));
        for name in names {
            if seen.contains(&name) {
                return Err(ModelError::DuplicateName {
                    scope: format!("model '{}'", self.name),
                    name: name.to_string(),
                });
            }
            seen.push(name);
        }
        Ok(CustomUpdateModel {
            name: self.name,
            params: self.params,
            vars: self.vars,
            var_refs: self.var_refs,
            code: self.code,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_collects_declarations() {
        let model = CustomUpdateModel::builder("Scale")
            .param("factor")
            .var("V", ScalarType::Scalar, VarAccess::READ_WRITE)
            .var_ref("R", ScalarType::Scalar, VarRefAccess::ReadWrite)
            .code(|env| {
                let r = env.get("R")?;
                env.set("R", r * env.param("factor")?)
            })
            .build()
            .unwrap();
        assert_eq!(model.name(), "Scale");
        assert_eq!(model.params(), ["factor".to_string()]);
        assert_eq!(model.vars().len(), 1);
        assert_eq!(model.var_refs()[0].access, VarRefAccess::ReadWrite);
        assert!(model.code().is_some());
    }

    #[test]
    fn clashing_symbol_names_rejected() {
        let err = CustomUpdateModel::builder("Bad")
            .var("X", ScalarType::Scalar, VarAccess::READ_WRITE)
            .var_ref("X", ScalarType::Scalar, VarRefAccess::ReadOnly)
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            ModelError::DuplicateName {
                scope: "model 'Bad'".into(),
                name: "X".into(),
            }
        );
    }

    #[test]
    fn transpose_model_has_single_read_write_ref() {
        let model = CustomUpdateModel::transpose();
        assert_eq!(model.name(), TRANSPOSE_MODEL);
        assert!(model.vars().is_empty());
        assert_eq!(model.var_refs().len(), 1);
        assert_eq!(model.var_refs()[0].name, "variable");
        assert_eq!(model.var_refs()[0].access, VarRefAccess::ReadWrite);
        assert!(model.code().is_none());
    }

    #[test]
    fn debug_hides_code() {
        let model = CustomUpdateModel::builder("Noop").code(|_| Ok(())).build().unwrap();
        let s = format!("{model:?}");
        assert!(s.contains("has_code: true"));
    }
}
