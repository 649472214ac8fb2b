use crate::ir::{Operand, Type};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A module-level global variable.
///
/// The global's name used as an operand denotes the address of this
/// storage. A pointer-typed initializer behaves like a store into the
/// storage performed before the program runs.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Global {
    name: String,
    ty: Type,
    initializer: Option<Operand>,
}

impl Global {
    pub fn new<S: Into<String>>(name: S, ty: Type, initializer: Option<Operand>) -> Global {
        Global {
            name: name.into(),
            ty,
            initializer,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> &Type {
        &self.ty
    }

    pub fn initializer(&self) -> Option<&Operand> {
        self.initializer.as_ref()
    }
}

impl fmt::Display for Global {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "@{}: {}", self.name, self.ty)?;
        if let Some(initializer) = &self.initializer {
            write!(f, " = {}", initializer)?;
        }
        Ok(())
    }
}
