use serde::{Deserialize, Serialize};
use std::fmt;

/// An operand of an instruction.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum Operand {
    /// A value defined within the enclosing function: an instruction
    /// result or a formal parameter.
    Local(String),
    /// The address of a module-level global's storage.
    Global(String),
    /// A function symbol. As a direct call target this names the callee;
    /// anywhere else it takes the function's address.
    Function(String),
    /// The null pointer. Points at nothing; emits no constraints.
    Null,
}

impl Operand {
    pub fn local<S: Into<String>>(name: S) -> Operand {
        Operand::Local(name.into())
    }

    pub fn global<S: Into<String>>(name: S) -> Operand {
        Operand::Global(name.into())
    }

    pub fn function<S: Into<String>>(name: S) -> Operand {
        Operand::Function(name.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Operand::Null)
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Operand::Local(name) => write!(f, "%{}", name),
            Operand::Global(name) => write!(f, "@{}", name),
            Operand::Function(name) => write!(f, "${}", name),
            Operand::Null => write!(f, "null"),
        }
    }
}
