use crate::ir::{Instruction, Type};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A formal parameter.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct Parameter {
    name: String,
    ty: Type,
}

impl Parameter {
    pub fn new<S: Into<String>>(name: S, ty: Type) -> Parameter {
        Parameter {
            name: name.into(),
            ty,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> &Type {
        &self.ty
    }
}

/// A function and its instructions in program order.
///
/// There is no control flow graph here. The analysis is flow-insensitive,
/// so a flat instruction list carries everything it needs.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Function {
    name: String,
    parameters: Vec<Parameter>,
    return_type: Type,
    instructions: Vec<Instruction>,
}

impl Function {
    pub fn new<S: Into<String>>(
        name: S,
        parameters: Vec<Parameter>,
        return_type: Type,
    ) -> Function {
        Function {
            name: name.into(),
            parameters,
            return_type,
            instructions: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn return_type(&self) -> &Type {
        &self.return_type
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Append an instruction.
    pub fn push(&mut self, instruction: Instruction) {
        self.instructions.push(instruction);
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "fn {}(", self.name)?;
        for (i, parameter) in self.parameters.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "%{}: {}", parameter.name(), parameter.ty())?;
        }
        writeln!(f, ") -> {} {{", self.return_type)?;
        for instruction in &self.instructions {
            writeln!(f, "  {}", instruction)?;
        }
        write!(f, "}}")
    }
}
