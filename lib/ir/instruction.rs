use crate::ir::{Operand, Type};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single IR instruction.
///
/// The variants form a closed classification: every pointer flow the
/// analysis understands is one of these shapes. Anything a front end
/// cannot express lands in `Other`, which the adapter rejects (or skips,
/// in best-effort mode) when it is pointer-typed.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum Instruction {
    /// Reserve stack storage for a value of type `allocated`. The result
    /// is a pointer to the fresh object.
    Alloca { result: String, allocated: Type },
    /// `result = *address`
    Load {
        result: String,
        ty: Type,
        address: Operand,
    },
    /// `*address = value`
    Store { value: Operand, address: Operand },
    /// `result = value`. Copies, casts, and anything else value-preserving.
    Assign {
        result: String,
        ty: Type,
        value: Operand,
    },
    /// `result = &base[...]`. An address computation into an aggregate.
    /// The field-insensitive model treats the result as aliasing the whole
    /// base object, so this behaves exactly like `Assign` downstream.
    Gep {
        result: String,
        ty: Type,
        base: Operand,
    },
    /// A direct or indirect call. `target` is `Operand::Function` for a
    /// direct call, any pointer-valued operand otherwise.
    Call {
        result: Option<String>,
        ty: Type,
        target: Operand,
        arguments: Vec<Operand>,
    },
    /// Return from the enclosing function.
    Return { value: Option<Operand> },
    /// An instruction outside the closed classification, e.g. inline asm.
    Other {
        mnemonic: String,
        result: Option<String>,
        ty: Type,
        operands: Vec<Operand>,
    },
}

impl Instruction {
    pub fn alloca<S: Into<String>>(result: S, allocated: Type) -> Instruction {
        Instruction::Alloca {
            result: result.into(),
            allocated,
        }
    }

    pub fn load<S: Into<String>>(result: S, ty: Type, address: Operand) -> Instruction {
        Instruction::Load {
            result: result.into(),
            ty,
            address,
        }
    }

    pub fn store(value: Operand, address: Operand) -> Instruction {
        Instruction::Store { value, address }
    }

    pub fn assign<S: Into<String>>(result: S, ty: Type, value: Operand) -> Instruction {
        Instruction::Assign {
            result: result.into(),
            ty,
            value,
        }
    }

    pub fn gep<S: Into<String>>(result: S, ty: Type, base: Operand) -> Instruction {
        Instruction::Gep {
            result: result.into(),
            ty,
            base,
        }
    }

    pub fn call<S: Into<String>>(
        result: Option<S>,
        ty: Type,
        target: Operand,
        arguments: Vec<Operand>,
    ) -> Instruction {
        Instruction::Call {
            result: result.map(|r| r.into()),
            ty,
            target,
            arguments,
        }
    }

    pub fn ret(value: Option<Operand>) -> Instruction {
        Instruction::Return { value }
    }

    pub fn other<S: Into<String>>(
        mnemonic: S,
        result: Option<S>,
        ty: Type,
        operands: Vec<Operand>,
    ) -> Instruction {
        Instruction::Other {
            mnemonic: mnemonic.into(),
            result: result.map(|r| r.into()),
            ty,
            operands,
        }
    }

    /// The name this instruction defines, if any.
    pub fn result(&self) -> Option<&str> {
        match self {
            Instruction::Alloca { result, .. }
            | Instruction::Load { result, .. }
            | Instruction::Assign { result, .. }
            | Instruction::Gep { result, .. } => Some(result),
            Instruction::Call { result, .. } | Instruction::Other { result, .. } => {
                result.as_deref()
            }
            Instruction::Store { .. } | Instruction::Return { .. } => None,
        }
    }

    /// The declared type of this instruction's result, if any. An alloca's
    /// result type is a pointer to its allocated type.
    pub fn result_type(&self) -> Option<Type> {
        match self {
            Instruction::Alloca { allocated, .. } => Some(Type::pointer(allocated.clone())),
            Instruction::Load { ty, .. }
            | Instruction::Assign { ty, .. }
            | Instruction::Gep { ty, .. }
            | Instruction::Other { ty, .. } => Some(ty.clone()),
            Instruction::Call { result, ty, .. } => result.as_ref().map(|_| ty.clone()),
            Instruction::Store { .. } | Instruction::Return { .. } => None,
        }
    }

    pub fn is_call(&self) -> bool {
        matches!(self, Instruction::Call { .. })
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Instruction::Alloca { result, allocated } => {
                write!(f, "%{} = alloca {}", result, allocated)
            }
            Instruction::Load { result, ty, address } => {
                write!(f, "%{} = load {}, {}", result, ty, address)
            }
            Instruction::Store { value, address } => {
                write!(f, "store {}, {}", value, address)
            }
            Instruction::Assign { result, ty, value } => {
                write!(f, "%{} = {} {}", result, ty, value)
            }
            Instruction::Gep { result, ty, base } => {
                write!(f, "%{} = gep {} {}", result, ty, base)
            }
            Instruction::Call {
                result,
                ty,
                target,
                arguments,
            } => {
                if let Some(result) = result {
                    write!(f, "%{} = ", result)?;
                }
                write!(f, "call {} {}(", ty, target)?;
                for (i, argument) in arguments.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", argument)?;
                }
                write!(f, ")")
            }
            Instruction::Return { value } => match value {
                Some(value) => write!(f, "ret {}", value),
                None => write!(f, "ret void"),
            },
            Instruction::Other {
                mnemonic,
                result,
                ty,
                operands,
            } => {
                if let Some(result) = result {
                    write!(f, "%{} = ", result)?;
                }
                write!(f, "{} {}", mnemonic, ty)?;
                for operand in operands {
                    write!(f, " {}", operand)?;
                }
                Ok(())
            }
        }
    }
}
