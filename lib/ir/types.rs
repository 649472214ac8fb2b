use serde::{Deserialize, Serialize};
use std::fmt;

/// A declared type in the IR.
///
/// The analysis only ever asks two questions of a type: is it (or does it
/// contain) a pointer, and what does a pointer point at. Everything else is
/// carried for reporting.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum Type {
    Void,
    Integer { bits: usize },
    Pointer(Box<Type>),
    Function { return_type: Box<Type>, parameters: Vec<Type> },
    Struct(Vec<Type>),
    Array { element: Box<Type>, length: usize },
}

impl Type {
    pub fn integer(bits: usize) -> Type {
        Type::Integer { bits }
    }

    pub fn pointer(pointee: Type) -> Type {
        Type::Pointer(Box::new(pointee))
    }

    pub fn function(return_type: Type, parameters: Vec<Type>) -> Type {
        Type::Function {
            return_type: Box::new(return_type),
            parameters,
        }
    }

    pub fn array(element: Type, length: usize) -> Type {
        Type::Array {
            element: Box::new(element),
            length,
        }
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self, Type::Pointer(_))
    }

    /// True if a value of this type may carry a pointer, directly or inside
    /// an aggregate. Under the field-insensitive model a struct or array
    /// with any pointer member is treated as pointer-relevant as a whole.
    pub fn is_pointer_bearing(&self) -> bool {
        match self {
            Type::Void | Type::Integer { .. } => false,
            Type::Pointer(_) | Type::Function { .. } => true,
            Type::Struct(members) => members.iter().any(Type::is_pointer_bearing),
            Type::Array { element, .. } => element.is_pointer_bearing(),
        }
    }

    /// The pointed-at type, if this is a pointer.
    pub fn pointee(&self) -> Option<&Type> {
        match self {
            Type::Pointer(pointee) => Some(pointee),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Type::Void => write!(f, "void"),
            Type::Integer { bits } => write!(f, "i{}", bits),
            Type::Pointer(pointee) => write!(f, "{}*", pointee),
            Type::Function {
                return_type,
                parameters,
            } => {
                write!(f, "{}(", return_type)?;
                for (i, parameter) in parameters.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", parameter)?;
                }
                write!(f, ")")
            }
            Type::Struct(members) => {
                write!(f, "{{")?;
                for (i, member) in members.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", member)?;
                }
                write!(f, "}}")
            }
            Type::Array { element, length } => write!(f, "[{} x {}]", length, element),
        }
    }
}
