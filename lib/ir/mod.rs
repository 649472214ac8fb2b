//! The pointsto intermediate representation.
//!
//! This IR is the input boundary of the analysis: an external front end
//! lowers its program into these types, and the analysis consumes them
//! read-only. The IR is deliberately small. It captures exactly the
//! shapes pointer analysis cares about:
//!
//! * `Alloca` creates an abstract stack object and yields its address.
//! * `Load`/`Store` move values through one level of indirection.
//! * `Assign`/`Gep` copy pointers (casts and aggregate offsets collapse
//!   to copies under the field-insensitive model).
//! * `Call`/`Return` move pointers across function boundaries, directly
//!   or through a function pointer.
//!
//! Instructions appear in program order within a function. There is no
//! control flow graph: the analysis is flow-insensitive, so order only
//! matters for reporting.
//!
//! A global's name used as an operand denotes the *address* of that
//! global's storage, as in LLVM. Likewise a function's name used
//! anywhere other than a direct call target takes the function's
//! address.

mod function;
mod global;
mod instruction;
mod module;
mod operand;
mod types;

pub use self::function::{Function, Parameter};
pub use self::global::Global;
pub use self::instruction::Instruction;
pub use self::module::Module;
pub use self::operand::Operand;
pub use self::types::Type;
