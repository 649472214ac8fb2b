//! Pointsto is a library for whole-program, inclusion-based points-to
//! analysis over a small, well-defined intermediate representation.
//!
//! A front end lowers its program into the [`ir`] module's types. The
//! [`analysis`] module turns that module into a constraint graph and solves
//! it to a least fixpoint, Andersen-style. The solved [`analysis::Solution`]
//! answers points-to, pointed-by, and may-alias queries.
//!
//! ```
//! use pointsto::analysis;
//! use pointsto::ir;
//!
//! let mut function = ir::Function::new("main", Vec::new(), ir::Type::Void);
//! function.push(ir::Instruction::alloca("x", ir::Type::integer(32)));
//! function.push(ir::Instruction::assign(
//!     "p",
//!     ir::Type::pointer(ir::Type::integer(32)),
//!     ir::Operand::local("x"),
//! ));
//!
//! let mut module = ir::Module::new("example");
//! module.add_function(function);
//!
//! let solution = analysis::points_to_analysis(&module).unwrap();
//! let p = solution
//!     .value_node_id(&analysis::ValueRef::local("main", "p"))
//!     .unwrap();
//! assert_eq!(solution.points_to(p).unwrap().len(), 1);
//! ```

pub mod analysis;
pub mod ir;
#[cfg(test)]
mod tests;

pub mod error {
    use crate::analysis::NodeId;
    use thiserror::Error;

    /// Everything that can go wrong while adapting, building, or solving.
    #[derive(Clone, Debug, Error, Eq, PartialEq)]
    pub enum Error {
        /// The IR adapter could not classify a pointer-relevant instruction.
        #[error("unsupported construct in function {function}: {reason}")]
        UnsupportedConstruct { function: String, reason: String },

        /// A query or constraint referenced a node id that was never
        /// interned. Always a caller bug.
        #[error("unknown node id {0}")]
        UnknownNode(NodeId),

        /// A query was issued before the solver ran to completion, or after
        /// a canceled run.
        #[error("analysis has not been solved")]
        NotSolved,

        /// The caller's cancel token was set; the run's partial results are
        /// unsound and have been discarded.
        #[error("solver canceled before reaching a fixpoint")]
        Canceled,

        /// The caller-imposed step budget ran out before the fixpoint.
        #[error("solver step budget exhausted after {steps} steps")]
        BudgetExhausted { steps: u64 },

        /// The input module is ill-formed, e.g. an operand names a local
        /// that no instruction defines.
        #[error("malformed module: {0}")]
        MalformedModule(String),
    }

    pub type Result<T> = std::result::Result<T, Error>;
}

pub use error::*;
