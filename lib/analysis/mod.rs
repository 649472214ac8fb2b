//! Inclusion-based points-to analysis over the pointsto IR.
//!
//! The pipeline is adapt → build → solve → query:
//!
//! 1. [`adapter::adapt`] extracts pointer-relevant facts from a module.
//! 2. [`builder::build`] turns facts into nodes and constraint edges.
//! 3. [`solver::solve`] propagates points-to sets to a least fixpoint.
//! 4. [`Solution`] answers points-to, pointed-by, and may-alias queries.
//!
//! [`points_to_analysis`] runs the whole pipeline with default options;
//! [`PointsToAnalysis`] stages it for callers that want to inspect the
//! graph, impose budgets, or cancel mid-solve.

pub mod adapter;
pub mod builder;
mod constraints;
mod nodes;
mod solution;
pub mod solver;

pub use self::adapter::{AdapterOptions, ModuleFacts};
pub use self::builder::ConstraintSystem;
pub use self::constraints::{Constraint, ConstraintGraph, PointsToSet};
pub use self::nodes::{AllocSite, Node, NodeId, NodeTable, ObjectNode, ValueNode, ValueRef};
pub use self::solution::{
    points_to_analysis, AnalysisOptions, PointsToAnalysis, Solution, Statistics,
};
pub use self::solver::{CancelToken, SolverOptions, WorklistOrder};
