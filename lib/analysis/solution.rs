//! Solved results and the analysis-run lifecycle.
//!
//! A [`Solution`] exists only for a run that reached its fixpoint. It is
//! immutable, owns its data, and is safe to share across threads for
//! unlimited concurrent readers. [`PointsToAnalysis`] is the staged
//! driver: adapt and build eagerly, solve on demand, and refuse queries
//! (`NotSolved`) until solving completes.

use crate::analysis::adapter::{adapt, AdapterOptions};
use crate::analysis::builder::build;
use crate::analysis::solver::{solve, SolverOptions};
use crate::analysis::{
    AllocSite, ConstraintGraph, Node, NodeId, NodeTable, PointsToSet, ValueRef,
};
use crate::ir;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Aggregate counts over a solved graph.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Statistics {
    pub node_count: usize,
    pub value_count: usize,
    pub object_count: usize,
    pub points_to_edge_count: usize,
}

impl fmt::Display for Statistics {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "nodes: {} ({} values, {} objects), points-to edges: {}",
            self.node_count, self.value_count, self.object_count, self.points_to_edge_count
        )
    }
}

/// The post-fixpoint points-to relation with its reverse index.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Solution {
    nodes: NodeTable,
    points_to: Vec<PointsToSet>,
    pointed_by: Vec<BTreeSet<NodeId>>,
    statistics: Statistics,
}

impl Solution {
    /// Snapshot a solved graph. Inverts the final points-to relation once
    /// to build the reverse index.
    pub(crate) fn build(nodes: NodeTable, graph: &ConstraintGraph) -> Solution {
        let node_count = nodes.len();
        let mut points_to = Vec::with_capacity(node_count);
        let mut pointed_by = vec![BTreeSet::new(); node_count];

        for index in 0..node_count {
            let id = NodeId::new(index);
            let set = graph.points_to_unchecked(id).clone();
            for object in set.iter() {
                pointed_by[object.index()].insert(id);
            }
            points_to.push(set);
        }

        let statistics = Statistics {
            node_count,
            value_count: nodes.value_count(),
            object_count: nodes.object_count(),
            points_to_edge_count: points_to.iter().map(PointsToSet::len).sum(),
        };

        Solution {
            nodes,
            points_to,
            pointed_by,
            statistics,
        }
    }

    fn check(&self, id: NodeId) -> Result<()> {
        if id.index() < self.points_to.len() {
            Ok(())
        } else {
            Err(Error::UnknownNode(id))
        }
    }

    /// The objects `id` may point to.
    pub fn points_to(&self, id: NodeId) -> Result<&PointsToSet> {
        self.check(id)?;
        Ok(&self.points_to[id.index()])
    }

    /// The nodes that may point to the object `id`. Empty for value
    /// nodes, since nothing points at a value.
    pub fn pointed_by(&self, id: NodeId) -> Result<&BTreeSet<NodeId>> {
        self.check(id)?;
        Ok(&self.pointed_by[id.index()])
    }

    /// True if `a` and `b` may reference a common object.
    pub fn may_alias(&self, a: NodeId, b: NodeId) -> Result<bool> {
        self.check(a)?;
        self.check(b)?;
        Ok(self.points_to[a.index()].intersects(&self.points_to[b.index()]))
    }

    pub fn statistics(&self) -> Statistics {
        self.statistics
    }

    /// The program entity behind a node, for reporting.
    pub fn node(&self, id: NodeId) -> Result<&Node> {
        self.nodes.node(id)
    }

    pub fn value_node_id(&self, value: &ValueRef) -> Option<NodeId> {
        self.nodes.value_id(value)
    }

    pub fn object_node_id(&self, site: &AllocSite) -> Option<NodeId> {
        self.nodes.object_id(site)
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter()
    }
}

/// Options for one analysis run.
#[derive(Clone, Debug, Default)]
pub struct AnalysisOptions {
    pub adapter: AdapterOptions,
    pub solver: SolverOptions,
}

/// One analysis run: adapted, built, and solvable exactly once.
///
/// The constraint graph and node table are exclusively owned by the run
/// and never shared with another. Queries go through [`solution`], which
/// fails with `NotSolved` until [`solve`] has completed successfully.
///
/// [`solution`]: PointsToAnalysis::solution
/// [`solve`]: PointsToAnalysis::solve
#[derive(Debug)]
pub struct PointsToAnalysis {
    nodes: NodeTable,
    graph: ConstraintGraph,
    options: SolverOptions,
    skipped: Vec<Error>,
    solution: Option<Solution>,
}

impl PointsToAnalysis {
    /// Adapt `module` and build its constraint system.
    pub fn new(module: &ir::Module, options: AnalysisOptions) -> Result<PointsToAnalysis> {
        let facts = adapt(module, &options.adapter)?;
        let skipped = facts.skipped().to_vec();
        let system = build(&facts)?;
        let (nodes, graph) = system.into_parts();
        Ok(PointsToAnalysis {
            nodes,
            graph,
            options: options.solver,
            skipped,
            solution: None,
        })
    }

    /// Constructs the adapter skipped in best-effort mode. Non-empty
    /// means the eventual solution under-approximates.
    pub fn skipped(&self) -> &[Error] {
        &self.skipped
    }

    pub fn nodes(&self) -> &NodeTable {
        &self.nodes
    }

    /// The constraint graph, in whatever state the run has reached.
    pub fn graph(&self) -> &ConstraintGraph {
        &self.graph
    }

    /// Run the solver to its fixpoint. On cancellation or budget
    /// exhaustion the partial sets stay internal and queries keep
    /// failing with `NotSolved`.
    pub fn solve(&mut self) -> Result<()> {
        solve(&mut self.graph, &self.options)?;
        self.solution = Some(Solution::build(self.nodes.clone(), &self.graph));
        Ok(())
    }

    /// The solved results. `NotSolved` before a completed solve.
    pub fn solution(&self) -> Result<&Solution> {
        self.solution.as_ref().ok_or(Error::NotSolved)
    }

    /// Consume the run, keeping only its solution.
    pub fn into_solution(self) -> Result<Solution> {
        self.solution.ok_or(Error::NotSolved)
    }
}

/// Adapt, build, and solve `module` with default options.
pub fn points_to_analysis(module: &ir::Module) -> Result<Solution> {
    let mut analysis = PointsToAnalysis::new(module, AnalysisOptions::default())?;
    analysis.solve()?;
    analysis.into_solution()
}
