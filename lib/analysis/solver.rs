//! The worklist fixpoint over the constraint graph.
//!
//! Nodes whose points-to sets changed since they were last processed are
//! dirty. Processing a dirty node `n`:
//!
//! 1. Every `Load(dst, n)` edge fires through `pts(n)`: each object `o`
//!    gains a copy edge `o → dst`.
//! 2. Every `Store(n, src)` edge fires through `pts(n)`: each object `o`
//!    gains a copy edge `src → o`.
//! 3. `pts(n)` is unioned into every copy successor of `n`; successors
//!    that changed become dirty.
//!
//! When a dereference edge fires, the *source* of the new copy edge is
//! marked dirty rather than unioned immediately, so the edge is serviced
//! by step 3 on a later iteration. Edges and points-to sets only grow,
//! and the object universe is finite, so the worklist drains in finitely
//! many steps. The fixpoint reached is the least one; it does not depend
//! on processing order.

use crate::analysis::{ConstraintGraph, NodeId};
use crate::{Error, Result};
use log::{debug, trace};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative cancellation for a running solve.
///
/// Cloning shares the flag. The solver checks it at every dequeue; once
/// set, the run aborts with `Error::Canceled` and its partial results are
/// discarded.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    canceled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> CancelToken {
        CancelToken::default()
    }

    pub fn cancel(&self) {
        self.canceled.store(true, Ordering::Relaxed);
    }

    pub fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::Relaxed)
    }
}

/// Worklist processing order. The final points-to sets are identical
/// either way; only the step count differs.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum WorklistOrder {
    #[default]
    Fifo,
    Lifo,
}

/// Caller-imposed limits on one solve.
#[derive(Clone, Debug, Default)]
pub struct SolverOptions {
    pub order: WorklistOrder,
    /// Abort with `BudgetExhausted` after this many worklist steps.
    pub max_steps: Option<u64>,
    /// Checked cooperatively at each dequeue.
    pub cancel: Option<CancelToken>,
}

/// Run the constraint graph to its least fixpoint.
///
/// On error the graph holds partial, unsound sets; callers must not
/// expose them.
pub fn solve(graph: &mut ConstraintGraph, options: &SolverOptions) -> Result<()> {
    let node_count = graph.node_count();
    let mut queued = vec![false; node_count];
    let mut worklist: VecDeque<NodeId> = VecDeque::new();

    for id in graph.seeded_nodes() {
        queued[id.index()] = true;
        worklist.push_back(id);
    }
    debug!(
        "solving: {} nodes, {} seeded",
        node_count,
        worklist.len()
    );

    let mut steps: u64 = 0;
    loop {
        let n = match options.order {
            WorklistOrder::Fifo => worklist.pop_front(),
            WorklistOrder::Lifo => worklist.pop_back(),
        };
        let n = match n {
            Some(n) => n,
            None => break,
        };
        queued[n.index()] = false;

        if let Some(cancel) = &options.cancel {
            if cancel.is_canceled() {
                return Err(Error::Canceled);
            }
        }
        steps += 1;
        if let Some(max_steps) = options.max_steps {
            if steps > max_steps {
                return Err(Error::BudgetExhausted { steps: max_steps });
            }
        }

        let mut mark = |id: NodeId, worklist: &mut VecDeque<NodeId>, queued: &mut Vec<bool>| {
            if !queued[id.index()] {
                queued[id.index()] = true;
                worklist.push_back(id);
            }
        };

        let points_to = graph.points_to_unchecked(n).clone();

        // Fire load edges: dst = *n.
        let load_dsts: Vec<NodeId> = graph.load_dsts(n).iter().copied().collect();
        for dst in load_dsts {
            for object in points_to.iter() {
                if graph.add_copy_edge(dst, object) {
                    mark(object, &mut worklist, &mut queued);
                }
            }
        }

        // Fire store edges: *n = src.
        let store_srcs: Vec<NodeId> = graph.store_srcs(n).iter().copied().collect();
        for src in store_srcs {
            for object in points_to.iter() {
                if graph.add_copy_edge(object, src) {
                    mark(src, &mut worklist, &mut queued);
                }
            }
        }

        // Propagate along copy edges.
        let successors: Vec<NodeId> = graph.copy_successors(n).iter().copied().collect();
        for dst in successors {
            if graph.union_points_to(dst, n) {
                mark(dst, &mut worklist, &mut queued);
            }
        }

        trace!("step {}: processed {}", steps, n);
    }

    debug!(
        "fixpoint after {} steps, {} points-to edges",
        steps,
        graph.points_to_edge_count()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::Constraint;

    fn node(index: usize) -> NodeId {
        NodeId::new(index)
    }

    /// p = &x; q = p
    fn simple_copy_graph() -> ConstraintGraph {
        let mut graph = ConstraintGraph::new();
        graph.grow(3);
        let (p, q, x) = (node(0), node(1), node(2));
        graph
            .add_constraint(Constraint::AddrOf { dst: p, object: x })
            .unwrap();
        graph.add_constraint(Constraint::Copy { dst: q, src: p }).unwrap();
        graph
    }

    #[test]
    fn copy_propagates_address() {
        let mut graph = simple_copy_graph();
        solve(&mut graph, &SolverOptions::default()).unwrap();
        assert!(graph.points_to(node(1)).unwrap().contains(node(2)));
    }

    #[test]
    fn load_fires_through_pointer() {
        // p = &x; pp = &p; q = *pp  =>  pts(q) = {x}
        let mut graph = ConstraintGraph::new();
        graph.grow(4);
        let (p, pp, q, x) = (node(0), node(1), node(2), node(3));
        graph.add_constraint(Constraint::AddrOf { dst: p, object: x }).unwrap();
        graph.add_constraint(Constraint::AddrOf { dst: pp, object: p }).unwrap();
        graph.add_constraint(Constraint::Load { dst: q, src: pp }).unwrap();
        solve(&mut graph, &SolverOptions::default()).unwrap();
        assert!(graph.points_to(q).unwrap().contains(x));
    }

    #[test]
    fn store_fires_through_pointer() {
        // p = &x; pp = &slot; *pp = p; q = *pp  =>  pts(q) ⊇ {x}
        let mut graph = ConstraintGraph::new();
        graph.grow(5);
        let (p, pp, q, x, slot) = (node(0), node(1), node(2), node(3), node(4));
        graph.add_constraint(Constraint::AddrOf { dst: p, object: x }).unwrap();
        graph.add_constraint(Constraint::AddrOf { dst: pp, object: slot }).unwrap();
        graph.add_constraint(Constraint::Store { dst: pp, src: p }).unwrap();
        graph.add_constraint(Constraint::Load { dst: q, src: pp }).unwrap();
        solve(&mut graph, &SolverOptions::default()).unwrap();
        assert!(graph.points_to(slot).unwrap().contains(x));
        assert!(graph.points_to(q).unwrap().contains(x));
    }

    #[test]
    fn fixpoint_is_stable() {
        let mut graph = simple_copy_graph();
        solve(&mut graph, &SolverOptions::default()).unwrap();
        let before: Vec<_> = (0..3)
            .map(|i| graph.points_to(node(i)).unwrap().clone())
            .collect();
        solve(&mut graph, &SolverOptions::default()).unwrap();
        for (i, set) in before.iter().enumerate() {
            assert_eq!(graph.points_to(node(i)).unwrap(), set);
        }
    }

    #[test]
    fn order_does_not_change_result() {
        let build = || {
            // A little diamond with a cycle and a store for good measure.
            let mut graph = ConstraintGraph::new();
            graph.grow(6);
            let (a, b, c, d, x, y) = (node(0), node(1), node(2), node(3), node(4), node(5));
            graph.add_constraint(Constraint::AddrOf { dst: a, object: x }).unwrap();
            graph.add_constraint(Constraint::AddrOf { dst: b, object: y }).unwrap();
            graph.add_constraint(Constraint::Copy { dst: c, src: a }).unwrap();
            graph.add_constraint(Constraint::Copy { dst: c, src: b }).unwrap();
            graph.add_constraint(Constraint::Copy { dst: d, src: c }).unwrap();
            graph.add_constraint(Constraint::Copy { dst: c, src: d }).unwrap();
            graph.add_constraint(Constraint::Store { dst: a, src: d }).unwrap();
            graph.add_constraint(Constraint::Load { dst: b, src: a }).unwrap();
            graph
        };

        let mut fifo = build();
        solve(&mut fifo, &SolverOptions::default()).unwrap();

        let mut lifo = build();
        let options = SolverOptions {
            order: WorklistOrder::Lifo,
            ..SolverOptions::default()
        };
        solve(&mut lifo, &options).unwrap();

        for i in 0..6 {
            assert_eq!(
                fifo.points_to(node(i)).unwrap(),
                lifo.points_to(node(i)).unwrap(),
                "node {} differs between orders",
                i
            );
        }
    }

    #[test]
    fn canceled_token_aborts() {
        let mut graph = simple_copy_graph();
        let cancel = CancelToken::new();
        cancel.cancel();
        let options = SolverOptions {
            cancel: Some(cancel),
            ..SolverOptions::default()
        };
        assert_eq!(solve(&mut graph, &options), Err(Error::Canceled));
    }

    #[test]
    fn step_budget_is_enforced() {
        let mut graph = simple_copy_graph();
        let options = SolverOptions {
            max_steps: Some(0),
            ..SolverOptions::default()
        };
        assert_eq!(
            solve(&mut graph, &options),
            Err(Error::BudgetExhausted { steps: 0 })
        );
    }
}
