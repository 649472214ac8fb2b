//! The constraint graph and points-to sets.
//!
//! Four constraint kinds, following the inclusion-based model:
//!
//! * `AddrOf(dst, obj)`: `dst = &obj`. A base fact, seeded directly into
//!   `dst`'s points-to set rather than stored as an edge.
//! * `Copy(dst, src)`: `dst = src`. `pts(dst) ⊇ pts(src)`.
//! * `Load(dst, src)`: `dst = *src`. For every object `o` in `pts(src)`,
//!   `pts(dst) ⊇ pts(o)`.
//! * `Store(dst, src)`: `*dst = src`. For every object `o` in `pts(dst)`,
//!   `pts(o) ⊇ pts(src)`.
//!
//! Edges are deduplicated and never removed. Points-to sets only grow.
//! Both facts together give the solver its monotone-fixpoint guarantee.

use crate::analysis::NodeId;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// One constraint, as emitted by the builder.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Ord, PartialEq, PartialOrd, Serialize)]
pub enum Constraint {
    /// `dst`'s points-to set contains the object `object`.
    AddrOf { dst: NodeId, object: NodeId },
    /// `dst`'s points-to set includes `src`'s.
    Copy { dst: NodeId, src: NodeId },
    /// `dst = *src`.
    Load { dst: NodeId, src: NodeId },
    /// `*dst = src`.
    Store { dst: NodeId, src: NodeId },
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Constraint::AddrOf { dst, object } => write!(f, "{} = &{}", dst, object),
            Constraint::Copy { dst, src } => write!(f, "{} = {}", dst, src),
            Constraint::Load { dst, src } => write!(f, "{} = *{}", dst, src),
            Constraint::Store { dst, src } => write!(f, "*{} = {}", dst, src),
        }
    }
}

/// A set of object node ids.
///
/// Ordered storage keeps iteration deterministic, which in turn keeps the
/// solver's step count reproducible run to run.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct PointsToSet {
    objects: BTreeSet<NodeId>,
}

impl PointsToSet {
    pub fn new() -> PointsToSet {
        PointsToSet::default()
    }

    /// Insert one object. True if the set changed.
    pub fn insert(&mut self, object: NodeId) -> bool {
        self.objects.insert(object)
    }

    /// Union `other` into this set. True if this set changed.
    pub fn union_from(&mut self, other: &PointsToSet) -> bool {
        let before = self.objects.len();
        self.objects.extend(other.objects.iter().copied());
        self.objects.len() != before
    }

    pub fn contains(&self, object: NodeId) -> bool {
        self.objects.contains(&object)
    }

    pub fn is_superset(&self, other: &PointsToSet) -> bool {
        self.objects.is_superset(&other.objects)
    }

    pub fn intersects(&self, other: &PointsToSet) -> bool {
        // Walk the smaller set.
        let (small, large) = if self.objects.len() <= other.objects.len() {
            (&self.objects, &other.objects)
        } else {
            (&other.objects, &self.objects)
        };
        small.iter().any(|object| large.contains(object))
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.objects.iter().copied()
    }
}

impl FromIterator<NodeId> for PointsToSet {
    fn from_iter<I: IntoIterator<Item = NodeId>>(iter: I) -> PointsToSet {
        PointsToSet {
            objects: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for PointsToSet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{{")?;
        for (i, object) in self.objects.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", object)?;
        }
        write!(f, "}}")
    }
}

/// Per-node edge lists plus the points-to relation.
///
/// Indexed by dense node ids. `grow` must be called as nodes are interned
/// so every id has a slot; constraints over unknown ids are rejected.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct ConstraintGraph {
    /// `copy_successors[src]` holds every `dst` with `Copy(dst, src)`.
    copy_successors: Vec<BTreeSet<NodeId>>,
    /// `load_dsts[src]` holds every `dst` with `Load(dst, src)`.
    load_dsts: Vec<BTreeSet<NodeId>>,
    /// `store_srcs[dst]` holds every `src` with `Store(dst, src)`.
    store_srcs: Vec<BTreeSet<NodeId>>,
    points_to: Vec<PointsToSet>,
}

impl ConstraintGraph {
    pub fn new() -> ConstraintGraph {
        ConstraintGraph::default()
    }

    /// Ensure slots exist for `node_count` nodes.
    pub fn grow(&mut self, node_count: usize) {
        if node_count > self.points_to.len() {
            self.copy_successors.resize_with(node_count, BTreeSet::new);
            self.load_dsts.resize_with(node_count, BTreeSet::new);
            self.store_srcs.resize_with(node_count, BTreeSet::new);
            self.points_to.resize_with(node_count, PointsToSet::new);
        }
    }

    pub fn node_count(&self) -> usize {
        self.points_to.len()
    }

    fn check(&self, id: NodeId) -> Result<()> {
        if id.index() < self.points_to.len() {
            Ok(())
        } else {
            Err(Error::UnknownNode(id))
        }
    }

    /// Add one constraint. Duplicates are harmless no-ops.
    pub fn add_constraint(&mut self, constraint: Constraint) -> Result<()> {
        match constraint {
            Constraint::AddrOf { dst, object } => {
                self.check(dst)?;
                self.check(object)?;
                self.points_to[dst.index()].insert(object);
            }
            Constraint::Copy { dst, src } => {
                self.check(dst)?;
                self.check(src)?;
                self.copy_successors[src.index()].insert(dst);
            }
            Constraint::Load { dst, src } => {
                self.check(dst)?;
                self.check(src)?;
                self.load_dsts[src.index()].insert(dst);
            }
            Constraint::Store { dst, src } => {
                self.check(dst)?;
                self.check(src)?;
                self.store_srcs[dst.index()].insert(src);
            }
        }
        Ok(())
    }

    /// The current points-to set of `id`. Valid mid-solve; only final for
    /// a completed run.
    pub fn points_to(&self, id: NodeId) -> Result<&PointsToSet> {
        self.check(id)?;
        Ok(&self.points_to[id.index()])
    }

    pub(crate) fn points_to_unchecked(&self, id: NodeId) -> &PointsToSet {
        &self.points_to[id.index()]
    }

    pub(crate) fn copy_successors(&self, id: NodeId) -> &BTreeSet<NodeId> {
        &self.copy_successors[id.index()]
    }

    pub(crate) fn load_dsts(&self, id: NodeId) -> &BTreeSet<NodeId> {
        &self.load_dsts[id.index()]
    }

    pub(crate) fn store_srcs(&self, id: NodeId) -> &BTreeSet<NodeId> {
        &self.store_srcs[id.index()]
    }

    /// Add a copy edge discovered during solving. True if the edge is new.
    pub(crate) fn add_copy_edge(&mut self, dst: NodeId, src: NodeId) -> bool {
        self.copy_successors[src.index()].insert(dst)
    }

    /// Union `pts(src)` into `pts(dst)`. True if `dst`'s set changed.
    pub(crate) fn union_points_to(&mut self, dst: NodeId, src: NodeId) -> bool {
        if dst == src {
            return false;
        }
        let src_set = std::mem::take(&mut self.points_to[src.index()]);
        let changed = self.points_to[dst.index()].union_from(&src_set);
        self.points_to[src.index()] = src_set;
        changed
    }

    /// Ids of every node holding at least one points-to fact.
    pub(crate) fn seeded_nodes(&self) -> Vec<NodeId> {
        self.points_to
            .iter()
            .enumerate()
            .filter(|(_, set)| !set.is_empty())
            .map(|(index, _)| NodeId::new(index))
            .collect()
    }

    /// Total points-to pairs over all nodes.
    pub fn points_to_edge_count(&self) -> usize {
        self.points_to.iter().map(PointsToSet::len).sum()
    }

    pub(crate) fn into_points_to(self) -> Vec<PointsToSet> {
        self.points_to
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_constraints_are_noops() {
        let mut graph = ConstraintGraph::new();
        graph.grow(3);
        let a = NodeId::new(0);
        let b = NodeId::new(1);
        let o = NodeId::new(2);

        graph.add_constraint(Constraint::Copy { dst: a, src: b }).unwrap();
        graph.add_constraint(Constraint::Copy { dst: a, src: b }).unwrap();
        assert_eq!(graph.copy_successors(b).len(), 1);

        graph.add_constraint(Constraint::AddrOf { dst: a, object: o }).unwrap();
        graph.add_constraint(Constraint::AddrOf { dst: a, object: o }).unwrap();
        assert_eq!(graph.points_to(a).unwrap().len(), 1);
    }

    #[test]
    fn constraint_over_unknown_node_is_rejected() {
        let mut graph = ConstraintGraph::new();
        graph.grow(1);
        let known = NodeId::new(0);
        let foreign = NodeId::new(9);
        assert_eq!(
            graph.add_constraint(Constraint::Copy { dst: known, src: foreign }),
            Err(Error::UnknownNode(foreign))
        );
        assert_eq!(graph.points_to(foreign), Err(Error::UnknownNode(foreign)));
    }

    #[test]
    fn union_is_monotone() {
        let mut set = PointsToSet::new();
        assert!(set.insert(NodeId::new(1)));
        assert!(!set.insert(NodeId::new(1)));

        let other: PointsToSet = [NodeId::new(1), NodeId::new(2)].into_iter().collect();
        assert!(set.union_from(&other));
        assert!(set.is_superset(&other));
        assert!(!set.union_from(&other));
    }
}
