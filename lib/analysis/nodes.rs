//! Node identities for the constraint graph.
//!
//! Every pointer-relevant program entity gets exactly one dense integer
//! id for the lifetime of an analysis run. Value nodes stand for program
//! values; object nodes stand for abstract memory objects created by
//! allocation sites. A value and the object it allocates are distinct
//! nodes, related only by an address-of fact.

use crate::ir;
use crate::{Error, Result};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A stable, dense identity for one node in one analysis run.
#[derive(
    Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
pub struct NodeId(u32);

impl NodeId {
    pub(crate) fn new(index: usize) -> NodeId {
        NodeId(index as u32)
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// A back-reference from a value node to the program entity it models.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum ValueRef {
    /// An SSA value or formal parameter within a function.
    Local { function: String, name: String },
    /// The address of a global's storage.
    Global(String),
    /// The address of a function.
    Function(String),
    /// A function's return channel: every `ret v` copies into this value,
    /// and every call result copies out of it.
    Return(String),
}

impl ValueRef {
    pub fn local<F: Into<String>, S: Into<String>>(function: F, name: S) -> ValueRef {
        ValueRef::Local {
            function: function.into(),
            name: name.into(),
        }
    }

    pub fn global<S: Into<String>>(name: S) -> ValueRef {
        ValueRef::Global(name.into())
    }

    pub fn function<S: Into<String>>(name: S) -> ValueRef {
        ValueRef::Function(name.into())
    }

    pub fn ret<S: Into<String>>(function: S) -> ValueRef {
        ValueRef::Return(function.into())
    }
}

impl fmt::Display for ValueRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ValueRef::Local { function, name } => write!(f, "{}::%{}", function, name),
            ValueRef::Global(name) => write!(f, "@{}", name),
            ValueRef::Function(name) => write!(f, "${}", name),
            ValueRef::Return(function) => write!(f, "{}::ret", function),
        }
    }
}

/// A back-reference from an object node to its allocation site.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum AllocSite {
    /// An `alloca`, identified by its result name.
    Stack { function: String, name: String },
    /// A global variable's storage.
    Global(String),
    /// A function body, for function pointers.
    Function(String),
    /// A heap allocation, one abstract object per call site. `index` is
    /// the position of the allocating call within the function.
    Heap { function: String, index: usize },
}

impl AllocSite {
    pub fn stack<F: Into<String>, S: Into<String>>(function: F, name: S) -> AllocSite {
        AllocSite::Stack {
            function: function.into(),
            name: name.into(),
        }
    }

    pub fn global<S: Into<String>>(name: S) -> AllocSite {
        AllocSite::Global(name.into())
    }

    pub fn function<S: Into<String>>(name: S) -> AllocSite {
        AllocSite::Function(name.into())
    }

    pub fn heap<S: Into<String>>(function: S, index: usize) -> AllocSite {
        AllocSite::Heap {
            function: function.into(),
            index,
        }
    }
}

impl fmt::Display for AllocSite {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AllocSite::Stack { function, name } => write!(f, "stack {}::%{}", function, name),
            AllocSite::Global(name) => write!(f, "global @{}", name),
            AllocSite::Function(name) => write!(f, "fn ${}", name),
            AllocSite::Heap { function, index } => write!(f, "heap {}#{}", function, index),
        }
    }
}

/// A value node: a pointer-typed program value.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ValueNode {
    value: ValueRef,
    ty: Option<ir::Type>,
}

impl ValueNode {
    pub fn value(&self) -> &ValueRef {
        &self.value
    }

    pub fn ty(&self) -> Option<&ir::Type> {
        self.ty.as_ref()
    }
}

/// An object node: one abstract memory object per allocation site.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ObjectNode {
    site: AllocSite,
    ty: Option<ir::Type>,
}

impl ObjectNode {
    pub fn site(&self) -> &AllocSite {
        &self.site
    }

    pub fn ty(&self) -> Option<&ir::Type> {
        self.ty.as_ref()
    }
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum Node {
    Value(ValueNode),
    Object(ObjectNode),
}

impl Node {
    pub fn is_object(&self) -> bool {
        matches!(self, Node::Object(_))
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Node::Value(value) => write!(f, "{}", value.value()),
            Node::Object(object) => write!(f, "{}", object.site()),
        }
    }
}

/// Interns program entities to dense node ids.
///
/// Interning is idempotent within one run: the same `ValueRef` or
/// `AllocSite` always yields the same id. Ids from a different run (or
/// invented by the caller) fail lookups with `UnknownNode`.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(from = "Vec<Node>", into = "Vec<Node>")]
pub struct NodeTable {
    nodes: Vec<Node>,
    value_ids: FxHashMap<ValueRef, NodeId>,
    object_ids: FxHashMap<AllocSite, NodeId>,
}

// The interning maps are derivable from the node list, so only the list
// is serialized.
impl From<Vec<Node>> for NodeTable {
    fn from(nodes: Vec<Node>) -> NodeTable {
        let mut value_ids = FxHashMap::default();
        let mut object_ids = FxHashMap::default();
        for (index, node) in nodes.iter().enumerate() {
            let id = NodeId::new(index);
            match node {
                Node::Value(value) => {
                    value_ids.insert(value.value().clone(), id);
                }
                Node::Object(object) => {
                    object_ids.insert(object.site().clone(), id);
                }
            }
        }
        NodeTable {
            nodes,
            value_ids,
            object_ids,
        }
    }
}

impl From<NodeTable> for Vec<Node> {
    fn from(table: NodeTable) -> Vec<Node> {
        table.nodes
    }
}

impl NodeTable {
    pub fn new() -> NodeTable {
        NodeTable::default()
    }

    /// Intern a value node, creating it on first sight.
    pub fn value_node(&mut self, value: &ValueRef, ty: Option<&ir::Type>) -> NodeId {
        if let Some(id) = self.value_ids.get(value) {
            return *id;
        }
        let id = NodeId::new(self.nodes.len());
        self.nodes.push(Node::Value(ValueNode {
            value: value.clone(),
            ty: ty.cloned(),
        }));
        self.value_ids.insert(value.clone(), id);
        id
    }

    /// Intern an object node, creating it on first sight.
    pub fn object_node(&mut self, site: &AllocSite, ty: Option<&ir::Type>) -> NodeId {
        if let Some(id) = self.object_ids.get(site) {
            return *id;
        }
        let id = NodeId::new(self.nodes.len());
        self.nodes.push(Node::Object(ObjectNode {
            site: site.clone(),
            ty: ty.cloned(),
        }));
        self.object_ids.insert(site.clone(), id);
        id
    }

    pub fn node(&self, id: NodeId) -> Result<&Node> {
        self.nodes.get(id.index()).ok_or(Error::UnknownNode(id))
    }

    /// Look up an already-interned value node.
    pub fn value_id(&self, value: &ValueRef) -> Option<NodeId> {
        self.value_ids.get(value).copied()
    }

    /// Look up an already-interned object node.
    pub fn object_id(&self, site: &AllocSite) -> Option<NodeId> {
        self.object_ids.get(site).copied()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn object_count(&self) -> usize {
        self.nodes.iter().filter(|node| node.is_object()).count()
    }

    pub fn value_count(&self) -> usize {
        self.nodes.len() - self.object_count()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(index, node)| (NodeId::new(index), node))
    }
}
