//! Core expression graph for cvxcanon.
//!
//! Expressions live in an append-only arena ([`ExprGraph`]) and are referred
//! to by [`ExprId`] handles. A node may only reference handles that already
//! exist in the same graph, so every graph is a DAG by construction and
//! shared subexpressions are shared by handle rather than copied.
//!
//! Each slot memoizes its inferred curvature and sign. Nodes never change
//! after construction, so the memo is never invalidated.

use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

use tracing::trace;

use super::constant::Array;
use super::shape::Shape;
use crate::atoms::AtomKind;
use crate::dcp::{Curvature, Sign};
use crate::error::{ConstructionError, Result};

/// Handle to a node of an [`ExprGraph`].
///
/// Handles order by creation within a graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExprId {
    graph: u64,
    index: usize,
}

impl ExprId {
    /// Position of the node in its graph.
    pub fn index(&self) -> usize {
        self.index
    }
}

impl fmt::Display for ExprId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.index)
    }
}

/// Data for a variable node.
#[derive(Debug, Clone)]
pub struct VariableData {
    pub shape: Shape,
    /// Optional name for display.
    pub name: Option<String>,
    /// Sign hint (`Positive`, `Negative` or `Unknown`); enforced as a
    /// constraint when the variable is canonicalized.
    pub sign: Sign,
}

/// Data for a parameter node: a constant whose value is supplied per problem.
#[derive(Debug, Clone)]
pub struct ParameterData {
    pub shape: Shape,
    pub name: Option<String>,
    /// Declared sign; every value must conform to it.
    pub sign: Sign,
    /// Default value, used when a problem does not override it.
    pub value: Option<Array>,
}

/// Data for a constant node.
#[derive(Debug, Clone)]
pub struct ConstantData {
    pub value: Array,
}

/// Application of an atom to argument nodes.
#[derive(Debug, Clone)]
pub struct AtomNode {
    pub kind: AtomKind,
    pub args: Vec<ExprId>,
}

/// A node of the expression graph.
#[derive(Debug, Clone)]
pub enum Node {
    Variable(VariableData),
    Parameter(ParameterData),
    Constant(ConstantData),
    Atom(AtomNode),
}

impl Node {
    /// Argument handles (empty for leaves).
    pub fn args(&self) -> &[ExprId] {
        match self {
            Node::Atom(a) => &a.args,
            _ => &[],
        }
    }

    /// Short label used in diagnostics.
    pub fn label(&self) -> &'static str {
        match self {
            Node::Variable(_) => "variable",
            Node::Parameter(_) => "parameter",
            Node::Constant(_) => "constant",
            Node::Atom(a) => a.kind.name(),
        }
    }
}

/// Inferred DCP facts about a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Inferred {
    pub curvature: Curvature,
    pub sign: Sign,
}

#[derive(Debug)]
struct Slot {
    node: Node,
    shape: Shape,
    inferred: OnceLock<Inferred>,
}

/// Append-only arena of expression nodes.
#[derive(Debug)]
pub struct ExprGraph {
    tag: u64,
    slots: Vec<Slot>,
}

impl Default for ExprGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl ExprGraph {
    /// Create an empty graph with a fresh identity.
    pub fn new() -> Self {
        static NEXT_GRAPH: AtomicU64 = AtomicU64::new(0);
        ExprGraph {
            tag: NEXT_GRAPH.fetch_add(1, Ordering::Relaxed),
            slots: Vec::new(),
        }
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Whether `id` refers to a node of this graph.
    pub fn contains(&self, id: ExprId) -> bool {
        id.graph == self.tag && id.index < self.slots.len()
    }

    /// Fail with [`ConstructionError::ForeignNode`] unless `id` is ours.
    pub fn check(&self, id: ExprId) -> std::result::Result<(), ConstructionError> {
        if self.contains(id) {
            Ok(())
        } else {
            Err(ConstructionError::ForeignNode(id))
        }
    }

    /// Get the node behind a handle.
    pub fn node(&self, id: ExprId) -> Result<&Node> {
        self.check(id)?;
        Ok(&self.slots[id.index].node)
    }

    /// Get the shape of a node.
    pub fn shape(&self, id: ExprId) -> Result<&Shape> {
        self.check(id)?;
        Ok(&self.slots[id.index].shape)
    }

    /// Node lookup for handles already validated against this graph.
    pub(crate) fn node_unchecked(&self, id: ExprId) -> &Node {
        &self.slots[id.index].node
    }

    pub(crate) fn shape_unchecked(&self, id: ExprId) -> &Shape {
        &self.slots[id.index].shape
    }

    /// All handles in creation order.
    pub fn ids(&self) -> impl Iterator<Item = ExprId> + '_ {
        (0..self.slots.len()).map(move |index| ExprId {
            graph: self.tag,
            index,
        })
    }

    pub(crate) fn push(&mut self, node: Node, shape: Shape) -> ExprId {
        let id = ExprId {
            graph: self.tag,
            index: self.slots.len(),
        };
        self.slots.push(Slot {
            node,
            shape,
            inferred: OnceLock::new(),
        });
        id
    }

    /// Apply an atom to existing nodes.
    ///
    /// Arity, argument ownership and shapes are validated here; a rejected
    /// node is never added.
    pub fn add_atom(&mut self, kind: AtomKind, args: Vec<ExprId>) -> Result<ExprId> {
        let spec = kind.spec();
        for &arg in &args {
            self.check(arg)?;
        }
        spec.arity.check(spec.name, args.len())?;
        let shapes: Vec<Shape> = args
            .iter()
            .map(|&a| self.shape_unchecked(a).clone())
            .collect();
        let shape = (spec.shape)(&kind, &shapes)?;
        trace!(atom = spec.name, shape = %shape, "adding atom node");
        Ok(self.push(Node::Atom(AtomNode { kind, args }), shape))
    }

    /// Curvature and sign of a node.
    ///
    /// Runs an iterative post-order traversal over the not yet inferred part
    /// of the subgraph; every node's rule is evaluated at most once per graph
    /// no matter how many parents share it.
    pub fn infer(&self, id: ExprId) -> Result<Inferred> {
        self.check(id)?;
        if let Some(done) = self.slots[id.index].inferred.get() {
            return Ok(*done);
        }

        let mut stack = vec![(id, false)];
        while let Some((current, expanded)) = stack.pop() {
            let slot = &self.slots[current.index];
            if slot.inferred.get().is_some() {
                continue;
            }
            if !expanded {
                stack.push((current, true));
                for &arg in slot.node.args().iter().rev() {
                    if self.slots[arg.index].inferred.get().is_none() {
                        stack.push((arg, false));
                    }
                }
                continue;
            }
            let inferred = self.infer_node(&slot.node);
            // Ignoring the result: the slot was checked empty above.
            let _ = slot.inferred.set(inferred);
        }

        Ok(self.slots[id.index]
            .inferred
            .get()
            .copied()
            .unwrap_or(Inferred {
                curvature: Curvature::Unknown,
                sign: Sign::Unknown,
            }))
    }

    /// Apply the rule of a single node whose arguments are already inferred.
    fn infer_node(&self, node: &Node) -> Inferred {
        match node {
            Node::Variable(v) => Inferred {
                curvature: Curvature::Affine,
                sign: v.sign,
            },
            Node::Parameter(p) => Inferred {
                curvature: Curvature::Constant,
                sign: p.sign,
            },
            Node::Constant(c) => Inferred {
                curvature: Curvature::Constant,
                sign: c.value.sign(),
            },
            Node::Atom(a) => {
                let args: Vec<Inferred> = a
                    .args
                    .iter()
                    .filter_map(|arg| self.slots[arg.index].inferred.get().copied())
                    .collect();
                a.kind.spec().infer(&a.kind, &args)
            }
        }
    }

    /// Curvature of a node.
    pub fn curvature(&self, id: ExprId) -> Result<Curvature> {
        Ok(self.infer(id)?.curvature)
    }

    /// Sign of a node.
    pub fn sign(&self, id: ExprId) -> Result<Sign> {
        Ok(self.infer(id)?.sign)
    }

    pub fn is_convex(&self, id: ExprId) -> Result<bool> {
        Ok(self.curvature(id)?.is_convex())
    }

    pub fn is_concave(&self, id: ExprId) -> Result<bool> {
        Ok(self.curvature(id)?.is_concave())
    }

    pub fn is_affine(&self, id: ExprId) -> Result<bool> {
        Ok(self.curvature(id)?.is_affine())
    }

    /// Every node reachable from `roots`, each once, arguments before the
    /// nodes that use them. The order is deterministic.
    pub fn post_order(&self, roots: &[ExprId]) -> Result<Vec<ExprId>> {
        for &root in roots {
            self.check(root)?;
        }
        let mut seen = HashSet::new();
        let mut order = Vec::new();
        for &root in roots {
            if seen.contains(&root) {
                continue;
            }
            let mut stack = vec![(root, false)];
            while let Some((current, expanded)) = stack.pop() {
                if expanded {
                    order.push(current);
                    continue;
                }
                if !seen.insert(current) {
                    continue;
                }
                stack.push((current, true));
                for &arg in self.node_unchecked(current).args().iter().rev() {
                    if !seen.contains(&arg) {
                        stack.push((arg, false));
                    }
                }
            }
        }
        Ok(order)
    }

    /// Variables reachable from `roots`, sorted by handle.
    pub fn variables(&self, roots: &[ExprId]) -> Result<Vec<ExprId>> {
        self.leaves(roots, |n| matches!(n, Node::Variable(_)))
    }

    /// Parameters reachable from `roots`, sorted by handle.
    pub fn parameters(&self, roots: &[ExprId]) -> Result<Vec<ExprId>> {
        self.leaves(roots, |n| matches!(n, Node::Parameter(_)))
    }

    fn leaves(&self, roots: &[ExprId], keep: impl Fn(&Node) -> bool) -> Result<Vec<ExprId>> {
        let mut found: Vec<ExprId> = self
            .post_order(roots)?
            .into_iter()
            .filter(|&id| keep(self.node_unchecked(id)))
            .collect();
        found.sort();
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::VariableBuilder;

    #[test]
    fn test_handles_are_graph_scoped() {
        let mut g1 = ExprGraph::new();
        let mut g2 = ExprGraph::new();
        let x = g1.variable(3);
        let _ = g2.variable(3);
        assert!(g1.contains(x));
        assert!(!g2.contains(x));
        assert!(matches!(
            g2.abs(x),
            Err(crate::CvxError::Construction(ConstructionError::ForeignNode(_)))
        ));
        // The rejected node was not added.
        assert_eq!(g2.len(), 1);
    }

    #[test]
    fn test_leaf_inference() {
        let mut g = ExprGraph::new();
        let x = g.variable(2);
        let y = VariableBuilder::vector(2).nonneg().build(&mut g);
        let c = g.constant(-2.0);
        assert_eq!(g.curvature(x).unwrap(), Curvature::Affine);
        assert_eq!(g.sign(x).unwrap(), Sign::Unknown);
        assert_eq!(g.sign(y).unwrap(), Sign::Positive);
        assert_eq!(g.curvature(c).unwrap(), Curvature::Constant);
        assert_eq!(g.sign(c).unwrap(), Sign::Negative);
    }

    #[test]
    fn test_shared_subexpressions_are_inferred_once() {
        // Without memoization this chain would take 2^200 rule evaluations.
        let mut g = ExprGraph::new();
        let x = g.variable(());
        let mut e = g.abs(x).unwrap();
        for _ in 0..200 {
            e = g.add(e, e).unwrap();
        }
        assert_eq!(g.curvature(e).unwrap(), Curvature::Convex);
        assert_eq!(g.sign(e).unwrap(), Sign::Positive);
    }

    #[test]
    fn test_post_order_visits_each_node_once() {
        let mut g = ExprGraph::new();
        let x = g.variable(());
        let a = g.abs(x).unwrap();
        let s = g.add(a, a).unwrap();
        let t = g.add(s, a).unwrap();
        let order = g.post_order(&[t]).unwrap();
        assert_eq!(order, vec![x, a, s, t]);
        assert_eq!(g.variables(&[t]).unwrap(), vec![x]);
    }

    #[test]
    fn test_structurally_equal_nodes_are_distinct() {
        let mut g = ExprGraph::new();
        let x = g.variable(());
        let a = g.abs(x).unwrap();
        let b = g.abs(x).unwrap();
        assert_ne!(a, b);
        assert_eq!(g.infer(a).unwrap(), g.infer(b).unwrap());
    }
}
