//! Variable creation with builder pattern.

use super::expression::{ExprGraph, ExprId, Node, VariableData};
use super::shape::Shape;
use crate::dcp::Sign;

/// Builder for creating variables with various attributes.
///
/// ```
/// use cvxcanon::prelude::*;
///
/// let mut g = ExprGraph::new();
/// let x = VariableBuilder::vector(3).name("x").nonneg().build(&mut g);
/// assert_eq!(g.sign(x).unwrap(), Sign::Positive);
/// ```
#[derive(Debug)]
pub struct VariableBuilder {
    shape: Shape,
    name: Option<String>,
    sign: Sign,
}

impl VariableBuilder {
    /// Create a new variable builder with the given shape.
    pub fn new(shape: impl Into<Shape>) -> Self {
        Self {
            shape: shape.into(),
            name: None,
            sign: Sign::Unknown,
        }
    }

    pub fn scalar() -> Self {
        Self::new(Shape::scalar())
    }

    pub fn vector(n: usize) -> Self {
        Self::new(Shape::vector(n))
    }

    pub fn matrix(m: usize, n: usize) -> Self {
        Self::new(Shape::matrix(m, n))
    }

    /// Set the name of the variable.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Constrain the variable to be non-negative (x >= 0).
    pub fn nonneg(mut self) -> Self {
        self.sign = Sign::Positive;
        self
    }

    /// Constrain the variable to be non-positive (x <= 0).
    pub fn nonpos(mut self) -> Self {
        self.sign = Sign::Negative;
        self
    }

    /// Add the variable to `graph`.
    pub fn build(self, graph: &mut ExprGraph) -> ExprId {
        let shape = self.shape.clone();
        graph.push(
            Node::Variable(VariableData {
                shape: self.shape,
                name: self.name,
                sign: self.sign,
            }),
            shape,
        )
    }
}

impl ExprGraph {
    /// Add an unconstrained variable with the given shape.
    ///
    /// `()` is a scalar, `n` a vector and `(m, n)` a matrix.
    pub fn variable(&mut self, shape: impl Into<Shape>) -> ExprId {
        VariableBuilder::new(shape).build(self)
    }

    /// Add a named variable.
    pub fn named_variable(&mut self, shape: impl Into<Shape>, name: impl Into<String>) -> ExprId {
        VariableBuilder::new(shape).name(name).build(self)
    }

    /// Add a non-negative variable.
    pub fn nonneg_variable(&mut self, shape: impl Into<Shape>) -> ExprId {
        VariableBuilder::new(shape).nonneg().build(self)
    }

    /// Display name of a variable or parameter, if it has one.
    pub fn name_of(&self, id: ExprId) -> Option<&str> {
        match self.node(id).ok()? {
            Node::Variable(v) => v.name.as_deref(),
            Node::Parameter(p) => p.name.as_deref(),
            _ => None,
        }
    }
}
