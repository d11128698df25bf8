//! Parameters: constants whose value is supplied per problem.
//!
//! A parameter has a fixed shape and a declared sign. It is `Constant` for
//! DCP purposes, so changing its value never changes any inferred curvature
//! or sign as long as the value conforms to the declared sign.

use super::constant::Array;
use super::expression::{ExprGraph, ExprId, Node, ParameterData};
use super::shape::Shape;
use crate::dcp::Sign;
use crate::error::{CvxError, Result};

/// Builder for parameters.
///
/// ```
/// use cvxcanon::prelude::*;
///
/// let mut g = ExprGraph::new();
/// let gamma = ParameterBuilder::scalar().nonneg().value(0.5).build(&mut g).unwrap();
/// assert_eq!(g.curvature(gamma).unwrap(), Curvature::Constant);
/// ```
#[derive(Debug)]
pub struct ParameterBuilder {
    shape: Shape,
    name: Option<String>,
    sign: Sign,
    value: Option<Array>,
}

impl ParameterBuilder {
    pub fn new(shape: impl Into<Shape>) -> Self {
        ParameterBuilder {
            shape: shape.into(),
            name: None,
            sign: Sign::Unknown,
            value: None,
        }
    }

    pub fn scalar() -> Self {
        Self::new(Shape::scalar())
    }

    pub fn vector(n: usize) -> Self {
        Self::new(Shape::vector(n))
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Declare every value non-negative.
    pub fn nonneg(mut self) -> Self {
        self.sign = Sign::Positive;
        self
    }

    /// Declare every value non-positive.
    pub fn nonpos(mut self) -> Self {
        self.sign = Sign::Negative;
        self
    }

    /// Default value.
    pub fn value(mut self, value: impl Into<Array>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Add the parameter to `graph`, validating the default value.
    pub fn build(self, graph: &mut ExprGraph) -> Result<ExprId> {
        let data = ParameterData {
            shape: self.shape.clone(),
            name: self.name,
            sign: self.sign,
            value: None,
        };
        let value = match self.value {
            Some(v) => Some(check_value(&data, v)?),
            None => None,
        };
        Ok(graph.push(Node::Parameter(ParameterData { value, ..data }), self.shape))
    }
}

/// Validate a value against a parameter's shape and declared sign.
pub(crate) fn check_value(param: &ParameterData, value: Array) -> Result<Array> {
    if value.size() != param.shape.size() {
        return Err(CvxError::InvalidProblem(format!(
            "parameter value of shape {} does not fit parameter of shape {}",
            value.shape(),
            param.shape
        )));
    }
    if !value.sign().conforms_to(param.sign) {
        return Err(CvxError::InvalidProblem(format!(
            "parameter value of sign {} violates declared sign {}",
            value.sign(),
            param.sign
        )));
    }
    Ok(value)
}

impl ExprGraph {
    /// Add a parameter of unknown sign and no default value.
    pub fn parameter(&mut self, shape: impl Into<Shape>) -> ExprId {
        let shape = shape.into();
        self.push(
            Node::Parameter(ParameterData {
                shape: shape.clone(),
                name: None,
                sign: Sign::Unknown,
                value: None,
            }),
            shape,
        )
    }

    /// Validate `value` for parameter `id` without storing it.
    pub fn check_parameter_value(&self, id: ExprId, value: Array) -> Result<Array> {
        match self.node(id)? {
            Node::Parameter(p) => check_value(p, value),
            other => Err(CvxError::InvalidProblem(format!(
                "{} is a {}, not a parameter",
                id,
                other.label()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parameter_sign_is_declared() {
        let mut g = ExprGraph::new();
        let p = ParameterBuilder::vector(2).nonpos().build(&mut g).unwrap();
        assert_eq!(g.sign(p).unwrap(), Sign::Negative);
    }

    #[test]
    fn test_parameter_value_must_conform() {
        let mut g = ExprGraph::new();
        let bad = ParameterBuilder::scalar().nonneg().value(-1.0).build(&mut g);
        assert!(matches!(bad, Err(CvxError::InvalidProblem(_))));

        let p = ParameterBuilder::vector(2).nonneg().build(&mut g).unwrap();
        assert!(g.check_parameter_value(p, vec![1.0, 0.0].into()).is_ok());
        assert!(g.check_parameter_value(p, vec![1.0, -0.5].into()).is_err());
        assert!(g.check_parameter_value(p, vec![1.0, 2.0, 3.0].into()).is_err());
    }

    #[test]
    fn test_variable_is_not_a_parameter() {
        let mut g = ExprGraph::new();
        let x = g.variable(());
        assert!(g.check_parameter_value(x, 1.0.into()).is_err());
    }
}
