//! Expression graph and node creation.
//!
//! This module provides the core expression types for building optimization problems:
//! - `ExprGraph` - the arena all expressions live in, addressed by `ExprId`
//! - `Shape` - shape information for expressions
//! - Variable creation via `ExprGraph::variable` and `VariableBuilder`
//! - Parameter creation via `ParameterBuilder`
//! - Constant creation via `ExprGraph::constant` and related methods

pub mod constant;
pub mod evaluate;
pub mod expression;
pub mod parameter;
pub mod shape;
pub mod variable;

pub use constant::Array;
pub use evaluate::fit_to_shape;
pub use expression::{
    AtomNode, ConstantData, ExprGraph, ExprId, Inferred, Node, ParameterData, VariableData,
};
pub use parameter::ParameterBuilder;
pub use shape::Shape;
pub use variable::VariableBuilder;
