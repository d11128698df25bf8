//! Constraint types for optimization problems.
//!
//! A constraint relates two expressions of the same graph. Canonicalization
//! maps each relation to a cone:
//! - Eq: lhs - rhs in the zero cone
//! - Leq: rhs - lhs in the nonnegative orthant
//! - Geq: lhs - rhs in the nonnegative orthant

use std::fmt;

use crate::error::Result;
use crate::expr::{ExprGraph, ExprId};

/// Relation between the two sides of a constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Relation {
    Eq,
    Leq,
    Geq,
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Relation::Eq => "==",
            Relation::Leq => "<=",
            Relation::Geq => ">=",
        })
    }
}

/// A constraint `lhs <relation> rhs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Constraint {
    pub lhs: ExprId,
    pub relation: Relation,
    pub rhs: ExprId,
}

impl Constraint {
    /// Create an equality constraint: lhs == rhs.
    pub fn eq(lhs: ExprId, rhs: ExprId) -> Self {
        Constraint {
            lhs,
            relation: Relation::Eq,
            rhs,
        }
    }

    /// Create an inequality constraint: lhs <= rhs.
    pub fn leq(lhs: ExprId, rhs: ExprId) -> Self {
        Constraint {
            lhs,
            relation: Relation::Leq,
            rhs,
        }
    }

    /// Create an inequality constraint: lhs >= rhs.
    pub fn geq(lhs: ExprId, rhs: ExprId) -> Self {
        Constraint {
            lhs,
            relation: Relation::Geq,
            rhs,
        }
    }

    /// Check if this constraint is DCP-compliant.
    ///
    /// DCP rules for constraints:
    /// - Eq: both sides affine
    /// - Leq: convex <= concave
    /// - Geq: concave >= convex
    pub fn is_dcp(&self, graph: &ExprGraph) -> Result<bool> {
        let (lhs, rhs) = (graph.curvature(self.lhs)?, graph.curvature(self.rhs)?);
        Ok(match self.relation {
            Relation::Eq => lhs.is_affine() && rhs.is_affine(),
            Relation::Leq => lhs.is_convex() && rhs.is_concave(),
            Relation::Geq => lhs.is_concave() && rhs.is_convex(),
        })
    }

    /// Both sides.
    pub fn sides(&self) -> [ExprId; 2] {
        [self.lhs, self.rhs]
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.lhs, self.relation, self.rhs)
    }
}

/// Extension trait for creating constraints from expression handles.
pub trait ConstraintExt {
    /// Create equality constraint: self == rhs.
    fn equals(self, rhs: ExprId) -> Constraint;

    /// Create inequality constraint: self <= rhs.
    fn leq(self, rhs: ExprId) -> Constraint;

    /// Create inequality constraint: self >= rhs.
    fn geq(self, rhs: ExprId) -> Constraint;
}

impl ConstraintExt for ExprId {
    fn equals(self, rhs: ExprId) -> Constraint {
        Constraint::eq(self, rhs)
    }

    fn leq(self, rhs: ExprId) -> Constraint {
        Constraint::leq(self, rhs)
    }

    fn geq(self, rhs: ExprId) -> Constraint {
        Constraint::geq(self, rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_affine_equality_is_dcp() {
        let mut g = ExprGraph::new();
        let x = g.variable(5);
        let c = g.constant(1.0);
        let constr = x.equals(c);
        assert_eq!(constr.relation, Relation::Eq);
        assert!(constr.is_dcp(&g).unwrap());
    }

    #[test]
    fn test_convex_side_rules() {
        let mut g = ExprGraph::new();
        let x = g.variable(5);
        let norm_x = g.norm2(x).unwrap();
        let one = g.constant(1.0);

        assert!(norm_x.leq(one).is_dcp(&g).unwrap());
        // norm(x) >= 1 is NOT DCP (convex >= constant)
        assert!(!norm_x.geq(one).is_dcp(&g).unwrap());
        assert!(one.geq(norm_x).is_dcp(&g).unwrap());
        assert!(!norm_x.equals(one).is_dcp(&g).unwrap());
    }

    #[test]
    fn test_concave_side_rules() {
        let mut g = ExprGraph::new();
        let x = g.variable(());
        let log_x = g.log(x).unwrap();
        let zero = g.constant(0.0);
        assert!(log_x.geq(zero).is_dcp(&g).unwrap());
        assert!(!log_x.leq(zero).is_dcp(&g).unwrap());
    }

    #[test]
    fn test_display() {
        let mut g = ExprGraph::new();
        let x = g.variable(());
        let c = g.constant(0.0);
        assert_eq!(x.leq(c).to_string(), "#0 <= #1");
    }
}
