//! Canonicalization transforms DCP problems into cone programs.
//!
//! This module converts expressions into:
//! - Linear expressions (LinExpr) over original and auxiliary variables
//! - Cone constraints (ConeConstraint) for nonlinear atoms
//!
//! Affine atoms lower directly (`affine`); nonlinear atoms are rewritten by
//! their graph implementations (`graph_impl`).

pub mod affine;
pub mod canonicalizer;
pub mod graph_impl;
pub mod lin_expr;

pub use canonicalizer::{canonicalize, CanonContext, CanonResult, ConeConstraint};
pub use lin_expr::{LinExpr, VarKey};
