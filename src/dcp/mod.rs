//! DCP (Disciplined Convex Programming) analysis.
//!
//! This module provides the two lattices DCP analysis is built on:
//! - Curvature (constant, affine, convex, concave, unknown)
//! - Sign (positive, negative, zero, unknown)
//!
//! and the composition rule combining them.

pub mod curvature;
pub mod sign;

pub use curvature::{
    add_curvature, compose_argument, sub_curvature, Curvature, Monotonicity, PsdStatus,
    PSD_TOLERANCE,
};
pub use sign::{add_sign, join_sign, mul_sign, Sign};
