//! Curvature tracking for DCP (Disciplined Convex Programming).
//!
//! This module implements the curvature lattice
//! `Constant ⊑ Affine ⊑ {Convex, Concave} ⊑ Unknown`, the arithmetic on it,
//! and the composition (chain) rule used by every atom.

use std::fmt;
use std::ops::{Add, Neg, Sub};

use nalgebra::DMatrix;

use super::sign::Sign;

/// Curvature of an expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Curvature {
    /// Constant value (most restrictive).
    Constant,
    /// Affine function (both convex and concave).
    Affine,
    /// Convex function.
    Convex,
    /// Concave function.
    Concave,
    /// Unknown curvature (not DCP-compliant).
    Unknown,
}

impl Curvature {
    /// All five curvatures, in lattice order.
    pub const ALL: [Curvature; 5] = [
        Curvature::Constant,
        Curvature::Affine,
        Curvature::Convex,
        Curvature::Concave,
        Curvature::Unknown,
    ];

    /// Check if the curvature is convex (constant, affine, or convex).
    pub fn is_convex(self) -> bool {
        matches!(self, Curvature::Constant | Curvature::Affine | Curvature::Convex)
    }

    /// Check if the curvature is concave (constant, affine, or concave).
    pub fn is_concave(self) -> bool {
        matches!(self, Curvature::Constant | Curvature::Affine | Curvature::Concave)
    }

    /// Check if the curvature is affine (constant or affine).
    pub fn is_affine(self) -> bool {
        matches!(self, Curvature::Constant | Curvature::Affine)
    }

    /// Check if this is a constant.
    pub fn is_constant(self) -> bool {
        matches!(self, Curvature::Constant)
    }

    /// Check if the curvature is certified at all.
    pub fn is_dcp(self) -> bool {
        !matches!(self, Curvature::Unknown)
    }

    /// Negate the curvature (convex <-> concave).
    pub fn negate(self) -> Self {
        match self {
            Curvature::Convex => Curvature::Concave,
            Curvature::Concave => Curvature::Convex,
            other => other,
        }
    }

    /// Curvature of `s * self` where `s` is a constant of sign `sign`.
    ///
    /// A zero factor leaves an affine (constant-valued) function behind. A
    /// factor of unknown sign keeps only affinity.
    pub fn sign_mul(self, sign: Sign) -> Self {
        match sign {
            Sign::Positive => self,
            Sign::Negative => self.negate(),
            Sign::Zero => match self {
                Curvature::Constant => Curvature::Constant,
                _ => Curvature::Affine,
            },
            Sign::Unknown => match self {
                Curvature::Constant => Curvature::Constant,
                Curvature::Affine => Curvature::Affine,
                _ => Curvature::Unknown,
            },
        }
    }
}

/// Combine curvatures for addition: a + b.
pub fn add_curvature(a: Curvature, b: Curvature) -> Curvature {
    use Curvature::*;
    match (a, b) {
        (Unknown, _) | (_, Unknown) => Unknown,
        (Constant, x) | (x, Constant) => x,
        (Affine, x) | (x, Affine) => x,
        (Convex, Convex) => Convex,
        (Concave, Concave) => Concave,
        (Convex, Concave) | (Concave, Convex) => Unknown,
    }
}

/// Combine curvatures for subtraction: a - b = a + (-b).
pub fn sub_curvature(a: Curvature, b: Curvature) -> Curvature {
    add_curvature(a, b.negate())
}

impl Add for Curvature {
    type Output = Curvature;

    fn add(self, rhs: Curvature) -> Curvature {
        add_curvature(self, rhs)
    }
}

impl Sub for Curvature {
    type Output = Curvature;

    fn sub(self, rhs: Curvature) -> Curvature {
        sub_curvature(self, rhs)
    }
}

impl Neg for Curvature {
    type Output = Curvature;

    fn neg(self) -> Curvature {
        self.negate()
    }
}

impl fmt::Display for Curvature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Curvature::Constant => "CONSTANT",
            Curvature::Affine => "AFFINE",
            Curvature::Convex => "CONVEX",
            Curvature::Concave => "CONCAVE",
            Curvature::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

/// Monotonicity of an atom in one of its arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Monotonicity {
    Nondecreasing,
    Nonincreasing,
    Neither,
}

impl Monotonicity {
    /// Nondecreasing for a non-negative argument, nonincreasing for a
    /// non-positive one. Covers `abs`, norms and even powers.
    pub fn by_sign(sign: Sign) -> Self {
        if sign.is_nonneg() {
            Monotonicity::Nondecreasing
        } else if sign.is_nonpos() {
            Monotonicity::Nonincreasing
        } else {
            Monotonicity::Neither
        }
    }
}

/// Chain rule for a single argument.
///
/// Returns the curvature contributed by an argument of curvature `arg` to an
/// atom with intrinsic curvature `intrinsic` that has monotonicity `mono` in
/// that argument. The atom's curvature is the sum of all contributions.
pub fn compose_argument(intrinsic: Curvature, mono: Monotonicity, arg: Curvature) -> Curvature {
    match mono {
        Monotonicity::Nondecreasing => intrinsic + arg,
        Monotonicity::Nonincreasing => intrinsic + arg.negate(),
        Monotonicity::Neither if arg.is_affine() => intrinsic + Curvature::Affine,
        Monotonicity::Neither => Curvature::Unknown,
    }
}

/// Definiteness of a symmetric matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PsdStatus {
    Psd,
    Nsd,
    Neither,
}

/// Eigenvalue slack when classifying definiteness.
pub const PSD_TOLERANCE: f64 = 1e-10;

impl PsdStatus {
    /// Classify a symmetric matrix by the signs of its eigenvalues.
    pub fn of_symmetric(m: &DMatrix<f64>) -> Self {
        if m.nrows() == 0 || m.nrows() != m.ncols() {
            return PsdStatus::Neither;
        }
        let eigenvalues = m.symmetric_eigenvalues();
        let scale = eigenvalues.iter().fold(1.0_f64, |acc, v| acc.max(v.abs()));
        let tol = PSD_TOLERANCE * scale;
        if eigenvalues.iter().all(|&v| v >= -tol) {
            PsdStatus::Psd
        } else if eigenvalues.iter().all(|&v| v <= tol) {
            PsdStatus::Nsd
        } else {
            PsdStatus::Neither
        }
    }

    /// Curvature of `x' P x` for affine `x`.
    pub fn curvature(self) -> Curvature {
        match self {
            PsdStatus::Psd => Curvature::Convex,
            PsdStatus::Nsd => Curvature::Concave,
            PsdStatus::Neither => Curvature::Unknown,
        }
    }
}
