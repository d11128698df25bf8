//! Atom catalog.
//!
//! Atoms are the operators expressions are built from. The catalog is closed:
//! every operator is a variant of [`AtomKind`], and each variant is described
//! by a static [`AtomSpec`] (see [`registry`]).
//!
//! - Affine atoms (`affine`): lowered directly to coefficient matrices.
//! - Nonlinear atoms (`nonlinear`): rewritten through graph implementations.

pub mod affine;
pub mod nonlinear;
pub mod registry;

use std::sync::Arc;

use nalgebra::DMatrix;

use crate::dcp::PsdStatus;
use crate::error::ConstructionError;
use crate::expr::Shape;

pub use registry::{Arity, AtomSpec, CurvatureRule, Lowering};

/// Relative slack when checking a quadratic form matrix for symmetry.
pub const SYMMETRY_TOLERANCE: f64 = 1e-9;

/// Operator applied by an atom node.
#[derive(Debug, Clone, PartialEq)]
pub enum AtomKind {
    /// Elementwise sum of any number of arguments (with scalar broadcasting).
    Add,
    Neg,
    /// Elementwise product (with scalar broadcasting).
    Mul,
    /// Matrix product.
    MatMul,
    /// Sum of all entries.
    Sum,
    /// Column-major reshape.
    Reshape(Shape),
    /// Entries `start..stop` of the column-major flattening.
    Index { start: usize, stop: usize },
    /// Vertical concatenation.
    VStack,
    Transpose,
    Trace,
    Abs,
    /// `max(x, 0)`.
    Pos,
    /// `max(-x, 0)`.
    NegPart,
    /// Elementwise maximum of the arguments.
    Maximum,
    /// Elementwise minimum of the arguments.
    Minimum,
    Norm1,
    Norm2,
    NormInf,
    SumSquares,
    /// `x' P x` for a fixed symmetric `P`.
    QuadForm(Arc<QuadFormData>),
    /// `sum(x^2) / y` for scalar `y > 0`.
    QuadOverLin,
    Exp,
    Log,
    /// `-x log x`, elementwise.
    Entropy,
    /// Elementwise `x^p`; `|x|^p` for `p > 1`.
    Power(f64),
}

/// Validated matrix of a quadratic form.
#[derive(Debug, Clone, PartialEq)]
pub struct QuadFormData {
    p: DMatrix<f64>,
    psd: PsdStatus,
}

impl QuadFormData {
    /// Check that `p` is square and symmetric and classify its definiteness.
    pub fn new(p: DMatrix<f64>) -> Result<Self, ConstructionError> {
        if p.nrows() != p.ncols() || p.nrows() == 0 {
            return Err(ConstructionError::ShapeMismatch {
                atom: "quad_form",
                expected: "a non-empty square matrix".into(),
                got: format!("{} x {}", p.nrows(), p.ncols()),
            });
        }
        let scale = p.amax().max(1.0);
        if (&p - p.transpose()).amax() > SYMMETRY_TOLERANCE * scale {
            return Err(ConstructionError::InvalidArgument {
                atom: "quad_form",
                reason: "matrix is not symmetric".into(),
            });
        }
        let psd = PsdStatus::of_symmetric(&p);
        Ok(QuadFormData { p, psd })
    }

    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.p
    }

    pub fn psd(&self) -> PsdStatus {
        self.psd
    }

    pub fn dim(&self) -> usize {
        self.p.nrows()
    }
}

impl AtomKind {
    /// The static descriptor for this kind.
    pub fn spec(&self) -> &'static AtomSpec {
        use affine::*;
        use nonlinear::*;
        match self {
            AtomKind::Add => &ADD,
            AtomKind::Neg => &NEG,
            AtomKind::Mul => &MUL,
            AtomKind::MatMul => &MATMUL,
            AtomKind::Sum => &SUM,
            AtomKind::Reshape(_) => &RESHAPE,
            AtomKind::Index { .. } => &INDEX,
            AtomKind::VStack => &VSTACK,
            AtomKind::Transpose => &TRANSPOSE,
            AtomKind::Trace => &TRACE,
            AtomKind::Abs => &ABS,
            AtomKind::Pos => &POS,
            AtomKind::NegPart => &NEG_PART,
            AtomKind::Maximum => &MAXIMUM,
            AtomKind::Minimum => &MINIMUM,
            AtomKind::Norm1 => &NORM1,
            AtomKind::Norm2 => &NORM2,
            AtomKind::NormInf => &NORM_INF,
            AtomKind::SumSquares => &SUM_SQUARES,
            AtomKind::QuadForm(_) => &QUAD_FORM,
            AtomKind::QuadOverLin => &QUAD_OVER_LIN,
            AtomKind::Exp => &EXP,
            AtomKind::Log => &LOG,
            AtomKind::Entropy => &ENTROPY,
            AtomKind::Power(_) => &POWER,
        }
    }

    pub fn name(&self) -> &'static str {
        self.spec().name
    }
}

static REGISTRY: [&AtomSpec; 25] = [
    &affine::ADD,
    &affine::NEG,
    &affine::MUL,
    &affine::MATMUL,
    &affine::SUM,
    &affine::RESHAPE,
    &affine::INDEX,
    &affine::VSTACK,
    &affine::TRANSPOSE,
    &affine::TRACE,
    &nonlinear::ABS,
    &nonlinear::POS,
    &nonlinear::NEG_PART,
    &nonlinear::MAXIMUM,
    &nonlinear::MINIMUM,
    &nonlinear::NORM1,
    &nonlinear::NORM2,
    &nonlinear::NORM_INF,
    &nonlinear::SUM_SQUARES,
    &nonlinear::QUAD_FORM,
    &nonlinear::QUAD_OVER_LIN,
    &nonlinear::EXP,
    &nonlinear::LOG,
    &nonlinear::ENTROPY,
    &nonlinear::POWER,
];

/// Every registered atom.
pub fn registry() -> &'static [&'static AtomSpec] {
    &REGISTRY
}

/// Look up an atom by name.
pub fn lookup(name: &str) -> Option<&'static AtomSpec> {
    REGISTRY.iter().copied().find(|spec| spec.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_names_are_unique() {
        let mut names: Vec<_> = registry().iter().map(|s| s.name).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), registry().len());
    }

    #[test]
    fn test_every_atom_has_a_lowering() {
        for spec in registry() {
            assert!(
                !matches!(spec.lowering, Lowering::None),
                "{} cannot be canonicalized",
                spec.name
            );
        }
    }

    #[test]
    fn test_lookup() {
        assert_eq!(lookup("abs").map(|s| s.name), Some("abs"));
        assert!(lookup("abs").is_some_and(|s| !s.is_primitive()));
        assert!(lookup("sum").is_some_and(|s| s.is_primitive()));
        assert!(lookup("frobnicate").is_none());
    }

    #[test]
    fn test_quad_form_data_validation() {
        let asym = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 0.0, 1.0]);
        assert!(QuadFormData::new(asym).is_err());
        let rect = DMatrix::zeros(2, 3);
        assert!(QuadFormData::new(rect).is_err());
        let q = QuadFormData::new(DMatrix::identity(2, 2)).unwrap();
        assert_eq!(q.psd(), PsdStatus::Psd);
        assert_eq!(q.dim(), 2);
    }
}
