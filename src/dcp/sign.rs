//! Sign tracking for DCP (Disciplined Convex Programming).
//!
//! A sign is a conservative fact about every entry of an expression:
//! `Positive` means all entries are `>= 0`, `Negative` means all entries are
//! `<= 0`. Sign information feeds the sign-dependent monotonicity of atoms
//! such as `abs` and the scaling rule for products.

use std::fmt;
use std::ops::{Add, Mul, Neg};

/// Sign of an expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sign {
    /// Expression is always >= 0.
    Positive,
    /// Expression is always <= 0.
    Negative,
    /// Expression is always == 0.
    Zero,
    /// Sign is unknown.
    Unknown,
}

impl Sign {
    /// All four signs, in declaration order.
    pub const ALL: [Sign; 4] = [Sign::Positive, Sign::Negative, Sign::Zero, Sign::Unknown];

    /// Sign of a single number. NaN has unknown sign.
    pub fn of_value(v: f64) -> Self {
        if v == 0.0 {
            Sign::Zero
        } else if v > 0.0 {
            Sign::Positive
        } else if v < 0.0 {
            Sign::Negative
        } else {
            Sign::Unknown
        }
    }

    /// Tightest sign describing every value in `values`.
    ///
    /// An empty collection is `Zero`.
    pub fn of_values<I: IntoIterator<Item = f64>>(values: I) -> Self {
        values
            .into_iter()
            .map(Sign::of_value)
            .fold(Sign::Zero, join_sign)
    }

    /// Check if the sign is non-negative (>= 0).
    pub fn is_nonneg(self) -> bool {
        matches!(self, Sign::Positive | Sign::Zero)
    }

    /// Check if the sign is non-positive (<= 0).
    pub fn is_nonpos(self) -> bool {
        matches!(self, Sign::Negative | Sign::Zero)
    }

    /// Check if the sign is zero.
    pub fn is_zero(self) -> bool {
        matches!(self, Sign::Zero)
    }

    /// Negate the sign.
    pub fn negate(self) -> Self {
        match self {
            Sign::Positive => Sign::Negative,
            Sign::Negative => Sign::Positive,
            Sign::Zero => Sign::Zero,
            Sign::Unknown => Sign::Unknown,
        }
    }

    /// Whether a value of sign `self` is also described by `declared`.
    pub fn conforms_to(self, declared: Sign) -> bool {
        match declared {
            Sign::Unknown => true,
            Sign::Positive => self.is_nonneg(),
            Sign::Negative => self.is_nonpos(),
            Sign::Zero => self.is_zero(),
        }
    }
}

/// Combine signs for addition: a + b.
pub fn add_sign(a: Sign, b: Sign) -> Sign {
    use Sign::*;
    match (a, b) {
        (Zero, x) | (x, Zero) => x,
        (Positive, Positive) => Positive,
        (Negative, Negative) => Negative,
        (Positive, Negative) | (Negative, Positive) => Unknown,
        (Unknown, _) | (_, Unknown) => Unknown,
    }
}

/// Combine signs for multiplication: a * b.
pub fn mul_sign(a: Sign, b: Sign) -> Sign {
    use Sign::*;
    match (a, b) {
        // Zero absorbs even an unknown factor.
        (Zero, _) | (_, Zero) => Zero,
        (Positive, Positive) | (Negative, Negative) => Positive,
        (Positive, Negative) | (Negative, Positive) => Negative,
        (Unknown, _) | (_, Unknown) => Unknown,
    }
}

/// Least sign describing both `a` and `b` (used for stacking and data).
pub fn join_sign(a: Sign, b: Sign) -> Sign {
    use Sign::*;
    match (a, b) {
        (x, y) if x == y => x,
        (Zero, x) | (x, Zero) => x,
        _ => Unknown,
    }
}

impl Add for Sign {
    type Output = Sign;

    fn add(self, rhs: Sign) -> Sign {
        add_sign(self, rhs)
    }
}

impl Mul for Sign {
    type Output = Sign;

    fn mul(self, rhs: Sign) -> Sign {
        mul_sign(self, rhs)
    }
}

impl Neg for Sign {
    type Output = Sign;

    fn neg(self) -> Sign {
        self.negate()
    }
}

impl fmt::Display for Sign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Sign::Positive => "POSITIVE",
            Sign::Negative => "NEGATIVE",
            Sign::Zero => "ZERO",
            Sign::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}
