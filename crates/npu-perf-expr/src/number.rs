//! Exact-where-possible numeric constants.
//!
//! Integer arithmetic stays integral, non-exact integer division produces
//! a normalized rational, and anything touching a float becomes a float.
//! The exact path degrades to float on `i64` overflow instead of panicking.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use num_rational::Rational64;
use num_traits::{CheckedAdd, CheckedDiv, CheckedMul, CheckedSub};

/// A folded numeric constant.
#[derive(Clone, Copy, Debug)]
pub enum Number {
    Int(i64),
    Rational(Rational64),
    Float(f64),
}

impl Number {
    /// Builds a normalized `numer / denom`.
    ///
    /// A zero denominator folds to a float (`inf` or `NaN`).
    pub fn ratio(numer: i64, denom: i64) -> Self {
        if denom == 0 {
            return Self::Float(numer as f64 / 0.0);
        }
        Rational64::from_integer(numer)
            .checked_div(&Rational64::from_integer(denom))
            .map_or(Self::Float(numer as f64 / denom as f64), Self::from_exact)
    }

    fn from_exact(value: Rational64) -> Self {
        if value.is_integer() {
            Self::Int(value.to_integer())
        } else {
            Self::Rational(value)
        }
    }

    fn exact(self) -> Option<Rational64> {
        match self {
            Self::Int(v) => Some(Rational64::from_integer(v)),
            Self::Rational(r) => Some(r),
            Self::Float(_) => None,
        }
    }

    /// Lossy conversion to `f64`.
    pub fn to_f64(self) -> f64 {
        match self {
            Self::Int(v) => v as f64,
            Self::Rational(r) => *r.numer() as f64 / *r.denom() as f64,
            Self::Float(v) => v,
        }
    }

    /// Returns the integer value if this is an `Int`.
    pub fn as_i64(self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(v),
            _ => None,
        }
    }

    /// Exact integer zero. `Float(0.0)` is deliberately not included.
    pub fn is_zero(self) -> bool {
        matches!(self, Self::Int(0))
    }

    /// Exact integer one.
    pub fn is_one(self) -> bool {
        matches!(self, Self::Int(1))
    }

    pub fn is_negative(self) -> bool {
        match self {
            Self::Int(v) => v < 0,
            Self::Rational(r) => *r.numer() < 0,
            Self::Float(v) => v.is_sign_negative(),
        }
    }

    fn arith(
        self,
        rhs: Self,
        int_op: fn(i64, i64) -> Option<i64>,
        exact_op: fn(&Rational64, &Rational64) -> Option<Rational64>,
        float_op: fn(f64, f64) -> f64,
    ) -> Self {
        if let (Self::Int(l), Self::Int(r)) = (self, rhs) {
            if let Some(v) = int_op(l, r) {
                return Self::Int(v);
            }
        }
        if let (Some(l), Some(r)) = (self.exact(), rhs.exact()) {
            if let Some(v) = exact_op(&l, &r) {
                return Self::from_exact(v);
            }
        }
        Self::Float(float_op(self.to_f64(), rhs.to_f64()))
    }

    pub fn add(self, rhs: Self) -> Self {
        self.arith(rhs, i64::checked_add, <Rational64 as CheckedAdd>::checked_add, |l, r| l + r)
    }

    pub fn sub(self, rhs: Self) -> Self {
        self.arith(rhs, i64::checked_sub, <Rational64 as CheckedSub>::checked_sub, |l, r| l - r)
    }

    pub fn mul(self, rhs: Self) -> Self {
        self.arith(rhs, i64::checked_mul, <Rational64 as CheckedMul>::checked_mul, |l, r| l * r)
    }

    /// Exact division when both sides are exact; `x / 0` folds to a float.
    pub fn div(self, rhs: Self) -> Self {
        if rhs.exact().is_some_and(|r| *r.numer() == 0) {
            return Self::Float(self.to_f64() / 0.0);
        }
        self.arith(
            rhs,
            |l, r| (l.checked_rem(r) == Some(0)).then(|| l.checked_div(r)).flatten(),
            <Rational64 as CheckedDiv>::checked_div,
            |l, r| l / r,
        )
    }

    /// Floored modulo: the result takes the sign of the divisor.
    pub fn modulo(self, rhs: Self) -> Self {
        if rhs.exact().is_some_and(|r| *r.numer() == 0) {
            return Self::Float(f64::NAN);
        }
        self.arith(
            rhs,
            |l, r| {
                let rem = l.checked_rem(r)?;
                if rem != 0 && (rem < 0) != (r < 0) {
                    rem.checked_add(r)
                } else {
                    Some(rem)
                }
            },
            |l, r| {
                let quotient = l.checked_div(r)?.floor();
                l.checked_sub(&r.checked_mul(&quotient)?)
            },
            |l, r| l - r * (l / r).floor(),
        )
    }

    pub fn min(self, rhs: Self) -> Self {
        match self.cmp_value(rhs) {
            Some(Ordering::Greater) => rhs,
            Some(_) => self,
            None => Self::Float(f64::NAN),
        }
    }

    pub fn max(self, rhs: Self) -> Self {
        match self.cmp_value(rhs) {
            Some(Ordering::Less) => rhs,
            Some(_) => self,
            None => Self::Float(f64::NAN),
        }
    }

    pub fn neg(self) -> Self {
        match self {
            Self::Int(v) => v
                .checked_neg()
                .map_or(Self::Float(-(v as f64)), Self::Int),
            Self::Rational(r) => r
                .numer()
                .checked_neg()
                .map_or(Self::Float(-self.to_f64()), |n| {
                    Self::from_exact(Rational64::new_raw(n, *r.denom()))
                }),
            Self::Float(v) => Self::Float(-v),
        }
    }

    pub fn ceil(self) -> Self {
        match self {
            Self::Int(_) => self,
            Self::Rational(r) => {
                let (floor, rem) = floor_rem(r);
                Self::Int(if rem == 0 { floor } else { floor + 1 })
            }
            Self::Float(v) => float_to_int(v.ceil()),
        }
    }

    pub fn floor(self) -> Self {
        match self {
            Self::Int(_) => self,
            Self::Rational(r) => Self::Int(floor_rem(r).0),
            Self::Float(v) => float_to_int(v.floor()),
        }
    }

    /// Numeric (not structural) comparison. `None` only when a NaN is
    /// involved.
    pub fn cmp_value(self, rhs: Self) -> Option<Ordering> {
        match (self.exact(), rhs.exact()) {
            (Some(l), Some(r)) => Some(l.cmp(&r)),
            _ => self.to_f64().partial_cmp(&rhs.to_f64()),
        }
    }

    pub fn is_finite(self) -> bool {
        match self {
            Self::Float(v) => v.is_finite(),
            _ => true,
        }
    }

    fn tag(&self) -> u8 {
        match self {
            Self::Int(_) => 0,
            Self::Rational(_) => 1,
            Self::Float(_) => 2,
        }
    }
}

/// Euclidean quotient and remainder of a normalized rational. The
/// denominator is positive, so neither step can overflow and a non-integer
/// quotient stays below `i64::MAX`.
fn floor_rem(r: Rational64) -> (i64, i64) {
    (r.numer().div_euclid(*r.denom()), r.numer().rem_euclid(*r.denom()))
}

fn float_to_int(v: f64) -> Number {
    if v.is_finite() && v >= i64::MIN as f64 && v < i64::MAX as f64 {
        Number::Int(v as i64)
    } else {
        Number::Float(v)
    }
}

// Structural identity: `Int(2)` and `Float(2.0)` are different constants,
// and floats compare by bit pattern so that `Number` can key a map.

impl PartialEq for Number {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Number {}

impl PartialOrd for Number {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Number {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Int(l), Self::Int(r)) => l.cmp(r),
            (Self::Rational(l), Self::Rational(r)) => l.cmp(r),
            (Self::Float(l), Self::Float(r)) => l.total_cmp(r),
            _ => self.tag().cmp(&other.tag()),
        }
    }
}

impl Hash for Number {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.tag().hash(state);
        match self {
            Self::Int(v) => v.hash(state),
            Self::Rational(r) => r.hash(state),
            Self::Float(v) => v.to_bits().hash(state),
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Rational(r) => write!(f, "{}/{}", r.numer(), r.denom()),
            // Non-finite values print as the division that folds back to them.
            Self::Float(v) if v.is_nan() => f.write_str("(0.0 / 0.0)"),
            Self::Float(v) if v.is_infinite() && *v > 0.0 => f.write_str("(1.0 / 0.0)"),
            Self::Float(v) if v.is_infinite() => f.write_str("(-1.0 / 0.0)"),
            // Debug keeps the trailing `.0`, so `2.0` never prints like `Int(2)`.
            Self::Float(v) => write!(f, "{v:?}"),
        }
    }
}

impl From<i64> for Number {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for Number {
    fn from(v: i32) -> Self {
        Self::Int(v.into())
    }
}

impl From<u32> for Number {
    fn from(v: u32) -> Self {
        Self::Int(v.into())
    }
}

impl From<u64> for Number {
    fn from(v: u64) -> Self {
        i64::try_from(v).map_or(Self::Float(v as f64), Self::Int)
    }
}

impl From<usize> for Number {
    fn from(v: usize) -> Self {
        i64::try_from(v).map_or(Self::Float(v as f64), Self::Int)
    }
}

impl From<f64> for Number {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<Rational64> for Number {
    fn from(v: Rational64) -> Self {
        Self::from_exact(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_arithmetic_stays_exact() {
        assert_eq!(Number::Int(3).add(Number::Int(4)), Number::Int(7));
        assert_eq!(Number::Int(3).mul(Number::Int(4)), Number::Int(12));
        assert_eq!(Number::Int(12).div(Number::Int(4)), Number::Int(3));
    }

    #[test]
    fn inexact_division_is_rational() {
        let half = Number::Int(7).div(Number::Int(2));
        assert_eq!(half, Number::Rational(Rational64::new(7, 2)));
        assert_eq!(half.to_string(), "7/2");
        // Rational back to integer once the denominator cancels.
        assert_eq!(half.mul(Number::Int(2)), Number::Int(7));
    }

    #[test]
    fn float_contaminates() {
        let v = Number::Int(3000).mul(Number::Float(0.0077));
        assert!(matches!(v, Number::Float(_)));
        assert!((v.to_f64() - 23.1).abs() < 1e-9);
    }

    #[test]
    fn overflow_degrades_to_float() {
        let v = Number::Int(i64::MAX).add(Number::Int(1));
        assert!(matches!(v, Number::Float(_)));

        let third = Number::Int(i64::MIN).div(Number::Int(3));
        assert!(matches!(third, Number::Rational(_)));
        let negated = third.neg();
        assert!(matches!(negated, Number::Float(_)));
        assert!((negated.to_f64() - (i64::MIN as f64 / -3.0)).abs() < 1e3);

        assert!(matches!(Number::Int(i64::MIN).neg(), Number::Float(_)));
        assert!(matches!(Number::ratio(i64::MIN, -1), Number::Float(_)));
    }

    #[test]
    fn rational_rounding_near_the_integer_limits() {
        let top = Number::ratio(i64::MAX, 2);
        assert_eq!(top.ceil(), Number::Int(i64::MAX / 2 + 1));
        assert_eq!(top.floor(), Number::Int(i64::MAX / 2));
        let bottom = Number::ratio(i64::MIN + 1, 2);
        assert_eq!(bottom.floor(), Number::Int(i64::MIN / 2));
        assert_eq!(bottom.ceil(), Number::Int(i64::MIN / 2 + 1));
        assert_eq!(Number::ratio(-1, 3).neg(), Number::ratio(1, 3));
    }

    #[test]
    fn divide_by_zero_folds() {
        assert_eq!(Number::Int(1).div(Number::Int(0)), Number::Float(f64::INFINITY));
        assert!(Number::Int(1).modulo(Number::Int(0)).to_f64().is_nan());
    }

    #[test]
    fn floored_modulo() {
        assert_eq!(Number::Int(70).modulo(Number::Int(32)), Number::Int(6));
        assert_eq!(Number::Int(-1).modulo(Number::Int(32)), Number::Int(31));
        assert_eq!(Number::ratio(7, 2).modulo(Number::Int(2)), Number::ratio(3, 2));
    }

    #[test]
    fn ceil_and_floor() {
        assert_eq!(Number::ratio(5, 2).ceil(), Number::Int(3));
        assert_eq!(Number::ratio(5, 2).floor(), Number::Int(2));
        assert_eq!(Number::ratio(-5, 2).ceil(), Number::Int(-2));
        assert_eq!(Number::Float(2.1).ceil(), Number::Int(3));
        assert_eq!(Number::Int(4).ceil(), Number::Int(4));
    }

    #[test]
    fn min_max_compare_values() {
        assert_eq!(Number::Int(3).min(Number::Float(2.5)), Number::Float(2.5));
        assert_eq!(Number::ratio(1, 3).max(Number::Int(0)), Number::ratio(1, 3));
    }

    #[test]
    fn structural_identity() {
        assert_ne!(Number::Int(2), Number::Float(2.0));
        assert_eq!(Number::Float(f64::NAN), Number::Float(f64::NAN));
        assert_eq!(Number::Float(2.0).to_string(), "2.0");
        assert_eq!(Number::Int(2).to_string(), "2");
    }

    #[test]
    fn non_finite_text() {
        assert_eq!(Number::Int(1).div(Number::Int(0)).to_string(), "(1.0 / 0.0)");
        assert_eq!(Number::Int(-1).div(Number::Int(0)).to_string(), "(-1.0 / 0.0)");
        assert_eq!(Number::Float(f64::NAN).to_string(), "(0.0 / 0.0)");
        assert!(!Number::Float(f64::INFINITY).is_finite());
        assert!(Number::ratio(1, 3).is_finite());
    }
}
