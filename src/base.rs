// SPDX-License-Identifier: EPL-2.0 OR GPL-2.0-or-later
// SPDX-FileCopyrightText: Bradley M. Bell <bradbell@seanet.com>
// SPDX-FileContributor: 2025 Bradley M. Bell
// ---------------------------------------------------------------------------
//
//! This pub module defines the `Base` trait: the scalar type carried by
//! the tape (see `spec.md` §3, §9).
//!
//! Link to [parent module](super)
//!
//! The tape buffers, the [AD](crate::AD) active scalar, and every sweep
//! are generic over `Base`; this module is the only place that has to
//! know how to compute an elementary function's *value* (the formula
//! itself is an out-of-scope "external collaborator" per `spec.md` §1 —
//! this crate only needs the interface below, grounded on
//! `src/float/core.rs` (`FloatCore`) and `src/az_float.rs`'s `AzFloat`
//! absolute-zero semantics).
// ---------------------------------------------------------------------------
use std::ops::{Add, Div, Mul, Neg, Sub};
//
// Base
/// The numeric type carried by a tape.
///
/// * `azmul` implements the "absolute zero multiply" from `spec.md`
///   §6: it returns zero whenever either operand is exactly (identically)
///   zero, even when the other operand is `NaN` or infinite. This is not
///   the same as `self * other`, whose result is `NaN` when one operand
///   is `0` and the other is `NaN` or `inf`.
pub trait Base:
    Copy
    + Clone
    + std::fmt::Debug
    + std::fmt::Display
    + PartialEq
    + PartialOrd
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Neg<Output = Self>
    + From<f64>
    + 'static
{
    /// IEEE not-a-number for this type.
    fn nan() -> Self;
    /// additive identity
    fn zero() -> Self {
        Self::from(0.0)
    }
    /// multiplicative identity
    fn one() -> Self {
        Self::from(1.0)
    }
    /// true if `self` is `NaN`
    fn is_nan(self) -> bool;
    /// true if `self` is bitwise/logically the constant `0`, used by the
    /// optimizer's constant-folding and cumulative-sum passes
    /// (`spec.md` §9's `is_identical_zero`).
    fn is_identical_zero(self) -> bool {
        !self.is_nan() && self == Self::zero()
    }
    /// true if `self` is identically `1` (`spec.md` §9's `is_identical_one`).
    fn is_identical_one(self) -> bool {
        !self.is_nan() && self == Self::one()
    }
    /// truncate towards zero and return as `i64`, used by VecAD and CExp
    /// index computation.
    fn to_i64(self) -> i64;

    fn abs(self) -> Self;
    fn sign(self) -> Self;
    fn sqrt(self) -> Self;
    fn exp(self) -> Self;
    fn expm1(self) -> Self;
    fn ln(self) -> Self;
    fn ln_1p(self) -> Self;
    fn sin(self) -> Self;
    fn cos(self) -> Self;
    fn tan(self) -> Self;
    fn asin(self) -> Self;
    fn acos(self) -> Self;
    fn atan(self) -> Self;
    fn sinh(self) -> Self;
    fn cosh(self) -> Self;
    fn tanh(self) -> Self;
    fn asinh(self) -> Self;
    fn acosh(self) -> Self;
    fn atanh(self) -> Self;
    fn erf(self) -> Self;
    fn powf(self, p: Self) -> Self;

    /// absolute-zero multiply; see trait docs and `spec.md` §6, §8 (S8).
    fn azmul(self, other: Self) -> Self {
        if self.is_identical_zero() || other.is_identical_zero() {
            Self::zero()
        } else {
            self * other
        }
    }
}
//
// impl_base_for_float!
/// Implement [Base] for a primitive floating point type.
///
/// This macro must be executed once for each concrete `Base` this crate
/// wants to support; the crate executes it for `f64` and `f32`, mirroring
/// the teacher's `impl_this_thread_tape!`/`impl_ad_from_f32!` convention
/// of one macro invocation per concrete numeric type.
macro_rules! impl_base_for_float { ($F:ty) => {
    impl Base for $F {
        fn nan() -> Self { <$F>::NAN }
        fn is_nan(self) -> bool { <$F>::is_nan(self) }
        fn to_i64(self) -> i64 { self as i64 }
        fn abs(self) -> Self { <$F>::abs(self) }
        fn sign(self) -> Self {
            if self.is_nan() { Self::nan() }
            else if self > 0.0 { 1.0 }
            else if self < 0.0 { -1.0 }
            else { 0.0 }
        }
        fn sqrt(self)   -> Self { <$F>::sqrt(self) }
        fn exp(self)    -> Self { <$F>::exp(self) }
        fn expm1(self)  -> Self { <$F>::exp_m1(self) }
        fn ln(self)     -> Self { <$F>::ln(self) }
        fn ln_1p(self)  -> Self { <$F>::ln_1p(self) }
        fn sin(self)    -> Self { <$F>::sin(self) }
        fn cos(self)    -> Self { <$F>::cos(self) }
        fn tan(self)    -> Self { <$F>::tan(self) }
        fn asin(self)   -> Self { <$F>::asin(self) }
        fn acos(self)   -> Self { <$F>::acos(self) }
        fn atan(self)   -> Self { <$F>::atan(self) }
        fn sinh(self)   -> Self { <$F>::sinh(self) }
        fn cosh(self)   -> Self { <$F>::cosh(self) }
        fn tanh(self)   -> Self { <$F>::tanh(self) }
        fn asinh(self)  -> Self { <$F>::asinh(self) }
        fn acosh(self)  -> Self { <$F>::acosh(self) }
        fn atanh(self)  -> Self { <$F>::atanh(self) }
        fn erf(self)    -> Self { erf_series(self as f64) as $F }
        fn powf(self, p: Self) -> Self { <$F>::powf(self, p) }
    }
} }
impl_base_for_float!(f64);
impl_base_for_float!(f32);
//
// erf_series
/// Abramowitz & Stegun 7.1.26 rational approximation to `erf`, used
/// because `erf`/`erfc` are not stable-std functions; accurate to about
/// 1.5e-7, adequate for recording-time values (the derivative formula
/// used during sweeps, `2/sqrt(pi) * exp(-x*x)`, is exact).
fn erf_series(x: f64) -> f64 {
    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();
    let a1 = 0.254829592;
    let a2 = -0.284496736;
    let a3 = 1.421413741;
    let a4 = -1.453152027;
    let a5 = 1.061405429;
    let p = 0.3275911;
    let t = 1.0 / (1.0 + p * x);
    let y = 1.0
        - (((((a5 * t + a4) * t) + a3) * t + a2) * t + a1) * t * (-x * x).exp();
    sign * y
}
//
#[cfg(test)]
mod tests {
    use super::*;
    //
    #[test]
    fn azmul_absolute_zero() {
        assert_eq!(0f64.azmul(f64::NAN), 0.0);
        assert_eq!(f64::NAN.azmul(0.0), 0.0);
        assert_eq!(0f64.azmul(f64::INFINITY), 0.0);
        assert_eq!(2.0f64.azmul(3.0), 6.0);
    }
    #[test]
    fn identical_zero_one() {
        assert!(0f64.is_identical_zero());
        assert!(1f64.is_identical_one());
        assert!(!f64::NAN.is_identical_zero());
    }
}
