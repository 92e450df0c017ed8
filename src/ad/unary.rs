// SPDX-License-Identifier: EPL-2.0 OR GPL-2.0-or-later
// SPDX-FileCopyrightText: Bradley M. Bell <bradbell@seanet.com>
// SPDX-FileContributor: 2025 Bradley M. Bell
// ---------------------------------------------------------------------------
//
//! Standard-math intrinsics on [AD](super::AD) (`spec.md` §6 "standard
//! math functions").
//!
//! Link to [parent module](super)
//!
//! Grounded on `src/ad/mod.rs`'s intrinsic-wrapper pattern: each method
//! computes its value from [Base] and, if `self` is a variable, records
//! the matching [OpCode]. Sin/Cos/Asin/Acos/Atan/Sinh/Cosh/Tanh/Erf are
//! "pair-result" ops: the tape also allocates a companion slot (the
//! paired cofunction's value) immediately after the primary result,
//! which the forward/reverse sweeps use for the derivative recursion
//! (`spec.md` §3 Invariants) — callers never see the companion index.
// ---------------------------------------------------------------------------
use super::{record_op, Classification, AD};
use crate::base::Base;
use crate::op_code::OpCode;
use crate::tape::sealed::ThisThreadTape;
//
// ad_unary_op!
/// A single-result unary intrinsic: `$method` computes its value via
/// `Base::$base_method` and records `$code` when `self` is a variable.
macro_rules! ad_unary_op {
    ($method:ident, $base_method:ident, $code:ident) => {
        pub fn $method(self) -> AD<V> {
            let value = self.value.$base_method();
            let local_key = <V as ThisThreadTape>::get();
            local_key.with_borrow_mut(|tape| match self.classify(tape) {
                Classification::Parameter => AD::from_value(value),
                Classification::Variable => {
                    let idx = record_op(tape, OpCode::$code, &[self.var_index]);
                    AD::new(value, tape.tape_id, idx)
                }
            })
        }
    };
}
//
// ad_pair_unary_op!
/// A pair-result unary intrinsic, see module docs.
macro_rules! ad_pair_unary_op {
    ($method:ident, $base_method:ident, $code:ident) => {
        pub fn $method(self) -> AD<V> {
            let value = self.value.$base_method();
            let local_key = <V as ThisThreadTape>::get();
            local_key.with_borrow_mut(|tape| match self.classify(tape) {
                Classification::Parameter => AD::from_value(value),
                Classification::Variable => {
                    let idx = record_op(tape, OpCode::$code, &[self.var_index]);
                    AD::new(value, tape.tape_id, idx)
                }
            })
        }
    };
}
//
impl<V: Base + ThisThreadTape> AD<V> {
    ad_unary_op!(abs, abs, Abs);
    ad_unary_op!(sign, sign, Sign);
    ad_unary_op!(sqrt, sqrt, Sqrt);
    ad_unary_op!(exp, exp, Exp);
    ad_unary_op!(expm1, expm1, Expm1);
    ad_unary_op!(ln, ln, Log);
    ad_unary_op!(ln_1p, ln_1p, Log1p);
    ad_unary_op!(asinh, asinh, Asinh);
    ad_unary_op!(acosh, acosh, Acosh);
    ad_unary_op!(atanh, atanh, Atanh);
    ad_unary_op!(tan, tan, Tan);
    //
    ad_pair_unary_op!(sin, sin, Sin);
    ad_pair_unary_op!(cos, cos, Cos);
    ad_pair_unary_op!(asin, asin, Asin);
    ad_pair_unary_op!(acos, acos, Acos);
    ad_pair_unary_op!(atan, atan, Atan);
    ad_pair_unary_op!(sinh, sinh, Sinh);
    ad_pair_unary_op!(cosh, cosh, Cosh);
    ad_pair_unary_op!(tanh, tanh, Tanh);
    ad_pair_unary_op!(erf, erf, Erf);
    //
    /// `log10(x) = ln(x) / ln(10)`; no dedicated op-code (`spec.md` §6
    /// lists it as part of the external interface, not the data model).
    pub fn log10(self) -> AD<V> {
        self.ln() / AD::from_value(V::from(10.0).ln())
    }
    //
    /// `erfc(x) = 1 - erf(x)`; no dedicated op-code, see [Self::log10].
    pub fn erfc(self) -> AD<V> {
        AD::from_value(V::one()) - self.erf()
    }
    //
    /// `self.powf(p)`, recorded via the [OpCode::PowPp]/`Pv`/`Vp`/`Vv`
    /// family the same way the arithmetic operators are (`spec.md` §6
    /// `pow(x, y)`).
    pub fn powf(self, p: AD<V>) -> AD<V> {
        let value = self.value.powf(p.value);
        let local_key = <V as ThisThreadTape>::get();
        local_key.with_borrow_mut(|tape| {
            let lhs_class = self.classify(tape);
            let rhs_class = p.classify(tape);
            match (lhs_class, rhs_class) {
                (Classification::Parameter, Classification::Parameter) => AD::from_value(value),
                (Classification::Parameter, Classification::Variable) => {
                    let lhs_par = tape.put_par(self.value);
                    let idx = record_op(tape, OpCode::PowPv, &[lhs_par, p.var_index]);
                    AD::new(value, tape.tape_id, idx)
                }
                (Classification::Variable, Classification::Parameter) => {
                    let rhs_par = tape.put_par(p.value);
                    let idx = record_op(tape, OpCode::PowVp, &[self.var_index, rhs_par]);
                    AD::new(value, tape.tape_id, idx)
                }
                (Classification::Variable, Classification::Variable) => {
                    let idx = record_op(tape, OpCode::PowVv, &[self.var_index, p.var_index]);
                    AD::new(value, tape.tape_id, idx)
                }
            }
        })
    }
    //
    /// `spec.md` §6 `azmul(x, y)`: records like a normal binary op, using
    /// [Base::azmul]'s absolute-zero rule both for the value recorded
    /// here and, at replay time, for every Taylor order the forward and
    /// reverse sweeps compute for it (`spec.md` §9 Open Question: "the
    /// zero-forcing rule applies at every order, not just order 0"). A
    /// dedicated [OpCode::AzMulPp]/`Pv`/`Vp`/`Vv` family carries this
    /// because an ordinary `Mul` replay has no way to tell a azmul'd pair
    /// apart from a pair that merely happens to multiply to zero once.
    pub fn azmul(self, rhs: AD<V>) -> AD<V> {
        let value = self.value.azmul(rhs.value);
        let local_key = <V as ThisThreadTape>::get();
        local_key.with_borrow_mut(|tape| {
            let lhs_class = self.classify(tape);
            let rhs_class = rhs.classify(tape);
            match (lhs_class, rhs_class) {
                (Classification::Parameter, Classification::Parameter) => AD::from_value(value),
                (Classification::Parameter, Classification::Variable) => {
                    let lhs_par = tape.put_par(self.value);
                    let idx = record_op(tape, OpCode::AzMulPv, &[lhs_par, rhs.var_index]);
                    AD::new(value, tape.tape_id, idx)
                }
                (Classification::Variable, Classification::Parameter) => {
                    let rhs_par = tape.put_par(rhs.value);
                    let idx = record_op(tape, OpCode::AzMulVp, &[self.var_index, rhs_par]);
                    AD::new(value, tape.tape_id, idx)
                }
                (Classification::Variable, Classification::Variable) => {
                    let idx = record_op(tape, OpCode::AzMulVv, &[self.var_index, rhs.var_index]);
                    AD::new(value, tape.tape_id, idx)
                }
            }
        })
    }
    //
}
