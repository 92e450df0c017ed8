// SPDX-License-Identifier: EPL-2.0 OR GPL-2.0-or-later
// SPDX-FileCopyrightText: Bradley M. Bell <bradbell@seanet.com>
// SPDX-FileContributor: 2025 Bradley M. Bell
// ---------------------------------------------------------------------------
//
//! Arithmetic operator overloads for [AD](super::AD) (`spec.md` §4.1,
//! §6 "Active-scalar API").
//!
//! Link to [parent module](super)
//!
//! Grounded on `src/ad/mod.rs`'s `ad_binary_op!` macro: one macro
//! invocation per operator generates the `AD<V> op AD<V>` and
//! `AD<V> op V` overloads together with the matching `OpAssign` impl.
//! Parameter-parameter operands are folded to a constant at record time
//! (no op is pushed) the way the teacher's mature `ad/mod.rs` folds them.
// ---------------------------------------------------------------------------
use super::{record_op, Classification, AD};
use crate::base::Base;
use crate::op_code::OpCode;
use crate::tape::sealed::ThisThreadTape;
use std::ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Sub, SubAssign};
//
// ad_binary_op!
/// `$Trait`/`$method` is the operator (e.g. `Add`/`add`); `$op` is the
/// infix token used to combine two `Base` values; `$pv`/`$vp`/`$vv` are
/// the three variable-involving [OpCode] variants for this operator
/// (the `Pp` variant is never emitted, see [OpCode] docs).
macro_rules! ad_binary_op {
    ($Trait:ident, $method:ident, $op:tt, $pv:ident, $vp:ident, $vv:ident) => {
        impl<V: Base + ThisThreadTape> $Trait for AD<V> {
            type Output = AD<V>;
            fn $method(self, rhs: AD<V>) -> AD<V> {
                let value = self.value $op rhs.value;
                let local_key = <V as ThisThreadTape>::get();
                local_key.with_borrow_mut(|tape| {
                    let lhs_class = self.classify(tape);
                    let rhs_class = rhs.classify(tape);
                    match (lhs_class, rhs_class) {
                        (Classification::Parameter, Classification::Parameter) => {
                            AD::from_value(value)
                        }
                        (Classification::Parameter, Classification::Variable) => {
                            let lhs_par = tape.put_par(self.value);
                            let idx = record_op(
                                tape,
                                OpCode::$pv,
                                &[lhs_par, rhs.var_index],
                            );
                            AD::new(value, tape.tape_id, idx)
                        }
                        (Classification::Variable, Classification::Parameter) => {
                            let rhs_par = tape.put_par(rhs.value);
                            let idx = record_op(
                                tape,
                                OpCode::$vp,
                                &[self.var_index, rhs_par],
                            );
                            AD::new(value, tape.tape_id, idx)
                        }
                        (Classification::Variable, Classification::Variable) => {
                            let idx = record_op(
                                tape,
                                OpCode::$vv,
                                &[self.var_index, rhs.var_index],
                            );
                            AD::new(value, tape.tape_id, idx)
                        }
                    }
                })
            }
        }
        //
        impl<V: Base + ThisThreadTape> $Trait<V> for AD<V> {
            type Output = AD<V>;
            fn $method(self, rhs: V) -> AD<V> {
                self.$method(AD::from_value(rhs))
            }
        }
    };
}
//
ad_binary_op!(Add, add, +, AddPv, AddVp, AddVv);
ad_binary_op!(Sub, sub, -, SubPv, SubVp, SubVv);
ad_binary_op!(Mul, mul, *, MulPv, MulVp, MulVv);
ad_binary_op!(Div, div, /, DivPv, DivVp, DivVv);
//
// ad_op_assign!
/// Compound assignment in terms of the binary operator above, matching
/// the teacher's habit of deriving `+=` etc. from `+`.
macro_rules! ad_op_assign {
    ($Trait:ident, $method:ident, $binop:ident) => {
        impl<V: Base + ThisThreadTape> $Trait for AD<V> {
            fn $method(&mut self, rhs: AD<V>) {
                *self = self.clone().$binop(rhs);
            }
        }
        impl<V: Base + ThisThreadTape> $Trait<V> for AD<V> {
            fn $method(&mut self, rhs: V) {
                *self = self.clone().$binop(AD::from_value(rhs));
            }
        }
    };
}
ad_op_assign!(AddAssign, add_assign, add);
ad_op_assign!(SubAssign, sub_assign, sub);
ad_op_assign!(MulAssign, mul_assign, mul);
ad_op_assign!(DivAssign, div_assign, div);
//
// Neg
/// Unary negation; folds a parameter to a constant the same way the
/// binary ops fold `Pp`.
impl<V: Base + ThisThreadTape> Neg for AD<V> {
    type Output = AD<V>;
    fn neg(self) -> AD<V> {
        let value = -self.value;
        let local_key = <V as ThisThreadTape>::get();
        local_key.with_borrow_mut(|tape| match self.classify(tape) {
            Classification::Parameter => AD::from_value(value),
            Classification::Variable => {
                let idx = record_op(tape, OpCode::Neg, &[self.var_index]);
                AD::new(value, tape.tape_id, idx)
            }
        })
    }
}
//
#[cfg(test)]
mod tests {
    use crate::{start_recording, stop_recording};
    //
    #[test]
    fn add_folds_parameters() {
        let a: crate::AD<f64> = crate::AD::from_value(2.0);
        let b: crate::AD<f64> = crate::AD::from_value(3.0);
        let c = a + b;
        assert!(c.is_parameter());
        assert_eq!(c.value(), 5.0);
    }
    //
    #[test]
    fn mixed_parameter_variable_records_op() {
        let ax = start_recording::<f64>(vec![2.0]).unwrap();
        let ay = ax[0].clone() * 3.0 + ax[0].clone();
        assert!(ay.is_variable());
        assert_eq!(ay.value(), 9.0);
        let f = stop_recording(vec![ay]).unwrap();
        assert!(f.size_op() > 0);
    }
}
