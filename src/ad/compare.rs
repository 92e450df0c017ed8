// SPDX-License-Identifier: EPL-2.0 OR GPL-2.0-or-later
// SPDX-FileCopyrightText: Bradley M. Bell <bradbell@seanet.com>
// SPDX-FileContributor: 2025 Bradley M. Bell
// ---------------------------------------------------------------------------
//
//! Comparison operators and `condition_expression` (`CExp`) for
//! [AD](super::AD) (`spec.md` §3 "six comparison ops", §4.9 "Conditional
//! Expressions").
//!
//! Link to [parent module](super)
//!
//! Grounded on `cond_op.hpp` (`original_source/`) for the `CExp` argument
//! layout and on the teacher's `ad/mod.rs` comparison-operator pattern,
//! generalized to this crate's single variable/parameter model.
// ---------------------------------------------------------------------------
use super::{record_op, Classification, AD};
use crate::base::Base;
use crate::op_code::{CompareOp, OpCode};
use crate::tape::sealed::ThisThreadTape;
//
// compare_record
/// Evaluate `cmp` on two `AD<V>` values and, if recording is active and
/// at least one operand is a variable, push a standalone comparison op
/// so the optimizer's conditional-skip pass can replay the same
/// decision later (`spec.md` §4.9). Returns the boolean result.
fn compare_record<V: Base + ThisThreadTape>(cmp: CompareOp, lhs: &AD<V>, rhs: &AD<V>) -> bool {
    let result = cmp.eval(lhs.value, rhs.value);
    let local_key = <V as ThisThreadTape>::get();
    local_key.with_borrow_mut(|tape| {
        if !tape.record_compare {
            return;
        }
        let lhs_class = lhs.classify(tape);
        let rhs_class = rhs.classify(tape);
        if lhs_class == Classification::Parameter && rhs_class == Classification::Parameter {
            return;
        }
        let code = compare_opcode(cmp, lhs_class, rhs_class);
        let left = match lhs_class {
            Classification::Parameter => tape.put_par(lhs.value),
            Classification::Variable => lhs.var_index,
        };
        let right = match rhs_class {
            Classification::Parameter => tape.put_par(rhs.value),
            Classification::Variable => rhs.var_index,
        };
        record_op(tape, code, &[left, right, result as u32]);
    });
    result
}
//
fn compare_opcode(cmp: CompareOp, lhs: Classification, rhs: Classification) -> OpCode {
    use Classification::{Parameter, Variable};
    use CompareOp::*;
    use OpCode::*;
    match (cmp, lhs, rhs) {
        (Lt, Parameter, Variable) => LtPv,
        (Lt, Variable, Parameter) => LtVp,
        (Lt, Variable, Variable) => LtVv,
        (Le, Parameter, Variable) => LePv,
        (Le, Variable, Parameter) => LeVp,
        (Le, Variable, Variable) => LeVv,
        (Eq, Parameter, Variable) => EqPv,
        (Eq, Variable, Parameter) => EqVp,
        (Eq, Variable, Variable) => EqVv,
        (Ne, Parameter, Variable) => NePv,
        (Ne, Variable, Parameter) => NeVp,
        (Ne, Variable, Variable) => NeVv,
        (Ge, Parameter, Variable) => GePv,
        (Ge, Variable, Parameter) => GeVp,
        (Ge, Variable, Variable) => GeVv,
        (Gt, Parameter, Variable) => GtPv,
        (Gt, Variable, Parameter) => GtVp,
        (Gt, Variable, Variable) => GtVv,
        (_, Parameter, Parameter) => unreachable!("folded before dispatch"),
    }
}
//
impl<V: Base + ThisThreadTape> PartialEq for AD<V> {
    fn eq(&self, other: &Self) -> bool {
        compare_record(CompareOp::Eq, self, other)
    }
}
//
impl<V: Base + ThisThreadTape> PartialOrd for AD<V> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        self.value.partial_cmp(&other.value)
    }
    fn lt(&self, other: &Self) -> bool {
        compare_record(CompareOp::Lt, self, other)
    }
    fn le(&self, other: &Self) -> bool {
        compare_record(CompareOp::Le, self, other)
    }
    fn ge(&self, other: &Self) -> bool {
        compare_record(CompareOp::Ge, self, other)
    }
    fn gt(&self, other: &Self) -> bool {
        compare_record(CompareOp::Gt, self, other)
    }
}
//
// condition_expression
/// `spec.md` §4.9 `CondExp`: record a 7-argument [OpCode::CExp] whose
/// replayed value is `if_true` when `cmp(left, right)` holds, else
/// `if_false`; the trailing argument is the recorded boolean result of
/// `cmp(left, right)`, so a later replay can detect a flip the same way
/// a standalone comparison op does (`spec.md` §4.4
/// `compare_change_count`). Unlike the plain comparison operators this
/// always evaluates both branches (no short-circuit), matching CppAD's
/// `CondExpOp` semantics in `cond_op.hpp`.
pub fn condition_expression<V: Base + ThisThreadTape>(
    cmp: CompareOp,
    left: AD<V>,
    right: AD<V>,
    if_true: AD<V>,
    if_false: AD<V>,
) -> AD<V> {
    let condition = cmp.eval(left.value, right.value);
    let value = if condition { if_true.value } else { if_false.value };
    let local_key = <V as ThisThreadTape>::get();
    local_key.with_borrow_mut(|tape| {
        let classes = [
            left.classify(tape),
            right.classify(tape),
            if_true.classify(tape),
            if_false.classify(tape),
        ];
        if classes.iter().all(|c| *c == Classification::Parameter) {
            return AD::from_value(value);
        }
        let operands = [&left, &right, &if_true, &if_false];
        let mut mask: u32 = 0;
        let mut args = [0u32; 7];
        args[0] = cmp.to_code();
        for (j, operand) in operands.iter().enumerate() {
            let addr = match classes[j] {
                Classification::Parameter => tape.put_par(operand.value),
                Classification::Variable => {
                    mask |= 1 << j;
                    operand.var_index
                }
            };
            args[2 + j] = addr;
        }
        args[1] = mask;
        args[6] = condition as u32;
        let idx = record_op(tape, OpCode::CExp, &args);
        AD::new(value, tape.tape_id, idx)
    })
}
//
#[cfg(test)]
mod tests {
    use super::*;
    use crate::{start_recording, stop_recording};
    //
    #[test]
    fn plain_comparison_records_when_variable() {
        let ax = start_recording::<f64>(vec![1.0, 2.0]).unwrap();
        let lt = ax[0] < ax[1];
        assert!(lt);
        let f = stop_recording(vec![ax[0].clone() + ax[1].clone()]).unwrap();
        assert!(f.size_op() > 0);
    }
    //
    #[test]
    fn condition_expression_picks_true_branch() {
        let ax = start_recording::<f64>(vec![1.0, 2.0]).unwrap();
        let y = condition_expression(
            CompareOp::Lt,
            ax[0].clone(),
            ax[1].clone(),
            AD::from_value(10.0),
            AD::from_value(20.0),
        );
        assert_eq!(y.value(), 10.0);
        let _f = stop_recording(vec![y]).unwrap();
    }
}
