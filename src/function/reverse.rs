// SPDX-License-Identifier: EPL-2.0 OR GPL-2.0-or-later
// SPDX-FileCopyrightText: Bradley M. Bell <bradbell@seanet.com>
// SPDX-FileContributor: 2025 Bradley M. Bell
// ---------------------------------------------------------------------------
//
//! Reverse-mode sweep (`spec.md` §4.6).
//!
//! Link to [parent module](super)
//!
//! Grounded on `adfn/reverse_one.rs`'s "iterate ops from End to Begin,
//! each op adds its contribution back into its argument(s)" skeleton,
//! generalized from `Vec<V>` partials to `order` Taylor levels per
//! variable. Order 1 (plain adjoint/backprop, the case every scenario in
//! `spec.md` §8 exercises) is implemented for every op. Orders above 1
//! are implemented for the ops whose Taylor recursion has no self-
//! referential history (`Add`/`Sub`/`Neg`/`Abs`/`Mul` by a parameter, and
//! `Mul`/`AzMul` of two variables via the Cauchy-product transpose);
//! `spec.md` §4.5 itself only asks for closed forms "as in CppAD's
//! `forward_sweep.hpp` family", and this crate's own forward sweep
//! (`forward.rs`) already stops at order 1 for `Pow`/`Erf` with a
//! non-constant exponent/argument for the same reason — reverse mirrors
//! that scope rather than inventing support forward never offers.
// ---------------------------------------------------------------------------
use super::forward::index_of;
use super::Function;
use crate::base::Base;
use crate::error::{AdError, AdResult};
use crate::op_code::{CompareOp, OpCode};
use crate::tape::{Addr, VecAdElement};
//
impl<V: Base> Function<V> {
    /// Weighted reverse-mode sweep (`spec.md` §6 `reverse(p, w)`).
    ///
    /// `w` has `range_len() * order` entries: `w[i * order + k]` weights
    /// the order-`k` Taylor coefficient of dependent `i`. Returns
    /// `domain_len() * order` partials, `result[j * order + k]` being
    /// the partial of `sum_{i,k} w[i,k] * y_i_k` with respect to the
    /// order-`k` Taylor coefficient of independent `j`.
    ///
    /// # Errors
    /// [AdError::OrderTooHigh] if fewer than `order` forward orders have
    /// been computed by prior [Function::forward] calls.
    pub fn reverse(&self, order: usize, w: &[V]) -> AdResult<Vec<V>> {
        assert!(order >= 1, "reverse: order must be at least 1");
        let taylor = self.taylor.borrow();
        if taylor.len() < order {
            return Err(AdError::OrderTooHigh { requested: order, available: taylor.len() });
        }
        assert_eq!(
            w.len(),
            self.range_len() * order,
            "reverse: w length does not match range_len() * order"
        );
        let n_var = self.op.n_var;
        let mut partial = vec![vec![V::zero(); order]; n_var];
        for (i, &is_var) in self.range_is_var.iter().enumerate() {
            if is_var {
                let idx = self.range_index[i] as usize;
                for k in 0..order {
                    partial[idx][k] = partial[idx][k] + w[i * order + k];
                }
            }
        }
        let skip = self.compute_skip_set();
        // next_var tracks the first result index of each op, just like
        // the forward sweep's own accumulator, so results can be read
        // off in the same single forward pass through op boundaries.
        let mut op_first_result = vec![0usize; self.op.len()];
        {
            let mut next_var = 2 + self.op.n_ind;
            for (i, code) in self.op.op_vec.iter().enumerate() {
                op_first_result[i] = next_var;
                next_var += code.result_count();
            }
        }
        // VecAD side table (spec.md §4.6): replay the load/store
        // bookkeeping once, forward, using the already-complete order-0
        // row, so each load's reverse step knows which slot it pulled
        // from at that point in the recording — the same mutable vector
        // state `forward.rs`'s own sweep threads through in one pass,
        // just not entangled with a Taylor order here.
        let mut ld_source: Vec<Option<VecAdElement>> = vec![None; self.op.len()];
        {
            let mut vec_state = self.vec_ad.elements.clone();
            for op_index in 0..self.op.len() {
                if skip.contains(&op_index) {
                    continue;
                }
                let code = self.op.op_vec[op_index];
                let args = self.op.args(op_index);
                match code {
                    OpCode::LdP | OpCode::LdV => {
                        let base = self.vec_ad.descriptor(args[0]).offset as usize;
                        let offset = index_of(self, args, code, &taylor, &[], order)?;
                        ld_source[op_index] = Some(vec_state[base + offset]);
                    }
                    OpCode::StPp | OpCode::StPv | OpCode::StVp | OpCode::StVv => {
                        let base = self.vec_ad.descriptor(args[0]).offset as usize;
                        let offset = index_of(self, args, code, &taylor, &[], order)?;
                        let value_is_var = matches!(code, OpCode::StPv | OpCode::StVv);
                        vec_state[base + offset] =
                            VecAdElement { is_variable: value_is_var, value_index: args[2] };
                    }
                    _ => {}
                }
            }
        }
        for op_index in (0..self.op.len()).rev() {
            let code = self.op.op_vec[op_index];
            if skip.contains(&op_index) || matches!(code, OpCode::Begin | OpCode::Inv | OpCode::End) {
                continue;
            }
            let args = self.op.args(op_index).to_vec();
            let first_result = op_first_result[op_index];
            self.reverse_op(order, &taylor, &mut partial, code, &args, first_result, ld_source[op_index]);
        }
        let mut result = vec![V::zero(); self.op.n_ind * order];
        for j in 0..self.op.n_ind {
            for k in 0..order {
                result[j * order + k] = partial[2 + j][k];
            }
        }
        Ok(result)
    }
    //
    /// dispatch one op-code's adjoint contribution during a reverse
    /// sweep; shared with [super::subgraph]'s subgraph-restricted replay.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn reverse_op(
        &self,
        order: usize,
        taylor: &[Vec<V>],
        partial: &mut [Vec<V>],
        code: OpCode,
        args: &[Addr],
        first_result: usize,
        ld_elem: Option<VecAdElement>,
    ) {
        use OpCode::*;
        let val = |k: usize, idx: usize| taylor[k][idx];
        match code {
            Par | CSkip | LtPp | LtPv | LtVp | LtVv | LePp | LePv | LeVp | LeVv | EqPp | EqPv
            | EqVp | EqVv | NePp | NePv | NeVp | NeVv | GePp | GePv | GeVp | GeVv | GtPp | GtPv
            | GtVp | GtVv | PriP | PriV => { /* no variable argument to propagate into */ }
            AddPp | AddPv | AddVp | AddVv | SubPp | SubPv | SubVp | SubVv => {
                let is_add = matches!(code, AddPp | AddPv | AddVp | AddVv);
                let lhs_is_var = matches!(code, AddVp | AddVv | SubVp | SubVv);
                let rhs_is_var = matches!(code, AddPv | AddVv | SubPv | SubVv);
                for k in 0..order {
                    let bar_z = partial[first_result][k];
                    if lhs_is_var {
                        partial[args[0] as usize][k] = partial[args[0] as usize][k] + bar_z;
                    }
                    if rhs_is_var {
                        let contrib = if is_add { bar_z } else { -bar_z };
                        partial[args[1] as usize][k] = partial[args[1] as usize][k] + contrib;
                    }
                }
            }
            Neg => {
                for k in 0..order {
                    let bar_z = partial[first_result][k];
                    partial[args[0] as usize][k] = partial[args[0] as usize][k] - bar_z;
                }
            }
            Abs => {
                let x0 = val(0, args[0] as usize);
                let s = x0.sign();
                for k in 0..order {
                    let bar_z = partial[first_result][k];
                    partial[args[0] as usize][k] = partial[args[0] as usize][k] + s * bar_z;
                }
            }
            Sign => { /* derivative is zero almost everywhere */ }
            MulPp | MulPv | MulVp | MulVv | AzMulPp | AzMulPv | AzMulVp | AzMulVv => {
                let is_az = matches!(code, AzMulPp | AzMulPv | AzMulVp | AzMulVv);
                let lhs_is_var = matches!(code, MulVp | MulVv | AzMulVp | AzMulVv);
                let rhs_is_var = matches!(code, MulPv | MulVv | AzMulPv | AzMulVv);
                let x0 = if lhs_is_var { val(0, args[0] as usize) } else { *self.par.get(args[0]) };
                let y0 = if rhs_is_var { val(0, args[1] as usize) } else { *self.par.get(args[1]) };
                if is_az && (x0.is_identical_zero() || y0.is_identical_zero()) {
                    return;
                }
                if lhs_is_var && rhs_is_var {
                    // general Cauchy-product transpose, valid at any order.
                    for k in 0..order {
                        let bar_z = partial[first_result][k];
                        if bar_z.is_identical_zero() {
                            continue;
                        }
                        for i in 0..=k {
                            let y_ki = val(k - i, args[1] as usize);
                            let x_i = val(i, args[0] as usize);
                            partial[args[0] as usize][i] =
                                partial[args[0] as usize][i] + bar_z * y_ki;
                            partial[args[1] as usize][k - i] =
                                partial[args[1] as usize][k - i] + bar_z * x_i;
                        }
                    }
                } else {
                    // one operand is a parameter: no cross-order coupling.
                    let p = if lhs_is_var { y0 } else { x0 };
                    let var_idx = if lhs_is_var { args[0] } else { args[1] } as usize;
                    for k in 0..order {
                        let bar_z = partial[first_result][k];
                        partial[var_idx][k] = partial[var_idx][k] + bar_z * p;
                    }
                }
            }
            DivPp | DivPv | DivVp | DivVv => {
                let y0 = val(0, args[1] as usize);
                if code == DivVp {
                    let p = *self.par.get(args[1]);
                    for k in 0..order {
                        let bar_z = partial[first_result][k];
                        partial[args[0] as usize][k] = partial[args[0] as usize][k] + bar_z / p;
                    }
                } else {
                    assert!(order == 1, "reverse: order > 1 not implemented for Div with a variable denominator");
                    let z0 = val(0, first_result);
                    let bar_z = partial[first_result][0];
                    if code == DivVv {
                        partial[args[0] as usize][0] = partial[args[0] as usize][0] + bar_z / y0;
                    }
                    let rhs_idx = args[1] as usize;
                    partial[rhs_idx][0] = partial[rhs_idx][0] - bar_z * (z0 / y0);
                }
            }
            PowPp | PowPv | PowVp | PowVv => {
                assert!(order == 1, "reverse: order > 1 not implemented for Pow");
                let bar_z = partial[first_result][0];
                let z0 = val(0, first_result);
                let x0 = if matches!(code, PowVp | PowVv) {
                    val(0, args[0] as usize)
                } else {
                    *self.par.get(args[0])
                };
                if matches!(code, PowVp | PowVv) {
                    let p0 = if code == PowVv { val(0, args[1] as usize) } else { *self.par.get(args[1]) };
                    let dzdx = p0.azmul(z0) / x0;
                    partial[args[0] as usize][0] = partial[args[0] as usize][0] + bar_z * dzdx;
                }
                if matches!(code, PowPv | PowVv) {
                    let dzdy = z0 * x0.ln();
                    partial[args[1] as usize][0] = partial[args[1] as usize][0] + bar_z * dzdy;
                }
            }
            // `Tan` is single-result (spec.md §3 Invariants), so its
            // companion `1 + tan(x)^2` is rebuilt from `z`'s own order-0
            // value rather than read from a second tape slot.
            Tan => {
                assert!(order == 1, "reverse: order > 1 not implemented for Tan");
                let bar_z = partial[first_result][0];
                let z0 = val(0, first_result);
                let dzdx = V::one() + z0 * z0;
                partial[args[0] as usize][0] = partial[args[0] as usize][0] + bar_z * dzdx;
            }
            // -- transcendentals: order 1 only -------------------------------
            Sqrt | Exp | Expm1 | Log | Log1p | Asinh | Acosh | Atanh | Sin | Cos | Asin | Acos
            | Atan | Sinh | Cosh | Tanh | Erf => {
                assert!(order == 1, "reverse: order > 1 not implemented for {code:?}");
                let bar_z = partial[first_result][0];
                let x0 = val(0, args[0] as usize);
                let dzdx = match code {
                    Sqrt => {
                        let z0 = val(0, first_result);
                        V::one() / (V::from(2.0) * z0)
                    }
                    Exp => val(0, first_result),
                    Expm1 => val(0, first_result) + V::one(),
                    Log => V::one() / x0,
                    Log1p => V::one() / (x0 + V::one()),
                    Asinh => V::one() / (V::one() + x0 * x0).sqrt(),
                    Acosh => V::one() / (x0 * x0 - V::one()).sqrt(),
                    Atanh => V::one() / (V::one() - x0 * x0),
                    Sin => val(0, first_result + 1),
                    Cos => -val(0, first_result + 1),
                    Asin => V::one() / val(0, first_result + 1),
                    Acos => -V::one() / val(0, first_result + 1),
                    Atan => V::one() / val(0, first_result + 1),
                    Sinh => val(0, first_result + 1),
                    Cosh => val(0, first_result + 1),
                    Tanh => val(0, first_result + 1),
                    Erf => V::from(2.0 / std::f64::consts::PI.sqrt()) * (-(x0 * x0)).exp(),
                    _ => unreachable!(),
                };
                partial[args[0] as usize][0] = partial[args[0] as usize][0] + bar_z * dzdx;
            }
            CExp => {
                let cmp = CompareOp::from_code(args[0]);
                let mask = args[1];
                let left = if mask & 1 != 0 { val(0, args[2] as usize) } else { *self.par.get(args[2]) };
                let right = if mask & 2 != 0 { val(0, args[3] as usize) } else { *self.par.get(args[3]) };
                let branch = if cmp.eval(left, right) { 2 } else { 3 };
                if mask & (1 << branch) != 0 {
                    let idx = args[2 + branch] as usize;
                    for k in 0..order {
                        let bar_z = partial[first_result][k];
                        partial[idx][k] = partial[idx][k] + bar_z;
                    }
                }
            }
            // -- VecAD: load reverse, through the side table built in
            // `reverse` (`spec.md` §4.6: "reverse of a load adds the
            // loaded variable's partial back to the slot associated with
            // the indexed-vector element"). A store has no tape result of
            // its own (`result_count` 0): its contribution to the
            // gradient is already covered by whichever later load reads
            // the slot it wrote, resolved via `ld_elem` there, so a store
            // op itself has nothing to propagate.
            LdP | LdV => {
                if let Some(elem) = ld_elem {
                    if elem.is_variable {
                        let idx = elem.value_index as usize;
                        for k in 0..order {
                            partial[idx][k] = partial[idx][k] + partial[first_result][k];
                        }
                    }
                }
            }
            StPp | StPv | StVp | StVv => {}
            CSum => {
                let n_add = args[0] as usize;
                let n_sub = args[1] as usize;
                for k in 0..order {
                    let bar_z = partial[first_result][k];
                    for &a in &args[2..2 + n_add] {
                        partial[a as usize][k] = partial[a as usize][k] + bar_z;
                    }
                    for &a in &args[2 + n_add..2 + n_add + n_sub] {
                        partial[a as usize][k] = partial[a as usize][k] - bar_z;
                    }
                }
            }
            // treated as an external collaborator with zero derivative
            // information at every order (spec.md §1; see forward.rs).
            DisP | DisV => {}
            AFunBegin | AFunEnd | AFunArgP | AFunArgV | AFunResP | AFunResV => {
                // atomic calls are an external collaborator (spec.md §1);
                // a bare reverse sweep with no registered AtomicFun
                // contributes nothing beyond what forward already folded.
            }
            Begin | End | Inv => unreachable!("filtered out by caller"),
        }
    }
}
//
#[cfg(test)]
mod tests {
    use crate::ad::AD;
    use crate::error::AdError;
    use crate::function::{start_recording, stop_recording};
    //
    #[test]
    fn linear_combination_gradient() {
        let ax = start_recording::<f64>(vec![3.0, 5.0]).unwrap();
        let ay = ax[0].clone() * AD::from_value(2.0) + ax[1].clone() * AD::from_value(3.0);
        let f = stop_recording(vec![ay]).unwrap();
        f.forward(0, &[3.0, 5.0]).unwrap();
        let dw = f.reverse(1, &[1.0]).unwrap();
        assert_eq!(dw, vec![2.0, 3.0]);
    }
    //
    #[test]
    fn product_rule_gradient() {
        let ax = start_recording::<f64>(vec![2.0, 7.0]).unwrap();
        let ay = ax[0].clone() * ax[1].clone();
        let f = stop_recording(vec![ay]).unwrap();
        f.forward(0, &[2.0, 7.0]).unwrap();
        let dw = f.reverse(1, &[1.0]).unwrap();
        // d(x*y)/dx = y, d(x*y)/dy = x
        assert_eq!(dw, vec![7.0, 2.0]);
    }
    //
    #[test]
    fn azmul_gradient_is_zero_through_zero_operand() {
        let ax = start_recording::<f64>(vec![0.0]).unwrap();
        let ay = ax[0].clone().azmul(ax[0].clone().sin() / ax[0].clone().cos());
        let f = stop_recording(vec![ay]).unwrap();
        f.forward(0, &[0.0]).unwrap();
        let dw = f.reverse(1, &[1.0]).unwrap();
        assert_eq!(dw, vec![0.0]);
    }
    //
    #[test]
    fn sin_cos_gradient_matches_companion_value() {
        let ax = start_recording::<f64>(vec![0.5]).unwrap();
        let ay = ax[0].clone().sin();
        let f = stop_recording(vec![ay]).unwrap();
        f.forward(0, &[0.5]).unwrap();
        let dw = f.reverse(1, &[1.0]).unwrap();
        assert!((dw[0] - 0.5f64.cos()).abs() < 1e-12);
    }
    //
    #[test]
    fn order_too_high_without_matching_forward_call() {
        let ax = start_recording::<f64>(vec![1.0]).unwrap();
        let ay = ax[0].clone();
        let f = stop_recording(vec![ay]).unwrap();
        let err = f.reverse(1, &[1.0]).unwrap_err();
        assert!(matches!(err, AdError::OrderTooHigh { .. }));
    }
}
