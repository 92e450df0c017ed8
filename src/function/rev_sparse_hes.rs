// SPDX-License-Identifier: EPL-2.0 OR GPL-2.0-or-later
// SPDX-FileCopyrightText: Bradley M. Bell <bradbell@seanet.com>
// SPDX-FileContributor: 2025 Bradley M. Bell
// ---------------------------------------------------------------------------
//
//! Reverse-mode Hessian sparsity (`spec.md` §4.8 "rev_sparse_hes").
//!
//! Link to [parent module](super)
//!
//! Grounded on `adfn/for_sparsity.rs`'s two-pass shape reused by
//! [super::for_sparse_jac] and `original_source/include/cppad/core/
//! rev_hes_sweep.hpp`'s per-op rule: a forward Jacobian-sparsity pass
//! (the domain columns each variable structurally depends on, computed
//! by re-running [super::for_sparse_jac::propagate_one]) feeds a reverse
//! pass that, for every op whose result is marked "used" by the selected
//! weighted sum of dependents, adds a cross term between its operands'
//! forward patterns whenever the op is not affine in them (`Mul`/`Div`/
//! `Pow`/`AzMul` of two variables, or any nonlinear unary intrinsic), and
//! otherwise just passes the "used" flag and any already-accumulated
//! Hessian columns straight through (`Add`/`Sub`/`Neg`/`CSum`/`CExp`).
// ---------------------------------------------------------------------------
use super::for_sparse_jac::propagate_one;
use super::sparsity::SparsityRow;
use super::Function;
use crate::base::Base;
use crate::op_code::OpCode;
use crate::tape::Addr;
//
impl<V: Base> Function<V> {
    /// Given a domain-space seed pattern `r` (one row per independent,
    /// `n_col` columns, typically the identity so `r[j]` is `{j}`) and
    /// `select_range` choosing which dependents the Hessian is taken of
    /// (`spec.md` §6 `rev_sparse_hes(q, R, select)`), return one row per
    /// domain variable holding the structural sparsity pattern of that
    /// Hessian — `result[i]` contains `j` if `d^2 (w . y) / dx_i dx_j` may
    /// be structurally nonzero for some weighting `w` concentrated on the
    /// selected dependents.
    pub fn rev_sparse_hes<R: SparsityRow>(
        &self,
        n_col: usize,
        r: &[R],
        select_range: &[bool],
    ) -> Vec<R> {
        assert_eq!(r.len(), self.op.n_ind, "rev_sparse_hes: r must have one row per domain variable");
        assert_eq!(
            select_range.len(),
            self.range_len(),
            "rev_sparse_hes: select_range must have one entry per dependent"
        );
        let n_var = self.op.n_var;
        let mut op_first_result = vec![0usize; self.op.len()];
        {
            let mut next_var = 2 + self.op.n_ind;
            for (i, code) in self.op.op_vec.iter().enumerate() {
                op_first_result[i] = next_var;
                next_var += code.result_count();
            }
        }
        // forward Jacobian sparsity, one row per variable (spec.md §4.8
        // "rev_sparse_hes is seeded from a for_sparse_jac pass").
        let mut for_row = vec![R::empty(n_col); n_var];
        for (j, seed) in r.iter().enumerate() {
            for_row[2 + j] = seed.clone();
        }
        let mut vec_union_fwd: Vec<R> = vec![R::empty(n_col); self.vec_ad.descriptors.len()];
        let mut call_union_fwd = R::empty(n_col);
        for op_index in 0..self.op.len() {
            let code = self.op.op_vec[op_index];
            let args = self.op.args(op_index);
            let first_result = op_first_result[op_index];
            propagate_one(self, code, args, &mut for_row, &mut vec_union_fwd, &mut call_union_fwd, n_col, first_result);
        }
        // reverse pass: rev1[v] ("is v used by the selected weighted sum")
        // and hes_row[v] (domain columns already known to pair with v in
        // the Hessian, accumulated from downstream of v).
        let mut rev1 = vec![false; n_var];
        let mut hes_row = vec![R::empty(n_col); n_var];
        for (i, &sel) in select_range.iter().enumerate() {
            if sel && self.range_is_var[i] {
                rev1[self.range_index[i] as usize] = true;
            }
        }
        let mut vec_rev1 = vec![false; self.vec_ad.descriptors.len()];
        let mut vec_hes: Vec<R> = vec![R::empty(n_col); self.vec_ad.descriptors.len()];
        for op_index in (0..self.op.len()).rev() {
            let code = self.op.op_vec[op_index];
            let args = self.op.args(op_index);
            let first_result = op_first_result[op_index];
            reverse_hes_one(
                code,
                args,
                first_result,
                &for_row,
                &mut rev1,
                &mut hes_row,
                &mut vec_rev1,
                &mut vec_hes,
            );
        }
        let mut result = Vec::with_capacity(self.op.n_ind);
        for j in 0..self.op.n_ind {
            result.push(hes_row[2 + j].clone());
        }
        result
    }
}
//
#[allow(clippy::too_many_arguments)]
fn reverse_hes_one<R: SparsityRow>(
    code: OpCode,
    args: &[Addr],
    first_result: usize,
    for_row: &[R],
    rev1: &mut [bool],
    hes_row: &mut [R],
    vec_rev1: &mut [bool],
    vec_hes: &mut [R],
) {
    use OpCode::*;
    match code {
        Begin | Inv | End | CSkip | Par => {}
        PriP | PriV => {}
        LtPp | LtPv | LtVp | LtVv | LePp | LePv | LeVp | LeVv | EqPp | EqPv | EqVp | EqVv | NePp
        | NePv | NeVp | NeVv | GePp | GePv | GeVp | GeVv | GtPp | GtPv | GtVp | GtVv => {}
        // atomic calls and discrete functions are external collaborators
        // with no reported second-derivative information (spec.md §1).
        DisP | DisV | AFunBegin | AFunEnd | AFunArgP | AFunArgV | AFunResP | AFunResV => {}
        CSum => {
            let n_add = args[0] as usize;
            let n_sub = args[1] as usize;
            let used = rev1[first_result];
            let h = hes_row[first_result].clone();
            for &a in &args[2..2 + n_add + n_sub] {
                rev1[a as usize] |= used;
                hes_row[a as usize].union_with(&h);
            }
        }
        CExp => {
            // always-evaluate-both-branches selection (spec.md §4.9), but
            // structurally a pass-through: no new cross term of its own.
            let used = rev1[first_result];
            let h = hes_row[first_result].clone();
            let mask = args[1];
            for j in 2..4 {
                if mask & (1 << j) != 0 {
                    let idx = args[2 + j] as usize;
                    rev1[idx] |= used;
                    hes_row[idx].union_with(&h);
                }
            }
        }
        Abs | Neg | Sign => {
            // piecewise-linear: structurally zero second derivative.
            let used = rev1[first_result];
            let h = hes_row[first_result].clone();
            rev1[args[0] as usize] |= used;
            hes_row[args[0] as usize].union_with(&h);
        }
        Sqrt | Exp | Expm1 | Log | Log1p | Asinh | Acosh | Atanh | Tan | Sin | Cos | Asin | Acos
        | Atan | Sinh | Cosh | Tanh | Erf => {
            let used = rev1[first_result];
            let mut h = hes_row[first_result].clone();
            if matches!(code, Sin | Cos | Asin | Acos | Atan | Sinh | Cosh | Tanh | Erf) {
                let companion = hes_row[first_result + 1].clone();
                h.union_with(&companion);
            }
            if used {
                let self_term = for_row[args[0] as usize].clone();
                h.union_with(&self_term);
            }
            rev1[args[0] as usize] |= used;
            hes_row[args[0] as usize].union_with(&h);
        }
        AddPp | AddPv | AddVp | AddVv | SubPp | SubPv | SubVp | SubVv => {
            let used = rev1[first_result];
            let h = hes_row[first_result].clone();
            let lhs_is_var = matches!(code, AddVp | AddVv | SubVp | SubVv);
            let rhs_is_var = matches!(code, AddPv | AddVv | SubPv | SubVv);
            if lhs_is_var {
                rev1[args[0] as usize] |= used;
                hes_row[args[0] as usize].union_with(&h);
            }
            if rhs_is_var {
                rev1[args[1] as usize] |= used;
                hes_row[args[1] as usize].union_with(&h);
            }
        }
        MulPp | MulPv | MulVp | MulVv | AzMulPp | AzMulPv | AzMulVp | AzMulVv | DivPp | DivPv
        | DivVp | DivVv | PowPp | PowPv | PowVp | PowVv => {
            let used = rev1[first_result];
            let h = hes_row[first_result].clone();
            let lhs_is_var = matches!(
                code,
                MulVp | MulVv | AzMulVp | AzMulVv | DivVp | DivVv | PowVp | PowVv
            );
            let rhs_is_var = matches!(
                code,
                MulPv | MulVv | AzMulPv | AzMulVv | DivPv | DivVv | PowPv | PowVv
            );
            match (lhs_is_var, rhs_is_var) {
                (true, true) => {
                    rev1[args[0] as usize] |= used;
                    rev1[args[1] as usize] |= used;
                    let mut hx = h.clone();
                    let mut hy = h;
                    if used {
                        hx.union_with(&for_row[args[1] as usize]);
                        hy.union_with(&for_row[args[0] as usize]);
                    }
                    hes_row[args[0] as usize].union_with(&hx);
                    hes_row[args[1] as usize].union_with(&hy);
                }
                (true, false) => {
                    rev1[args[0] as usize] |= used;
                    let mut hx = h;
                    if used && matches!(code, PowVp) {
                        hx.union_with(&for_row[args[0] as usize]);
                    }
                    hes_row[args[0] as usize].union_with(&hx);
                }
                (false, true) => {
                    rev1[args[1] as usize] |= used;
                    let mut hy = h;
                    if used && matches!(code, PowPv) {
                        hy.union_with(&for_row[args[1] as usize]);
                    }
                    hes_row[args[1] as usize].union_with(&hy);
                }
                (false, false) => {}
            }
        }
        LdP | LdV => {
            let vec_id = args[0] as usize;
            vec_rev1[vec_id] |= rev1[first_result];
            let h = hes_row[first_result].clone();
            vec_hes[vec_id].union_with(&h);
        }
        StPp | StPv | StVp | StVv => {
            let value_is_var = matches!(code, StPv | StVv);
            if value_is_var {
                let vec_id = args[0] as usize;
                let idx = args[2] as usize;
                rev1[idx] |= vec_rev1[vec_id];
                let h = vec_hes[vec_id].clone();
                hes_row[idx].union_with(&h);
            }
        }
    }
}
//
#[cfg(test)]
mod tests {
    use super::super::sparsity::SetRow;
    use crate::function::{start_recording, stop_recording};
    //
    #[test]
    fn product_introduces_cross_term() {
        let ax = start_recording::<f64>(vec![2.0, 3.0]).unwrap();
        let ay = ax[0].clone() * ax[1].clone();
        let f = stop_recording(vec![ay]).unwrap();
        let r = vec![SetRow::singleton(2, 0), SetRow::singleton(2, 1)];
        let pattern = f.rev_sparse_hes(2, &r, &[true]);
        assert_eq!(pattern[0].columns(), vec![1]);
        assert_eq!(pattern[1].columns(), vec![0]);
    }
    //
    #[test]
    fn linear_combination_has_no_cross_term() {
        let ax = start_recording::<f64>(vec![2.0, 3.0]).unwrap();
        let ay = ax[0].clone() + ax[1].clone();
        let f = stop_recording(vec![ay]).unwrap();
        let r = vec![SetRow::singleton(2, 0), SetRow::singleton(2, 1)];
        let pattern = f.rev_sparse_hes(2, &r, &[true]);
        assert!(pattern[0].is_empty());
        assert!(pattern[1].is_empty());
    }
    //
    #[test]
    fn unselected_dependent_contributes_nothing() {
        let ax = start_recording::<f64>(vec![2.0, 3.0]).unwrap();
        let ay = ax[0].clone() * ax[1].clone();
        let f = stop_recording(vec![ay]).unwrap();
        let r = vec![SetRow::singleton(2, 0), SetRow::singleton(2, 1)];
        let pattern = f.rev_sparse_hes(2, &r, &[false]);
        assert!(pattern[0].is_empty());
        assert!(pattern[1].is_empty());
    }
}
