// SPDX-License-Identifier: EPL-2.0 OR GPL-2.0-or-later
// SPDX-FileCopyrightText: Bradley M. Bell <bradbell@seanet.com>
// SPDX-FileContributor: 2025 Bradley M. Bell
// ---------------------------------------------------------------------------
//
//! Forward-mode Jacobian sparsity (`spec.md` §4.8 "for_sparse_jac").
//!
//! Link to [parent module](super)
//!
//! Grounded on `adfn/for_sparsity.rs`'s "seed a row per independent,
//! propagate `row[z] = union of row[x]` forward through the op stream"
//! algorithm, re-expressed over this crate's op-code set and generic
//! over [SparsityRow] so either representation in `sparsity.rs` can be
//! used. Every op is visited regardless of [Function::compute_skip_set]:
//! sparsity must hold across the whole domain, not just the point a
//! particular recording happened to use (`spec.md` §4.9 "structural, not
//! per-input").
// ---------------------------------------------------------------------------
use super::sparsity::SparsityRow;
use super::Function;
use crate::base::Base;
use crate::op_code::OpCode;
//
impl<V: Base> Function<V> {
    /// Propagate an input sparsity pattern `r` (one row per domain
    /// variable, each with `n_col` columns) forward through the
    /// recording, returning the structural sparsity pattern of
    /// `Jacobian(f) * R` — one row per range-space component
    /// (`spec.md` §6 `for_sparse_jac(q, R)`).
    pub fn for_sparse_jac<R: SparsityRow>(&self, n_col: usize, r: &[R]) -> Vec<R> {
        assert_eq!(r.len(), self.op.n_ind, "for_sparse_jac: r must have one row per domain variable");
        let mut row = vec![R::empty(n_col); self.op.n_var];
        for (j, seed) in r.iter().enumerate() {
            row[2 + j] = seed.clone();
        }
        let mut vec_union: Vec<R> = vec![R::empty(n_col); self.vec_ad.descriptors.len()];
        let mut call_union = R::empty(n_col);
        let mut next_var = 2 + self.op.n_ind;
        for op_index in 0..self.op.len() {
            let code = self.op.op_vec[op_index];
            let n_res = code.result_count();
            let args = self.op.args(op_index);
            propagate_one(self, code, args, &mut row, &mut vec_union, &mut call_union, n_col, next_var);
            next_var += n_res;
        }
        let mut result = Vec::with_capacity(self.range_index.len());
        for (i, &is_var) in self.range_is_var.iter().enumerate() {
            result.push(if is_var { row[self.range_index[i] as usize].clone() } else { R::empty(n_col) });
        }
        result
    }
}
//
/// shared by [Function::for_sparse_jac] and `rev_sparse_hes`'s own
/// forward-Jacobian precomputation: update `row`/`vec_union`/`call_union`
/// for one op, writing `row[first_result..]`.
#[allow(clippy::too_many_arguments)]
pub(crate) fn propagate_one<V: Base, R: SparsityRow>(
    f: &Function<V>,
    code: OpCode,
    args: &[crate::tape::Addr],
    row: &mut [R],
    vec_union: &mut [R],
    call_union: &mut R,
    n_col: usize,
    first_result: usize,
) {
    use OpCode::*;
    match code {
        Begin | Inv | End | CSkip | PriP | PriV | AFunBegin | AFunEnd | AFunArgP => {}
        AFunArgV => {
            let r = row[args[0] as usize].clone();
            call_union.union_with(&r);
        }
        Par | AFunResP => row[first_result] = R::empty(n_col),
        AFunResV => row[first_result] = call_union.clone(),
        CSum => {
            let n_add = args[0] as usize;
            let n_sub = args[1] as usize;
            let mut acc = R::empty(n_col);
            for &a in &args[2..2 + n_add + n_sub] {
                let r = row[a as usize].clone();
                acc.union_with(&r);
            }
            row[first_result] = acc;
        }
        CExp => {
            let mask = args[1];
            let mut acc = R::empty(n_col);
            for j in 0..4 {
                if mask & (1 << j) != 0 {
                    let r = row[args[2 + j] as usize].clone();
                    acc.union_with(&r);
                }
            }
            row[first_result] = acc;
        }
        DisV => row[first_result] = row[args[1] as usize].clone(),
        DisP => row[first_result] = R::empty(n_col),
        Abs | Neg | Sign | Sqrt | Exp | Expm1 | Log | Log1p | Asinh | Acosh | Atanh | Tan => {
            row[first_result] = row[args[0] as usize].clone();
        }
        Sin | Cos | Asin | Acos | Atan | Sinh | Cosh | Tanh | Erf => {
            row[first_result] = row[args[0] as usize].clone();
            row[first_result + 1] = row[args[0] as usize].clone();
        }
        AddPp | AddPv | AddVp | AddVv | SubPp | SubPv | SubVp | SubVv | MulPp | MulPv | MulVp
        | MulVv | DivPp | DivPv | DivVp | DivVv | PowPp | PowPv | PowVp | PowVv | AzMulPp
        | AzMulPv | AzMulVp | AzMulVv => {
            let lhs_is_var = matches!(
                code,
                AddVp | AddVv | SubVp | SubVv | MulVp | MulVv | DivVp | DivVv | PowVp | PowVv | AzMulVp | AzMulVv
            );
            let rhs_is_var = matches!(
                code,
                AddPv | AddVv | SubPv | SubVv | MulPv | MulVv | DivPv | DivVv | PowPv | PowVv | AzMulPv | AzMulVv
            );
            let mut acc = R::empty(n_col);
            if lhs_is_var {
                let r = row[args[0] as usize].clone();
                acc.union_with(&r);
            }
            if rhs_is_var {
                let r = row[args[1] as usize].clone();
                acc.union_with(&r);
            }
            row[first_result] = acc;
        }
        LtPp | LtPv | LtVp | LtVv | LePp | LePv | LeVp | LeVv | EqPp | EqPv | EqVp | EqVv | NePp
        | NePv | NeVp | NeVv | GePp | GePv | GeVp | GeVv | GtPp | GtPv | GtVp | GtVv => {}
        LdP | LdV => row[first_result] = vec_union[args[0] as usize].clone(),
        StPp | StPv | StVp | StVv => {
            let value_is_var = matches!(code, StPv | StVv);
            if value_is_var {
                let r = row[args[2] as usize].clone();
                vec_union[args[0] as usize].union_with(&r);
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
    fn product_depends_on_both_inputs() {
        let ax = start_recording::<f64>(vec![2.0, 3.0]).unwrap();
        let ay = ax[0].clone() * ax[1].clone();
        let f = stop_recording(vec![ay]).unwrap();
        let r = vec![SetRow::singleton(2, 0), SetRow::singleton(2, 1)];
        let pattern = f.for_sparse_jac(2, &r);
        assert_eq!(pattern[0].columns(), vec![0, 1]);
    }
    //
    #[test]
    fn add_does_not_introduce_spurious_columns() {
        let ax = start_recording::<f64>(vec![2.0, 3.0, 4.0]).unwrap();
        let ay = ax[0].clone() + ax[1].clone();
        let f = stop_recording(vec![ay, ax[2].clone()]).unwrap();
        let r = vec![SetRow::singleton(3, 0), SetRow::singleton(3, 1), SetRow::singleton(3, 2)];
        let pattern = f.for_sparse_jac(3, &r);
        assert_eq!(pattern[0].columns(), vec![0, 1]);
        assert_eq!(pattern[1].columns(), vec![2]);
    }
}
