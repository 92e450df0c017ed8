// SPDX-License-Identifier: EPL-2.0 OR GPL-2.0-or-later
// SPDX-FileCopyrightText: Bradley M. Bell <bradbell@seanet.com>
// SPDX-FileContributor: 2025 Bradley M. Bell
// ---------------------------------------------------------------------------
//
//! Reverse-mode Jacobian sparsity (`spec.md` §4.8 "rev_sparse_jac").
//!
//! Link to [parent module](super)
//!
//! Grounded on the same `adfn/for_sparsity.rs` seed-and-propagate shape
//! [super::for_sparse_jac] uses, run backward: instead of "row[z] = union
//! of row[x] over z's operands" forward through the op stream, each op
//! here unions `row[z]` (already known, since replay runs in reverse op
//! order) back into `row[x]` for every variable operand `x` — the same
//! structural edges as `for_sparse_jac`, just walked in the opposite
//! direction, the way `reverse.rs` walks `forward.rs`'s dependency edges
//! backward for adjoint accumulation.
// ---------------------------------------------------------------------------
use super::sparsity::SparsityRow;
use super::Function;
use crate::base::Base;
use crate::op_code::OpCode;
use crate::tape::Addr;
//
impl<V: Base> Function<V> {
    /// Propagate an output sparsity pattern `s` (one row per dependent,
    /// each with `n_col` columns) backward through the recording,
    /// returning one row per domain variable holding the structural
    /// sparsity pattern of `S * Jacobian(f)` (`spec.md` §6
    /// `rev_sparse_jac(q, S)`).
    pub fn rev_sparse_jac<R: SparsityRow>(&self, n_col: usize, s: &[R]) -> Vec<R> {
        assert_eq!(s.len(), self.range_len(), "rev_sparse_jac: s must have one row per dependent");
        let mut row = vec![R::empty(n_col); self.op.n_var];
        for (i, seed) in s.iter().enumerate() {
            if self.range_is_var[i] {
                let idx = self.range_index[i] as usize;
                row[idx].union_with(seed);
            }
        }
        let mut op_first_result = vec![0usize; self.op.len()];
        {
            let mut next_var = 2 + self.op.n_ind;
            for (i, code) in self.op.op_vec.iter().enumerate() {
                op_first_result[i] = next_var;
                next_var += code.result_count();
            }
        }
        let mut vec_union: Vec<R> = vec![R::empty(n_col); self.vec_ad.descriptors.len()];
        let mut call_union = R::empty(n_col);
        for op_index in (0..self.op.len()).rev() {
            let code = self.op.op_vec[op_index];
            let args = self.op.args(op_index);
            let first_result = op_first_result[op_index];
            propagate_one_reverse(code, args, &mut row, &mut vec_union, &mut call_union, first_result, n_col);
        }
        let mut result = Vec::with_capacity(self.op.n_ind);
        for j in 0..self.op.n_ind {
            result.push(row[2 + j].clone());
        }
        result
    }
}
//
/// transpose of [super::for_sparse_jac::propagate_one]: union
/// `row[first_result]` back into every variable operand's row.
#[allow(clippy::too_many_arguments)]
fn propagate_one_reverse<R: SparsityRow>(
    code: OpCode,
    args: &[Addr],
    row: &mut [R],
    vec_union: &mut [R],
    call_union: &mut R,
    first_result: usize,
    n_col: usize,
) {
    use OpCode::*;
    match code {
        Begin | Inv | End | CSkip | PriP | PriV | Par => {}
        AFunBegin => {}
        AFunEnd => *call_union = R::empty(n_col),
        AFunArgP => {}
        AFunArgV => {
            let c = call_union.clone();
            row[args[0] as usize].union_with(&c);
        }
        AFunResP => {}
        AFunResV => {
            let r = row[first_result].clone();
            call_union.union_with(&r);
        }
        CSum => {
            let n_add = args[0] as usize;
            let n_sub = args[1] as usize;
            let z = row[first_result].clone();
            for &a in &args[2..2 + n_add + n_sub] {
                row[a as usize].union_with(&z);
            }
        }
        CExp => {
            let mask = args[1];
            let z = row[first_result].clone();
            for j in 0..4 {
                if mask & (1 << j) != 0 {
                    row[args[2 + j] as usize].union_with(&z);
                }
            }
        }
        DisV => {
            let z = row[first_result].clone();
            row[args[1] as usize].union_with(&z);
        }
        DisP => {}
        Abs | Neg | Sign | Sqrt | Exp | Expm1 | Log | Log1p | Asinh | Acosh | Atanh | Tan => {
            let z = row[first_result].clone();
            row[args[0] as usize].union_with(&z);
        }
        Sin | Cos | Asin | Acos | Atan | Sinh | Cosh | Tanh | Erf => {
            let mut z = row[first_result].clone();
            let companion = row[first_result + 1].clone();
            z.union_with(&companion);
            row[args[0] as usize].union_with(&z);
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
            let z = row[first_result].clone();
            if lhs_is_var {
                row[args[0] as usize].union_with(&z);
            }
            if rhs_is_var {
                row[args[1] as usize].union_with(&z);
            }
        }
        LtPp | LtPv | LtVp | LtVv | LePp | LePv | LeVp | LeVv | EqPp | EqPv | EqVp | EqVv | NePp
        | NePv | NeVp | NeVv | GePp | GePv | GeVp | GeVv | GtPp | GtPv | GtVp | GtVv => {}
        LdP | LdV => {
            let z = row[first_result].clone();
            vec_union[args[0] as usize].union_with(&z);
        }
        StPp | StPv | StVp | StVv => {
            let value_is_var = matches!(code, StPv | StVv);
            if value_is_var {
                let v = vec_union[args[0] as usize].clone();
                row[args[2] as usize].union_with(&v);
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
        let s = vec![SetRow::singleton(1, 0)];
        let pattern = f.rev_sparse_jac(1, &s);
        assert_eq!(pattern[0].columns(), vec![0]);
        assert_eq!(pattern[1].columns(), vec![0]);
    }
    //
    #[test]
    fn add_does_not_introduce_spurious_rows() {
        let ax = start_recording::<f64>(vec![2.0, 3.0, 4.0]).unwrap();
        let ay = ax[0].clone() + ax[1].clone();
        let f = stop_recording(vec![ay, ax[2].clone()]).unwrap();
        let s = vec![SetRow::singleton(2, 0), SetRow::singleton(2, 1)];
        let pattern = f.rev_sparse_jac(2, &s);
        assert_eq!(pattern[0].columns(), vec![0]);
        assert_eq!(pattern[1].columns(), vec![0]);
        assert_eq!(pattern[2].columns(), vec![1]);
    }
}
