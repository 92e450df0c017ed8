// SPDX-License-Identifier: EPL-2.0 OR GPL-2.0-or-later
// SPDX-FileCopyrightText: Bradley M. Bell <bradbell@seanet.com>
// SPDX-FileContributor: 2025 Bradley M. Bell
// ---------------------------------------------------------------------------
//
//! Subgraph-restricted reverse mode (`spec.md` §6 `subgraph_reverse`).
//!
//! Link to [parent module](super)
//!
//! Grounded on `original_source/include/cppad/core/subgraph_reverse.hpp`'s
//! idea: computing one dependent's gradient by first walking backward
//! from it through the op stream to find the (usually much smaller) set
//! of ops it actually depends on, then replaying only that subset with
//! [super::reverse]'s own per-op rules, instead of a full sweep over
//! every recorded op — useful when a caller wants the gradient of a
//! single dependent, or a handful of them one at a time, out of a
//! function with many others.
// ---------------------------------------------------------------------------
use super::forward::index_of;
use super::Function;
use crate::base::Base;
use crate::error::{AdError, AdResult};
use crate::op_code::OpCode;
use crate::tape::{Addr, VecAdElement};
use std::collections::BTreeSet;
//
impl<V: Base> Function<V> {
    /// Gradient of dependent `i` with respect to the domain indices
    /// `select_domain` marks `true`, computed from only the subgraph of
    /// ops that structurally feed dependent `i` (`spec.md` §6
    /// `subgraph_reverse`). Requires order 0 to already have been
    /// computed by [Function::forward]: the per-op recursions this walk
    /// replays (via [Function::reverse_op]) read order-0 values the same
    /// way a full [Function::reverse] sweep does.
    ///
    /// Returns `(domain_index, partial)` pairs, one per `true` entry of
    /// `select_domain`, in ascending domain-index order; an index whose
    /// partial is structurally zero is still reported, with value
    /// `V::zero()`.
    ///
    /// # Errors
    /// [AdError::OrderTooHigh] if order 0 has not been computed yet.
    /// Release any state cached by a prior [Function::subgraph_reverse]
    /// call (`spec.md` §6 `clear_subgraph`). This crate's
    /// `subgraph_reverse` takes `select_domain` fresh on every call
    /// rather than caching it across a `select_domain` call followed by
    /// per-dependent `(q, ell)` calls (see `DESIGN.md`'s Open Question
    /// entry), so there is no persistent subgraph state to release;
    /// kept as a no-op so callers translating from the two-call CppAD
    /// idiom still have a valid method to call.
    pub fn clear_subgraph(&self) {}
    //
    pub fn subgraph_reverse(&self, i: usize, select_domain: &[bool]) -> AdResult<Vec<(usize, V)>> {
        assert!(i < self.range_len(), "subgraph_reverse: dependent index out of range");
        assert_eq!(
            select_domain.len(),
            self.op.n_ind,
            "subgraph_reverse: select_domain must have one entry per domain variable"
        );
        let taylor = self.taylor.borrow();
        if taylor.is_empty() {
            return Err(AdError::OrderTooHigh { requested: 1, available: 0 });
        }
        if !self.range_is_var[i] {
            // a constant dependent's partial is zero everywhere; still
            // report one entry per selected domain index.
            return Ok(select_domain
                .iter()
                .enumerate()
                .filter(|&(_, &sel)| sel)
                .map(|(j, _)| (j, V::zero()))
                .collect());
        }
        let dep_var = self.range_index[i] as usize;
        let subgraph = self.subgraph_ops(dep_var);
        let mut op_first_result = vec![0usize; self.op.len()];
        {
            let mut next_var = 2 + self.op.n_ind;
            for (idx, code) in self.op.op_vec.iter().enumerate() {
                op_first_result[idx] = next_var;
                next_var += code.result_count();
            }
        }
        // VecAD side table, the same technique `reverse.rs::reverse` uses,
        // restricted to the loads/stores this subgraph actually visits.
        let mut ld_source: Vec<Option<VecAdElement>> = vec![None; self.op.len()];
        {
            let mut vec_state = self.vec_ad.elements.clone();
            for op_index in 0..self.op.len() {
                let code = self.op.op_vec[op_index];
                let args = self.op.args(op_index);
                match code {
                    OpCode::LdP | OpCode::LdV => {
                        let base = self.vec_ad.descriptor(args[0]).offset as usize;
                        let offset = index_of(self, args, code, &taylor, &[], 1)?;
                        if subgraph.contains(&op_index) {
                            ld_source[op_index] = Some(vec_state[base + offset]);
                        }
                    }
                    OpCode::StPp | OpCode::StPv | OpCode::StVp | OpCode::StVv => {
                        let base = self.vec_ad.descriptor(args[0]).offset as usize;
                        let offset = index_of(self, args, code, &taylor, &[], 1)?;
                        let value_is_var = matches!(code, OpCode::StPv | OpCode::StVv);
                        vec_state[base + offset] =
                            VecAdElement { is_variable: value_is_var, value_index: args[2] };
                    }
                    _ => {}
                }
            }
        }
        let mut partial = vec![vec![V::zero(); 1]; self.op.n_var];
        partial[dep_var][0] = V::one();
        for &op_index in subgraph.iter().rev() {
            let code = self.op.op_vec[op_index];
            let args = self.op.args(op_index).to_vec();
            let first_result = op_first_result[op_index];
            self.reverse_op(1, &taylor, &mut partial, code, &args, first_result, ld_source[op_index]);
        }
        Ok(select_domain
            .iter()
            .enumerate()
            .filter(|&(_, &sel)| sel)
            .map(|(j, _)| (j, partial[2 + j][0]))
            .collect())
    }
    //
    /// the set of op-stream indices that structurally feed tape-variable
    /// `seed_var`, walking backward through variable-valued operands and
    /// conservatively pulling in every store to a [crate::VecAD] vector
    /// once any load from that same vector is reached, since a load's
    /// source slot depends on an index value this structural walk does
    /// not replay (`spec.md` §4.2: derivative of `v[ax]` with respect to
    /// `ax` is zero by construction, so the index argument itself is
    /// never an edge here; but which *store* fed a given load can only be
    /// over-approximated without replaying the recording).
    fn subgraph_ops(&self, seed_var: usize) -> BTreeSet<usize> {
        let mut owner_op = vec![usize::MAX; self.op.n_var];
        {
            let mut next_var = 0usize;
            for (i, code) in self.op.op_vec.iter().enumerate() {
                let n_res = code.result_count();
                for r in 0..n_res {
                    owner_op[next_var + r] = i;
                }
                next_var += n_res;
            }
        }
        let mut visited_ops: BTreeSet<usize> = BTreeSet::new();
        let mut visited_vars: BTreeSet<usize> = BTreeSet::new();
        let mut needed_vec_ids: BTreeSet<Addr> = BTreeSet::new();
        let mut queue = vec![seed_var];
        loop {
            let mut changed = false;
            while let Some(v) = queue.pop() {
                if v < 2 + self.op.n_ind || !visited_vars.insert(v) {
                    continue;
                }
                let op_index = owner_op[v];
                if op_index == usize::MAX {
                    continue;
                }
                if visited_ops.insert(op_index) {
                    changed = true;
                }
                let code = self.op.op_vec[op_index];
                let args = self.op.args(op_index);
                for a in variable_operands(code, args) {
                    queue.push(a);
                }
                if matches!(code, OpCode::LdP | OpCode::LdV) && needed_vec_ids.insert(args[0]) {
                    changed = true;
                }
            }
            for (op_index, &code) in self.op.op_vec.iter().enumerate() {
                if !matches!(code, OpCode::StPp | OpCode::StPv | OpCode::StVp | OpCode::StVv) {
                    continue;
                }
                let args = self.op.args(op_index);
                if needed_vec_ids.contains(&args[0]) && visited_ops.insert(op_index) {
                    changed = true;
                    if matches!(code, OpCode::StPv | OpCode::StVv) {
                        queue.push(args[2] as usize);
                    }
                }
            }
            if !changed {
                break;
            }
        }
        visited_ops
    }
}
//
/// the variable-valued operands op `code` reads, matching exactly the
/// edges [Function::reverse_op] propagates an adjoint across (e.g. a
/// `LdV`'s index operand never receives one, so it is not an edge here
/// either, and comparison ops have none at all).
fn variable_operands(code: OpCode, args: &[Addr]) -> Vec<usize> {
    use OpCode::*;
    match code {
        CSum => {
            let n_add = args[0] as usize;
            let n_sub = args[1] as usize;
            args[2..2 + n_add + n_sub].iter().map(|&a| a as usize).collect()
        }
        CExp => {
            let mask = args[1];
            (0..4usize)
                .filter(|j| mask & (1 << j) != 0)
                .map(|j| args[2 + j] as usize)
                .collect()
        }
        DisV => vec![args[1] as usize],
        Abs | Neg | Sign | Sqrt | Exp | Expm1 | Log | Log1p | Asinh | Acosh | Atanh | Tan | Sin
        | Cos | Asin | Acos | Atan | Sinh | Cosh | Tanh | Erf => vec![args[0] as usize],
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
            let mut v = Vec::with_capacity(2);
            if lhs_is_var {
                v.push(args[0] as usize);
            }
            if rhs_is_var {
                v.push(args[1] as usize);
            }
            v
        }
        LdP | LdV => Vec::new(),
        _ => Vec::new(),
    }
}
//
#[cfg(test)]
mod tests {
    use crate::ad::AD;
    use crate::function::{start_recording, stop_recording};
    //
    #[test]
    fn matches_full_reverse_on_a_shared_subexpression() {
        let ax = start_recording::<f64>(vec![2.0, 3.0, 5.0]).unwrap();
        let shared = ax[0].clone() * ax[1].clone();
        let y0 = shared.clone() + ax[2].clone();
        let y1 = ax[2].clone().sin();
        let f = stop_recording(vec![y0, y1]).unwrap();
        f.forward(0, &[2.0, 3.0, 5.0]).unwrap();
        let full = f.reverse(1, &[1.0, 0.0]).unwrap();
        let partials = f.subgraph_reverse(0, &[true, true, true]).unwrap();
        assert_eq!(partials, vec![(0, full[0]), (1, full[1]), (2, full[2])]);
    }
    //
    #[test]
    fn unreachable_domain_variable_reports_zero() {
        let ax = start_recording::<f64>(vec![2.0, 3.0]).unwrap();
        let y = ax[0].clone() * AD::from_value(2.0);
        let f = stop_recording(vec![y]).unwrap();
        f.forward(0, &[2.0, 3.0]).unwrap();
        let partials = f.subgraph_reverse(0, &[true, true]).unwrap();
        assert_eq!(partials, vec![(0, 2.0), (1, 0.0)]);
    }
    //
    #[test]
    fn constant_dependent_reports_zero_without_forward_error() {
        let ax = start_recording::<f64>(vec![2.0]).unwrap();
        let f = stop_recording(vec![AD::from_value(9.0), ax[0].clone()]).unwrap();
        f.forward(0, &[2.0]).unwrap();
        let partials = f.subgraph_reverse(0, &[true]).unwrap();
        assert_eq!(partials, vec![(0, 0.0)]);
    }
}
