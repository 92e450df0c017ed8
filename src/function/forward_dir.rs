// SPDX-License-Identifier: EPL-2.0 OR GPL-2.0-or-later
// SPDX-FileCopyrightText: Bradley M. Bell <bradbell@seanet.com>
// SPDX-FileContributor: 2025 Bradley M. Bell
// ---------------------------------------------------------------------------
//
//! Multi-direction forward sweep (`spec.md` §4.5 "Multi-direction forward
//! mode").
//!
//! Link to [parent module](super)
//!
//! Grounded on `original_source/include/cppad/core/forward/forward.hpp`'s
//! `Forward(q, r, xq)` contract: order 0 is shared across every
//! direction (it fixes the point the Taylor series expands around);
//! orders `>= 1` are independent per direction and must be supplied one
//! direction at a time, in order, the same way [Function::forward]
//! requires single-direction orders to be supplied in order. Unlike
//! CppAD's own sweep (which interleaves directions inside one pass over
//! the op stream for speed), each direction here runs its own call to
//! [Function::eval_op] — a plain, independently-grounded replay rather
//! than a hand-fused loop, since this crate's forward/reverse sweeps are
//! themselves already a from-scratch reimplementation, not a port of
//! CppAD's SIMD-oriented internals.
// ---------------------------------------------------------------------------
use super::Function;
use crate::base::Base;
use crate::error::{AdError, AdResult};
use crate::op_code::OpCode;
//
impl<V: Base> Function<V> {
    /// Compute order `order`'s Taylor coefficient, in each of
    /// `dx.len()` independent directions, for every range-space
    /// component (`spec.md` §6 `forward_dir(p, dx)`).
    ///
    /// `order` must be `>= 1`; order 0 must already have been computed
    /// by [Function::forward] (every direction shares that single
    /// base point). `dx[d]` is direction `d`'s order-`order` coefficient
    /// for every domain-space component. Orders `2..` must be requested
    /// one at a time, after the previous order, with the same number of
    /// directions used for order 1 (`spec.md` §4.5: multi-direction
    /// forward is only well defined once a direction set has been
    /// fixed at order 1).
    ///
    /// Returns one `Vec<V>` per direction, each holding that
    /// direction's order-`order` coefficient for every range-space
    /// component.
    ///
    /// # Errors
    /// [AdError::OrderTooHigh] if order 0 has not been computed yet, or
    /// if `order >= 2` is requested without `order - 1` directional
    /// orders already cached.
    pub fn forward_dir(&self, order: usize, dx: &[Vec<V>]) -> AdResult<Vec<Vec<V>>> {
        assert!(order >= 1, "forward_dir: order must be at least 1");
        let n_dir = dx.len();
        assert!(n_dir >= 1, "forward_dir: at least one direction is required");
        let taylor0 = self.taylor.borrow();
        if taylor0.is_empty() {
            return Err(AdError::OrderTooHigh { requested: order, available: 0 });
        }
        let mut taylor_dir = self.taylor_dir.borrow_mut();
        if order == 1 {
            taylor_dir.clear();
        } else if taylor_dir.len() != order - 1 {
            return Err(AdError::OrderTooHigh { requested: order, available: taylor_dir.len() });
        } else {
            assert_eq!(
                taylor_dir[0].len(),
                n_dir,
                "forward_dir: direction count must match the count used at order 1"
            );
        }
        let skip = self.compute_skip_set();
        let mut range_per_dir = Vec::with_capacity(n_dir);
        let mut row_per_dir = Vec::with_capacity(n_dir);
        for (d, dxd) in dx.iter().enumerate() {
            assert_eq!(dxd.len(), self.op.n_ind, "forward_dir: dx[{d}] does not match domain size");
            let mut history: Vec<Vec<V>> = Vec::with_capacity(order);
            history.push(taylor0[0].clone());
            for k in 1..order {
                history.push(taylor_dir[k - 1][d].clone());
            }
            let mut coeff = vec![V::zero(); self.op.n_var];
            for (j, dxj) in dxd.iter().enumerate() {
                coeff[2 + j] = *dxj;
            }
            let mut vec_state = self.vec_ad.elements.clone();
            let mut next_var = 2 + self.op.n_ind;
            for op_index in 0..self.op.len() {
                let code = self.op.op_vec[op_index];
                let n_res = code.result_count();
                if skip.contains(&op_index)
                    || matches!(code, OpCode::Begin | OpCode::Inv | OpCode::End)
                {
                    next_var += n_res;
                    continue;
                }
                let args = self.op.args(op_index).to_vec();
                self.eval_op(order, &history, &mut coeff, &mut vec_state, code, &args, next_var)?;
                next_var += n_res;
            }
            let mut result = vec![V::zero(); self.range_index.len()];
            for (i, &is_var) in self.range_is_var.iter().enumerate() {
                if is_var {
                    result[i] = coeff[self.range_index[i] as usize];
                }
            }
            range_per_dir.push(result);
            row_per_dir.push(coeff);
        }
        taylor_dir.push(row_per_dir);
        Ok(range_per_dir)
    }
}
//
#[cfg(test)]
mod tests {
    use crate::function::{start_recording, stop_recording};
    //
    #[test]
    fn two_directions_propagate_independently() {
        let ax = start_recording::<f64>(vec![2.0, 3.0]).unwrap();
        let ay = ax[0].clone() * ax[1].clone();
        let f = stop_recording(vec![ay]).unwrap();
        f.forward(0, &[2.0, 3.0]).unwrap();
        let dirs = f.forward_dir(1, &[vec![1.0, 0.0], vec![0.0, 1.0]]).unwrap();
        // d/dx1 (x1*x2) at (2,3) in direction e1 is x2 = 3
        assert_eq!(dirs[0], vec![3.0]);
        // direction e2 is x1 = 2
        assert_eq!(dirs[1], vec![2.0]);
        assert_eq!(f.size_direction(), 1);
    }
    //
    #[test]
    fn order_too_high_without_zero_order() {
        let ax = start_recording::<f64>(vec![1.0]).unwrap();
        let ay = ax[0].clone();
        let f = stop_recording(vec![ay]).unwrap();
        let err = f.forward_dir(1, &[vec![1.0]]).unwrap_err();
        assert!(matches!(err, crate::error::AdError::OrderTooHigh { .. }));
    }
}
