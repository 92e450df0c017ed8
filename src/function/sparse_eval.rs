// SPDX-License-Identifier: EPL-2.0 OR GPL-2.0-or-later
// SPDX-FileCopyrightText: Bradley M. Bell <bradbell@seanet.com>
// SPDX-FileContributor: 2025 Bradley M. Bell
// ---------------------------------------------------------------------------
//
//! Pattern-directed numeric Jacobian/Hessian evaluation (`spec.md` §6
//! "Function API" `sparse_jacobian`, `sparse_hessian`).
//!
//! Link to [parent module](super)
//!
//! Grounded on `original_source/cppad/local/sparse_jacobian.hpp`'s "easy
//! driver" (`SparseJacobian`): one reverse sweep per dependent, but
//! without that driver's row/column coloring pass, since this crate's
//! `spec.md` scope is a single dense `Vec<V>` result rather than a
//! compressed-column work buffer reused across calls. `sparse_jacobian`'s
//! `pattern` is a per-dependent row as produced by
//! [super::for_sparse_jac]; `sparse_hessian`'s is a per-independent row
//! as produced by [super::rev_sparse_hes]. Both sparsity engines are
//! sound but not exact (`spec.md` §8 item 6): every structurally-possible
//! nonzero is in `pattern`, so restricting the dense sweep result to
//! `pattern`'s columns never drops a real derivative value.
//!
//! `sparse_hessian` deliberately avoids `order = 2` [Function::reverse]:
//! `reverse.rs` only gives that order a closed form for ops whose Taylor
//! recursion has no self-referential history (`spec.md` §4.6's own
//! documented scope), so a weighted-reverse Hessian driver would panic on
//! any tape containing `Sin`/`Pow`/`Tan`/variable-denominator `Div`.
//! [Function::forward] has no such gap at order 2 (`forward.rs`'s own
//! doc: "implemented for every op" besides `pow`/`erf`'s non-integer/
//! variable-argument corners), so this uses the forward-only directional
//! second-derivative identity instead: with `x(t) = x0 + t*dx`, the
//! order-2 Taylor coefficient of `y` is `(1/2) dx^T H dx`; taking
//! `dx = e_i`, `e_j`, and `e_i + e_j` in turn and combining
//! (`H_ij = y''(e_i+e_j) - y''(e_i) - y''(e_j)`) recovers each Hessian
//! entry without ever calling `reverse` at order 2.
// ---------------------------------------------------------------------------
use super::sparsity::SparsityRow;
use super::Function;
use crate::base::Base;
use crate::error::AdResult;
//
impl<V: Base> Function<V> {
    /// The Jacobian of this function at `x`, restricted to the nonzero
    /// pattern in `pattern` (one row per dependent; `spec.md` §6
    /// `sparse_jacobian(x, pattern)`). Returns a dense, row-major
    /// `range_len() * domain_len()` matrix with every entry outside
    /// `pattern`'s row left at zero.
    ///
    /// # Errors
    /// Propagates any [AdError](crate::AdError) from the underlying
    /// `forward`/`reverse` sweeps.
    pub fn sparse_jacobian<R: SparsityRow>(&self, x: &[V], pattern: &[R]) -> AdResult<Vec<V>> {
        let m = self.range_len();
        let n = self.domain_len();
        self.clear_forward();
        self.forward(0, x)?;
        let mut jac = vec![V::zero(); m * n];
        for (i, row) in pattern.iter().enumerate() {
            let mut w = vec![V::zero(); m];
            w[i] = V::one();
            let dw = self.reverse(1, &w)?;
            for j in row.columns() {
                jac[i * n + j] = dw[j];
            }
        }
        Ok(jac)
    }
    //
    /// The Hessian of `w . F` at `x` (`w` a dependent-space weighting),
    /// restricted to the nonzero pattern in `pattern` (one row per
    /// independent; `spec.md` §6 `sparse_hessian(x, w, pattern)`).
    /// Returns a dense, row-major `domain_len() * domain_len()` matrix,
    /// symmetric by construction, with every entry outside `pattern`'s
    /// row left at zero.
    ///
    /// # Errors
    /// Propagates any [AdError](crate::AdError) from the underlying
    /// `forward` sweeps.
    pub fn sparse_hessian<R: SparsityRow>(
        &self,
        x: &[V],
        w: &[V],
        pattern: &[R],
    ) -> AdResult<Vec<V>> {
        let n = self.domain_len();
        let mut diag = vec![None; n];
        let mut hes = vec![V::zero(); n * n];
        for (j, row) in pattern.iter().enumerate() {
            let cols = row.columns();
            if cols.is_empty() {
                continue;
            }
            if diag[j].is_none() {
                diag[j] = Some(self.weighted_second_order(x, &[j], w)?);
            }
            for i in cols {
                if i == j {
                    hes[j * n + j] = diag[j].unwrap();
                    continue;
                }
                if diag[i].is_none() {
                    diag[i] = Some(self.weighted_second_order(x, &[i], w)?);
                }
                let cross = self.weighted_second_order(x, &[i, j], w)?;
                let value = cross - diag[i].unwrap() - diag[j].unwrap();
                hes[j * n + i] = value;
                hes[i * n + j] = value;
            }
        }
        Ok(hes)
    }
    //
    /// `sum_i w[i] * y_i''` where `y''` is the order-2 Taylor coefficient
    /// of a fresh order-0/1/2 forward sweep seeded along the direction
    /// `dx = sum_{j in unit_cols} e_j` (`unit_cols` of length 1 gives a
    /// diagonal Hessian probe, length 2 a cross-term probe).
    fn weighted_second_order(&self, x: &[V], unit_cols: &[usize], w: &[V]) -> AdResult<V> {
        let n = self.domain_len();
        self.clear_forward();
        self.forward(0, x)?;
        let mut dx = vec![V::zero(); n];
        for &j in unit_cols {
            dx[j] = V::one();
        }
        self.forward(1, &dx)?;
        let y2 = self.forward(2, &vec![V::zero(); n])?;
        let mut sum = V::zero();
        for (i, wi) in w.iter().enumerate() {
            sum = sum + *wi * y2[i];
        }
        Ok(sum)
    }
}
