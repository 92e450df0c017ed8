// SPDX-License-Identifier: EPL-2.0 OR GPL-2.0-or-later
// SPDX-FileCopyrightText: Bradley M. Bell <bradbell@seanet.com>
// SPDX-FileContributor: 2025 Bradley M. Bell
// ---------------------------------------------------------------------------
//
// Pattern-directed numeric Jacobian/Hessian evaluation (spec.md §6
// `sparse_jacobian`, `sparse_hessian`).

use rustad::function::sparsity::{BitRow, SparsityRow};
use rustad::{start_recording, stop_recording, AD};

#[test]
fn sparse_jacobian_matches_the_closed_form() {
    // y0 = x0 + x1, y1 = x0 * x1
    let ax = start_recording::<f64>(vec![3.0, 5.0]).unwrap();
    let y0 = ax[0].clone() + ax[1].clone();
    let y1 = ax[0].clone() * ax[1].clone();
    let f = stop_recording(vec![y0, y1]).unwrap();

    let seed: Vec<BitRow> = (0..2).map(|j| BitRow::singleton(2, j)).collect();
    let pattern = f.for_sparse_jac(2, &seed);

    let x = vec![3.0, 5.0];
    let jac = f.sparse_jacobian(&x, &pattern).unwrap();
    // dy0/dx0 = 1, dy0/dx1 = 1, dy1/dx0 = x1 = 5, dy1/dx1 = x0 = 3
    assert_eq!(jac, vec![1.0, 1.0, 5.0, 3.0]);
}

#[test]
fn sparse_hessian_matches_the_closed_form() {
    // y = x0^2 * x1: d2y/dx0^2 = 2*x1, d2y/dx0dx1 = 2*x0, d2y/dx1^2 = 0
    let ax = start_recording::<f64>(vec![2.0, 3.0]).unwrap();
    let y = ax[0].clone() * ax[0].clone() * ax[1].clone();
    let f = stop_recording(vec![y]).unwrap();

    let seed: Vec<BitRow> = (0..2).map(|j| BitRow::singleton(2, j)).collect();
    let select_range = vec![true];
    let pattern = f.rev_sparse_hes(2, &seed, &select_range);

    let x = vec![2.0, 3.0];
    let w = vec![1.0];
    let hes = f.sparse_hessian(&x, &w, &pattern).unwrap();
    assert_eq!(hes[0 * 2 + 0], 2.0 * x[1]);
    assert_eq!(hes[0 * 2 + 1], 2.0 * x[0]);
    assert_eq!(hes[1 * 2 + 0], 2.0 * x[0]);
    assert_eq!(hes[1 * 2 + 1], 0.0);
}

#[test]
fn sparse_jacobian_leaves_structural_zeros_untouched() {
    let ax = start_recording::<f64>(vec![4.0, 7.0]).unwrap();
    let y0 = ax[0].clone() + AD::from_value(1.0);
    let f = stop_recording(vec![y0]).unwrap();

    let seed: Vec<BitRow> = (0..2).map(|j| BitRow::singleton(2, j)).collect();
    let pattern = f.for_sparse_jac(2, &seed);

    let x = vec![4.0, 7.0];
    let jac = f.sparse_jacobian(&x, &pattern).unwrap();
    assert_eq!(jac, vec![1.0, 0.0]);
}
