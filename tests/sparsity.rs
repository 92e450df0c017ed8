// SPDX-License-Identifier: EPL-2.0 OR GPL-2.0-or-later
// SPDX-FileCopyrightText: Bradley M. Bell <bradbell@seanet.com>
// SPDX-FileContributor: 2025 Bradley M. Bell
// ---------------------------------------------------------------------------
//
// S5: reverse Hessian sparsity (spec.md §8).

use rustad::function::sparsity::{BitRow, SparsityRow};
use rustad::{start_recording, stop_recording};

#[test]
fn sin_times_x1_has_dense_hessian_sparsity() {
    // y = sin(x[0]) * x[1]: d2y/dx0^2 = -sin(x0)*x1 (generically nonzero,
    // from sin's own curvature) and d2y/dx0 dx1 = cos(x0) (nonzero, the
    // product-rule cross term); d2y/dx1^2 = 0 (y is linear in x1). Row 0
    // is fully dense (spec.md §8 S5); row 1 carries only the cross term.
    let ax = start_recording::<f64>(vec![1.0, 1.0]).unwrap();
    let y = ax[0].clone().sin() * ax[1].clone();
    let f = stop_recording(vec![y]).unwrap();

    let seed: Vec<BitRow> = (0..2).map(|j| BitRow::singleton(2, j)).collect();
    let select_range = vec![true];
    let hes = f.rev_sparse_hes(2, &seed, &select_range);

    assert_eq!(hes.len(), 2);
    assert_eq!(hes[0].columns(), vec![0, 1]);
    assert_eq!(hes[1].columns(), vec![0]);
}

#[test]
fn for_sparse_jac_tracks_dependence() {
    let ax = start_recording::<f64>(vec![1.0, 2.0, 3.0]).unwrap();
    let y0 = ax[0].clone() + ax[1].clone();
    let y1 = ax[2].clone();
    let f = stop_recording(vec![y0, y1]).unwrap();

    let seed: Vec<BitRow> = (0..3).map(|j| BitRow::singleton(3, j)).collect();
    let jac = f.for_sparse_jac(3, &seed);
    assert_eq!(jac.len(), 2);
    assert_eq!(jac[0].columns(), vec![0, 1]);
    assert_eq!(jac[1].columns(), vec![2]);
}
