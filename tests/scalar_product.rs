// SPDX-License-Identifier: EPL-2.0 OR GPL-2.0-or-later
// SPDX-FileCopyrightText: Bradley M. Bell <bradbell@seanet.com>
// SPDX-FileContributor: 2025 Bradley M. Bell
// ---------------------------------------------------------------------------
//
// S1: scalar product (spec.md §8).

use rustad::{start_recording, stop_recording};

#[test]
fn scalar_product_forward_and_reverse() {
    let ax = start_recording::<f64>(vec![1.0, 1.0]).unwrap();
    let ay = ax[0].clone() * ax[1].clone();
    let f = stop_recording(vec![ay]).unwrap();

    let y = f.forward(0, &[3.0, 4.0]).unwrap();
    assert_eq!(y, vec![12.0]);

    let dw = f.reverse(1, &[1.0]).unwrap();
    assert_eq!(dw, vec![4.0, 3.0]);
}
