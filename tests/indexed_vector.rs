// SPDX-License-Identifier: EPL-2.0 OR GPL-2.0-or-later
// SPDX-FileCopyrightText: Bradley M. Bell <bradbell@seanet.com>
// SPDX-FileContributor: 2025 Bradley M. Bell
// ---------------------------------------------------------------------------
//
// S3: indexed vector (spec.md §8).

use rustad::{start_recording, stop_recording, AD, VecAD};

#[test]
fn load_reads_the_initial_snapshot() {
    let ax = start_recording::<f64>(vec![2.0]).unwrap();
    let mut v = VecAD::<f64>::new(vec![1.0, 2.0, 3.0, 4.0]);
    let y = v.load(ax[0].clone()).unwrap();
    let f = stop_recording(vec![y]).unwrap();

    let out = f.forward(0, &[2.0]).unwrap();
    assert_eq!(out, vec![3.0]);
}

#[test]
fn load_after_a_recorded_store_sees_the_new_value() {
    let ax = start_recording::<f64>(vec![1.0]).unwrap();
    let mut v = VecAD::<f64>::new(vec![1.0, 2.0, 3.0, 4.0]);
    v.store(AD::from_value(1.0), AD::from_value(10.0)).unwrap();
    let y = v.load(ax[0].clone()).unwrap();
    let f = stop_recording(vec![y]).unwrap();

    let out = f.forward(0, &[1.0]).unwrap();
    assert_eq!(out, vec![10.0]);
}

#[test]
fn derivative_with_respect_to_the_index_is_zero() {
    let ax = start_recording::<f64>(vec![2.0]).unwrap();
    let mut v = VecAD::<f64>::new(vec![1.0, 2.0, 3.0, 4.0]);
    let y = v.load(ax[0].clone()).unwrap();
    let f = stop_recording(vec![y]).unwrap();

    let _ = f.forward(0, &[2.0]).unwrap();
    let dw = f.reverse(1, &[1.0]).unwrap();
    assert_eq!(dw, vec![0.0]);
}
