// SPDX-License-Identifier: EPL-2.0 OR GPL-2.0-or-later
// SPDX-FileCopyrightText: Bradley M. Bell <bradbell@seanet.com>
// SPDX-FileContributor: 2025 Bradley M. Bell
// ---------------------------------------------------------------------------
//
// S4: cumulative sum fusion (spec.md §8).

use rustad::{start_recording, stop_recording};

#[test]
fn cumulative_sum_fuses_into_one_op() {
    let ax = start_recording::<f64>(vec![1.0, 2.0, 3.0, 4.0]).unwrap();
    let a = ax[0].clone();
    let b = ax[1].clone();
    let c = ax[2].clone();
    let d = ax[3].clone();
    let y = (a.clone() + b) - c + (a - d);
    let f = stop_recording(vec![y]).unwrap();

    let before = f.forward(0, &[1.0, 2.0, 3.0, 4.0]).unwrap();
    assert_eq!(before, vec![-3.0]);

    let g = f.optimize("").unwrap();
    let after = g.forward(0, &[1.0, 2.0, 3.0, 4.0]).unwrap();
    assert_eq!(after, vec![-3.0]);

    // Begin + 4 Inv + End + one fused CSum == 7 ops total (spec.md §8 S4).
    assert_eq!(g.size_op(), 7);
}

#[test]
fn no_cumulative_sum_op_disables_fusion() {
    let ax = start_recording::<f64>(vec![1.0, 2.0, 3.0]).unwrap();
    let y = ax[0].clone() + ax[1].clone() - ax[2].clone();
    let f = stop_recording(vec![y]).unwrap();
    let g = f.optimize("no_cumulative_sum_op").unwrap();
    // Begin + 3 Inv + Add + Sub + End == 7 ops, no fusion occurred.
    assert_eq!(g.size_op(), 7);
    let out = g.forward(0, &[1.0, 2.0, 3.0]).unwrap();
    assert_eq!(out, vec![0.0]);
}

#[test]
fn unknown_option_token_is_an_error() {
    let ax = start_recording::<f64>(vec![1.0]).unwrap();
    let f = stop_recording(ax).unwrap();
    let err = f.optimize("not_a_real_option").unwrap_err();
    assert!(matches!(err, rustad::AdError::UnknownOption { .. }));
}

#[test]
fn tiny_collision_limit_is_not_fatal() {
    // A collision_limit far smaller than the number of CSE-eligible ops
    // must not turn optimize() into a `Result::Err` (spec.md §4.7 item 4,
    // §7: "the optimizer never fails except via MemoryExhausted"); at
    // worst it leaves some ops undeduplicated and sets
    // exceed_collision_limit().
    let ax = start_recording::<f64>(vec![1.0, 2.0, 3.0]).unwrap();
    let y = ax[0].clone().sin() + ax[1].clone().sin() + ax[2].clone().sin();
    let f = stop_recording(vec![y]).unwrap();
    let g = f.optimize("collision_limit=1").unwrap();
    let out = g.forward(0, &[1.0, 2.0, 3.0]).unwrap();
    let expect = 1f64.sin() + 2f64.sin() + 3f64.sin();
    assert!((out[0] - expect).abs() < 1e-12);
    let _ = g.exceed_collision_limit();
}
