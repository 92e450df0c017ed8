// SPDX-License-Identifier: EPL-2.0 OR GPL-2.0-or-later
// SPDX-FileCopyrightText: Bradley M. Bell <bradbell@seanet.com>
// SPDX-FileContributor: 2025 Bradley M. Bell
// ---------------------------------------------------------------------------
//
// S2: conditional expression (spec.md §8): y = cexp(Lt, x0, 1, x0*x0, x0).

use rustad::{condition_expression, start_recording, stop_recording, CompareOp, AD};

fn record() -> rustad::Function<f64> {
    let ax = start_recording::<f64>(vec![1.0]).unwrap();
    let x0 = ax[0].clone();
    let y = condition_expression(
        CompareOp::Lt,
        x0.clone(),
        AD::from_value(1.0),
        x0.clone() * x0.clone(),
        x0,
    );
    stop_recording(vec![y]).unwrap()
}

#[test]
fn true_branch_taken_below_one() {
    let f = record();
    let y = f.forward(0, &[0.5]).unwrap();
    assert_eq!(y, vec![0.25]);
    let dw = f.reverse(1, &[1.0]).unwrap();
    // true branch is x0*x0, derivative 2*x0 at x0 = 0.5
    assert_eq!(dw, vec![1.0]);
}

#[test]
fn false_branch_taken_above_one() {
    let f = record();
    let y = f.forward(0, &[2.0]).unwrap();
    assert_eq!(y, vec![2.0]);
    let dw = f.reverse(1, &[1.0]).unwrap();
    // false branch is x0, derivative 1.0
    assert_eq!(dw, vec![1.0]);
}
