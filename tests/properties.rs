// SPDX-License-Identifier: EPL-2.0 OR GPL-2.0-or-later
// SPDX-FileCopyrightText: Bradley M. Bell <bradbell@seanet.com>
// SPDX-FileContributor: 2025 Bradley M. Bell
// ---------------------------------------------------------------------------
//
// General testable properties (spec.md §8, items 1-4 and 8).

use rustad::{start_recording, stop_recording, Base};

fn record_example() -> rustad::Function<f64> {
    let ax = start_recording::<f64>(vec![1.0, 2.0]).unwrap();
    let y = ax[0].clone() * ax[1].clone() + ax[0].clone().sin();
    stop_recording(vec![y]).unwrap()
}

#[test]
fn roundtrip_of_values() {
    let f = record_example();
    let x = [0.7, -1.3];
    let y = f.forward(0, &x).unwrap();
    assert_eq!(y, vec![x[0] * x[1] + x[0].sin()]);
}

#[test]
fn linearity_of_reverse() {
    let f = record_example();
    let _ = f.forward(0, &[0.7, -1.3]).unwrap();
    let dw1 = f.reverse(1, &[3.0]).unwrap();
    f.clear_forward();
    let _ = f.forward(0, &[0.7, -1.3]).unwrap();
    let dw2 = f.reverse(1, &[5.0]).unwrap();
    f.clear_forward();
    let _ = f.forward(0, &[0.7, -1.3]).unwrap();
    let combined = f.reverse(1, &[2.0 * 3.0 + 4.0 * 5.0]).unwrap();

    for i in 0..dw1.len() {
        let expected = 2.0 * dw1[i] + 4.0 * dw2[i];
        assert!((combined[i] - expected).abs() < 1e-9);
    }
}

#[test]
fn forward_reverse_duality_at_order_one() {
    let f = record_example();
    let x = [0.7, -1.3];
    let dx = [0.3, 0.9];
    let w = [2.0];

    let _ = f.forward(0, &x).unwrap();
    let dy = f.forward(1, &dx).unwrap();
    let lhs: f64 = w.iter().zip(dy.iter()).map(|(a, b)| a * b).sum();

    f.clear_forward();
    let _ = f.forward(0, &x).unwrap();
    let rx = f.reverse(1, &w).unwrap();
    let rhs: f64 = rx.iter().zip(dx.iter()).map(|(a, b)| a * b).sum();

    assert!((lhs - rhs).abs() < 1e-9);
}

#[test]
fn finite_difference_sanity() {
    let f = record_example();
    let x = [0.7, -1.3];
    let dx = [0.3, 0.9];
    let eps = 1e-6;
    let x_plus = [x[0] + eps * dx[0], x[1] + eps * dx[1]];

    let y0 = f.forward(0, &x).unwrap();
    f.clear_forward();
    let y1 = f.forward(0, &x_plus).unwrap();
    f.clear_forward();
    let _ = f.forward(0, &x).unwrap();
    let dy = f.forward(1, &dx).unwrap();

    for i in 0..y0.len() {
        let finite_diff = (y1[i] - y0[i]) / eps;
        assert!((finite_diff - dy[i]).abs() < 1e-3);
    }
}

#[test]
fn absolute_zero_multiply() {
    assert_eq!(0.0f64.azmul(5.0), 0.0);
    assert_eq!(5.0f64.azmul(0.0), 0.0);
    assert_eq!(0.0f64.azmul(f64::NAN), 0.0);
    assert_eq!(0.0f64.azmul(f64::INFINITY), 0.0);
    assert_eq!(f64::NEG_INFINITY.azmul(0.0), 0.0);
}
