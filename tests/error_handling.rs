// SPDX-License-Identifier: EPL-2.0 OR GPL-2.0-or-later
// SPDX-FileCopyrightText: Bradley M. Bell <bradbell@seanet.com>
// SPDX-FileContributor: 2025 Bradley M. Bell
// ---------------------------------------------------------------------------
//
// Error handling (spec.md §7).

use rustad::{start_recording, stop_recording, AdError};

#[test]
fn double_start_recording_is_recorder_busy() {
    let ax = start_recording::<f64>(vec![1.0]).unwrap();
    let err = start_recording::<f64>(vec![2.0]).unwrap_err();
    assert!(matches!(err, AdError::RecorderBusy));
    let _ = stop_recording(ax).unwrap();
}

#[test]
fn stop_without_start_is_not_recording() {
    // no recording is in progress on entry to this test.
    let err = stop_recording::<f64>(Vec::new()).unwrap_err();
    assert!(matches!(err, AdError::NotRecording));
}

#[test]
fn forward_beyond_available_orders_is_order_too_high() {
    let ax = start_recording::<f64>(vec![1.0]).unwrap();
    let f = stop_recording(ax).unwrap();
    let err = f.forward(2, &[1.0]).unwrap_err();
    assert!(matches!(err, AdError::OrderTooHigh { requested: 2, available: 0 }));
}

#[test]
fn reverse_without_enough_forward_orders_is_order_too_high() {
    let ax = start_recording::<f64>(vec![1.0]).unwrap();
    let f = stop_recording(ax).unwrap();
    let err = f.reverse(1, &[1.0]).unwrap_err();
    assert!(matches!(err, AdError::OrderTooHigh { requested: 1, available: 0 }));
}

#[test]
fn stopping_a_different_recording_with_a_stale_variable_fails() {
    let ax1 = start_recording::<f64>(vec![1.0]).unwrap();
    let _f1 = stop_recording(ax1.clone()).unwrap();

    let _ax2 = start_recording::<f64>(vec![2.0]).unwrap();
    let err = stop_recording(vec![ax1[0].clone()]).unwrap_err();
    assert!(matches!(err, AdError::DependentNotVariable { index: 0 }));
    let _ = stop_recording(_ax2).unwrap();
}
