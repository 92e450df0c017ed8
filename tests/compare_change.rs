// SPDX-License-Identifier: EPL-2.0 OR GPL-2.0-or-later
// SPDX-FileCopyrightText: Bradley M. Bell <bradbell@seanet.com>
// SPDX-FileContributor: 2025 Bradley M. Bell
// ---------------------------------------------------------------------------
//
// S6: CompareChange flag (spec.md §8).

use rustad::{condition_expression, start_recording, stop_recording, CompareOp};

#[test]
fn flag_is_zero_when_no_comparison_flips() {
    let ax = start_recording::<f64>(vec![1.0, 2.0]).unwrap();
    let y = condition_expression(
        CompareOp::Lt,
        ax[0].clone(),
        ax[1].clone(),
        ax[0].clone(),
        ax[1].clone(),
    );
    let f = stop_recording(vec![y]).unwrap();

    let _ = f.forward(0, &[1.0, 2.0]).unwrap();
    assert_eq!(f.compare_change_count(), 0);
}

#[test]
fn flag_counts_a_flipped_comparison() {
    let ax = start_recording::<f64>(vec![1.0, 2.0]).unwrap();
    let y = condition_expression(
        CompareOp::Lt,
        ax[0].clone(),
        ax[1].clone(),
        ax[0].clone(),
        ax[1].clone(),
    );
    let f = stop_recording(vec![y]).unwrap();

    let _ = f.forward(0, &[1.0, 2.0]).unwrap();
    assert_eq!(f.compare_change_count(), 0);

    f.clear_forward();
    let _ = f.forward(0, &[3.0, 2.0]).unwrap();
    assert_eq!(f.compare_change_count(), 1);
}
