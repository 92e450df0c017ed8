// SPDX-License-Identifier: EPL-2.0 OR GPL-2.0-or-later
// SPDX-FileCopyrightText: Bradley M. Bell <bradbell@seanet.com>
// SPDX-FileContributor: 2025 Bradley M. Bell
// ---------------------------------------------------------------------------
//
// Persistable tape format (spec.md §6).

use rustad::{start_recording, stop_recording, CppAdGraph};

#[test]
fn graph_dependent_count_matches_the_function() {
    let ax = start_recording::<f64>(vec![2.0, 3.0]).unwrap();
    let y0 = ax[0].clone() * ax[1].clone();
    let y1 = ax[0].clone() + ax[1].clone();
    let f = stop_recording(vec![y0, y1]).unwrap();

    let graph = CppAdGraph::from_function(&f, "two_outputs").unwrap();
    assert_eq!(graph.function_name, "two_outputs");
    assert_eq!(graph.n_variable_ind, 2);
    assert_eq!(graph.dependent_vec.len(), 2);

    let mut buf = Vec::new();
    graph.print(&mut buf).unwrap();
    assert!(!buf.is_empty());
}
