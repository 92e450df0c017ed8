// SPDX-License-Identifier: EPL-2.0 OR GPL-2.0-or-later
// SPDX-FileCopyrightText: Bradley M. Bell <bradbell@seanet.com>
// SPDX-FileContributor: 2025 Bradley M. Bell
// ---------------------------------------------------------------------------
//
//! `rustad` records operations on an active scalar type, [AD], and
//! replays the recording to compute derivatives by forward or reverse
//! mode, to arbitrary order, with sparsity detection and a tape
//! optimizer (`spec.md` §1 Overview).
//!
//! # Recording
//! [start_recording] opens a thread-local tape and returns the
//! independent [AD] variables; ordinary Rust arithmetic and the
//! intrinsics in [ad::unary] build up an expression using them;
//! [stop_recording] seals the tape into a replayable [Function].
//!
//! ```
//! use rustad::{start_recording, stop_recording};
//!
//! let ax = start_recording::<f64>(vec![1.0, 2.0]).unwrap();
//! let ay = ax[0].clone() * ax[1].clone() + ax[0].clone().sin();
//! let f = stop_recording(vec![ay]).unwrap();
//!
//! let y = f.forward(0, &[1.0, 2.0]).unwrap();
//! let dw = f.reverse(1, &[1.0]).unwrap();
//! assert_eq!(dw.len(), 2);
//! ```
// ---------------------------------------------------------------------------
pub mod ad;
pub mod atomic;
pub mod base;
pub mod error;
pub mod function;
pub mod graph;
pub mod op_code;
pub(crate) mod tape;
pub mod vec_ad;
//
pub use ad::{condition_expression, AD};
pub use base::Base;
pub use error::{AdError, AdResult};
pub use function::{abort_recording, start_recording, stop_recording, Function};
pub use graph::{CppAdGraph, GraphOpEnum};
pub use op_code::CompareOp;
pub use vec_ad::VecAD;
