// SPDX-License-Identifier: EPL-2.0 OR GPL-2.0-or-later
// SPDX-FileCopyrightText: Bradley M. Bell <bradbell@seanet.com>
// SPDX-FileContributor: 2025 Bradley M. Bell
// ---------------------------------------------------------------------------
//
//! This pub module defines the active scalar `AD<V>` (`spec.md` §4.1).
//!
//! Link to [parent module](super)
//!
//! Grounded on `src/ad/mod.rs`'s `ad_binary_op!` macro family, simplified
//! to `spec.md`'s variable/parameter (no dynamic-parameter) classification.
// ---------------------------------------------------------------------------
pub mod binary;
pub mod compare;
pub mod unary;
//
pub use compare::condition_expression;
//
use crate::base::Base;
use crate::error::AdError;
use crate::op_code::OpCode;
use crate::tape::sealed::ThisThreadTape;
use crate::tape::{Addr, Tape, PHANTOM};
use std::cell::RefCell;
use std::thread::LocalKey;
//
// Classification
/// The classification of an `AD<V>` object with respect to the tape
/// currently recording on this thread (`spec.md` §4.1).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Classification {
    /// no recording is active, or this object's `tape_id` does not match
    /// the current recording: treat its value as a constant.
    Parameter,
    /// this object is the result of an op on the currently-recording tape.
    Variable,
}
//
// AD
/// `AD<V>` acts like `V` but also records the operations performed on it
/// while a recording is active on this thread.
///
/// * Construction from a `V` (or from `i32`/`u32`/`usize`) yields a
///   parameter: `tape_id` 0, never recorded.
/// * Copy/move preserves `(value, tape_id, var_index)` verbatim.
#[derive(Clone, Debug)]
pub struct AD<V> {
    pub(crate) value: V,
    pub(crate) tape_id: usize,
    pub(crate) var_index: Addr,
}
//
impl<V: Base> AD<V> {
    pub(crate) fn new(value: V, tape_id: usize, var_index: Addr) -> Self {
        Self { value, tape_id, var_index }
    }
    //
    /// An `AD<V>` with no tape association; see `spec.md` §4.1.
    pub fn from_value(value: V) -> Self {
        Self { value, tape_id: 0, var_index: PHANTOM }
    }
    //
    /// The value carried by this object, ignoring any tape record.
    pub fn value(&self) -> V {
        self.value
    }
    //
    /// Classify `self` against the tape currently recording on this
    /// thread (if any), returning [AdError::StaleVariable] if
    /// `self.tape_id` names a *different*, nonzero recording
    /// (`spec.md` §4.1 "Error conditions").
    pub(crate) fn try_classify(&self, tape: &Tape<V>) -> Result<Classification, AdError>
    where
        V: Clone + PartialEq,
    {
        if !tape.recording || self.tape_id == 0 {
            Ok(Classification::Parameter)
        } else if self.tape_id == tape.tape_id {
            Ok(Classification::Variable)
        } else {
            Err(AdError::StaleVariable { used: self.tape_id, current: tape.tape_id })
        }
    }
    //
    /// [Self::try_classify], panicking on [AdError::StaleVariable] for
    /// call sites (the `std::ops` trait impls, and the ergonomic
    /// intrinsic methods that chain the way they do) whose signature
    /// cannot return a `Result`.
    pub(crate) fn classify(&self, tape: &Tape<V>) -> Classification
    where
        V: Clone + PartialEq,
    {
        match self.try_classify(tape) {
            Ok(class) => class,
            Err(err) => panic!("{err}"),
        }
    }
    //
    /// `true` if `self` carries no record on the currently-recording tape.
    pub fn is_parameter(&self) -> bool
    where
        V: Clone + PartialEq + ThisThreadTape,
    {
        let local_key: &LocalKey<RefCell<Tape<V>>> = ThisThreadTape::get();
        local_key.with_borrow(|tape| self.classify(tape) == Classification::Parameter)
    }
    //
    /// `true` if `self` is the result of a recorded op on the
    /// currently-recording tape.
    pub fn is_variable(&self) -> bool
    where
        V: Clone + PartialEq + ThisThreadTape,
    {
        !self.is_parameter()
    }
    //
    /// Truncate `self`'s value towards zero and return as `i64`
    /// (`spec.md` §6 `integer(ax)`; used by VecAD index computation).
    pub fn integer(&self) -> i64 {
        self.value.to_i64()
    }
}
//
impl<V: std::fmt::Display> std::fmt::Display for AD<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.value)
    }
}
//
// From impls: constant parameters from plain numbers.
macro_rules! impl_ad_from_number { ($T:ty) => {
    impl<V: Base> From<$T> for AD<V> {
        fn from(n: $T) -> AD<V> {
            AD::from_value(V::from(n as f64))
        }
    }
} }
impl_ad_from_number!(i32);
impl_ad_from_number!(u32);
impl_ad_from_number!(usize);
//
// `f32`/`f64` are not run through `impl_ad_from_number!`: for `V = f32`
// or `V = f64` that would conflict with the blanket `From<V>` impl below
// (both would implement `From<f64> for AD<f64>`). The blanket impl
// already covers "construct an `AD<V>` from a bare `V` literal".
impl<V: Base> From<V> for AD<V> {
    fn from(value: V) -> AD<V> {
        AD::from_value(value)
    }
}
//
// record_result
/// Helper used by every operator/intrinsic recorder: allocate a new
/// result of `code` on `tape` with argument `args`, returning the
/// variable index. Call sites still have to compute the *value*
/// themselves (the `Base` formula is an external collaborator per
/// `spec.md` §1).
pub(crate) fn record_op<V: Clone + PartialEq>(
    tape: &mut Tape<V>,
    code: OpCode,
    args: &[Addr],
) -> Addr {
    tape.put_op(code, args)
}
//
#[cfg(test)]
mod tests {
    use super::*;
    use crate::{start_recording, stop_recording};
    //
    #[test]
    fn parameter_classification() {
        let p: AD<f64> = AD::from_value(3.0);
        assert!(p.is_parameter());
        assert_eq!(p.value(), 3.0);
    }
    //
    #[test]
    fn variable_classification() {
        let ax = start_recording::<f64>(vec![1.0]).unwrap();
        assert!(ax[0].is_variable());
        let _f = stop_recording(ax).unwrap();
    }
}
