// SPDX-License-Identifier: EPL-2.0 OR GPL-2.0-or-later
// SPDX-FileCopyrightText: Bradley M. Bell <bradbell@seanet.com>
// SPDX-FileContributor: 2025 Bradley M. Bell
// ---------------------------------------------------------------------------
//
//! This pub module defines [Function], the sealed recording of an
//! `AD<V>` operation sequence, and the free functions that open/close a
//! recording on the current thread (`spec.md` §4.4 "Function Object").
//!
//! Link to [parent module](super)
//!
//! Grounded on `adfn/mod.rs`'s `ADfn<V>` layout, generalized to this
//! crate's single variable/parameter tape model and to a `forward`/
//! `reverse` sweep API expressed directly in terms of [Tape]'s pools
//! rather than a separate dynamic-parameter stream.
// ---------------------------------------------------------------------------
pub mod forward;
pub mod forward_dir;
pub mod optimize;
pub mod reverse;
pub mod sparsity;
pub mod for_sparse_jac;
pub mod rev_sparse_jac;
pub mod rev_sparse_hes;
pub mod sparse_eval;
pub mod subgraph;
//
use crate::ad::AD;
use crate::atomic::AtomicRegistry;
use crate::base::Base;
use crate::error::{AdError, AdResult};
use crate::tape::sealed::ThisThreadTape;
use crate::tape::{Addr, OpSequence, ParPool, TextPool, VecAdPool, NEXT_TAPE_ID};
use std::cell::{Cell, RefCell};
//
// Function
/// An immutable, replayable recording of an `AD<V>` operation sequence
/// (`spec.md` §4.4). Safe to share read-only across threads (`spec.md`
/// §5), except that [forward](Function::forward)/[reverse](Function::reverse)
/// each hold an internal mutable Taylor-coefficient cache and so require
/// `&self` only from one evaluation at a time per `Function` value —
/// documented, not enforced by a lock (`spec.md` §5).
pub struct Function<V> {
    pub(crate) op: OpSequence,
    pub(crate) par: ParPool<V>,
    pub(crate) txt: TextPool,
    pub(crate) vec_ad: VecAdPool,
    pub(crate) range_is_var: Vec<bool>,
    pub(crate) range_index: Vec<Addr>,
    pub(crate) atomics: AtomicRegistry<V>,
    pub(crate) taylor: RefCell<Vec<Vec<V>>>,
    /// per-direction Taylor coefficient cache used by
    /// [forward_dir](crate::function::forward_dir), kept separate from
    /// [Self::taylor] because a multi-direction sweep needs order 0
    /// shared across all directions but orders `>= 1` kept apart per
    /// direction (`spec.md` §4.5 "multi-direction forward").
    pub(crate) taylor_dir: RefCell<Vec<Vec<Vec<V>>>>,
    /// number of comparisons whose result at the most recent order-0
    /// [forward](Function::forward) call differed from what was recorded
    /// (`spec.md` §4.4 `compare_change_count`); reset at the start of
    /// every order-0 call.
    pub(crate) compare_change_count: Cell<usize>,
    /// whether [forward](Function::forward) should check every computed
    /// Taylor coefficient for `NaN` and fail with
    /// [AdError::NaNDetected](crate::error::AdError::NaNDetected)
    /// (`spec.md` §7), on by default.
    pub(crate) check_for_nan: Cell<bool>,
    /// set by [Function::optimize] when its common-subexpression hash
    /// table hit `collision_limit` for some op; not fatal (`spec.md` §7
    /// "CollisionLimitExceeded (not an error, a counter)" — reported via
    /// [Function::exceed_collision_limit], the optimizer still produces a
    /// valid, just-less-deduplicated tape).
    pub(crate) exceed_collision_limit: bool,
}
//
impl<V: Base> Function<V> {
    /// number of independent (domain) variables.
    pub fn domain_len(&self) -> usize {
        self.op.n_ind
    }
    /// number of dependent (range) variables.
    pub fn range_len(&self) -> usize {
        self.range_index.len()
    }
    /// total tape-variable count, including the phantom and bookkeeping
    /// markers (`spec.md` §6 `size_var`).
    pub fn size_var(&self) -> usize {
        self.op.n_var
    }
    /// number of recorded ops.
    pub fn size_op(&self) -> usize {
        self.op.len()
    }
    /// number of entries in the parameter pool.
    pub fn size_par(&self) -> usize {
        self.par.len()
    }
    /// number of bytes in the text pool.
    pub fn size_text(&self) -> usize {
        self.txt.len()
    }
    /// number of [crate::VecAD] vectors recorded.
    pub fn size_vec_ad(&self) -> usize {
        self.vec_ad.descriptors.len()
    }
    /// number of Taylor orders currently cached by [Function::forward].
    pub fn size_order(&self) -> usize {
        self.taylor.borrow().len()
    }
    /// register an atomic-function implementation so calls recorded
    /// under its name can be replayed (`spec.md` §1: atomic functions
    /// are an external collaborator this crate only provides an
    /// interface for).
    pub fn register_atomic(&mut self, f: std::sync::Arc<dyn crate::atomic::AtomicFun<V>>) {
        self.atomics.register(f);
    }
    /// discard any cached Taylor coefficients, forcing the next
    /// [Function::forward] call to start again from order 0.
    pub fn clear_forward(&self) {
        self.taylor.borrow_mut().clear();
        self.taylor_dir.borrow_mut().clear();
    }
    /// number of directions currently cached by
    /// [forward_dir](Function::forward_dir), 0 if none has run yet.
    pub fn size_direction(&self) -> usize {
        self.taylor_dir.borrow().len()
    }
    /// number of comparisons that evaluated differently during the most
    /// recent order-0 [forward](Function::forward) call than they did
    /// when recorded (`spec.md` §4.4, §8 scenario S6).
    pub fn compare_change_count(&self) -> usize {
        self.compare_change_count.get()
    }
    /// enable or disable `NaN` detection during forward sweeps
    /// (`spec.md` §7); on by default.
    pub fn set_check_for_nan(&self, value: bool) {
        self.check_for_nan.set(value);
    }
    /// `true` if the most recent [Function::optimize] call that produced
    /// this function hit its `collision_limit` option while hashing some
    /// op for common-subexpression elimination (`spec.md` §4.7 item 4,
    /// §7). Not fatal: the returned tape is still valid, just less
    /// deduplicated than it would otherwise be.
    pub fn exceed_collision_limit(&self) -> bool {
        self.exceed_collision_limit
    }
}
//
// start_recording
/// Begin recording an `AD<V>` operation sequence on this thread
/// (`spec.md` §6 "Recorder API"). `x` becomes the domain-space values;
/// the returned vector is the corresponding independent variables.
///
/// # Errors
/// [AdError::RecorderBusy] if this thread is already recording.
pub fn start_recording<V: Base + ThisThreadTape>(x: Vec<V>) -> AdResult<Vec<AD<V>>> {
    let local_key = <V as ThisThreadTape>::get();
    local_key.with_borrow_mut(|tape| {
        if tape.recording {
            return Err(AdError::RecorderBusy);
        }
        let tape_id = {
            let mut next = NEXT_TAPE_ID.lock().unwrap();
            let id = *next;
            *next += 1;
            id
        };
        tape.begin_recording(tape_id);
        // op_vec[0]: structural marker, result slot 1 (slot 0 is the
        // pre-reserved phantom; spec.md §3 Invariants).
        tape.put_op(crate::op_code::OpCode::Begin, &[]);
        let mut result = Vec::with_capacity(x.len());
        for value in x {
            let idx = tape.put_op(crate::op_code::OpCode::Inv, &[]);
            result.push(AD::new(value, tape_id, idx));
        }
        tape.op.n_ind = result.len();
        Ok(result)
    })
}
//
// stop_recording
/// End the recording in progress on this thread and seal it into a
/// [Function] (`spec.md` §6 "Recorder API"). `dependents` becomes the
/// range-space values, in order.
///
/// # Errors
/// [AdError::NotRecording] if no recording is in progress;
/// [AdError::DependentNotVariable] if a dependent value belongs to a
/// different (stale) recording than the one being stopped (values
/// constructed with no tape association at all are accepted as constant
/// range-space outputs, `spec.md` §4.4).
pub fn stop_recording<V: Base + ThisThreadTape>(
    dependents: Vec<AD<V>>,
) -> AdResult<Function<V>> {
    let local_key = <V as ThisThreadTape>::get();
    local_key.with_borrow_mut(|tape| {
        if !tape.recording {
            return Err(AdError::NotRecording);
        }
        tape.put_op(crate::op_code::OpCode::End, &[]);
        let mut range_is_var = Vec::with_capacity(dependents.len());
        let mut range_index = Vec::with_capacity(dependents.len());
        for (i, ad) in dependents.iter().enumerate() {
            if ad.tape_id == 0 {
                range_is_var.push(false);
                range_index.push(tape.put_par(ad.value()));
            } else if ad.tape_id == tape.tape_id {
                range_is_var.push(true);
                range_index.push(ad.var_index);
            } else {
                return Err(AdError::DependentNotVariable { index: i });
            }
        }
        // seal arg_start's trailing sentinel so OpSequence::args works.
        tape.op.arg_start.push(tape.op.arg_all.len() as Addr);
        let op = std::mem::take(&mut tape.op);
        let par = std::mem::take(&mut tape.par);
        let txt = std::mem::take(&mut tape.txt);
        let vec_ad = std::mem::take(&mut tape.vec_ad);
        tape.recording = false;
        Ok(Function {
            op,
            par,
            txt,
            vec_ad,
            range_is_var,
            range_index,
            atomics: AtomicRegistry::new(),
            taylor: RefCell::new(Vec::new()),
            taylor_dir: RefCell::new(Vec::new()),
            compare_change_count: Cell::new(0),
            check_for_nan: Cell::new(true),
            exceed_collision_limit: false,
        })
    })
}
//
// abort_recording
/// Discard the recording in progress on this thread without sealing it
/// into a [Function] (`spec.md` §6 "Recorder API" `abort()`).
///
/// # Errors
/// [AdError::NotRecording] if no recording is in progress.
pub fn abort_recording<V: Base + ThisThreadTape>() -> AdResult<()> {
    let local_key = <V as ThisThreadTape>::get();
    local_key.with_borrow_mut(|tape| {
        if !tape.recording {
            return Err(AdError::NotRecording);
        }
        *tape = crate::tape::Tape::new();
        Ok(())
    })
}
//
#[cfg(test)]
mod tests {
    use super::*;
    //
    #[test]
    fn start_stop_roundtrip() {
        let ax = start_recording::<f64>(vec![1.0, 2.0]).unwrap();
        let ay = ax[0].clone() + ax[1].clone();
        let f = stop_recording(vec![ay]).unwrap();
        assert_eq!(f.domain_len(), 2);
        assert_eq!(f.range_len(), 1);
        assert!(f.size_op() > 0);
    }
    //
    #[test]
    fn double_start_is_an_error() {
        let ax = start_recording::<f64>(vec![1.0]).unwrap();
        let err = start_recording::<f64>(vec![1.0]).unwrap_err();
        assert!(matches!(err, AdError::RecorderBusy));
        let _ = stop_recording(ax).unwrap();
    }
    //
    #[test]
    fn abort_clears_the_recording_in_progress() {
        let _ax = start_recording::<f64>(vec![1.0]).unwrap();
        abort_recording::<f64>().unwrap();
        // a fresh recording can start immediately after an abort.
        let ax = start_recording::<f64>(vec![2.0, 3.0]).unwrap();
        let f = stop_recording(ax).unwrap();
        assert_eq!(f.domain_len(), 2);
        // nothing is recording now, so a second abort is an error.
        let err = abort_recording::<f64>().unwrap_err();
        assert!(matches!(err, AdError::NotRecording));
    }
}
