// SPDX-License-Identifier: EPL-2.0 OR GPL-2.0-or-later
// SPDX-FileCopyrightText: Bradley M. Bell <bradbell@seanet.com>
// SPDX-FileContributor: 2025 Bradley M. Bell
// ---------------------------------------------------------------------------
//
//! This pub module defines the error type returned by fallible rustad
//! operations.
//!
//! Link to [parent module](super)
// ---------------------------------------------------------------------------
//
// AdError
/// Error conditions that can be reported by the tape recorder,
/// the function object, and its sweeps.
///
/// `CompareChanged` is not a member of this enum; it is a counter
/// returned alongside a successful [forward](crate::Function::forward)
/// call, not a failure (see `spec.md` §7).
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum AdError {
    //
    // StaleVariable
    #[error(
        "AD<V> object with tape_id {used} used while thread's tape \
         has tape_id {current}"
    )]
    /// An [AD](crate::AD) object recorded on one tape was used
    /// while a different recording is active on this thread.
    StaleVariable {
        /// tape_id stored in the stale AD object
        used    : usize,
        /// tape_id of the tape currently recording on this thread
        current : usize,
    },
    //
    // IndexedVectorBounds
    #[error(
        "VecAD index {index} is out of bounds for a vector of length {length}"
    )]
    /// A [VecAD](crate::VecAD) access used an index outside `[0, length)`.
    IndexedVectorBounds {
        /// the out of range index (after truncation to an integer)
        index  : i64,
        /// the length of the VecAD vector being accessed
        length : usize,
    },
    //
    // DependentNotVariable
    #[error("dependent variable {index} is not a variable or parameter \
        on the tape being stopped")]
    /// A value passed to [stop_recording](crate::stop_recording) did not
    /// originate, directly or indirectly, from the tape being stopped.
    DependentNotVariable {
        /// position of the offending value in the dependent vector
        index : usize,
    },
    //
    // IndependentNotVariable
    #[error("independent variable {index} is not an Inv result of \
        the current recording")]
    /// A value used where an independent variable was required is not
    /// one of the `Inv` results produced by
    /// [start_recording](crate::start_recording).
    IndependentNotVariable {
        /// position of the offending value in the independent vector
        index : usize,
    },
    //
    // OrderTooHigh
    #[error(
        "forward(order = {requested}) called but only {available} \
         prior order(s) have been computed"
    )]
    /// [Function::forward](crate::Function::forward) was asked for an
    /// order higher than `available + 1`.
    OrderTooHigh {
        /// the order that was requested
        requested : usize,
        /// the number of orders already computed and stored
        available : usize,
    },
    //
    // NaNDetected
    #[error("NaN detected in order {order} Taylor coefficient of \
        variable {var_index} during op {op_index}")]
    /// A Taylor coefficient became `NaN` during a sweep and
    /// NaN-checking was enabled (the default).
    NaNDetected {
        /// the order at which the NaN first appeared
        order     : usize,
        /// the tape-variable index holding the NaN
        var_index : usize,
        /// the index, in the op stream, of the operator that produced it
        op_index  : usize,
    },
    //
    // MemoryExhausted
    #[error("tape buffer growth failed: {what}")]
    /// A tape buffer could not grow to the size requested.
    MemoryExhausted {
        /// which buffer failed to grow
        what : &'static str,
    },
    //
    // RecorderBusy
    #[error("start_recording: this thread's tape is already recording")]
    /// [start_recording](crate::start_recording) was called while a
    /// recording was already in progress on this thread.
    RecorderBusy,
    //
    // NotRecording
    #[error("stop_recording/abort_recording: this thread's tape is not recording")]
    /// [stop_recording](crate::stop_recording) or
    /// [abort_recording](crate::abort_recording) was called while no
    /// recording was in progress on this thread.
    NotRecording,
    //
    // UnknownOption
    #[error("optimize: unrecognized option token {token:?}")]
    /// [Function::optimize](crate::Function::optimize) was given an
    /// option string containing a token it does not recognize.
    UnknownOption {
        /// the offending token
        token : String,
    },
}
// `CollisionLimitExceeded` (`spec.md` §7) is not a variant here: the spec
// calls it out as "not fatal", reported via
// [Function::exceed_collision_limit](crate::Function::exceed_collision_limit)
// rather than as a `Result::Err`, the same way `CompareChanged` is a
// counter rather than an error.
//
/// Convenience alias used throughout the crate.
pub type AdResult<T> = Result<T, AdError>;
