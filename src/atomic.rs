// SPDX-License-Identifier: EPL-2.0 OR GPL-2.0-or-later
// SPDX-FileCopyrightText: Bradley M. Bell <bradbell@seanet.com>
// SPDX-FileContributor: 2025 Bradley M. Bell
// ---------------------------------------------------------------------------
//
//! This pub module defines the interface an atomic (externally supplied)
//! function must implement to be recorded and replayed on a tape
//! (`spec.md` §1: atomic functions are an external collaborator — this
//! crate owns only their call-marker op-codes and dispatch interface,
//! not an atomic-function library).
//!
//! Link to [parent module](super)
//!
//! Grounded on `src/atom.rs`'s callback-object pattern, reduced to the
//! single `forward` entry point this crate's sweeps actually need.
// ---------------------------------------------------------------------------
use crate::base::Base;
//
// AtomicFun
/// An externally implemented function called from a recording.
///
/// Implementors compute one Taylor order at a time for every output,
/// given the same order's coefficients for every input (`spec.md` §4.5
/// "reuse the same op table with per-op forward-Taylor formulas" applies
/// to atomic calls too, just dispatched through this trait instead of an
/// [crate::op_code::OpCode] match).
pub trait AtomicFun<V: Base>: Send + Sync {
    /// the name this function is registered under; must match the name
    /// used to record the call (`spec.md` §6 "atomic function call").
    fn name(&self) -> &str;
    //
    /// compute order `order`'s coefficient for every result, given order
    /// `order`'s coefficient for every argument, in call order. Only
    /// orders 0 and 1 are required to be implemented; orders above that
    /// may return all zeros (`spec.md` §1 treats atomic functions as an
    /// external collaborator, so this crate does not mandate a full
    /// higher-order Taylor interface for them).
    fn forward(&self, order: usize, tx: &[V]) -> Vec<V>;
}
//
// AtomicRegistry
/// A lookup table from atomic-function name to implementation, owned by
/// a [crate::Function] (`spec.md` §5: "immutable function object").
#[derive(Default)]
pub struct AtomicRegistry<V: Base> {
    entries: Vec<std::sync::Arc<dyn AtomicFun<V>>>,
}
//
impl<V: Base> AtomicRegistry<V> {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }
    //
    pub fn register(&mut self, f: std::sync::Arc<dyn AtomicFun<V>>) {
        self.entries.push(f);
    }
    //
    pub fn find(&self, name: &str) -> Option<&std::sync::Arc<dyn AtomicFun<V>>> {
        self.entries.iter().find(|f| f.name() == name)
    }
}
