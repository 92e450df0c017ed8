// SPDX-License-Identifier: EPL-2.0 OR GPL-2.0-or-later
// SPDX-FileCopyrightText: Bradley M. Bell <bradbell@seanet.com>
// SPDX-FileContributor: 2025 Bradley M. Bell
// ---------------------------------------------------------------------------
//
//! This pub(crate) module defines the tape recorder (`spec.md` §4.3) and
//! its pools (§3: parameter pool, text pool, indexed-vector pool).
//!
//! Link to [parent module](super)
//!
//! Grounded on `src/tape.rs`'s `OpSequence` / `sealed::ThisThreadTape`
//! pattern, generalized to `spec.md`'s single variable/parameter
//! tape model (no separate dynamic-parameter stream).
// ---------------------------------------------------------------------------
use crate::op_code::OpCode;
use std::cell::RefCell;
use std::sync::Mutex;
use std::thread::LocalKey;
//
/// Index type used inside tape buffers; saves space relative to `usize`
/// the way the teacher's `IndexT` does.
pub type Addr = u32;
//
/// Variable index 0 is the reserved phantom (`spec.md` §3 Invariants).
pub const PHANTOM: Addr = 0;
//
// grow_push
/// Push `value` onto `vec`, pre-reserving capacity in doubling-plus-slack
/// increments when the vector is at capacity, instead of letting a single
/// `Vec::push` repeatedly re-allocate by one element at a time
/// (`spec.md` §4.3 "Growth policy").
pub(crate) fn grow_push<T>(vec: &mut Vec<T>, value: T) {
    if vec.len() == vec.capacity() {
        let slack = 8;
        vec.reserve(vec.capacity() + slack);
    }
    vec.push(value);
}
// ---------------------------------------------------------------------------
// ParPool
/// Append-only table of `Base` constants (`spec.md` §3 "Parameter index").
#[derive(Clone)]
pub struct ParPool<V> {
    values: Vec<V>,
}
impl<V: Clone + PartialEq> Default for ParPool<V> {
    fn default() -> Self {
        Self::new()
    }
}
impl<V: Clone + PartialEq> ParPool<V> {
    pub(crate) fn new() -> Self {
        Self { values: Vec::new() }
    }
    /// Append `value`, reusing one of the last three entries on bitwise
    /// equality (`spec.md` §3: "a dedup window, not a hash table").
    pub fn put(&mut self, value: V) -> Addr {
        let n = self.values.len();
        let window = n.saturating_sub(3);
        for i in window..n {
            if self.values[i] == value {
                return i as Addr;
            }
        }
        grow_push(&mut self.values, value);
        (self.values.len() - 1) as Addr
    }
    pub fn get(&self, index: Addr) -> &V {
        &self.values[index as usize]
    }
    pub fn len(&self) -> usize {
        self.values.len()
    }
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
    pub fn as_slice(&self) -> &[V] {
        &self.values
    }
}
// ---------------------------------------------------------------------------
// TextPool
/// Append-only packed store of null-terminated strings (`spec.md` §3).
#[derive(Clone, Default)]
pub struct TextPool {
    bytes: Vec<u8>,
}
impl TextPool {
    fn new() -> Self {
        Self { bytes: Vec::new() }
    }
    pub fn put(&mut self, s: &str) -> Addr {
        let offset = self.bytes.len() as Addr;
        for b in s.as_bytes() {
            grow_push(&mut self.bytes, *b);
        }
        grow_push(&mut self.bytes, 0u8);
        offset
    }
    pub fn get(&self, offset: Addr) -> &str {
        let start = offset as usize;
        let mut end = start;
        while end < self.bytes.len() && self.bytes[end] != 0 {
            end += 1;
        }
        std::str::from_utf8(&self.bytes[start..end]).unwrap_or("")
    }
    pub fn len(&self) -> usize {
        self.bytes.len()
    }
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}
// ---------------------------------------------------------------------------
// VecAdElement
/// One element of the indexed-vector pool's shared element table
/// (`spec.md` §3: "(is-variable flag, value index) pairs").
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VecAdElement {
    pub is_variable: bool,
    pub value_index: Addr,
}
//
// VecAdDescriptor
/// One entry in the indexed-vector pool (`spec.md` §3 "IndexedVector
/// descriptor").
#[derive(Clone, Copy, Debug)]
pub struct VecAdDescriptor {
    pub length: usize,
    pub offset: Addr,
}
//
// VecAdPool
/// Append-only storage describing every [crate::VecAD] recorded during a
/// session: one descriptor per vector, plus a shared element table.
#[derive(Clone, Default)]
pub struct VecAdPool {
    pub descriptors: Vec<VecAdDescriptor>,
    pub elements: Vec<VecAdElement>,
}
impl VecAdPool {
    fn new() -> Self {
        Self { descriptors: Vec::new(), elements: Vec::new() }
    }
    /// Seal a new vector's initial element snapshot, returning its
    /// descriptor index.
    pub fn put(&mut self, initial: &[VecAdElement]) -> Addr {
        let offset = self.elements.len() as Addr;
        for e in initial {
            grow_push(&mut self.elements, *e);
        }
        let id = self.descriptors.len() as Addr;
        grow_push(
            &mut self.descriptors,
            VecAdDescriptor { length: initial.len(), offset },
        );
        id
    }
    pub fn descriptor(&self, id: Addr) -> VecAdDescriptor {
        self.descriptors[id as usize]
    }
}
// ---------------------------------------------------------------------------
// OpSequence
/// The growing parallel buffers that make up a recording
/// (`spec.md` §3: "op stream" and "argument stream").
#[derive(Clone, Default)]
pub struct OpSequence {
    /// one entry per recorded op
    pub op_vec: Vec<OpCode>,
    /// `arg_start[i]` is the index, in `arg_all`, of op `i`'s first
    /// argument; has one extra trailing sentinel equal to `arg_all.len()`.
    pub arg_start: Vec<Addr>,
    /// flat argument stream shared by every op
    pub arg_all: Vec<Addr>,
    /// total number of tape-variable indices, including the phantom.
    pub n_var: usize,
    /// number of independent variables (`Inv` results), set once at
    /// the start of a recording.
    pub n_ind: usize,
}
impl OpSequence {
    fn new() -> Self {
        Self {
            op_vec: Vec::new(),
            arg_start: Vec::new(),
            arg_all: Vec::new(),
            n_var: 1, // slot 0 is the phantom; see spec.md §3
            n_ind: 0,
        }
    }
    /// number of ops recorded so far.
    pub fn len(&self) -> usize {
        self.op_vec.len()
    }
    /// arguments for op `i`, once `arg_start` has its trailing sentinel
    /// (true after [crate::stop_recording] or inside a sealed [crate::Function]).
    pub fn args(&self, i: usize) -> &[Addr] {
        let start = self.arg_start[i] as usize;
        let end = self.arg_start[i + 1] as usize;
        &self.arg_all[start..end]
    }
}
// ---------------------------------------------------------------------------
// Tape
/// `Tape<V>` is where an `AD<V>` operation sequence is recorded.
pub struct Tape<V> {
    pub op: OpSequence,
    pub par: ParPool<V>,
    pub txt: TextPool,
    pub vec_ad: VecAdPool,
    pub recording: bool,
    pub tape_id: usize,
    /// `no_compare_op` disables recording of standalone comparison ops.
    pub record_compare: bool,
}
impl<V: Clone + PartialEq> Tape<V> {
    pub fn new() -> Self {
        Self {
            op: OpSequence::new(),
            par: ParPool::new(),
            txt: TextPool::new(),
            vec_ad: VecAdPool::new(),
            recording: false,
            tape_id: 0,
            record_compare: true,
        }
    }
    //
    /// Append an op-code with `n` already-known arguments, returning the
    /// tape-variable index of the op's first result
    /// (`spec.md` §4.3 `put_op`).
    pub fn put_op(&mut self, code: OpCode, args: &[Addr]) -> Addr {
        grow_push(&mut self.op.arg_start, self.op.arg_all.len() as Addr);
        for a in args {
            grow_push(&mut self.op.arg_all, *a);
        }
        grow_push(&mut self.op.op_vec, code);
        let first_result = self.op.n_var as Addr;
        self.op.n_var += code.result_count();
        first_result
    }
    //
    /// Append a constant and return its parameter index
    /// (`spec.md` §4.3 `put_par`).
    pub fn put_par(&mut self, value: V) -> Addr {
        self.par.put(value)
    }
    //
    /// Append text and return its offset (`spec.md` §4.3 `put_txt`).
    pub fn put_txt(&mut self, s: &str) -> Addr {
        self.txt.put(s)
    }
    //
    /// Overwrite argument stream entry `i` (`spec.md` §4.3
    /// `replace_arg`, used by the optimizer's conditional-skip pass to
    /// patch a renumbered target).
    pub fn replace_arg(&mut self, i: usize, value: Addr) {
        self.op.arg_all[i] = value;
    }
    //
    /// Discard any previous recording and start a fresh one with a new
    /// `tape_id` (`spec.md` §4.3 "a recording session is bound to the
    /// thread that started it").
    pub(crate) fn begin_recording(&mut self, tape_id: usize) {
        *self = Self::new();
        self.recording = true;
        self.tape_id = tape_id;
    }
}
impl<V: Clone + PartialEq> Default for Tape<V> {
    fn default() -> Self {
        Self::new()
    }
}
// ---------------------------------------------------------------------------
// NEXT_TAPE_ID
/// tape_id values 1..NEXT_TAPE_ID have been used; 0 is never a recording
/// (`spec.md` §5: "a recording session is bound to the thread that
/// started it"; the counter itself is shared across threads so ids never
/// collide, letting stale `AD` objects from another thread's earlier
/// recording be detected too).
pub(crate) static NEXT_TAPE_ID: Mutex<usize> = Mutex::new(1);
//
pub(crate) mod sealed {
    //! Seals `ThisThreadTape` so it cannot be implemented outside this crate.
    use super::Tape;
    use std::cell::RefCell;
    use std::thread::LocalKey;
    //
    /// `V::get()` returns this thread's tape for recording `AD<V>` ops.
    pub trait ThisThreadTape
    where
        Self: Sized + 'static,
    {
        fn get() -> &'static LocalKey<RefCell<Tape<Self>>>;
    }
}
//
// impl_this_thread_tape!
/// Implement [sealed::ThisThreadTape] for a concrete `Base`. Invoked once
/// per supported `Base` type, matching the teacher's
/// `impl_this_thread_tape!` macro.
macro_rules! impl_this_thread_tape { ($V:ty) => {
    impl crate::tape::sealed::ThisThreadTape for $V {
        fn get() -> &'static LocalKey<RefCell<crate::tape::Tape<$V>>> {
            thread_local! {
                pub(crate) static THIS_THREAD_TAPE:
                    RefCell<crate::tape::Tape<$V>> =
                    RefCell::new(crate::tape::Tape::new());
            }
            &THIS_THREAD_TAPE
        }
    }
} }
pub(crate) use impl_this_thread_tape;
impl_this_thread_tape!(f64);
impl_this_thread_tape!(f32);
