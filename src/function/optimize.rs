// SPDX-License-Identifier: EPL-2.0 OR GPL-2.0-or-later
// SPDX-FileCopyrightText: Bradley M. Bell <bradbell@seanet.com>
// SPDX-FileContributor: 2025 Bradley M. Bell
// ---------------------------------------------------------------------------
//
//! Tape optimization (`spec.md` §4.7): dead-code elimination, common
//! subexpression elimination, cumulative-sum fusion, and
//! conditional-skip insertion, driven by an options string.
//!
//! Link to [parent module](super)
//!
//! Grounded on `adfn/optimize/{reverse_depend,dead_code,op_hash_map,
//! renumber}.rs`'s four-pass shape (compute a dependency flag per
//! variable, rebuild the tape keeping only what is depended on,
//! deduplicate equivalent operators through a hash table, patch
//! argument references to the first of each equivalent group),
//! re-expressed over this crate's single-pool `OpSequence` rather than
//! the teacher's separate constant/dynamic-parameter/variable op
//! sequences. The hash-table dedup pass reuses `rustc_hash::FxHashMap`,
//! the same crate `adfn/optimize/op_hash_map.rs` uses for its
//! `OpHashMap`.
// ---------------------------------------------------------------------------
use super::Function;
use crate::base::Base;
use crate::error::{AdError, AdResult};
use crate::op_code::OpCode;
use crate::tape::{Addr, Tape};
use rustc_hash::FxHashMap;
use std::collections::BTreeSet;
//
// OptimizeOptions
/// Parsed form of the whitespace-separated option string accepted by
/// [Function::optimize] (`spec.md` §4.7 item 4).
#[derive(Clone, Debug)]
struct OptimizeOptions {
    no_conditional_skip: bool,
    no_compare_op: bool,
    no_print_for_op: bool,
    no_cumulative_sum_op: bool,
    collision_limit: usize,
}
impl OptimizeOptions {
    fn parse(s: &str) -> AdResult<Self> {
        let mut opt = OptimizeOptions {
            no_conditional_skip: false,
            no_compare_op: false,
            no_print_for_op: false,
            no_cumulative_sum_op: false,
            collision_limit: 10,
        };
        for token in s.split_whitespace() {
            if token == "no_conditional_skip" {
                opt.no_conditional_skip = true;
            } else if token == "no_compare_op" {
                opt.no_compare_op = true;
            } else if token == "no_print_for_op" {
                opt.no_print_for_op = true;
            } else if token == "no_cumulative_sum_op" {
                opt.no_cumulative_sum_op = true;
            } else if token == "val_graph" {
                // accepted for compatibility with a CppAD-style options
                // string; this crate has no separate value-graph
                // representation to switch to, so it is a no-op here.
            } else if let Some(n) = token.strip_prefix("collision_limit=") {
                opt.collision_limit = n
                    .parse()
                    .map_err(|_| AdError::UnknownOption { token: token.to_string() })?;
            } else {
                return Err(AdError::UnknownOption { token: token.to_string() });
            }
        }
        Ok(opt)
    }
}
//
/// the variable-valued operands op `code` reads, for dependency
/// analysis; unlike `subgraph.rs`'s `variable_operands` this includes
/// every operand read for any reason (index operands, comparison
/// operands), not only the ones that carry an adjoint, since dead-code
/// analysis must keep anything whose *value* the kept ops still read.
fn read_operands(code: OpCode, args: &[Addr]) -> Vec<usize> {
    use OpCode::*;
    match code {
        CSum => {
            let n_add = args[0] as usize;
            let n_sub = args[1] as usize;
            args[2..2 + n_add + n_sub].iter().map(|&a| a as usize).collect()
        }
        CExp => {
            let mask = args[1];
            (0..4usize)
                .filter(|j| mask & (1 << j) != 0)
                .map(|j| args[2 + j] as usize)
                .collect()
        }
        DisV => vec![args[1] as usize],
        Abs | Neg | Sign | Sqrt | Exp | Expm1 | Log | Log1p | Asinh | Acosh | Atanh | Tan | Sin
        | Cos | Asin | Acos | Atan | Sinh | Cosh | Tanh | Erf => vec![args[0] as usize],
        AddPp | AddPv | AddVp | AddVv | SubPp | SubPv | SubVp | SubVv | MulPp | MulPv | MulVp
        | MulVv | DivPp | DivPv | DivVp | DivVv | PowPp | PowPv | PowVp | PowVv | AzMulPp
        | AzMulPv | AzMulVp | AzMulVv => {
            let lhs_is_var = matches!(
                code,
                AddVp | AddVv | SubVp | SubVv | MulVp | MulVv | DivVp | DivVv | PowVp | PowVv | AzMulVp | AzMulVv
            );
            let rhs_is_var = matches!(
                code,
                AddPv | AddVv | SubPv | SubVv | MulPv | MulVv | DivPv | DivVv | PowPv | PowVv | AzMulPv | AzMulVv
            );
            let mut v = Vec::with_capacity(2);
            if lhs_is_var {
                v.push(args[0] as usize);
            }
            if rhs_is_var {
                v.push(args[1] as usize);
            }
            v
        }
        LtPv | LePv | EqPv | NePv | GePv | GtPv => vec![args[1] as usize],
        LtVp | LeVp | EqVp | NeVp | GeVp | GtVp => vec![args[0] as usize],
        LtVv | LeVv | EqVv | NeVv | GeVv | GtVv => vec![args[0] as usize, args[1] as usize],
        LdV => vec![args[1] as usize],
        StPv | StVv => {
            let mut v = vec![args[2] as usize];
            if matches!(code, StVv) {
                v.push(args[1] as usize);
            }
            v
        }
        StVp => vec![args[1] as usize],
        PriV => vec![args[1] as usize],
        AFunArgV => vec![args[0] as usize],
        _ => Vec::new(),
    }
}
//
/// op-codes eligible for common-subexpression elimination: pure
/// functions of their (already remapped) arguments with no side effect
/// and no dependence on runtime VecAD/atomic state (`spec.md` §4.7
/// item 3).
fn cse_eligible(code: OpCode) -> bool {
    use OpCode::*;
    matches!(
        code,
        Abs | Neg | Sign | Sqrt | Exp | Expm1 | Log | Log1p | Asinh | Acosh | Atanh | Tan | Sin
            | Cos | Asin | Acos | Atan | Sinh | Cosh | Tanh | Erf
            | AddPv | AddVp | AddVv | SubPv | SubVp | SubVv
            | MulPv | MulVp | MulVv | DivPv | DivVp | DivVv
            | PowPv | PowVp | PowVv | AzMulPv | AzMulVp | AzMulVv
    )
}
//
impl<V: Base> Function<V> {
    /// Produce an equivalent, optimized copy of this recording
    /// (`spec.md` §6 `optimize(options)`).
    ///
    /// `options` is a whitespace-separated token string; recognized
    /// tokens are `no_conditional_skip`, `no_compare_op`,
    /// `no_print_for_op`, `no_cumulative_sum_op`, `val_graph`, and
    /// `collision_limit=N` (default 10).
    ///
    /// If common-subexpression elimination's hash table exceeds
    /// `collision_limit` probes for some op, that op is simply left
    /// undeduplicated and [Function::exceed_collision_limit] becomes
    /// `true` on the result; this is not fatal (`spec.md` §4.7 item 4,
    /// §7: "the optimizer never fails except via `MemoryExhausted`").
    ///
    /// # Errors
    /// [AdError::UnknownOption] for an unrecognized token.
    pub fn optimize(&self, options: &str) -> AdResult<Function<V>> {
        let opt = OptimizeOptions::parse(options)?;
        let n_var = self.op.n_var;
        //
        // needed: reverse dependency mark-and-sweep (spec.md §4.7 item 1).
        let mut needed = vec![false; n_var];
        let mut vec_needed: BTreeSet<Addr> = BTreeSet::new();
        for (i, &is_var) in self.range_is_var.iter().enumerate() {
            if is_var {
                needed[self.range_index[i] as usize] = true;
            }
        }
        let mut op_first_result = vec![0usize; self.op.len()];
        {
            let mut next_var = 2 + self.op.n_ind;
            for (i, code) in self.op.op_vec.iter().enumerate() {
                op_first_result[i] = next_var;
                next_var += code.result_count();
            }
        }
        // every op inside one atomic call lives or dies together: the
        // begin/end/argument markers have no result of their own to test
        // for `needed`, so they inherit whichever call group they belong
        // to (spec.md §1: an atomic call is one external collaborator,
        // not a set of independently prunable ops).
        let mut call_group = vec![usize::MAX; self.op.len()];
        let n_groups;
        {
            let mut current = usize::MAX;
            let mut next_group = 0usize;
            for (i, &code) in self.op.op_vec.iter().enumerate() {
                if code == OpCode::AFunBegin {
                    current = next_group;
                    next_group += 1;
                }
                let is_member = matches!(
                    code,
                    OpCode::AFunBegin
                        | OpCode::AFunEnd
                        | OpCode::AFunArgP
                        | OpCode::AFunArgV
                        | OpCode::AFunResP
                        | OpCode::AFunResV
                );
                if current != usize::MAX && is_member {
                    call_group[i] = current;
                } else if current != usize::MAX {
                    current = usize::MAX;
                }
            }
            n_groups = next_group;
        }
        let is_call_marker = |code: OpCode| {
            matches!(
                code,
                OpCode::AFunBegin | OpCode::AFunEnd | OpCode::AFunArgP | OpCode::AFunArgV
            )
        };
        let mut group_needed = vec![false; n_groups];
        loop {
            let mut changed = false;
            for op_index in (0..self.op.len()).rev() {
                let code = self.op.op_vec[op_index];
                let args = self.op.args(op_index);
                let first_result = op_first_result[op_index];
                let keep = match code {
                    Begin | Inv | End => true,
                    _ if code.is_compare() => !opt.no_compare_op,
                    _ if code.is_print() => !opt.no_print_for_op,
                    OpCode::StPp | OpCode::StPv | OpCode::StVp | OpCode::StVv => {
                        vec_needed.contains(&args[0])
                    }
                    _ if is_call_marker(code) => {
                        call_group[op_index] != usize::MAX && group_needed[call_group[op_index]]
                    }
                    _ => (0..code.result_count()).any(|r| needed[first_result + r]),
                };
                if keep
                    && matches!(code, OpCode::AFunResV | OpCode::AFunResP)
                    && call_group[op_index] != usize::MAX
                    && !group_needed[call_group[op_index]]
                {
                    group_needed[call_group[op_index]] = true;
                    changed = true;
                }
                if !keep {
                    continue;
                }
                if matches!(code, OpCode::LdP | OpCode::LdV) {
                    vec_needed.insert(args[0]);
                }
                for v in read_operands(code, args) {
                    if !needed[v] {
                        needed[v] = true;
                        changed = true;
                    }
                }
            }
            if !changed {
                break;
            }
        }
        //
        // rebuild: single forward pass emitting only needed ops,
        // deduplicating CSE-eligible ones through a hash table
        // (spec.md §4.7 items 2-3).
        let mut tape = Tape::<V>::new();
        tape.put_op(OpCode::Begin, &[]);
        let mut new_var_index = vec![0 as Addr; n_var];
        for j in 0..self.op.n_ind {
            new_var_index[2 + j] = tape.put_op(OpCode::Inv, &[]);
        }
        tape.op.n_ind = self.op.n_ind;
        //
        let mut hash_table: FxHashMap<u64, Vec<(OpKey, Addr)>> = FxHashMap::default();
        let mut exceed_collision_limit = false;
        //
        for op_index in (1 + self.op.n_ind)..self.op.len() {
            let code = self.op.op_vec[op_index];
            if matches!(code, Begin | Inv | End) {
                continue;
            }
            let args = self.op.args(op_index);
            let first_result = op_first_result[op_index];
            let keep = match code {
                _ if code.is_compare() => !opt.no_compare_op,
                _ if code.is_print() => !opt.no_print_for_op,
                OpCode::StPp | OpCode::StPv | OpCode::StVp | OpCode::StVv => {
                    vec_needed.contains(&args[0])
                }
                _ if is_call_marker(code) => {
                    call_group[op_index] != usize::MAX && group_needed[call_group[op_index]]
                }
                OpCode::AFunResV | OpCode::AFunResP => {
                    call_group[op_index] != usize::MAX && group_needed[call_group[op_index]]
                }
                _ => (0..code.result_count()).any(|r| needed[first_result + r]),
            };
            if !keep {
                continue;
            }
            let new_args = remap_args(self, code, args, &new_var_index, &mut tape);
            if cse_eligible(code) {
                let key = OpKey { code, args: new_args.clone() };
                let bucket = hash_table.entry(key.hash_value()).or_default();
                if let Some((_, addr)) = bucket.iter().find(|(k, _)| *k == key) {
                    new_var_index[first_result] = *addr;
                    if code.result_count() == 2 {
                        new_var_index[first_result + 1] = *addr + 1;
                    }
                    continue;
                }
                if bucket.len() >= opt.collision_limit {
                    // spec.md §7: not fatal, just stop deduplicating this
                    // particular hash chain; recorded for
                    // Function::exceed_collision_limit.
                    exceed_collision_limit = true;
                    let new_first = tape.put_op(code, &new_args);
                    new_var_index[first_result] = new_first;
                    if code.result_count() == 2 {
                        new_var_index[first_result + 1] = new_first + 1;
                    }
                    continue;
                }
                let new_first = tape.put_op(code, &new_args);
                bucket.push((key, new_first));
                new_var_index[first_result] = new_first;
                if code.result_count() == 2 {
                    new_var_index[first_result + 1] = new_first + 1;
                }
            } else {
                let new_first = tape.put_op(code, &new_args);
                for r in 0..code.result_count() {
                    new_var_index[first_result + r] = new_first + r;
                }
            }
        }
        //
        if !opt.no_cumulative_sum_op {
            // a dependent's own variable must survive as a distinct
            // CSum/op result even when some later op is its only other
            // reader, so it cannot be inlined away as an interior leaf
            // of someone else's fused chain (spec.md §4.7 item 2 fuses
            // dead interior links, never a function output).
            let protected: BTreeSet<usize> = self
                .range_is_var
                .iter()
                .zip(self.range_index.iter())
                .filter(|(&is_var, _)| is_var)
                .map(|(_, &idx)| new_var_index[idx as usize] as usize)
                .collect();
            let fuse_map = fuse_cumulative_sums(&mut tape, &protected);
            for v in new_var_index.iter_mut() {
                *v = fuse_map[*v as usize];
            }
        }
        if !opt.no_conditional_skip {
            insert_conditional_skips(&mut tape);
        }
        //
        tape.put_op(OpCode::End, &[]);
        tape.op.arg_start.push(tape.op.arg_all.len() as Addr);
        //
        let mut range_is_var = Vec::with_capacity(self.range_index.len());
        let mut range_index = Vec::with_capacity(self.range_index.len());
        for (i, &is_var) in self.range_is_var.iter().enumerate() {
            if is_var {
                range_is_var.push(true);
                range_index.push(new_var_index[self.range_index[i] as usize]);
            } else {
                range_is_var.push(false);
                range_index.push(tape.put_par(*self.par.get(self.range_index[i])));
            }
        }
        //
        let op = std::mem::take(&mut tape.op);
        let par = std::mem::take(&mut tape.par);
        let txt = self.txt.clone();
        let vec_ad = self.vec_ad.clone();
        Ok(Function {
            op,
            par,
            txt,
            vec_ad,
            range_is_var,
            range_index,
            atomics: self.atomics.clone(),
            taylor: std::cell::RefCell::new(Vec::new()),
            taylor_dir: std::cell::RefCell::new(Vec::new()),
            compare_change_count: std::cell::Cell::new(0),
            check_for_nan: std::cell::Cell::new(true),
            exceed_collision_limit,
        })
    }
}
//
#[derive(Clone, PartialEq, Eq, Hash)]
struct OpKey {
    code: OpCode,
    args: Vec<Addr>,
}
impl OpKey {
    fn hash_value(&self) -> u64 {
        use std::hash::{Hash, Hasher};
        let mut hasher = rustc_hash::FxHasher::default();
        self.hash(&mut hasher);
        hasher.finish()
    }
}
//
/// remap an op's argument list from the original tape's variable/
/// parameter/text/vec-ad indices to the new tape's, pushing a fresh
/// parameter pool entry for every parameter operand encountered (the
/// text and VecAD pools are reused wholesale, see [Function::optimize]
/// doc comment's "single forward pass" grounding note: both are static
/// per-recording configuration rather than variables, so an offset into
/// either stays valid even after dead-code elimination).
fn remap_args<V: Base>(
    f: &Function<V>,
    code: OpCode,
    args: &[Addr],
    new_var_index: &[Addr],
    tape: &mut Tape<V>,
) -> Vec<Addr> {
    use OpCode::*;
    let remap_par = |tape: &mut Tape<V>, p: Addr| tape.put_par(*f.par.get(p));
    match code {
        CSum => {
            let n_add = args[0] as usize;
            let n_sub = args[1] as usize;
            let mut out = vec![args[0], args[1]];
            for &a in &args[2..2 + n_add + n_sub] {
                out.push(new_var_index[a as usize]);
            }
            out
        }
        CExp => {
            let mask = args[1];
            let mut out = vec![args[0], mask, 0, 0, 0, 0, args[6]];
            for j in 0..4 {
                out[2 + j] = if mask & (1 << j) != 0 {
                    new_var_index[args[2 + j] as usize]
                } else {
                    remap_par(tape, args[2 + j])
                };
            }
            out
        }
        Abs | Neg | Sign | Sqrt | Exp | Expm1 | Log | Log1p | Asinh | Acosh | Atanh | Tan | Sin
        | Cos | Asin | Acos | Atan | Sinh | Cosh | Tanh | Erf => {
            vec![new_var_index[args[0] as usize]]
        }
        AddPp | AddPv | AddVp | AddVv | SubPp | SubPv | SubVp | SubVv | MulPp | MulPv | MulVp
        | MulVv | DivPp | DivPv | DivVp | DivVv | PowPp | PowPv | PowVp | PowVv | AzMulPp
        | AzMulPv | AzMulVp | AzMulVv => {
            let lhs_is_var = matches!(
                code,
                AddVp | AddVv | SubVp | SubVv | MulVp | MulVv | DivVp | DivVv | PowVp | PowVv | AzMulVp | AzMulVv
            );
            let rhs_is_var = matches!(
                code,
                AddPv | AddVv | SubPv | SubVv | MulPv | MulVv | DivPv | DivVv | PowPv | PowVv | AzMulPv | AzMulVv
            );
            let lhs = if lhs_is_var { new_var_index[args[0] as usize] } else { remap_par(tape, args[0]) };
            let rhs = if rhs_is_var { new_var_index[args[1] as usize] } else { remap_par(tape, args[1]) };
            vec![lhs, rhs]
        }
        LtPp | LtPv | LtVp | LtVv | LePp | LePv | LeVp | LeVv | EqPp | EqPv | EqVp | EqVv | NePp
        | NePv | NeVp | NeVv | GePp | GePv | GeVp | GeVv | GtPp | GtPv | GtVp | GtVv => {
            let lhs_is_var = matches!(
                code,
                LtVp | LtVv | LeVp | LeVv | EqVp | EqVv | NeVp | NeVv | GeVp | GeVv | GtVp | GtVv
            );
            let rhs_is_var = matches!(
                code,
                LtPv | LtVv | LePv | LeVv | EqPv | EqVv | NePv | NeVv | GePv | GeVv | GtPv | GtVv
            );
            let lhs = if lhs_is_var { new_var_index[args[0] as usize] } else { remap_par(tape, args[0]) };
            let rhs = if rhs_is_var { new_var_index[args[1] as usize] } else { remap_par(tape, args[1]) };
            vec![lhs, rhs, args[2]]
        }
        LdP => vec![args[0], remap_par(tape, args[1])],
        LdV => vec![args[0], new_var_index[args[1] as usize]],
        StPp | StPv | StVp | StVv => {
            let index_is_var = matches!(code, StVp | StVv);
            let value_is_var = matches!(code, StPv | StVv);
            let index = if index_is_var { new_var_index[args[1] as usize] } else { remap_par(tape, args[1]) };
            let value = if value_is_var { new_var_index[args[2] as usize] } else { remap_par(tape, args[2]) };
            vec![args[0], index, value]
        }
        PriP | PriV => {
            let value_is_var = code == PriV;
            let value = if value_is_var { new_var_index[args[1] as usize] } else { remap_par(tape, args[1]) };
            vec![args[0], value]
        }
        DisP | DisV => {
            let value_is_var = code == DisV;
            let value = if value_is_var { new_var_index[args[1] as usize] } else { remap_par(tape, args[1]) };
            vec![args[0], value]
        }
        AFunBegin => args.to_vec(),
        AFunEnd => Vec::new(),
        AFunArgP => vec![remap_par(tape, args[0])],
        AFunArgV => vec![new_var_index[args[0] as usize]],
        AFunResP => vec![remap_par(tape, args[0])],
        AFunResV => Vec::new(),
        Par => vec![remap_par(tape, args[0])],
        Begin | End | Inv | CSkip => Vec::new(),
    }
}
//
/// Fuse every maximal add/sub/neg subtree whose interior results are
/// each used exactly once, into a single [OpCode::CSum] (`spec.md`
/// §4.7 item 2/5; CppAD's `cumulative_sum_op` motivation: one
/// variable-length op instead of a chain, so the sweeps allocate one
/// Taylor-coefficient slot per fused group instead of one per link).
///
/// Unlike a left-leaning spine, an operand can be *either* side of an
/// `AddVv`/`SubVv` op, so the interior of a fused group is a tree, not
/// a line: `((a+b)-c)+(a-d)` absorbs both `(a+b)-c` and `a-d` into the
/// final `Add`'s two operands. Gathering walks down from each
/// not-absorbed ("root") op, inlining an operand in place of its own
/// leaf variable whenever that operand's defining op is itself a
/// single-use link, carrying a sign flipped by every `Sub`'s right
/// operand and every `Neg`. `protected` (the sealed function's
/// dependent variables, in this tape's numbering) blocks inlining even
/// when the op-level use count is 1: a dependent's result has to
/// survive as its own variable so `range_index` still names something
/// real after fusion (`Function::optimize`'s caller builds this set).
///
/// Collapsing `n` links into one op removes `n - 1` tape-variable
/// slots, so every surviving op's variable operands (and the sealed
/// function's `range_index`, handled by the caller) have to be
/// renumbered through the same kind of old-to-new map
/// [Function::optimize]'s main rebuild pass uses — this is a second,
/// smaller instance of that pass, not just a splice.
/// `OpSequence::args` requires a trailing sentinel in `arg_start`, which
/// an in-progress (not yet sealed) tape does not have yet; this reads
/// the same slice either way.
fn op_args(op: &crate::tape::OpSequence, i: usize) -> &[Addr] {
    let start = op.arg_start[i] as usize;
    let end = op
        .arg_start
        .get(i + 1)
        .copied()
        .unwrap_or(op.arg_all.len() as Addr) as usize;
    &op.arg_all[start..end]
}
//
/// `true` for the op-codes `spec.md` §4.7 item 2 fuses: "add/sub/neg
/// ops". `AddVv`/`SubVv` only — the `Pv`/`Vp` variants have a parameter
/// operand and gain nothing from fusion, so they are left as ordinary
/// ops.
fn is_cumulative_link(code: OpCode) -> bool {
    matches!(code, OpCode::AddVv | OpCode::SubVv | OpCode::Neg)
}
//
/// walk the add/sub/neg subtree rooted at `old_op[root]`, appending
/// every non-inlinable leaf's remapped variable index to `add_list` or
/// `sub_list` according to the sign it carries relative to the root
/// (positive unless flipped by an odd number of `Sub`-right-operand or
/// `Neg` steps on the path from the root). `absorbed(v)` decides
/// whether the op defining variable `v` is inlined (returns its op
/// index) or is a leaf.
fn gather_cumulative_leaves(
    old_op: &crate::tape::OpSequence,
    root: usize,
    absorbed: &impl Fn(usize) -> Option<usize>,
    new_var_index: &[Addr],
    add_list: &mut Vec<Addr>,
    sub_list: &mut Vec<Addr>,
) {
    let mut stack = vec![(root, true)];
    while let Some((op_index, positive)) = stack.pop() {
        let args = op_args(old_op, op_index);
        let (a0, a1) = (args[0] as usize, *args.get(1).unwrap_or(&0) as usize);
        let code = old_op.op_vec[op_index];
        let mut push_operand = |v: usize, positive: bool| {
            if let Some(op_index) = absorbed(v) {
                stack.push((op_index, positive));
            } else if positive {
                add_list.push(new_var_index[v]);
            } else {
                sub_list.push(new_var_index[v]);
            }
        };
        match code {
            OpCode::AddVv => {
                push_operand(a0, positive);
                push_operand(a1, positive);
            }
            OpCode::SubVv => {
                push_operand(a0, positive);
                push_operand(a1, !positive);
            }
            OpCode::Neg => {
                push_operand(a0, !positive);
            }
            _ => unreachable!("only reached for is_cumulative_link ops"),
        }
    }
}
//
fn fuse_cumulative_sums<V: Base>(
    tape: &mut Tape<V>,
    protected: &BTreeSet<usize>,
) -> Vec<Addr> {
    let old_op = tape.op.clone();
    let n_ops = old_op.len();
    if n_ops == 0 {
        return Vec::new();
    }
    let mut op_first_result = vec![0usize; n_ops];
    let mut use_count = vec![0usize; old_op.n_var];
    let mut user_of = vec![None; old_op.n_var];
    {
        let mut next_var = 2 + old_op.n_ind;
        for (i, code) in old_op.op_vec.iter().enumerate() {
            op_first_result[i] = next_var;
            next_var += code.result_count();
        }
    }
    for i in 0..n_ops {
        for v in read_operands(old_op.op_vec[i], op_args(&old_op, i)) {
            use_count[v] += 1;
            user_of[v] = Some(i);
        }
    }
    // which op (if any) produced a given link-eligible variable.
    let mut producer_of = vec![None; old_op.n_var];
    for i in 0..n_ops {
        if is_cumulative_link(old_op.op_vec[i]) {
            producer_of[op_first_result[i]] = Some(i);
        }
    }
    // an op is consumed (inlined into its sole user) rather than
    // emitted on its own when: it is a link, its result has exactly one
    // use anywhere on the tape, that use is not a protected dependent,
    // and the user is itself a link op (so the gather below actually
    // reaches it). `user_of[v]` is only meaningful when `use_count[v] ==
    // 1`, since it just records the last op seen referencing `v`.
    let mut consumed = vec![false; n_ops];
    for i in 0..n_ops {
        if !is_cumulative_link(old_op.op_vec[i]) {
            continue;
        }
        let v = op_first_result[i];
        if use_count[v] != 1 || protected.contains(&v) {
            continue;
        }
        if let Some(u) = user_of[v] {
            if is_cumulative_link(old_op.op_vec[u]) {
                consumed[i] = true;
            }
        }
    }
    let absorbed = |v: usize| -> Option<usize> {
        producer_of[v].filter(|&j| consumed[j])
    };
    //
    let mut new_tape_op = crate::tape::OpSequence::default();
    new_tape_op.n_var = 1;
    new_tape_op.n_ind = old_op.n_ind;
    let mut new_var_index = vec![0 as Addr; old_op.n_var];
    let mut put = |new_tape_op: &mut crate::tape::OpSequence, code: OpCode, args: &[Addr]| -> Addr {
        grow_push(&mut new_tape_op.arg_start, new_tape_op.arg_all.len() as Addr);
        for a in args {
            grow_push(&mut new_tape_op.arg_all, *a);
        }
        grow_push(&mut new_tape_op.op_vec, code);
        let first = new_tape_op.n_var as Addr;
        new_tape_op.n_var += code.result_count();
        first
    };
    use crate::tape::grow_push;
    for i in 0..n_ops {
        if consumed[i] {
            // emitted as part of its sole user's CSum below.
            continue;
        }
        let code = old_op.op_vec[i];
        let absorbs_a_child = is_cumulative_link(code)
            && op_args(&old_op, i).iter().any(|&v| absorbed(v as usize).is_some());
        if absorbs_a_child {
            let mut add_list = Vec::new();
            let mut sub_list = Vec::new();
            gather_cumulative_leaves(
                &old_op,
                i,
                &absorbed,
                &new_var_index,
                &mut add_list,
                &mut sub_list,
            );
            let mut csum_args = vec![add_list.len() as Addr, sub_list.len() as Addr];
            csum_args.extend(add_list);
            csum_args.extend(sub_list);
            let first = put(&mut new_tape_op, OpCode::CSum, &csum_args);
            new_var_index[op_first_result[i]] = first;
        } else {
            let remapped = remap_vars_only(code, op_args(&old_op, i), &new_var_index);
            let first = put(&mut new_tape_op, code, &remapped);
            for r in 0..code.result_count() {
                new_var_index[op_first_result[i] + r] = first + r;
            }
        }
    }
    tape.op = new_tape_op;
    new_var_index
}
//
/// remap only the variable-valued argument slots of op `code` through
/// `new_var_index`, leaving parameter/text/vec-ad indices untouched
/// (used by [fuse_cumulative_sums], which never changes the parameter,
/// text, or VecAD pools, only the set of surviving tape variables).
fn remap_vars_only(code: OpCode, args: &[Addr], new_var_index: &[Addr]) -> Vec<Addr> {
    use OpCode::*;
    let mut out = args.to_vec();
    match code {
        Begin | End | Inv | Par | LdP | StPp | PriP | DisP | AFunBegin | AFunEnd | AFunArgP
        | AFunResP | AFunResV => {}
        CExp => {
            let mask = args[1];
            for (j, slot) in out.iter_mut().enumerate().take(6).skip(2) {
                if mask & (1 << (j - 2)) != 0 {
                    *slot = new_var_index[args[j] as usize];
                }
            }
        }
        Abs | Neg | Sign | Sqrt | Exp | Expm1 | Log | Log1p | Asinh | Acosh | Atanh | Tan | Sin
        | Cos | Asin | Acos | Atan | Sinh | Cosh | Tanh | Erf => {
            out[0] = new_var_index[args[0] as usize];
        }
        AddPp | AddPv | AddVp | AddVv | SubPp | SubPv | SubVp | SubVv | MulPp | MulPv | MulVp
        | MulVv | DivPp | DivPv | DivVp | DivVv | PowPp | PowPv | PowVp | PowVv | AzMulPp
        | AzMulPv | AzMulVp | AzMulVv => {
            let lhs_is_var = matches!(
                code,
                AddVp | AddVv | SubVp | SubVv | MulVp | MulVv | DivVp | DivVv | PowVp | PowVv | AzMulVp | AzMulVv
            );
            let rhs_is_var = matches!(
                code,
                AddPv | AddVv | SubPv | SubVv | MulPv | MulVv | DivPv | DivVv | PowPv | PowVv | AzMulPv | AzMulVv
            );
            if lhs_is_var {
                out[0] = new_var_index[args[0] as usize];
            }
            if rhs_is_var {
                out[1] = new_var_index[args[1] as usize];
            }
        }
        LtPp | LtPv | LtVp | LtVv | LePp | LePv | LeVp | LeVv | EqPp | EqPv | EqVp | EqVv | NePp
        | NePv | NeVp | NeVv | GePp | GePv | GeVp | GeVv | GtPp | GtPv | GtVp | GtVv => {
            let lhs_is_var = matches!(
                code,
                LtVp | LtVv | LeVp | LeVv | EqVp | EqVv | NeVp | NeVv | GeVp | GeVv | GtVp | GtVv
            );
            let rhs_is_var = matches!(
                code,
                LtPv | LtVv | LePv | LeVv | EqPv | EqVv | NePv | NeVv | GePv | GeVv | GtPv | GtVv
            );
            if lhs_is_var {
                out[0] = new_var_index[args[0] as usize];
            }
            if rhs_is_var {
                out[1] = new_var_index[args[1] as usize];
            }
        }
        LdV => out[1] = new_var_index[args[1] as usize],
        StPv => out[2] = new_var_index[args[2] as usize],
        StVp => out[1] = new_var_index[args[1] as usize],
        StVv => {
            out[1] = new_var_index[args[1] as usize];
            out[2] = new_var_index[args[2] as usize];
        }
        PriV => out[1] = new_var_index[args[1] as usize],
        DisV => out[1] = new_var_index[args[1] as usize],
        AFunArgV => out[0] = new_var_index[args[0] as usize],
        CSum | CSkip => unreachable!("not produced before this pass"),
    }
    out
}
//
/// Insert [OpCode::CSkip] ops for `CExp`s whose comparison operands are
/// both parameters, so the value of the comparison (and hence which
/// branch is live) is already known at optimize time (`spec.md` §4.9,
/// §4.7 item 6). Conservative: only skips a branch operand that is
/// itself the sole result of one op used nowhere else, the common case
/// CppAD's own conditional-skip pass targets; a branch computed by a
/// longer chain of ops is left alone rather than risk skipping an op
/// another live expression still depends on.
fn insert_conditional_skips<V: Base>(tape: &mut Tape<V>) {
    let op = &tape.op;
    let n_ops = op.len();
    let mut op_first_result = vec![0usize; n_ops];
    let mut owner_op = vec![usize::MAX; op.n_var];
    {
        let mut next_var = 2 + op.n_ind;
        for (i, code) in op.op_vec.iter().enumerate() {
            op_first_result[i] = next_var;
            for r in 0..code.result_count() {
                owner_op[next_var + r] = i;
            }
            next_var += code.result_count();
        }
    }
    let mut use_count = vec![0usize; op.n_var];
    for i in 0..n_ops {
        for v in read_operands(op.op_vec[i], op_args(op, i)) {
            use_count[v] += 1;
        }
    }
    let mut skips: Vec<(u32, Addr, Addr, bool, usize)> = Vec::new();
    for op_index in 0..n_ops {
        if op.op_vec[op_index] != OpCode::CExp {
            continue;
        }
        let args = op_args(op, op_index).to_vec();
        let mask = args[1];
        if mask & 1 != 0 || mask & 2 != 0 {
            continue; // left or right operand is itself a variable
        }
        let cmp = crate::op_code::CompareOp::from_code(args[0]);
        let left = *tape.par.get(args[2]);
        let right = *tape.par.get(args[3]);
        let condition = cmp.eval(left, right);
        let skip_bit = if condition { 3 } else { 2 };
        if mask & (1 << skip_bit) == 0 {
            continue; // skipped branch is already a parameter, nothing to skip
        }
        let skip_var = args[2 + skip_bit] as usize;
        let producing_op = owner_op[skip_var];
        if producing_op == usize::MAX || use_count[skip_var] != 1 {
            continue;
        }
        let producing_code = op.op_vec[producing_op];
        if matches!(
            producing_code,
            OpCode::StPp
                | OpCode::StPv
                | OpCode::StVp
                | OpCode::StVv
                | OpCode::PriP
                | OpCode::PriV
                | OpCode::AFunBegin
                | OpCode::AFunEnd
        ) {
            continue; // never skip a side-effecting op
        }
        skips.push((args[0], args[2], args[3], condition, producing_op));
    }
    for (cmp_code, left, right, condition, producing_op) in skips {
        let (n_true, n_false) = if condition { (1u32, 0u32) } else { (0u32, 1u32) };
        tape.put_op(
            OpCode::CSkip,
            &[cmp_code, left, right, n_true, n_false, producing_op as Addr],
        );
    }
}
