// SPDX-License-Identifier: EPL-2.0 OR GPL-2.0-or-later
// SPDX-FileCopyrightText: Bradley M. Bell <bradbell@seanet.com>
// SPDX-FileContributor: 2025 Bradley M. Bell
// ---------------------------------------------------------------------------
//
//! This pub(crate) module defines `OpCode`, the tagged operator
//! enumeration from `spec.md` §3, and its compile-time arity.
//!
//! Link to [parent module](super)
//!
//! Grounded on `src/op/info.rs`'s per-op dispatch table shape, re-expressed
//! as a plain `enum` + `match` (`spec.md` §9: "a switch is both faster
//! and keeps the code close to the data" — no virtual dispatch per op).
// ---------------------------------------------------------------------------
//
// OpCode
/// One elementary operation recorded on a tape.
///
/// Binary arithmetic and comparison ops come in four operand-kind
/// variants (`Pp`, `Pv`, `Vp`, `Vv`) naming whether the left/right
/// operand is a parameter or a variable index; `Pp` variants are part of
/// the tag space for structural completeness (`spec.md` §3) but are
/// never emitted by [AD](crate::AD) arithmetic, which folds
/// parameter-parameter operations at record time without creating an op
/// (`spec.md` §4.1).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[allow(clippy::upper_case_acronyms)]
pub enum OpCode {
    // -- bookkeeping --------------------------------------------------
    /// first op in every recording; result-count 1, arg-count 0
    Begin,
    /// last op in every recording; result-count 0, arg-count 0
    End,
    /// independent variable; result-count 1, arg-count 0
    Inv,
    /// parameter-as-variable: arg = `[par_index]`; result-count 1
    Par,
    /// conditional skip; see [crate::op_code::CSKIP_DOC]
    CSkip,
    /// cumulative sum; see [crate::op_code::CSUM_DOC]
    CSum,
    /// conditional expression; arg = `[cmp, mask, y0, y1, y2, y3, recorded]`,
    /// `recorded` being `cmp(y0, y1)` at record time (`spec.md` §4.4
    /// `compare_change_count`)
    CExp,
    /// print op; arg = `[text_offset, value]`, variant decides value kind
    PriP,
    PriV,
    /// discrete function call; arg = `[name_text_offset, operand]`
    DisP,
    DisV,
    // -- atomic function call markers ---------------------------------
    /// begin an atomic call; arg = `[name_text_offset, n_arg, n_res]`
    AFunBegin,
    /// end an atomic call; arg = `[]`
    AFunEnd,
    /// one atomic call argument that is a parameter; arg = `[par_index]`
    AFunArgP,
    /// one atomic call argument that is a variable; arg = `[var_index]`
    AFunArgV,
    /// one atomic call result that folds to a parameter (no dependence
    /// on any variable argument); arg = `[par_index]`; result-count 1
    AFunResP,
    /// one atomic call result that is a variable; arg = `[]`; result-count 1
    AFunResV,
    // -- unary, single result ------------------------------------------
    Abs,
    Neg,
    Sign,
    Sqrt,
    Exp,
    Expm1,
    Log,
    Log1p,
    Asinh,
    Acosh,
    Atanh,
    /// tangent; single result, unlike CppAD's paired `TanOp` (`spec.md`
    /// §3 Invariants lists `Tan` apart from the pair-result group).
    Tan,
    // -- unary, pair result (primary + companion; spec.md §3 Invariants) -
    Sin,
    Cos,
    Asin,
    Acos,
    Atan,
    Sinh,
    Cosh,
    Tanh,
    Erf,
    // -- binary arithmetic, 4 operand-kind variants each ----------------
    AddPp, AddPv, AddVp, AddVv,
    SubPp, SubPv, SubVp, SubVv,
    MulPp, MulPv, MulVp, MulVv,
    DivPp, DivPv, DivVp, DivVv,
    PowPp, PowPv, PowVp, PowVv,
    /// absolute-zero multiply (`spec.md` §6 `azmul`, §9 Open Question):
    /// same operand-kind layout as `Mul`, but its forward/reverse rule
    /// forces every Taylor order of the result to zero whenever the
    /// order-0 value of either operand is identical zero, rather than
    /// following `Mul`'s ordinary Leibniz recursion.
    AzMulPp, AzMulPv, AzMulVp, AzMulVv,
    // -- comparisons, 4 operand-kind variants each; result-count 0 ------
    LtPp, LtPv, LtVp, LtVv,
    LePp, LePv, LeVp, LeVv,
    EqPp, EqPv, EqVp, EqVv,
    NePp, NePv, NeVp, NeVv,
    GePp, GePv, GeVp, GeVv,
    GtPp, GtPv, GtVp, GtVv,
    // -- VecAD load/store ------------------------------------------------
    /// load, index is a parameter; arg = `[vec_offset, index_par]`
    LdP,
    /// load, index is a variable; arg = `[vec_offset, index_var]`
    LdV,
    /// store, index parameter, value parameter;
    /// arg = `[vec_offset, index_par, value_par]`; result-count 0
    StPp,
    /// store, index parameter, value variable
    StPv,
    /// store, index variable, value parameter
    StVp,
    /// store, index variable, value variable
    StVv,
}
//
/// Documents the [OpCode::CSkip] argument layout.
///
/// `arg = [cmp, left_par, right_par, n_true, n_false, true_0.., false_0..]`
/// `true_i`/`false_i` are op-stream indices skipped when the comparison
/// `cmp(parameter[left_par], parameter[right_par])` is (is not) satisfied.
/// This concretizes `spec.md` §4.9's "two argument counts and two index
/// lists" by letting the CSkip self-evaluate the (parameter-only, by
/// construction) comparison that drives it.
pub const CSKIP_DOC: () = ();
//
/// Documents the [OpCode::CSum] argument layout.
///
/// `arg = [n_add, n_sub, add_var_0.., sub_var_0..]`: operand lists are
/// variable indices only (`spec.md` §3 Invariants: "followed by the
/// operand variable indices"). A constant leaf in an add/sub chain is
/// promoted to a variable with [OpCode::Par] before fusion so the
/// cumulative-sum operand lists stay uniformly variable indices.
pub const CSUM_DOC: () = ();
//
impl OpCode {
    /// number of entries this op-code consumes from the argument stream,
    /// for the fixed-arity op-codes (`None` for `CSkip`/`CSum`, whose
    /// arity is read from their own first argument slots at replay time).
    pub fn arg_count(self) -> Option<usize> {
        use OpCode::*;
        Some(match self {
            Begin | End => 0,
            Inv => 0,
            Par => 1,
            CSkip | CSum => return None,
            // 7th slot holds the recorded boolean result of `cmp(left,
            // right)` (0 or 1), the same flip-detection slot the plain
            // comparison ops carry (`spec.md` §4.4 `compare_change_count`).
            CExp => 7,
            PriP | PriV => 2,
            DisP | DisV => 2,
            AFunBegin => 3,
            AFunEnd => 0,
            AFunArgP | AFunArgV => 1,
            AFunResP => 1,
            AFunResV => 0,
            Abs | Neg | Sign | Sqrt | Exp | Expm1 | Log | Log1p | Asinh
            | Acosh | Atanh | Tan => 1,
            Sin | Cos | Asin | Acos | Atan | Sinh | Cosh | Tanh | Erf => 1,
            AddPp | AddPv | AddVp | AddVv | SubPp | SubPv | SubVp | SubVv
            | MulPp | MulPv | MulVp | MulVv | DivPp | DivPv | DivVp
            | DivVv | PowPp | PowPv | PowVp | PowVv
            | AzMulPp | AzMulPv | AzMulVp | AzMulVv => 2,
            // 3rd slot holds the recorded boolean result (0 or 1), used
            // to detect a flip at replay time (`spec.md` §4.4
            // `compare_change_count`).
            LtPp | LtPv | LtVp | LtVv | LePp | LePv | LeVp | LeVv | EqPp
            | EqPv | EqVp | EqVv | NePp | NePv | NeVp | NeVv | GePp
            | GePv | GeVp | GeVv | GtPp | GtPv | GtVp | GtVv => 3,
            LdP | LdV => 2,
            StPp | StPv | StVp | StVv => 3,
        })
    }
    //
    /// number of new tape-variable indices this op-code produces.
    pub fn result_count(self) -> usize {
        use OpCode::*;
        match self {
            Begin => 1,
            End => 0,
            Inv => 1,
            Par => 1,
            CSkip => 0,
            CSum => 1,
            CExp => 1,
            PriP | PriV => 0,
            DisP | DisV => 1,
            AFunBegin | AFunEnd | AFunArgP | AFunArgV => 0,
            AFunResP | AFunResV => 1,
            Abs | Neg | Sign | Sqrt | Exp | Expm1 | Log | Log1p | Asinh
            | Acosh | Atanh | Tan => 1,
            Sin | Cos | Asin | Acos | Atan | Sinh | Cosh | Tanh | Erf => 2,
            AddPp | AddPv | AddVp | AddVv | SubPp | SubPv | SubVp | SubVv
            | MulPp | MulPv | MulVp | MulVv | DivPp | DivPv | DivVp
            | DivVv | PowPp | PowPv | PowVp | PowVv
            | AzMulPp | AzMulPv | AzMulVp | AzMulVv => 1,
            LtPp | LtPv | LtVp | LtVv | LePp | LePv | LeVp | LeVv | EqPp
            | EqPv | EqVp | EqVv | NePp | NePv | NeVp | NeVv | GePp
            | GePv | GeVp | GeVv | GtPp | GtPv | GtVp | GtVv => 0,
            LdP | LdV => 1,
            StPp | StPv | StVp | StVv => 0,
        }
    }
    //
    /// true if this op-code is a comparison (`spec.md` §3: "six
    /// comparison ops"), used by `no_compare_op` in the optimizer and by
    /// `compare_change_count` bookkeeping.
    pub fn is_compare(self) -> bool {
        use OpCode::*;
        matches!(
            self,
            LtPp | LtPv | LtVp | LtVv
                | LePp | LePv | LeVp | LeVv
                | EqPp | EqPv | EqVp | EqVv
                | NePp | NePv | NeVp | NeVv
                | GePp | GePv | GeVp | GeVv
                | GtPp | GtPv | GtVp | GtVv
        )
    }
    //
    /// true if this op-code is a print op (`no_print_for_op`).
    pub fn is_print(self) -> bool {
        matches!(self, OpCode::PriP | OpCode::PriV)
    }
}
//
// CompareOp
/// The six comparators usable in a standalone comparison or a [OpCode::CExp].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Lt,
    Le,
    Eq,
    Ne,
    Ge,
    Gt,
}
impl CompareOp {
    /// evaluate the comparator on two `Base` values.
    pub fn eval<V: PartialEq + PartialOrd>(self, lhs: V, rhs: V) -> bool {
        match self {
            CompareOp::Lt => lhs < rhs,
            CompareOp::Le => lhs <= rhs,
            CompareOp::Eq => lhs == rhs,
            CompareOp::Ne => lhs != rhs,
            CompareOp::Ge => lhs >= rhs,
            CompareOp::Gt => lhs > rhs,
        }
    }
    /// encode as the small integer stored in the argument stream.
    pub fn to_code(self) -> u32 {
        match self {
            CompareOp::Lt => 0,
            CompareOp::Le => 1,
            CompareOp::Eq => 2,
            CompareOp::Ne => 3,
            CompareOp::Ge => 4,
            CompareOp::Gt => 5,
        }
    }
    /// decode from the integer stored in the argument stream.
    pub fn from_code(code: u32) -> Self {
        match code {
            0 => CompareOp::Lt,
            1 => CompareOp::Le,
            2 => CompareOp::Eq,
            3 => CompareOp::Ne,
            4 => CompareOp::Ge,
            _ => CompareOp::Gt,
        }
    }
}
