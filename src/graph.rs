// SPDX-License-Identifier: EPL-2.0 OR GPL-2.0-or-later
// SPDX-FileCopyrightText: Bradley M. Bell <bradbell@seanet.com>
// SPDX-FileContributor: 2025 Bradley M. Bell
// ---------------------------------------------------------------------------
//
//! This pub module defines [CppAdGraph], a portable node-graph snapshot of
//! a sealed [crate::Function] (`spec.md` §6 "Persistable tape format").
//!
//! Link to [parent module](super)
//!
//! Grounded on `original_source/include/cppad/core/graph/cpp_graph.hpp`'s
//! `cpp_graph` class, since no teacher generation implements a persistable
//! format of its own: `function_name_`, `discrete_name_vec_`,
//! `atomic_name_vec_`, `print_text_vec_`, `n_dynamic_ind_`,
//! `n_variable_ind_`, `constant_vec_`, `operator_vec_`/`operator_arg_`, and
//! `dependent_vec_` carry over field-for-field, and [CppAdGraph::print]
//! follows that file's node-index convention: node 0 is never used, nodes
//! `1..=n_dynamic_ind` are the dynamic parameters, the next
//! `n_variable_ind` are the independent variables, the next
//! `constant_vec.len()` are the constants, and every node after that is an
//! operator result, numbered in `operator_vec` order.
//!
//! This crate has no separate dynamic-parameter stream (`tape.rs`'s own
//! module doc), so `n_dynamic_ind` is always 0 here; every [crate::AD]
//! parameter becomes a constant node instead. [crate::VecAD] has no
//! node-graph counterpart — the same omission CppAD's own graph format
//! makes, since `cpp_graph.hpp` predates and never grew a `VecAD` operator
//! — so [CppAdGraph::from_function] reports
//! [crate::AdError::UnknownOption] for a recording that uses one.
// ---------------------------------------------------------------------------
use crate::base::Base;
use crate::error::{AdError, AdResult};
use crate::function::Function;
use crate::op_code::OpCode;
use crate::tape::Addr;
use std::io::{self, Write};
//
// GraphOpEnum
/// One node-graph operator: like [OpCode], but every operand is a node
/// index drawn from the single numbering [CppAdGraph] describes, rather
/// than a choice among parameter pool, tape-variable, text, or VecAD
/// index spaces (`spec.md` §6).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[allow(clippy::upper_case_acronyms)]
pub enum GraphOpEnum {
    Abs, Neg, Sign, Sqrt, Exp, Expm1, Log, Log1p, Asinh, Acosh, Atanh, Tan,
    Sin, Cos, Asin, Acos, Atan, Sinh, Cosh, Tanh, Erf,
    Add, Sub, Mul, Div, Pow, AzMul,
    Lt, Le, Eq, Ne, Ge, Gt,
    /// cumulative sum; `arg = [n, node_0, ..]`, one node result
    Sum,
    /// conditional expression; `arg = [cmp, node_left, node_right, node_true, node_false]`
    CExp,
    /// discrete function call; `arg = [name_index, node_operand]`
    Discrete,
    /// atomic function call; `arg = [name_index, n_result, n_arg, node_0, ..]`,
    /// producing `n_result` new nodes.
    Atom,
}
impl GraphOpEnum {
    /// true if this operator produces no node of its own (a standalone
    /// comparison, recorded for its compare-change bookkeeping only;
    /// `spec.md` §3: comparisons have `result_count` 0).
    fn is_comparison(self) -> bool {
        matches!(self, Self::Lt | Self::Le | Self::Eq | Self::Ne | Self::Ge | Self::Gt)
    }
    /// number of node-index entries this operator's fixed-arity prefix
    /// consumes from `operator_arg`, or `None` if it is variable-arity
    /// and that count must be read from the stream itself (`Sum`, `Atom`).
    fn fixed_arg_count(self) -> Option<usize> {
        use GraphOpEnum::*;
        Some(match self {
            Abs | Neg | Sign | Sqrt | Exp | Expm1 | Log | Log1p | Asinh | Acosh | Atanh | Tan
            | Sin | Cos | Asin | Acos | Atan | Sinh | Cosh | Tanh | Erf => 1,
            Add | Sub | Mul | Div | Pow | AzMul => 2,
            Lt | Le | Eq | Ne | Ge | Gt => 2,
            CExp => 5,
            Discrete => 2,
            Sum | Atom => return None,
        })
    }
}
//
// CppAdGraph
/// A portable, node-indexed snapshot of a sealed recording (`spec.md` §6).
#[derive(Clone, Debug)]
pub struct CppAdGraph<V> {
    pub function_name: String,
    pub n_dynamic_ind: usize,
    pub n_variable_ind: usize,
    pub constant_vec: Vec<V>,
    pub discrete_name_vec: Vec<String>,
    pub atomic_name_vec: Vec<String>,
    pub print_text_vec: Vec<String>,
    pub operator_vec: Vec<GraphOpEnum>,
    pub operator_arg: Vec<usize>,
    pub dependent_vec: Vec<usize>,
}
//
impl<V: Base> CppAdGraph<V> {
    /// node index of dynamic parameter `i` (`i < n_dynamic_ind`).
    pub fn dynamic_node(&self, i: usize) -> usize {
        1 + i
    }
    /// node index of independent variable `j` (`j < n_variable_ind`).
    pub fn variable_node(&self, j: usize) -> usize {
        1 + self.n_dynamic_ind + j
    }
    /// node index of constant `k` (`k < constant_vec.len()`).
    pub fn constant_node(&self, k: usize) -> usize {
        1 + self.n_dynamic_ind + self.n_variable_ind + k
    }
    //
    /// Build a graph from a sealed recording (`spec.md` §6).
    ///
    /// # Errors
    /// [AdError::UnknownOption] if the recording uses a [crate::VecAD]
    /// load or store: the node-graph format has no operator for an
    /// indexed vector (see the module doc).
    pub fn from_function(f: &Function<V>, function_name: &str) -> AdResult<Self> {
        let mut graph = CppAdGraph {
            function_name: function_name.to_string(),
            n_dynamic_ind: 0,
            n_variable_ind: f.domain_len(),
            constant_vec: f.par.as_slice().to_vec(),
            discrete_name_vec: Vec::new(),
            atomic_name_vec: Vec::new(),
            print_text_vec: Vec::new(),
            operator_vec: Vec::new(),
            operator_arg: Vec::new(),
            dependent_vec: Vec::new(),
        };
        // node assigned to each tape variable that has one (0 for the
        // phantom slot and for ops whose own result_count is 0); filled
        // in as the op stream below is walked in order.
        let mut var_node = vec![0usize; f.op.n_var];
        let const_node = |graph: &CppAdGraph<V>, p: Addr| graph.constant_node(p as usize);
        // node numbering continues past the last constant; tracked
        // explicitly here rather than derived from operator_vec's length,
        // since an atomic call can emit many nodes from one operator_vec
        // entry (spec.md §6: one call is one external collaborator, not
        // one node per output).
        let mut next_node =
            1 + graph.n_dynamic_ind + graph.n_variable_ind + graph.constant_vec.len();
        let mut push_op = |graph: &mut CppAdGraph<V>, op: GraphOpEnum, arg: &[usize], n_result: usize| -> usize {
            graph.operator_vec.push(op);
            graph.operator_arg.extend_from_slice(arg);
            let first = next_node;
            next_node += n_result;
            first
        };
        // an atomic call's arguments/results accumulate between
        // AFunBegin and AFunEnd (spec.md §1 treats the call as one
        // external collaborator, so it is emitted as a single graph
        // operator, not one per marker op).
        let mut atom_name_index = 0usize;
        let mut atom_args: Vec<usize> = Vec::new();
        let mut atom_result_vars: Vec<usize> = Vec::new();
        // tracks each op's first tape-variable index the same way
        // `tape.put_op` does (phantom slot 0, then one slot per
        // `result_count`); must run over every op including `Begin`/`Inv`
        // so later ops' `first_result` lines up with the indices already
        // stored in `args` by the recorder.
        let mut next_var = 1usize;
        let mut n_inv_seen = 0usize;
        for op_index in 0..f.op.len() {
            let code = f.op.op_vec[op_index];
            let args = f.op.args(op_index);
            let first_result = next_var;
            next_var += code.result_count();
            let node = |v: Addr| var_node[v as usize];
            use OpCode::*;
            match code {
                Begin | End | CSkip => {}
                Inv => {
                    var_node[first_result] = graph.variable_node(n_inv_seen);
                    n_inv_seen += 1;
                }
                Par => var_node[first_result] = const_node(&graph, args[0]),
                LdP | LdV | StPp | StPv | StVp | StVv => {
                    return Err(AdError::UnknownOption {
                        token: "VecAD has no node-graph operator".to_string(),
                    });
                }
                PriP | PriV => {
                    graph.print_text_vec.push(f.txt.get(args[0]).to_string());
                }
                DisP | DisV => {
                    let name = f.txt.get(args[0]).to_string();
                    let name_index = graph.intern_discrete(&name);
                    let operand = if code == DisV { node(args[1]) } else { const_node(&graph, args[1]) };
                    var_node[first_result] =
                        push_op(&mut graph, GraphOpEnum::Discrete, &[name_index, operand], 1);
                }
                AFunBegin => {
                    let name = f.txt.get(args[0]).to_string();
                    atom_name_index = graph.intern_atomic(&name);
                    atom_args.clear();
                    atom_result_vars.clear();
                }
                AFunArgP => atom_args.push(const_node(&graph, args[0])),
                AFunArgV => atom_args.push(node(args[0])),
                AFunResP => var_node[first_result] = const_node(&graph, args[0]),
                AFunResV => atom_result_vars.push(first_result),
                AFunEnd => {
                    let mut arg = vec![atom_name_index, atom_result_vars.len(), atom_args.len()];
                    arg.extend(atom_args.iter().copied());
                    let first_node =
                        push_op(&mut graph, GraphOpEnum::Atom, &arg, atom_result_vars.len());
                    for (k, &var) in atom_result_vars.iter().enumerate() {
                        var_node[var] = first_node + k;
                    }
                }
                Abs | Neg | Sign | Sqrt | Exp | Expm1 | Log | Log1p | Asinh | Acosh | Atanh
                | Tan | Sin | Cos | Asin | Acos | Atan | Sinh | Cosh | Tanh | Erf => {
                    // pair-result ops (Sin/Cos/...) only get a node for
                    // their primary value: the graph format has no
                    // concept of a forward-sweep companion slot, since it
                    // is a value snapshot, not a replayable tape.
                    let op = unary_graph_op(code);
                    var_node[first_result] = push_op(&mut graph, op, &[node(args[0])], 1);
                }
                AddPp | AddPv | AddVp | AddVv | SubPp | SubPv | SubVp | SubVv | MulPp | MulPv
                | MulVp | MulVv | DivPp | DivPv | DivVp | DivVv | PowPp | PowPv | PowVp | PowVv
                | AzMulPp | AzMulPv | AzMulVp | AzMulVv => {
                    let lhs_is_var = matches!(
                        code,
                        AddVp | AddVv | SubVp | SubVv | MulVp | MulVv | DivVp | DivVv | PowVp
                            | PowVv | AzMulVp | AzMulVv
                    );
                    let rhs_is_var = matches!(
                        code,
                        AddPv | AddVv | SubPv | SubVv | MulPv | MulVv | DivPv | DivVv | PowPv
                            | PowVv | AzMulPv | AzMulVv
                    );
                    let lhs = if lhs_is_var { node(args[0]) } else { const_node(&graph, args[0]) };
                    let rhs = if rhs_is_var { node(args[1]) } else { const_node(&graph, args[1]) };
                    let op = match code {
                        AddPp | AddPv | AddVp | AddVv => GraphOpEnum::Add,
                        SubPp | SubPv | SubVp | SubVv => GraphOpEnum::Sub,
                        MulPp | MulPv | MulVp | MulVv => GraphOpEnum::Mul,
                        DivPp | DivPv | DivVp | DivVv => GraphOpEnum::Div,
                        PowPp | PowPv | PowVp | PowVv => GraphOpEnum::Pow,
                        _ => GraphOpEnum::AzMul,
                    };
                    var_node[first_result] = push_op(&mut graph, op, &[lhs, rhs], 1);
                }
                LtPp | LtPv | LtVp | LtVv | LePp | LePv | LeVp | LeVv | EqPp | EqPv | EqVp
                | EqVv | NePp | NePv | NeVp | NeVv | GePp | GePv | GeVp | GeVv | GtPp | GtPv
                | GtVp | GtVv => {
                    let lhs_is_var = matches!(
                        code,
                        LtVp | LtVv | LeVp | LeVv | EqVp | EqVv | NeVp | NeVv | GeVp | GeVv
                            | GtVp | GtVv
                    );
                    let rhs_is_var = matches!(
                        code,
                        LtPv | LtVv | LePv | LeVv | EqPv | EqVv | NePv | NeVv | GePv | GeVv
                            | GtPv | GtVv
                    );
                    let lhs = if lhs_is_var { node(args[0]) } else { const_node(&graph, args[0]) };
                    let rhs = if rhs_is_var { node(args[1]) } else { const_node(&graph, args[1]) };
                    let op = match code {
                        LtPp | LtPv | LtVp | LtVv => GraphOpEnum::Lt,
                        LePp | LePv | LeVp | LeVv => GraphOpEnum::Le,
                        EqPp | EqPv | EqVp | EqVv => GraphOpEnum::Eq,
                        NePp | NePv | NeVp | NeVv => GraphOpEnum::Ne,
                        GePp | GePv | GeVp | GeVv => GraphOpEnum::Ge,
                        _ => GraphOpEnum::Gt,
                    };
                    // no node result (result_count 0): recorded purely
                    // for the compare-change bookkeeping the operator
                    // carries, same as on the tape itself.
                    push_op(&mut graph, op, &[lhs, rhs], 0);
                }
                CExp => {
                    let mask = args[1];
                    let cmp = args[0] as usize;
                    let left = if mask & 1 != 0 { node(args[2]) } else { const_node(&graph, args[2]) };
                    let right = if mask & 2 != 0 { node(args[3]) } else { const_node(&graph, args[3]) };
                    let if_true = if mask & 4 != 0 { node(args[4]) } else { const_node(&graph, args[4]) };
                    let if_false = if mask & 8 != 0 { node(args[5]) } else { const_node(&graph, args[5]) };
                    var_node[first_result] = push_op(
                        &mut graph,
                        GraphOpEnum::CExp,
                        &[cmp, left, right, if_true, if_false],
                        1,
                    );
                }
                CSum => {
                    let n_add = args[0] as usize;
                    let n_sub = args[1] as usize;
                    let mut arg = Vec::with_capacity(1 + n_add + n_sub);
                    for &a in &args[2..2 + n_add] {
                        arg.push(node(a));
                    }
                    // a subtracted leaf is lowered to `Neg` composed with
                    // `Sum`: the graph format has no separate
                    // add-list/sub-list Sum variant (spec.md §6 is silent
                    // on cumulative-sum node layout), matching how
                    // CppAD's own graph format represents a subtraction
                    // chain with the operators it does have.
                    for &a in &args[2 + n_add..2 + n_add + n_sub] {
                        let negated = push_op(&mut graph, GraphOpEnum::Neg, &[node(a)], 1);
                        arg.push(negated);
                    }
                    arg.insert(0, arg.len());
                    var_node[first_result] = push_op(&mut graph, GraphOpEnum::Sum, &arg, 1);
                }
            }
        }
        graph.dependent_vec = f
            .range_is_var
            .iter()
            .zip(f.range_index.iter())
            .map(|(&is_var, &idx)| {
                if is_var {
                    var_node[idx as usize]
                } else {
                    const_node(&graph, idx)
                }
            })
            .collect();
        Ok(graph)
    }
    //
    fn intern_discrete(&mut self, name: &str) -> usize {
        if let Some(i) = self.discrete_name_vec.iter().position(|n| n == name) {
            return i;
        }
        self.discrete_name_vec.push(name.to_string());
        self.discrete_name_vec.len() - 1
    }
    //
    fn intern_atomic(&mut self, name: &str) -> usize {
        if let Some(i) = self.atomic_name_vec.iter().position(|n| n == name) {
            return i;
        }
        self.atomic_name_vec.push(name.to_string());
        self.atomic_name_vec.len() - 1
    }
    //
    /// Emit a human-readable dump of this graph (`spec.md` §6 "A `print`
    /// method emits a human-readable dump"), following
    /// `cpp_graph.hpp print`'s node-index convention documented on
    /// [CppAdGraph] itself.
    pub fn print(&self, stream: &mut impl Write) -> io::Result<()> {
        writeln!(stream, "function_name = {}", self.function_name)?;
        writeln!(stream, "n_dynamic_ind = {}", self.n_dynamic_ind)?;
        writeln!(stream, "n_variable_ind = {}", self.n_variable_ind)?;
        for j in 0..self.n_variable_ind {
            writeln!(stream, "node {:>4} : variable_{j}", self.variable_node(j))?;
        }
        for (k, value) in self.constant_vec.iter().enumerate() {
            writeln!(stream, "node {:>4} : {value}", self.constant_node(k))?;
        }
        let mut node = 1 + self.n_dynamic_ind + self.n_variable_ind + self.constant_vec.len();
        let mut arg_pos = 0usize;
        for op in &self.operator_vec {
            let (n_arg, n_result) = match op.fixed_arg_count() {
                Some(n) => (n, if op.is_comparison() { 0 } else { 1 }),
                None => match op {
                    GraphOpEnum::Sum => {
                        let n = self.operator_arg[arg_pos];
                        (1 + n, 1)
                    }
                    GraphOpEnum::Atom => {
                        let n_arg = self.operator_arg[arg_pos + 2];
                        (3 + n_arg, self.operator_arg[arg_pos + 1])
                    }
                    _ => unreachable!("fixed_arg_count covers every other variant"),
                },
            };
            let args = &self.operator_arg[arg_pos..arg_pos + n_arg];
            if n_result == 0 {
                writeln!(stream, "             : {op:?} {args:?}")?;
            } else if n_result == 1 {
                writeln!(stream, "node {node:>4} : {op:?} {args:?}")?;
                node += 1;
            } else {
                writeln!(stream, "node {node:>4}..{:>4} : {op:?} {args:?}", node + n_result - 1)?;
                node += n_result;
            }
            arg_pos += n_arg;
        }
        write!(stream, "dependent_vec = [")?;
        for (i, d) in self.dependent_vec.iter().enumerate() {
            if i > 0 {
                write!(stream, ", ")?;
            }
            write!(stream, "{d}")?;
        }
        writeln!(stream, "]")
    }
}
//
/// map a single-operand, single-result [OpCode] (unary math, both the
/// single- and pair-result groups) to its [GraphOpEnum].
fn unary_graph_op(code: OpCode) -> GraphOpEnum {
    use OpCode::*;
    match code {
        Abs => GraphOpEnum::Abs,
        Neg => GraphOpEnum::Neg,
        Sign => GraphOpEnum::Sign,
        Sqrt => GraphOpEnum::Sqrt,
        Exp => GraphOpEnum::Exp,
        Expm1 => GraphOpEnum::Expm1,
        Log => GraphOpEnum::Log,
        Log1p => GraphOpEnum::Log1p,
        Asinh => GraphOpEnum::Asinh,
        Acosh => GraphOpEnum::Acosh,
        Atanh => GraphOpEnum::Atanh,
        Tan => GraphOpEnum::Tan,
        Sin => GraphOpEnum::Sin,
        Cos => GraphOpEnum::Cos,
        Asin => GraphOpEnum::Asin,
        Acos => GraphOpEnum::Acos,
        Atan => GraphOpEnum::Atan,
        Sinh => GraphOpEnum::Sinh,
        Cosh => GraphOpEnum::Cosh,
        Tanh => GraphOpEnum::Tanh,
        Erf => GraphOpEnum::Erf,
        _ => unreachable!("unary_graph_op: not a unary op-code"),
    }
}
//
#[cfg(test)]
mod tests {
    use super::*;
    use crate::ad::AD;
    use crate::function::{start_recording, stop_recording};
    use crate::vec_ad::VecAD;
    //
    #[test]
    fn scalar_expression_produces_expected_node_counts() {
        let ax = start_recording::<f64>(vec![1.0, 2.0]).unwrap();
        let ay = ax[0].clone() * ax[1].clone() + ax[0].clone().sin();
        let f = stop_recording(vec![ay]).unwrap();
        let graph = CppAdGraph::from_function(&f, "example").unwrap();
        assert_eq!(graph.n_variable_ind, 2);
        assert_eq!(graph.dependent_vec.len(), 1);
        assert!(!graph.operator_vec.is_empty());
        // x0 * x1 is variable_node(0), variable_node(1); the Add's
        // second operand (sin x0) must reference a node beyond both
        // inputs and beyond the Mul's own result node.
        let mul_node = graph.variable_node(1) + 1;
        assert!(graph.dependent_vec[0] > mul_node);
    }
    //
    #[test]
    fn print_includes_every_section() {
        let ax = start_recording::<f64>(vec![3.0]).unwrap();
        let ay = ax[0].clone() * AD::from_value(2.0);
        let f = stop_recording(vec![ay]).unwrap();
        let graph = CppAdGraph::from_function(&f, "times_two").unwrap();
        let mut buf = Vec::new();
        graph.print(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("function_name = times_two"));
        assert!(text.contains("dependent_vec ="));
    }
    //
    #[test]
    fn vec_ad_recording_is_not_representable() {
        let ax = start_recording::<f64>(vec![5.0]).unwrap();
        let mut v = VecAD::<f64>::new(vec![0.0, 0.0]);
        v.store(AD::from_value(0.0), ax[0].clone()).unwrap();
        let loaded = v.load(AD::from_value(0.0)).unwrap();
        let f = stop_recording(vec![loaded]).unwrap();
        let err = CppAdGraph::from_function(&f, "uses_vec_ad").unwrap_err();
        assert!(matches!(err, AdError::UnknownOption { .. }));
    }
}
