//! Expression lowering and compile-time constant evaluation.
//!
//! Binary operands are lowered right-hand side first; the operator then
//! consumes the left temporary and the remembered right temporary, so the
//! emitted text matches the right-to-left traversal the grammar implies.
//! `&&`/`||` build short-circuit control flow around a dedicated result slot;
//! the constant-evaluation path uses native boolean short-circuiting instead.

use super::LoweringContext;
use crate::front::ast::{BinaryOp, Exp, LVal, UnaryOp};
use crate::front::symbol::{Symbol, SymbolTables};
use anyhow::{anyhow, bail, Result};

impl LoweringContext {
    /// Lower an expression. `None` means the expression was a call to a
    /// `void` function and produced no value.
    pub(super) fn lower_exp(&mut self, exp: &Exp) -> Result<Option<usize>> {
        match exp {
            Exp::Number(n) => {
                let k = self.fresh_temp();
                self.inst(format!("%{} = add 0, {}", k, n));
                Ok(Some(k))
            }
            Exp::LVal(lval) => self.lower_lval(lval).map(Some),
            Exp::Unary(op, operand) => match op {
                UnaryOp::Plus => self.lower_exp(operand),
                UnaryOp::Neg => {
                    let x = self.lower_exp_value(operand)?;
                    let k = self.fresh_temp();
                    self.inst(format!("%{} = sub 0, %{}", k, x));
                    Ok(Some(k))
                }
                UnaryOp::Not => {
                    let x = self.lower_exp_value(operand)?;
                    let k = self.fresh_temp();
                    self.inst(format!("%{} = eq %{}, 0", k, x));
                    Ok(Some(k))
                }
            },
            Exp::Binary(BinaryOp::And, lhs, rhs) => {
                self.lower_short_circuit(true, lhs, rhs).map(Some)
            }
            Exp::Binary(BinaryOp::Or, lhs, rhs) => {
                self.lower_short_circuit(false, lhs, rhs).map(Some)
            }
            Exp::Binary(op, lhs, rhs) => {
                let r = self.lower_exp_value(rhs)?;
                let l = self.lower_exp_value(lhs)?;
                let k = self.fresh_temp();
                self.inst(format!("%{} = {} %{}, %{}", k, binary_ir_op(*op), l, r));
                Ok(Some(k))
            }
            Exp::Call(callee, args) => self.lower_call(callee, args),
        }
    }

    /// Lower an expression that must produce a value.
    pub(super) fn lower_exp_value(&mut self, exp: &Exp) -> Result<usize> {
        self.lower_exp(exp)?
            .ok_or_else(|| anyhow!("void function call used as a value"))
    }

    /// Short-circuit `&&` / `||` via a result slot and a conditional branch.
    fn lower_short_circuit(&mut self, is_and: bool, lhs: &Exp, rhs: &Exp) -> Result<usize> {
        let id = self.next_logic;
        self.next_logic += 1;

        self.inst(format!("@result_{} = alloc i32", id));
        let l = self.lower_exp_value(lhs)?;
        let norm_l = self.fresh_temp();
        self.inst(format!("%{} = ne %{}, 0", norm_l, l));
        self.inst(format!("store %{}, @result_{}", norm_l, id));
        if is_and {
            // Fall through to the right operand only when the left is true.
            self.inst(format!(
                "br %{}, %logic_then_{}, %logic_end_{}",
                norm_l, id, id
            ));
        } else {
            self.inst(format!(
                "br %{}, %logic_end_{}, %logic_then_{}",
                norm_l, id, id
            ));
        }
        self.terminated = true;

        self.label(&format!("%logic_then_{}", id));
        let r = self.lower_exp_value(rhs)?;
        let norm_r = self.fresh_temp();
        self.inst(format!("%{} = ne %{}, 0", norm_r, r));
        self.inst(format!("store %{}, @result_{}", norm_r, id));
        self.inst(format!("jump %logic_end_{}", id));
        self.terminated = true;

        self.label(&format!("%logic_end_{}", id));
        let k = self.fresh_temp();
        self.inst(format!("%{} = load @result_{}", k, id));
        Ok(k)
    }

    fn lower_call(&mut self, callee: &str, args: &[Exp]) -> Result<Option<usize>> {
        let returns_value = match self.symbols.lookup(callee) {
            Some(resolved) => match resolved.symbol() {
                Symbol::Func { returns_value } => *returns_value,
                _ => bail!("'{}' is not a function", callee),
            },
            None => bail!("call to undefined function '{}'", callee),
        };

        // Arguments are lowered right-to-left so temporary numbering matches
        // the expression convention; the call lists them left-to-right.
        let mut arg_temps = Vec::with_capacity(args.len());
        for arg in args.iter().rev() {
            let saved = self.in_param_position;
            self.in_param_position = true;
            let lowered = self.lower_exp_value(arg);
            self.in_param_position = saved;
            arg_temps.push(lowered?);
        }
        arg_temps.reverse();

        let list = arg_temps
            .iter()
            .map(|t| format!("%{}", t))
            .collect::<Vec<_>>()
            .join(", ");
        if returns_value {
            let k = self.fresh_temp();
            self.inst(format!("%{} = call @{}({})", k, callee, list));
            Ok(Some(k))
        } else {
            self.inst(format!("call @{}({})", callee, list));
            Ok(None)
        }
    }

    /// Lower an lvalue in value position.
    fn lower_lval(&mut self, lval: &LVal) -> Result<usize> {
        let (name, symbol) = self.resolve_lval(lval)?;
        match symbol {
            Symbol::Const(value) => {
                if !lval.indices.is_empty() {
                    bail!("'{}' is a scalar constant and cannot be indexed", lval.ident);
                }
                let k = self.fresh_temp();
                self.inst(format!("%{} = add 0, {}", k, value));
                Ok(k)
            }
            Symbol::Var => {
                if !lval.indices.is_empty() {
                    bail!("'{}' is a scalar and cannot be indexed", lval.ident);
                }
                let k = self.fresh_temp();
                self.inst(format!("%{} = load {}", k, name));
                Ok(k)
            }
            Symbol::Func { .. } => bail!("function '{}' used as a value", lval.ident),
            Symbol::Array { rank } => {
                if lval.indices.is_empty() {
                    // Base-pointer decay of a bare array name.
                    let k = self.fresh_temp();
                    self.inst(format!("%{} = getelemptr {}, 0", k, name));
                    Ok(k)
                } else {
                    let addr = self.lower_array_address(&name, &lval.indices)?;
                    self.finish_lval_access(addr, lval.indices.len(), rank)
                }
            }
            Symbol::Pointer { rank } => {
                if lval.indices.is_empty() {
                    // Materialize the pointer value itself.
                    let k = self.fresh_temp();
                    self.inst(format!("%{} = load {}", k, name));
                    Ok(k)
                } else {
                    let addr = self.lower_pointer_address(&name, &lval.indices)?;
                    self.finish_lval_access(addr, lval.indices.len(), rank)
                }
            }
        }
    }

    fn resolve_lval(&self, lval: &LVal) -> Result<(String, Symbol)> {
        let resolved = self
            .symbols
            .lookup(&lval.ident)
            .ok_or_else(|| anyhow!("undefined identifier '{}'", lval.ident))?;
        Ok((resolved.ir_name(&lval.ident), resolved.symbol().clone()))
    }

    /// Load or decay a computed element address, depending on whether the
    /// index sequence consumed the declared rank and on argument position.
    fn finish_lval_access(&mut self, addr: usize, consumed: usize, rank: usize) -> Result<usize> {
        if consumed == rank {
            let k = self.fresh_temp();
            self.inst(format!("%{} = load %{}", k, addr));
            Ok(k)
        } else if self.in_param_position {
            let k = self.fresh_temp();
            self.inst(format!("%{} = getelemptr %{}, 0", k, addr));
            Ok(k)
        } else {
            // Partial indexing outside argument position is ill-typed SysY;
            // the grammar is trusted, so hand back the address unchanged.
            Ok(addr)
        }
    }

    /// Chain `getelemptr` from a named array base, one step per index.
    pub(super) fn lower_array_address(&mut self, name: &str, indices: &[Exp]) -> Result<usize> {
        let mut base: Option<usize> = None;
        for index in indices {
            let i = self.lower_index(index)?;
            let k = self.fresh_temp();
            match base {
                None => self.inst(format!("%{} = getelemptr {}, %{}", k, name, i)),
                Some(b) => self.inst(format!("%{} = getelemptr %{}, %{}", k, b, i)),
            }
            base = Some(k);
        }
        base.ok_or_else(|| anyhow!("array address requires at least one index"))
    }

    /// Address computation through a parameter array: load the pointer, take
    /// the first step with `getptr`, then continue with `getelemptr`.
    pub(super) fn lower_pointer_address(&mut self, name: &str, indices: &[Exp]) -> Result<usize> {
        let p = self.fresh_temp();
        self.inst(format!("%{} = load {}", p, name));
        let mut base = p;
        for (pos, index) in indices.iter().enumerate() {
            let i = self.lower_index(index)?;
            let k = self.fresh_temp();
            if pos == 0 {
                self.inst(format!("%{} = getptr %{}, %{}", k, base, i));
            } else {
                self.inst(format!("%{} = getelemptr %{}, %{}", k, base, i));
            }
            base = k;
        }
        Ok(base)
    }

    /// Index expressions are not in argument position even when the lvalue is.
    fn lower_index(&mut self, exp: &Exp) -> Result<usize> {
        let saved = self.in_param_position;
        self.in_param_position = false;
        let result = self.lower_exp_value(exp);
        self.in_param_position = saved;
        result
    }
}

fn binary_ir_op(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Add => "add",
        BinaryOp::Sub => "sub",
        BinaryOp::Mul => "mul",
        BinaryOp::Div => "div",
        BinaryOp::Mod => "mod",
        BinaryOp::Lt => "lt",
        BinaryOp::Gt => "gt",
        BinaryOp::Le => "le",
        BinaryOp::Ge => "ge",
        BinaryOp::Eq => "eq",
        BinaryOp::Ne => "ne",
        // Short-circuit operators never reach the plain binary path.
        BinaryOp::And | BinaryOp::Or => unreachable!("short-circuit ops are lowered separately"),
    }
}

/// Fold a compile-time constant expression.
///
/// Arithmetic wraps like the target's 32-bit registers, so the folded value
/// agrees with what the emitted code would compute at run time. `&&`/`||`
/// short-circuit natively: the right operand of a decided operator is never
/// evaluated (and may even be erroneous, e.g. divide by zero).
pub(super) fn eval_const(symbols: &SymbolTables, exp: &Exp) -> Result<i32> {
    match exp {
        Exp::Number(n) => Ok(*n),
        Exp::LVal(lval) => {
            if !lval.indices.is_empty() {
                bail!("indexed value is not a compile-time constant");
            }
            match symbols.lookup(&lval.ident) {
                Some(resolved) => match resolved.symbol() {
                    Symbol::Const(value) => Ok(*value),
                    _ => bail!("'{}' is not a compile-time constant", lval.ident),
                },
                None => bail!("undefined identifier '{}'", lval.ident),
            }
        }
        Exp::Unary(op, operand) => {
            let v = eval_const(symbols, operand)?;
            Ok(match op {
                UnaryOp::Plus => v,
                UnaryOp::Neg => v.wrapping_neg(),
                UnaryOp::Not => (v == 0) as i32,
            })
        }
        Exp::Binary(BinaryOp::And, lhs, rhs) => {
            if eval_const(symbols, lhs)? == 0 {
                Ok(0)
            } else {
                Ok((eval_const(symbols, rhs)? != 0) as i32)
            }
        }
        Exp::Binary(BinaryOp::Or, lhs, rhs) => {
            if eval_const(symbols, lhs)? != 0 {
                Ok(1)
            } else {
                Ok((eval_const(symbols, rhs)? != 0) as i32)
            }
        }
        Exp::Binary(op, lhs, rhs) => {
            let l = eval_const(symbols, lhs)?;
            let r = eval_const(symbols, rhs)?;
            Ok(match op {
                BinaryOp::Add => l.wrapping_add(r),
                BinaryOp::Sub => l.wrapping_sub(r),
                BinaryOp::Mul => l.wrapping_mul(r),
                BinaryOp::Div => {
                    if r == 0 {
                        bail!("division by zero in constant expression");
                    }
                    l.wrapping_div(r)
                }
                BinaryOp::Mod => {
                    if r == 0 {
                        bail!("remainder by zero in constant expression");
                    }
                    l.wrapping_rem(r)
                }
                BinaryOp::Lt => (l < r) as i32,
                BinaryOp::Gt => (l > r) as i32,
                BinaryOp::Le => (l <= r) as i32,
                BinaryOp::Ge => (l >= r) as i32,
                BinaryOp::Eq => (l == r) as i32,
                BinaryOp::Ne => (l != r) as i32,
                BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
            })
        }
        Exp::Call(name, _) => bail!("call to '{}' is not a compile-time constant", name),
    }
}
