//! Phase A: AST → Koopa IR text.
//!
//! # Overview
//!
//! A syntax-directed walk over the AST that appends textual IR to a single
//! output buffer. All walk state travels in one [`LoweringContext`]:
//!
//! - `next_temp` numbers the `%k` value temporaries; every instruction that
//!   produces a value takes the next index, and each lowering function
//!   returns the index of the temporary holding its result.
//! - `next_entry` / `next_block` / `next_logic` / `next_loop` are independent
//!   fresh-label counters. They are global to the compilation and each label
//!   family has distinct text (`%entry_…`, `%then_…`, `%logic_then_…`,
//!   `%while_entry_…`), so emitted block labels are unique program-wide and
//!   survive verbatim as assembly labels.
//! - `terminated` tracks whether the current block already ends in `ret`,
//!   `jump` or `br`; statements after a terminator in the same block are
//!   elided, and labels reset the flag.
//! - `loop_stack` holds the ids of enclosing `while` loops for
//!   `break`/`continue` targeting.
//! - `in_param_position` marks that the expression being lowered is an actual
//!   argument of a call, which switches partially-indexed array lvalues from
//!   load to pointer decay.
//!
//! The walk itself is split across the sibling modules: expressions in
//! [`exp`], statements in [`stmt`], declarations and initializer elaboration
//! in [`decl`].

mod decl;
mod exp;
mod stmt;

use crate::front::ast::{CompUnit, FuncDef, FuncType, GlobalItem};
use crate::front::symbol::{Symbol, SymbolTables};
use anyhow::Result;

/// Fixed runtime library: declaration text and return tag for each entry.
const RUNTIME_LIBRARY: &[(&str, &str, bool)] = &[
    ("getint", "decl @getint(): i32", true),
    ("getch", "decl @getch(): i32", true),
    ("getarray", "decl @getarray(*i32): i32", true),
    ("putint", "decl @putint(i32)", false),
    ("putch", "decl @putch(i32)", false),
    ("putarray", "decl @putarray(i32, *i32)", false),
    ("starttime", "decl @starttime()", false),
    ("stoptime", "decl @stoptime()", false),
];

/// Lower a complete compilation unit to Koopa IR text.
pub fn lower_comp_unit(unit: &CompUnit) -> Result<String> {
    let mut ctx = LoweringContext::new();
    ctx.declare_runtime_library();
    ctx.out.push('\n');
    for item in &unit.items {
        match item {
            GlobalItem::Decl(decl) => ctx.lower_global_decl(decl)?,
            GlobalItem::Func(func) => ctx.lower_func_def(func)?,
        }
    }
    Ok(ctx.out)
}

pub struct LoweringContext {
    out: String,
    symbols: SymbolTables,
    next_temp: usize,
    next_block: usize,
    next_logic: usize,
    next_loop: usize,
    next_entry: usize,
    terminated: bool,
    in_param_position: bool,
    loop_stack: Vec<usize>,
}

impl LoweringContext {
    fn new() -> Self {
        LoweringContext {
            out: String::new(),
            symbols: SymbolTables::new(),
            next_temp: 0,
            next_block: 0,
            next_logic: 0,
            next_loop: 0,
            next_entry: 0,
            terminated: false,
            in_param_position: false,
            loop_stack: Vec::new(),
        }
    }

    fn declare_runtime_library(&mut self) {
        for (name, decl, returns_value) in RUNTIME_LIBRARY {
            self.out.push_str(decl);
            self.out.push('\n');
            self.symbols.insert_global(
                name,
                Symbol::Func {
                    returns_value: *returns_value,
                },
            );
        }
    }

    /// Append one tab-indented instruction line.
    fn inst(&mut self, line: impl AsRef<str>) {
        self.out.push('\t');
        self.out.push_str(line.as_ref());
        self.out.push('\n');
    }

    /// Open a new labeled block; labels reset the terminator flag.
    fn label(&mut self, name: &str) {
        self.out.push_str(name);
        self.out.push_str(":\n");
        self.terminated = false;
    }

    /// Allocate the next `%k` temporary and return its index.
    fn fresh_temp(&mut self) -> usize {
        let k = self.next_temp;
        self.next_temp += 1;
        k
    }

    fn at_global_scope(&self) -> bool {
        self.symbols.depth() == 0
    }

    fn lower_func_def(&mut self, func: &FuncDef) -> Result<()> {
        let returns_value = func.ret == FuncType::Int;
        self.symbols
            .insert_global(&func.ident, Symbol::Func { returns_value });

        // Parameters live in the function's own scope; the body's items are
        // lowered directly into it so locals may shadow parameters.
        let scope = self.symbols.push_scope();

        let mut param_list = Vec::new();
        // (local alloc name, IR type, formal name) per parameter
        let mut spills = Vec::new();
        for param in &func.params {
            let formal = format!("@param_{}_{}", param.ident, scope);
            let local = format!("@{}_{}", param.ident, scope);
            let ty = match &param.dims {
                None => {
                    self.symbols.insert(&param.ident, Symbol::Var)?;
                    "i32".to_string()
                }
                Some(dims) => {
                    let trailing = decl::fold_dimensions(&self.symbols, dims)?;
                    self.symbols.insert(
                        &param.ident,
                        Symbol::Pointer {
                            rank: trailing.len() + 1,
                        },
                    )?;
                    format!("*{}", decl::array_type(&trailing))
                }
            };
            param_list.push(format!("{}: {}", formal, ty));
            spills.push((local, ty, formal));
        }

        self.out
            .push_str(&format!("fun @{}({})", func.ident, param_list.join(", ")));
        if returns_value {
            self.out.push_str(": i32");
        }
        self.out.push_str(" {\n");

        let entry = self.next_entry;
        self.next_entry += 1;
        self.label(&format!("%entry_{}", entry));

        for (local, ty, formal) in &spills {
            self.inst(format!("{} = alloc {}", local, ty));
            self.inst(format!("store {}, {}", formal, local));
        }

        self.lower_block_items(&func.body.items)?;

        // A body that falls off the end gets a synthesized return.
        if !self.terminated {
            if returns_value {
                self.inst("ret 0");
            } else {
                self.inst("ret");
            }
        }
        self.out.push_str("}\n\n");
        self.terminated = false;

        self.symbols.pop_scope()?;
        Ok(())
    }
}
