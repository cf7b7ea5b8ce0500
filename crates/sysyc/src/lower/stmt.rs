//! Statement and control-flow lowering.
//!
//! Each statement reports through `LoweringContext::terminated` whether it
//! ended the current block with a terminator. Compositions use that flag
//! explicitly: an `if`/`else` whose arms both terminate emits no join label,
//! and anything following a terminator within the same block is elided.

use super::LoweringContext;
use crate::front::ast::{BlockItem, LVal, Stmt};
use crate::front::symbol::Symbol;
use anyhow::{bail, Result};

impl LoweringContext {
    /// Lower the items of a block in order. Items after a terminator are
    /// dead and are skipped entirely (declarations included, so no `alloc`
    /// lands after a terminator).
    pub(super) fn lower_block_items(&mut self, items: &[BlockItem]) -> Result<()> {
        for item in items {
            if self.terminated {
                break;
            }
            match item {
                BlockItem::Decl(decl) => self.lower_local_decl(decl)?,
                BlockItem::Stmt(stmt) => {
                    self.lower_stmt(stmt)?;
                }
            }
        }
        Ok(())
    }

    /// Lower one statement; returns whether it terminated the block.
    pub(super) fn lower_stmt(&mut self, stmt: &Stmt) -> Result<bool> {
        match stmt {
            Stmt::Return(value) => {
                match value {
                    Some(exp) => {
                        let k = self.lower_exp_value(exp)?;
                        self.inst(format!("ret %{}", k));
                    }
                    None => self.inst("ret"),
                }
                self.terminated = true;
            }

            Stmt::Assign(lval, exp) => self.lower_assign(lval, exp)?,

            Stmt::Exp(Some(exp)) => {
                self.lower_exp(exp)?;
            }
            Stmt::Exp(None) => {}

            Stmt::Block(block) => {
                self.symbols.push_scope();
                self.lower_block_items(&block.items)?;
                self.symbols.pop_scope()?;
            }

            Stmt::If {
                cond,
                then_branch,
                else_branch,
            } => self.lower_if(cond, then_branch, else_branch.as_deref())?,

            Stmt::While { cond, body } => self.lower_while(cond, body)?,

            Stmt::Break => {
                // Outside a loop this is a silent no-op; the grammar is
                // presumed to enforce legality.
                if let Some(&id) = self.loop_stack.last() {
                    if !self.terminated {
                        self.inst(format!("jump %while_end_{}", id));
                        self.terminated = true;
                    }
                }
            }

            Stmt::Continue => {
                if let Some(&id) = self.loop_stack.last() {
                    if !self.terminated {
                        self.inst(format!("jump %while_entry_{}", id));
                        self.terminated = true;
                    }
                }
            }
        }
        Ok(self.terminated)
    }

    fn lower_assign(&mut self, lval: &LVal, exp: &crate::front::ast::Exp) -> Result<()> {
        let value = self.lower_exp_value(exp)?;
        let resolved = match self.symbols.lookup(&lval.ident) {
            Some(r) => (r.ir_name(&lval.ident), r.symbol().clone()),
            None => bail!("assignment to undefined identifier '{}'", lval.ident),
        };
        let (name, symbol) = resolved;
        match symbol {
            Symbol::Const(_) | Symbol::Var if lval.indices.is_empty() => {
                self.inst(format!("store %{}, {}", value, name));
            }
            Symbol::Array { .. } => {
                let addr = self.lower_array_address(&name, &lval.indices)?;
                self.inst(format!("store %{}, %{}", value, addr));
            }
            Symbol::Pointer { .. } => {
                let addr = self.lower_pointer_address(&name, &lval.indices)?;
                self.inst(format!("store %{}, %{}", value, addr));
            }
            _ => bail!("invalid assignment target '{}'", lval.ident),
        }
        Ok(())
    }

    fn lower_if(
        &mut self,
        cond: &crate::front::ast::Exp,
        then_branch: &Stmt,
        else_branch: Option<&Stmt>,
    ) -> Result<()> {
        let cond_temp = self.lower_exp_value(cond)?;
        let id = self.next_block;
        self.next_block += 1;

        match else_branch {
            None => {
                self.inst(format!("br %{}, %then_{}, %end_{}", cond_temp, id, id));
                self.terminated = true;

                self.label(&format!("%then_{}", id));
                self.lower_stmt(then_branch)?;
                if !self.terminated {
                    self.inst(format!("jump %end_{}", id));
                }
                self.label(&format!("%end_{}", id));
            }
            Some(else_branch) => {
                self.inst(format!("br %{}, %then_{}, %else_{}", cond_temp, id, id));
                self.terminated = true;

                self.label(&format!("%then_{}", id));
                self.lower_stmt(then_branch)?;
                let then_terminated = self.terminated;
                if !then_terminated {
                    self.inst(format!("jump %end_{}", id));
                }

                self.label(&format!("%else_{}", id));
                self.lower_stmt(else_branch)?;
                let else_terminated = self.terminated;
                if !else_terminated {
                    self.inst(format!("jump %end_{}", id));
                }

                // When both arms terminate there is no fall-through into a
                // join block, so the label would be an orphan.
                if then_terminated && else_terminated {
                    self.terminated = true;
                } else {
                    self.label(&format!("%end_{}", id));
                }
            }
        }
        Ok(())
    }

    fn lower_while(&mut self, cond: &crate::front::ast::Exp, body: &Stmt) -> Result<()> {
        let id = self.next_loop;
        self.next_loop += 1;
        self.loop_stack.push(id);

        self.inst(format!("jump %while_entry_{}", id));
        self.label(&format!("%while_entry_{}", id));
        let cond_temp = self.lower_exp_value(cond)?;
        self.inst(format!(
            "br %{}, %while_body_{}, %while_end_{}",
            cond_temp, id, id
        ));
        self.terminated = true;

        self.label(&format!("%while_body_{}", id));
        self.lower_stmt(body)?;
        if !self.terminated {
            self.inst(format!("jump %while_entry_{}", id));
        }
        self.label(&format!("%while_end_{}", id));

        self.loop_stack.pop();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::front::parse;
    use crate::lower::lower_comp_unit;

    fn lower(source: &str) -> String {
        lower_comp_unit(&parse(source).unwrap()).unwrap()
    }

    /// Split IR text into (label, instruction lines) pairs per block.
    fn blocks(ir: &str) -> Vec<(String, Vec<String>)> {
        let mut out: Vec<(String, Vec<String>)> = Vec::new();
        for line in ir.lines() {
            if line.starts_with('%') && line.ends_with(':') {
                out.push((line.trim_end_matches(':').to_string(), Vec::new()));
            } else if let Some(inst) = line.strip_prefix('\t') {
                if let Some(last) = out.last_mut() {
                    last.1.push(inst.to_string());
                }
            }
        }
        out
    }

    fn is_terminator(inst: &str) -> bool {
        inst.starts_with("ret") || inst.starts_with("jump ") || inst.starts_with("br ")
    }

    fn assert_terminator_discipline(ir: &str) {
        for (label, insts) in blocks(ir) {
            let last = insts
                .last()
                .unwrap_or_else(|| panic!("block {} is empty", label));
            assert!(
                is_terminator(last),
                "block {} does not end in a terminator",
                label
            );
            for inst in &insts[..insts.len() - 1] {
                assert!(
                    !is_terminator(inst),
                    "block {} has an instruction after its terminator",
                    label
                );
            }
        }
    }

    #[test]
    fn if_else_lowering_shape() {
        let ir = lower("int main() { int x = 0; if (x == 0) x = 1; else x = 2; return x; }");
        // temps: %0 init, %1 literal 0, %2 load x, %3 eq
        assert!(ir.contains("br %3, %then_0, %else_0"));
        assert!(ir.contains("%then_0:"));
        assert!(ir.contains("%else_0:"));
        assert!(ir.contains("%end_0:"));
        assert_terminator_discipline(&ir);
    }

    #[test]
    fn if_without_else_always_has_join() {
        let ir = lower("int main() { int x = 0; if (x) x = 1; return x; }");
        assert!(ir.contains("br %1, %then_0, %end_0"));
        assert!(ir.contains("%end_0:"));
        assert_terminator_discipline(&ir);
    }

    #[test]
    fn both_arms_returning_suppresses_join_label() {
        let ir = lower("int main() { if (1) return 1; else return 2; }");
        assert!(!ir.contains("%end_0:"), "no orphan join label expected");
        assert_terminator_discipline(&ir);
    }

    #[test]
    fn while_lowering_shape() {
        let ir = lower(
            "int main() { int i = 0; while (i < 10) { if (i == 5) break; i = i + 1; } return i; }",
        );
        assert!(ir.contains("jump %while_entry_0"));
        assert!(ir.contains("%while_entry_0:"));
        assert!(ir.contains("br %3, %while_body_0, %while_end_0"));
        assert!(ir.contains("%while_body_0:"));
        assert!(ir.contains("%while_end_0:"));
        // break targets the loop end
        assert!(ir.contains("jump %while_end_0"));
        assert_terminator_discipline(&ir);
    }

    #[test]
    fn break_suppresses_rest_of_its_block() {
        let ir = lower("int main() { int i = 0; while (1) { break; i = i + 1; } return i; }");
        // The update after `break` is dead and must not be emitted inside
        // the body block.
        let body = blocks(&ir)
            .into_iter()
            .find(|(label, _)| label == "%while_body_0")
            .expect("body block present");
        assert_eq!(body.1.last().unwrap(), "jump %while_end_0");
        assert_eq!(
            body.1.iter().filter(|i| i.contains("= add")).count(),
            0,
            "increment after break must be elided"
        );
        assert_terminator_discipline(&ir);
    }

    #[test]
    fn continue_targets_loop_entry() {
        let ir = lower(
            "int main() { int i = 0; while (i < 3) { i = i + 1; continue; } return i; }",
        );
        let body = blocks(&ir)
            .into_iter()
            .find(|(label, _)| label == "%while_body_0")
            .expect("body block present");
        assert_eq!(body.1.last().unwrap(), "jump %while_entry_0");
        assert_terminator_discipline(&ir);
    }

    #[test]
    fn break_outside_loop_is_a_no_op() {
        let ir = lower("int main() { break; continue; return 3; }");
        assert!(!ir.contains("jump"));
        assert!(ir.contains("ret %0"));
    }

    #[test]
    fn nested_loops_target_innermost() {
        let ir = lower(
            "int main() { while (1) { while (2) { break; } continue; } return 0; }",
        );
        // inner break → inner end; outer continue → outer entry
        assert!(ir.contains("jump %while_end_1"));
        assert!(ir.contains("jump %while_entry_0"));
        assert_terminator_discipline(&ir);
    }

    #[test]
    fn statements_after_return_are_elided() {
        let ir = lower("int main() { return 1; return 2; }");
        assert!(ir.contains("%0 = add 0, 1"));
        assert!(!ir.contains("add 0, 2"));
        assert_terminator_discipline(&ir);
    }

    #[test]
    fn nested_block_scoping_shadows() {
        let ir = lower("int main() { int x = 1; { int x = 2; x = 3; } return x; }");
        // Function scope is 0; the nested block gets scope 1.
        assert!(ir.contains("@x_0 = alloc i32"));
        assert!(ir.contains("@x_1 = alloc i32"));
        assert!(ir.contains("store %2, @x_1"), "inner assignment targets inner x");
        assert!(ir.contains("load @x_0"), "return reads the outer x");
    }
}
