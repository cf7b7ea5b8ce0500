//! sysyc — SysY to RISC-V compiler.
//!
//! This crate provides the two-phase lowering pipeline that turns SysY
//! source text into RISC-V assembly:
//!
//! 1. **AST → IR** ([`lower`]): a syntax-directed walk over the parsed AST
//!    that resolves names through scoped symbol tables, folds constant
//!    expressions and emits textual Koopa IR.
//! 2. **IR → RISC-V** ([`codegen`]): the IR text is re-materialized as a
//!    typed value graph ([`ir`]) and lowered to assembly with a naive
//!    one-slot-per-value stack frame discipline.

pub mod codegen;
pub mod front;
pub mod ir;
pub mod lower;

// Re-export key types for convenience
pub use anyhow::{Context, Result};

/// Compile SysY source text to Koopa IR text.
///
/// # Example
/// ```
/// let ir = sysyc::emit_koopa("int main() { return 0; }").unwrap();
/// assert!(ir.contains("fun @main(): i32 {"));
/// ```
pub fn emit_koopa(source: &str) -> Result<String> {
    let ast = front::parse(source).context("failed to parse SysY source")?;
    lower::lower_comp_unit(&ast).context("failed to lower AST to IR")
}

/// Compile SysY source text to RISC-V assembly.
///
/// The IR text produced by [`emit_koopa`] is parsed back into the typed
/// value graph and handed to the code generator.
pub fn emit_riscv(source: &str) -> Result<String> {
    let ir_text = emit_koopa(source)?;
    let program = ir::parse_program(&ir_text).context("failed to build IR program")?;
    codegen::emit_program(&program).context("failed to generate RISC-V assembly")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_round_trip() {
        let asm = emit_riscv("int main() { return 1 + 2; }").unwrap();
        assert!(asm.contains("main:"));
        assert!(asm.contains("\tret\n"));
    }

    #[test]
    fn parse_errors_surface() {
        assert!(emit_koopa("int main( { return 0; }").is_err());
        assert!(emit_riscv("int main() { return x; }").is_err());
    }
}
