//! Phase B: typed IR graph → RISC-V assembly.
//!
//! # Overview
//!
//! ```text
//! Program
//!   ├─ globals ──► .data segment (.globl / label / .zero | .word …)
//!   └─ functions ─► per function:
//!        plan_frame()           slot counts, spill area, ra word
//!        prologue               sp adjust + ra spill (legalized)
//!        per block: label + per instruction (instruction.rs)
//!        epilogue on ret        ra restore + sp restore + ret
//! ```
//!
//! Declarations (the runtime library) have no basic blocks and emit nothing.
//! Block labels come straight from the IR (unique program-wide); function
//! labels drop the IR's `@` sigil.

mod asm;
pub mod frame;
mod instruction;

pub use frame::{plan_frame, FrameLayout};

use crate::ir::{Program, Value, ValueKind};
use anyhow::{bail, Context, Result};
use asm::AsmWriter;
use instruction::FuncEmitter;

/// Emit a complete assembly file for `program`.
pub fn emit_program(program: &Program) -> Result<String> {
    let mut asm = AsmWriter::new();

    if !program.globals.is_empty() {
        asm.inst(".data");
        for &global in &program.globals {
            emit_global(&mut asm, program, global)?;
        }
        asm.blank();
    }

    for func in &program.funcs {
        if func.is_decl() {
            continue;
        }
        FuncEmitter::new(program, func)
            .emit(&mut asm)
            .with_context(|| format!("emitting function '{}'", func.name))?;
    }

    Ok(asm.finish())
}

fn emit_global(asm: &mut AsmWriter, program: &Program, global: Value) -> Result<()> {
    let data = program.value(global);
    let name = data
        .name
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("global allocation without a name"))?;
    let init = match &data.kind {
        ValueKind::GlobalAlloc { init } => *init,
        other => bail!("global list entry has kind {:?}", other),
    };
    asm.inst(format!(".globl {}", name));
    asm.label(name);
    emit_global_init(asm, program, init)
}

fn emit_global_init(asm: &mut AsmWriter, program: &Program, init: Value) -> Result<()> {
    let data = program.value(init);
    match &data.kind {
        ValueKind::ZeroInit => {
            asm.inst(format!(".zero {}", data.ty.size()));
            Ok(())
        }
        ValueKind::Integer(n) => {
            asm.inst(format!(".word {}", n));
            Ok(())
        }
        ValueKind::Aggregate { elems } => {
            for &elem in elems {
                emit_global_init(asm, program, elem)?;
            }
            Ok(())
        }
        other => bail!("unsupported global initializer kind {:?}", other),
    }
}
