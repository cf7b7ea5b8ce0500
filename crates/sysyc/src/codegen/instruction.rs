//! Per-instruction RISC-V lowering.
//!
//! Every value-producing instruction writes its result into its own frame
//! slot, assigned in visit order starting above the outgoing-argument spill
//! area. Register use is fixed: `t2`/`t3` binary operands, `t4` results,
//! `t0`/`t1` value scratch, `t5`/`t6` addressing, `a0`-`a7` the calling
//! convention. A load whose source is a plain `alloc` produces no code and
//! shares the source's slot.

use super::asm::AsmWriter;
use super::frame::{plan_frame, FrameLayout};
use crate::ir::{BinaryOp, Function, Program, Type, Value, ValueKind};
use anyhow::{anyhow, bail, Result};
use std::collections::HashMap;

pub(super) struct FuncEmitter<'a> {
    program: &'a Program,
    func: &'a Function,
    frame: FrameLayout,
    offsets: HashMap<Value, i32>,
    next_slot: i32,
}

impl<'a> FuncEmitter<'a> {
    pub(super) fn new(program: &'a Program, func: &'a Function) -> Self {
        let frame = plan_frame(program, func);
        FuncEmitter {
            program,
            func,
            frame,
            offsets: HashMap::new(),
            next_slot: frame.first_slot,
        }
    }

    pub(super) fn emit(mut self, asm: &mut AsmWriter) -> Result<()> {
        asm.inst(".text");
        asm.inst(format!(".globl {}", self.func.name));
        asm.label(&self.func.name);

        asm.adjust_sp(-self.frame.size);
        if self.frame.save_ra {
            asm.sw_sp("ra", self.frame.ra_offset());
        }

        for bb in &self.func.bbs {
            asm.label(&bb.name);
            for &inst in &bb.insts {
                self.emit_inst(asm, inst)
                    .map_err(|e| anyhow!("in function '{}': {}", self.func.name, e))?;
            }
        }
        asm.blank();
        Ok(())
    }

    fn emit_inst(&mut self, asm: &mut AsmWriter, v: Value) -> Result<()> {
        let data = self.program.value(v);
        match &data.kind {
            ValueKind::Alloc => {
                let bytes = match data.ty.pointee() {
                    Some(pointee @ Type::Array(..)) => pointee.size() as i32,
                    Some(_) => 4,
                    None => bail!("alloc with non-pointer type"),
                };
                self.offsets.insert(v, self.next_slot);
                self.next_slot += bytes;
            }

            ValueKind::Binary { op, lhs, rhs } => self.emit_binary(asm, v, *op, *lhs, *rhs)?,

            ValueKind::Load { src } => self.emit_load(asm, v, *src)?,

            ValueKind::Store { value, dest } => self.emit_store(asm, *value, *dest)?,

            ValueKind::Branch {
                cond,
                true_bb,
                false_bb,
            } => {
                self.materialize(asm, "t0", *cond)?;
                // Two-step bridging keeps the conditional displacement short
                // and lets `j` cover the real distance.
                let bridge = asm.fresh_bridge();
                let true_label = &self.func.bbs[true_bb.0].name;
                let false_label = &self.func.bbs[false_bb.0].name;
                asm.inst(format!("bnez t0, bridge_true_{}", bridge));
                asm.inst(format!("beqz t0, bridge_false_{}", bridge));
                asm.label(&format!("bridge_true_{}", bridge));
                asm.inst(format!("j {}", true_label));
                asm.label(&format!("bridge_false_{}", bridge));
                asm.inst(format!("j {}", false_label));
            }

            ValueKind::Jump { target } => {
                asm.inst(format!("j {}", self.func.bbs[target.0].name));
            }

            ValueKind::Call { callee, args } => {
                for (i, &arg) in args.iter().enumerate() {
                    if i < 8 {
                        self.materialize(asm, &format!("a{}", i), arg)?;
                    } else {
                        self.materialize(asm, "t0", arg)?;
                        asm.sw_sp("t0", ((i - 8) * 4) as i32);
                    }
                }
                asm.inst(format!("call {}", self.program.func(*callee).name));
                if !data.ty.is_unit() {
                    let off = self.assign_slot(v);
                    asm.sw_sp("a0", off);
                }
            }

            ValueKind::Return { value } => {
                match value {
                    Some(value) => self.materialize(asm, "a0", *value)?,
                    None => asm.li("a0", 0),
                }
                if self.frame.save_ra {
                    asm.lw_sp("ra", self.frame.ra_offset());
                }
                asm.adjust_sp(self.frame.size);
                asm.inst("ret");
            }

            ValueKind::GetElemPtr { src, index } => {
                let base_ty = self
                    .program
                    .value(*src)
                    .ty
                    .pointee()
                    .ok_or_else(|| anyhow!("getelemptr source is not a pointer"))?;
                let step = match base_ty {
                    Type::Array(elem, _) => elem.size(),
                    Type::I32 => 4,
                    other => bail!("getelemptr through unsupported pointee {}", other),
                };
                self.emit_pointer_step(asm, v, *src, *index, step as i32)?;
            }

            ValueKind::GetPtr { src, index } => {
                let base_ty = self
                    .program
                    .value(*src)
                    .ty
                    .pointee()
                    .ok_or_else(|| anyhow!("getptr source is not a pointer"))?;
                let step = base_ty.size();
                self.emit_pointer_step(asm, v, *src, *index, step as i32)?;
            }

            ValueKind::Integer(_)
            | ValueKind::FuncArgRef { .. }
            | ValueKind::GlobalAlloc { .. }
            | ValueKind::Aggregate { .. }
            | ValueKind::ZeroInit => {
                bail!("value kind {:?} cannot appear in a basic block", data.kind)
            }
        }
        Ok(())
    }

    fn emit_binary(
        &mut self,
        asm: &mut AsmWriter,
        v: Value,
        op: BinaryOp,
        lhs: Value,
        rhs: Value,
    ) -> Result<()> {
        let lhs_kind = &self.program.value(lhs).kind;
        let rhs_kind = &self.program.value(rhs).kind;

        // `add 0, N` is the integer-move encoding; collapse it to one li.
        if let (BinaryOp::Add, ValueKind::Integer(0), ValueKind::Integer(n)) =
            (op, lhs_kind, rhs_kind)
        {
            asm.li("t4", *n);
            let off = self.assign_slot(v);
            asm.sw_sp("t4", off);
            return Ok(());
        }

        self.materialize(asm, "t2", lhs)?;
        self.materialize(asm, "t3", rhs)?;
        match op {
            BinaryOp::Add => asm.inst("add t4, t2, t3"),
            BinaryOp::Sub => asm.inst("sub t4, t2, t3"),
            BinaryOp::Mul => asm.inst("mul t4, t2, t3"),
            BinaryOp::Div => asm.inst("div t4, t2, t3"),
            BinaryOp::Mod => asm.inst("rem t4, t2, t3"),
            BinaryOp::And => asm.inst("and t4, t2, t3"),
            BinaryOp::Or => asm.inst("or t4, t2, t3"),
            BinaryOp::Lt => asm.inst("slt t4, t2, t3"),
            BinaryOp::Gt => asm.inst("sgt t4, t2, t3"),
            BinaryOp::Eq => {
                asm.inst("xor t4, t2, t3");
                asm.inst("seqz t4, t4");
            }
            BinaryOp::NotEq => {
                asm.inst("xor t4, t2, t3");
                asm.inst("snez t4, t4");
            }
            BinaryOp::Ge => {
                asm.inst("slt t4, t2, t3");
                asm.inst("seqz t4, t4");
            }
            BinaryOp::Le => {
                asm.inst("sgt t4, t2, t3");
                asm.inst("seqz t4, t4");
            }
        }
        let off = self.assign_slot(v);
        asm.sw_sp("t4", off);
        Ok(())
    }

    fn emit_load(&mut self, asm: &mut AsmWriter, v: Value, src: Value) -> Result<()> {
        match &self.program.value(src).kind {
            ValueKind::GlobalAlloc { .. } => {
                let name = self.global_name(src)?;
                asm.inst(format!("la t0, {}", name));
                asm.inst("lw t1, 0(t0)");
                let off = self.assign_slot(v);
                asm.sw_sp("t1", off);
            }
            ValueKind::GetElemPtr { .. } | ValueKind::GetPtr { .. } => {
                let src_off = self.slot_of(src)?;
                asm.lw_sp("t1", src_off);
                asm.inst("lw t2, 0(t1)");
                let off = self.assign_slot(v);
                asm.sw_sp("t2", off);
            }
            _ => {
                // Loading straight from an alloc reuses the variable's slot.
                let off = self.slot_of(src)?;
                self.offsets.insert(v, off);
            }
        }
        Ok(())
    }

    fn emit_store(&mut self, asm: &mut AsmWriter, value: Value, dest: Value) -> Result<()> {
        self.materialize(asm, "t0", value)?;
        match &self.program.value(dest).kind {
            ValueKind::GlobalAlloc { .. } => {
                let name = self.global_name(dest)?;
                asm.inst(format!("la t6, {}", name));
                asm.inst("sw t0, 0(t6)");
            }
            ValueKind::GetElemPtr { .. } | ValueKind::GetPtr { .. } => {
                let dest_off = self.slot_of(dest)?;
                asm.lw_sp("t5", dest_off);
                asm.inst("sw t0, 0(t5)");
            }
            _ => {
                let off = self.slot_of(dest)?;
                asm.sw_sp("t0", off);
            }
        }
        Ok(())
    }

    /// `result = base + index * step`, with the zero-index shortcut that
    /// forwards the base address unchanged.
    fn emit_pointer_step(
        &mut self,
        asm: &mut AsmWriter,
        v: Value,
        src: Value,
        index: Value,
        step: i32,
    ) -> Result<()> {
        self.base_address(asm, src)?;
        match &self.program.value(index).kind {
            ValueKind::Integer(0) => {
                let off = self.assign_slot(v);
                asm.sw_sp("t6", off);
                return Ok(());
            }
            ValueKind::Integer(n) => asm.li("t1", *n),
            _ => {
                let idx_off = self.slot_of(index)?;
                asm.lw_sp("t1", idx_off);
            }
        }
        asm.li("t2", step);
        asm.inst("mul t1, t1, t2");
        asm.inst("add t6, t6, t1");
        let off = self.assign_slot(v);
        asm.sw_sp("t6", off);
        Ok(())
    }

    /// Put the address a pointer-step starts from into `t6`.
    fn base_address(&mut self, asm: &mut AsmWriter, src: Value) -> Result<()> {
        match &self.program.value(src).kind {
            ValueKind::GlobalAlloc { .. } => {
                let name = self.global_name(src)?;
                asm.inst(format!("la t6, {}", name));
            }
            ValueKind::Alloc => {
                let off = self.slot_of(src)?;
                asm.addr_of_sp("t6", off);
            }
            _ => {
                // Any other producer left a pointer value in its slot.
                let off = self.slot_of(src)?;
                asm.lw_sp("t6", off);
            }
        }
        Ok(())
    }

    /// Materialize a value into `reg`: constants via `li`, formal parameters
    /// from the argument registers or the caller's overflow area, anything
    /// else from its frame slot.
    fn materialize(&mut self, asm: &mut AsmWriter, reg: &str, v: Value) -> Result<()> {
        match &self.program.value(v).kind {
            ValueKind::Integer(n) => asm.li(reg, *n),
            ValueKind::FuncArgRef { index } => {
                if *index < 8 {
                    asm.inst(format!("mv {}, a{}", reg, index));
                } else {
                    // Arguments beyond the register window live just above
                    // this function's frame, in the caller's spill area.
                    let offset = self.frame.size + ((*index - 8) * 4) as i32;
                    asm.lw_sp(reg, offset);
                }
            }
            _ => {
                let off = self.slot_of(v)?;
                asm.lw_sp(reg, off);
            }
        }
        Ok(())
    }

    fn assign_slot(&mut self, v: Value) -> i32 {
        let off = self.next_slot;
        self.offsets.insert(v, off);
        self.next_slot += 4;
        off
    }

    fn slot_of(&self, v: Value) -> Result<i32> {
        self.offsets
            .get(&v)
            .copied()
            .ok_or_else(|| anyhow!("value has no assigned stack slot"))
    }

    fn global_name(&self, v: Value) -> Result<&str> {
        self.program
            .value(v)
            .name
            .as_deref()
            .ok_or_else(|| anyhow!("global allocation without a name"))
    }
}
