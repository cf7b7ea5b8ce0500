//! Assembly writer.
//!
//! Wraps the output buffer with helpers that keep every emitted
//! `addi`/`lw`/`sw` immediate inside the signed 12-bit range: displacements
//! outside `[-2048, 2047]` are synthesized with `li` + `add` through a
//! scratch register. Also hands out unique ids for branch bridge labels.

use std::fmt::Write as _;

/// Signed 12-bit immediate check for I-type and S-type encodings.
pub fn fits_imm12(value: i32) -> bool {
    (-2048..=2047).contains(&value)
}

pub struct AsmWriter {
    out: String,
    next_bridge: usize,
}

impl AsmWriter {
    pub fn new() -> Self {
        AsmWriter {
            out: String::new(),
            next_bridge: 0,
        }
    }

    pub fn finish(self) -> String {
        self.out
    }

    /// One tab-indented instruction or directive line.
    pub fn inst(&mut self, text: impl AsRef<str>) {
        self.out.push('\t');
        self.out.push_str(text.as_ref());
        self.out.push('\n');
    }

    pub fn label(&mut self, name: &str) {
        self.out.push_str(name);
        self.out.push_str(":\n");
    }

    pub fn blank(&mut self) {
        self.out.push('\n');
    }

    /// Unique id for a pair of branch bridge labels.
    pub fn fresh_bridge(&mut self) -> usize {
        let id = self.next_bridge;
        self.next_bridge += 1;
        id
    }

    pub fn li(&mut self, reg: &str, value: i32) {
        self.inst(format!("li {}, {}", reg, value));
    }

    /// `reg = word at sp+offset`. The destination doubles as the scratch
    /// register when the offset needs synthesis.
    pub fn lw_sp(&mut self, reg: &str, offset: i32) {
        if fits_imm12(offset) {
            self.inst(format!("lw {}, {}(sp)", reg, offset));
        } else {
            self.li(reg, offset);
            self.inst(format!("add {}, {}, sp", reg, reg));
            self.inst(format!("lw {}, 0({})", reg, reg));
        }
    }

    /// `word at sp+offset = reg`. Uses `t5` as the scratch register, so the
    /// stored register must not be `t5`.
    pub fn sw_sp(&mut self, reg: &str, offset: i32) {
        debug_assert_ne!(reg, "t5", "t5 is the sw scratch register");
        if fits_imm12(offset) {
            self.inst(format!("sw {}, {}(sp)", reg, offset));
        } else {
            self.li("t5", offset);
            self.inst("add t5, t5, sp");
            self.inst(format!("sw {}, 0(t5)", reg));
        }
    }

    /// `reg = sp + offset`. The destination doubles as the scratch register.
    pub fn addr_of_sp(&mut self, reg: &str, offset: i32) {
        if fits_imm12(offset) {
            self.inst(format!("addi {}, sp, {}", reg, offset));
        } else {
            self.li(reg, offset);
            self.inst(format!("add {}, {}, sp", reg, reg));
        }
    }

    /// Adjust the stack pointer by `delta` bytes.
    pub fn adjust_sp(&mut self, delta: i32) {
        if delta == 0 {
            return;
        }
        if fits_imm12(delta) {
            self.inst(format!("addi sp, sp, {}", delta));
        } else {
            self.li("t0", delta);
            self.inst("add sp, sp, t0");
        }
    }
}

impl Default for AsmWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn imm12_boundaries() {
        assert!(fits_imm12(2047));
        assert!(!fits_imm12(2048));
        assert!(fits_imm12(-2048));
        assert!(!fits_imm12(-2049));
        assert!(fits_imm12(0));
    }

    #[test]
    fn small_offsets_use_direct_form() {
        let mut asm = AsmWriter::new();
        asm.lw_sp("t2", 12);
        asm.sw_sp("t4", 2047);
        asm.adjust_sp(-16);
        let text = asm.finish();
        assert!(text.contains("\tlw t2, 12(sp)\n"));
        assert!(text.contains("\tsw t4, 2047(sp)\n"));
        assert!(text.contains("\taddi sp, sp, -16\n"));
    }

    #[test]
    fn large_offsets_are_synthesized() {
        let mut asm = AsmWriter::new();
        asm.lw_sp("t2", 4096);
        let text = asm.finish();
        assert!(text.contains("\tli t2, 4096\n"));
        assert!(text.contains("\tadd t2, t2, sp\n"));
        assert!(text.contains("\tlw t2, 0(t2)\n"));
        assert!(!text.contains("4096(sp)"));
    }

    #[test]
    fn large_store_goes_through_t5() {
        let mut asm = AsmWriter::new();
        asm.sw_sp("t4", 2048);
        let text = asm.finish();
        assert!(text.contains("\tli t5, 2048\n"));
        assert!(text.contains("\tadd t5, t5, sp\n"));
        assert!(text.contains("\tsw t4, 0(t5)\n"));
    }

    #[test]
    fn large_sp_adjust_uses_t0() {
        let mut asm = AsmWriter::new();
        asm.adjust_sp(-4000);
        let text = asm.finish();
        assert!(text.contains("\tli t0, -4000\n"));
        assert!(text.contains("\tadd sp, sp, t0\n"));
    }

    #[test]
    fn zero_adjust_emits_nothing() {
        let mut asm = AsmWriter::new();
        asm.adjust_sp(0);
        assert!(asm.finish().is_empty());
    }

    #[test]
    fn bridge_ids_are_unique() {
        let mut asm = AsmWriter::new();
        assert_eq!(asm.fresh_bridge(), 0);
        assert_eq!(asm.fresh_bridge(), 1);
    }
}
