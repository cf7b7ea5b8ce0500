//! Shared helpers for the end-to-end compiler tests.
//!
//! Tests feed SysY programs (inline string fixtures) through the public
//! pipeline and assert on the shape of the emitted IR and assembly. The
//! helpers here implement the structural checks that should hold for every
//! successful compile: single-assignment temporaries, terminator discipline,
//! 16-byte frame alignment, and legal 12-bit immediates.

pub use sysyc::{emit_koopa, emit_riscv};

/// Compile to IR text, panicking on failure.
pub fn koopa(source: &str) -> String {
    emit_koopa(source).expect("compilation to IR should succeed")
}

/// Compile to assembly, panicking on failure.
pub fn riscv(source: &str) -> String {
    emit_riscv(source).expect("compilation to RISC-V should succeed")
}

/// Split IR text into (label, instructions) pairs.
pub fn blocks(ir: &str) -> Vec<(String, Vec<String>)> {
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
    inst == "ret" || inst.starts_with("ret ") || inst.starts_with("jump ") || inst.starts_with("br ")
}

/// Every labeled block ends with exactly one terminator and nothing follows
/// it within the block.
pub fn assert_terminator_discipline(ir: &str) {
    for (label, insts) in blocks(ir) {
        let last = insts
            .last()
            .unwrap_or_else(|| panic!("block {} is empty", label));
        assert!(
            is_terminator(last),
            "block {} does not end in a terminator: {:?}",
            label,
            last
        );
        for inst in &insts[..insts.len() - 1] {
            assert!(
                !is_terminator(inst),
                "block {} continues after terminator {:?}",
                label,
                inst
            );
        }
    }
}

/// Every `%k` temporary is defined at most once, with dense indices.
pub fn assert_single_assignment_temps(ir: &str) {
    let mut defined = Vec::new();
    for line in ir.lines() {
        let line = line.trim_start();
        if let Some(rest) = line.strip_prefix('%') {
            if let Some((lhs, _)) = rest.split_once(" = ") {
                if let Ok(k) = lhs.parse::<usize>() {
                    assert!(!defined.contains(&k), "%{} defined twice", k);
                    defined.push(k);
                }
            }
        }
    }
    defined.sort_unstable();
    for (i, k) in defined.iter().enumerate() {
        assert_eq!(i, *k, "temporary indices must be dense from zero");
    }
}

/// No `addi`/`lw`/`sw` carries an immediate outside the signed 12-bit range.
pub fn assert_immediates_legal(asm: &str) {
    for line in asm.lines() {
        let inst = line.trim();
        let imm = if let Some(rest) = inst.strip_prefix("addi ") {
            rest.rsplit(',').next().and_then(|s| s.trim().parse::<i64>().ok())
        } else if inst.starts_with("lw ") || inst.starts_with("sw ") {
            inst.split(',')
                .nth(1)
                .and_then(|s| s.trim().split('(').next())
                .and_then(|s| s.parse::<i64>().ok())
        } else {
            None
        };
        if let Some(imm) = imm {
            assert!(
                (-2048..=2047).contains(&imm),
                "illegal immediate in '{}'",
                inst
            );
        }
    }
}

/// Every stack adjustment is a multiple of 16 (large frames go through
/// `li t0` and are covered by the same check on the constant).
pub fn assert_frames_aligned(asm: &str) {
    let mut lines = asm.lines().peekable();
    while let Some(line) = lines.next() {
        let inst = line.trim();
        if let Some(rest) = inst.strip_prefix("addi sp, sp, ") {
            let n: i64 = rest.trim().parse().expect("sp adjustment is a literal");
            assert_eq!(n.abs() % 16, 0, "sp adjustment {} not 16-aligned", n);
        }
        if let Some(rest) = inst.strip_prefix("li t0, ") {
            if lines.peek().map(|l| l.trim()) == Some("add sp, sp, t0") {
                let n: i64 = rest.trim().parse().expect("frame constant is a literal");
                assert_eq!(n.abs() % 16, 0, "sp adjustment {} not 16-aligned", n);
            }
        }
    }
}

/// Full-pipeline structural check used by several test files.
pub fn assert_compiles_clean(source: &str) {
    let ir = koopa(source);
    assert_terminator_discipline(&ir);
    assert_single_assignment_temps(&ir);
    let asm = riscv(source);
    assert_immediates_legal(&asm);
    assert_frames_aligned(&asm);
}
