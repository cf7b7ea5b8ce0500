//! Per-function stack frame planning.
//!
//! A pre-pass over the typed IR counts, per function:
//!
//! - `slot_words`: one word per value-producing instruction, except that an
//!   `alloc` of an array reserves the array's full extent;
//! - `spill_words`: the widest outgoing-argument overflow, i.e. the maximum
//!   over all calls of `arg_count - 8`;
//! - `save_ra`: whether any call exists, which costs one word for the saved
//!   return address.
//!
//! The frame is the sum of the three, in bytes, rounded up to 16. Layout
//! from `sp` upward: outgoing-argument spill area, then instruction slots,
//! then (if present) the saved `ra` in the topmost word.

use crate::ir::{Function, Program, Type, ValueKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLayout {
    /// Total frame size in bytes; a non-negative multiple of 16.
    pub size: i32,
    /// Offset of the first instruction slot (the spill area sits below).
    pub first_slot: i32,
    /// Whether `ra` is saved in the topmost frame word.
    pub save_ra: bool,
}

impl FrameLayout {
    /// Offset of the saved return address, when present.
    pub fn ra_offset(&self) -> i32 {
        self.size - 4
    }
}

/// Round a byte count up to the 16-byte stack alignment.
pub fn round_up_16(bytes: usize) -> usize {
    (bytes + 15) / 16 * 16
}

/// Compute the frame layout for one function.
pub fn plan_frame(program: &Program, func: &Function) -> FrameLayout {
    let mut slot_words = 0usize;
    let mut spill_words = 0usize;
    let mut save_ra = false;

    for bb in &func.bbs {
        for &inst in &bb.insts {
            let data = program.value(inst);
            if let ValueKind::Call { args, .. } = &data.kind {
                save_ra = true;
                spill_words = spill_words.max(args.len().saturating_sub(8));
            }
            if !data.ty.is_unit() {
                slot_words += match &data.kind {
                    // The alloc's value is an address; the slot count is the
                    // pointee's extent in words.
                    ValueKind::Alloc => match data.ty.pointee() {
                        Some(pointee @ Type::Array(..)) => pointee.size() / 4,
                        _ => 1,
                    },
                    _ => 1,
                };
            }
        }
    }

    let words = slot_words + spill_words + save_ra as usize;
    FrameLayout {
        size: round_up_16(words * 4) as i32,
        first_slot: (spill_words * 4) as i32,
        save_ra,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::parse_program;

    #[test]
    fn rounding() {
        assert_eq!(round_up_16(0), 0);
        assert_eq!(round_up_16(4), 16);
        assert_eq!(round_up_16(16), 16);
        assert_eq!(round_up_16(17), 32);
    }

    #[test]
    fn leaf_function_counts_value_slots_only() {
        let program = parse_program(
            "fun @main(): i32 {\n%entry_0:\n\t%0 = add 0, 1\n\t%1 = add %0, %0\n\tret %1\n}\n",
        )
        .unwrap();
        let frame = plan_frame(&program, &program.funcs[0]);
        // Two value slots, no calls: 8 bytes rounds to 16.
        assert_eq!(frame.size, 16);
        assert_eq!(frame.first_slot, 0);
        assert!(!frame.save_ra);
    }

    #[test]
    fn array_alloc_reserves_full_extent() {
        let program = parse_program(
            "fun @main(): i32 {\n%entry_0:\n\t@a_0 = alloc [[i32, 3], 2]\n\tret 0\n}\n",
        )
        .unwrap();
        let frame = plan_frame(&program, &program.funcs[0]);
        // Six array words: 24 bytes rounds to 32.
        assert_eq!(frame.size, 32);
    }

    #[test]
    fn call_reserves_ra_word() {
        let program = parse_program(
            "decl @getint(): i32\n\nfun @main(): i32 {\n%entry_0:\n\t%0 = call @getint()\n\tret %0\n}\n",
        )
        .unwrap();
        let frame = plan_frame(&program, &program.funcs[1]);
        // One call slot plus the ra word: 8 bytes rounds to 16.
        assert_eq!(frame.size, 16);
        assert!(frame.save_ra);
        assert_eq!(frame.ra_offset(), 12);
    }

    #[test]
    fn nine_argument_call_reserves_spill_area() {
        let program = parse_program(
            "decl @sink(i32, i32, i32, i32, i32, i32, i32, i32, i32)\n\nfun @main(): i32 {\n%entry_0:\n\t%0 = add 0, 1\n\tcall @sink(%0, %0, %0, %0, %0, %0, %0, %0, %0)\n\tret 0\n}\n",
        )
        .unwrap();
        let frame = plan_frame(&program, &program.funcs[1]);
        // One value slot + one spill word + ra = 12 bytes → 16; the first
        // instruction slot sits above the spill area.
        assert_eq!(frame.size, 16);
        assert_eq!(frame.first_slot, 4);
        assert!(frame.save_ra);
    }

    #[test]
    fn pointer_alloc_is_one_word() {
        let program = parse_program(
            "fun @f(@param_a_0: *[i32, 5]) {\n%entry_0:\n\t@a_0 = alloc *[i32, 5]\n\tstore @param_a_0, @a_0\n\tret\n}\n",
        )
        .unwrap();
        let frame = plan_frame(&program, &program.funcs[0]);
        // A pointer slot is a single word regardless of the pointee array.
        assert_eq!(frame.size, 16);
    }
}
