//! Short-circuit lowering of `&&` and `||`.

use sysyc_tests::{assert_compiles_clean, assert_terminator_discipline, blocks, koopa};

#[test]
fn logical_and_shape() {
    let ir = koopa("int f(int x, int y) { return x && y; }\nint main() { return 0; }");
    // Result slot, normalized left operand, branch into the rhs block.
    assert!(ir.contains("@result_0 = alloc i32"));
    assert!(ir.contains("%1 = ne %0, 0"));
    assert!(ir.contains("store %1, @result_0"));
    assert!(ir.contains("br %1, %logic_then_0, %logic_end_0"));
    // The rhs block normalizes y and stores it.
    let then = blocks(&ir)
        .into_iter()
        .find(|(l, _)| l == "%logic_then_0")
        .expect("rhs block");
    assert!(then.1.iter().any(|i| i.contains("ne %")));
    assert!(then.1.iter().any(|i| i.contains("store %")));
    assert_eq!(then.1.last().unwrap(), "jump %logic_end_0");
    // The join block loads the result.
    assert!(ir.contains("load @result_0"));
    assert_terminator_discipline(&ir);
}

#[test]
fn logical_or_swaps_branch_targets() {
    let ir = koopa("int f(int x, int y) { return x || y; }\nint main() { return 0; }");
    assert!(ir.contains("br %1, %logic_end_0, %logic_then_0"));
    assert_terminator_discipline(&ir);
}

#[test]
fn chained_logic_uses_distinct_slots() {
    let ir = koopa("int f(int a, int b, int c) { return a && b || c; }\nint main() { return 0; }");
    assert!(ir.contains("@result_0"));
    assert!(ir.contains("@result_1"));
    assert_terminator_discipline(&ir);
}

#[test]
fn condition_contexts_use_short_circuit_too() {
    let ir = koopa(
        "int main() { int x = 1; int y = 2; if (x && y) return 1; return 0; }",
    );
    assert!(ir.contains("%logic_then_0:"));
    assert!(ir.contains("%logic_end_0:"));
    assert!(ir.contains("%then_0:"));
    assert_terminator_discipline(&ir);
}

#[test]
fn short_circuit_programs_compile_clean() {
    assert_compiles_clean(
        "int main() {
           int a = 0; int b = 5;
           if (a && 1 / a) return 1;
           if (b || a) return 2;
           return 3;
         }",
    );
}
