//! Arrays: globals with aggregate initializers, local elaboration, indexing,
//! and parameter decay.

use sysyc_tests::{assert_compiles_clean, assert_terminator_discipline, koopa, riscv};

#[test]
fn global_matrix_with_chained_indexing() {
    let ir = koopa("int a[2][3] = {{1, 2, 3}, {4, 5, 6}}; int main() { return a[1][2]; }");
    assert!(ir.contains("global @a = alloc [[i32, 3], 2], {{1, 2, 3}, {4, 5, 6}}"));
    // Two chained getelemptrs and a load.
    assert!(ir.contains("%1 = getelemptr @a, %0"));
    assert!(ir.contains("%3 = getelemptr %1, %2"));
    assert!(ir.contains("%4 = load %3"));
    assert!(ir.contains("\tret %4"));
    assert_terminator_discipline(&ir);
}

#[test]
fn global_partial_initializer_zero_fills() {
    let ir = koopa("int a[3][4] = {{1}, {2, 3}}; int main() { return 0; }");
    assert!(ir.contains(
        "global @a = alloc [[i32, 4], 3], {{1, 0, 0, 0}, {2, 3, 0, 0}, {0, 0, 0, 0}}"
    ));
}

#[test]
fn flat_initializer_respects_row_boundaries() {
    let ir = koopa("int a[2][2] = {1, 2, {3}}; int main() { return 0; }");
    assert!(ir.contains("global @a = alloc [[i32, 2], 2], {{1, 2}, {3, 0}}"));
}

#[test]
fn local_array_initializer_stores_elementwise() {
    let ir = koopa("int main() { int a[2][2] = {{1, 2}, {3, 4}}; return a[1][1]; }");
    assert!(ir.contains("@a_0 = alloc [[i32, 2], 2]"));
    // Element stores address through literal-index gep chains.
    assert!(ir.contains("getelemptr @a_0, 0"));
    assert!(ir.contains("getelemptr @a_0, 1"));
    assert!(ir.contains("store %0, %"));
    assert_terminator_discipline(&ir);
}

#[test]
fn misaligned_nested_initializer_is_fatal() {
    assert!(sysyc::emit_koopa("int a[2][3] = {1, {2}}; int main() { return 0; }").is_err());
    assert!(sysyc::emit_koopa("int a[2] = {1, 2, 3}; int main() { return 0; }").is_err());
}

#[test]
fn bare_array_argument_decays_to_base_pointer() {
    let ir = koopa("int main() { int a[4]; return getarray(a); }");
    assert!(ir.contains("= getelemptr @a_0, 0"));
    assert!(ir.contains("call @getarray(%"));
}

#[test]
fn one_dim_parameter_indexing_uses_getptr() {
    let ir = koopa(
        "int sum(int a[], int n) {
           int s = 0; int i = 0;
           while (i < n) { s = s + a[i]; i = i + 1; }
           return s;
         }
         int main() { int a[3] = {1, 2, 3}; return sum(a, 3); }",
    );
    assert!(ir.contains("fun @sum(@param_a_0: *i32, @param_n_0: i32): i32"));
    assert!(ir.contains("@a_0 = alloc *i32"));
    assert!(ir.contains("store @param_a_0, @a_0"));
    // a[i] loads the pointer then steps with getptr.
    assert!(ir.contains("= load @a_0"));
    assert!(ir.contains("= getptr %"));
    assert_terminator_discipline(&ir);
}

#[test]
fn matrix_parameter_mixes_getptr_and_getelemptr() {
    let ir = koopa(
        "int at(int m[][3], int i, int j) { return m[i][j]; }
         int main() { int m[2][3]; return at(m, 1, 2); }",
    );
    assert!(ir.contains("fun @at(@param_m_0: *[i32, 3], @param_i_0: i32, @param_j_0: i32): i32"));
    // First step through the pointer, second into the row.
    assert!(ir.contains("= getptr %"));
    assert!(ir.contains("= getelemptr %"));
    // Passing the bare matrix decays to *[i32, 3].
    assert!(ir.contains("= getelemptr @m_1, 0"));
    assert_terminator_discipline(&ir);
}

#[test]
fn partial_indexing_in_argument_position_decays() {
    let ir = koopa(
        "int sum(int a[], int n) { return a[0] + n; }
         int main() { int m[2][3]; return sum(m[1], 3); }",
    );
    // m[1] computes a row address and then decays it with a zero gep.
    assert!(ir.contains("= getelemptr @m_1, %"));
    let decays = ir
        .lines()
        .filter(|l| l.trim_start().contains("= getelemptr %") && l.trim_end().ends_with(", 0"))
        .count();
    assert!(decays >= 1, "row argument must decay via getelemptr …, 0");
    assert_terminator_discipline(&ir);
}

#[test]
fn array_assignment_recomputes_address() {
    let ir = koopa("int main() { int a[2]; a[1] = 7; return a[1]; }");
    // One gep chain for the store, a separate one for the load.
    let geps = ir.matches("getelemptr @a_0").count();
    assert_eq!(geps, 2);
    // value %0, index %1, address %2
    assert!(ir.contains("store %0, %2"));
    assert_terminator_discipline(&ir);
}

#[test]
fn riscv_global_indexing_scales_rows() {
    let asm = riscv("int a[2][3] = {{1, 2, 3}, {4, 5, 6}}; int main() { return a[1][2]; }");
    assert!(asm.contains("\t.data\n"));
    assert!(asm.contains("\t.globl a\na:\n"));
    assert!(asm.contains("\tla t6, a\n"));
    assert!(asm.contains("\tli t2, 12\n"), "row step is 12 bytes");
    assert!(asm.contains("\tli t2, 4\n"), "element step is 4 bytes");
}

#[test]
fn array_programs_compile_clean() {
    assert_compiles_clean(
        "int fill(int a[], int n) {
           int i = 0;
           while (i < n) { a[i] = i * i; i = i + 1; }
           return 0;
         }
         int main() {
           int a[10];
           fill(a, 10);
           putarray(10, a);
           return a[9];
         }",
    );
    assert_compiles_clean(
        "const int w[2][2] = {{1, 2}, {3, 4}};
         int main() { return w[1][0]; }",
    );
}
