use anyhow::{Context, Result};
use clap::Parser;
use std::fs;
use std::path::PathBuf;

/// sysyc — SysY to RISC-V compiler via a textual Koopa IR.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Output mode: -koopa emits IR text, -riscv and -perf emit assembly
    #[arg(allow_hyphen_values = true, value_parser = ["-koopa", "-riscv", "-perf"])]
    mode: String,

    /// Input SysY source file
    input: PathBuf,

    /// Output file
    #[arg(short)]
    output: PathBuf,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let source = fs::read_to_string(&cli.input)
        .with_context(|| format!("failed to read {}", cli.input.display()))?;

    // -perf is accepted for harness compatibility; no optimizer exists, so
    // it emits the same assembly as -riscv.
    let output = match cli.mode.as_str() {
        "-koopa" => sysyc::emit_koopa(&source),
        "-riscv" | "-perf" => sysyc::emit_riscv(&source),
        _ => unreachable!("mode is validated by clap"),
    }
    .context("compilation failed")?;

    fs::write(&cli.output, &output)
        .with_context(|| format!("failed to write {}", cli.output.display()))?;

    eprintln!(
        "sysyc: compiled {} ({} mode) -> {}",
        cli.input.display(),
        &cli.mode[1..],
        cli.output.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_spec_surface() {
        let cli = Cli::parse_from(["sysyc", "-koopa", "hello.c", "-o", "hello.koopa"]);
        assert_eq!(cli.mode, "-koopa");
        assert_eq!(cli.input, PathBuf::from("hello.c"));
        assert_eq!(cli.output, PathBuf::from("hello.koopa"));
    }

    #[test]
    fn cli_rejects_unknown_mode() {
        assert!(Cli::try_parse_from(["sysyc", "-wasm", "a.c", "-o", "a.s"]).is_err());
    }
}
