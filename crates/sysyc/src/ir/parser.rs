//! Parser for the textual Koopa IR surface.
//!
//! Re-materializes IR text as the typed value graph of [`crate::ir::types`].
//! Types are computed while parsing: `alloc T` produces `*T`, `load` strips a
//! pointer level, `getelemptr` steps from `*[T, N]` to `*T` (and keeps `*i32`
//! flat), `getptr` preserves the pointer type, binaries are `i32`, calls take
//! the callee's declared return type.
//!
//! The parser also enforces the structural rules the code generator relies
//! on: instructions appear only inside labeled blocks, every block ends in
//! exactly one terminator, and nothing follows a terminator within a block.

use super::types::*;
use anyhow::{anyhow, bail, Context, Result};
use std::collections::HashMap;

/// Parse a complete IR program.
pub fn parse_program(text: &str) -> Result<Program> {
    let lines: Vec<&str> = text.lines().collect();
    let mut parser = IrParser {
        program: Program::new(),
        func_ids: HashMap::new(),
        globals: HashMap::new(),
    };

    // First pass: collect every function signature (declarations and
    // definitions) so calls resolve regardless of ordering.
    for line in &lines {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("decl ") {
            parser.register_function(rest)?;
        } else if let Some(rest) = line.strip_prefix("fun ") {
            parser.register_function(rest.trim_end_matches('{').trim_end())?;
        }
    }

    // Second pass: globals and function bodies.
    let mut i = 0;
    while i < lines.len() {
        let line = lines[i].trim();
        if line.is_empty() || line.starts_with("decl ") {
            i += 1;
        } else if let Some(rest) = line.strip_prefix("global ") {
            parser
                .parse_global(rest)
                .with_context(|| format!("in global on line {}", i + 1))?;
            i += 1;
        } else if let Some(rest) = line.strip_prefix("fun ") {
            i = parser
                .parse_function(rest, &lines, i)
                .with_context(|| format!("in function starting on line {}", i + 1))?;
        } else {
            bail!("unexpected top-level line {}: '{}'", i + 1, line);
        }
    }

    Ok(parser.program)
}

struct IrParser {
    program: Program,
    func_ids: HashMap<String, FuncId>,
    globals: HashMap<String, Value>,
}

impl IrParser {
    /// Register a function from its header (everything after `decl `/`fun `,
    /// without the trailing `{`).
    fn register_function(&mut self, header: &str) -> Result<()> {
        let open = header
            .find('(')
            .ok_or_else(|| anyhow!("malformed function header '{}'", header))?;
        let close = header
            .rfind(')')
            .ok_or_else(|| anyhow!("malformed function header '{}'", header))?;
        let name = header[..open]
            .trim()
            .strip_prefix('@')
            .ok_or_else(|| anyhow!("function name must start with '@' in '{}'", header))?
            .to_string();
        let ret = match header[close + 1..].trim().strip_prefix(':') {
            Some(ty) => parse_type(ty.trim())?,
            None => Type::Unit,
        };
        if self.func_ids.contains_key(&name) {
            bail!("function '@{}' defined twice", name);
        }
        let id = FuncId(self.program.funcs.len());
        self.program.funcs.push(Function {
            name: name.clone(),
            params: Vec::new(),
            ret,
            bbs: Vec::new(),
        });
        self.func_ids.insert(name, id);
        Ok(())
    }

    /// `@name = alloc TYPE, INIT` (the `global ` prefix is already stripped).
    fn parse_global(&mut self, rest: &str) -> Result<()> {
        let (name, def) = rest
            .split_once(" = alloc ")
            .ok_or_else(|| anyhow!("malformed global '{}'", rest))?;
        let name = name.trim();
        if !name.starts_with('@') {
            bail!("global name must start with '@', got '{}'", name);
        }
        let (ty_text, init_text) = split_alloc_def(def)?;
        let ty = parse_type(ty_text)?;
        let init = self.parse_init(init_text.trim(), &ty)?;
        let value = self.program.add_value(ValueData {
            name: Some(name[1..].to_string()),
            ty: Type::pointer_to(ty),
            kind: ValueKind::GlobalAlloc { init },
        });
        self.program.globals.push(value);
        self.globals.insert(name.to_string(), value);
        Ok(())
    }

    fn parse_init(&mut self, text: &str, ty: &Type) -> Result<Value> {
        if text == "zeroinit" {
            return Ok(self.program.add_value(ValueData {
                name: None,
                ty: ty.clone(),
                kind: ValueKind::ZeroInit,
            }));
        }
        if let Some(inner) = text.strip_prefix('{') {
            let inner = inner
                .strip_suffix('}')
                .ok_or_else(|| anyhow!("unbalanced braces in initializer '{}'", text))?;
            let (elem_ty, len) = match ty {
                Type::Array(base, len) => (base.as_ref(), *len),
                _ => bail!("aggregate initializer for non-array type {}", ty),
            };
            let parts = split_top_level(inner);
            if parts.len() != len {
                bail!(
                    "aggregate has {} elements but type {} expects {}",
                    parts.len(),
                    ty,
                    len
                );
            }
            let elems = parts
                .iter()
                .map(|part| self.parse_init(part.trim(), elem_ty))
                .collect::<Result<Vec<_>>>()?;
            return Ok(self.program.add_value(ValueData {
                name: None,
                ty: ty.clone(),
                kind: ValueKind::Aggregate { elems },
            }));
        }
        let n: i32 = text
            .parse()
            .map_err(|_| anyhow!("malformed initializer '{}'", text))?;
        Ok(self.program.add_value(ValueData {
            name: None,
            ty: Type::I32,
            kind: ValueKind::Integer(n),
        }))
    }

    /// Parse one function definition starting at `lines[start]`; returns the
    /// index of the first line after the closing `}`.
    fn parse_function(&mut self, header: &str, lines: &[&str], start: usize) -> Result<usize> {
        let header = header.trim_end_matches('{').trim_end();
        let open = header
            .find('(')
            .ok_or_else(|| anyhow!("malformed function header '{}'", header))?;
        let close = header
            .rfind(')')
            .ok_or_else(|| anyhow!("malformed function header '{}'", header))?;
        let name = header[..open].trim().trim_start_matches('@');
        let id = self.func_ids[name];

        // Named values (params, allocs, temporaries), keyed by full token.
        let mut locals: HashMap<String, Value> = HashMap::new();

        // Formal parameters.
        let params_text = &header[open + 1..close];
        let mut params = Vec::new();
        if !params_text.trim().is_empty() {
            for (index, part) in split_top_level(params_text).iter().enumerate() {
                let (pname, pty) = part
                    .split_once(':')
                    .ok_or_else(|| anyhow!("malformed parameter '{}'", part))?;
                let pname = pname.trim();
                let ty = parse_type(pty.trim())?;
                let value = self.program.add_value(ValueData {
                    name: Some(pname.trim_start_matches('@').to_string()),
                    ty,
                    kind: ValueKind::FuncArgRef { index },
                });
                locals.insert(pname.to_string(), value);
                params.push(value);
            }
        }
        self.program.funcs[id.0].params = params;

        // Collect the block labels of the body, in textual order.
        let mut block_ids: HashMap<String, BlockId> = HashMap::new();
        let mut bbs = Vec::new();
        let mut end = None;
        for (j, raw) in lines.iter().enumerate().skip(start + 1) {
            let line = raw.trim();
            if line == "}" {
                end = Some(j);
                break;
            }
            if let Some(label) = block_label(line) {
                if block_ids.contains_key(label) {
                    bail!("duplicate block label '%{}'", label);
                }
                block_ids.insert(label.to_string(), BlockId(bbs.len()));
                bbs.push(BasicBlock {
                    name: label.to_string(),
                    insts: Vec::new(),
                });
            }
        }
        let end = end.ok_or_else(|| anyhow!("function '@{}' has no closing '}}'", name))?;

        // Parse instructions into their blocks.
        let mut current: Option<BlockId> = None;
        for raw in &lines[start + 1..end] {
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }
            if let Some(label) = block_label(line) {
                if let Some(prev) = current {
                    self.check_block_sealed(&bbs[prev.0])?;
                }
                current = Some(block_ids[label]);
                continue;
            }
            let bb = match current {
                Some(bb) => bb,
                None => bail!("instruction outside a block: '{}'", line),
            };
            if let Some(last) = bbs[bb.0].insts.last() {
                if self.program.value(*last).kind.is_terminator() {
                    bail!(
                        "instruction after terminator in block '%{}': '{}'",
                        bbs[bb.0].name,
                        line
                    );
                }
            }
            let inst = self
                .parse_instruction(line, &mut locals, &block_ids)
                .with_context(|| format!("in instruction '{}'", line))?;
            bbs[bb.0].insts.push(inst);
        }
        if let Some(prev) = current {
            self.check_block_sealed(&bbs[prev.0])?;
        }

        self.program.funcs[id.0].bbs = bbs;
        Ok(end + 1)
    }

    fn check_block_sealed(&self, bb: &BasicBlock) -> Result<()> {
        match bb.insts.last() {
            Some(last) if self.program.value(*last).kind.is_terminator() => Ok(()),
            _ => bail!("block '%{}' does not end in a terminator", bb.name),
        }
    }

    fn parse_instruction(
        &mut self,
        line: &str,
        locals: &mut HashMap<String, Value>,
        blocks: &HashMap<String, BlockId>,
    ) -> Result<Value> {
        // Value-producing form: `NAME = op …`.
        if (line.starts_with('%') || line.starts_with('@')) && line.contains(" = ") {
            let (lhs, rhs) = line.split_once(" = ").unwrap();
            let value = self.parse_value_inst(rhs.trim(), locals)?;
            // Named allocs keep their textual name; temporaries stay None.
            if let Some(name) = lhs.strip_prefix('@') {
                self.program.set_value_name(value, name.to_string());
            }
            locals.insert(lhs.to_string(), value);
            return Ok(value);
        }

        // Statement forms.
        let (op, rest) = match line.split_once(' ') {
            Some((op, rest)) => (op, rest.trim()),
            None => (line, ""),
        };
        match op {
            "ret" => {
                let value = if rest.is_empty() {
                    None
                } else {
                    Some(self.operand(rest, locals)?)
                };
                Ok(self.program.add_value(ValueData {
                    name: None,
                    ty: Type::Unit,
                    kind: ValueKind::Return { value },
                }))
            }
            "jump" => {
                let target = lookup_block(blocks, rest)?;
                Ok(self.program.add_value(ValueData {
                    name: None,
                    ty: Type::Unit,
                    kind: ValueKind::Jump { target },
                }))
            }
            "br" => {
                let parts = split_top_level(rest);
                if parts.len() != 3 {
                    bail!("br expects condition and two targets");
                }
                let cond = self.operand(parts[0].trim(), locals)?;
                let true_bb = lookup_block(blocks, parts[1].trim())?;
                let false_bb = lookup_block(blocks, parts[2].trim())?;
                Ok(self.program.add_value(ValueData {
                    name: None,
                    ty: Type::Unit,
                    kind: ValueKind::Branch {
                        cond,
                        true_bb,
                        false_bb,
                    },
                }))
            }
            "store" => {
                let parts = split_top_level(rest);
                if parts.len() != 2 {
                    bail!("store expects a value and an address");
                }
                let value = self.operand(parts[0].trim(), locals)?;
                let dest = self.operand(parts[1].trim(), locals)?;
                if self.program.value(dest).ty.pointee().is_none() {
                    bail!("store destination is not a pointer");
                }
                Ok(self.program.add_value(ValueData {
                    name: None,
                    ty: Type::Unit,
                    kind: ValueKind::Store { value, dest },
                }))
            }
            "call" => {
                let (callee, args) = self.parse_call(rest, locals)?;
                Ok(self.program.add_value(ValueData {
                    name: None,
                    ty: Type::Unit,
                    kind: ValueKind::Call { callee, args },
                }))
            }
            _ => bail!("unknown instruction '{}'", line),
        }
    }

    /// The right-hand side of a `NAME = …` instruction.
    fn parse_value_inst(&mut self, rhs: &str, locals: &HashMap<String, Value>) -> Result<Value> {
        let (op, rest) = rhs
            .split_once(' ')
            .ok_or_else(|| anyhow!("malformed instruction '{}'", rhs))?;
        let rest = rest.trim();
        match op {
            "alloc" => {
                let ty = parse_type(rest)?;
                Ok(self.program.add_value(ValueData {
                    name: None,
                    ty: Type::pointer_to(ty),
                    kind: ValueKind::Alloc,
                }))
            }
            "load" => {
                let src = self.operand(rest, locals)?;
                let ty = self
                    .program
                    .value(src)
                    .ty
                    .pointee()
                    .cloned()
                    .ok_or_else(|| anyhow!("load source is not a pointer"))?;
                Ok(self.program.add_value(ValueData {
                    name: None,
                    ty,
                    kind: ValueKind::Load { src },
                }))
            }
            "getelemptr" | "getptr" => {
                let parts = split_top_level(rest);
                if parts.len() != 2 {
                    bail!("{} expects a base and an index", op);
                }
                let src = self.operand(parts[0].trim(), locals)?;
                let index = self.operand(parts[1].trim(), locals)?;
                let src_ty = &self.program.value(src).ty;
                let base = src_ty
                    .pointee()
                    .ok_or_else(|| anyhow!("{} source is not a pointer", op))?;
                let ty = if op == "getptr" {
                    src_ty.clone()
                } else {
                    match base {
                        Type::Array(elem, _) => Type::pointer_to(elem.as_ref().clone()),
                        Type::I32 => Type::pointer_to(Type::I32),
                        other => bail!("getelemptr through unsupported pointee {}", other),
                    }
                };
                let kind = if op == "getptr" {
                    ValueKind::GetPtr { src, index }
                } else {
                    ValueKind::GetElemPtr { src, index }
                };
                Ok(self.program.add_value(ValueData {
                    name: None,
                    ty,
                    kind,
                }))
            }
            "call" => {
                let (callee, args) = self.parse_call(rest, locals)?;
                let ret = self.program.func(callee).ret.clone();
                if ret.is_unit() {
                    bail!("void call cannot produce a value");
                }
                Ok(self.program.add_value(ValueData {
                    name: None,
                    ty: ret,
                    kind: ValueKind::Call { callee, args },
                }))
            }
            mnemonic => {
                let op = BinaryOp::from_mnemonic(mnemonic)
                    .ok_or_else(|| anyhow!("unknown instruction '{}'", rhs))?;
                let parts = split_top_level(rest);
                if parts.len() != 2 {
                    bail!("binary op expects two operands");
                }
                let lhs = self.operand(parts[0].trim(), locals)?;
                let rhs = self.operand(parts[1].trim(), locals)?;
                Ok(self.program.add_value(ValueData {
                    name: None,
                    ty: Type::I32,
                    kind: ValueKind::Binary { op, lhs, rhs },
                }))
            }
        }
    }

    /// `@name(arg, …)` after the `call ` keyword.
    fn parse_call(
        &mut self,
        text: &str,
        locals: &HashMap<String, Value>,
    ) -> Result<(FuncId, Vec<Value>)> {
        let open = text
            .find('(')
            .ok_or_else(|| anyhow!("malformed call '{}'", text))?;
        let close = text
            .rfind(')')
            .ok_or_else(|| anyhow!("malformed call '{}'", text))?;
        let name = text[..open].trim().trim_start_matches('@');
        let callee = *self
            .func_ids
            .get(name)
            .ok_or_else(|| anyhow!("call to unknown function '@{}'", name))?;
        let args_text = text[open + 1..close].trim();
        let args = if args_text.is_empty() {
            Vec::new()
        } else {
            split_top_level(args_text)
                .iter()
                .map(|part| self.operand(part.trim(), locals))
                .collect::<Result<Vec<_>>>()?
        };
        Ok((callee, args))
    }

    /// Resolve an operand token: a local name, a global name, or an integer
    /// literal (which materializes a fresh constant value).
    fn operand(&mut self, token: &str, locals: &HashMap<String, Value>) -> Result<Value> {
        if token.starts_with('%') || token.starts_with('@') {
            if let Some(v) = locals.get(token) {
                return Ok(*v);
            }
            if let Some(v) = self.globals.get(token) {
                return Ok(*v);
            }
            bail!("reference to undefined value '{}'", token);
        }
        let n: i32 = token
            .parse()
            .map_err(|_| anyhow!("malformed operand '{}'", token))?;
        Ok(self.program.add_value(ValueData {
            name: None,
            ty: Type::I32,
            kind: ValueKind::Integer(n),
        }))
    }
}

/// A line of the form `%label:`.
fn block_label(line: &str) -> Option<&str> {
    let body = line.strip_prefix('%')?.strip_suffix(':')?;
    if body.is_empty() || body.contains(' ') {
        return None;
    }
    Some(body)
}

fn lookup_block(blocks: &HashMap<String, BlockId>, token: &str) -> Result<BlockId> {
    let name = token
        .strip_prefix('%')
        .ok_or_else(|| anyhow!("block reference must start with '%', got '{}'", token))?;
    blocks
        .get(name)
        .copied()
        .ok_or_else(|| anyhow!("reference to undefined block '%{}'", name))
}

/// Split `TYPE, INIT` of an alloc definition at the top-level comma.
fn split_alloc_def(def: &str) -> Result<(&str, &str)> {
    let parts = split_top_level(def);
    if parts.len() != 2 {
        bail!("global alloc expects a type and an initializer: '{}'", def);
    }
    Ok((parts[0].trim(), parts[1].trim()))
}

/// Split on commas that are not nested inside brackets or braces.
fn split_top_level(s: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    for (i, c) in s.char_indices() {
        match c {
            '[' | '{' | '(' => depth += 1,
            ']' | '}' | ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&s[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if start < s.len() || !parts.is_empty() {
        parts.push(&s[start..]);
    } else if !s.is_empty() {
        parts.push(s);
    }
    parts
}

/// Parse an IR type: `i32`, `*T`, `[T, N]`.
fn parse_type(s: &str) -> Result<Type> {
    let s = s.trim();
    if s == "i32" {
        return Ok(Type::I32);
    }
    if let Some(rest) = s.strip_prefix('*') {
        return Ok(Type::pointer_to(parse_type(rest)?));
    }
    if let Some(inner) = s.strip_prefix('[') {
        let inner = inner
            .strip_suffix(']')
            .ok_or_else(|| anyhow!("unbalanced brackets in type '{}'", s))?;
        let parts = split_top_level(inner);
        if parts.len() != 2 {
            bail!("array type expects a base and a length: '{}'", s);
        }
        let base = parse_type(parts[0].trim())?;
        let len: usize = parts[1]
            .trim()
            .parse()
            .map_err(|_| anyhow!("malformed array length in '{}'", s))?;
        return Ok(Type::Array(Box::new(base), len));
    }
    bail!("malformed type '{}'", s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_types() {
        assert_eq!(parse_type("i32").unwrap(), Type::I32);
        assert_eq!(
            parse_type("*i32").unwrap(),
            Type::pointer_to(Type::I32)
        );
        assert_eq!(
            parse_type("[[i32, 3], 2]").unwrap(),
            Type::Array(Box::new(Type::Array(Box::new(Type::I32), 3)), 2)
        );
        assert!(parse_type("f64").is_err());
    }

    #[test]
    fn split_respects_nesting() {
        assert_eq!(split_top_level("a, b"), vec!["a", " b"]);
        assert_eq!(
            split_top_level("[i32, 3], 2"),
            vec!["[i32, 3]", " 2"]
        );
        assert_eq!(
            split_top_level("{1, {2, 3}}, {4}"),
            vec!["{1, {2, 3}}", " {4}"]
        );
    }

    #[test]
    fn parse_minimal_function() {
        let program = parse_program(
            "fun @main(): i32 {\n%entry_0:\n\t%0 = add 0, 42\n\tret %0\n}\n",
        )
        .unwrap();
        assert_eq!(program.funcs.len(), 1);
        let main = &program.funcs[0];
        assert_eq!(main.name, "main");
        assert_eq!(main.ret, Type::I32);
        assert_eq!(main.bbs.len(), 1);
        assert_eq!(main.bbs[0].name, "entry_0");
        assert_eq!(main.bbs[0].insts.len(), 2);
        match &program.value(main.bbs[0].insts[0]).kind {
            ValueKind::Binary { op, .. } => assert_eq!(*op, BinaryOp::Add),
            other => panic!("expected binary, got {:?}", other),
        }
    }

    #[test]
    fn declarations_have_no_blocks() {
        let program = parse_program(
            "decl @getint(): i32\ndecl @putint(i32)\n\nfun @main(): i32 {\n%entry_0:\n\t%0 = call @getint()\n\tret %0\n}\n",
        )
        .unwrap();
        assert_eq!(program.funcs.len(), 3);
        assert!(program.funcs[0].is_decl());
        assert!(program.funcs[1].is_decl());
        assert_eq!(program.funcs[1].ret, Type::Unit);
        let main = &program.funcs[2];
        match &program.value(main.bbs[0].insts[0]).kind {
            ValueKind::Call { callee, args } => {
                assert_eq!(program.func(*callee).name, "getint");
                assert!(args.is_empty());
            }
            other => panic!("expected call, got {:?}", other),
        }
    }

    #[test]
    fn alloc_load_store_typing() {
        let program = parse_program(
            "fun @main(): i32 {\n%entry_0:\n\t@x_0 = alloc i32\n\tstore 5, @x_0\n\t%0 = load @x_0\n\tret %0\n}\n",
        )
        .unwrap();
        let main = &program.funcs[0];
        let alloc = main.bbs[0].insts[0];
        assert_eq!(program.value(alloc).ty, Type::pointer_to(Type::I32));
        assert_eq!(program.value(alloc).name.as_deref(), Some("x_0"));
        let load = main.bbs[0].insts[2];
        assert_eq!(program.value(load).ty, Type::I32);
    }

    #[test]
    fn getelemptr_typing_steps_into_arrays() {
        let program = parse_program(
            "global @a = alloc [[i32, 3], 2], zeroinit\n\nfun @main(): i32 {\n%entry_0:\n\t%0 = getelemptr @a, 1\n\t%1 = getelemptr %0, 2\n\t%2 = load %1\n\tret %2\n}\n",
        )
        .unwrap();
        let main = &program.funcs[0];
        let row = program.value(main.bbs[0].insts[0]);
        assert_eq!(
            row.ty,
            Type::pointer_to(Type::Array(Box::new(Type::I32), 3))
        );
        let elem = program.value(main.bbs[0].insts[1]);
        assert_eq!(elem.ty, Type::pointer_to(Type::I32));
    }

    #[test]
    fn getptr_preserves_pointer_type() {
        let program = parse_program(
            "fun @f(@param_a_0: *[i32, 3]): i32 {\n%entry_0:\n\t@a_0 = alloc *[i32, 3]\n\tstore @param_a_0, @a_0\n\t%0 = load @a_0\n\t%1 = getptr %0, 1\n\t%2 = getelemptr %1, 2\n\t%3 = load %2\n\tret %3\n}\n",
        )
        .unwrap();
        let f = &program.funcs[0];
        let getptr = program.value(f.bbs[0].insts[3]);
        assert_eq!(
            getptr.ty,
            Type::pointer_to(Type::Array(Box::new(Type::I32), 3))
        );
        let gep = program.value(f.bbs[0].insts[4]);
        assert_eq!(gep.ty, Type::pointer_to(Type::I32));
    }

    #[test]
    fn func_arg_refs_carry_index_and_type() {
        let program = parse_program(
            "fun @f(@param_x_0: i32, @param_a_0: *i32) {\n%entry_0:\n\tret\n}\n",
        )
        .unwrap();
        let f = &program.funcs[0];
        assert_eq!(f.params.len(), 2);
        match &program.value(f.params[1]).kind {
            ValueKind::FuncArgRef { index } => assert_eq!(*index, 1),
            other => panic!("expected func_arg_ref, got {:?}", other),
        }
        assert_eq!(program.value(f.params[1]).ty, Type::pointer_to(Type::I32));
    }

    #[test]
    fn global_aggregate_structure() {
        let program = parse_program(
            "global @a = alloc [[i32, 3], 2], {{1, 2, 3}, {4, 5, 6}}\n",
        )
        .unwrap();
        assert_eq!(program.globals.len(), 1);
        let g = program.value(program.globals[0]);
        assert_eq!(g.name.as_deref(), Some("a"));
        let ValueKind::GlobalAlloc { init } = &g.kind else {
            panic!("expected global alloc");
        };
        let ValueKind::Aggregate { elems } = &program.value(*init).kind else {
            panic!("expected aggregate initializer");
        };
        assert_eq!(elems.len(), 2);
        let ValueKind::Aggregate { elems: row } = &program.value(elems[1]).kind else {
            panic!("expected nested aggregate");
        };
        assert!(matches!(
            program.value(row[2]).kind,
            ValueKind::Integer(6)
        ));
    }

    #[test]
    fn rejects_instruction_after_terminator() {
        let err = parse_program(
            "fun @main(): i32 {\n%entry_0:\n\tret 0\n\t%0 = add 0, 1\n}\n",
        );
        assert!(err.is_err());
    }

    #[test]
    fn rejects_unterminated_block() {
        let err = parse_program(
            "fun @main(): i32 {\n%entry_0:\n\t%0 = add 0, 1\n%next_0:\n\tret %0\n}\n",
        );
        assert!(err.is_err());
    }

    #[test]
    fn rejects_undefined_value_reference() {
        let err = parse_program("fun @main(): i32 {\n%entry_0:\n\tret %9\n}\n");
        assert!(err.is_err());
    }

    #[test]
    fn branch_targets_resolve_forward() {
        let program = parse_program(
            "fun @main(): i32 {\n%entry_0:\n\t%0 = add 0, 1\n\tbr %0, %then_0, %end_0\n%then_0:\n\tjump %end_0\n%end_0:\n\tret 0\n}\n",
        )
        .unwrap();
        let main = &program.funcs[0];
        assert_eq!(main.bbs.len(), 3);
        match &program.value(main.bbs[0].insts[1]).kind {
            ValueKind::Branch {
                true_bb, false_bb, ..
            } => {
                assert_eq!(*true_bb, BlockId(1));
                assert_eq!(*false_bb, BlockId(2));
            }
            other => panic!("expected branch, got {:?}", other),
        }
    }
}
