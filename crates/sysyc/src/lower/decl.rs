//! Declarations and array-initializer elaboration.
//!
//! Aggregate initializers fill a row-major flat buffer against the declared
//! shape. A nested aggregate must start on a dimension boundary: the largest
//! suffix of trailing dimensions whose element count divides the current
//! position becomes its subshape (at position zero, every dimension but the
//! outermost). Unfilled positions are zero.
//!
//! Locals elaborate to chained `getelemptr` plus one `store` per element;
//! globals fold every element and render the target's nested brace literal
//! (or `zeroinit` when nothing is non-zero).

use super::exp::eval_const;
use super::LoweringContext;
use crate::front::ast::{ConstDef, Decl, Exp, InitVal, VarDef};
use crate::front::symbol::{Symbol, SymbolTables};
use anyhow::{bail, Result};

/// One element of a flattened initializer.
enum FlatInit<'a> {
    Zero,
    Exp(&'a Exp),
}

/// Fold declared dimensions to their extents.
pub(super) fn fold_dimensions(symbols: &SymbolTables, dims: &[Exp]) -> Result<Vec<usize>> {
    dims.iter()
        .map(|dim| {
            let n = eval_const(symbols, dim)?;
            if n <= 0 {
                bail!("array dimension must be positive, got {}", n);
            }
            Ok(n as usize)
        })
        .collect()
}

/// Render an array type in the IR's bracket syntax, outermost first:
/// `[2, 3]` becomes `[[i32, 3], 2]`. An empty shape is plain `i32`.
pub(super) fn array_type(shape: &[usize]) -> String {
    let mut ty = "i32".to_string();
    for dim in shape.iter().rev() {
        ty = format!("[{}, {}]", ty, dim);
    }
    ty
}

impl LoweringContext {
    pub(super) fn lower_local_decl(&mut self, decl: &Decl) -> Result<()> {
        match decl {
            Decl::Const(decl) => {
                for def in &decl.defs {
                    self.lower_local_const_def(def)?;
                }
            }
            Decl::Var(decl) => {
                for def in &decl.defs {
                    self.lower_local_var_def(def)?;
                }
            }
        }
        Ok(())
    }

    pub(super) fn lower_global_decl(&mut self, decl: &Decl) -> Result<()> {
        debug_assert!(self.at_global_scope());
        match decl {
            Decl::Const(decl) => {
                for def in &decl.defs {
                    if def.dims.is_empty() {
                        let value = self.fold_scalar_init(&def.ident, &def.init)?;
                        self.symbols.insert_global(&def.ident, Symbol::Const(value));
                    } else {
                        self.lower_global_array(&def.ident, &def.dims, Some(&def.init))?;
                    }
                }
            }
            Decl::Var(decl) => {
                for def in &decl.defs {
                    if def.dims.is_empty() {
                        self.symbols.insert_global(&def.ident, Symbol::Var);
                        let init = match &def.init {
                            Some(InitVal::Exp(exp)) => {
                                eval_const(&self.symbols, exp)?.to_string()
                            }
                            Some(InitVal::List(_)) => {
                                bail!("scalar '{}' has an aggregate initializer", def.ident)
                            }
                            None => "zeroinit".to_string(),
                        };
                        self.out
                            .push_str(&format!("global @{} = alloc i32, {}\n", def.ident, init));
                    } else {
                        self.lower_global_array(&def.ident, &def.dims, def.init.as_ref())?;
                    }
                }
            }
        }
        Ok(())
    }

    fn fold_scalar_init(&self, ident: &str, init: &InitVal) -> Result<i32> {
        match init {
            InitVal::Exp(exp) => eval_const(&self.symbols, exp),
            InitVal::List(_) => bail!("scalar '{}' has an aggregate initializer", ident),
        }
    }

    fn lower_global_array(
        &mut self,
        ident: &str,
        dims: &[Exp],
        init: Option<&InitVal>,
    ) -> Result<()> {
        let shape = fold_dimensions(&self.symbols, dims)?;
        let init_text = match init {
            None => "zeroinit".to_string(),
            Some(init) => {
                let flat = flatten_init(init, &shape)?;
                let values = flat
                    .iter()
                    .map(|item| match item {
                        FlatInit::Zero => Ok(0),
                        FlatInit::Exp(exp) => eval_const(&self.symbols, exp),
                    })
                    .collect::<Result<Vec<i32>>>()?;
                if values.iter().all(|v| *v == 0) {
                    "zeroinit".to_string()
                } else {
                    render_aggregate(&values, &shape)
                }
            }
        };
        self.out.push_str(&format!(
            "global @{} = alloc {}, {}\n",
            ident,
            array_type(&shape),
            init_text
        ));
        self.symbols
            .insert_global(ident, Symbol::Array { rank: shape.len() });
        Ok(())
    }

    fn lower_local_const_def(&mut self, def: &ConstDef) -> Result<()> {
        if def.dims.is_empty() {
            let value = self.fold_scalar_init(&def.ident, &def.init)?;
            self.symbols.insert(&def.ident, Symbol::Const(value))?;
            return Ok(());
        }
        let shape = fold_dimensions(&self.symbols, &def.dims)?;
        let name = format!("@{}_{}", def.ident, self.symbols.current_scope_number()?);
        self.inst(format!("{} = alloc {}", name, array_type(&shape)));
        self.emit_local_array_init(&name, &shape, &def.init)?;
        self.symbols
            .insert(&def.ident, Symbol::Array { rank: shape.len() })?;
        Ok(())
    }

    fn lower_local_var_def(&mut self, def: &VarDef) -> Result<()> {
        if def.dims.is_empty() {
            let name = format!("@{}_{}", def.ident, self.symbols.current_scope_number()?);
            self.inst(format!("{} = alloc i32", name));
            match &def.init {
                Some(InitVal::Exp(exp)) => {
                    let value = self.lower_exp_value(exp)?;
                    self.inst(format!("store %{}, {}", value, name));
                }
                Some(InitVal::List(_)) => {
                    bail!("scalar '{}' has an aggregate initializer", def.ident)
                }
                None => {}
            }
            self.symbols.insert(&def.ident, Symbol::Var)?;
            return Ok(());
        }
        let shape = fold_dimensions(&self.symbols, &def.dims)?;
        let name = format!("@{}_{}", def.ident, self.symbols.current_scope_number()?);
        self.inst(format!("{} = alloc {}", name, array_type(&shape)));
        if let Some(init) = &def.init {
            self.emit_local_array_init(&name, &shape, init)?;
        }
        self.symbols
            .insert(&def.ident, Symbol::Array { rank: shape.len() })?;
        Ok(())
    }

    /// One `getelemptr` chain and one `store` per flat element, blanks
    /// included. Element indices are emitted as integer literals.
    fn emit_local_array_init(
        &mut self,
        name: &str,
        shape: &[usize],
        init: &InitVal,
    ) -> Result<()> {
        let flat = flatten_init(init, shape)?;
        for (position, item) in flat.iter().enumerate() {
            let value_text = match item {
                FlatInit::Zero => "0".to_string(),
                FlatInit::Exp(exp) => format!("%{}", self.lower_exp_value(exp)?),
            };
            let mut base: Option<usize> = None;
            let mut remainder = position;
            for axis in 0..shape.len() {
                let stride: usize = shape[axis + 1..].iter().product();
                let index = remainder / stride;
                remainder %= stride;
                let k = self.fresh_temp();
                match base {
                    None => self.inst(format!("%{} = getelemptr {}, {}", k, name, index)),
                    Some(b) => self.inst(format!("%{} = getelemptr %{}, {}", k, b, index)),
                }
                base = Some(k);
            }
            let addr = base.expect("array shape has at least one dimension");
            self.inst(format!("store {}, %{}", value_text, addr));
        }
        Ok(())
    }
}

/// Flatten an initializer against `shape`, zero-padding to the full extent.
fn flatten_init<'a>(init: &'a InitVal, shape: &[usize]) -> Result<Vec<FlatInit<'a>>> {
    match init {
        InitVal::Exp(_) => bail!("array initializer must be an aggregate"),
        InitVal::List(items) => {
            let mut flat = Vec::with_capacity(shape.iter().product());
            fill_aggregate(items, shape, &mut flat)?;
            Ok(flat)
        }
    }
}

/// Fill one aggregate's region of `flat`, recursing into aligned nested
/// aggregates, then pad the region with zeros.
fn fill_aggregate<'a>(
    items: &'a [InitVal],
    shape: &[usize],
    flat: &mut Vec<FlatInit<'a>>,
) -> Result<()> {
    let region_start = flat.len();
    let total: usize = shape.iter().product();
    for item in items {
        let position = flat.len() - region_start;
        if position >= total {
            bail!("too many initializer elements for the declared shape");
        }
        match item {
            InitVal::Exp(exp) => flat.push(FlatInit::Exp(exp)),
            InitVal::List(sub) => {
                let subshape = aligned_subshape(shape, position)?;
                fill_aggregate(sub, subshape, flat)?;
            }
        }
    }
    while flat.len() - region_start < total {
        flat.push(FlatInit::Zero);
    }
    Ok(())
}

/// The subshape a nested aggregate elaborates against: the largest suffix of
/// trailing dimensions whose element count divides `position` (all but the
/// outermost dimension at position zero). No such suffix means the aggregate
/// is ill-formed.
fn aligned_subshape(shape: &[usize], position: usize) -> Result<&[usize]> {
    if shape.len() <= 1 {
        bail!("initializer braces nest deeper than the array");
    }
    if position == 0 {
        return Ok(&shape[1..]);
    }
    let mut start = shape.len();
    let mut elems = 1usize;
    while start > 1 {
        let grown = elems * shape[start - 1];
        if position % grown == 0 {
            elems = grown;
            start -= 1;
        } else {
            break;
        }
    }
    if start == shape.len() {
        bail!(
            "initializer does not align to a dimension boundary at position {}",
            position
        );
    }
    Ok(&shape[start..])
}

/// Render folded values as the nested brace literal for `shape`.
fn render_aggregate(values: &[i32], shape: &[usize]) -> String {
    if shape.len() == 1 {
        let inner = values
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        format!("{{{}}}", inner)
    } else {
        let stride: usize = shape[1..].iter().product();
        let inner = values
            .chunks(stride)
            .map(|chunk| render_aggregate(chunk, &shape[1..]))
            .collect::<Vec<_>>()
            .join(", ");
        format!("{{{}}}", inner)
    }
}
