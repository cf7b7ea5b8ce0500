//! Lexically-scoped symbol tables.
//!
//! A stack of per-scope maps plus one distinguished global map. Each scope
//! carries a compilation-unique number which is appended to emitted IR names
//! (`@x_3`), so same-named variables in disjoint scopes stay distinct in the
//! flat IR namespace. Lookup scans innermost-first and falls back to the
//! global map.

use anyhow::{bail, Result};
use std::collections::HashMap;

/// What a name is bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Symbol {
    /// A compile-time constant with its folded value.
    Const(i32),
    /// A mutable scalar variable.
    Var,
    /// A function; `returns_value` is true for `int`, false for `void`.
    Func { returns_value: bool },
    /// An array with its declared dimension count.
    Array { rank: usize },
    /// A decayed array parameter. `rank` is the full logical rank, i.e. the
    /// pointee's dimension count plus one.
    Pointer { rank: usize },
}

struct Scope {
    map: HashMap<String, Symbol>,
    number: usize,
}

/// Result of a name lookup.
#[derive(Debug, PartialEq, Eq)]
pub enum Resolved<'a> {
    /// Found in a lexical scope; carries the scope number.
    Scoped(usize, &'a Symbol),
    /// Found in the global map.
    Global(&'a Symbol),
}

impl<'a> Resolved<'a> {
    pub fn symbol(&self) -> &'a Symbol {
        match self {
            Resolved::Scoped(_, sym) | Resolved::Global(sym) => sym,
        }
    }

    /// Render the IR name for `ident` under this resolution: `@x_3` for a
    /// scoped binding, `@x` for a global.
    pub fn ir_name(&self, ident: &str) -> String {
        match self {
            Resolved::Scoped(number, _) => format!("@{}_{}", ident, number),
            Resolved::Global(_) => format!("@{}", ident),
        }
    }
}

/// The scope stack plus the global map.
pub struct SymbolTables {
    scopes: Vec<Scope>,
    globals: HashMap<String, Symbol>,
    next_scope_number: usize,
}

impl SymbolTables {
    pub fn new() -> Self {
        SymbolTables {
            scopes: Vec::new(),
            globals: HashMap::new(),
            next_scope_number: 0,
        }
    }

    /// Open a new innermost scope and return its number.
    pub fn push_scope(&mut self) -> usize {
        let number = self.next_scope_number;
        self.next_scope_number += 1;
        self.scopes.push(Scope {
            map: HashMap::new(),
            number,
        });
        number
    }

    /// Close the innermost scope.
    pub fn pop_scope(&mut self) -> Result<()> {
        if self.scopes.pop().is_none() {
            bail!("no open scope to pop");
        }
        Ok(())
    }

    /// Number of the innermost open scope.
    pub fn current_scope_number(&self) -> Result<usize> {
        match self.scopes.last() {
            Some(scope) => Ok(scope.number),
            None => bail!("no open scope"),
        }
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Bind `name` in the innermost scope. Shadowing outer bindings is
    /// allowed; re-binding within the innermost scope overwrites.
    pub fn insert(&mut self, name: &str, symbol: Symbol) -> Result<()> {
        match self.scopes.last_mut() {
            Some(scope) => {
                scope.map.insert(name.to_string(), symbol);
                Ok(())
            }
            None => bail!("cannot bind '{}': no open scope", name),
        }
    }

    pub fn insert_global(&mut self, name: &str, symbol: Symbol) {
        self.globals.insert(name.to_string(), symbol);
    }

    /// Innermost-first lookup, falling back to the global map.
    pub fn lookup(&self, name: &str) -> Option<Resolved<'_>> {
        for scope in self.scopes.iter().rev() {
            if let Some(sym) = scope.map.get(name) {
                return Some(Resolved::Scoped(scope.number, sym));
            }
        }
        self.globals.get(name).map(Resolved::Global)
    }

    pub fn lookup_global(&self, name: &str) -> Option<&Symbol> {
        self.globals.get(name)
    }
}

impl Default for SymbolTables {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_numbers_are_unique_across_reopens() {
        let mut tables = SymbolTables::new();
        let a = tables.push_scope();
        tables.pop_scope().unwrap();
        let b = tables.push_scope();
        assert_ne!(a, b, "a reopened scope must get a fresh number");
    }

    #[test]
    fn inner_binding_shadows_outer() {
        let mut tables = SymbolTables::new();
        let outer = tables.push_scope();
        tables.insert("x", Symbol::Var).unwrap();
        let inner = tables.push_scope();
        tables.insert("x", Symbol::Const(7)).unwrap();

        match tables.lookup("x") {
            Some(Resolved::Scoped(number, Symbol::Const(7))) => assert_eq!(number, inner),
            other => panic!("expected the inner binding, got {:?}", other),
        }

        tables.pop_scope().unwrap();
        match tables.lookup("x") {
            Some(Resolved::Scoped(number, Symbol::Var)) => assert_eq!(number, outer),
            other => panic!("expected the outer binding, got {:?}", other),
        }
    }

    #[test]
    fn lookup_falls_back_to_globals() {
        let mut tables = SymbolTables::new();
        tables.insert_global("getint", Symbol::Func { returns_value: true });
        tables.push_scope();
        match tables.lookup("getint") {
            Some(Resolved::Global(Symbol::Func { returns_value })) => assert!(returns_value),
            other => panic!("expected the global binding, got {:?}", other),
        }
    }

    #[test]
    fn scoped_binding_hides_global() {
        let mut tables = SymbolTables::new();
        tables.insert_global("x", Symbol::Var);
        tables.push_scope();
        tables.insert("x", Symbol::Const(1)).unwrap();
        assert!(matches!(
            tables.lookup("x"),
            Some(Resolved::Scoped(_, Symbol::Const(1)))
        ));
    }

    #[test]
    fn ir_name_rendering() {
        assert_eq!(Resolved::Scoped(4, &Symbol::Var).ir_name("x"), "@x_4");
        assert_eq!(Resolved::Global(&Symbol::Var).ir_name("x"), "@x");
    }

    #[test]
    fn pop_without_push_fails() {
        let mut tables = SymbolTables::new();
        assert!(tables.pop_scope().is_err());
    }

    #[test]
    fn insert_without_scope_fails() {
        let mut tables = SymbolTables::new();
        assert!(tables.insert("x", Symbol::Var).is_err());
    }
}
