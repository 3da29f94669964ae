//! Lexically scoped symbol tables for the compiler.
//!
//! Tables form a tree: a synthesized builtin root, the global scope below
//! it, and one local scope per function literal being compiled. Resolution
//! walks outward; local bindings reached from an inner scope are promoted to
//! free variables at every intermediate scope, which is what makes
//! closures-of-closures capture correctly.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::runtime::builtins::BUILTINS;

/// Where a symbol lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolScope {
    Builtin,
    Global,
    Local,
    Free,
    /// The name a function literal is bound to inside its own body
    Function,
}

/// A resolved name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    pub scope: SymbolScope,
    pub index: usize,
}

/// One scope of the symbol table tree.
pub struct SymbolTable {
    store: HashMap<String, Symbol>,
    count: usize,
    free: Vec<Symbol>,
    outer: Option<Rc<RefCell<SymbolTable>>>,
}

impl SymbolTable {
    fn new() -> Self {
        Self {
            store: HashMap::new(),
            count: 0,
            free: Vec::new(),
            outer: None,
        }
    }

    /// The global scope, nested inside a builtin root seeded from the
    /// registry in registration order.
    pub fn global() -> Rc<RefCell<SymbolTable>> {
        let mut builtin_scope = SymbolTable::new();
        for (index, builtin) in BUILTINS.iter().enumerate() {
            builtin_scope.store.insert(
                builtin.name.to_string(),
                Symbol {
                    name: builtin.name.to_string(),
                    scope: SymbolScope::Builtin,
                    index,
                },
            );
        }
        SymbolTable::enclosed(Rc::new(RefCell::new(builtin_scope)))
    }

    /// A new scope nested inside `outer`.
    pub fn enclosed(outer: Rc<RefCell<SymbolTable>>) -> Rc<RefCell<SymbolTable>> {
        let mut table = SymbolTable::new();
        table.outer = Some(outer);
        Rc::new(RefCell::new(table))
    }

    /// Define `name` in this scope. The scope kind is determined by the
    /// table's depth; the index is the running definition counter.
    /// Redefinition overwrites, which is how `let` rebinds.
    pub fn define(&mut self, name: &str) -> Symbol {
        let symbol = Symbol {
            name: name.to_string(),
            scope: self.depth_scope(),
            index: self.count,
        };
        self.store.insert(name.to_string(), symbol.clone());
        self.count += 1;
        symbol
    }

    fn depth_scope(&self) -> SymbolScope {
        match &self.outer {
            None => SymbolScope::Builtin,
            Some(outer) => {
                if outer.borrow().outer.is_none() {
                    SymbolScope::Global
                } else {
                    SymbolScope::Local
                }
            }
        }
    }

    /// Define `name` as the current function's own name. It occupies no
    /// local slot; references compile to the current-closure instruction.
    pub fn define_function_name(&mut self, name: &str) -> Symbol {
        let symbol = Symbol {
            name: name.to_string(),
            scope: SymbolScope::Function,
            index: 0,
        };
        self.store.insert(name.to_string(), symbol.clone());
        symbol
    }

    /// Resolve `name`, walking outward. When the hit is a local or free
    /// symbol of an outer scope, every scope on the way back (this one
    /// included) records the captured original and re-resolves the name as
    /// one of its own free symbols.
    pub fn resolve(&mut self, name: &str) -> Option<Symbol> {
        if let Some(symbol) = self.store.get(name) {
            return Some(symbol.clone());
        }
        let outer = self.outer.clone()?;
        let symbol = outer.borrow_mut().resolve(name)?;
        if symbol.scope == SymbolScope::Local || symbol.scope == SymbolScope::Free {
            return Some(self.capture(symbol));
        }
        Some(symbol)
    }

    /// Record `original` as captured by this scope and return the free
    /// symbol that now shadows it here.
    fn capture(&mut self, original: Symbol) -> Symbol {
        let free = Symbol {
            name: original.name.clone(),
            scope: SymbolScope::Free,
            index: self.free.len(),
        };
        self.store.insert(free.name.clone(), free.clone());
        self.free.push(original);
        free
    }

    /// How many names have been defined in this scope (parameters
    /// included); sizes the frame's local area.
    pub fn count_definitions(&self) -> usize {
        self.count
    }

    /// The originals captured by this scope, in emission order.
    pub fn free_symbols(&self) -> Vec<Symbol> {
        self.free.clone()
    }

    /// The enclosing scope.
    pub fn outer(&self) -> Option<Rc<RefCell<SymbolTable>>> {
        self.outer.clone()
    }
}
