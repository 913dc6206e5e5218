//! Scoped symbol table
//!
//! Every scope ever entered is kept as a record, indexed by [`ScopeId`], with
//! a non-owning link to its enclosing scope. The table separately tracks the
//! stack of currently open scopes; the global scope is always at the bottom
//! and is never popped. Leaving a scope only pops it from the open stack, so
//! a function's local scope can still be resolved against (and dumped) after
//! its body has been parsed.

use crate::ast::Type;
use crate::lexer::Identifier;
use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use thiserror::Error;

#[derive(Debug, PartialEq, Clone, Error)]
pub enum SemanticError {
    #[error("Duplicate declaration: {name}")]
    DuplicateSymbol {
        name: Identifier,
        offset: Option<usize>,
    },

    #[error("Undeclared symbol: {name}")]
    UndeclaredSymbol {
        name: Identifier,
        offset: Option<usize>,
    },

    #[error("Cannot leave the global scope")]
    ScopeUnderflow,
}

impl SemanticError {
    /// Byte offset of the offending name in the source, if known
    pub fn offset(&self) -> Option<usize> {
        match self {
            SemanticError::DuplicateSymbol { offset, .. }
            | SemanticError::UndeclaredSymbol { offset, .. } => *offset,
            SemanticError::ScopeUnderflow => None,
        }
    }

    pub(crate) fn at(self, position: usize) -> Self {
        match self {
            SemanticError::DuplicateSymbol { name, .. } => SemanticError::DuplicateSymbol {
                name,
                offset: Some(position),
            },
            SemanticError::UndeclaredSymbol { name, .. } => SemanticError::UndeclaredSymbol {
                name,
                offset: Some(position),
            },
            SemanticError::ScopeUnderflow => SemanticError::ScopeUnderflow,
        }
    }
}

#[derive(Debug, PartialEq, Clone, Copy, Eq, Hash)]
pub struct ScopeId(usize);

impl ScopeId {
    pub const GLOBAL: ScopeId = ScopeId(0);
}

impl Display for ScopeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct Symbol {
    pub name: Identifier,
    pub type_: Type,
    pub kind: SymbolKind,
}

#[derive(Debug, PartialEq, Clone)]
pub enum SymbolKind {
    Variable { offset: usize },
    Function { param_types: Vec<Type> },
}

impl Symbol {
    pub fn offset(&self) -> Option<usize> {
        match self.kind {
            SymbolKind::Variable { offset } => Some(offset),
            SymbolKind::Function { .. } => None,
        }
    }
}

impl Display for Symbol {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            SymbolKind::Variable { offset } => {
                write!(f, "{}: variable {}, offset {offset}", self.name, self.type_)
            }
            SymbolKind::Function { param_types } => {
                let params = param_types
                    .iter()
                    .map(|t| t.to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "{}: function {}, params ({params})", self.name, self.type_)
            }
        }
    }
}

#[derive(Debug)]
struct Scope {
    // declaration order
    symbols: Vec<Symbol>,
    index: HashMap<Identifier, usize>,
    parent: Option<ScopeId>,
    // how many of the parent's symbols existed when this scope was entered
    parent_visible: usize,
    depth: usize,
    next_offset: usize,
}

impl Scope {
    fn new(parent: Option<ScopeId>, parent_visible: usize, depth: usize) -> Self {
        Scope {
            symbols: Vec::new(),
            index: HashMap::new(),
            parent,
            parent_visible,
            depth,
            next_offset: 0,
        }
    }

    fn find(&self, name: &str, visible: usize) -> Option<&Symbol> {
        self.index
            .get(name)
            .filter(|&&position| position < visible)
            .map(|&position| &self.symbols[position])
    }
}

#[derive(Debug)]
pub struct SymbolTable {
    scopes: Vec<Scope>,
    open: Vec<ScopeId>,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable {
            scopes: vec![Scope::new(None, 0, 0)],
            open: vec![ScopeId::GLOBAL],
        }
    }

    /// The innermost open scope
    pub fn current_scope(&self) -> ScopeId {
        self.open.last().copied().unwrap_or(ScopeId::GLOBAL)
    }

    /// Nesting depth of the innermost open scope; the global scope is 0
    pub fn depth(&self) -> usize {
        self.open.len() - 1
    }

    pub fn enter_scope(&mut self) {
        let parent = self.current_scope();
        let parent_scope = &self.scopes[parent.0];
        let scope = Scope::new(
            Some(parent),
            parent_scope.symbols.len(),
            parent_scope.depth + 1,
        );
        self.scopes.push(scope);
        self.open.push(ScopeId(self.scopes.len() - 1));
        log::trace!("Entered scope {} (depth {})", self.current_scope(), self.depth());
    }

    pub fn leave_scope(&mut self) -> Result<(), SemanticError> {
        if self.open.len() <= 1 {
            return Err(SemanticError::ScopeUnderflow);
        }
        let left = self.open.pop();
        log::trace!("Left scope {left:?}");
        Ok(())
    }

    pub fn declare_variable(
        &mut self,
        name: Identifier,
        type_: Type,
    ) -> Result<&Symbol, SemanticError> {
        let scope = &self.scopes[self.current_scope().0];
        let offset = scope.next_offset;
        let symbol = self.insert(Symbol {
            name,
            type_,
            kind: SymbolKind::Variable { offset },
        })?;
        Ok(symbol)
    }

    pub fn declare_function(
        &mut self,
        name: Identifier,
        return_type: Type,
        param_types: Vec<Type>,
    ) -> Result<&Symbol, SemanticError> {
        self.insert(Symbol {
            name,
            type_: return_type,
            kind: SymbolKind::Function { param_types },
        })
    }

    fn insert(&mut self, symbol: Symbol) -> Result<&Symbol, SemanticError> {
        let id = self.current_scope();
        let scope = &mut self.scopes[id.0];

        if scope.index.contains_key(&symbol.name) {
            return Err(SemanticError::DuplicateSymbol {
                name: symbol.name,
                offset: None,
            });
        }

        if matches!(symbol.kind, SymbolKind::Variable { .. }) {
            scope.next_offset += 1;
        }

        log::trace!("Declared in scope {id}: {symbol}");
        let position = scope.symbols.len();
        scope.index.insert(symbol.name.clone(), position);
        scope.symbols.push(symbol);
        Ok(&scope.symbols[position])
    }

    /// Look `name` up from the innermost open scope outwards.
    pub fn lookup(&self, name: &str) -> Result<&Symbol, SemanticError> {
        let scope = self.current_scope();
        self.resolve(scope, self.scopes[scope.0].symbols.len(), name)
    }

    /// Look `name` up starting from any recorded scope, open or not.
    ///
    /// Only the first `visible` symbols of `scope` are considered, and in each
    /// enclosing scope only the symbols that had been declared when the inner
    /// scope was entered. This gives declare-before-use semantics to lookups
    /// made after parsing has finished.
    pub fn resolve(
        &self,
        scope: ScopeId,
        visible: usize,
        name: &str,
    ) -> Result<&Symbol, SemanticError> {
        let mut current = Some((scope, visible));
        while let Some((id, visible)) = current {
            let scope = &self.scopes[id.0];
            if let Some(symbol) = scope.find(name, visible) {
                return Ok(symbol);
            }
            current = scope.parent.map(|parent| (parent, scope.parent_visible));
        }
        Err(SemanticError::UndeclaredSymbol {
            name: name.to_string(),
            offset: None,
        })
    }

    /// Symbols of one scope, in declaration order
    pub fn symbols_in(&self, scope: ScopeId) -> &[Symbol] {
        self.scopes
            .get(scope.0)
            .map(|s| s.symbols.as_slice())
            .unwrap_or(&[])
    }

    pub fn parent_of(&self, scope: ScopeId) -> Option<ScopeId> {
        self.scopes.get(scope.0).and_then(|s| s.parent)
    }

    /// All recorded scopes, in the order they were entered
    pub fn scopes(&self) -> impl Iterator<Item = ScopeId> + '_ {
        (0..self.scopes.len()).map(ScopeId)
    }

    /// Every symbol paired with the depth of its scope.
    ///
    /// Ordered outer-to-inner by scope creation: the global scope first, then
    /// each nested scope in the order it was entered; symbols within a scope
    /// in declaration order. Clone the iterator, or call again, to restart.
    pub fn snapshot(&self) -> impl Iterator<Item = (usize, &Symbol)> + Clone + '_ {
        self.scopes
            .iter()
            .flat_map(|scope| scope.symbols.iter().map(move |s| (scope.depth, s)))
    }
}

impl Display for SymbolTable {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for (i, scope) in self.scopes.iter().enumerate() {
            match scope.parent {
                None => writeln!(f, "scope {i} (global):")?,
                Some(parent) => writeln!(
                    f,
                    "scope {i} (depth {}, enclosed by scope {parent}):",
                    scope.depth
                )?,
            }
            for symbol in &scope.symbols {
                writeln!(f, "    {symbol}")?;
            }
        }
        Ok(())
    }
}
