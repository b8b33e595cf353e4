use arc_ast::Span;
use la_arena::{Arena, Idx};
use smol_str::SmolStr;
use std::fmt;

use crate::types::Type;

// ── Symbols ──────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SymbolKind {
    Channel,
    Variable,
    Function,
    Param,
    StatefulVariable,
    Output,
    Config,
    Block,
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SymbolKind::Channel => "channel",
            SymbolKind::Variable => "variable",
            SymbolKind::Function => "function",
            SymbolKind::Param => "parameter",
            SymbolKind::StatefulVariable => "stateful variable",
            SymbolKind::Output => "output",
            SymbolKind::Config => "config parameter",
            SymbolKind::Block => "block",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Symbol {
    pub name: SmolStr,
    pub kind: SymbolKind,
    pub ty: Type,
    /// Channel key for channels, state key for stateful variables,
    /// position for parameters and outputs.
    pub id: u32,
    pub span: Span,
}

impl Symbol {
    pub fn new(name: impl Into<SmolStr>, kind: SymbolKind, ty: Type) -> Self {
        Self {
            name: name.into(),
            kind,
            ty,
            id: 0,
            span: Span::default(),
        }
    }

    pub fn channel(name: impl Into<SmolStr>, id: u32, elem: Type) -> Self {
        Self::new(name, SymbolKind::Channel, Type::chan(elem)).with_id(id)
    }

    pub fn with_id(mut self, id: u32) -> Self {
        self.id = id;
        self
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScopeError {
    #[error("undefined symbol '{0}'")]
    Undefined(SmolStr),

    #[error("'{0}' is already declared")]
    AlreadyDeclared(SmolStr),
}

// ── Scope tree ───────────────────────────────────────────────────

pub type ScopeId = Idx<Scope>;

#[derive(Debug, Clone)]
pub struct Scope {
    pub parent: Option<ScopeId>,
    /// The function or block this scope belongs to; `None` for the root.
    pub owner: Option<Symbol>,
    pub symbols: Vec<Symbol>,
    pub children: Vec<ScopeId>,
}

/// Lexical scopes, mirroring source nesting. Names may not shadow a
/// symbol visible from an enclosing scope.
#[derive(Debug, Clone)]
pub struct ScopeTree {
    scopes: Arena<Scope>,
    root: ScopeId,
}

impl Default for ScopeTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeTree {
    pub fn new() -> Self {
        let mut scopes = Arena::new();
        let root = scopes.alloc(Scope {
            parent: None,
            owner: None,
            symbols: Vec::new(),
            children: Vec::new(),
        });
        Self { scopes, root }
    }

    pub fn root(&self) -> ScopeId {
        self.root
    }

    pub fn get(&self, id: ScopeId) -> &Scope {
        &self.scopes[id]
    }

    pub fn child(&mut self, parent: ScopeId, owner: Option<Symbol>) -> ScopeId {
        let id = self.scopes.alloc(Scope {
            parent: Some(parent),
            owner,
            symbols: Vec::new(),
            children: Vec::new(),
        });
        self.scopes[parent].children.push(id);
        id
    }

    pub fn add(&mut self, scope: ScopeId, symbol: Symbol) -> Result<(), ScopeError> {
        if self.resolve(scope, &symbol.name).is_ok() {
            return Err(ScopeError::AlreadyDeclared(symbol.name));
        }
        self.scopes[scope].symbols.push(symbol);
        Ok(())
    }

    /// Looks `name` up in `scope`, then in each enclosing scope.
    pub fn resolve(&self, scope: ScopeId, name: &str) -> Result<&Symbol, ScopeError> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let s = &self.scopes[id];
            if let Some(sym) = s.symbols.iter().find(|sym| sym.name == name) {
                return Ok(sym);
            }
            current = s.parent;
        }
        Err(ScopeError::Undefined(name.into()))
    }

    /// The function symbol owning `scope` or one of its ancestors.
    pub fn enclosing_function(&self, scope: ScopeId) -> Option<&Symbol> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let s = &self.scopes[id];
            if let Some(owner) = s.owner.as_ref().filter(|o| o.kind == SymbolKind::Function) {
                return Some(owner);
            }
            current = s.parent;
        }
        None
    }
}
