//! Statement analysis: builds the scope tree, infers every expression and
//! re-validates each value against the slot it flows into.

use arc_ast::{
    Block, ExprId, FunctionDecl, LiteralKind, ParamDecl, Program, Span, StmtId, StmtKind,
    TypeExprId,
};
use la_arena::ArenaMap;
use smol_str::SmolStr;
use std::collections::HashMap;
use tracing::{debug, instrument, trace};

use crate::check::check_assignment;
use crate::constraints::ConstraintSystem;
use crate::error::{TypeError, TypeErrorKind};
use crate::infer::Inference;
use crate::literal::{parse_numeric, Value};
use crate::resolve::resolve_type_expr;
use crate::scope::{ScopeId, ScopeTree, Symbol, SymbolKind};
use crate::types::{FunctionType, Param, Type};

/// Everything later stages need from analysis.
#[derive(Debug)]
pub struct Analysis {
    pub scopes: ScopeTree,
    pub constraints: ConstraintSystem,
    pub errors: Vec<TypeError>,
    /// Inferred type of every expression visited, before solving.
    pub expr_types: ArenaMap<ExprId, Type>,
    /// Scope each statement executes in.
    pub stmt_scopes: ArenaMap<StmtId, ScopeId>,
    /// Body scope of each function, keyed by function name.
    pub function_scopes: HashMap<SmolStr, ScopeId>,
}

impl Analysis {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn type_of(&self, expr: ExprId) -> Option<&Type> {
        self.expr_types.get(expr)
    }

    pub fn scope_of(&self, stmt: StmtId) -> Option<ScopeId> {
        self.stmt_scopes.get(stmt).copied()
    }

    /// Signature of a declared function.
    pub fn function(&self, name: &str) -> Option<&FunctionType> {
        match self.scopes.resolve(self.scopes.root(), name) {
            Ok(Symbol {
                ty: Type::Function(func),
                ..
            }) => Some(func),
            _ => None,
        }
    }
}

/// Analyzes `program` with `globals` (typically channels) visible from
/// every function.
#[instrument(level = "debug", skip_all)]
pub fn analyze(program: &Program, globals: impl IntoIterator<Item = Symbol>) -> Analysis {
    let mut analyzer = Analyzer::new(program);
    let root = analyzer.scopes.root();
    for symbol in globals {
        analyzer.declare(root, symbol);
    }

    let mut symbols = Vec::new();
    for decl in program.functions() {
        let ty = analyzer.signature(decl);
        let symbol = Symbol::new(decl.name.clone(), SymbolKind::Function, ty).with_span(decl.span);
        analyzer.declare(root, symbol.clone());
        symbols.push(symbol);
    }
    for (decl, symbol) in program.functions().zip(symbols) {
        analyzer.function(decl, symbol);
    }

    debug!(
        functions = program.items.len(),
        constraints = analyzer.constraints.len(),
        errors = analyzer.errors.len(),
        "analysis complete"
    );
    Analysis {
        scopes: analyzer.scopes,
        constraints: analyzer.constraints,
        errors: analyzer.errors,
        expr_types: analyzer.expr_types,
        stmt_scopes: analyzer.stmt_scopes,
        function_scopes: analyzer.function_scopes,
    }
}

struct FunctionContext {
    name: SmolStr,
    return_type: Option<Type>,
    next_state_id: u32,
}

struct Analyzer<'a> {
    program: &'a Program,
    scopes: ScopeTree,
    constraints: ConstraintSystem,
    errors: Vec<TypeError>,
    expr_types: ArenaMap<ExprId, Type>,
    stmt_scopes: ArenaMap<StmtId, ScopeId>,
    function_scopes: HashMap<SmolStr, ScopeId>,
}

impl<'a> Analyzer<'a> {
    fn new(program: &'a Program) -> Self {
        Self {
            program,
            scopes: ScopeTree::new(),
            constraints: ConstraintSystem::new(),
            errors: Vec::new(),
            expr_types: ArenaMap::default(),
            stmt_scopes: ArenaMap::default(),
            function_scopes: HashMap::new(),
        }
    }

    fn error(&mut self, kind: TypeErrorKind, span: Span) {
        self.errors.push(TypeError::new(kind, span));
    }

    fn declare(&mut self, scope: ScopeId, symbol: Symbol) {
        let span = symbol.span;
        if let Err(e) = self.scopes.add(scope, symbol) {
            self.error(e.into(), span);
        }
    }

    fn resolve(&mut self, id: TypeExprId) -> Type {
        match resolve_type_expr(self.program, id) {
            Ok(ty) => ty,
            Err(e) => {
                self.errors.push(e);
                Type::Invalid
            }
        }
    }

    fn infer(&mut self, scope: ScopeId, expr: ExprId) -> Type {
        Inference::new(
            self.program,
            &self.scopes,
            scope,
            &mut self.constraints,
            &mut self.errors,
            &mut self.expr_types,
        )
        .infer(expr)
    }

    // ── Declarations ────────────────────────────────────────────

    fn signature(&mut self, decl: &FunctionDecl) -> Type {
        let config = self.params(&decl.config);
        let inputs = self.params(&decl.inputs);
        let outputs = self.params(&decl.outputs);
        Type::function(FunctionType {
            inputs,
            outputs,
            config,
        })
    }

    fn params(&mut self, decls: &[ParamDecl]) -> Vec<Param> {
        decls
            .iter()
            .map(|decl| {
                let ty = self.resolve(decl.ty);
                let default = decl
                    .default
                    .and_then(|expr| self.default_value(decl, expr, &ty));
                Param {
                    name: decl.name.clone(),
                    ty,
                    default,
                }
            })
            .collect()
    }

    fn default_value(&mut self, decl: &ParamDecl, expr: ExprId, ty: &Type) -> Option<Value> {
        let Some((lit, negated)) = self.program.literal_of(expr) else {
            self.error(TypeErrorKind::NonLiteralDefault(decl.name.clone()), decl.span);
            return None;
        };
        match &lit.kind {
            LiteralKind::Number { text, unit } => {
                let text = if negated {
                    format!("-{}", text)
                } else {
                    text.to_string()
                };
                match parse_numeric(&text, unit.as_deref(), Some(ty)) {
                    Ok(parsed) => Some(parsed.value),
                    Err(kind) => {
                        self.error(kind, lit.span);
                        None
                    }
                }
            }
            LiteralKind::Str(s) => Some(Value::Str(s.into())),
            LiteralKind::Bool(b) => Some(Value::Uint(u64::from(*b))),
        }
    }

    fn function(&mut self, decl: &'a FunctionDecl, symbol: Symbol) {
        let Type::Function(sig) = &symbol.ty else {
            return;
        };
        let sig = (**sig).clone();
        let root = self.scopes.root();
        let scope = self.scopes.child(root, Some(symbol));
        self.function_scopes.insert(decl.name.clone(), scope);

        for (i, (param, decl)) in sig.config.iter().zip(&decl.config).enumerate() {
            let sym = Symbol::new(param.name.clone(), SymbolKind::Config, param.ty.clone());
            self.declare(scope, sym.with_id(i as u32).with_span(decl.span));
        }
        for (i, (param, decl)) in sig.inputs.iter().zip(&decl.inputs).enumerate() {
            let sym = Symbol::new(param.name.clone(), SymbolKind::Param, param.ty.clone());
            self.declare(scope, sym.with_id(i as u32).with_span(decl.span));
        }
        let return_type = match decl.return_output() {
            Some(_) => sig.outputs.first().map(|p| p.ty.clone()),
            None => None,
        };
        if decl.has_named_outputs() {
            for (i, (param, decl)) in sig.outputs.iter().zip(&decl.outputs).enumerate() {
                let sym = Symbol::new(param.name.clone(), SymbolKind::Output, param.ty.clone());
                self.declare(scope, sym.with_id(i as u32).with_span(decl.span));
            }
        }

        let mut cx = FunctionContext {
            name: decl.name.clone(),
            return_type,
            next_state_id: 0,
        };
        self.block(&decl.body, scope, &mut cx);
        trace!(function = %decl.name, stateful = cx.next_state_id, "analyzed function");
    }

    // ── Statements ──────────────────────────────────────────────

    fn block(&mut self, block: &'a Block, scope: ScopeId, cx: &mut FunctionContext) {
        for stmt in &block.stmts {
            self.stmt(*stmt, scope, cx);
        }
    }

    fn child_block(&mut self, block: &'a Block, scope: ScopeId, label: &str, cx: &mut FunctionContext) {
        let owner = Symbol::new(label, SymbolKind::Block, Type::Invalid).with_span(block.span);
        let child = self.scopes.child(scope, Some(owner));
        self.block(block, child, cx);
    }

    fn stmt(&mut self, id: StmtId, scope: ScopeId, cx: &mut FunctionContext) {
        let program = self.program;
        let stmt = &program.stmts[id];
        let span = stmt.span;
        self.stmt_scopes.insert(id, scope);

        match &stmt.kind {
            StmtKind::VarDecl {
                name,
                ty,
                value,
                stateful,
            } => {
                let value_ty = self.infer(scope, *value);
                let var_ty = match ty {
                    Some(texpr) => {
                        let declared = self.resolve(*texpr);
                        let reason = format!("declaration of '{}'", name);
                        self.assignable(&declared, *value, &value_ty, span, &reason);
                        declared
                    }
                    None => match value_ty {
                        Type::Chan(elem) => *elem,
                        other => other,
                    },
                };
                let symbol = if *stateful {
                    let state_id = cx.next_state_id;
                    cx.next_state_id += 1;
                    Symbol::new(name.clone(), SymbolKind::StatefulVariable, var_ty).with_id(state_id)
                } else {
                    Symbol::new(name.clone(), SymbolKind::Variable, var_ty)
                };
                self.declare(scope, symbol.with_span(span));
            }
            StmtKind::Assign { name, value } => {
                let value_ty = self.infer(scope, *value);
                let target = match self.scopes.resolve(scope, name) {
                    Ok(sym) => sym.clone(),
                    Err(e) => {
                        self.error(e.into(), span);
                        return;
                    }
                };
                match target.kind {
                    SymbolKind::Variable
                    | SymbolKind::StatefulVariable
                    | SymbolKind::Param
                    | SymbolKind::Output => {
                        let reason = format!("assignment to '{}'", name);
                        self.assignable(&target.ty, *value, &value_ty, span, &reason);
                    }
                    kind => self.error(
                        TypeErrorKind::InvalidAssignment {
                            name: name.clone(),
                            kind,
                        },
                        span,
                    ),
                }
            }
            StmtKind::If {
                condition,
                body,
                else_ifs,
                else_body,
            } => {
                self.infer(scope, *condition);
                self.child_block(body, scope, "if", cx);
                for branch in else_ifs {
                    self.infer(scope, branch.condition);
                    self.child_block(&branch.body, scope, "else if", cx);
                }
                if let Some(block) = else_body {
                    self.child_block(block, scope, "else", cx);
                }
            }
            StmtKind::Return(value) => match (value, cx.return_type.clone()) {
                (Some(value), Some(ret)) => {
                    let ty = self.infer(scope, *value);
                    let reason = format!("return value of '{}'", cx.name);
                    self.assignable(&ret, *value, &ty, span, &reason);
                }
                (None, Some(ret)) => self.error(
                    TypeErrorKind::MissingReturnValue {
                        name: cx.name.clone(),
                        ty: ret.to_string(),
                    },
                    span,
                ),
                (Some(value), None) => {
                    self.infer(scope, *value);
                    self.error(TypeErrorKind::UnexpectedReturnValue(cx.name.clone()), span);
                }
                (None, None) => {}
            },
            StmtKind::ChannelWrite { value, channel } => {
                let value_ty = self.infer(scope, *value);
                if let Some(elem) = self.channel_elem(scope, channel, span) {
                    let reason = format!("write to channel '{}'", channel);
                    self.assignable(&elem, *value, &value_ty, span, &reason);
                }
            }
            StmtKind::ChannelRead { name, channel, .. } => {
                let elem = self
                    .channel_elem(scope, channel, span)
                    .unwrap_or(Type::Invalid);
                let symbol = Symbol::new(name.clone(), SymbolKind::Variable, elem);
                self.declare(scope, symbol.with_span(span));
            }
            StmtKind::Expr(expr) => {
                self.infer(scope, *expr);
            }
        }
    }

    fn channel_elem(&mut self, scope: ScopeId, channel: &SmolStr, span: Span) -> Option<Type> {
        let resolved = self.scopes.resolve(scope, channel).map(|sym| sym.ty.clone());
        match resolved {
            Ok(Type::Chan(elem)) => Some(*elem),
            Ok(_) => {
                self.error(TypeErrorKind::NotAChannel(channel.clone()), span);
                None
            }
            Err(e) => {
                self.error(e.into(), span);
                None
            }
        }
    }

    /// Validates a value flowing into a slot of type `target`. Literal
    /// values are additionally range-checked against a concrete target.
    fn assignable(&mut self, target: &Type, value: ExprId, value_ty: &Type, span: Span, reason: &str) {
        // A channel used as a value reads one element.
        let value_ty = match (target, value_ty) {
            (Type::Chan(_), _) => value_ty,
            (_, Type::Chan(elem)) => &**elem,
            _ => value_ty,
        };
        let literal = self.program.literal_of(value);
        if let (Some((lit, negated)), Some(_)) = (literal, target.kind()) {
            if let LiteralKind::Number { text, unit } = &lit.kind {
                let text = if negated {
                    format!("-{}", text)
                } else {
                    text.to_string()
                };
                if let Err(kind) = parse_numeric(&text, unit.as_deref(), Some(target)) {
                    self.error(kind, lit.span);
                    return;
                }
            }
        }
        if let Err(e) = check_assignment(
            &mut self.constraints,
            target,
            value_ty,
            literal.is_some(),
            span,
            reason,
        ) {
            self.errors.push(e);
        }
    }
}
