//! Programmatic construction of syntax trees.
//!
//! Nodes built here get synthetic, strictly increasing spans so that
//! every literal occurrence has a distinct source position.

use smol_str::SmolStr;

use crate::*;

#[derive(Debug, Default)]
pub struct ProgramBuilder {
    program: Program,
    pos: u32,
}

impl ProgramBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn finish(self) -> Program {
        self.program
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    fn span(&mut self, len: usize) -> Span {
        let start = self.pos;
        let end = start + len.max(1) as u32;
        self.pos = end + 1;
        Span::new(start, end)
    }

    fn alloc(&mut self, root: LogicalOr, span: Span) -> ExprId {
        self.program.exprs.alloc(Expr { root, span })
    }

    fn span_of(&self, id: ExprId) -> Span {
        self.program.exprs[id].span
    }

    fn primary(&mut self, primary: Primary, span: Span) -> ExprId {
        self.alloc(LogicalOr::from_primary(primary), span)
    }

    // ── Literals and names ──────────────────────────────────────

    pub fn int(&mut self, value: i64) -> ExprId {
        self.number(&value.to_string())
    }

    pub fn float(&mut self, value: f64) -> ExprId {
        let mut text = value.to_string();
        if !is_float_text(&text) {
            text.push_str(".0");
        }
        self.number(&text)
    }

    pub fn number(&mut self, text: &str) -> ExprId {
        let span = self.span(text.len());
        let kind = LiteralKind::Number {
            text: SmolStr::new(text),
            unit: None,
        };
        self.primary(Primary::Literal(Literal { kind, span }), span)
    }

    /// A unit-suffixed literal such as `5psi`.
    pub fn quantity(&mut self, text: &str, unit: &str) -> ExprId {
        let span = self.span(text.len() + unit.len());
        let kind = LiteralKind::Number {
            text: SmolStr::new(text),
            unit: Some(SmolStr::new(unit)),
        };
        self.primary(Primary::Literal(Literal { kind, span }), span)
    }

    pub fn string(&mut self, value: &str) -> ExprId {
        let span = self.span(value.len() + 2);
        let kind = LiteralKind::Str(value.to_string());
        self.primary(Primary::Literal(Literal { kind, span }), span)
    }

    pub fn bool(&mut self, value: bool) -> ExprId {
        let span = self.span(if value { 4 } else { 5 });
        let kind = LiteralKind::Bool(value);
        self.primary(Primary::Literal(Literal { kind, span }), span)
    }

    pub fn ident(&mut self, name: &str) -> ExprId {
        let span = self.span(name.len());
        let name = SmolStr::new(name);
        self.primary(Primary::Ident { name, span }, span)
    }

    pub fn paren(&mut self, inner: ExprId) -> ExprId {
        let span = self.span_of(inner);
        self.primary(Primary::Paren(inner), span)
    }

    pub fn cast(&mut self, ty: TypeExprId, value: ExprId) -> ExprId {
        let span = self.program.type_exprs[ty].span.merge(self.span_of(value));
        self.primary(Primary::Cast { ty, value }, span)
    }

    pub fn series(&mut self, elems: Vec<ExprId>) -> ExprId {
        let span = self.span(2);
        let span = elems
            .iter()
            .fold(span, |acc, e| acc.merge(self.span_of(*e)));
        self.primary(Primary::Series { elems, span }, span)
    }

    // ── Operators ───────────────────────────────────────────────

    /// `lhs op rhs`, appending to `lhs` when it already sits at the
    /// operator's level so chains stay flat.
    pub fn binary(&mut self, lhs: ExprId, op: BinaryOp, rhs: ExprId) -> ExprId {
        let span = self.span_of(lhs).merge(self.span_of(rhs));
        let root = match op {
            BinaryOp::Or => {
                let mut node = self.or_of(lhs);
                node.rest.push(self.and_of(rhs));
                node
            }
            BinaryOp::And => {
                let mut node = self.and_of(lhs);
                node.rest.push(self.eq_of(rhs));
                LogicalOr::from(node)
            }
            BinaryOp::Eq | BinaryOp::Ne => {
                let op = if op == BinaryOp::Eq {
                    EqualityOp::Eq
                } else {
                    EqualityOp::Ne
                };
                let mut node = self.eq_of(lhs);
                node.rest.push((op, self.rel_of(rhs)));
                LogicalOr::from(LogicalAnd::from(node))
            }
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
                let op = match op {
                    BinaryOp::Lt => RelationalOp::Lt,
                    BinaryOp::Le => RelationalOp::Le,
                    BinaryOp::Gt => RelationalOp::Gt,
                    _ => RelationalOp::Ge,
                };
                let mut node = self.rel_of(lhs);
                node.rest.push((op, self.add_of(rhs)));
                LogicalOr::from(LogicalAnd::from(Equality::from(node)))
            }
            BinaryOp::Add | BinaryOp::Sub => {
                let op = if op == BinaryOp::Add {
                    AdditiveOp::Add
                } else {
                    AdditiveOp::Sub
                };
                let mut node = self.add_of(lhs);
                node.rest.push((op, self.mul_of(rhs)));
                LogicalOr::from(LogicalAnd::from(Equality::from(Relational::from(node))))
            }
            BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
                let op = match op {
                    BinaryOp::Mul => MultiplicativeOp::Mul,
                    BinaryOp::Div => MultiplicativeOp::Div,
                    _ => MultiplicativeOp::Mod,
                };
                let mut node = self.mul_of(lhs);
                node.rest.push((op, self.pow_of(rhs)));
                LogicalOr::from(LogicalAnd::from(Equality::from(Relational::from(
                    Additive::from(node),
                ))))
            }
            BinaryOp::Pow => {
                let node = Power {
                    base: self.unary_of(lhs),
                    exponent: Some(Box::new(self.pow_of(rhs))),
                };
                LogicalOr::from(LogicalAnd::from(Equality::from(Relational::from(
                    Additive::from(Multiplicative::from(node)),
                ))))
            }
        };
        self.alloc(root, span)
    }

    pub fn neg(&mut self, operand: ExprId) -> ExprId {
        let span = self.span_of(operand);
        let unary = Unary::Neg(Box::new(self.unary_of(operand)));
        self.alloc(LogicalOr::from_unary(unary), span)
    }

    pub fn not(&mut self, operand: ExprId) -> ExprId {
        let span = self.span_of(operand);
        let unary = Unary::Not(Box::new(self.unary_of(operand)));
        self.alloc(LogicalOr::from_unary(unary), span)
    }

    pub fn call(&mut self, callee: &str, args: Vec<ExprId>) -> ExprId {
        let target = self.ident(callee);
        self.suffix(target, Suffix::Call(args))
    }

    pub fn index(&mut self, target: ExprId, index: ExprId) -> ExprId {
        self.suffix(target, Suffix::Index(index))
    }

    pub fn slice(&mut self, target: ExprId, start: Option<ExprId>, end: Option<ExprId>) -> ExprId {
        self.suffix(target, Suffix::Slice { start, end })
    }

    fn suffix(&mut self, target: ExprId, suffix: Suffix) -> ExprId {
        let span = self.span_of(target);
        let mut postfix = self.postfix_of(target);
        postfix.suffixes.push(suffix);
        self.alloc(LogicalOr::from_unary(Unary::Postfix(postfix)), span)
    }

    // ── Level narrowing ─────────────────────────────────────────
    //
    // Each `*_of` returns the expression viewed at one level, reusing
    // its node when every level above is transparent and wrapping it in
    // parentheses otherwise.

    fn parens(id: ExprId) -> LogicalOr {
        LogicalOr::from_primary(Primary::Paren(id))
    }

    fn or_of(&self, id: ExprId) -> LogicalOr {
        self.program.exprs[id].root.clone()
    }

    fn and_of(&self, id: ExprId) -> LogicalAnd {
        let node = self.or_of(id);
        if node.rest.is_empty() {
            node.first
        } else {
            Self::parens(id).first
        }
    }

    fn eq_of(&self, id: ExprId) -> Equality {
        let node = self.and_of(id);
        if node.rest.is_empty() {
            node.first
        } else {
            Self::parens(id).first.first
        }
    }

    fn rel_of(&self, id: ExprId) -> Relational {
        let node = self.eq_of(id);
        if node.rest.is_empty() {
            node.first
        } else {
            Self::parens(id).first.first.first
        }
    }

    fn add_of(&self, id: ExprId) -> Additive {
        let node = self.rel_of(id);
        if node.rest.is_empty() {
            node.first
        } else {
            Self::parens(id).first.first.first.first
        }
    }

    fn mul_of(&self, id: ExprId) -> Multiplicative {
        let node = self.add_of(id);
        if node.rest.is_empty() {
            node.first
        } else {
            Self::parens(id).first.first.first.first.first
        }
    }

    fn pow_of(&self, id: ExprId) -> Power {
        let node = self.mul_of(id);
        if node.rest.is_empty() {
            node.first
        } else {
            Self::parens(id).first.first.first.first.first.first
        }
    }

    fn unary_of(&self, id: ExprId) -> Unary {
        let node = self.pow_of(id);
        match node.exponent {
            None => node.base,
            Some(_) => Unary::Postfix(Postfix::from(Primary::Paren(id))),
        }
    }

    fn postfix_of(&self, id: ExprId) -> Postfix {
        match self.unary_of(id) {
            Unary::Postfix(p) => p,
            _ => Postfix::from(Primary::Paren(id)),
        }
    }

    // ── Types ───────────────────────────────────────────────────

    pub fn ty(&mut self, name: &str) -> TypeExprId {
        let span = self.span(name.len());
        self.program.type_exprs.alloc(TypeExpr {
            kind: TypeExprKind::Named {
                name: SmolStr::new(name),
                unit: None,
            },
            span,
        })
    }

    pub fn ty_with_unit(&mut self, name: &str, unit: &str) -> TypeExprId {
        let span = self.span(name.len() + unit.len() + 1);
        self.program.type_exprs.alloc(TypeExpr {
            kind: TypeExprKind::Named {
                name: SmolStr::new(name),
                unit: Some(SmolStr::new(unit)),
            },
            span,
        })
    }

    pub fn chan_ty(&mut self, elem: TypeExprId) -> TypeExprId {
        let span = self.span(4).merge(self.program.type_exprs[elem].span);
        self.program.type_exprs.alloc(TypeExpr {
            kind: TypeExprKind::Chan(elem),
            span,
        })
    }

    pub fn series_ty(&mut self, elem: TypeExprId) -> TypeExprId {
        let span = self.span(6).merge(self.program.type_exprs[elem].span);
        self.program.type_exprs.alloc(TypeExpr {
            kind: TypeExprKind::Series(elem),
            span,
        })
    }

    // ── Statements ──────────────────────────────────────────────

    fn stmt(&mut self, kind: StmtKind) -> StmtId {
        let span = self.span(1);
        self.program.stmts.alloc(Stmt { kind, span })
    }

    pub fn decl(&mut self, name: &str, ty: Option<TypeExprId>, value: ExprId) -> StmtId {
        self.stmt(StmtKind::VarDecl {
            name: SmolStr::new(name),
            ty,
            value,
            stateful: false,
        })
    }

    pub fn stateful(&mut self, name: &str, ty: Option<TypeExprId>, value: ExprId) -> StmtId {
        self.stmt(StmtKind::VarDecl {
            name: SmolStr::new(name),
            ty,
            value,
            stateful: true,
        })
    }

    pub fn assign(&mut self, name: &str, value: ExprId) -> StmtId {
        self.stmt(StmtKind::Assign {
            name: SmolStr::new(name),
            value,
        })
    }

    pub fn if_else(
        &mut self,
        condition: ExprId,
        body: Block,
        else_ifs: Vec<ElseIf>,
        else_body: Option<Block>,
    ) -> StmtId {
        self.stmt(StmtKind::If {
            condition,
            body,
            else_ifs,
            else_body,
        })
    }

    pub fn ret(&mut self, value: Option<ExprId>) -> StmtId {
        self.stmt(StmtKind::Return(value))
    }

    pub fn write(&mut self, value: ExprId, channel: &str) -> StmtId {
        self.stmt(StmtKind::ChannelWrite {
            value,
            channel: SmolStr::new(channel),
        })
    }

    pub fn read(&mut self, name: &str, channel: &str, blocking: bool) -> StmtId {
        self.stmt(StmtKind::ChannelRead {
            name: SmolStr::new(name),
            channel: SmolStr::new(channel),
            blocking,
        })
    }

    pub fn expr_stmt(&mut self, expr: ExprId) -> StmtId {
        self.stmt(StmtKind::Expr(expr))
    }

    pub fn block(&mut self, stmts: Vec<StmtId>) -> Block {
        let span = stmts
            .iter()
            .map(|s| self.program.stmts[*s].span)
            .reduce(Span::merge)
            .unwrap_or_default();
        Block { stmts, span }
    }

    // ── Declarations ────────────────────────────────────────────

    pub fn param(&mut self, name: &str, ty: TypeExprId) -> ParamDecl {
        let span = self.span(name.len());
        ParamDecl {
            name: SmolStr::new(name),
            ty,
            default: None,
            span,
        }
    }

    pub fn param_with_default(&mut self, name: &str, ty: TypeExprId, default: ExprId) -> ParamDecl {
        ParamDecl {
            default: Some(default),
            ..self.param(name, ty)
        }
    }

    /// Starts a `func` declaration; finish it with [`FunctionBuilder::body`].
    pub fn func(&mut self, name: &str) -> FunctionBuilder<'_> {
        FunctionBuilder::new(self, name, FunctionKind::Func)
    }

    pub fn task(&mut self, name: &str) -> FunctionBuilder<'_> {
        FunctionBuilder::new(self, name, FunctionKind::Task)
    }
}

pub struct FunctionBuilder<'b> {
    builder: &'b mut ProgramBuilder,
    decl: FunctionDecl,
}

impl<'b> FunctionBuilder<'b> {
    fn new(builder: &'b mut ProgramBuilder, name: &str, kind: FunctionKind) -> Self {
        let span = builder.span(name.len());
        let decl = FunctionDecl {
            name: SmolStr::new(name),
            kind,
            config: Vec::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            body: Block::default(),
            span,
        };
        Self { builder, decl }
    }

    pub fn config(mut self, param: ParamDecl) -> Self {
        self.decl.config.push(param);
        self
    }

    pub fn input(mut self, param: ParamDecl) -> Self {
        self.decl.inputs.push(param);
        self
    }

    pub fn output(mut self, param: ParamDecl) -> Self {
        self.decl.outputs.push(param);
        self
    }

    /// Declares the single returned output.
    pub fn returns(mut self, ty: TypeExprId) -> Self {
        let param = self.builder.param(DEFAULT_OUTPUT, ty);
        self.decl.outputs.push(param);
        self
    }

    pub fn body(mut self, stmts: Vec<StmtId>) {
        self.decl.body = self.builder.block(stmts);
        self.builder.program.items.push(Item::Function(self.decl));
    }
}
