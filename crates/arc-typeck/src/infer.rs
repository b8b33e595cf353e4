//! Expression type inference.
//!
//! Walks the precedence ladder top-down. Inference never fails: problems
//! are recorded as diagnostics and the offending subtree becomes
//! [`Type::Invalid`]. Numeric literals infer as fresh type variables whose
//! resolution is left to the solver, through the constraints recorded
//! here.

use arc_ast::{
    is_float_text, Additive, BinaryOp, Equality, ExprId, Literal, LiteralKind, LogicalAnd,
    LogicalOr, Multiplicative, Postfix, Power, Primary, Program, Relational, Span, Suffix, Unary,
    DEFAULT_OUTPUT,
};
use la_arena::ArenaMap;
use smol_str::SmolStr;

use crate::check::{check, check_assignment, compatible};
use crate::constraints::ConstraintSystem;
use crate::error::{TypeError, TypeErrorKind};
use crate::resolve::resolve_type_expr;
use crate::scope::{ScopeId, ScopeTree};
use crate::types::{FunctionType, Param, Type, VarConstraint};
use crate::units;

/// Name of the type variable created for the literal at `span`.
pub fn literal_var_name(span: Span) -> SmolStr {
    SmolStr::new(format!("lit_{}_{}", span.start, span.end))
}

/// Signatures of functions every program can call without declaring.
pub fn builtin(name: &str) -> Option<Type> {
    let output = |ty| vec![Param::new(DEFAULT_OUTPUT, ty)];
    match name {
        "len" => Some(Type::function(FunctionType {
            inputs: vec![Param::new("value", Type::Invalid)],
            outputs: output(Type::i64()),
            config: Vec::new(),
        })),
        "now" => Some(Type::function(FunctionType {
            inputs: Vec::new(),
            outputs: output(Type::i64()),
            config: Vec::new(),
        })),
        _ => None,
    }
}

/// Whether an explicit `T(value)` cast is allowed.
pub fn castable(from: &Type, to: &Type) -> bool {
    if from.is_invalid() || from.is_variable() {
        return to.is_numeric();
    }
    from == to || (from.is_numeric() && to.is_numeric())
}

pub struct Inference<'a> {
    program: &'a Program,
    scopes: &'a ScopeTree,
    scope: ScopeId,
    constraints: &'a mut ConstraintSystem,
    errors: &'a mut Vec<TypeError>,
    types: &'a mut ArenaMap<ExprId, Type>,
}

/// Infers a single expression in `scope`, returning its type together
/// with any diagnostics.
pub fn infer_expr(
    program: &Program,
    scopes: &ScopeTree,
    scope: ScopeId,
    constraints: &mut ConstraintSystem,
    expr: ExprId,
) -> (Type, Vec<TypeError>) {
    let mut errors = Vec::new();
    let mut types = ArenaMap::default();
    let ty = Inference::new(program, scopes, scope, constraints, &mut errors, &mut types).infer(expr);
    (ty, errors)
}

impl<'a> Inference<'a> {
    pub fn new(
        program: &'a Program,
        scopes: &'a ScopeTree,
        scope: ScopeId,
        constraints: &'a mut ConstraintSystem,
        errors: &'a mut Vec<TypeError>,
        types: &'a mut ArenaMap<ExprId, Type>,
    ) -> Self {
        Self {
            program,
            scopes,
            scope,
            constraints,
            errors,
            types,
        }
    }

    pub fn infer(&mut self, id: ExprId) -> Type {
        let program = self.program;
        let expr = &program.exprs[id];
        let ty = self.logical_or(&expr.root, expr.span);
        self.types.insert(id, ty.clone());
        ty
    }

    fn error(&mut self, kind: TypeErrorKind, span: Span) {
        self.errors.push(TypeError::new(kind, span));
    }

    /// Hands an operand pair to the checker, which records a constraint
    /// for literals and reports concrete mismatches.
    fn check_operands(&mut self, left: &Type, right: &Type, op: BinaryOp, span: Span) {
        if !self.dimensions_agree(left, right, op, span) {
            return;
        }
        let reason = format!("operands of '{}'", op.symbol());
        if let Err(e) = check(
            self.constraints,
            &left.unwrap_elem(),
            &right.unwrap_elem(),
            span,
            &reason,
        ) {
            self.errors.push(e);
        }
    }

    /// Additive, remainder and comparison operands must measure the same
    /// dimension when both carry a unit. Literal variables carry their
    /// unit too, so this runs before any constraint is recorded.
    fn dimensions_agree(&mut self, left: &Type, right: &Type, op: BinaryOp, span: Span) -> bool {
        if matches!(op, BinaryOp::Mul | BinaryOp::Div | BinaryOp::Pow) {
            return true;
        }
        let (left, right) = (left.unwrap_elem(), right.unwrap_elem());
        match (left.unit(), right.unit()) {
            (Some(a), Some(b)) if a.dimension != b.dimension => {
                self.error(
                    TypeErrorKind::IncompatibleOperandUnits {
                        op: op.symbol().into(),
                        left: a.name.clone(),
                        right: b.name.clone(),
                    },
                    span,
                );
                false
            }
            _ => true,
        }
    }

    /// The exponent only has to be a dimensionless number. A base with a
    /// unit additionally needs a literal integer exponent.
    fn check_exponent(&mut self, base: &Type, exponent: &'a Power, exp: &Type, span: Span) {
        let exp = exp.unwrap_elem();
        if exp.is_invalid() {
            return;
        }
        if let Some(unit) = exp.unit() {
            self.error(TypeErrorKind::DimensionedExponent(unit.name.clone()), span);
            return;
        }
        if !exp.is_numeric() && !exp.is_variable() {
            self.error(TypeErrorKind::NonNumericExponent(exp.to_string()), span);
            return;
        }
        let Some(unit) = base.unwrap_elem().unit().cloned() else {
            return;
        };
        let program = self.program;
        let integer_literal = exponent.exponent.is_none()
            && program
                .literal_of_unary(&exponent.base)
                .is_some_and(|(lit, _)| {
                    matches!(&lit.kind, LiteralKind::Number { text, unit: None } if !is_float_text(text))
                });
        if !integer_literal {
            self.error(TypeErrorKind::NonLiteralExponent(unit.name), span);
        }
    }

    // ── Boolean levels ──────────────────────────────────────────

    fn logical_or(&mut self, node: &'a LogicalOr, span: Span) -> Type {
        let first = self.logical_and(&node.first, span);
        if node.rest.is_empty() {
            return first;
        }
        for operand in &node.rest {
            self.logical_and(operand, span);
        }
        Type::u8()
    }

    fn logical_and(&mut self, node: &'a LogicalAnd, span: Span) -> Type {
        let first = self.equality(&node.first, span);
        if node.rest.is_empty() {
            return first;
        }
        for operand in &node.rest {
            self.equality(operand, span);
        }
        Type::u8()
    }

    fn equality(&mut self, node: &'a Equality, span: Span) -> Type {
        let first = self.relational(&node.first, span);
        if node.rest.is_empty() {
            return first;
        }
        let mut left = first;
        for (op, operand) in &node.rest {
            let right = self.relational(operand, span);
            self.check_operands(&left, &right, (*op).into(), span);
            left = right;
        }
        Type::u8()
    }

    fn relational(&mut self, node: &'a Relational, span: Span) -> Type {
        let first = self.additive(&node.first, span);
        if node.rest.is_empty() {
            return first;
        }
        let mut left = first;
        for (op, operand) in &node.rest {
            let right = self.additive(operand, span);
            self.check_operands(&left, &right, (*op).into(), span);
            left = right;
        }
        Type::u8()
    }

    // ── Arithmetic levels ───────────────────────────────────────

    fn additive(&mut self, node: &'a Additive, span: Span) -> Type {
        let first = self.multiplicative(&node.first, span);
        if node.rest.is_empty() {
            return first;
        }
        let rest: Vec<_> = node
            .rest
            .iter()
            .map(|(op, operand)| (BinaryOp::from(*op), self.multiplicative(operand, span)))
            .collect();
        self.fold_arithmetic(first, rest, span)
    }

    fn multiplicative(&mut self, node: &'a Multiplicative, span: Span) -> Type {
        let first = self.power(&node.first, span);
        if node.rest.is_empty() {
            return first;
        }
        let rest: Vec<_> = node
            .rest
            .iter()
            .map(|(op, operand)| (BinaryOp::from(*op), self.power(operand, span)))
            .collect();
        self.fold_arithmetic(first, rest, span)
    }

    /// Folds operand types left to right. The result is the first
    /// operand's element type, promoted to a series if any operand is
    /// one. Folding stops at the first concretely incompatible operand.
    fn fold_arithmetic(&mut self, first: Type, rest: Vec<(BinaryOp, Type)>, span: Span) -> Type {
        let series = first.is_series() || rest.iter().any(|(_, ty)| ty.is_series());
        let mut elem = first.unwrap_elem();
        for (op, ty) in &rest {
            let next = ty.unwrap_elem();
            self.check_operands(&elem, &next, *op, span);
            if next.is_variable() {
                continue;
            }
            if elem.is_variable() && !next.is_invalid() {
                elem = next;
                continue;
            }
            if !compatible(&elem, &next) {
                break;
            }
        }
        match elem {
            Type::Invalid => Type::Invalid,
            elem if series => Type::series(elem),
            elem => elem,
        }
    }

    fn power(&mut self, node: &'a Power, span: Span) -> Type {
        let base = self.unary(&node.base, span);
        match &node.exponent {
            None => base,
            Some(exponent) => {
                let exp = self.power(exponent, span);
                self.check_exponent(&base, exponent, &exp, span);
                base.unwrap_elem()
            }
        }
    }

    fn unary(&mut self, node: &'a Unary, span: Span) -> Type {
        match node {
            Unary::Neg(inner) | Unary::Not(inner) => match self.unary(inner, span) {
                Type::Chan(elem) => *elem,
                other => other,
            },
            Unary::Postfix(postfix) => self.postfix(postfix, span),
        }
    }

    // ── Postfix and primary ─────────────────────────────────────

    fn postfix(&mut self, node: &'a Postfix, span: Span) -> Type {
        let mut ty = self.primary(&node.primary, span);
        for suffix in &node.suffixes {
            ty = match suffix {
                Suffix::Call(args) => self.call(&node.primary, &ty, args, span),
                Suffix::Index(index) => {
                    self.infer(*index);
                    match ty {
                        Type::Series(elem) => *elem,
                        Type::Invalid => Type::Invalid,
                        other => {
                            self.error(TypeErrorKind::NotIndexable(other.to_string()), span);
                            Type::Invalid
                        }
                    }
                }
                Suffix::Slice { start, end } => {
                    for bound in start.iter().chain(end) {
                        self.infer(*bound);
                    }
                    match ty {
                        Type::Series(_) | Type::Invalid => ty,
                        other => {
                            self.error(TypeErrorKind::NotIndexable(other.to_string()), span);
                            Type::Invalid
                        }
                    }
                }
            };
        }
        ty
    }

    fn call(&mut self, callee: &Primary, ty: &Type, args: &'a [ExprId], span: Span) -> Type {
        let program = self.program;
        let arg_types: Vec<(Type, bool)> = args
            .iter()
            .map(|arg| (self.infer(*arg), program.literal_of(*arg).is_some()))
            .collect();
        let name = match callee {
            Primary::Ident { name, .. } => name.clone(),
            _ => SmolStr::new_static("<expression>"),
        };
        let func = match ty {
            Type::Function(func) => func,
            Type::Invalid => return Type::Invalid,
            _ => {
                self.error(TypeErrorKind::NotCallable(name), span);
                return Type::Invalid;
            }
        };

        let required = func.inputs.iter().filter(|p| p.default.is_none()).count();
        if args.len() < required || args.len() > func.inputs.len() {
            self.error(
                TypeErrorKind::ArgumentCount {
                    name: name.clone(),
                    expected: func.inputs.len(),
                    actual: args.len(),
                },
                span,
            );
        }
        for ((arg_ty, literal), param) in arg_types.iter().zip(&func.inputs) {
            let reason = format!("argument '{}' of '{}'", param.name, name);
            if let Err(e) =
                check_assignment(self.constraints, &param.ty, arg_ty, *literal, span, &reason)
            {
                self.errors.push(e);
            }
        }
        for param in func.config.iter().filter(|p| p.default.is_none()) {
            self.error(
                TypeErrorKind::MissingConfig {
                    function: name.clone(),
                    param: param.name.clone(),
                },
                span,
            );
        }

        func.outputs
            .first()
            .map(|p| p.ty.clone())
            .unwrap_or(Type::Invalid)
    }

    fn primary(&mut self, node: &'a Primary, span: Span) -> Type {
        match node {
            Primary::Ident { name, .. } => match self.scopes.resolve(self.scope, name) {
                Ok(sym) => sym.ty.clone(),
                Err(_) => builtin(name).unwrap_or(Type::Invalid),
            },
            Primary::Literal(lit) => self.literal(lit),
            Primary::Paren(inner) => self.infer(*inner),
            Primary::Cast { ty, value } => {
                let from = self.infer(*value);
                match resolve_type_expr(self.program, *ty) {
                    Ok(to) => {
                        if !castable(&from, &to) {
                            self.error(
                                TypeErrorKind::InvalidCast {
                                    from: from.to_string(),
                                    to: to.to_string(),
                                },
                                span,
                            );
                        }
                        to
                    }
                    Err(e) => {
                        self.errors.push(e);
                        Type::Invalid
                    }
                }
            }
            Primary::Series { elems, span } => {
                let types: Vec<Type> = elems.iter().map(|e| self.infer(*e)).collect();
                let Some(first) = types.first() else {
                    let name = SmolStr::new(format!("series_{}_{}", span.start, span.end));
                    return Type::series(Type::variable(name, None));
                };
                let mut elem = first.clone();
                for ty in &types[1..] {
                    if let Err(e) = check(self.constraints, &elem, ty, *span, "series elements") {
                        self.errors.push(e);
                    }
                    if elem.is_variable() && !ty.is_variable() {
                        elem = ty.clone();
                    }
                }
                match elem {
                    Type::Scalar { .. } | Type::Variable { .. } => Type::series(elem),
                    Type::Invalid => Type::Invalid,
                    other => {
                        self.error(TypeErrorKind::SeriesElement(other.to_string()), *span);
                        Type::Invalid
                    }
                }
            }
        }
    }

    fn literal(&mut self, lit: &Literal) -> Type {
        match &lit.kind {
            LiteralKind::Number { text, unit } => {
                let constraint = if is_float_text(text) {
                    VarConstraint::FloatConstant
                } else {
                    VarConstraint::IntegerConstant
                };
                let var = Type::variable(literal_var_name(lit.span), Some(constraint));
                match unit {
                    None => var,
                    Some(name) => match units::resolve(name) {
                        Some(unit) => var.with_unit(unit),
                        None => {
                            self.error(TypeErrorKind::UnknownUnit(name.clone()), lit.span);
                            Type::Invalid
                        }
                    },
                }
            }
            LiteralKind::Str(_) => Type::string(),
            LiteralKind::Bool(_) => Type::u8(),
        }
    }
}
