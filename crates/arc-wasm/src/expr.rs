//! Expression compilation.
//!
//! Each method leaves one value on the stack and returns its concrete
//! type. Calls to functions without a result leave nothing and report
//! [`Type::Invalid`]. The `hint` is the type the surrounding context
//! expects; it only decides the kind of numeric literals.

use arc_ast::{
    is_float_text, Additive, BinaryOp, Equality, ExprId, LiteralKind, LogicalAnd, LogicalOr,
    Multiplicative, Postfix, Power, Primary, Relational, Suffix, Unary, DEFAULT_OUTPUT,
};
use arc_typeck::{
    parse_numeric, resolve_type_expr, FunctionType, Kind, Symbol, SymbolKind, Type, Value,
};
use smol_str::SmolStr;
use wasm_encoder::{Instruction, ValType};

use crate::bindings::{ArithOp, CompareOp, GenericOp, HostOp, PrimitiveType};
use crate::error::CompileError;
use crate::types::{is_concrete, kind_val_type};
use crate::{elem_primitive, primitive, representable, Compiler};

/// An operand of a binary chain, one precedence level below the chain.
#[derive(Clone, Copy)]
enum Operand<'a> {
    Relational(&'a Relational),
    Additive(&'a Additive),
    Multiplicative(&'a Multiplicative),
    Power(&'a Power),
}

impl<'a> Compiler<'a> {
    pub(crate) fn expr(&mut self, id: ExprId, hint: Option<&Type>) -> Result<Type, CompileError> {
        let program = self.program;
        self.logical_or(&program.exprs[id].root, hint)
    }

    fn operand(&mut self, node: Operand<'a>, hint: Option<&Type>) -> Result<Type, CompileError> {
        match node {
            Operand::Relational(node) => self.relational(node, hint),
            Operand::Additive(node) => self.additive(node, hint),
            Operand::Multiplicative(node) => self.multiplicative(node, hint),
            Operand::Power(node) => self.power(node, hint),
        }
    }

    // ── Logical ─────────────────────────────────────────────────

    fn logical_or(&mut self, node: &'a LogicalOr, hint: Option<&Type>) -> Result<Type, CompileError> {
        if node.rest.is_empty() {
            return self.logical_and(&node.first, hint);
        }
        let first = self.logical_and(&node.first, None)?;
        self.truthy(&first)?;
        for operand in &node.rest {
            self.func.code.if_(Some(ValType::I32)).i32_const(1).else_();
            let ty = self.logical_and(operand, None)?;
            self.truthy(&ty)?;
            self.func.code.end();
        }
        Ok(Type::u8())
    }

    fn logical_and(&mut self, node: &'a LogicalAnd, hint: Option<&Type>) -> Result<Type, CompileError> {
        if node.rest.is_empty() {
            return self.equality(&node.first, hint);
        }
        let first = self.equality(&node.first, None)?;
        self.truthy(&first)?;
        for operand in &node.rest {
            self.func.code.if_(Some(ValType::I32));
            let ty = self.equality(operand, None)?;
            self.truthy(&ty)?;
            self.func.code.else_().i32_const(0).end();
        }
        Ok(Type::u8())
    }

    /// Replaces a scalar with `1` if it is non-zero and `0` otherwise.
    pub(crate) fn truthy(&mut self, ty: &Type) -> Result<(), CompileError> {
        let vt = match ty {
            Type::Scalar { kind, .. } if kind.is_numeric() => kind_val_type(*kind),
            _ => {
                return Err(CompileError::unsupported(format!(
                    "{} used as a condition",
                    ty
                )))
            }
        };
        let ne = match vt {
            ValType::I64 => Instruction::I64Ne,
            ValType::F32 => Instruction::F32Ne,
            ValType::F64 => Instruction::F64Ne,
            _ => Instruction::I32Ne,
        };
        self.func.code.zero(vt).instruction(&ne);
        Ok(())
    }

    // ── Binary chains ───────────────────────────────────────────

    fn equality(&mut self, node: &'a Equality, hint: Option<&Type>) -> Result<Type, CompileError> {
        if node.rest.is_empty() {
            return self.relational(&node.first, hint);
        }
        let rest = node
            .rest
            .iter()
            .map(|(op, operand)| (BinaryOp::from(*op), Operand::Relational(operand)))
            .collect();
        self.chain(Operand::Relational(&node.first), rest, None)
    }

    fn relational(&mut self, node: &'a Relational, hint: Option<&Type>) -> Result<Type, CompileError> {
        if node.rest.is_empty() {
            return self.additive(&node.first, hint);
        }
        let rest = node
            .rest
            .iter()
            .map(|(op, operand)| (BinaryOp::from(*op), Operand::Additive(operand)))
            .collect();
        self.chain(Operand::Additive(&node.first), rest, None)
    }

    fn additive(&mut self, node: &'a Additive, hint: Option<&Type>) -> Result<Type, CompileError> {
        if node.rest.is_empty() {
            return self.multiplicative(&node.first, hint);
        }
        let rest = node
            .rest
            .iter()
            .map(|(op, operand)| (BinaryOp::from(*op), Operand::Multiplicative(operand)))
            .collect();
        self.chain(Operand::Multiplicative(&node.first), rest, hint)
    }

    fn multiplicative(&mut self, node: &'a Multiplicative, hint: Option<&Type>) -> Result<Type, CompileError> {
        if node.rest.is_empty() {
            return self.power(&node.first, hint);
        }
        let rest = node
            .rest
            .iter()
            .map(|(op, operand)| (BinaryOp::from(*op), Operand::Power(operand)))
            .collect();
        self.chain(Operand::Power(&node.first), rest, hint)
    }

    /// Compiles `first op1 second op2 ...` left to right. The first
    /// operand with a known type decides the kind of every numeric
    /// literal in the chain, ahead of the surrounding hint, so
    /// `1 + 2 > x` compiles its literals as `x`'s kind.
    fn chain(
        &mut self,
        first: Operand<'a>,
        rest: Vec<(BinaryOp, Operand<'a>)>,
        hint: Option<&Type>,
    ) -> Result<Type, CompileError> {
        let peeked = std::iter::once(first)
            .chain(rest.iter().map(|(_, operand)| *operand))
            .find_map(|operand| self.peek(operand))
            .filter(Type::is_numeric);
        let mut left = self.operand(first, peeked.as_ref().or(hint))?;
        for (op, operand) in rest {
            let right = self.operand(operand, Some(&left.unwrap_elem()))?;
            left = self.binary(op, &left, &right)?;
        }
        Ok(left)
    }

    /// Applies `op` to the two values on top of the stack.
    fn binary(&mut self, op: BinaryOp, left: &Type, right: &Type) -> Result<Type, CompileError> {
        match (left, right) {
            (Type::Series(_), Type::Series(_)) => self.series_series(op, left, right),
            (Type::Series(_), _) => self.series_scalar(op, left, right),
            (_, Type::Series(_)) => self.scalar_series(op, left, right),
            _ if left.is_string() && right.is_string() => self.string_binary(op),
            (Type::Scalar { kind: a, .. }, Type::Scalar { kind: b, .. })
                if a == b && a.is_numeric() =>
            {
                self.scalar_binary(op, left, *a)
            }
            _ => Err(operator_error(op, left, right)),
        }
    }

    fn scalar_binary(&mut self, op: BinaryOp, ty: &Type, kind: Kind) -> Result<Type, CompileError> {
        if let Some(cmp) = CompareOp::from_binary(op) {
            self.func.code.instruction(&compare_instruction(cmp, kind));
            return Ok(Type::u8());
        }
        let instruction = ArithOp::from_binary(op)
            .and_then(|arith| arith_instruction(arith, kind))
            .ok_or_else(|| operator_error(op, ty, ty))?;
        self.func.code.instruction(&instruction);
        self.normalize(kind);
        Ok(ty.clone())
    }

    fn string_binary(&mut self, op: BinaryOp) -> Result<Type, CompileError> {
        match op {
            BinaryOp::Add => {
                let call = self.generic_import(GenericOp::StringConcat)?;
                self.func.code.call(call);
                Ok(Type::string())
            }
            BinaryOp::Eq | BinaryOp::Ne => {
                let call = self.generic_import(GenericOp::StringEqual)?;
                self.func.code.call(call);
                if op == BinaryOp::Ne {
                    self.func.code.instruction(&Instruction::I32Eqz);
                }
                Ok(Type::u8())
            }
            _ => Err(operator_error(op, &Type::string(), &Type::string())),
        }
    }

    fn series_series(&mut self, op: BinaryOp, left: &Type, right: &Type) -> Result<Type, CompileError> {
        if left.elem().and_then(Type::kind) != right.elem().and_then(Type::kind) {
            return Err(operator_error(op, left, right));
        }
        let prim = elem_primitive(left)?;
        let (host, result) = match (CompareOp::from_binary(op), ArithOp::from_binary(op)) {
            (Some(cmp), _) => (HostOp::SeriesCompare(cmp), Type::series(Type::u8())),
            (_, Some(arith)) => (HostOp::SeriesSeries(arith), left.clone()),
            _ => return Err(operator_error(op, left, right)),
        };
        let call = self.import(host, prim)?;
        self.func.code.call(call);
        Ok(result)
    }

    fn series_scalar(&mut self, op: BinaryOp, series: &Type, scalar: &Type) -> Result<Type, CompileError> {
        if series.elem().and_then(Type::kind) != scalar.kind() {
            return Err(operator_error(op, series, scalar));
        }
        let prim = elem_primitive(series)?;
        let (host, result) = match (CompareOp::from_binary(op), ArithOp::from_binary(op)) {
            (Some(cmp), _) => (HostOp::SeriesCompareScalar(cmp), Type::series(Type::u8())),
            (_, Some(arith)) => (HostOp::SeriesElement(arith), series.clone()),
            _ => return Err(operator_error(op, series, scalar)),
        };
        let call = self.import(host, prim)?;
        self.func.code.call(call);
        Ok(result)
    }

    /// `scalar op series`. Subtraction and division have reversed host
    /// imports; commutative operators and comparisons swap operands.
    fn scalar_series(&mut self, op: BinaryOp, scalar: &Type, series: &Type) -> Result<Type, CompileError> {
        if series.elem().and_then(Type::kind) != scalar.kind() {
            return Err(operator_error(op, scalar, series));
        }
        let prim = elem_primitive(series)?;
        let (host, swap, result) = match (CompareOp::from_binary(op), ArithOp::from_binary(op)) {
            (Some(cmp), _) => (
                HostOp::SeriesCompareScalar(cmp.flip()),
                true,
                Type::series(Type::u8()),
            ),
            (_, Some(arith)) if arith.is_commutative() => {
                (HostOp::SeriesElement(arith), true, series.clone())
            }
            (_, Some(arith)) if ArithOp::REVERSIBLE.contains(&arith) => {
                (HostOp::SeriesElementReverse(arith), false, series.clone())
            }
            _ => return Err(operator_error(op, scalar, series)),
        };
        let call = self.import(host, prim)?;
        if swap {
            self.swap(prim.val_type(), ValType::I32);
        }
        self.func.code.call(call);
        Ok(result)
    }

    /// Exchanges the two values on top of the stack.
    fn swap(&mut self, below: ValType, top: ValType) {
        let upper = self.func.alloc(top);
        let lower = self.func.alloc(below);
        self.func
            .code
            .local_set(upper)
            .local_set(lower)
            .local_get(upper)
            .local_get(lower);
    }

    // ── Peeking ─────────────────────────────────────────────────
    //
    // Element type an operand will compile to, found without emitting
    // code. Numeric literals fix nothing on their own.

    fn peek(&self, node: Operand<'a>) -> Option<Type> {
        match node {
            Operand::Relational(node) if !node.rest.is_empty() => Some(Type::u8()),
            Operand::Relational(node) => self.peek(Operand::Additive(&node.first)),
            Operand::Additive(node) => std::iter::once(&node.first)
                .chain(node.rest.iter().map(|(_, operand)| operand))
                .find_map(|operand| self.peek(Operand::Multiplicative(operand))),
            Operand::Multiplicative(node) => std::iter::once(&node.first)
                .chain(node.rest.iter().map(|(_, operand)| operand))
                .find_map(|operand| self.peek(Operand::Power(operand))),
            Operand::Power(node) => self.peek_unary(&node.base),
        }
    }

    fn peek_expr(&self, id: ExprId) -> Option<Type> {
        let program = self.program;
        let root = &program.exprs[id].root;
        let equality = &root.first.first;
        if !root.rest.is_empty() || !root.first.rest.is_empty() || !equality.rest.is_empty() {
            return Some(Type::u8());
        }
        self.peek(Operand::Relational(&equality.first))
    }

    fn peek_unary(&self, node: &'a Unary) -> Option<Type> {
        match node {
            Unary::Neg(inner) => self.peek_unary(inner),
            Unary::Not(_) => Some(Type::u8()),
            Unary::Postfix(postfix) => self.peek_postfix(postfix),
        }
    }

    fn peek_postfix(&self, node: &'a Postfix) -> Option<Type> {
        let (mut ty, suffixes) = match (&node.primary, node.suffixes.split_first()) {
            (Primary::Ident { name, .. }, Some((Suffix::Call(_), rest))) => {
                (self.peek_call(name)?, rest)
            }
            (primary, _) => (self.peek_primary(primary)?, &node.suffixes[..]),
        };
        for suffix in suffixes {
            match suffix {
                Suffix::Index(_) => ty = ty.elem()?.clone(),
                Suffix::Slice { .. } => {}
                Suffix::Call(_) => return None,
            }
        }
        Some(ty.unwrap_elem()).filter(is_concrete)
    }

    fn peek_call(&self, name: &SmolStr) -> Option<Type> {
        match self.resolve(name) {
            Ok(Symbol {
                ty: Type::Function(sig),
                ..
            }) => match sig.outputs.as_slice() {
                [only] if only.name == DEFAULT_OUTPUT => Some(only.ty.clone()),
                _ => None,
            },
            Ok(_) => None,
            Err(_) if name == "len" || name == "now" => Some(Type::i64()),
            Err(_) => None,
        }
    }

    fn peek_primary(&self, node: &'a Primary) -> Option<Type> {
        match node {
            Primary::Ident { name, .. } => {
                if let Ok(local) = self.func.local(name) {
                    return Some(local.ty.clone());
                }
                let sym = self.resolve(name).ok()?;
                match sym.kind {
                    SymbolKind::Channel => sym.ty.elem().cloned(),
                    SymbolKind::Function | SymbolKind::Block => None,
                    _ => Some(sym.ty.clone()),
                }
            }
            Primary::Literal(lit) => match &lit.kind {
                LiteralKind::Number { .. } => None,
                LiteralKind::Str(_) => Some(Type::string()),
                LiteralKind::Bool(_) => Some(Type::u8()),
            },
            Primary::Paren(inner) => self.peek_expr(*inner),
            Primary::Cast { ty, .. } => resolve_type_expr(self.program, *ty).ok(),
            Primary::Series { elems, .. } => elems
                .iter()
                .find_map(|elem| self.peek_expr(*elem))
                .map(Type::series),
        }
    }

    // ── Power and unary ─────────────────────────────────────────

    fn power(&mut self, node: &'a Power, hint: Option<&Type>) -> Result<Type, CompileError> {
        let base = self.unary(&node.base, hint)?;
        let Some(exponent) = &node.exponent else {
            return Ok(base);
        };
        let kind = match &base {
            Type::Scalar { kind, .. } if kind.is_numeric() => *kind,
            _ => return Err(CompileError::unsupported(format!("{} raised to a power", base))),
        };
        let exp = self.power(exponent, Some(&base))?;
        self.convert(&exp, &base, true)?;
        let call = self.import(HostOp::MathPow, PrimitiveType::from_kind(kind))?;
        self.func.code.call(call);
        Ok(base)
    }

    fn unary(&mut self, node: &'a Unary, hint: Option<&Type>) -> Result<Type, CompileError> {
        match node {
            Unary::Neg(inner) => {
                let program = self.program;
                if let Some((lit, negated)) = program.literal_of_unary(node) {
                    if let LiteralKind::Number { text, unit } = &lit.kind {
                        return self.number(text, unit.as_deref(), negated, hint);
                    }
                }
                let ty = self.unary(inner, hint)?;
                self.negate(&ty)?;
                Ok(ty)
            }
            Unary::Not(inner) => {
                let ty = self.unary(inner, None)?;
                self.not(&ty)
            }
            Unary::Postfix(postfix) => self.postfix(postfix, hint),
        }
    }

    fn negate(&mut self, ty: &Type) -> Result<(), CompileError> {
        match ty {
            Type::Series(_) => {
                let call = self.import(HostOp::SeriesNegate, elem_primitive(ty)?)?;
                self.func.code.call(call);
            }
            Type::Scalar { kind: Kind::F32, .. } => {
                self.func.code.instruction(&Instruction::F32Neg);
            }
            Type::Scalar { kind: Kind::F64, .. } => {
                self.func.code.instruction(&Instruction::F64Neg);
            }
            Type::Scalar { kind, .. } if kind.is_integer() => {
                if kind_val_type(*kind) == ValType::I64 {
                    self.func.code.i64_const(-1).instruction(&Instruction::I64Mul);
                } else {
                    self.func.code.i32_const(-1).instruction(&Instruction::I32Mul);
                    self.normalize(*kind);
                }
            }
            _ => return Err(CompileError::unsupported(format!("negation of {}", ty))),
        }
        Ok(())
    }

    fn not(&mut self, ty: &Type) -> Result<Type, CompileError> {
        match ty {
            Type::Series(elem) if elem.kind() == Some(Kind::U8) => {
                let call = self.generic_import(GenericOp::SeriesNotU8)?;
                self.func.code.call(call);
                Ok(ty.clone())
            }
            Type::Scalar { kind, .. } if kind.is_numeric() => {
                let code = &mut self.func.code;
                match kind_val_type(*kind) {
                    ValType::I64 => code.instruction(&Instruction::I64Eqz),
                    ValType::F32 => code.f32_const(0.0).instruction(&Instruction::F32Eq),
                    ValType::F64 => code.f64_const(0.0).instruction(&Instruction::F64Eq),
                    _ => code.instruction(&Instruction::I32Eqz),
                };
                Ok(Type::u8())
            }
            _ => Err(CompileError::unsupported(format!("logical not of {}", ty))),
        }
    }

    // ── Postfix ─────────────────────────────────────────────────

    fn postfix(&mut self, node: &'a Postfix, hint: Option<&Type>) -> Result<Type, CompileError> {
        let (mut ty, suffixes) = match (&node.primary, node.suffixes.split_first()) {
            (Primary::Ident { name, .. }, Some((Suffix::Call(args), rest))) => {
                (self.call(name, args)?, rest)
            }
            (primary, None) => (self.primary(primary, hint)?, &node.suffixes[..]),
            (primary, Some(_)) => (self.primary(primary, None)?, &node.suffixes[..]),
        };
        for suffix in suffixes {
            ty = match suffix {
                Suffix::Call(_) => {
                    return Err(CompileError::unsupported(format!("calling a value of type {}", ty)))
                }
                Suffix::Index(index) => self.index(&ty, *index)?,
                Suffix::Slice { start, end } => self.slice(&ty, *start, *end)?,
            };
        }
        Ok(ty)
    }

    /// Compiles a series position as an `i32`.
    fn position(&mut self, id: ExprId) -> Result<(), CompileError> {
        let ty = self.expr(id, Some(&Type::i32()))?;
        self.convert(&ty, &Type::i32(), true)
    }

    fn index(&mut self, ty: &Type, index: ExprId) -> Result<Type, CompileError> {
        let Type::Series(elem) = ty else {
            return Err(CompileError::unsupported(format!("indexing {}", ty)));
        };
        let call = self.import(HostOp::SeriesIndex, primitive(elem)?)?;
        self.position(index)?;
        self.func.code.call(call);
        Ok((**elem).clone())
    }

    fn slice(&mut self, ty: &Type, start: Option<ExprId>, end: Option<ExprId>) -> Result<Type, CompileError> {
        if !ty.is_series() {
            return Err(CompileError::unsupported(format!("slicing {}", ty)));
        }
        let call = self.generic_import(GenericOp::SeriesSlice)?;
        match start {
            Some(id) => self.position(id)?,
            None => {
                self.func.code.i32_const(0);
            }
        }
        match end {
            Some(id) => self.position(id)?,
            None => {
                self.func.code.i32_const(-1);
            }
        }
        self.func.code.call(call);
        Ok(ty.clone())
    }

    // ── Calls ───────────────────────────────────────────────────

    fn call(&mut self, name: &SmolStr, args: &'a [ExprId]) -> Result<Type, CompileError> {
        match self.resolve(name) {
            Ok(sym) => match (&sym.kind, &sym.ty) {
                (SymbolKind::Function, Type::Function(sig)) => self.local_call(name, sig, args),
                (kind, _) => Err(CompileError::unsupported(format!(
                    "calling {} '{}'",
                    kind, name
                ))),
            },
            Err(_) if name == "len" => self.len(args),
            Err(_) if name == "now" => {
                let call = self.generic_import(GenericOp::Now)?;
                self.func.code.call(call);
                Ok(Type::i64())
            }
            Err(e) => Err(e),
        }
    }

    fn len(&mut self, args: &'a [ExprId]) -> Result<Type, CompileError> {
        let [arg] = args else {
            return Err(CompileError::unsupported(format!(
                "len with {} arguments",
                args.len()
            )));
        };
        let ty = self.expr(*arg, None)?;
        if ty.is_string() {
            let call = self.generic_import(GenericOp::StringLen)?;
            self.func.code.call(call).instruction(&Instruction::I64ExtendI32U);
        } else if ty.is_series() {
            let call = self.generic_import(GenericOp::SeriesLen)?;
            self.func.code.call(call);
        } else {
            return Err(CompileError::unsupported(format!("len of {}", ty)));
        }
        Ok(Type::i64())
    }

    /// Calls a program function. Config parameters always take their
    /// defaults; inputs missing from the call fall back to theirs.
    fn local_call(
        &mut self,
        name: &SmolStr,
        sig: &'a FunctionType,
        args: &'a [ExprId],
    ) -> Result<Type, CompileError> {
        let index = *self
            .function_indices
            .get(name)
            .ok_or_else(|| CompileError::unsupported(format!("'{}' has no body", name)))?;
        if args.len() > sig.inputs.len() {
            return Err(CompileError::unsupported(format!(
                "'{}' called with {} arguments",
                name,
                args.len()
            )));
        }

        for param in &sig.config {
            let value = param.default.as_ref().ok_or_else(|| {
                CompileError::unsupported(format!("config '{}' of '{}' has no value", param.name, name))
            })?;
            self.constant(value, &param.ty)?;
        }
        for (position, param) in sig.inputs.iter().enumerate() {
            match (args.get(position), &param.default) {
                (Some(arg), _) => {
                    let ty = self.expr(*arg, Some(&param.ty))?;
                    self.convert(&ty, &param.ty, false)?;
                }
                (None, Some(value)) => self.constant(value, &param.ty)?,
                (None, None) => {
                    return Err(CompileError::unsupported(format!(
                        "missing argument '{}' of '{}'",
                        param.name, name
                    )))
                }
            }
        }
        self.func.code.call(index);

        Ok(match sig.outputs.as_slice() {
            [only] if only.name == DEFAULT_OUTPUT => only.ty.clone(),
            _ => Type::Invalid,
        })
    }

    // ── Primary ─────────────────────────────────────────────────

    fn primary(&mut self, node: &'a Primary, hint: Option<&Type>) -> Result<Type, CompileError> {
        match node {
            Primary::Ident { name, .. } => self.ident(name),
            Primary::Literal(lit) => match &lit.kind {
                LiteralKind::Number { text, unit } => self.number(text, unit.as_deref(), false, hint),
                LiteralKind::Str(s) => self.string(s),
                LiteralKind::Bool(b) => {
                    self.func.code.i32_const(i32::from(*b));
                    Ok(Type::u8())
                }
            },
            Primary::Paren(inner) => self.expr(*inner, hint),
            Primary::Cast { ty, value } => {
                let to = resolve_type_expr(self.program, *ty)
                    .map_err(|e| CompileError::UnsupportedType(e.kind.to_string()))?;
                let from = self.expr(*value, Some(&to))?;
                self.convert(&from, &to, true)?;
                Ok(to)
            }
            Primary::Series { elems, .. } => self.series_literal(elems, hint),
        }
    }

    fn ident(&mut self, name: &SmolStr) -> Result<Type, CompileError> {
        let sym = self.resolve(name)?;
        match sym.kind {
            SymbolKind::Variable
            | SymbolKind::StatefulVariable
            | SymbolKind::Param
            | SymbolKind::Config => {
                let local = self.func.local(name)?;
                let (slot, ty) = (local.slot, local.ty.clone());
                self.func.code.local_get(slot);
                Ok(ty)
            }
            SymbolKind::Output => {
                let address = self.output_address(name, sym.id)?;
                let vt = representable(&sym.ty)?;
                self.func.code.i32_const(address as i32).load(vt, 0);
                Ok(sym.ty.clone())
            }
            SymbolKind::Channel => {
                let call = self.import(HostOp::ChannelRead, elem_primitive(&sym.ty)?)?;
                self.func.code.i32_const(sym.id as i32).call(call);
                Ok(sym.ty.unwrap_elem())
            }
            SymbolKind::Function | SymbolKind::Block => Err(CompileError::unsupported(format!(
                "{} '{}' used as a value",
                sym.kind, name
            ))),
        }
    }

    pub(crate) fn output_address(&self, name: &SmolStr, position: u32) -> Result<u32, CompileError> {
        self.func
            .outputs
            .as_ref()
            .map(|layout| layout.slot_address(position as usize))
            .ok_or_else(|| CompileError::UnallocatedLocal(name.clone()))
    }

    // ── Constants ───────────────────────────────────────────────

    fn number(
        &mut self,
        text: &str,
        unit: Option<&str>,
        negated: bool,
        hint: Option<&Type>,
    ) -> Result<Type, CompileError> {
        let text = if negated {
            format!("-{}", text)
        } else {
            text.to_string()
        };
        let target = hint.map(Type::unwrap_elem).filter(Type::is_numeric);
        let parsed = parse_numeric(&text, unit, target.as_ref())?;
        self.constant(&parsed.value, &parsed.ty)?;
        Ok(parsed.ty)
    }

    /// Places a string in the data segment and turns it into a host
    /// string handle.
    pub(crate) fn string(&mut self, s: &str) -> Result<Type, CompileError> {
        if !self.config.memory {
            return Err(CompileError::MemoryDisabled("string literals".into()));
        }
        let call = self.generic_import(GenericOp::StringFromLiteral)?;
        let address = self.module.add_data(s.as_bytes());
        self.func
            .code
            .i32_const(address as i32)
            .i32_const(s.len() as i32)
            .call(call);
        Ok(Type::string())
    }

    pub(crate) fn constant(&mut self, value: &Value, ty: &Type) -> Result<(), CompileError> {
        if let Value::Str(s) = value {
            self.string(s)?;
            return Ok(());
        }
        let code = &mut self.func.code;
        match (representable(ty)?, value) {
            (ValType::I32, Value::Int(v)) => code.i32_const(*v as i32),
            (ValType::I32, Value::Uint(v)) => code.i32_const(*v as u32 as i32),
            (ValType::I64, Value::Int(v)) => code.i64_const(*v),
            (ValType::I64, Value::Uint(v)) => code.i64_const(*v as i64),
            (ValType::F32, Value::Float(v)) => code.f32_const(*v as f32),
            (ValType::F32, Value::Int(v)) => code.f32_const(*v as f32),
            (ValType::F32, Value::Uint(v)) => code.f32_const(*v as f32),
            (ValType::F64, Value::Float(v)) => code.f64_const(*v),
            (ValType::F64, Value::Int(v)) => code.f64_const(*v as f64),
            (ValType::F64, Value::Uint(v)) => code.f64_const(*v as f64),
            _ => {
                return Err(CompileError::UnsupportedConversion {
                    from: format!("{:?}", value),
                    to: ty.to_string(),
                })
            }
        };
        Ok(())
    }

    /// `[a, b, c]`: an empty series of the element type, filled one
    /// element at a time. The element type comes from the hint, then from
    /// the first concretely typed element, then from the literal text.
    fn series_literal(&mut self, elems: &'a [ExprId], hint: Option<&Type>) -> Result<Type, CompileError> {
        let (program, analysis) = (self.program, self.analysis);
        let elem = hint
            .map(Type::unwrap_elem)
            .filter(Type::is_numeric)
            .or_else(|| {
                elems
                    .iter()
                    .filter_map(|e| analysis.type_of(*e))
                    .find(|ty| ty.is_numeric())
                    .cloned()
            })
            .unwrap_or_else(|| {
                let float = elems.iter().any(|e| {
                    matches!(
                        program.literal_of(*e),
                        Some((lit, _)) if matches!(&lit.kind, LiteralKind::Number { text, .. } if is_float_text(text))
                    )
                });
                if float {
                    Type::f64()
                } else {
                    Type::i64()
                }
            });

        let prim = primitive(&elem)?;
        let create = self.import(HostOp::SeriesCreateEmpty, prim)?;
        let set = self.import(HostOp::SeriesSetElement, prim)?;
        self.func.code.i32_const(elems.len() as i32).call(create);
        for (position, id) in elems.iter().enumerate() {
            self.func.code.i32_const(position as i32);
            let ty = self.expr(*id, Some(&elem))?;
            self.convert(&ty, &elem, false)?;
            self.func.code.call(set);
        }
        Ok(Type::series(elem))
    }
}

fn operator_error(op: BinaryOp, left: &Type, right: &Type) -> CompileError {
    CompileError::unsupported(format!("{} {} {}", left, op.symbol(), right))
}

fn compare_instruction(op: CompareOp, kind: Kind) -> Instruction<'static> {
    use CompareOp::*;
    use Instruction as I;
    let signed = kind.is_signed();
    match kind_val_type(kind) {
        ValType::I64 => match op {
            Eq => I::I64Eq,
            Ne => I::I64Ne,
            Lt if signed => I::I64LtS,
            Lt => I::I64LtU,
            Gt if signed => I::I64GtS,
            Gt => I::I64GtU,
            Le if signed => I::I64LeS,
            Le => I::I64LeU,
            Ge if signed => I::I64GeS,
            Ge => I::I64GeU,
        },
        ValType::F32 => match op {
            Eq => I::F32Eq,
            Ne => I::F32Ne,
            Lt => I::F32Lt,
            Gt => I::F32Gt,
            Le => I::F32Le,
            Ge => I::F32Ge,
        },
        ValType::F64 => match op {
            Eq => I::F64Eq,
            Ne => I::F64Ne,
            Lt => I::F64Lt,
            Gt => I::F64Gt,
            Le => I::F64Le,
            Ge => I::F64Ge,
        },
        _ => match op {
            Eq => I::I32Eq,
            Ne => I::I32Ne,
            Lt if signed => I::I32LtS,
            Lt => I::I32LtU,
            Gt if signed => I::I32GtS,
            Gt => I::I32GtU,
            Le if signed => I::I32LeS,
            Le => I::I32LeU,
            Ge if signed => I::I32GeS,
            Ge => I::I32GeU,
        },
    }
}

/// `None` for float remainder, which has no instruction.
fn arith_instruction(op: ArithOp, kind: Kind) -> Option<Instruction<'static>> {
    use ArithOp::*;
    use Instruction as I;
    let signed = kind.is_signed();
    Some(match kind_val_type(kind) {
        ValType::I64 => match op {
            Add => I::I64Add,
            Sub => I::I64Sub,
            Mul => I::I64Mul,
            Div if signed => I::I64DivS,
            Div => I::I64DivU,
            Mod if signed => I::I64RemS,
            Mod => I::I64RemU,
        },
        ValType::F32 => match op {
            Add => I::F32Add,
            Sub => I::F32Sub,
            Mul => I::F32Mul,
            Div => I::F32Div,
            Mod => return None,
        },
        ValType::F64 => match op {
            Add => I::F64Add,
            Sub => I::F64Sub,
            Mul => I::F64Mul,
            Div => I::F64Div,
            Mod => return None,
        },
        _ => match op {
            Add => I::I32Add,
            Sub => I::I32Sub,
            Mul => I::I32Mul,
            Div if signed => I::I32DivS,
            Div => I::I32DivU,
            Mod if signed => I::I32RemS,
            Mod => I::I32RemU,
        },
    })
}
