use arc_ast::Span;

use crate::constraints::ConstraintSystem;
use crate::error::{TypeError, TypeErrorKind};
use crate::types::{equal, structural_match, Kind, Type};
use crate::units::Unit;

// ── Check ────────────────────────────────────────────────────────

/// Checks that `t1` and `t2` agree, recording a constraint instead of
/// deciding whenever a type variable is involved.
///
/// Invalid types always pass. Matching chan/series wrappers are checked
/// element-wise, appending `" (element types)"` to the reason at each
/// level, so the reason on a recorded constraint shows how deep the
/// variable sat.
pub fn check(
    constraints: &mut ConstraintSystem,
    t1: &Type,
    t2: &Type,
    source: Span,
    reason: &str,
) -> Result<(), TypeError> {
    if t1.is_invalid() || t2.is_invalid() {
        return Ok(());
    }
    if !t1.is_variable() && !t2.is_variable() && !structural_match(t1, t2) {
        return Err(mismatch(t1, t2, source, reason));
    }
    if t1.is_variable() || t2.is_variable() {
        constraints.add_equality(t1.clone(), t2.clone(), source, reason);
        return Ok(());
    }
    match (t1, t2) {
        (Type::Chan(a), Type::Chan(b)) | (Type::Series(a), Type::Series(b)) => {
            check(constraints, a, b, source, &format!("{} (element types)", reason))
        }
        _ if equal(t1, t2) => Ok(()),
        (Type::Scalar { kind: k1, unit: u1 }, Type::Scalar { kind: k2, unit: u2 }) if k1 == k2 => {
            let name = |u: &Option<Unit>| match u {
                Some(u) => u.name.to_string(),
                None => "none".to_string(),
            };
            Err(TypeError::new(
                TypeErrorKind::UnitMismatch {
                    expected: name(u1),
                    actual: name(u2),
                    reason: reason.to_string(),
                },
                source,
            ))
        }
        _ => Err(mismatch(t1, t2, source, reason)),
    }
}

pub(crate) fn mismatch(expected: &Type, actual: &Type, source: Span, reason: &str) -> TypeError {
    TypeError::new(
        TypeErrorKind::Mismatch {
            expected: expected.to_string(),
            actual: actual.to_string(),
            reason: reason.to_string(),
        },
        source,
    )
}

/// Validates storing a value of type `value` into a slot of type
/// `target`: narrowing integer and `f64 -> f32` conversions are
/// accepted, literals may widen, everything else goes through [`check`].
pub fn check_assignment(
    constraints: &mut ConstraintSystem,
    target: &Type,
    value: &Type,
    literal: bool,
    source: Span,
    reason: &str,
) -> Result<(), TypeError> {
    if target.is_invalid() || value.is_invalid() {
        return Ok(());
    }
    if is_narrowing(value, target) {
        return Ok(());
    }
    if literal {
        if !literal_assignment_compatible(target, value) {
            return Err(mismatch(target, value, source, reason));
        }
        if target.contains_variable() || value.contains_variable() {
            return check(constraints, target, value, source, reason);
        }
        return Ok(());
    }
    check(constraints, target, value, source, reason)
}

// ── Compatibility predicates ─────────────────────────────────────

fn same_base_kind(t1: &Type, t2: &Type) -> bool {
    match (t1, t2) {
        (Type::Scalar { kind: a, .. }, Type::Scalar { kind: b, .. }) => a == b,
        (Type::Chan(_), Type::Chan(_))
        | (Type::Series(_), Type::Series(_))
        | (Type::Function(_), Type::Function(_)) => true,
        _ => false,
    }
}

/// Operand compatibility for operators: wrappers must agree when both
/// sides are wrapped, then base kinds are compared one level down,
/// ignoring units. Variables and invalid types never qualify.
pub fn compatible(t1: &Type, t2: &Type) -> bool {
    if t1.is_wrapper() && t2.is_wrapper() && t1.is_chan() != t2.is_chan() {
        return false;
    }
    let (a, b) = (t1.unwrap_elem(), t2.unwrap_elem());
    if a.is_invalid() || b.is_invalid() || a.is_variable() || b.is_variable() {
        return false;
    }
    same_base_kind(&a, &b)
}

/// Whether a value of type `expr` may be stored into a variable of type
/// `var`. Shapes must match; variables defer to the solver.
pub fn assignment_compatible(var: &Type, expr: &Type) -> bool {
    if !structural_match(var, expr) {
        return false;
    }
    let (a, b) = (var.unwrap_elem(), expr.unwrap_elem());
    if a.is_variable() || b.is_variable() {
        return true;
    }
    same_base_kind(&a, &b)
}

/// [`assignment_compatible`], plus widening for literals: a signed
/// integer literal fits any integer variable and any numeric literal
/// fits a float variable.
pub fn literal_assignment_compatible(var: &Type, literal: &Type) -> bool {
    if !structural_match(var, literal) {
        return false;
    }
    let (a, b) = (var.unwrap_elem(), literal.unwrap_elem());
    if a.is_variable() || b.is_variable() {
        return true;
    }
    match (a.kind(), b.kind()) {
        (Some(v), Some(l)) if v.is_integer() && l.is_signed() => true,
        (Some(v), Some(l)) if v.is_float() && l.is_numeric() => true,
        _ => same_base_kind(&a, &b),
    }
}

/// Implicit conversions the compiler inserts: a wider integer into a
/// narrower one, or `f64` into `f32`.
pub fn is_narrowing(from: &Type, to: &Type) -> bool {
    match (from.kind(), to.kind()) {
        (Some(f), Some(t)) if f.is_integer() && t.is_integer() => f.bits() > t.bits(),
        (Some(Kind::F64), Some(Kind::F32)) => true,
        _ => false,
    }
}
