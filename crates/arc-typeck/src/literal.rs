//! Conversion of numeric literal text into concrete values.

use arc_ast::is_float_text;
use smol_str::SmolStr;

use crate::error::TypeErrorKind;
use crate::types::{Kind, Type};
use crate::units::{self, Unit};

/// A compile-time constant.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Int(i64),
    Uint(u64),
    Float(f64),
    Str(SmolStr),
}

#[derive(Clone, Debug, PartialEq)]
pub struct ParsedValue {
    pub value: Value,
    pub ty: Type,
}

/// Parses a numeric literal, optionally unit-suffixed, into a value of
/// the target type. Without a numeric target, integers become `i64` and
/// floats `f64`.
pub fn parse_numeric(
    text: &str,
    unit: Option<&str>,
    target: Option<&Type>,
) -> Result<ParsedValue, TypeErrorKind> {
    let digits: String = text.chars().filter(|c| *c != '_').collect();
    let is_int = !is_float_text(&digits);
    let target = target.filter(|t| t.is_numeric());

    if let Some(name) = unit {
        let unit = units::resolve(name).ok_or_else(|| TypeErrorKind::UnknownUnit(name.into()))?;
        let raw: f64 = digits
            .parse()
            .map_err(|_| TypeErrorKind::MalformedLiteral(text.into()))?;
        return parse_with_unit(raw, is_int, unit, target);
    }

    let kind = target.and_then(Type::kind);
    let value = if is_int {
        let raw: i128 = digits
            .parse()
            .map_err(|_| TypeErrorKind::MalformedLiteral(text.into()))?;
        int_to_kind(raw, kind.unwrap_or(Kind::I64))?
    } else {
        let raw: f64 = digits
            .parse()
            .map_err(|_| TypeErrorKind::MalformedLiteral(text.into()))?;
        float_to_kind(raw, kind.unwrap_or(Kind::F64))?
    };
    let ty = match kind {
        Some(kind) => Type::scalar(kind),
        None if is_int => Type::i64(),
        None => Type::f64(),
    };
    Ok(ParsedValue { value, ty })
}

fn parse_with_unit(
    raw: f64,
    is_int: bool,
    unit: Unit,
    target: Option<&Type>,
) -> Result<ParsedValue, TypeErrorKind> {
    match target {
        Some(Type::Scalar {
            kind,
            unit: Some(target_unit),
        }) => {
            let factor = units::scale_factor(&unit, target_unit).ok_or_else(|| {
                TypeErrorKind::IncompatibleUnits {
                    from: unit.name.clone(),
                    to: target_unit.name.clone(),
                }
            })?;
            let value = float_to_kind(snap(raw * factor), *kind)?;
            Ok(ParsedValue {
                value,
                ty: Type::scalar(*kind).with_unit(target_unit.clone()),
            })
        }
        Some(Type::Scalar { kind, unit: None }) => {
            let value = float_to_kind(snap(raw * unit.scale), *kind)?;
            Ok(ParsedValue {
                value,
                ty: Type::scalar(*kind),
            })
        }
        _ => {
            let si = snap(raw * unit.scale);
            let base = units::si(unit.dimension);
            if is_int && si.fract() == 0.0 && si.abs() <= i64::MAX as f64 {
                Ok(ParsedValue {
                    value: Value::Int(si as i64),
                    ty: Type::i64().with_unit(base),
                })
            } else {
                Ok(ParsedValue {
                    value: Value::Float(si),
                    ty: Type::f64().with_unit(base),
                })
            }
        }
    }
}

/// Rounds away representation noise left by unit scaling (`0.3 * 1e9`).
fn snap(value: f64) -> f64 {
    let rounded = value.round();
    if (value - rounded).abs() <= 1e-9 * value.abs().max(1.0) {
        rounded
    } else {
        value
    }
}

fn int_range(kind: Kind) -> (i128, i128) {
    match kind {
        Kind::I8 => (i8::MIN as i128, i8::MAX as i128),
        Kind::I16 => (i16::MIN as i128, i16::MAX as i128),
        Kind::I32 => (i32::MIN as i128, i32::MAX as i128),
        Kind::I64 => (i64::MIN as i128, i64::MAX as i128),
        Kind::U8 => (0, u8::MAX as i128),
        Kind::U16 => (0, u16::MAX as i128),
        Kind::U32 => (0, u32::MAX as i128),
        _ => (0, u64::MAX as i128),
    }
}

fn int_to_kind(value: i128, kind: Kind) -> Result<Value, TypeErrorKind> {
    if kind.is_float() {
        return Ok(Value::Float(value as f64));
    }
    if kind == Kind::String {
        return Err(TypeErrorKind::LiteralRange(format!(
            "cannot use numeric literal {} as {}",
            value, kind
        )));
    }
    let (min, max) = int_range(kind);
    if value < min || value > max {
        let msg = if kind == Kind::U64 {
            format!("value {} out of range for u64 (must be non-negative)", value)
        } else {
            format!(
                "value {} out of range for {} (must be in [{}, {}])",
                value, kind, min, max
            )
        };
        return Err(TypeErrorKind::LiteralRange(msg));
    }
    Ok(if kind.is_signed() {
        Value::Int(value as i64)
    } else {
        Value::Uint(value as u64)
    })
}

fn float_to_kind(value: f64, kind: Kind) -> Result<Value, TypeErrorKind> {
    match kind {
        Kind::F32 if value.abs() > f32::MAX as f64 => Err(TypeErrorKind::LiteralRange(format!(
            "value {} out of range for f32",
            value
        ))),
        Kind::F32 | Kind::F64 => Ok(Value::Float(value)),
        Kind::String => Err(TypeErrorKind::LiteralRange(format!(
            "cannot use numeric literal {} as {}",
            value, kind
        ))),
        _ => {
            if value.fract() != 0.0 {
                return Err(TypeErrorKind::LiteralRange(format!(
                    "cannot convert non-integer float {} to {}",
                    value, kind
                )));
            }
            let (min, max) = int_range(kind);
            if value < min as f64 || value > max as f64 {
                return Err(TypeErrorKind::LiteralRange(format!(
                    "value {} out of range for {}",
                    value, kind
                )));
            }
            Ok(if kind.is_signed() {
                Value::Int(value as i64)
            } else {
                Value::Uint(value as u64)
            })
        }
    }
}
