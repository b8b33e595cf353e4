use arc_ast::{Program, TypeExprId, TypeExprKind};

use crate::error::{TypeError, TypeErrorKind};
use crate::types::{Kind, Type};
use crate::units;

/// Resolves a written type (`f32 psi`, `chan series i64`) to a [`Type`].
pub fn resolve_type_expr(program: &Program, id: TypeExprId) -> Result<Type, TypeError> {
    let texpr = &program.type_exprs[id];
    match &texpr.kind {
        TypeExprKind::Named { name, unit } => {
            let kind = Kind::from_name(name)
                .ok_or_else(|| TypeError::new(TypeErrorKind::UnknownType(name.clone()), texpr.span))?;
            let ty = Type::scalar(kind);
            match unit {
                None => Ok(ty),
                Some(u) => {
                    let unit = units::resolve(u).ok_or_else(|| {
                        TypeError::new(TypeErrorKind::UnknownUnit(u.clone()), texpr.span)
                    })?;
                    Ok(ty.with_unit(unit))
                }
            }
        }
        TypeExprKind::Chan(inner) => Ok(Type::chan(resolve_type_expr(program, *inner)?)),
        TypeExprKind::Series(inner) => {
            let elem = resolve_type_expr(program, *inner)?;
            if !matches!(elem, Type::Scalar { .. }) {
                return Err(TypeError::new(
                    TypeErrorKind::SeriesElement(elem.to_string()),
                    texpr.span,
                ));
            }
            Ok(Type::series(elem))
        }
    }
}
