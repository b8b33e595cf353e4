use arc_typeck::{Kind, Type};
use wasm_encoder::ValType;

/// Map an Arc type to the WASM value type that carries it.
///
/// Integers up to 32 bits share `i32`; strings, series and channels are
/// host handles and travel as `i32`. Unresolved and invalid types have no
/// representation.
pub fn val_type(ty: &Type) -> Option<ValType> {
    match ty {
        Type::Scalar { kind, .. } => Some(kind_val_type(*kind)),
        Type::Series(_) | Type::Chan(_) => Some(ValType::I32),
        Type::Variable { .. } | Type::Function(_) | Type::Invalid => None,
    }
}

pub fn kind_val_type(kind: Kind) -> ValType {
    match kind {
        Kind::I8 | Kind::I16 | Kind::I32 | Kind::U8 | Kind::U16 | Kind::U32 => ValType::I32,
        Kind::I64 | Kind::U64 => ValType::I64,
        Kind::F32 => ValType::F32,
        Kind::F64 => ValType::F64,
        Kind::String => ValType::I32,
    }
}

/// Whether `ty` is fully known: no variables or invalid parts.
pub fn is_concrete(ty: &Type) -> bool {
    match ty {
        Type::Scalar { .. } => true,
        Type::Series(elem) | Type::Chan(elem) => is_concrete(elem),
        _ => false,
    }
}
