//! Numeric conversions between value kinds.
//!
//! Integers narrower than 32 bits live in an `i32` and are kept
//! normalized: sign-extended when signed, zero-extended when unsigned.

use arc_typeck::{is_narrowing, Kind, Type};
use wasm_encoder::{Instruction, ValType};

use crate::error::CompileError;
use crate::types::{is_concrete, kind_val_type};
use crate::Compiler;

impl Compiler<'_> {
    /// Converts the value on top of the stack from `from` to `to`.
    ///
    /// Implicit conversions only narrow: a wider integer to a narrower
    /// one, or `f64` to `f32`. Explicit casts allow any numeric pair.
    pub(crate) fn convert(
        &mut self,
        from: &Type,
        to: &Type,
        explicit: bool,
    ) -> Result<(), CompileError> {
        if !is_concrete(to) {
            return Ok(());
        }
        let unsupported = || CompileError::UnsupportedConversion {
            from: from.to_string(),
            to: to.to_string(),
        };
        match (from, to) {
            (Type::Series(a), Type::Series(b)) if a.kind() == b.kind() => Ok(()),
            (Type::Scalar { kind: f, .. }, Type::Scalar { kind: t, .. }) => {
                if f == t {
                    return Ok(());
                }
                if !f.is_numeric() || !t.is_numeric() {
                    return Err(unsupported());
                }
                if !explicit && !is_narrowing(from, to) {
                    return Err(unsupported());
                }
                self.convert_kind(*f, *t);
                Ok(())
            }
            _ => Err(unsupported()),
        }
    }

    fn convert_kind(&mut self, from: Kind, to: Kind) {
        use Instruction as I;
        use ValType::{F32, F64, I32, I64};
        let (source, target) = (from.is_signed(), to.is_signed());
        let instruction = match (kind_val_type(from), kind_val_type(to)) {
            (I64, I32) => Some(I::I32WrapI64),
            (I32, I64) if source => Some(I::I64ExtendI32S),
            (I32, I64) => Some(I::I64ExtendI32U),
            (I32, F32) if source => Some(I::F32ConvertI32S),
            (I32, F32) => Some(I::F32ConvertI32U),
            (I64, F32) if source => Some(I::F32ConvertI64S),
            (I64, F32) => Some(I::F32ConvertI64U),
            (I32, F64) if source => Some(I::F64ConvertI32S),
            (I32, F64) => Some(I::F64ConvertI32U),
            (I64, F64) if source => Some(I::F64ConvertI64S),
            (I64, F64) => Some(I::F64ConvertI64U),
            (F32, I32) if target => Some(I::I32TruncSatF32S),
            (F32, I32) => Some(I::I32TruncSatF32U),
            (F64, I32) if target => Some(I::I32TruncSatF64S),
            (F64, I32) => Some(I::I32TruncSatF64U),
            (F32, I64) if target => Some(I::I64TruncSatF32S),
            (F32, I64) => Some(I::I64TruncSatF32U),
            (F64, I64) if target => Some(I::I64TruncSatF64S),
            (F64, I64) => Some(I::I64TruncSatF64U),
            (F64, F32) => Some(I::F32DemoteF64),
            (F32, F64) => Some(I::F64PromoteF32),
            _ => None,
        };
        if let Some(instruction) = instruction {
            self.func.code.instruction(&instruction);
        }
        let changes_range = to.bits() < from.bits() || source != target || from.is_float();
        if to.bits() < 32 && changes_range {
            self.normalize(to);
        }
    }

    /// Re-establishes the representation of a sub-32-bit integer after
    /// an operation that may have overflowed it.
    pub(crate) fn normalize(&mut self, kind: Kind) {
        let code = &mut self.func.code;
        match kind {
            Kind::I8 => {
                code.instruction(&Instruction::I32Extend8S);
            }
            Kind::I16 => {
                code.instruction(&Instruction::I32Extend16S);
            }
            Kind::U8 => {
                code.i32_const(0xff).instruction(&Instruction::I32And);
            }
            Kind::U16 => {
                code.i32_const(0xffff).instruction(&Instruction::I32And);
            }
            _ => {}
        }
    }
}
