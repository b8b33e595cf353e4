//! Append-only instruction buffer.
//!
//! Opcodes and immediates are encoded by `wasm_encoder`: LEB128 for
//! indices and integer constants, little-endian IEEE-754 for floats. The
//! encoder does not track `if`/`else`/`end` balance; callers close every
//! structured instruction they open.

use wasm_encoder::{BlockType, Encode, Instruction, MemArg, ValType};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Encoder {
    bytes: Vec<u8>,
}

impl Encoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Splices the contents of another buffer onto this one.
    pub fn append(&mut self, other: Encoder) {
        self.bytes.extend(other.bytes);
    }

    /// Emits any instruction not covered by a dedicated method.
    pub fn instruction(&mut self, instruction: &Instruction<'_>) -> &mut Self {
        instruction.encode(&mut self.bytes);
        self
    }

    // ── Constants ───────────────────────────────────────────────

    pub fn i32_const(&mut self, value: i32) -> &mut Self {
        self.instruction(&Instruction::I32Const(value))
    }

    pub fn i64_const(&mut self, value: i64) -> &mut Self {
        self.instruction(&Instruction::I64Const(value))
    }

    pub fn f32_const(&mut self, value: f32) -> &mut Self {
        self.instruction(&Instruction::F32Const(value.into()))
    }

    pub fn f64_const(&mut self, value: f64) -> &mut Self {
        self.instruction(&Instruction::F64Const(value.into()))
    }

    /// The zero value of `ty`.
    pub fn zero(&mut self, ty: ValType) -> &mut Self {
        match ty {
            ValType::I64 => self.i64_const(0),
            ValType::F32 => self.f32_const(0.0),
            ValType::F64 => self.f64_const(0.0),
            _ => self.i32_const(0),
        }
    }

    // ── Locals and calls ────────────────────────────────────────

    pub fn local_get(&mut self, index: u32) -> &mut Self {
        self.instruction(&Instruction::LocalGet(index))
    }

    pub fn local_set(&mut self, index: u32) -> &mut Self {
        self.instruction(&Instruction::LocalSet(index))
    }

    pub fn local_tee(&mut self, index: u32) -> &mut Self {
        self.instruction(&Instruction::LocalTee(index))
    }

    pub fn call(&mut self, function: u32) -> &mut Self {
        self.instruction(&Instruction::Call(function))
    }

    pub fn drop_value(&mut self) -> &mut Self {
        self.instruction(&Instruction::Drop)
    }

    // ── Control ─────────────────────────────────────────────────

    pub fn if_(&mut self, result: Option<ValType>) -> &mut Self {
        self.instruction(&Instruction::If(block_type(result)))
    }

    pub fn else_(&mut self) -> &mut Self {
        self.instruction(&Instruction::Else)
    }

    pub fn block(&mut self, result: Option<ValType>) -> &mut Self {
        self.instruction(&Instruction::Block(block_type(result)))
    }

    pub fn loop_(&mut self, result: Option<ValType>) -> &mut Self {
        self.instruction(&Instruction::Loop(block_type(result)))
    }

    pub fn br(&mut self, depth: u32) -> &mut Self {
        self.instruction(&Instruction::Br(depth))
    }

    pub fn br_if(&mut self, depth: u32) -> &mut Self {
        self.instruction(&Instruction::BrIf(depth))
    }

    pub fn end(&mut self) -> &mut Self {
        self.instruction(&Instruction::End)
    }

    pub fn return_(&mut self) -> &mut Self {
        self.instruction(&Instruction::Return)
    }

    pub fn unreachable(&mut self) -> &mut Self {
        self.instruction(&Instruction::Unreachable)
    }

    // ── Memory ──────────────────────────────────────────────────

    /// Stores the value on top of the stack at the address below it.
    pub fn store(&mut self, ty: ValType, offset: u64) -> &mut Self {
        let arg = mem_arg(ty, offset);
        match ty {
            ValType::I64 => self.instruction(&Instruction::I64Store(arg)),
            ValType::F32 => self.instruction(&Instruction::F32Store(arg)),
            ValType::F64 => self.instruction(&Instruction::F64Store(arg)),
            _ => self.instruction(&Instruction::I32Store(arg)),
        }
    }

    pub fn load(&mut self, ty: ValType, offset: u64) -> &mut Self {
        let arg = mem_arg(ty, offset);
        match ty {
            ValType::I64 => self.instruction(&Instruction::I64Load(arg)),
            ValType::F32 => self.instruction(&Instruction::F32Load(arg)),
            ValType::F64 => self.instruction(&Instruction::F64Load(arg)),
            _ => self.instruction(&Instruction::I32Load(arg)),
        }
    }
}

fn block_type(result: Option<ValType>) -> BlockType {
    match result {
        Some(ty) => BlockType::Result(ty),
        None => BlockType::Empty,
    }
}

fn mem_arg(ty: ValType, offset: u64) -> MemArg {
    let align = match ty {
        ValType::I64 | ValType::F64 => 3,
        _ => 2,
    };
    MemArg {
        offset,
        align,
        memory_index: 0,
    }
}
