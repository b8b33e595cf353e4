//! Statement compilation. Control flow maps one-to-one onto structured
//! `if`/`else`/`end` groups, so nesting in the output mirrors the source.

use arc_ast::{Block, ExprId, StmtId, StmtKind};
use arc_typeck::{Symbol, SymbolKind, Type};
use smol_str::SmolStr;
use wasm_encoder::{Instruction, ValType};

use crate::bindings::HostOp;
use crate::error::CompileError;
use crate::types::{is_concrete, val_type};
use crate::{elem_primitive, primitive, representable, Compiler};

impl<'a> Compiler<'a> {
    pub(crate) fn block(&mut self, block: &'a Block) -> Result<(), CompileError> {
        for stmt in &block.stmts {
            self.stmt(*stmt)?;
        }
        Ok(())
    }

    fn stmt(&mut self, id: StmtId) -> Result<(), CompileError> {
        let program = self.program;
        if let Some(scope) = self.analysis.scope_of(id) {
            self.func.scope = scope;
        }
        match &program.stmts[id].kind {
            StmtKind::VarDecl {
                name,
                ty,
                value,
                stateful: false,
            } => self.declaration(name, ty.is_some(), *value),
            StmtKind::VarDecl {
                name,
                value,
                stateful: true,
                ..
            } => self.stateful_declaration(name, *value),
            StmtKind::Assign { name, value } => self.assignment(name, *value),
            StmtKind::If {
                condition,
                body,
                else_ifs,
                else_body,
            } => {
                let scope = self.func.scope;
                self.condition(*condition)?;
                self.func.code.if_(None);
                self.block(body)?;
                for branch in else_ifs {
                    self.func.scope = scope;
                    self.func.code.else_();
                    self.condition(branch.condition)?;
                    self.func.code.if_(None);
                    self.block(&branch.body)?;
                }
                if let Some(block) = else_body {
                    self.func.code.else_();
                    self.block(block)?;
                }
                for _ in 0..=else_ifs.len() {
                    self.func.code.end();
                }
                self.func.scope = scope;
                Ok(())
            }
            StmtKind::Return(value) => {
                if let Some(value) = value {
                    let target = self.func.return_type.clone().ok_or_else(|| {
                        CompileError::unsupported("returning a value from a function without output")
                    })?;
                    let ty = self.expr(*value, Some(&target))?;
                    self.convert(&ty, &target, false)?;
                }
                self.func.code.return_();
                Ok(())
            }
            StmtKind::ChannelWrite { value, channel } => self.channel_write(*value, channel),
            StmtKind::ChannelRead {
                name,
                channel,
                blocking,
            } => self.channel_read(name, channel, *blocking),
            StmtKind::Expr(expr) => {
                let ty = self.expr(*expr, None)?;
                if val_type(&ty).is_some() {
                    self.func.code.drop_value();
                }
                Ok(())
            }
        }
    }

    fn condition(&mut self, id: ExprId) -> Result<(), CompileError> {
        let ty = self.expr(id, None)?;
        self.truthy(&ty)
    }

    /// Compiles a value flowing into a slot of type `target`, returning
    /// the slot's final type: `target` when it is concrete, otherwise
    /// whatever the value compiled to.
    fn value_for(&mut self, value: ExprId, target: &Type) -> Result<Type, CompileError> {
        if is_concrete(target) {
            let ty = self.expr(value, Some(target))?;
            self.convert(&ty, target, false)?;
            Ok(target.clone())
        } else {
            self.expr(value, None)
        }
    }

    /// Without an annotation the slot takes the compiled type, which
    /// differs from the inferred one for series comparisons.
    fn declaration(&mut self, name: &SmolStr, annotated: bool, value: ExprId) -> Result<(), CompileError> {
        let sym = self.resolve(name)?;
        let ty = if annotated {
            self.value_for(value, &sym.ty)?
        } else {
            let hint = Some(&sym.ty).filter(|ty| is_concrete(ty));
            self.expr(value, hint)?
        };
        let vt = representable(&ty)?;
        let slot = self.func.declare(name, ty, vt);
        self.func.code.local_set(slot);
        Ok(())
    }

    /// `name $= value`: loads the persisted value, using `value` only
    /// when nothing has been stored yet, and mirrors it into a local.
    fn stateful_declaration(&mut self, name: &SmolStr, value: ExprId) -> Result<(), CompileError> {
        let sym = self.resolve(name)?;
        let task = self.task(name)?;
        self.func.code.i32_const(task as i32).i32_const(sym.id as i32);
        let ty = self.value_for(value, &sym.ty)?;
        let load = self.state_import(&ty, HostOp::StateLoad, HostOp::StateLoadSeries)?;
        let vt = representable(&ty)?;
        let slot = self.func.declare(name, ty, vt);
        self.func.code.call(load).local_set(slot);
        Ok(())
    }

    fn assignment(&mut self, name: &SmolStr, value: ExprId) -> Result<(), CompileError> {
        let sym = self.resolve(name)?;
        match sym.kind {
            SymbolKind::Variable | SymbolKind::Param => {
                let local = self.func.local(name)?;
                let (slot, target) = (local.slot, local.ty.clone());
                self.value_for(value, &target)?;
                self.func.code.local_set(slot);
                Ok(())
            }
            SymbolKind::StatefulVariable => {
                let task = self.task(name)?;
                let local = self.func.local(name)?;
                let (slot, target) = (local.slot, local.ty.clone());
                let store = self.state_import(&target, HostOp::StateStore, HostOp::StateStoreSeries)?;
                self.value_for(value, &target)?;
                self.func
                    .code
                    .local_set(slot)
                    .i32_const(task as i32)
                    .i32_const(sym.id as i32)
                    .local_get(slot)
                    .call(store);
                Ok(())
            }
            SymbolKind::Output => self.output_assignment(name, sym, value),
            kind => Err(CompileError::unsupported(format!(
                "assignment to {} '{}'",
                kind, name
            ))),
        }
    }

    /// Stores into the output's memory slot and sets its dirty bit.
    fn output_assignment(&mut self, name: &SmolStr, sym: &Symbol, value: ExprId) -> Result<(), CompileError> {
        let address = self.output_address(name, sym.id)?;
        let mask = self
            .func
            .outputs
            .as_ref()
            .map(|layout| layout.dirty_mask_address())
            .ok_or_else(|| CompileError::UnallocatedLocal(name.clone()))?;
        let vt = representable(&sym.ty)?;

        self.func.code.i32_const(address as i32);
        self.value_for(value, &sym.ty)?;
        self.func
            .code
            .store(vt, 0)
            .i32_const(mask as i32)
            .i32_const(mask as i32)
            .load(ValType::I64, 0)
            .i64_const(1 << sym.id)
            .instruction(&Instruction::I64Or)
            .store(ValType::I64, 0);
        Ok(())
    }

    fn channel_write(&mut self, value: ExprId, channel: &SmolStr) -> Result<(), CompileError> {
        let sym = self.resolve(channel)?;
        let elem = sym.ty.unwrap_elem();
        let call = self.import(HostOp::ChannelWrite, elem_primitive(&sym.ty)?)?;
        self.func.code.i32_const(sym.id as i32);
        self.value_for(value, &elem)?;
        self.func.code.call(call);
        Ok(())
    }

    fn channel_read(&mut self, name: &SmolStr, channel: &SmolStr, blocking: bool) -> Result<(), CompileError> {
        let sym = self.resolve(channel)?;
        let elem = sym.ty.unwrap_elem();
        let op = if blocking {
            HostOp::ChannelBlockingRead
        } else {
            HostOp::ChannelRead
        };
        let call = self.import(op, elem_primitive(&sym.ty)?)?;
        let vt = representable(&elem)?;
        let slot = self.func.declare(name, elem, vt);
        self.func.code.i32_const(sym.id as i32).call(call).local_set(slot);
        Ok(())
    }

    fn task(&self, name: &SmolStr) -> Result<u32, CompileError> {
        self.func
            .task
            .ok_or_else(|| CompileError::StatefulOutsideTask(name.clone()))
    }

    fn state_import(&self, ty: &Type, scalar: HostOp, series: HostOp) -> Result<u32, CompileError> {
        match ty {
            Type::Series(_) => self.import(series, elem_primitive(ty)?),
            _ => self.import(scalar, primitive(ty)?),
        }
    }
}
