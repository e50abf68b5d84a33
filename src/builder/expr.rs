//! Expression lowering (spec.md §4.E): literals, variable reads, unary/
//! binary/cast/ternary/call, member/subscript/deref lvalue addressing, and
//! compound literals.
use crate::ast::{Expr, ExprKind, Initializer, Literal, VarScope};
use crate::builder::Builder;
use crate::error::{BuildError, BuildResult};
use crate::ir::function::LocalFlags;
use crate::ir::op::{AddressIndex, OpId, OpKind};
use crate::ir::ty::Type;

impl<'u> Builder<'u> {
    pub fn lower_expr(&mut self, e: &Expr) -> BuildResult<OpId> {
        match &e.kind {
            ExprKind::Literal(Literal::Int(v)) => Ok(self.emit(e.ty.clone(), OpKind::ConstInt(*v))),
            ExprKind::Literal(Literal::Float(v)) => {
                Ok(self.emit(e.ty.clone(), OpKind::ConstFloat(*v)))
            }
            ExprKind::Var { name, scope } => match scope {
                VarScope::Local => self.read_var(name, &e.ty),
                VarScope::Global => self.load_global(name, &e.ty),
            },
            ExprKind::Unary(op, inner) => self.lower_unary(*op, inner, &e.ty),
            ExprKind::Binary(op, lhs, rhs) => self.lower_binary(*op, lhs, rhs),
            ExprKind::Assign {
                op,
                casts,
                target,
                value,
            } => self.lower_assign(*op, casts, target, value),
            ExprKind::Cast(kind, inner) => {
                let v = self.lower_expr(inner)?;
                Ok(self.emit(e.ty.clone(), OpKind::Cast(*kind, v)))
            }
            ExprKind::Ternary {
                cond,
                then_val,
                else_val,
            } => self.lower_ternary(cond, then_val, else_val, &e.ty),
            ExprKind::Call { callee, args } => self.lower_call(callee, args, &e.ty),
            ExprKind::Member { .. } | ExprKind::Subscript { .. } => {
                let (addr, bitfield) = self.lower_member_or_subscript_addr(e)?;
                self.load_from_addr(addr, bitfield, &e.ty)
            }
            ExprKind::AddressOf(inner) => self.lower_address_of(inner),
            ExprKind::Deref(inner) => {
                let ptr = self.lower_expr(inner)?;
                Ok(self.emit(e.ty.clone(), OpKind::LoadAddr(ptr)))
            }
            ExprKind::Comma(lhs, rhs) => {
                self.lower_expr(lhs)?;
                self.lower_expr(rhs)
            }
            ExprKind::CompoundLiteral(init) => self.lower_compound_literal(init, &e.ty),
            ExprKind::SizeofValue(v) => Ok(self.emit(e.ty.clone(), OpKind::ConstInt(*v as i64))),
        }
    }

    fn lower_unary(&mut self, op: crate::ast::UnaryOp, inner: &Expr, ty: &Type) -> BuildResult<OpId> {
        use crate::ast::UnaryOp as A;
        use crate::ir::op::UnaryOp as I;
        match op {
            A::Neg => {
                let v = self.lower_expr(inner)?;
                let k = if ty.is_float() { I::FNeg } else { I::Neg };
                Ok(self.emit(ty.clone(), OpKind::Unary(k, v)))
            }
            A::Not => {
                let v = self.lower_expr(inner)?;
                Ok(self.emit(ty.clone(), OpKind::Unary(I::Not, v)))
            }
            A::LogicalNot => {
                let v = self.lower_expr(inner)?;
                Ok(self.emit(ty.clone(), OpKind::Unary(I::LogicalNot, v)))
            }
            A::PreIncr | A::PreDecr | A::PostIncr | A::PostDecr => {
                self.lower_incr_decr(op, inner, ty)
            }
        }
    }

    fn lower_incr_decr(&mut self, op: crate::ast::UnaryOp, inner: &Expr, ty: &Type) -> BuildResult<OpId> {
        use crate::ast::UnaryOp as A;
        let old = self.lower_expr(inner)?;
        let step_kind = if matches!(op, A::PreIncr | A::PostIncr) {
            crate::ir::op::BinaryOp::AddInt
        } else {
            crate::ir::op::BinaryOp::SubInt
        };
        let one = self.emit(ty.clone(), OpKind::ConstInt(1));
        let new_val = self.emit(ty.clone(), OpKind::Binary(step_kind, old, one));
        self.store_to_lvalue(inner, new_val)?;
        Ok(if matches!(op, A::PreIncr | A::PreDecr) {
            new_val
        } else {
            old
        })
    }

    fn lower_binary(&mut self, op: crate::ast::BinaryOp, lhs: &Expr, rhs: &Expr) -> BuildResult<OpId> {
        use crate::ast::BinaryOp as A;
        if matches!(op, A::LogicalAnd | A::LogicalOr) {
            return self.lower_short_circuit(op, lhs, rhs);
        }
        let l = self.lower_expr(lhs)?;
        let r = self.lower_expr(rhs)?;
        let result_ty = self.f.ops[l].ty.clone();
        let kind = binary_op_kind(op, &lhs.ty);
        Ok(self.emit(
            if op_is_compare(op) {
                Type::Primitive(crate::ir::ty::Prim::I1)
            } else {
                result_ty
            },
            OpKind::Binary(kind, l, r),
        ))
    }

    /// `&&`/`||` short-circuit into a CFG diamond with a phi merging the
    /// two possible outcomes, per spec.md §4.E.
    fn lower_short_circuit(&mut self, op: crate::ast::BinaryOp, lhs: &Expr, rhs: &Expr) -> BuildResult<OpId> {
        use crate::ast::BinaryOp as A;
        let bool_ty = Type::Primitive(crate::ir::ty::Prim::I1);
        let l = self.lower_expr(lhs)?;
        let short_circuit_block = self.f.new_block();
        let eval_rhs_block = self.f.new_block();
        let join_block = self.f.new_block();

        if op == A::LogicalAnd {
            self.cond_branch_to(l, eval_rhs_block, short_circuit_block);
        } else {
            self.cond_branch_to(l, short_circuit_block, eval_rhs_block);
        }
        let entry_from = self.current_block;
        self.seal(short_circuit_block);

        self.switch_to(eval_rhs_block);
        let r = self.lower_expr(rhs)?;
        let rhs_exit = self.current_block;
        self.branch_to(join_block);
        self.seal(eval_rhs_block);

        self.switch_to(short_circuit_block);
        let short_value = self.emit(
            bool_ty.clone(),
            OpKind::ConstInt(if op == A::LogicalAnd { 0 } else { 1 }),
        );
        self.branch_to(join_block);

        self.switch_to(join_block);
        self.seal(join_block);
        let phi = self.emit_phi(
            bool_ty,
            vec![
                crate::ir::op::PhiEntry {
                    pred: short_circuit_block,
                    value: short_value,
                },
                crate::ir::op::PhiEntry {
                    pred: rhs_exit,
                    value: r,
                },
            ],
        );
        let _ = entry_from;
        Ok(phi)
    }

    fn lower_ternary(&mut self, cond: &Expr, then_val: &Expr, else_val: &Expr, ty: &Type) -> BuildResult<OpId> {
        let c = self.lower_expr(cond)?;
        let then_block = self.f.new_block();
        let else_block = self.f.new_block();
        let join_block = self.f.new_block();
        self.cond_branch_to(c, then_block, else_block);

        self.switch_to(then_block);
        self.seal(then_block);
        let t = self.lower_expr(then_val)?;
        let then_exit = self.current_block;
        self.branch_to(join_block);

        self.switch_to(else_block);
        self.seal(else_block);
        let e = self.lower_expr(else_val)?;
        let else_exit = self.current_block;
        self.branch_to(join_block);

        self.switch_to(join_block);
        self.seal(join_block);
        Ok(self.emit_phi(
            ty.clone(),
            vec![
                crate::ir::op::PhiEntry {
                    pred: then_exit,
                    value: t,
                },
                crate::ir::op::PhiEntry {
                    pred: else_exit,
                    value: e,
                },
            ],
        ))
    }

    fn lower_call(&mut self, callee: &Expr, args: &[Expr], ret_ty: &Type) -> BuildResult<OpId> {
        if let ExprKind::Var {
            name,
            scope: VarScope::Global,
        } = &callee.kind
        {
            if let Some(result) = crate::intrinsics::lower_builtin_call(self, name, args, ret_ty) {
                return result;
            }
        }
        self.f.flags |= crate::ir::function::FunctionFlags::MAKES_CALL;
        let target = self.lower_expr(callee)?;
        let func_ty = callee.ty.decay();
        let mut arg_ids = Vec::with_capacity(args.len());
        let mut arg_types = Vec::with_capacity(args.len());
        for a in args {
            arg_ids.push(self.lower_expr(a)?);
            arg_types.push(a.ty.clone());
        }
        Ok(self.emit(
            ret_ty.clone(),
            OpKind::Call {
                target,
                func_ty,
                args: arg_ids,
                arg_types,
            },
        ))
    }

    /// Compute the address (and, if the access is a bitfield, its
    /// `(bit_offset, width)`) of a `Member`/`Subscript` expression.
    fn lower_member_or_subscript_addr(&mut self, e: &Expr) -> BuildResult<(OpId, Option<(u16, u16)>)> {
        match &e.kind {
            ExprKind::Member {
                base,
                offset,
                bitfield,
            } => {
                let base_addr = self.lower_base_address(base)?;
                let ptr_ty = Type::ptr(e.ty.clone());
                let addr = self.emit(
                    ptr_ty,
                    OpKind::AddressOffset {
                        base: base_addr,
                        index: None,
                        disp: *offset as i64,
                    },
                );
                Ok((addr, *bitfield))
            }
            ExprKind::Subscript {
                base,
                index,
                elem_size,
            } => {
                let base_addr = self.lower_base_address(base)?;
                let index_val = self.lower_expr(index)?;
                let ptr_ty = Type::ptr(e.ty.clone());
                let addr = self.emit(
                    ptr_ty,
                    OpKind::AddressOffset {
                        base: base_addr,
                        index: Some(AddressIndex {
                            index: index_val,
                            scale: *elem_size,
                        }),
                        disp: 0,
                    },
                );
                Ok((addr, None))
            }
            _ => Err(BuildError::Internal(
                "lower_member_or_subscript_addr on non-member/subscript expression".into(),
            )),
        }
    }

    /// Address of `base` when used as the base of `.`/`[]`: array/struct
    /// lvalues contribute their own address (invariant 4 decay), pointer
    /// rvalues (the `->`/pointer-subscript case) contribute their value
    /// directly.
    fn lower_base_address(&mut self, base: &Expr) -> BuildResult<OpId> {
        if base.ty.is_pointer() {
            self.lower_expr(base)
        } else {
            self.lower_lvalue_addr(base)
        }
    }

    fn load_from_addr(&mut self, addr: OpId, bitfield: Option<(u16, u16)>, ty: &Type) -> BuildResult<OpId> {
        match bitfield {
            Some((bit_offset, width)) => Ok(self.emit(
                ty.clone(),
                OpKind::BitfieldLoad {
                    addr,
                    bit_offset,
                    width,
                },
            )),
            None => Ok(self.emit(ty.clone(), OpKind::LoadAddr(addr))),
        }
    }

    /// Compute the address of any lvalue expression (spec.md §4.E address
    /// lowering). Taking the address of a plain variable marks its local as
    /// escaped: every further read/write of that name goes through memory.
    pub fn lower_lvalue_addr(&mut self, e: &Expr) -> BuildResult<OpId> {
        match &e.kind {
            ExprKind::Var {
                name,
                scope: VarScope::Global,
            } => self.addr_of_global(name, &e.ty),
            ExprKind::Var {
                name,
                scope: VarScope::Local,
            } => {
                let local = self
                    .resolve_local(name)
                    .ok_or_else(|| BuildError::Internal(format!("address of undeclared variable `{name}`")))?;
                self.mark_escaped(local);
                Ok(self.emit(Type::ptr(e.ty.clone()), OpKind::AddrOfLocal(local)))
            }
            ExprKind::Deref(inner) => self.lower_expr(inner),
            ExprKind::Member { .. } | ExprKind::Subscript { .. } => {
                let (addr, _) = self.lower_member_or_subscript_addr(e)?;
                Ok(addr)
            }
            ExprKind::CompoundLiteral(init) => {
                let local = self.f.alloc_local(e.ty.clone(), LocalFlags::empty(), None);
                self.zero_and_init_local(local, init)?;
                Ok(self.emit(Type::ptr(e.ty.clone()), OpKind::AddrOfLocal(local)))
            }
            _ => Err(BuildError::Internal(format!(
                "expression is not an lvalue: {:?}",
                e.kind
            ))),
        }
    }

    fn lower_address_of(&mut self, inner: &Expr) -> BuildResult<OpId> {
        self.lower_lvalue_addr(inner)
    }

    fn lower_compound_literal(&mut self, init: &Initializer, ty: &Type) -> BuildResult<OpId> {
        let local = self.f.alloc_local(ty.clone(), LocalFlags::empty(), None);
        self.zero_and_init_local(local, init)?;
        if ty.is_aggregate() {
            Ok(self.emit(Type::ptr(ty.decay().pointee().cloned().unwrap_or(ty.clone())), OpKind::AddrOfLocal(local)))
        } else {
            Ok(self.emit(ty.clone(), OpKind::LoadLocal(local)))
        }
    }

    /// Store `value` into whatever lvalue `target` denotes -- the counterpart
    /// to `lower_expr` for assignment targets, used by `=`-style assignment
    /// and by `++`/`--`.
    pub fn store_to_lvalue(&mut self, target: &Expr, value: OpId) -> BuildResult<()> {
        match &target.kind {
            ExprKind::Var {
                name,
                scope: VarScope::Global,
            } => self.store_global(name, value),
            ExprKind::Var {
                name,
                scope: VarScope::Local,
            } => {
                let local = self
                    .resolve_local(name)
                    .ok_or_else(|| BuildError::Internal(format!("assignment to undeclared variable `{name}`")))?;
                self.write_var(name, local, value);
                Ok(())
            }
            ExprKind::Deref(inner) => {
                let addr = self.lower_expr(inner)?;
                self.emit(Type::None, OpKind::StoreAddr { addr, value });
                Ok(())
            }
            ExprKind::Member { .. } | ExprKind::Subscript { .. } => {
                let (addr, bitfield) = self.lower_member_or_subscript_addr(target)?;
                match bitfield {
                    Some((bit_offset, width)) => {
                        self.emit(
                            Type::None,
                            OpKind::BitfieldStore {
                                addr,
                                bit_offset,
                                width,
                                value,
                            },
                        );
                    }
                    None => {
                        self.emit(Type::None, OpKind::StoreAddr { addr, value });
                    }
                }
                Ok(())
            }
            _ => Err(BuildError::Internal(format!(
                "expression is not assignable: {:?}",
                target.kind
            ))),
        }
    }

    fn load_global(&mut self, name: &str, ty: &Type) -> BuildResult<OpId> {
        let id = self.resolve_global(name).ok_or_else(undefined_global(name))?;
        Ok(self.emit(ty.clone(), OpKind::LoadGlobal(id)))
    }

    fn store_global(&mut self, name: &str, value: OpId) -> BuildResult<()> {
        let id = self.resolve_global(name).ok_or_else(undefined_global(name))?;
        self.emit(Type::None, OpKind::StoreGlobal(id, value));
        Ok(())
    }

    fn addr_of_global(&mut self, name: &str, ty: &Type) -> BuildResult<OpId> {
        let id = self.resolve_global(name).ok_or_else(undefined_global(name))?;
        Ok(self.emit(Type::ptr(ty.clone()), OpKind::AddrOfGlobal(id)))
    }
}

fn undefined_global(name: &str) -> impl FnOnce() -> BuildError + '_ {
    move || BuildError::Internal(format!("undefined global `{name}`"))
}

fn op_is_compare(op: crate::ast::BinaryOp) -> bool {
    use crate::ast::BinaryOp::*;
    matches!(op, Eq | Ne | Lt | Le | Gt | Ge)
}

/// Pick the concrete opcode for a source-level binary operator against
/// operand type `ty`: float operators are distinct opcodes, integer
/// arithmetic/shift/compare split into signed and unsigned variants per
/// `ty`'s signedness (spec.md §4.E "arithmetic respects the operand
/// signedness").
pub(crate) fn binary_op_kind(op: crate::ast::BinaryOp, ty: &Type) -> crate::ir::op::BinaryOp {
    use crate::ast::BinaryOp as A;
    use crate::ir::op::BinaryOp as I;
    let is_float = ty.is_float();
    let signed = ty.is_signed();
    match (op, is_float, signed) {
        (A::Add, false, _) => I::AddInt,
        (A::Add, true, _) => I::AddFloat,
        (A::Sub, false, _) => I::SubInt,
        (A::Sub, true, _) => I::SubFloat,
        (A::Mul, false, _) => I::MulInt,
        (A::Mul, true, _) => I::MulFloat,
        (A::Div, false, true) => I::DivS,
        (A::Div, false, false) => I::DivU,
        (A::Div, true, _) => I::DivFloat,
        (A::Rem, _, true) => I::RemS,
        (A::Rem, _, false) => I::RemU,
        (A::BitAnd, _, _) => I::And,
        (A::BitOr, _, _) => I::Or,
        (A::BitXor, _, _) => I::Xor,
        (A::Shl, _, _) => I::Shl,
        (A::Shr, _, true) => I::ShrS,
        (A::Shr, _, false) => I::ShrU,
        (A::Eq, false, _) => I::CmpEq,
        (A::Eq, true, _) => I::CmpEqFloat,
        (A::Ne, false, _) => I::CmpNe,
        (A::Ne, true, _) => I::CmpNeFloat,
        (A::Lt, false, true) => I::CmpLtS,
        (A::Lt, false, false) => I::CmpLtU,
        (A::Lt, true, _) => I::CmpLtFloat,
        (A::Le, false, true) => I::CmpLeS,
        (A::Le, false, false) => I::CmpLeU,
        (A::Le, true, _) => I::CmpLeFloat,
        (A::Gt, false, true) => I::CmpGtS,
        (A::Gt, false, false) => I::CmpGtU,
        (A::Gt, true, _) => I::CmpGtFloat,
        (A::Ge, false, true) => I::CmpGeS,
        (A::Ge, false, false) => I::CmpGeU,
        (A::Ge, true, _) => I::CmpGeFloat,
        (A::LogicalAnd, _, _) | (A::LogicalOr, _, _) => unreachable!("handled by lower_short_circuit"),
    }
}

#[cfg(test)]
mod tests {
    use super::binary_op_kind;
    use crate::ast::BinaryOp as A;
    use crate::ir::op::BinaryOp as I;
    use crate::ir::ty::{Prim, Type};
    use rstest::rstest;

    #[rstest]
    #[case(A::Div, Type::Primitive(Prim::I32), I::DivS)]
    #[case(A::Div, Type::Primitive(Prim::U32), I::DivU)]
    #[case(A::Rem, Type::Primitive(Prim::I64), I::RemS)]
    #[case(A::Rem, Type::Primitive(Prim::U64), I::RemU)]
    #[case(A::Shr, Type::Primitive(Prim::I16), I::ShrS)]
    #[case(A::Shr, Type::Primitive(Prim::U16), I::ShrU)]
    #[case(A::Lt, Type::Primitive(Prim::I8), I::CmpLtS)]
    #[case(A::Lt, Type::Primitive(Prim::U8), I::CmpLtU)]
    #[case(A::Lt, Type::Pointer(Box::new(Type::Primitive(Prim::I32))), I::CmpLtU)]
    #[case(A::Ge, Type::Primitive(Prim::U128), I::CmpGeU)]
    #[case(A::Add, Type::Primitive(Prim::F64), I::AddFloat)]
    #[case(A::Div, Type::Primitive(Prim::F32), I::DivFloat)]
    #[case(A::Eq, Type::Primitive(Prim::F32), I::CmpEqFloat)]
    #[case(A::BitAnd, Type::Primitive(Prim::U32), I::And)]
    fn picks_opcode_by_operator_and_signedness(#[case] op: A, #[case] ty: Type, #[case] expected: I) {
        assert_eq!(binary_op_kind(op, &ty), expected);
    }
}
