//! Shared helpers for building small hand-rolled ASTs in builder unit tests.
//! Not a public module -- `#[cfg(test)]` only, included from `builder/mod.rs`.
#![cfg(test)]

use crate::ast::{
    AssignCasts, AssignOp, BinaryOp, Expr, ExprKind, FunctionDecl, InitElement, Initializer, Literal, Param,
    Stmt, StmtKind, VarScope,
};
use crate::ir::op::CastKind;
use crate::ir::ty::{Field, Prim, Type};
use crate::target::{Arch, Os, Target};

pub fn target() -> Target {
    Target {
        arch: Arch::X86_64,
        os: Os::Linux,
    }
}

pub fn i32_ty() -> Type {
    Type::Primitive(Prim::I32)
}

pub fn int_lit(v: i64) -> Expr {
    Expr::new(i32_ty(), ExprKind::Literal(Literal::Int(v)))
}

pub fn local_var(name: &str, ty: Type) -> Expr {
    Expr::new(
        ty,
        ExprKind::Var {
            name: name.to_string(),
            scope: VarScope::Local,
        },
    )
}

pub fn stmt(kind: StmtKind) -> Stmt {
    Stmt::new(0, kind)
}

pub fn param(name: &str, ty: Type) -> Param {
    Param {
        name: name.to_string(),
        ty,
    }
}

/// A `fn <name>(<params>) -> <ret> { <body> }` with external linkage.
pub fn function(name: &str, ret: Type, params: Vec<Param>, body: Vec<Stmt>) -> FunctionDecl {
    FunctionDecl {
        name: name.to_string(),
        ret,
        params,
        variadic: false,
        linkage: crate::ast::Linkage::External,
        body: Some(body),
    }
}

pub fn local_decl(name: &str, ty: Type, init: Option<Expr>) -> Stmt {
    stmt(StmtKind::LocalDecl {
        name: name.to_string(),
        ty,
        init: init.map(Initializer::Scalar),
    })
}

pub fn address_of(inner: Expr, pointee: Type) -> Expr {
    Expr::new(Type::ptr(pointee), ExprKind::AddressOf(Box::new(inner)))
}

pub fn deref(inner: Expr, pointee: Type) -> Expr {
    Expr::new(pointee, ExprKind::Deref(Box::new(inner)))
}

pub fn assign(target: Expr, value: Expr) -> Stmt {
    let ty = target.ty.clone();
    stmt(StmtKind::Expr(Expr::new(
        ty,
        ExprKind::Assign {
            op: AssignOp::Plain,
            casts: AssignCasts::default(),
            target: Box::new(target),
            value: Box::new(value),
        },
    )))
}

pub fn compound_assign(bin_op: crate::ast::BinaryOp, target: Expr, value: Expr) -> Stmt {
    let ty = target.ty.clone();
    stmt(StmtKind::Expr(Expr::new(
        ty,
        ExprKind::Assign {
            op: AssignOp::Compound(bin_op),
            casts: AssignCasts::default(),
            target: Box::new(target),
            value: Box::new(value),
        },
    )))
}

pub fn if_stmt(cond: Expr, then_branch: Vec<Stmt>, else_branch: Vec<Stmt>) -> Stmt {
    stmt(StmtKind::If {
        cond,
        then_branch,
        else_branch,
    })
}

pub fn ret(value: Option<Expr>) -> Stmt {
    stmt(StmtKind::Return(value))
}

pub fn defer_stmt(body: Vec<Stmt>) -> Stmt {
    stmt(StmtKind::Defer(body))
}

pub fn while_stmt(cond: Expr, body: Vec<Stmt>) -> Stmt {
    stmt(StmtKind::While { cond, body })
}

pub fn brk() -> Stmt {
    stmt(StmtKind::Break)
}

pub fn void_ty() -> Type {
    Type::None
}

pub fn struct_ty(fields: Vec<Type>) -> Type {
    Type::Struct(fields.into_iter().map(|t| (None, t) as Field).collect())
}

pub fn member(base: Expr, offset: u64, ty: Type) -> Expr {
    Expr::new(
        ty,
        ExprKind::Member {
            base: Box::new(base),
            offset,
            bitfield: None,
        },
    )
}

pub fn cast_expr(kind: CastKind, inner: Expr, ty: Type) -> Expr {
    Expr::new(ty, ExprKind::Cast(kind, Box::new(inner)))
}

pub fn binary(op: BinaryOp, ty: Type, lhs: Expr, rhs: Expr) -> Expr {
    Expr::new(ty, ExprKind::Binary(op, Box::new(lhs), Box::new(rhs)))
}

pub fn ternary(cond: Expr, then_val: Expr, else_val: Expr, ty: Type) -> Expr {
    Expr::new(
        ty,
        ExprKind::Ternary {
            cond: Box::new(cond),
            then_val: Box::new(then_val),
            else_val: Box::new(else_val),
        },
    )
}

pub fn int_lit_ty(v: i64, ty: Type) -> Expr {
    Expr::new(ty, ExprKind::Literal(Literal::Int(v)))
}

pub fn local_decl_init(name: &str, ty: Type, init: Initializer) -> Stmt {
    stmt(StmtKind::LocalDecl {
        name: name.to_string(),
        ty,
        init: Some(init),
    })
}

pub fn aggregate_init(elements: Vec<(u64, Expr)>) -> Initializer {
    Initializer::Aggregate(
        elements
            .into_iter()
            .map(|(offset, value)| InitElement { offset, bitfield: None, value })
            .collect(),
    )
}
