//! Builtin call recognition (SPEC_FULL.md §11): a handful of call
//! expressions whose callee names the compiler, not the user, so they lower
//! straight to a dedicated [`crate::ir::op::OpKind`] instead of an ordinary
//! `Call`. Checked before normal call lowering so a program is free to also
//! declare these names as real functions; only the builtin spellings below
//! are intercepted.
use crate::ast::Expr;
use crate::builder::Builder;
use crate::error::{BuildError, BuildResult};
use crate::ir::op::{OpId, OpKind, UnaryOp};
use crate::ir::ty::{Prim, Type};

type LowerFn = fn(&mut Builder, &[Expr], &Type) -> BuildResult<OpId>;

/// Entry point called from `Builder::lower_call` for a global-scope callee
/// named `name`. `None` means "not a builtin, lower as an ordinary call".
pub fn lower_builtin_call(
    b: &mut Builder,
    name: &str,
    args: &[Expr],
    ret_ty: &Type,
) -> Option<BuildResult<OpId>> {
    lookup(name).map(|f| f(b, args, ret_ty))
}

fn lookup(name: &str) -> Option<LowerFn> {
    if let Some(op) = fabs_op(name) {
        return Some(match op {
            UnaryOp::FAbs => fabs,
            UnaryOp::FSqrt => fsqrt,
            _ => unreachable!(),
        });
    }
    match name {
        "__builtin_va_start" => Some(va_start),
        "__builtin_va_copy" => Some(va_copy),
        "__builtin_va_arg" => Some(va_arg),
        "__builtin_va_end" => Some(va_end),
        "__builtin_popcount" | "__builtin_popcountl" | "__builtin_popcountll" => Some(popcount),
        "__builtin_clz" | "__builtin_clzl" | "__builtin_clzll" => Some(clz),
        "__builtin_ctz" | "__builtin_ctzl" | "__builtin_ctzll" => Some(ctz),
        "__builtin_bswap16" | "__builtin_bswap32" | "__builtin_bswap64" => Some(bswap),
        "__builtin_memset" => Some(memset),
        "__builtin_memcpy" => Some(memcpy),
        "__builtin_memmove" => Some(memmove),
        "__builtin_memcmp" => Some(memcmp),
        "__builtin_unreachable" => Some(unreachable_builtin),
        _ => None,
    }
}

/// `fabs`/`fabsf`/`fabsl` and `sqrt`/`sqrtf`/`sqrtl` are libm entry points,
/// not `__builtin_`-prefixed, but freestanding-mode front ends still expect
/// the compiler to recognise them and fold them to the arithmetic op rather
/// than emitting a real call.
fn fabs_op(name: &str) -> Option<UnaryOp> {
    match name {
        "fabs" | "fabsf" | "fabsl" | "__builtin_fabs" | "__builtin_fabsf" | "__builtin_fabsl" => {
            Some(UnaryOp::FAbs)
        }
        "sqrt" | "sqrtf" | "sqrtl" | "__builtin_sqrt" | "__builtin_sqrtf" | "__builtin_sqrtl" => {
            Some(UnaryOp::FSqrt)
        }
        _ => None,
    }
}

fn one_arg(b: &mut Builder, args: &[Expr]) -> BuildResult<OpId> {
    let [a] = args else {
        return Err(BuildError::Internal(
            "builtin called with wrong argument count".into(),
        ));
    };
    b.lower_expr(a)
}

fn fabs(b: &mut Builder, args: &[Expr], ret_ty: &Type) -> BuildResult<OpId> {
    let a = one_arg(b, args)?;
    Ok(b.emit(ret_ty.clone(), OpKind::Unary(UnaryOp::FAbs, a)))
}

fn fsqrt(b: &mut Builder, args: &[Expr], ret_ty: &Type) -> BuildResult<OpId> {
    let a = one_arg(b, args)?;
    Ok(b.emit(ret_ty.clone(), OpKind::Unary(UnaryOp::FSqrt, a)))
}

fn popcount(b: &mut Builder, args: &[Expr], ret_ty: &Type) -> BuildResult<OpId> {
    let a = one_arg(b, args)?;
    Ok(b.emit(ret_ty.clone(), OpKind::Unary(UnaryOp::PopCount, a)))
}

fn clz(b: &mut Builder, args: &[Expr], ret_ty: &Type) -> BuildResult<OpId> {
    let a = one_arg(b, args)?;
    Ok(b.emit(ret_ty.clone(), OpKind::Unary(UnaryOp::Clz, a)))
}

fn ctz(b: &mut Builder, args: &[Expr], ret_ty: &Type) -> BuildResult<OpId> {
    let a = one_arg(b, args)?;
    Ok(b.emit(ret_ty.clone(), OpKind::Unary(UnaryOp::Ctz, a)))
}

fn bswap(b: &mut Builder, args: &[Expr], ret_ty: &Type) -> BuildResult<OpId> {
    let a = one_arg(b, args)?;
    Ok(b.emit(ret_ty.clone(), OpKind::Unary(UnaryOp::ByteReverse, a)))
}

fn memset(b: &mut Builder, args: &[Expr], ret_ty: &Type) -> BuildResult<OpId> {
    let [dst, value, len] = args else {
        return Err(BuildError::Internal(
            "__builtin_memset called with wrong argument count".into(),
        ));
    };
    let dst = b.lower_expr(dst)?;
    let value = b.lower_expr(value)?;
    let len = b.lower_expr(len)?;
    Ok(b.emit(ret_ty.clone(), OpKind::MemSet { dst, value, len }))
}

fn memcpy(b: &mut Builder, args: &[Expr], ret_ty: &Type) -> BuildResult<OpId> {
    let [dst, src, len] = args else {
        return Err(BuildError::Internal(
            "__builtin_memcpy called with wrong argument count".into(),
        ));
    };
    let dst = b.lower_expr(dst)?;
    let src = b.lower_expr(src)?;
    let len = b.lower_expr(len)?;
    Ok(b.emit(ret_ty.clone(), OpKind::MemCopy { dst, src, len }))
}

fn memmove(b: &mut Builder, args: &[Expr], ret_ty: &Type) -> BuildResult<OpId> {
    let [dst, src, len] = args else {
        return Err(BuildError::Internal(
            "__builtin_memmove called with wrong argument count".into(),
        ));
    };
    let dst = b.lower_expr(dst)?;
    let src = b.lower_expr(src)?;
    let len = b.lower_expr(len)?;
    Ok(b.emit(ret_ty.clone(), OpKind::MemMove { dst, src, len }))
}

fn memcmp(b: &mut Builder, args: &[Expr], ret_ty: &Type) -> BuildResult<OpId> {
    let [a, bb, len] = args else {
        return Err(BuildError::Internal(
            "__builtin_memcmp called with wrong argument count".into(),
        ));
    };
    let a = b.lower_expr(a)?;
    let bb = b.lower_expr(bb)?;
    let len = b.lower_expr(len)?;
    Ok(b.emit(ret_ty.clone(), OpKind::MemCmp { a, b: bb, len }))
}

fn va_start(b: &mut Builder, args: &[Expr], ret_ty: &Type) -> BuildResult<OpId> {
    let list = args
        .first()
        .ok_or_else(|| BuildError::Internal("__builtin_va_start needs a va_list argument".into()))?;
    let list = b.lower_expr(list)?;
    Ok(b.emit(ret_ty.clone(), OpKind::VaStart(list)))
}

/// `va_copy(dst, src)` has no dedicated IR op: a `va_list` is just bytes on
/// every ABI this front end targets, so a copy is a `memcpy` of its size.
fn va_copy(b: &mut Builder, args: &[Expr], ret_ty: &Type) -> BuildResult<OpId> {
    let [dst, src] = args else {
        return Err(BuildError::Internal(
            "__builtin_va_copy called with wrong argument count".into(),
        ));
    };
    let va_list_ty = dst.ty.pointee().cloned().unwrap_or(dst.ty.clone());
    let size = va_list_ty.size_of(b.unit.target);
    let dst = b.lower_expr(dst)?;
    let src = b.lower_expr(src)?;
    let len = b.emit(Type::Primitive(Prim::I64), OpKind::ConstInt(size as i64));
    Ok(b.emit(
        ret_ty.clone(),
        OpKind::MemCopy { dst, src, len },
    ))
}

fn va_arg(b: &mut Builder, args: &[Expr], ret_ty: &Type) -> BuildResult<OpId> {
    let list = args
        .first()
        .ok_or_else(|| BuildError::Internal("__builtin_va_arg needs a va_list argument".into()))?;
    let va_list = b.lower_expr(list)?;
    Ok(b.emit(
        ret_ty.clone(),
        OpKind::VaArg {
            va_list,
            ty: ret_ty.clone(),
        },
    ))
}

/// No ABI this front end targets needs runtime action to end a `va_list`
/// scan; kept as a recognised builtin only so a program that calls it still
/// lowers instead of falling through to an undefined-symbol call.
fn va_end(b: &mut Builder, _args: &[Expr], ret_ty: &Type) -> BuildResult<OpId> {
    Ok(b.emit(ret_ty.clone(), OpKind::Undef))
}

fn unreachable_builtin(b: &mut Builder, _args: &[Expr], ret_ty: &Type) -> BuildResult<OpId> {
    Ok(b.emit(ret_ty.clone(), OpKind::Undef))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::test_support::{i32_ty, local_var, target};
    use crate::ir::unit::Unit;

    /// Build a bare `Builder` with a single local `x` of type `ty`, already
    /// holding a live (if meaningless) value, so builtin-lowering tests have
    /// an argument expression to pass without going through a full function.
    fn builder_with_local<'u>(unit: &'u mut Unit, ty: Type) -> (Builder<'u>, Expr) {
        let mut b = Builder::new(unit, "f", ty.clone(), &[]);
        let local = b.declare_local("x", ty.clone());
        let v = b.emit(ty.clone(), OpKind::Undef);
        b.write_var("x", local, v);
        (b, local_var("x", ty))
    }

    #[test]
    fn fabs_recognised_by_libm_and_builtin_spellings() {
        for name in ["fabs", "fabsf", "__builtin_fabs"] {
            let mut unit = Unit::new(target());
            let ty = Type::Primitive(Prim::F64);
            let (mut b, arg) = builder_with_local(&mut unit, ty.clone());
            let op = lower_builtin_call(&mut b, name, std::slice::from_ref(&arg), &ty)
                .expect("recognised as a builtin")
                .expect("lowers successfully");
            assert!(matches!(b.f.ops[op].kind, OpKind::Unary(UnaryOp::FAbs, _)));
        }
    }

    #[test]
    fn popcount_lowers_to_popcount_unary() {
        let mut unit = Unit::new(target());
        let ty = i32_ty();
        let (mut b, arg) = builder_with_local(&mut unit, ty.clone());
        let op = lower_builtin_call(&mut b, "__builtin_popcountl", std::slice::from_ref(&arg), &ty)
            .unwrap()
            .unwrap();
        assert!(matches!(b.f.ops[op].kind, OpKind::Unary(UnaryOp::PopCount, _)));
    }

    #[test]
    fn memset_lowers_with_all_three_operands() {
        let mut unit = Unit::new(target());
        let ptr_ty = Type::ptr(i32_ty());
        let (mut b, dst) = builder_with_local(&mut unit, ptr_ty.clone());
        let value = local_var("x", i32_ty());
        let len = local_var("x", Type::Primitive(Prim::I64));
        let op = lower_builtin_call(&mut b, "__builtin_memset", &[dst, value, len], &Type::None)
            .unwrap()
            .unwrap();
        assert!(matches!(b.f.ops[op].kind, OpKind::MemSet { .. }));
    }

    #[test]
    fn unknown_name_is_not_a_builtin() {
        assert!(lookup("not_a_builtin").is_none());
    }

    #[test]
    fn va_start_lowers_to_va_start_op() {
        let mut unit = Unit::new(target());
        let ty = Type::ptr(Type::Primitive(Prim::I8));
        let (mut b, arg) = builder_with_local(&mut unit, ty.clone());
        let op = lower_builtin_call(&mut b, "__builtin_va_start", std::slice::from_ref(&arg), &Type::None)
            .unwrap()
            .unwrap();
        assert!(matches!(b.f.ops[op].kind, OpKind::VaStart(_)));
    }
}
