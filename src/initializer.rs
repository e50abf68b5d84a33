//! Initializer layout engine (spec.md §4.F): flattens struct/union/array
//! initializers -- local and global -- into `(offset, bitfield?, value)`
//! triples, matching how the type checker has already resolved designated
//! initializers before this crate sees them (`ast::expr::InitElement`).
//!
//! Design Note "Over-zeroing of aggregates at init": a local aggregate with
//! a partial initializer is always `memset` to zero first, then every
//! supplied element is stored over it -- simpler and more robust than
//! tracking which bytes the initializer did not cover, at the cost of a
//! sometimes-redundant zero-fill the code generator is free to eliminate
//! later.
use crate::ast::{Expr, ExprKind, Initializer, Literal};
use crate::builder::Builder;
use crate::error::{BuildError, BuildResult};
use crate::ir::op::{LocalId, OpKind};
use crate::ir::ty::{Prim, Type};
use crate::ir::unit::{DefState, Global, GlobalKind, GlobalValue, Linkage, Unit};

/// Materialise `init` into `local`, zero-filling first when it is an
/// aggregate.
pub fn materialise_local(b: &mut Builder, local: LocalId, ty: &Type, init: &Initializer) -> BuildResult<()> {
    match init {
        Initializer::Scalar(expr) => {
            let v = b.lower_expr(expr)?;
            b.emit(Type::None, OpKind::StoreLocal(local, v));
            Ok(())
        }
        Initializer::Aggregate(elements) => {
            zero_fill(b, local, ty);
            for el in elements {
                let v = b.lower_expr(&el.value)?;
                let base = b.emit(Type::ptr(ty.clone()), OpKind::AddrOfLocal(local));
                let addr = b.emit(
                    Type::ptr(el.value.ty.clone()),
                    OpKind::AddressOffset {
                        base,
                        index: None,
                        disp: el.offset as i64,
                    },
                );
                match el.bitfield {
                    Some((bit_offset, width)) => {
                        b.emit(
                            Type::None,
                            OpKind::BitfieldStore {
                                addr,
                                bit_offset,
                                width,
                                value: v,
                            },
                        );
                    }
                    None => {
                        b.emit(Type::None, OpKind::StoreAddr { addr, value: v });
                    }
                }
            }
            Ok(())
        }
    }
}

fn zero_fill(b: &mut Builder, local: LocalId, ty: &Type) {
    let target = b.unit.target;
    let addr = b.emit(Type::ptr(ty.clone()), OpKind::AddrOfLocal(local));
    let zero = b.emit(Type::Primitive(Prim::I8), OpKind::ConstInt(0));
    let len = b.emit(
        Type::Primitive(Prim::I64),
        OpKind::ConstInt(ty.size_of(target) as i64),
    );
    b.emit(
        Type::None,
        OpKind::MemSet {
            dst: addr,
            value: zero,
            len,
        },
    );
}

/// Flatten a global's initializer into the constant `GlobalValue`
/// representation (no IR ops -- globals are data, not code). Every
/// sub-expression must be a constant expression; anything else is an
/// internal error (the type checker rejects non-constant global
/// initializers before this crate ever sees them).
///
/// Takes `unit` because a file-scope `&(T){...}` compound literal
/// (spec.md §8 Scenario 5) has no global of its own to point at -- one
/// has to be synthesized and pushed into the unit right here.
pub fn flatten_global(unit: &mut Unit, init: &Initializer) -> BuildResult<GlobalValue> {
    match init {
        Initializer::Scalar(expr) => flatten_const_expr(unit, expr),
        Initializer::Aggregate(elements) => {
            let mut fields = Vec::with_capacity(elements.len());
            for el in elements {
                fields.push((el.offset, Box::new(flatten_const_expr(unit, &el.value)?)));
            }
            Ok(GlobalValue::Struct(fields))
        }
    }
}

fn flatten_const_expr(unit: &mut Unit, expr: &Expr) -> BuildResult<GlobalValue> {
    match &expr.kind {
        ExprKind::Literal(Literal::Int(v)) => Ok(GlobalValue::Int(*v)),
        ExprKind::Literal(Literal::Float(v)) => Ok(GlobalValue::Float(*v)),
        ExprKind::AddressOf(inner) => match &inner.kind {
            ExprKind::Var { name, .. } => Ok(GlobalValue::AddressOf(name.clone())),
            ExprKind::CompoundLiteral(literal_init) => {
                let value = flatten_global(unit, literal_init)?;
                let name = unit.fresh_global_name("compound_literal");
                unit.push_global(Global {
                    name: name.clone(),
                    linkage: Linkage::Internal,
                    def_state: DefState::Defined,
                    ty: inner.ty.clone(),
                    kind: GlobalKind::Data {
                        ty: inner.ty.clone(),
                        init: Some(value),
                    },
                });
                Ok(GlobalValue::AddressOf(name))
            }
            _ => Err(BuildError::Unsupported(
                "address-of-non-variable global initializer".into(),
            )),
        },
        other => Err(BuildError::Unsupported(format!(
            "non-constant global initializer: {other:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::{Arch, Os, Target};

    fn target() -> Target {
        Target { arch: Arch::X86_64, os: Os::Linux }
    }

    fn int_lit(v: i64) -> Expr {
        Expr::new(Type::Primitive(Prim::I32), ExprKind::Literal(Literal::Int(v)))
    }

    /// `int *p = &(int){10};` at file scope: the compound literal has no
    /// global of its own to point at, so `flatten_global` must synthesize
    /// one and have `p`'s value address it.
    #[test]
    fn global_compound_literal_is_hoisted_to_its_own_global() {
        let mut unit = Unit::new(target());
        let literal_ty = Type::Primitive(Prim::I32);
        let compound = Expr::new(
            literal_ty.clone(),
            ExprKind::CompoundLiteral(Box::new(Initializer::Scalar(int_lit(10)))),
        );
        let address = Expr::new(Type::ptr(literal_ty), ExprKind::AddressOf(Box::new(compound)));
        let init = Initializer::Scalar(address);

        let before = unit.globals.iter().count();
        let value = flatten_global(&mut unit, &init).expect("compound literal is a valid global initializer");

        assert_eq!(unit.globals.iter().count(), before + 1, "a fresh global must be synthesized");
        match value {
            GlobalValue::AddressOf(name) => {
                let g = unit.find_global(&name).expect("the synthesized global is registered by name");
                assert_eq!(g.linkage, Linkage::Internal);
                assert_eq!(g.def_state, DefState::Defined);
                match &g.kind {
                    GlobalKind::Data { init: Some(GlobalValue::Int(10)), .. } => {}
                    other => panic!("expected a defined scalar global holding 10, got {other:?}"),
                }
            }
            other => panic!("expected AddressOf a synthesized global, got {other:?}"),
        }
    }

    #[test]
    fn two_global_compound_literals_get_distinct_names() {
        let mut unit = Unit::new(target());
        let lit = |v| Initializer::Scalar(int_lit(v));
        let compound = |init: Initializer| {
            Expr::new(Type::Primitive(Prim::I32), ExprKind::CompoundLiteral(Box::new(init)))
        };
        let addr = |init: Initializer| {
            Initializer::Scalar(Expr::new(
                Type::ptr(Type::Primitive(Prim::I32)),
                ExprKind::AddressOf(Box::new(compound(init))),
            ))
        };

        let a = flatten_global(&mut unit, &addr(lit(1))).unwrap();
        let b = flatten_global(&mut unit, &addr(lit(2))).unwrap();
        let (GlobalValue::AddressOf(name_a), GlobalValue::AddressOf(name_b)) = (a, b) else {
            panic!("expected both to hoist to AddressOf globals");
        };
        assert_ne!(name_a, name_b, "each compound literal must get its own global");
    }
}
