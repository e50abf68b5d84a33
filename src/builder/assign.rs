//! Assignment dispatch (spec.md §4.E): plain and compound assignment,
//! applying the type checker's pre/post cast flags around the store.
use crate::ast::{AssignCasts, AssignOp, Expr};
use crate::builder::expr::binary_op_kind;
use crate::builder::Builder;
use crate::error::BuildResult;
use crate::ir::op::OpId;

impl<'u> Builder<'u> {
    pub fn lower_assign(
        &mut self,
        op: AssignOp,
        casts: &AssignCasts,
        target: &Expr,
        value: &Expr,
    ) -> BuildResult<OpId> {
        let rhs = self.lower_expr(value)?;
        let computed = match op {
            AssignOp::Plain => rhs,
            AssignOp::Compound(bin_op) => {
                let old = self.lower_expr(target)?;
                let kind = binary_op_kind(bin_op, &target.ty);
                self.emit(target.ty.clone(), crate::ir::op::OpKind::Binary(kind, old, rhs))
            }
        };
        let stored = match casts.store_cast {
            Some(cast) => self.emit(target.ty.clone(), crate::ir::op::OpKind::Cast(cast, computed)),
            None => computed,
        };
        self.store_to_lvalue(target, stored)?;
        Ok(match casts.result_cast {
            Some(cast) => self.emit(target.ty.clone(), crate::ir::op::OpKind::Cast(cast, stored)),
            None => stored,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::super::Builder;
    use crate::ast::BinaryOp;
    use crate::ir::op::{BinaryOp as IBinaryOp, OpKind};
    use crate::ir::ty::{Prim, Type};
    use crate::ir::unit::Unit;

    fn compound_div_kind(ty: Type) -> IBinaryOp {
        let decl = function(
            "f",
            ty.clone(),
            vec![param("a", ty.clone()), param("b", ty.clone())],
            vec![
                compound_assign(BinaryOp::Div, local_var("a", ty.clone()), local_var("b", ty.clone())),
                ret(Some(local_var("a", ty))),
            ],
        );
        let mut unit = Unit::new(target());
        let f = Builder::build(&decl, &mut unit, target()).expect("well-formed function builds");
        f.ops
            .iter()
            .find_map(|(_, op)| match &op.kind {
                OpKind::Binary(kind, ..) => Some(*kind),
                _ => None,
            })
            .expect("compound assignment emits a Binary op")
    }

    #[test]
    fn unsigned_compound_div_picks_div_u() {
        assert_eq!(compound_div_kind(Type::Primitive(Prim::U32)), IBinaryOp::DivU);
    }

    #[test]
    fn signed_compound_div_picks_div_s() {
        assert_eq!(compound_div_kind(Type::Primitive(Prim::I32)), IBinaryOp::DivS);
    }
}
