//! CFG maintenance utilities (spec.md §4.G): dead-block pruning and the
//! post-build invariant check run at the end of [`crate::builder::Builder`]
//! finalisation.
use crate::error::{BuildError, BuildResult};
use crate::ir::function::Function;
use crate::ir::op::{BlockId, OpKind};

/// Remove blocks with no ops and no incoming edges from `block_order`
/// (spec.md §4.G). The entry block is exempt: it always has an empty
/// `preds`, which would otherwise make an empty entry look dead.
pub fn prune_unreachable(f: &mut Function) {
    let entry = f.entry;
    f.block_order
        .retain(|&b| b == entry || !(is_empty_block(f, b) && f.blocks[b].preds.is_empty()));
}

fn is_empty_block(f: &Function, block: BlockId) -> bool {
    f.blocks[block]
        .stmts
        .iter()
        .all(|&s| f.stmts[s].ops.is_empty())
}

/// Re-check, after a whole function has been built, the structural
/// invariants the builder is supposed to maintain throughout (spec.md
/// invariants 1-2): every block left in `block_order` is terminated, phis
/// sit at block entry with exactly one entry per predecessor, and every
/// operand the use-walker visits names an op that actually exists in this
/// function's arena.
pub fn validate(f: &Function) -> BuildResult<()> {
    for block in f.blocks_in_order() {
        if !f.is_terminated(block) {
            return Err(BuildError::Internal(format!(
                "block {block:?} of `{}` is not terminated",
                f.name
            )));
        }
        validate_phi_placement(f, block)?;
        for &stmt in &f.blocks[block].stmts {
            for &op in &f.stmts[stmt].ops {
                validate_uses(f, op)?;
            }
        }
    }
    Ok(())
}

fn validate_phi_placement(f: &Function, block: BlockId) -> BuildResult<()> {
    let b = &f.blocks[block];
    for (i, &stmt) in b.stmts.iter().enumerate() {
        for &op in &f.stmts[stmt].ops {
            let OpKind::Phi(entries) = &f.ops[op].kind else {
                continue;
            };
            if Some(stmt) != b.phi_stmt || i != 0 {
                return Err(BuildError::Internal(format!(
                    "phi {op:?} does not sit at block {block:?} entry"
                )));
            }
            if entries.len() != b.preds.len() {
                return Err(BuildError::Internal(format!(
                    "phi {op:?} has {} entries, block {block:?} has {} predecessors",
                    entries.len(),
                    b.preds.len()
                )));
            }
            let mut seen: Vec<u32> = entries.iter().map(|e| e.pred.raw()).collect();
            let mut expected: Vec<u32> = b.preds.iter().map(|p| p.raw()).collect();
            seen.sort_unstable();
            expected.sort_unstable();
            if seen != expected {
                return Err(BuildError::Internal(format!(
                    "phi {op:?} predecessor set does not match block {block:?}'s actual predecessors"
                )));
            }
        }
    }
    Ok(())
}

fn validate_uses(f: &Function, op: crate::ir::op::OpId) -> BuildResult<()> {
    let mut bad = None;
    f.ops[op].kind.for_each_use(|used| {
        if bad.is_none() && used.raw() as usize >= f.ops.len() {
            bad = Some(used);
        }
    });
    match bad {
        Some(used) => Err(BuildError::Internal(format!(
            "op {op:?} uses {used:?}, which is not defined in this function"
        ))),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::function::Function;
    use crate::ir::op::{OpId, PhiEntry};
    use crate::ir::ty::{Prim, Type};

    #[test]
    fn prune_removes_dead_empty_block() {
        let mut f = Function::new("f", Type::None, vec![]);
        let entry = f.entry;
        let dead = f.new_block();
        let _ = f.new_statement(entry, true);
        let stmt = f.new_statement(entry, false);
        f.push_op(stmt, Type::None, OpKind::Ret(None));
        assert_eq!(f.block_order.len(), 2);
        prune_unreachable(&mut f);
        assert_eq!(f.block_order, vec![entry]);
        let _ = dead;
    }

    #[test]
    fn prune_keeps_empty_entry() {
        let mut f = Function::new("f", Type::None, vec![]);
        let entry = f.entry;
        prune_unreachable(&mut f);
        assert_eq!(f.block_order, vec![entry]);
    }

    #[test]
    fn validate_rejects_unterminated_block() {
        let mut f = Function::new("f", Type::None, vec![]);
        let stmt = f.new_statement(f.entry, false);
        f.push_op(stmt, Type::Primitive(Prim::I32), OpKind::ConstInt(1));
        assert!(validate(&f).is_err());
    }

    #[test]
    fn validate_accepts_well_formed_diamond() {
        let mut f = Function::new("f", Type::Primitive(Prim::I32), vec![]);
        let entry = f.entry;
        let left = f.new_block();
        let right = f.new_block();
        let join = f.new_block();

        let stmt = f.new_statement(entry, false);
        let cond = f.push_op(stmt, Type::Primitive(Prim::I1), OpKind::ConstInt(1));
        f.blocks[entry].succs.push(left);
        f.blocks[entry].succs.push(right);
        f.blocks[left].preds.push(entry);
        f.blocks[right].preds.push(entry);
        f.push_op(
            stmt,
            Type::None,
            OpKind::CondBranch {
                cond,
                then_block: left,
                else_block: right,
            },
        );

        let left_stmt = f.new_statement(left, false);
        let lv = f.push_op(left_stmt, Type::Primitive(Prim::I32), OpKind::ConstInt(1));
        f.blocks[join].preds.push(left);
        f.blocks[left].succs.push(join);
        f.push_op(left_stmt, Type::None, OpKind::Branch(join));

        let right_stmt = f.new_statement(right, false);
        let rv = f.push_op(right_stmt, Type::Primitive(Prim::I32), OpKind::ConstInt(2));
        f.blocks[join].preds.push(right);
        f.blocks[right].succs.push(join);
        f.push_op(right_stmt, Type::None, OpKind::Branch(join));

        let phi_stmt = f.phi_statement(join);
        let phi: OpId = f.push_op(
            phi_stmt,
            Type::Primitive(Prim::I32),
            OpKind::Phi(vec![
                PhiEntry { pred: left, value: lv },
                PhiEntry { pred: right, value: rv },
            ]),
        );
        let join_stmt = f.new_statement(join, false);
        f.push_op(join_stmt, Type::None, OpKind::Ret(Some(phi)));

        prune_unreachable(&mut f);
        assert!(validate(&f).is_ok());
    }
}
