//! Phi construction: insert-empty-then-backfill (spec.md §4.E, SPEC_FULL.md
//! §7). A block's phi is created eagerly -- with no operands -- the moment a
//! variable read needs one, so that a recursive read flowing back around a
//! loop finds a cached value instead of recursing forever. Operands are
//! filled in once the block is "sealed", i.e. once the builder knows it will
//! never wire another predecessor onto it.
use std::collections::HashMap;

use crate::ir::function::Function;
use crate::ir::op::{BlockId, OpId, OpKind, PhiEntry};
use crate::ir::ty::Type;
use crate::varmap::{Scope, VarMap};

#[derive(Debug, Default)]
pub struct PhiState {
    sealed: std::collections::HashSet<BlockId>,
    /// Phi ops created before their block was sealed, waiting for operands.
    incomplete: HashMap<BlockId, Vec<(String, Scope, OpId)>>,
}

impl PhiState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_sealed(&self, block: BlockId) -> bool {
        self.sealed.contains(&block)
    }

    /// Mark `block` as having all its predecessors wired. Fills in every
    /// phi that was left incomplete while this block was open.
    pub fn seal_block(&mut self, f: &mut Function, vars: &mut VarMap, block: BlockId) {
        self.sealed.insert(block);
        let pending = self.incomplete.remove(&block).unwrap_or_default();
        for (name, scope, phi_id) in pending {
            fill_phi_operands(self, f, vars, block, phi_id, &name, scope);
            simplify_phi(f, vars, block, phi_id, &name, scope);
        }
    }

    /// Read the current SSA value of `name` as seen from `block`, inserting
    /// phis across merge points as needed.
    pub fn read_variable(
        &mut self,
        f: &mut Function,
        vars: &mut VarMap,
        block: BlockId,
        name: &str,
        scope: Scope,
        ty: &Type,
    ) -> OpId {
        if let Some(binding) = vars.get_ref_in_block(name, scope, block) {
            return binding;
        }
        if !self.is_sealed(block) {
            let phi_id = new_empty_phi(f, block, ty.clone());
            vars.cache_in_block(name, scope, block, phi_id);
            self.incomplete
                .entry(block)
                .or_default()
                .push((name.to_string(), scope, phi_id));
            return phi_id;
        }
        let preds = f.blocks[block].preds.clone();
        match preds.as_slice() {
            [] => {
                // No predecessor and no cached definition: an uninitialised
                // read, e.g. of a local never assigned on this path.
                new_undef(f, block, ty.clone())
            }
            [single] => {
                let v = self.read_variable(f, vars, *single, name, scope, ty);
                vars.cache_in_block(name, scope, block, v);
                v
            }
            _ => {
                let phi_id = new_empty_phi(f, block, ty.clone());
                vars.cache_in_block(name, scope, block, phi_id);
                fill_phi_operands(self, f, vars, block, phi_id, name, scope);
                simplify_phi(f, vars, block, phi_id, name, scope)
            }
        }
    }
}

fn new_empty_phi(f: &mut Function, block: BlockId, ty: Type) -> OpId {
    let stmt = f.phi_statement(block);
    f.push_op(stmt, ty, OpKind::Phi(Vec::new()))
}

fn new_undef(f: &mut Function, block: BlockId, ty: Type) -> OpId {
    let stmt = f.new_statement(block, false);
    f.push_op(stmt, ty, OpKind::Undef)
}

fn fill_phi_operands(
    state: &mut PhiState,
    f: &mut Function,
    vars: &mut VarMap,
    block: BlockId,
    phi_id: OpId,
    name: &str,
    scope: Scope,
) {
    let preds = f.blocks[block].preds.clone();
    let ty = f.ops[phi_id].ty.clone();
    let mut entries = Vec::with_capacity(preds.len());
    for pred in preds {
        let value = state.read_variable(f, vars, pred, name, scope, &ty);
        entries.push(PhiEntry { pred, value });
    }
    if let OpKind::Phi(slots) = &mut f.ops[phi_id].kind {
        *slots = entries;
    }
}

/// A phi with a single distinct non-self operand is redundant; replace its
/// cached binding with that operand directly. The phi op itself is left in
/// the arena (dead-code elimination is out of scope) but no longer
/// referenced by the variable table.
fn simplify_phi(
    f: &mut Function,
    vars: &mut VarMap,
    block: BlockId,
    phi_id: OpId,
    name: &str,
    scope: Scope,
) -> OpId {
    let OpKind::Phi(entries) = &f.ops[phi_id].kind else {
        return phi_id;
    };
    let mut distinct: Vec<OpId> = Vec::new();
    for e in entries {
        if e.value != phi_id && !distinct.contains(&e.value) {
            distinct.push(e.value);
        }
    }
    match distinct.as_slice() {
        [only] => {
            let only = *only;
            vars.cache_in_block(name, scope, block, only);
            only
        }
        _ => phi_id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::function::Function;
    use crate::ir::ty::{Prim, Type};

    #[test]
    fn diamond_merge_inserts_phi() {
        let mut f = Function::new("f", Type::None, vec![]);
        let entry = f.entry;
        let left = f.new_block();
        let right = f.new_block();
        let join = f.new_block();
        f.blocks[left].preds.push(entry);
        f.blocks[right].preds.push(entry);
        f.blocks[join].preds.push(left);
        f.blocks[join].preds.push(right);

        let mut vars = VarMap::new();
        let mut phis = PhiState::new();
        for b in [entry, left, right] {
            phis.seal_block(&mut f, &mut vars, b);
        }
        let local = f.alloc_local(Type::Primitive(Prim::I32), Default::default(), None);
        let left_stmt = f.new_statement(left, false);
        let v_left = f.push_op(left_stmt, Type::Primitive(Prim::I32), OpKind::ConstInt(1));
        vars.add_ref("x", Scope::Block(0), left, local, v_left);
        let right_stmt = f.new_statement(right, false);
        let v_right = f.push_op(right_stmt, Type::Primitive(Prim::I32), OpKind::ConstInt(2));
        vars.add_ref("x", Scope::Block(0), right, local, v_right);
        phis.seal_block(&mut f, &mut vars, join);

        let result = phis.read_variable(
            &mut f,
            &mut vars,
            join,
            "x",
            Scope::Block(0),
            &Type::Primitive(Prim::I32),
        );
        match &f.ops[result].kind {
            OpKind::Phi(entries) => assert_eq!(entries.len(), 2),
            other => panic!("expected phi, got {other:?}"),
        }
    }

    #[test]
    fn single_predecessor_never_creates_phi() {
        let mut f = Function::new("f", Type::None, vec![]);
        let entry = f.entry;
        let next = f.new_block();
        f.blocks[next].preds.push(entry);

        let mut vars = VarMap::new();
        let mut phis = PhiState::new();
        let local = f.alloc_local(Type::Primitive(Prim::I32), Default::default(), None);
        let stmt = f.new_statement(entry, false);
        let v = f.push_op(stmt, Type::Primitive(Prim::I32), OpKind::ConstInt(7));
        vars.add_ref("x", Scope::Block(0), entry, local, v);
        phis.seal_block(&mut f, &mut vars, entry);
        phis.seal_block(&mut f, &mut vars, next);

        let result = phis.read_variable(
            &mut f,
            &mut vars,
            next,
            "x",
            Scope::Block(0),
            &Type::Primitive(Prim::I32),
        );
        assert_eq!(result, v);
    }
}
