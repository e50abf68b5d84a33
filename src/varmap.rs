//! Variable-reference table (spec.md §4.D) and the var-writes map.
//!
//! Per-block SSA values are cached here (`get_ref_in_block`/`cache_in_block`)
//! and read back by `builder::phi`'s Braun-style `read_variable`, which walks
//! predecessors and inserts phis itself rather than this table doing any
//! scope fallback. Scope-chain fallback across `(name, scope)` pairs --
//! current scope, then each enclosing one, then `Global` -- is the caller's
//! job (`Builder::read_var`/`resolve_local`), since only the caller knows
//! the live `scope_stack` chain; `local_of` here is always an exact-scope
//! lookup. Phi placeholders are cached the same way real writes are, just
//! without going through `add_ref`'s write-log bookkeeping.
use std::collections::HashMap;

use crate::ir::op::{BlockId, LocalId, OpId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Ordinary block (or function) scope, identified by a unique id minted
    /// per `push_scope`: `0` is function scope, every nested `{ }` gets its
    /// own id. Never the nesting depth -- two sibling scopes at the same
    /// depth (an `if`'s then- and else-branch, say) must not collide here.
    Block(u32),
    Global,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Key {
    name: String,
    scope: Scope,
    block: BlockId,
}

#[derive(Debug, Default)]
pub struct VarMap {
    /// Per-(name, scope, block) cached SSA value -- the table's primary
    /// index.
    refs: HashMap<Key, OpId>,
    /// Every (name, scope) pair ever bound, independent of block, so a
    /// lookup can fall back across blocks without a linear scan.
    scope_index: HashMap<(String, Scope), LocalId>,
    /// Records every block in which a variable was written, used by phi
    /// insertion to know which predecessors can supply a definition
    /// (spec.md §3 "Var-writes map").
    writes: HashMap<(String, Scope), Vec<BlockId>>,
}

impl VarMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `name` was (re)assigned `value` in `block`, backed by
    /// `local`. Updates the per-block cache, the scope index, and the
    /// var-writes map.
    pub fn add_ref(&mut self, name: &str, scope: Scope, block: BlockId, local: LocalId, value: OpId) {
        self.cache_in_block(name, scope, block, value);
        self.scope_index
            .entry((name.to_string(), scope))
            .or_insert(local);
        self.writes
            .entry((name.to_string(), scope))
            .or_default()
            .push(block);
    }

    /// Cache `value` for `(name, scope, block)` without recording a write
    /// (used for phi placeholders, which are not source-level writes).
    pub fn cache_in_block(&mut self, name: &str, scope: Scope, block: BlockId, value: OpId) {
        self.refs.insert(
            Key {
                name: name.to_string(),
                scope,
                block,
            },
            value,
        );
    }

    /// Exact `(name, scope, block)` lookup only, with no fallback.
    pub fn get_ref_in_block(&self, name: &str, scope: Scope, block: BlockId) -> Option<OpId> {
        self.refs
            .get(&Key {
                name: name.to_string(),
                scope,
                block,
            })
            .copied()
    }

    /// Promote a variable found only by name (e.g. a forward reference
    /// resolved by the type checker to file scope) to a tracked local
    /// without an initial write.
    pub fn promote_to_local(&mut self, name: &str, scope: Scope, local: LocalId) {
        self.scope_index
            .entry((name.to_string(), scope))
            .or_insert(local);
    }

    pub fn local_of(&self, name: &str, scope: Scope) -> Option<LocalId> {
        self.scope_index.get(&(name.to_string(), scope)).copied()
    }

    /// Every block in which `name` was written, in write order -- what phi
    /// insertion walks to decide which predecessors need a phi entry.
    pub fn writes_of(&self, name: &str, scope: Scope) -> &[BlockId] {
        self.writes
            .get(&(name.to_string(), scope))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::Id;

    fn block(n: u32) -> BlockId {
        Id::from_raw(n)
    }

    #[test]
    fn get_ref_in_block_is_exact_only() {
        let mut vm = VarMap::new();
        let local = Id::from_raw(0);
        vm.add_ref("x", Scope::Block(0), block(0), local, Id::from_raw(10));
        vm.add_ref("x", Scope::Block(0), block(1), local, Id::from_raw(11));
        assert_eq!(vm.get_ref_in_block("x", Scope::Block(0), block(1)), Some(Id::from_raw(11)));
        assert_eq!(vm.get_ref_in_block("x", Scope::Block(0), block(2)), None);
    }

    #[test]
    fn local_of_falls_back_to_global_only_when_asked() {
        let mut vm = VarMap::new();
        let local = Id::from_raw(0);
        vm.promote_to_local("g", Scope::Global, local);
        assert_eq!(vm.local_of("g", Scope::Global), Some(local));
        assert_eq!(vm.local_of("g", Scope::Block(0)), None);
    }

    #[test]
    fn unwritten_variable_is_absent() {
        let vm = VarMap::new();
        assert!(vm.get_ref_in_block("z", Scope::Block(0), block(0)).is_none());
    }
}
