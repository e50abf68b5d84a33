//! IR builder (spec.md §4.E, the hard part): lowers one typed
//! [`ast::FunctionDecl`] at a time into a [`Function`], threading a shared
//! [`VarMap`]/[`PhiState`] pair and a [`Unit`] for global lookups.
pub mod assign;
pub mod control;
pub mod expr;
pub mod phi;
#[cfg(test)]
pub(crate) mod test_support;

use crate::ast::{FunctionDecl, Param};
use crate::error::{BuildError, BuildResult};
use crate::ir::function::{FunctionFlags, LocalFlags};
use crate::ir::op::{BlockId, LocalId, OpId, OpKind, StmtId};
use crate::ir::ty::Type;
use crate::ir::unit::{Global, Linkage, Unit};
use crate::ir::Function;
use crate::target::Target;
use crate::varmap::{Scope, VarMap};

use self::phi::PhiState;

struct LoopCtx {
    continue_block: BlockId,
    break_block: BlockId,
    /// `defer_stack` depth at loop entry, so `break`/`continue` replay only
    /// the defers registered inside the loop, not ones belonging to scopes
    /// the loop itself is nested in.
    defer_depth: usize,
}

struct SwitchCtx {
    break_block: BlockId,
    defer_depth: usize,
}

/// One function's worth of builder state. A fresh `Builder` is created per
/// function (per §5 "each task gets its own arena"); `Unit` is shared so
/// global lookups and finished functions can be pushed back into it.
pub struct Builder<'u> {
    pub unit: &'u mut Unit,
    pub f: Function,
    vars: VarMap,
    phis: PhiState,
    current_block: BlockId,
    current_stmt: StmtId,
    /// Chain of lexically enclosing scope ids, innermost last; index 0 is
    /// always function scope (id 0). Each `push_scope` mints a fresh id
    /// rather than reusing the nesting depth, so sibling scopes at the same
    /// depth (an `if`'s then- and else-branch, say) never alias each
    /// other's `scope_index`/`writes` entries in the variable table.
    scope_stack: Vec<u32>,
    next_scope_id: u32,
    loop_stack: Vec<LoopCtx>,
    switch_stack: Vec<SwitchCtx>,
    defer_stack: Vec<Vec<crate::ast::Stmt>>,
    labels: std::collections::HashMap<String, BlockId>,
    /// Locals whose address has been taken. Reads/writes of an escaped
    /// local go through explicit `LoadLocal`/`StoreLocal` ops against its
    /// memory slot instead of the SSA variable table, since a pointer to
    /// it may alias stores the builder cannot see (classic mem2reg split).
    escaped: std::collections::HashSet<LocalId>,
}

impl<'u> Builder<'u> {
    pub fn new(unit: &'u mut Unit, name: &str, ret: Type, params: &[Param]) -> Self {
        let param_types = params.iter().map(|p| p.ty.clone()).collect();
        let mut f = Function::new(name, ret, param_types);
        let entry = f.entry;
        let stmt = f.new_statement(entry, true);
        Builder {
            unit,
            f,
            vars: VarMap::new(),
            phis: PhiState::new(),
            current_block: entry,
            current_stmt: stmt,
            scope_stack: vec![0],
            next_scope_id: 1,
            loop_stack: Vec::new(),
            switch_stack: Vec::new(),
            defer_stack: vec![Vec::new()],
            labels: std::collections::HashMap::new(),
            escaped: std::collections::HashSet::new(),
        }
    }

    /// Build a whole function body: materialise parameters, lower every
    /// statement, then finalise (§4.E "finalisation").
    pub fn build(decl: &FunctionDecl, unit: &'u mut Unit, target: Target) -> BuildResult<Function> {
        let _ = target;
        let mut b = Builder::new(unit, &decl.name, decl.ret.clone(), &decl.params);
        if decl.variadic {
            b.f.flags |= FunctionFlags::USES_VARARGS;
        }
        b.materialise_params(&decl.params);
        if let Some(body) = &decl.body {
            for stmt in body {
                b.lower_stmt(stmt)?;
            }
        }
        b.finalize(&decl.ret)?;
        Ok(b.f)
    }

    fn materialise_params(&mut self, params: &[Param]) {
        for p in params {
            let local = self
                .f
                .alloc_local(p.ty.clone(), LocalFlags::PARAM, Some(p.name.clone()));
            let value = self.emit(p.ty.clone(), OpKind::Mov);
            self.f.ops[value].flags |= crate::ir::op::OpFlags::PARAM;
            self.write_var(&p.name, local, value);
        }
    }

    /// Append `kind`/`ty` to the current statement, returning its id.
    pub fn emit(&mut self, ty: Type, kind: OpKind) -> OpId {
        self.f.push_op(self.current_stmt, ty, kind)
    }

    /// Emit a phi into the current block's phi-prologue statement rather
    /// than wherever `current_stmt` happens to be, so a hand-built merge
    /// (ternary/short-circuit join) lands at block entry the same way a
    /// `PhiState`-inserted one does.
    pub fn emit_phi(&mut self, ty: Type, entries: Vec<crate::ir::op::PhiEntry>) -> OpId {
        let stmt = self.f.phi_statement(self.current_block);
        self.f.push_op(stmt, ty, OpKind::Phi(entries))
    }

    pub fn current_block(&self) -> BlockId {
        self.current_block
    }

    /// Start a fresh, unterminated block and make it current. Does not
    /// wire any predecessor -- callers connect the CFG explicitly via
    /// [`Builder::branch_to`]/[`Builder::cond_branch_to`].
    pub fn start_block(&mut self) -> BlockId {
        let block = self.f.new_block();
        self.current_block = block;
        self.current_stmt = self.f.new_statement(block, false);
        block
    }

    pub fn switch_to(&mut self, block: BlockId) {
        self.current_block = block;
        self.current_stmt = self.f.new_statement(block, false);
    }

    fn link(&mut self, from: BlockId, to: BlockId) {
        self.f.blocks[from].succs.push(to);
        self.f.blocks[to].preds.push(from);
    }

    /// Terminate the current block with an unconditional branch to
    /// `target`, unless it is already terminated (e.g. by a `return`
    /// nested inside the block being closed).
    pub fn branch_to(&mut self, target: BlockId) {
        if self.f.is_terminated(self.current_block) {
            return;
        }
        let from = self.current_block;
        self.link(from, target);
        self.emit(Type::None, OpKind::Branch(target));
    }

    pub fn cond_branch_to(&mut self, cond: OpId, then_block: BlockId, else_block: BlockId) {
        let from = self.current_block;
        self.link(from, then_block);
        self.link(from, else_block);
        self.emit(
            Type::None,
            OpKind::CondBranch {
                cond,
                then_block,
                else_block,
            },
        );
    }

    /// Seal a block once the builder knows no further predecessor will
    /// ever be wired onto it (§4.E phi backfill).
    pub fn seal(&mut self, block: BlockId) {
        self.phis.seal_block(&mut self.f, &mut self.vars, block);
    }

    fn scope(&self) -> Scope {
        Scope::Block(*self.scope_stack.last().expect("function scope is never popped"))
    }

    pub fn push_scope(&mut self) {
        let id = self.next_scope_id;
        self.next_scope_id += 1;
        self.scope_stack.push(id);
        self.defer_stack.push(Vec::new());
    }

    /// Leave the current lexical scope, running any deferred statements it
    /// collected, LIFO (GLOSSARY "Defer").
    pub fn pop_scope(&mut self) -> BuildResult<()> {
        let defers = self.defer_stack.pop().unwrap_or_default();
        for stmt in defers.iter().rev() {
            self.lower_stmt(stmt)?;
        }
        if self.scope_stack.len() > 1 {
            self.scope_stack.pop();
        }
        Ok(())
    }

    /// Replay every deferred statement pending in scopes from the innermost
    /// down to (and including) `target_depth`, LIFO, without popping those
    /// scopes -- a non-local jump (`return`/`break`/`continue`/`goto`) exits
    /// them outright, but the normal fallthrough path out of the same
    /// scopes (owned by `pop_scope`) still needs its own copy of the same
    /// cleanup code on its own, separate CFG edge (GLOSSARY "Defer").
    /// `target_depth` is a `defer_stack` index, not a source nesting depth.
    pub fn run_pending_defers_down_to(&mut self, target_depth: usize) -> BuildResult<()> {
        for depth in (target_depth..self.defer_stack.len()).rev() {
            let pending = std::mem::take(&mut self.defer_stack[depth]);
            for stmt in pending.iter().rev() {
                self.lower_stmt(stmt)?;
            }
            self.defer_stack[depth] = pending;
        }
        Ok(())
    }

    pub fn defer_depth(&self) -> usize {
        self.defer_stack.len()
    }

    pub fn push_defer(&mut self, body: Vec<crate::ast::Stmt>) {
        if let Some(top) = self.defer_stack.last_mut() {
            top.push(crate::ast::Stmt::new(0, crate::ast::StmtKind::Block(body)));
        }
    }

    pub fn declare_local(&mut self, name: &str, ty: Type) -> LocalId {
        let local = self.f.alloc_local(ty, LocalFlags::empty(), Some(name.to_string()));
        self.vars.promote_to_local(name, self.scope(), local);
        local
    }

    pub fn write_var(&mut self, name: &str, local: LocalId, value: OpId) {
        if self.escaped.contains(&local) {
            self.emit(Type::None, OpKind::StoreLocal(local, value));
            return;
        }
        let block = self.current_block;
        let scope = self.scope();
        self.vars.add_ref(name, scope, block, local, value);
    }

    /// Read a variable's current SSA value as seen from the current block,
    /// inserting phis across merges as needed. Tries the current lexical
    /// scope, then each of its actual enclosing scopes in turn (the live
    /// `scope_stack` chain, not bare nesting depth -- two sibling scopes at
    /// the same depth, e.g. an `if`'s then- and else-branch, must never be
    /// treated as the same scope here), then global.
    pub fn read_var(&mut self, name: &str, ty: &Type) -> BuildResult<OpId> {
        let block = self.current_block;
        for idx in (0..self.scope_stack.len()).rev() {
            let scope = Scope::Block(self.scope_stack[idx]);
            if let Some(local) = self.vars.local_of(name, scope) {
                if self.escaped.contains(&local) {
                    return Ok(self.emit(ty.clone(), OpKind::LoadLocal(local)));
                }
                return Ok(self.phis.read_variable(&mut self.f, &mut self.vars, block, name, scope, ty));
            }
        }
        if let Some(local) = self.vars.local_of(name, Scope::Global) {
            if self.escaped.contains(&local) {
                return Ok(self.emit(ty.clone(), OpKind::LoadLocal(local)));
            }
            return Ok(self
                .phis
                .read_variable(&mut self.f, &mut self.vars, block, name, Scope::Global, ty));
        }
        Err(BuildError::Internal(format!(
            "read of undeclared variable `{name}`"
        )))
    }

    /// Mark `local` as address-taken: from now on its reads/writes go
    /// through `LoadLocal`/`StoreLocal` rather than the SSA variable table.
    pub fn mark_escaped(&mut self, local: LocalId) {
        self.escaped.insert(local);
    }

    pub fn is_escaped(&self, local: LocalId) -> bool {
        self.escaped.contains(&local)
    }

    /// Resolve `name` to the local it was declared as, trying the current
    /// scope then each enclosing one in turn (the live `scope_stack` chain),
    /// then global -- the same walk `read_var` does, for callers (address-of,
    /// assignment) that need the `LocalId` rather than an SSA value.
    pub(crate) fn resolve_local(&self, name: &str) -> Option<LocalId> {
        for idx in (0..self.scope_stack.len()).rev() {
            if let Some(local) = self.vars.local_of(name, Scope::Block(self.scope_stack[idx])) {
                return Some(local);
            }
        }
        self.vars.local_of(name, Scope::Global)
    }

    /// Zero-fill (if aggregate) then store `init` into a fresh anonymous
    /// local -- shared by compound-literal lowering and local-declaration
    /// lowering (§4.F).
    pub fn zero_and_init_local(&mut self, local: LocalId, init: &crate::ast::Initializer) -> BuildResult<()> {
        let ty = self.f.locals[local].ty.clone();
        crate::initializer::materialise_local(self, local, &ty, init)
    }

    pub fn label_block(&mut self, name: &str) -> BlockId {
        if let Some(&b) = self.labels.get(name) {
            return b;
        }
        let b = self.f.new_block();
        self.labels.insert(name.to_string(), b);
        b
    }

    pub fn resolve_global(&self, name: &str) -> Option<crate::ir::op::GlobalId> {
        self.unit.find_global_id(name)
    }

    /// Finalisation (§4.E): insert an implicit `return` on a fallthrough
    /// exit, seal every still-open block, prune unreachable blocks, and
    /// run the validator.
    fn finalize(&mut self, ret_ty: &Type) -> BuildResult<()> {
        if !self.f.is_terminated(self.current_block) {
            // Falling off the end of the function is itself a return edge
            // and owes the same defer replay an explicit `return` gets.
            self.run_pending_defers_down_to(0)?;
            let value = if ret_ty.is_void() {
                None
            } else {
                Some(self.emit(ret_ty.clone(), OpKind::ConstZero))
            };
            self.emit(Type::None, OpKind::Ret(value));
        }
        let blocks: Vec<BlockId> = self.f.blocks_in_order().collect();
        for b in blocks {
            if !self.phis.is_sealed(b) {
                self.seal(b);
            }
        }
        crate::cfg::prune_unreachable(&mut self.f);
        crate::cfg::validate(&self.f)?;
        Ok(())
    }
}

/// Build a whole translation unit: every global variable and function
/// declaration in source order, finishing with end-of-unit tentative
/// definition promotion (GLOSSARY).
pub fn build_translation_unit(
    tu: &crate::ast::TranslationUnit,
    target: Target,
) -> BuildResult<Unit> {
    use crate::ast::TopLevelDecl;
    use crate::ir::unit::{DefState, GlobalKind as UKind};

    let mut unit = Unit::new(target);
    for decl in &tu.decls {
        match decl {
            TopLevelDecl::GlobalVar(g) => {
                let (def_state, init) = match &g.init {
                    Some(init) => (
                        DefState::Defined,
                        Some(crate::initializer::flatten_global(&mut unit, init)?),
                    ),
                    None => (DefState::Tentative, None),
                };
                unit.push_global(Global {
                    name: g.name.clone(),
                    linkage: ast_linkage(g.linkage),
                    def_state,
                    ty: g.ty.clone(),
                    kind: UKind::Data {
                        ty: g.ty.clone(),
                        init,
                    },
                });
            }
            TopLevelDecl::Function(decl) => {
                let func_ty = Type::Func(
                    Box::new(decl.ret.clone()),
                    decl.params.iter().map(|p| p.ty.clone()).collect(),
                    crate::ir::ty::FuncFlags {
                        variadic: decl.variadic,
                    },
                );
                if decl.body.is_some() {
                    let func = Builder::build(decl, &mut unit, target)?;
                    unit.push_global(Global {
                        name: decl.name.clone(),
                        linkage: ast_linkage(decl.linkage),
                        def_state: DefState::Defined,
                        ty: func_ty,
                        kind: UKind::Function(func),
                    });
                } else {
                    unit.push_global(Global {
                        name: decl.name.clone(),
                        linkage: ast_linkage(decl.linkage),
                        def_state: DefState::Undefined,
                        ty: func_ty.clone(),
                        kind: UKind::Data {
                            ty: func_ty,
                            init: None,
                        },
                    });
                }
            }
        }
    }
    unit.finalize_tentative_definitions();
    Ok(unit)
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::ir::op::OpKind;

    /// `int f(int c){ int *p; if(c){int x=1;} else {int x=2; p=&x;} return *p; }`
    /// -- the then- and else-branch each declare their own `x` at the same
    /// nesting depth. `p = &x` inside the else branch must take the address
    /// of the else branch's own `x`, not the then branch's stale one.
    #[test]
    fn sibling_scopes_at_same_depth_do_not_alias() {
        let ptr_i32 = Type::ptr(i32_ty());
        let decl = function(
            "f",
            i32_ty(),
            vec![param("c", i32_ty())],
            vec![
                local_decl("p", ptr_i32.clone(), None),
                if_stmt(
                    local_var("c", i32_ty()),
                    vec![local_decl("x", i32_ty(), Some(int_lit(1)))],
                    vec![
                        local_decl("x", i32_ty(), Some(int_lit(2))),
                        assign(local_var("p", ptr_i32.clone()), address_of(local_var("x", i32_ty()), i32_ty())),
                    ],
                ),
                ret(Some(deref(local_var("p", ptr_i32), i32_ty()))),
            ],
        );
        let mut unit = Unit::new(target());
        let f = Builder::build(&decl, &mut unit, target()).expect("well-formed function builds");

        // Exactly one local is named "x" per branch; find the else branch's
        // local by its initial value (2) and confirm the lone `AddrOfLocal`
        // in the function targets that one, not the then branch's (1).
        let else_x = f
            .ops
            .iter()
            .find_map(|(_, op)| match &op.kind {
                OpKind::StoreLocal(local, value) => {
                    let is_two = f.ops.iter().any(|(id, v)| {
                        id == *value && matches!(v.kind, OpKind::ConstInt(2))
                    });
                    is_two.then_some(*local)
                }
                _ => None,
            })
            .expect("else branch's `x = 2` store exists");

        let addressed = f
            .ops
            .iter()
            .find_map(|(_, op)| match &op.kind {
                OpKind::AddrOfLocal(local) => Some(*local),
                _ => None,
            })
            .expect("the `&x` in the else branch emits AddrOfLocal");

        assert_eq!(addressed, else_x, "&x must address the else branch's own local");
    }
}

fn ast_linkage(l: crate::ast::Linkage) -> Linkage {
    match l {
        crate::ast::Linkage::External => Linkage::External,
        crate::ast::Linkage::Internal => Linkage::Internal,
        crate::ast::Linkage::None => Linkage::None,
    }
}
