//! Statement lowering and control-flow constructs (spec.md §4.E):
//! if/while/do-while/for/switch/break/continue/goto-label/defer.
use crate::ast::{CaseArm, Stmt, StmtKind};
use crate::builder::{Builder, LoopCtx, SwitchCtx};
use crate::error::{BuildError, BuildResult};
use crate::ir::op::OpKind;
use crate::ir::ty::Type;

impl<'u> Builder<'u> {
    pub fn lower_stmt(&mut self, stmt: &Stmt) -> BuildResult<()> {
        match &stmt.kind {
            StmtKind::Expr(e) => {
                self.lower_expr(e)?;
                Ok(())
            }
            StmtKind::LocalDecl { name, ty, init } => {
                let local = self.declare_local(name, ty.clone());
                match init {
                    // An initializer is stored through the local's memory
                    // slot (needed for aggregates' element-wise stores
                    // regardless), so the variable is memory-backed for
                    // its whole lifetime rather than split between an SSA
                    // and a memory representation.
                    Some(init) => {
                        self.mark_escaped(local);
                        self.zero_and_init_local(local, init)
                    }
                    None => {
                        let undef = self.emit(ty.clone(), OpKind::Undef);
                        self.write_var(name, local, undef);
                        Ok(())
                    }
                }
            }
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => self.lower_if(cond, then_branch, else_branch),
            StmtKind::While { cond, body } => self.lower_while(cond, body),
            StmtKind::DoWhile { body, cond } => self.lower_do_while(body, cond),
            StmtKind::For {
                init,
                cond,
                step,
                body,
            } => self.lower_for(init.as_deref(), cond.as_ref(), step.as_ref(), body),
            StmtKind::Switch { value, arms } => self.lower_switch(value, arms),
            StmtKind::Break => self.lower_break(),
            StmtKind::Continue => self.lower_continue(),
            StmtKind::Goto(label) => {
                let target = self.label_block(label);
                // A label's own scope isn't tracked, so a `goto` replays
                // every defer pending in the current function -- the common
                // `goto cleanup;` idiom jumps forward out of nested scopes
                // to a function-level label, and running a cleanup that
                // turns out to be unnecessary is far less wrong than
                // silently skipping one that was needed.
                self.run_pending_defers_down_to(0)?;
                self.branch_to(target);
                Ok(())
            }
            StmtKind::Label(label) => {
                let target = self.label_block(label);
                self.branch_to(target);
                self.switch_to(target);
                Ok(())
            }
            StmtKind::Return(value) => {
                let v = match value {
                    Some(e) => Some(self.lower_expr(e)?),
                    None => None,
                };
                self.run_pending_defers_down_to(0)?;
                self.emit(Type::None, OpKind::Ret(v));
                Ok(())
            }
            StmtKind::Block(body) => self.lower_block(body),
            StmtKind::Defer(body) => {
                self.push_defer(body.clone());
                Ok(())
            }
        }
    }

    fn lower_block(&mut self, body: &[Stmt]) -> BuildResult<()> {
        self.push_scope();
        for stmt in body {
            self.lower_stmt(stmt)?;
        }
        self.pop_scope()
    }

    fn lower_if(&mut self, cond: &crate::ast::Expr, then_branch: &[Stmt], else_branch: &[Stmt]) -> BuildResult<()> {
        let c = self.lower_expr(cond)?;
        let then_block = self.f.new_block();
        let else_block = self.f.new_block();
        let join_block = self.f.new_block();
        self.cond_branch_to(c, then_block, else_block);

        self.switch_to(then_block);
        self.seal(then_block);
        self.lower_block(then_branch)?;
        self.branch_to(join_block);

        self.switch_to(else_block);
        self.seal(else_block);
        self.lower_block(else_branch)?;
        self.branch_to(join_block);

        self.switch_to(join_block);
        self.seal(join_block);
        Ok(())
    }

    fn lower_while(&mut self, cond: &crate::ast::Expr, body: &[Stmt]) -> BuildResult<()> {
        let header = self.f.new_block();
        let loop_body = self.f.new_block();
        let after = self.f.new_block();
        self.branch_to(header);

        self.switch_to(header);
        let c = self.lower_expr(cond)?;
        self.cond_branch_to(c, loop_body, after);

        self.loop_stack.push(LoopCtx {
            continue_block: header,
            break_block: after,
            defer_depth: self.defer_depth(),
        });
        self.switch_to(loop_body);
        self.seal(loop_body);
        self.lower_block(body)?;
        self.branch_to(header);
        self.loop_stack.pop();
        self.seal(header);

        self.switch_to(after);
        self.seal(after);
        Ok(())
    }

    fn lower_do_while(&mut self, body: &[Stmt], cond: &crate::ast::Expr) -> BuildResult<()> {
        let loop_body = self.f.new_block();
        let latch = self.f.new_block();
        let after = self.f.new_block();
        self.branch_to(loop_body);

        self.loop_stack.push(LoopCtx {
            continue_block: latch,
            break_block: after,
            defer_depth: self.defer_depth(),
        });
        self.switch_to(loop_body);
        self.lower_block(body)?;
        self.branch_to(latch);
        self.loop_stack.pop();

        self.switch_to(latch);
        let c = self.lower_expr(cond)?;
        self.cond_branch_to(c, loop_body, after);
        self.seal(loop_body);
        self.seal(latch);

        self.switch_to(after);
        self.seal(after);
        Ok(())
    }

    fn lower_for(
        &mut self,
        init: Option<&Stmt>,
        cond: Option<&crate::ast::Expr>,
        step: Option<&crate::ast::Expr>,
        body: &[Stmt],
    ) -> BuildResult<()> {
        self.push_scope();
        if let Some(init) = init {
            self.lower_stmt(init)?;
        }
        let header = self.f.new_block();
        let loop_body = self.f.new_block();
        let latch = self.f.new_block();
        let after = self.f.new_block();
        self.branch_to(header);

        self.switch_to(header);
        match cond {
            Some(cond) => {
                let c = self.lower_expr(cond)?;
                self.cond_branch_to(c, loop_body, after);
            }
            None => self.branch_to(loop_body),
        }

        self.loop_stack.push(LoopCtx {
            continue_block: latch,
            break_block: after,
            defer_depth: self.defer_depth(),
        });
        self.switch_to(loop_body);
        self.seal(loop_body);
        self.lower_block(body)?;
        self.branch_to(latch);
        self.loop_stack.pop();

        self.switch_to(latch);
        self.seal(latch);
        if let Some(step) = step {
            self.lower_expr(step)?;
        }
        self.branch_to(header);
        self.seal(header);

        self.switch_to(after);
        self.seal(after);
        self.pop_scope()
    }

    fn lower_switch(&mut self, value: &crate::ast::Expr, arms: &[CaseArm]) -> BuildResult<()> {
        let v = self.lower_expr(value)?;
        let after = self.f.new_block();
        let mut cases = Vec::new();
        let mut default = after;
        let mut arm_blocks = Vec::with_capacity(arms.len());
        for arm in arms {
            let block = self.f.new_block();
            arm_blocks.push(block);
            match arm.value {
                Some(v) => cases.push((v, block)),
                None => default = block,
            }
        }
        let from = self.current_block;
        for &(_, block) in &cases {
            self.link(from, block);
        }
        self.link(from, default);
        self.emit(Type::None, OpKind::Switch { value: v, cases, default });

        self.switch_stack.push(SwitchCtx {
            break_block: after,
            defer_depth: self.defer_depth(),
        });
        for (arm, block) in arms.iter().zip(arm_blocks.iter()) {
            self.switch_to(*block);
            self.seal(*block);
            for stmt in &arm.body {
                self.lower_stmt(stmt)?;
            }
            self.branch_to(after);
        }
        self.switch_stack.pop();

        self.switch_to(after);
        self.seal(after);
        Ok(())
    }

    fn lower_break(&mut self) -> BuildResult<()> {
        let (target, defer_depth) = self
            .switch_stack
            .last()
            .map(|s| (s.break_block, s.defer_depth))
            .or_else(|| self.loop_stack.last().map(|l| (l.break_block, l.defer_depth)))
            .ok_or(BuildError::DanglingJump)?;
        self.run_pending_defers_down_to(defer_depth)?;
        self.branch_to(target);
        Ok(())
    }

    fn lower_continue(&mut self) -> BuildResult<()> {
        let (target, defer_depth) = self
            .loop_stack
            .last()
            .map(|l| (l.continue_block, l.defer_depth))
            .ok_or(BuildError::DanglingJump)?;
        self.run_pending_defers_down_to(defer_depth)?;
        self.branch_to(target);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::super::Builder;
    use crate::ir::op::OpKind;
    use crate::ir::unit::Unit;

    /// `void f(int c){ int y=0; defer{y=1;} if(c){return;} }`
    /// The function-scope defer must replay once on the early `return`
    /// inside the `if`, and once more on the implicit fallthrough return
    /// when `c` is false -- two separate CFG exit edges, two copies of the
    /// deferred store.
    #[test]
    fn defer_replays_on_early_return_and_fallthrough() {
        let decl = function(
            "f",
            void_ty(),
            vec![param("c", i32_ty())],
            vec![
                local_decl("y", i32_ty(), Some(int_lit(0))),
                defer_stmt(vec![assign(local_var("y", i32_ty()), int_lit(1))]),
                if_stmt(local_var("c", i32_ty()), vec![ret(None)], vec![]),
            ],
        );
        let mut unit = Unit::new(target());
        let f = Builder::build(&decl, &mut unit, target()).expect("well-formed function builds");

        let stores_of_one = f
            .ops
            .iter()
            .filter(|(_, op)| match &op.kind {
                OpKind::StoreLocal(_, value) => f
                    .ops
                    .iter()
                    .any(|(id, v)| id == *value && matches!(v.kind, OpKind::ConstInt(1))),
                _ => false,
            })
            .count();

        assert_eq!(stores_of_one, 2, "defer must replay on both the early-return and fallthrough exits");
    }

    /// `void g(int n){ while(n){ defer{y=3;} if(n){break;} } }`
    /// The defer is registered inside the loop body's own scope. `break`
    /// must replay it (in addition to the copy the body's own normal
    /// fallthrough -- looping back to the header -- already runs via
    /// `pop_scope`), giving two copies total.
    #[test]
    fn defer_replays_on_loop_break() {
        let decl = function(
            "g",
            void_ty(),
            vec![param("n", i32_ty())],
            vec![
                local_decl("y", i32_ty(), Some(int_lit(0))),
                while_stmt(
                    local_var("n", i32_ty()),
                    vec![
                        defer_stmt(vec![assign(local_var("y", i32_ty()), int_lit(3))]),
                        if_stmt(local_var("n", i32_ty()), vec![brk()], vec![]),
                    ],
                ),
            ],
        );
        let mut unit = Unit::new(target());
        let f = Builder::build(&decl, &mut unit, target()).expect("well-formed function builds");

        let stores_of_three = f
            .ops
            .iter()
            .filter(|(_, op)| match &op.kind {
                OpKind::StoreLocal(_, value) => f
                    .ops
                    .iter()
                    .any(|(id, v)| id == *value && matches!(v.kind, OpKind::ConstInt(3))),
                _ => false,
            })
            .count();

        assert_eq!(stores_of_three, 2, "defer must replay on both the break edge and the loop's normal continuation");
    }
}
