//! Function, its locals, and its statements (spec.md §3 "Function",
//! "Statement", "Local").
use bitflags::bitflags;

use crate::arena::{Arena, Id};
use crate::ir::block::BasicBlock;
use crate::ir::op::{BlockId, LocalId, Op, OpId};
use crate::ir::ty::Type;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct FunctionFlags: u8 {
        const MAKES_CALL    = 1 << 0;
        const USES_VARARGS  = 1 << 1;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct LocalFlags: u8 {
        /// Local was materialised to hold an incoming parameter.
        const PARAM = 1 << 0;
    }
}

#[derive(Debug, Clone)]
pub struct Local {
    pub ty: Type,
    pub flags: LocalFlags,
    pub name: Option<String>,
}

/// A thin ordered group of operations.
#[derive(Debug, Clone, Default)]
pub struct Statement {
    pub ops: Vec<OpId>,
    /// Set on the one statement per function that holds parameter
    /// definitions.
    pub is_params: bool,
}

#[derive(Debug, Clone)]
pub struct Function {
    pub name: String,
    pub ret: Type,
    pub param_types: Vec<Type>,
    pub flags: FunctionFlags,

    pub locals: Arena<Local>,
    pub ops: Arena<Op>,
    pub stmts: Arena<Statement>,
    pub blocks: Arena<BasicBlock>,

    /// Block creation order == the function's "ordered, doubly linked
    /// list of basic blocks"; linkage is reconstructed from this vector
    /// rather than carried as explicit prev/next pointers (see arena.rs).
    pub block_order: Vec<BlockId>,
    pub entry: BlockId,
}

impl Function {
    pub fn new(name: impl Into<String>, ret: Type, param_types: Vec<Type>) -> Self {
        let mut blocks = Arena::new();
        let mut stmts = Arena::new();
        let entry_stmts = Vec::new();
        let entry = blocks.alloc(BasicBlock::new());
        let _ = entry_stmts;
        let _ = &mut stmts;
        Function {
            name: name.into(),
            ret,
            param_types,
            flags: FunctionFlags::empty(),
            locals: Arena::new(),
            ops: Arena::new(),
            stmts,
            blocks,
            block_order: vec![entry],
            entry,
        }
    }

    pub fn alloc_local(&mut self, ty: Type, flags: LocalFlags, name: Option<String>) -> LocalId {
        self.locals.alloc(Local { ty, flags, name })
    }

    pub fn new_block(&mut self) -> BlockId {
        let id = self.blocks.alloc(BasicBlock::new());
        self.block_order.push(id);
        id
    }

    pub fn new_statement(&mut self, block: BlockId, is_params: bool) -> Id<Statement> {
        let stmt_id = self.stmts.alloc(Statement {
            ops: Vec::new(),
            is_params,
        });
        self.blocks[block].stmts.push(stmt_id);
        stmt_id
    }

    /// The phi-prologue statement for `block` (spec.md §4.C
    /// `ir_insert_phi` "places a phi at block head"), created and pinned to
    /// `stmts[0]` on first use so later phi insertions into an
    /// already-populated block still land before every other op.
    pub fn phi_statement(&mut self, block: BlockId) -> Id<Statement> {
        if let Some(s) = self.blocks[block].phi_stmt {
            return s;
        }
        let stmt_id = self.stmts.alloc(Statement {
            ops: Vec::new(),
            is_params: false,
        });
        self.blocks[block].stmts.insert(0, stmt_id);
        self.blocks[block].phi_stmt = Some(stmt_id);
        stmt_id
    }

    /// Append an op of `kind`/`ty` to `stmt`, returning its id.
    pub fn push_op(
        &mut self,
        stmt: Id<Statement>,
        ty: Type,
        kind: crate::ir::op::OpKind,
    ) -> OpId {
        let op = Op {
            ty,
            flags: crate::ir::op::OpFlags::empty(),
            stmt,
            meta: crate::ir::op::OpMeta::default(),
            kind,
        };
        let id = self.ops.alloc(op);
        self.stmts[stmt].ops.push(id);
        id
    }

    pub fn blocks_in_order(&self) -> impl Iterator<Item = BlockId> + '_ {
        self.block_order.iter().copied()
    }

    /// The op kind of a block's terminator, if the block has been
    /// terminated yet.
    pub fn terminator_of(&self, block: BlockId) -> Option<&crate::ir::op::OpKind> {
        let last_stmt = *self.blocks[block].stmts.last()?;
        let last_op = *self.stmts[last_stmt].ops.last()?;
        let kind = &self.ops[last_op].kind;
        kind.is_terminator().then_some(kind)
    }

    pub fn is_terminated(&self, block: BlockId) -> bool {
        self.terminator_of(block).is_some()
    }
}
