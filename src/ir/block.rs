//! Basic block (spec.md §3 "Basic block").
use crate::arena::Id;
use crate::ir::op::{BlockId, OpKind, StmtId};

/// The classification of a block's terminating operation, for callers that
/// want to switch on it without re-matching the full `OpKind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminatorKind {
    Return,
    Branch,
    CondBranch,
    Switch,
    /// Not yet terminated -- only valid transiently during construction.
    Unterminated,
}

impl OpKind {
    pub fn terminator_kind(&self) -> TerminatorKind {
        match self {
            OpKind::Ret(_) => TerminatorKind::Return,
            OpKind::Branch(_) => TerminatorKind::Branch,
            OpKind::CondBranch { .. } => TerminatorKind::CondBranch,
            OpKind::Switch { .. } => TerminatorKind::Switch,
            _ => TerminatorKind::Unterminated,
        }
    }
}

/// Sentinel id representing "no real block yet" -- used as a placeholder
/// successor before a branch target is wired, and as the id pruning treats
/// as always removable (spec.md §4.G). It is never present in a function's
/// `blocks` arena.
pub const DETACHED_SENTINEL: BlockId = Id::from_raw(u32::MAX);

#[derive(Debug, Clone)]
pub struct BasicBlock {
    pub preds: Vec<BlockId>,
    pub succs: Vec<BlockId>,
    pub stmts: Vec<StmtId>,
    /// This block's phi-prologue statement, pinned to `stmts[0]` once
    /// created, so every phi the builder ever inserts here lands at block
    /// entry regardless of how many ordinary statements already exist.
    pub phi_stmt: Option<StmtId>,
}

impl BasicBlock {
    pub fn new() -> Self {
        BasicBlock {
            preds: Vec::new(),
            succs: Vec::new(),
            stmts: Vec::new(),
            phi_stmt: None,
        }
    }

    pub fn is_empty_block(&self) -> bool {
        self.stmts.is_empty()
    }
}

impl Default for BasicBlock {
    fn default() -> Self {
        Self::new()
    }
}
