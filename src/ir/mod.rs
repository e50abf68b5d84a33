//! The intermediate representation (spec.md §3 DATA MODEL).
pub mod block;
pub mod function;
pub mod op;
pub mod print;
pub mod ty;
pub mod unit;

pub use block::{BasicBlock, TerminatorKind, DETACHED_SENTINEL};
pub use function::{Function, FunctionFlags, Local, LocalFlags, Statement};
pub use op::{
    AddressIndex, BinaryOp, BlockId, CastKind, GlobalId, LocalId, Op, OpFlags, OpId, OpKind,
    OpMeta, PhiEntry, StmtId, UnaryOp,
};
pub use print::print_function;
pub use ty::{Field, FuncFlags, Prim, Type};
pub use unit::{DefState, Global, GlobalKind, GlobalValue, Linkage, Unit};
