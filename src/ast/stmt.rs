//! Typed statements (spec.md §6, §4.E control-flow constructs).
use crate::ast::expr::{Expr, Initializer};
use crate::ir::ty::Type;

#[derive(Debug, Clone)]
pub struct CaseArm {
    /// `None` for `default:`.
    pub value: Option<i64>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone)]
pub enum StmtKind {
    Expr(Expr),
    LocalDecl {
        name: String,
        ty: Type,
        init: Option<Initializer>,
    },
    If {
        cond: Expr,
        then_branch: Vec<Stmt>,
        else_branch: Vec<Stmt>,
    },
    While {
        cond: Expr,
        body: Vec<Stmt>,
    },
    DoWhile {
        body: Vec<Stmt>,
        cond: Expr,
    },
    For {
        init: Option<Box<Stmt>>,
        cond: Option<Expr>,
        step: Option<Expr>,
        body: Vec<Stmt>,
    },
    Switch {
        value: Expr,
        arms: Vec<CaseArm>,
    },
    Break,
    Continue,
    Goto(String),
    Label(String),
    Return(Option<Expr>),
    Block(Vec<Stmt>),
    /// Runs its body LIFO at every exit from the enclosing scope (GLOSSARY
    /// "Defer").
    Defer(Vec<Stmt>),
}

#[derive(Debug, Clone)]
pub struct Stmt {
    pub kind: StmtKind,
    /// Source line, threaded into `OpMeta` for diagnostics.
    pub line: u32,
}

impl Stmt {
    pub fn new(line: u32, kind: StmtKind) -> Self {
        Stmt { kind, line }
    }
}
