//! Compilation unit and globals (spec.md §3 "Unit").
use std::collections::HashMap;

use crate::arena::Arena;
use crate::ir::function::Function;
use crate::ir::op::GlobalId;
use crate::ir::ty::Type;
use crate::target::Target;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Linkage {
    External,
    Internal,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefState {
    Undefined,
    /// A file-scope data declaration without an initializer; promoted to a
    /// zero-initialised `Defined` global at end of unit if nothing stronger
    /// turns up (spec.md GLOSSARY "Tentative definition").
    Tentative,
    Defined,
}

/// A flattened initializer value for global data, produced by the
/// initializer layout engine (§4.F) and attached here rather than carried
/// as expressions.
#[derive(Debug, Clone)]
pub enum GlobalValue {
    Zero,
    Int(i64),
    Float(f64),
    /// Address of another global, e.g. `int *p = &other;`.
    AddressOf(String),
    Bytes(Vec<u8>),
    /// A fully flattened aggregate initializer: `(offset, value)` pairs.
    Struct(Vec<(u64, Box<GlobalValue>)>),
}

#[derive(Debug, Clone)]
pub enum GlobalKind {
    Function(Function),
    Data {
        ty: Type,
        init: Option<GlobalValue>,
    },
    StringLiteral(Vec<u8>),
}

#[derive(Debug, Clone)]
pub struct Global {
    pub name: String,
    pub linkage: Linkage,
    pub def_state: DefState,
    pub ty: Type,
    pub kind: GlobalKind,
}

#[derive(Debug, Clone)]
pub struct Unit {
    pub target: Target,
    pub globals: Arena<Global>,
    by_name: HashMap<String, GlobalId>,
    anon_counter: u32,
}

impl Unit {
    pub fn new(target: Target) -> Self {
        Unit {
            target,
            globals: Arena::new(),
            by_name: HashMap::new(),
            anon_counter: 0,
        }
    }

    /// Mint a fresh, unit-unique name for a synthesized global with no
    /// source-level name of its own (e.g. a file-scope compound literal
    /// hoisted out to its own definition). Never collides with a real
    /// source identifier since C identifiers can't contain `.`.
    pub fn fresh_global_name(&mut self, prefix: &str) -> String {
        let id = self.anon_counter;
        self.anon_counter += 1;
        format!(".{prefix}.{id}")
    }

    pub fn find_global_id(&self, name: &str) -> Option<GlobalId> {
        self.by_name.get(name).copied()
    }

    pub fn find_global(&self, name: &str) -> Option<&Global> {
        self.find_global_id(name).map(|id| &self.globals[id])
    }

    pub fn global(&self, id: GlobalId) -> &Global {
        &self.globals[id]
    }

    pub fn global_mut(&mut self, id: GlobalId) -> &mut Global {
        &mut self.globals[id]
    }

    /// Insert a new global, or return the existing id if `name` is already
    /// present (a prior declaration or tentative definition).
    pub fn push_global(&mut self, global: Global) -> GlobalId {
        if let Some(id) = self.by_name.get(&global.name) {
            return *id;
        }
        let name = global.name.clone();
        let id = self.globals.alloc(global);
        self.by_name.insert(name, id);
        id
    }

    /// End-of-unit promotion of tentative definitions to zero-initialised
    /// definitions (GLOSSARY "Tentative definition").
    pub fn finalize_tentative_definitions(&mut self) {
        for id in self.globals.ids() {
            let global = &mut self.globals[id];
            if global.def_state == DefState::Tentative {
                if let GlobalKind::Data { init, .. } = &mut global.kind {
                    if init.is_none() {
                        *init = Some(GlobalValue::Zero);
                    }
                }
                global.def_state = DefState::Defined;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::{Arch, Os};

    fn target() -> Target {
        Target {
            arch: Arch::X86_64,
            os: Os::Linux,
        }
    }

    #[test]
    fn tentative_definitions_promote_to_zero() {
        let mut unit = Unit::new(target());
        unit.push_global(Global {
            name: "g".into(),
            linkage: Linkage::External,
            def_state: DefState::Tentative,
            ty: Type::Primitive(crate::ir::ty::Prim::I32),
            kind: GlobalKind::Data {
                ty: Type::Primitive(crate::ir::ty::Prim::I32),
                init: None,
            },
        });
        unit.finalize_tentative_definitions();
        let g = unit.find_global("g").unwrap();
        assert_eq!(g.def_state, DefState::Defined);
        match &g.kind {
            GlobalKind::Data { init, .. } => assert!(matches!(init, Some(GlobalValue::Zero))),
            _ => panic!(),
        }
    }
}
