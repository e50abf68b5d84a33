//! IR type system (spec.md §3 "Type").
use crate::target::Target;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Prim {
    I1,
    I8,
    I16,
    I32,
    I64,
    I128,
    U8,
    U16,
    U32,
    U64,
    U128,
    F16,
    F32,
    F64,
}

impl Prim {
    pub fn size(self) -> u32 {
        match self {
            Prim::I1 | Prim::I8 | Prim::U8 => 1,
            Prim::I16 | Prim::U16 | Prim::F16 => 2,
            Prim::I32 | Prim::U32 | Prim::F32 => 4,
            Prim::I64 | Prim::U64 | Prim::F64 => 8,
            Prim::I128 | Prim::U128 => 16,
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, Prim::F16 | Prim::F32 | Prim::F64)
    }

    pub fn is_int(self) -> bool {
        !self.is_float()
    }

    /// Whether arithmetic/comparison/shift on this integer primitive picks
    /// the signed opcode variant (spec.md §4.E "arithmetic respects the
    /// operand signedness"). Meaningless for floats; `i1` reads as signed
    /// but is never actually divided/shifted/compared-unsigned.
    pub fn is_signed(self) -> bool {
        !matches!(self, Prim::U8 | Prim::U16 | Prim::U32 | Prim::U64 | Prim::U128)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FuncFlags {
    pub variadic: bool,
}

/// A named aggregate field: `(name, type)`. Anonymous fields (from anonymous
/// nested structs/unions) carry `None`.
pub type Field = (Option<String>, Type);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    /// `void`.
    None,
    /// The `...` marker in a variadic function's parameter list; never a
    /// value type.
    Variadic,
    Primitive(Prim),
    Pointer(Box<Type>),
    Array(Box<Type>, u64),
    Func(Box<Type>, Vec<Type>, FuncFlags),
    Struct(Vec<Field>),
    Union(Vec<Field>),
}

impl Type {
    pub fn ptr(to: Type) -> Type {
        Type::Pointer(Box::new(to))
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Type::None)
    }

    pub fn is_aggregate(&self) -> bool {
        matches!(self, Type::Struct(_) | Type::Union(_) | Type::Array(_, _))
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self, Type::Pointer(_))
    }

    pub fn is_func(&self) -> bool {
        matches!(self, Type::Func(..))
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Type::Primitive(p) if p.is_float())
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, Type::Primitive(p) if p.is_int())
    }

    /// Signedness for picking a signed/unsigned opcode variant. Pointers
    /// compare unsigned (per C's pointer-relational-operator rules); every
    /// other type defaults to signed, which is only ever queried for
    /// integers in practice.
    pub fn is_signed(&self) -> bool {
        match self {
            Type::Pointer(_) => false,
            Type::Primitive(p) => p.is_signed(),
            _ => true,
        }
    }

    pub fn pointee(&self) -> Option<&Type> {
        match self {
            Type::Pointer(inner) => Some(inner),
            Type::Array(inner, _) => Some(inner),
            _ => None,
        }
    }

    /// Array/function lvalue decay target, per invariant 4: arrays decay to
    /// a pointer to their element type, functions decay to a pointer to
    /// themselves.
    pub fn decay(&self) -> Type {
        match self {
            Type::Array(elem, _) => Type::ptr((**elem).clone()),
            Type::Func(..) => Type::ptr(self.clone()),
            other => other.clone(),
        }
    }

    /// Size in bytes on `target`. Panics are not possible here for
    /// well-typed input: incomplete/unsized struct members are a front-end
    /// concern (out of scope).
    pub fn size_of(&self, target: Target) -> u64 {
        match self {
            Type::None | Type::Variadic => 0,
            Type::Primitive(p) => p.size() as u64,
            Type::Pointer(_) | Type::Func(..) => target.pointer_size() as u64,
            Type::Array(elem, n) => elem.size_of(target) * n,
            Type::Struct(fields) => {
                let mut offset = 0u64;
                for (_, f) in fields {
                    let align = f.align_of(target);
                    offset = align_up(offset, align);
                    offset += f.size_of(target);
                }
                align_up(offset, self.align_of(target))
            }
            Type::Union(fields) => fields
                .iter()
                .map(|(_, f)| f.size_of(target))
                .max()
                .unwrap_or(0),
        }
    }

    pub fn align_of(&self, target: Target) -> u64 {
        match self {
            Type::None | Type::Variadic => 1,
            Type::Primitive(p) => p.size() as u64,
            Type::Pointer(_) | Type::Func(..) => target.pointer_size() as u64,
            Type::Array(elem, _) => elem.align_of(target),
            Type::Struct(fields) | Type::Union(fields) => fields
                .iter()
                .map(|(_, f)| f.align_of(target))
                .max()
                .unwrap_or(1),
        }
    }

    /// Offset of `field_index` within a struct. Panics on non-struct types
    /// or out-of-range index: both are internal-invariant violations,
    /// asserted by the type checker before the builder ever sees them.
    pub fn field_offset(&self, target: Target, field_index: usize) -> u64 {
        let Type::Struct(fields) = self else {
            unreachable!("field_offset on non-struct type")
        };
        let mut offset = 0u64;
        for (i, (_, f)) in fields.iter().enumerate() {
            let align = f.align_of(target);
            offset = align_up(offset, align);
            if i == field_index {
                return offset;
            }
            offset += f.size_of(target);
        }
        unreachable!("field index out of range")
    }

    pub fn field_type(&self, field_index: usize) -> &Type {
        match self {
            Type::Struct(fields) | Type::Union(fields) => &fields[field_index].1,
            _ => unreachable!("field_type on non-aggregate type"),
        }
    }
}

fn align_up(offset: u64, align: u64) -> u64 {
    if align == 0 {
        return offset;
    }
    (offset + align - 1) / align * align
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::{Arch, Os};

    fn t64() -> Target {
        Target {
            arch: Arch::X86_64,
            os: Os::Linux,
        }
    }

    #[test]
    fn struct_layout_inserts_padding() {
        // struct { char c; int x; } -> {0, pad x3, 4..8}; size 8
        let s = Type::Struct(vec![
            (Some("c".into()), Type::Primitive(Prim::I8)),
            (Some("x".into()), Type::Primitive(Prim::I32)),
        ]);
        assert_eq!(s.field_offset(t64(), 0), 0);
        assert_eq!(s.field_offset(t64(), 1), 4);
        assert_eq!(s.size_of(t64()), 8);
    }

    #[test]
    fn array_decays_to_element_pointer() {
        let arr = Type::Array(Box::new(Type::Primitive(Prim::I32)), 4);
        assert_eq!(arr.decay(), Type::ptr(Type::Primitive(Prim::I32)));
    }

    #[test]
    fn union_size_is_largest_member() {
        let u = Type::Union(vec![
            (None, Type::Primitive(Prim::I8)),
            (None, Type::Primitive(Prim::I64)),
        ]);
        assert_eq!(u.size_of(t64()), 8);
    }
}
