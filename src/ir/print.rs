//! Textual pretty-printer for IR functions, used by `--emit=ir` and by
//! snapshot tests (SPEC_FULL.md §3). Purely a projection of the data model;
//! it defines no new semantics.
use std::fmt::Write as _;

use crate::ir::block::BlockId;
use crate::ir::function::Function;
use crate::ir::op::{BinaryOp, CastKind, OpId, OpKind, UnaryOp};
use crate::ir::ty::{Prim, Type};

pub fn print_function(f: &Function) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "fn {}({:?}) -> {} {{", f.name, f.param_types, ty(&f.ret));
    for block in f.blocks_in_order() {
        let _ = writeln!(out, "{}:", block_name(block));
        for &stmt in &f.blocks[block].stmts {
            for &op_id in &f.stmts[stmt].ops {
                let _ = writeln!(out, "  {}", print_op(f, op_id));
            }
        }
    }
    out.push_str("}\n");
    out
}

fn block_name(b: BlockId) -> String {
    format!("bb{}", b.raw())
}

fn op_name(id: OpId) -> String {
    format!("%{}", id.raw())
}

fn ty(t: &Type) -> String {
    match t {
        Type::None => "void".to_string(),
        Type::Variadic => "...".to_string(),
        Type::Primitive(p) => prim(*p).to_string(),
        Type::Pointer(inner) => format!("{}*", ty(inner)),
        Type::Array(inner, n) => format!("[{} x {}]", n, ty(inner)),
        Type::Func(ret, params, flags) => format!(
            "fn({}{}) -> {}",
            params.iter().map(ty).collect::<Vec<_>>().join(", "),
            if flags.variadic { ", ..." } else { "" },
            ty(ret)
        ),
        Type::Struct(fields) => format!(
            "struct {{ {} }}",
            fields
                .iter()
                .map(|(_, t)| ty(t))
                .collect::<Vec<_>>()
                .join(", ")
        ),
        Type::Union(fields) => format!(
            "union {{ {} }}",
            fields
                .iter()
                .map(|(_, t)| ty(t))
                .collect::<Vec<_>>()
                .join(", ")
        ),
    }
}

fn prim(p: Prim) -> &'static str {
    match p {
        Prim::I1 => "i1",
        Prim::I8 => "i8",
        Prim::I16 => "i16",
        Prim::I32 => "i32",
        Prim::I64 => "i64",
        Prim::I128 => "i128",
        Prim::U8 => "u8",
        Prim::U16 => "u16",
        Prim::U32 => "u32",
        Prim::U64 => "u64",
        Prim::U128 => "u128",
        Prim::F16 => "f16",
        Prim::F32 => "f32",
        Prim::F64 => "f64",
    }
}

fn print_op(f: &Function, id: OpId) -> String {
    let op = &f.ops[id];
    let rhs = match &op.kind {
        OpKind::ConstInt(v) => format!("const {v}"),
        OpKind::ConstFloat(v) => format!("const {v}"),
        OpKind::ConstZero => "zero".to_string(),
        OpKind::AddrOfLocal(l) => format!("addr local{}", l.raw()),
        OpKind::AddrOfGlobal(g) => format!("addr global{}", g.raw()),
        OpKind::AddressOffset { base, index, disp } => match index {
            Some(idx) => format!(
                "{} + {} * {} + {}",
                op_name(*base),
                op_name(idx.index),
                idx.scale,
                disp
            ),
            None => format!("{} + {}", op_name(*base), disp),
        },
        OpKind::LoadLocal(l) => format!("load local{}", l.raw()),
        OpKind::LoadGlobal(g) => format!("load global{}", g.raw()),
        OpKind::LoadAddr(a) => format!("load {}", op_name(*a)),
        OpKind::StoreLocal(l, v) => format!("store local{}, {}", l.raw(), op_name(*v)),
        OpKind::StoreGlobal(g, v) => format!("store global{}, {}", g.raw(), op_name(*v)),
        OpKind::StoreAddr { addr, value } => format!("store {}, {}", op_name(*addr), op_name(*value)),
        OpKind::BitfieldLoad { addr, bit_offset, width } => {
            format!("bfload {}, {}:{}", op_name(*addr), bit_offset, width)
        }
        OpKind::BitfieldStore { addr, bit_offset, width, value } => format!(
            "bfstore {}, {}:{}, {}",
            op_name(*addr),
            bit_offset,
            width,
            op_name(*value)
        ),
        OpKind::Unary(k, a) => format!("{} {}", unary_name(*k), op_name(*a)),
        OpKind::Binary(k, a, b) => format!("{} {}, {}", binary_name(*k), op_name(*a), op_name(*b)),
        OpKind::Cast(k, a) => format!("{} {}", cast_name(*k), op_name(*a)),
        OpKind::Call { target, args, .. } => format!(
            "call {}({})",
            op_name(*target),
            args.iter().map(|a| op_name(*a)).collect::<Vec<_>>().join(", ")
        ),
        OpKind::Branch(b) => format!("br {}", block_name(*b)),
        OpKind::CondBranch { cond, then_block, else_block } => format!(
            "br {}, {}, {}",
            op_name(*cond),
            block_name(*then_block),
            block_name(*else_block)
        ),
        OpKind::Switch { value, cases, default } => format!(
            "switch {} [{}] default {}",
            op_name(*value),
            cases
                .iter()
                .map(|(v, b)| format!("{}: {}", v, block_name(*b)))
                .collect::<Vec<_>>()
                .join(", "),
            block_name(*default)
        ),
        OpKind::Phi(entries) => format!(
            "phi [{}]",
            entries
                .iter()
                .map(|e| format!("{}: {}", block_name(e.pred), op_name(e.value)))
                .collect::<Vec<_>>()
                .join(", ")
        ),
        OpKind::Mov => "mov".to_string(),
        OpKind::MemSet { dst, value, len } => {
            format!("memset {}, {}, {}", op_name(*dst), op_name(*value), op_name(*len))
        }
        OpKind::MemCopy { dst, src, len } => {
            format!("memcpy {}, {}, {}", op_name(*dst), op_name(*src), op_name(*len))
        }
        OpKind::MemMove { dst, src, len } => {
            format!("memmove {}, {}, {}", op_name(*dst), op_name(*src), op_name(*len))
        }
        OpKind::MemCmp { a, b, len } => {
            format!("memcmp {}, {}, {}", op_name(*a), op_name(*b), op_name(*len))
        }
        OpKind::VaStart(a) => format!("va_start {}", op_name(*a)),
        OpKind::VaArg { va_list, ty: t } => format!("va_arg {}, {}", op_name(*va_list), ty(t)),
        OpKind::Ret(v) => match v {
            Some(v) => format!("ret {}", op_name(*v)),
            None => "ret void".to_string(),
        },
        OpKind::Undef => "undef".to_string(),
    };
    format!("{} = {} : {}", op_name(id), rhs, ty(&op.ty))
}

fn unary_name(k: UnaryOp) -> &'static str {
    match k {
        UnaryOp::Neg => "neg",
        UnaryOp::FNeg => "fneg",
        UnaryOp::Not => "not",
        UnaryOp::LogicalNot => "lnot",
        UnaryOp::FAbs => "fabs",
        UnaryOp::FSqrt => "fsqrt",
        UnaryOp::PopCount => "popcount",
        UnaryOp::Clz => "clz",
        UnaryOp::Ctz => "ctz",
        UnaryOp::ByteReverse => "bswap",
    }
}

fn binary_name(k: BinaryOp) -> &'static str {
    use BinaryOp::*;
    match k {
        AddInt => "add",
        SubInt => "sub",
        MulInt => "mul",
        DivS => "sdiv",
        DivU => "udiv",
        RemS => "srem",
        RemU => "urem",
        And => "and",
        Or => "or",
        Xor => "xor",
        Shl => "shl",
        ShrS => "ashr",
        ShrU => "lshr",
        AddFloat => "fadd",
        SubFloat => "fsub",
        MulFloat => "fmul",
        DivFloat => "fdiv",
        CmpEq => "icmp eq",
        CmpNe => "icmp ne",
        CmpLtS => "icmp slt",
        CmpLtU => "icmp ult",
        CmpLeS => "icmp sle",
        CmpLeU => "icmp ule",
        CmpGtS => "icmp sgt",
        CmpGtU => "icmp ugt",
        CmpGeS => "icmp sge",
        CmpGeU => "icmp uge",
        CmpLtFloat => "fcmp lt",
        CmpLeFloat => "fcmp le",
        CmpGtFloat => "fcmp gt",
        CmpGeFloat => "fcmp ge",
        CmpEqFloat => "fcmp eq",
        CmpNeFloat => "fcmp ne",
    }
}

fn cast_name(k: CastKind) -> &'static str {
    match k {
        CastKind::Truncate => "trunc",
        CastKind::SignExtend => "sext",
        CastKind::ZeroExtend => "zext",
        CastKind::FloatConvert => "fpconv",
        CastKind::SignedIntToFloat => "sitofp",
        CastKind::UnsignedIntToFloat => "uitofp",
        CastKind::FloatToSignedInt => "fptosi",
        CastKind::FloatToUnsignedInt => "fptoui",
        CastKind::CompareNotZero => "cmpnz",
        CastKind::Bitcast => "bitcast",
    }
}
