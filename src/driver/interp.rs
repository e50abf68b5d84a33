//! Tree-walking interpreter (spec.md §4.H "runs on a single source after IR
//! build, bypassing codegen/linking entirely"). Evaluates the IR the builder
//! already produced, not the AST -- this exercises the same data model a
//! code generator would consume, just against a much simpler backend.
//!
//! Memory is one flat byte buffer with a bump allocator; there is no real
//! address space separation between locals, globals, and the stack. This is
//! adequate for running small test programs but is not a model of any real
//! ABI.
use std::collections::HashMap;

use anyhow::{anyhow, bail, Result};

use crate::ir::block::BasicBlock;
use crate::ir::function::Function;
use crate::ir::op::{BinaryOp, BlockId, CastKind, GlobalId, LocalId, OpId, OpKind, UnaryOp};
use crate::ir::ty::{Prim, Type};
use crate::ir::unit::{GlobalKind, GlobalValue, Unit};

/// Addresses at or above this value name a function rather than a byte
/// offset into [`Memory`]; nothing in a real address space collides with it
/// because the interpreter's data memory never grows this large.
const FUNC_ADDR_BASE: i64 = 1 << 48;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
}

impl Value {
    fn as_i64(self) -> i64 {
        match self {
            Value::Int(i) => i,
            Value::Float(f) => f as i64,
        }
    }

    fn as_f64(self) -> f64 {
        match self {
            Value::Int(i) => i as f64,
            Value::Float(f) => f,
        }
    }

    fn zero_of(ty: &Type) -> Value {
        if ty.is_float() {
            Value::Float(0.0)
        } else {
            Value::Int(0)
        }
    }
}

struct Memory {
    bytes: Vec<u8>,
}

impl Memory {
    fn new() -> Self {
        Memory { bytes: Vec::new() }
    }

    fn alloc(&mut self, size: u64) -> usize {
        let addr = self.bytes.len();
        self.bytes.resize(addr + size.max(1) as usize, 0);
        addr
    }

    fn write_bytes(&mut self, addr: usize, data: &[u8]) {
        self.bytes[addr..addr + data.len()].copy_from_slice(data);
    }

    fn read_int(&self, addr: usize, size: u64, signed: bool) -> i64 {
        let size = size as usize;
        let mut buf = [0u8; 8];
        buf[..size.min(8)].copy_from_slice(&self.bytes[addr..addr + size.min(8)]);
        let raw = u64::from_le_bytes(buf);
        if !signed || size >= 8 {
            raw as i64
        } else {
            let shift = 64 - size * 8;
            ((raw << shift) as i64) >> shift
        }
    }

    fn write_int(&mut self, addr: usize, size: u64, value: i64) {
        let size = size as usize;
        let bytes = value.to_le_bytes();
        self.write_bytes(addr, &bytes[..size.min(8)]);
    }

    fn read_float(&self, addr: usize, size: u64) -> f64 {
        if size == 4 {
            let mut buf = [0u8; 4];
            buf.copy_from_slice(&self.bytes[addr..addr + 4]);
            f32::from_le_bytes(buf) as f64
        } else {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(&self.bytes[addr..addr + 8]);
            f64::from_le_bytes(buf)
        }
    }

    fn write_float(&mut self, addr: usize, size: u64, value: f64) {
        if size == 4 {
            self.write_bytes(addr, &(value as f32).to_le_bytes());
        } else {
            self.write_bytes(addr, &value.to_le_bytes());
        }
    }

    fn copy_within(&mut self, dst: usize, src: usize, len: usize) {
        self.bytes.copy_within(src..src + len, dst);
    }
}

enum OpOutcome {
    Value(Value),
    Jump(BlockId),
    Return(Option<Value>),
}

pub struct Interp<'u> {
    unit: &'u Unit,
    memory: Memory,
    global_addrs: HashMap<GlobalId, i64>,
}

impl<'u> Interp<'u> {
    fn new(unit: &'u Unit) -> Self {
        Interp {
            unit,
            memory: Memory::new(),
            global_addrs: HashMap::new(),
        }
    }

    fn materialise_globals(&mut self) {
        for id in self.unit.globals.ids() {
            let global = self.unit.global(id);
            match &global.kind {
                GlobalKind::Function(_) => {
                    self.global_addrs.insert(id, FUNC_ADDR_BASE + id.raw() as i64);
                }
                GlobalKind::Data { ty, init } => {
                    let addr = self.memory.alloc(ty.size_of(self.unit.target));
                    if let Some(v) = init {
                        self.write_global_value(addr, v);
                    }
                    self.global_addrs.insert(id, addr as i64);
                }
                GlobalKind::StringLiteral(bytes) => {
                    let addr = self.memory.alloc(bytes.len() as u64);
                    self.memory.write_bytes(addr, bytes);
                    self.global_addrs.insert(id, addr as i64);
                }
            }
        }
    }

    fn write_global_value(&mut self, addr: usize, v: &GlobalValue) {
        match v {
            GlobalValue::Zero => {}
            GlobalValue::Int(i) => self.memory.write_int(addr, 8, *i),
            GlobalValue::Float(f) => self.memory.write_float(addr, 8, *f),
            GlobalValue::Bytes(b) => self.memory.write_bytes(addr, b),
            GlobalValue::AddressOf(name) => {
                if let Some(target) = self.unit.find_global_id(name) {
                    if let Some(&a) = self.global_addrs.get(&target) {
                        self.memory.write_int(addr, 8, a);
                    }
                }
            }
            GlobalValue::Struct(fields) => {
                for (offset, value) in fields {
                    self.write_global_value(addr + *offset as usize, value);
                }
            }
        }
    }

    fn call(&mut self, f: &Function, args: &[Value]) -> Result<Option<Value>> {
        let mut local_addrs: Vec<usize> = Vec::with_capacity(f.locals.len());
        for id in f.locals.ids() {
            let local = &f.locals[id];
            local_addrs.push(self.memory.alloc(local.ty.size_of(self.unit.target)));
        }

        let mut env: Vec<Option<Value>> = vec![None; f.ops.len()];
        let param_order = param_op_order(f);

        let mut current = f.entry;
        let mut prev = f.entry;
        'blocks: loop {
            let block: &BasicBlock = &f.blocks[current];
            for &stmt_id in &block.stmts {
                for &op_id in &f.stmts[stmt_id].ops {
                    let outcome = self.eval_op(f, op_id, &local_addrs, &env, prev, &param_order, args)?;
                    match outcome {
                        OpOutcome::Value(v) => env[op_id.raw() as usize] = Some(v),
                        OpOutcome::Jump(target) => {
                            prev = current;
                            current = target;
                            continue 'blocks;
                        }
                        OpOutcome::Return(v) => return Ok(v),
                    }
                }
            }
            bail!("block {current:?} of `{}` fell through without a terminator", f.name);
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn eval_op(
        &mut self,
        f: &Function,
        op_id: OpId,
        local_addrs: &[usize],
        env: &[Option<Value>],
        prev: BlockId,
        param_order: &[OpId],
        args: &[Value],
    ) -> Result<OpOutcome> {
        let op = &f.ops[op_id];
        let get = |id: OpId| -> Result<Value> {
            env[id.raw() as usize]
                .ok_or_else(|| anyhow!("use of op {id:?} before definition"))
        };

        let value = match &op.kind {
            OpKind::ConstInt(i) => Value::Int(*i),
            OpKind::ConstFloat(v) => Value::Float(*v),
            OpKind::ConstZero => Value::zero_of(&op.ty),
            OpKind::AddrOfLocal(local) => Value::Int(local_addrs[local.raw() as usize] as i64),
            OpKind::AddrOfGlobal(global) => Value::Int(self.global_addrs[global]),
            OpKind::AddressOffset { base, index, disp } => {
                let mut addr = get(*base)?.as_i64();
                if let Some(idx) = index {
                    addr += get(idx.index)?.as_i64() * idx.scale as i64;
                }
                Value::Int(addr + disp)
            }
            OpKind::LoadLocal(local) => {
                self.load(local_addrs[local.raw() as usize], &op.ty)
            }
            OpKind::LoadGlobal(global) => self.load(self.global_addrs[global] as usize, &op.ty),
            OpKind::LoadAddr(a) => self.load(get(*a)?.as_i64() as usize, &op.ty),
            OpKind::StoreLocal(local, v) => {
                self.store(local_addrs[local.raw() as usize], &f.ops[*v].ty, get(*v)?);
                Value::Int(0)
            }
            OpKind::StoreGlobal(global, v) => {
                self.store(self.global_addrs[global] as usize, &f.ops[*v].ty, get(*v)?);
                Value::Int(0)
            }
            OpKind::StoreAddr { addr, value } => {
                self.store(get(*addr)?.as_i64() as usize, &f.ops[*value].ty, get(*value)?);
                Value::Int(0)
            }
            OpKind::BitfieldLoad { addr, bit_offset, width } => {
                let word = self.memory.read_int(get(*addr)?.as_i64() as usize, 8, false);
                let shifted = (word as u64) >> bit_offset;
                let mask = if *width >= 64 { u64::MAX } else { (1u64 << width) - 1 };
                Value::Int((shifted & mask) as i64)
            }
            OpKind::BitfieldStore { addr, bit_offset, width, value } => {
                let a = get(*addr)?.as_i64() as usize;
                let word = self.memory.read_int(a, 8, false) as u64;
                let mask = if *width >= 64 { u64::MAX } else { (1u64 << width) - 1 };
                let cleared = word & !(mask << bit_offset);
                let inserted = cleared | (((get(*value)?.as_i64() as u64) & mask) << bit_offset);
                self.memory.write_int(a, 8, inserted as i64);
                Value::Int(0)
            }
            OpKind::Unary(op_kind, a) => self.eval_unary(*op_kind, get(*a)?, &op.ty),
            OpKind::Binary(op_kind, a, b) => self.eval_binary(*op_kind, get(*a)?, get(*b)?),
            OpKind::Cast(kind, a) => self.eval_cast(*kind, get(*a)?, &op.ty),
            OpKind::Mov => {
                let idx = param_order
                    .iter()
                    .position(|&id| id == op_id)
                    .ok_or_else(|| anyhow!("Mov op {op_id:?} is not a recognised parameter"))?;
                args.get(idx).copied().unwrap_or(Value::Int(0))
            }
            OpKind::Call { target, args: call_args, .. } => {
                let callee_addr = get(*target)?.as_i64();
                let evaluated: Vec<Value> = call_args
                    .iter()
                    .map(|&a| get(a))
                    .collect::<Result<_>>()?;
                self.call_address(callee_addr, &evaluated)?.unwrap_or(Value::Int(0))
            }
            OpKind::MemSet { dst, value, len } => {
                let dst = get(*dst)?.as_i64() as usize;
                let byte = get(*value)?.as_i64() as u8;
                let len = get(*len)?.as_i64() as usize;
                for i in 0..len {
                    self.memory.bytes[dst + i] = byte;
                }
                Value::Int(dst as i64)
            }
            OpKind::MemCopy { dst, src, len } | OpKind::MemMove { dst, src, len } => {
                let dst_addr = get(*dst)?.as_i64() as usize;
                let src_addr = get(*src)?.as_i64() as usize;
                let len = get(*len)?.as_i64() as usize;
                self.memory.copy_within(dst_addr, src_addr, len);
                Value::Int(dst_addr as i64)
            }
            OpKind::MemCmp { a, b, len } => {
                let a_addr = get(*a)?.as_i64() as usize;
                let b_addr = get(*b)?.as_i64() as usize;
                let len = get(*len)?.as_i64() as usize;
                let ord = self.memory.bytes[a_addr..a_addr + len]
                    .cmp(&self.memory.bytes[b_addr..b_addr + len]);
                Value::Int(ord as i64)
            }
            OpKind::VaStart(_) => Value::Int(0),
            OpKind::VaArg { ty, .. } => Value::zero_of(ty),
            OpKind::Undef => Value::zero_of(&op.ty),

            OpKind::Branch(target) => return Ok(OpOutcome::Jump(*target)),
            OpKind::CondBranch { cond, then_block, else_block } => {
                let taken = if get(*cond)?.as_i64() != 0 { *then_block } else { *else_block };
                return Ok(OpOutcome::Jump(taken));
            }
            OpKind::Switch { value, cases, default } => {
                let v = get(*value)?.as_i64();
                let target = cases
                    .iter()
                    .find(|(c, _)| *c == v)
                    .map(|(_, b)| *b)
                    .unwrap_or(*default);
                return Ok(OpOutcome::Jump(target));
            }
            OpKind::Phi(entries) => {
                let entry = entries
                    .iter()
                    .find(|e| e.pred == prev)
                    .ok_or_else(|| anyhow!("phi {op_id:?} has no entry for predecessor {prev:?}"))?;
                get(entry.value)?
            }
            OpKind::Ret(v) => {
                let val = v.map(|id| get(id)).transpose()?;
                return Ok(OpOutcome::Return(val));
            }
        };
        Ok(OpOutcome::Value(value))
    }

    fn call_address(&mut self, addr: i64, args: &[Value]) -> Result<Option<Value>> {
        if addr < FUNC_ADDR_BASE {
            bail!("call through non-function address {addr}");
        }
        let id: GlobalId = *self
            .global_addrs
            .iter()
            .find(|(_, &a)| a == addr)
            .map(|(id, _)| id)
            .ok_or_else(|| anyhow!("no function at address {addr}"))?;
        match &self.unit.global(id).kind {
            GlobalKind::Function(f) => {
                let f = f.clone();
                self.call(&f, args)
            }
            _ => bail!("address {addr} does not name a function"),
        }
    }

    fn load(&self, addr: usize, ty: &Type) -> Value {
        let size = ty.size_of(self.unit.target);
        if ty.is_float() {
            Value::Float(self.memory.read_float(addr, size))
        } else {
            Value::Int(self.memory.read_int(addr, size.min(8), ty.is_signed()))
        }
    }

    fn store(&mut self, addr: usize, ty: &Type, v: Value) {
        let size = ty.size_of(self.unit.target);
        if ty.is_float() {
            self.memory.write_float(addr, size, v.as_f64());
        } else {
            self.memory.write_int(addr, size.min(8), v.as_i64());
        }
    }

    fn eval_unary(&self, op: UnaryOp, a: Value, ty: &Type) -> Value {
        match op {
            UnaryOp::Neg => Value::Int(a.as_i64().wrapping_neg()),
            UnaryOp::FNeg => Value::Float(-a.as_f64()),
            UnaryOp::Not => Value::Int(!a.as_i64()),
            UnaryOp::LogicalNot => Value::Int((a.as_i64() == 0) as i64),
            UnaryOp::FAbs => Value::Float(a.as_f64().abs()),
            UnaryOp::FSqrt => Value::Float(a.as_f64().sqrt()),
            UnaryOp::PopCount => Value::Int(a.as_i64().count_ones() as i64),
            UnaryOp::Clz => {
                let width = bit_width(ty);
                Value::Int((a.as_i64() as u64).leading_zeros() as i64 - (64 - width) as i64)
            }
            UnaryOp::Ctz => Value::Int(a.as_i64().trailing_zeros() as i64),
            UnaryOp::ByteReverse => Value::Int(match bit_width(ty) {
                16 => (a.as_i64() as u16).swap_bytes() as i64,
                32 => (a.as_i64() as u32).swap_bytes() as i64,
                _ => (a.as_i64() as u64).swap_bytes() as i64,
            }),
        }
    }

    fn eval_binary(&self, op: BinaryOp, a: Value, b: Value) -> Value {
        use BinaryOp::*;
        if matches!(
            op,
            AddFloat | SubFloat | MulFloat | DivFloat | CmpLtFloat | CmpLeFloat | CmpGtFloat
                | CmpGeFloat | CmpEqFloat | CmpNeFloat
        ) {
            let (x, y) = (a.as_f64(), b.as_f64());
            return match op {
                AddFloat => Value::Float(x + y),
                SubFloat => Value::Float(x - y),
                MulFloat => Value::Float(x * y),
                DivFloat => Value::Float(x / y),
                CmpLtFloat => Value::Int((x < y) as i64),
                CmpLeFloat => Value::Int((x <= y) as i64),
                CmpGtFloat => Value::Int((x > y) as i64),
                CmpGeFloat => Value::Int((x >= y) as i64),
                CmpEqFloat => Value::Int((x == y) as i64),
                CmpNeFloat => Value::Int((x != y) as i64),
                _ => unreachable!(),
            };
        }
        let (x, y) = (a.as_i64(), b.as_i64());
        let (ux, uy) = (x as u64, y as u64);
        match op {
            AddInt => Value::Int(x.wrapping_add(y)),
            SubInt => Value::Int(x.wrapping_sub(y)),
            MulInt => Value::Int(x.wrapping_mul(y)),
            DivS => Value::Int(x.checked_div(y).unwrap_or(0)),
            DivU => Value::Int(ux.checked_div(uy).unwrap_or(0) as i64),
            RemS => Value::Int(x.checked_rem(y).unwrap_or(0)),
            RemU => Value::Int(ux.checked_rem(uy).unwrap_or(0) as i64),
            And => Value::Int(x & y),
            Or => Value::Int(x | y),
            Xor => Value::Int(x ^ y),
            Shl => Value::Int(x.wrapping_shl(y as u32)),
            ShrS => Value::Int(x.wrapping_shr(y as u32)),
            ShrU => Value::Int(ux.wrapping_shr(y as u32) as i64),
            CmpEq => Value::Int((x == y) as i64),
            CmpNe => Value::Int((x != y) as i64),
            CmpLtS => Value::Int((x < y) as i64),
            CmpLtU => Value::Int((ux < uy) as i64),
            CmpLeS => Value::Int((x <= y) as i64),
            CmpLeU => Value::Int((ux <= uy) as i64),
            CmpGtS => Value::Int((x > y) as i64),
            CmpGtU => Value::Int((ux > uy) as i64),
            CmpGeS => Value::Int((x >= y) as i64),
            CmpGeU => Value::Int((ux >= uy) as i64),
            AddFloat | SubFloat | MulFloat | DivFloat | CmpLtFloat | CmpLeFloat | CmpGtFloat
            | CmpGeFloat | CmpEqFloat | CmpNeFloat => unreachable!(),
        }
    }

    fn eval_cast(&self, kind: CastKind, a: Value, ty: &Type) -> Value {
        let bits = bit_width(ty);
        match kind {
            CastKind::Truncate | CastKind::ZeroExtend | CastKind::Bitcast => {
                Value::Int(mask_to_width(a.as_i64() as u64, bits) as i64)
            }
            CastKind::SignExtend => Value::Int(sign_extend(a.as_i64(), bits)),
            CastKind::FloatConvert => {
                if bits == 32 {
                    Value::Float(a.as_f64() as f32 as f64)
                } else {
                    Value::Float(a.as_f64())
                }
            }
            CastKind::SignedIntToFloat => Value::Float(a.as_i64() as f64),
            CastKind::UnsignedIntToFloat => Value::Float(a.as_i64() as u64 as f64),
            CastKind::FloatToSignedInt => Value::Int(a.as_f64() as i64),
            CastKind::FloatToUnsignedInt => Value::Int(a.as_f64() as u64 as i64),
            CastKind::CompareNotZero => Value::Int((a.as_i64() != 0) as i64),
        }
    }
}

fn bit_width(ty: &Type) -> u32 {
    match ty {
        Type::Primitive(p) => p.size() * 8,
        _ => 64,
    }
}

fn mask_to_width(v: u64, bits: u32) -> u64 {
    if bits >= 64 {
        v
    } else {
        v & ((1u64 << bits) - 1)
    }
}

fn sign_extend(v: i64, bits: u32) -> i64 {
    if bits >= 64 {
        return v;
    }
    let shift = 64 - bits;
    ((v as u64) << shift) as i64 >> shift
}

/// The parameter-materialising `Mov` ops live in order inside a function's
/// single `is_params` statement (spec.md §4.B "parameter materialisation").
fn param_op_order(f: &Function) -> Vec<OpId> {
    f.block_order
        .iter()
        .flat_map(|&b| f.blocks[b].stmts.iter())
        .find(|&&s| f.stmts[s].is_params)
        .map(|&s| f.stmts[s].ops.clone())
        .unwrap_or_default()
}

/// Run `entry`'s function with no arguments, for ad hoc smoke-testing a unit
/// just built from a single source (`--interp`, spec.md §4.H).
pub fn run(unit: &Unit, entry: &str) -> Result<i64> {
    run_with_args(unit, entry, &[])
}

pub fn run_with_args(unit: &Unit, entry: &str, args: &[i64]) -> Result<i64> {
    let id = unit
        .find_global_id(entry)
        .ok_or_else(|| anyhow!("no such function `{entry}`"))?;
    let f = match &unit.global(id).kind {
        GlobalKind::Function(f) => f.clone(),
        _ => bail!("`{entry}` is not a function"),
    };
    let mut interp = Interp::new(unit);
    interp.materialise_globals();
    let values: Vec<Value> = args.iter().map(|&i| Value::Int(i)).collect();
    let result = interp.call(&f, &values)?;
    Ok(result.map(|v| v.as_i64()).unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::op::PhiEntry;
    use crate::ir::unit::{Global, Linkage};
    use crate::target::{Arch, Os, Target};

    fn target() -> Target {
        Target { arch: Arch::X86_64, os: Os::Linux }
    }

    #[test]
    fn runs_a_constant_return() {
        let mut f = Function::new("answer", Type::Primitive(Prim::I32), vec![]);
        let stmt = f.new_statement(f.entry, false);
        let c = f.push_op(stmt, Type::Primitive(Prim::I32), OpKind::ConstInt(42));
        f.push_op(stmt, Type::None, OpKind::Ret(Some(c)));

        let mut unit = Unit::new(target());
        unit.push_global(Global {
            name: "answer".into(),
            linkage: Linkage::External,
            def_state: crate::ir::unit::DefState::Defined,
            ty: Type::Func(Box::new(Type::Primitive(Prim::I32)), vec![], Default::default()),
            kind: GlobalKind::Function(f),
        });

        assert_eq!(run(&unit, "answer").unwrap(), 42);
    }

    #[test]
    fn runs_a_diamond_phi() {
        let mut f = Function::new("pick", Type::Primitive(Prim::I32), vec![]);
        let entry = f.entry;
        let left = f.new_block();
        let right = f.new_block();
        let join = f.new_block();

        let stmt = f.new_statement(entry, false);
        let cond = f.push_op(stmt, Type::Primitive(Prim::I1), OpKind::ConstInt(0));
        f.blocks[entry].succs.push(left);
        f.blocks[entry].succs.push(right);
        f.blocks[left].preds.push(entry);
        f.blocks[right].preds.push(entry);
        f.push_op(stmt, Type::None, OpKind::CondBranch { cond, then_block: left, else_block: right });

        let ls = f.new_statement(left, false);
        let lv = f.push_op(ls, Type::Primitive(Prim::I32), OpKind::ConstInt(1));
        f.blocks[join].preds.push(left);
        f.blocks[left].succs.push(join);
        f.push_op(ls, Type::None, OpKind::Branch(join));

        let rs = f.new_statement(right, false);
        let rv = f.push_op(rs, Type::Primitive(Prim::I32), OpKind::ConstInt(2));
        f.blocks[join].preds.push(right);
        f.blocks[right].succs.push(join);
        f.push_op(rs, Type::None, OpKind::Branch(join));

        let phi_stmt = f.phi_statement(join);
        let phi = f.push_op(
            phi_stmt,
            Type::Primitive(Prim::I32),
            OpKind::Phi(vec![PhiEntry { pred: left, value: lv }, PhiEntry { pred: right, value: rv }]),
        );
        let js = f.new_statement(join, false);
        f.push_op(js, Type::None, OpKind::Ret(Some(phi)));

        let mut unit = Unit::new(target());
        unit.push_global(Global {
            name: "pick".into(),
            linkage: Linkage::External,
            def_state: crate::ir::unit::DefState::Defined,
            ty: Type::Func(Box::new(Type::Primitive(Prim::I32)), vec![], Default::default()),
            kind: GlobalKind::Function(f),
        });

        assert_eq!(run(&unit, "pick").unwrap(), 2);
    }
}
