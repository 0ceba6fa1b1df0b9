// Recursive AST evaluator (§4.F).
//
// Grounded on the teacher's `VM::dispatch`/`binop`/`unop` in `vm.rs`: a
// match over the operation that calls into the `Value` method table and
// propagates `Result<_, Error>` with `?`. We walk a tree instead of
// stepping a flat bytecode array, but the shape -- dispatch into the
// value method table, propagate the typed error -- is the same.

use std::cell::Cell;

use crate::ast::{Ast, BinOp, UnOp};
use crate::memory::MemoryTarget;
use crate::symtab::SymbolTable;
use crate::value::{EvalError, PtrTag, Result, Value, ValueType};

/// RAII guard pairing a `MemoryTarget::pause()` with a guaranteed
/// `resume()`, including on an early `?` return out of `evaluate`.
/// Grounded in the same "acquire for the duration of a call" pattern
/// the teacher's `Output` trait models, generalized to a guard since
/// our capability needs the release half to run unconditionally.
struct PauseGuard<'a> {
    target: &'a dyn MemoryTarget,
}

impl<'a> PauseGuard<'a> {
    fn new(target: &'a dyn MemoryTarget) -> Result<Self> {
        target.pause().map_err(|_| EvalError::Detached)?;
        Ok(PauseGuard { target })
    }
}

impl<'a> Drop for PauseGuard<'a> {
    fn drop(&mut self) {
        let _ = self.target.resume();
    }
}

/// Evaluates `ast` against an optional symbol table and memory target.
/// A target is only required if a `Deref` node is actually reached
/// during evaluation -- a short-circuited `&&`/`||` branch containing a
/// `Deref` that's never taken is not an error. When a target is given
/// and the tree might dereference through it, it's paused for the
/// whole call (conservatively, even if short-circuiting ends up
/// skipping every `Deref`), matching §5's "target is conceptually
/// paused for the duration of one evaluation" framing.
pub fn evaluate(
    ast: &Ast,
    symbols: Option<&SymbolTable>,
    target: Option<&dyn MemoryTarget>,
) -> Result<Value> {
    match target {
        Some(t) if contains_deref(ast) => {
            let _guard = PauseGuard::new(t)?;
            eval_inner(ast, symbols, Some(t))
        }
        _ => eval_inner(ast, symbols, target),
    }
}

fn contains_deref(ast: &Ast) -> bool {
    match ast {
        Ast::Value(_) | Ast::Var { .. } => false,
        Ast::Unary { op: UnOp::Deref, .. } => true,
        Ast::Unary { child, .. } => contains_deref(child),
        Ast::Binary { left, right, .. } => contains_deref(left) || contains_deref(right),
    }
}

fn eval_inner(
    ast: &Ast,
    symbols: Option<&SymbolTable>,
    target: Option<&dyn MemoryTarget>,
) -> Result<Value> {
    match ast {
        Ast::Value(v) => Ok(*v),

        Ast::Var { name, value_type } => {
            let table = symbols.expect("parser never emits Var without a symbol table");
            let value = table
                .get(name)
                .unwrap_or_else(|| panic!("parser resolved '{}' but the table lost it", name));
            debug_assert_eq!(&value.get_type(), value_type);
            Ok(value)
        }

        Ast::Unary { op: UnOp::Cast, child, value_type } => {
            let v = eval_inner(child, symbols, target)?;
            v.cast_to(value_type)
        }

        Ast::Unary { op: UnOp::Deref, child, value_type } => {
            let v = eval_inner(child, symbols, target)?;
            let addr = match v {
                Value::Ptr(_, addr) => addr,
                other => return Err(EvalError::PointerToNonIntegral { ty: other.get_type() }),
            };
            let target = target.ok_or(EvalError::Detached)?;
            read_value(target, addr, value_type)
        }

        Ast::Unary { op, child, .. } => {
            let v = eval_inner(child, symbols, target)?.promote();
            match op {
                UnOp::Neg => v.neg(),
                UnOp::Not => v.not(),
                UnOp::Compl => v.compl(),
                UnOp::Cast | UnOp::Deref => unreachable!("handled above"),
            }
        }

        Ast::Binary { op: BinOp::AndCond, left, right, .. } => {
            let l = eval_inner(left, symbols, target)?;
            if !l.is_truthy() {
                return Ok(Value::S32(0));
            }
            let r = eval_inner(right, symbols, target)?;
            Ok(Value::S32(if r.is_truthy() { 1 } else { 0 }))
        }

        Ast::Binary { op: BinOp::OrCond, left, right, .. } => {
            let l = eval_inner(left, symbols, target)?;
            if l.is_truthy() {
                return Ok(Value::S32(1));
            }
            let r = eval_inner(right, symbols, target)?;
            Ok(Value::S32(if r.is_truthy() { 1 } else { 0 }))
        }

        Ast::Binary { op, left, right, .. } => {
            let l = eval_inner(left, symbols, target)?.promote();
            let r = eval_inner(right, symbols, target)?.promote();
            // Shifts take their result type from the left operand alone
            // (§4.A); every other operator coerces both sides to their
            // common "usual arithmetic conversion" type before dispatch,
            // since the native kernels below only have same-type arms.
            if matches!(op, BinOp::Shl | BinOp::Shr) {
                let r = r.cast_to(&l.get_type())?;
                return match op {
                    BinOp::Shl => l.shl(&r),
                    BinOp::Shr => l.shr(&r),
                    _ => unreachable!(),
                };
            }
            let common = ValueType::higher_type(&l.get_type(), &r.get_type());
            let l = l.cast_to(&common)?;
            let r = r.cast_to(&common)?;
            match op {
                BinOp::Add => l.add(&r),
                BinOp::Sub => l.sub(&r),
                BinOp::Mul => l.mul(&r),
                BinOp::Div => l.div(&r),
                BinOp::Mod => l.modulo(&r),
                BinOp::And => l.bitand(&r),
                BinOp::Xor => l.bitxor(&r),
                BinOp::Or => l.bitor(&r),
                BinOp::Eq => l.eq(&r),
                BinOp::Neq => l.neq(&r),
                BinOp::Lt => l.lt(&r),
                BinOp::Gt => l.gt(&r),
                BinOp::Le => l.le(&r),
                BinOp::Ge => l.ge(&r),
                BinOp::Shl | BinOp::Shr | BinOp::AndCond | BinOp::OrCond => unreachable!("handled above"),
            }
        }
    }
}

fn read_value(target: &dyn MemoryTarget, addr: u64, ty: &ValueType) -> Result<Value> {
    let width = ty.size_of();
    let mut buf = [0u8; 8];
    target
        .read(addr, &mut buf[..width])
        .map_err(|_| EvalError::MemoryRead { addr, ty: ty.clone() })?;
    Ok(decode(ty, &buf[..width]))
}

fn decode(ty: &ValueType, bytes: &[u8]) -> Value {
    use ValueType::*;
    match ty {
        S8 => Value::S8(bytes[0] as i8),
        U8 => Value::U8(bytes[0]),
        S16 => Value::S16(i16::from_le_bytes(bytes.try_into().unwrap())),
        U16 => Value::U16(u16::from_le_bytes(bytes.try_into().unwrap())),
        S32 => Value::S32(i32::from_le_bytes(bytes.try_into().unwrap())),
        U32 => Value::U32(u32::from_le_bytes(bytes.try_into().unwrap())),
        S64 => Value::S64(i64::from_le_bytes(bytes.try_into().unwrap())),
        U64 => Value::U64(u64::from_le_bytes(bytes.try_into().unwrap())),
        F32 => Value::F32(f32::from_le_bytes(bytes.try_into().unwrap())),
        F64 => Value::F64(f64::from_le_bytes(bytes.try_into().unwrap())),
        Ptr(inner) => {
            let tag = PtrTag::from_value_type(inner).expect("pointer-to-pointer is unconstructible");
            let mut addr_bytes = [0u8; 8];
            addr_bytes[..bytes.len()].copy_from_slice(bytes);
            Value::Ptr(tag, u64::from_le_bytes(addr_bytes))
        }
    }
}

/// Writes `value`, coerced to `ty`, into `target` at `addr`. Used by
/// `engine::poke`. A width mismatch between the coerced value and `ty`
/// is a programming error (see §4.I), hence the `expect`.
pub fn write_value(
    target: &dyn MemoryTarget,
    addr: u64,
    ty: &ValueType,
    value: &Value,
) -> Result<()> {
    let coerced = Value::assign(ty, value)?;
    let bytes = encode(&coerced);
    target
        .write(addr, &bytes)
        .map_err(|_| EvalError::MemoryWrite { addr, ty: ty.clone() })
}

fn encode(v: &Value) -> Vec<u8> {
    match v {
        Value::S8(n) => vec![*n as u8],
        Value::U8(n) => vec![*n],
        Value::S16(n) => n.to_le_bytes().to_vec(),
        Value::U16(n) => n.to_le_bytes().to_vec(),
        Value::S32(n) => n.to_le_bytes().to_vec(),
        Value::U32(n) => n.to_le_bytes().to_vec(),
        Value::S64(n) => n.to_le_bytes().to_vec(),
        Value::U64(n) => n.to_le_bytes().to_vec(),
        Value::F32(n) => n.to_le_bytes().to_vec(),
        Value::F64(n) => n.to_le_bytes().to_vec(),
        Value::Ptr(tag, addr) => addr.to_le_bytes()[..tag.size_of()].to_vec(),
    }
}

/// Binds `addr`/`value` storage cells into a symbol table the way
/// `engine::compile` expects (§4.I step 1-2): exposed here so `engine.rs`
/// and tests share one helper instead of re-deriving the binding dance.
pub fn bind_scan_symbols<'a>(
    symbols: &mut SymbolTable<'a>,
    addr_cell: &'a Cell<Value>,
    addr_ty: ValueType,
    value_cell: &'a Cell<Value>,
    value_ty: ValueType,
) {
    symbols.define("addr", addr_ty, addr_cell).expect("fresh table, \"addr\" not yet bound");
    symbols.define("value", value_ty, value_cell).expect("fresh table, \"value\" not yet bound");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{BufferTarget, Prot};

    fn lit(v: Value) -> Ast {
        Ast::Value(v)
    }

    fn bin(op: BinOp, l: Ast, r: Ast, ty: ValueType) -> Ast {
        Ast::Binary { op, left: Box::new(l), right: Box::new(r), value_type: ty }
    }

    #[test]
    fn scenario_1_precedence() {
        // 1 + 2 * 3 == 7
        let ast = bin(
            BinOp::Add,
            lit(Value::S32(1)),
            bin(BinOp::Mul, lit(Value::S32(2)), lit(Value::S32(3)), ValueType::S32),
            ValueType::S32,
        );
        assert_eq!(evaluate(&ast, None, None).unwrap(), Value::S32(7));
    }

    #[test]
    fn scenario_2_unsigned_cast_then_compare() {
        // (u32)-1 > 0
        let cast = Ast::Unary {
            op: UnOp::Cast,
            child: Box::new(lit(Value::S32(-1))),
            value_type: ValueType::U32,
        };
        let ast = bin(BinOp::Gt, cast, lit(Value::S32(0)), ValueType::S32);
        assert_eq!(evaluate(&ast, None, None).unwrap(), Value::S32(1));
    }

    #[test]
    fn scenario_3_float_promotion() {
        let ast = bin(BinOp::Add, lit(Value::F64(1.5)), lit(Value::S32(2)), ValueType::F64);
        assert_eq!(evaluate(&ast, None, None).unwrap(), Value::F64(3.5));
    }

    #[test]
    fn scenario_4_small_type_promotes_to_s32() {
        let ast = bin(
            BinOp::Add,
            Ast::Unary { op: UnOp::Cast, child: Box::new(lit(Value::S32(300))), value_type: ValueType::S16 },
            Ast::Unary { op: UnOp::Cast, child: Box::new(lit(Value::S32(300))), value_type: ValueType::S16 },
            ValueType::S32,
        );
        assert_eq!(evaluate(&ast, None, None).unwrap(), Value::S32(600));
    }

    #[test]
    fn scenario_6_division_by_zero() {
        let ast = bin(BinOp::Div, lit(Value::S32(10)), lit(Value::S32(0)), ValueType::S32);
        assert_eq!(evaluate(&ast, None, None).unwrap_err(), EvalError::DivideByZero);
    }

    #[test]
    fn scenario_7_deref_plus_one() {
        let mut buf = BufferTarget::new_32(0x10000);
        buf.add_region("test", 0x2000, 16, Prot::R | Prot::W).unwrap();
        buf.write(0x2000, &7i32.to_le_bytes()).unwrap();

        let addr = Ast::Value(Value::Ptr(PtrTag::S32, 0x2000));
        let deref = Ast::Unary { op: UnOp::Deref, child: Box::new(addr), value_type: ValueType::S32 };
        let ast = bin(BinOp::Add, deref, lit(Value::S32(1)), ValueType::S32);

        assert_eq!(evaluate(&ast, None, Some(&buf)).unwrap(), Value::S32(8));
        assert_eq!(buf.pause_count(), 1);
        assert_eq!(buf.resume_count(), 1);
    }

    #[test]
    fn short_circuit_and_skips_deref_on_false_left() {
        // value == 0 && *(s32*)addr == 1 -- right side must not evaluate
        // (no target supplied, so a non-short-circuiting evaluator would panic/error).
        let left = bin(BinOp::Eq, lit(Value::S32(1)), lit(Value::S32(0)), ValueType::S32);
        let ptr = Ast::Value(Value::Ptr(PtrTag::S32, 0xdead));
        let deref = Ast::Unary { op: UnOp::Deref, child: Box::new(ptr), value_type: ValueType::S32 };
        let right = bin(BinOp::Eq, deref, lit(Value::S32(1)), ValueType::S32);
        let ast = bin(BinOp::AndCond, left, right, ValueType::S32);

        assert_eq!(evaluate(&ast, None, None).unwrap(), Value::S32(0));
    }

    #[test]
    fn pause_guard_releases_on_error_path() {
        let mut buf = BufferTarget::new_32(0x10000);
        buf.add_region("test", 0x2000, 16, Prot::R).unwrap(); // no W, so write below fails irrelevant; read of unmapped addr fails

        let addr = Ast::Value(Value::Ptr(PtrTag::S32, 0x9999)); // unmapped
        let deref = Ast::Unary { op: UnOp::Deref, child: Box::new(addr), value_type: ValueType::S32 };

        assert!(evaluate(&deref, None, Some(&buf)).is_err());
        assert_eq!(buf.pause_count(), 1);
        assert_eq!(buf.resume_count(), 1);
    }
}
