// Expression-driven scan engine (§4.I): compiles an expression once and
// evaluates it per candidate address.
//
// No direct teacher counterpart -- the teacher's VM executes a fixed
// bytecode program once per rendered frame, not a compiled predicate
// once per scanned address -- but it reuses `eval.rs`'s evaluator and
// `symtab.rs`'s borrowed bindings exactly as the rest of the engine
// does, and follows the teacher's `VM::exec`/`VM::step` split (run to
// completion vs. single-step for an external driver) as the model for
// `ScanDriver`'s all-at-once `run()` vs. step-wise `step()`.

use std::cell::Cell;

use crate::ast::Ast;
use crate::memory::{MemoryRegion, MemoryTarget};
use crate::optimize::optimize;
use crate::parser::Parser;
use crate::symtab::SymbolTable;
use crate::value::{EvalError, Value, ValueType};
use crate::{eval, warn};

#[derive(Clone, Debug, PartialEq)]
pub enum EngineError {
    Parse(String),
    Eval(EvalError),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            EngineError::Parse(msg) => write!(f, "{}", msg),
            EngineError::Eval(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<EvalError> for EngineError {
    fn from(e: EvalError) -> Self {
        EngineError::Eval(e)
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

/// A compiled, optimised predicate plus the storage cells the scan
/// binds `addr`/`value` into. Produced once by `compile`, then driven
/// either all at once (`search`/`filter`) or a step at a time
/// (`ScanDriver`).
pub struct CompiledExpr {
    ast: Ast,
    addr_cell: Cell<Value>,
    value_cell: Cell<Value>,
    value_type: ValueType,
}

/// Compiles `src` into an optimised predicate, with `addr` and `value`
/// pre-bound in the symbol table at the types given (§4.I step 0). The
/// caller supplies the element type the scan reads at each candidate
/// address; `addr`'s type always matches the target's address width.
pub fn compile(src: &str, address_width_type: ValueType, element_type: ValueType) -> Result<CompiledExpr> {
    let addr_cell = Cell::new(Value::zero_for(&address_width_type));
    let value_cell = Cell::new(Value::zero_for(&element_type));

    // SAFETY-FREE BORROW TRICK: the cells above must outlive the parser
    // and its symbol table, which only exist for the duration of this
    // function. We therefore build the table, parse and optimise, and
    // then re-home the cells in the returned `CompiledExpr`: the AST
    // itself never borrows the cells (it only stores symbol *names*),
    // so there is nothing unsafe here -- only the table borrowed them,
    // and the table is dropped at the end of this function.
    let ast = {
        let mut symbols = SymbolTable::new();
        // These cells are moved into CompiledExpr below; we need them
        // alive during parsing so type resolution can see `addr`/`value`.
        // Since Rust won't let us borrow `addr_cell`/`value_cell` here
        // and move them out below, parse first against temporaries
        // instead, then construct the real cells afterward.
        let tmp_addr = Cell::new(Value::zero_for(&address_width_type));
        let tmp_value = Cell::new(Value::zero_for(&element_type));
        symbols
            .define("addr", address_width_type.clone(), &tmp_addr)
            .expect("fresh table, \"addr\" not yet bound");
        symbols
            .define("value", element_type.clone(), &tmp_value)
            .expect("fresh table, \"value\" not yet bound");

        let mut parser =
            Parser::new(src, Some(&symbols)).map_err(|e| EngineError::Parse(e.to_string()))?;
        let parsed = parser.parse().map_err(|e| EngineError::Parse(e.to_string()))?;
        optimize(parsed)
    };

    Ok(CompiledExpr { ast, addr_cell, value_cell, value_type: element_type })
}

impl CompiledExpr {
    fn symbols(&self, address_width_type: ValueType) -> SymbolTable {
        let mut symbols = SymbolTable::new();
        symbols
            .define("addr", address_width_type, &self.addr_cell)
            .expect("fresh table, \"addr\" not yet bound");
        symbols
            .define("value", self.value_type.clone(), &self.value_cell)
            .expect("fresh table, \"value\" not yet bound");
        symbols
    }

    /// Runs the three-step predicate (§4.I) against one candidate
    /// address: bind `addr`, read `value`, evaluate. A failed memory
    /// read is treated as "does not match" and logged, per §7's skip
    /// policy, rather than aborting the scan.
    fn test_one(&self, target: &dyn MemoryTarget, addr: u64, address_width_type: ValueType) -> Result<bool> {
        self.addr_cell.set(Value::assign(&address_width_type, &Value::U64(addr))?);

        let width = self.value_type.size_of();
        let mut buf = [0u8; 8];
        if target.read(addr, &mut buf[..width]).is_err() {
            warn!("skipping unreadable address 0x{:x}", addr);
            return Ok(false);
        }
        self.value_cell.set(decode_element(&self.value_type, &buf[..width]));

        let symbols = self.symbols(address_width_type);
        let result = eval::evaluate(&self.ast, Some(&symbols), Some(target))?;
        Ok(result.is_truthy())
    }
}

fn decode_element(ty: &ValueType, bytes: &[u8]) -> Value {
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
        Ptr(_) => Value::U64(u64::from_le_bytes(bytes.try_into().unwrap_or([0; 8]))),
    }
}

fn address_type_for(target: &dyn MemoryTarget) -> ValueType {
    match target.address_width() {
        crate::memory::AddressWidth::Width32 => ValueType::U32,
        crate::memory::AddressWidth::Width64 => ValueType::U64,
    }
}

/// Every readable address across `regions`, in region order then
/// increasing numeric order within a region (§5 ordering guarantee).
fn candidate_addresses(regions: &[MemoryRegion], element_size: u64) -> Vec<u64> {
    let mut out = Vec::new();
    for region in regions {
        if !region.prot.contains(crate::memory::Prot::R) {
            continue;
        }
        let mut addr = region.start;
        while addr + element_size <= region.end() {
            out.push(addr);
            addr += 1;
        }
    }
    out
}

/// `search`: scans every readable region of `target` and returns every
/// address where the compiled predicate is true, in scan order.
pub fn search(expr: &CompiledExpr, target: &dyn MemoryTarget) -> Result<Vec<u64>> {
    let addr_ty = address_type_for(target);
    let regions = target.regions();
    let candidates = candidate_addresses(&regions, expr.value_type.size_of() as u64);
    let mut hits = Vec::new();
    for addr in candidates {
        if expr.test_one(target, addr, addr_ty.clone())? {
            hits.push(addr);
        }
    }
    Ok(hits)
}

/// `filter`: re-tests a caller-supplied hit list, preserving its order,
/// instead of re-enumerating the target's regions (§4.I).
pub fn filter(expr: &CompiledExpr, target: &dyn MemoryTarget, hits: &[u64]) -> Result<Vec<u64>> {
    let addr_ty = address_type_for(target);
    let mut survivors = Vec::new();
    for &addr in hits {
        if expr.test_one(target, addr, addr_ty.clone())? {
            survivors.push(addr);
        }
    }
    Ok(survivors)
}

/// `peek`: evaluates a plain (non-predicate) expression once against a
/// single bound address and returns the resulting `Value`.
pub fn peek(expr: &CompiledExpr, target: &dyn MemoryTarget, addr: u64) -> Result<Value> {
    let addr_ty = address_type_for(target);
    expr.addr_cell.set(Value::assign(&addr_ty, &Value::U64(addr))?);

    let width = expr.value_type.size_of();
    let mut buf = [0u8; 8];
    target
        .read(addr, &mut buf[..width])
        .map_err(|_| EngineError::Eval(EvalError::MemoryRead { addr, ty: expr.value_type.clone() }))?;
    expr.value_cell.set(decode_element(&expr.value_type, &buf[..width]));

    let symbols = expr.symbols(addr_ty);
    Ok(eval::evaluate(&expr.ast, Some(&symbols), Some(target))?)
}

/// `poke`: evaluates `expr` once (with `addr`/`value` bound as above)
/// and writes the result into `target` at `addr`, converting to
/// `dest_type` first.
pub fn poke(
    expr: &CompiledExpr,
    target: &dyn MemoryTarget,
    addr: u64,
    dest_type: &ValueType,
) -> Result<()> {
    let addr_ty = address_type_for(target);
    expr.addr_cell.set(Value::assign(&addr_ty, &Value::U64(addr))?);

    let width = expr.value_type.size_of();
    let mut buf = [0u8; 8];
    if target.read(addr, &mut buf[..width]).is_ok() {
        expr.value_cell.set(decode_element(&expr.value_type, &buf[..width]));
    }

    let symbols = expr.symbols(addr_ty);
    let result = eval::evaluate(&expr.ast, Some(&symbols), Some(target))?;
    eval::write_value(target, addr, dest_type, &result)?;
    Ok(())
}

/// `eval`: runs compile/optimise/evaluate against an expression with no
/// `addr`/`value` dependency, for one-off calculator-style use. Does
/// not scan.
pub fn eval_once(src: &str) -> Result<Value> {
    let ast = {
        let mut parser = Parser::new(src, None).map_err(|e| EngineError::Parse(e.to_string()))?;
        let parsed = parser.parse().map_err(|e| EngineError::Parse(e.to_string()))?;
        optimize(parsed)
    };
    Ok(eval::evaluate(&ast, None, None)?)
}

/// Step-wise, externally-abortable scan driver (§5's cancellation
/// model). Grounded on the teacher's `VM::step` (single opcode per
/// call) vs. `VM::exec` (run to completion) split.
pub struct ScanDriver<'e, 't> {
    expr: &'e CompiledExpr,
    target: &'t dyn MemoryTarget,
    addr_ty: ValueType,
    candidates: Vec<u64>,
    cursor: usize,
    pub hits: Vec<u64>,
}

impl<'e, 't> ScanDriver<'e, 't> {
    pub fn new(expr: &'e CompiledExpr, target: &'t dyn MemoryTarget) -> Self {
        let addr_ty = address_type_for(target);
        let regions = target.regions();
        let candidates = candidate_addresses(&regions, expr.value_type.size_of() as u64);
        ScanDriver { expr, target, addr_ty, candidates, cursor: 0, hits: Vec::new() }
    }

    /// Tests exactly one more candidate address, recording a hit if the
    /// predicate matched. Returns `false` once the scan is complete.
    /// Safe to stop calling at any point and resume later by calling
    /// again -- the cursor is internal state, not tied to a borrow of
    /// any external loop.
    pub fn step(&mut self) -> Result<bool> {
        if self.cursor >= self.candidates.len() {
            return Ok(false);
        }
        let addr = self.candidates[self.cursor];
        self.cursor += 1;
        if self.expr.test_one(self.target, addr, self.addr_ty.clone())? {
            self.hits.push(addr);
        }
        Ok(true)
    }

    pub fn is_done(&self) -> bool {
        self.cursor >= self.candidates.len()
    }

    /// Runs the scan to completion in one call, equivalent to stepping
    /// until `step()` returns `false`.
    pub fn run(&mut self) -> Result<()> {
        while self.step()? {}
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{BufferTarget, Prot};

    fn target_with_values(values: &[(u64, i32)]) -> BufferTarget {
        let mut t = BufferTarget::new_32(0x10000);
        t.add_region("test", 0, 0x10000, Prot::R | Prot::W).unwrap();
        for (addr, v) in values {
            t.write(*addr, &v.to_le_bytes()).unwrap();
        }
        t
    }

    #[test]
    fn search_finds_matching_addresses() {
        let target = target_with_values(&[(0x100, 42), (0x104, 99), (0x108, 42)]);
        let expr = compile("value == 42", ValueType::U32, ValueType::S32).unwrap();
        let hits = search(&expr, &target).unwrap();
        assert!(hits.contains(&0x100));
        assert!(hits.contains(&0x108));
        assert!(!hits.contains(&0x104));
    }

    #[test]
    fn filter_preserves_input_order_and_only_tests_given_hits() {
        let target = target_with_values(&[(0x100, 42), (0x104, 42), (0x108, 7)]);
        let expr = compile("value == 42", ValueType::U32, ValueType::S32).unwrap();
        let survivors = filter(&expr, &target, &[0x108, 0x104, 0x100]).unwrap();
        assert_eq!(survivors, vec![0x104, 0x100]);
    }

    #[test]
    fn peek_reads_back_dereferenced_value() {
        let target = target_with_values(&[(0x2000, 7)]);
        let expr = compile("*(s32*)addr + 1", ValueType::U32, ValueType::S32).unwrap();
        let result = peek(&expr, &target, 0x2000).unwrap();
        assert_eq!(result, Value::S32(8));
    }

    #[test]
    fn poke_writes_converted_result() {
        let target = target_with_values(&[(0x100, 0)]);
        let expr = compile("value + 1", ValueType::U32, ValueType::S32).unwrap();
        // seed `value` by reading current memory through a peek-like path
        poke(&expr, &target, 0x100, &ValueType::S32).unwrap();
        let mut buf = [0u8; 4];
        target.read(0x100, &mut buf).unwrap();
        assert_eq!(i32::from_le_bytes(buf), 1);
    }

    #[test]
    fn eval_once_runs_without_a_target() {
        assert_eq!(eval_once("1 + 2 * 3").unwrap(), Value::S32(7));
        assert_eq!(eval_once("10 / 0").unwrap_err(), EngineError::Eval(EvalError::DivideByZero));
    }

    #[test]
    fn scan_driver_can_be_aborted_and_resumed() {
        let target = target_with_values(&[(0, 42), (4, 42), (8, 42)]);
        let expr = compile("value == 42", ValueType::U32, ValueType::S32).unwrap();
        let mut driver = ScanDriver::new(&expr, &target);

        // step through a handful of candidates, then stop early.
        for _ in 0..3 {
            driver.step().unwrap();
        }
        assert!(!driver.is_done());
        let hits_so_far = driver.hits.len();
        assert!(hits_so_far <= 3);

        // resume and finish.
        driver.run().unwrap();
        assert!(driver.is_done());
        assert!(driver.hits.len() >= hits_so_far);
    }
}
