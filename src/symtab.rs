// Symbol table: binds identifiers to typed, mutable storage slots.
//
// Grounded on the teacher's `env.rs::Env<T>` — a `RefCell`-backed map
// from name to slot — but dropping the scope-chain/parent-lookup
// machinery entirely: the expression language has no nested lexical
// scopes, only a single flat namespace of symbols the caller defines up
// front. Storage is also borrowed rather than owned: a slot is `&'a
// Cell<Value>`, so the evaluator can read and write a variable's value
// without the symbol table owning (or cloning) it, matching §4.B's
// "borrowed symbol storage" design note.

use std::cell::Cell;
use std::collections::HashMap;
use std::fmt;

use crate::value::{Value, ValueType};

/// Raised by `SymbolTable::define` when a name is already bound.
/// Mirrors the teacher's plain, `Display`-hand-written error enums
/// (see `value::EvalError`) rather than pulling in `thiserror`.
#[derive(Clone, Debug, PartialEq)]
pub enum SymtabError {
    DuplicateName(String),
}

impl fmt::Display for SymtabError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SymtabError::DuplicateName(name) => write!(f, "duplicate symbol name '{}'", name),
        }
    }
}

impl std::error::Error for SymtabError {}

/// One bound symbol: a static type plus a borrowed, mutable slot. The
/// type is fixed at definition time; assigning through the slot goes
/// through `Value::assign` so the stored value is always coerced back
/// to this type.
pub struct Symbol<'a> {
    pub ty: ValueType,
    pub slot: &'a Cell<Value>,
}

/// A flat table of name -> symbol bindings, borrowed from storage the
/// caller owns. `'a` ties every binding's lifetime to that storage, so
/// the table can never outlive the values it points into.
#[derive(Default)]
pub struct SymbolTable<'a> {
    symbols: HashMap<String, Symbol<'a>>,
}

impl<'a> SymbolTable<'a> {
    pub fn new() -> Self {
        SymbolTable { symbols: HashMap::new() }
    }

    /// Binds `name` to `slot`, typed as `ty`. Duplicate names are
    /// rejected rather than silently replacing the existing binding.
    pub fn define(
        &mut self,
        name: &str,
        ty: ValueType,
        slot: &'a Cell<Value>,
    ) -> std::result::Result<(), SymtabError> {
        if self.symbols.contains_key(name) {
            return Err(SymtabError::DuplicateName(name.to_string()));
        }
        self.symbols.insert(name.to_string(), Symbol { ty, slot });
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Option<&Symbol<'a>> {
        self.symbols.get(name)
    }

    pub fn get_type(&self, name: &str) -> Option<ValueType> {
        self.symbols.get(name).map(|s| s.ty.clone())
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.symbols.get(name).map(|s| s.slot.get())
    }

    /// Stores `value` into `name`'s slot, coercing to the symbol's
    /// declared type first. Returns the coerced value actually stored.
    pub fn set(&self, name: &str, value: Value) -> Option<crate::value::Result<Value>> {
        self.symbols.get(name).map(|s| {
            let coerced = Value::assign(&s.ty, &value)?;
            s.slot.set(coerced);
            Ok(coerced)
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.symbols.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn define_and_lookup_round_trip() {
        let slot = Cell::new(Value::S32(7));
        let mut table = SymbolTable::new();
        table.define("x", ValueType::S32, &slot).unwrap();
        assert_eq!(table.get("x"), Some(Value::S32(7)));
        assert_eq!(table.get_type("x"), Some(ValueType::S32));
    }

    #[test]
    fn set_coerces_to_declared_type() {
        let slot = Cell::new(Value::S32(0));
        let mut table = SymbolTable::new();
        table.define("x", ValueType::S32, &slot).unwrap();
        let result = table.set("x", Value::F64(3.9)).unwrap().unwrap();
        assert_eq!(result, Value::S32(3));
        assert_eq!(slot.get(), Value::S32(3));
    }

    #[test]
    fn unknown_symbol_is_none() {
        let table = SymbolTable::new();
        assert!(table.lookup("nope").is_none());
        assert!(table.get("nope").is_none());
        assert!(table.set("nope", Value::S32(1)).is_none());
    }

    #[test]
    fn redefining_a_name_is_rejected() {
        let a = Cell::new(Value::S32(1));
        let b = Cell::new(Value::F64(2.0));
        let mut table = SymbolTable::new();
        table.define("x", ValueType::S32, &a).unwrap();
        let err = table.define("x", ValueType::F64, &b).unwrap_err();
        assert_eq!(err, SymtabError::DuplicateName("x".into()));
        // the original binding is untouched
        assert_eq!(table.get_type("x"), Some(ValueType::S32));
        assert_eq!(table.get("x"), Some(Value::S32(1)));
    }
}
