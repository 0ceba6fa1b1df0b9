// The scalar value system: ValueType tags, the Value union, and the
// per-type arithmetic/bitwise/comparison/cast operator tables.
//
// Mirrors the teacher's `vm.rs::Value` in spirit: a closed enum plus a
// declarative macro that generates the white-listed operator arms and
// falls through to a typed error for anything not listed. There the
// variants were a small dynamic-language value set (Bool/Int/Float/Str/
// List/Map/Addr); here they are the ten fixed-width C scalar types plus
// pointer-qualified variants, since that's the whole of what the
// expression language's arithmetic talks about.

use std::fmt;

/// The closed set of scalar type tags, plus pointer-to-scalar.
///
/// `Ptr` is boxed rather than being its own flat enum of ten pointer
/// variants: pointer casts only ever name a single pointee type at a
/// time (`(s32*)expr`), so a recursive tag is simpler than enumerating
/// `S8Ptr, U8Ptr, ...` by hand, and it still closes under the same
/// exhaustive-match discipline everywhere else in the engine.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ValueType {
    S8,
    U8,
    S16,
    U16,
    S32,
    U32,
    S64,
    U64,
    F32,
    F64,
    Ptr(Box<ValueType>),
}

impl ValueType {
    pub fn is_integer(&self) -> bool {
        use ValueType::*;
        matches!(self, S8 | U8 | S16 | U16 | S32 | U32 | S64 | U64)
    }

    pub fn is_float(&self) -> bool {
        matches!(self, ValueType::F32 | ValueType::F64)
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self, ValueType::Ptr(_))
    }

    pub fn is_signed(&self) -> bool {
        use ValueType::*;
        matches!(self, S8 | S16 | S32 | S64)
    }

    pub fn is_numeric(&self) -> bool {
        self.is_integer() || self.is_float()
    }

    /// Size in bytes of this type's native storage. Pointers are sized
    /// by the target's address width, which this type alone doesn't
    /// know; callers that need a pointer's width pass it in separately
    /// (see `engine::ELEMENT_WIDTH` users and `MemoryTarget::address_width`).
    pub fn size_of(&self) -> usize {
        use ValueType::*;
        match self {
            S8 | U8 => 1,
            S16 | U16 => 2,
            S32 | U32 | F32 => 4,
            S64 | U64 | F64 => 8,
            Ptr(_) => 0, // caller must use an address-width-aware size
        }
    }

    /// Rank used for the "usual arithmetic conversion": the higher-rank
    /// operand's type wins. Matches the ordering in the spec exactly.
    fn rank(&self) -> u8 {
        use ValueType::*;
        match self {
            S8 => 0,
            U8 => 1,
            S16 => 2,
            U16 => 3,
            S32 => 4,
            U32 => 5,
            S64 => 6,
            U64 => 7,
            F32 => 8,
            F64 => 9,
            Ptr(_) => 10,
        }
    }

    /// `higher_type(a, b)` from the spec: commutative, and monotone on
    /// the rank ordering above.
    pub fn higher_type(a: &ValueType, b: &ValueType) -> ValueType {
        if a.rank() >= b.rank() {
            a.clone()
        } else {
            b.clone()
        }
    }

    pub fn name(&self) -> String {
        use ValueType::*;
        match self {
            S8 => "s8".into(),
            U8 => "u8".into(),
            S16 => "s16".into(),
            U16 => "u16".into(),
            S32 => "s32".into(),
            U32 => "u32".into(),
            S64 => "s64".into(),
            U64 => "u64".into(),
            F32 => "f32".into(),
            F64 => "f64".into(),
            Ptr(inner) => format!("{}*", inner.name()),
        }
    }

    /// Parses one of the ten scalar type-name keywords. Does not parse
    /// the trailing `*` of a pointer-cast; the parser handles that
    /// separately once it knows the base type named here.
    pub fn from_keyword(s: &str) -> Option<ValueType> {
        use ValueType::*;
        Some(match s {
            "s8" => S8,
            "u8" => U8,
            "s16" => S16,
            "u16" => U16,
            "s32" => S32,
            "u32" => U32,
            "s64" => S64,
            "u64" => U64,
            "f32" => F32,
            "f64" => F64,
            _ => return None,
        })
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A tagged scalar. The tag and payload travel together as an enum
/// discriminant rather than a separate `(tag, bytes)` pair, which is
/// both more idiomatic and removes the "read past the prefix implied by
/// the tag" failure mode the spec calls out as implementation-defined
/// in the C original.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Value {
    S8(i8),
    U8(u8),
    S16(i16),
    U16(u16),
    S32(i32),
    U32(u32),
    S64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
    /// A pointer value: the pointee type plus an address-width-agnostic
    /// 64-bit payload (narrowed/widened at the `MemoryTarget` boundary).
    Ptr(PtrTag, u64),
}

/// Pointee type tag carried alongside a pointer `Value`. A plain
/// `ValueType` would work too, but boxing a recursive `ValueType` inside
/// `Value::Ptr` just to store a non-pointer leaf type is wasteful; this
/// is that leaf restricted to the ten concrete scalar tags.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PtrTag {
    S8,
    U8,
    S16,
    U16,
    S32,
    U32,
    S64,
    U64,
    F32,
    F64,
}

impl PtrTag {
    pub fn size_of(&self) -> usize {
        self.to_value_type().size_of()
    }

    pub fn to_value_type(&self) -> ValueType {
        use PtrTag::*;
        match self {
            S8 => ValueType::S8,
            U8 => ValueType::U8,
            S16 => ValueType::S16,
            U16 => ValueType::U16,
            S32 => ValueType::S32,
            U32 => ValueType::U32,
            S64 => ValueType::S64,
            U64 => ValueType::U64,
            F32 => ValueType::F32,
            F64 => ValueType::F64,
        }
    }

    pub fn from_value_type(t: &ValueType) -> Option<PtrTag> {
        use ValueType::*;
        Some(match t {
            S8 => PtrTag::S8,
            U8 => PtrTag::U8,
            S16 => PtrTag::S16,
            U16 => PtrTag::U16,
            S32 => PtrTag::S32,
            U32 => PtrTag::U32,
            S64 => PtrTag::S64,
            U64 => PtrTag::U64,
            F32 => PtrTag::F32,
            F64 => PtrTag::F64,
            Ptr(_) => return None,
        })
    }
}

/// Operator/cast failure. Mirrors the teacher's `vm::Error` shape (a
/// plain enum, `Debug`-derived, no `thiserror`), but surfaced all the
/// way to a human-facing shell so it also gets hand-written `Display`.
#[derive(Clone, Debug, PartialEq)]
pub enum EvalError {
    InvalidOperandType { op: &'static str, got: ValueType },
    TypeMismatch { op: &'static str, lhs: ValueType, rhs: ValueType },
    DivideByZero,
    MemoryRead { addr: u64, ty: ValueType },
    MemoryWrite { addr: u64, ty: ValueType },
    PointerToNonIntegral { ty: ValueType },
    Detached,
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EvalError::InvalidOperandType { op, got } => {
                write!(f, "operator '{}' is not defined for type {}", op, got)
            }
            EvalError::TypeMismatch { op, lhs, rhs } => {
                write!(f, "operator '{}' cannot mix {} and {}", op, lhs, rhs)
            }
            EvalError::DivideByZero => write!(f, "division by zero"),
            EvalError::MemoryRead { addr, ty } => {
                write!(f, "failed to read {} bytes of {} at 0x{:x}", ty.size_of(), ty, addr)
            }
            EvalError::MemoryWrite { addr, ty } => {
                write!(f, "failed to write {} bytes of {} at 0x{:x}", ty.size_of(), ty, addr)
            }
            EvalError::PointerToNonIntegral { ty } => {
                write!(f, "cannot convert pointer to non-integral type {}", ty)
            }
            EvalError::Detached => write!(f, "memory target detached"),
        }
    }
}

impl std::error::Error for EvalError {}

pub type Result<T> = std::result::Result<T, EvalError>;

fn type_mismatch(op: &'static str, a: &Value, b: &Value) -> EvalError {
    EvalError::TypeMismatch { op, lhs: a.get_type(), rhs: b.get_type() }
}

fn invalid_operand(op: &'static str, v: &Value) -> EvalError {
    EvalError::InvalidOperandType { op, got: v.get_type() }
}

// Factors out the boilerplate of defining an operator method that is
// native only on a white-listed set of (variant[, variant]) patterns,
// and an error for everything else. Modeled directly on the teacher's
// `operator!` macro in `vm.rs`.
macro_rules! operator {
    (un $name:ident ($opname:expr) { $( $p:pat => $e:expr ),+ $(,)? }) => {
        pub fn $name(&self) -> Result<Value> {
            use Value::*;
            match self {
                $($p => Ok($e)),+,
                v => Err(invalid_operand($opname, v)),
            }
        }
    };

    (bin $name:ident ($opname:expr) { $( $p:pat => $e:expr ),+ $(,)? }) => {
        pub fn $name(&self, other: &Value) -> Result<Value> {
            use Value::*;
            #[allow(unreachable_patterns)]
            match (self, other) {
                $($p => Ok($e)),+,
                (a, b) => Err(type_mismatch($opname, a, b)),
            }
        }
    };
}

impl Value {
    pub fn get_type(&self) -> ValueType {
        match self {
            Value::S8(_) => ValueType::S8,
            Value::U8(_) => ValueType::U8,
            Value::S16(_) => ValueType::S16,
            Value::U16(_) => ValueType::U16,
            Value::S32(_) => ValueType::S32,
            Value::U32(_) => ValueType::U32,
            Value::S64(_) => ValueType::S64,
            Value::U64(_) => ValueType::U64,
            Value::F32(_) => ValueType::F32,
            Value::F64(_) => ValueType::F64,
            Value::Ptr(tag, _) => ValueType::Ptr(Box::new(tag.to_value_type())),
        }
    }

    pub fn zero_for(ty: &ValueType) -> Value {
        use ValueType::*;
        match ty {
            S8 => Value::S8(0),
            U8 => Value::U8(0),
            S16 => Value::S16(0),
            U16 => Value::U16(0),
            S32 => Value::S32(0),
            U32 => Value::U32(0),
            S64 => Value::S64(0),
            U64 => Value::U64(0),
            F32 => Value::F32(0.0),
            F64 => Value::F64(0.0),
            Ptr(inner) => Value::Ptr(
                PtrTag::from_value_type(inner).expect("pointer-to-pointer is not constructible"),
                0,
            ),
        }
    }

    /// Truthiness used for `!`, `&&`, `||`, and scan-hit decisions: any
    /// nonzero numeric value is true. Pointers participate via their
    /// address payload.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::S8(v) => *v != 0,
            Value::U8(v) => *v != 0,
            Value::S16(v) => *v != 0,
            Value::U16(v) => *v != 0,
            Value::S32(v) => *v != 0,
            Value::U32(v) => *v != 0,
            Value::S64(v) => *v != 0,
            Value::U64(v) => *v != 0,
            Value::F32(v) => *v != 0.0,
            Value::F64(v) => *v != 0.0,
            Value::Ptr(_, addr) => *addr != 0,
        }
    }

    /// Bit pattern as an i128-widened integer, used internally by casts
    /// and by the bitwise operators once both operands are known to be
    /// integral. Floats are not representable this way; callers must
    /// check `get_type().is_integer()` first.
    fn as_i128(&self) -> i128 {
        match self {
            Value::S8(v) => *v as i128,
            Value::U8(v) => *v as i128,
            Value::S16(v) => *v as i128,
            Value::U16(v) => *v as i128,
            Value::S32(v) => *v as i128,
            Value::U32(v) => *v as i128,
            Value::S64(v) => *v as i128,
            Value::U64(v) => *v as i128,
            Value::Ptr(_, addr) => *addr as i128,
            Value::F32(_) | Value::F64(_) => unreachable!("as_i128 called on a float Value"),
        }
    }

    fn as_f64(&self) -> f64 {
        match self {
            Value::S8(v) => *v as f64,
            Value::U8(v) => *v as f64,
            Value::S16(v) => *v as f64,
            Value::U16(v) => *v as f64,
            Value::S32(v) => *v as f64,
            Value::U32(v) => *v as f64,
            Value::S64(v) => *v as f64,
            Value::U64(v) => *v as f64,
            Value::F32(v) => *v as f64,
            Value::F64(v) => *v,
            Value::Ptr(_, addr) => *addr as f64,
        }
    }

    /// Casts to each of the ten concrete types, plus a family cast
    /// `cast_to_ptr` for `(T*)` pointer casts. C-style narrowing,
    /// widening, float-to-int truncation, and int-to-float conversion;
    /// `F64 -> U8` of a negative value truncates toward zero then wraps
    /// per Rust's `as` cast rules, matching the spec's "implementation
    /// defined, document and pin" guidance (see the eval tests).
    pub fn cast_to_s8(&self) -> Value {
        Value::S8(if self.get_type().is_float() { self.as_f64() as i8 } else { self.as_i128() as i8 })
    }
    pub fn cast_to_u8(&self) -> Value {
        Value::U8(if self.get_type().is_float() { self.as_f64() as u8 } else { self.as_i128() as u8 })
    }
    pub fn cast_to_s16(&self) -> Value {
        Value::S16(if self.get_type().is_float() { self.as_f64() as i16 } else { self.as_i128() as i16 })
    }
    pub fn cast_to_u16(&self) -> Value {
        Value::U16(if self.get_type().is_float() { self.as_f64() as u16 } else { self.as_i128() as u16 })
    }
    pub fn cast_to_s32(&self) -> Value {
        Value::S32(if self.get_type().is_float() { self.as_f64() as i32 } else { self.as_i128() as i32 })
    }
    pub fn cast_to_u32(&self) -> Value {
        Value::U32(if self.get_type().is_float() { self.as_f64() as u32 } else { self.as_i128() as u32 })
    }
    pub fn cast_to_s64(&self) -> Value {
        Value::S64(if self.get_type().is_float() { self.as_f64() as i64 } else { self.as_i128() as i64 })
    }
    pub fn cast_to_u64(&self) -> Value {
        Value::U64(if self.get_type().is_float() { self.as_f64() as u64 } else { self.as_i128() as u64 })
    }
    pub fn cast_to_f32(&self) -> Value {
        Value::F32(self.as_f64() as f32)
    }
    pub fn cast_to_f64(&self) -> Value {
        Value::F64(self.as_f64())
    }

    /// `<T>PTR` cast: reinterprets an address-width integer (or an
    /// existing pointer) as a pointer to `pointee`. Per §4.A, pointers
    /// participate only in `DEREF` and in casts to/from an integer; this
    /// is the integer -> pointer half.
    pub fn cast_to_ptr(&self, pointee: PtrTag) -> Result<Value> {
        match self {
            Value::Ptr(_, addr) => Ok(Value::Ptr(pointee, *addr)),
            v if v.get_type().is_integer() => Ok(Value::Ptr(pointee, v.as_i128() as u64)),
            v => Err(EvalError::PointerToNonIntegral { ty: v.get_type() }),
        }
    }

    pub fn cast_to(&self, ty: &ValueType) -> Result<Value> {
        use ValueType::*;
        match ty {
            S8 => Ok(self.cast_to_s8()),
            U8 => Ok(self.cast_to_u8()),
            S16 => Ok(self.cast_to_s16()),
            U16 => Ok(self.cast_to_u16()),
            S32 => Ok(self.cast_to_s32()),
            U32 => Ok(self.cast_to_u32()),
            S64 => Ok(self.cast_to_s64()),
            U64 => Ok(self.cast_to_u64()),
            F32 => Ok(self.cast_to_f32()),
            F64 => Ok(self.cast_to_f64()),
            Ptr(inner) => {
                let tag = PtrTag::from_value_type(inner)
                    .ok_or_else(|| EvalError::PointerToNonIntegral { ty: (**inner).clone() })?;
                self.cast_to_ptr(tag)
            }
        }
    }

    /// Converts `src` to `dst`'s type and returns the stored result,
    /// matching §4.A's `assign(dst, src)`.
    pub fn assign(dst_ty: &ValueType, src: &Value) -> Result<Value> {
        src.cast_to(dst_ty)
    }

    // --- promotion ----------------------------------------------------
    //
    // Only S32, U32, S64, U64, and F64 carry native operator kernels
    // (§4.A). Anything narrower is promoted to S32 (unsigned narrow
    // types promote to S32 too, since every unsigned type narrower than
    // 32 bits fits losslessly in S32 -- this matches C's integer
    // promotion rules). F32 promotes to F64.

    /// Promotes a value to the narrowest native-kernel type that can
    /// represent it without loss, per §4.A's "small-type promotion" and
    /// "F32 arithmetic" rules. Called by the evaluator before every
    /// unary/binary op dispatch; never by the cast family, which has
    /// its own exact-width semantics.
    pub fn promote(&self) -> Value {
        match self {
            Value::S8(v) => Value::S32(*v as i32),
            Value::U8(v) => Value::S32(*v as i32),
            Value::S16(v) => Value::S32(*v as i32),
            Value::U16(v) => Value::S32(*v as i32),
            Value::F32(v) => Value::F64(*v as f64),
            other => *other,
        }
    }

    operator! { un neg ("u-") {
        S32(v) => S32(v.wrapping_neg()),
        U32(v) => U32(v.wrapping_neg()),
        S64(v) => S64(v.wrapping_neg()),
        U64(v) => U64(v.wrapping_neg()),
        F64(v) => F64(-v),
    } }

    operator! { un not ("!") {
        S32(v) => S32(if *v == 0 { 1 } else { 0 }),
        U32(v) => S32(if *v == 0 { 1 } else { 0 }),
        S64(v) => S32(if *v == 0 { 1 } else { 0 }),
        U64(v) => S32(if *v == 0 { 1 } else { 0 }),
    } }

    operator! { un compl ("~") {
        S32(v) => S32(!v),
        U32(v) => U32(!v),
        S64(v) => S64(!v),
        U64(v) => U64(!v),
    } }

    operator! { bin add ("+") {
        (S32(a), S32(b)) => S32(a.wrapping_add(*b)),
        (U32(a), U32(b)) => U32(a.wrapping_add(*b)),
        (S64(a), S64(b)) => S64(a.wrapping_add(*b)),
        (U64(a), U64(b)) => U64(a.wrapping_add(*b)),
        (F64(a), F64(b)) => F64(a + b),
    } }

    operator! { bin sub ("-") {
        (S32(a), S32(b)) => S32(a.wrapping_sub(*b)),
        (U32(a), U32(b)) => U32(a.wrapping_sub(*b)),
        (S64(a), S64(b)) => S64(a.wrapping_sub(*b)),
        (U64(a), U64(b)) => U64(a.wrapping_sub(*b)),
        (F64(a), F64(b)) => F64(a - b),
    } }

    operator! { bin mul ("*") {
        (S32(a), S32(b)) => S32(a.wrapping_mul(*b)),
        (U32(a), U32(b)) => U32(a.wrapping_mul(*b)),
        (S64(a), S64(b)) => S64(a.wrapping_mul(*b)),
        (U64(a), U64(b)) => U64(a.wrapping_mul(*b)),
        (F64(a), F64(b)) => F64(a * b),
    } }

    pub fn div(&self, other: &Value) -> Result<Value> {
        use Value::*;
        match (self, other) {
            (S32(_), S32(0)) | (U32(_), U32(0)) | (S64(_), S64(0)) | (U64(_), U64(0)) => {
                Err(EvalError::DivideByZero)
            }
            (S32(a), S32(b)) => Ok(S32(a.wrapping_div(*b))),
            (U32(a), U32(b)) => Ok(U32(a.wrapping_div(*b))),
            (S64(a), S64(b)) => Ok(S64(a.wrapping_div(*b))),
            (U64(a), U64(b)) => Ok(U64(a.wrapping_div(*b))),
            (F64(a), F64(b)) => Ok(F64(a / b)),
            (a, b) => Err(type_mismatch("/", a, b)),
        }
    }

    pub fn modulo(&self, other: &Value) -> Result<Value> {
        use Value::*;
        match (self, other) {
            (S32(_), S32(0)) | (U32(_), U32(0)) | (S64(_), S64(0)) | (U64(_), U64(0)) => {
                Err(EvalError::DivideByZero)
            }
            (S32(a), S32(b)) => Ok(S32(a.wrapping_rem(*b))),
            (U32(a), U32(b)) => Ok(U32(a.wrapping_rem(*b))),
            (S64(a), S64(b)) => Ok(S64(a.wrapping_rem(*b))),
            (U64(a), U64(b)) => Ok(U64(a.wrapping_rem(*b))),
            (a, b) => Err(type_mismatch("%", a, b)),
        }
    }

    operator! { bin bitand ("&") {
        (S32(a), S32(b)) => S32(a & b),
        (U32(a), U32(b)) => U32(a & b),
        (S64(a), S64(b)) => S64(a & b),
        (U64(a), U64(b)) => U64(a & b),
    } }

    operator! { bin bitor ("|") {
        (S32(a), S32(b)) => S32(a | b),
        (U32(a), U32(b)) => U32(a | b),
        (S64(a), S64(b)) => S64(a | b),
        (U64(a), U64(b)) => U64(a | b),
    } }

    operator! { bin bitxor ("^") {
        (S32(a), S32(b)) => S32(a ^ b),
        (U32(a), U32(b)) => U32(a ^ b),
        (S64(a), S64(b)) => S64(a ^ b),
        (U64(a), U64(b)) => U64(a ^ b),
    } }

    // Shift count is not masked: out-of-range counts are implementation
    // defined (§4.A). `wrapping_shl`/`wrapping_shr` mask the count to
    // the operand width on every target Rust runs on, which is one
    // valid implementation-defined choice and, crucially, never panics.
    operator! { bin shl ("<<") {
        (S32(a), S32(b)) => S32(a.wrapping_shl(*b as u32)),
        (U32(a), U32(b)) => U32(a.wrapping_shl(*b)),
        (S64(a), S64(b)) => S64(a.wrapping_shl(*b as u32)),
        (U64(a), U64(b)) => U64(a.wrapping_shl(*b as u32)),
    } }

    operator! { bin shr (">>") {
        (S32(a), S32(b)) => S32(a.wrapping_shr(*b as u32)),
        (U32(a), U32(b)) => U32(a.wrapping_shr(*b)),
        (S64(a), S64(b)) => S64(a.wrapping_shr(*b as u32)),
        (U64(a), U64(b)) => U64(a.wrapping_shr(*b as u32)),
    } }

    fn cmp_as_s32(ord: std::cmp::Ordering, want: fn(std::cmp::Ordering) -> bool) -> Value {
        Value::S32(if want(ord) { 1 } else { 0 })
    }

    /// Comparisons always promote both sides to F64 first (§4.A), then
    /// return S32 in {0, 1}. This is simpler than a native per-type
    /// comparison kernel and matches the spec's own description of how
    /// mixed integer/float equality is defined.
    fn compare(&self, other: &Value, want: fn(std::cmp::Ordering) -> bool) -> Result<Value> {
        if !self.get_type().is_numeric() || !other.get_type().is_numeric() {
            return Err(type_mismatch("<compare>", self, other));
        }
        let (a, b) = (self.as_f64(), other.as_f64());
        match a.partial_cmp(&b) {
            Some(ord) => Ok(Self::cmp_as_s32(ord, want)),
            None => Ok(Value::S32(0)), // NaN: every ordered comparison is false
        }
    }

    pub fn eq(&self, other: &Value) -> Result<Value> {
        self.compare(other, |o| o == std::cmp::Ordering::Equal)
    }
    pub fn neq(&self, other: &Value) -> Result<Value> {
        self.compare(other, |o| o != std::cmp::Ordering::Equal)
    }
    pub fn lt(&self, other: &Value) -> Result<Value> {
        self.compare(other, |o| o == std::cmp::Ordering::Less)
    }
    pub fn gt(&self, other: &Value) -> Result<Value> {
        self.compare(other, |o| o == std::cmp::Ordering::Greater)
    }
    pub fn le(&self, other: &Value) -> Result<Value> {
        self.compare(other, |o| o != std::cmp::Ordering::Greater)
    }
    pub fn ge(&self, other: &Value) -> Result<Value> {
        self.compare(other, |o| o != std::cmp::Ordering::Less)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn promotes_narrow_to_s32() {
        assert_eq!(Value::S8(5).promote(), Value::S32(5));
        assert_eq!(Value::U16(500).promote(), Value::S32(500));
        assert_eq!(Value::F32(1.5).promote(), Value::F64(1.5));
        assert_eq!(Value::S32(5).promote(), Value::S32(5));
    }

    #[test]
    fn small_type_arithmetic_is_an_error() {
        // s8 has no native kernel; callers must promote first.
        assert!(Value::S8(1).add(&Value::S8(2)).is_err());
    }

    #[test]
    fn native_kernels_work() {
        assert_eq!(Value::S32(1).add(&Value::S32(2)).unwrap(), Value::S32(3));
        assert_eq!(Value::F64(1.5).add(&Value::F64(2.0)).unwrap(), Value::F64(3.5));
        assert_eq!(Value::U64(10).sub(&Value::U64(3)).unwrap(), Value::U64(7));
    }

    #[test]
    fn division_by_zero_is_an_error() {
        assert_eq!(Value::S32(1).div(&Value::S32(0)).unwrap_err(), EvalError::DivideByZero);
        assert_eq!(Value::F64(1.0).div(&Value::F64(0.0)).unwrap(), Value::F64(f64::INFINITY));
    }

    #[test]
    fn modulo_matches_truncated_division() {
        assert_eq!(Value::S32(-7).modulo(&Value::S32(2)).unwrap(), Value::S32(-1));
    }

    #[test]
    fn shift_by_zero_is_identity() {
        assert_eq!(Value::S32(5).shl(&Value::S32(0)).unwrap(), Value::S32(5));
        assert_eq!(Value::U32(5).shr(&Value::U32(0)).unwrap(), Value::U32(5));
    }

    #[test]
    fn comparisons_return_s32_zero_or_one() {
        assert_eq!(Value::S32(3).lt(&Value::S32(4)).unwrap(), Value::S32(1));
        assert_eq!(Value::S32(4).lt(&Value::S32(3)).unwrap(), Value::S32(0));
    }

    #[test]
    fn mixed_u64_f64_comparison_promotes_both_to_f64() {
        assert_eq!(Value::U64(u64::MAX).eq(&Value::F64(u64::MAX as f64)).unwrap(), Value::S32(1));
    }

    #[test]
    fn casts_are_c_style() {
        assert_eq!(Value::S32(300).cast_to_s16(), Value::S16(300i32 as i16));
        assert_eq!(Value::S32(-1).cast_to_u32(), Value::U32(u32::MAX));
        assert_eq!(Value::F64(1.9).cast_to_s32(), Value::S32(1));
    }

    // Pinned per the spec's own "implementation-defined, document and
    // pin" guidance: casting a negative f64 to u8 truncates toward zero
    // then wraps via Rust's `as` semantics.
    #[test]
    fn negative_float_to_u8_cast_is_pinned() {
        assert_eq!(Value::F64(-1.0).cast_to_u8(), Value::U8(0));
        assert_eq!(Value::F64(-200.0).cast_to_u8(), Value::U8(0));
    }

    // Pinned per §9's open question: F32 arithmetic promotes to F64 and
    // *stays* F64, matching the documented existing behaviour rather
    // than "fixing" it back to F32.
    #[test]
    fn f32_plus_f32_yields_f64() {
        let a = Value::F32(1.0).promote();
        let b = Value::F32(2.0).promote();
        assert_eq!(a.add(&b).unwrap(), Value::F64(3.0));
    }

    #[test]
    fn pointer_casts_round_trip_through_integer() {
        let addr = Value::U32(0x1000);
        let ptr = addr.cast_to(&ValueType::Ptr(Box::new(ValueType::S32))).unwrap();
        assert_eq!(ptr, Value::Ptr(PtrTag::S32, 0x1000));
        let back = ptr.cast_to(&ValueType::U32).unwrap();
        assert_eq!(back, Value::U32(0x1000));
    }

    #[test]
    fn higher_type_is_commutative_and_monotone() {
        assert_eq!(ValueType::higher_type(&ValueType::S8, &ValueType::S32), ValueType::S32);
        assert_eq!(ValueType::higher_type(&ValueType::S32, &ValueType::S8), ValueType::S32);
        assert_eq!(ValueType::higher_type(&ValueType::F64, &ValueType::U64), ValueType::F64);
    }
}
