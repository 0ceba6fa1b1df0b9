// Hand-written recursive-descent parser, 13-level precedence (§4.D).
//
// The teacher's own `parser.rs` is two lines of test module pointed at
// a generated `lalrpop` grammar that isn't part of this tree; there is
// no grammar to adapt. This is built directly from the precedence table
// in the design notes, following the teacher's general code layout --
// one free function per precedence level, `Result`-returning,
// `?`-propagating, no `unsafe` anywhere.

use std::fmt;

use crate::ast::{Ast, BinOp, UnOp};
use crate::lexer::{LexError, Lexer, Token};
use crate::symtab::SymbolTable;
use crate::value::{Value, ValueType};

#[derive(Clone, Debug, PartialEq)]
pub enum ParseError {
    Lex(LexError),
    UnexpectedToken { expected: &'static str, found: String },
    MissingRParen,
    UnknownIdentifier(String),
    InvalidOperandType { op: &'static str, ty: ValueType },
    NotAPointer { ty: ValueType },
    Int64Disabled,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ParseError::Lex(e) => write!(f, "{}", e),
            ParseError::UnexpectedToken { expected, found } => {
                write!(f, "expected {}, found '{}'", expected, found)
            }
            ParseError::MissingRParen => write!(f, "missing closing ')'"),
            ParseError::UnknownIdentifier(name) => write!(f, "unknown identifier '{}'", name),
            ParseError::InvalidOperandType { op, ty } => {
                write!(f, "operator '{}' is not defined for type {}", op, ty)
            }
            ParseError::NotAPointer { ty } => {
                write!(f, "cannot dereference non-pointer type {}", ty)
            }
            ParseError::Int64Disabled => {
                write!(f, "64-bit integer literals and casts are disabled in this build")
            }
        }
    }
}

impl std::error::Error for ParseError {}

impl From<LexError> for ParseError {
    fn from(e: LexError) -> Self {
        ParseError::Lex(e)
    }
}

pub type Result<T> = std::result::Result<T, ParseError>;

/// Returns whether the build accepts s64/u64 syntax. A `const fn` over
/// `cfg!` so the check reads the same everywhere it's needed, rather
/// than repeating the `cfg!(feature = "int64")` literal at each call
/// site (§9's 64-bit toggle decision).
const fn int64_enabled() -> bool {
    cfg!(feature = "int64")
}

pub struct Parser<'a> {
    lexer: Lexer<'a>,
    lookahead: Token<'a>,
    symbols: Option<&'a SymbolTable<'a>>,
}

impl<'a> Parser<'a> {
    pub fn new(src: &'a str, symbols: Option<&'a SymbolTable<'a>>) -> Result<Self> {
        let mut lexer = Lexer::new(src);
        let lookahead = lexer.next()?;
        Ok(Parser { lexer, lookahead, symbols })
    }

    fn bump(&mut self) -> Result<Token<'a>> {
        let tok = self.lookahead.clone();
        self.lookahead = self.lexer.next()?;
        Ok(tok)
    }

    fn expect(&mut self, want: &Token, expected: &'static str) -> Result<()> {
        if &self.lookahead == want {
            self.bump()?;
            Ok(())
        } else {
            Err(ParseError::UnexpectedToken { expected, found: self.lookahead.to_string() })
        }
    }

    /// Like `expect(&Token::RParen, ...)`, but reports the specific
    /// "unclosed paren" failure rather than the generic unexpected-token
    /// shape, since a dangling `(` is the single most common typo.
    fn expect_rparen(&mut self) -> Result<()> {
        if self.lookahead == Token::RParen {
            self.bump()?;
            Ok(())
        } else {
            Err(ParseError::MissingRParen)
        }
    }

    /// Parses a complete expression; fails if trailing tokens remain.
    pub fn parse(&mut self) -> Result<Ast> {
        let ast = self.parse_logic_or()?;
        if self.lookahead != Token::Eof {
            return Err(ParseError::UnexpectedToken {
                expected: "end of expression",
                found: self.lookahead.to_string(),
            });
        }
        Ok(ast)
    }

    // level 1: || &&  (left, S32)
    fn parse_logic_or(&mut self) -> Result<Ast> {
        let mut left = self.parse_bitor()?;
        loop {
            let op = match self.lookahead {
                Token::PipePipe => BinOp::OrCond,
                Token::AmpAmp => BinOp::AndCond,
                _ => break,
            };
            self.bump()?;
            let right = self.parse_bitor()?;
            numeric_operand(op_text(op), &left)?;
            numeric_operand(op_text(op), &right)?;
            left = Ast::Binary { op, left: Box::new(left), right: Box::new(right), value_type: ValueType::S32 };
        }
        Ok(left)
    }

    // level 2: |
    fn parse_bitor(&mut self) -> Result<Ast> {
        let mut left = self.parse_bitxor()?;
        while self.lookahead == Token::Pipe {
            self.bump()?;
            let right = self.parse_bitxor()?;
            left = self.build_int_binary(BinOp::Or, "|", left, right)?;
        }
        Ok(left)
    }

    // level 3: ^
    fn parse_bitxor(&mut self) -> Result<Ast> {
        let mut left = self.parse_bitand()?;
        while self.lookahead == Token::Caret {
            self.bump()?;
            let right = self.parse_bitand()?;
            left = self.build_int_binary(BinOp::Xor, "^", left, right)?;
        }
        Ok(left)
    }

    // level 4: &
    fn parse_bitand(&mut self) -> Result<Ast> {
        let mut left = self.parse_equality()?;
        while self.lookahead == Token::Amp {
            self.bump()?;
            let right = self.parse_equality()?;
            left = self.build_int_binary(BinOp::And, "&", left, right)?;
        }
        Ok(left)
    }

    // level 5: == !=  (non-assoc, S32)
    fn parse_equality(&mut self) -> Result<Ast> {
        let left = self.parse_relational()?;
        let op = match self.lookahead {
            Token::Eq => BinOp::Eq,
            Token::Neq => BinOp::Neq,
            _ => return Ok(left),
        };
        self.bump()?;
        let right = self.parse_relational()?;
        numeric_operand(op_text(op), &left)?;
        numeric_operand(op_text(op), &right)?;
        Ok(Ast::Binary { op, left: Box::new(left), right: Box::new(right), value_type: ValueType::S32 })
    }

    // level 6: < > <= >=  (non-assoc, S32)
    fn parse_relational(&mut self) -> Result<Ast> {
        let left = self.parse_shift()?;
        let op = match self.lookahead {
            Token::Lt => BinOp::Lt,
            Token::Gt => BinOp::Gt,
            Token::Le => BinOp::Le,
            Token::Ge => BinOp::Ge,
            _ => return Ok(left),
        };
        self.bump()?;
        let right = self.parse_shift()?;
        numeric_operand(op_text(op), &left)?;
        numeric_operand(op_text(op), &right)?;
        Ok(Ast::Binary { op, left: Box::new(left), right: Box::new(right), value_type: ValueType::S32 })
    }

    // level 7: << >>  (left, type of left, int only)
    fn parse_shift(&mut self) -> Result<Ast> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.lookahead {
                Token::Shl => BinOp::Shl,
                Token::Shr => BinOp::Shr,
                _ => break,
            };
            self.bump()?;
            let right = self.parse_additive()?;
            integer_operand(op_text(op), &left)?;
            integer_operand(op_text(op), &right)?;
            let ty = left.value_type();
            left = Ast::Binary { op, left: Box::new(left), right: Box::new(right), value_type: ty };
        }
        Ok(left)
    }

    // level 8: + -  (left, UAC numeric)
    fn parse_additive(&mut self) -> Result<Ast> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.lookahead {
                Token::Plus => BinOp::Add,
                Token::Minus => BinOp::Sub,
                _ => break,
            };
            self.bump()?;
            let right = self.parse_multiplicative()?;
            left = self.build_numeric_binary(op, op_text(op), left, right)?;
        }
        Ok(left)
    }

    // level 9: * / %  (left, UAC; % int only)
    fn parse_multiplicative(&mut self) -> Result<Ast> {
        let mut left = self.parse_cast()?;
        loop {
            let op = match self.lookahead {
                Token::Star => BinOp::Mul,
                Token::Slash => BinOp::Div,
                Token::Percent => BinOp::Mod,
                _ => break,
            };
            self.bump()?;
            let right = self.parse_cast()?;
            left = if op == BinOp::Mod {
                self.build_int_binary(op, "%", left, right)?
            } else {
                self.build_numeric_binary(op, op_text(op), left, right)?
            };
        }
        Ok(left)
    }

    // level 10: (type)expr / (type*)expr
    fn parse_cast(&mut self) -> Result<Ast> {
        if self.lookahead == Token::LParen {
            if let Some((ty, is_ptr)) = self.peek_cast_type()? {
                self.bump()?; // (
                self.bump()?; // type name
                if is_ptr {
                    self.bump()?; // *
                }
                self.expect_rparen()?;
                let child = self.parse_cast()?;
                let target = if is_ptr { ValueType::Ptr(Box::new(ty)) } else { ty };
                return Ok(Ast::Unary { op: UnOp::Cast, child: Box::new(child), value_type: target });
            }
        }
        self.parse_unary()
    }

    /// Looks past `(` to decide whether this opens a cast or a
    /// parenthesised expression, per §4.D's cast-disambiguation rule:
    /// `(` IDENT `)` , optionally `(` IDENT `*` `)`, where IDENT names a
    /// known type, commits to a cast. `self.lexer` is already positioned
    /// just past `self.lookahead` (the `(`), so cloning it (cheap: a
    /// `&str` and a `usize`) gives an independent two-token lookahead
    /// without disturbing the parser's own single-token discipline.
    fn peek_cast_type(&self) -> Result<Option<(ValueType, bool)>> {
        let mut probe = self.lexer;
        let type_tok = probe.next()?;
        let name = match type_tok {
            Token::TypeName(name) => name,
            _ => return Ok(None),
        };
        let base = ValueType::from_keyword(name).expect("lexer only emits known type keywords");
        if is_64_bit(&base) && !int64_enabled() {
            return Err(ParseError::Int64Disabled);
        }
        let after_type = probe.next()?;
        let is_ptr = after_type == Token::Star;
        let rparen_tok = if is_ptr { probe.next()? } else { after_type };
        if rparen_tok == Token::RParen {
            Ok(Some((base, is_ptr)))
        } else {
            Ok(None)
        }
    }

    // level 11: unary + - ! ~ *
    fn parse_unary(&mut self) -> Result<Ast> {
        let op = match self.lookahead {
            Token::Plus => None, // unary + is a no-op, still requires a numeric operand
            Token::Minus => Some(UnOp::Neg),
            Token::Bang => Some(UnOp::Not),
            Token::Tilde => Some(UnOp::Compl),
            Token::Star => Some(UnOp::Deref),
            _ => return self.parse_factor(),
        };

        let unary_plus = self.lookahead == Token::Plus;
        self.bump()?;
        let child = self.parse_unary()?;

        if unary_plus {
            numeric_operand("+", &child)?;
            return Ok(child);
        }

        let op = op.unwrap();
        match op {
            UnOp::Neg => {
                numeric_operand("u-", &child)?;
                let ty = promoted_type(&child.value_type());
                Ok(Ast::Unary { op, child: Box::new(child), value_type: ty })
            }
            UnOp::Not => {
                integer_operand("!", &child)?;
                Ok(Ast::Unary { op, child: Box::new(child), value_type: ValueType::S32 })
            }
            UnOp::Compl => {
                integer_operand("~", &child)?;
                let ty = promoted_type(&child.value_type());
                Ok(Ast::Unary { op, child: Box::new(child), value_type: ty })
            }
            UnOp::Deref => match child.value_type() {
                ValueType::Ptr(inner) => {
                    Ok(Ast::Unary { op, child: Box::new(child), value_type: *inner })
                }
                other => Err(ParseError::NotAPointer { ty: other }),
            },
            UnOp::Cast => unreachable!("cast handled in parse_cast"),
        }
    }

    // level 12: literal | identifier | ( expr )
    fn parse_factor(&mut self) -> Result<Ast> {
        match self.bump()? {
            Token::IntLit(v, forced_unsigned) => {
                let value = int_literal_value(v, forced_unsigned);
                if is_64_bit(&value.get_type()) && !int64_enabled() {
                    return Err(ParseError::Int64Disabled);
                }
                Ok(Ast::Value(value))
            }
            Token::FloatLit(v) => Ok(Ast::Value(Value::F64(v))),
            Token::Ident(name) => self.resolve_identifier(name),
            Token::LParen => {
                let inner = self.parse_logic_or()?;
                self.expect_rparen()?;
                Ok(inner)
            }
            other => Err(ParseError::UnexpectedToken { expected: "an expression", found: other.to_string() }),
        }
    }

    fn resolve_identifier(&self, name: &str) -> Result<Ast> {
        let table = self
            .symbols
            .ok_or_else(|| ParseError::UnknownIdentifier(name.to_string()))?;
        let ty = table
            .get_type(name)
            .ok_or_else(|| ParseError::UnknownIdentifier(name.to_string()))?;
        Ok(Ast::Var { name: name.to_string(), value_type: ty })
    }

    fn build_numeric_binary(&self, op: BinOp, text: &'static str, left: Ast, right: Ast) -> Result<Ast> {
        numeric_operand(text, &left)?;
        numeric_operand(text, &right)?;
        let ty = ValueType::higher_type(&promoted_type(&left.value_type()), &promoted_type(&right.value_type()));
        Ok(Ast::Binary { op, left: Box::new(left), right: Box::new(right), value_type: ty })
    }

    fn build_int_binary(&self, op: BinOp, text: &'static str, left: Ast, right: Ast) -> Result<Ast> {
        integer_operand(text, &left)?;
        integer_operand(text, &right)?;
        let ty = ValueType::higher_type(&promoted_type(&left.value_type()), &promoted_type(&right.value_type()));
        Ok(Ast::Binary { op, left: Box::new(left), right: Box::new(right), value_type: ty })
    }
}

fn promoted_type(ty: &ValueType) -> ValueType {
    match ty {
        ValueType::S8 | ValueType::U8 | ValueType::S16 | ValueType::U16 => ValueType::S32,
        ValueType::F32 => ValueType::F64,
        other => other.clone(),
    }
}

fn numeric_operand(op: &'static str, ast: &Ast) -> Result<()> {
    let ty = ast.value_type();
    if ty.is_numeric() {
        Ok(())
    } else {
        Err(ParseError::InvalidOperandType { op, ty })
    }
}

fn integer_operand(op: &'static str, ast: &Ast) -> Result<()> {
    let ty = ast.value_type();
    if ty.is_integer() {
        Ok(())
    } else {
        Err(ParseError::InvalidOperandType { op, ty })
    }
}

fn is_64_bit(ty: &ValueType) -> bool {
    matches!(ty, ValueType::S64 | ValueType::U64)
}

fn op_text(op: BinOp) -> &'static str {
    match op {
        BinOp::Add => "+",
        BinOp::Sub => "-",
        BinOp::Mul => "*",
        BinOp::Div => "/",
        BinOp::Mod => "%",
        BinOp::And => "&",
        BinOp::Xor => "^",
        BinOp::Or => "|",
        BinOp::Shl => "<<",
        BinOp::Shr => ">>",
        BinOp::Eq => "==",
        BinOp::Neq => "!=",
        BinOp::Lt => "<",
        BinOp::Gt => ">",
        BinOp::Le => "<=",
        BinOp::Ge => ">=",
        BinOp::AndCond => "&&",
        BinOp::OrCond => "||",
    }
}

/// Integer literals are typeless until context resolves them. A plain
/// literal fits `S32` if in range, else widens to `U32`/`S64`/`U64` in
/// turn, matching the lexer's UINTEGER-on-overflow behaviour from §4.C.
/// A `u`/`U` suffix forces the UINTEGER family regardless of whether
/// the magnitude itself would otherwise fit a signed width.
fn int_literal_value(v: u64, forced_unsigned: bool) -> Value {
    if forced_unsigned {
        return match u32::try_from(v) {
            Ok(n) => Value::U32(n),
            Err(_) => Value::U64(v),
        };
    }
    if let Ok(n) = i32::try_from(v) {
        Value::S32(n)
    } else if let Ok(n) = u32::try_from(v) {
        Value::U32(n)
    } else if let Ok(n) = i64::try_from(v) {
        Value::S64(n)
    } else {
        Value::U64(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn parse(src: &str) -> Result<Ast> {
        Parser::new(src, None)?.parse()
    }

    #[test]
    fn parses_terms() {
        assert_eq!(parse("42").unwrap(), Ast::Value(Value::S32(42)));
        assert_eq!(parse("42.0").unwrap(), Ast::Value(Value::F64(42.0)));
        assert_eq!(parse("(42)").unwrap(), Ast::Value(Value::S32(42)));
    }

    #[test]
    fn parses_precedence_scenario_1() {
        let ast = parse("1 + 2 * 3").unwrap();
        assert_eq!(ast.snprint(), "(s32)1 (s32)2 (s32)3 * +");
    }

    #[test]
    fn parses_pointer_cast_and_deref() {
        let ast = parse("*(s32*)addr_lit").unwrap_err();
        // addr_lit is unbound without a symbol table
        assert_eq!(ast, ParseError::UnknownIdentifier("addr_lit".into()));
    }

    #[test]
    fn parses_cast_then_compare_scenario_2() {
        let ast = parse("(u32)-1 > 0").unwrap();
        assert_eq!(ast.value_type(), ValueType::S32);
    }

    #[test]
    fn caret_on_float_is_a_parse_error() {
        let err = parse("1.5 ^ 2").unwrap_err();
        assert!(matches!(err, ParseError::InvalidOperandType { op: "^", .. }));
    }

    #[test]
    fn bang_on_float_is_a_parse_error() {
        let err = parse("!1.5").unwrap_err();
        assert!(matches!(err, ParseError::InvalidOperandType { op: "!", .. }));
    }

    #[test]
    fn missing_rparen_is_an_error() {
        let err = parse("(1 + 2").unwrap_err();
        assert_eq!(err, ParseError::MissingRParen);
    }

    #[test]
    fn unknown_identifier_without_table_is_an_error() {
        let err = parse("foo").unwrap_err();
        assert_eq!(err, ParseError::UnknownIdentifier("foo".into()));
    }

    #[test]
    fn identifier_resolves_against_symbol_table() {
        let cell = Cell::new(Value::S32(42));
        let mut table = SymbolTable::new();
        table.define("value", ValueType::S32, &cell).unwrap();
        let ast = Parser::new("value == 42", Some(&table)).unwrap().parse().unwrap();
        assert_eq!(ast.snprint(), "value (s32)42 ==");
    }

    #[test]
    fn scenario_5_short_circuit_and_with_bindings() {
        let value_cell = Cell::new(Value::S32(42));
        let addr_cell = Cell::new(Value::U32(0x1000));
        let mut table = SymbolTable::new();
        table.define("value", ValueType::S32, &value_cell).unwrap();
        table.define("addr", ValueType::U32, &addr_cell).unwrap();
        let ast = Parser::new("value == 42 && (addr & 0x3) == 0", Some(&table))
            .unwrap()
            .parse()
            .unwrap();
        let result = crate::eval::evaluate(&ast, Some(&table), None).unwrap();
        assert_eq!(result, Value::S32(1));
    }

    #[test]
    fn shift_is_left_operand_typed() {
        let ast = parse("(s64)1 << 2").unwrap();
        assert_eq!(ast.value_type(), ValueType::S64);
    }

    #[test]
    fn hex_literal_parses_to_the_same_value_as_decimal() {
        assert_eq!(parse("0xFF").unwrap(), Ast::Value(Value::S32(255)));
    }

    #[test]
    fn octal_literal_parses_to_the_same_value_as_decimal() {
        assert_eq!(parse("010").unwrap(), Ast::Value(Value::S32(8)));
    }

    #[test]
    fn u_suffix_forces_unsigned_even_within_s32_range() {
        assert_eq!(parse("5u").unwrap(), Ast::Value(Value::U32(5)));
    }

    #[test]
    fn u64_literal_exceeding_s64_range_parses_as_u64() {
        let ast = parse("18446744073709551615").unwrap();
        assert_eq!(ast, Ast::Value(Value::U64(u64::MAX)));
    }
}
