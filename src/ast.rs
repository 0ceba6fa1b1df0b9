// The typed abstract syntax tree (§3, §4.E).
//
// A single tagged node type with variant-specific payloads, shaped
// after the teacher's closed `enum Expr`/`BinOp`/`UnOp` (owned tree,
// `Box`/`Rc`-held children, no class hierarchy) -- but every payload
// here is this engine's own: each node carries its resolved
// `ValueType` alongside the operation, so every traversal (`evaluate`,
// `optimize`, `snprint`) is a closed match with no "unknown type" case
// left to handle at runtime.

use std::fmt;

use crate::value::{Value, ValueType};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnOp {
    Neg,
    Not,
    Compl,
    Cast,
    Deref,
}

impl UnOp {
    /// Textual form used by the RPN printer; negation prints as `u-`
    /// per §6 so it's never confused with the binary `-`.
    fn rpn_text(&self) -> &'static str {
        match self {
            UnOp::Neg => "u-",
            UnOp::Not => "!",
            UnOp::Compl => "~",
            UnOp::Cast => unreachable!("cast nodes print via their own snprint arm"),
            UnOp::Deref => "*",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    And,
    Xor,
    Or,
    Shl,
    Shr,
    Eq,
    Neq,
    Lt,
    Gt,
    Le,
    Ge,
    AndCond,
    OrCond,
}

impl BinOp {
    fn rpn_text(&self) -> &'static str {
        match self {
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

    fn infix_text(&self) -> &'static str {
        self.rpn_text()
    }
}

/// A fully-typed expression node. Every variant carries `value_type`
/// inline rather than through a side-table, so a consumer never has to
/// ask "what's the type of this subtree" via a separate pass.
#[derive(Clone, Debug, PartialEq)]
pub enum Ast {
    /// An immediate literal.
    Value(Value),
    /// A read of a bound symbol, identified by name (resolved against
    /// the `SymbolTable` at evaluation time). `value_type` is fixed at
    /// parse time from the symbol's declared type.
    Var { name: String, value_type: ValueType },
    Unary { op: UnOp, child: Box<Ast>, value_type: ValueType },
    Binary { op: BinOp, left: Box<Ast>, right: Box<Ast>, value_type: ValueType },
}

impl Ast {
    pub fn value_type(&self) -> ValueType {
        match self {
            Ast::Value(v) => v.get_type(),
            Ast::Var { value_type, .. } => value_type.clone(),
            Ast::Unary { value_type, .. } => value_type.clone(),
            Ast::Binary { value_type, .. } => value_type.clone(),
        }
    }

    /// True iff the subtree contains no `Var` and no `Deref` -- the
    /// exact definition of "constant" from §3 invariant 7, and the
    /// gate the optimiser uses to decide whether a node can be folded.
    pub fn is_constant(&self) -> bool {
        match self {
            Ast::Value(_) => true,
            Ast::Var { .. } => false,
            Ast::Unary { op: UnOp::Deref, .. } => false,
            Ast::Unary { child, .. } => child.is_constant(),
            Ast::Binary { left, right, .. } => left.is_constant() && right.is_constant(),
        }
    }

    /// Reverse-Polish diagnostic form (§4.E, §6): the canonical,
    /// stable textual pinning of an AST's shape. Binary nodes print
    /// `<left> <right> <op>`, unary nodes `<child> <op>`, and casts
    /// print `<child> (<type>)`.
    pub fn snprint(&self) -> String {
        match self {
            Ast::Value(v) => format!("({}){}", v.get_type(), print_number(v)),
            Ast::Var { name, .. } => name.clone(),
            Ast::Unary { op: UnOp::Cast, child, value_type } => {
                format!("{} ({})", child.snprint(), value_type)
            }
            Ast::Unary { op, child, .. } => format!("{} {}", child.snprint(), op.rpn_text()),
            Ast::Binary { op, left, right, .. } => {
                format!("{} {} {}", left.snprint(), right.snprint(), op.rpn_text())
            }
        }
    }

    /// Human-facing infix form, used by `explain`; not canonical for
    /// test-pinning (the RPN form is), but easier for a person to read
    /// back. Always fully parenthesises to avoid needing the parser's
    /// own precedence table here.
    pub fn infix_print(&self) -> String {
        match self {
            Ast::Value(v) => format!("({}){}", v.get_type(), print_number(v)),
            Ast::Var { name, .. } => name.clone(),
            Ast::Unary { op: UnOp::Cast, child, value_type } => {
                format!("({}){}", value_type, child.infix_print())
            }
            Ast::Unary { op: UnOp::Deref, child, .. } => format!("*{}", child.infix_print()),
            Ast::Unary { op, child, .. } => format!("{}{}", op.rpn_text(), child.infix_print()),
            Ast::Binary { op, left, right, .. } => {
                format!("({} {} {})", left.infix_print(), op.infix_text(), right.infix_print())
            }
        }
    }
}

fn print_number(v: &Value) -> String {
    match v {
        Value::S8(n) => n.to_string(),
        Value::U8(n) => n.to_string(),
        Value::S16(n) => n.to_string(),
        Value::U16(n) => n.to_string(),
        Value::S32(n) => n.to_string(),
        Value::U32(n) => n.to_string(),
        Value::S64(n) => n.to_string(),
        Value::U64(n) => n.to_string(),
        Value::F32(n) => n.to_string(),
        Value::F64(n) => n.to_string(),
        Value::Ptr(_, addr) => format!("0x{:x}", addr),
    }
}

impl fmt::Display for Ast {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.snprint())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_literal_is_constant() {
        let ast = Ast::Value(Value::S32(7));
        assert!(ast.is_constant());
    }

    #[test]
    fn var_node_is_not_constant() {
        let ast = Ast::Var { name: "x".into(), value_type: ValueType::S32 };
        assert!(!ast.is_constant());
    }

    #[test]
    fn deref_node_is_not_constant_even_with_constant_child() {
        let ast = Ast::Unary {
            op: UnOp::Deref,
            child: Box::new(Ast::Value(Value::Ptr(crate::value::PtrTag::S32, 0x1000))),
            value_type: ValueType::S32,
        };
        assert!(!ast.is_constant());
    }

    #[test]
    fn snprint_matches_rpn_shape() {
        let ast = Ast::Binary {
            op: BinOp::Add,
            left: Box::new(Ast::Value(Value::S32(1))),
            right: Box::new(Ast::Binary {
                op: BinOp::Mul,
                left: Box::new(Ast::Value(Value::S32(2))),
                right: Box::new(Ast::Value(Value::S32(3))),
                value_type: ValueType::S32,
            }),
            value_type: ValueType::S32,
        };
        assert_eq!(ast.snprint(), "(s32)1 (s32)2 (s32)3 * +");
    }

    #[test]
    fn cast_snprint_form() {
        let ast = Ast::Unary {
            op: UnOp::Cast,
            child: Box::new(Ast::Value(Value::S32(300))),
            value_type: ValueType::S16,
        };
        assert_eq!(ast.snprint(), "(s32)300 (s16)");
    }

    #[test]
    fn negation_prints_as_u_minus() {
        let ast = Ast::Unary {
            op: UnOp::Neg,
            child: Box::new(Ast::Value(Value::S32(5))),
            value_type: ValueType::S32,
        };
        assert_eq!(ast.snprint(), "(s32)5 u-");
    }

    #[test]
    fn infix_print_is_fully_parenthesised() {
        let ast = Ast::Binary {
            op: BinOp::Add,
            left: Box::new(Ast::Value(Value::S32(1))),
            right: Box::new(Ast::Value(Value::S32(2))),
            value_type: ValueType::S32,
        };
        assert_eq!(ast.infix_print(), "((s32)1 + (s32)2)");
    }
}
