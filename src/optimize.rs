// Constant-folding optimiser (§4.G).
//
// No direct teacher counterpart -- `vm.rs` has no AST to fold, only a
// bytecode program it executes directly -- but the shape matches the
// rest of the corpus: closed enum, exhaustive match, rebuild the tree
// bottom-up. Built straight from the spec's own post-order-walk
// description.

use crate::ast::Ast;
use crate::eval::evaluate;

/// Post-order walk: optimise children first, rebuild the node, then
/// fold the rebuilt node to a literal if it is constant (§3 invariant
/// 7) and evaluates without error. A constant subtree whose evaluation
/// fails is left untouched -- the optimiser never embeds a fold error
/// into the tree, matching §4.G's correctness property.
pub fn optimize(ast: Ast) -> Ast {
    let rebuilt = match ast {
        Ast::Value(_) | Ast::Var { .. } => ast,
        Ast::Unary { op, child, value_type } => {
            Ast::Unary { op, child: Box::new(optimize(*child)), value_type }
        }
        Ast::Binary { op, left, right, value_type } => Ast::Binary {
            op,
            left: Box::new(optimize(*left)),
            right: Box::new(optimize(*right)),
            value_type,
        },
    };

    if rebuilt.is_constant() {
        if let Ok(value) = evaluate(&rebuilt, None, None) {
            return Ast::Value(value);
        }
    }
    rebuilt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{BinOp, UnOp};
    use crate::value::{EvalError, PtrTag, Value, ValueType};

    fn lit(v: Value) -> Ast {
        Ast::Value(v)
    }

    fn bin(op: BinOp, l: Ast, r: Ast) -> Ast {
        Ast::Binary { op, left: Box::new(l), right: Box::new(r), value_type: ValueType::S32 }
    }

    #[test]
    fn folds_pure_constant_subtree_to_a_single_leaf() {
        let ast = bin(BinOp::Add, lit(Value::S32(1)), bin(BinOp::Mul, lit(Value::S32(2)), lit(Value::S32(3))));
        let folded = optimize(ast);
        assert_eq!(folded, Ast::Value(Value::S32(7)));
    }

    #[test]
    fn leaves_var_subtree_unfolded() {
        let var = Ast::Var { name: "x".into(), value_type: ValueType::S32 };
        let ast = bin(BinOp::Add, var.clone(), lit(Value::S32(1)));
        let folded = optimize(ast.clone());
        assert_eq!(folded, ast);
    }

    #[test]
    fn leaves_deref_subtree_unfolded() {
        let ptr = lit(Value::Ptr(PtrTag::S32, 0x1000));
        let deref = Ast::Unary { op: UnOp::Deref, child: Box::new(ptr), value_type: ValueType::S32 };
        let ast = bin(BinOp::Add, deref.clone(), lit(Value::S32(1)));
        let folded = optimize(ast.clone());
        assert_eq!(folded, ast);
    }

    #[test]
    fn preserves_subtree_on_fold_error_instead_of_embedding_it() {
        let ast = bin(BinOp::Div, lit(Value::S32(1)), lit(Value::S32(0)));
        let folded = optimize(ast.clone());
        assert_eq!(folded, ast);
        assert_eq!(
            crate::eval::evaluate(&folded, None, None).unwrap_err(),
            EvalError::DivideByZero
        );
    }

    #[test]
    fn optimize_is_idempotent() {
        let ast = bin(BinOp::Add, lit(Value::S32(1)), lit(Value::S32(2)));
        let once = optimize(ast);
        let twice = optimize(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn partially_constant_tree_folds_only_the_constant_half() {
        let var = Ast::Var { name: "x".into(), value_type: ValueType::S32 };
        let constant_half = bin(BinOp::Mul, lit(Value::S32(2)), lit(Value::S32(3)));
        let ast = bin(BinOp::Add, var.clone(), constant_half);
        let folded = optimize(ast);
        assert_eq!(folded, bin(BinOp::Add, var, lit(Value::S32(6))));
    }
}
