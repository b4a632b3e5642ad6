//! Expression model.
//!
//! Statements are trees of [`Expr`] nodes. Every node kind implements
//! [`Node`]: it can be initialized (resolved) against an [`InitContext`],
//! evaluated to a value or a truth value against an [`EvalContext`], report
//! the type it is expected to produce and whether its result is fixed, that
//! is the same for every row.
//!
//! Lifecycle: nodes are built uninitialized, `init` walks the children and
//! resolves accessors, functions and constructors, after which the node is
//! evaluable for the life of its statement.

mod call;
mod construct;
mod expr;
mod operand;
mod operator;
mod predicate;
mod subquery;

pub use call::FunctionCall;
pub use construct::NewObject;
pub use expr::Expr;
pub use operand::{AccessorExpr, BindVariable, Constant, SaveValue};
pub use operator::{ArithOp, Arithmetic, Compare, CompareOp, IsNull, Logical, LogicalOp, Negate, Not};
pub use predicate::{Between, InList, Like};
pub use subquery::SubQuery;

use core::fmt;
use objql_core::{DataType, Result, Value};

use crate::context::{EvalContext, InitContext};

/// Contract shared by every expression node.
pub trait Node: fmt::Display {
    /// Evaluates against the current row of `ctx`.
    fn evaluate(&self, ctx: &EvalContext<'_>) -> Result<Value>;

    /// Evaluates as a predicate: null is false, booleans are themselves,
    /// numbers are true above zero, anything else is true.
    fn is_true(&self, ctx: &EvalContext<'_>) -> Result<bool> {
        Ok(self.evaluate(ctx)?.is_truthy())
    }

    /// Resolves the node and its children.
    fn init(&mut self, ctx: &InitContext<'_>) -> Result<()>;

    /// Type the node is expected to produce, `Any` if only known at run time.
    fn expected_type(&self, ctx: &InitContext<'_>) -> DataType;

    /// True if the result is the same for every row.
    fn is_fixed(&self) -> bool;

    /// Visits direct child expressions.
    fn for_each_child(&self, _f: &mut dyn FnMut(&Expr)) {}

    /// Visits direct child expressions mutably, in source order.
    fn for_each_child_mut(&mut self, _f: &mut dyn FnMut(&mut Expr)) {}
}
