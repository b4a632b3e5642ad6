//! The expression enum and its builders.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;
use objql_core::{AccessorPath, DataType, Result, Value};

use super::{
    AccessorExpr, ArithOp, Arithmetic, Between, BindVariable, Compare, CompareOp, Constant,
    FunctionCall, InList, IsNull, Like, Logical, LogicalOp, Negate, NewObject, Node, Not,
    SaveValue, SubQuery,
};
use crate::context::{EvalContext, InitContext};
use crate::query::Query;
use crate::scope::{Scope, VariableKind};

/// Expression AST node.
#[derive(Debug)]
pub enum Expr {
    /// Literal value.
    Constant(Constant),
    /// Member path on the current row.
    Accessor(AccessorExpr),
    /// Named or anonymous bind variable.
    Bind(BindVariable),
    /// Save value.
    Save(SaveValue),
    /// `+ - * / %`.
    Arithmetic(Arithmetic),
    /// `= != < > <= >=` and their case-insensitive forms.
    Compare(Compare),
    /// `IS [NOT] NULL`.
    IsNull(IsNull),
    /// `[NOT] BETWEEN`.
    Between(Between),
    /// `[NOT] LIKE`.
    Like(Like),
    /// `[NOT] IN [LIKE] [ALL]`.
    In(InList),
    /// `AND` / `OR`.
    Logical(Logical),
    /// `NOT`.
    Not(Not),
    /// Unary minus.
    Negate(Negate),
    /// Function call.
    Function(FunctionCall),
    /// Nested statement.
    SubQuery(SubQuery),
    /// Constructor expression.
    New(NewObject),
}

impl Expr {
    fn node(&self) -> &dyn Node {
        match self {
            Expr::Constant(n) => n,
            Expr::Accessor(n) => n,
            Expr::Bind(n) => n,
            Expr::Save(n) => n,
            Expr::Arithmetic(n) => n,
            Expr::Compare(n) => n,
            Expr::IsNull(n) => n,
            Expr::Between(n) => n,
            Expr::Like(n) => n,
            Expr::In(n) => n,
            Expr::Logical(n) => n,
            Expr::Not(n) => n,
            Expr::Negate(n) => n,
            Expr::Function(n) => n,
            Expr::SubQuery(n) => n,
            Expr::New(n) => n,
        }
    }

    fn node_mut(&mut self) -> &mut dyn Node {
        match self {
            Expr::Constant(n) => n,
            Expr::Accessor(n) => n,
            Expr::Bind(n) => n,
            Expr::Save(n) => n,
            Expr::Arithmetic(n) => n,
            Expr::Compare(n) => n,
            Expr::IsNull(n) => n,
            Expr::Between(n) => n,
            Expr::Like(n) => n,
            Expr::In(n) => n,
            Expr::Logical(n) => n,
            Expr::Not(n) => n,
            Expr::Negate(n) => n,
            Expr::Function(n) => n,
            Expr::SubQuery(n) => n,
            Expr::New(n) => n,
        }
    }

    /// Evaluates against the current row of `ctx`.
    #[inline]
    pub fn evaluate(&self, ctx: &EvalContext<'_>) -> Result<Value> {
        self.node().evaluate(ctx)
    }

    /// Evaluates as a predicate.
    #[inline]
    pub fn is_true(&self, ctx: &EvalContext<'_>) -> Result<bool> {
        self.node().is_true(ctx)
    }

    /// Resolves this expression and its children.
    #[inline]
    pub fn init(&mut self, ctx: &InitContext<'_>) -> Result<()> {
        self.node_mut().init(ctx)
    }

    #[inline]
    pub fn expected_type(&self, ctx: &InitContext<'_>) -> DataType {
        self.node().expected_type(ctx)
    }

    #[inline]
    pub fn is_fixed(&self) -> bool {
        self.node().is_fixed()
    }

    /// Bind variables and save values referenced anywhere in this tree.
    pub fn variables(&self) -> Vec<(VariableKind, String)> {
        let mut found = Vec::new();
        collect_variables(self, &mut found);
        found
    }

    /// Numbers the anonymous bind variables of this tree in source order,
    /// descending into sub-queries that are not initialized yet.
    pub(crate) fn number_anonymous(&mut self, scope: &Scope) {
        if let Expr::Bind(b) = self {
            b.number(scope);
        }
        self.node_mut()
            .for_each_child_mut(&mut |child| child.number_anonymous(scope));
    }

    /// True for constructor expressions.
    pub fn is_constructor(&self) -> bool {
        matches!(self, Expr::New(_))
    }
}

fn collect_variables(expr: &Expr, found: &mut Vec<(VariableKind, String)>) {
    match expr {
        Expr::Bind(b) => found.push((VariableKind::Bind, String::from(b.resolved_name()))),
        Expr::Save(s) => found.push((VariableKind::Save, String::from(s.name()))),
        _ => {}
    }
    expr.node().for_each_child(&mut |child| collect_variables(child, found));
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self.node(), f)
    }
}

// Builders

impl Expr {
    /// Creates a literal expression, keeping the value's type.
    pub fn constant(value: impl Into<Value>) -> Self {
        Expr::Constant(Constant::new(value.into()))
    }

    /// Creates a numeric literal. Numeric literals are always `Float64`.
    pub fn number(n: impl Into<f64>) -> Self {
        Expr::constant(Value::Float64(n.into()))
    }

    /// Creates a string literal.
    pub fn string(s: impl Into<String>) -> Self {
        Expr::constant(Value::String(s.into()))
    }

    /// Creates a boolean literal.
    pub fn boolean(b: bool) -> Self {
        Expr::constant(Value::Boolean(b))
    }

    /// Creates the null literal.
    pub fn null() -> Self {
        Expr::constant(Value::Null)
    }

    /// Creates a member path on the current row, e.g. `address.city`.
    pub fn accessor(path: &str) -> Result<Self> {
        Ok(Expr::Accessor(AccessorExpr::new(AccessorPath::parse(path)?)))
    }

    /// Creates a named bind variable.
    pub fn bind(name: impl Into<String>) -> Self {
        Expr::Bind(BindVariable::named(name))
    }

    /// Creates a named bind variable followed by a member path.
    pub fn bind_path(name: impl Into<String>, path: &str) -> Result<Self> {
        Ok(Expr::Bind(
            BindVariable::named(name).with_path(AccessorPath::parse(path)?),
        ))
    }

    /// Creates an anonymous (`?`) bind variable.
    pub fn anonymous() -> Self {
        Expr::Bind(BindVariable::anonymous())
    }

    /// Creates a save value reference.
    pub fn save(name: impl Into<String>) -> Self {
        Expr::Save(SaveValue::new(name))
    }

    /// Creates a save value reference followed by a member path.
    pub fn save_path(name: impl Into<String>, path: &str) -> Result<Self> {
        Ok(Expr::Save(
            SaveValue::new(name).with_path(AccessorPath::parse(path)?),
        ))
    }

    pub fn arithmetic(op: ArithOp, left: Expr, right: Expr) -> Self {
        Expr::Arithmetic(Arithmetic::new(op, left, right))
    }

    pub fn add(left: Expr, right: Expr) -> Self {
        Expr::arithmetic(ArithOp::Add, left, right)
    }

    pub fn sub(left: Expr, right: Expr) -> Self {
        Expr::arithmetic(ArithOp::Sub, left, right)
    }

    pub fn mul(left: Expr, right: Expr) -> Self {
        Expr::arithmetic(ArithOp::Mul, left, right)
    }

    pub fn div(left: Expr, right: Expr) -> Self {
        Expr::arithmetic(ArithOp::Div, left, right)
    }

    pub fn rem(left: Expr, right: Expr) -> Self {
        Expr::arithmetic(ArithOp::Mod, left, right)
    }

    /// Creates a comparison.
    pub fn compare(op: CompareOp, left: Expr, right: Expr) -> Self {
        Expr::Compare(Compare::new(op, left, right))
    }

    /// Creates a case-insensitive comparison.
    pub fn compare_ignore_case(op: CompareOp, left: Expr, right: Expr) -> Self {
        Expr::Compare(Compare::new(op, left, right).ignore_case())
    }

    pub fn eq(left: Expr, right: Expr) -> Self {
        Expr::compare(CompareOp::Eq, left, right)
    }

    pub fn ne(left: Expr, right: Expr) -> Self {
        Expr::compare(CompareOp::Ne, left, right)
    }

    pub fn lt(left: Expr, right: Expr) -> Self {
        Expr::compare(CompareOp::Lt, left, right)
    }

    pub fn le(left: Expr, right: Expr) -> Self {
        Expr::compare(CompareOp::Le, left, right)
    }

    pub fn gt(left: Expr, right: Expr) -> Self {
        Expr::compare(CompareOp::Gt, left, right)
    }

    pub fn ge(left: Expr, right: Expr) -> Self {
        Expr::compare(CompareOp::Ge, left, right)
    }

    pub fn is_null(expr: Expr) -> Self {
        Expr::IsNull(IsNull::new(expr, false))
    }

    pub fn is_not_null(expr: Expr) -> Self {
        Expr::IsNull(IsNull::new(expr, true))
    }

    pub fn between(expr: Expr, start: Expr, end: Expr) -> Self {
        Expr::Between(Between::new(expr, start, end))
    }

    pub fn not_between(expr: Expr, start: Expr, end: Expr) -> Self {
        Expr::Between(Between::new(expr, start, end).negated())
    }

    pub fn like(expr: Expr, pattern: Expr) -> Self {
        Expr::Like(Like::new(expr, pattern))
    }

    pub fn not_like(expr: Expr, pattern: Expr) -> Self {
        Expr::Like(Like::new(expr, pattern).negated())
    }

    /// Creates `expr IN (items)`; see [`InList`] for the other forms.
    pub fn in_list(expr: Expr, items: Vec<Expr>) -> Self {
        Expr::In(InList::new(expr, items))
    }

    pub fn not_in_list(expr: Expr, items: Vec<Expr>) -> Self {
        Expr::In(InList::new(expr, items).negated())
    }

    pub fn and(left: Expr, right: Expr) -> Self {
        Expr::Logical(Logical::new(LogicalOp::And, left, right))
    }

    pub fn or(left: Expr, right: Expr) -> Self {
        Expr::Logical(Logical::new(LogicalOp::Or, left, right))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(expr: Expr) -> Self {
        Expr::Not(Not::new(expr))
    }

    pub fn negate(expr: Expr) -> Self {
        Expr::Negate(Negate::new(expr))
    }

    /// Creates a function call.
    pub fn call(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::Function(FunctionCall::new(name, args))
    }

    /// Wraps a nested statement whose FROM clause is a source expression.
    pub fn sub_query(query: Query) -> Self {
        Expr::SubQuery(SubQuery::new(query))
    }

    /// Creates a constructor expression.
    pub fn new_object(type_name: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::New(NewObject::new(type_name, args))
    }
}

macro_rules! impl_from_node {
    ($($node:ident => $variant:ident),* $(,)?) => {
        $(
            impl From<$node> for Expr {
                fn from(node: $node) -> Self {
                    Expr::$variant(node)
                }
            }
        )*
    };
}

impl_from_node!(
    Constant => Constant,
    AccessorExpr => Accessor,
    BindVariable => Bind,
    SaveValue => Save,
    Arithmetic => Arithmetic,
    Compare => Compare,
    IsNull => IsNull,
    Between => Between,
    Like => Like,
    InList => In,
    Logical => Logical,
    Not => Not,
    Negate => Negate,
    FunctionCall => Function,
    SubQuery => SubQuery,
    NewObject => New,
);

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;
    use alloc::vec;

    #[test]
    fn test_display() {
        let e = Expr::and(
            Expr::gt(Expr::accessor("age").unwrap(), Expr::number(30)),
            Expr::like(Expr::accessor("name").unwrap(), Expr::string("A%")),
        );
        assert_eq!(e.to_string(), "age > 30 AND name LIKE 'A%'");

        let e = Expr::compare_ignore_case(CompareOp::Eq, Expr::bind("x"), Expr::save("y"));
        assert_eq!(e.to_string(), ":x $= @y");

        let e = Expr::call("sum", vec![Expr::accessor("v").unwrap()]);
        assert_eq!(e.to_string(), "sum(v)");

        let e = Expr::not_in_list(Expr::number(2), vec![Expr::number(1), Expr::null()]);
        assert_eq!(e.to_string(), "2 NOT IN (1, null)");
    }

    #[test]
    fn test_numeric_literals_are_floats() {
        match Expr::number(3) {
            Expr::Constant(c) => assert_eq!(c.value(), &Value::Float64(3.0)),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_variables_walk_tree() {
        let e = Expr::or(
            Expr::eq(Expr::bind("A"), Expr::number(1)),
            Expr::not(Expr::call("f", vec![Expr::save("s")])),
        );
        let vars = e.variables();
        assert_eq!(
            vars,
            vec![
                (VariableKind::Bind, "a".to_string()),
                (VariableKind::Save, "s".to_string()),
            ]
        );
    }

    #[test]
    fn test_fixed_before_init() {
        assert!(Expr::number(1).is_fixed());
        assert!(Expr::add(Expr::number(1), Expr::string("a")).is_fixed());
        assert!(!Expr::accessor("a").unwrap().is_fixed());
        assert!(!Expr::bind("a").is_fixed());
    }
}
