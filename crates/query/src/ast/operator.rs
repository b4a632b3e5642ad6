//! Arithmetic, comparison and logical operators.

use alloc::boxed::Box;
use core::cmp::Ordering;
use core::fmt;
use objql_core::{DataType, Error, Result, Value};

use super::{Expr, Node};
use crate::context::{EvalContext, InitContext};

/// Compares two values the way every relational operator does.
///
/// Returns `None` when exactly one side is null: such pairs are unequal and
/// never ordered. Numbers compare numerically across widths, strings
/// case-folded when `ignore_case` is set, records of the same type through
/// their ordering capability, values of the same kind by value; anything
/// else falls back to comparing string forms.
pub(crate) fn compare_values(left: &Value, right: &Value, ignore_case: bool) -> Option<Ordering> {
    match (left, right) {
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        (Value::Null, _) | (_, Value::Null) => None,
        (l, r) if l.is_numeric() && r.is_numeric() => Some(l.cmp(r)),
        (Value::String(l), Value::String(r)) if ignore_case => Some(fold_cmp(l, r)),
        (Value::Object(l), Value::Object(r)) => {
            if l.record_type().name() == r.record_type().name() {
                if l.equals(r.as_ref()) {
                    return Some(Ordering::Equal);
                }
                if let Some(ord) = l.compare(r.as_ref()) {
                    return Some(ord);
                }
            }
            Some(text_cmp(left, right, ignore_case))
        }
        (l, r) if core::mem::discriminant(l) == core::mem::discriminant(r) => Some(l.cmp(r)),
        _ => Some(text_cmp(left, right, ignore_case)),
    }
}

fn fold_cmp(l: &str, r: &str) -> Ordering {
    l.chars()
        .flat_map(char::to_lowercase)
        .cmp(r.chars().flat_map(char::to_lowercase))
}

fn text_cmp(left: &Value, right: &Value, ignore_case: bool) -> Ordering {
    let (l, r) = (left.to_text(), right.to_text());
    if ignore_case {
        fold_cmp(&l, &r)
    } else {
        l.cmp(&r)
    }
}

/// Arithmetic operator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl ArithOp {
    fn symbol(self) -> &'static str {
        match self {
            ArithOp::Add => "+",
            ArithOp::Sub => "-",
            ArithOp::Mul => "*",
            ArithOp::Div => "/",
            ArithOp::Mod => "%",
        }
    }
}

/// `left op right`.
///
/// Operands are coerced to `f64`. `+` concatenates string forms when either
/// side is not numeric. Division and remainder by zero yield zero, and a
/// null operand yields null.
#[derive(Debug)]
pub struct Arithmetic {
    op: ArithOp,
    left: Box<Expr>,
    right: Box<Expr>,
}

impl Arithmetic {
    pub fn new(op: ArithOp, left: Expr, right: Expr) -> Self {
        Self {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    #[inline]
    pub fn op(&self) -> ArithOp {
        self.op
    }

    fn apply(&self, l: &Value, r: &Value) -> Result<Value> {
        if l.is_null() || r.is_null() {
            return Ok(Value::Null);
        }
        if self.op == ArithOp::Add && !(l.is_numeric() && r.is_numeric()) {
            let mut s = l.to_text();
            s.push_str(&r.to_text());
            return Ok(Value::String(s));
        }
        let x = operand(l)?;
        let y = operand(r)?;
        let v = match self.op {
            ArithOp::Add => x + y,
            ArithOp::Sub => x - y,
            ArithOp::Mul => x * y,
            ArithOp::Div if y == 0.0 => 0.0,
            ArithOp::Div => x / y,
            ArithOp::Mod if y == 0.0 => 0.0,
            ArithOp::Mod => x % y,
        };
        Ok(Value::Float64(v))
    }
}

fn operand(v: &Value) -> Result<f64> {
    v.to_f64()
        .ok_or_else(|| Error::type_mismatch(DataType::Float64, DataType::of(v)))
}

impl Node for Arithmetic {
    fn evaluate(&self, ctx: &EvalContext<'_>) -> Result<Value> {
        let l = self.left.evaluate(ctx)?;
        let r = self.right.evaluate(ctx)?;
        self.apply(&l, &r).map_err(|e| e.context(alloc::format!("expression {}", self)))
    }

    fn init(&mut self, ctx: &InitContext<'_>) -> Result<()> {
        self.left.init(ctx)?;
        self.right.init(ctx)
    }

    fn expected_type(&self, ctx: &InitContext<'_>) -> DataType {
        if self.op != ArithOp::Add {
            return DataType::Float64;
        }
        let l = self.left.expected_type(ctx);
        let r = self.right.expected_type(ctx);
        match (l.is_numeric(), r.is_numeric()) {
            (true, true) => DataType::Float64,
            _ if l.is_any() || r.is_any() => DataType::Any,
            _ => DataType::String,
        }
    }

    fn is_fixed(&self) -> bool {
        self.left.is_fixed() && self.right.is_fixed()
    }

    fn for_each_child(&self, f: &mut dyn FnMut(&Expr)) {
        f(&self.left);
        f(&self.right);
    }

    fn for_each_child_mut(&mut self, f: &mut dyn FnMut(&mut Expr)) {
        f(&mut self.left);
        f(&mut self.right);
    }
}

impl fmt::Display for Arithmetic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.left, self.op.symbol(), self.right)
    }
}

/// Relational operator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    fn symbol(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }

    /// Applies the operator to a comparison outcome.
    pub(crate) fn test(self, ord: Option<Ordering>) -> bool {
        match (self, ord) {
            (CompareOp::Eq, o) => o == Some(Ordering::Equal),
            (CompareOp::Ne, o) => o != Some(Ordering::Equal),
            (_, None) => false,
            (CompareOp::Lt, Some(o)) => o == Ordering::Less,
            (CompareOp::Le, Some(o)) => o != Ordering::Greater,
            (CompareOp::Gt, Some(o)) => o == Ordering::Greater,
            (CompareOp::Ge, Some(o)) => o != Ordering::Less,
        }
    }
}

/// `left op right`, optionally case-insensitive (rendered `$op`).
#[derive(Debug)]
pub struct Compare {
    op: CompareOp,
    left: Box<Expr>,
    right: Box<Expr>,
    ignore_case: bool,
}

impl Compare {
    pub fn new(op: CompareOp, left: Expr, right: Expr) -> Self {
        Self {
            op,
            left: Box::new(left),
            right: Box::new(right),
            ignore_case: false,
        }
    }

    pub fn ignore_case(mut self) -> Self {
        self.ignore_case = true;
        self
    }

    #[inline]
    pub fn op(&self) -> CompareOp {
        self.op
    }
}

impl Node for Compare {
    fn evaluate(&self, ctx: &EvalContext<'_>) -> Result<Value> {
        self.is_true(ctx).map(Value::Boolean)
    }

    fn is_true(&self, ctx: &EvalContext<'_>) -> Result<bool> {
        let l = self.left.evaluate(ctx)?;
        let r = self.right.evaluate(ctx)?;
        Ok(self.op.test(compare_values(&l, &r, self.ignore_case)))
    }

    fn init(&mut self, ctx: &InitContext<'_>) -> Result<()> {
        self.left.init(ctx)?;
        self.right.init(ctx)
    }

    fn expected_type(&self, _ctx: &InitContext<'_>) -> DataType {
        DataType::Boolean
    }

    fn is_fixed(&self) -> bool {
        self.left.is_fixed() && self.right.is_fixed()
    }

    fn for_each_child(&self, f: &mut dyn FnMut(&Expr)) {
        f(&self.left);
        f(&self.right);
    }

    fn for_each_child_mut(&mut self, f: &mut dyn FnMut(&mut Expr)) {
        f(&mut self.left);
        f(&mut self.right);
    }
}

impl fmt::Display for Compare {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let case = if self.ignore_case { "$" } else { "" };
        write!(f, "{} {}{} {}", self.left, case, self.op.symbol(), self.right)
    }
}

/// `expr IS [NOT] NULL`.
#[derive(Debug)]
pub struct IsNull {
    expr: Box<Expr>,
    negated: bool,
}

impl IsNull {
    pub fn new(expr: Expr, negated: bool) -> Self {
        Self {
            expr: Box::new(expr),
            negated,
        }
    }
}

impl Node for IsNull {
    fn evaluate(&self, ctx: &EvalContext<'_>) -> Result<Value> {
        self.is_true(ctx).map(Value::Boolean)
    }

    fn is_true(&self, ctx: &EvalContext<'_>) -> Result<bool> {
        Ok(self.expr.evaluate(ctx)?.is_null() != self.negated)
    }

    fn init(&mut self, ctx: &InitContext<'_>) -> Result<()> {
        self.expr.init(ctx)
    }

    fn expected_type(&self, _ctx: &InitContext<'_>) -> DataType {
        DataType::Boolean
    }

    fn is_fixed(&self) -> bool {
        self.expr.is_fixed()
    }

    fn for_each_child(&self, f: &mut dyn FnMut(&Expr)) {
        f(&self.expr);
    }

    fn for_each_child_mut(&mut self, f: &mut dyn FnMut(&mut Expr)) {
        f(&mut self.expr);
    }
}

impl fmt::Display for IsNull {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let not = if self.negated { " NOT" } else { "" };
        write!(f, "{} IS{} NULL", self.expr, not)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

/// Short-circuit `AND` / `OR`.
///
/// The right side is skipped once the left side decides the outcome, along
/// with any side effects it would have had.
#[derive(Debug)]
pub struct Logical {
    op: LogicalOp,
    left: Box<Expr>,
    right: Box<Expr>,
}

impl Logical {
    pub fn new(op: LogicalOp, left: Expr, right: Expr) -> Self {
        Self {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    #[inline]
    pub fn op(&self) -> LogicalOp {
        self.op
    }
}

impl Node for Logical {
    fn evaluate(&self, ctx: &EvalContext<'_>) -> Result<Value> {
        self.is_true(ctx).map(Value::Boolean)
    }

    fn is_true(&self, ctx: &EvalContext<'_>) -> Result<bool> {
        let left = self.left.is_true(ctx)?;
        match self.op {
            LogicalOp::And if !left => Ok(false),
            LogicalOp::Or if left => Ok(true),
            _ => self.right.is_true(ctx),
        }
    }

    fn init(&mut self, ctx: &InitContext<'_>) -> Result<()> {
        self.left.init(ctx)?;
        self.right.init(ctx)
    }

    fn expected_type(&self, _ctx: &InitContext<'_>) -> DataType {
        DataType::Boolean
    }

    fn is_fixed(&self) -> bool {
        self.left.is_fixed() && self.right.is_fixed()
    }

    fn for_each_child(&self, f: &mut dyn FnMut(&Expr)) {
        f(&self.left);
        f(&self.right);
    }

    fn for_each_child_mut(&mut self, f: &mut dyn FnMut(&mut Expr)) {
        f(&mut self.left);
        f(&mut self.right);
    }
}

impl fmt::Display for Logical {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self.op {
            LogicalOp::And => "AND",
            LogicalOp::Or => "OR",
        };
        write!(f, "{} {} {}", self.left, op, self.right)
    }
}

/// `NOT expr`.
#[derive(Debug)]
pub struct Not {
    expr: Box<Expr>,
}

impl Not {
    pub fn new(expr: Expr) -> Self {
        Self {
            expr: Box::new(expr),
        }
    }
}

impl Node for Not {
    fn evaluate(&self, ctx: &EvalContext<'_>) -> Result<Value> {
        self.is_true(ctx).map(Value::Boolean)
    }

    fn is_true(&self, ctx: &EvalContext<'_>) -> Result<bool> {
        Ok(!self.expr.is_true(ctx)?)
    }

    fn init(&mut self, ctx: &InitContext<'_>) -> Result<()> {
        self.expr.init(ctx)
    }

    fn expected_type(&self, _ctx: &InitContext<'_>) -> DataType {
        DataType::Boolean
    }

    fn is_fixed(&self) -> bool {
        self.expr.is_fixed()
    }

    fn for_each_child(&self, f: &mut dyn FnMut(&Expr)) {
        f(&self.expr);
    }

    fn for_each_child_mut(&mut self, f: &mut dyn FnMut(&mut Expr)) {
        f(&mut self.expr);
    }
}

impl fmt::Display for Not {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NOT {}", self.expr)
    }
}

/// Unary minus. Integer widths are kept.
#[derive(Debug)]
pub struct Negate {
    expr: Box<Expr>,
}

impl Negate {
    pub fn new(expr: Expr) -> Self {
        Self {
            expr: Box::new(expr),
        }
    }
}

impl Node for Negate {
    fn evaluate(&self, ctx: &EvalContext<'_>) -> Result<Value> {
        match self.expr.evaluate(ctx)? {
            Value::Null => Ok(Value::Null),
            Value::Int32(i) => Ok(Value::Int32(i.wrapping_neg())),
            Value::Int64(i) => Ok(Value::Int64(i.wrapping_neg())),
            Value::Float64(f) => Ok(Value::Float64(-f)),
            other => Err(Error::type_mismatch(DataType::Float64, DataType::of(&other))
                .context(alloc::format!("expression {}", self))),
        }
    }

    fn init(&mut self, ctx: &InitContext<'_>) -> Result<()> {
        self.expr.init(ctx)
    }

    fn expected_type(&self, ctx: &InitContext<'_>) -> DataType {
        self.expr.expected_type(ctx)
    }

    fn is_fixed(&self) -> bool {
        self.expr.is_fixed()
    }

    fn for_each_child(&self, f: &mut dyn FnMut(&Expr)) {
        f(&self.expr);
    }

    fn for_each_child_mut(&mut self, f: &mut dyn FnMut(&mut Expr)) {
        f(&mut self.expr);
    }
}

impl fmt::Display for Negate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "-{}", self.expr)
    }
}
