//! Function handlers and overload resolution.
//!
//! A call is resolved once, at initialization, against every registered
//! [`FunctionHandler`]: user handlers first, then the built-in ones. Each
//! operation with a matching name and arity is scored with [`score`]; the
//! highest total wins and ties go to the handler registered first.

mod grouping;
mod math;
mod misc;
mod string;

pub use grouping::GroupingFunctions;
pub use math::MathFunctions;
pub use misc::MiscFunctions;
pub use string::StringFunctions;

use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;
use objql_core::{DataType, Error, Result, Value};
use tracing::trace;

use crate::ast::Expr;
use crate::context::EvalContext;

/// Declared type of a function parameter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParamType {
    /// Accepts any value.
    Any,
    /// Accepts values of a given type.
    Type(DataType),
    /// Receives the unevaluated argument expression.
    Expression,
}

/// One operation exposed by a handler.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FunctionDef {
    pub name: String,
    pub params: Vec<ParamType>,
    pub returns: DataType,
    /// Never fixed, even with fixed arguments (aggregates over the row-set).
    pub context_dependent: bool,
}

impl FunctionDef {
    pub fn new(name: impl Into<String>, params: Vec<ParamType>, returns: DataType) -> Self {
        Self {
            name: name.into(),
            params,
            returns,
            context_dependent: false,
        }
    }

    /// Marks the operation as depending on the evaluation context.
    pub fn context_dependent(mut self) -> Self {
        self.context_dependent = true;
        self
    }

    #[inline]
    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

/// An argument passed to a handler.
#[derive(Clone, Debug)]
pub enum Argument<'a> {
    /// The evaluated argument.
    Value(Value),
    /// The raw expression, for [`ParamType::Expression`] parameters.
    Expr(&'a Expr),
}

impl<'a> Argument<'a> {
    pub fn value(&self) -> Option<&Value> {
        match self {
            Argument::Value(v) => Some(v),
            Argument::Expr(_) => None,
        }
    }

    pub fn expr(&self) -> Option<&'a Expr> {
        match self {
            Argument::Expr(e) => Some(e),
            Argument::Value(_) => None,
        }
    }
}

/// An object exposing named operations to statements.
pub trait FunctionHandler {
    /// Stable identifier of this handler.
    fn id(&self) -> &str;

    /// Operations, addressed by position in [`FunctionHandler::call`].
    fn functions(&self) -> &[FunctionDef];

    /// Invokes operation `index`.
    fn call(&self, index: usize, args: &[Argument<'_>], ctx: &EvalContext<'_>) -> Result<Value>;
}

/// Scores how well `args` fit `params`.
///
/// Per parameter: +1 for [`ParamType::Any`], +2 when the argument type is
/// assignable to the parameter type, +1 for [`ParamType::Expression`], +1
/// when both are numeric, +1 when both are primitive, +1 when the argument
/// type is only known at run time. A parameter scoring zero rejects the
/// candidate. Returns `None` on arity mismatch.
pub fn score(params: &[ParamType], args: &[DataType]) -> Option<u32> {
    if params.len() != args.len() {
        return None;
    }
    let mut total = 0;
    for (param, arg) in params.iter().zip(args) {
        let mut s = 0;
        match param {
            ParamType::Any => s += 1,
            ParamType::Expression => s += 1,
            ParamType::Type(t) => {
                if *t == *arg || t.is_any() {
                    s += 2;
                }
                if t.is_numeric() && arg.is_numeric() {
                    s += 1;
                }
                if t.is_primitive() && arg.is_primitive() {
                    s += 1;
                }
            }
        }
        if arg.is_any() {
            s += 1;
        }
        if s == 0 {
            return None;
        }
        total += s;
    }
    Some(total)
}

/// The outcome of resolution: a handler and one of its operations.
#[derive(Clone)]
pub struct Resolved {
    handler: Rc<dyn FunctionHandler>,
    index: usize,
    score: u32,
}

impl Resolved {
    /// Declaration of the chosen operation.
    pub fn def(&self) -> &FunctionDef {
        &self.handler.functions()[self.index]
    }

    #[inline]
    pub fn handler_id(&self) -> &str {
        self.handler.id()
    }

    #[inline]
    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn call(&self, args: &[Argument<'_>], ctx: &EvalContext<'_>) -> Result<Value> {
        self.handler.call(self.index, args, ctx)
    }
}

impl fmt::Debug for Resolved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolved")
            .field("handler", &self.handler.id())
            .field("function", &self.def().name)
            .field("score", &self.score)
            .finish()
    }
}

/// Handlers visible to one statement.
#[derive(Clone)]
pub struct FunctionRegistry {
    user: Vec<Rc<dyn FunctionHandler>>,
    builtin: Vec<Rc<dyn FunctionHandler>>,
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FunctionRegistry {
    /// Creates a registry holding fresh instances of the built-in handlers.
    pub fn new() -> Self {
        Self {
            user: Vec::new(),
            builtin: alloc::vec![
                Rc::new(GroupingFunctions::new()) as Rc<dyn FunctionHandler>,
                Rc::new(StringFunctions::new()),
                Rc::new(MathFunctions::new()),
                Rc::new(MiscFunctions::new()),
            ],
        }
    }

    /// Creates a registry with no handlers at all.
    pub fn empty() -> Self {
        Self {
            user: Vec::new(),
            builtin: Vec::new(),
        }
    }

    /// Registers a user handler. User handlers are consulted before the
    /// built-in ones, in registration order.
    pub fn register(&mut self, handler: Rc<dyn FunctionHandler>) {
        self.user.push(handler);
    }

    /// Appends `parent`'s user handlers after this registry's own, skipping
    /// handlers already present.
    pub fn inherit(&mut self, parent: &FunctionRegistry) {
        for handler in &parent.user {
            if !self.user.iter().any(|h| Rc::ptr_eq(h, handler)) {
                self.user.push(handler.clone());
            }
        }
    }

    /// All handlers in resolution order.
    pub fn handlers(&self) -> impl Iterator<Item = &Rc<dyn FunctionHandler>> {
        self.user.iter().chain(self.builtin.iter())
    }

    /// Picks the best operation named `name` for arguments of `args` types.
    pub fn resolve(&self, name: &str, args: &[DataType]) -> Option<Resolved> {
        let mut best: Option<Resolved> = None;
        for handler in self.handlers() {
            for (index, def) in handler.functions().iter().enumerate() {
                if !def.name.eq_ignore_ascii_case(name) || def.arity() != args.len() {
                    continue;
                }
                if args.is_empty() {
                    trace!(function = name, handler = handler.id(), "resolved zero-arity call");
                    return Some(Resolved {
                        handler: handler.clone(),
                        index,
                        score: 0,
                    });
                }
                let Some(s) = score(&def.params, args) else {
                    continue;
                };
                if best.as_ref().map_or(true, |b| s > b.score) {
                    best = Some(Resolved {
                        handler: handler.clone(),
                        index,
                        score: s,
                    });
                }
            }
        }
        if let Some(r) = &best {
            trace!(function = name, handler = r.handler_id(), score = r.score, "resolved call");
        }
        best
    }
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.handlers().map(|h| h.id()))
            .finish()
    }
}

// Argument helpers shared by the built-in handlers.

/// Value of argument `i`, `Null` if absent or an expression.
pub(crate) fn value_arg(args: &[Argument<'_>], i: usize) -> Value {
    args.get(i)
        .and_then(Argument::value)
        .cloned()
        .unwrap_or(Value::Null)
}

/// Expression of argument `i`.
pub(crate) fn expr_arg<'e>(args: &[Argument<'e>], i: usize, function: &str) -> Result<&'e Expr> {
    args.get(i)
        .and_then(Argument::expr)
        .ok_or_else(|| Error::function(function, alloc::format!("argument {} must be an expression", i + 1)))
}

/// Numeric argument; `None` for null, an error for anything non-numeric.
pub(crate) fn number(value: &Value) -> Result<Option<f64>> {
    if value.is_null() {
        return Ok(None);
    }
    value
        .to_f64()
        .map(Some)
        .ok_or_else(|| Error::type_mismatch(DataType::Float64, DataType::of(value)))
}
