//! Function call node.

use alloc::string::String;
use alloc::vec::Vec;
use core::cell::OnceCell;
use core::fmt;
use objql_core::{DataType, Error, Result, Value};
use tracing::trace;

use super::{Expr, Node};
use crate::context::{EvalContext, InitContext};
use crate::function::{Argument, ParamType, Resolved};

/// `name(arg, ...)`, resolved against the statement's function registry.
///
/// Fixed calls are evaluated once and their result kept for the life of the
/// statement.
#[derive(Debug)]
pub struct FunctionCall {
    name: String,
    args: Vec<Expr>,
    resolved: Option<Resolved>,
    memo: OnceCell<Value>,
}

impl FunctionCall {
    pub fn new(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Self {
            name: name.into(),
            args,
            resolved: None,
            memo: OnceCell::new(),
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn args(&self) -> &[Expr] {
        &self.args
    }

    /// The operation chosen at initialization.
    pub fn resolved(&self) -> Option<&Resolved> {
        self.resolved.as_ref()
    }

    fn invoke(&self, resolved: &Resolved, ctx: &EvalContext<'_>) -> Result<Value> {
        let params = &resolved.def().params;
        let mut args = Vec::with_capacity(self.args.len());
        for (arg, param) in self.args.iter().zip(params) {
            args.push(match param {
                ParamType::Expression => Argument::Expr(arg),
                _ => Argument::Value(arg.evaluate(ctx)?),
            });
        }
        resolved.call(&args, ctx)
    }
}

impl Node for FunctionCall {
    fn evaluate(&self, ctx: &EvalContext<'_>) -> Result<Value> {
        let resolved = self.resolved.as_ref().ok_or_else(|| {
            Error::invalid_statement(alloc::format!("function {} used before initialization", self))
        })?;
        if let Some(v) = self.memo.get() {
            return Ok(v.clone());
        }
        let v = self
            .invoke(resolved, ctx)
            .map_err(|e| e.context(alloc::format!("function {}", self)))?;
        if self.is_fixed() {
            let _ = self.memo.set(v.clone());
        }
        Ok(v)
    }

    fn init(&mut self, ctx: &InitContext<'_>) -> Result<()> {
        for arg in &mut self.args {
            arg.init(ctx)?;
        }
        let types: Vec<DataType> = self.args.iter().map(|a| a.expected_type(ctx)).collect();
        let resolved = ctx.functions().resolve(&self.name, &types).ok_or_else(|| {
            Error::unresolved_function(self.name.as_str(), self.args.len(), alloc::format!("{}", self))
        })?;
        trace!(
            function = %self.name,
            handler = resolved.handler_id(),
            score = resolved.score(),
            "resolved function call"
        );
        self.resolved = Some(resolved);
        self.memo = OnceCell::new();
        Ok(())
    }

    fn expected_type(&self, _ctx: &InitContext<'_>) -> DataType {
        self.resolved
            .as_ref()
            .map_or(DataType::Any, |r| r.def().returns.clone())
    }

    fn is_fixed(&self) -> bool {
        match &self.resolved {
            Some(r) => !r.def().context_dependent && self.args.iter().all(Expr::is_fixed),
            None => false,
        }
    }

    fn for_each_child(&self, f: &mut dyn FnMut(&Expr)) {
        self.args.iter().for_each(|a| f(a));
    }

    fn for_each_child_mut(&mut self, f: &mut dyn FnMut(&mut Expr)) {
        self.args.iter_mut().for_each(|a| f(a));
    }
}

impl fmt::Display for FunctionCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", arg)?;
        }
        f.write_str(")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::{FunctionDef, FunctionHandler};
    use crate::testing::{eval, eval_with};
    use crate::QueryBuilder;
    use alloc::rc::Rc;
    use alloc::vec;
    use core::cell::Cell;

    /// Counts its invocations.
    struct Counter {
        defs: Vec<FunctionDef>,
        calls: Rc<Cell<u32>>,
    }

    impl FunctionHandler for Counter {
        fn id(&self) -> &str {
            "counter"
        }

        fn functions(&self) -> &[FunctionDef] {
            &self.defs
        }

        fn call(&self, _index: usize, args: &[Argument<'_>], _ctx: &EvalContext<'_>) -> Result<Value> {
            self.calls.set(self.calls.get() + 1);
            Ok(args[0].value().cloned().unwrap_or(Value::Null))
        }
    }

    fn counter(calls: Rc<Cell<u32>>) -> Counter {
        Counter {
            defs: vec![FunctionDef::new("echo", vec![ParamType::Any], DataType::Any)],
            calls,
        }
    }

    #[test]
    fn test_fixed_call_is_memoized() {
        let calls = Rc::new(Cell::new(0));
        let rows = vec![Value::Int32(1), Value::Int32(2), Value::Int32(3)];
        let query = QueryBuilder::new()
            .function_handler(counter(calls.clone()))
            .select(vec![Expr::call("echo", vec![Expr::number(5)])])
            .build()
            .unwrap();
        let results = query.execute(&rows).unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_row_dependent_call_runs_per_row() {
        let calls = Rc::new(Cell::new(0));
        let rows = vec![Value::Int32(1), Value::Int32(2)];
        let query = QueryBuilder::new()
            .function_handler(counter(calls.clone()))
            .select(vec![Expr::call("echo", vec![Expr::bind("_currobj")])])
            .build()
            .unwrap();
        query.execute(&rows).unwrap();
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_user_handler_shadows_builtin() {
        struct Lower(Vec<FunctionDef>);
        impl FunctionHandler for Lower {
            fn id(&self) -> &str {
                "shadow"
            }
            fn functions(&self) -> &[FunctionDef] {
                &self.0
            }
            fn call(&self, _: usize, _: &[Argument<'_>], _: &EvalContext<'_>) -> Result<Value> {
                Ok(Value::from("shadowed"))
            }
        }
        let handler = Lower(vec![FunctionDef::new("lower", vec![ParamType::Any], DataType::String)]);
        let v = eval_with(
            QueryBuilder::new().function_handler(handler),
            Expr::call("lower", vec![Expr::string("ABC")]),
        )
        .unwrap();
        assert_eq!(v, Value::from("shadowed"));
    }

    #[test]
    fn test_unresolved_function_names_expression() {
        let err = eval(Expr::call("nope", vec![Expr::number(1)])).unwrap_err();
        match err.root() {
            Error::UnresolvedFunction { name, arity, expression } => {
                assert_eq!(name, "nope");
                assert_eq!(*arity, 1);
                assert_eq!(expression, "nope(1)");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_failure_carries_function_context() {
        let err = eval(Expr::call("get", vec![Expr::number(1), Expr::number(0)])).unwrap_err();
        assert!(alloc::format!("{}", err).contains("function get(1, 0)"));
        assert!(matches!(err.root(), Error::Function { .. }));
    }
}
