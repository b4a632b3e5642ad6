//! Constructor expressions: `new Type(args) {expr -> property, ...}`.

use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;
use objql_core::{DataType, Error, RecordFactory, Result, Value};
use tracing::trace;

use super::{Expr, Node};
use crate::context::{EvalContext, InitContext};
use crate::function::{score, ParamType};

/// Builds a record through a registered factory.
///
/// The constructor is chosen at initialization by scoring the argument
/// types against every constructor signature, the same way function calls
/// are resolved. Setters run after construction, in declaration order.
pub struct NewObject {
    type_name: String,
    args: Vec<Expr>,
    setters: Vec<(Expr, String)>,
    factory: Option<Rc<dyn RecordFactory>>,
    constructor: usize,
}

impl NewObject {
    pub fn new(type_name: impl Into<String>, args: Vec<Expr>) -> Self {
        Self {
            type_name: type_name.into(),
            args,
            setters: Vec::new(),
            factory: None,
            constructor: 0,
        }
    }

    /// Adds a post-construction assignment of `expr` to `property`.
    pub fn with_setter(mut self, expr: Expr, property: impl Into<String>) -> Self {
        self.setters.push((expr, property.into()));
        self
    }

    #[inline]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    fn unresolved(&self) -> Error {
        Error::unresolved_constructor(self.type_name.as_str(), alloc::format!("{}", self))
    }

    fn build(&self, factory: &Rc<dyn RecordFactory>, ctx: &EvalContext<'_>) -> Result<Value> {
        let signature = factory
            .constructors()
            .get(self.constructor)
            .ok_or_else(|| self.unresolved())?;
        let mut values = Vec::with_capacity(self.args.len());
        for (arg, ty) in self.args.iter().zip(signature) {
            values.push(coerce(arg.evaluate(ctx)?, ty, &self.type_name)?);
        }
        let mut record = factory.construct(self.constructor, values)?;
        for (expr, property) in &self.setters {
            let value = expr.evaluate(ctx)?;
            record
                .set(property, value)
                .map_err(|e| e.context(alloc::format!("setting {} from {}", property, expr)))?;
        }
        Ok(Value::Object(record.into_record()))
    }
}

/// Converts numbers to the declared numeric width; other values pass through.
/// A number an integer parameter cannot hold exactly is a construction error.
fn coerce(value: Value, target: &DataType, type_name: &str) -> Result<Value> {
    if !value.is_numeric() {
        return Ok(value);
    }
    let whole = match &value {
        Value::Int32(i) => Some(i64::from(*i)),
        Value::Int64(i) => Some(*i),
        other => other.to_f64().and_then(whole_number),
    };
    let coerced = match target {
        DataType::Int32 => whole.and_then(|i| i32::try_from(i).ok()).map(Value::Int32),
        DataType::Int64 => whole.map(Value::Int64),
        DataType::Float64 => value.to_f64().map(Value::Float64),
        _ => return Ok(value),
    };
    coerced.ok_or_else(|| {
        Error::construction(type_name, alloc::format!("{} does not fit {}", value, target))
    })
}

fn whole_number(f: f64) -> Option<i64> {
    // [-2^63, 2^63)
    if !f.is_finite() || f < -9_223_372_036_854_775_808.0 || f >= 9_223_372_036_854_775_808.0 {
        return None;
    }
    let i = f as i64;
    (i as f64 == f).then_some(i)
}

impl Node for NewObject {
    fn evaluate(&self, ctx: &EvalContext<'_>) -> Result<Value> {
        let factory = self.factory.as_ref().ok_or_else(|| self.unresolved())?;
        self.build(factory, ctx)
            .map_err(|e| e.context(alloc::format!("constructor {}", self)))
    }

    fn init(&mut self, ctx: &InitContext<'_>) -> Result<()> {
        for arg in &mut self.args {
            arg.init(ctx)?;
        }
        for (expr, _) in &mut self.setters {
            expr.init(ctx)?;
        }
        let factory = ctx
            .types()
            .factory(&self.type_name)
            .cloned()
            .ok_or_else(|| self.unresolved())?;
        let types: Vec<DataType> = self.args.iter().map(|a| a.expected_type(ctx)).collect();

        let mut best: Option<(usize, u32)> = None;
        for (index, signature) in factory.constructors().iter().enumerate() {
            if signature.len() != types.len() {
                continue;
            }
            if types.is_empty() {
                best = Some((index, 0));
                break;
            }
            let params: Vec<ParamType> = signature.iter().cloned().map(ParamType::Type).collect();
            if let Some(s) = score(&params, &types) {
                if best.map_or(true, |(_, b)| s > b) {
                    best = Some((index, s));
                }
            }
        }
        let (constructor, s) = best.ok_or_else(|| self.unresolved())?;
        trace!(type_name = %self.type_name, constructor, score = s, "resolved constructor");
        self.constructor = constructor;
        self.factory = Some(factory);
        Ok(())
    }

    fn expected_type(&self, _ctx: &InitContext<'_>) -> DataType {
        DataType::record(self.type_name.as_str())
    }

    fn is_fixed(&self) -> bool {
        false
    }

    fn for_each_child(&self, f: &mut dyn FnMut(&Expr)) {
        self.args.iter().for_each(|a| f(a));
        self.setters.iter().for_each(|(e, _)| f(e));
    }

    fn for_each_child_mut(&mut self, f: &mut dyn FnMut(&mut Expr)) {
        self.args.iter_mut().for_each(|a| f(a));
        self.setters.iter_mut().for_each(|(e, _)| f(e));
    }
}

impl fmt::Debug for NewObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewObject")
            .field("type_name", &self.type_name)
            .field("args", &self.args)
            .field("setters", &self.setters)
            .field("constructor", &self.constructor)
            .finish()
    }
}

impl fmt::Display for NewObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "new {}(", self.type_name)?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", arg)?;
        }
        f.write_str(")")?;
        if !self.setters.is_empty() {
            f.write_str(" {")?;
            for (i, (expr, property)) in self.setters.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{} -> {}", expr, property)?;
            }
            f.write_str("}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::eval_with;
    use crate::QueryBuilder;
    use alloc::string::ToString;
    use alloc::vec;
    use objql_core::{DynamicRecordFactory, RecordType};

    fn point_factory() -> Rc<dyn RecordFactory> {
        let ty = Rc::new(
            RecordType::new("Point")
                .with_field("x", DataType::Int64)
                .with_field("y", DataType::Int64)
                .with_field("label", DataType::String),
        );
        Rc::new(
            DynamicRecordFactory::new(ty)
                .with_constructor(&["x", "y"])
                .unwrap()
                .with_constructor(&["label"])
                .unwrap(),
        )
    }

    fn builder() -> QueryBuilder {
        QueryBuilder::new().record_factory(point_factory())
    }

    fn member(v: &Value, name: &str) -> Value {
        v.as_record().and_then(|r| r.get(name)).unwrap_or(Value::Null)
    }

    #[test]
    fn test_scoring_picks_matching_constructor() {
        let e = NewObject::new("Point", vec![Expr::number(1), Expr::number(2)]);
        let v = eval_with(builder(), e.into()).unwrap();
        assert_eq!(member(&v, "x"), Value::Int64(1));
        assert_eq!(member(&v, "y"), Value::Int64(2));

        let e = NewObject::new("Point", vec![Expr::string("origin")]);
        let v = eval_with(builder(), e.into()).unwrap();
        assert_eq!(member(&v, "label"), Value::from("origin"));
    }

    #[test]
    fn test_inexact_integer_argument_is_rejected() {
        let e = NewObject::new("Point", vec![Expr::number(1.5), Expr::number(2)]);
        let err = eval_with(builder(), e.into()).unwrap_err();
        assert!(matches!(err.root(), Error::Construction { .. }));

        let e = NewObject::new("Point", vec![Expr::number(1e19), Expr::number(2)]);
        let err = eval_with(builder(), e.into()).unwrap_err();
        assert!(matches!(err.root(), Error::Construction { .. }));

        let e = NewObject::new("Point", vec![Expr::number(-3.0), Expr::number(2)]);
        let v = eval_with(builder(), e.into()).unwrap();
        assert_eq!(member(&v, "x"), Value::Int64(-3));
    }

    #[test]
    fn test_setters_run_after_construction() {
        let e = NewObject::new("Point", vec![]).with_setter(Expr::string("p"), "label");
        assert_eq!(e.to_string(), "new Point() {'p' -> label}");
        let v = eval_with(builder(), e.into()).unwrap();
        assert_eq!(member(&v, "label"), Value::from("p"));
        assert_eq!(member(&v, "x"), Value::Null);
    }

    #[test]
    fn test_unknown_type_or_signature() {
        let err = eval_with(builder(), Expr::new_object("Nope", vec![])).unwrap_err();
        assert!(matches!(err.root(), Error::UnresolvedConstructor { .. }));

        let args = vec![Expr::boolean(true), Expr::boolean(false), Expr::boolean(true)];
        let err = eval_with(builder(), Expr::new_object("Point", args)).unwrap_err();
        assert!(matches!(err.root(), Error::UnresolvedConstructor { .. }));
    }

    #[test]
    fn test_bad_setter_is_construction_error() {
        let e = NewObject::new("Point", vec![]).with_setter(Expr::number(1), "missing");
        let err = eval_with(builder(), e.into()).unwrap_err();
        assert!(err.to_string().contains("constructor new Point()"));
        assert!(matches!(err.root(), Error::UnresolvedMember { .. }));
    }
}
