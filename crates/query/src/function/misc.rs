//! Conversion and container helpers.

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;
use core::cell::RefCell;
use objql_core::{Accessor, AccessorPath, DataType, Error, Result, Value};

use super::{value_arg, Argument, FunctionDef, FunctionHandler, ParamType};
use crate::context::EvalContext;

const TO_STRING: usize = 0;
const TO_NUMBER: usize = 1;
const IF_NULL: usize = 2;
const ACCESSOR: usize = 3;
const SIZE: usize = 4;
const TYPE_OF: usize = 5;
const GET: usize = 6;

/// `to_string`, `to_number`, `if_null`, `accessor`, `size`, `type_of` and
/// `get`.
pub struct MiscFunctions {
    defs: Vec<FunctionDef>,
    /// Accessors built by `accessor(value, path)`, keyed by path text.
    accessors: RefCell<BTreeMap<String, Accessor>>,
}

impl Default for MiscFunctions {
    fn default() -> Self {
        Self::new()
    }
}

impl MiscFunctions {
    pub fn new() -> Self {
        use ParamType::Any;
        Self {
            defs: vec![
                FunctionDef::new("to_string", vec![Any], DataType::String),
                FunctionDef::new("to_number", vec![Any], DataType::Float64),
                FunctionDef::new("if_null", vec![Any, Any], DataType::Any),
                FunctionDef::new("accessor", vec![Any, ParamType::Type(DataType::String)], DataType::Any),
                FunctionDef::new("size", vec![Any], DataType::Int64),
                FunctionDef::new("type_of", vec![Any], DataType::String),
                FunctionDef::new("get", vec![Any, Any], DataType::Any),
            ],
            accessors: RefCell::new(BTreeMap::new()),
        }
    }

    fn access(&self, value: &Value, path: String) -> Result<Value> {
        let mut cache = self.accessors.borrow_mut();
        if !cache.contains_key(&path) {
            let accessor = Accessor::unbound(&AccessorPath::parse(&path)?)?;
            cache.insert(path.clone(), accessor);
        }
        match cache.get(&path) {
            Some(accessor) => accessor.get(value),
            None => Ok(Value::Null),
        }
    }
}

impl FunctionHandler for MiscFunctions {
    fn id(&self) -> &str {
        "misc"
    }

    fn functions(&self) -> &[FunctionDef] {
        &self.defs
    }

    fn call(&self, index: usize, args: &[Argument<'_>], _ctx: &EvalContext<'_>) -> Result<Value> {
        let first = value_arg(args, 0);
        let v = match index {
            TO_STRING if first.is_null() => Value::Null,
            TO_STRING => Value::String(first.to_text()),
            TO_NUMBER => match &first {
                v if v.is_numeric() => Value::Float64(v.to_f64().unwrap_or(0.0)),
                Value::String(s) => s.trim().parse::<f64>().map(Value::Float64).unwrap_or(Value::Null),
                Value::Boolean(b) => Value::Float64(if *b { 1.0 } else { 0.0 }),
                _ => Value::Null,
            },
            IF_NULL if first.is_null() => value_arg(args, 1),
            IF_NULL => first,
            ACCESSOR if first.is_null() => Value::Null,
            ACCESSOR => self.access(&first, value_arg(args, 1).to_text())?,
            SIZE => first.len().map_or(Value::Null, |n| Value::Int64(n as i64)),
            TYPE_OF => Value::String(
                first
                    .data_type()
                    .map_or_else(|| String::from("null"), |t| alloc::format!("{}", t)),
            ),
            GET => {
                let key = value_arg(args, 1);
                match &first {
                    Value::List(items) => key
                        .to_f64()
                        .filter(|i| *i >= 0.0)
                        .and_then(|i| items.get(i as usize))
                        .cloned()
                        .unwrap_or(Value::Null),
                    Value::Map(entries) => entries.get(&key).cloned().unwrap_or(Value::Null),
                    Value::Null => Value::Null,
                    other => {
                        return Err(Error::function(
                            "get",
                            alloc::format!("cannot index into {}", DataType::of(other)),
                        ))
                    }
                }
            }
            _ => return Err(Error::function("misc", "no such function")),
        };
        Ok(v)
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::Expr;
    use crate::testing::eval;
    use alloc::vec;
    use objql_core::{Error, Value};

    fn list() -> Expr {
        Expr::constant(Value::List(vec![Value::Int32(5), Value::Int32(6)]))
    }

    #[test]
    fn test_conversions() {
        let e = Expr::call("to_number", vec![Expr::string(" 2.5 ")]);
        assert_eq!(eval(e).unwrap(), Value::Float64(2.5));
        let e = Expr::call("to_number", vec![Expr::string("two")]);
        assert_eq!(eval(e).unwrap(), Value::Null);
        let e = Expr::call("to_string", vec![Expr::boolean(true)]);
        assert_eq!(eval(e).unwrap(), Value::from("true"));
        let e = Expr::call("if_null", vec![Expr::null(), Expr::string("x")]);
        assert_eq!(eval(e).unwrap(), Value::from("x"));
    }

    #[test]
    fn test_containers() {
        assert_eq!(eval(Expr::call("size", vec![list()])).unwrap(), Value::Int64(2));
        let e = Expr::call("get", vec![list(), Expr::number(1)]);
        assert_eq!(eval(e).unwrap(), Value::Int32(6));
        let e = Expr::call("accessor", vec![list(), Expr::string("[0]")]);
        assert_eq!(eval(e).unwrap(), Value::Int32(5));
        assert_eq!(eval(Expr::call("type_of", vec![list()])).unwrap(), Value::from("List"));
    }

    #[test]
    fn test_get_on_scalar_fails() {
        let err = eval(Expr::call("get", vec![Expr::number(1), Expr::number(0)])).unwrap_err();
        assert!(matches!(err.root(), Error::Function { .. }));
    }
}
