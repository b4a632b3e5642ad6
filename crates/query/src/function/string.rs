//! String functions.
//!
//! Every function converts its first argument with `Value::to_text` and
//! returns null when that argument is null.

use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;
use objql_core::{DataType, Error, Result, Value};

use super::{number, value_arg, Argument, FunctionDef, FunctionHandler, ParamType};
use crate::context::EvalContext;

const LOWER: usize = 0;
const UPPER: usize = 1;
const TRIM: usize = 2;
const LENGTH: usize = 3;
const SUBSTR_FROM: usize = 4;
const SUBSTR: usize = 5;
const REPLACE: usize = 6;
const CONTAINS: usize = 7;
const STARTS_WITH: usize = 8;
const ENDS_WITH: usize = 9;

/// `lower`, `upper`, `trim`, `length`, `substr`, `replace`, `contains`,
/// `starts_with` and `ends_with`.
pub struct StringFunctions {
    defs: Vec<FunctionDef>,
}

impl Default for StringFunctions {
    fn default() -> Self {
        Self::new()
    }
}

impl StringFunctions {
    pub fn new() -> Self {
        let text = || ParamType::Type(DataType::String);
        let num = || ParamType::Type(DataType::Float64);
        Self {
            defs: vec![
                FunctionDef::new("lower", vec![ParamType::Any], DataType::String),
                FunctionDef::new("upper", vec![ParamType::Any], DataType::String),
                FunctionDef::new("trim", vec![ParamType::Any], DataType::String),
                FunctionDef::new("length", vec![ParamType::Any], DataType::Int64),
                FunctionDef::new("substr", vec![ParamType::Any, num()], DataType::String),
                FunctionDef::new("substr", vec![ParamType::Any, num(), num()], DataType::String),
                FunctionDef::new("replace", vec![ParamType::Any, text(), text()], DataType::String),
                FunctionDef::new("contains", vec![ParamType::Any, text()], DataType::Boolean),
                FunctionDef::new("starts_with", vec![ParamType::Any, text()], DataType::Boolean),
                FunctionDef::new("ends_with", vec![ParamType::Any, text()], DataType::Boolean),
            ],
        }
    }
}

impl FunctionHandler for StringFunctions {
    fn id(&self) -> &str {
        "string"
    }

    fn functions(&self) -> &[FunctionDef] {
        &self.defs
    }

    fn call(&self, index: usize, args: &[Argument<'_>], _ctx: &EvalContext<'_>) -> Result<Value> {
        let subject = value_arg(args, 0);
        if subject.is_null() {
            return Ok(Value::Null);
        }
        let s = subject.to_text();
        let arg = |i| value_arg(args, i).to_text();

        let v = match index {
            LOWER => Value::String(s.to_lowercase()),
            UPPER => Value::String(s.to_uppercase()),
            TRIM => Value::String(String::from(s.trim())),
            LENGTH => Value::Int64(s.chars().count() as i64),
            SUBSTR_FROM | SUBSTR => {
                let start = position(&value_arg(args, 1))?;
                let len = if index == SUBSTR {
                    Some(position(&value_arg(args, 2))?)
                } else {
                    None
                };
                let chars = s.chars().skip(start);
                Value::String(match len {
                    Some(n) => chars.take(n).collect(),
                    None => chars.collect(),
                })
            }
            REPLACE => {
                let from = arg(1);
                if from.is_empty() {
                    Value::String(s)
                } else {
                    Value::String(s.replace(&from, &arg(2)))
                }
            }
            CONTAINS => Value::Boolean(s.contains(arg(1).as_str())),
            STARTS_WITH => Value::Boolean(s.starts_with(arg(1).as_str())),
            ENDS_WITH => Value::Boolean(s.ends_with(arg(1).as_str())),
            _ => return Err(Error::function("string", "no such function")),
        };
        Ok(v)
    }
}

/// Non-negative character position; null and negatives count as zero.
fn position(value: &Value) -> Result<usize> {
    Ok(number(value)?.map_or(0, |n| if n > 0.0 { n as usize } else { 0 }))
}

#[cfg(test)]
mod tests {
    use crate::ast::Expr;
    use crate::testing::eval;
    use alloc::vec;
    use objql_core::Value;

    fn call1(name: &str, s: &str) -> Value {
        eval(Expr::call(name, vec![Expr::string(s)])).unwrap()
    }

    #[test]
    fn test_case_and_trim() {
        assert_eq!(call1("lower", "AbC"), Value::from("abc"));
        assert_eq!(call1("upper", "AbC"), Value::from("ABC"));
        assert_eq!(call1("trim", "  x "), Value::from("x"));
        assert_eq!(call1("length", "héllo"), Value::Int64(5));
    }

    #[test]
    fn test_substr() {
        let e = Expr::call("substr", vec![Expr::string("hello"), Expr::number(1), Expr::number(3)]);
        assert_eq!(eval(e).unwrap(), Value::from("ell"));
        let e = Expr::call("substr", vec![Expr::string("hello"), Expr::number(-2)]);
        assert_eq!(eval(e).unwrap(), Value::from("hello"));
    }

    #[test]
    fn test_search_and_replace() {
        let e = Expr::call(
            "replace",
            vec![Expr::string("a-b-c"), Expr::string("-"), Expr::string("+")],
        );
        assert_eq!(eval(e).unwrap(), Value::from("a+b+c"));
        let e = Expr::call("starts_with", vec![Expr::string("objql"), Expr::string("obj")]);
        assert_eq!(eval(e).unwrap(), Value::Boolean(true));
        let e = Expr::call("contains", vec![Expr::null(), Expr::string("a")]);
        assert_eq!(eval(e).unwrap(), Value::Null);
    }
}
