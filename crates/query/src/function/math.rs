//! Numeric functions. All arguments are coerced to f64; null in, null out.

use alloc::vec;
use alloc::vec::Vec;
use libm::{ceil, fabs, floor, pow, round, sqrt};
use objql_core::{DataType, Error, Result, Value};

use super::{number, value_arg, Argument, FunctionDef, FunctionHandler, ParamType};
use crate::context::EvalContext;

const ABS: usize = 0;
const ROUND: usize = 1;
const ROUND_TO: usize = 2;
const FLOOR: usize = 3;
const CEIL: usize = 4;
const POW: usize = 5;
const SQRT: usize = 6;

/// `abs`, `round`, `floor`, `ceil`, `pow` and `sqrt`.
pub struct MathFunctions {
    defs: Vec<FunctionDef>,
}

impl Default for MathFunctions {
    fn default() -> Self {
        Self::new()
    }
}

impl MathFunctions {
    pub fn new() -> Self {
        let num = || ParamType::Type(DataType::Float64);
        let unary = |name: &str| FunctionDef::new(name, vec![num()], DataType::Float64);
        Self {
            defs: vec![
                unary("abs"),
                unary("round"),
                FunctionDef::new("round", vec![num(), num()], DataType::Float64),
                unary("floor"),
                unary("ceil"),
                FunctionDef::new("pow", vec![num(), num()], DataType::Float64),
                unary("sqrt"),
            ],
        }
    }
}

impl FunctionHandler for MathFunctions {
    fn id(&self) -> &str {
        "math"
    }

    fn functions(&self) -> &[FunctionDef] {
        &self.defs
    }

    fn call(&self, index: usize, args: &[Argument<'_>], _ctx: &EvalContext<'_>) -> Result<Value> {
        let mut nums = Vec::with_capacity(args.len());
        for i in 0..args.len() {
            match number(&value_arg(args, i))? {
                Some(n) => nums.push(n),
                None => return Ok(Value::Null),
            }
        }
        let x = nums.first().copied().unwrap_or(0.0);
        let y = nums.get(1).copied().unwrap_or(0.0);

        let v = match index {
            ABS => fabs(x),
            ROUND => round(x),
            ROUND_TO => {
                let scale = pow(10.0, floor(y));
                round(x * scale) / scale
            }
            FLOOR => floor(x),
            CEIL => ceil(x),
            POW => pow(x, y),
            SQRT => sqrt(x),
            _ => return Err(Error::function("math", "no such function")),
        };
        Ok(Value::Float64(v))
    }
}
