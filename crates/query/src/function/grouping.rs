//! Aggregate functions over the current row-set.
//!
//! Every aggregate receives its operand as a raw expression and evaluates it
//! against each row of the current row-set: the group's rows under GROUP BY,
//! the filtered rows otherwise. A trailing string argument names a save
//! value: the first evaluation stores its result there and later evaluations
//! return the stored value.

use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;
use libm::sqrt;
use objql_core::{DataType, Error, Result, Value};

use super::{expr_arg, number, value_arg, Argument, FunctionDef, FunctionHandler, ParamType};
use crate::ast::Expr;
use crate::context::EvalContext;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Aggregate {
    Count,
    Sum,
    Avg,
    Min,
    Max,
    StdDev,
    Concat,
}

impl Aggregate {
    fn name(self) -> &'static str {
        match self {
            Aggregate::Count => "count",
            Aggregate::Sum => "sum",
            Aggregate::Avg => "avg",
            Aggregate::Min => "min",
            Aggregate::Max => "max",
            Aggregate::StdDev => "stddev",
            Aggregate::Concat => "concat",
        }
    }

    fn returns(self) -> DataType {
        match self {
            Aggregate::Count => DataType::Int64,
            Aggregate::Sum | Aggregate::Avg | Aggregate::StdDev => DataType::Float64,
            Aggregate::Min | Aggregate::Max => DataType::Any,
            Aggregate::Concat => DataType::String,
        }
    }
}

/// One declared operation.
#[derive(Clone, Copy, Debug)]
struct Variant {
    aggregate: Aggregate,
    /// Whether the operand is given (`count()` has none).
    operand: bool,
    separator: bool,
    save: bool,
}

/// `count`, `sum`, `avg`, `min`, `max`, `stddev` and `concat`.
pub struct GroupingFunctions {
    defs: Vec<FunctionDef>,
    variants: Vec<Variant>,
}

impl Default for GroupingFunctions {
    fn default() -> Self {
        Self::new()
    }
}

impl GroupingFunctions {
    pub fn new() -> Self {
        let mut variants = vec![Variant {
            aggregate: Aggregate::Count,
            operand: false,
            separator: false,
            save: false,
        }];
        for aggregate in [
            Aggregate::Count,
            Aggregate::Sum,
            Aggregate::Avg,
            Aggregate::Min,
            Aggregate::Max,
            Aggregate::StdDev,
            Aggregate::Concat,
        ] {
            let separator = aggregate == Aggregate::Concat;
            for save in [false, true] {
                variants.push(Variant {
                    aggregate,
                    operand: true,
                    separator,
                    save,
                });
            }
        }

        let defs = variants
            .iter()
            .map(|v| {
                let mut params = Vec::new();
                if v.operand {
                    params.push(ParamType::Expression);
                }
                if v.separator {
                    params.push(ParamType::Type(DataType::String));
                }
                if v.save {
                    params.push(ParamType::Type(DataType::String));
                }
                FunctionDef::new(v.aggregate.name(), params, v.aggregate.returns()).context_dependent()
            })
            .collect();

        Self { defs, variants }
    }
}

impl FunctionHandler for GroupingFunctions {
    fn id(&self) -> &str {
        "grouping"
    }

    fn functions(&self) -> &[FunctionDef] {
        &self.defs
    }

    fn call(&self, index: usize, args: &[Argument<'_>], ctx: &EvalContext<'_>) -> Result<Value> {
        let variant = self
            .variants
            .get(index)
            .copied()
            .ok_or_else(|| Error::function("grouping", "no such function"))?;
        let name = variant.aggregate.name();

        let save_name = if variant.save {
            let name = value_arg(args, args.len() - 1).to_text();
            if let Some(saved) = ctx.scope().save_value(&name) {
                return Ok(saved);
            }
            Some(name)
        } else {
            None
        };

        let result = if variant.operand {
            let expr = expr_arg(args, 0, name)?;
            let values = operand_values(expr, ctx)?;
            match variant.aggregate {
                Aggregate::Count => Value::Int64(values.len() as i64),
                Aggregate::Sum => Value::Float64(numbers(name, &values)?.iter().sum()),
                Aggregate::Avg => {
                    let nums = numbers(name, &values)?;
                    if nums.is_empty() {
                        Value::Null
                    } else {
                        Value::Float64(nums.iter().sum::<f64>() / nums.len() as f64)
                    }
                }
                Aggregate::Min => values.into_iter().min().unwrap_or(Value::Null),
                Aggregate::Max => values.into_iter().max().unwrap_or(Value::Null),
                Aggregate::StdDev => std_dev(&numbers(name, &values)?),
                Aggregate::Concat => {
                    let sep = value_arg(args, 1).to_text();
                    let parts: Vec<String> = values.iter().map(Value::to_text).collect();
                    Value::String(parts.join(&sep))
                }
            }
        } else {
            Value::Int64(ctx.rows().len() as i64)
        };

        if let Some(save_name) = save_name {
            ctx.scope().set_save_value(&save_name, result.clone());
        }
        Ok(result)
    }
}

/// Non-null results of `expr` over the current row-set.
fn operand_values(expr: &Expr, ctx: &EvalContext<'_>) -> Result<Vec<Value>> {
    let mut values = Vec::with_capacity(ctx.rows().len());
    for row in ctx.rows() {
        let v = expr.evaluate(&ctx.with_row(row))?;
        if !v.is_null() {
            values.push(v);
        }
    }
    Ok(values)
}

fn numbers(function: &str, values: &[Value]) -> Result<Vec<f64>> {
    values
        .iter()
        .map(|v| {
            number(v)
                .map(|n| n.unwrap_or(0.0))
                .map_err(|e| e.context(alloc::format!("{}({})", function, v.to_text())))
        })
        .collect()
}

// Population standard deviation.
fn std_dev(values: &[f64]) -> Value {
    if values.is_empty() {
        return Value::Null;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let variance = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / values.len() as f64;
    Value::Float64(sqrt(variance))
}

#[cfg(test)]
mod tests {
    use crate::ast::Expr;
    use crate::QueryBuilder;
    use alloc::vec;
    use alloc::vec::Vec;
    use objql_core::{Error, Value};

    fn me() -> Expr {
        Expr::bind("_currobj")
    }

    // Evaluates `columns` over `rows` and returns the first result tuple.
    fn aggregate(columns: Vec<Expr>, rows: &[Value]) -> Vec<Value> {
        let query = QueryBuilder::new()
            .where_(Expr::is_not_null(me()))
            .select(columns)
            .build()
            .unwrap();
        let results = query.execute(rows).unwrap();
        results.rows()[0].as_list().unwrap().to_vec()
    }

    fn ints(ns: &[i32]) -> Vec<Value> {
        ns.iter().map(|n| Value::Int32(*n)).collect()
    }

    #[test]
    fn test_aggregates_over_filtered_rows() {
        let mut rows = ints(&[3, 1, 4]);
        rows.push(Value::Null);
        let out = aggregate(
            vec![
                Expr::call("count", vec![]),
                Expr::call("sum", vec![me()]),
                Expr::call("avg", vec![me()]),
                Expr::call("min", vec![me()]),
                Expr::call("max", vec![me()]),
            ],
            &rows,
        );
        assert_eq!(
            out,
            vec![
                Value::Int64(3),
                Value::Float64(8.0),
                Value::Float64(8.0 / 3.0),
                Value::Int32(1),
                Value::Int32(4),
            ]
        );
    }

    #[test]
    fn test_stddev_and_concat() {
        let out = aggregate(
            vec![
                Expr::call("stddev", vec![me()]),
                Expr::call("concat", vec![me(), Expr::string("-")]),
            ],
            &ints(&[2, 4, 4, 4, 5, 5, 7, 9]),
        );
        assert_eq!(out[0], Value::Float64(2.0));
        assert_eq!(out[1], Value::from("2-4-4-4-5-5-7-9"));
    }

    #[test]
    fn test_save_name_memoizes() {
        let query = QueryBuilder::new()
            .select(vec![Expr::call("sum", vec![me(), Expr::string("Total")])])
            .build()
            .unwrap();
        let results = query.execute(&ints(&[1, 2])).unwrap();
        assert_eq!(results.save_value("total"), Some(&Value::Float64(3.0)));

        // the stored value wins until it is cleared
        let again = query.execute(&ints(&[10])).unwrap();
        assert_eq!(again.rows()[0], Value::List(vec![Value::Float64(3.0)]));
    }

    #[test]
    fn test_non_numeric_sum_fails() {
        let query = QueryBuilder::new()
            .select(vec![Expr::call("sum", vec![me()])])
            .build()
            .unwrap();
        let err = query.execute(&[Value::from("x")]).unwrap_err();
        assert!(matches!(err.root(), Error::TypeMismatch { .. }));
    }
}
