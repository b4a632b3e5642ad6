//! ObjQL Query - statements over in-memory records.
//!
//! This crate provides the query engine built on `objql-core`:
//!
//! - `ast`: the expression model (`Expr` and its node kinds)
//! - `function`: function handlers, overload scoring and the built-in library
//! - `executor`: grouping, ordering, limiting, projection and the pipeline
//! - `scope`: bind variables, save values and change notification
//! - `context`: initialization and evaluation contexts
//!
//! # Example
//!
//! ```rust
//! use std::rc::Rc;
//! use objql_core::{DataType, DynamicRecord, RecordType, Value};
//! use objql_query::{Expr, From, OrderBy, QueryBuilder};
//!
//! let sale = Rc::new(
//!     RecordType::new("Sale")
//!         .with_field("region", DataType::String)
//!         .with_field("amount", DataType::Int64),
//! );
//! let rows: Vec<Value> = [("north", 10i64), ("south", 5), ("north", 7)]
//!     .into_iter()
//!     .map(|(r, a)| DynamicRecord::new(sale.clone()).with("region", r).with("amount", a).into_value())
//!     .collect();
//!
//! let query = QueryBuilder::new()
//!     .record_type(sale.clone())
//!     .from(From::Type(DataType::record("Sale")))
//!     .select(vec![
//!         Expr::accessor("region").unwrap(),
//!         Expr::call("sum", vec![Expr::accessor("amount").unwrap()]),
//!     ])
//!     .group_by(vec![Expr::accessor("region").unwrap()])
//!     .group_order_by(OrderBy::desc(Expr::accessor("region").unwrap()))
//!     .build()
//!     .unwrap();
//!
//! let results = query.execute(&rows).unwrap();
//! assert_eq!(
//!     results.rows(),
//!     &[
//!         Value::List(vec![Value::from("south"), Value::Float64(5.0)]),
//!         Value::List(vec![Value::from("north"), Value::Float64(17.0)]),
//!     ]
//! );
//! ```

#![no_std]

extern crate alloc;

pub mod ast;
pub mod context;
pub mod executor;
pub mod function;
mod query;
mod query_builder;
mod results;
pub mod scope;

pub use ast::Expr;
pub use context::{EvalContext, InitContext};
pub use executor::{Direction, GroupMap, Limit, OrderBy, SortKey};
pub use function::{Argument, FunctionDef, FunctionHandler, FunctionRegistry, ParamType};
pub use query::{ExecuteOn, From, Query, Select, SelectItem};
pub use query_builder::QueryBuilder;
pub use results::{GroupSaveValues, QueryResults, Stage, Timing};
pub use scope::{Scope, SubscriptionId, VariableChange, VariableKind};

#[cfg(test)]
pub(crate) mod testing {
    use alloc::vec;
    use objql_core::{DataType, Result, Value};

    use crate::ast::Expr;
    use crate::context::InitContext;
    use crate::query::Query;
    use crate::QueryBuilder;

    /// Evaluates `expr` as the only column of a statement over one null row.
    pub fn eval(expr: Expr) -> Result<Value> {
        eval_with(QueryBuilder::new(), expr)
    }

    /// Like [`eval`], with registrations from `builder`.
    pub fn eval_with(builder: QueryBuilder, expr: Expr) -> Result<Value> {
        let query = builder.select(vec![expr]).build()?;
        let results = query.execute(&[Value::Null])?;
        Ok(match results.into_rows().into_iter().next() {
            Some(Value::List(columns)) => columns.into_iter().next().unwrap_or(Value::Null),
            // a lone constructor column yields the object itself
            Some(other) => other,
            None => Value::Null,
        })
    }

    /// Initializes free-standing expressions against untyped rows.
    pub fn init_all(exprs: &mut [Expr], query: &Query) {
        let ctx = InitContext::new(DataType::Any, query.types(), query.functions(), query.scope());
        for expr in exprs {
            expr.init(&ctx).unwrap();
        }
    }
}
