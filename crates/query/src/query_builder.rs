//! Fluent construction of statements.

use alloc::rc::Rc;
use alloc::vec::Vec;
use objql_core::{RecordFactory, RecordType, Result, Value};

use crate::ast::Expr;
use crate::executor::{Limit, OrderBy};
use crate::function::FunctionHandler;
use crate::query::{ExecuteOn, From, Query, Select, SelectItem};

/// Builds a [`Query`] clause by clause.
///
/// ```
/// use objql_query::{Expr, QueryBuilder};
/// use objql_core::Value;
///
/// let query = QueryBuilder::new()
///     .where_(Expr::gt(Expr::bind("_currobj"), Expr::number(1)))
///     .build()
///     .unwrap();
/// let results = query.execute(&[Value::Int32(1), Value::Int32(2)]).unwrap();
/// assert_eq!(results.rows(), &[Value::Int32(2)]);
/// ```
#[derive(Debug, Default)]
pub struct QueryBuilder {
    query: Query,
}

impl QueryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Projects one column per expression.
    pub fn select(self, columns: Vec<Expr>) -> Self {
        self.select_items(columns.into_iter().map(SelectItem::new).collect())
    }

    pub fn select_items(mut self, items: Vec<SelectItem>) -> Self {
        self.query.select = Select::Columns(items);
        self
    }

    /// Returns the rows themselves (`SELECT *`). This is the default.
    pub fn select_objects(mut self) -> Self {
        self.query.select = Select::Objects;
        self
    }

    /// Sets the FROM clause.
    pub fn from(mut self, from: From) -> Self {
        self.query.from = from;
        self
    }

    /// Sets or extends the WHERE clause.
    /// Multiple calls to where_() are combined with AND.
    pub fn where_(mut self, predicate: Expr) -> Self {
        self.query.where_clause = Some(match self.query.where_clause.take() {
            Some(existing) => Expr::and(existing, predicate),
            None => predicate,
        });
        self
    }

    /// Sets or extends the HAVING clause, like [`QueryBuilder::where_`].
    pub fn having(mut self, predicate: Expr) -> Self {
        self.query.having = Some(match self.query.having.take() {
            Some(existing) => Expr::and(existing, predicate),
            None => predicate,
        });
        self
    }

    pub fn group_by(mut self, exprs: Vec<Expr>) -> Self {
        self.query.group_by.extend(exprs);
        self
    }

    /// Adds an entry ordering the group keys.
    pub fn group_order_by(mut self, order: OrderBy) -> Self {
        self.query.group_order_by.push(order);
        self
    }

    /// Limits the number of groups kept.
    pub fn group_limit(mut self, limit: Limit) -> Self {
        self.query.group_limit = Some(limit);
        self
    }

    /// Adds an ORDER BY entry.
    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.query.order_by.push(order);
        self
    }

    /// Sets the LIMIT. Applies to each group under GROUP BY.
    pub fn limit(mut self, limit: Limit) -> Self {
        self.query.limit = Some(limit);
        self
    }

    pub fn distinct(mut self, distinct: bool) -> Self {
        self.query.distinct = distinct;
        self
    }

    /// Registers an expression evaluated once per execution over `on`.
    pub fn execute_on(mut self, on: ExecuteOn, expr: Expr) -> Self {
        match on {
            ExecuteOn::All => self.query.execute_on_all.push(expr),
            ExecuteOn::Results => self.query.execute_on_results.push(expr),
        }
        self
    }

    pub fn execute_on_all(self, expr: Expr) -> Self {
        self.execute_on(ExecuteOn::All, expr)
    }

    pub fn execute_on_results(self, expr: Expr) -> Self {
        self.execute_on(ExecuteOn::Results, expr)
    }

    pub fn record_type(mut self, record_type: Rc<RecordType>) -> Self {
        self.query.types.register_type(record_type);
        self
    }

    /// Registers a factory for constructor expressions.
    pub fn record_factory(mut self, factory: Rc<dyn RecordFactory>) -> Self {
        self.query.types.register_factory(factory);
        self
    }

    /// Registers a user function handler, consulted before the built-ins.
    pub fn function_handler(mut self, handler: impl FunctionHandler + 'static) -> Self {
        self.query.functions.register(Rc::new(handler));
        self
    }

    /// Sets a bind variable. Values set before `build` take part in
    /// function resolution.
    pub fn variable(self, name: &str, value: impl Into<Value>) -> Self {
        self.query.scope.set_variable(name, value.into());
        self
    }

    /// Caches sort keys per row during each sort.
    pub fn cache_sort_keys(mut self, cache: bool) -> Self {
        self.query.cache_sort_keys = cache;
        self
    }

    /// Records per-stage timings read from `clock`.
    pub fn with_clock(mut self, clock: fn() -> u64) -> Self {
        self.query.clock = Some(clock);
        self
    }

    /// Returns the statement without initializing it.
    pub fn into_query(self) -> Query {
        self.query
    }

    /// Initializes and returns the statement.
    pub fn build(self) -> Result<Query> {
        let mut query = self.query;
        query.init()?;
        Ok(query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;
    use alloc::vec;

    #[test]
    fn test_where_calls_are_anded() {
        let query = QueryBuilder::new()
            .where_(Expr::gt(Expr::bind("_currobj"), Expr::number(1)))
            .where_(Expr::lt(Expr::bind("_currobj"), Expr::number(4)))
            .into_query();
        assert_eq!(
            query.to_string(),
            "SELECT * FROM null WHERE :_currobj > 1 AND :_currobj < 4"
        );
        let query = QueryBuilder::new()
            .where_(Expr::gt(Expr::bind("_currobj"), Expr::number(1)))
            .where_(Expr::lt(Expr::bind("_currobj"), Expr::number(4)))
            .build()
            .unwrap();
        let rows: Vec<Value> = (0..6).map(Value::Int32).collect();
        assert_eq!(query.execute(&rows).unwrap().len(), 2);
    }

    #[test]
    fn test_build_initializes() {
        let query = QueryBuilder::new().select(vec![Expr::number(1)]).build().unwrap();
        assert!(query.is_initialized());
        assert!(!QueryBuilder::new().into_query().is_initialized());
    }
}
