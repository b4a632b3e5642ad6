//! Statements.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;
use objql_core::{DataType, Error, Result, TypeRegistry, Value};
use tracing::debug;

use crate::ast::Expr;
use crate::context::{EvalContext, InitContext};
use crate::executor::pipeline::{self, Stopwatch};
use crate::executor::{
    resolve_row_entries, validate_splice, Direction, GroupKeyComparator, Limit, OrderBy, SortKey,
};
use crate::function::FunctionRegistry;
use crate::results::QueryResults;
use crate::scope::{anonymous_name, Scope, SubscriptionId, VariableChange, VariableKind};

/// Where rows come from.
#[derive(Debug)]
pub enum From {
    /// Rows supplied by the caller, of the given type (`Any` if mixed).
    Type(DataType),
    /// Rows produced by an expression over the enclosing row. Sub-queries
    /// only.
    Source(Expr),
}

impl Default for From {
    fn default() -> Self {
        From::Type(DataType::Any)
    }
}

/// One projected column.
#[derive(Debug)]
pub struct SelectItem {
    pub expr: Expr,
    pub alias: Option<String>,
    /// Each item of the column's container value becomes its own result.
    pub splice: bool,
}

impl SelectItem {
    pub fn new(expr: Expr) -> Self {
        Self {
            expr,
            alias: None,
            splice: false,
        }
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn spliced(mut self) -> Self {
        self.splice = true;
        self
    }
}

impl fmt::Display for SelectItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.splice {
            f.write_str("[*] ")?;
        }
        write!(f, "{}", self.expr)?;
        if let Some(alias) = &self.alias {
            write!(f, " AS {}", alias)?;
        }
        Ok(())
    }
}

/// The projection.
#[derive(Debug)]
pub enum Select {
    /// `SELECT *`: the rows themselves.
    Objects,
    Columns(Vec<SelectItem>),
}

impl Default for Select {
    fn default() -> Self {
        Select::Objects
    }
}

/// Row set an `EXECUTE ON` expression runs over.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecuteOn {
    /// Every input row, before WHERE.
    All,
    /// Rows that passed WHERE; also run for each group.
    Results,
}

/// A statement over in-memory records.
///
/// Built with [`QueryBuilder`](crate::QueryBuilder) and initialized once;
/// `execute` may then be called any number of times. Variables live in the
/// statement's [`Scope`] and keep their values across executions.
#[derive(Debug, Default)]
pub struct Query {
    pub(crate) select: Select,
    pub(crate) from: From,
    pub(crate) where_clause: Option<Expr>,
    pub(crate) having: Option<Expr>,
    pub(crate) group_by: Vec<Expr>,
    pub(crate) group_order_by: Vec<OrderBy>,
    pub(crate) group_limit: Option<Limit>,
    pub(crate) order_by: Vec<OrderBy>,
    pub(crate) limit: Option<Limit>,
    pub(crate) distinct: bool,
    pub(crate) execute_on_all: Vec<Expr>,
    pub(crate) execute_on_results: Vec<Expr>,
    pub(crate) types: TypeRegistry,
    pub(crate) functions: FunctionRegistry,
    pub(crate) scope: Scope,
    pub(crate) row_type: DataType,
    pub(crate) initialized: bool,
    pub(crate) cache_sort_keys: bool,
    pub(crate) clock: Option<fn() -> u64>,
}

impl Query {
    /// Resolves every expression against the FROM type and validates clause
    /// combinations.
    pub fn init(&mut self) -> Result<()> {
        let row_type = match &self.from {
            From::Type(t) => t.clone(),
            From::Source(_) => {
                return Err(Error::invalid_statement(
                    "a FROM expression needs an enclosing statement",
                ))
            }
        };
        self.init_for(row_type)
    }

    /// Initializes against rows of `row_type`. Sub-queries call this again
    /// whenever their rows change type.
    pub(crate) fn init_for(&mut self, row_type: DataType) -> Result<()> {
        self.initialized = false;
        let scope = self.scope.clone();
        self.for_each_expr_mut(None, &mut |expr| expr.number_anonymous(&scope));
        let ctx = InitContext::new(row_type.clone(), &self.types, &self.functions, &self.scope);

        if let Select::Columns(items) = &mut self.select {
            validate_splice(items)?;
            for (i, item) in items.iter_mut().enumerate() {
                item.expr
                    .init(&ctx)
                    .map_err(|e| e.context(alloc::format!("column {}", i + 1)))?;
            }
        }
        if let Some(expr) = &mut self.where_clause {
            expr.init(&ctx).map_err(|e| e.context("where clause"))?;
        }
        if let Some(expr) = &mut self.having {
            expr.init(&ctx).map_err(|e| e.context("having clause"))?;
        }
        for expr in &mut self.group_by {
            expr.init(&ctx).map_err(|e| e.context("group by"))?;
        }
        for order in &mut self.order_by {
            if let SortKey::Expr(expr) = &mut order.key {
                expr.init(&ctx).map_err(|e| e.context("order by"))?;
            }
        }
        for expr in self.execute_on_all.iter_mut().chain(self.execute_on_results.iter_mut()) {
            expr.init(&ctx).map_err(|e| e.context("execute on"))?;
        }

        // group ordering expressions see the key as their row
        let key_ctx = ctx.with_row_type(DataType::Any);
        for order in &mut self.group_order_by {
            if let SortKey::Expr(expr) = &mut order.key {
                expr.init(&key_ctx).map_err(|e| e.context("group by order by"))?;
            }
        }

        let columns = match &self.select {
            Select::Columns(items) => Some(&items[..]),
            Select::Objects => None,
        };
        resolve_row_entries(&self.order_by, columns)?;
        if !self.group_order_by.is_empty() || self.group_limit.is_some() {
            if self.group_by.is_empty() {
                return Err(Error::invalid_statement(
                    "GROUP BY ORDER BY and GROUP BY LIMIT need a GROUP BY clause",
                ));
            }
            GroupKeyComparator::resolve(&self.group_order_by, &self.group_by)?;
        }

        debug!(row_type = %row_type, "initialized statement");
        self.row_type = row_type;
        self.initialized = true;
        Ok(())
    }

    fn ensure_initialized(&self) -> Result<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(Error::invalid_statement("statement is not initialized"))
        }
    }

    /// Runs the statement over `rows`.
    pub fn execute(&self, rows: &[Value]) -> Result<QueryResults> {
        self.ensure_initialized()?;
        pipeline::execute(self, rows, None)
    }

    /// Runs the statement as a sub-query of `parent`'s current row.
    pub(crate) fn execute_nested(&self, rows: &[Value], parent: &EvalContext<'_>) -> Result<QueryResults> {
        self.ensure_initialized()?;
        pipeline::execute(self, rows, Some(parent))
    }

    /// Re-runs ORDER BY, LIMIT and SELECT over the rows `results` kept after
    /// HAVING, ordering by 1-based column numbers.
    pub fn reorder(&self, results: &QueryResults, columns: &[(usize, Direction)]) -> Result<QueryResults> {
        let order_by = columns
            .iter()
            .map(|&(column, direction)| OrderBy::column(column, direction))
            .collect();
        self.reorder_by(results, order_by)
    }

    /// Like [`Query::reorder`], with an arbitrary ORDER BY list.
    pub fn reorder_by(&self, results: &QueryResults, mut order_by: Vec<OrderBy>) -> Result<QueryResults> {
        self.ensure_initialized()?;
        if !self.group_by.is_empty() {
            return Err(Error::invalid_statement("cannot reorder a grouped statement"));
        }
        let ctx = InitContext::new(self.row_type.clone(), &self.types, &self.functions, &self.scope);
        for order in &mut order_by {
            if let SortKey::Expr(expr) = &mut order.key {
                expr.init(&ctx).map_err(|e| e.context("order by"))?;
            }
        }
        let entries = resolve_row_entries(&order_by, self.column_items())?;
        let rows = results.having_results();
        let base = EvalContext::new(self, rows);
        let mut watch = Stopwatch::new(self.clock);
        let reordered = pipeline::finish(self, entries, self.limit, rows, &base, &mut watch)?;

        let mut out = results.clone();
        out.results = reordered;
        out.save_values = self.scope.save_values();
        out.timings = watch.into_timings();
        Ok(out)
    }

    /// Visits every clause expression in statement text order, `source`
    /// standing in for the FROM clause.
    pub(crate) fn for_each_expr_mut(&mut self, source: Option<&mut Expr>, f: &mut dyn FnMut(&mut Expr)) {
        if let Select::Columns(items) = &mut self.select {
            items.iter_mut().for_each(|item| f(&mut item.expr));
        }
        match source {
            Some(expr) => f(expr),
            None => {
                if let From::Source(expr) = &mut self.from {
                    f(expr);
                }
            }
        }
        if let Some(expr) = &mut self.where_clause {
            f(expr);
        }
        self.group_by.iter_mut().for_each(|expr| f(expr));
        for order in &mut self.group_order_by {
            if let SortKey::Expr(expr) = &mut order.key {
                f(expr);
            }
        }
        if let Some(expr) = &mut self.having {
            f(expr);
        }
        for order in &mut self.order_by {
            if let SortKey::Expr(expr) = &mut order.key {
                f(expr);
            }
        }
        self.execute_on_all
            .iter_mut()
            .chain(self.execute_on_results.iter_mut())
            .for_each(|expr| f(expr));
    }

    /// Moves a FROM expression out of the statement.
    pub(crate) fn take_source(&mut self) -> Option<Expr> {
        match core::mem::take(&mut self.from) {
            From::Source(expr) => Some(expr),
            other => {
                self.from = other;
                None
            }
        }
    }

    /// Makes an enclosing statement's record types and handlers visible.
    pub(crate) fn adopt(&mut self, types: &TypeRegistry, functions: &FunctionRegistry) {
        self.types.merge(types);
        self.functions.inherit(functions);
    }

    #[inline]
    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    #[inline]
    pub fn functions(&self) -> &FunctionRegistry {
        &self.functions
    }

    #[inline]
    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub(crate) fn scope_mut(&mut self) -> &mut Scope {
        &mut self.scope
    }

    #[inline]
    pub fn select(&self) -> &Select {
        &self.select
    }

    /// Projected columns; empty for `SELECT *`.
    pub fn columns(&self) -> &[SelectItem] {
        self.column_items().unwrap_or(&[])
    }

    pub(crate) fn column_items(&self) -> Option<&[SelectItem]> {
        match &self.select {
            Select::Columns(items) => Some(items),
            Select::Objects => None,
        }
    }

    /// Type the statement was last initialized against.
    #[inline]
    pub fn row_type(&self) -> &DataType {
        &self.row_type
    }

    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Sets a named bind variable.
    pub fn set_variable(&self, name: &str, value: Value) {
        self.scope.set_variable(name, value);
    }

    /// Sets the anonymous bind variable at 1-based `index`.
    pub fn set_variable_at(&self, index: usize, value: Value) {
        self.scope.set_variable(&anonymous_name(index), value);
    }

    pub fn variable(&self, name: &str) -> Value {
        self.scope.variable(name)
    }

    pub fn save_value(&self, name: &str) -> Option<Value> {
        self.scope.save_value(name)
    }

    /// Subscribes to changes of bind variables or save values.
    pub fn subscribe<F>(&self, kind: VariableKind, callback: F) -> SubscriptionId
    where
        F: Fn(&VariableChange) + 'static,
    {
        self.scope.subscribe(kind, callback)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.scope.unsubscribe(id)
    }

    /// Writes the statement text, with `source` as the FROM clause if given.
    pub(crate) fn fmt_with_source(&self, f: &mut fmt::Formatter<'_>, source: Option<&Expr>) -> fmt::Result {
        f.write_str("SELECT ")?;
        if self.distinct {
            f.write_str("DISTINCT ")?;
        }
        match &self.select {
            Select::Objects => f.write_str("*")?,
            Select::Columns(items) => write_list(f, items)?,
        }
        match (source, &self.from) {
            (Some(expr), _) | (None, From::Source(expr)) => write!(f, " FROM {}", expr)?,
            (None, From::Type(DataType::Any)) => f.write_str(" FROM null")?,
            (None, From::Type(t)) => write!(f, " FROM {}", t)?,
        }
        if let Some(expr) = &self.where_clause {
            write!(f, " WHERE {}", expr)?;
        }
        if !self.group_by.is_empty() {
            f.write_str(" GROUP BY ")?;
            write_list(f, &self.group_by)?;
        }
        if !self.group_order_by.is_empty() {
            f.write_str(" GROUP BY ORDER BY ")?;
            write_list(f, &self.group_order_by)?;
        }
        if let Some(limit) = &self.group_limit {
            write!(f, " GROUP BY {}", limit)?;
        }
        if let Some(expr) = &self.having {
            write!(f, " HAVING {}", expr)?;
        }
        if !self.order_by.is_empty() {
            f.write_str(" ORDER BY ")?;
            write_list(f, &self.order_by)?;
        }
        if let Some(limit) = &self.limit {
            write!(f, " {}", limit)?;
        }
        if !self.execute_on_all.is_empty() {
            f.write_str(" EXECUTE ON ALL ")?;
            write_list(f, &self.execute_on_all)?;
        }
        if !self.execute_on_results.is_empty() {
            f.write_str(" EXECUTE ON RESULTS ")?;
            write_list(f, &self.execute_on_results)?;
        }
        Ok(())
    }
}

fn write_list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_with_source(f, None)
    }
}
