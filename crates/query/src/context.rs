//! Contexts threaded through initialization and evaluation.
//!
//! [`EvalContext`] replaces any notion of a "current row" stored on the
//! query: it is a small `Copy` value, rebuilt for each row, so nested
//! evaluations (functions, sub-queries) never need to restore anything.

use objql_core::{DataType, TypeRegistry, Value};

use crate::function::FunctionRegistry;
use crate::query::Query;
use crate::scope::Scope;

/// Per-evaluation state: current row, current row-set and group key.
#[derive(Clone, Copy)]
pub struct EvalContext<'a> {
    query: &'a Query,
    row: Option<&'a Value>,
    rows: &'a [Value],
    group_key: Option<&'a [Value]>,
    parent: Option<&'a EvalContext<'a>>,
}

impl<'a> EvalContext<'a> {
    /// Creates a context over `rows` with no current row.
    pub fn new(query: &'a Query, rows: &'a [Value]) -> Self {
        Self {
            query,
            row: None,
            rows,
            group_key: None,
            parent: None,
        }
    }

    /// Returns a copy with `row` as the current row.
    #[inline]
    pub fn with_row(self, row: &'a Value) -> Self {
        Self {
            row: Some(row),
            ..self
        }
    }

    /// Returns a copy with no current row.
    #[inline]
    pub fn without_row(self) -> Self {
        Self { row: None, ..self }
    }

    /// Returns a copy with `rows` as the current row-set.
    #[inline]
    pub fn with_rows(self, rows: &'a [Value]) -> Self {
        Self { rows, ..self }
    }

    /// Returns a copy with `key` as the current group key.
    #[inline]
    pub fn with_group_key(self, key: &'a [Value]) -> Self {
        Self {
            group_key: Some(key),
            ..self
        }
    }

    /// Returns a copy whose enclosing context is `parent`.
    #[inline]
    pub fn with_parent(self, parent: &'a EvalContext<'a>) -> Self {
        Self {
            parent: Some(parent),
            ..self
        }
    }

    #[inline]
    pub fn query(&self) -> &'a Query {
        self.query
    }

    #[inline]
    pub fn scope(&self) -> &'a Scope {
        self.query.scope()
    }

    #[inline]
    pub fn row(&self) -> Option<&'a Value> {
        self.row
    }

    #[inline]
    pub fn rows(&self) -> &'a [Value] {
        self.rows
    }

    #[inline]
    pub fn group_key(&self) -> Option<&'a [Value]> {
        self.group_key
    }

    /// Context of the enclosing query when evaluating a sub-query.
    #[inline]
    pub fn parent(&self) -> Option<&'a EvalContext<'a>> {
        self.parent
    }
}

/// Everything an expression needs to resolve itself.
pub struct InitContext<'a> {
    row_type: DataType,
    types: &'a TypeRegistry,
    functions: &'a FunctionRegistry,
    scope: &'a Scope,
}

impl<'a> InitContext<'a> {
    pub fn new(
        row_type: DataType,
        types: &'a TypeRegistry,
        functions: &'a FunctionRegistry,
        scope: &'a Scope,
    ) -> Self {
        Self {
            row_type,
            types,
            functions,
            scope,
        }
    }

    /// Same registries and scope, different row type.
    pub fn with_row_type(&self, row_type: DataType) -> Self {
        Self {
            row_type,
            types: self.types,
            functions: self.functions,
            scope: self.scope,
        }
    }

    /// Declared type of the rows expressions are evaluated against.
    #[inline]
    pub fn row_type(&self) -> &DataType {
        &self.row_type
    }

    #[inline]
    pub fn types(&self) -> &'a TypeRegistry {
        self.types
    }

    #[inline]
    pub fn functions(&self) -> &'a FunctionRegistry {
        self.functions
    }

    #[inline]
    pub fn scope(&self) -> &'a Scope {
        self.scope
    }
}
