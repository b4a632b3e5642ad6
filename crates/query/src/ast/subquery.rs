//! Correlated sub-queries.

use alloc::boxed::Box;
use alloc::rc::{Rc, Weak};
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::{Cell, RefCell};
use core::fmt;
use objql_core::{DataType, Error, Result, Value};
use tracing::trace;

use super::{Expr, Node};
use crate::context::{EvalContext, InitContext};
use crate::query::Query;
use crate::scope::{SubscriptionId, VariableKind, VariableStore};

/// A nested statement whose FROM clause is an expression evaluated against
/// the enclosing row.
///
/// The nested statement is initialized lazily, against the type of the first
/// non-null item its source yields. It is initialized again when that type
/// changes, or when a variable the source reads is changed: the sub-query
/// listens on the shared store and only raises a flag, checked on the next
/// evaluation.
pub struct SubQuery {
    query: Box<RefCell<Query>>,
    source: Option<Box<Expr>>,
    stale: Rc<Cell<bool>>,
    row_type: RefCell<Option<DataType>>,
    store: Weak<RefCell<VariableStore>>,
    subscriptions: Vec<SubscriptionId>,
}

impl SubQuery {
    pub fn new(mut query: Query) -> Self {
        let source = query.take_source().map(Box::new);
        Self {
            query: Box::new(RefCell::new(query)),
            source,
            stale: Rc::new(Cell::new(true)),
            row_type: RefCell::new(None),
            store: Weak::new(),
            subscriptions: Vec::new(),
        }
    }

    fn unsubscribe(&mut self) {
        if let Some(store) = self.store.upgrade() {
            let mut store = store.borrow_mut();
            for id in self.subscriptions.drain(..) {
                store.unsubscribe(id);
            }
        }
        self.subscriptions.clear();
        self.store = Weak::new();
    }

    fn rows(source: Value) -> Vec<Value> {
        match source {
            Value::List(items) => items,
            Value::Map(entries) => entries.into_values().collect(),
            Value::Null => Vec::new(),
            other => alloc::vec![other],
        }
    }
}

impl Drop for SubQuery {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl Node for SubQuery {
    fn evaluate(&self, ctx: &EvalContext<'_>) -> Result<Value> {
        let source = self
            .source
            .as_ref()
            .ok_or_else(|| Error::invalid_statement("sub-query has no FROM expression"))?;
        let rows = Self::rows(source.evaluate(ctx)?);
        let row_type = rows
            .iter()
            .find(|v| !v.is_null())
            .map_or(DataType::Any, DataType::of);

        let changed = self.row_type.borrow().as_ref() != Some(&row_type);
        if self.stale.get() || changed {
            trace!(row_type = %row_type, "initializing sub-query");
            self.query
                .borrow_mut()
                .init_for(row_type.clone())
                .map_err(|e| e.context(alloc::format!("sub-query {}", self)))?;
            self.stale.set(false);
            *self.row_type.borrow_mut() = Some(row_type);
        }

        let query = self.query.borrow();
        let results = query
            .execute_nested(&rows, ctx)
            .map_err(|e| e.context(alloc::format!("sub-query {}", self)))?;
        Ok(Value::List(results.into_rows()))
    }

    fn init(&mut self, ctx: &InitContext<'_>) -> Result<()> {
        {
            let query = self.query.get_mut();
            query.adopt(ctx.types(), ctx.functions());
            query.scope_mut().link_parent(ctx.scope());
        }
        // the nested clauses are resolved lazily, but their `?` positions
        // follow the statement text
        self.for_each_child_mut(&mut |expr| expr.number_anonymous(ctx.scope()));

        let source = self
            .source
            .as_mut()
            .ok_or_else(|| Error::invalid_statement("sub-query has no FROM expression"))?;
        source.init(ctx)?;
        let watched: Vec<(VariableKind, String)> = source.variables();

        self.unsubscribe();
        self.store = ctx.scope().downgrade();
        for kind in [VariableKind::Bind, VariableKind::Save] {
            let names: Vec<String> = watched
                .iter()
                .filter(|(k, _)| *k == kind)
                .map(|(_, n)| n.clone())
                .collect();
            if names.is_empty() {
                continue;
            }
            let stale = self.stale.clone();
            let id = ctx.scope().subscribe(kind, move |change| {
                if names.contains(&change.name) {
                    stale.set(true);
                }
            });
            self.subscriptions.push(id);
        }
        self.stale.set(true);
        *self.row_type.get_mut() = None;
        Ok(())
    }

    fn expected_type(&self, _ctx: &InitContext<'_>) -> DataType {
        DataType::List
    }

    fn is_fixed(&self) -> bool {
        false
    }

    fn for_each_child(&self, f: &mut dyn FnMut(&Expr)) {
        if let Some(source) = &self.source {
            f(source);
        }
    }

    /// Unlike `for_each_child`, also visits the nested statement's clauses.
    fn for_each_child_mut(&mut self, f: &mut dyn FnMut(&mut Expr)) {
        self.query
            .get_mut()
            .for_each_expr_mut(self.source.as_deref_mut(), f);
    }
}

impl fmt::Debug for SubQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubQuery")
            .field("source", &self.source)
            .field("row_type", &self.row_type.borrow())
            .field("stale", &self.stale.get())
            .field("subscriptions", &self.subscriptions)
            .finish()
    }
}

impl fmt::Display for SubQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        match self.query.try_borrow() {
            Ok(query) => query.fmt_with_source(f, self.source.as_deref())?,
            Err(_) => f.write_str("SELECT ...")?,
        }
        f.write_str(")")
    }
}
