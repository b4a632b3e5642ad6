//! GROUP BY partitioning.

use alloc::vec::Vec;
use hashbrown::hash_map::DefaultHashBuilder;
use indexmap::IndexMap;
use objql_core::{Result, Value};

use crate::ast::Expr;
use crate::context::EvalContext;

/// Group key to rows, in first-seen key order.
pub type GroupMap = IndexMap<Vec<Value>, Vec<Value>, DefaultHashBuilder>;

/// Creates an empty [`GroupMap`].
pub fn group_map() -> GroupMap {
    IndexMap::with_hasher(DefaultHashBuilder::default())
}

/// Partitions rows by the tuple of their GROUP BY values.
///
/// Keys compare by value, so `1` and `1.0` land in the same group.
pub struct Grouper<'q> {
    exprs: &'q [Expr],
}

impl<'q> Grouper<'q> {
    pub fn new(exprs: &'q [Expr]) -> Self {
        Self { exprs }
    }

    /// Computes the key of one row.
    pub fn key(&self, row: &Value, ctx: &EvalContext<'_>) -> Result<Vec<Value>> {
        let ctx = ctx.with_row(row);
        self.exprs
            .iter()
            .map(|e| {
                e.evaluate(&ctx)
                    .map_err(|err| err.context(alloc::format!("group by {}", e)))
            })
            .collect()
    }

    /// Partitions `rows`, keeping each partition in input order.
    pub fn group(&self, rows: &[Value], ctx: &EvalContext<'_>) -> Result<GroupMap> {
        let mut groups = group_map();
        for row in rows {
            let key = self.key(row, ctx)?;
            groups.entry(key).or_insert_with(Vec::new).push(row.clone());
        }
        Ok(groups)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::init_all;
    use crate::QueryBuilder;
    use alloc::vec;

    fn pair(a: i32, b: &str) -> Value {
        Value::List(vec![Value::Int32(a), Value::from(b)])
    }

    #[test]
    fn test_first_seen_order() {
        let q = QueryBuilder::new().build().unwrap();
        let rows = vec![pair(2, "x"), pair(1, "y"), pair(2, "z")];
        let ctx = EvalContext::new(&q, &rows);
        let mut exprs = vec![Expr::accessor("[0]").unwrap()];
        init_all(&mut exprs, &q);
        let groups = Grouper::new(&exprs).group(&rows, &ctx).unwrap();

        let keys: Vec<_> = groups.keys().cloned().collect();
        assert_eq!(keys, vec![vec![Value::Int32(2)], vec![Value::Int32(1)]]);
        assert_eq!(groups[0], vec![pair(2, "x"), pair(2, "z")]);
    }

    #[test]
    fn test_keys_compare_by_value() {
        let q = QueryBuilder::new().build().unwrap();
        let rows = vec![Value::Int32(1), Value::Float64(1.0), Value::Int64(2)];
        let ctx = EvalContext::new(&q, &rows);
        let exprs = vec![Expr::bind("_currobj")];
        let groups = Grouper::new(&exprs).group(&rows, &ctx).unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].len(), 2);
    }

    #[test]
    fn test_multi_key() {
        let q = QueryBuilder::new().build().unwrap();
        let rows = vec![pair(1, "a"), pair(1, "b"), pair(1, "a")];
        let ctx = EvalContext::new(&q, &rows);
        let mut exprs = vec![Expr::accessor("[0]").unwrap(), Expr::accessor("[1]").unwrap()];
        init_all(&mut exprs, &q);
        let groups = Grouper::new(&exprs).group(&rows, &ctx).unwrap();
        assert_eq!(groups.len(), 2);
        let total: usize = groups.values().map(Vec::len).sum();
        assert_eq!(total, rows.len());
    }
}
