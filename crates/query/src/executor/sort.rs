//! Comparator engine for ORDER BY.
//!
//! A comparator walks its `(entry, direction)` pairs in order and returns the
//! first non-equal comparison. Sorting is stable and keys follow the total
//! order of [`Value`]: nulls first, values of one kind by value, values of
//! different kinds by kind. Expression values can be
//! cached per row for the duration of one sort; since a comparison cannot
//! fail, the first evaluation error is kept and returned once the sort is
//! done.

use alloc::vec::Vec;
use core::cell::RefCell;
use core::cmp::Ordering;
use core::fmt;
use hashbrown::HashMap;
use objql_core::{Error, Result, Value};

use super::group::GroupMap;
use crate::ast::Expr;
use crate::context::EvalContext;
use crate::query::SelectItem;

/// Sort direction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    #[inline]
    pub fn apply(self, ord: Ordering) -> Ordering {
        match self {
            Direction::Asc => ord,
            Direction::Desc => ord.reverse(),
        }
    }

    pub fn reverse(self) -> Self {
        match self {
            Direction::Asc => Direction::Desc,
            Direction::Desc => Direction::Asc,
        }
    }
}

/// What an ORDER BY entry sorts on.
#[derive(Debug)]
pub enum SortKey {
    /// An expression evaluated against each row.
    Expr(Expr),
    /// A projected column, 1-based.
    Column(usize),
}

/// One ORDER BY entry.
#[derive(Debug)]
pub struct OrderBy {
    pub key: SortKey,
    pub direction: Direction,
}

impl OrderBy {
    pub fn new(key: SortKey, direction: Direction) -> Self {
        Self { key, direction }
    }

    pub fn asc(expr: Expr) -> Self {
        Self::new(SortKey::Expr(expr), Direction::Asc)
    }

    pub fn desc(expr: Expr) -> Self {
        Self::new(SortKey::Expr(expr), Direction::Desc)
    }

    pub fn column(index: usize, direction: Direction) -> Self {
        Self::new(SortKey::Column(index), direction)
    }
}

impl fmt::Display for OrderBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.key {
            SortKey::Expr(e) => write!(f, "{}", e)?,
            SortKey::Column(i) => write!(f, "{}", i)?,
        }
        match self.direction {
            Direction::Asc => f.write_str(" ASC"),
            Direction::Desc => f.write_str(" DESC"),
        }
    }
}

/// A resolved sort source.
#[derive(Clone, Copy, Debug)]
pub enum SortEntry<'q> {
    /// Evaluated with the row as current row.
    Expr(&'q Expr),
    /// Element of a tuple row.
    Position(usize),
}

/// Resolves row ORDER BY entries, mapping column numbers to the projected
/// expressions.
pub(crate) fn resolve_row_entries<'q>(
    order_by: &'q [OrderBy],
    columns: Option<&'q [SelectItem]>,
) -> Result<Vec<(SortEntry<'q>, Direction)>> {
    order_by
        .iter()
        .map(|o| {
            let entry = match &o.key {
                SortKey::Expr(e) => SortEntry::Expr(e),
                SortKey::Column(i) => {
                    let columns = columns.ok_or_else(|| {
                        Error::invalid_statement("cannot order by column number when selecting objects")
                    })?;
                    let item = i
                        .checked_sub(1)
                        .and_then(|i| columns.get(i))
                        .ok_or_else(|| {
                            Error::invalid_statement(alloc::format!(
                                "order by column {} is out of range 1..={}",
                                i,
                                columns.len()
                            ))
                        })?;
                    SortEntry::Expr(&item.expr)
                }
            };
            Ok((entry, o.direction))
        })
        .collect()
}

// Relational operators fall back to string forms across kinds, which is not
// transitive; sort keys rank kinds instead.
#[inline]
fn key_order(a: &Value, b: &Value) -> Ordering {
    a.cmp(b)
}

/// Multi-key row comparator.
pub struct RowComparator<'q> {
    entries: Vec<(SortEntry<'q>, Direction)>,
    cache: Option<RefCell<HashMap<(usize, usize), Value>>>,
    error: RefCell<Option<Error>>,
}

impl<'q> RowComparator<'q> {
    pub fn new(entries: Vec<(SortEntry<'q>, Direction)>, cache_keys: bool) -> Self {
        Self {
            entries,
            cache: cache_keys.then(|| RefCell::new(HashMap::new())),
            error: RefCell::new(None),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops every cached sort key.
    pub fn clear_cache(&self) {
        if let Some(cache) = &self.cache {
            cache.borrow_mut().clear();
        }
    }

    fn evaluate(&self, expr: &Expr, row: &Value, ctx: &EvalContext<'_>) -> Value {
        expr.evaluate(&ctx.with_row(row)).unwrap_or_else(|e| {
            let mut slot = self.error.borrow_mut();
            if slot.is_none() {
                *slot = Some(e.context(alloc::format!("order by {}", expr)));
            }
            Value::Null
        })
    }

    fn key(&self, pair: usize, index: usize, row: &Value, ctx: &EvalContext<'_>) -> Value {
        let expr = match self.entries[pair].0 {
            SortEntry::Position(p) => {
                return row
                    .as_list()
                    .and_then(|items| items.get(p))
                    .cloned()
                    .unwrap_or(Value::Null)
            }
            SortEntry::Expr(e) => e,
        };
        let Some(cache) = &self.cache else {
            return self.evaluate(expr, row, ctx);
        };
        if let Some(v) = cache.borrow().get(&(index, pair)) {
            return v.clone();
        }
        let v = self.evaluate(expr, row, ctx);
        cache.borrow_mut().insert((index, pair), v.clone());
        v
    }

    /// Compares rows `a` and `b`, identified by their position for caching.
    pub fn compare(&self, a: (usize, &Value), b: (usize, &Value), ctx: &EvalContext<'_>) -> Ordering {
        for (pair, (_, direction)) in self.entries.iter().enumerate() {
            let ka = self.key(pair, a.0, a.1, ctx);
            let kb = self.key(pair, b.0, b.1, ctx);
            let ord = key_order(&ka, &kb);
            if ord != Ordering::Equal {
                return direction.apply(ord);
            }
        }
        Ordering::Equal
    }

    /// Stable sort. Clears the cache afterwards and returns the first error
    /// met while evaluating sort keys, if any.
    pub fn sort(&self, rows: Vec<Value>, ctx: &EvalContext<'_>) -> Result<Vec<Value>> {
        if self.entries.is_empty() || rows.len() < 2 {
            return Ok(rows);
        }
        let mut order: Vec<usize> = (0..rows.len()).collect();
        order.sort_by(|&a, &b| self.compare((a, &rows[a]), (b, &rows[b]), ctx));
        self.clear_cache();
        if let Some(e) = self.error.borrow_mut().take() {
            return Err(e);
        }
        let mut slots: Vec<Option<Value>> = rows.into_iter().map(Some).collect();
        Ok(order.into_iter().filter_map(|i| slots[i].take()).collect())
    }
}

/// Orders GROUP BY keys.
///
/// Each entry resolves to the position of a GROUP BY expression it repeats,
/// to an explicit 1-based index into the key, or to an expression evaluated
/// once per group with the key as current row and the group's members as
/// row set, so aggregates see only their group.
pub struct GroupKeyComparator<'q> {
    entries: Vec<(SortEntry<'q>, Direction)>,
}

impl<'q> GroupKeyComparator<'q> {
    pub fn resolve(order_by: &'q [OrderBy], group_by: &[Expr]) -> Result<Self> {
        let mut entries = Vec::with_capacity(order_by.len());
        for o in order_by {
            let entry = match &o.key {
                SortKey::Column(i) if (1..=group_by.len()).contains(i) => SortEntry::Position(i - 1),
                SortKey::Column(i) => {
                    return Err(Error::invalid_statement(alloc::format!(
                        "group order by index {} is out of range 1..={}",
                        i,
                        group_by.len()
                    )))
                }
                SortKey::Expr(e) => {
                    let text = alloc::format!("{}", e);
                    match group_by.iter().position(|g| alloc::format!("{}", g) == text) {
                        Some(p) => SortEntry::Position(p),
                        None => SortEntry::Expr(e),
                    }
                }
            };
            entries.push((entry, o.direction));
        }
        Ok(Self { entries })
    }

    /// Returns the keys of `groups` in order. Ties keep first-seen order.
    pub fn sort(&self, groups: &GroupMap, ctx: &EvalContext<'_>) -> Result<Vec<Vec<Value>>> {
        let mut keyed = Vec::with_capacity(groups.len());
        for (key, members) in groups {
            let row = Value::List(key.clone());
            let ctx = ctx.with_rows(members).with_group_key(key);
            let ctx = ctx.with_row(&row);
            let mut sort_keys = Vec::with_capacity(self.entries.len());
            for (entry, _) in &self.entries {
                sort_keys.push(match entry {
                    SortEntry::Position(p) => key.get(*p).cloned().unwrap_or(Value::Null),
                    SortEntry::Expr(e) => e
                        .evaluate(&ctx)
                        .map_err(|err| err.context(alloc::format!("group order by {}", e)))?,
                });
            }
            keyed.push((key, sort_keys));
        }
        keyed.sort_by(|(_, a), (_, b)| {
            self.entries
                .iter()
                .zip(a.iter().zip(b))
                .map(|((_, direction), (ka, kb))| direction.apply(key_order(ka, kb)))
                .find(|ord| *ord != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        });
        Ok(keyed.into_iter().map(|(key, _)| key.clone()).collect())
    }
}
