//! SELECT projection.

use alloc::vec::Vec;
use hashbrown::HashSet;
use objql_core::{Error, Result, Value};

use crate::context::EvalContext;
use crate::query::{Select, SelectItem};

/// Checks that splice marking is all-or-nothing.
pub(crate) fn validate_splice(items: &[SelectItem]) -> Result<()> {
    let spliced = items.iter().filter(|i| i.splice).count();
    if spliced > 0 && spliced != items.len() {
        return Err(Error::invalid_statement(alloc::format!(
            "{} of {} columns are spliced: either all columns or none must be",
            spliced,
            items.len()
        )));
    }
    Ok(())
}

/// Turns surviving rows into result rows.
///
/// Column rows are `Value::List` tuples. A single constructor column yields
/// the constructed objects themselves, and spliced columns yield one result
/// per item of each column's container value.
pub struct Projector<'q> {
    select: &'q Select,
    distinct: bool,
}

impl<'q> Projector<'q> {
    pub fn new(select: &'q Select, distinct: bool) -> Self {
        Self { select, distinct }
    }

    /// Projects `rows`; `ctx` supplies the row-set aggregates read.
    pub fn project(&self, rows: &[Value], ctx: &EvalContext<'_>) -> Result<Vec<Value>> {
        let mut out = match self.select {
            Select::Objects => rows.to_vec(),
            Select::Columns(items) => {
                let single_constructor = items.len() == 1 && items[0].expr.is_constructor();
                let spliced = items.first().map_or(false, |i| i.splice);
                let mut out = Vec::with_capacity(rows.len());
                for (n, row) in rows.iter().enumerate() {
                    let ctx = ctx.with_row(row);
                    if single_constructor {
                        out.push(column(&items[0], 0, n, &ctx)?);
                    } else if spliced {
                        for (i, item) in items.iter().enumerate() {
                            splice_into(&mut out, column(item, i, n, &ctx)?);
                        }
                    } else {
                        let mut tuple = Vec::with_capacity(items.len());
                        for (i, item) in items.iter().enumerate() {
                            tuple.push(column(item, i, n, &ctx)?);
                        }
                        out.push(Value::List(tuple));
                    }
                }
                out
            }
        };
        if self.distinct {
            distinct(&mut out);
        }
        Ok(out)
    }
}

fn column(item: &SelectItem, index: usize, row: usize, ctx: &EvalContext<'_>) -> Result<Value> {
    item.expr
        .evaluate(ctx)
        .map_err(|e| e.context(alloc::format!("column {} ({}) of row {}", index + 1, item.expr, row)))
}

// Lists give their items, maps their values; null adds nothing.
fn splice_into(out: &mut Vec<Value>, value: Value) {
    match value {
        Value::List(items) => out.extend(items),
        Value::Map(entries) => out.extend(entries.into_values()),
        Value::Null => {}
        other => out.push(other),
    }
}

/// Removes later duplicates, keeping first-seen order.
pub fn distinct(rows: &mut Vec<Value>) {
    let mut seen: HashSet<Value> = HashSet::with_capacity(rows.len());
    rows.retain(|row| seen.insert(row.clone()));
}
