//! The staged execution pipeline.
//!
//! Stages run in a fixed order: EXECUTE ON ALL, WHERE, EXECUTE ON RESULTS,
//! HAVING, then either GROUP BY (which orders, projects and limits inside
//! each group) or ORDER BY, LIMIT and SELECT over the flat row set.

use alloc::vec::Vec;
use hashbrown::hash_map::DefaultHashBuilder;
use indexmap::IndexMap;
use objql_core::{Result, Value};
use tracing::{debug, instrument};

use super::group::{group_map, GroupMap, Grouper};
use super::limit::Limit;
use super::project::Projector;
use super::sort::{resolve_row_entries, Direction, GroupKeyComparator, RowComparator, SortEntry};
use crate::ast::Expr;
use crate::context::EvalContext;
use crate::query::Query;
use crate::results::{GroupSaveValues, QueryResults, Stage, Timing};

/// Collects per-stage samples from an optional clock.
pub(crate) struct Stopwatch {
    clock: Option<fn() -> u64>,
    last: u64,
    timings: Vec<Timing>,
}

impl Stopwatch {
    pub(crate) fn new(clock: Option<fn() -> u64>) -> Self {
        Self {
            clock,
            last: clock.map_or(0, |now| now()),
            timings: Vec::new(),
        }
    }

    pub(crate) fn lap(&mut self, stage: Stage) {
        if let Some(now) = self.clock {
            let now = now();
            self.timings.push(Timing {
                stage,
                elapsed: now.saturating_sub(self.last),
            });
            self.last = now;
        }
    }

    pub(crate) fn into_timings(self) -> Vec<Timing> {
        self.timings
    }
}

/// Runs every stage over `rows`. `parent` is the enclosing evaluation when
/// the statement is a sub-query.
#[instrument(level = "trace", skip_all, name = "execute")]
pub(crate) fn execute(
    query: &Query,
    rows: &[Value],
    parent: Option<&EvalContext<'_>>,
) -> Result<QueryResults> {
    let mut watch = Stopwatch::new(query.clock);
    let base = EvalContext::new(query, rows);
    let base = match parent {
        Some(parent) => base.with_parent(parent),
        None => base,
    };

    pre_pass(&query.execute_on_all, &base, "execute on all")?;
    watch.lap(Stage::ExecuteOnAll);

    let where_results = filter(query.where_clause.as_ref(), rows, &base, "where")?;
    debug!(input = rows.len(), rows = where_results.len(), "where");
    watch.lap(Stage::Where);

    let filtered = base.with_rows(&where_results);
    pre_pass(&query.execute_on_results, &filtered, "execute on results")?;
    watch.lap(Stage::ExecuteOnResults);

    let having_results = filter(query.having.as_ref(), &where_results, &filtered, "having")?;
    debug!(rows = having_results.len(), "having");
    watch.lap(Stage::Having);

    let mut results = QueryResults::default();
    if query.group_by.is_empty() {
        let entries = resolve_row_entries(&query.order_by, query.column_items())?;
        results.results = finish(query, entries, query.limit, &having_results, &base, &mut watch)?;
    } else {
        let (groups, saves) = group_stage(query, &having_results, &base.with_rows(&having_results))?;
        results.results = groups
            .values()
            .filter_map(|rows| rows.first().cloned())
            .collect();
        results.group_by_results = Some(groups);
        results.group_by_save_values = Some(saves);
        watch.lap(Stage::GroupBy);
    }

    results.where_results = where_results;
    results.having_results = having_results;
    results.save_values = query.scope().save_values();
    results.timings = watch.into_timings();
    Ok(results)
}

/// ORDER BY, LIMIT and SELECT over an ungrouped row set.
#[instrument(level = "trace", skip_all, name = "finish")]
pub(crate) fn finish(
    query: &Query,
    order_by: Vec<(SortEntry<'_>, Direction)>,
    limit: Option<Limit>,
    rows: &[Value],
    base: &EvalContext<'_>,
    watch: &mut Stopwatch,
) -> Result<Vec<Value>> {
    let ctx = base.with_rows(rows);

    let comparator = RowComparator::new(order_by, query.cache_sort_keys);
    let mut working = comparator.sort(rows.to_vec(), &ctx)?;
    watch.lap(Stage::OrderBy);

    if let Some(limit) = limit {
        limit.apply(&mut working);
        debug!(rows = working.len(), %limit, "limit");
    }
    watch.lap(Stage::Limit);

    let projected = Projector::new(&query.select, query.distinct).project(&working, &ctx)?;
    debug!(rows = projected.len(), "select");
    watch.lap(Stage::Select);
    Ok(projected)
}

/// Partitions, then orders, projects and limits each partition. Group keys
/// are ordered and limited by the GROUP BY's own clauses.
#[instrument(level = "trace", skip_all, name = "group_by")]
fn group_stage(
    query: &Query,
    rows: &[Value],
    ctx: &EvalContext<'_>,
) -> Result<(GroupMap, GroupSaveValues)> {
    let groups = Grouper::new(&query.group_by).group(rows, ctx)?;
    debug!(groups = groups.len(), "group by");

    let comparator = RowComparator::new(
        resolve_row_entries(&query.order_by, query.column_items())?,
        query.cache_sort_keys,
    );
    let projector = Projector::new(&query.select, query.distinct);
    let scope = query.scope();
    let global = scope.save_values();

    let mut projected = group_map();
    let mut saves: GroupSaveValues = IndexMap::with_hasher(DefaultHashBuilder::default());
    for (key, members) in &groups {
        // each group starts from the save values of the whole statement
        scope.replace_save_values(global.clone());
        let group_ctx = ctx.with_rows(members).with_group_key(key);
        let rows = project_group(query, &comparator, &projector, members, &group_ctx)
            .map_err(|e| e.context(alloc::format!("group {}", Value::List(key.clone()))))?;
        saves.insert(key.clone(), scope.save_values());
        projected.insert(key.clone(), rows);
    }
    scope.replace_save_values(global);

    let mut keys: Vec<Vec<Value>> = if query.group_order_by.is_empty() {
        projected.keys().cloned().collect()
    } else {
        GroupKeyComparator::resolve(&query.group_order_by, &query.group_by)?.sort(&groups, ctx)?
    };
    if let Some(limit) = query.group_limit {
        limit.apply(&mut keys);
    }

    let mut ordered = group_map();
    let mut ordered_saves: GroupSaveValues = IndexMap::with_hasher(DefaultHashBuilder::default());
    for key in keys {
        let Some(mut rows) = projected.swap_remove(&key) else {
            continue;
        };
        if let Some(limit) = query.limit {
            limit.apply(&mut rows);
        }
        if let Some(values) = saves.swap_remove(&key) {
            ordered_saves.insert(key.clone(), values);
        }
        ordered.insert(key, rows);
    }
    debug!(groups = ordered.len(), "group order and limit");
    Ok((ordered, ordered_saves))
}

fn project_group(
    query: &Query,
    comparator: &RowComparator<'_>,
    projector: &Projector<'_>,
    members: &[Value],
    ctx: &EvalContext<'_>,
) -> Result<Vec<Value>> {
    pre_pass(&query.execute_on_results, ctx, "execute on results")?;
    let sorted = comparator.sort(members.to_vec(), ctx)?;
    projector.project(&sorted, ctx)
}

fn pre_pass(exprs: &[Expr], ctx: &EvalContext<'_>, clause: &str) -> Result<()> {
    let ctx = ctx.without_row();
    for expr in exprs {
        expr.evaluate(&ctx)
            .map_err(|e| e.context(alloc::format!("{} {}", clause, expr)))?;
    }
    Ok(())
}

fn filter(
    predicate: Option<&Expr>,
    rows: &[Value],
    ctx: &EvalContext<'_>,
    clause: &str,
) -> Result<Vec<Value>> {
    let Some(predicate) = predicate else {
        return Ok(rows.to_vec());
    };
    let mut kept = Vec::with_capacity(rows.len());
    for (n, row) in rows.iter().enumerate() {
        let keep = predicate
            .is_true(&ctx.with_row(row))
            .map_err(|e| e.context(alloc::format!("{} {} on row {}", clause, predicate, n)))?;
        if keep {
            kept.push(row.clone());
        }
    }
    Ok(kept)
}
