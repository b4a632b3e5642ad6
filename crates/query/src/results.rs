//! The envelope returned by one execution.

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;
use hashbrown::hash_map::DefaultHashBuilder;
use indexmap::IndexMap;
use objql_core::Value;

use crate::executor::GroupMap;

/// Save values recorded for each group key.
pub type GroupSaveValues = IndexMap<Vec<Value>, BTreeMap<String, Value>, DefaultHashBuilder>;

/// Pipeline stage a timing sample belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Stage {
    ExecuteOnAll,
    Where,
    ExecuteOnResults,
    Having,
    GroupBy,
    OrderBy,
    Limit,
    Select,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::ExecuteOnAll => "execute on all",
            Stage::Where => "where",
            Stage::ExecuteOnResults => "execute on results",
            Stage::Having => "having",
            Stage::GroupBy => "group by",
            Stage::OrderBy => "order by",
            Stage::Limit => "limit",
            Stage::Select => "select",
        })
    }
}

/// Elapsed clock ticks for one stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Timing {
    pub stage: Stage,
    pub elapsed: u64,
}

/// Rows and intermediate sets produced by one execution.
#[derive(Clone, Debug, Default)]
pub struct QueryResults {
    pub(crate) results: Vec<Value>,
    pub(crate) where_results: Vec<Value>,
    pub(crate) having_results: Vec<Value>,
    pub(crate) group_by_results: Option<GroupMap>,
    pub(crate) save_values: BTreeMap<String, Value>,
    pub(crate) group_by_save_values: Option<GroupSaveValues>,
    pub(crate) timings: Vec<Timing>,
}

impl QueryResults {
    /// Final rows: column tuples, raw objects or constructed objects,
    /// depending on the statement.
    ///
    /// With GROUP BY, the first row of each group, in group order.
    #[inline]
    pub fn rows(&self) -> &[Value] {
        &self.results
    }

    pub fn into_rows(self) -> Vec<Value> {
        self.results
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.results.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Rows that passed WHERE.
    pub fn where_results(&self) -> &[Value] {
        &self.where_results
    }

    /// Rows that passed HAVING, before grouping, ordering and projection.
    pub fn having_results(&self) -> &[Value] {
        &self.having_results
    }

    /// Projected rows of each group, in group order. `None` without GROUP BY.
    pub fn group_by_results(&self) -> Option<&GroupMap> {
        self.group_by_results.as_ref()
    }

    /// Save values at the end of the execution.
    pub fn save_values(&self) -> &BTreeMap<String, Value> {
        &self.save_values
    }

    pub fn save_value(&self, name: &str) -> Option<&Value> {
        self.save_values.get(&crate::scope::normalize(name))
    }

    /// Save values as they were after each group was projected.
    pub fn group_by_save_values(&self) -> Option<&GroupSaveValues> {
        self.group_by_save_values.as_ref()
    }

    /// Per-stage samples, empty unless the statement has a clock.
    pub fn timings(&self) -> &[Timing] {
        &self.timings
    }
}
