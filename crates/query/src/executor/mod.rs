//! Query executor module.

mod group;
mod limit;
pub(crate) mod pipeline;
mod project;
mod sort;

pub use group::{group_map, GroupMap, Grouper};
pub use limit::Limit;
pub use project::{distinct, Projector};
pub use sort::{Direction, GroupKeyComparator, OrderBy, RowComparator, SortEntry, SortKey};

pub(crate) use project::validate_splice;
pub(crate) use sort::resolve_row_entries;
