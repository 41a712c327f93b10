//! Filters, sorts, queries and the mappers that execute them.

mod filter;
mod mapper;
mod memory;
mod query;
mod sort;
mod sql;

pub use filter::{Filter, FilterError, Operator};
pub use mapper::{HasMany, Mapper, Relation, Relations};
pub use memory::MemoryMapper;
pub use query::{Pagination, Query};
pub use sort::{Direction, Join, JoinKind, Sort};
pub use sql::{Connection, Execution, SqlMapper, Statement};
