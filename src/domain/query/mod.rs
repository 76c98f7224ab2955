pub mod generator;
pub mod params;

pub use generator::{build_list, ListQuery};
pub use params::{PageLimits, Pagination, QueryParams, QueryResult, SortField};
