//! Materialised query results handed back by drivers.

mod result_set;
mod row;

pub use result_set::ResultSet;
pub use row::DbRow;
