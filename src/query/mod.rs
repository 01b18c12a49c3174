pub mod builder;
pub mod sort;
pub mod types;
pub mod where_clause;

pub use builder::ListQuery;
pub use types::*;
