pub mod database;
pub use database::*;

pub mod query_cache;
pub use query_cache::*;

pub mod denylist;
pub use denylist::*;

pub mod log_entry;
pub use log_entry::*;

pub mod explain_plans;
pub use explain_plans::*;
