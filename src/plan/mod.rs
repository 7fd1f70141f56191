pub mod plan_node;
pub use plan_node::*;

pub mod plan_error;
pub use plan_error::*;

pub mod plan_parser;
pub use plan_parser::*;

pub mod condition_finder;
pub use condition_finder::*;

pub mod explain_output;
pub use explain_output::*;
