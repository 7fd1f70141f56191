pub mod sql;
pub use sql::{contains_reserved_keywords, redact_sql, LexError, SqlLexer, SqlToken};

pub mod plan;
pub use plan::{parse_explain_plan, ExplainOutput, PlanNode, ProcessingResult};

pub mod collector;
pub use collector::{ExplainDatabase, ExplainConnection, ExplainPlans, ExplainPlansArguments, LogEntry};

pub mod config;
pub use config::ExplainPlansConfig;

pub mod error;
pub use error::{CollectorError, ConfigError};
