use std::time::Duration;

use thiserror::Error;

use crate::collector::DatabaseError;

#[derive(Error, Debug)]
pub enum CollectorError {
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("collector already started")]
    AlreadyStarted,

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("per_collect_ratio must be in (0, 1], got {0}")]
    InvalidRatio(f64),

    #[error("collect_interval must be positive, got {0:?}")]
    InvalidInterval(Duration),

    #[error("schema name must not be empty")]
    EmptySchemaName,
}

pub type Result<T> = std::result::Result<T, CollectorError>;
