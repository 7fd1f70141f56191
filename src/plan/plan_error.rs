use thiserror::Error;

use crate::{plan::PlanNode, sql::LexError};

#[derive(Error, Debug)]
pub enum PlanParseError {
    #[error("invalid explain plan json: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("failed to get query block")]
    MissingQueryBlock,

    #[error("failed to get {field} of {node} node")]
    MissingField { node: &'static str, field: &'static str },

    #[error("expected {node} to be an array")]
    NotAnArray { node: &'static str },

    #[error("failed to parse estimated cost '{value}' as float")]
    InvalidCost { value: String },

    #[error("failed to redact attached condition: {condition} error: {source}")]
    Redaction { condition: String, source: LexError },
}

/// A parse failure together with the part of the tree built before it.
#[derive(Error, Debug)]
#[error("{error}")]
pub struct IncompletePlan {
    #[source]
    pub error: PlanParseError,
    pub partial: PlanNode,
}
