use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::plan::PlanNode;

pub const DATABASE_ENGINE: &str = "MySQL";

const EXPLAIN_PLAN_OUTPUT_PATTERN: &str = r#"explain_plan_output="([A-Za-z0-9+/=]*)""#;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingResult {
    Success,
    Skipped,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplainMetadata {
    pub database_engine: String,
    pub database_version: String,
    /// The statement digest the plan belongs to.
    pub query_identifier: String,
    pub generated_at: DateTime<Utc>,
    pub processing_result: ProcessingResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_result_reason: Option<String>,
}

/// The record emitted for every processed candidate. A plan is only present
/// on success.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplainOutput {
    pub metadata: ExplainMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<PlanNode>,
}

#[derive(Error, Debug)]
pub enum ExplainLineError {
    #[error("explain_plan_output field not found in log line")]
    MissingOutput,

    #[error("invalid log line pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("invalid explain output json: {0}")]
    Json(#[from] serde_json::Error),
}

impl ExplainOutput {
    pub fn success(database_version: &str, digest: &str, plan: PlanNode) -> Self {
        Self {
            metadata: ExplainMetadata::new(database_version, digest, ProcessingResult::Success, None),
            plan: Some(plan),
        }
    }

    pub fn skipped(database_version: &str, digest: &str, reason: impl Into<String>) -> Self {
        Self {
            metadata: ExplainMetadata::new(database_version, digest, ProcessingResult::Skipped, Some(reason.into())),
            plan: None,
        }
    }

    pub fn error(database_version: &str, digest: &str, reason: impl Into<String>) -> Self {
        Self {
            metadata: ExplainMetadata::new(database_version, digest, ProcessingResult::Error, Some(reason.into())),
            plan: None,
        }
    }

    /// Formats the telemetry line carrying this output as base64 JSON.
    pub fn to_log_line(&self, schema: &str, digest: &str) -> Result<String, serde_json::Error> {
        let payload = serde_json::to_vec(self)?;
        Ok(format!(
            r#"level="info" schema="{}" digest="{}" explain_plan_output="{}""#,
            schema,
            digest,
            BASE64.encode(payload)
        ))
    }

    pub fn from_log_line(line: &str) -> Result<Self, ExplainLineError> {
        let pattern = Regex::new(EXPLAIN_PLAN_OUTPUT_PATTERN)?;
        let encoded = pattern
            .captures(line)
            .and_then(|captures| captures.get(1))
            .ok_or(ExplainLineError::MissingOutput)?;

        let payload = BASE64.decode(encoded.as_str())?;
        Ok(serde_json::from_slice(&payload)?)
    }
}

impl ExplainMetadata {
    fn new(database_version: &str, digest: &str, processing_result: ProcessingResult, reason: Option<String>) -> Self {
        Self {
            database_engine: DATABASE_ENGINE.to_string(),
            database_version: database_version.to_string(),
            query_identifier: digest.to_string(),
            generated_at: Utc::now(),
            processing_result,
            processing_result_reason: reason,
        }
    }
}

#[cfg(test)]
pub mod tests {
    use serde_json::json;

    use crate::plan::{ExplainLineError, ExplainOutput, Operation, PlanNode, ProcessingResult};

    #[test]
    pub fn test_skipped_output_has_no_plan() {
        let output = ExplainOutput::skipped("8.0.32", "abc123", "query denylisted");

        let value = serde_json::to_value(&output).unwrap();

        assert!(value.get("plan").is_none());
        assert_eq!(value["metadata"]["database_engine"], json!("MySQL"));
        assert_eq!(value["metadata"]["database_version"], json!("8.0.32"));
        assert_eq!(value["metadata"]["query_identifier"], json!("abc123"));
        assert_eq!(value["metadata"]["processing_result"], json!("skipped"));
        assert_eq!(value["metadata"]["processing_result_reason"], json!("query denylisted"));
    }

    #[test]
    pub fn test_success_output_omits_reason() {
        let output = ExplainOutput::success("8.0.32", "abc123", PlanNode::new(Operation::TableScan));

        let value = serde_json::to_value(&output).unwrap();

        assert!(value["metadata"].get("processing_result_reason").is_none());
        assert_eq!(value["metadata"]["processing_result"], json!("success"));
        assert_eq!(value["plan"]["operation"], json!("Table Scan"));

        let generated_at = value["metadata"]["generated_at"].as_str().unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(generated_at).is_ok());
    }

    #[test]
    pub fn test_log_line_round_trip() {
        let output = ExplainOutput::error("8.0.32", "abc123", "Error 1044: Access denied");

        let line = output.to_log_line("books_store", "abc123").unwrap();

        assert!(line.starts_with(r#"level="info" schema="books_store" digest="abc123" explain_plan_output=""#));
        let decoded = ExplainOutput::from_log_line(&line).unwrap();
        assert_eq!(decoded, output);
        assert_eq!(decoded.metadata.processing_result, ProcessingResult::Error);
    }

    #[test]
    pub fn test_log_line_without_output() {
        let result = ExplainOutput::from_log_line(r#"level="info" schema="s" digest="d""#);

        assert!(matches!(result, Err(ExplainLineError::MissingOutput)));
    }
}
