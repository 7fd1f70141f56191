use serde_json::Value;
use tracing::debug;

use crate::{plan::PlanParseError, sql::redact_sql};

pub const ATTACHED_CONDITION_KEY: &str = "attached_condition";

/// Collects every `attached_condition` string found at any depth, in
/// document order (a node's own condition before those of its children).
pub fn find_attached_conditions(explain_json: &Value) -> Vec<String> {
    let mut conditions = Vec::new();
    collect_conditions(explain_json, &mut conditions);
    conditions
}

fn collect_conditions(value: &Value, conditions: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            if let Some(Value::String(condition)) = map.get(ATTACHED_CONDITION_KEY) {
                conditions.push(condition.clone());
            }
            for (key, child) in map {
                if key != ATTACHED_CONDITION_KEY {
                    collect_conditions(child, conditions);
                }
            }
        },
        Value::Array(items) => {
            for item in items {
                collect_conditions(item, conditions);
            }
        },
        _ => {},
    }
}

fn redact_conditions_in_place(value: &mut Value) -> Result<(), PlanParseError> {
    match value {
        Value::Object(map) => {
            for (key, child) in map.iter_mut() {
                match child {
                    Value::String(condition) if key == ATTACHED_CONDITION_KEY => {
                        *condition = redact_sql(condition)
                            .map_err(|source| PlanParseError::Redaction { condition: condition.clone(), source })?;
                    },
                    _ => redact_conditions_in_place(child)?,
                }
            }
        },
        Value::Array(items) => {
            for item in items {
                redact_conditions_in_place(item)?;
            }
        },
        _ => {},
    }
    Ok(())
}

/// Returns the raw plan text with every attached condition redacted, plus
/// the number of conditions found.
///
/// Each condition is replaced at its first remaining occurrence so the rest
/// of the payload keeps the engine's formatting. When a condition cannot be
/// located verbatim (different escaping) the document is re-serialized from
/// the parsed tree instead.
pub fn redact_attached_conditions(explain_json: &str) -> Result<(String, usize), PlanParseError> {
    let mut parsed: Value = serde_json::from_str(explain_json)?;
    let conditions = find_attached_conditions(&parsed);

    let mut redacted_json = explain_json.to_string();
    for condition in &conditions {
        let redacted = redact_sql(condition)
            .map_err(|source| PlanParseError::Redaction { condition: condition.clone(), source })?;

        let needle = serde_json::to_string(condition)?;
        if !redacted_json.contains(&needle) {
            debug!("attached condition not found verbatim, re-serializing explain plan");
            redact_conditions_in_place(&mut parsed)?;
            return Ok((serde_json::to_string(&parsed)?, conditions.len()));
        }
        redacted_json = redacted_json.replacen(&needle, &serde_json::to_string(&redacted)?, 1);
    }

    Ok((redacted_json, conditions.len()))
}

#[cfg(test)]
pub mod tests {
    use serde_json::json;

    use crate::plan::{find_attached_conditions, redact_attached_conditions};

    const SELF_JOIN: &str = r#"{
  "query_block": {
    "select_id": 1,
    "attached_condition": "(`employees`.`de1`.`to_date` = DATE'9999-01-01')",
    "nested_loop": [
      {
        "table": {
          "table_name": "de1",
          "access_type": "ALL",
          "attached_condition": "(`employees`.`de1`.`to_date` = DATE'9999-01-01')"
        }
      },
      {
        "table": {
          "table_name": "de2",
          "access_type": "ref",
          "attached_condition": "((`employees`.`de2`.`to_date` = DATE'9999-01-01') and (`employees`.`de1`.`emp_no` < `employees`.`de2`.`emp_no`))"
        }
      },
      {
        "table": {
          "table_name": "e2",
          "access_type": "ALL",
          "attached_condition": "(`employees`.`e2`.`hire_date` = `employees`.`e1`.`hire_date`)"
        }
      }
    ]
  }
}"#;

    #[test]
    pub fn test_find_conditions_in_document_order() {
        let value: serde_json::Value = serde_json::from_str(SELF_JOIN).unwrap();

        let conditions = find_attached_conditions(&value);

        assert_eq!(conditions.len(), 4);
        assert_eq!(conditions[0], conditions[1]);
        assert_eq!(conditions[3], "(`employees`.`e2`.`hire_date` = `employees`.`e1`.`hire_date`)");
    }

    #[test]
    pub fn test_find_conditions_in_nested_arrays() {
        let value = json!({
            "query_block": {
                "union_result": {
                    "query_specifications": [
                        { "query_block": { "table": { "attached_condition": "(`a` = 1)" } } },
                        { "query_block": { "table": { "attached_subqueries": [
                            { "query_block": { "table": { "attached_condition": "(`b` = 2)" } } }
                        ] } } }
                    ]
                }
            }
        });

        assert_eq!(find_attached_conditions(&value), vec!["(`a` = 1)", "(`b` = 2)"]);
    }

    #[test]
    pub fn test_redact_raw_payload() {
        let (redacted, count) = redact_attached_conditions(SELF_JOIN).unwrap();

        assert_eq!(count, 4);
        assert!(!redacted.contains("9999-01-01"));
        assert_eq!(redacted.matches("( `employees` . `de1` . `to_date` = date ? )").count(), 2);
        assert!(redacted.contains(
            "( ( `employees` . `de2` . `to_date` = date ? ) and ( `employees` . `de1` . `emp_no` < `employees` . `de2` . `emp_no` ) )"
        ));
        assert!(redacted.contains("( `employees` . `e2` . `hire_date` = `employees` . `e1` . `hire_date` )"));
        // untouched formatting
        assert!(redacted.starts_with("{\n  \"query_block\""));
    }

    #[test]
    pub fn test_redact_without_conditions() {
        let (redacted, count) = redact_attached_conditions(r#"{"query_block": {"select_id": 1}}"#).unwrap();

        assert_eq!(count, 0);
        assert_eq!(redacted, r#"{"query_block": {"select_id": 1}}"#);
    }

    #[test]
    pub fn test_redact_escaped_condition_falls_back_to_tree() {
        let raw = r#"{"query_block": {"table": {"attached_condition": "(`t`.`c` = 'caf\u00e9')"}}}"#;

        let (redacted, count) = redact_attached_conditions(raw).unwrap();

        assert_eq!(count, 1);
        assert!(!redacted.contains("caf"));
        assert!(redacted.contains("( `t` . `c` = ? )"));
    }
}
