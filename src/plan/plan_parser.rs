use serde_json::Value;
use tracing::{debug, error};

use crate::{
    plan::{AccessType, IncompletePlan, JoinAlgorithm, Operation, PlanNode, PlanNodeDetails, PlanParseError},
    sql::redact_sql,
};

type NodeParser = fn(&Value, &mut PlanNode) -> Result<(), PlanParseError>;

/// Keys of a query block that identify its operation. The engine emits at
/// most one of them per block; the first match wins.
const NODE_PARSERS: [(&str, NodeParser); 6] = [
    ("table", parse_table_node as NodeParser),
    ("nested_loop", parse_nested_loop_node as NodeParser),
    ("grouping_operation", parse_grouping_node as NodeParser),
    ("ordering_operation", parse_ordering_node as NodeParser),
    ("duplicates_removal", parse_duplicates_removal_node as NodeParser),
    ("union_result", parse_union_node as NodeParser),
];

/// Converts an `EXPLAIN FORMAT=JSON` document into a [`PlanNode`] tree.
///
/// On failure the tree built so far is returned inside the error so it can
/// be logged for diagnosis.
pub fn parse_explain_plan(explain_json: &Value) -> Result<PlanNode, IncompletePlan> {
    let mut root = PlanNode::default();

    let Some(query_block) = explain_json.get("query_block") else {
        return Err(IncompletePlan { error: PlanParseError::MissingQueryBlock, partial: root });
    };

    match parse_query_block(query_block, &mut root) {
        Ok(()) => Ok(root),
        Err(error) => Err(IncompletePlan { error, partial: root }),
    }
}

pub fn parse_explain_plan_bytes(explain_json: &[u8]) -> Result<PlanNode, IncompletePlan> {
    let value: Value = serde_json::from_slice(explain_json)
        .map_err(|err| IncompletePlan { error: err.into(), partial: PlanNode::default() })?;

    parse_explain_plan(&value)
}

fn parse_query_block(query_block: &Value, node: &mut PlanNode) -> Result<(), PlanParseError> {
    for (key, parser) in NODE_PARSERS.iter() {
        if let Some(value) = query_block.get(*key) {
            return parser(value, node);
        }
    }

    // not necessarily an error, the block may describe an operation we don't model yet
    node.operation = Operation::Unknown;
    if let Some(message) = query_block.get("message").and_then(Value::as_str) {
        node.details.warning = Some(message.to_string());
    }
    Ok(())
}

fn parse_table_node(table: &Value, node: &mut PlanNode) -> Result<(), PlanParseError> {
    node.operation = Operation::TableScan;

    // only the table side of a hash join carries this hint
    if table.get("using_join_buffer").and_then(Value::as_str) == Some("hash join") {
        node.details.join_algorithm = Some(JoinAlgorithm::Hash);
    }

    let alias = table.get("table_name").and_then(Value::as_str)
        .ok_or(PlanParseError::MissingField { node: "table", field: "table_name" })?;
    node.details.alias = Some(alias.to_string());

    let access_type = table.get("access_type").and_then(Value::as_str)
        .ok_or(PlanParseError::MissingField { node: "table", field: "access_type" })?;
    node.details.access_type = Some(AccessType::from_engine(access_type));

    if let Some(rows) = table.get("rows_produced_per_join").and_then(Value::as_i64) {
        node.details.estimated_rows = Some(rows);
    }

    if let Some(cost) = table.get("cost_info").and_then(|cost_info| cost_info.get("prefix_cost")) {
        node.details.estimated_cost = Some(parse_cost(cost)?);
    }

    if let Some(condition) = table.get("attached_condition").and_then(Value::as_str) {
        let redacted = redact_sql(condition)
            .map_err(|source| PlanParseError::Redaction { condition: condition.to_string(), source })?;
        node.details.condition = Some(redacted);
    }

    if let Some(key) = table.get("key").and_then(Value::as_str) {
        node.details.key_used = Some(key.to_string());
    }

    if let Some(materialized) = table.get("materialized_from_subquery") {
        let mut child = PlanNode::default();
        let result = parse_subquery_node(Operation::MaterializedSubquery, "materialized_from_subquery", materialized, &mut child);
        node.children.push(child);
        result?;
    }

    if let Some(attached) = table.get("attached_subqueries").and_then(Value::as_array) {
        for subquery in attached {
            let mut child = PlanNode::default();
            match parse_subquery_node(Operation::AttachedSubquery, "attached_subqueries", subquery, &mut child) {
                Ok(()) => node.children.push(child),
                Err(err) => debug!(err = %err, "skipping unparsable attached subquery"),
            }
        }
    }

    Ok(())
}

fn parse_cost(cost: &Value) -> Result<f64, PlanParseError> {
    match cost {
        Value::String(text) => text.parse::<f64>()
            .map_err(|_| PlanParseError::InvalidCost { value: text.clone() }),
        Value::Number(number) => number.as_f64()
            .ok_or_else(|| PlanParseError::InvalidCost { value: number.to_string() }),
        other => Err(PlanParseError::InvalidCost { value: other.to_string() }),
    }
}

/// Folds the join participants into a left-deep binary tree.
///
/// Each participant after the first is joined to everything before it. The
/// join algorithm hint found on a participant table is moved onto the join
/// node built for it, which turns that node into a hash or merge join.
fn parse_nested_loop_node(nested_loop: &Value, node: &mut PlanNode) -> Result<(), PlanParseError> {
    let participants = nested_loop.as_array()
        .ok_or(PlanParseError::NotAnArray { node: "nested_loop" })?;

    let mut accumulator: Option<PlanNode> = None;
    for participant in participants {
        let Some(table) = participant.get("table") else {
            debug!("no table node found in nested loop join");
            continue;
        };

        let mut current = PlanNode::default();
        if let Err(err) = parse_table_node(table, &mut current) {
            error!(err = %err, "failed to parse table node in nested loop join");
            continue;
        }

        accumulator = Some(match accumulator.take() {
            None => current,
            Some(previous) => {
                let algorithm = current.details.join_algorithm.take().unwrap_or(JoinAlgorithm::NestedLoop);
                PlanNode::join(algorithm, previous, current)
            },
        });
    }

    let nested_loop_details = PlanNodeDetails {
        join_algorithm: Some(JoinAlgorithm::NestedLoop),
        ..Default::default()
    };

    *node = match accumulator {
        Some(joined) if joined.operation.is_join() => joined,
        Some(single) => PlanNode::new(Operation::NestedLoopJoin)
            .with_details(nested_loop_details)
            .with_child(single),
        None => PlanNode::new(Operation::NestedLoopJoin).with_details(nested_loop_details),
    };

    Ok(())
}

fn parse_wrapper_node(operation: Operation, payload: &Value, node: &mut PlanNode) -> Result<(), PlanParseError> {
    node.operation = operation;

    let mut child = PlanNode::default();
    let result = parse_query_block(payload, &mut child);
    node.children.push(child);
    result
}

fn parse_grouping_node(payload: &Value, node: &mut PlanNode) -> Result<(), PlanParseError> {
    parse_wrapper_node(Operation::GroupingOperation, payload, node)
}

fn parse_ordering_node(payload: &Value, node: &mut PlanNode) -> Result<(), PlanParseError> {
    parse_wrapper_node(Operation::OrderingOperation, payload, node)
}

fn parse_duplicates_removal_node(payload: &Value, node: &mut PlanNode) -> Result<(), PlanParseError> {
    parse_wrapper_node(Operation::DuplicatesRemoval, payload, node)
}

fn parse_subquery_node(operation: Operation, key: &'static str, subquery: &Value, node: &mut PlanNode) -> Result<(), PlanParseError> {
    node.operation = operation;

    let query_block = subquery.get("query_block")
        .ok_or(PlanParseError::MissingField { node: key, field: "query_block" })?;

    let mut child = PlanNode::default();
    let result = parse_query_block(query_block, &mut child);
    node.children.push(child);
    result
}

/// One child per query specification, in source order. A branch that fails
/// to parse is left out instead of failing the whole union.
fn parse_union_node(union_result: &Value, node: &mut PlanNode) -> Result<(), PlanParseError> {
    node.operation = Operation::Union;

    let specifications = union_result.get("query_specifications")
        .ok_or(PlanParseError::MissingField { node: "union_result", field: "query_specifications" })?
        .as_array()
        .ok_or(PlanParseError::NotAnArray { node: "query_specifications" })?;

    for specification in specifications {
        let Some(query_block) = specification.get("query_block") else {
            continue;
        };

        let mut child = PlanNode::default();
        match parse_query_block(query_block, &mut child) {
            Ok(()) => node.children.push(child),
            Err(err) => debug!(err = %err, "skipping unparsable union branch"),
        }
    }

    Ok(())
}
