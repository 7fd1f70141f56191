use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    #[serde(rename = "Table Scan")]
    TableScan,
    #[serde(rename = "Nested Loop Join")]
    NestedLoopJoin,
    #[serde(rename = "Hash Join")]
    HashJoin,
    #[serde(rename = "Merge Join")]
    MergeJoin,
    #[serde(rename = "Grouping Operation")]
    GroupingOperation,
    #[serde(rename = "Ordering Operation")]
    OrderingOperation,
    #[serde(rename = "Duplicates Removal")]
    DuplicatesRemoval,
    #[serde(rename = "Materialized Subquery")]
    MaterializedSubquery,
    #[serde(rename = "Attached Subquery")]
    AttachedSubquery,
    #[serde(rename = "Union")]
    Union,
    #[default]
    #[serde(rename = "Unknown")]
    Unknown,
}

impl Operation {
    pub fn is_join(&self) -> bool {
        matches!(self, Operation::NestedLoopJoin | Operation::HashJoin | Operation::MergeJoin)
    }
}

/// How the engine reads a table. Index usage is expressed here rather than
/// through a separate operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessType {
    All,
    Index,
    Range,
    Ref,
    EqRef,
    RefOrNull,
    IndexMerge,
    UniqueSubquery,
    IndexSubquery,
    Fulltext,
    Const,
    System,
    #[serde(other)]
    Unknown,
}

impl AccessType {
    /// Maps the engine's `access_type` value, case-insensitively.
    pub fn from_engine(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "all" => AccessType::All,
            "index" => AccessType::Index,
            "range" => AccessType::Range,
            "ref" => AccessType::Ref,
            "eq_ref" => AccessType::EqRef,
            "ref_or_null" => AccessType::RefOrNull,
            "index_merge" => AccessType::IndexMerge,
            "unique_subquery" => AccessType::UniqueSubquery,
            "index_subquery" => AccessType::IndexSubquery,
            "fulltext" => AccessType::Fulltext,
            "const" => AccessType::Const,
            "system" => AccessType::System,
            _ => AccessType::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinAlgorithm {
    Hash,
    Merge,
    NestedLoop,
}

impl JoinAlgorithm {
    pub fn operation(&self) -> Operation {
        match self {
            JoinAlgorithm::Hash => Operation::HashJoin,
            JoinAlgorithm::Merge => Operation::MergeJoin,
            JoinAlgorithm::NestedLoop => Operation::NestedLoopJoin,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanNodeDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_rows: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_cost: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_type: Option<AccessType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_used: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub join_algorithm: Option<JoinAlgorithm>,
    /// Redacted filter condition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub group_by_keys: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sort_keys: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// One node of the normalized plan tree. Children keep the engine's order:
/// join sides and union branches are meaningful by position.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanNode {
    pub operation: Operation,
    #[serde(default)]
    pub details: PlanNodeDetails,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<PlanNode>,
}

impl PlanNode {
    pub fn new(operation: Operation) -> Self {
        Self { operation, ..Default::default() }
    }

    /// A join node over `left` and `right` using `algorithm`.
    pub fn join(algorithm: JoinAlgorithm, left: PlanNode, right: PlanNode) -> Self {
        Self {
            operation: algorithm.operation(),
            details: PlanNodeDetails {
                join_algorithm: Some(algorithm),
                ..Default::default()
            },
            children: vec![left, right],
        }
    }

    pub fn with_child(mut self, child: PlanNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_details(mut self, details: PlanNodeDetails) -> Self {
        self.details = details;
        self
    }
}
