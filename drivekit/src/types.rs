use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;
use uuid::Uuid;

/// Liveness of a node as tracked by topology events.
///
/// Whether a node actually answers a poll is a separate fact, see
/// [`crate::agreement::PollOutcome`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeState {
    Up,
    Down,
}

/// One cluster member as known to this driver instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeView {
    pub host_id: Uuid,
    pub address: SocketAddr,
    pub datacenter: Option<String>,
    pub state: NodeState,
    /// Last schema version seen through topology metadata, if any.
    pub schema_version: Option<Uuid>,
}

impl NodeView {
    pub fn new(host_id: Uuid, address: SocketAddr, state: NodeState) -> Self {
        Self {
            host_id,
            address,
            datacenter: None,
            state,
            schema_version: None,
        }
    }

    pub fn is_up(&self) -> bool {
        self.state == NodeState::Up
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestKind {
    Query,
    Prepare,
}

/// A CQL statement plus the options the executor cares about.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Statement {
    pub query: String,
    pub values: Vec<serde_json::Value>,
    pub kind: RequestKind,
    /// Run a schema agreement check even if the response is not a schema change.
    pub await_schema_agreement: bool,
}

impl Statement {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            values: Vec::new(),
            kind: RequestKind::Query,
            await_schema_agreement: false,
        }
    }

    /// A request to prepare `query` instead of running it.
    pub fn prepare(query: impl Into<String>) -> Self {
        Self {
            kind: RequestKind::Prepare,
            ..Self::new(query)
        }
    }

    pub fn with_values(mut self, values: Vec<serde_json::Value>) -> Self {
        self.values = values;
        self
    }

    pub fn with_schema_agreement(mut self) -> Self {
        self.await_schema_agreement = true;
        self
    }

    pub fn class(&self) -> StatementClass {
        StatementClass::of(&self.query)
    }
}

impl From<&str> for Statement {
    fn from(query: &str) -> Self {
        Statement::new(query)
    }
}

impl From<String> for Statement {
    fn from(query: String) -> Self {
        Statement::new(query)
    }
}

/// Coarse classification of CQL text, used where the wire layer does not
/// report the response kind itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatementClass {
    SchemaChange,
    UseKeyspace(String),
    Other,
}

const SCHEMA_OBJECTS: &[&str] = &[
    "KEYSPACE",
    "SCHEMA",
    "TABLE",
    "COLUMNFAMILY",
    "TYPE",
    "INDEX",
    "CUSTOM",
    "MATERIALIZED",
    "FUNCTION",
    "AGGREGATE",
    "TRIGGER",
];

impl StatementClass {
    pub fn of(query: &str) -> Self {
        let mut words = strip_leading_comments(query)
            .split(|c: char| c.is_whitespace() || c == ';')
            .filter(|w| !w.is_empty());

        let Some(verb) = words.next() else {
            return StatementClass::Other;
        };

        match verb.to_ascii_uppercase().as_str() {
            "USE" => match words.next() {
                Some(keyspace) => StatementClass::UseKeyspace(keyspace.trim_matches('"').to_string()),
                None => StatementClass::Other,
            },
            "CREATE" | "ALTER" | "DROP" => {
                // CREATE OR REPLACE FUNCTION ...
                let object = words
                    .map(|w| w.to_ascii_uppercase())
                    .find(|w| w != "OR" && w != "REPLACE");
                match object {
                    Some(object) if SCHEMA_OBJECTS.contains(&object.as_str()) => {
                        StatementClass::SchemaChange
                    }
                    _ => StatementClass::Other,
                }
            }
            _ => StatementClass::Other,
        }
    }
}

/// Skip whitespace and `--`, `//` or `/* */` comments ahead of the first keyword.
pub fn strip_leading_comments(query: &str) -> &str {
    let mut rest = query.trim_start();
    loop {
        if rest.starts_with("--") || rest.starts_with("//") {
            rest = rest.split_once('\n').map_or("", |(_, tail)| tail).trim_start();
        } else if let Some(body) = rest.strip_prefix("/*") {
            rest = body.split_once("*/").map_or("", |(_, tail)| tail).trim_start();
        } else {
            return rest;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row(pub Vec<serde_json::Value>);

impl Row {
    pub fn get(&self, index: usize) -> Option<&serde_json::Value> {
        self.0.get(index)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RowsPage {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
    pub paging_state: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaChange {
    pub change_type: String,
    pub target: String,
    pub keyspace: String,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreparedMetadata {
    pub id: Vec<u8>,
    pub query: String,
    pub bind_markers: usize,
}

/// Protocol-level response body, before any shaping.
#[derive(Debug, Clone, PartialEq)]
pub enum RawResponse {
    Void,
    Rows(RowsPage),
    SetKeyspace(String),
    Prepared(PreparedMetadata),
    SchemaChange(SchemaChange),
}

impl RawResponse {
    pub fn is_schema_change(&self) -> bool {
        matches!(self, RawResponse::SchemaChange(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            RawResponse::Void => "void",
            RawResponse::Rows(_) => "rows",
            RawResponse::SetKeyspace(_) => "set_keyspace",
            RawResponse::Prepared(_) => "prepared",
            RawResponse::SchemaChange(_) => "schema_change",
        }
    }
}

/// A raw response plus the telemetry the connection layer collected for it.
#[derive(Debug, Clone)]
pub struct WireResponse {
    pub response: RawResponse,
    pub coordinator: Option<SocketAddr>,
    pub warnings: Vec<String>,
    pub tracing_id: Option<Uuid>,
}

impl WireResponse {
    pub fn new(response: RawResponse) -> Self {
        Self {
            response,
            coordinator: None,
            warnings: Vec::new(),
            tracing_id: None,
        }
    }
}

/// Per-statement envelope built by the executor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionMetadata {
    pub request_id: Uuid,
    pub coordinator: Option<SocketAddr>,
    pub started_at: DateTime<Utc>,
    pub latency: Duration,
    pub warnings: Vec<String>,
    pub tracing_id: Option<Uuid>,
    /// Only set when a check ran for this statement.
    pub schema_in_agreement: Option<bool>,
}

impl ExecutionMetadata {
    /// `None` when no schema agreement check was performed.
    pub fn is_schema_in_agreement(&self) -> Option<bool> {
        self.schema_in_agreement
    }
}
