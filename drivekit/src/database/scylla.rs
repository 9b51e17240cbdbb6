use std::net::SocketAddr;
use std::num::NonZeroUsize;
use std::sync::Arc;

use async_trait::async_trait;
use scylla::frame::response::result::CqlValue;
use scylla::load_balancing::{FallbackPlan, LoadBalancingPolicy, RoutingInfo};
use scylla::query::Query;
use scylla::routing::Shard;
use scylla::transport::session::PoolSize;
use scylla::transport::{ClusterData, NodeRef};
use scylla::{ExecutionProfile, QueryResult, Session, SessionBuilder};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::DatabaseConfig;
use crate::database::{ControlChannel, DatabaseConnection};
use crate::errors::DriverError;
use crate::types::{
    strip_leading_comments, NodeState, NodeView, PreparedMetadata, RawResponse, RequestKind, Row,
    RowsPage, SchemaChange, Statement, StatementClass, WireResponse,
};

/// ScyllaDB/Cassandra connection wrapper with session management
#[derive(Clone)]
pub struct ScyllaConnection {
    session: Arc<Session>,
    config: DatabaseConfig,
}

impl ScyllaConnection {
    /// Create a new connection to the cluster
    pub async fn new(config: &DatabaseConfig) -> Result<Self, DriverError> {
        info!("Connecting to CQL cluster: {:?}", config.hosts);

        let pool_size = NonZeroUsize::new(config.pool_size as usize).unwrap_or(NonZeroUsize::MIN);

        // Agreement is handled by the executor, not by the underlying driver.
        let mut session_builder = SessionBuilder::new()
            .known_nodes(config.contact_points())
            .connection_timeout(config.connection_timeout())
            .pool_size(PoolSize::PerShard(pool_size))
            .auto_await_schema_agreement(false);

        if let Some(keyspace) = &config.keyspace {
            session_builder = session_builder.use_keyspace(keyspace, true);
        }

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            session_builder = session_builder.user(username, password);
        }

        let session = session_builder
            .build()
            .await
            .map_err(|e| DriverError::Request(format!("Connection failed: {}", e)))?;

        info!("Successfully connected to CQL cluster");

        Ok(Self {
            session: Arc::new(session),
            config: config.clone(),
        })
    }

    /// Get the underlying session
    pub fn get_session(&self) -> &Session {
        &self.session
    }

    /// Control channel sharing this connection's session
    pub fn control_channel(&self) -> ScyllaControlChannel {
        ScyllaControlChannel {
            session: self.session.clone(),
        }
    }

    async fn run_query(&self, statement: &Statement) -> Result<WireResponse, DriverError> {
        let values: Vec<Option<CqlValue>> = statement.values.iter().map(json_to_cql_value).collect();

        let result = self
            .session
            .query_unpaged(statement.query.as_str(), values)
            .await
            .map_err(|e| DriverError::Request(format!("Query execution failed: {}", e)))?;

        let response = match statement.class() {
            StatementClass::SchemaChange => RawResponse::SchemaChange(describe_schema_change(
                &statement.query,
                self.config.keyspace.as_deref(),
            )),
            StatementClass::UseKeyspace(keyspace) => RawResponse::SetKeyspace(keyspace),
            StatementClass::Other if result.rows.is_some() => RawResponse::Rows(rows_page(&result)),
            StatementClass::Other => RawResponse::Void,
        };

        Ok(WireResponse {
            response,
            coordinator: None,
            warnings: result.warnings.clone(),
            tracing_id: result.tracing_id,
        })
    }

    async fn run_prepare(&self, statement: &Statement) -> Result<WireResponse, DriverError> {
        let prepared = self
            .session
            .prepare(statement.query.as_str())
            .await
            .map_err(|e| DriverError::Request(format!("Failed to prepare statement: {}", e)))?;

        Ok(WireResponse::new(RawResponse::Prepared(PreparedMetadata {
            id: prepared.get_id().to_vec(),
            query: statement.query.clone(),
            bind_markers: prepared.get_variable_col_specs().len(),
        })))
    }
}

#[async_trait]
impl DatabaseConnection for ScyllaConnection {
    async fn send(&self, statement: &Statement) -> Result<WireResponse, DriverError> {
        match statement.kind {
            RequestKind::Query => self.run_query(statement).await,
            RequestKind::Prepare => self.run_prepare(statement).await,
        }
    }

    fn driver_name(&self) -> &str {
        "scylla"
    }
}

const LOCAL_SCHEMA_VERSION: &str =
    "SELECT host_id, schema_version FROM system.local WHERE key = 'local'";

/// Control channel backed by the driver's cluster metadata.
///
/// The roster and liveness come from the session's topology view. Each node
/// is asked for its own schema version from `system.local`, over a request
/// pinned to that node.
#[derive(Clone)]
pub struct ScyllaControlChannel {
    session: Arc<Session>,
}

impl ScyllaControlChannel {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }
}

#[async_trait]
impl ControlChannel for ScyllaControlChannel {
    async fn list_nodes(&self) -> Result<Vec<NodeView>, DriverError> {
        let cluster = self.session.get_cluster_data();
        let nodes: Vec<NodeView> = cluster
            .get_nodes_info()
            .iter()
            .map(|node| NodeView {
                host_id: node.host_id,
                address: SocketAddr::new(node.address.ip(), node.address.port()),
                datacenter: node.datacenter.clone(),
                state: if node.is_down() {
                    NodeState::Down
                } else {
                    NodeState::Up
                },
                schema_version: None,
            })
            .collect();

        if nodes.is_empty() {
            return Err(DriverError::ControlChannel(
                "cluster metadata lists no nodes".to_string(),
            ));
        }
        Ok(nodes)
    }

    async fn query_schema_version(&self, node: &NodeView) -> Result<Uuid, DriverError> {
        let profile = ExecutionProfile::builder()
            .load_balancing_policy(Arc::new(SingleNodePolicy {
                host_id: node.host_id,
            }))
            .build()
            .into_handle();

        let mut query = Query::new(LOCAL_SCHEMA_VERSION);
        query.set_execution_profile_handle(Some(profile));

        let result = self
            .session
            .query_unpaged(query, ())
            .await
            .map_err(|e| {
                DriverError::Request(format!("Schema version query to {} failed: {}", node.address, e))
            })?;

        let row = result
            .single_row_typed::<(Option<Uuid>, Option<Uuid>)>()
            .map_err(|e| DriverError::Request(format!("Unexpected schema version result: {}", e)))?;
        debug!("Node {} answered the schema version query", node.address);

        local_schema_version(node, row)
    }
}

/// Extract the version from a `system.local` row, refusing rows from any other host.
fn local_schema_version(
    node: &NodeView,
    (host_id, schema_version): (Option<Uuid>, Option<Uuid>),
) -> Result<Uuid, DriverError> {
    if host_id != Some(node.host_id) {
        return Err(DriverError::Request(format!(
            "schema version for {} was answered by host {:?}",
            node.host_id, host_id
        )));
    }
    schema_version.ok_or_else(|| {
        DriverError::Request(format!(
            "node {} ({}) reported no schema version",
            node.address, node.host_id
        ))
    })
}

/// Routes every request to one node and never falls back to another.
#[derive(Debug)]
struct SingleNodePolicy {
    host_id: Uuid,
}

impl SingleNodePolicy {
    fn target<'a>(&self, cluster: &'a ClusterData) -> Option<NodeRef<'a>> {
        cluster
            .get_nodes_info()
            .iter()
            .find(|node| node.host_id == self.host_id)
    }
}

impl LoadBalancingPolicy for SingleNodePolicy {
    fn pick<'a>(
        &'a self,
        _query: &'a RoutingInfo,
        cluster: &'a ClusterData,
    ) -> Option<(NodeRef<'a>, Option<Shard>)> {
        self.target(cluster).map(|node| (node, None))
    }

    fn fallback<'a>(&'a self, _query: &'a RoutingInfo, cluster: &'a ClusterData) -> FallbackPlan<'a> {
        Box::new(self.target(cluster).into_iter().map(|node| (node, None)))
    }

    fn name(&self) -> String {
        "SingleNodePolicy".to_string()
    }
}

fn rows_page(result: &QueryResult) -> RowsPage {
    let columns = result
        .col_specs()
        .iter()
        .map(|spec| spec.name.clone())
        .collect();

    let rows = result
        .rows
        .iter()
        .flatten()
        .map(|row| {
            Row(row
                .columns
                .iter()
                .map(|column| column.clone().map(cql_value_to_json).unwrap_or(serde_json::Value::Null))
                .collect())
        })
        .collect();

    RowsPage {
        columns,
        rows,
        paging_state: None,
    }
}

/// Best-effort description of a DDL statement from its text.
fn describe_schema_change(query: &str, default_keyspace: Option<&str>) -> SchemaChange {
    let words: Vec<&str> = strip_leading_comments(query)
        .split(|c: char| c.is_whitespace() || c == '(' || c == ';')
        .filter(|w| !w.is_empty())
        .collect();

    let change_type = match words.first().map(|w| w.to_ascii_uppercase()).as_deref() {
        Some("CREATE") => "CREATED",
        Some("ALTER") => "UPDATED",
        _ => "DROPPED",
    };

    let mut rest = words
        .iter()
        .skip(1)
        .filter(|w| !matches!(w.to_ascii_uppercase().as_str(), "OR" | "REPLACE" | "CUSTOM" | "MATERIALIZED"));
    let target = rest.next().map(|w| w.to_ascii_uppercase()).unwrap_or_default();
    let name = rest
        .find(|w| !matches!(w.to_ascii_uppercase().as_str(), "IF" | "NOT" | "EXISTS"))
        .map(|w| w.trim_matches('"'))
        .unwrap_or_default();

    let (keyspace, name) = match (target.as_str(), name.split_once('.')) {
        ("KEYSPACE" | "SCHEMA", _) => (name.to_string(), None),
        (_, Some((keyspace, object))) => (keyspace.to_string(), Some(object.to_string())),
        (_, None) => (
            default_keyspace.unwrap_or_default().to_string(),
            Some(name.to_string()),
        ),
    };

    SchemaChange {
        change_type: change_type.to_string(),
        target,
        keyspace,
        name,
    }
}

/// Convert a CQL value to JSON
fn cql_value_to_json(value: CqlValue) -> serde_json::Value {
    use serde_json::Value;

    match value {
        CqlValue::Ascii(s) | CqlValue::Text(s) => Value::String(s),
        CqlValue::Boolean(b) => Value::Bool(b),
        CqlValue::TinyInt(i) => Value::from(i),
        CqlValue::SmallInt(i) => Value::from(i),
        CqlValue::Int(i) => Value::from(i),
        CqlValue::BigInt(i) => Value::from(i),
        CqlValue::Float(f) => Value::from(f),
        CqlValue::Double(f) => Value::from(f),
        CqlValue::Uuid(u) => Value::String(u.to_string()),
        CqlValue::Inet(ip) => Value::String(ip.to_string()),
        CqlValue::Blob(bytes) => Value::String(format!(
            "0x{}",
            bytes.iter().map(|b| format!("{:02x}", b)).collect::<String>()
        )),
        CqlValue::List(items) | CqlValue::Set(items) => {
            Value::Array(items.into_iter().map(cql_value_to_json).collect())
        }
        CqlValue::Map(entries) => Value::Object(
            entries
                .into_iter()
                .map(|(key, value)| {
                    let key = match cql_value_to_json(key) {
                        Value::String(s) => s,
                        other => other.to_string(),
                    };
                    (key, cql_value_to_json(value))
                })
                .collect(),
        ),
        CqlValue::Empty => Value::Null,
        other => Value::String(format!("{:?}", other)),
    }
}

/// Convert JSON value to a bindable CQL value
fn json_to_cql_value(value: &serde_json::Value) -> Option<CqlValue> {
    use serde_json::Value;

    match value {
        Value::Null => None,
        Value::Bool(b) => Some(CqlValue::Boolean(*b)),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(CqlValue::BigInt(i))
            } else {
                n.as_f64().map(CqlValue::Double)
            }
        }
        Value::String(s) => Some(CqlValue::Text(s.clone())),
        Value::Array(items) => Some(CqlValue::List(
            items.iter().filter_map(json_to_cql_value).collect(),
        )),
        Value::Object(entries) => Some(CqlValue::Map(
            entries
                .iter()
                .filter_map(|(k, v)| json_to_cql_value(v).map(|v| (CqlValue::Text(k.clone()), v)))
                .collect(),
        )),
    }
}
