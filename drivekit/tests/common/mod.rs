#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use uuid::Uuid;

use drivekit::types::{
    PreparedMetadata, RawResponse, RequestKind, Row, RowsPage, SchemaChange, StatementClass,
    WireResponse,
};
use drivekit::{
    AgreementSettings, ControlChannel, DatabaseConnection, DriverError, ExecutionSettings,
    NodeState, NodeView, RequestExecutor, ResultShapeRegistry, Statement,
};

struct SimNode {
    host_id: Uuid,
    address: SocketAddr,
    state: NodeState,
    paused: bool,
    schema_version: Uuid,
}

/// In-memory cluster standing in for both the wire and the control channel.
///
/// Schema changes reach every node that is UP and not paused. A paused node
/// stays UP in the roster but never answers a poll. Resuming or restarting a
/// node brings it up to date with the rest of the cluster.
pub struct SimulatedCluster {
    nodes: Mutex<Vec<SimNode>>,
    latest_version: Mutex<Uuid>,
    send_delay: Mutex<Option<Duration>>,
    fail_sends: Mutex<bool>,
    channel_down: Mutex<bool>,
    pub sends: AtomicUsize,
    pub polls: AtomicUsize,
}

impl SimulatedCluster {
    pub fn new(size: usize) -> Arc<Self> {
        let version = Uuid::new_v4();
        let nodes = (0..size)
            .map(|i| SimNode {
                host_id: Uuid::new_v4(),
                address: SocketAddr::from(([127, 0, 0, i as u8 + 1], 9042)),
                state: NodeState::Up,
                paused: false,
                schema_version: version,
            })
            .collect();

        Arc::new(Self {
            nodes: Mutex::new(nodes),
            latest_version: Mutex::new(version),
            send_delay: Mutex::new(None),
            fail_sends: Mutex::new(false),
            channel_down: Mutex::new(false),
            sends: AtomicUsize::new(0),
            polls: AtomicUsize::new(0),
        })
    }

    pub fn pause(&self, index: usize) {
        self.nodes.lock()[index].paused = true;
    }

    pub fn resume(&self, index: usize) {
        let latest = *self.latest_version.lock();
        let mut nodes = self.nodes.lock();
        nodes[index].paused = false;
        nodes[index].schema_version = latest;
    }

    pub fn stop(&self, index: usize) {
        self.nodes.lock()[index].state = NodeState::Down;
    }

    pub fn start(&self, index: usize) {
        let latest = *self.latest_version.lock();
        let mut nodes = self.nodes.lock();
        nodes[index].state = NodeState::Up;
        nodes[index].schema_version = latest;
    }

    pub fn set_send_delay(&self, delay: Duration) {
        *self.send_delay.lock() = Some(delay);
    }

    pub fn fail_sends(&self) {
        *self.fail_sends.lock() = true;
    }

    pub fn take_channel_down(&self) {
        *self.channel_down.lock() = true;
    }

    pub fn version_of(&self, index: usize) -> Uuid {
        self.nodes.lock()[index].schema_version
    }

    fn apply_schema_change(&self) {
        let version = Uuid::new_v4();
        *self.latest_version.lock() = version;
        for node in self.nodes.lock().iter_mut() {
            if node.state == NodeState::Up && !node.paused {
                node.schema_version = version;
            }
        }
    }
}

#[async_trait]
impl DatabaseConnection for SimulatedCluster {
    async fn send(&self, statement: &Statement) -> Result<WireResponse, DriverError> {
        self.sends.fetch_add(1, Ordering::SeqCst);

        let delay = *self.send_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if *self.fail_sends.lock() {
            return Err(DriverError::Request("connection reset by peer".to_string()));
        }

        let response = match statement.kind {
            RequestKind::Prepare => RawResponse::Prepared(PreparedMetadata {
                id: vec![0x01, 0x02],
                query: statement.query.clone(),
                bind_markers: statement.query.matches('?').count(),
            }),
            RequestKind::Query => match statement.class() {
                StatementClass::SchemaChange => {
                    self.apply_schema_change();
                    RawResponse::SchemaChange(SchemaChange {
                        change_type: "CREATED".to_string(),
                        target: "TABLE".to_string(),
                        keyspace: "ks".to_string(),
                        name: None,
                    })
                }
                StatementClass::UseKeyspace(keyspace) => RawResponse::SetKeyspace(keyspace),
                StatementClass::Other if statement.query.to_ascii_uppercase().starts_with("SELECT") => {
                    RawResponse::Rows(RowsPage {
                        columns: vec!["k".to_string(), "v".to_string()],
                        rows: vec![Row(vec![serde_json::json!(1), serde_json::json!(10)])],
                        paging_state: None,
                    })
                }
                StatementClass::Other => RawResponse::Void,
            },
        };

        let mut wire = WireResponse::new(response);
        wire.coordinator = self.nodes.lock().first().map(|node| node.address);
        Ok(wire)
    }

    fn driver_name(&self) -> &str {
        "simulated"
    }
}

#[async_trait]
impl ControlChannel for SimulatedCluster {
    async fn list_nodes(&self) -> Result<Vec<NodeView>, DriverError> {
        if *self.channel_down.lock() {
            return Err(DriverError::ControlChannel("control connection closed".to_string()));
        }
        Ok(self
            .nodes
            .lock()
            .iter()
            .map(|node| NodeView {
                host_id: node.host_id,
                address: node.address,
                datacenter: Some("dc1".to_string()),
                state: node.state,
                schema_version: Some(node.schema_version),
            })
            .collect())
    }

    async fn query_schema_version(&self, node: &NodeView) -> Result<Uuid, DriverError> {
        self.polls.fetch_add(1, Ordering::SeqCst);

        let reply = {
            let nodes = self.nodes.lock();
            nodes
                .iter()
                .find(|n| n.host_id == node.host_id)
                .map(|n| (n.state, n.paused, n.schema_version))
        };

        match reply {
            Some((NodeState::Up, false, version)) => Ok(version),
            Some((NodeState::Up, true, _)) => std::future::pending().await,
            Some((NodeState::Down, _, _)) => {
                Err(DriverError::Request(format!("node {} is down", node.address)))
            }
            None => Err(DriverError::Request(format!("unknown node {}", node.address))),
        }
    }
}

pub fn settings(agreement_timeout: Duration) -> ExecutionSettings {
    ExecutionSettings {
        request_timeout: Duration::from_secs(30),
        agreement: AgreementSettings {
            timeout: agreement_timeout,
            interval: Duration::from_millis(200),
        },
    }
}

pub fn executor_with(
    cluster: &Arc<SimulatedCluster>,
    registry: ResultShapeRegistry,
    settings: ExecutionSettings,
) -> RequestExecutor {
    RequestExecutor::new(cluster.clone(), cluster.clone(), Arc::new(registry), settings)
}

/// Executor over `cluster` with the built-in shapes. Must run inside a tokio runtime.
pub fn executor(cluster: &Arc<SimulatedCluster>, settings: ExecutionSettings) -> RequestExecutor {
    executor_with(cluster, ResultShapeRegistry::with_defaults(Handle::current()), settings)
}

pub fn create_table(name: &str) -> String {
    format!("CREATE TABLE {} (k int primary key, v int)", name)
}
