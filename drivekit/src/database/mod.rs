pub mod connection;
pub mod control;
pub mod scylla;

pub use connection::DatabaseConnection;
pub use control::ControlChannel;
pub use scylla::{ScyllaConnection, ScyllaControlChannel};
