// VIGIL NODE
// Wires operator sync, instant locking and the peer list into one node.

pub mod config;
pub mod environment;
pub mod node;

pub use config::NodeConfig;
pub use environment::RosterSyncEnvironment;
pub use node::{Node, NodeError, NodeStatus};
