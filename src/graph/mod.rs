//! The funnel's node model and graph store.
pub mod collection;
pub mod diagram;
pub mod node;

// Re-export key types for convenient access
pub use collection::NodesCollection;
pub use diagram::{dependency_graph, mermaid_flowchart};
pub use node::{Node, NodeKind, NodeMetadata, NodeRecord, NodeType, ValueRange};
