//! Dependency-diagram export for visualization consumers.
//!
//! The edge relation is "each identifier in a calculated definition points at
//! that definition's owner". It is exposed both as a petgraph `DiGraph` for
//! programmatic consumers and as Mermaid flowchart code for direct embedding.

use std::collections::HashMap;
use std::fmt::Write;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;

use crate::formula;
use crate::graph::collection::NodesCollection;
use crate::graph::node::Node;

/// Builds the dependency graph over the collection: one graph node per stored
/// node, one edge per (referenced identifier → owning calculated node) pair.
/// Numeric literals produce no edges.
pub fn dependency_graph(collection: &NodesCollection) -> DiGraph<&Node, ()> {
    let mut graph = DiGraph::new();
    let mut indices: HashMap<&str, NodeIndex> = HashMap::new();

    for node in collection.iter() {
        let idx = graph.add_node(node);
        indices.insert(node.name(), idx);
    }
    for node in collection.iter() {
        let Some(definition) = node.definition() else {
            continue;
        };
        let owner = indices[node.name()];
        for ident in formula::identifiers(definition) {
            if let Some(&source) = indices.get(ident) {
                graph.add_edge(source, owner, ());
            }
        }
    }
    graph
}

const MERMAID_HEADER: &str = "---
config:
  layout: elk
  theme: forest
---
flowchart TD
";

const MERMAID_CLASS_DEFS: &str = "
    classDef default fill:#ddd,stroke:#000,stroke-width:1px;
    classDef rounded fill:#bbf,stroke:#000,stroke-width:1px,rx:10px,ry:10px;
    classDef stadium fill:#bfb,stroke:#000,stroke-width:1px,rx:20px,ry:20px;
";

/// Renders the collection as Mermaid flowchart code: inputs as plain boxes,
/// calculated nodes rounded, KPIs stadium-shaped.
pub fn mermaid_flowchart(collection: &NodesCollection) -> String {
    let graph = dependency_graph(collection);
    let mut code = String::from(MERMAID_HEADER);

    for node in graph.node_weights() {
        let style = if node.is_kpi() {
            "stadium"
        } else if node.is_calculated() {
            "rounded"
        } else {
            "default"
        };
        let _ = writeln!(code, "    {}[{}]:::{}", node.name(), node.chart_label(), style);
    }
    for edge in graph.edge_references() {
        let _ = writeln!(
            code,
            "    {} --> {}",
            graph[edge.source()].name(),
            graph[edge.target()].name()
        );
    }

    code.push_str(MERMAID_CLASS_DEFS);
    code
}
