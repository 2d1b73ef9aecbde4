//! Decision-funnel sensitivity engine.
//!
//! A funnel is a DAG of named scalar quantities: inputs carry externally
//! supplied values (optionally with a low/mid/high uncertainty range) and
//! calculated nodes derive theirs from restricted arithmetic formulas over
//! other node names. The engine resolves evaluation order from the formula
//! dependencies, re-evaluates the whole funnel deterministically, and runs a
//! full-factorial low/mid/high sensitivity simulation over the inputs:
//! per-input swing and variance attribution plus a weighted P10/P50/P90
//! uncertainty band for every KPI.
//!
//! ```
//! use decision_funnel::{Funnel, NodeRecord, NodesCollection};
//!
//! let mut collection = NodesCollection::new();
//! collection.add_nodes(vec![
//!     NodeRecord::input("input1", 10.0).with_range(8.0, 10.0, 12.0),
//!     NodeRecord::calculated("output1", "input1 * 2").kpi(),
//! ])?;
//!
//! let mut funnel = Funnel::new(collection);
//! funnel.simulate()?;
//! let band = funnel.combined_uncertainty("output1")?;
//! assert_eq!((band.low, band.mid, band.high), (16.0, 20.0, 24.0));
//! # Ok::<(), decision_funnel::FunnelError>(())
//! ```

pub mod error;
pub mod format;
pub mod formula;
pub mod graph;
pub mod simulation;

pub use error::{FunnelError, Result};
pub use graph::{
    dependency_graph, mermaid_flowchart, Node, NodeKind, NodeMetadata, NodeRecord, NodeType,
    NodesCollection, ValueRange,
};
pub use simulation::{
    CombinedUncertainty, Funnel, InputSummary, KpiSensitivity, Level, ScenarioRow, ScenarioTable,
    SimulationConfig, SummaryTable,
};
