//! The crate-wide error taxonomy.
//!
//! Variants are grouped by failure class: node construction, definition
//! validation, dependency resolution, lookups, value assignment, evaluation,
//! serialization plumbing, and simulation state. Messages carry the node and
//! identifier names needed to diagnose a broken funnel without a debugger.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, FunnelError>;

/// A calculated node that could not be ranked, reported together with its raw
/// definition so the broken dependency is visible in the error message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StuckNode {
    pub name: String,
    pub definition: String,
}

fn fmt_stuck(stuck: &[StuckNode]) -> String {
    let lines: Vec<String> = stuck
        .iter()
        .map(|s| format!("{} : {}", s.name, s.definition))
        .collect();
    lines.join("\n")
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FunnelError {
    // --- Node construction ---
    #[error("Value must be provided for input node '{node}'")]
    MissingInputValue { node: String },
    #[error("KPIs cannot be input node, got input node '{node}'")]
    KpiOnInput { node: String },
    #[error("Definition must be provided for calculated node '{node}'")]
    MissingDefinition { node: String },
    #[error("Node '{node}' has a definition but is tagged as an input node")]
    KindMismatch { node: String },
    #[error("Node '{node}' must provide value_low, value_mid and value_high together")]
    PartialRange { node: String },
    #[error("value_low, value_mid and value_high of node '{node}' must be non-decreasing")]
    UnorderedRange { node: String },
    #[error("Cannot set a value range for calculated node '{node}'")]
    RangeOnCalculated { node: String },

    // --- Definition validation ---
    #[error("Variable '{variable}' in node '{node}' is not a valid input node.")]
    UnknownVariable { node: String, variable: String },
    #[error("Invalid character '{character}' in definition of node '{node}'.")]
    InvalidCharacter { node: String, character: char },

    // --- Dependency resolution ---
    #[error("Unresolvable dependencies detected for the following nodes:\n{}", fmt_stuck(.stuck))]
    UnresolvableDependencies { stuck: Vec<StuckNode> },

    // --- Lookups ---
    #[error("Node '{name}' does not exist.")]
    NodeNotFound { name: String },

    // --- Value assignment ---
    #[error("Cannot set value for calculated node '{node}'.")]
    AssignToCalculated { node: String },
    #[error(
        "When using lookup, value must be 0, 1, or 2 for 10th, 50th, or 90th percentile. Got {selector}"
    )]
    InvalidSelector { node: String, selector: f64 },

    // --- Evaluation ---
    #[error("Division by zero in definition of node '{node}'")]
    DivisionByZero { node: String },
    #[error("Identifier '{identifier}' in definition of node '{node}' has no value")]
    UnresolvedIdentifier { node: String, identifier: String },
    #[error("Definition of node '{node}' is malformed: {message}")]
    MalformedDefinition { node: String, message: String },

    // --- JSON plumbing ---
    #[error("Invalid JSON string")]
    InvalidJson,
    #[error("JSON must contain a list of node definitions")]
    JsonNotAList,

    // --- Simulation ---
    #[error("No KPI node found in the funnel.")]
    NoKpiNodes,
    #[error("Simulation results are not available before simulate() has completed")]
    NotSimulated,
    #[error("{combinations} input combinations exceed the configured ceiling of {ceiling}")]
    CombinationLimitExceeded { combinations: usize, ceiling: usize },
    #[error("Level probabilities {probabilities:?} must sum to 1")]
    InvalidProbabilities { probabilities: [f64; 3] },
}
