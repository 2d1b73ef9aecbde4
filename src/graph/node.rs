//! Defines the `Node` type: a single named scalar quantity in the funnel,
//! either an externally supplied input (optionally carrying a low/mid/high
//! uncertainty range) or a value calculated from a formula over other nodes.

use serde::{Deserialize, Serialize};

use crate::error::{FunnelError, Result};
use crate::format::format_value;

/// A low/mid/high uncertainty triple for an input node.
///
/// The three values represent the 10th, 50th and 90th percentiles of the
/// input's distribution and must be non-decreasing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueRange {
    pub low: f64,
    pub mid: f64,
    pub high: f64,
}

impl ValueRange {
    pub fn new(low: f64, mid: f64, high: f64, node: &str) -> Result<ValueRange> {
        if !(low <= mid && mid <= high) {
            return Err(FunnelError::UnorderedRange { node: node.into() });
        }
        Ok(ValueRange { low, mid, high })
    }

    /// The value at ordinal position 0, 1 or 2 (low, mid, high).
    pub fn select(&self, index: usize) -> f64 {
        match index {
            0 => self.low,
            1 => self.mid,
            _ => self.high,
        }
    }
}

/// Display metadata carried by every node. None of it affects evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeMetadata {
    pub name: String,
    pub long_name: String,
    pub description: Option<String>,
    pub format_str: String,
    pub readable_large_number: bool,
}

/// The kind-specific payload of a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeKind {
    /// An externally supplied value, optionally with an uncertainty range.
    Input { range: Option<ValueRange> },
    /// A value derived from a formula over other node names.
    Calculated { definition: String, is_kpi: bool },
}

/// A named scalar quantity in the funnel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub meta: NodeMetadata,
    pub kind: NodeKind,
    /// The current evaluated (calculated) or assigned (input) value.
    pub value: Option<f64>,
    /// Topological depth: 0 for inputs, 1 + max dependency rank for
    /// calculated nodes. Computed by the collection, never user-set.
    pub rank: u32,
}

impl Node {
    /// Builds a node from its wire record, dispatching on the presence of a
    /// `definition` (or an explicit `node_type` tag) to the calculated kind.
    pub fn from_record(record: NodeRecord) -> Result<Node> {
        let name = record.name.clone();
        let meta = NodeMetadata {
            long_name: match record.long_name.as_deref() {
                None | Some("") => derive_long_name(&name),
                Some(long_name) => long_name.to_string(),
            },
            name,
            description: record.description,
            format_str: if record.format_str.is_empty() {
                // default 2 decimal places
                ".2f".to_string()
            } else {
                record.format_str
            },
            readable_large_number: record.readable_large_number,
        };

        let calculated =
            record.definition.is_some() || record.node_type == Some(NodeType::Calculation);
        if calculated {
            if record.node_type == Some(NodeType::Input) {
                return Err(FunnelError::KindMismatch { node: meta.name });
            }
            let Some(definition) = record.definition else {
                return Err(FunnelError::MissingDefinition { node: meta.name });
            };
            return Ok(Node {
                kind: NodeKind::Calculated {
                    definition,
                    is_kpi: record.is_kpi,
                },
                value: record.value,
                rank: 1,
                meta,
            });
        }

        if record.is_kpi {
            return Err(FunnelError::KpiOnInput { node: meta.name });
        }
        let Some(value) = record.value else {
            return Err(FunnelError::MissingInputValue { node: meta.name });
        };
        let range = match (record.value_low, record.value_mid, record.value_high) {
            (None, None, None) => None,
            (Some(low), Some(mid), Some(high)) => {
                Some(ValueRange::new(low, mid, high, &meta.name)?)
            }
            _ => return Err(FunnelError::PartialRange { node: meta.name }),
        };
        Ok(Node {
            kind: NodeKind::Input { range },
            value: Some(value),
            rank: 0,
            meta,
        })
    }

    pub fn name(&self) -> &str {
        &self.meta.name
    }

    pub fn is_input(&self) -> bool {
        matches!(self.kind, NodeKind::Input { .. })
    }

    pub fn is_calculated(&self) -> bool {
        matches!(self.kind, NodeKind::Calculated { .. })
    }

    pub fn is_kpi(&self) -> bool {
        matches!(self.kind, NodeKind::Calculated { is_kpi: true, .. })
    }

    pub fn definition(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Calculated { definition, .. } => Some(definition),
            NodeKind::Input { .. } => None,
        }
    }

    pub fn range(&self) -> Option<ValueRange> {
        match &self.kind {
            NodeKind::Input { range } => *range,
            NodeKind::Calculated { .. } => None,
        }
    }

    /// Updates the node's value. Input nodes must always hold a value.
    pub fn set_value(&mut self, value: Option<f64>) -> Result<()> {
        if self.is_input() && value.is_none() {
            return Err(FunnelError::MissingInputValue {
                node: self.meta.name.clone(),
            });
        }
        self.value = value;
        Ok(())
    }

    /// Replaces the uncertainty range of an input node.
    pub fn update_range(&mut self, range: ValueRange) -> Result<()> {
        // Re-check ordering; the range may have been built with struct syntax.
        let range = ValueRange::new(range.low, range.mid, range.high, &self.meta.name)?;
        match &mut self.kind {
            NodeKind::Input { range: slot } => {
                *slot = Some(range);
                Ok(())
            }
            NodeKind::Calculated { .. } => Err(FunnelError::RangeOnCalculated {
                node: self.meta.name.clone(),
            }),
        }
    }

    fn pretty_value(&self) -> String {
        match self.value {
            Some(value) => format_value(
                value,
                &self.meta.format_str,
                self.meta.readable_large_number,
            ),
            None => "N/A".to_string(),
        }
    }

    /// Two-line label for dependency-diagram rendering.
    pub fn chart_label(&self) -> String {
        format!("{}\n{}", self.meta.long_name, self.pretty_value())
    }

    /// Rebuilds the wire record for this node.
    pub fn to_record(&self) -> NodeRecord {
        let mut record = NodeRecord {
            name: self.meta.name.clone(),
            format_str: self.meta.format_str.clone(),
            long_name: Some(self.meta.long_name.clone()),
            description: self.meta.description.clone(),
            readable_large_number: self.meta.readable_large_number,
            value: self.value,
            ..NodeRecord::default()
        };
        match &self.kind {
            NodeKind::Input { range } => {
                record.node_type = Some(NodeType::Input);
                if let Some(range) = range {
                    record.value_low = Some(range.low);
                    record.value_mid = Some(range.mid);
                    record.value_high = Some(range.high);
                }
            }
            NodeKind::Calculated { definition, is_kpi } => {
                record.node_type = Some(NodeType::Calculation);
                record.definition = Some(definition.clone());
                record.is_kpi = *is_kpi;
            }
        }
        record
    }
}

impl std::fmt::Display for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            NodeKind::Input { range } => {
                write!(
                    f,
                    "{} (Type: input, Value: {}, Rank: {})",
                    self.meta.name,
                    self.pretty_value(),
                    self.rank
                )?;
                if let Some(range) = range {
                    write!(
                        f,
                        ", Input Range: ({}, {}, {})",
                        range.low, range.mid, range.high
                    )?;
                }
                Ok(())
            }
            NodeKind::Calculated { definition, .. } => write!(
                f,
                "{} (Type: calculation, Definition: {}, Value: {}, Rank: {})",
                self.meta.name,
                definition,
                self.pretty_value(),
                self.rank
            ),
        }
    }
}

/// Turns `subscriber_share` into `Subscriber Share`.
fn derive_long_name(name: &str) -> String {
    name.split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Explicit node-type tag carried by wire records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeType {
    #[serde(rename = "input")]
    Input,
    #[serde(rename = "calculation")]
    Calculation,
}

/// The flat wire shape for batch insertion, serialization and deserialization.
///
/// A record is calculated when it carries a `definition` (or is explicitly
/// tagged `"calculation"`), otherwise it is an input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_type: Option<NodeType>,
    #[serde(default)]
    pub format_str: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_low: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_mid: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_high: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition: Option<String>,
    #[serde(default)]
    pub is_kpi: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub long_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default = "default_readable")]
    pub readable_large_number: bool,
}

fn default_readable() -> bool {
    true
}

impl Default for NodeRecord {
    fn default() -> Self {
        NodeRecord {
            name: String::new(),
            node_type: None,
            format_str: String::new(),
            value: None,
            value_low: None,
            value_mid: None,
            value_high: None,
            definition: None,
            is_kpi: false,
            long_name: None,
            description: None,
            readable_large_number: true,
        }
    }
}

impl NodeRecord {
    /// An input record with a concrete value.
    pub fn input(name: &str, value: f64) -> NodeRecord {
        NodeRecord {
            name: name.to_string(),
            node_type: Some(NodeType::Input),
            value: Some(value),
            ..NodeRecord::default()
        }
    }

    /// A calculated record with a formula definition.
    pub fn calculated(name: &str, definition: &str) -> NodeRecord {
        NodeRecord {
            name: name.to_string(),
            node_type: Some(NodeType::Calculation),
            definition: Some(definition.to_string()),
            ..NodeRecord::default()
        }
    }

    /// Attaches a low/mid/high uncertainty range.
    pub fn with_range(mut self, low: f64, mid: f64, high: f64) -> NodeRecord {
        self.value_low = Some(low);
        self.value_mid = Some(mid);
        self.value_high = Some(high);
        self
    }

    /// Flags a calculated record as a key performance indicator.
    pub fn kpi(mut self) -> NodeRecord {
        self.is_kpi = true;
        self
    }

    pub fn with_format(mut self, format_str: &str) -> NodeRecord {
        self.format_str = format_str.to_string();
        self
    }

    pub fn with_long_name(mut self, long_name: &str) -> NodeRecord {
        self.long_name = Some(long_name.to_string());
        self
    }
}
