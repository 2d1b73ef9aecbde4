//! The three uncertainty levels an input can sit at during simulation.

use serde::{Deserialize, Serialize};

/// One of the low/mid/high positions of an input's uncertainty range.
///
/// Serialized under the display labels (`"value_low"` etc.) so scenario
/// tables carry labels rather than raw selector ordinals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Level {
    #[serde(rename = "value_low")]
    Low,
    #[serde(rename = "value_mid")]
    Mid,
    #[serde(rename = "value_high")]
    High,
}

impl Level {
    pub const ALL: [Level; 3] = [Level::Low, Level::Mid, Level::High];

    /// Selection probabilities: a triangular-ish weighting concentrated on
    /// the mid value.
    pub const DEFAULT_PROBABILITIES: [f64; 3] = [0.25, 0.5, 0.25];

    pub fn index(self) -> usize {
        match self {
            Level::Low => 0,
            Level::Mid => 1,
            Level::High => 2,
        }
    }

    pub fn from_index(index: usize) -> Level {
        match index {
            0 => Level::Low,
            1 => Level::Mid,
            _ => Level::High,
        }
    }

    /// The ordinal selector understood by
    /// [`NodesCollection::set_node_values`](crate::graph::NodesCollection::set_node_values)
    /// in lookup mode.
    pub fn selector(self) -> f64 {
        self.index() as f64
    }

    pub fn label(self) -> &'static str {
        match self {
            Level::Low => "value_low",
            Level::Mid => "value_mid",
            Level::High => "value_high",
        }
    }

    /// The quantile each level stands in for: low ≈ P10, mid ≈ P50,
    /// high ≈ P90.
    pub fn represented_quantile(self) -> f64 {
        match self {
            Level::Low => 0.1,
            Level::Mid => 0.5,
            Level::High => 0.9,
        }
    }
}
