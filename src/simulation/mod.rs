//! Full-factorial sensitivity simulation over a node collection.
pub mod funnel;
pub mod level;
pub mod stats;

pub use funnel::{
    CombinedUncertainty, Funnel, InputSummary, KpiSensitivity, ScenarioRow, ScenarioTable,
    SimulationConfig, SummaryTable,
};
pub use level::Level;
pub use stats::weighted_quantile;
