//! The sensitivity simulator: drives a node collection through every
//! low/mid/high combination of its inputs and condenses the results into a
//! per-input swing/variance summary with a weighted uncertainty band per KPI.

use std::collections::HashMap;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{FunnelError, Result};
use crate::graph::NodesCollection;
use crate::simulation::level::Level;
use crate::simulation::stats::weighted_quantile;

/// Grids at or above this row count are enumerated on the rayon pool, one
/// cloned collection per worker thread.
const PARALLEL_THRESHOLD: usize = 243; // 3^5

/// Tuning knobs for the simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Probability of an input sitting at its low/mid/high value. Applied
    /// identically to every input; must sum to 1.
    pub level_probabilities: [f64; 3],
    /// Optional ceiling on the 3^k combination count. Enumeration fails fast
    /// before starting when the grid would exceed it.
    pub max_combinations: Option<usize>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            level_probabilities: Level::DEFAULT_PROBABILITIES,
            max_combinations: None,
        }
    }
}

impl SimulationConfig {
    fn validate(&self) -> Result<()> {
        let sum: f64 = self.level_probabilities.iter().sum();
        if (sum - 1.0).abs() > 1e-9 {
            return Err(FunnelError::InvalidProbabilities {
                probabilities: self.level_probabilities,
            });
        }
        Ok(())
    }
}

/// One simulated scenario: the level each input sat at, the resulting value
/// of every KPI, and the scenario's probability weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioRow {
    pub levels: Vec<Level>,
    pub kpi_values: Vec<f64>,
    pub weight: f64,
}

/// The full simulated-scenario table: 3^k rows in Cartesian-product order,
/// first input varying slowest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioTable {
    pub input_names: Vec<String>,
    pub kpi_names: Vec<String>,
    pub rows: Vec<ScenarioRow>,
}

impl ScenarioTable {
    pub fn kpi_index(&self, kpi: &str) -> Result<usize> {
        self.kpi_names
            .iter()
            .position(|name| name == kpi)
            .ok_or_else(|| FunnelError::NodeNotFound { name: kpi.into() })
    }
}

/// Sensitivity of one KPI to one input: the KPI at the input's low/mid/high
/// (all other inputs at mid), the swing, its square, and this input's share
/// of the summed swing-squares.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiSensitivity {
    pub kpi: String,
    pub low: f64,
    pub mid: f64,
    pub high: f64,
    pub swing: f64,
    pub swing_squared: f64,
    pub variance_share: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputSummary {
    pub name: String,
    pub long_name: String,
    pub sensitivities: Vec<KpiSensitivity>,
}

/// Weighted P10/P50/P90 band of a KPI across the whole scenario grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinedUncertainty {
    pub kpi: String,
    pub low: f64,
    pub mid: f64,
    pub high: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryTable {
    pub inputs: Vec<InputSummary>,
    pub combined: Vec<CombinedUncertainty>,
}

/// The sensitivity simulator over a node collection.
///
/// Input and KPI name lists are captured at construction; rebuild the funnel
/// after structural changes to the collection.
#[derive(Debug, Clone)]
pub struct Funnel {
    collection: NodesCollection,
    input_names: Vec<String>,
    kpi_names: Vec<String>,
    config: SimulationConfig,
    scenarios: Option<ScenarioTable>,
    summary: Option<SummaryTable>,
}

impl Funnel {
    pub fn new(collection: NodesCollection) -> Funnel {
        Self::with_config(collection, SimulationConfig::default())
    }

    pub fn with_config(collection: NodesCollection, config: SimulationConfig) -> Funnel {
        let input_names = collection
            .input_nodes()
            .iter()
            .map(|n| n.name().to_string())
            .collect();
        let kpi_names = collection
            .kpi_nodes()
            .iter()
            .map(|n| n.name().to_string())
            .collect();
        Funnel {
            collection,
            input_names,
            kpi_names,
            config,
            scenarios: None,
            summary: None,
        }
    }

    pub fn collection(&self) -> &NodesCollection {
        &self.collection
    }

    pub fn into_collection(self) -> NodesCollection {
        self.collection
    }

    pub fn input_names(&self) -> &[String] {
        &self.input_names
    }

    pub fn kpi_names(&self) -> &[String] {
        &self.kpi_names
    }

    /// Runs the full workflow: variance simulation followed by the summary
    /// calculations.
    pub fn simulate(&mut self) -> Result<()> {
        self.simulate_variances()?;
        self.update_calculations()?;
        Ok(())
    }

    /// Enumerates the full factorial of input levels and records every KPI
    /// for every combination.
    ///
    /// This is 3^k scenarios for k inputs — exponential by design, since the
    /// grid deliberately covers every low/mid/high corner rather than a
    /// sample. Set [`SimulationConfig::max_combinations`] to fail fast when a
    /// funnel grows too wide. The collection's inputs are reset to their mid
    /// values once enumeration finishes.
    pub fn simulate_variances(&mut self) -> Result<&ScenarioTable> {
        if !self.collection.iter().any(|n| n.is_kpi()) {
            return Err(FunnelError::NoKpiNodes);
        }
        self.config.validate()?;

        let k = self.input_names.len();
        let Some(total) = 3usize.checked_pow(k as u32) else {
            return Err(FunnelError::CombinationLimitExceeded {
                combinations: usize::MAX,
                ceiling: self.config.max_combinations.unwrap_or(usize::MAX),
            });
        };
        if let Some(ceiling) = self.config.max_combinations {
            if total > ceiling {
                return Err(FunnelError::CombinationLimitExceeded {
                    combinations: total,
                    ceiling,
                });
            }
        }
        tracing::debug!(inputs = k, combinations = total, "enumerating scenario grid");

        let probabilities = self.config.level_probabilities;
        let rows = if total >= PARALLEL_THRESHOLD {
            // Each worker mutates its own clone of the collection, so the
            // combinations stay independent.
            let input_names = &self.input_names;
            let kpi_names = &self.kpi_names;
            let collection = &self.collection;
            (0..total)
                .into_par_iter()
                .map_init(
                    || collection.clone(),
                    |store, code| {
                        run_combination(
                            store,
                            input_names,
                            kpi_names,
                            levels_for(code, k),
                            probabilities,
                        )
                    },
                )
                .collect::<Result<Vec<ScenarioRow>>>()?
        } else {
            let mut rows = Vec::with_capacity(total);
            for code in 0..total {
                rows.push(run_combination(
                    &mut self.collection,
                    &self.input_names,
                    &self.kpi_names,
                    levels_for(code, k),
                    probabilities,
                )?);
            }
            rows
        };

        let table = ScenarioTable {
            input_names: self.input_names.clone(),
            kpi_names: self.kpi_names.clone(),
            rows,
        };
        // The simulation must not leave input values mutated.
        self.collection.reset_input_nodes()?;
        self.summary = None;
        Ok(self.scenarios.insert(table))
    }

    /// Builds the summary table from the scenario grid: per-input swings and
    /// variance shares plus the combined-uncertainty band per KPI.
    pub fn update_calculations(&mut self) -> Result<&SummaryTable> {
        let Some(scenarios) = &self.scenarios else {
            return Err(FunnelError::NotSimulated);
        };
        let k = self.input_names.len();
        let long_names = self.collection.nodes_mapping();

        let mut inputs: Vec<InputSummary> = Vec::with_capacity(k);
        for (slot, name) in self.input_names.iter().enumerate() {
            let mut sensitivities = Vec::with_capacity(self.kpi_names.len());
            for (kpi_idx, kpi) in self.kpi_names.iter().enumerate() {
                let mut values = [0.0f64; 3];
                for level in Level::ALL {
                    let row = &scenarios.rows[mid_baseline_row(k, slot, level)];
                    values[level.index()] = row.kpi_values[kpi_idx];
                }
                let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                let min = values.iter().copied().fold(f64::INFINITY, f64::min);
                let swing = max - min;
                sensitivities.push(KpiSensitivity {
                    kpi: kpi.clone(),
                    low: values[0],
                    mid: values[1],
                    high: values[2],
                    swing,
                    swing_squared: swing * swing,
                    variance_share: 0.0,
                });
            }
            inputs.push(InputSummary {
                long_name: long_names.get(name).cloned().unwrap_or_else(|| name.clone()),
                name: name.clone(),
                sensitivities,
            });
        }

        for kpi_idx in 0..self.kpi_names.len() {
            let total: f64 = inputs
                .iter()
                .map(|input| input.sensitivities[kpi_idx].swing_squared)
                .sum();
            for input in &mut inputs {
                let entry = &mut input.sensitivities[kpi_idx];
                entry.variance_share = if total == 0.0 {
                    0.0
                } else {
                    entry.swing_squared / total
                };
            }
        }

        let weights: Vec<f64> = scenarios.rows.iter().map(|r| r.weight).collect();
        let mut combined = Vec::with_capacity(self.kpi_names.len());
        for (kpi_idx, kpi) in self.kpi_names.iter().enumerate() {
            let values: Vec<f64> = scenarios.rows.iter().map(|r| r.kpi_values[kpi_idx]).collect();
            let band: Vec<f64> = Level::ALL
                .iter()
                .filter_map(|level| {
                    weighted_quantile(&values, &weights, level.represented_quantile())
                })
                .collect();
            let [low, mid, high] = band.as_slice() else {
                return Err(FunnelError::NotSimulated);
            };
            combined.push(CombinedUncertainty {
                kpi: kpi.clone(),
                low: *low,
                mid: *mid,
                high: *high,
            });
        }

        let table = SummaryTable { inputs, combined };
        Ok(self.summary.insert(table))
    }

    fn ready(&self) -> Result<()> {
        if self.summary.is_none() {
            return Err(FunnelError::NotSimulated);
        }
        Ok(())
    }

    /// The full simulated-scenario table.
    pub fn scenarios(&self) -> Result<&ScenarioTable> {
        self.ready()?;
        self.scenarios.as_ref().ok_or(FunnelError::NotSimulated)
    }

    /// The per-input swing/variance summary with combined-uncertainty rows.
    pub fn summary(&self) -> Result<&SummaryTable> {
        self.summary.as_ref().ok_or(FunnelError::NotSimulated)
    }

    pub fn combined_uncertainty(&self, kpi: &str) -> Result<&CombinedUncertainty> {
        self.summary()?
            .combined
            .iter()
            .find(|c| c.kpi == kpi)
            .ok_or_else(|| FunnelError::NodeNotFound { name: kpi.into() })
    }

    /// The weighted probability mass of the KPI landing below zero.
    pub fn negative_probability(&self, kpi: &str) -> Result<f64> {
        self.ready()?;
        let scenarios = self.scenarios.as_ref().ok_or(FunnelError::NotSimulated)?;
        let kpi_idx = scenarios.kpi_index(kpi)?;
        Ok(scenarios
            .rows
            .iter()
            .filter(|row| row.kpi_values[kpi_idx] < 0.0)
            .map(|row| row.weight)
            .sum())
    }
}

/// Decodes a combination index into per-input levels. The first input varies
/// slowest, matching nested iteration over the inputs in order.
fn levels_for(mut code: usize, inputs: usize) -> Vec<Level> {
    let mut levels = vec![Level::Mid; inputs];
    for slot in (0..inputs).rev() {
        levels[slot] = Level::from_index(code % 3);
        code /= 3;
    }
    levels
}

/// Index of the row where `slot` sits at `level` and every other input at
/// mid.
fn mid_baseline_row(inputs: usize, slot: usize, level: Level) -> usize {
    let mut code = 0usize;
    for i in 0..inputs {
        let digit = if i == slot { level.index() } else { 1 };
        code = code * 3 + digit;
    }
    code
}

/// Binds one combination of input levels, re-evaluates the funnel and
/// captures every KPI.
fn run_combination(
    collection: &mut NodesCollection,
    input_names: &[String],
    kpi_names: &[String],
    levels: Vec<Level>,
    probabilities: [f64; 3],
) -> Result<ScenarioRow> {
    let assignments: HashMap<String, f64> = input_names
        .iter()
        .zip(&levels)
        .map(|(name, level)| (name.clone(), level.selector()))
        .collect();
    collection.set_node_values(&assignments, true)?;
    collection.refresh()?;
    tracing::debug!(?levels, "simulated combination");

    let mut kpi_values = Vec::with_capacity(kpi_names.len());
    for kpi in kpi_names {
        let node = collection.get_node(kpi)?;
        let value = node
            .value
            .expect("BUG: KPI node has no value after a successful refresh");
        kpi_values.push(value);
    }
    let weight = levels
        .iter()
        .map(|level| probabilities[level.index()])
        .product();
    Ok(ScenarioRow {
        levels,
        kpi_values,
        weight,
    })
}
