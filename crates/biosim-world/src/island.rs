//! Self-contained island experiments.

use crate::population::PopulationEntry;
use crate::simulation::{Simulation, SimulationResult};
use biosim_core::{CellKind, ParameterOverrides, ParameterStore, Result, SimulationConfig, Species};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, instrument};

/// Everything needed to run one island from scratch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IslandJob {
    pub geography: String,
    #[serde(default)]
    pub population: Vec<PopulationEntry>,
    #[serde(default)]
    pub config: SimulationConfig,
    #[serde(default)]
    pub species_parameters: BTreeMap<Species, ParameterOverrides>,
    #[serde(default)]
    pub landscape_parameters: BTreeMap<CellKind, ParameterOverrides>,
}

impl IslandJob {
    pub fn new(geography: impl Into<String>, population: Vec<PopulationEntry>, config: SimulationConfig) -> Self {
        Self {
            geography: geography.into(),
            population,
            config,
            species_parameters: BTreeMap::new(),
            landscape_parameters: BTreeMap::new(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Execute this island job. Parameter overrides are applied before the
    /// grid is built so landscape changes affect the initial fodder.
    #[instrument(skip(self), fields(seed = self.config.seed, num_years = self.config.num_years))]
    pub fn execute(self) -> Result<IslandResult> {
        let params = Arc::new(ParameterStore::new());
        for (species, overrides) in &self.species_parameters {
            params.set_species_parameters(*species, overrides)?;
        }
        for (kind, overrides) in &self.landscape_parameters {
            params.set_landscape_parameters(*kind, overrides)?;
        }

        let mut simulation = Simulation::with_parameters(&self.geography, self.config, params)?;
        let report = simulation.add_population(&self.population);
        let warnings = report
            .skipped
            .iter()
            .map(|(entry, err)| format!("population entry {entry}: {err}"))
            .collect();

        let result = simulation.run();
        info!(
            herbivores = result.final_counts.herbivores,
            carnivores = result.final_counts.carnivores,
            "Island job finished"
        );

        Ok(IslandResult {
            animals_loaded: report.animals_added,
            warnings,
            result,
        })
    }
}

/// Result from executing an island job
#[derive(Debug, Serialize, Deserialize)]
pub struct IslandResult {
    pub animals_loaded: usize,
    /// Population entries that were skipped while loading
    pub warnings: Vec<String>,
    pub result: SimulationResult,
}
