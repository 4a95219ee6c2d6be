//! Configuration types for the simulation.

use crate::error::{Error, Result};
use crate::types::{CellKind, Species};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

/// Named parameter overrides, e.g. `{"F": 20.0, "eta": 0.1}`
pub type ParameterOverrides = BTreeMap<String, f64>;

/// Life-cycle constants shared by every animal of one species
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeciesParams {
    /// Mean birth weight
    pub w_birth: f64,
    /// Standard deviation of the birth weight
    pub sigma_birth: f64,
    /// Fraction of eaten fodder turned into body weight
    pub beta: f64,
    /// Fraction of body weight lost every year
    pub eta: f64,
    pub a_half: f64,
    pub phi_age: f64,
    pub w_half: f64,
    pub phi_weight: f64,
    /// Migration probability scale
    pub mu: f64,
    /// Propensity exponent scale
    pub lambda: f64,
    /// Birth probability scale
    pub gamma: f64,
    /// Birth weight threshold multiplier
    pub zeta: f64,
    /// Birth weight cost multiplier
    pub xi: f64,
    /// Death probability scale
    pub omega: f64,
    /// Appetite per year
    #[serde(rename = "F")]
    pub f: f64,
    /// Fitness difference at which a kill becomes certain (carnivores only)
    #[serde(rename = "DeltaPhiMax", default, skip_serializing_if = "Option::is_none")]
    pub delta_phi_max: Option<f64>,
}

impl SpeciesParams {
    pub fn herbivore() -> Self {
        Self {
            w_birth: 8.0,
            sigma_birth: 1.5,
            beta: 0.9,
            eta: 0.05,
            a_half: 40.0,
            phi_age: 0.6,
            w_half: 10.0,
            phi_weight: 0.1,
            mu: 0.25,
            lambda: 1.0,
            gamma: 0.2,
            zeta: 3.5,
            xi: 1.2,
            omega: 0.4,
            f: 10.0,
            delta_phi_max: None,
        }
    }

    pub fn carnivore() -> Self {
        Self {
            w_birth: 6.0,
            sigma_birth: 1.0,
            beta: 0.75,
            eta: 0.125,
            a_half: 40.0,
            phi_age: 0.3,
            w_half: 4.0,
            phi_weight: 0.4,
            mu: 0.4,
            lambda: 1.0,
            gamma: 0.8,
            zeta: 3.5,
            xi: 1.1,
            omega: 0.8,
            f: 50.0,
            delta_phi_max: Some(10.0),
        }
    }

    pub fn default_for(species: Species) -> Self {
        match species {
            Species::Herbivore => Self::herbivore(),
            Species::Carnivore => Self::carnivore(),
        }
    }

    /// Return a copy with `overrides` applied.
    ///
    /// The whole map is validated before anything changes, so a rejected
    /// override leaves `self` untouched.
    pub fn with_overrides(&self, species: Species, overrides: &ParameterOverrides) -> Result<Self> {
        let mut updated = self.clone();

        for (name, &value) in overrides {
            if !value.is_finite() {
                return Err(Error::Validation(format!(
                    "{species} parameter {name} must be finite, got {value}"
                )));
            }

            let slot = match name.as_str() {
                "w_birth" => &mut updated.w_birth,
                "sigma_birth" => &mut updated.sigma_birth,
                "beta" => &mut updated.beta,
                "eta" => &mut updated.eta,
                "a_half" => &mut updated.a_half,
                "phi_age" => &mut updated.phi_age,
                "w_half" => &mut updated.w_half,
                "phi_weight" => &mut updated.phi_weight,
                "mu" => &mut updated.mu,
                "lambda" => &mut updated.lambda,
                "gamma" => &mut updated.gamma,
                "zeta" => &mut updated.zeta,
                "xi" => &mut updated.xi,
                "omega" => &mut updated.omega,
                "F" => &mut updated.f,
                "DeltaPhiMax" if species == Species::Carnivore => {
                    if value <= 0.0 {
                        return Err(Error::Validation(format!(
                            "DeltaPhiMax must be strictly positive, got {value}"
                        )));
                    }
                    updated.delta_phi_max = Some(value);
                    continue;
                }
                _ => {
                    return Err(Error::Validation(format!(
                        "unknown {species} parameter {name:?}"
                    )))
                }
            };

            // lambda may steer animals away from food, so it is the one signed parameter
            if name != "lambda" && value < 0.0 {
                return Err(Error::Validation(format!(
                    "{species} parameter {name} must be non-negative, got {value}"
                )));
            }
            if name == "eta" && value > 1.0 {
                return Err(Error::Validation(format!(
                    "{species} parameter eta must not exceed 1, got {value}"
                )));
            }

            *slot = value;
        }

        Ok(updated)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavannahParams {
    pub f_max: f64,
    /// Regrowth rate towards `f_max`
    pub alpha: f64,
}

impl Default for SavannahParams {
    fn default() -> Self {
        Self {
            f_max: 300.0,
            alpha: 0.3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JungleParams {
    pub f_max: f64,
}

impl Default for JungleParams {
    fn default() -> Self {
        Self { f_max: 800.0 }
    }
}

/// Fodder constants for the landscape kinds that grow food
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LandscapeParams {
    pub savannah: SavannahParams,
    pub jungle: JungleParams,
}

impl LandscapeParams {
    /// Maximum herbivore fodder a cell of `kind` can hold.
    pub fn f_max(&self, kind: CellKind) -> f64 {
        match kind {
            CellKind::Savannah => self.savannah.f_max,
            CellKind::Jungle => self.jungle.f_max,
            CellKind::Ocean | CellKind::Mountain | CellKind::Desert => 0.0,
        }
    }

    /// Return a copy with `overrides` applied to the parameters of `kind`.
    pub fn with_overrides(&self, kind: CellKind, overrides: &ParameterOverrides) -> Result<Self> {
        let mut updated = self.clone();

        for (name, &value) in overrides {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::Validation(format!(
                    "{kind} parameter {name} must be finite and non-negative, got {value}"
                )));
            }

            match (kind, name.as_str()) {
                (CellKind::Savannah, "f_max") => updated.savannah.f_max = value,
                (CellKind::Savannah, "alpha") => {
                    if value > 1.0 {
                        return Err(Error::Validation(format!(
                            "Savannah parameter alpha must not exceed 1, got {value}"
                        )));
                    }
                    updated.savannah.alpha = value;
                }
                (CellKind::Jungle, "f_max") => updated.jungle.f_max = value,
                (CellKind::Savannah | CellKind::Jungle, _) => {
                    return Err(Error::Validation(format!(
                        "unknown {kind} parameter {name:?}"
                    )))
                }
                _ => {
                    return Err(Error::Validation(format!(
                        "{kind} has no adjustable parameters"
                    )))
                }
            }
        }

        Ok(updated)
    }
}

/// Parameters in effect for one pass of the annual cycle
#[derive(Debug, Clone)]
pub struct ParameterSet {
    pub herbivore: Arc<SpeciesParams>,
    pub carnivore: Arc<SpeciesParams>,
    pub landscape: Arc<LandscapeParams>,
}

impl ParameterSet {
    pub fn species(&self, species: Species) -> &SpeciesParams {
        match species {
            Species::Herbivore => &self.herbivore,
            Species::Carnivore => &self.carnivore,
        }
    }
}

impl Default for ParameterSet {
    fn default() -> Self {
        Self {
            herbivore: Arc::new(SpeciesParams::herbivore()),
            carnivore: Arc::new(SpeciesParams::carnivore()),
            landscape: Arc::new(LandscapeParams::default()),
        }
    }
}

/// Species-wide and landscape-wide parameters, shared by every animal and cell.
///
/// Each record sits behind its own lock and is replaced wholesale on
/// override, so readers always see either the old or the new record.
#[derive(Debug)]
pub struct ParameterStore {
    herbivore: RwLock<Arc<SpeciesParams>>,
    carnivore: RwLock<Arc<SpeciesParams>>,
    landscape: RwLock<Arc<LandscapeParams>>,
}

impl Default for ParameterStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ParameterStore {
    pub fn new() -> Self {
        let defaults = ParameterSet::default();
        Self {
            herbivore: RwLock::new(defaults.herbivore),
            carnivore: RwLock::new(defaults.carnivore),
            landscape: RwLock::new(defaults.landscape),
        }
    }

    fn species_slot(&self, species: Species) -> &RwLock<Arc<SpeciesParams>> {
        match species {
            Species::Herbivore => &self.herbivore,
            Species::Carnivore => &self.carnivore,
        }
    }

    pub fn species(&self, species: Species) -> Arc<SpeciesParams> {
        self.species_slot(species).read().clone()
    }

    pub fn landscape(&self) -> Arc<LandscapeParams> {
        self.landscape.read().clone()
    }

    pub fn snapshot(&self) -> ParameterSet {
        ParameterSet {
            herbivore: self.species(Species::Herbivore),
            carnivore: self.species(Species::Carnivore),
            landscape: self.landscape(),
        }
    }

    pub fn set_species_parameters(&self, species: Species, overrides: &ParameterOverrides) -> Result<()> {
        let mut slot = self.species_slot(species).write();
        let updated = slot.with_overrides(species, overrides)?;
        *slot = Arc::new(updated);

        info!(species = %species, count = overrides.len(), "Species parameters updated");
        Ok(())
    }

    pub fn set_landscape_parameters(&self, kind: CellKind, overrides: &ParameterOverrides) -> Result<()> {
        let mut slot = self.landscape.write();
        let updated = slot.with_overrides(kind, overrides)?;
        *slot = Arc::new(updated);

        info!(landscape = %kind, count = overrides.len(), "Landscape parameters updated");
        Ok(())
    }
}

/// Simulation run configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Random seed for reproducibility
    pub seed: u64,
    /// Number of years to simulate
    pub num_years: u32,
    /// Years between progress log lines
    pub report_interval: u32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: 12345,
            num_years: 100,
            report_interval: 10,
        }
    }
}
