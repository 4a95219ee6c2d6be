//! Individual animals and their life-cycle rules.
//!
//! An [`Animal`] only stores what differs between individuals (species, age
//! and weight). Everything else is read from the species-wide
//! [`SpeciesParams`] passed into each operation, so an override applies to
//! every animal of that species from the next call onwards.

use biosim_core::{Species, SpeciesParams};
use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

/// An animal on the island
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Animal {
    species: Species,
    age: u32,
    weight: f64,
}

impl Animal {
    /// Create an animal with a known age and weight. Negative weights are
    /// raised to zero.
    pub fn new(species: Species, age: u32, weight: f64) -> Self {
        Self {
            species,
            age,
            weight: weight.max(0.0),
        }
    }

    /// Create a newborn (age 0) with a weight drawn from
    /// Normal(`w_birth`, `sigma_birth`).
    pub fn newborn<R: Rng + ?Sized>(species: Species, params: &SpeciesParams, rng: &mut R) -> Self {
        let weight = match Normal::new(params.w_birth, params.sigma_birth) {
            Ok(distribution) => distribution.sample(rng),
            Err(_) => params.w_birth,
        };
        Self::new(species, 0, weight)
    }

    pub fn species(&self) -> Species {
        self.species
    }

    pub fn age(&self) -> u32 {
        self.age
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// Condition in [0, 1]; zero exactly when the animal has no weight left.
    pub fn fitness(&self, params: &SpeciesParams) -> f64 {
        if self.weight <= 0.0 {
            return 0.0;
        }
        let age_factor = logistic(self.age as f64, params.phi_age, params.a_half);
        let weight_factor = logistic(-self.weight, params.phi_weight, -params.w_half);
        age_factor * weight_factor
    }

    /// Ages saturate at `u32::MAX`.
    pub fn age_one_year(&mut self) {
        self.age = self.age.saturating_add(1);
    }

    pub fn lose_annual_weight(&mut self, params: &SpeciesParams) {
        self.weight -= self.weight * params.eta;
    }

    /// Gain weight from `amount` of food. The caller is responsible for
    /// never offering more than is actually available.
    pub fn eat(&mut self, params: &SpeciesParams, amount: f64) {
        self.weight += params.beta * amount;
    }

    pub fn move_probability(&self, params: &SpeciesParams) -> f64 {
        params.mu * self.fitness(params)
    }

    /// Probability of giving birth this year with `same_species` animals of
    /// this species (itself included) in the cell.
    pub fn birth_probability(&self, params: &SpeciesParams, same_species: usize) -> f64 {
        if same_species < 2 || self.weight < params.zeta * (params.w_birth + params.sigma_birth) {
            return 0.0;
        }
        (params.gamma * self.fitness(params) * (same_species - 1) as f64).min(1.0)
    }

    /// Pay `xi` times the newborn's weight. Returns `false` and leaves the
    /// parent untouched when it cannot afford the cost.
    pub fn apply_birth_cost(&mut self, params: &SpeciesParams, newborn: &Animal) -> bool {
        let cost = newborn.weight * params.xi;
        if self.weight < cost {
            return false;
        }
        self.weight -= cost;
        true
    }

    pub fn death_probability(&self, params: &SpeciesParams) -> f64 {
        let fitness = self.fitness(params);
        if fitness == 0.0 {
            1.0
        } else {
            params.omega * (1.0 - fitness)
        }
    }

    /// Probability that this animal kills `prey`. Zero unless this animal's
    /// species has a `DeltaPhiMax`, i.e. is a predator.
    pub fn kill_probability(
        &self,
        params: &SpeciesParams,
        prey: &Animal,
        prey_params: &SpeciesParams,
    ) -> f64 {
        match params.delta_phi_max {
            Some(delta_phi_max) => kill_probability(
                self.fitness(params),
                prey.fitness(prey_params),
                delta_phi_max,
            ),
            None => 0.0,
        }
    }
}

/// Kill probability from the two fitness values: zero when the predator is
/// not fitter, certain once the difference reaches `delta_phi_max`, linear
/// in between.
pub fn kill_probability(predator_fitness: f64, prey_fitness: f64, delta_phi_max: f64) -> f64 {
    let difference = predator_fitness - prey_fitness;
    if difference <= 0.0 {
        0.0
    } else if difference >= delta_phi_max {
        1.0
    } else {
        difference / delta_phi_max
    }
}

fn logistic(x: f64, phi: f64, half: f64) -> f64 {
    1.0 / (1.0 + (phi * (x - half)).exp())
}
