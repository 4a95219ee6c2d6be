//! Landscape cells and the per-cell phases of the annual cycle.

use crate::animal::Animal;
use biosim_core::{CellKind, Error, LandscapeParams, ParameterSet, Result, Species, SpeciesParams};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{error, trace};

/// One tile of the island together with the animals living on it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cell {
    kind: CellKind,
    /// Plant biomass available to herbivores
    fodder: f64,
    herbivores: Vec<Animal>,
    carnivores: Vec<Animal>,
}

impl Cell {
    /// Create an empty cell. Fodder-growing kinds start fully grown.
    pub fn new(kind: CellKind, landscape: &LandscapeParams) -> Self {
        Self {
            kind,
            fodder: landscape.f_max(kind),
            herbivores: Vec::new(),
            carnivores: Vec::new(),
        }
    }

    pub fn kind(&self) -> CellKind {
        self.kind
    }

    pub fn is_accessible(&self) -> bool {
        self.kind.is_accessible()
    }

    /// Herbivore fodder currently standing in the cell
    pub fn fodder(&self) -> f64 {
        self.fodder
    }

    pub fn population(&self, species: Species) -> &[Animal] {
        match species {
            Species::Herbivore => &self.herbivores,
            Species::Carnivore => &self.carnivores,
        }
    }

    pub(crate) fn population_mut(&mut self, species: Species) -> &mut Vec<Animal> {
        match species {
            Species::Herbivore => &mut self.herbivores,
            Species::Carnivore => &mut self.carnivores,
        }
    }

    pub fn count(&self, species: Species) -> usize {
        self.population(species).len()
    }

    pub fn total_count(&self) -> usize {
        self.herbivores.len() + self.carnivores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total_count() == 0
    }

    /// Append an animal to the population of its species.
    pub fn add_animal(&mut self, animal: Animal) -> Result<()> {
        if !self.is_accessible() {
            return Err(Error::InvariantViolation(format!(
                "cannot place a {} on {}",
                animal.species(),
                self.kind
            )));
        }
        self.population_mut(animal.species()).push(animal);
        Ok(())
    }

    /// Remove and return the animal at `slot` in the population of `species`.
    ///
    /// A missing slot is reported as an error in every build and leaves the
    /// cell unchanged.
    pub fn remove_animal(&mut self, species: Species, slot: usize) -> Result<Animal> {
        let animals = self.population_mut(species);
        if slot >= animals.len() {
            error!(species = %species, slot, len = animals.len(), "Removal of absent animal");
            return Err(Error::InvariantViolation(format!(
                "no {species} at slot {slot}, population is {}",
                animals.len()
            )));
        }
        Ok(animals.remove(slot))
    }

    /// Grow herbivore fodder for the new year.
    pub fn regrow_fodder(&mut self, landscape: &LandscapeParams) {
        match self.kind {
            CellKind::Savannah => {
                let f_max = landscape.savannah.f_max;
                let current = self.fodder.min(f_max);
                self.fodder = current + landscape.savannah.alpha * (f_max - current);
            }
            CellKind::Jungle => self.fodder = landscape.jungle.f_max,
            CellKind::Ocean | CellKind::Mountain | CellKind::Desert => self.fodder = 0.0,
        }
    }

    /// Feeding phase: regrow fodder, let herbivores graze, then let
    /// carnivores hunt. Returns the number of herbivores killed.
    pub fn feed<R: Rng + ?Sized>(&mut self, params: &ParameterSet, rng: &mut R) -> usize {
        self.regrow_fodder(&params.landscape);
        self.feed_herbivores(&params.herbivore);
        self.feed_carnivores(params, rng)
    }

    /// Fittest herbivores graze first, each up to its appetite `F`.
    fn feed_herbivores(&mut self, herb_params: &SpeciesParams) {
        sort_by_fitness(&mut self.herbivores, herb_params, true);

        for herbivore in self.herbivores.iter_mut() {
            if self.fodder <= 0.0 {
                break;
            }
            let portion = herb_params.f.min(self.fodder);
            herbivore.eat(herb_params, portion);
            self.fodder -= portion;
        }
    }

    /// Fittest carnivores hunt first and try the weakest prey first. Each
    /// kill feeds the predator the prey's weight, capped by what is left of
    /// its appetite.
    fn feed_carnivores<R: Rng + ?Sized>(&mut self, params: &ParameterSet, rng: &mut R) -> usize {
        if self.carnivores.is_empty() || self.herbivores.is_empty() {
            return 0;
        }
        let carn_params: &SpeciesParams = &params.carnivore;
        let herb_params: &SpeciesParams = &params.herbivore;

        sort_by_fitness(&mut self.carnivores, carn_params, true);
        sort_by_fitness(&mut self.herbivores, herb_params, false);

        let mut kills = 0;
        for carnivore in self.carnivores.iter_mut() {
            let mut eaten = 0.0;
            let mut i = 0;
            while i < self.herbivores.len() {
                let appetite = carn_params.f - eaten;
                if appetite <= 0.0 {
                    break;
                }
                let p_kill =
                    carnivore.kill_probability(carn_params, &self.herbivores[i], herb_params);
                if rng.gen::<f64>() < p_kill {
                    let prey = self.herbivores.remove(i);
                    let meal = prey.weight().min(appetite);
                    carnivore.eat(carn_params, meal);
                    eaten += meal;
                    kills += 1;
                    trace!(prey_weight = prey.weight(), meal, p_kill, "Herbivore killed");
                } else {
                    i += 1;
                }
            }
        }
        kills
    }

    /// Birth phase. Only animals present when the phase starts may give
    /// birth; newborns join the population afterwards. Returns the number
    /// of births.
    pub fn reproduce<R: Rng + ?Sized>(&mut self, params: &ParameterSet, rng: &mut R) -> usize {
        let mut births = 0;

        for species in Species::ALL {
            let species_params = params.species(species);
            let animals = self.population_mut(species);
            let same_species = animals.len();
            let mut newborns = Vec::new();

            for parent in animals.iter_mut() {
                let p_birth = parent.birth_probability(species_params, same_species);
                if rng.gen::<f64>() < p_birth {
                    let newborn = Animal::newborn(species, species_params, rng);
                    if parent.apply_birth_cost(species_params, &newborn) {
                        trace!(species = %species, weight = newborn.weight(), "Animal born");
                        newborns.push(newborn);
                    }
                }
            }

            births += newborns.len();
            animals.extend(newborns);
        }

        births
    }

    /// Age every animal by one year, then apply annual weight loss.
    pub fn advance_year(&mut self, params: &ParameterSet) {
        for species in Species::ALL {
            let species_params = params.species(species);
            for animal in self.population_mut(species).iter_mut() {
                animal.age_one_year();
                animal.lose_annual_weight(species_params);
            }
        }
    }

    /// Death phase. Returns the number of animals that died.
    pub fn cull<R: Rng + ?Sized>(&mut self, params: &ParameterSet, rng: &mut R) -> usize {
        let mut deaths = 0;

        for species in Species::ALL {
            let species_params = params.species(species);
            let animals = self.population_mut(species);
            let before = animals.len();
            animals.retain(|animal| rng.gen::<f64>() >= animal.death_probability(species_params));
            deaths += before - animals.len();
        }

        deaths
    }

    /// Food an animal of this species could find here: standing fodder for
    /// herbivores, total herbivore weight for carnivores.
    pub fn relevant_fodder(&self, animal: &Animal) -> f64 {
        match animal.species() {
            Species::Herbivore => self.fodder,
            Species::Carnivore => self.herbivores.iter().map(Animal::weight).sum(),
        }
    }

    pub fn relative_abundance(&self, animal: &Animal, params: &ParameterSet) -> f64 {
        let species = animal.species();
        let appetite = params.species(species).f;
        if appetite <= 0.0 {
            return 0.0;
        }
        self.relevant_fodder(animal) / ((self.count(species) + 1) as f64 * appetite)
    }

    /// Unnormalized preference of `animal` for moving into this cell
    pub fn propensity(&self, animal: &Animal, params: &ParameterSet) -> f64 {
        self.log_propensity(animal, params).map_or(0.0, f64::exp)
    }

    /// Natural log of [`Cell::propensity`], `None` for inaccessible cells.
    pub(crate) fn log_propensity(&self, animal: &Animal, params: &ParameterSet) -> Option<f64> {
        if !self.is_accessible() {
            return None;
        }
        let lambda = params.species(animal.species()).lambda;
        Some(lambda * self.relative_abundance(animal, params))
    }
}

/// Stable sort by fitness, so equally fit animals keep their insertion order.
fn sort_by_fitness(animals: &mut [Animal], params: &SpeciesParams, descending: bool) {
    animals.sort_by(|a, b| {
        let ordering = a.fitness(params).total_cmp(&b.fitness(params));
        if descending {
            ordering.reverse()
        } else {
            ordering
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use biosim_core::{ParameterOverrides, ParameterStore};
    use proptest::prelude::*;
    use rand::rngs::mock::StepRng;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::sync::Arc;

    /// Every uniform draw is 0.0, so every event with positive probability happens.
    fn always() -> StepRng {
        StepRng::new(0, 0)
    }

    /// Every uniform draw is just below 1.0, so only certain events happen.
    fn never() -> StepRng {
        StepRng::new(u64::MAX, 0)
    }

    fn cell(kind: CellKind) -> Cell {
        Cell::new(kind, &LandscapeParams::default())
    }

    fn herb(age: u32, weight: f64) -> Animal {
        Animal::new(Species::Herbivore, age, weight)
    }

    fn carn(age: u32, weight: f64) -> Animal {
        Animal::new(Species::Carnivore, age, weight)
    }

    fn params_with_jungle_fodder(f_max: f64) -> ParameterSet {
        let store = ParameterStore::new();
        let overrides: ParameterOverrides = [("f_max".to_string(), f_max)].into_iter().collect();
        store.set_landscape_parameters(CellKind::Jungle, &overrides).unwrap();
        store.snapshot()
    }

    #[test]
    fn test_initial_fodder() {
        assert_eq!(cell(CellKind::Jungle).fodder(), 800.0);
        assert_eq!(cell(CellKind::Savannah).fodder(), 300.0);
        assert_eq!(cell(CellKind::Desert).fodder(), 0.0);
        assert_eq!(cell(CellKind::Ocean).fodder(), 0.0);
        assert_eq!(cell(CellKind::Mountain).fodder(), 0.0);
    }

    #[test]
    fn test_add_and_remove_animals() {
        let mut savannah = cell(CellKind::Savannah);
        savannah.add_animal(herb(1, 10.0)).unwrap();
        savannah.add_animal(herb(2, 12.0)).unwrap();
        savannah.add_animal(carn(1, 8.0)).unwrap();
        assert_eq!(savannah.count(Species::Herbivore), 2);
        assert_eq!(savannah.count(Species::Carnivore), 1);

        let removed = savannah.remove_animal(Species::Herbivore, 1).unwrap();
        assert_eq!(removed.age(), 2);
        assert_eq!(savannah.total_count(), 2);

        assert!(matches!(
            savannah.remove_animal(Species::Carnivore, 5),
            Err(Error::InvariantViolation(_))
        ));
        assert_eq!(savannah.total_count(), 2);
    }

    #[test]
    fn test_inaccessible_cells_reject_animals() {
        for kind in [CellKind::Ocean, CellKind::Mountain] {
            let mut c = cell(kind);
            assert!(matches!(
                c.add_animal(herb(1, 10.0)),
                Err(Error::InvariantViolation(_))
            ));
            assert!(c.is_empty());
        }
    }

    #[test]
    fn test_savannah_regrowth() {
        let params = ParameterSet::default();
        let mut savannah = cell(CellKind::Savannah);
        for _ in 0..5 {
            savannah.add_animal(herb(5, 20.0)).unwrap();
        }
        savannah.feed(&params, &mut never());
        // 300 after regrowth, 50 eaten
        assert!((savannah.fodder() - 250.0).abs() < 1e-9);

        savannah.regrow_fodder(&params.landscape);
        assert!((savannah.fodder() - (250.0 + 0.3 * 50.0)).abs() < 1e-9);
    }

    #[test]
    fn test_jungle_regrows_to_max() {
        let params = ParameterSet::default();
        let mut jungle = cell(CellKind::Jungle);
        jungle.add_animal(herb(5, 20.0)).unwrap();
        jungle.feed(&params, &mut never());
        assert!(jungle.fodder() < 800.0);
        jungle.regrow_fodder(&params.landscape);
        assert_eq!(jungle.fodder(), 800.0);
    }

    #[test]
    fn test_fitter_herbivore_eats_first() {
        let params = params_with_jungle_fodder(15.0);
        let herb_params = &params.herbivore;
        let mut jungle = Cell::new(CellKind::Jungle, &params.landscape);

        let weak = herb(5, 2.0);
        let strong = herb(5, 40.0);
        assert!(strong.fitness(herb_params) > weak.fitness(herb_params));

        jungle.add_animal(weak).unwrap();
        jungle.add_animal(strong).unwrap();
        jungle.feed(&params, &mut never());

        let fed = jungle.population(Species::Herbivore);
        assert!((fed[0].weight() - (40.0 + 0.9 * 10.0)).abs() < 1e-9);
        assert!((fed[1].weight() - (2.0 + 0.9 * 5.0)).abs() < 1e-9);
        assert_eq!(jungle.fodder(), 0.0);
    }

    #[test]
    fn test_desert_herbivores_go_hungry() {
        let params = ParameterSet::default();
        let mut desert = cell(CellKind::Desert);
        desert.add_animal(herb(3, 15.0)).unwrap();
        desert.feed(&params, &mut always());
        assert_eq!(desert.population(Species::Herbivore)[0].weight(), 15.0);
        assert_eq!(desert.fodder(), 0.0);
    }

    #[test]
    fn test_carnivore_appetite_caps_meal() {
        let params = ParameterSet::default();
        let mut desert = cell(CellKind::Desert);
        for _ in 0..3 {
            desert.add_animal(herb(60, 30.0)).unwrap();
        }
        desert.add_animal(carn(5, 40.0)).unwrap();

        let kills = desert.feed(&params, &mut always());

        assert_eq!(kills, 2);
        assert_eq!(desert.count(Species::Herbivore), 1);
        // 30 from the first kill, the remaining 20 of appetite from the second
        let predator = &desert.population(Species::Carnivore)[0];
        assert!((predator.weight() - (40.0 + 0.75 * 50.0)).abs() < 1e-9);
    }

    #[test]
    fn test_carnivore_tries_weakest_prey_first() {
        let mut params = ParameterSet::default();
        params.carnivore = Arc::new(SpeciesParams {
            f: 5.0,
            ..SpeciesParams::carnivore()
        });
        let mut desert = cell(CellKind::Desert);
        desert.add_animal(herb(5, 10.0)).unwrap();
        desert.add_animal(herb(60, 10.0)).unwrap();
        desert.add_animal(carn(5, 40.0)).unwrap();

        assert_eq!(desert.feed(&params, &mut always()), 1);
        let survivors = desert.population(Species::Herbivore);
        assert_eq!(survivors.len(), 1);
        assert_eq!(survivors[0].age(), 5);
    }

    #[test]
    fn test_no_kills_without_luck() {
        let params = ParameterSet::default();
        let mut desert = cell(CellKind::Desert);
        desert.add_animal(herb(60, 30.0)).unwrap();
        desert.add_animal(carn(5, 40.0)).unwrap();
        assert_eq!(desert.feed(&params, &mut never()), 0);
        assert_eq!(desert.count(Species::Herbivore), 1);
    }

    #[test]
    fn test_reproduction_uses_population_at_phase_start() {
        let params = ParameterSet::default();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut jungle = cell(CellKind::Jungle);
        for _ in 0..20 {
            jungle.add_animal(herb(5, 50.0)).unwrap();
        }

        let births = jungle.reproduce(&params, &mut rng);

        assert_eq!(births, 20);
        assert_eq!(jungle.count(Species::Herbivore), 40);
        let newborns = jungle
            .population(Species::Herbivore)
            .iter()
            .filter(|a| a.age() == 0)
            .count();
        assert_eq!(newborns, 20);
        for parent in &jungle.population(Species::Herbivore)[..20] {
            assert!(parent.weight() < 50.0);
        }
    }

    #[test]
    fn test_unaffordable_birth_is_discarded() {
        let mut params = ParameterSet::default();
        params.herbivore = Arc::new(SpeciesParams {
            xi: 100.0,
            ..SpeciesParams::herbivore()
        });
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let mut jungle = cell(CellKind::Jungle);
        for _ in 0..20 {
            jungle.add_animal(herb(5, 50.0)).unwrap();
        }

        assert_eq!(jungle.reproduce(&params, &mut rng), 0);
        assert_eq!(jungle.count(Species::Herbivore), 20);
        assert!(jungle
            .population(Species::Herbivore)
            .iter()
            .all(|a| a.weight() == 50.0));
    }

    #[test]
    fn test_advance_year_ages_then_loses_weight() {
        let params = ParameterSet::default();
        let mut savannah = cell(CellKind::Savannah);
        savannah.add_animal(herb(1, 20.0)).unwrap();
        savannah.add_animal(carn(2, 16.0)).unwrap();

        savannah.advance_year(&params);

        let h = &savannah.population(Species::Herbivore)[0];
        let c = &savannah.population(Species::Carnivore)[0];
        assert_eq!(h.age(), 2);
        assert!((h.weight() - 19.0).abs() < 1e-12);
        assert_eq!(c.age(), 3);
        assert!((c.weight() - 14.0).abs() < 1e-12);
    }

    #[test]
    fn test_cull() {
        let params = ParameterSet::default();
        let mut savannah = cell(CellKind::Savannah);
        savannah.add_animal(herb(6, 0.0)).unwrap();
        savannah.add_animal(herb(3, 30.0)).unwrap();
        savannah.add_animal(carn(3, 20.0)).unwrap();

        assert_eq!(savannah.cull(&params, &mut never()), 1);
        assert_eq!(savannah.count(Species::Herbivore), 1);
        assert_eq!(savannah.count(Species::Carnivore), 1);

        assert_eq!(savannah.cull(&params, &mut always()), 2);
        assert!(savannah.is_empty());
    }

    #[test]
    fn test_relevant_fodder_and_abundance() {
        let params = ParameterSet::default();
        let mut savannah = cell(CellKind::Savannah);
        let mut desert = cell(CellKind::Desert);
        for c in [&mut savannah, &mut desert] {
            c.add_animal(herb(1, 7.0)).unwrap();
            c.add_animal(herb(1, 10.5)).unwrap();
            c.add_animal(carn(1, 6.0)).unwrap();
            c.add_animal(carn(1, 6.0)).unwrap();
        }
        let h = herb(1, 10.0);
        let c = carn(1, 10.0);

        assert_eq!(savannah.relevant_fodder(&h), 300.0);
        assert_eq!(desert.relevant_fodder(&h), 0.0);
        assert_eq!(desert.relevant_fodder(&c), 17.5);

        assert!((savannah.relative_abundance(&h, &params) - 10.0).abs() < 1e-12);
        assert_eq!(desert.relative_abundance(&h, &params), 0.0);

        assert!((savannah.propensity(&h, &params) - 22026.465794806718).abs() < 1e-6);
        assert_eq!(desert.propensity(&h, &params), 1.0);
        let expected = (17.5f64 / 150.0).exp();
        assert!((desert.propensity(&c, &params) - expected).abs() < 1e-12);
        assert_eq!(cell(CellKind::Ocean).propensity(&h, &params), 0.0);
        assert_eq!(cell(CellKind::Mountain).propensity(&c, &params), 0.0);
    }

    proptest! {
        #[test]
        fn prop_fodder_stays_within_bounds(
            seed in any::<u64>(),
            herbivores in 0usize..60,
            years in 1usize..15,
        ) {
            let params = ParameterSet::default();
            let mut rng = ChaCha8Rng::seed_from_u64(seed);

            for kind in CellKind::ALL {
                let mut c = cell(kind);
                if c.is_accessible() {
                    for i in 0..herbivores {
                        c.add_animal(herb((i % 10) as u32, 5.0 + i as f64)).unwrap();
                    }
                }
                for _ in 0..years {
                    c.feed(&params, &mut rng);
                    let f_max = params.landscape.f_max(kind);
                    prop_assert!(c.fodder() >= 0.0 && c.fodder() <= f_max);
                    if !c.is_accessible() {
                        prop_assert!(c.is_empty());
                    }
                }
            }
        }
    }
}
