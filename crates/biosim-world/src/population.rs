//! Population input records and loading them onto the grid.

use crate::animal::Animal;
use crate::grid::Grid;
use biosim_core::{Error, Location, Result, Species};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// One animal to place on the island
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimalDescriptor {
    pub species: Species,
    pub age: u32,
    pub weight: f64,
}

/// A group of animals sharing a location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopulationEntry {
    #[serde(alias = "loc")]
    pub location: Location,
    #[serde(alias = "pop")]
    pub population: Vec<AnimalDescriptor>,
}

/// Outcome of loading a population
#[derive(Debug, Default)]
pub struct LoadReport {
    pub animals_added: usize,
    /// Entries that were not applied, by position in the input
    pub skipped: Vec<(usize, Error)>,
}

impl LoadReport {
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty()
    }
}

impl Grid {
    /// Place every entry's animals on the island. A bad entry is skipped as a
    /// whole and reported; the remaining entries are still applied.
    pub fn load_population(&mut self, entries: &[PopulationEntry]) -> LoadReport {
        let mut report = LoadReport::default();

        for (index, entry) in entries.iter().enumerate() {
            match self.load_entry(entry) {
                Ok(added) => report.animals_added += added,
                Err(err) => {
                    warn!(entry = index, location = %entry.location, error = %err, "Population entry skipped");
                    report.skipped.push((index, err));
                }
            }
        }

        debug!(
            added = report.animals_added,
            skipped = report.skipped.len(),
            "Population loaded"
        );
        report
    }

    fn load_entry(&mut self, entry: &PopulationEntry) -> Result<usize> {
        let location = entry.location;
        match self.cell_at(location) {
            None => {
                return Err(Error::OutOfBounds(format!(
                    "{location} is outside the {}x{} island",
                    self.rows(), self.cols()
                )))
            }
            Some(cell) if !cell.is_accessible() => {
                return Err(Error::OutOfBounds(format!(
                    "{location} is {}, animals cannot live there",
                    cell.kind()
                )))
            }
            Some(_) => {}
        }

        if let Some(bad) = entry
            .population
            .iter()
            .find(|a| !a.weight.is_finite() || a.weight <= 0.0)
        {
            return Err(Error::Validation(format!(
                "{} at {location} has invalid weight {}",
                bad.species, bad.weight
            )));
        }

        for descriptor in &entry.population {
            let animal = Animal::new(descriptor.species, descriptor.age, descriptor.weight);
            self.add_animal(location, animal)?;
        }
        Ok(entry.population.len())
    }
}
