//! 2D island grid and the annual cycle.

use crate::animal::Animal;
use crate::cell::Cell;
use biosim_core::{
    CellKind, Direction, Error, GeographyError, LandscapeParams, Location, ParameterSet, Result,
    Species,
};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// A fixed-shape grid of cells surrounded by ocean
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Grid {
    rows: usize,
    cols: usize,
    cells: Vec<Cell>,
}

/// What happened during one call to [`Grid::run_year`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearOutcome {
    pub kills: usize,
    pub births: usize,
    pub migrations: usize,
    pub deaths: usize,
}

/// Migration decisions for one species in one cell, parallel to its population
struct Departures {
    cell: usize,
    species: Species,
    targets: Vec<Option<usize>>,
}

impl Grid {
    /// Parse a geography description such as
    ///
    /// ```text
    /// OOOO
    /// OJSO
    /// OOOO
    /// ```
    ///
    /// Surrounding whitespace on each line and blank lines are ignored.
    pub fn build(geography: &str, landscape: &LandscapeParams) -> Result<Self> {
        let lines: Vec<&str> = geography
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect();

        let cols = match lines.first() {
            Some(first) => first.chars().count(),
            None => return Err(GeographyError::Empty.into()),
        };
        let rows = lines.len();

        let mut cells = Vec::with_capacity(rows * cols);
        for (row, line) in lines.iter().enumerate() {
            let found = line.chars().count();
            if found != cols {
                return Err(GeographyError::RaggedRow {
                    row,
                    expected: cols,
                    found,
                }
                .into());
            }

            for (col, code) in line.chars().enumerate() {
                let kind = CellKind::try_from(code)
                    .map_err(|_| GeographyError::UnknownLandscape { row, col, found: code })?;

                let on_border = row == 0 || col == 0 || row == rows - 1 || col == cols - 1;
                if on_border && kind != CellKind::Ocean {
                    return Err(GeographyError::OpenBorder { row, col, found: code }.into());
                }

                cells.push(Cell::new(kind, landscape));
            }
        }

        debug!(rows, cols, "Island grid built");
        Ok(Self { rows, cols, cells })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    fn index(&self, loc: Location) -> Option<usize> {
        (loc.row < self.rows && loc.col < self.cols).then(|| loc.row * self.cols + loc.col)
    }

    /// Get location from index
    pub fn index_to_location(&self, index: usize) -> Location {
        Location::new(index / self.cols, index % self.cols)
    }

    pub fn cell_at(&self, loc: Location) -> Option<&Cell> {
        self.index(loc).map(|i| &self.cells[i])
    }

    /// Place an animal on the cell at `loc`.
    pub fn add_animal(&mut self, loc: Location, animal: Animal) -> Result<()> {
        let index = self.index(loc).ok_or_else(|| {
            Error::OutOfBounds(format!(
                "{loc} is outside the {}x{} island",
                self.rows, self.cols
            ))
        })?;
        let cell = &mut self.cells[index];
        if !cell.is_accessible() {
            return Err(Error::OutOfBounds(format!(
                "{loc} is {}, animals cannot live there",
                cell.kind()
            )));
        }
        cell.add_animal(animal)
    }

    fn neighbor_indices(&self, index: usize) -> impl Iterator<Item = usize> + '_ {
        let loc = self.index_to_location(index);
        Direction::all().into_iter().filter_map(move |direction| {
            let (dr, dc) = direction.to_delta();
            let row = loc.row.checked_add_signed(dr)?;
            let col = loc.col.checked_add_signed(dc)?;
            self.index(Location::new(row, col))
        })
    }

    /// Orthogonal neighbors in the order up, down, left, right, skipping
    /// those outside the grid.
    pub fn neighbors(&self, loc: Location) -> Vec<(Location, &Cell)> {
        match self.index(loc) {
            Some(index) => self
                .neighbor_indices(index)
                .map(|i| (self.index_to_location(i), &self.cells[i]))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Iterator over all cells with locations, in row-major order
    pub fn iter(&self) -> impl Iterator<Item = (Location, &Cell)> + '_ {
        self.cells
            .iter()
            .enumerate()
            .map(move |(i, cell)| (self.index_to_location(i), cell))
    }

    pub fn count(&self, species: Species) -> usize {
        self.cells.iter().map(|cell| cell.count(species)).sum()
    }

    pub fn total_count(&self) -> usize {
        self.cells.iter().map(Cell::total_count).sum()
    }

    /// Per-cell counts of `species`, one inner vector per row
    pub fn count_grid(&self, species: Species) -> Vec<Vec<usize>> {
        self.cells
            .chunks(self.cols)
            .map(|row| row.iter().map(|cell| cell.count(species)).collect())
            .collect()
    }

    pub fn cell_kind_grid(&self) -> Vec<Vec<CellKind>> {
        self.cells
            .chunks(self.cols)
            .map(|row| row.iter().map(Cell::kind).collect())
            .collect()
    }

    /// Run one full year: feeding, birth, migration, aging with weight
    /// loss, and death, each across every cell before the next begins.
    pub fn run_year<R: Rng + ?Sized>(&mut self, params: &ParameterSet, rng: &mut R) -> YearOutcome {
        let kills: usize = self.cells.iter_mut().map(|cell| cell.feed(params, &mut *rng)).sum();
        debug!(kills, "Feeding done");

        let births: usize = self.cells.iter_mut().map(|cell| cell.reproduce(params, &mut *rng)).sum();
        debug!(births, "Reproduction done");

        let migrations = self.migrate(params, rng);
        debug!(migrations, "Migration done");

        for cell in &mut self.cells {
            cell.advance_year(params);
        }
        debug!("Aging and weight loss done");

        let deaths: usize = self.cells.iter_mut().map(|cell| cell.cull(params, &mut *rng)).sum();
        debug!(deaths, "Death phase done");

        let outcome = YearOutcome {
            kills,
            births,
            migrations,
            deaths,
        };
        debug!(?outcome, "Year complete");
        outcome
    }

    /// Migration phase. Every decision is made against the populations as
    /// they stand before anyone moves; the moves are applied afterwards.
    /// Returns the number of animals that changed cell.
    pub fn migrate<R: Rng + ?Sized>(&mut self, params: &ParameterSet, rng: &mut R) -> usize {
        let plan = self.plan_migration(params, rng);
        self.apply_migration(plan)
    }

    fn plan_migration<R: Rng + ?Sized>(&self, params: &ParameterSet, rng: &mut R) -> Vec<Departures> {
        let mut plan = Vec::new();

        for (index, cell) in self.cells.iter().enumerate() {
            if cell.is_empty() {
                continue;
            }
            let neighbors: Vec<usize> = self.neighbor_indices(index).collect();

            for species in Species::ALL {
                let species_params = params.species(species);
                let animals = cell.population(species);
                if animals.is_empty() {
                    continue;
                }

                let targets: Vec<Option<usize>> = animals
                    .iter()
                    .map(|animal| {
                        if rng.gen::<f64>() >= animal.move_probability(species_params) {
                            return None;
                        }
                        self.choose_destination(animal, &neighbors, params, &mut *rng)
                    })
                    .collect();

                if targets.iter().any(Option::is_some) {
                    plan.push(Departures {
                        cell: index,
                        species,
                        targets,
                    });
                }
            }
        }

        plan
    }

    /// Pick a neighbor with probability proportional to its propensity, or
    /// `None` when the propensities of all neighbors sum to zero.
    fn choose_destination<R: Rng + ?Sized>(
        &self,
        animal: &Animal,
        neighbors: &[usize],
        params: &ParameterSet,
        rng: &mut R,
    ) -> Option<usize> {
        let raw_total: f64 = neighbors
            .iter()
            .map(|&i| self.cells[i].propensity(animal, params))
            .sum();
        if raw_total == 0.0 {
            return None;
        }

        let log_propensities: Vec<Option<f64>> = neighbors
            .iter()
            .map(|&i| self.cells[i].log_propensity(animal, params))
            .collect();

        // Weights relative to the largest, so large abundances cannot overflow exp()
        let max = log_propensities
            .iter()
            .flatten()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max);
        if max == f64::NEG_INFINITY {
            return None;
        }
        let weights: Vec<f64> = log_propensities
            .iter()
            .map(|lp| lp.map_or(0.0, |lp| (lp - max).exp()))
            .collect();
        let total: f64 = weights.iter().sum();
        if total <= 0.0 {
            return None;
        }

        let draw = rng.gen::<f64>();
        let mut cumulative = 0.0;
        let mut fallback = None;
        for (&neighbor, &weight) in neighbors.iter().zip(&weights) {
            if weight <= 0.0 {
                continue;
            }
            cumulative += weight / total;
            if cumulative > draw {
                return Some(neighbor);
            }
            fallback = Some(neighbor);
        }
        // Rounding left the cumulative sum a hair below the draw
        fallback
    }

    fn apply_migration(&mut self, plan: Vec<Departures>) -> usize {
        let mut arrivals: Vec<(usize, Animal)> = Vec::new();

        for departures in plan {
            let animals = std::mem::take(self.cells[departures.cell].population_mut(departures.species));
            let mut staying = Vec::with_capacity(animals.len());

            for (animal, target) in animals.into_iter().zip(departures.targets) {
                match target {
                    Some(destination) => {
                        trace!(
                            species = %departures.species,
                            from = %self.index_to_location(departures.cell),
                            to = %self.index_to_location(destination),
                            "Animal migrates"
                        );
                        arrivals.push((destination, animal));
                    }
                    None => staying.push(animal),
                }
            }

            *self.cells[departures.cell].population_mut(departures.species) = staying;
        }

        let moved = arrivals.len();
        for (destination, animal) in arrivals {
            let species = animal.species();
            self.cells[destination].population_mut(species).push(animal);
        }
        moved
    }
}
