//! Island population-dynamics engine.
//!
//! This crate implements the landscape grid where herbivores and carnivores
//! feed, breed, migrate, age and die, one simulated year at a time.

pub mod animal;
pub mod cell;
pub mod grid;
pub mod population;
pub mod simulation;
pub mod island;

pub use animal::Animal;
pub use cell::Cell;
pub use grid::{Grid, YearOutcome};
pub use population::{AnimalDescriptor, LoadReport, PopulationEntry};
pub use simulation::{CellCensus, Simulation, SimulationResult, SpeciesCounts, YearCensus};
pub use island::{IslandJob, IslandResult};
