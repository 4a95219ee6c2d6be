//! Core type definitions for the simulation.

use crate::error::{Error, GeographyError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The two animal species living on the island
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Species {
    Herbivore,
    Carnivore,
}

impl Species {
    /// Every species, in the order the engine processes them.
    pub const ALL: [Species; 2] = [Species::Herbivore, Species::Carnivore];

    pub fn name(&self) -> &'static str {
        match self {
            Species::Herbivore => "Herbivore",
            Species::Carnivore => "Carnivore",
        }
    }
}

impl fmt::Display for Species {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Species {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Herbivore" => Ok(Species::Herbivore),
            "Carnivore" => Ok(Species::Carnivore),
            other => Err(Error::Validation(format!("unknown species {other:?}"))),
        }
    }
}

/// Landscape kind of a single island cell. Deserialization also accepts the
/// geography letter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CellKind {
    #[serde(alias = "O")]
    Ocean,
    #[serde(alias = "M")]
    Mountain,
    #[serde(alias = "D")]
    Desert,
    #[serde(alias = "S")]
    Savannah,
    #[serde(alias = "J")]
    Jungle,
}

impl CellKind {
    pub const ALL: [CellKind; 5] = [
        CellKind::Ocean,
        CellKind::Mountain,
        CellKind::Desert,
        CellKind::Savannah,
        CellKind::Jungle,
    ];

    /// Animals may only live on Desert, Savannah and Jungle.
    pub fn is_accessible(&self) -> bool {
        !matches!(self, CellKind::Ocean | CellKind::Mountain)
    }

    /// Geography letter of this kind
    pub fn code(&self) -> char {
        match self {
            CellKind::Ocean => 'O',
            CellKind::Mountain => 'M',
            CellKind::Desert => 'D',
            CellKind::Savannah => 'S',
            CellKind::Jungle => 'J',
        }
    }
}

impl fmt::Display for CellKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CellKind::Ocean => "Ocean",
            CellKind::Mountain => "Mountain",
            CellKind::Desert => "Desert",
            CellKind::Savannah => "Savannah",
            CellKind::Jungle => "Jungle",
        };
        f.write_str(name)
    }
}

impl TryFrom<char> for CellKind {
    type Error = GeographyError;

    /// Position information is unknown here, so errors report row and column 0;
    /// the geography parser fills in the real location.
    fn try_from(code: char) -> Result<Self, Self::Error> {
        CellKind::ALL
            .into_iter()
            .find(|kind| kind.code() == code)
            .ok_or(GeographyError::UnknownLandscape {
                row: 0,
                col: 0,
                found: code,
            })
    }
}

/// Row/column coordinate of a cell, zero-based from the top-left corner
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "(usize, usize)", into = "(usize, usize)")]
pub struct Location {
    pub row: usize,
    pub col: usize,
}

impl Location {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

impl From<(usize, usize)> for Location {
    fn from((row, col): (usize, usize)) -> Self {
        Self { row, col }
    }
}

impl From<Location> for (usize, usize) {
    fn from(loc: Location) -> Self {
        (loc.row, loc.col)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// Orthogonal step directions, in the fixed order used for migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub fn all() -> [Direction; 4] {
        [Direction::Up, Direction::Down, Direction::Left, Direction::Right]
    }

    pub fn to_delta(&self) -> (isize, isize) {
        match self {
            Direction::Up => (-1, 0),
            Direction::Down => (1, 0),
            Direction::Left => (0, -1),
            Direction::Right => (0, 1),
        }
    }
}
