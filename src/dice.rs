//! Black Hack dice mechanics.
//!
//! Roll-under checks (d20 against an attribute), damage notation
//! (`XdY+Z`), and a roller seam so tests can script exact die faces.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error type for dice notation parsing.
#[derive(Debug, Error)]
pub enum DiceError {
    #[error("Invalid dice notation: {0}")]
    InvalidNotation(String),
    #[error("Invalid die size: {0}")]
    InvalidDieSize(u32),
    #[error("No dice specified")]
    NoDice,
}

/// Source of individual die faces.
///
/// Every random draw in the engine goes through this trait, so a scripted
/// roller can stand in during tests.
pub trait DiceRoller {
    /// Uniform integer in `[1, sides]`.
    fn roll_die(&mut self, sides: u32) -> u32;
}

/// Production roller backed by a `rand` PRNG.
pub struct ThreadRoller {
    rng: StdRng,
}

impl ThreadRoller {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for ThreadRoller {
    fn default() -> Self {
        Self::new()
    }
}

impl DiceRoller for ThreadRoller {
    fn roll_die(&mut self, sides: u32) -> u32 {
        self.rng.gen_range(1..=sides.max(1))
    }
}

/// Scripted roller for tests: yields the queued faces in order.
///
/// Panics when the queue runs dry, which is the point: a test that rolls
/// more dice than it scripted is wrong.
pub struct FixedRoller {
    faces: VecDeque<u32>,
}

impl FixedRoller {
    pub fn new(faces: impl IntoIterator<Item = u32>) -> Self {
        Self {
            faces: faces.into_iter().collect(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.faces.len()
    }
}

impl DiceRoller for FixedRoller {
    fn roll_die(&mut self, _sides: u32) -> u32 {
        self.faces
            .pop_front()
            .expect("FixedRoller ran out of scripted faces")
    }
}

/// Sum of `count` independent rolls of a `sides`-sided die.
pub fn roll_dice(roller: &mut dyn DiceRoller, count: u32, sides: u32) -> u32 {
    (0..count).map(|_| roller.roll_die(sides)).sum()
}

/// Outcome of a roll-under d20 check.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Check {
    pub roll: u32,
    pub success: bool,
}

/// d20 against an attribute: success iff the roll is at or under it.
pub fn roll_check(roller: &mut dyn DiceRoller, attribute: i32) -> Check {
    let roll = roller.roll_die(20);
    Check {
        roll,
        success: roll as i32 <= attribute,
    }
}

/// d20 with disadvantage under roll-under rules: roll twice, keep the
/// higher die (higher is worse when you need to roll under).
pub fn roll_disadvantage(roller: &mut dyn DiceRoller) -> u32 {
    let first = roller.roll_die(20);
    let second = roller.roll_die(20);
    first.max(second)
}

/// A damage expression in `XdY+Z` notation ("1d8", "6d6", "2d4+1").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceExpression {
    pub count: u32,
    pub sides: u32,
    pub modifier: i32,
}

impl DiceExpression {
    /// Parse a dice notation string.
    pub fn parse(notation: &str) -> Result<Self, DiceError> {
        let notation = notation.trim().to_lowercase();
        if notation.is_empty() {
            return Err(DiceError::NoDice);
        }

        let d_pos = notation
            .find('d')
            .ok_or_else(|| DiceError::InvalidNotation(notation.clone()))?;
        let count_str = &notation[..d_pos];
        let rest = &notation[d_pos + 1..];

        let count: u32 = if count_str.is_empty() {
            1
        } else {
            count_str
                .parse()
                .map_err(|_| DiceError::InvalidNotation(notation.clone()))?
        };
        if count == 0 {
            return Err(DiceError::NoDice);
        }

        let (sides_str, modifier) = if let Some(pos) = rest.find(['+', '-']) {
            let sign: i32 = if rest.as_bytes()[pos] == b'+' { 1 } else { -1 };
            let value: i32 = rest[pos + 1..]
                .parse()
                .map_err(|_| DiceError::InvalidNotation(notation.clone()))?;
            (&rest[..pos], sign * value)
        } else {
            (rest, 0)
        };

        let sides: u32 = sides_str
            .parse()
            .map_err(|_| DiceError::InvalidNotation(notation.clone()))?;
        if !(2..=100).contains(&sides) {
            return Err(DiceError::InvalidDieSize(sides));
        }

        Ok(DiceExpression {
            count,
            sides,
            modifier,
        })
    }

    /// Roll the expression. Never returns a negative total.
    pub fn roll(&self, roller: &mut dyn DiceRoller) -> i32 {
        let total = roll_dice(roller, self.count, self.sides) as i32 + self.modifier;
        total.max(0)
    }
}

impl FromStr for DiceExpression {
    type Err = DiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DiceExpression::parse(s)
    }
}

impl fmt::Display for DiceExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}d{}", self.count, self.sides)?;
        match self.modifier.cmp(&0) {
            std::cmp::Ordering::Greater => write!(f, "+{}", self.modifier),
            std::cmp::Ordering::Less => write!(f, "{}", self.modifier),
            std::cmp::Ordering::Equal => Ok(()),
        }
    }
}
