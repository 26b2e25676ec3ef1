//! Coil assignment table
//!
//! Maps `(barrier class, direction)` to the pair of coil registers that open
//! and close the barrier. Every actuation path selects its register from this
//! table instead of branching at the call site.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::models::{BarrierAction, BarrierClass, Direction};

/// Open/close register pair for one barrier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoilPair {
    pub open: u16,
    pub close: u16,
}

impl CoilPair {
    pub const fn new(open: u16, close: u16) -> Self {
        Self { open, close }
    }

    pub fn select(&self, action: BarrierAction) -> u16 {
        match action {
            BarrierAction::Open => self.open,
            BarrierAction::Close => self.close,
        }
    }
}

/// Coil pairs for both directions of one barrier class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectionCoils {
    pub entrance: CoilPair,
    pub exit: CoilPair,
}

impl DirectionCoils {
    fn get(&self, direction: Direction) -> CoilPair {
        match direction {
            Direction::Entrance => self.entrance,
            Direction::Exit => self.exit,
        }
    }
}

/// Full coil assignment table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoilMap {
    #[serde(default = "default_gate_coils")]
    pub gate: DirectionCoils,
    #[serde(default = "default_zone_coils")]
    pub zone: DirectionCoils,
}

fn default_gate_coils() -> DirectionCoils {
    DirectionCoils {
        entrance: CoilPair::new(1, 4),
        exit: CoilPair::new(1, 4),
    }
}

fn default_zone_coils() -> DirectionCoils {
    DirectionCoils {
        entrance: CoilPair::new(1, 2),
        exit: CoilPair::new(3, 4),
    }
}

impl Default for CoilMap {
    fn default() -> Self {
        Self {
            gate: default_gate_coils(),
            zone: default_zone_coils(),
        }
    }
}

impl CoilMap {
    /// Build a table, rejecting any barrier whose open and close registers collide
    pub fn new(gate: DirectionCoils, zone: DirectionCoils) -> Result<Self, ConfigError> {
        let map = Self { gate, zone };
        map.validate()?;
        Ok(map)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for class in [BarrierClass::Gate, BarrierClass::Zone] {
            for direction in [Direction::Entrance, Direction::Exit] {
                let pair = self.pair(direction, class);
                if pair.open == pair.close {
                    return Err(ConfigError::invalid(
                        format!("coils.{}.{}", class.code().to_lowercase(), direction.short()),
                        format!("open and close share register {}", pair.open),
                    ));
                }
            }
        }
        Ok(())
    }

    pub fn pair(&self, direction: Direction, class: BarrierClass) -> CoilPair {
        match class {
            BarrierClass::Gate => self.gate.get(direction),
            BarrierClass::Zone => self.zone.get(direction),
        }
    }

    /// Register to pulse for the given barrier and action
    pub fn coil(&self, direction: Direction, class: BarrierClass, action: BarrierAction) -> u16 {
        self.pair(direction, class).select(action)
    }
}
