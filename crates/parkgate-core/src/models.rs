//! Domain vocabulary: directions, barrier classes, gate numbers

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CommandError;

/// Travel direction through a barrier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Entrance,
    Exit,
}

impl Direction {
    /// Upper-case code used in device keys (`ENT` / `EXT`)
    pub fn code(self) -> &'static str {
        match self {
            Direction::Entrance => "ENT",
            Direction::Exit => "EXT",
        }
    }

    /// Lower-case code used in topics and cloud payloads (`ent` / `ext`)
    pub fn short(self) -> &'static str {
        match self {
            Direction::Entrance => "ent",
            Direction::Exit => "ext",
        }
    }

    /// Strict parse for HTTP triggers: only `ENT` or `EXT` are accepted
    pub fn parse_strict(s: &str) -> Result<Self, CommandError> {
        match s {
            "ENT" => Ok(Direction::Entrance),
            "EXT" => Ok(Direction::Exit),
            _ => Err(CommandError::InvalidInput(
                "invalid direction (ENT|EXT)".to_string(),
            )),
        }
    }
}

impl FromStr for Direction {
    type Err = CommandError;

    /// Case-insensitive parse used on the bus path
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ent" | "entrance" | "in" => Ok(Direction::Entrance),
            "ext" | "exit" | "out" => Ok(Direction::Exit),
            other => Err(CommandError::InvalidInput(format!(
                "unknown direction: {other}"
            ))),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Kind of barrier: the main facility gate or an inner zoning barrier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BarrierClass {
    Gate,
    Zone,
}

impl BarrierClass {
    /// Code used in device keys (`GATE` / `ZONE`)
    pub fn code(self) -> &'static str {
        match self {
            BarrierClass::Gate => "GATE",
            BarrierClass::Zone => "ZONE",
        }
    }

    /// Select the class from the location segment of a bus topic.
    ///
    /// Locations starting with `zone` address zoning barriers; every other
    /// location addresses the main gate.
    pub fn from_location(location: &str) -> Self {
        if location.to_ascii_lowercase().starts_with("zone") {
            BarrierClass::Zone
        } else {
            BarrierClass::Gate
        }
    }
}

impl fmt::Display for BarrierClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// What the barrier should do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BarrierAction {
    Open,
    Close,
}

impl BarrierAction {
    /// Parse a bus payload: trimmed, case-insensitive `open` or `close`
    pub fn from_payload(payload: &str) -> Option<Self> {
        match payload.trim().to_ascii_lowercase().as_str() {
            "open" => Some(BarrierAction::Open),
            "close" => Some(BarrierAction::Close),
            _ => None,
        }
    }

    /// Past-tense label returned to HTTP callers
    pub fn past_tense(self) -> &'static str {
        match self {
            BarrierAction::Open => "opened",
            BarrierAction::Close => "closed",
        }
    }
}

impl fmt::Display for BarrierAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BarrierAction::Open => f.write_str("open"),
            BarrierAction::Close => f.write_str("close"),
        }
    }
}

/// Gate number as supplied by a caller: a non-empty run of ASCII digits
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GateNo(String);

impl GateNo {
    pub fn parse(raw: &str) -> Result<Self, CommandError> {
        if !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit()) {
            Ok(Self(raw.to_string()))
        } else {
            Err(CommandError::InvalidInput("invalid gate number".to_string()))
        }
    }

    /// The gate exactly as it was supplied
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Canonical form, zero-padded to at least two digits (`1` -> `01`)
    pub fn padded(&self) -> String {
        match self.0.parse::<u64>() {
            Ok(n) => format!("{n:02}"),
            Err(_) => format!("{:0>2}", self.0),
        }
    }
}

impl fmt::Display for GateNo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Map the camera's vehicle type label to the cloud's vehicle type id
pub fn vehicle_type_id(label: &str) -> u8 {
    match label.trim().to_ascii_lowercase().as_str() {
        "motorcycle" => 2,
        "truck" => 3,
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_direction_strict_parse() {
        assert_eq!(Direction::parse_strict("ENT").unwrap(), Direction::Entrance);
        assert_eq!(Direction::parse_strict("EXT").unwrap(), Direction::Exit);
        assert!(Direction::parse_strict("ent").is_err());
        assert!(Direction::parse_strict("ENTX").is_err());
    }

    #[test]
    fn test_direction_loose_parse() {
        assert_eq!("ent".parse::<Direction>().unwrap(), Direction::Entrance);
        assert_eq!("EXT".parse::<Direction>().unwrap(), Direction::Exit);
        assert!("sideways".parse::<Direction>().is_err());
    }

    #[rstest]
    #[case("1", "01")]
    #[case("01", "01")]
    #[case("12", "12")]
    #[case("123", "123")]
    #[case("007", "07")]
    fn test_gate_padding(#[case] raw: &str, #[case] padded: &str) {
        assert_eq!(GateNo::parse(raw).unwrap().padded(), padded);
    }

    #[rstest]
    #[case("")]
    #[case("1a")]
    #[case("-1")]
    #[case(" 1")]
    fn test_gate_rejects_non_digits(#[case] raw: &str) {
        assert!(GateNo::parse(raw).is_err());
    }

    #[test]
    fn test_class_from_location() {
        assert_eq!(BarrierClass::from_location("loc1"), BarrierClass::Gate);
        assert_eq!(BarrierClass::from_location("ZONE07"), BarrierClass::Zone);
        assert_eq!(BarrierClass::from_location("zone"), BarrierClass::Zone);
    }

    #[test]
    fn test_action_from_payload() {
        assert_eq!(BarrierAction::from_payload(" OPEN\n"), Some(BarrierAction::Open));
        assert_eq!(BarrierAction::from_payload("close"), Some(BarrierAction::Close));
        assert_eq!(BarrierAction::from_payload("toggle"), None);
    }

    #[test]
    fn test_vehicle_type_id() {
        assert_eq!(vehicle_type_id("car"), 1);
        assert_eq!(vehicle_type_id("motorcycle"), 2);
        assert_eq!(vehicle_type_id("Truck"), 3);
        assert_eq!(vehicle_type_id("vehicle"), 1);
        assert_eq!(vehicle_type_id(""), 1);
    }
}
