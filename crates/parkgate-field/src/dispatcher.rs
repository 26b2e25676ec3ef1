//! Command-bus topic parsing and dispatch
//!
//! Topics have the shape
//! `{location}/{parking_code}/{direction}/{gate}/barrier/command`. The
//! location decides the barrier class: locations starting with `zone` drive
//! zoning barriers, everything else drives the main gate.

use parkgate_core::{BarrierAction, BarrierClass, CommandError, Direction, GateNo};
use thiserror::Error;
use tracing::{info, warn};

use crate::actuator::BarrierCommander;

const TOPIC_SEGMENTS: usize = 6;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("Malformed topic: {0}")]
    Topic(String),

    #[error("Unrecognized payload: {0}")]
    Payload(String),

    #[error(transparent)]
    Command(#[from] CommandError),
}

/// Fields extracted from a command topic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BarrierTopic {
    pub location: String,
    pub parking_code: String,
    pub direction: Direction,
    pub gate: GateNo,
}

impl BarrierTopic {
    pub fn class(&self) -> BarrierClass {
        BarrierClass::from_location(&self.location)
    }
}

/// Subscription filter for one facility, or every facility when `None`
pub fn subscription_filter(parking_code: Option<&str>) -> String {
    let code = parking_code
        .map(str::trim)
        .filter(|code| !code.is_empty())
        .unwrap_or("+");
    format!("+/{code}/+/+/barrier/command")
}

pub fn parse_topic(topic: &str) -> Result<BarrierTopic, DispatchError> {
    let parts: Vec<&str> = topic.split('/').collect();
    if parts.len() != TOPIC_SEGMENTS {
        return Err(DispatchError::Topic(format!(
            "{topic}: expected {TOPIC_SEGMENTS} segments, got {}",
            parts.len()
        )));
    }
    if parts[4] != "barrier" || parts[5] != "command" {
        return Err(DispatchError::Topic(format!(
            "{topic}: not a barrier command"
        )));
    }
    if parts[0].is_empty() {
        return Err(DispatchError::Topic(format!("{topic}: empty location")));
    }

    let direction: Direction = parts[2]
        .parse()
        .map_err(|e: CommandError| DispatchError::Topic(format!("{topic}: {e}")))?;
    let gate = GateNo::parse(parts[3])
        .map_err(|e| DispatchError::Topic(format!("{topic}: {e}")))?;

    Ok(BarrierTopic {
        location: parts[0].to_string(),
        parking_code: parts[1].to_string(),
        direction,
        gate,
    })
}

/// Turns bus messages into barrier pulses
#[derive(Debug, Clone)]
pub struct CommandDispatcher {
    commander: BarrierCommander,
}

impl CommandDispatcher {
    pub fn new(commander: BarrierCommander) -> Self {
        Self { commander }
    }

    /// Handle one inbound message. Errors are returned for logging only.
    pub async fn handle_message(&self, topic: &str, payload: &[u8]) -> Result<(), DispatchError> {
        let text = String::from_utf8_lossy(payload);
        let action = BarrierAction::from_payload(&text)
            .ok_or_else(|| DispatchError::Payload(text.trim().to_string()))?;
        let parsed = parse_topic(topic)?;

        info!(
            location = %parsed.location,
            parking_code = %parsed.parking_code,
            direction = %parsed.direction,
            gate = %parsed.gate,
            %action,
            "Barrier command received"
        );

        self.commander
            .actuate(parsed.direction, parsed.class(), &parsed.gate, action)
            .await
            .map_err(|e| {
                warn!(%topic, error = %e, "Barrier command failed");
                DispatchError::from(e)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuator::Actuator;
    use crate::fieldbus::mock::RecordingConnector;
    use parkgate_core::{AddressSource, CoilMap, DeviceDirectory};
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use std::time::Duration;

    fn dispatcher(connector: &RecordingConnector) -> CommandDispatcher {
        let mut map = BTreeMap::new();
        map.insert("ENT_GATE_01".to_string(), "10.0.0.1".to_string());
        map.insert("EXT_ZONE_03".to_string(), "10.0.3.3".to_string());
        let source: Arc<dyn AddressSource> = Arc::new(map);

        let actuator = Actuator::new(Arc::new(connector.clone()), Duration::from_millis(1));
        CommandDispatcher::new(BarrierCommander::new(
            Arc::new(actuator),
            DeviceDirectory::new(source),
            Arc::new(CoilMap::default()),
        ))
    }

    #[test]
    fn test_parse_topic() {
        let topic = parse_topic("loc1/pk01/ent/01/barrier/command").unwrap();
        assert_eq!(topic.location, "loc1");
        assert_eq!(topic.parking_code, "pk01");
        assert_eq!(topic.direction, Direction::Entrance);
        assert_eq!(topic.gate.as_str(), "01");
        assert_eq!(topic.class(), BarrierClass::Gate);
    }

    #[test]
    fn test_parse_zone_topic() {
        let topic = parse_topic("Zone-B/pk01/EXT/3/barrier/command").unwrap();
        assert_eq!(topic.class(), BarrierClass::Zone);
        assert_eq!(topic.direction, Direction::Exit);
    }

    #[rstest]
    #[case("loc1/pk01/ent/01/barrier")]
    #[case("loc1/pk01/ent/01/barrier/command/extra")]
    #[case("loc1/pk01/ent/01/gate/command")]
    #[case("loc1/pk01/ent/01/barrier/status")]
    #[case("loc1/pk01/sideways/01/barrier/command")]
    #[case("loc1/pk01/ent/one/barrier/command")]
    #[case("/pk01/ent/01/barrier/command")]
    fn test_parse_topic_rejects(#[case] topic: &str) {
        assert!(matches!(parse_topic(topic), Err(DispatchError::Topic(_))));
    }

    #[test]
    fn test_subscription_filter() {
        assert_eq!(subscription_filter(None), "+/+/+/+/barrier/command");
        assert_eq!(subscription_filter(Some("")), "+/+/+/+/barrier/command");
        assert_eq!(subscription_filter(Some("pk01")), "+/pk01/+/+/barrier/command");
    }

    #[tokio::test]
    async fn test_open_command_pulses_entrance_open_coil_once() {
        let connector = RecordingConnector::new();
        dispatcher(&connector)
            .handle_message("loc1/pk01/ent/01/barrier/command", b"OPEN")
            .await
            .unwrap();

        assert_eq!(
            connector.writes(),
            vec![("10.0.0.1".into(), 1, true), ("10.0.0.1".into(), 1, false)]
        );
    }

    #[tokio::test]
    async fn test_zone_close_command() {
        let connector = RecordingConnector::new();
        dispatcher(&connector)
            .handle_message("zone-b/pk01/ext/3/barrier/command", b" close\n")
            .await
            .unwrap();

        assert_eq!(
            connector.writes(),
            vec![("10.0.3.3".into(), 4, true), ("10.0.3.3".into(), 4, false)]
        );
    }

    #[tokio::test]
    async fn test_unknown_payload_is_ignored() {
        let connector = RecordingConnector::new();
        let err = dispatcher(&connector)
            .handle_message("loc1/pk01/ent/01/barrier/command", b"toggle")
            .await
            .unwrap_err();

        assert_eq!(err, DispatchError::Payload("toggle".into()));
        assert!(connector.events().is_empty());
    }

    #[tokio::test]
    async fn test_unconfigured_gate_never_connects() {
        let connector = RecordingConnector::new();
        let err = dispatcher(&connector)
            .handle_message("loc1/pk01/ext/09/barrier/command", b"open")
            .await
            .unwrap_err();

        assert_eq!(
            err,
            DispatchError::Command(CommandError::NotConfigured {
                key: "EXT_GATE_09".into()
            })
        );
        assert!(connector.events().is_empty());
    }
}
