//! Coil pulses and barrier commands

use std::sync::Arc;
use std::time::Duration;

use parkgate_core::{
    BarrierAction, BarrierClass, CoilMap, CommandError, DeviceDirectory, Direction, GateNo,
};
use tracing::{debug, error, info, warn};

use crate::error::FieldBusError;
use crate::fieldbus::FieldBusConnector;

/// Energize-dwell-de-energize on a single coil
pub struct Actuator {
    connector: Arc<dyn FieldBusConnector>,
    dwell: Duration,
}

impl Actuator {
    pub fn new(connector: Arc<dyn FieldBusConnector>, dwell: Duration) -> Self {
        Self { connector, dwell }
    }

    pub fn dwell(&self) -> Duration {
        self.dwell
    }

    /// Pulse `coil` on the controller at `address`.
    ///
    /// The de-energize write is always attempted once a session is open, even
    /// when energizing failed. The first error encountered is returned.
    ///
    /// The sequence runs on its own task: dropping the returned future does
    /// not stop it between the two writes.
    pub async fn pulse(&self, address: &str, coil: u16) -> Result<(), FieldBusError> {
        let connector = self.connector.clone();
        let dwell = self.dwell;
        let address = address.to_string();

        tokio::spawn(async move { run_pulse(connector, &address, coil, dwell).await })
            .await
            .map_err(|e| FieldBusError::Io(format!("pulse task failed: {e}")))?
    }
}

async fn run_pulse(
    connector: Arc<dyn FieldBusConnector>,
    address: &str,
    coil: u16,
    dwell: Duration,
) -> Result<(), FieldBusError> {
    let mut session = connector.connect(address).await?;

    let energize = session.write_single_coil(coil, true).await;
    match &energize {
        Ok(()) => tokio::time::sleep(dwell).await,
        Err(e) => error!(%address, coil, error = %e, "Energize write failed"),
    }

    let deenergize = session.write_single_coil(coil, false).await;
    if let Err(e) = &deenergize {
        error!(%address, coil, error = %e, "De-energize write failed");
    }

    session.close().await;
    energize.and(deenergize)
}

impl std::fmt::Debug for Actuator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Actuator")
            .field("dwell", &self.dwell)
            .finish_non_exhaustive()
    }
}

/// Resolves a barrier to its controller and coil, then pulses it
#[derive(Debug, Clone)]
pub struct BarrierCommander {
    actuator: Arc<Actuator>,
    directory: DeviceDirectory,
    coils: Arc<CoilMap>,
}

impl BarrierCommander {
    pub fn new(actuator: Arc<Actuator>, directory: DeviceDirectory, coils: Arc<CoilMap>) -> Self {
        Self {
            actuator,
            directory,
            coils,
        }
    }

    pub fn directory(&self) -> &DeviceDirectory {
        &self.directory
    }

    pub async fn actuate(
        &self,
        direction: Direction,
        class: BarrierClass,
        gate: &GateNo,
        action: BarrierAction,
    ) -> Result<(), CommandError> {
        let Some(address) = self.directory.resolve_barrier(direction, class, gate) else {
            let key = DeviceDirectory::barrier_key(direction, class, &gate.padded());
            warn!(%key, "No controller configured for barrier");
            return Err(CommandError::NotConfigured { key });
        };

        let coil = self.coils.coil(direction, class, action);
        debug!(%address, coil, %direction, %class, gate = %gate, %action, "Pulsing barrier coil");

        self.actuator
            .pulse(&address, coil)
            .await
            .map_err(|e| CommandError::Actuation(e.to_string()))?;

        info!(%direction, %class, gate = %gate, "Barrier {}", action.past_tense());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fieldbus::mock::{FieldEvent, RecordingConnector};
    use parkgate_core::AddressSource;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;

    fn actuator(connector: &RecordingConnector) -> Actuator {
        Actuator::new(Arc::new(connector.clone()), Duration::from_millis(5))
    }

    fn directory(entries: &[(&str, &str)]) -> DeviceDirectory {
        let map: BTreeMap<String, String> = entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let source: Arc<dyn AddressSource> = Arc::new(map);
        DeviceDirectory::new(source)
    }

    #[tokio::test]
    async fn test_pulse_writes_on_then_off() {
        let connector = RecordingConnector::new();
        actuator(&connector).pulse("10.0.0.5", 1).await.unwrap();

        assert_eq!(
            connector.events(),
            vec![
                FieldEvent::Connect("10.0.0.5".into()),
                FieldEvent::Write {
                    host: "10.0.0.5".into(),
                    address: 1,
                    on: true
                },
                FieldEvent::Write {
                    host: "10.0.0.5".into(),
                    address: 1,
                    on: false
                },
                FieldEvent::Close("10.0.0.5".into()),
            ]
        );
    }

    #[tokio::test]
    async fn test_pulse_deenergizes_after_failed_energize() {
        let connector = RecordingConnector::new();
        connector.fail_writes_when(true, true);

        let result = actuator(&connector).pulse("10.0.0.5", 3).await;
        assert!(result.is_err());
        assert_eq!(
            connector.writes(),
            vec![("10.0.0.5".into(), 3, true), ("10.0.0.5".into(), 3, false)]
        );
    }

    #[tokio::test]
    async fn test_pulse_reports_failed_deenergize() {
        let connector = RecordingConnector::new();
        connector.fail_writes_when(false, true);

        let result = actuator(&connector).pulse("10.0.0.5", 4).await;
        assert!(matches!(result, Err(FieldBusError::Exception { .. })));
        assert_eq!(connector.writes().len(), 2);
        assert_eq!(
            connector.events().last(),
            Some(&FieldEvent::Close("10.0.0.5".into()))
        );
    }

    #[tokio::test]
    async fn test_pulse_connect_failure_writes_nothing() {
        let connector = RecordingConnector::new();
        connector.fail_connect(true);

        let result = actuator(&connector).pulse("10.0.0.5", 1).await;
        assert!(matches!(result, Err(FieldBusError::ConnectionFailed(_))));
        assert!(connector.events().is_empty());
    }

    #[tokio::test]
    async fn test_dropped_pulse_still_deenergizes() {
        let connector = RecordingConnector::new();
        let actuator = Actuator::new(Arc::new(connector.clone()), Duration::from_millis(200));

        let cut =
            tokio::time::timeout(Duration::from_millis(50), actuator.pulse("10.0.0.5", 1)).await;
        assert!(cut.is_err());

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(
            connector.writes(),
            vec![("10.0.0.5".into(), 1, true), ("10.0.0.5".into(), 1, false)]
        );
        assert_eq!(
            connector.events().last(),
            Some(&FieldEvent::Close("10.0.0.5".into()))
        );
    }

    #[tokio::test]
    async fn test_commander_selects_coil_from_table() {
        let connector = RecordingConnector::new();
        let commander = BarrierCommander::new(
            Arc::new(actuator(&connector)),
            directory(&[("EXT_ZONE_02", "10.0.1.2")]),
            Arc::new(CoilMap::default()),
        );

        commander
            .actuate(
                Direction::Exit,
                BarrierClass::Zone,
                &GateNo::parse("2").unwrap(),
                BarrierAction::Close,
            )
            .await
            .unwrap();

        assert_eq!(
            connector.writes(),
            vec![("10.0.1.2".into(), 4, true), ("10.0.1.2".into(), 4, false)]
        );
    }

    #[tokio::test]
    async fn test_commander_missing_address_is_not_configured() {
        let connector = RecordingConnector::new();
        let commander = BarrierCommander::new(
            Arc::new(actuator(&connector)),
            directory(&[]),
            Arc::new(CoilMap::default()),
        );

        let err = commander
            .actuate(
                Direction::Entrance,
                BarrierClass::Gate,
                &GateNo::parse("7").unwrap(),
                BarrierAction::Open,
            )
            .await
            .unwrap_err();

        assert_eq!(
            err,
            CommandError::NotConfigured {
                key: "ENT_GATE_07".into()
            }
        );
        assert!(connector.events().is_empty());
    }

    #[tokio::test]
    async fn test_commander_wraps_bus_failure() {
        let connector = RecordingConnector::new();
        connector.fail_connect(true);
        let commander = BarrierCommander::new(
            Arc::new(actuator(&connector)),
            directory(&[("ENT_GATE_01", "10.0.0.1")]),
            Arc::new(CoilMap::default()),
        );

        let err = commander
            .actuate(
                Direction::Entrance,
                BarrierClass::Gate,
                &GateNo::parse("01").unwrap(),
                BarrierAction::Open,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::Actuation(_)));
    }
}
