//! Recording field-bus connector for tests
//!
//! Every connect, write and close is appended to a shared event log so tests
//! can assert on the exact coil sequence a command produced.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{CoilSession, FieldBusConnector};
use crate::error::FieldBusError;

/// One observed field-bus interaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldEvent {
    Connect(String),
    Write { host: String, address: u16, on: bool },
    Close(String),
}

#[derive(Debug, Default)]
struct Shared {
    events: RwLock<Vec<FieldEvent>>,
    fail_connect: AtomicBool,
    fail_on_writes: AtomicBool,
    fail_off_writes: AtomicBool,
}

/// Connector that records instead of talking to hardware
#[derive(Debug, Clone, Default)]
pub struct RecordingConnector {
    shared: Arc<Shared>,
}

impl RecordingConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent connects fail
    pub fn fail_connect(&self, fail: bool) {
        self.shared.fail_connect.store(fail, Ordering::SeqCst);
    }

    /// Make writes of the given coil state fail (they are still recorded)
    pub fn fail_writes_when(&self, on: bool, fail: bool) {
        let flag = if on {
            &self.shared.fail_on_writes
        } else {
            &self.shared.fail_off_writes
        };
        flag.store(fail, Ordering::SeqCst);
    }

    pub fn events(&self) -> Vec<FieldEvent> {
        self.shared.events.read().clone()
    }

    /// Only the coil writes, in order
    pub fn writes(&self) -> Vec<(String, u16, bool)> {
        self.shared
            .events
            .read()
            .iter()
            .filter_map(|event| match event {
                FieldEvent::Write { host, address, on } => Some((host.clone(), *address, *on)),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.shared.events.write().clear();
    }
}

#[async_trait]
impl FieldBusConnector for RecordingConnector {
    async fn connect(&self, host: &str) -> Result<Box<dyn CoilSession>, FieldBusError> {
        if self.shared.fail_connect.load(Ordering::SeqCst) {
            return Err(FieldBusError::ConnectionFailed(format!("{host}: refused")));
        }
        self.shared
            .events
            .write()
            .push(FieldEvent::Connect(host.to_string()));
        Ok(Box::new(RecordingSession {
            host: host.to_string(),
            shared: self.shared.clone(),
        }))
    }
}

struct RecordingSession {
    host: String,
    shared: Arc<Shared>,
}

#[async_trait]
impl CoilSession for RecordingSession {
    async fn write_single_coil(&mut self, address: u16, on: bool) -> Result<(), FieldBusError> {
        self.shared.events.write().push(FieldEvent::Write {
            host: self.host.clone(),
            address,
            on,
        });
        let fail = if on {
            self.shared.fail_on_writes.load(Ordering::SeqCst)
        } else {
            self.shared.fail_off_writes.load(Ordering::SeqCst)
        };
        if fail {
            return Err(FieldBusError::Exception {
                function: super::modbus::WRITE_SINGLE_COIL,
                code: 0x04,
            });
        }
        Ok(())
    }

    async fn close(&mut self) {
        self.shared
            .events
            .write()
            .push(FieldEvent::Close(self.host.clone()));
    }
}
