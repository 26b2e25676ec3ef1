//! Scripted snapshot client for tests
//!
//! Each `(host, path)` pair is given a [`Script`]. Attempts that are still
//! waiting when their token fires count as cancellations, which lets tests
//! observe that losing candidates were actually aborted.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;

use crate::client::{RawSnapshot, SnapshotClient};
use crate::error::FetchError;

const ANY_PATH: &str = "*";

#[derive(Debug, Clone)]
pub enum Script {
    /// Answer after `delay`
    Respond {
        delay: Duration,
        status: u16,
        body: Bytes,
    },
    /// Fail after `delay`
    Fail { delay: Duration, error: FetchError },
    /// Never answer
    Hang,
}

impl Script {
    /// Immediate 200 with a body of `len` bytes
    pub fn image(len: usize) -> Self {
        Self::delayed_image(Duration::ZERO, len)
    }

    pub fn delayed_image(delay: Duration, len: usize) -> Self {
        Script::Respond {
            delay,
            status: 200,
            body: Bytes::from(vec![0xFF; len]),
        }
    }
}

#[derive(Debug, Default)]
pub struct ScriptedSnapshotClient {
    scripts: RwLock<HashMap<(String, String), Script>>,
    calls: RwLock<Vec<(String, String)>>,
    cancellations: AtomicUsize,
}

impl ScriptedSnapshotClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, host: &str, path: &str, script: Script) -> Self {
        self.scripts
            .write()
            .insert((host.to_string(), path.to_string()), script);
        self
    }

    /// Script every path of `host`
    pub fn with_host(self, host: &str, script: Script) -> Self {
        self.with(host, ANY_PATH, script)
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.read().clone()
    }

    pub fn cancellations(&self) -> usize {
        self.cancellations.load(Ordering::SeqCst)
    }

    fn script_for(&self, host: &str, path: &str) -> Option<Script> {
        let scripts = self.scripts.read();
        scripts
            .get(&(host.to_string(), path.to_string()))
            .or_else(|| scripts.get(&(host.to_string(), ANY_PATH.to_string())))
            .cloned()
    }

    async fn wait(&self, delay: Duration, cancel: &CancellationToken) -> Result<(), FetchError> {
        tokio::select! {
            _ = cancel.cancelled() => {
                self.cancellations.fetch_add(1, Ordering::SeqCst);
                Err(FetchError::Cancelled)
            }
            _ = tokio::time::sleep(delay) => Ok(()),
        }
    }
}

#[async_trait]
impl SnapshotClient for ScriptedSnapshotClient {
    async fn get(
        &self,
        host: &str,
        path: &str,
        cancel: &CancellationToken,
    ) -> Result<RawSnapshot, FetchError> {
        self.calls.write().push((host.to_string(), path.to_string()));

        match self.script_for(host, path) {
            Some(Script::Respond {
                delay,
                status,
                body,
            }) => {
                self.wait(delay, cancel).await?;
                Ok(RawSnapshot { status, body })
            }
            Some(Script::Fail { delay, error }) => {
                self.wait(delay, cancel).await?;
                Err(error)
            }
            Some(Script::Hang) => {
                cancel.cancelled().await;
                self.cancellations.fetch_add(1, Ordering::SeqCst);
                Err(FetchError::Cancelled)
            }
            None => Err(FetchError::Status(404)),
        }
    }
}
