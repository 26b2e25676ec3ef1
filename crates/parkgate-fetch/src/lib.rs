//! parkgate-fetch - Camera snapshot retrieval
//!
//! Cameras are queried over HTTP with digest authentication. Because camera
//! models disagree on the snapshot path, a fetch may race several candidate
//! paths against one host ([`HedgedFetcher::fetch_best`]); the first
//! response that looks like a real image wins and the other attempts are
//! cancelled. [`HedgedFetcher::fetch_roles`] does the same for a set of
//! cameras at once, keyed by their role at the gate.

pub mod client;
pub mod error;
pub mod hedge;
pub mod mock;
pub mod paths;

pub use client::{DigestSnapshotClient, RawSnapshot, SnapshotClient};
pub use error::FetchError;
pub use hedge::HedgedFetcher;
pub use mock::{Script, ScriptedSnapshotClient};
pub use paths::{
    pick_host, DRIVER_HOST_PREFS, DRIVER_SNAPSHOT_PATH, PLATE_HOST_PREFS, PLATE_SNAPSHOT_PATH,
};
