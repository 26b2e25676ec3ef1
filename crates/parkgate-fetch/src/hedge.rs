//! Hedged fetching across candidate paths and camera roles

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::future::join_all;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::client::{RawSnapshot, SnapshotClient};
use crate::error::FetchError;

#[derive(Clone)]
pub struct HedgedFetcher {
    client: Arc<dyn SnapshotClient>,
    min_useful_bytes: usize,
    timeout: Duration,
}

impl HedgedFetcher {
    pub fn new(client: Arc<dyn SnapshotClient>, min_useful_bytes: usize, timeout: Duration) -> Self {
        Self {
            client,
            min_useful_bytes,
            timeout,
        }
    }

    fn qualify(&self, raw: RawSnapshot) -> Result<Bytes, FetchError> {
        if raw.status != 200 {
            return Err(FetchError::Status(raw.status));
        }
        if raw.body.len() <= self.min_useful_bytes {
            return Err(FetchError::TooSmall {
                len: raw.body.len(),
                min: self.min_useful_bytes,
            });
        }
        Ok(raw.body)
    }

    /// Race every path against `host` and return the first usable image.
    ///
    /// Losing attempts are cancelled as soon as a winner is found or the
    /// group deadline passes. When every attempt fails, one of the failures
    /// is returned.
    pub async fn fetch_best(&self, host: &str, paths: &[&str]) -> Result<Bytes, FetchError> {
        if paths.is_empty() {
            return Err(FetchError::NoCandidates);
        }

        let group = CancellationToken::new();
        let _guard = group.clone().drop_guard();
        let (tx, mut rx) = mpsc::channel(paths.len());

        for path in paths {
            let client = self.client.clone();
            let token = group.child_token();
            let tx = tx.clone();
            let host = host.to_string();
            let path = path.to_string();
            tokio::spawn(async move {
                let result = client.get(&host, &path, &token).await;
                let _ = tx.send((path, result)).await;
            });
        }
        drop(tx);

        let race = async {
            let mut last = FetchError::NoCandidates;
            while let Some((path, result)) = rx.recv().await {
                match result.and_then(|raw| self.qualify(raw)) {
                    Ok(body) => return Ok((path, body)),
                    Err(e) => {
                        debug!(%host, %path, error = %e, "Snapshot candidate rejected");
                        last = e;
                    }
                }
            }
            Err(last)
        };

        match tokio::time::timeout(self.timeout, race).await {
            Ok(Ok((path, body))) => {
                group.cancel();
                debug!(%host, %path, bytes = body.len(), "Snapshot candidate won");
                Ok(body)
            }
            Ok(Err(e)) => Err(e),
            Err(_) => {
                group.cancel();
                Err(FetchError::Timeout)
            }
        }
    }

    /// Fetch one image per camera role, concurrently.
    ///
    /// Roles with a blank host or a failed fetch are left out of the result.
    pub async fn fetch_roles(
        &self,
        hosts: &BTreeMap<String, String>,
        paths: &[&str],
    ) -> BTreeMap<String, Bytes> {
        let fetches = hosts
            .iter()
            .map(|(role, host)| (role, host.trim()))
            .filter(|(_, host)| !host.is_empty())
            .map(|(role, host)| async move {
                match self.fetch_best(host, paths).await {
                    Ok(body) => Some((role.clone(), body)),
                    Err(e) => {
                        warn!(%role, %host, error = %e, "Camera snapshot unavailable");
                        None
                    }
                }
            });

        join_all(fetches).await.into_iter().flatten().collect()
    }
}

impl std::fmt::Debug for HedgedFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HedgedFetcher")
            .field("min_useful_bytes", &self.min_useful_bytes)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{Script, ScriptedSnapshotClient};
    use pretty_assertions::assert_eq;

    const HOST: &str = "10.0.0.7";

    fn fetcher(client: Arc<ScriptedSnapshotClient>, timeout: Duration) -> HedgedFetcher {
        HedgedFetcher::new(client, 800, timeout)
    }

    async fn wait_for_cancellations(client: &ScriptedSnapshotClient, expected: usize) {
        for _ in 0..100 {
            if client.cancellations() >= expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    #[tokio::test]
    async fn test_first_qualifying_candidate_wins_and_cancels_the_rest() {
        let client = Arc::new(
            ScriptedSnapshotClient::new()
                .with(HOST, "/a", Script::delayed_image(Duration::from_millis(300), 50))
                .with(HOST, "/b", Script::delayed_image(Duration::from_millis(20), 900))
                .with(HOST, "/c", Script::Hang),
        );

        let body = fetcher(client.clone(), Duration::from_secs(2))
            .fetch_best(HOST, &["/a", "/b", "/c"])
            .await
            .unwrap();
        assert_eq!(body.len(), 900);

        wait_for_cancellations(&client, 2).await;
        assert_eq!(client.cancellations(), 2);
    }

    #[tokio::test]
    async fn test_all_candidates_fail() {
        let client = Arc::new(
            ScriptedSnapshotClient::new()
                .with(HOST, "/a", Script::image(50))
                .with(
                    HOST,
                    "/b",
                    Script::Respond {
                        delay: Duration::ZERO,
                        status: 500,
                        body: Bytes::from_static(b"oops"),
                    },
                ),
        );

        let err = fetcher(client, Duration::from_secs(1))
            .fetch_best(HOST, &["/a", "/b"])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            FetchError::TooSmall { .. } | FetchError::Status(500)
        ));
    }

    #[tokio::test]
    async fn test_partial_content_is_not_a_snapshot() {
        let client = Arc::new(ScriptedSnapshotClient::new().with(
            HOST,
            "/a",
            Script::Respond {
                delay: Duration::ZERO,
                status: 206,
                body: Bytes::from(vec![0xFF; 900]),
            },
        ));

        let err = fetcher(client, Duration::from_secs(1))
            .fetch_best(HOST, &["/a"])
            .await
            .unwrap_err();
        assert_eq!(err, FetchError::Status(206));
    }

    #[tokio::test]
    async fn test_group_deadline_cancels_everything() {
        let client = Arc::new(
            ScriptedSnapshotClient::new()
                .with(HOST, "/a", Script::Hang)
                .with(HOST, "/b", Script::Hang),
        );

        let err = fetcher(client.clone(), Duration::from_millis(50))
            .fetch_best(HOST, &["/a", "/b"])
            .await
            .unwrap_err();
        assert_eq!(err, FetchError::Timeout);

        wait_for_cancellations(&client, 2).await;
        assert_eq!(client.cancellations(), 2);
    }

    #[tokio::test]
    async fn test_no_candidates() {
        let client = Arc::new(ScriptedSnapshotClient::new());
        let err = fetcher(client.clone(), Duration::from_secs(1))
            .fetch_best(HOST, &[])
            .await
            .unwrap_err();
        assert_eq!(err, FetchError::NoCandidates);
        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_roles_omits_missing_and_failed_roles() {
        let client = Arc::new(
            ScriptedSnapshotClient::new()
                .with_host("10.0.0.1", Script::image(1200))
                .with_host("10.0.0.2", Script::image(10)),
        );

        let mut hosts = BTreeMap::new();
        hosts.insert("lpr_out".to_string(), "10.0.0.1".to_string());
        hosts.insert("driver_out".to_string(), "10.0.0.2".to_string());
        hosts.insert("license_plate_out".to_string(), " ".to_string());

        let images = fetcher(client.clone(), Duration::from_secs(1))
            .fetch_roles(&hosts, &["/ISAPI/Streaming/channels/1/picture"])
            .await;

        assert_eq!(images.keys().cloned().collect::<Vec<_>>(), vec!["lpr_out"]);
        assert_eq!(images["lpr_out"].len(), 1200);
        assert_eq!(client.calls().len(), 2);
    }
}
