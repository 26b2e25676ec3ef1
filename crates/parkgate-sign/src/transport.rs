//! Datagram transport for sign frames

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tracing::{debug, warn};

use crate::error::SignError;
use crate::frame::{encode_frame, SignContent};

/// Delivers an encoded frame to a sign
#[async_trait]
pub trait SignSink: Send + Sync {
    async fn send_frame(&self, host: &str, port: u16, frame: &[u8]) -> Result<(), SignError>;
}

/// Fire-and-forget UDP sender.
///
/// Each frame goes out on a fresh ephemeral socket with exactly one write.
/// There is no acknowledgement and no retry.
#[derive(Debug, Clone)]
pub struct UdpSignSink {
    timeout: Duration,
}

impl UdpSignSink {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for UdpSignSink {
    fn default() -> Self {
        Self::new(Duration::from_secs(2))
    }
}

#[async_trait]
impl SignSink for UdpSignSink {
    async fn send_frame(&self, host: &str, port: u16, frame: &[u8]) -> Result<(), SignError> {
        let send = async {
            let socket = UdpSocket::bind("0.0.0.0:0")
                .await
                .map_err(|e| SignError::SendFailed(format!("bind: {e}")))?;
            socket
                .connect((host, port))
                .await
                .map_err(|e| SignError::SendFailed(format!("connect {host}:{port}: {e}")))?;
            let sent = socket
                .send(frame)
                .await
                .map_err(|e| SignError::SendFailed(format!("write {host}:{port}: {e}")))?;
            if sent != frame.len() {
                return Err(SignError::SendFailed(format!(
                    "short write: {sent}/{} bytes",
                    frame.len()
                )));
            }
            Ok(())
        };

        tokio::time::timeout(self.timeout, send)
            .await
            .map_err(|_| SignError::Timeout(format!("send to {host}:{port}")))?
    }
}

/// Encodes sign content and hands it to a [`SignSink`]
#[derive(Clone)]
pub struct SignDisplay {
    sink: Arc<dyn SignSink>,
    port: u16,
}

impl SignDisplay {
    pub fn new(sink: Arc<dyn SignSink>, port: u16) -> Self {
        Self { sink, port }
    }

    /// Encode `content` and send it to `host`.
    ///
    /// An info line that does not fit its record is dropped and the frame is
    /// sent with a blank third line; an oversized plate is an error.
    pub async fn show(&self, host: Option<&str>, content: SignContent<'_>) -> Result<(), SignError> {
        let host = host.ok_or_else(|| SignError::NotConfigured("no sign address".to_string()))?;

        let frame = match encode_frame(&content) {
            Err(SignError::InfoTooLong { len }) => {
                warn!(len, info = %content.info_line, "Info line too long for sign, sending blank line");
                encode_frame(&content.with_info(""))?
            }
            other => other?,
        };

        debug!(%host, port = self.port, frame = %hex::encode(&frame), "Sending sign frame");
        self.sink.send_frame(host, self.port, &frame).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{SignMode, FRAME_LEN};
    use parkgate_core::Direction;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder {
        frames: Mutex<Vec<(String, u16, Vec<u8>)>>,
    }

    #[async_trait]
    impl SignSink for Recorder {
        async fn send_frame(&self, host: &str, port: u16, frame: &[u8]) -> Result<(), SignError> {
            self.frames
                .lock()
                .push((host.to_string(), port, frame.to_vec()));
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_udp_sink_delivers_one_datagram() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = receiver.local_addr().unwrap().port();

        let sink = UdpSignSink::default();
        sink.send_frame("127.0.0.1", port, &[0x55, 0xAA, 0x01])
            .await
            .unwrap();

        let mut buf = [0u8; 512];
        let n = tokio::time::timeout(Duration::from_secs(1), receiver.recv(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(&buf[..n], &[0x55, 0xAA, 0x01]);
    }

    #[tokio::test]
    async fn test_display_sends_full_frame() {
        let recorder = Arc::new(Recorder::default());
        let display = SignDisplay::new(recorder.clone(), 9999);

        display
            .show(
                Some("10.0.0.9"),
                SignContent::new("1กข2345", Direction::Entrance, SignMode::Main),
            )
            .await
            .unwrap();

        let frames = recorder.frames.lock();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].0, "10.0.0.9");
        assert_eq!(frames[0].1, 9999);
        assert_eq!(frames[0].2.len(), FRAME_LEN);
    }

    #[tokio::test]
    async fn test_display_blanks_oversized_info() {
        let recorder = Arc::new(Recorder::default());
        let display = SignDisplay::new(recorder.clone(), 9999);

        let content =
            SignContent::new("AB12", Direction::Exit, SignMode::Main).with_info("123456789 THB");
        display.show(Some("10.0.0.9"), content).await.unwrap();

        let expected = encode_frame(&content.with_info("")).unwrap();
        assert_eq!(recorder.frames.lock()[0].2, expected);
    }

    #[tokio::test]
    async fn test_display_without_host_is_not_configured() {
        let recorder = Arc::new(Recorder::default());
        let display = SignDisplay::new(recorder.clone(), 9999);

        let err = display
            .show(None, SignContent::new("AB12", Direction::Exit, SignMode::Clear))
            .await
            .unwrap_err();
        assert!(matches!(err, SignError::NotConfigured(_)));
        assert!(recorder.frames.lock().is_empty());
    }
}
