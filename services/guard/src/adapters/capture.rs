//! services/guard/src/adapters/capture.rs
//!
//! QR capture for keyboard-wedge scanners: the scanner types the decoded
//! text followed by Enter, so every input line is one decoded code.

use std::time::Duration;

use patrol_core::ports::CodeStream;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::time::Instant;
use tracing::{debug, error};

/// Detections closer together than this are dropped.
pub const MIN_DETECTION_INTERVAL: Duration = Duration::from_millis(100);

/// Turns a line-oriented reader into a stream of trimmed, non-empty lines.
///
/// Invalid UTF-8 is replaced with U+FFFD. Only end of input or an I/O error
/// ends the stream.
pub fn line_source<R>(mut reader: R) -> CodeStream
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    Box::pin(async_stream::stream! {
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf);
                    let line = line.trim();
                    if !line.is_empty() {
                        yield line.to_string();
                    }
                }
                Err(e) => {
                    error!("Capture input failed: {}", e);
                    break;
                }
            }
        }
    })
}

/// The on/off state of the capture device and its detection throttle.
#[derive(Debug)]
pub struct QrCapture {
    active: bool,
    last_detection: Option<Instant>,
    min_interval: Duration,
}

impl Default for QrCapture {
    fn default() -> Self {
        Self::new(MIN_DETECTION_INTERVAL)
    }
}

impl QrCapture {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            active: true,
            last_detection: None,
            min_interval,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn activate(&mut self) {
        if !self.active {
            debug!("Capture activated");
        }
        self.active = true;
    }

    pub fn deactivate(&mut self) {
        if self.active {
            debug!("Capture deactivated");
        }
        self.active = false;
    }

    /// Accepts a decoded value, or drops it when capture is off or the
    /// previous detection was too recent.
    pub fn detect(&mut self, raw: &str) -> Option<String> {
        if !self.active {
            return None;
        }
        let now = Instant::now();
        if let Some(last) = self.last_detection {
            if now.duration_since(last) < self.min_interval {
                return None;
            }
        }
        self.last_detection = Some(now);
        Some(raw.trim().to_string())
    }
}
