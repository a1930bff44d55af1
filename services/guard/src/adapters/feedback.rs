//! services/guard/src/adapters/feedback.rs
//!
//! Terminal implementation of the `FeedbackSink` port: the bell stands in for
//! the success and error tones, and toasts are printed as prefixed lines.

use std::io::Write;
use std::sync::Mutex;

use patrol_core::ports::{FeedbackSink, NoticeLevel};
use tracing::{debug, error, info, warn};

const BELL: &str = "\x07";

pub struct TerminalFeedback {
    out: Mutex<Box<dyn Write + Send>>,
    sound: bool,
}

impl TerminalFeedback {
    pub fn stdout() -> Self {
        Self::new(Box::new(std::io::stdout()), true)
    }

    pub fn new(out: Box<dyn Write + Send>, sound: bool) -> Self {
        Self {
            out: Mutex::new(out),
            sound,
        }
    }

    fn write(&self, text: &str) {
        if let Ok(mut out) = self.out.lock() {
            // Best effort.
            let _ = out.write_all(text.as_bytes()).and_then(|_| out.flush());
        }
    }
}

fn prefix(level: NoticeLevel) -> &'static str {
    match level {
        NoticeLevel::Success => "[OK]",
        NoticeLevel::Error => "[ERROR]",
        NoticeLevel::Warning => "[WARN]",
        NoticeLevel::Info => "[INFO]",
    }
}

impl FeedbackSink for TerminalFeedback {
    fn play_success(&self) {
        if self.sound {
            self.write(BELL);
        }
    }

    fn play_error(&self) {
        if self.sound {
            self.write(&BELL.repeat(2));
        }
    }

    fn vibrate(&self, pattern: &[u64]) {
        debug!(?pattern, "Vibration requested");
    }

    fn toast(&self, level: NoticeLevel, message: &str) {
        match level {
            NoticeLevel::Error => error!(message, "Toast"),
            NoticeLevel::Warning => warn!(message, "Toast"),
            NoticeLevel::Success | NoticeLevel::Info => info!(message, "Toast"),
        }
        let indent = " ".repeat(prefix(level).len() + 1);
        let body = message.replace('\n', &format!("\n{}", indent));
        self.write(&format!("{} {}\n", prefix(level), body));
    }
}
