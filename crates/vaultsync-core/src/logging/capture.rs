//! Recording logger for assertions in tests

use parking_lot::Mutex;

use super::traits::Logger;

#[derive(Debug, Default)]
pub struct CaptureLogger {
    lines: Mutex<Vec<(&'static str, String)>>,
}

impl CaptureLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<(&'static str, String)> {
        self.lines.lock().clone()
    }

    pub fn contains(&self, level: &str, needle: &str) -> bool {
        self.lines
            .lock()
            .iter()
            .any(|(l, m)| *l == level && m.contains(needle))
    }

    fn push(&self, level: &'static str, message: &str) {
        self.lines.lock().push((level, message.to_string()));
    }
}

impl Logger for CaptureLogger {
    fn debug(&self, message: &str) {
        self.push("debug", message);
    }
    fn info(&self, message: &str) {
        self.push("info", message);
    }
    fn warn(&self, message: &str) {
        self.push("warn", message);
    }
    fn error(&self, message: &str) {
        self.push("error", message);
    }
}
