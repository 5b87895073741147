//! A terminal that keeps everything written to it.

use std::sync::Mutex;

use sandbox_shell::Terminal;
use tokio::sync::Notify;

#[derive(Default)]
pub struct RecordingTerminal {
    cols: Option<u16>,
    rows: Option<u16>,
    written: Mutex<String>,
    changed: Notify,
}

impl RecordingTerminal {
    /// A terminal that has not reported its geometry.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_size(cols: u16, rows: u16) -> Self {
        Self {
            cols: Some(cols),
            rows: Some(rows),
            ..Self::default()
        }
    }

    pub fn output(&self) -> String {
        self.written.lock().unwrap().clone()
    }

    /// Wait until `needle` has been written.
    pub async fn wait_for(&self, needle: &str) {
        loop {
            let changed = self.changed.notified();
            if self.output().contains(needle) {
                return;
            }
            changed.await;
        }
    }
}

impl Terminal for RecordingTerminal {
    fn cols(&self) -> Option<u16> {
        self.cols
    }

    fn rows(&self) -> Option<u16> {
        self.rows
    }

    fn write(&self, data: &str) {
        self.written.lock().unwrap().push_str(data);
        self.changed.notify_waiters();
    }
}
