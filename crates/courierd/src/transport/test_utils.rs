//! Test helpers for the transport module.

use std::sync::Mutex;

use super::{ConnectionHandler, ConnectionStream, read_request_line};

/// Records the request line of every accepted connection.
#[derive(Default)]
pub(crate) struct RecordingHandler {
    lines: Mutex<Vec<Option<Vec<u8>>>>,
}

impl RecordingHandler {
    /// Connections handled so far.
    pub(crate) fn connections(&self) -> usize {
        self.lines.lock().map_or(0, |lines| lines.len())
    }

    /// Request lines read so far; `None` for connections closed without one.
    pub(crate) fn lines(&self) -> Vec<Option<Vec<u8>>> {
        self.lines.lock().map(|lines| lines.clone()).unwrap_or_default()
    }
}

impl ConnectionHandler for RecordingHandler {
    fn handle(&self, mut stream: ConnectionStream) {
        let line = read_request_line(&mut stream).ok().flatten();
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(line);
        }
    }
}
