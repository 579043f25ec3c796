// ABOUTME: Wire protocol and connection state for the terminal transport
// Text frames carry shell I/O or JSON control messages; binary frames carry raw I/O

use serde::Serialize;

/// Connection lifecycle of a [`TerminalSession`](super::TerminalSession).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Open,
    Closing,
    Closed,
}

/// Events delivered to the consumer of a terminal session.
///
/// `Closed` is the universal terminal event: it follows every receive-loop
/// exit (including error paths) and every `close()` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalEvent {
    /// UTF-8 shell output.
    Data(String),
    /// Raw binary output.
    Binary(Vec<u8>),
    /// Transport failure; always followed by `Closed`.
    Error(String),
    Closed,
}

/// Resize control message, sent as a text frame on the data channel. The
/// server distinguishes it from raw keystrokes by shape.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ResizeCommand {
    #[serde(rename = "type")]
    kind: &'static str,
    cols: u16,
    rows: u16,
}

impl ResizeCommand {
    pub fn new(cols: u16, rows: u16) -> Self {
        Self {
            kind: "resize",
            cols,
            rows,
        }
    }
}
