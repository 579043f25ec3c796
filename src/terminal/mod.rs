// ABOUTME: Terminal transport module for interactive container I/O
// WebSocket duplex channel with text/binary framing and resize control messages

pub mod protocol;
pub mod session;

pub use protocol::{ResizeCommand, SessionState, TerminalEvent};
pub use session::TerminalSession;
