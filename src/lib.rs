// ABOUTME: Client runtime for Rexec remote terminal sessions
// Container lifecycle over HTTP/SSE, terminal I/O over WebSocket, and lazy capability loading

pub mod api;
pub mod config;
pub mod containers;
pub mod error;
pub mod loader;
pub mod models;
pub mod terminal;

pub use api::ApiClient;
pub use config::{ClientConfig, CreateStrategy};
pub use containers::{ContainerStore, ContainersState, CreateEvent, StartOutcome};
pub use error::ClientError;
pub use loader::{CapabilityFetcher, DeviceHint, NetworkHint, ResourceLoader};
pub use models::{Container, ContainerStatus, CreatingContainer, ProgressEvent};
pub use terminal::{SessionState, TerminalEvent, TerminalSession};
