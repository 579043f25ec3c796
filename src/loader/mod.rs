// ABOUTME: Lazy, resilient loading of the terminal rendering capability set
// Overlaps module fetches with container creation to hide latency

pub mod hints;
pub mod resource_loader;

pub use hints::{DeviceHint, NetworkHint, SLOW_DOWNLINK_MBPS, SLOW_EFFECTIVE_TYPES};
pub use resource_loader::{CapabilityFetcher, LoadError, LoadingInfo, ResourceLoader};
