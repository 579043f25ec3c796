// ABOUTME: Network and device signals used to tune capability loading
// Supplied by the host environment; absent signals mean fast/non-mobile

/// Effective connection types treated as slow.
pub const SLOW_EFFECTIVE_TYPES: [&str; 2] = ["slow-2g", "2g"];

/// Downlink bandwidth below this is treated as slow.
pub const SLOW_DOWNLINK_MBPS: f64 = 1.5;

/// What the host knows about the network, typically from the browser's
/// Network Information API or a platform equivalent.
#[derive(Debug, Clone, Default)]
pub struct NetworkHint {
    pub effective_type: Option<String>,
    pub save_data: bool,
    pub downlink_mbps: Option<f64>,
}

impl NetworkHint {
    /// Slow if the reported type is 2G-class, a data-saver preference is
    /// set, or the reported downlink is under the threshold.
    pub fn is_slow(&self) -> bool {
        if let Some(effective_type) = self.effective_type.as_deref() {
            if SLOW_EFFECTIVE_TYPES.contains(&effective_type) {
                return true;
            }
        }
        if self.save_data {
            return true;
        }
        matches!(self.downlink_mbps, Some(downlink) if downlink < SLOW_DOWNLINK_MBPS)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DeviceHint {
    pub is_mobile: bool,
}
