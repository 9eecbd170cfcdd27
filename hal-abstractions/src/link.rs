//! Network link abstraction

/// A network association that is driven by status polling
///
/// Implementations must be non-blocking: `begin` only *starts* an
/// association attempt, and completion is observed later through
/// `is_connected`.
pub trait NetworkLink {
    /// Start associating with the given credentials
    fn begin(&mut self, ssid: &str, password: &str);

    /// Drop the current association (or abandon an attempt in progress)
    fn disconnect(&mut self);

    /// Whether the link is associated and has an address
    fn is_connected(&self) -> bool;
}
