//! Centralized configuration for the send pipeline
//!
//! All tunables of the delivery pipeline live here so that behavior can be
//! adjusted in one place and tests can substitute fast-timeout profiles.

use core::time::Duration;

// ----------------------------------------------------------------------------
// Send Configuration
// ----------------------------------------------------------------------------

/// Configuration for the outbound delivery pipeline
#[derive(Debug, Clone)]
pub struct SendConfig {
    /// How long a group send waits for its pushed delivery receipt
    pub receipt_timeout: Duration,
    /// Bounded wait for a source's sequence resolution before the send
    /// is reported back to the caller
    pub sequence_timeout: Duration,
    /// Maximum number of nodes accepted in a forward bundle
    pub max_forward_nodes: usize,
    /// Rendered-content length of a long-message preview
    pub long_preview_len: usize,
    /// Rendered-content budget of a single inline packet, used when a send
    /// falls back to fragmentation
    pub inline_budget: usize,
    /// Application channel identifier tagging this client's own pushed
    /// receipts on the event bus
    pub app_channel_id: u32,
}

impl Default for SendConfig {
    fn default() -> Self {
        Self {
            receipt_timeout: Duration::from_millis(3000),
            sequence_timeout: Duration::from_millis(3000),
            max_forward_nodes: 200,
            long_preview_len: 27,
            inline_budget: 3000,
            app_channel_id: 1001,
        }
    }
}

impl SendConfig {
    /// Create a short-timeout profile for tests
    pub fn fast() -> Self {
        Self {
            receipt_timeout: Duration::from_millis(25),
            sequence_timeout: Duration::from_millis(25),
            ..Self::default()
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
