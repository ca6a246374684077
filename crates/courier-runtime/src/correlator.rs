//! Receipt correlation for group sends
//!
//! A group message's direct packet response only says the server accepted
//! it; the authoritative sequence arrives later as a pushed event on the
//! bus, tagged with this client's application channel id. The correlator
//! waits for that event with a bounded timeout and degrades to an explicit
//! unresolved state instead of failing the send.

use core::time::Duration;
use tracing::warn;

use courier_core::config::SendConfig;
use courier_core::events::{EventBus, EventPredicate};
use courier_core::outgoing::SeqResolution;
use courier_core::types::GroupId;

// ----------------------------------------------------------------------------
// Receipt Correlator
// ----------------------------------------------------------------------------

/// Waits for the pushed delivery receipt of one group send
pub struct ReceiptCorrelator<'a> {
    bus: &'a dyn EventBus,
    app_channel_id: u32,
    timeout: Duration,
}

impl<'a> ReceiptCorrelator<'a> {
    pub fn new(bus: &'a dyn EventBus, config: &SendConfig) -> Self {
        Self {
            bus,
            app_channel_id: config.app_channel_id,
            timeout: config.receipt_timeout,
        }
    }

    /// Wait for the next receipt event for `group` on this client's channel
    ///
    /// A timeout is not a failure: the packet response already confirmed the
    /// server accepted the message, so the send stays successful and only
    /// downstream correlation (quoting this message later) is degraded.
    pub async fn await_receipt(&self, group: GroupId) -> SeqResolution {
        let app_id = self.app_channel_id;
        let predicate: EventPredicate =
            Box::new(move |event| event.app_id == app_id && event.group == group);

        match self.bus.await_next(predicate, self.timeout).await {
            Some(event) => SeqResolution::Resolved {
                sequence: event.sequence,
                internal_id: event.internal_id,
            },
            None => {
                warn!(
                    group = %group,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "no delivery receipt arrived for group send; sequence left unresolved"
                );
                SeqResolution::Unresolved
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
