//! Event bus abstraction and pushed delivery receipts
//!
//! Group message confirmation does not arrive in the packet's direct
//! response; the server pushes it later as an out-of-band event tagged with
//! an application channel identifier. The pipeline waits for the next
//! matching event on this bus, with a bounded timeout.

use async_trait::async_trait;
use core::time::Duration;
use serde::{Deserialize, Serialize};

use crate::types::{GroupId, Timestamp};

// ----------------------------------------------------------------------------
// Pushed Events
// ----------------------------------------------------------------------------

/// Server-pushed delivery receipt for a group send
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushedEvent {
    /// Application channel identifier distinguishing this client's own
    /// feature channel
    pub app_id: u32,
    /// The group the confirmed message was sent to
    pub group: GroupId,
    /// Server-assigned message sequence
    pub sequence: u32,
    /// Server-assigned internal identifier
    pub internal_id: i64,
    /// Server receive time
    pub time: Timestamp,
}

/// Predicate selecting the pushed event a waiter cares about
pub type EventPredicate = Box<dyn Fn(&PushedEvent) -> bool + Send>;

// ----------------------------------------------------------------------------
// Event Bus Trait
// ----------------------------------------------------------------------------

/// Delivers server-pushed events to waiting tasks
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Wait for the next event matching `predicate`, up to `timeout`
    ///
    /// Returns `None` when the timeout expires without a match; the waiter
    /// decides whether that is an error.
    async fn await_next(&self, predicate: EventPredicate, timeout: Duration)
        -> Option<PushedEvent>;
}
